//! Refreshes the halo replicas of every slab from the ranks that own them.
//!
//! A round is two passes over the same neighbor schedule. In the first pass
//! each rank tells its neighbors which of their cells it replicates, as lists
//! of whole-grid flat indexes. In the second pass each rank answers with the
//! current payloads of those cells, in the order they were asked for, and the
//! receivers overwrite their replicas.
//!
//! Ranks form a line, so each one talks to at most two neighbors. Sends are
//! ordered by rank parity: an even rank talks to its next neighbor first and
//! an odd rank to its previous one, so every send meets a peer that is
//! already waiting in the matching receive. The schedule completes even when
//! a send blocks until it is received.

use log::debug;

use crate::cell::Params;
use crate::codec::{decode, encode};
use crate::error::Error;
use crate::message::comm::{Communicator, Tag};
use crate::partition::Slab;

/// One point-to-point operation of a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    SendNext,
    RecvNext,
    RecvPrev,
    SendPrev,
}

/// Return the order in which `rank` talks to its neighbors during a pass.
/// Ranks at either end of the line skip the neighbor they don't have.
///
pub fn schedule(rank: usize, size: usize) -> Vec<Step> {
    let next: &[Step] = if rank + 1 < size {
        &[Step::SendNext, Step::RecvNext]
    } else {
        &[]
    };
    let prev: &[Step] = if rank > 0 && rank < size {
        &[Step::RecvPrev, Step::SendPrev]
    } else {
        &[]
    };

    if rank % 2 == 0 {
        [next, prev].concat()
    } else {
        [prev, next].concat()
    }
}

/// Messages bound for, or received from, the two neighbors of a rank.
#[derive(Debug, Default)]
struct Pair {
    next: Option<Vec<u8>>,
    prev: Option<Vec<u8>>,
}

/// Run one pass of the schedule on the given tag: send `outgoing` and
/// return what the neighbors sent back.
fn exchange<C: Communicator>(comm: &C, tag: Tag, mut outgoing: Pair) -> Result<Pair, Error> {
    let rank = comm.rank();
    let mut incoming = Pair::default();

    for step in schedule(rank, comm.size()) {
        match step {
            Step::SendNext => comm.send(rank + 1, tag, outgoing.next.take().unwrap_or_default())?,
            Step::RecvNext => incoming.next = Some(comm.recv(rank + 1, tag)?),
            Step::RecvPrev => incoming.prev = Some(comm.recv(rank - 1, tag)?),
            Step::SendPrev => comm.send(rank - 1, tag, outgoing.prev.take().unwrap_or_default())?,
        }
    }
    Ok(incoming)
}

fn decode_or_empty<T: serde::de::DeserializeOwned + Default>(bytes: Option<Vec<u8>>) -> Result<T, Error> {
    match bytes {
        Some(bytes) => decode(&bytes),
        None => Ok(T::default()),
    }
}

fn payloads_for(slab: &Slab, ids: &[usize]) -> Result<Vec<u8>, Error> {
    let payloads = ids
        .iter()
        .map(|&id| slab.owned_params(id).map(Params::clone))
        .collect::<Result<Vec<_>, _>>()?;
    encode(&payloads)
}

fn apply(slab: &mut Slab, ids: &[usize], payloads: Vec<Params>, side: &str) -> Result<(), Error> {
    if payloads.len() != ids.len() {
        return Err(Error::Protocol(format!(
            "asked the {} neighbor for {} cells but got {}",
            side,
            ids.len(),
            payloads.len()
        )));
    }
    for (&id, params) in ids.iter().zip(payloads) {
        slab.write_halo(id, params)?;
    }
    Ok(())
}

/// Run one halo synchronization round, collectively with every other rank
/// of the communicator. Returns the number of halo cells refreshed here.
/// Afterwards every halo cell holds the payload its owner had when the
/// round started. A group of one has no halos and sends nothing.
///
pub fn synchronize<C: Communicator>(comm: &C, slab: &mut Slab) -> Result<usize, Error> {
    let rank = comm.rank();
    let mut need_next = Vec::new();
    let mut need_prev = Vec::new();

    for (origin, owner, _) in slab.halo_cells() {
        if owner == rank + 1 {
            need_next.push(origin)
        } else if owner + 1 == rank {
            need_prev.push(origin)
        } else {
            return Err(Error::Protocol(format!(
                "rank {} holds a replica of cell {} owned by rank {}, which is not a neighbor",
                rank, origin, owner
            )));
        }
    }

    let asked = exchange(
        comm,
        Tag::SyncIds,
        Pair {
            next: Some(encode(&need_next)?),
            prev: Some(encode(&need_prev)?),
        },
    )?;
    let give_next: Vec<usize> = decode_or_empty(asked.next)?;
    let give_prev: Vec<usize> = decode_or_empty(asked.prev)?;

    debug!(
        "rank {} needs {}/{} cells and gives {}/{} cells (prev/next)",
        rank,
        need_prev.len(),
        need_next.len(),
        give_prev.len(),
        give_next.len()
    );

    let answered = exchange(
        comm,
        Tag::SyncValues,
        Pair {
            next: Some(payloads_for(slab, &give_next)?),
            prev: Some(payloads_for(slab, &give_prev)?),
        },
    )?;
    apply(slab, &need_next, decode_or_empty(answered.next)?, "next")?;
    apply(slab, &need_prev, decode_or_empty(answered.prev)?, "previous")?;

    Ok(need_next.len() + need_prev.len())
}
