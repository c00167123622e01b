//! Setup of a distributed run. The coordinator resolves the configuration,
//! builds the whole-domain grid, partitions it, and hands each rank its slab.
//! These messages are sent once, before the first halo round.

use log::info;

use crate::codec::{decode, encode};
use crate::config::Config;
use crate::error::Error;
use crate::grid::render_side_by_side;
use crate::message::comm::{Communicator, Tag};
use crate::partition::{split_grid, Slab};

/// Fan the coordinator's configuration out to every rank. The coordinator
/// must pass `Some`, the other ranks `None`; every rank returns the same
/// configuration.
///
pub fn share_config<C: Communicator>(comm: &C, config: Option<Config>) -> Result<Config, Error> {
    if !comm.is_distributed() {
        return config.ok_or_else(|| Error::Config("no configuration to run with".into()));
    }

    if comm.is_coordinator() {
        let config = config.ok_or_else(|| Error::Config("the coordinator has no configuration".into()))?;
        comm.broadcast(Tag::Config, Some(config.to_bytes()?))?;
        Ok(config)
    } else {
        Config::from_bytes(&comm.broadcast(Tag::Config, None)?)
    }
}

/// Produce this rank's slab. In a group of one the whole grid is the slab;
/// otherwise the coordinator builds and splits the grid, keeps slab 0, and
/// sends every other slab to its rank.
///
pub fn make_slab<C: Communicator>(comm: &C, config: &Config) -> Result<Slab, Error> {
    if !comm.is_coordinator() {
        let slab: Slab = decode(&comm.recv(0, Tag::Grid)?)?;

        if slab.rank() != comm.rank() {
            return Err(Error::Protocol(format!(
                "rank {} was sent the slab for rank {}",
                comm.rank(),
                slab.rank()
            )));
        }
        return Ok(slab);
    }

    let whole = config.build_grid();
    info!("whole grid '{}':\n{}", config.name, whole);

    if !comm.is_distributed() {
        return Ok(Slab::whole(whole));
    }

    let slabs = split_grid(&whole, comm.size());
    let (_, height) = whole.dim();
    info!(
        "split into {} slabs:\n{}",
        slabs.len(),
        render_side_by_side(slabs.iter().map(Slab::grid), 0..height as i64)
    );

    let mut slabs = slabs.into_iter();
    let own = slabs
        .next()
        .ok_or_else(|| Error::Protocol("partition produced no slabs".into()))?;

    for slab in slabs {
        comm.send(slab.rank(), Tag::Grid, encode(&slab)?)?;
    }
    Ok(own)
}
