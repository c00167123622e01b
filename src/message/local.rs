use std::collections::HashMap;
use std::panic;
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use super::comm::{Communicator, Tag};
use crate::error::Error;

/// A communicator between threads of one process. Every (source,
/// destination, tag) triple gets its own zero-capacity channel, so a send
/// does not complete until the peer posts the matching receive. That makes
/// this transport a strict test of a message schedule: a schedule which
/// relies on buffering hangs here instead of passing by luck.
///
pub struct LocalCommunicator {
    rank: usize,
    size: usize,
    outbound: HashMap<(usize, Tag), Sender<Vec<u8>>>,
    inbound: HashMap<(usize, Tag), Receiver<Vec<u8>>>,
}

impl LocalCommunicator {
    /// Create the communicators for a group of `size` ranks, in rank order.
    /// Each one is meant to be moved onto its own thread.
    ///
    pub fn group(size: usize) -> Vec<Self> {
        let mut comms: Vec<_> = (0..size)
            .map(|rank| Self {
                rank,
                size,
                outbound: HashMap::new(),
                inbound: HashMap::new(),
            })
            .collect();

        for src in 0..size {
            for dst in (0..size).filter(|&dst| dst != src) {
                for &tag in Tag::ALL.iter() {
                    let (sink, source) = crossbeam_channel::bounded(0);
                    comms[src].outbound.insert((dst, tag), sink);
                    comms[dst].inbound.insert((src, tag), source);
                }
            }
        }
        comms
    }

    /// Run `f` once per rank of a new group, each on its own thread, and
    /// collect the results in rank order. A panic on any rank is resumed on
    /// the calling thread.
    ///
    pub fn run_group<T, F>(size: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(LocalCommunicator) -> T + Sync,
    {
        let comms = Self::group(size);
        let f = &f;

        thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| scope.spawn(move || f(comm)))
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|e| panic::resume_unwind(e)))
                .collect()
        })
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, rank: usize, tag: Tag, message: Vec<u8>) -> Result<(), Error> {
        self.outbound
            .get(&(rank, tag))
            .ok_or_else(|| Error::Transport(format!("rank {} has no route to rank {}", self.rank, rank)))?
            .send(message)
            .map_err(|_| Error::Transport(format!("rank {} has hung up", rank)))
    }

    fn recv(&self, rank: usize, tag: Tag) -> Result<Vec<u8>, Error> {
        self.inbound
            .get(&(rank, tag))
            .ok_or_else(|| Error::Transport(format!("rank {} has no route from rank {}", self.rank, rank)))?
            .recv()
            .map_err(|_| Error::Transport(format!("rank {} has hung up", rank)))
    }
}
