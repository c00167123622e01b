use serde::{Deserialize, Serialize};

use super::util;
use crate::error::Error;

/// Logical channel a message travels on. A receive only matches a message
/// with the same source and tag; messages on one (source, tag) pair arrive
/// in the order they were sent.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    /// Run configuration, fanned out from the coordinator.
    Config,

    /// A serialized slab, sent from the coordinator to its new owner.
    Grid,

    /// Whole-grid indexes of the halo cells a rank wants refreshed.
    SyncIds,

    /// Halo payloads, in the order they were requested.
    SyncValues,
}

impl Tag {
    pub const ALL: [Tag; 4] = [Tag::Config, Tag::Grid, Tag::SyncIds, Tag::SyncValues];
}

/// Interface for a group of processes that can exchange messages over a
/// network. The underlying transport can in principle be TCP, in-process
/// channels, or a higher level abstraction like MPI.
///
/// A transport failure is reported as an [Error] and is fatal to the run:
/// callers do not resend.
///
pub trait Communicator {
    /// Must be implemented to return the rank of this process within the
    /// communicator.
    fn rank(&self) -> usize;

    /// Must be implemented to return the number of peer processes in this
    /// communicator.
    fn size(&self) -> usize;

    /// Must be implemented to send a message to a peer. The halo exchange is
    /// scheduled so that it also completes on a transport where this blocks
    /// until the matching receive is posted.
    fn send(&self, rank: usize, tag: Tag, message: Vec<u8>) -> Result<(), Error>;

    /// Must be implemented to receive the next message from the given peer on
    /// the given tag. Blocks until that message is ready.
    fn recv(&self, rank: usize, tag: Tag) -> Result<Vec<u8>, Error>;

    /// Rank 0 builds the whole grid and fans setup data out to the others.
    fn is_coordinator(&self) -> bool {
        self.rank() == 0
    }

    /// A group of one runs without any messages.
    fn is_distributed(&self) -> bool {
        self.size() > 1
    }

    /// Implements a binomial tree broadcast from the coordinator. The message
    /// buffer must be `Some` if this is the coordinator, and it must be
    /// `None` otherwise.
    ///
    fn broadcast(&self, tag: Tag, value: Option<Vec<u8>>) -> Result<Vec<u8>, Error> {
        let r = self.rank();
        let p = self.size();

        let value = match (value, r) {
            (Some(value), _) => value,
            (None, 0) => return Err(Error::Protocol("nothing to broadcast from rank 0".into())),
            (None, r) => self.recv(r - (1 << r.trailing_zeros()), tag)?,
        };
        for level in (0..util::ceil_log2(p)).rev() {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 && r + one < p {
                self.send(r + one, tag, value.clone())?
            }
        }
        Ok(value)
    }
}
