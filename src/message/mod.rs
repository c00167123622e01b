//! This module exports a minimal message-passing API, which is encapsulated
//! by a `Communicator` trait. Implementors only need to write tagged `send`
//! and `recv` operations between two named ranks for a given transport layer
//! (a pure-Rust TCP transport and an in-process one are included). The trait
//! then provides default implementations for the setup-time fan-out from the
//! coordinator.
//!

mod backoff;
pub mod comm;
pub mod local;
pub mod tcp;
pub mod util;
