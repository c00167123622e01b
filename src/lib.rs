//! Domain decomposition and halo synchronization for a parallel 2D rarefied
//! gas solver. A structured grid of cells is built from a list of regions,
//! split into vertical slabs of columns with roughly equal numbers of cells,
//! and distributed one slab per rank. Each slab carries read-only replicas
//! (halos) of the neighbor cells its stencil needs, and a two-pass exchange
//! between adjacent ranks keeps those replicas current after every step.
//!
//! The physics kernels are not part of this crate; they plug in through the
//! `solver::Integrator` interface. Messages go through the
//! `message::comm::Communicator` interface, with a TCP transport for one
//! process per rank and an in-process transport for running ranks as threads.

pub mod cell;
pub mod codec;
pub mod config;
pub mod distribute;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod halo;
pub mod index_space;
pub mod meshing;
pub mod message;
pub mod partition;
pub mod solver;
