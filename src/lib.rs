//! # ising-denoise
//!
//! Distributed binary-image denoising by Metropolis-Hastings sampling over
//! an Ising energy. The image is tiled across a rectangular grid of worker
//! ranks; each worker samples its own sub-image and resolves boundary
//! pixels through an asynchronous, deadlock-free neighbour-exchange
//! protocol (question / answer / finished) layered on a pluggable
//! non-blocking transport.
//!
//! ## Layout
//! - [`comm`]: transport backends, the in-process [`comm::ThreadComm`],
//!   serial [`comm::NoComm`], and MPI behind the `mpi-support` feature.
//! - [`grid`]: compass directions, worker-grid layout, neighbour tables.
//! - [`field`]: the per-worker sub-image and the text image format.
//! - [`halo`]: the ask / answer / finish engines and the wire format.
//! - [`sampler`]: the Metropolis step and its energy arithmetic.
//! - [`worker`] / [`coordinator`]: the two rank lifecycles.
//!
//! The protocol discipline throughout: a rank never blocks on one of its
//! own completions without pumping the answer engine, so mutual boundary
//! questions between neighbours cannot deadlock.

pub mod comm;
pub mod coordinator;
pub mod error;
pub mod field;
pub mod grid;
pub mod halo;
pub mod sampler;
pub mod worker;

/// The most-used types in one import.
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::comm::{CommTag, Communicator, NoComm, Probe, ThreadComm, Wait};
    pub use crate::coordinator::run_coordinator;
    pub use crate::error::DenoiseError;
    pub use crate::field::{Image, SubImage};
    pub use crate::grid::{Direction, GridLayout, NeighbourTable, DIRECTIONS};
    pub use crate::sampler::{HaloStats, Params};
    pub use crate::worker::{run_worker, Worker};
}
