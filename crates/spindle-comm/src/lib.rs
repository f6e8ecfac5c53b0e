//! # spindle-comm
//!
//! The distributed-compute contract the solver core is written against.
//!
//! Spindle never talks to a message-passing library directly; container
//! aggregation and the global matvec go through the [`Communicator`]
//! trait. An MPI-backed implementation lives with the launcher; the
//! in-tree [`SerialComm`] covers single-process runs and every test.
//!
//! Every collective is a synchronous barrier: all ranks must reach it.

pub mod communicator;
pub mod partition;

pub use communicator::{Communicator, SerialComm};
pub use partition::Partition;
