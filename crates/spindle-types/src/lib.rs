//! # spindle-types
//!
//! Shared types, error definitions, and physical constants for the
//! Spindle suspension solver.
//!
//! This crate has zero domain logic — it defines the vocabulary
//! that all other Spindle crates share.

pub mod constants;
pub mod error;
pub mod scalar;

pub use error::{SpindleError, SpindleResult};
pub use scalar::Scalar;
