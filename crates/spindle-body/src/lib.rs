//! # spindle-body
//!
//! Rigid bodies immersed in the suspension.
//!
//! ## Key Types
//!
//! - [`Body`] — one rigid body's discretized surface: pose, lab/reference
//!   frames, singularity-subtraction vectors, the rigid-motion coupling
//!   matrix K, and the combined saddle operator with its LU factorization
//! - [`BodyShape`] — tagged shape variant carrying the collision
//!   capability set (no throwing base class)
//! - [`BodyContainer`] — all bodies, materialized in full only on the
//!   coordinator rank

pub mod body;
pub mod container;
pub mod shape;

pub use body::Body;
pub use container::BodyContainer;
pub use shape::BodyShape;
