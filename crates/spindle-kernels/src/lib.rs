//! # spindle-kernels
//!
//! Regularized Stokes kernel evaluators.
//!
//! Two layers:
//! - Direct dense evaluation ([`oseen`], [`stresslet`]) for near-field
//!   blocks and per-entity self operators.
//! - The far-field multipole contract ([`fmm`]): kernel choices, the
//!   [`fmm::MultipoleBackend`] trait with its explicit clear/evaluate
//!   lifecycle, and the all-pairs [`fmm::DirectSum`] reference backend.
//!
//! All kernels are pure functions of their inputs; the multipole tree is
//! the single stateful exception and must be cleared before every
//! evaluation.
//!
//! Point sets are `faer::Mat<f64>` of shape 3×n, one column per point.

pub mod fmm;
pub mod oseen;
pub mod stresslet;

pub use fmm::{stokes_pvel_fmm, stokes_velocity_fmm, DirectSum, MultipoleBackend, StokesKernel};
pub use oseen::{oseen_contract, oseen_matrix};
pub use stresslet::{stresslet_contract, stresslet_matrix};
