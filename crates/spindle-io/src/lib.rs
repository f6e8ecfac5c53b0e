//! # spindle-io
//!
//! The I/O boundary of the solver core.
//!
//! - [`precompute`] — the columnar named-array contract that body and
//!   periphery geometry/operators arrive through, with shape validation
//!   (a mismatch is fatal; the simulation cannot run on inconsistent
//!   geometry).
//! - [`checkpoint`] — the minimal persisted state (positions and
//!   orientations, never derived caches); an external serializer picks
//!   the on-disk format.
//! - [`surface`] — reference generators producing the same arrays an
//!   offline precompute pipeline would: quadrature sphere grids and the
//!   periphery's inverse-mobility operator. Tests build everything from
//!   these.

pub mod checkpoint;
pub mod precompute;
pub mod surface;

pub use precompute::PrecomputeData;
pub use surface::SurfaceGeometry;
