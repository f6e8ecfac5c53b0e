//! Body shape variants and their collision capabilities.
//!
//! Collision tests are a capability of the concrete shape, dispatched
//! over a tagged variant. A shape without the capability fails at
//! validation time (model construction), not in the middle of a run.

use glam::DVec3;
use spindle_types::{SpindleError, SpindleResult};

/// Shape variant of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyShape {
    /// A generic surface mesh with no analytic collision geometry.
    Generic,
    /// An analytic sphere.
    Sphere { radius: f64 },
}

impl BodyShape {
    pub fn name(&self) -> &'static str {
        match self {
            BodyShape::Generic => "generic",
            BodyShape::Sphere { .. } => "sphere",
        }
    }

    /// Whether this shape implements collision tests.
    pub fn supports_collision(&self) -> bool {
        matches!(self, BodyShape::Sphere { .. })
    }

    /// Fail unless this shape implements collision tests. Called when a
    /// model with collision checking enabled is constructed.
    pub fn require_collision_support(&self) -> SpindleResult<()> {
        if self.supports_collision() {
            Ok(())
        } else {
            Err(SpindleError::UnsupportedShape {
                shape: self.name(),
                operation: "collision check",
            })
        }
    }
}

/// Body–body collision test.
///
/// Both shapes must carry the collision capability; anything else is a
/// model-construction error surfaced here.
pub fn check_body_body_collision(
    pos_a: DVec3,
    shape_a: &BodyShape,
    pos_b: DVec3,
    shape_b: &BodyShape,
    threshold: f64,
) -> SpindleResult<bool> {
    shape_a.require_collision_support()?;
    shape_b.require_collision_support()?;

    match (shape_a, shape_b) {
        (BodyShape::Sphere { radius: ra }, BodyShape::Sphere { radius: rb }) => {
            Ok((pos_a - pos_b).length() < ra + rb + threshold)
        }
        _ => unreachable!("capability check above rejects non-colliding shapes"),
    }
}
