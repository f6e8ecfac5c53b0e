//! Minimal persisted state.
//!
//! Only what cannot be rebuilt is persisted: fiber node positions, body
//! poses, the step counter. Everything derived (derivative fields,
//! operators, factorizations, singularity-subtraction vectors) is
//! reconstructed after restore by the normal update path —
//! `update_cache_variables` and friends are idempotent and sufficient.
//! The concrete on-disk format belongs to the external serializer; these
//! types only fix the schema.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Persisted per-fiber state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiberCheckpoint {
    /// Node positions, one `[x, y, z]` triple per collocation point.
    pub positions: Vec<[f64; 3]>,
    /// Arclength of the fiber.
    pub length: f64,
}

/// Persisted per-body state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyCheckpoint {
    /// Centroid position in the lab frame.
    pub position: DVec3,
    /// Orientation quaternion.
    pub orientation: DQuat,
}

/// Persisted whole-simulation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemCheckpoint {
    /// Simulation time at the checkpoint.
    pub time: f64,
    /// Completed step count.
    pub step: u64,
    pub fibers: Vec<FiberCheckpoint>,
    pub bodies: Vec<BodyCheckpoint>,
}
