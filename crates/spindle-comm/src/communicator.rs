//! Process-group communication trait and the serial implementation.

use crate::partition::Partition;
use spindle_types::{SpindleError, SpindleResult};

/// Collective communication across the cooperating processes.
///
/// The solver calls these methods at fixed, globally-agreed points; a
/// rank that skips a collective deadlocks the group, so implementations
/// must not make any call conditional on local state.
pub trait Communicator: Send + Sync {
    /// This process's rank in [0, size).
    fn rank(&self) -> usize;

    /// Number of cooperating processes.
    fn size(&self) -> usize;

    /// Broadcast `buf` from `root` to all ranks.
    fn broadcast(&self, buf: &mut Vec<f64>, root: usize) -> SpindleResult<()>;

    /// Gather variable-length contributions onto `root`. Returns the
    /// concatenation (rank order) on `root`, `None` elsewhere.
    fn gather(&self, local: &[f64], root: usize) -> SpindleResult<Option<Vec<f64>>>;

    /// All-gather variable-length contributions; every rank receives the
    /// concatenation laid out according to `partition`.
    fn allgatherv(&self, local: &[f64], partition: &Partition) -> SpindleResult<Vec<f64>>;

    /// Element-wise sum reduction, result available on every rank.
    fn allreduce_sum(&self, local: &[f64]) -> SpindleResult<Vec<f64>>;
}

/// Single-process communicator: every collective is the identity.
#[derive(Debug, Clone, Default)]
pub struct SerialComm;

impl SerialComm {
    pub fn new() -> Self {
        Self
    }
}

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn broadcast(&self, _buf: &mut Vec<f64>, root: usize) -> SpindleResult<()> {
        if root != 0 {
            return Err(SpindleError::Communicator(format!(
                "broadcast root {root} out of range for single-process group"
            )));
        }
        Ok(())
    }

    fn gather(&self, local: &[f64], root: usize) -> SpindleResult<Option<Vec<f64>>> {
        if root != 0 {
            return Err(SpindleError::Communicator(format!(
                "gather root {root} out of range for single-process group"
            )));
        }
        Ok(Some(local.to_vec()))
    }

    fn allgatherv(&self, local: &[f64], partition: &Partition) -> SpindleResult<Vec<f64>> {
        if partition.ranks() != 1 || partition.count_of(0) != local.len() {
            return Err(SpindleError::Communicator(format!(
                "partition ({} ranks, {} local) does not match single-process buffer of {}",
                partition.ranks(),
                partition.count_of(0),
                local.len()
            )));
        }
        Ok(local.to_vec())
    }

    fn allreduce_sum(&self, local: &[f64]) -> SpindleResult<Vec<f64>> {
        Ok(local.to_vec())
    }
}
