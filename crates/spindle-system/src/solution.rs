//! Partitioning of the global unknown vector.
//!
//! The layout is fixed: [fibers | bodies | periphery], each component's
//! size a pure function of the current entity counts. Nothing caches
//! these — a topology change (fiber added, body removed) is picked up
//! by the next call, so the solver's view can never drift from the
//! Krylov driver's.

use spindle_body::BodyContainer;
use spindle_fiber::FiberContainer;
use spindle_periphery::Periphery;
use spindle_types::{SpindleError, SpindleResult};

/// Local solution-block sizes for the three components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolutionSizes {
    pub fibers: usize,
    pub bodies: usize,
    pub periphery: usize,
}

impl SolutionSizes {
    pub fn total(&self) -> usize {
        self.fibers + self.bodies + self.periphery
    }
}

/// Compute the current local block sizes.
pub fn local_solution_sizes(
    fibers: &FiberContainer,
    bodies: &BodyContainer,
    periphery: &Periphery,
) -> SolutionSizes {
    SolutionSizes {
        fibers: fibers.local_solution_size(),
        bodies: bodies.local_solution_size(),
        periphery: periphery.local_solution_size(),
    }
}

/// Split a global vector into its three component slices.
pub fn split<'a>(x: &'a [f64], sizes: &SolutionSizes) -> SpindleResult<(&'a [f64], &'a [f64], &'a [f64])> {
    if x.len() != sizes.total() {
        return Err(SpindleError::InvalidConfig(format!(
            "solution vector has {} entries, partition expects {}",
            x.len(),
            sizes.total()
        )));
    }
    let (fib, rest) = x.split_at(sizes.fibers);
    let (bod, shell) = rest.split_at(sizes.bodies);
    Ok((fib, bod, shell))
}
