//! Contiguous-range partitioning of distributed arrays.
//!
//! A [`Partition`] is the counts/displacements pair that describes how a
//! globally-indexed array is split into per-rank contiguous ranges. It
//! is always computed fresh as a pure function of the current entity
//! counts — never cached mutable state — so the solver's view of vector
//! sizes cannot drift from the Krylov driver's.

use spindle_types::{SpindleError, SpindleResult};

/// Per-rank counts and their prefix sums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    counts: Vec<usize>,
    displs: Vec<usize>,
}

impl Partition {
    /// Build a partition from per-rank element counts.
    pub fn from_counts(counts: Vec<usize>) -> Self {
        let mut displs = Vec::with_capacity(counts.len() + 1);
        let mut acc = 0;
        displs.push(0);
        for &c in &counts {
            acc += c;
            displs.push(acc);
        }
        Self { counts, displs }
    }

    /// Split `total` elements over `ranks` processes in near-equal
    /// contiguous chunks (remainder spread over the first ranks).
    pub fn split_evenly(total: usize, ranks: usize) -> Self {
        assert!(ranks > 0, "partition needs at least one rank");
        let base = total / ranks;
        let extra = total % ranks;
        let counts = (0..ranks)
            .map(|r| base + usize::from(r < extra))
            .collect();
        Self::from_counts(counts)
    }

    /// Number of ranks in the partition.
    pub fn ranks(&self) -> usize {
        self.counts.len()
    }

    /// Element count owned by `rank`.
    pub fn count_of(&self, rank: usize) -> usize {
        self.counts[rank]
    }

    /// Start offset of `rank`'s range in the global array.
    pub fn displ_of(&self, rank: usize) -> usize {
        self.displs[rank]
    }

    /// Global range owned by `rank`.
    pub fn range_of(&self, rank: usize) -> std::ops::Range<usize> {
        self.displs[rank]..self.displs[rank + 1]
    }

    /// Total element count across all ranks.
    pub fn total(&self) -> usize {
        *self.displs.last().unwrap()
    }

    /// Scale every count by a fixed stride (e.g. nodes → 3·nodes rows).
    pub fn scaled(&self, stride: usize) -> Self {
        Self::from_counts(self.counts.iter().map(|&c| c * stride).collect())
    }

    /// Check this partition against an operator's local row count.
    ///
    /// The periphery's loaded inverse-mobility operator fixes the
    /// partitioning; any disagreement is a fatal configuration error.
    pub fn validate_local_rows(&self, rank: usize, local_rows: usize) -> SpindleResult<()> {
        if rank >= self.ranks() {
            return Err(SpindleError::Precompute(format!(
                "rank {rank} out of range for {}-rank partition",
                self.ranks()
            )));
        }
        if self.count_of(rank) != local_rows {
            return Err(SpindleError::Precompute(format!(
                "partition assigns {} rows to rank {rank} but the loaded operator has {local_rows}",
                self.count_of(rank)
            )));
        }
        Ok(())
    }
}
