use crate::types::CHANNELS;
use crate::{OutOfMemorySnafu, RunError};
use rgb::RGBA8;
use snafu::prelude::*;

/// Per-cluster channel sums and pixel counts for one recomputation.
///
/// Sums are `u64` so that even a full-size image of white pixels in a single
/// cluster cannot overflow. Partial accumulators built over disjoint pixel
/// ranges can be merged in any order with the same result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAccumulator {
    sums: Vec<[u64; CHANNELS]>,
    counts: Vec<u64>,
}

impl ClusterAccumulator {
    pub fn try_new(k: usize) -> Result<Self, RunError> {
        let mut sums = Vec::new();
        let mut counts = Vec::new();
        sums.try_reserve_exact(k)
            .and_then(|()| counts.try_reserve_exact(k))
            .context(OutOfMemorySnafu {
                what: "cluster accumulator",
            })?;
        sums.resize(k, [0; CHANNELS]);
        counts.resize(k, 0);
        Ok(Self { sums, counts })
    }

    pub fn k(&self) -> usize {
        self.counts.len()
    }

    #[inline(always)]
    pub fn add(&mut self, cluster: usize, color: RGBA8) {
        let sum = &mut self.sums[cluster];
        sum[0] += color.r as u64;
        sum[1] += color.g as u64;
        sum[2] += color.b as u64;
        sum[3] += color.a as u64;
        self.counts[cluster] += 1;
    }

    pub fn merge(mut self, other: Self) -> Self {
        assert_eq!(self.k(), other.k());
        for (sum, other_sum) in self.sums.iter_mut().zip(&other.sums) {
            for (s, o) in sum.iter_mut().zip(other_sum) {
                *s += o;
            }
        }
        for (count, other_count) in self.counts.iter_mut().zip(&other.counts) {
            *count += other_count;
        }
        self
    }

    pub fn count(&self, cluster: usize) -> u64 {
        self.counts[cluster]
    }

    /// Per-channel floor mean, or `None` if no pixel landed in the cluster.
    #[inline]
    pub fn mean(&self, cluster: usize) -> Option<RGBA8> {
        let count = self.counts[cluster];
        if count == 0 {
            return None;
        }
        // A mean of u8 values always fits in u8
        let [r, g, b, a] = self.sums[cluster].map(|s| (s / count) as u8);
        Some(RGBA8::new(r, g, b, a))
    }
}
