use super::{nearest_centroid, ClusterAccumulator, Strategy};
use crate::pixels::PixelBuffer;
use crate::RunError;
use rgb::RGBA8;

/// Single-threaded execution, one pixel and one centroid at a time.
#[derive(Debug, Default, Copy, Clone)]
pub struct Sequential;

impl Strategy for Sequential {
    fn name(&self) -> &'static str {
        "sequential"
    }

    #[inline]
    fn assign_pixels(
        &self,
        pixels: &PixelBuffer,
        centroids: &[RGBA8],
        assignments: &mut [usize],
    ) {
        for (assignment, color) in assignments.iter_mut().zip(pixels.iter()) {
            *assignment = nearest_centroid(centroids, color);
        }
    }

    #[inline]
    fn accumulate_pixels(
        &self,
        pixels: &PixelBuffer,
        assignments: &[usize],
        k: usize,
    ) -> Result<ClusterAccumulator, RunError> {
        let mut accumulator = ClusterAccumulator::try_new(k)?;
        for (&assigned_c, color) in assignments.iter().zip(pixels.iter()) {
            accumulator.add(assigned_c, color);
        }
        Ok(accumulator)
    }

    fn cluster_means(&self, accumulator: &ClusterAccumulator, means: &mut [Option<RGBA8>]) {
        for (c, mean) in means.iter_mut().enumerate() {
            *mean = accumulator.mean(c);
        }
    }

    fn reconstruct_pixels(
        &self,
        pixels: &mut PixelBuffer,
        assignments: &[usize],
        centroids: &[RGBA8],
    ) {
        for (i, &assigned_c) in assignments.iter().enumerate() {
            pixels.set(i, centroids[assigned_c]);
        }
    }
}
