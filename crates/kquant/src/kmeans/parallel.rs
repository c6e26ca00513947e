use super::{nearest_centroid, ClusterAccumulator, Strategy};
use crate::pixels::{sample, store, PixelBuffer};
use crate::types::CHANNELS;
use crate::RunError;
use rayon::prelude::*;
use rgb::RGBA8;

// Big enough to amortize rayon's per-task overhead, small enough to
// spread a 1 megapixel image over a few hundred tasks.
const CHUNK_PIXELS: usize = 4096;

/// Data-parallel execution on the rayon thread pool.
///
/// Every phase is a parallel iterator, and the next phase only starts once
/// the previous iterator has been fully driven, which is the barrier
/// between phases. Within a phase each task writes only its own slice of
/// the assignment table, its own partial accumulator, its own centroid or
/// its own pixels.
#[derive(Debug, Default, Copy, Clone)]
pub struct Parallel;

impl Strategy for Parallel {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn assign_pixels(
        &self,
        pixels: &PixelBuffer,
        centroids: &[RGBA8],
        assignments: &mut [usize],
    ) {
        assignments
            .par_chunks_mut(CHUNK_PIXELS)
            .zip(pixels.as_bytes().par_chunks(CHUNK_PIXELS * CHANNELS))
            .for_each(|(assignments, bytes)| {
                for (assignment, chunk) in assignments.iter_mut().zip(bytes.chunks_exact(CHANNELS))
                {
                    *assignment = nearest_centroid(centroids, sample(chunk));
                }
            });
    }

    /// Folds one partial accumulator per task and merges them pairwise.
    ///
    /// Integer addition is associative, so the result does not depend on
    /// how rayon splits the work.
    fn accumulate_pixels(
        &self,
        pixels: &PixelBuffer,
        assignments: &[usize],
        k: usize,
    ) -> Result<ClusterAccumulator, RunError> {
        pixels
            .as_bytes()
            .par_chunks(CHUNK_PIXELS * CHANNELS)
            .zip(assignments.par_chunks(CHUNK_PIXELS))
            .fold(
                || ClusterAccumulator::try_new(k),
                |accumulator, (bytes, assignments)| {
                    let mut accumulator = accumulator?;
                    for (chunk, &assigned_c) in bytes.chunks_exact(CHANNELS).zip(assignments) {
                        accumulator.add(assigned_c, sample(chunk));
                    }
                    Ok(accumulator)
                },
            )
            .reduce(
                || ClusterAccumulator::try_new(k),
                |left, right| Ok(left?.merge(right?)),
            )
    }

    /// One unit of work per centroid.
    fn cluster_means(&self, accumulator: &ClusterAccumulator, means: &mut [Option<RGBA8>]) {
        means
            .par_iter_mut()
            .enumerate()
            .for_each(|(c, mean)| *mean = accumulator.mean(c));
    }

    fn reconstruct_pixels(
        &self,
        pixels: &mut PixelBuffer,
        assignments: &[usize],
        centroids: &[RGBA8],
    ) {
        pixels
            .as_bytes_mut()
            .par_chunks_exact_mut(CHANNELS)
            .zip(assignments.par_iter())
            .for_each(|(chunk, &assigned_c)| store(chunk, centroids[assigned_c]));
    }
}
