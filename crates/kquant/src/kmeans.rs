use crate::pixels::PixelBuffer;
use crate::rng::pick_pixel;
use crate::types::squared_distance;
use crate::{
    AssignmentLengthMismatchSnafu, ClusterCountMismatchSnafu, OutOfMemorySnafu, RunError,
    TooManyClustersSnafu, ZeroClustersSnafu, ZeroIterationsSnafu,
};
use log::{debug, trace};
use rand::Rng;
use rgb::RGBA8;
use snafu::prelude::*;

pub mod accumulator;
pub mod init;
pub mod parallel;
pub mod sequential;

pub use accumulator::ClusterAccumulator;
pub use init::initialize;
pub use parallel::Parallel;
pub use sequential::Sequential;

// References:
// - Lloyd, S. (1982). Least squares quantization in PCM.
//
// Observations:
// - The loop always runs the requested number of iterations. Stopping early
//   would change the output for a given seed.
// - Empty clusters are reseeded from a random pixel, like sklearn does with
//   its "relocate empty clusters" step, but without picking the farthest point.

/// The centroid table: exactly K colors, indexed by cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Centroids {
    colors: Vec<RGBA8>,
}

impl Centroids {
    pub fn new(colors: Vec<RGBA8>) -> Self {
        Self { colors }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[RGBA8] {
        &self.colors
    }

    pub fn into_vec(self) -> Vec<RGBA8> {
        self.colors
    }

    pub(crate) fn set(&mut self, cluster: usize, color: RGBA8) {
        self.colors[cluster] = color;
    }
}

/// Index of the nearest centroid for every pixel.
///
/// Only an assignment pass can produce one, so reconstruction never reads
/// an assignment that was not computed. It remembers the size of the
/// centroid table it was computed against; using it with a table of
/// another size is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignments {
    indices: Vec<usize>,
    k: usize,
}

impl Assignments {
    pub(crate) fn allocate(len: usize) -> Result<Self, RunError> {
        let mut indices = Vec::new();
        indices
            .try_reserve_exact(len)
            .context(OutOfMemorySnafu {
                what: "assignment table",
            })?;
        indices.resize(len, 0);
        Ok(Self { indices, k: 0 })
    }

    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Size of the centroid table of the last assignment pass.
    pub fn k(&self) -> usize {
        self.k
    }
}

/// Lowest-index centroid at the minimum squared distance.
#[inline(always)]
pub(crate) fn nearest_centroid(centroids: &[RGBA8], color: RGBA8) -> usize {
    let mut min = u32::MAX;
    let mut min_idx = 0;
    for (j, &centroid) in centroids.iter().enumerate() {
        let d = squared_distance(centroid, color);
        if d < min {
            min = d;
            min_idx = j;
        }
    }
    min_idx
}

fn check_tables(
    pixels: &PixelBuffer,
    assignments: &Assignments,
    centroids: &Centroids,
) -> Result<(), RunError> {
    ensure!(!centroids.is_empty(), ZeroClustersSnafu);
    ensure!(
        assignments.len() == pixels.len(),
        AssignmentLengthMismatchSnafu {
            assignments: assignments.len(),
            pixels: pixels.len(),
        }
    );
    ensure!(
        assignments.k() == centroids.len(),
        ClusterCountMismatchSnafu {
            assigned: assignments.k(),
            centroids: centroids.len(),
        }
    );
    Ok(())
}

/// One way of executing the assign, recompute and reconstruct phases.
///
/// Implementations provide the `*_pixels` and `cluster_means` hooks, which
/// work on tables that have already been checked: every assignment is a
/// valid centroid index and every slice has the pixel count. The provided
/// methods do the checking and are the ones to call.
///
/// Implementations must agree bit for bit. Randomness is only consumed by
/// [`Strategy::recompute`] on the calling thread, after the per-cluster
/// means are known, so every strategy draws the same random stream.
pub trait Strategy {
    fn name(&self) -> &'static str;

    /// Writes the nearest of `centroids` for every pixel into `assignments`.
    fn assign_pixels(
        &self,
        pixels: &PixelBuffer,
        centroids: &[RGBA8],
        assignments: &mut [usize],
    );

    /// Sums and counts of the pixels assigned to each of the `k` clusters.
    fn accumulate_pixels(
        &self,
        pixels: &PixelBuffer,
        assignments: &[usize],
        k: usize,
    ) -> Result<ClusterAccumulator, RunError>;

    /// Floor mean of every cluster into `means`, `None` for the empty ones.
    fn cluster_means(&self, accumulator: &ClusterAccumulator, means: &mut [Option<RGBA8>]);

    /// Overwrites every pixel with the color of its assigned centroid.
    fn reconstruct_pixels(
        &self,
        pixels: &mut PixelBuffer,
        assignments: &[usize],
        centroids: &[RGBA8],
    );

    fn assign(
        &self,
        pixels: &PixelBuffer,
        centroids: &Centroids,
    ) -> Result<Assignments, RunError> {
        ensure!(!centroids.is_empty(), ZeroClustersSnafu);
        let mut assignments = Assignments::allocate(pixels.len())?;
        self.assign_into(pixels, centroids, &mut assignments)?;
        Ok(assignments)
    }

    /// Same as [`Strategy::assign`], reusing the table of a previous pass.
    fn assign_into(
        &self,
        pixels: &PixelBuffer,
        centroids: &Centroids,
        assignments: &mut Assignments,
    ) -> Result<(), RunError> {
        ensure!(!centroids.is_empty(), ZeroClustersSnafu);
        ensure!(
            assignments.len() == pixels.len(),
            AssignmentLengthMismatchSnafu {
                assignments: assignments.len(),
                pixels: pixels.len(),
            }
        );
        self.assign_pixels(pixels, centroids.as_slice(), &mut assignments.indices);
        assignments.k = centroids.len();
        Ok(())
    }

    fn accumulate(
        &self,
        pixels: &PixelBuffer,
        assignments: &Assignments,
    ) -> Result<ClusterAccumulator, RunError> {
        ensure!(
            assignments.len() == pixels.len(),
            AssignmentLengthMismatchSnafu {
                assignments: assignments.len(),
                pixels: pixels.len(),
            }
        );
        self.accumulate_pixels(pixels, assignments.as_slice(), assignments.k())
    }

    /// Moves every centroid to the mean of its cluster, reseeding empty
    /// clusters with a random pixel. Returns how many were reseeded.
    fn recompute(
        &self,
        pixels: &PixelBuffer,
        assignments: &Assignments,
        centroids: &mut Centroids,
        rng: &mut impl Rng,
    ) -> Result<usize, RunError> {
        check_tables(pixels, assignments, centroids)?;

        let accumulator =
            self.accumulate_pixels(pixels, assignments.as_slice(), centroids.len())?;
        let mut means = Vec::new();
        means
            .try_reserve_exact(centroids.len())
            .context(OutOfMemorySnafu {
                what: "cluster means",
            })?;
        means.resize(centroids.len(), None);
        self.cluster_means(&accumulator, &mut means);

        let mut reseeded = 0;
        for (cluster, mean) in means.into_iter().enumerate() {
            match mean {
                Some(color) => centroids.set(cluster, color),
                None => {
                    let random_point = pick_pixel(rng, pixels.len());
                    trace!("cluster {cluster} is empty, reseeding from pixel {random_point}");
                    centroids.set(cluster, pixels.get(random_point));
                    reseeded += 1;
                }
            }
        }
        Ok(reseeded)
    }

    /// Overwrites every pixel with the color of its assigned centroid.
    fn reconstruct(
        &self,
        pixels: &mut PixelBuffer,
        assignments: &Assignments,
        centroids: &Centroids,
    ) -> Result<(), RunError> {
        check_tables(pixels, assignments, centroids)?;
        self.reconstruct_pixels(pixels, assignments.as_slice(), centroids.as_slice());
        Ok(())
    }
}

fn validate(clusters: usize, iterations: usize, pixels: usize) -> Result<(), RunError> {
    ensure!(clusters > 0, ZeroClustersSnafu);
    ensure!(
        clusters <= pixels,
        TooManyClustersSnafu { clusters, pixels }
    );
    ensure!(iterations > 0, ZeroIterationsSnafu);
    Ok(())
}

/// Compresses `pixels` in place down to at most `clusters` colors.
///
/// Runs exactly `iterations` assign/recompute rounds from randomly chosen
/// initial centroids and returns the final centroid table.
pub fn run(
    strategy: &impl Strategy,
    pixels: &mut PixelBuffer,
    clusters: usize,
    iterations: usize,
    rng: &mut impl Rng,
) -> Result<Centroids, RunError> {
    validate(clusters, iterations, pixels.len())?;
    let centroids = initialize(pixels, clusters, rng)?;
    run_from(strategy, pixels, centroids, iterations, rng)
}

/// Same as [`run`], starting from the given centroids.
pub fn run_from(
    strategy: &impl Strategy,
    pixels: &mut PixelBuffer,
    mut centroids: Centroids,
    iterations: usize,
    rng: &mut impl Rng,
) -> Result<Centroids, RunError> {
    validate(centroids.len(), iterations, pixels.len())?;

    debug!(
        "k-means: {}x{} pixels, k={}, {} iterations, {} strategy",
        pixels.width(),
        pixels.height(),
        centroids.len(),
        iterations,
        strategy.name(),
    );

    let mut assignments = Assignments::allocate(pixels.len())?;
    for i in 0..iterations {
        strategy.assign_into(pixels, &centroids, &mut assignments)?;
        let reseeded = strategy.recompute(pixels, &assignments, &mut centroids, rng)?;
        debug!("iteration {}: {reseeded} empty clusters reseeded", i + 1);
    }

    strategy.reconstruct(pixels, &assignments, &centroids)?;

    Ok(centroids)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{rng, Execution};
    use pretty_assertions::assert_eq;

    pub(crate) fn bytes_of(colors: &[RGBA8]) -> Vec<u8> {
        colors.iter().flat_map(|c| [c.r, c.g, c.b, c.a]).collect()
    }

    #[test]
    fn nearest_prefers_lowest_index_on_ties() {
        let centroids = [
            RGBA8::new(0, 0, 0, 0),
            RGBA8::new(10, 0, 0, 0),
            RGBA8::new(10, 0, 0, 0),
        ];
        // Equidistant from 0 and 1
        assert_eq!(nearest_centroid(&centroids, RGBA8::new(5, 0, 0, 0)), 0);
        // Exact duplicates
        assert_eq!(nearest_centroid(&centroids, RGBA8::new(10, 0, 0, 0)), 1);
    }

    #[test]
    fn nearest_single_centroid() {
        let centroids = [RGBA8::new(200, 1, 2, 3)];
        assert_eq!(nearest_centroid(&centroids, RGBA8::new(0, 0, 0, 0)), 0);
    }

    #[test]
    fn rejects_zero_clusters() {
        let mut buf = [0u8; 8];
        let mut pixels = PixelBuffer::from_bytes(2, 1, &mut buf).unwrap();
        let result = run(&Sequential, &mut pixels, 0, 1, &mut rng::new());
        assert!(matches!(result, Err(RunError::ZeroClusters)));
    }

    #[test]
    fn rejects_more_clusters_than_pixels() {
        let mut buf = [0u8; 8];
        let mut pixels = PixelBuffer::from_bytes(2, 1, &mut buf).unwrap();
        let result = run(&Sequential, &mut pixels, 3, 1, &mut rng::new());
        assert!(matches!(
            result,
            Err(RunError::TooManyClusters {
                clusters: 3,
                pixels: 2
            })
        ));
    }

    #[test]
    fn rejects_zero_iterations_without_touching_pixels() {
        let original = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut buf = original;
        let mut pixels = PixelBuffer::from_bytes(2, 1, &mut buf).unwrap();
        let result = run(&Parallel, &mut pixels, 2, 0, &mut rng::new());
        assert!(matches!(result, Err(RunError::ZeroIterations)));
        assert_eq!(buf, original);
    }

    #[test]
    fn run_from_rejects_empty_centroids() {
        let mut buf = [0u8; 4];
        let mut pixels = PixelBuffer::from_bytes(1, 1, &mut buf).unwrap();
        let result = run_from(
            &Sequential,
            &mut pixels,
            Centroids::new(vec![]),
            1,
            &mut rng::new(),
        );
        assert!(matches!(result, Err(RunError::ZeroClusters)));
    }

    #[test]
    fn two_pixel_image_is_preserved() {
        let colors = [RGBA8::new(0, 0, 0, 255), RGBA8::new(10, 10, 10, 255)];
        let original = bytes_of(&colors);
        let mut buf = original.clone();
        let mut pixels = PixelBuffer::from_bytes(2, 1, &mut buf).unwrap();
        let mut rng = rng::new();

        let mut centroids = Centroids::new(colors.to_vec());
        let assignments = Sequential.assign(&pixels, &centroids).unwrap();
        assert_eq!(assignments.as_slice(), &[0, 1]);

        let reseeded = Sequential
            .recompute(&pixels, &assignments, &mut centroids, &mut rng)
            .unwrap();
        assert_eq!(reseeded, 0);
        assert_eq!(centroids.as_slice(), &colors);

        Sequential
            .reconstruct(&mut pixels, &assignments, &centroids)
            .unwrap();
        assert_eq!(buf, original);
    }

    #[test]
    fn two_pixel_image_is_preserved_from_a_seed() {
        let colors = [RGBA8::new(0, 0, 0, 255), RGBA8::new(10, 10, 10, 255)];
        let original = bytes_of(&colors);

        // Find a seed whose initialization picks both pixels, in order
        let mut seed_buf = original.clone();
        let pixels = PixelBuffer::from_bytes(2, 1, &mut seed_buf).unwrap();
        let seed = (0..1000u64)
            .find(|&seed| {
                let centroids = initialize(&pixels, 2, &mut rng::from_seed(seed)).unwrap();
                centroids.as_slice() == &colors[..]
            })
            .expect("one in four seeds should pick both pixels in order");

        for strategy in [Execution::Sequential, Execution::Parallel] {
            let mut buf = original.clone();
            let mut pixels = PixelBuffer::from_bytes(2, 1, &mut buf).unwrap();
            let mut rng = rng::from_seed(seed);
            let centroids = match strategy {
                Execution::Sequential => run(&Sequential, &mut pixels, 2, 1, &mut rng),
                Execution::Parallel => run(&Parallel, &mut pixels, 2, 1, &mut rng),
            }
            .unwrap();

            assert_eq!(centroids.as_slice(), &colors, "{strategy:?}");
            assert_eq!(buf, original, "{strategy:?}");
        }
    }

    #[test]
    fn assign_rejects_an_empty_centroid_table() {
        let mut buf = [0u8; 8];
        let pixels = PixelBuffer::from_bytes(2, 1, &mut buf).unwrap();
        let empty = Centroids::new(vec![]);

        assert!(matches!(
            Sequential.assign(&pixels, &empty),
            Err(RunError::ZeroClusters)
        ));
        assert!(matches!(
            Parallel.assign(&pixels, &empty),
            Err(RunError::ZeroClusters)
        ));
    }

    #[test]
    fn assign_into_rejects_a_table_of_another_length() {
        let mut small_buf = [0u8; 8];
        let mut large_buf = [0u8; 12];
        let small = PixelBuffer::from_bytes(2, 1, &mut small_buf).unwrap();
        let large = PixelBuffer::from_bytes(3, 1, &mut large_buf).unwrap();
        let centroids = Centroids::new(vec![RGBA8::new(0, 0, 0, 0)]);

        let mut assignments = Sequential.assign(&small, &centroids).unwrap();
        let result = Parallel.assign_into(&large, &centroids, &mut assignments);
        assert!(matches!(
            result,
            Err(RunError::AssignmentLengthMismatch {
                assignments: 2,
                pixels: 3
            })
        ));
    }

    #[test]
    fn recompute_rejects_assignments_from_another_table() {
        let colors = [RGBA8::new(0, 0, 0, 255), RGBA8::new(10, 10, 10, 255)];
        let mut buf = bytes_of(&colors);
        let pixels = PixelBuffer::from_bytes(2, 1, &mut buf).unwrap();

        let assignments = Sequential
            .assign(&pixels, &Centroids::new(colors.to_vec()))
            .unwrap();
        assert_eq!(assignments.k(), 2);

        let single = RGBA8::new(1, 2, 3, 4);
        let mut centroids = Centroids::new(vec![single]);
        for result in [
            Sequential.recompute(&pixels, &assignments, &mut centroids, &mut rng::new()),
            Parallel.recompute(&pixels, &assignments, &mut centroids, &mut rng::new()),
        ] {
            assert!(matches!(
                result,
                Err(RunError::ClusterCountMismatch {
                    assigned: 2,
                    centroids: 1
                })
            ));
        }
        assert_eq!(centroids.as_slice(), &[single]);
    }

    #[test]
    fn reconstruct_rejects_mismatched_tables() {
        let colors = [RGBA8::new(0, 0, 0, 255), RGBA8::new(10, 10, 10, 255)];
        let original = bytes_of(&colors);
        let mut buf = original.clone();
        let mut pixels = PixelBuffer::from_bytes(2, 1, &mut buf).unwrap();
        let assignments = Parallel
            .assign(&pixels, &Centroids::new(colors.to_vec()))
            .unwrap();

        let shorter = Centroids::new(vec![RGBA8::new(5, 5, 5, 5)]);
        let result = Sequential.reconstruct(&mut pixels, &assignments, &shorter);
        assert!(matches!(result, Err(RunError::ClusterCountMismatch { .. })));
        let result = Parallel.reconstruct(&mut pixels, &assignments, &Centroids::new(vec![]));
        assert!(matches!(result, Err(RunError::ZeroClusters)));

        let mut other_buf = [0u8; 12];
        let mut other = PixelBuffer::from_bytes(3, 1, &mut other_buf).unwrap();
        let centroids = Centroids::new(colors.to_vec());
        let result = Parallel.reconstruct(&mut other, &assignments, &centroids);
        assert!(matches!(
            result,
            Err(RunError::AssignmentLengthMismatch {
                assignments: 2,
                pixels: 3
            })
        ));
        assert_eq!(other_buf, [0u8; 12]);
        assert_eq!(buf, original);
    }

    #[test]
    fn single_cluster_is_the_floor_mean() {
        let colors = [
            RGBA8::new(0, 10, 255, 255),
            RGBA8::new(1, 20, 254, 255),
            RGBA8::new(2, 31, 0, 0),
        ];
        let mut buf = bytes_of(&colors);
        let mut pixels = PixelBuffer::from_bytes(3, 1, &mut buf).unwrap();

        let centroids = run(&Sequential, &mut pixels, 1, 3, &mut rng::new()).unwrap();

        // floor(3/3), floor(61/3), floor(509/3), floor(510/3)
        let mean = RGBA8::new(1, 20, 169, 170);
        assert_eq!(centroids.as_slice(), &[mean]);
        assert_eq!(buf, bytes_of(&[mean; 3]));
    }

    #[test]
    fn output_colors_come_from_the_centroid_table() {
        let mut rng = rng::from_seed(99);
        let mut buf: Vec<u8> = (0..64 * 64 * 4).map(|_| rng.random::<u8>()).collect();
        let mut pixels = PixelBuffer::from_bytes(64, 64, &mut buf).unwrap();

        let centroids = run(&Sequential, &mut pixels, 5, 4, &mut rng).unwrap();

        assert_eq!(centroids.len(), 5);
        for color in pixels.iter() {
            assert!(centroids.as_slice().contains(&color));
        }
    }

    #[test]
    fn reseeds_empty_clusters_from_the_image() {
        let colors = [RGBA8::new(10, 20, 30, 40), RGBA8::new(50, 60, 70, 80)];
        let mut buf = bytes_of(&colors);
        let pixels = PixelBuffer::from_bytes(2, 1, &mut buf).unwrap();
        let mut rng = rng::new();

        // Cluster 1 sits where nothing is, so it gets nothing
        let outlier = RGBA8::new(255, 255, 255, 255);
        let mut centroids = Centroids::new(vec![RGBA8::new(30, 40, 50, 60), outlier]);
        let assignments = Sequential.assign(&pixels, &centroids).unwrap();
        assert_eq!(assignments.as_slice(), &[0, 0]);

        let reseeded = Sequential
            .recompute(&pixels, &assignments, &mut centroids, &mut rng)
            .unwrap();
        assert_eq!(reseeded, 1);
        assert_eq!(centroids.as_slice()[0], RGBA8::new(30, 40, 50, 60));
        assert_ne!(centroids.as_slice()[1], outlier);
        assert!(colors.contains(&centroids.as_slice()[1]));
    }
}
