use super::Centroids;
use crate::pixels::PixelBuffer;
use crate::rng::pick_pixel;
use crate::{OutOfMemorySnafu, RunError, TooManyClustersSnafu, ZeroClustersSnafu};
use rand::Rng;
use snafu::prelude::*;

/// Picks `k` initial centroids, each the color of a uniformly random pixel.
///
/// Pixels are drawn with replacement, so the same color can seed several
/// clusters. Exactly `k` values are drawn from `rng`, in centroid order.
pub fn initialize(
    pixels: &PixelBuffer,
    k: usize,
    rng: &mut impl Rng,
) -> Result<Centroids, RunError> {
    let n = pixels.len();
    ensure!(k > 0, ZeroClustersSnafu);
    ensure!(k <= n, TooManyClustersSnafu { clusters: k, pixels: n });

    let mut colors = Vec::new();
    colors.try_reserve_exact(k).context(OutOfMemorySnafu {
        what: "centroid table",
    })?;
    for _ in 0..k {
        colors.push(pixels.get(pick_pixel(rng, n)));
    }

    Ok(Centroids::new(colors))
}
