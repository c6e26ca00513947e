pub mod kmeans;
pub mod pixels;
pub mod rng;
mod types;
#[cfg(feature = "_debug")]
pub mod debug_helpers;

pub use kmeans::{Assignments, Centroids, Parallel, Sequential, Strategy};
pub use pixels::PixelBuffer;
pub use rgb::RGBA8;
use snafu::prelude::*;
use std::collections::TryReserveError;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum InputImageError {
    #[snafu(display("image size must be positive"))]
    ZeroImageSize,

    #[snafu(display("buffer length {len} is not a multiple of 4"))]
    InvalidBufferLength { len: usize },

    #[snafu(display("buffer is empty"))]
    EmptyBuffer,

    #[snafu(display("image size ({width}x{height}) doesn't match the buffer size ({buf_size})"))]
    ImageSizeMismatch {
        width: u32,
        height: u32,
        buf_size: usize,
    },

    #[snafu(display("image dimensions {width}x{height} are too large to address"))]
    ImageDimensionsTooLarge { width: u32, height: u32 },
}

/// Everything that can stop a compression run.
///
/// Everything but `OutOfMemory` is a configuration error, reported before
/// any pixel or centroid is touched. `OutOfMemory` aborts the run when a
/// table or a per-iteration buffer cannot be allocated.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum RunError {
    #[snafu(display("cluster count must be positive"))]
    ZeroClusters,

    #[snafu(display("cluster count {clusters} exceeds the pixel count {pixels}"))]
    TooManyClusters { clusters: usize, pixels: usize },

    #[snafu(display("iteration count must be positive, reconstruction needs an assignment pass"))]
    ZeroIterations,

    #[snafu(display(
        "assignments were computed against {assigned} centroids, the table has {centroids}"
    ))]
    ClusterCountMismatch { assigned: usize, centroids: usize },

    #[snafu(display("assignment table has {assignments} entries, the image has {pixels} pixels"))]
    AssignmentLengthMismatch { assignments: usize, pixels: usize },

    #[snafu(display("failed to allocate the {what}"))]
    OutOfMemory {
        what: &'static str,
        source: TryReserveError,
    },
}

impl RunError {
    pub fn is_configuration(&self) -> bool {
        !matches!(self, RunError::OutOfMemory { .. })
    }
}

/// How the k-means phases are executed.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Execution {
    Sequential,
    #[default]
    Parallel,
}

pub const DEFAULT_CLUSTERS: usize = 8;
pub const DEFAULT_ITERATIONS: usize = 10;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CompressOptions {
    pub clusters: usize,
    pub iterations: usize,
    pub seed: u64,
    pub execution: Execution,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            clusters: DEFAULT_CLUSTERS,
            iterations: DEFAULT_ITERATIONS,
            seed: rng::DEFAULT_SEED,
            execution: Execution::default(),
        }
    }
}

impl CompressOptions {
    /// Checks what can be checked without the image: both counts positive.
    ///
    /// [`compress`] also rejects more clusters than pixels.
    pub fn validate(&self) -> Result<(), RunError> {
        ensure!(self.clusters > 0, ZeroClustersSnafu);
        ensure!(self.iterations > 0, ZeroIterationsSnafu);
        Ok(())
    }
}

/// Compress an image in place to at most `options.clusters` colors.
///
/// For example, on a raw RGBA byte buffer:
///
/// ```
/// let mut buf = [255, 0, 0, 255, 250, 0, 0, 255,
///                0, 0, 255, 255, 0, 0, 250, 255];
/// let mut pixels = kquant::PixelBuffer::from_bytes(2, 2, &mut buf).unwrap();
///
/// let options = kquant::CompressOptions { clusters: 1, iterations: 1, ..Default::default() };
/// let centroids = kquant::compress(&mut pixels, &options).unwrap();
///
/// // floor of the per-channel mean
/// let mean = rgb::RGBA8::new(126, 0, 126, 255);
/// assert_eq!(centroids.as_slice(), &[mean]);
/// assert_eq!(buf, [126, 0, 126, 255].repeat(4).as_slice());
/// ```
///
/// The buffer length must be `width * height * 4`, laid out as RGBARGBA….
///
/// Or, if the `image` feature is enabled, from [`image::RgbaImage`]:
///
#[cfg_attr(
    not(feature = "image"),
    doc = r##"
```compile_fail
let mut img = image::RgbaImage::from_raw(2, 1, vec![255, 0, 0, 255, 255, 0, 0, 255]).unwrap();
let mut pixels = kquant::PixelBuffer::try_from(&mut img).unwrap();
```
"##
)]
#[cfg_attr(
    feature = "image",
    doc = r##"
```
let mut img = image::RgbaImage::from_raw(2, 1, vec![255, 0, 0, 255, 0, 0, 255, 255]).unwrap();
let mut pixels = kquant::PixelBuffer::try_from(&mut img).unwrap();

let options = kquant::CompressOptions { clusters: 2, iterations: 3, ..Default::default() };
let centroids = kquant::compress(&mut pixels, &options).unwrap();
assert_eq!(centroids.len(), 2);
```
"##
)]
///
/// Returns the final centroid table. The same options always give the
/// same output, whichever [`Execution`] is chosen.
pub fn compress(
    pixels: &mut PixelBuffer,
    options: &CompressOptions,
) -> Result<Centroids, RunError> {
    let mut rng = rng::from_seed(options.seed);
    match options.execution {
        Execution::Sequential => kmeans::run(
            &Sequential,
            pixels,
            options.clusters,
            options.iterations,
            &mut rng,
        ),
        Execution::Parallel => kmeans::run(
            &Parallel,
            pixels,
            options.clusters,
            options.iterations,
            &mut rng,
        ),
    }
}

#[cfg(feature = "image")]
impl<'a> TryFrom<&'a mut image::RgbaImage> for PixelBuffer<'a> {
    type Error = InputImageError;

    fn try_from(img: &'a mut image::RgbaImage) -> Result<Self, Self::Error> {
        let (width, height) = img.dimensions();
        let buf: &mut [u8] = img;
        Self::from_bytes(width, height, buf)
    }
}
