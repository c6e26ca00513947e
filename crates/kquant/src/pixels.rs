use crate::types::CHANNELS;
use crate::{
    EmptyBufferSnafu, ImageDimensionsTooLargeSnafu, ImageSizeMismatchSnafu, InputImageError,
    InvalidBufferLengthSnafu, ZeroImageSizeSnafu,
};
use rgb::RGBA8;
use snafu::prelude::*;

/// A mutable façade over a tightly packed RGBA byte buffer.
///
/// The bytes stay in the caller's arena; pixels are addressed by index and
/// read or written as [`RGBA8`], so no caller has to do `i * 4 + channel`
/// arithmetic.
#[derive(Debug)]
pub struct PixelBuffer<'a> {
    width: u32,
    height: u32,
    buf: &'a mut [u8],
}

impl<'a> PixelBuffer<'a> {
    pub fn from_bytes(
        width: u32,
        height: u32,
        buf: &'a mut [u8],
    ) -> Result<PixelBuffer<'a>, InputImageError> {
        ensure!(!buf.is_empty(), EmptyBufferSnafu);
        ensure!(width > 0 && height > 0, ZeroImageSizeSnafu);
        ensure!(
            buf.len().is_multiple_of(CHANNELS),
            InvalidBufferLengthSnafu { len: buf.len() }
        );
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(CHANNELS))
            .context(ImageDimensionsTooLargeSnafu { width, height })?;
        ensure!(
            buf.len() == expected,
            ImageSizeMismatchSnafu {
                width,
                height,
                buf_size: buf.len()
            }
        );

        Ok(PixelBuffer { width, height, buf })
    }
}

impl PixelBuffer<'_> {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels, always `width * height`.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len() / CHANNELS
    }

    /// Never true for a constructed buffer.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize) -> RGBA8 {
        let start = i * CHANNELS;
        sample(&self.buf[start..start + CHANNELS])
    }

    #[inline]
    pub fn set(&mut self, i: usize, color: RGBA8) {
        let start = i * CHANNELS;
        store(&mut self.buf[start..start + CHANNELS], color);
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = RGBA8> + '_ {
        self.buf.chunks_exact(CHANNELS).map(sample)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.buf
    }
}

#[inline(always)]
pub(crate) fn sample(chunk: &[u8]) -> RGBA8 {
    RGBA8::new(chunk[0], chunk[1], chunk[2], chunk[3])
}

#[inline(always)]
pub(crate) fn store(chunk: &mut [u8], color: RGBA8) {
    chunk[0] = color.r;
    chunk[1] = color.g;
    chunk[2] = color.b;
    chunk[3] = color.a;
}
