#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors raised when a pixel buffer does not describe a valid image
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("Image data length mismatch: expected {expected_len}, got {actual_len}")]
    InvalidImageData { expected_len: usize, actual_len: usize },
    #[error("Unsupported channel count {0} (expected 1 or 3)")]
    UnsupportedChannels(usize),
}

pub type ImageResult<T> = Result<T, ImageError>;

/// Row-major interleaved 8-bit image with 1 (intensity) or 3 (RGB) channels
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawImage"))]
pub struct Image {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

impl Image {
    /// Wraps a decoded pixel buffer, validating its layout.
    ///
    /// Zero width or height is accepted and yields an empty image; callers
    /// that need pixels check [`Image::is_empty`].
    pub fn new(width: usize, height: usize, channels: usize, data: Vec<u8>) -> ImageResult<Self> {
        let expected_len = buffer_len(width, height, channels, data.len())?;
        if data.len() != expected_len {
            return Err(ImageError::InvalidImageData {
                expected_len,
                actual_len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Image filled with a constant value
    pub fn from_val(width: usize, height: usize, channels: usize, val: u8) -> ImageResult<Self> {
        let len = buffer_len(width, height, channels, 0)?;
        Self::new(width, height, channels, vec![val; len])
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Value of channel `c` at pixel `(x, y)`
    #[inline]
    pub fn get(&self, x: usize, y: usize, c: usize) -> u8 {
        self.data[(y * self.width + x) * self.channels + c]
    }

    /// Reduce to a single intensity channel.
    ///
    /// RGB input uses the BT.601 luma weights.
    pub fn to_gray(&self) -> Image {
        if self.channels == 1 {
            return self.clone();
        }
        let data = self
            .data
            .chunks_exact(3)
            .map(|px| {
                let luma = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
                luma.round().clamp(0.0, 255.0) as u8
            })
            .collect();
        Image {
            width: self.width,
            height: self.height,
            channels: 1,
            data,
        }
    }

    /// Expand to three channels, replicating intensity when needed
    pub fn to_rgb(&self) -> Image {
        if self.channels == 3 {
            return self.clone();
        }
        let data = self.data.iter().flat_map(|&v| [v, v, v]).collect();
        Image {
            width: self.width,
            height: self.height,
            channels: 3,
            data,
        }
    }
}

/// Byte length of a `width x height x channels` buffer; `actual_len` is
/// reported back when the size does not fit in `usize`
fn buffer_len(width: usize, height: usize, channels: usize, actual_len: usize) -> ImageResult<usize> {
    if channels != 1 && channels != 3 {
        return Err(ImageError::UnsupportedChannels(channels));
    }
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels))
        .ok_or(ImageError::InvalidImageData {
            expected_len: usize::MAX,
            actual_len,
        })
}

/// Unvalidated serialized form of [`Image`]
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawImage {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawImage> for Image {
    type Error = ImageError;

    fn try_from(raw: RawImage) -> ImageResult<Self> {
        Image::new(raw.width, raw.height, raw.channels, raw.data)
    }
}

/// Single-channel floating point image used by the scale space
#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl FloatImage {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> ImageResult<Self> {
        let expected_len = width.checked_mul(height).ok_or(ImageError::InvalidImageData {
            expected_len: usize::MAX,
            actual_len: data.len(),
        })?;
        if data.len() != expected_len {
            return Err(ImageError::InvalidImageData {
                expected_len,
                actual_len: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    /// Intensity image rescaled to [0, 1]
    pub fn from_gray(img: &Image) -> ImageResult<Self> {
        if img.channels() != 1 {
            return Err(ImageError::UnsupportedChannels(img.channels()));
        }
        Ok(Self {
            width: img.width(),
            height: img.height(),
            data: img.as_slice().iter().map(|&v| v as f32 / 255.0).collect(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<f32> {
        self.data
    }

    /// Pixel-wise `self - other`
    pub fn difference(&self, other: &FloatImage) -> ImageResult<FloatImage> {
        if self.data.len() != other.data.len() {
            return Err(ImageError::InvalidImageData {
                expected_len: self.data.len(),
                actual_len: other.data.len(),
            });
        }
        let data = self.data.iter().zip(&other.data).map(|(a, b)| a - b).collect();
        Ok(FloatImage {
            width: self.width,
            height: self.height,
            data,
        })
    }

    /// Keep every second pixel in both directions
    pub fn decimate(&self) -> FloatImage {
        let width = self.width / 2;
        let height = self.height / 2;
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            let row = &self.data[2 * y * self.width..];
            data.extend((0..width).map(|x| row[2 * x]));
        }
        FloatImage { width, height, data }
    }
}
