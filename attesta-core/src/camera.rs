//! Camera capability and video frames.
//!
//! A [`CameraProvider`] opens an exclusive [`CameraStream`]; the session holds at
//! most one stream at a time and releases it on every exit path.

use std::io::Cursor;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use serde::{Deserialize, Serialize};

use crate::error::CameraError;

/// Which way the camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    #[default]
    Environment,
}

impl FacingMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::User => Self::Environment,
            Self::Environment => Self::User,
        }
    }
}

/// Constraints passed when requesting a stream. Video only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

/// One decoded video frame, packed RGB8.
///
/// The buffer always holds exactly `width * height * 3` bytes, so `luma` and
/// `to_jpeg` never see a short buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    /// Build a frame, checking the buffer matches the dimensions.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(3)?;
        (pixels.len() == expected && width > 0 && height > 0).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Uniform frame, at least 1x1.
    pub(crate) fn solid(width: u32, height: u32, level: u8) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        Self {
            width,
            height,
            pixels: vec![level; width as usize * height as usize * 3],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Rec. 601 luma at `(x, y)`. Panics outside the frame.
    pub fn luma(&self, x: usize, y: usize) -> u8 {
        let i = (y * self.width as usize + x) * 3;
        let (r, g, b) = (
            u32::from(self.pixels[i]),
            u32::from(self.pixels[i + 1]),
            u32::from(self.pixels[i + 2]),
        );
        ((299 * r + 587 * g + 114 * b) / 1000) as u8
    }

    /// Encode the frame as a JPEG still.
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, image::ImageError> {
        let mut out = Cursor::new(Vec::new());
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
            encoder.encode(&self.pixels, self.width, self.height, ExtendedColorType::Rgb8)?;
        }
        Ok(out.into_inner())
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Grants exclusive camera streams.
#[async_trait]
pub trait CameraProvider: Send + Sync {
    /// Request access to a camera matching `constraints`.
    async fn open(&self, constraints: &StreamConstraints)
        -> Result<Box<dyn CameraStream>, CameraError>;
}

/// An open camera stream. Dropping it must also release the device.
pub trait CameraStream: Send {
    /// The most recent frame, if one is available yet.
    fn current_frame(&mut self) -> Option<Frame>;

    /// Apply the torch constraint.
    fn set_torch(&mut self, on: bool) -> Result<(), CameraError>;

    /// Stop every track. Must be idempotent.
    fn release(&mut self);
}
