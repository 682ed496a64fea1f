//! A camera that shows still images read from disk.
//!
//! The capture command loads one file at a time with [`StillCamera::show`];
//! the open stream always returns the image currently on display, so the
//! session's barcode scan and snapshot run over exactly those pixels.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use attesta_core::{CameraError, CameraProvider, CameraStream, Frame, StreamConstraints};
use tracing::debug;

use crate::utils::read_file;

type Display = Arc<Mutex<Option<Frame>>>;

/// Decode an image file into an RGB frame.
pub fn load_frame(path: &Path) -> Result<Frame> {
    let bytes = read_file(path)?;
    let rgb = image::load_from_memory(&bytes)
        .with_context(|| format!("Failed to decode image: {}", path.display()))?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    Frame::from_rgb(width, height, rgb.into_raw())
        .with_context(|| format!("Failed to decode image: {} is empty", path.display()))
}

#[derive(Default)]
pub struct StillCamera {
    display: Display,
}

impl StillCamera {
    pub fn show(&self, frame: Frame) {
        debug!(width = frame.width(), height = frame.height(), "Showing frame");
        *self.display.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
    }
}

#[async_trait]
impl CameraProvider for StillCamera {
    async fn open(
        &self,
        _constraints: &StreamConstraints,
    ) -> Result<Box<dyn CameraStream>, CameraError> {
        Ok(Box::new(StillStream {
            display: Some(self.display.clone()),
        }))
    }
}

struct StillStream {
    display: Option<Display>,
}

impl CameraStream for StillStream {
    fn current_frame(&mut self) -> Option<Frame> {
        self.display
            .as_ref()?
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_torch(&mut self, _on: bool) -> Result<(), CameraError> {
        Err(CameraError::TorchUnsupported)
    }

    fn release(&mut self) {
        self.display = None;
    }
}

#[cfg(test)]
mod tests {
    use attesta_core::FacingMode;

    use super::*;

    fn constraints() -> StreamConstraints {
        StreamConstraints {
            facing: FacingMode::Environment,
            ideal_width: 640,
            ideal_height: 480,
        }
    }

    #[tokio::test]
    async fn test_stream_follows_display() {
        let camera = StillCamera::default();
        let mut stream = camera.open(&constraints()).await.unwrap();
        assert!(stream.current_frame().is_none());

        let frame = Frame::from_rgb(2, 1, vec![1, 2, 3, 4, 5, 6]).unwrap();
        camera.show(frame.clone());
        assert_eq!(stream.current_frame(), Some(frame));

        stream.release();
        assert!(stream.current_frame().is_none());
    }

    #[test]
    fn test_load_frame_decodes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.png");
        image::RgbImage::from_pixel(4, 3, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let frame = load_frame(&path).unwrap();
        assert_eq!((frame.width(), frame.height()), (4, 3));
        assert_eq!(&frame.pixels()[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_load_frame_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let err = load_frame(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to decode image"));
    }
}
