//! QR decoding over the frame's luma plane.

use std::sync::Arc;

use async_trait::async_trait;

use super::{BarcodeDecoder, DecoderLoader};
use crate::camera::Frame;
use crate::error::DecoderLoadError;

/// Decodes the first readable QR code in a frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoder;

impl BarcodeDecoder for QrDecoder {
    fn decode(&self, frame: &Frame) -> Option<String> {
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            frame.width() as usize,
            frame.height() as usize,
            |x, y| frame.luma(x, y),
        );
        prepared
            .detect_grids()
            .into_iter()
            .find_map(|grid| grid.decode().ok().map(|(_, content)| content))
            .filter(|content| !content.is_empty())
    }
}

/// Loader for [`QrDecoder`]. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoderLoader;

#[async_trait]
impl DecoderLoader for QrDecoderLoader {
    async fn load(&self) -> Result<Arc<dyn BarcodeDecoder>, DecoderLoadError> {
        Ok(Arc::new(QrDecoder))
    }
}

#[cfg(test)]
mod tests {
    use qrcode::{Color, QrCode};

    use super::*;

    const LOT: &str = "LOT-2026-A001";

    /// Render `content` as a black-on-white QR frame, 4 px per module with a
    /// 4-module quiet zone.
    fn qr_frame(content: &str) -> Frame {
        const SCALE: usize = 4;
        const QUIET: usize = 4;
        let code = QrCode::new(content.as_bytes()).unwrap();
        let modules = code.width();
        let colors = code.to_colors();
        let side = (modules + 2 * QUIET) * SCALE;

        let mut pixels = Vec::with_capacity(side * side * 3);
        for y in 0..side {
            for x in 0..side {
                let (mx, my) = (x / SCALE, y / SCALE);
                let dark = (QUIET..QUIET + modules).contains(&mx)
                    && (QUIET..QUIET + modules).contains(&my)
                    && colors[(my - QUIET) * modules + (mx - QUIET)] == Color::Dark;
                let level = if dark { 0 } else { 255 };
                pixels.extend_from_slice(&[level, level, level]);
            }
        }
        Frame::from_rgb(side as u32, side as u32, pixels).unwrap()
    }

    #[test]
    fn test_decodes_rendered_code() {
        assert_eq!(QrDecoder.decode(&qr_frame(LOT)).as_deref(), Some(LOT));
    }

    #[test]
    fn test_decodes_code_after_jpeg_round_trip() {
        let jpeg = qr_frame(LOT).to_jpeg(92).unwrap();
        let rgb = image::load_from_memory(&jpeg).unwrap().to_rgb8();
        let (width, height) = rgb.dimensions();
        let frame = Frame::from_rgb(width, height, rgb.into_raw()).unwrap();
        assert_eq!(QrDecoder.decode(&frame).as_deref(), Some(LOT));
    }

    #[test]
    fn test_blank_frame_yields_nothing() {
        let frame = Frame::from_rgb(64, 64, vec![255; 64 * 64 * 3]).unwrap();
        assert_eq!(QrDecoder.decode(&frame), None);
    }

    #[test]
    fn test_noise_frame_yields_nothing() {
        let pixels = (0..32 * 32 * 3).map(|i| ((i * 37) % 251) as u8).collect();
        let frame = Frame::from_rgb(32, 32, pixels).unwrap();
        assert_eq!(QrDecoder.decode(&frame), None);
    }
}
