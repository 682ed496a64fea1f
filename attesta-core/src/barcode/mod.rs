//! Lazily-initialized barcode decoding.
//!
//! The decoder is loaded at most once per [`BarcodeDetector`]. Concurrent callers
//! of [`BarcodeDetector::load`] converge on the same attempt and share its outcome,
//! including a permanent failure: once a load has failed the detector reports
//! [`DecoderStatus::Unavailable`] for the rest of its lifetime and never retries.
//!
//! With the `qr` feature, [`BarcodeDetector::global`] returns a process-wide
//! detector backed by a QR decoder.

#[cfg(feature = "qr")]
mod qr;

#[cfg(feature = "qr")]
pub use qr::{QrDecoder, QrDecoderLoader};

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::camera::Frame;
use crate::error::DecoderLoadError;

/// Decodes a code string from a single frame.
pub trait BarcodeDecoder: Send + Sync {
    /// Returns the decoded value, or `None` when the frame holds no readable code.
    fn decode(&self, frame: &Frame) -> Option<String>;
}

/// Produces a decoder. May be slow or fail.
#[async_trait]
pub trait DecoderLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn BarcodeDecoder>, DecoderLoadError>;
}

/// Load state of a detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum DecoderStatus {
    NotLoaded,
    Ready,
    /// Loading failed. Terminal for the lifetime of the detector.
    Unavailable,
}

/// Single-initialization wrapper around a [`DecoderLoader`].
pub struct BarcodeDetector {
    loader: Option<Box<dyn DecoderLoader>>,
    decoder: OnceCell<Option<Arc<dyn BarcodeDecoder>>>,
}

impl BarcodeDetector {
    pub fn new(loader: impl DecoderLoader + 'static) -> Self {
        Self {
            loader: Some(Box::new(loader)),
            decoder: OnceCell::new(),
        }
    }

    /// A detector that is already loaded.
    pub fn ready(decoder: Arc<dyn BarcodeDecoder>) -> Self {
        Self {
            loader: None,
            decoder: OnceCell::new_with(Some(Some(decoder))),
        }
    }

    /// A detector whose decoder is permanently unavailable.
    pub fn unavailable() -> Self {
        Self {
            loader: None,
            decoder: OnceCell::new_with(Some(None)),
        }
    }

    /// Process-wide QR detector.
    #[cfg(feature = "qr")]
    pub fn global() -> Arc<BarcodeDetector> {
        use std::sync::OnceLock;

        static GLOBAL: OnceLock<Arc<BarcodeDetector>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(BarcodeDetector::new(QrDecoderLoader)))
            .clone()
    }

    /// Load the decoder on first call; later calls return the cached outcome.
    pub async fn load(&self) -> Option<Arc<dyn BarcodeDecoder>> {
        self.decoder
            .get_or_init(|| async {
                let Some(loader) = &self.loader else {
                    return None;
                };
                debug!("Loading barcode decoder");
                match loader.load().await {
                    Ok(decoder) => {
                        info!("Barcode decoder ready");
                        Some(decoder)
                    }
                    Err(e) => {
                        warn!(error = %e, "Barcode decoder unavailable, capture will not require a barcode");
                        None
                    }
                }
            })
            .await
            .clone()
    }

    pub fn status(&self) -> DecoderStatus {
        match self.decoder.get() {
            None => DecoderStatus::NotLoaded,
            Some(Some(_)) => DecoderStatus::Ready,
            Some(None) => DecoderStatus::Unavailable,
        }
    }
}

impl std::fmt::Debug for BarcodeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarcodeDetector")
            .field("status", &self.status())
            .finish()
    }
}
