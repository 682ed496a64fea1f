//! Attesta Core - regulated image capture engine
//!
//! This crate drives a single capture field from camera to audit ledger:
//! a live stream with optional barcode gating, a snapshot under review, and on
//! accept an upload followed by a write-once audit entry carrying the SHA-256
//! of the exact bytes stored.
//!
//! # Features
//!
//! - `network` (default): HTTP clients for the attachment store and audit ledger
//! - `qr` (default): QR code decoding for the barcode gate
//! - `openapi`: `utoipa` schemas on the wire types
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use attesta_core::mock::{test_frame, MockCamera, RecordingAuditClient, RecordingUploader};
//! use attesta_core::{CaptureFieldConfig, CaptureSession, UploadCoordinator};
//!
//! # async fn example() -> Result<(), attesta_core::CaptureError> {
//! let coordinator = UploadCoordinator::new(
//!     Arc::new(RecordingUploader::default()),
//!     Arc::new(RecordingAuditClient::default()),
//! );
//! let camera = Arc::new(MockCamera::new(test_frame(640, 480, 128)));
//! let session = CaptureSession::builder(CaptureFieldConfig::default(), camera, coordinator).build();
//!
//! session.start().await?;
//! let meta = session.trigger()?;
//! println!("captured #{} sha256={}", meta.capture_index, meta.image_hash);
//! session.accept().await?;
//! session.stop();
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod barcode;
pub mod camera;
pub mod config;
pub mod error;
pub mod geo;
pub mod hashing;
pub mod identity;
pub mod mock;
pub mod model;
pub mod session;
pub mod upload;
pub mod validation;

// Re-export main types for convenience
pub use audit::{
    AuditAction, AuditEntry, AuditPage, CreateAuditEntry, ListMeta, COMPLIANCE_VIOLATION_PREFIX,
    IMMUTABLE_FIELDS,
};
pub use barcode::{BarcodeDecoder, BarcodeDetector, DecoderLoader, DecoderStatus};
pub use camera::{CameraProvider, CameraStream, FacingMode, Frame, StreamConstraints};
pub use config::{CaptureFieldConfig, SessionOptions};
pub use error::{
    AuditClientError, CameraError, CaptureError, DecoderLoadError, GeoError, HashError,
    UploadError,
};
pub use geo::{GeoPosition, GeoProvider, GeoTagger};
pub use hashing::ImageHash;
pub use identity::{CurrentUser, CurrentUserProvider, StaticUser};
pub use model::{CaptureMetadata, CaptureRecord, PendingCapture, StoredAttachment};
pub use session::{CaptureSession, CaptureSessionBuilder, CaptureState, SessionSnapshot};
pub use upload::{
    AcceptOutcome, AttachmentUploader, AuditClient, AuditListQuery, AuditOutcome, AuditReader,
    UploadCoordinator,
};
pub use validation::{FieldValidator, ValidationError};

#[cfg(feature = "network")]
pub use upload::{HttpAttachmentUploader, HttpAuditClient, HttpClientConfig};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mock::{test_frame, MockCamera, RecordingAuditClient, RecordingUploader};

    /// Integration test: capture, accept, then validate the stored field value.
    #[tokio::test]
    async fn test_full_capture_workflow() {
        // Step 1: Session with an in-memory store and ledger
        let uploader = Arc::new(RecordingUploader::default());
        let ledger = Arc::new(RecordingAuditClient::default());
        let camera = Arc::new(MockCamera::new(test_frame(64, 48, 200)));
        let config = CaptureFieldConfig {
            max_captures: 2,
            ..CaptureFieldConfig::default()
        };
        let session = CaptureSession::builder(
            config.clone(),
            camera.clone(),
            UploadCoordinator::new(uploader.clone(), ledger.clone()),
        )
        .user(Arc::new(StaticUser::new(42, "operator")))
        .build();

        // Step 2: Capture twice until the field is full
        session.start().await.expect("camera should open");
        for _ in 0..2 {
            session.trigger().expect("trigger should succeed");
            session.accept().await.expect("accept should succeed");
        }
        assert_eq!(session.state(), CaptureState::Exhausted);
        assert_eq!(camera.active_streams(), 0);

        // Step 3: Every ledger entry hashes the bytes that were stored
        let uploads = uploader.uploads();
        let entries = ledger.entries();
        assert_eq!(entries.len(), 2);
        for (upload, entry) in uploads.iter().zip(&entries) {
            let hash = ImageHash::parse(entry.image_hash.as_deref().unwrap()).unwrap();
            assert!(hash.verify(&upload.bytes));
            assert_eq!(entry.captured_by_id, Some(42));
            assert_eq!(entry.action, Some(AuditAction::Capture));
        }

        // Step 4: The field value passes validation
        let value = serde_json::to_value(session.captures()).unwrap();
        let validator = FieldValidator::new("photos", config.max_captures);
        assert!(validator.validate(Some(&value)).is_ok());
    }
}
