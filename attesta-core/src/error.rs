use thiserror::Error;

use crate::session::TransitionError;

/// Errors surfaced by a [`CaptureSession`](crate::CaptureSession) operation.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("Camera is not supported on this device")]
    DeviceUnsupported,

    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Barcode required but not detected")]
    BarcodeRequiredNotDetected,

    #[error("Upload failed: {0}")]
    UploadFailure(String),

    #[error("Snapshot failed: {0}")]
    SnapshotFailed(String),

    #[error("Maximum number of captures reached")]
    MaxCapturesReached,

    #[error("Capture field is read-only")]
    Disabled,

    #[error("File selection is not allowed for a camera-only field")]
    CameraOnly,

    #[error("No capture is pending review")]
    NothingToAccept,

    #[error("No capture at position {0}")]
    NoSuchCapture(usize),

    #[error("Session was stopped while {0}")]
    Interrupted(&'static str),

    #[error("Invalid transition: {0}")]
    InvalidTransition(TransitionError),
}

impl From<TransitionError> for CaptureError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::BarcodeRequiredNotDetected => Self::BarcodeRequiredNotDetected,
            TransitionError::NoRoom => Self::MaxCapturesReached,
            other => Self::InvalidTransition(other),
        }
    }
}

/// Errors opening or driving a camera device.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("No camera available on this device")]
    Unsupported,

    #[error("Torch is not supported by this camera")]
    TorchUnsupported,

    #[error("Camera device error: {0}")]
    Device(String),
}

impl From<CameraError> for CaptureError {
    fn from(err: CameraError) -> Self {
        match err {
            CameraError::PermissionDenied => Self::PermissionDenied,
            CameraError::Unsupported => Self::DeviceUnsupported,
            other => Self::Camera(other.to_string()),
        }
    }
}

/// Errors from the binary attachment store.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload failed: No attachment URL returned.")]
    MissingUrl,

    #[error("Attachment store rejected the upload ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Attachment transport error: {0}")]
    Transport(String),
}

/// Errors from the audit ledger client.
#[derive(Error, Debug)]
pub enum AuditClientError {
    #[error("Audit entry {0} not found")]
    NotFound(i64),

    #[error("Audit ledger rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Audit transport error: {0}")]
    Transport(String),
}

/// Errors loading a barcode decoder.
#[derive(Error, Debug, Clone)]
#[error("Barcode decoder unavailable: {0}")]
pub struct DecoderLoadError(pub String);

/// Errors acquiring a position fix.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeoError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Position unavailable: {0}")]
    Unavailable(String),

    #[error("Position request timed out")]
    Timeout,
}

/// Errors parsing or computing an image hash.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("Image hash must be 64 hex characters, got {0}")]
    InvalidLength(usize),

    #[error("Image hash is not valid hex: {0}")]
    InvalidHex(String),
}
