//! Capture states and the pure transition function.
//!
//! [`transition`] holds every rule of the capture lifecycle. It performs no side
//! effects; [`CaptureSession`](super::CaptureSession) applies them and then
//! commits the state returned here.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Why a session is in the error state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum ErrorReason {
    PermissionDenied,
    DeviceUnsupported,
    Device(String),
    UploadFailure(String),
}

impl ErrorReason {
    /// Camera errors are recovered by starting again.
    pub fn is_camera_error(&self) -> bool {
        !matches!(self, Self::UploadFailure(_))
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionDenied => f.write_str("camera permission denied"),
            Self::DeviceUnsupported => f.write_str("camera not supported"),
            Self::Device(msg) => write!(f, "camera error: {msg}"),
            Self::UploadFailure(msg) => write!(f, "upload failed: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason")]
pub enum CaptureState {
    Idle,
    RequestingAccess,
    Streaming,
    Scanning,
    Reviewing,
    Uploading,
    Error(ErrorReason),
    /// The maximum number of captures has been committed.
    Exhausted,
}

impl CaptureState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::RequestingAccess => "RequestingAccess",
            Self::Streaming => "Streaming",
            Self::Scanning => "Scanning",
            Self::Reviewing => "Reviewing",
            Self::Uploading => "Uploading",
            Self::Error(_) => "Error",
            Self::Exhausted => "Exhausted",
        }
    }

    /// A live stream is shown.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Streaming | Self::Scanning)
    }

    /// A reviewed capture is waiting for accept or retake.
    pub fn has_review(&self) -> bool {
        matches!(self, Self::Reviewing | Self::Error(ErrorReason::UploadFailure(_)))
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(reason) => write!(f, "Error({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Where the view returns after a review ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// No stream is held.
    Idle,
    Streaming,
    /// Barcode still required and not yet detected.
    Scanning,
}

impl Resume {
    fn state(self) -> CaptureState {
        match self {
            Self::Idle => CaptureState::Idle,
            Self::Streaming => CaptureState::Streaming,
            Self::Scanning => CaptureState::Scanning,
        }
    }
}

/// Inputs to the state machine. Guards are computed by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Start { has_room: bool },
    AccessGranted { scan: bool },
    AccessDenied(ErrorReason),
    BarcodeDetected,
    /// `gate_open` is false when a barcode is required, none was detected and
    /// the decoder is available.
    Trigger { gate_open: bool },
    FileSelected { has_room: bool },
    Retake { resume: Resume },
    Accept { gate_open: bool },
    UploadSucceeded { exhausted: bool, resume: Resume },
    UploadFailed(String),
    CaptureRemoved,
    Stop,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::AccessGranted { .. } => "granted",
            Self::AccessDenied(_) => "denied",
            Self::BarcodeDetected => "barcode",
            Self::Trigger { .. } => "trigger",
            Self::FileSelected { .. } => "file",
            Self::Retake { .. } => "retake",
            Self::Accept { .. } => "accept",
            Self::UploadSucceeded { .. } => "upload success",
            Self::UploadFailed(_) => "upload failure",
            Self::CaptureRemoved => "remove",
            Self::Stop => "stop",
        }
    }
}

/// A refused transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {event} while {from}")]
    Invalid { from: String, event: &'static str },

    #[error("barcode required but not detected")]
    BarcodeRequiredNotDetected,

    #[error("no room for another capture")]
    NoRoom,
}

/// Compute the next state for `event`, or refuse it.
pub fn transition(
    state: &CaptureState,
    event: &SessionEvent,
) -> Result<CaptureState, TransitionError> {
    use CaptureState as S;
    use SessionEvent as E;

    let next = match (state, event) {
        (_, E::Stop) => S::Idle,

        (S::Idle, E::Start { has_room: false }) => return Err(TransitionError::NoRoom),
        (S::Idle, E::Start { has_room: true }) => S::RequestingAccess,
        (S::Error(reason), E::Start { has_room: true }) if reason.is_camera_error() => {
            S::RequestingAccess
        }

        (S::RequestingAccess, E::AccessGranted { scan: true }) => S::Scanning,
        (S::RequestingAccess, E::AccessGranted { scan: false }) => S::Streaming,
        (S::RequestingAccess, E::AccessDenied(reason)) => S::Error(reason.clone()),

        (S::Scanning, E::BarcodeDetected) => S::Streaming,

        (S::Streaming | S::Scanning, E::Trigger { gate_open: false }) => {
            return Err(TransitionError::BarcodeRequiredNotDetected)
        }
        (S::Streaming | S::Scanning, E::Trigger { gate_open: true }) => S::Reviewing,

        (S::Idle | S::Streaming | S::Scanning, E::FileSelected { has_room: false }) => {
            return Err(TransitionError::NoRoom)
        }
        (S::Idle | S::Streaming | S::Scanning, E::FileSelected { has_room: true }) => {
            S::Reviewing
        }

        (s, E::Retake { resume }) if s.has_review() => resume.state(),

        (s, E::Accept { gate_open: false }) if s.has_review() => {
            return Err(TransitionError::BarcodeRequiredNotDetected)
        }
        (s, E::Accept { gate_open: true }) if s.has_review() => S::Uploading,

        (S::Uploading, E::UploadSucceeded { exhausted: true, .. }) => S::Exhausted,
        (S::Uploading, E::UploadSucceeded { resume, .. }) => resume.state(),
        (S::Uploading, E::UploadFailed(msg)) => S::Error(ErrorReason::UploadFailure(msg.clone())),

        (S::Exhausted, E::CaptureRemoved) => S::Idle,
        (s, E::CaptureRemoved) if *s != S::Uploading => s.clone(),

        (from, event) => {
            return Err(TransitionError::Invalid {
                from: from.to_string(),
                event: event.name(),
            })
        }
    };
    Ok(next)
}
