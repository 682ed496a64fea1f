//! In-memory capability implementations for tests and demos.
//! WARNING: Do not use in production - nothing here touches real hardware or storage!

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::audit::{AuditAction, AuditEntry, CreateAuditEntry};
use crate::barcode::BarcodeDecoder;
use crate::camera::{CameraProvider, CameraStream, Frame, StreamConstraints};
use crate::error::{AuditClientError, CameraError, UploadError};
use crate::model::StoredAttachment;
use crate::upload::{AttachmentUploader, AuditClient, UploadFile};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Solid grey test frame.
pub fn test_frame(width: u32, height: u32, level: u8) -> Frame {
    Frame::solid(width, height, level)
}

#[derive(Debug, Clone)]
enum OpenOutcome {
    Grant,
    Fail(CameraError),
}

/// Camera that serves frames from memory and counts open handles.
pub struct MockCamera {
    outcome: Mutex<OpenOutcome>,
    frames: Arc<Mutex<Vec<Frame>>>,
    torch_supported: bool,
    opened: AtomicUsize,
    active: Arc<AtomicUsize>,
    constraints: Mutex<Vec<StreamConstraints>>,
}

impl MockCamera {
    /// Camera that grants access and always shows `frame`.
    pub fn new(frame: Frame) -> Self {
        Self::with_outcome(OpenOutcome::Grant, vec![frame])
    }

    pub fn denied() -> Self {
        Self::with_outcome(OpenOutcome::Fail(CameraError::PermissionDenied), Vec::new())
    }

    pub fn unsupported() -> Self {
        Self::with_outcome(OpenOutcome::Fail(CameraError::Unsupported), Vec::new())
    }

    fn with_outcome(outcome: OpenOutcome, frames: Vec<Frame>) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            frames: Arc::new(Mutex::new(frames)),
            torch_supported: true,
            opened: AtomicUsize::new(0),
            active: Arc::new(AtomicUsize::new(0)),
            constraints: Mutex::new(Vec::new()),
        }
    }

    pub fn without_torch(mut self) -> Self {
        self.torch_supported = false;
        self
    }

    /// Grant access on subsequent opens.
    pub fn grant(&self, frame: Frame) {
        *lock(&self.outcome) = OpenOutcome::Grant;
        *lock(&self.frames) = vec![frame];
    }

    /// Replace the frame shown by every open stream.
    pub fn show(&self, frame: Frame) {
        *lock(&self.frames) = vec![frame];
    }

    /// Total successful opens.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Streams opened and not yet released.
    pub fn active_streams(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn requested_constraints(&self) -> Vec<StreamConstraints> {
        lock(&self.constraints).clone()
    }
}

#[async_trait]
impl CameraProvider for MockCamera {
    async fn open(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn CameraStream>, CameraError> {
        lock(&self.constraints).push(*constraints);
        let outcome = lock(&self.outcome).clone();
        match outcome {
            OpenOutcome::Fail(e) => Err(e),
            OpenOutcome::Grant => {
                self.opened.fetch_add(1, Ordering::SeqCst);
                self.active.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(MockStream {
                    frames: self.frames.clone(),
                    torch_supported: self.torch_supported,
                    active: self.active.clone(),
                    released: false,
                }))
            }
        }
    }
}

struct MockStream {
    frames: Arc<Mutex<Vec<Frame>>>,
    torch_supported: bool,
    active: Arc<AtomicUsize>,
    released: bool,
}

impl CameraStream for MockStream {
    fn current_frame(&mut self) -> Option<Frame> {
        if self.released {
            return None;
        }
        lock(&self.frames).first().cloned()
    }

    fn set_torch(&mut self, _on: bool) -> Result<(), CameraError> {
        if self.torch_supported {
            Ok(())
        } else {
            Err(CameraError::TorchUnsupported)
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Decoder that reports a code after a number of sampled frames.
pub struct ScriptedDecoder {
    code: Option<String>,
    after: usize,
    calls: AtomicUsize,
}

impl ScriptedDecoder {
    /// Never decodes anything.
    pub fn never() -> Self {
        Self {
            code: None,
            after: 0,
            calls: AtomicUsize::new(0),
        }
    }

    /// Decodes `code` on the `after`-th sample (1-based) and every one after.
    pub fn after(after: usize, code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            after,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BarcodeDecoder for ScriptedDecoder {
    fn decode(&self, _frame: &Frame) -> Option<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= self.after {
            self.code.clone()
        } else {
            None
        }
    }
}

/// An upload seen by [`RecordingUploader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
}

/// Attachment store that keeps uploads in memory.
pub struct RecordingUploader {
    uploads: Mutex<Vec<RecordedUpload>>,
    next_id: AtomicI64,
    failures_left: AtomicUsize,
    failure: String,
    omit_url: bool,
    delay: Option<Duration>,
}

impl Default for RecordingUploader {
    fn default() -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            failures_left: AtomicUsize::new(0),
            failure: String::new(),
            omit_url: false,
            delay: None,
        }
    }
}

impl RecordingUploader {
    /// Fails every upload.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::failing_times(usize::MAX, message)
    }

    /// Fails the next `times` uploads, then succeeds.
    pub fn failing_times(times: usize, message: impl Into<String>) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
            failure: message.into(),
            ..Default::default()
        }
    }

    /// Succeeds but returns an empty URL.
    pub fn without_url() -> Self {
        Self {
            omit_url: true,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        lock(&self.uploads).clone()
    }
}

#[async_trait]
impl AttachmentUploader for RecordingUploader {
    async fn upload(&self, file: UploadFile<'_>) -> Result<StoredAttachment, UploadError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(UploadError::Transport(self.failure.clone()));
        }

        lock(&self.uploads).push(RecordedUpload {
            bytes: file.bytes.to_vec(),
            filename: file.filename.to_string(),
            mime_type: file.mime_type.to_string(),
        });
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(StoredAttachment {
            id,
            url: if self.omit_url {
                String::new()
            } else {
                format!("/api/attachments/{id}")
            },
            filename: Some(file.filename.to_string()),
            title: file.filename.strip_suffix(".jpg").map(String::from),
        })
    }
}

/// Audit ledger client that keeps entries in memory.
pub struct RecordingAuditClient {
    entries: Mutex<Vec<CreateAuditEntry>>,
    next_id: AtomicI64,
    fail: AtomicBool,
}

impl Default for RecordingAuditClient {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            fail: AtomicBool::new(false),
        }
    }
}

impl RecordingAuditClient {
    pub fn failing() -> Self {
        let client = Self::default();
        client.fail.store(true, Ordering::SeqCst);
        client
    }

    pub fn entries(&self) -> Vec<CreateAuditEntry> {
        lock(&self.entries).clone()
    }
}

#[async_trait]
impl AuditClient for RecordingAuditClient {
    async fn create_entry(&self, entry: &CreateAuditEntry) -> Result<AuditEntry, AuditClientError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AuditClientError::Rejected {
                status: 500,
                message: "ledger unavailable".into(),
            });
        }
        lock(&self.entries).push(entry.clone());
        let now = Utc::now();
        Ok(AuditEntry {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            attachment_id: entry.attachment_id,
            captured_at: entry.captured_at.clone(),
            server_timestamp: entry.server_timestamp.clone().unwrap_or_else(|| now.to_rfc3339()),
            captured_by_id: entry.captured_by_id,
            captured_by_name: entry.captured_by_name.clone(),
            latitude: entry.latitude,
            longitude: entry.longitude,
            accuracy: entry.accuracy,
            barcode: entry.barcode.clone(),
            device_info: entry.device_info.clone(),
            capture_index: entry.capture_index,
            image_hash: entry.image_hash.clone(),
            action: entry.action.unwrap_or(AuditAction::Capture),
            metadata: entry.metadata.clone().unwrap_or_else(|| json!({})),
            created_at: now,
        })
    }
}
