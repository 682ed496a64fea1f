//! The capture session: camera lifecycle, barcode scanning, snapshot, review
//! and accept.
//!
//! All commands take `&self`; state lives behind a mutex that is never held
//! across an await point. Every state change goes through [`transition`] and is
//! then published to subscribers as a [`SessionSnapshot`].
//!
//! The session owns at most one camera stream. It is released on [`stop`],
//! when the last capture slot is filled, and when the session is dropped.
//!
//! [`stop`]: CaptureSession::stop

mod state;

pub use state::{transition, CaptureState, ErrorReason, Resume, SessionEvent, TransitionError};

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use image::ImageFormat;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::barcode::{BarcodeDecoder, BarcodeDetector, DecoderStatus};
use crate::camera::{CameraProvider, CameraStream, FacingMode, Frame};
use crate::config::{CaptureFieldConfig, SessionOptions};
use crate::error::{CameraError, CaptureError};
use crate::geo::{GeoProvider, GeoTagger};
use crate::hashing::ImageHash;
use crate::identity::{CurrentUserProvider, StaticUser, UNKNOWN_USER_NAME};
use crate::model::{
    capture_filename, CaptureMetadata, CaptureRecord, PendingCapture, CAPTURE_MIME_TYPE,
};
use crate::upload::{AcceptOutcome, AuditOutcome, UploadCoordinator};

/// Observe-only view of a session, published after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: CaptureState,
    pub captures: Vec<CaptureRecord>,
    pub max_captures: usize,
    /// Metadata of the capture under review.
    pub pending: Option<CaptureMetadata>,
    pub barcode: Option<String>,
    pub barcode_required: bool,
    pub decoder: DecoderStatus,
    pub scanning: bool,
    pub facing: FacingMode,
    pub torch: bool,
    pub last_error: Option<String>,
    pub can_trigger: bool,
    pub can_accept: bool,
    pub disabled: bool,
}

impl SessionSnapshot {
    /// Capture slots still free.
    pub fn remaining(&self) -> usize {
        self.max_captures.saturating_sub(self.captures.len())
    }
}

struct Inner {
    state: CaptureState,
    stream: Option<Box<dyn CameraStream>>,
    decoder: Option<Arc<dyn BarcodeDecoder>>,
    decoder_status: DecoderStatus,
    facing: FacingMode,
    torch: bool,
    barcode: Option<String>,
    pending: Option<PendingCapture>,
    captures: Vec<CaptureRecord>,
    /// Highest captureIndex committed so far.
    last_index: u32,
    /// captureIndex of every upload not yet finished, including ones that
    /// outlived a stop.
    in_flight: BTreeSet<u32>,
    /// The upload that owns the `Uploading` state, if any.
    uploading: Option<u32>,
    scan_task: Option<JoinHandle<()>>,
    scan_generation: u64,
    access_attempt: u64,
    last_error: Option<String>,
}

impl Inner {
    fn apply(&mut self, event: SessionEvent) -> Result<(), TransitionError> {
        let next = transition(&self.state, &event)?;
        debug!(from = %self.state, to = %next, event = event.name(), "Capture state transition");
        self.state = next;
        Ok(())
    }

    fn has_room(&self, max: usize) -> bool {
        self.captures.len() + self.in_flight.len() < max
    }

    fn next_index(&self) -> u32 {
        let in_flight = self.in_flight.last().copied().unwrap_or(0);
        self.last_index.max(in_flight) + 1
    }

    /// A barcode must still be scanned before the next capture.
    fn barcode_outstanding(&self, required: bool) -> bool {
        required && self.barcode.is_none() && self.decoder.is_some()
    }

    fn resume(&self, required: bool) -> Resume {
        if self.stream.is_none() {
            Resume::Idle
        } else if self.barcode_outstanding(required) {
            Resume::Scanning
        } else {
            Resume::Streaming
        }
    }

    fn accept_gate_open(&self, required: bool) -> bool {
        let barcode_missing = self
            .pending
            .as_ref()
            .is_some_and(|p| p.meta.barcode.is_none());
        !(required && barcode_missing && self.decoder.is_some())
    }

    fn cancel_scan(&mut self) {
        self.scan_generation += 1;
        if let Some(task) = self.scan_task.take() {
            task.abort();
        }
    }

    fn release_stream(&mut self) {
        self.cancel_scan();
        if let Some(mut stream) = self.stream.take() {
            stream.release();
            info!("Camera released");
        }
        self.torch = false;
    }
}

struct Shared {
    inner: Mutex<Inner>,
    view: watch::Sender<SessionSnapshot>,
    config: CaptureFieldConfig,
    max: usize,
    disabled: bool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self, inner: &Inner) -> SessionSnapshot {
        let required = self.config.require_barcode;
        SessionSnapshot {
            state: inner.state.clone(),
            captures: inner.captures.clone(),
            max_captures: self.max,
            pending: inner.pending.as_ref().map(|p| p.meta.clone()),
            barcode: inner.barcode.clone(),
            barcode_required: required,
            decoder: inner.decoder_status,
            scanning: inner.scan_task.is_some(),
            facing: inner.facing,
            torch: inner.torch,
            last_error: inner.last_error.clone(),
            can_trigger: !self.disabled
                && inner.state.is_live()
                && !inner.barcode_outstanding(required),
            can_accept: !self.disabled
                && inner.state.has_review()
                && inner.accept_gate_open(required),
            disabled: self.disabled,
        }
    }

    fn publish(&self, inner: &Inner) {
        self.view.send_replace(self.snapshot(inner));
    }
}

/// A capture session for one capture field.
pub struct CaptureSession {
    shared: Arc<Shared>,
    camera: Arc<dyn CameraProvider>,
    detector: Arc<BarcodeDetector>,
    coordinator: UploadCoordinator,
    user: Arc<dyn CurrentUserProvider>,
    options: SessionOptions,
    geo: Option<GeoTagger>,
}

impl CaptureSession {
    pub fn builder(
        config: CaptureFieldConfig,
        camera: Arc<dyn CameraProvider>,
        coordinator: UploadCoordinator,
    ) -> CaptureSessionBuilder {
        CaptureSessionBuilder {
            config,
            camera,
            coordinator,
            user: None,
            geo: None,
            detector: None,
            captures: Vec::new(),
            options: SessionOptions::default(),
        }
    }

    /// Receive a snapshot after every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.view.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.view.borrow().clone()
    }

    pub fn state(&self) -> CaptureState {
        self.shared.lock().state.clone()
    }

    /// Committed captures, in insertion order.
    pub fn captures(&self) -> Vec<CaptureRecord> {
        self.shared.lock().captures.clone()
    }

    fn ensure_enabled(&self) -> Result<(), CaptureError> {
        if self.shared.disabled {
            Err(CaptureError::Disabled)
        } else {
            Ok(())
        }
    }

    /// Open the camera and start streaming, scanning for a barcode when one is
    /// required. Refused while a stream is already held.
    pub async fn start(&self) -> Result<(), CaptureError> {
        self.ensure_enabled()?;
        let (facing, attempt) = {
            let mut inner = self.shared.lock();
            let has_room = inner.has_room(self.shared.max);
            inner.apply(SessionEvent::Start { has_room })?;
            inner.access_attempt += 1;
            inner.barcode = None;
            inner.last_error = None;
            self.shared.publish(&inner);
            (inner.facing, inner.access_attempt)
        };

        let required = self.shared.config.require_barcode;
        let constraints = self.options.constraints(facing);
        let (decoder, opened) = tokio::join!(
            async {
                if required {
                    self.detector.load().await
                } else {
                    None
                }
            },
            self.camera.open(&constraints)
        );

        let mut inner = self.shared.lock();
        if inner.access_attempt != attempt || inner.state != CaptureState::RequestingAccess {
            if let Ok(mut stream) = opened {
                stream.release();
            }
            return Err(CaptureError::Interrupted("requesting camera access"));
        }

        inner.decoder = decoder;
        inner.decoder_status = self.detector.status();

        match opened {
            Ok(stream) => {
                inner.stream = Some(stream);
                let scan = inner.barcode_outstanding(required);
                inner.apply(SessionEvent::AccessGranted { scan })?;
                if scan {
                    self.spawn_scan(&mut inner);
                }
                info!(?facing, scanning = scan, "Camera stream started");
                self.shared.publish(&inner);
                Ok(())
            }
            Err(e) => {
                let reason = match &e {
                    CameraError::PermissionDenied => ErrorReason::PermissionDenied,
                    CameraError::Unsupported => ErrorReason::DeviceUnsupported,
                    other => ErrorReason::Device(other.to_string()),
                };
                inner.apply(SessionEvent::AccessDenied(reason))?;
                inner.last_error = Some(e.to_string());
                warn!(error = %e, "Camera access failed");
                self.shared.publish(&inner);
                Err(e.into())
            }
        }
    }

    /// Snapshot the current frame and enter review.
    ///
    /// Refused with [`CaptureError::BarcodeRequiredNotDetected`] while a required
    /// barcode is outstanding. If the decoder could not be loaded the capture is
    /// allowed without one.
    pub fn trigger(&self) -> Result<CaptureMetadata, CaptureError> {
        self.ensure_enabled()?;
        let mut inner = self.shared.lock();
        let gate_open = !inner.barcode_outstanding(self.shared.config.require_barcode);
        let next = transition(&inner.state, &SessionEvent::Trigger { gate_open })?;

        let encoded = inner
            .stream
            .as_mut()
            .and_then(|stream| stream.current_frame())
            .ok_or_else(|| CaptureError::SnapshotFailed("no frame available".into()))
            .and_then(|frame| {
                frame
                    .to_jpeg(self.options.jpeg_quality)
                    .map_err(|e| CaptureError::SnapshotFailed(e.to_string()))
            });
        let bytes = match encoded {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Snapshot failed");
                inner.last_error = Some(e.to_string());
                self.shared.publish(&inner);
                return Err(e);
            }
        };

        let index = inner.next_index();
        let barcode = inner.barcode.clone();
        let pending = self.pending_capture(bytes, index, barcode);
        let meta = pending.meta.clone();

        inner.cancel_scan();
        inner.pending = Some(pending);
        inner.state = next;
        inner.last_error = None;
        info!(capture_index = index, image_hash = %meta.image_hash, "Capture taken");
        self.shared.publish(&inner);
        Ok(meta)
    }

    /// Review an existing JPEG instead of a camera frame.
    ///
    /// Only for fields that are not camera-only. When a barcode is required the
    /// image itself is scanned for one.
    pub async fn select_file(&self, bytes: Vec<u8>) -> Result<CaptureMetadata, CaptureError> {
        self.ensure_enabled()?;
        if self.shared.config.camera_only {
            return Err(CaptureError::CameraOnly);
        }
        if image::guess_format(&bytes).ok() != Some(ImageFormat::Jpeg) {
            return Err(CaptureError::SnapshotFailed(
                "selected file is not a JPEG image".into(),
            ));
        }

        let decoder = if self.shared.config.require_barcode {
            self.detector.load().await
        } else {
            None
        };
        let found = decoder
            .as_ref()
            .and_then(|d| decode_still(&bytes).and_then(|frame| d.decode(&frame)));

        let mut inner = self.shared.lock();
        let has_room = inner.has_room(self.shared.max);
        inner.apply(SessionEvent::FileSelected { has_room })?;
        if decoder.is_some() {
            inner.decoder = decoder;
            inner.decoder_status = self.detector.status();
        }
        inner.cancel_scan();
        if found.is_some() {
            inner.barcode = found;
        }

        let index = inner.next_index();
        let barcode = inner.barcode.clone();
        let pending = self.pending_capture(bytes, index, barcode);
        let meta = pending.meta.clone();
        inner.pending = Some(pending);
        inner.last_error = None;
        info!(capture_index = index, "File selected for review");
        self.shared.publish(&inner);
        Ok(meta)
    }

    fn pending_capture(&self, bytes: Vec<u8>, index: u32, barcode: Option<String>) -> PendingCapture {
        let now = Utc::now();
        let user = self.user.current_user();
        let position = self.geo.as_ref().and_then(GeoTagger::latest);

        let meta = CaptureMetadata {
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            user_id: user.as_ref().map_or(0, |u| u.id),
            user_name: user
                .as_ref()
                .map_or(UNKNOWN_USER_NAME, |u| u.display_name())
                .to_string(),
            latitude: position.map(|p| p.latitude),
            longitude: position.map(|p| p.longitude),
            accuracy: position.map(|p| p.accuracy),
            barcode,
            device_info: self.options.device_info.clone(),
            capture_index: index,
            image_hash: ImageHash::from_bytes(&bytes).to_string(),
        };

        PendingCapture {
            filename: capture_filename(now.timestamp_millis(), index),
            mime_type: CAPTURE_MIME_TYPE,
            bytes,
            meta,
        }
    }

    /// Discard the capture under review and return to the live view.
    pub fn retake(&self) -> Result<(), CaptureError> {
        self.ensure_enabled()?;
        let required = self.shared.config.require_barcode;
        let mut inner = self.shared.lock();

        let barcode = inner.barcode.take();
        let resume = inner.resume(required);
        if let Err(e) = inner.apply(SessionEvent::Retake { resume }) {
            inner.barcode = barcode;
            return Err(e.into());
        }
        inner.pending = None;
        inner.last_error = None;
        if resume == Resume::Scanning {
            self.spawn_scan(&mut inner);
        }
        debug!("Capture discarded");
        self.shared.publish(&inner);
        Ok(())
    }

    /// Upload the reviewed capture, then record its audit entry.
    ///
    /// On upload failure the capture stays under review so the caller may retry
    /// or retake. An audit failure does not fail the accept.
    pub async fn accept(&self) -> Result<AcceptOutcome, CaptureError> {
        self.ensure_enabled()?;
        let required = self.shared.config.require_barcode;
        let pending = {
            let mut inner = self.shared.lock();
            let Some(pending) = inner.pending.clone() else {
                return Err(CaptureError::NothingToAccept);
            };
            let gate_open = inner.accept_gate_open(required);
            inner.apply(SessionEvent::Accept { gate_open })?;
            inner.in_flight.insert(pending.meta.capture_index);
            inner.uploading = Some(pending.meta.capture_index);
            inner.last_error = None;
            self.shared.publish(&inner);
            pending
        };

        let result = self.coordinator.accept(&pending).await;

        let index = pending.meta.capture_index;
        let mut inner = self.shared.lock();
        inner.in_flight.remove(&index);
        // A stop while this upload ran hands the state to whatever came next.
        let owns_state =
            inner.state == CaptureState::Uploading && inner.uploading == Some(index);
        if owns_state {
            inner.uploading = None;
        }
        match result {
            Ok(outcome) => {
                inner.captures.push(outcome.record.clone());
                inner.last_index = inner.last_index.max(index);

                if owns_state {
                    inner.barcode = None;
                    inner.pending = None;
                    let exhausted = !inner.has_room(self.shared.max);
                    if exhausted {
                        inner.release_stream();
                    }
                    let resume = inner.resume(required);
                    inner.apply(SessionEvent::UploadSucceeded { exhausted, resume })?;
                    if resume == Resume::Scanning && !exhausted {
                        self.spawn_scan(&mut inner);
                    }
                }

                inner.last_error = match &outcome.audit {
                    AuditOutcome::Failed(msg) => Some(format!("Audit entry not recorded: {msg}")),
                    _ => None,
                };
                info!(
                    capture_index = pending.meta.capture_index,
                    committed = inner.captures.len(),
                    audit_recorded = outcome.audit_recorded(),
                    "Capture accepted"
                );
                self.shared.publish(&inner);
                Ok(outcome)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, capture_index = pending.meta.capture_index, "Upload failed");
                if owns_state {
                    inner.apply(SessionEvent::UploadFailed(message.clone()))?;
                    inner.last_error = Some(message.clone());
                }
                self.shared.publish(&inner);
                Err(CaptureError::UploadFailure(message))
            }
        }
    }

    /// Remove a committed capture from the field. Its ledger entry is kept and
    /// its captureIndex is never reissued.
    pub fn remove_capture(&self, position: usize) -> Result<CaptureRecord, CaptureError> {
        self.ensure_enabled()?;
        let mut inner = self.shared.lock();
        if position >= inner.captures.len() {
            return Err(CaptureError::NoSuchCapture(position));
        }
        inner.apply(SessionEvent::CaptureRemoved)?;
        let removed = inner.captures.remove(position);
        info!(position, "Capture removed from field, audit entry retained");
        self.shared.publish(&inner);
        Ok(removed)
    }

    /// Release the camera and return to `Idle`. Safe to call in any state.
    pub fn stop(&self) {
        let mut inner = self.shared.lock();
        inner.release_stream();
        inner.access_attempt += 1;
        inner.pending = None;
        inner.barcode = None;
        // Stop is accepted from every state.
        let _ = inner.apply(SessionEvent::Stop);
        self.shared.publish(&inner);
    }

    /// Flip between front and back cameras, restarting a live stream.
    pub async fn switch_facing(&self) -> Result<FacingMode, CaptureError> {
        self.ensure_enabled()?;
        let (facing, restart) = {
            let mut inner = self.shared.lock();
            let restart = inner.state.is_live();
            if !restart && !matches!(inner.state, CaptureState::Idle | CaptureState::Error(_)) {
                return Err(CaptureError::InvalidTransition(TransitionError::Invalid {
                    from: inner.state.to_string(),
                    event: "switch camera",
                }));
            }
            inner.facing = inner.facing.toggled();
            if restart {
                inner.release_stream();
                inner.access_attempt += 1;
                inner.apply(SessionEvent::Stop)?;
            }
            self.shared.publish(&inner);
            (inner.facing, restart)
        };

        if restart {
            self.start().await?;
        }
        Ok(facing)
    }

    /// Toggle the torch on the active stream. If the device refuses, the flag
    /// is left unchanged. Returns the resulting flag.
    pub fn toggle_torch(&self) -> bool {
        let mut inner = self.shared.lock();
        if self.shared.disabled {
            return inner.torch;
        }
        let wanted = !inner.torch;
        let applied = inner
            .stream
            .as_mut()
            .map(|stream| stream.set_torch(wanted));
        match applied {
            Some(Ok(())) => {
                inner.torch = wanted;
                self.shared.publish(&inner);
            }
            Some(Err(e)) => debug!(error = %e, "Torch not applied"),
            None => debug!("Torch ignored without an active stream"),
        }
        inner.torch
    }

    fn spawn_scan(&self, inner: &mut Inner) {
        inner.cancel_scan();
        let Some(decoder) = inner.decoder.clone() else {
            return;
        };
        let generation = inner.scan_generation;
        inner.scan_task = Some(tokio::spawn(scan_loop(
            Arc::downgrade(&self.shared),
            decoder,
            generation,
            self.options.scan_interval,
        )));
        debug!(generation, "Barcode scan started");
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.shared.lock().release_stream();
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("state", &self.state())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

/// Sample the stream every `period` until a code is decoded or the scan is
/// cancelled. A result is only applied if `generation` is still current.
async fn scan_loop(
    shared: Weak<Shared>,
    decoder: Arc<dyn BarcodeDecoder>,
    generation: u64,
    period: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };

        let frame = {
            let mut inner = shared.lock();
            if inner.scan_generation != generation {
                return;
            }
            inner.stream.as_mut().and_then(|stream| stream.current_frame())
        };
        let Some(code) = frame.and_then(|frame| decoder.decode(&frame)) else {
            continue;
        };

        let mut inner = shared.lock();
        if inner.scan_generation != generation
            || inner.apply(SessionEvent::BarcodeDetected).is_err()
        {
            return;
        }
        info!(barcode = %code, "Barcode detected");
        inner.barcode = Some(code);
        inner.scan_generation += 1;
        inner.scan_task = None;
        shared.publish(&inner);
        return;
    }
}

fn decode_still(bytes: &[u8]) -> Option<Frame> {
    let rgb = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .ok()?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    Frame::from_rgb(width, height, rgb.into_raw())
}

/// Builder for [`CaptureSession`].
pub struct CaptureSessionBuilder {
    config: CaptureFieldConfig,
    camera: Arc<dyn CameraProvider>,
    coordinator: UploadCoordinator,
    user: Option<Arc<dyn CurrentUserProvider>>,
    geo: Option<Arc<dyn GeoProvider>>,
    detector: Option<Arc<BarcodeDetector>>,
    captures: Vec<CaptureRecord>,
    options: SessionOptions,
}

impl CaptureSessionBuilder {
    pub fn user(mut self, user: Arc<dyn CurrentUserProvider>) -> Self {
        self.user = Some(user);
        self
    }

    /// Location source. Ignored when the field disables geolocation.
    pub fn geo(mut self, provider: Arc<dyn GeoProvider>) -> Self {
        self.geo = Some(provider);
        self
    }

    pub fn detector(mut self, detector: Arc<BarcodeDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Captures already stored on the owning record.
    pub fn captures(mut self, captures: Vec<CaptureRecord>) -> Self {
        self.captures = captures;
        self
    }

    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the session and issue the geolocation request.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> CaptureSession {
        let max = self.config.effective_max();
        let detector = self.detector.unwrap_or_else(default_detector);
        let last_index = self
            .captures
            .iter()
            .filter_map(|c| c.meta.as_ref().map(|m| m.capture_index))
            .max()
            .unwrap_or(0);
        let state = if self.captures.len() >= max {
            CaptureState::Exhausted
        } else {
            CaptureState::Idle
        };

        let geo = match self.geo {
            Some(provider) if self.config.enable_geolocation && !self.options.disabled => {
                Some(GeoTagger::spawn(provider, self.options.geolocation_timeout))
            }
            _ => None,
        };

        let inner = Inner {
            state,
            stream: None,
            decoder: None,
            decoder_status: detector.status(),
            facing: self.options.facing,
            torch: false,
            barcode: None,
            pending: None,
            captures: self.captures,
            last_index,
            in_flight: BTreeSet::new(),
            uploading: None,
            scan_task: None,
            scan_generation: 0,
            access_attempt: 0,
            last_error: None,
        };

        let (view, _) = watch::channel(SessionSnapshot {
            state: CaptureState::Idle,
            captures: Vec::new(),
            max_captures: max,
            pending: None,
            barcode: None,
            barcode_required: self.config.require_barcode,
            decoder: DecoderStatus::NotLoaded,
            scanning: false,
            facing: self.options.facing,
            torch: false,
            last_error: None,
            can_trigger: false,
            can_accept: false,
            disabled: self.options.disabled,
        });
        let shared = Arc::new(Shared {
            inner: Mutex::new(inner),
            view,
            disabled: self.options.disabled,
            config: self.config,
            max,
        });
        shared.publish(&shared.lock());

        CaptureSession {
            shared,
            camera: self.camera,
            detector,
            coordinator: self.coordinator,
            user: self
                .user
                .unwrap_or_else(|| Arc::new(StaticUser::anonymous())),
            options: self.options,
            geo,
        }
    }
}

#[cfg(feature = "qr")]
fn default_detector() -> Arc<BarcodeDetector> {
    BarcodeDetector::global()
}

#[cfg(not(feature = "qr"))]
fn default_detector() -> Arc<BarcodeDetector> {
    Arc::new(BarcodeDetector::unavailable())
}
