//! Capture command implementation.
//!
//! Drives a capture session over still images: each file is shown on a
//! [`StillCamera`], optionally scanned for a barcode, snapshotted, uploaded and
//! recorded in the audit ledger.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use attesta_core::{
    AcceptOutcome, AuditOutcome, CaptureFieldConfig, CaptureMetadata, CaptureSession,
    CaptureState, CurrentUser, GeoPosition, HttpAttachmentUploader, HttpAuditClient,
    SessionOptions, StaticUser, UploadCoordinator,
};
use attesta_core::config::DEFAULT_MAX_CAPTURES;
use attesta_core::geo::FixedPosition;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tracing::{info, warn};

use crate::camera::{load_frame, StillCamera};
use crate::utils::{http_config, short_hash};
use crate::{OutputFormat, ServerArgs};

#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Images to capture, in order
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub server: ServerArgs,

    /// Maximum captures for the field (1-20)
    #[arg(long, default_value_t = DEFAULT_MAX_CAPTURES)]
    pub max: u32,

    /// Refuse a capture until a QR code is read from the image
    #[arg(long)]
    pub require_barcode: bool,

    /// Seconds to scan each image for a barcode
    #[arg(long, default_value_t = 5)]
    pub scan_timeout: u64,

    /// Latitude recorded with every capture
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude recorded with every capture
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Position accuracy in meters
    #[arg(long, default_value_t = 10.0)]
    pub accuracy: f64,

    /// Id of the capturing user
    #[arg(long, env = "ATTESTA_USER_ID")]
    pub user_id: Option<i64>,

    /// Display name of the capturing user
    #[arg(long, env = "ATTESTA_USER_NAME", requires = "user_id")]
    pub user_name: Option<String>,

    /// Upload only and leave the audit entry to the server fallback
    #[arg(long)]
    pub no_audit: bool,

    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// One accepted capture, as reported to the caller.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptureReport {
    file: String,
    capture_index: u32,
    image_hash: String,
    barcode: Option<String>,
    attachment_id: Option<i64>,
    url: Option<String>,
    audit_entry_id: Option<i64>,
    audit_error: Option<String>,
}

impl CaptureReport {
    fn new(file: &std::path::Path, meta: CaptureMetadata, outcome: AcceptOutcome) -> Self {
        let (audit_entry_id, audit_error) = match outcome.audit {
            AuditOutcome::Recorded(entry) => (Some(entry.id), None),
            AuditOutcome::Failed(message) => (None, Some(message)),
            AuditOutcome::Skipped => (None, None),
        };
        Self {
            file: file.display().to_string(),
            capture_index: meta.capture_index,
            image_hash: meta.image_hash,
            barcode: meta.barcode,
            attachment_id: outcome.record.id,
            url: outcome.record.url,
            audit_entry_id,
            audit_error,
        }
    }
}

fn build_session(args: &CaptureArgs, camera: Arc<StillCamera>) -> Result<CaptureSession> {
    let client = http_config(&args.server);
    let uploader = Arc::new(HttpAttachmentUploader::new(client.clone())?);
    let coordinator = if args.no_audit {
        UploadCoordinator::without_audit(uploader)
    } else {
        UploadCoordinator::new(uploader, Arc::new(HttpAuditClient::new(client)?))
    };

    let position = args.lat.zip(args.lon).map(|(latitude, longitude)| GeoPosition {
        latitude,
        longitude,
        accuracy: args.accuracy,
    });
    let config = CaptureFieldConfig {
        camera_only: true,
        require_barcode: args.require_barcode,
        max_captures: args.max,
        enable_geolocation: position.is_some(),
    };
    let options = SessionOptions {
        device_info: format!(
            "attesta-cli/{} ({}; {})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        ),
        ..SessionOptions::default()
    };

    let mut builder = CaptureSession::builder(config, camera, coordinator).options(options);
    if let Some(id) = args.user_id {
        builder = builder.user(Arc::new(StaticUser(Some(CurrentUser {
            id,
            nickname: args.user_name.clone(),
            username: None,
        }))));
    }
    if let Some(position) = position {
        builder = builder.geo(Arc::new(FixedPosition(position)));
    }
    Ok(builder.build())
}

/// Wait until the session leaves `Scanning`, i.e. a barcode was read.
async fn wait_for_barcode(session: &CaptureSession, timeout: Duration) {
    let mut updates = session.subscribe();
    let scanned = tokio::time::timeout(
        timeout,
        updates.wait_for(|s| s.state != CaptureState::Scanning),
    )
    .await;
    if scanned.is_err() {
        warn!(timeout_secs = timeout.as_secs(), "No barcode detected");
    }
}

/// Execute the capture command.
pub async fn execute(args: CaptureArgs, quiet: bool) -> Result<()> {
    // Decode everything first so a bad file fails before anything is uploaded.
    let frames = args
        .files
        .iter()
        .map(|path| load_frame(path))
        .collect::<Result<Vec<_>>>()?;

    let camera = Arc::new(StillCamera::default());
    let session = build_session(&args, camera.clone())?;
    let scan_timeout = Duration::from_secs(args.scan_timeout);

    let mut frames = args.files.iter().zip(frames).peekable();
    if let Some((_, first)) = frames.peek() {
        camera.show(first.clone());
    }
    session.start().await.context("Failed to start capture session")?;

    let mut reports = Vec::new();
    while let Some((path, _)) = frames.next() {
        if session.state() == CaptureState::Scanning {
            wait_for_barcode(&session, scan_timeout).await;
        }
        let meta = session
            .trigger()
            .with_context(|| format!("Capture failed for {}", path.display()))?;

        // The snapshot is taken; put the next image in front of the scanner.
        if let Some((_, next)) = frames.peek() {
            camera.show(next.clone());
        }

        let outcome = session
            .accept()
            .await
            .with_context(|| format!("Capture failed for {}", path.display()))?;
        let report = CaptureReport::new(path, meta, outcome);
        if args.format == OutputFormat::Text && !quiet {
            print_report(&report);
        }
        reports.push(report);

        if session.state() == CaptureState::Exhausted {
            break;
        }
    }

    let skipped = frames.count();
    session.stop();
    info!(captured = reports.len(), skipped, "Capture run finished");

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text if !quiet => {
            println!();
            println!(
                "{} {} capture(s) recorded",
                "Done:".green().bold(),
                reports.len()
            );
            if skipped > 0 {
                println!(
                    "{} {} file(s) skipped, the field is full",
                    "Warning:".yellow().bold(),
                    skipped
                );
            }
        }
        OutputFormat::Text => {}
    }
    Ok(())
}

fn print_report(report: &CaptureReport) {
    println!(
        "{} #{} {}",
        "✓".green().bold(),
        report.capture_index,
        report.file
    );
    println!(
        "   {} {}",
        "SHA-256:".dimmed(),
        short_hash(&report.image_hash)
    );
    if let Some(barcode) = &report.barcode {
        println!("   {} {}", "Barcode:".dimmed(), barcode);
    }
    if let Some(url) = &report.url {
        println!("   {} {}", "Stored:".dimmed(), url);
    }
    match (&report.audit_entry_id, &report.audit_error) {
        (Some(id), _) => println!("   {} #{}", "Audit entry:".dimmed(), id),
        (None, Some(error)) => println!(
            "   {} {} (server fallback applies)",
            "Audit entry not recorded:".yellow(),
            error
        ),
        (None, None) => println!("   {} server fallback", "Audit entry:".dimmed()),
    }
}
