//! HTTP implementations of the attachment store and audit ledger capabilities.
//!
//! Reads retry transient failures (timeouts, connect errors, 429/502/503/504)
//! with exponential backoff. Writes create ledger rows and attachments, so they
//! are resent only when the server cannot have processed them: a refused
//! connection, 429 or 503.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::{AttachmentUploader, AuditClient, AuditListQuery, AuditReader, UploadFile};
use crate::audit::{AuditEntry, AuditPage, CreateAuditEntry};
use crate::error::{AuditClientError, UploadError};
use crate::model::StoredAttachment;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;
const INITIAL_INTERVAL: Duration = Duration::from_millis(200);
const MAX_INTERVAL: Duration = Duration::from_secs(2);

/// Connection settings for the capture server.
#[derive(Clone)]
pub struct HttpClientConfig {
    /// Server origin, e.g. `https://records.example.com`.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    pub timeout: Duration,
    /// Attempts after the first one. Zero disables retry.
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl HttpClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: MAX_RETRIES,
            initial_interval: INITIAL_INTERVAL,
            max_interval: MAX_INTERVAL,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl std::fmt::Debug for HttpClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Why a request ultimately failed.
#[derive(Debug)]
enum Failure {
    Transport(String),
    Status { status: StatusCode, message: String },
    Decode(String),
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) | Self::Decode(msg) => f.write_str(msg),
            Self::Status { status, message } => write!(f, "{status}: {message}"),
        }
    }
}

/// Which failures a request may be resent after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// GETs: every transient failure.
    Idempotent,
    /// POSTs: only failures that prove the request was never processed.
    Unprocessed,
}

/// Shared client with retry and bearer auth.
struct Transport {
    client: Client,
    config: HttpClientConfig,
}

impl Transport {
    fn new(config: HttpClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Send the request produced by `build`, rebuilding it on every attempt.
    async fn send<R, F>(
        &self,
        operation: &'static str,
        policy: RetryPolicy,
        build: F,
    ) -> Result<R, Failure>
    where
        R: DeserializeOwned,
        F: Fn(&Client) -> Result<RequestBuilder, Failure> + Send + Sync,
    {
        // Attempts are counted below; elapsed time is bounded by the client timeout.
        let backoff = ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: None,
            ..Default::default()
        };
        let attempts = AtomicU32::new(0);

        retry_notify(
            backoff,
            || {
                let build = &build;
                let attempts = &attempts;
                async move {
                    let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    match self.send_once::<R, _>(operation, policy, build).await {
                        Err(backoff::Error::Transient { err, .. })
                            if attempt > self.config.max_retries =>
                        {
                            warn!(operation, attempts = attempt, "Retries exhausted");
                            Err(backoff::Error::permanent(err))
                        }
                        other => other,
                    }
                }
            },
            |err: Failure, duration: Duration| {
                warn!(
                    operation,
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }

    async fn send_once<R, F>(
        &self,
        operation: &'static str,
        policy: RetryPolicy,
        build: &F,
    ) -> Result<R, backoff::Error<Failure>>
    where
        R: DeserializeOwned,
        F: Fn(&Client) -> Result<RequestBuilder, Failure>,
    {
        let start = Instant::now();
        let mut request = build(&self.client).map_err(backoff::Error::permanent)?;
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            if is_transient_error(&e, policy) {
                warn!(operation, error = %e, latency_ms, "Transient error, will retry");
                backoff::Error::transient(Failure::Transport(format!("{operation}: {e}")))
            } else {
                warn!(operation, error = %e, latency_ms, "Permanent error, aborting");
                backoff::Error::permanent(Failure::Transport(format!("{operation}: {e}")))
            }
        })?;

        let status = response.status();
        debug!(operation, status = %status, "Received HTTP response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let failure = Failure::Status {
                status,
                message: error_message(&body),
            };
            return if is_transient_status(status, policy) {
                Err(backoff::Error::transient(failure))
            } else {
                Err(backoff::Error::permanent(failure))
            };
        }

        let parsed = response.json::<R>().await.map_err(|e| {
            backoff::Error::permanent(Failure::Decode(format!(
                "{operation}: unexpected response body: {e}"
            )))
        })?;

        debug!(
            operation,
            latency_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
        Ok(parsed)
    }
}

/// Prefer the server's `{"error": ...}` message over the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_string())
}

/// A timed-out write may already be committed, so only a failed connect is
/// resent under [`RetryPolicy::Unprocessed`].
pub fn is_transient_error(error: &reqwest::Error, policy: RetryPolicy) -> bool {
    match policy {
        RetryPolicy::Idempotent => error.is_timeout() || error.is_connect() || error.is_request(),
        RetryPolicy::Unprocessed => error.is_connect(),
    }
}

/// A proxy's 502/504 says nothing about whether the upstream committed.
pub fn is_transient_status(status: StatusCode, policy: RetryPolicy) -> bool {
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => true,
        StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            policy == RetryPolicy::Idempotent
        }
        _ => false,
    }
}

/// Uploads captures as multipart `file` fields to `POST /api/attachments`.
pub struct HttpAttachmentUploader {
    transport: Transport,
}

impl HttpAttachmentUploader {
    pub fn new(config: HttpClientConfig) -> Result<Self, UploadError> {
        let transport =
            Transport::new(config).map_err(|e| UploadError::Transport(e.to_string()))?;
        Ok(Self { transport })
    }
}

#[async_trait]
impl AttachmentUploader for HttpAttachmentUploader {
    #[instrument(level = "debug", skip_all, fields(filename = file.filename, size = file.bytes.len()))]
    async fn upload(&self, file: UploadFile<'_>) -> Result<StoredAttachment, UploadError> {
        let url = self.transport.url("/api/attachments");
        let result = self
            .transport
            .send::<StoredAttachment, _>("upload attachment", RetryPolicy::Unprocessed, |client| {
                let part = Part::bytes(file.bytes.to_vec())
                    .file_name(file.filename.to_string())
                    .mime_str(file.mime_type)
                    .map_err(|e| Failure::Transport(e.to_string()))?;
                Ok(client.post(&url).multipart(Form::new().part("file", part)))
            })
            .await;

        match result {
            Ok(stored) if stored.url.is_empty() => Err(UploadError::MissingUrl),
            Ok(stored) => Ok(stored),
            Err(Failure::Decode(_)) => Err(UploadError::MissingUrl),
            Err(Failure::Status { status, message }) => Err(UploadError::Rejected {
                status: status.as_u16(),
                message,
            }),
            Err(Failure::Transport(msg)) => Err(UploadError::Transport(msg)),
        }
    }
}

/// JSON client for `/api/capture-audit`.
pub struct HttpAuditClient {
    transport: Transport,
}

impl HttpAuditClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, AuditClientError> {
        let transport =
            Transport::new(config).map_err(|e| AuditClientError::Transport(e.to_string()))?;
        Ok(Self { transport })
    }
}

fn audit_error(failure: Failure) -> AuditClientError {
    match failure {
        Failure::Status { status, message } => AuditClientError::Rejected {
            status: status.as_u16(),
            message,
        },
        Failure::Transport(msg) | Failure::Decode(msg) => AuditClientError::Transport(msg),
    }
}

#[async_trait]
impl AuditClient for HttpAuditClient {
    #[instrument(level = "debug", skip_all, fields(attachment_id = ?entry.attachment_id))]
    async fn create_entry(&self, entry: &CreateAuditEntry) -> Result<AuditEntry, AuditClientError> {
        let url = self.transport.url("/api/capture-audit");
        self.transport
            .send("create audit entry", RetryPolicy::Unprocessed, |client| {
                Ok(client.post(&url).json(entry))
            })
            .await
            .map_err(audit_error)
    }
}

#[async_trait]
impl AuditReader for HttpAuditClient {
    #[instrument(level = "debug", skip(self))]
    async fn get_entry(&self, id: i64) -> Result<AuditEntry, AuditClientError> {
        let url = self.transport.url(&format!("/api/capture-audit/{id}"));
        self.transport
            .send("get audit entry", RetryPolicy::Idempotent, |client| {
                Ok(client.get(&url))
            })
            .await
            .map_err(|failure| match failure {
                Failure::Status { status, .. } if status == StatusCode::NOT_FOUND => {
                    AuditClientError::NotFound(id)
                }
                other => audit_error(other),
            })
    }

    #[instrument(level = "debug", skip(self))]
    async fn list_entries(&self, query: &AuditListQuery) -> Result<AuditPage, AuditClientError> {
        let url = self.transport.url("/api/capture-audit");
        let pairs = query.to_pairs();
        self.transport
            .send("list audit entries", RetryPolicy::Idempotent, |client| {
                Ok(client.get(&url).query(&pairs))
            })
            .await
            .map_err(audit_error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn test_transient_status_codes() {
        use RetryPolicy::{Idempotent, Unprocessed};
        for policy in [Idempotent, Unprocessed] {
            assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS, policy));
            assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE, policy));
            assert!(!is_transient_status(StatusCode::FORBIDDEN, policy));
            assert!(!is_transient_status(StatusCode::INTERNAL_SERVER_ERROR, policy));
        }
        assert!(is_transient_status(StatusCode::GATEWAY_TIMEOUT, Idempotent));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY, Idempotent));
        assert!(!is_transient_status(StatusCode::GATEWAY_TIMEOUT, Unprocessed));
        assert!(!is_transient_status(StatusCode::BAD_GATEWAY, Unprocessed));
    }

    #[test]
    fn test_error_message_prefers_json_error() {
        assert_eq!(
            error_message(r#"{"error":"21 CFR Part 11 compliance violation: no","code":"COMPLIANCE_VIOLATION"}"#),
            "21 CFR Part 11 compliance violation: no"
        );
        assert_eq!(error_message("plain failure"), "plain failure");
    }

    #[test]
    fn test_config_trims_trailing_slash_and_redacts_token() {
        let config = HttpClientConfig::new("http://localhost:3000/").with_token("secret");
        assert_eq!(config.base_url, "http://localhost:3000");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("REDACTED"));
    }

    /// Answers every request with `status_line` and counts the requests.
    async fn fixed_status_server(status_line: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut request = Vec::new();
                let mut chunk = [0u8; 4096];
                while !request_complete(&request) {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&chunk[..n]),
                    }
                }
                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\n\
                     content-length: 2\r\nconnection: close\r\n\r\n{{}}"
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}"), hits)
    }

    fn request_complete(buf: &[u8]) -> bool {
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let length = String::from_utf8_lossy(&buf[..end])
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        buf.len() >= end + 4 + length
    }

    fn fast_config(base_url: &str, max_retries: u32) -> HttpClientConfig {
        let mut config = HttpClientConfig::new(base_url);
        config.timeout = Duration::from_secs(5);
        config.max_retries = max_retries;
        config.initial_interval = Duration::from_millis(10);
        config.max_interval = Duration::from_millis(20);
        config
    }

    #[tokio::test]
    async fn test_create_entry_is_not_resent_after_bad_gateway() {
        let (url, hits) = fixed_status_server("502 Bad Gateway").await;
        let client = HttpAuditClient::new(fast_config(&url, 2)).unwrap();

        let err = client
            .create_entry(&CreateAuditEntry::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuditClientError::Rejected { status: 502, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upload_is_not_resent_after_gateway_timeout() {
        let (url, hits) = fixed_status_server("504 Gateway Timeout").await;
        let uploader = HttpAttachmentUploader::new(fast_config(&url, 2)).unwrap();

        let err = uploader
            .upload(UploadFile {
                bytes: b"jpeg",
                filename: "capture_1_1.jpg",
                mime_type: "image/jpeg",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Rejected { status: 504, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_entry_is_resent_while_unavailable() {
        let (url, hits) = fixed_status_server("503 Service Unavailable").await;
        let client = HttpAuditClient::new(fast_config(&url, 2)).unwrap();

        let err = client
            .create_entry(&CreateAuditEntry::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuditClientError::Rejected { status: 503, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_reads_retry_exactly_max_retries_times() {
        let (url, hits) = fixed_status_server("502 Bad Gateway").await;
        let client = HttpAuditClient::new(fast_config(&url, 2)).unwrap();

        let err = client
            .list_entries(&AuditListQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuditClientError::Rejected { status: 502, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        let (url, hits) = fixed_status_server("503 Service Unavailable").await;
        let client = HttpAuditClient::new(fast_config(&url, 0)).unwrap();
        client.get_entry(1).await.unwrap_err();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let mut config = HttpClientConfig::new("http://127.0.0.1:9");
        config.timeout = Duration::from_millis(200);
        config.max_retries = 1;
        config.initial_interval = Duration::from_millis(10);
        config.max_interval = Duration::from_millis(20);

        let uploader = HttpAttachmentUploader::new(config).unwrap();
        let err = uploader
            .upload(UploadFile {
                bytes: b"x",
                filename: "capture_1_1.jpg",
                mime_type: "image/jpeg",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Transport(_)));
    }
}
