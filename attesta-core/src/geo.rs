//! Best-effort location tagging.
//!
//! A [`GeoTagger`] issues one high-accuracy request when it is spawned and
//! publishes the result whenever it arrives. Captures read the latest value
//! without waiting; an unresolved or failed lookup just leaves geo fields null.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::GeoError;

/// A resolved position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius of uncertainty, meters.
    pub accuracy: f64,
}

/// Location capability.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    async fn locate(&self, high_accuracy: bool) -> Result<GeoPosition, GeoError>;
}

/// Holds the outcome of a single background location request.
pub struct GeoTagger {
    latest: watch::Receiver<Option<GeoPosition>>,
    task: JoinHandle<()>,
}

impl GeoTagger {
    /// Start the lookup. Must be called from within a tokio runtime.
    pub fn spawn(provider: Arc<dyn GeoProvider>, timeout: Duration) -> Self {
        let (tx, latest) = watch::channel(None);
        let task = tokio::spawn(async move {
            match tokio::time::timeout(timeout, provider.locate(true)).await {
                Ok(Ok(position)) => {
                    info!(accuracy = position.accuracy, "Position resolved");
                    tx.send_replace(Some(position));
                }
                Ok(Err(e)) => debug!(error = %e, "Position unavailable"),
                Err(_) => debug!(timeout_ms = timeout.as_millis() as u64, "Position request timed out"),
            }
        });
        Self { latest, task }
    }

    /// The position if it has resolved, without waiting.
    pub fn latest(&self) -> Option<GeoPosition> {
        *self.latest.borrow()
    }
}

impl Drop for GeoTagger {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for GeoTagger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoTagger")
            .field("latest", &self.latest())
            .finish()
    }
}

/// Provider returning a fixed position.
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub GeoPosition);

#[async_trait]
impl GeoProvider for FixedPosition {
    async fn locate(&self, _high_accuracy: bool) -> Result<GeoPosition, GeoError> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow(Duration);

    #[async_trait]
    impl GeoProvider for Slow {
        async fn locate(&self, _high_accuracy: bool) -> Result<GeoPosition, GeoError> {
            tokio::time::sleep(self.0).await;
            Ok(position())
        }
    }

    struct Denied;

    #[async_trait]
    impl GeoProvider for Denied {
        async fn locate(&self, _high_accuracy: bool) -> Result<GeoPosition, GeoError> {
            Err(GeoError::PermissionDenied)
        }
    }

    fn position() -> GeoPosition {
        GeoPosition {
            latitude: 52.52,
            longitude: 13.405,
            accuracy: 8.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolved_reads_none_without_blocking() {
        let tagger = GeoTagger::spawn(Arc::new(Slow(Duration::from_secs(5))), Duration::from_secs(10));
        assert_eq!(tagger.latest(), None);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(tagger.latest(), Some(position()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_leaves_none() {
        let tagger = GeoTagger::spawn(Arc::new(Slow(Duration::from_secs(30))), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(tagger.latest(), None);
    }

    #[tokio::test]
    async fn test_failure_leaves_none() {
        let tagger = GeoTagger::spawn(Arc::new(Denied), Duration::from_secs(10));
        tokio::task::yield_now().await;
        assert_eq!(tagger.latest(), None);
    }

    #[tokio::test]
    async fn test_fixed_position_resolves() {
        let tagger = GeoTagger::spawn(Arc::new(FixedPosition(position())), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(tagger.latest(), Some(position()));
    }
}
