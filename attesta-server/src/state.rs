//! Shared state handed to every handler.

use std::sync::Arc;

use serde_json::json;

use crate::attachments::AttachmentStore;
use crate::auth::JwtVerifier;
use crate::config::Config;
use crate::events::EventBus;
use crate::field::CAPTURE_FIELD_TYPE;
use crate::host::{PluginContext, RecordStore};
use crate::ledger::{AuditStore, StoreError};
use crate::plugin::CapturePlugin;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Append-only audit ledger
    pub ledger: Arc<AuditStore>,
    /// Development attachment store
    pub attachments: Arc<AttachmentStore>,
    /// Owning records carrying capture fields
    pub records: Arc<RecordStore>,
    /// Host context the capture plugin was loaded into
    pub host: PluginContext,
    pub plugin: Arc<CapturePlugin>,
    /// Caller token verifier (None = auth disabled, dev mode)
    pub auth: Option<Arc<JwtVerifier>>,
    /// Per-upload size limit in bytes
    pub max_file_size: usize,
}

impl AppState {
    /// State with the in-memory ledger (tests and development).
    pub fn in_memory(config: &Config) -> Self {
        let events = Arc::new(EventBus::new());
        let ledger = Arc::new(AuditStore::in_memory(events.clone()));
        Self::assemble(config, events, ledger)
    }

    /// State for the binary: PostgreSQL ledger when `DATABASE_URL` is set.
    ///
    /// A configured database that cannot be reached is an error. Only an
    /// unset `DATABASE_URL` selects the in-memory ledger.
    pub async fn from_config(config: &Config) -> Result<Self, StoreError> {
        let events = Arc::new(EventBus::new());
        let ledger = match &config.database_url {
            Some(url) => {
                AuditStore::with_postgres(url, config.database_max_connections, events.clone())
                    .await?
            }
            None => AuditStore::in_memory(events.clone()),
        };

        let state = Self::assemble(config, events, Arc::new(ledger));
        if let Err(e) = state.plugin.install().await {
            tracing::warn!(error = %e, "Audit ledger health check failed during install");
        }
        Ok(state)
    }

    fn assemble(config: &Config, events: Arc<EventBus>, ledger: Arc<AuditStore>) -> Self {
        let host = PluginContext::new(events.clone());
        let plugin = Arc::new(CapturePlugin::new(
            ledger.clone(),
            config.default_max_captures,
        ));
        plugin.before_load(&host);
        plugin.load(&host);

        for (collection, field) in &config.capture_fields {
            if let Err(e) = host.define_field(collection, field, CAPTURE_FIELD_TYPE, &json!({})) {
                tracing::error!(collection, field, error = %e, "Capture field not defined");
            }
        }

        let auth = match &config.jwt_secret {
            Some(secret) => {
                tracing::info!("JWT authentication enabled");
                Some(Arc::new(JwtVerifier::new(secret)))
            }
            None => {
                tracing::warn!("JWT authentication DISABLED (AUTH_JWT_SECRET not set)");
                None
            }
        };

        Self {
            ledger,
            attachments: Arc::new(AttachmentStore::new(events.clone())),
            records: Arc::new(RecordStore::new(events)),
            host,
            plugin,
            auth,
            max_file_size: config.max_file_size(),
        }
    }
}
