//! Attesta Server Library - append-only capture audit ledger
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod attachments;
pub mod auth;
pub mod auto_audit;
pub mod compliance;
pub mod config;
pub mod error;
pub mod events;
pub mod field;
pub mod handlers;
pub mod host;
pub mod ledger;
pub mod multipart;
pub mod openapi;
pub mod plugin;
pub mod routes;
pub mod state;
pub mod validation;

pub use attachments::AttachmentStore;
pub use auth::{Caller, JwtVerifier};
pub use auto_audit::AutoAudit;
pub use compliance::ComplianceGate;
pub use config::Config;
pub use error::ApiError;
pub use events::{EventBus, EventKind, HookError, PersistenceEvent, Subscriber};
pub use field::CaptureFieldType;
pub use host::{FieldType, FieldTypeRegistry, PluginContext, RecordStore};
pub use ledger::{AuditQuery, AuditSort, AuditStore, NewAuditEntry, StoreError, AUDIT_COLLECTION};
pub use openapi::ApiDoc;
pub use plugin::CapturePlugin;
pub use routes::{create_router, create_router_with_config, create_router_with_state};
pub use state::AppState;
