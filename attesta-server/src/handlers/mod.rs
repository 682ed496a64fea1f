//! Axum handlers, one module per resource.

pub mod attachments;
pub mod audit;
pub mod health;
pub mod records;

pub use attachments::{get_attachment_handler, upload_attachment_handler};
pub use audit::{
    create_audit_handler, destroy_audit_handler, get_audit_handler, list_audit_handler,
    update_audit_handler,
};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use records::{create_record_handler, get_record_handler, update_record_handler};
