//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3.0 specification for the Attesta capture audit API.

use attesta_core::{AuditAction, AuditEntry, AuditPage, CreateAuditEntry, ListMeta, StoredAttachment};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers::{HealthResponse, ReadyResponse};

/// Declares the `bearer_token` scheme referenced by the handlers.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Attesta capture audit API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attesta - Capture Audit API",
        version = "0.1.0",
        description = r#"
## Append-only audit trail for regulated image capture

Every accepted capture is recorded with its SHA-256 image hash, the capturing
user, client and server timestamps, and optional location and barcode.

- Entries are **write-once**: update and delete requests are refused with
  `403 COMPLIANCE_VIOLATION`, and the storage layer refuses them as well.
- Uploading a `capture_*` image to the attachment store records a
  `CAPTURE_AUTO` entry even if the client never calls the ledger.
"#,
        license(
            name = "MIT OR Apache-2.0",
            url = "https://github.com/attesta-capture/attesta/blob/main/LICENSE"
        )
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "Audit", description = "Append-only capture audit ledger"),
        (name = "Attachments", description = "Development attachment store"),
        (name = "Records", description = "Owning records with capture fields"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::audit::create_audit_handler,
        crate::handlers::audit::list_audit_handler,
        crate::handlers::audit::get_audit_handler,
        crate::handlers::audit::update_audit_handler,
        crate::handlers::audit::destroy_audit_handler,
        crate::handlers::attachments::upload_attachment_handler,
        crate::handlers::attachments::get_attachment_handler,
        crate::handlers::records::create_record_handler,
        crate::handlers::records::get_record_handler,
        crate::handlers::records::update_record_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            AuditAction,
            AuditEntry,
            AuditPage,
            CreateAuditEntry,
            ListMeta,
            StoredAttachment,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;
