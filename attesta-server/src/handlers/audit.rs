//! Capture audit handlers
//!
//! Create, list and get entries. Update and delete are always refused.

use attesta_core::{AuditEntry, AuditPage, CreateAuditEntry, ListMeta};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::auth::Caller;
use crate::compliance::{DELETE_REFUSED, UPDATE_REFUSED};
use crate::error::ApiError;
use crate::ledger::{AuditQuery, NewAuditEntry};
use crate::state::AppState;

/// Record a capture audit entry
///
/// `serverTimestamp` is assigned by the server when absent; the caller's
/// identity fills `capturedById` / `capturedByName` when absent.
#[utoipa::path(
    post,
    path = "/api/capture-audit",
    tag = "Audit",
    request_body = CreateAuditEntry,
    responses(
        (status = 201, description = "Entry recorded", body = AuditEntry),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_token" = []))
)]
pub async fn create_audit_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(values): Json<CreateAuditEntry>,
) -> Result<(StatusCode, Json<AuditEntry>), ApiError> {
    let entry = NewAuditEntry::from_request(values, caller.as_ref());
    let created = state.ledger.insert(entry).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List capture audit entries
///
/// Newest first unless `sort` says otherwise.
#[utoipa::path(
    get,
    path = "/api/capture-audit",
    tag = "Audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "One page of entries", body = AuditPage),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_token" = []))
)]
pub async fn list_audit_handler(
    State(state): State<AppState>,
    _caller: Caller,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditPage>, ApiError> {
    let (data, count) = state.ledger.find_and_count(&query).await?;
    Ok(Json(AuditPage {
        data,
        meta: ListMeta::new(count, query.page(), query.page_size()),
    }))
}

#[utoipa::path(
    get,
    path = "/api/capture-audit/{id}",
    tag = "Audit",
    params(("id" = i64, Path, description = "Audit entry ID")),
    responses(
        (status = 200, description = "Audit entry", body = AuditEntry),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Entry not found")
    ),
    security(("bearer_token" = []))
)]
pub async fn get_audit_handler(
    State(state): State<AppState>,
    _caller: Caller,
    Path(id): Path<i64>,
) -> Result<Json<AuditEntry>, ApiError> {
    state
        .ledger
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Audit entry {id} not found")))
}

/// Audit entries are immutable
#[utoipa::path(
    put,
    path = "/api/capture-audit/{id}",
    tag = "Audit",
    params(("id" = i64, Path, description = "Audit entry ID")),
    responses((status = 403, description = "Compliance violation"))
)]
pub async fn update_audit_handler(Path(id): Path<i64>) -> ApiError {
    tracing::warn!(id, "Update of audit entry refused");
    ApiError::compliance_violation(UPDATE_REFUSED)
}

/// Audit entries cannot be deleted
#[utoipa::path(
    delete,
    path = "/api/capture-audit/{id}",
    tag = "Audit",
    params(("id" = i64, Path, description = "Audit entry ID")),
    responses((status = 403, description = "Compliance violation"))
)]
pub async fn destroy_audit_handler(Path(id): Path<i64>) -> ApiError {
    tracing::warn!(id, "Delete of audit entry refused");
    ApiError::compliance_violation(DELETE_REFUSED)
}
