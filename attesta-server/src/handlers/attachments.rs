//! Development attachment store handlers

use attesta_core::StoredAttachment;
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::auth::Caller;
use crate::error::ApiError;
use crate::multipart::AttachmentUpload;
use crate::state::AppState;

/// Upload an attachment
///
/// Multipart form with a `file` part and an optional `filename` text part
/// overriding the part's own filename. Capture snapshots (`capture_*` images)
/// are audited automatically.
#[utoipa::path(
    post,
    path = "/api/attachments",
    tag = "Attachments",
    responses(
        (status = 201, description = "Attachment stored", body = StoredAttachment),
        (status = 400, description = "Invalid upload"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_token" = []))
)]
pub async fn upload_attachment_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredAttachment>), ApiError> {
    let upload = AttachmentUpload::from_multipart(&mut multipart, state.max_file_size).await?;
    let stored = state
        .attachments
        .create(upload.bytes, &upload.filename, &upload.mimetype, caller)
        .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Download an attachment's bytes
#[utoipa::path(
    get,
    path = "/api/attachments/{id}",
    tag = "Attachments",
    params(("id" = i64, Path, description = "Attachment ID")),
    responses(
        (status = 200, description = "Attachment bytes"),
        (status = 404, description = "Attachment not found")
    )
)]
pub async fn get_attachment_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let file = state
        .attachments
        .get(id)
        .ok_or_else(|| ApiError::not_found(format!("Attachment {id} not found")))?;

    Ok((
        [
            (header::CONTENT_TYPE, file.mimetype),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", file.filename),
            ),
        ],
        file.bytes,
    )
        .into_response())
}
