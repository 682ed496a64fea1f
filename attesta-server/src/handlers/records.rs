//! Owning-record handlers
//!
//! Records are free-form JSON objects. Capture fields defined on a
//! collection are validated on every create and update.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{Map, Value};

use crate::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/records/{collection}",
    tag = "Records",
    params(("collection" = String, Path, description = "Collection name")),
    responses(
        (status = 201, description = "Record created"),
        (status = 400, description = "Body is not a JSON object"),
        (status = 422, description = "Capture field invalid")
    ),
    security(("bearer_token" = []))
)]
pub async fn create_record_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(collection): Path<String>,
    Json(values): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let record = state.records.create(&collection, values, caller).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[utoipa::path(
    get,
    path = "/api/records/{collection}/{id}",
    tag = "Records",
    params(
        ("collection" = String, Path, description = "Collection name"),
        ("id" = i64, Path, description = "Record ID")
    ),
    responses(
        (status = 200, description = "Record"),
        (status = 404, description = "Record not found")
    ),
    security(("bearer_token" = []))
)]
pub async fn get_record_handler(
    State(state): State<AppState>,
    _caller: Caller,
    Path((collection, id)): Path<(String, i64)>,
) -> Result<Json<Value>, ApiError> {
    state
        .records
        .get(&collection, id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("{collection} record {id} not found")))
}

#[utoipa::path(
    patch,
    path = "/api/records/{collection}/{id}",
    tag = "Records",
    params(
        ("collection" = String, Path, description = "Collection name"),
        ("id" = i64, Path, description = "Record ID")
    ),
    responses(
        (status = 200, description = "Record saved"),
        (status = 404, description = "Record not found"),
        (status = 422, description = "Capture field invalid")
    ),
    security(("bearer_token" = []))
)]
pub async fn update_record_handler(
    State(state): State<AppState>,
    _caller: Caller,
    Path((collection, id)): Path<(String, i64)>,
    Json(changes): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    state
        .records
        .save(&collection, id, changes)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("{collection} record {id} not found")))
}
