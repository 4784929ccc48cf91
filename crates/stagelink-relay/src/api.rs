//! REST API handlers

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use stagelink_core::{validate_upload, ServerEvent, MAX_UPLOAD_BYTES};
use std::sync::Arc;
use tracing::{info, warn};

use crate::presign::PresignError;
use crate::state::AppState;
use crate::store::StoreError;

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

/// Health probe
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// List the model catalog
pub async fn list_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let models = state.store.list(&state.config.public_url()).await;
    Json(models)
}

/// Multipart upload: a "model" file part plus optional "author"/"folder"
pub async fn upload_model(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut file: Option<(String, Bytes)> = None;
    let mut author: Option<String> = None;
    let mut folder: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiError::new(format!("Malformed multipart body: {}", e))),
                )
                    .into_response();
            }
        };

        let part_name = field.name().map(str::to_string);
        match part_name.as_deref() {
            Some("model") => {
                let name = match field.file_name().map(str::to_string) {
                    Some(name) => name,
                    None => {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(ApiError::new("Missing file name")),
                        )
                            .into_response();
                    }
                };
                match field.bytes().await {
                    Ok(bytes) => file = Some((name, bytes)),
                    Err(e) => {
                        return (
                            StatusCode::PAYLOAD_TOO_LARGE,
                            Json(ApiError::new(format!("Failed to read file: {}", e))),
                        )
                            .into_response();
                    }
                }
            }
            Some("author") => {
                author = field.text().await.ok().filter(|s| !s.is_empty());
            }
            Some("folder") => {
                folder = field.text().await.ok().filter(|s| !s.is_empty());
            }
            _ => {}
        }
    }

    let (name, bytes) = match file {
        Some(f) => f,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiError::new("Missing \"model\" file part")),
            )
                .into_response();
        }
    };

    let existing = state.store.names().await;
    if let Err(e) = validate_upload(&name, bytes.len() as u64, &existing) {
        return (StatusCode::BAD_REQUEST, Json(ApiError::new(e.to_string()))).into_response();
    }

    if let Err(e) = store_and_register(&state, &name, &bytes, author.clone(), folder).await {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(format!("Failed to store model: {}", e))),
        )
            .into_response();
    }

    let url = format!("{}/models/{}", state.config.public_url(), name);
    state.broadcast(
        None,
        ServerEvent::ModelUploaded {
            file_name: name.clone(),
            model_url: url.clone(),
            author,
        },
    );

    info!(model = %name, "Model uploaded via REST");
    Json(serde_json::json!({ "url": url })).into_response()
}

async fn store_and_register(
    state: &Arc<AppState>,
    name: &str,
    bytes: &[u8],
    author: Option<String>,
    folder: Option<String>,
) -> Result<(), StoreError> {
    state.store.save(name, bytes).await?;
    state.store.register(name, author, folder).await
}

/// Delete a model by name
pub async fn delete_model(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.store.remove(&name).await {
        Ok(()) => Json(serde_json::json!({
            "status": "deleted",
            "name": name,
        }))
        .into_response(),
        Err(StoreError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(ApiError::new("Model not found")),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(format!("Failed to delete model: {}", e))),
        )
            .into_response(),
    }
}

/// Resolve a model name to its playable URL
pub async fn resolve_model(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.store.resolve(&name, &state.config.public_url()).await {
        Ok(url) => Json(serde_json::json!({ "url": url })).into_response(),
        Err(StoreError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(ApiError::new("Model not found")),
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(e.to_string())),
        )
            .into_response(),
    }
}

/// PUT target of the presigned upload handshake
pub async fn presigned_put(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    let file_name = match state.presigner.verify(&token) {
        Ok(name) => name,
        Err(PresignError::Expired) => {
            return (
                StatusCode::GONE,
                Json(ApiError::new("Upload URL expired")),
            )
                .into_response();
        }
        Err(e) => {
            warn!(error = %e, "Rejected presigned upload");
            return (
                StatusCode::FORBIDDEN,
                Json(ApiError::new("Invalid upload URL")),
            )
                .into_response();
        }
    };

    if body.len() as u64 > MAX_UPLOAD_BYTES {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(ApiError::new("File too large! Max size: 25MB")),
        )
            .into_response();
    }

    if let Err(e) = state.store.save(&file_name, &body).await {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(format!("Failed to store model: {}", e))),
        )
            .into_response();
    }

    info!(model = %file_name, size = body.len(), "Presigned upload stored");
    Json(serde_json::json!({ "status": "stored", "name": file_name })).into_response()
}
