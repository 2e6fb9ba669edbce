//! HTTP surface for docsum.
//!
//! This module exposes a compact Axum router over the pipeline:
//!
//! - `POST /files` – Register a file already written to disk. Accepts `path` plus optional
//!   `filename`, `declared_media_type` and `upload_id`; returns the `PENDING` record.
//! - `POST /files/:id/process` – Run detection, extraction and summarization for a file and
//!   return the committed summary.
//! - `GET /files/:id` – Fetch a file and its lifecycle status.
//! - `GET /files/:id/summary` – Fetch the summary of a `PROCESSED` file.
//! - `GET /uploads/:id/files` – List the files registered under one upload.
//! - `GET /metrics` – Observe pipeline counters.
//!
//! Pipeline errors map onto status codes: unknown ids are `404`, paths outside the storage
//! root are `403`, unsupported or undecodable files are `422`, missing model configuration is
//! `500` and failed model calls are `502`.

use crate::metrics::MetricsSnapshot;
use crate::processing::{FileRegistration, PipelineApi, PipelineError};
use crate::store::{StoredFile, SummaryRecord};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;

/// Build the HTTP router exposing the pipeline.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: PipelineApi + 'static,
{
    Router::new()
        .route("/files", post(register_file::<S>))
        .route("/files/:id", get(get_file::<S>))
        .route("/files/:id/process", post(process_file::<S>))
        .route("/files/:id/summary", get(get_summary::<S>))
        .route("/uploads/:id/files", get(list_upload_files::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(service)
}

/// Register a stored file as `PENDING`.
async fn register_file<S>(
    State(service): State<Arc<S>>,
    Json(registration): Json<FileRegistration>,
) -> Result<(StatusCode, Json<StoredFile>), AppError>
where
    S: PipelineApi,
{
    let file = service.register_file(registration).await?;
    Ok((StatusCode::CREATED, Json(file)))
}

async fn get_file<S>(
    State(service): State<Arc<S>>,
    Path(file_id): Path<String>,
) -> Result<Json<StoredFile>, AppError>
where
    S: PipelineApi,
{
    Ok(Json(service.get_file(&file_id)?))
}

/// Run the unit of work for a registered file.
///
/// The request blocks until the summary is committed or the pipeline fails; on failure the
/// file stays `PENDING` and may be retried with the same call.
async fn process_file<S>(
    State(service): State<Arc<S>>,
    Path(file_id): Path<String>,
) -> Result<Json<SummaryRecord>, AppError>
where
    S: PipelineApi,
{
    let record = service.process_stored(&file_id).await?;
    tracing::info!(
        file_id = %file_id,
        summary_id = %record.id,
        chunks = record.key_points.chunks.len(),
        "Process request completed"
    );
    Ok(Json(record))
}

async fn get_summary<S>(
    State(service): State<Arc<S>>,
    Path(file_id): Path<String>,
) -> Result<Json<SummaryRecord>, AppError>
where
    S: PipelineApi,
{
    Ok(Json(service.get_summary_by_file(&file_id)?))
}

/// Response body for `GET /uploads/:id/files`.
#[derive(Serialize)]
struct UploadFilesResponse {
    upload_id: String,
    files: Vec<StoredFile>,
}

async fn list_upload_files<S>(
    State(service): State<Arc<S>>,
    Path(upload_id): Path<String>,
) -> Json<UploadFilesResponse>
where
    S: PipelineApi,
{
    let files = service.list_files_by_upload(&upload_id);
    Json(UploadFilesResponse { upload_id, files })
}

/// Return the pipeline counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: PipelineApi,
{
    Json(service.metrics_snapshot())
}

struct AppError(PipelineError);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0 {
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::OutsideStorageRoot(_) => StatusCode::FORBIDDEN,
            PipelineError::UnsupportedType(_) | PipelineError::Extraction(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PipelineError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::ExternalCall { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), self.0.to_string()).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self(inner)
    }
}
