use crate::{
    inference::InferenceError,
    model_service::ModelService,
    server::SharedState,
    upload::{extract_upload, UploadError},
};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

const PROCESSING_ERROR: &str = "An error occurred processing the file: ";

#[derive(Error, Debug)]
pub enum PredictError {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("failed to store upload: {0}")]
    Storage(std::io::Error),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        // internal error details stay in the logs
        let (status, body) = match &self {
            PredictError::Upload(UploadError::Multipart(e)) => {
                (e.status(), "The upload could not be read.".to_string())
            }
            PredictError::Upload(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            PredictError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{}the upload could not be stored.", PROCESSING_ERROR),
            ),
            PredictError::Inference(e) if e.is_unreadable_input() => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{}the upload is not a readable image.", PROCESSING_ERROR),
            ),
            PredictError::Inference(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{}the classifier could not process the image.", PROCESSING_ERROR),
            ),
        };
        (status, body).into_response()
    }
}

#[instrument(skip_all)]
pub async fn predict<M: ModelService>(
    State(state): State<SharedState<M>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<&'static str, PredictError> {
    let upload = extract_upload(multipart).await.inspect_err(|e| {
        tracing::warn!("Rejected upload: {}", e);
        state.metrics.record_rejection(e.reason());
    })?;

    let scratch_file = state.scratch.persist(&upload).await.map_err(|e| {
        tracing::error!("Failed to store upload {:?}: {}", upload.filename, e);
        state.metrics.record_failure("storage");
        PredictError::Storage(e)
    })?;
    let scratch_path = scratch_file.path().to_path_buf();

    let pipeline = state.pipeline.clone();
    let started = Instant::now();
    // the scratch file moves into the task so it outlives the decode even
    // if this request is dropped mid-flight
    let outcome = tokio::task::spawn_blocking(move || {
        let result = pipeline.classify_file(scratch_file.path());
        drop(scratch_file);
        result
    })
    .await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    state.metrics.record_inference_duration(elapsed_ms);

    let diagnosis = outcome
        .unwrap_or_else(|e| Err(InferenceError::Task(e)))
        .inspect_err(|e| {
            tracing::error!("Failed to classify {:?}: {}", scratch_path, e);
            let stage = if e.is_unreadable_input() { "decode" } else { "inference" };
            state.metrics.record_failure(stage);
        })?;

    tracing::info!(
        "Classified {:?} as {:?} in {} ms",
        upload.filename,
        diagnosis,
        elapsed_ms
    );
    state.metrics.record_prediction(diagnosis.metric_label());

    Ok(diagnosis.as_str())
}
