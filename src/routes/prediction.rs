use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::Html,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::PredictError;
use crate::model::{predict_class, Prediction};
use crate::pages::{self, Outcome};
use crate::preprocess::preprocess_image;
use crate::AppState;

const FILE_FIELD: &str = "file";

/// GET /
pub async fn index() -> Html<String> {
    pages::index_page()
}

/// POST /prediction - always answers 200; failures are rendered into the page.
pub async fn predict_image_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Html<String> {
    let request_id = Uuid::new_v4();
    let started = Instant::now();

    let outcome = match run_prediction(&state, multipart).await {
        Ok(prediction) => {
            info!(
                %request_id,
                class = prediction.class_index,
                confidence = prediction.confidence,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "prediction complete"
            );
            Outcome::Predicted(prediction)
        }
        Err(err) => {
            warn!(%request_id, kind = ?err.kind(), error = %err, "prediction failed");
            Outcome::Failed(err.user_message())
        }
    };

    pages::result_page(&outcome)
}

async fn run_prediction(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Prediction, PredictError> {
    let multipart = multipart.map_err(|e| PredictError::Multipart(e.body_text()))?;
    let bytes = read_upload(multipart).await?;

    let classifier = Arc::clone(&state.classifier);
    let labels = state.labels.clone();
    let input = state.input;

    tokio::task::spawn_blocking(move || {
        let tensor = preprocess_image(&bytes, &input)?;
        predict_class(classifier.as_ref(), tensor, labels.as_deref())
    })
    .await
    .map_err(|e| PredictError::Task(e.to_string()))?
}

async fn read_upload(mut multipart: Multipart) -> Result<Bytes, PredictError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() == Some(FILE_FIELD) {
            return field
                .bytes()
                .await
                .map_err(multipart_error);
        }
    }

    Err(PredictError::MissingField(FILE_FIELD.to_string()))
}

fn multipart_error(err: MultipartError) -> PredictError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        PredictError::TooLarge
    } else {
        PredictError::Multipart(err.body_text())
    }
}
