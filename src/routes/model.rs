use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::model::ModelInfo;
use crate::preprocess::InputSpec;
use crate::AppState;

#[derive(Serialize)]
pub struct ModelInfoResponse {
    pub model: ModelInfo,
    pub input: InputSpec,
    pub labels: usize,
}

/// GET /model - describe the loaded classifier
pub async fn model_info(State(state): State<AppState>) -> impl IntoResponse {
    let response = ModelInfoResponse {
        model: state.classifier.info().clone(),
        input: state.input,
        labels: state.labels.as_ref().map_or(0, |labels| labels.len()),
    };

    (StatusCode::OK, Json(response))
}
