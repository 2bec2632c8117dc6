use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub model_id: String,
    pub model_loaded_at: DateTime<Utc>,
    pub uptime_seconds: u64,
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let info = state.classifier.info();
    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        model_id: info.id.clone(),
        model_loaded_at: info.loaded_at,
        uptime_seconds: state.uptime_seconds(),
    };

    (StatusCode::OK, Json(response))
}
