//! Hand sign digit classifier
//!
//! An HTML upload form in front of a pre-trained ONNX image classifier:
//! `GET /` serves the form, `POST /prediction` decodes the upload, runs the
//! model once and renders the predicted class or an error message.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub mod config;
pub mod error;
pub mod model;
pub mod pages;
pub mod preprocess;
pub mod routes;

use crate::config::ServerConfig;
use crate::model::{Classifier, Labels};
use crate::preprocess::InputSpec;

/// Process-wide state. The classifier is loaded once and never mutated.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<dyn Classifier>,
    pub labels: Option<Arc<Labels>>,
    pub input: InputSpec,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(classifier: Arc<dyn Classifier>, input: InputSpec) -> Self {
        Self {
            classifier,
            labels: None,
            input,
            started_at: Instant::now(),
        }
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = Some(Arc::new(labels));
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub fn app(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/prediction", post(routes::predict_image_file))
        .route("/health", get(routes::health_check))
        .route("/model", get(routes::model_info))
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(DefaultBodyLimit::max(config.body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
