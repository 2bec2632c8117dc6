use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use handsign_server::config::{Cli, ServerConfig};
use handsign_server::model::{Classifier, Labels, OnnxClassifier};
use handsign_server::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from(Cli::parse());

    tracing::info!("Hand sign server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Configuration: {}", serde_json::to_string(&config)?);

    let classifier = OnnxClassifier::load(&config.model_path, &config.input)
        .with_context(|| format!("loading model from {:?}", config.model_path))?;
    let info = classifier.info().clone();
    tracing::info!(
        "Model '{}' loaded: input {:?}, {} classes",
        info.id,
        info.input_shape,
        info.num_classes.map_or_else(|| "unknown".to_string(), |n| n.to_string())
    );

    let mut state = AppState::new(Arc::new(classifier), config.input);
    if let Some(path) = &config.labels_path {
        let labels = Labels::load(path).with_context(|| format!("reading labels from {:?}", path))?;
        if let Some(n) = info.num_classes.filter(|&n| n != labels.len()) {
            tracing::warn!("Labels file has {} entries but the model has {} classes", labels.len(), n);
        }
        state = state.with_labels(labels);
    }

    if !config.static_dir.exists() {
        tracing::warn!("Static directory {:?} not found; stylesheets will 404", config.static_dir);
    }

    let router = app(state, &config);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!("Hand sign server starting on http://{}", addr);
    tracing::info!("Available endpoints:");
    tracing::info!("  - GET  /            - Upload form");
    tracing::info!("  - POST /prediction  - Classify an uploaded image");
    tracing::info!("  - GET  /health      - Health check");
    tracing::info!("  - GET  /model       - Loaded model details");

    axum::serve(listener, router).await.context("server failed")?;

    Ok(())
}
