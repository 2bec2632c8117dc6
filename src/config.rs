//! Server configuration
//!
//! Command-line flags with environment fallbacks, collected into a
//! [`ServerConfig`].

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

use crate::preprocess::{InputSpec, PixelScale, TensorLayout};

/// Default upload limit: 10 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Hand sign digit classifier web front-end
#[derive(Parser, Debug)]
#[command(name = "handsign-server")]
#[command(version)]
#[command(about = "Upload a hand sign image and get the predicted digit")]
pub struct Cli {
    /// Host to bind to
    #[arg(long, env = "HANDSIGN_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "HANDSIGN_PORT", default_value = "9000")]
    pub port: u16,

    /// Path to the ONNX classifier
    #[arg(short, long, env = "HANDSIGN_MODEL", default_value = "model/model.onnx")]
    pub model: PathBuf,

    /// Optional file with one class label per line
    #[arg(long, env = "HANDSIGN_LABELS")]
    pub labels: Option<PathBuf>,

    /// Directory served under /static
    #[arg(long, env = "HANDSIGN_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Square input size expected by the model
    #[arg(long, default_value = "224")]
    pub input_size: u32,

    /// Input tensor layout
    #[arg(long, value_enum, default_value = "nhwc")]
    pub layout: TensorLayout,

    /// Pixel scaling applied before inference
    #[arg(long, value_enum, default_value = "unit")]
    pub scale: PixelScale,

    /// Maximum accepted request body in bytes
    #[arg(long, env = "HANDSIGN_BODY_LIMIT", default_value_t = DEFAULT_BODY_LIMIT)]
    pub body_limit: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub labels_path: Option<PathBuf>,
    pub static_dir: PathBuf,
    pub input: InputSpec,
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
            model_path: PathBuf::from("model/model.onnx"),
            labels_path: None,
            static_dir: PathBuf::from("static"),
            input: InputSpec::default(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            model_path: cli.model,
            labels_path: cli.labels,
            static_dir: cli.static_dir,
            input: InputSpec {
                width: cli.input_size,
                height: cli.input_size,
                layout: cli.layout,
                scale: cli.scale,
            },
            body_limit: cli.body_limit,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
