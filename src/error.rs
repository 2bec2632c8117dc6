//! Error types for request handling and model startup.
//!
//! Every [`PredictError`] collapses into one of three user-facing kinds;
//! `/prediction` renders that message into the page instead of failing the
//! request.

use std::path::PathBuf;

use thiserror::Error;

/// Message shown for uploads that cannot be read as an image.
pub const FILE_UNREADABLE_MESSAGE: &str = "File cannot be processed.";

/// Failure while turning an upload into a prediction.
#[derive(Error, Debug)]
pub enum PredictError {
    /// The upload is empty, truncated, or not a supported image format.
    #[error("cannot decode image: {0}")]
    Unreadable(String),

    /// The upload decoded but carries a value the pipeline cannot use.
    #[error("{0}")]
    Value(String),

    /// The model returned no scores.
    #[error("model returned an empty prediction")]
    EmptyOutput,

    #[error("no multipart field named '{0}' in the request")]
    MissingField(String),

    #[error("upload exceeds the server's size limit")]
    TooLarge,

    #[error("malformed multipart body: {0}")]
    Multipart(String),

    #[error("inference failed: {0}")]
    Inference(String),

    /// The blocking worker panicked or was cancelled.
    #[error("prediction task failed: {0}")]
    Task(String),
}

/// The three classes of failure a user can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    FileUnreadable,
    Value,
    Unexpected,
}

impl PredictError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictError::Unreadable(_) => ErrorKind::FileUnreadable,
            PredictError::Value(_) => ErrorKind::Value,
            _ => ErrorKind::Unexpected,
        }
    }

    /// Text rendered into the result page.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::FileUnreadable => FILE_UNREADABLE_MESSAGE.to_string(),
            ErrorKind::Value => format!("Value error: {}", self),
            ErrorKind::Unexpected => format!("An unexpected error occurred: {}", self),
        }
    }
}

impl From<image::ImageError> for PredictError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Limits(_) | image::ImageError::Parameter(_) => {
                PredictError::Value(err.to_string())
            }
            other => PredictError::Unreadable(other.to_string()),
        }
    }
}

/// Failure while loading the model at startup.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to load model: {0}")]
    Load(String),

    #[error("failed to read labels: {0}")]
    Labels(#[from] std::io::Error),
}
