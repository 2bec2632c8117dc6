//! Inference adapter
//!
//! Wraps the pre-trained ONNX classifier and reduces its output to a single
//! class index.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tract_onnx::prelude::tract_ndarray::Array4;
use tract_onnx::prelude::*;

use crate::error::{ModelError, PredictError};
use crate::preprocess::InputSpec;

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub input_shape: Vec<usize>,
    pub num_classes: Option<usize>,
    pub loaded_at: DateTime<Utc>,
}

/// A loaded model that maps one preprocessed image to a score per class.
pub trait Classifier: Send + Sync {
    /// Raw scores for the single image in `input`.
    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>, PredictError>;

    fn info(&self) -> &ModelInfo;
}

pub struct OnnxClassifier {
    plan: TypedRunnableModel<TypedModel>,
    info: ModelInfo,
}

impl OnnxClassifier {
    /// Load, optimize and pin the input shape of the ONNX model at `path`.
    pub fn load(path: impl AsRef<Path>, spec: &InputSpec) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let metadata =
            std::fs::metadata(path).map_err(|_| ModelError::NotFound(path.to_path_buf()))?;

        let shape = spec.shape();
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    InferenceFact::dt_shape(
                        f32::datum_type(),
                        tvec!(shape[0], shape[1], shape[2], shape[3]),
                    ),
                )
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| ModelError::Load(format!("{:#}", e)))?;

        let num_classes = plan
            .model()
            .output_fact(0)
            .ok()
            .and_then(|fact| fact.shape.as_concrete().and_then(|dims| dims.last().copied()));

        let id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());

        Ok(Self {
            plan,
            info: ModelInfo {
                id,
                path: path.to_path_buf(),
                size_bytes: metadata.len(),
                input_shape: shape.to_vec(),
                num_classes,
                loaded_at: Utc::now(),
            },
        })
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>, PredictError> {
        let outputs = self
            .plan
            .run(tvec!(input.into_tensor().into()))
            .map_err(|e| PredictError::Inference(format!("{:#}", e)))?;

        let scores = outputs
            .first()
            .ok_or(PredictError::EmptyOutput)?
            .to_array_view::<f32>()
            .map_err(|e| PredictError::Value(format!("unexpected model output: {}", e)))?;

        Ok(scores.iter().copied().collect())
    }

    fn info(&self) -> &ModelInfo {
        &self.info
    }
}

/// Class names, one per line, indexed by class id.
#[derive(Debug, Clone, Default)]
pub struct Labels(Vec<String>);

impl Labels {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        Self(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub class_index: usize,
    pub label: Option<String>,
    pub confidence: f32,
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} ({})", self.class_index, label),
            None => write!(f, "{}", self.class_index),
        }
    }
}

/// Index and value of the highest score. Ties go to the lowest index and
/// NaN scores never win.
pub fn argmax(scores: &[f32]) -> Result<(usize, f32), PredictError> {
    if scores.is_empty() {
        return Err(PredictError::EmptyOutput);
    }

    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((index, score)),
        }
    }

    best.ok_or_else(|| PredictError::Value("model produced only NaN scores".to_string()))
}

pub fn predict_class(
    classifier: &dyn Classifier,
    input: Array4<f32>,
    labels: Option<&Labels>,
) -> Result<Prediction, PredictError> {
    let scores = classifier.predict(input)?;
    let (class_index, confidence) = argmax(&scores)?;

    Ok(Prediction {
        class_index,
        label: labels.and_then(|l| l.get(class_index)).map(str::to_string),
        confidence,
    })
}
