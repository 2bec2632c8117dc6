//! Image preprocessing
//!
//! Decodes an uploaded byte stream and turns it into the fixed-shape `f32`
//! tensor the classifier expects.

use std::io::Cursor;

use clap::ValueEnum;
use image::{imageops::FilterType, DynamicImage, ImageReader};
use serde::{Deserialize, Serialize};
use tract_onnx::prelude::tract_ndarray::Array4;

use crate::error::PredictError;

/// ImageNet normalization mean values (RGB)
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet normalization std values (RGB)
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Memory layout of the model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[1, H, W, 3]`, as exported from Keras.
    Nhwc,
    /// `[1, 3, H, W]`, as exported from PyTorch.
    Nchw,
}

/// How raw `u8` channel values are mapped to floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PixelScale {
    /// `v / 255`
    Unit,
    /// `v` unchanged
    Raw,
    /// `(v / 255 - mean) / std` per channel
    Imagenet,
}

/// Shape and scaling of the tensor fed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub width: u32,
    pub height: u32,
    pub layout: TensorLayout,
    pub scale: PixelScale,
}

impl Default for InputSpec {
    fn default() -> Self {
        Self {
            width: 224,
            height: 224,
            layout: TensorLayout::Nhwc,
            scale: PixelScale::Unit,
        }
    }
}

impl InputSpec {
    /// Tensor shape including the batch dimension.
    pub fn shape(&self) -> [usize; 4] {
        let (w, h) = (self.width as usize, self.height as usize);
        match self.layout {
            TensorLayout::Nhwc => [1, h, w, 3],
            TensorLayout::Nchw => [1, 3, h, w],
        }
    }
}

fn decode_image(bytes: &[u8]) -> Result<DynamicImage, PredictError> {
    if bytes.is_empty() {
        return Err(PredictError::Unreadable("upload is empty".to_string()));
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PredictError::Unreadable(e.to_string()))?;

    if reader.format().is_none() {
        return Err(PredictError::Unreadable("unrecognized image format".to_string()));
    }

    Ok(reader.decode()?)
}

fn scale_channel(value: u8, channel: usize, scale: PixelScale) -> f32 {
    let v = value as f32;
    match scale {
        PixelScale::Unit => v / 255.0,
        PixelScale::Raw => v,
        PixelScale::Imagenet => (v / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel],
    }
}

/// Decode `bytes` and build the model input described by `spec`.
pub fn preprocess_image(bytes: &[u8], spec: &InputSpec) -> Result<Array4<f32>, PredictError> {
    let image = decode_image(bytes)?;

    if image.width() == 0 || image.height() == 0 {
        return Err(PredictError::Value(format!(
            "image has no pixels ({}x{})",
            image.width(),
            image.height()
        )));
    }
    if spec.width == 0 || spec.height == 0 {
        return Err(PredictError::Value(format!(
            "target size {}x{} is empty",
            spec.width, spec.height
        )));
    }

    let rgb = image
        .resize_exact(spec.width, spec.height, FilterType::Triangle)
        .to_rgb8();

    let mut tensor = Array4::<f32>::zeros(spec.shape());
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let value = scale_channel(pixel[c], c, spec.scale);
            match spec.layout {
                TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
            }
        }
    }

    Ok(tensor)
}
