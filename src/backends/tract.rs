//! Tract backend for the local segmentation model
//!
//! Loads an ISNet-style ONNX model with Tract, a pure Rust inference engine,
//! so background removal needs no native runtime. The optimized plan is built
//! once and shared read-only across worker threads.

use crate::config::ModelConfig;
use crate::error::{ProcessingError, Result};
use crate::inference::{ModelOutput, SegmentationModel};
use crate::utils::TensorPreprocessor;
use image::DynamicImage;
use instant::Instant;
use std::path::Path;
use tracing::{debug, info};
use tract_onnx::prelude::*;

type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Segmentation model executed by Tract on the CPU
pub struct TractSegmentationModel {
    model: TractModel,
    config: ModelConfig,
    name: String,
}

impl TractSegmentationModel {
    /// Load and optimize the model named in `config.model_path`
    ///
    /// # Errors
    /// - `InvalidConfig` when no model path is configured
    /// - `ModelFailure` when the file cannot be parsed or optimized
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let path = config.model_path.as_deref().ok_or_else(|| {
            ProcessingError::invalid_config(
                "Background removal needs a segmentation model (set RUGCUT_MODEL_PATH)",
            )
        })?;
        Self::load_from_path(path, config)
    }

    /// Load a model from an explicit path
    pub fn load_from_path(path: &Path, config: &ModelConfig) -> Result<Self> {
        let start = Instant::now();
        let bytes = std::fs::read(path).map_err(|e| {
            ProcessingError::model("ModelLoad", format!("{}: {e}", path.display()))
        })?;
        let name = path
            .file_stem()
            .map_or_else(|| "segmentation".to_string(), |s| s.to_string_lossy().into_owned());

        let model = Self::build_plan(&bytes, config.input_size)?;

        #[allow(clippy::cast_precision_loss)]
        let size_mb = bytes.len() as f64 / (1024.0 * 1024.0);
        info!(
            model = %name,
            size_mb = %format!("{size_mb:.2}"),
            input_size = config.input_size,
            load_ms = start.elapsed().as_millis() as u64,
            "Tract segmentation model ready"
        );

        Ok(Self {
            model,
            config: config.clone(),
            name,
        })
    }

    fn build_plan(bytes: &[u8], input_size: u32) -> Result<TractModel> {
        let side = input_size as usize;
        onnx()
            .model_for_read(&mut std::io::Cursor::new(bytes))
            .map_err(|e| ProcessingError::model("ModelLoad", format!("invalid ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, side, side]).into())
            .map_err(|e| ProcessingError::model("ModelLoad", format!("input shape rejected: {e}")))?
            .into_optimized()
            .map_err(|e| ProcessingError::model("ModelLoad", format!("optimization failed: {e}")))?
            .into_runnable()
            .map_err(|e| ProcessingError::model("ModelLoad", format!("plan creation failed: {e}")))
    }

    /// Run the model on a normalized input tensor, returning the flat mask values
    fn infer(&self, input: Tensor) -> Result<Vec<f32>> {
        let outputs = self
            .model
            .run(tvec![input.into()])
            .map_err(|e| ProcessingError::model("Inference", e))?;

        // ISNet exposes several side outputs; the first is the fused mask
        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| ProcessingError::model("Inference", "model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| ProcessingError::model("OutputType", e))?;

        let shape = view.shape();
        if shape.len() != 4 || shape.first() != Some(&1) || shape.get(1) != Some(&1) {
            return Err(ProcessingError::model(
                "OutputShape",
                format!("expected [1, 1, H, W], got {shape:?}"),
            ));
        }

        Ok(view.iter().copied().collect())
    }
}

impl std::fmt::Debug for TractSegmentationModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TractSegmentationModel")
            .field("name", &self.name)
            .field("input_size", &self.config.input_size)
            .finish_non_exhaustive()
    }
}

impl SegmentationModel for TractSegmentationModel {
    fn transform(&self, image: &DynamicImage) -> Result<ModelOutput> {
        let start = Instant::now();
        let (letterbox, tensor) = TensorPreprocessor::image_to_tensor(image, &self.config)?;

        let side = self.config.input_size as usize;
        let data = tensor
            .as_slice()
            .ok_or_else(|| ProcessingError::model("Preprocess", "input tensor is not contiguous"))?;
        let input = Tensor::from_shape(&[1, 3, side, side], data)
            .map_err(|e| ProcessingError::model("Preprocess", e))?;

        let values = self.infer(input)?;
        debug!(
            model = %self.name,
            inference_ms = start.elapsed().as_millis() as u64,
            "Segmentation inference complete"
        );

        let mask =
            TensorPreprocessor::output_to_mask(&values, &letterbox, (image.width(), image.height()))?;
        let rgba = TensorPreprocessor::apply_mask(image, &mask)?;
        Ok(ModelOutput::Decoded(DynamicImage::ImageRgba8(rgba)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
