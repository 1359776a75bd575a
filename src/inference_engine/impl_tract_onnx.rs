use crate::error::PipelineError;
use crate::inference_engine::distribution::to_probabilities;
use crate::inference_engine::interface::{ClassificationResult, InferenceEngine, LabelProbability};
use crate::inference_engine::model_config::ModelConfig;
use crate::library::logger::interface::Logger;
use crate::preprocessor::PreprocessedBuffer;
use std::path::Path;
use std::sync::Arc;
use tract_onnx::prelude::*;

/// ONNX image classifier executed on the CPU with tract. Loaded once, reused for every frame.
pub struct InferenceEngineTractOnnx {
    model: TypedRunnableModel<TypedModel>,
    config: ModelConfig,
    labels: Vec<String>,
    logger: Arc<dyn Logger + Send + Sync>,
}

impl InferenceEngineTractOnnx {
    pub fn load_model(
        config: ModelConfig,
        logger: Arc<dyn Logger + Send + Sync>,
    ) -> Result<Self, PipelineError> {
        let logger = logger
            .with_namespace("inference_engine")
            .with_namespace("tract_onnx");

        config
            .validate()
            .map_err(|e| PipelineError::ModelLoadFailure(e.to_string()))?;

        let _ = logger.info(&format!(
            "Loading model from {}",
            config.onnx_model_path.display()
        ));

        let (height, width) = config.input_shape;
        let input_fact = f32::fact([1, 3, height as usize, width as usize]);

        let model = tract_onnx::onnx()
            .model_for_path(&config.onnx_model_path)
            .and_then(|model| model.with_input_fact(0, input_fact.into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                PipelineError::ModelLoadFailure(format!(
                    "{}: {}",
                    config.onnx_model_path.display(),
                    e
                ))
            })?;

        let labels = match &config.labels_path {
            Some(path) => read_labels(path)?,
            None => Vec::new(),
        };

        let _ = logger.info(&format!(
            "Model ready: {}x{} input, {} labels",
            width,
            height,
            labels.len()
        ));

        Ok(Self {
            model,
            config,
            labels,
            logger,
        })
    }

    fn label_for(&self, index: usize) -> String {
        self.labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", index))
    }
}

impl InferenceEngine for InferenceEngineTractOnnx {
    fn classify(&self, buffer: PreprocessedBuffer) -> Result<ClassificationResult, PipelineError> {
        let (height, width) = self.config.input_shape;
        if buffer.width != width || buffer.height != height {
            return Err(PipelineError::InferenceFailure(format!(
                "expected {}x{} input, got {}x{}",
                width, height, buffer.width, buffer.height
            )));
        }

        let [n, c, h, w] = buffer.shape();
        let source_timestamp = buffer.source_timestamp;
        let input: Tensor = tract_ndarray::Array4::from_shape_vec((n, c, h, w), buffer.data)
            .map_err(|e| PipelineError::InferenceFailure(format!("input tensor: {}", e)))?
            .into();

        let outputs = self
            .model
            .run(tvec!(input.into_tvalue()))
            .map_err(|e| PipelineError::InferenceFailure(e.to_string()))?;

        let output = outputs.first().ok_or_else(|| {
            PipelineError::InferenceFailure("model produced no outputs".to_string())
        })?;

        let scores: Vec<f32> = output
            .to_array_view::<f32>()
            .map_err(|e| PipelineError::InferenceFailure(format!("output tensor: {}", e)))?
            .iter()
            .copied()
            .collect();

        let distribution = to_probabilities(&scores)
            .into_iter()
            .enumerate()
            .map(|(index, probability)| LabelProbability {
                label: self.label_for(index),
                probability,
            })
            .collect();

        let result =
            ClassificationResult::from_distribution(distribution, self.config.top_k, source_timestamp)?;

        let _ = self.logger.debug(&format!(
            "Top label {} ({:.3})",
            result.label, result.confidence
        ));

        Ok(result)
    }
}

fn read_labels(path: &Path) -> Result<Vec<String>, PipelineError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::ModelLoadFailure(format!("labels {}: {}", path.display(), e))
    })?;

    let mut labels: Vec<String> = contents.lines().map(|l| l.trim().to_string()).collect();
    while labels.last().is_some_and(|l| l.is_empty()) {
        labels.pop();
    }

    Ok(labels)
}
