use crate::error::PipelineError;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub onnx_model_path: PathBuf,
    /// `(height, width)` of the model's image input.
    pub input_shape: (u32, u32),
    /// Text file with one label per output index.
    pub labels_path: Option<PathBuf>,
    /// Keep only the best `top_k` entries of each distribution.
    pub top_k: Option<usize>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            onnx_model_path: PathBuf::from("./models/inception_v3.onnx"),
            input_shape: (299, 299),
            labels_path: Some(PathBuf::from("./models/imagenet_labels.txt")),
            top_k: Some(5),
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.input_shape.0 == 0 || self.input_shape.1 == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "model input shape must be non-zero, got {:?}",
                self.input_shape
            )));
        }

        if self.top_k == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "top_k must keep at least one label".to_string(),
            ));
        }

        Ok(())
    }
}
