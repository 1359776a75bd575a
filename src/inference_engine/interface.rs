use crate::error::PipelineError;
use crate::preprocessor::PreprocessedBuffer;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct LabelProbability {
    pub label: String,
    pub probability: f32,
}

/// Top label plus the full ranked distribution for one captured frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f32,
    /// Sorted by descending probability; `distribution[0]` is `label`/`confidence`.
    pub distribution: Vec<LabelProbability>,
    pub source_timestamp: Instant,
}

pub trait InferenceEngine: Send + Sync {
    /// Classify one buffer. Stateless per call; never invoked concurrently by the pipeline.
    fn classify(&self, buffer: PreprocessedBuffer) -> Result<ClassificationResult, PipelineError>;
}

/// One-shot model setup, run on the first `start()` of a pipeline.
pub type EngineLoader =
    Box<dyn Fn() -> Result<Arc<dyn InferenceEngine + Send + Sync>, PipelineError> + Send + Sync>;
