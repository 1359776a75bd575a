use thiserror::Error;

/// Failures surfaced by the capture-to-inference pipeline.
///
/// Everything except [`PipelineError::ModelLoadFailure`] and
/// [`PipelineError::InvalidConfig`] is transient: the frame is lost, the
/// session carries on with the next one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("capture failure: {0}")]
    CaptureFailure(String),
    #[error("preprocess failure: {0}")]
    PreprocessFailure(String),
    #[error("model load failure: {0}")]
    ModelLoadFailure(String),
    #[error("inference failure: {0}")]
    InferenceFailure(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::ModelLoadFailure(_) | PipelineError::InvalidConfig(_)
        )
    }
}
