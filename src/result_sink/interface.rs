use crate::error::PipelineError;
use crate::inference_engine::interface::ClassificationResult;

/// Receives pipeline output on the pipeline's delivery thread.
///
/// Calls for one session are serialised and never happen after
/// `ClassificationPipeline::stop` returns. Implementations must not call back
/// into the pipeline's `start`/`stop` from inside a callback.
pub trait ResultSink: Send + Sync {
    fn on_result(&self, result: ClassificationResult);

    fn on_error(&self, error: PipelineError);
}
