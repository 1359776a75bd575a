use crate::error::PipelineError;
use crate::inference_engine::interface::ClassificationResult;
use crate::library::logger::interface::Logger;
use crate::result_sink::interface::ResultSink;
use std::sync::Arc;

pub struct ResultSinkConsole {
    logger: Arc<dyn Logger + Send + Sync>,
}

impl ResultSinkConsole {
    pub fn new(logger: Arc<dyn Logger + Send + Sync>) -> Self {
        Self {
            logger: logger.with_namespace("result_sink"),
        }
    }
}

impl ResultSink for ResultSinkConsole {
    fn on_result(&self, result: ClassificationResult) {
        let _ = self.logger.info(&format_result(&result));

        for entry in result.distribution.iter().skip(1) {
            let _ = self.logger.debug(&format!(
                "  {:<24} {:>5.1}%",
                entry.label,
                entry.probability * 100.0
            ));
        }
    }

    fn on_error(&self, error: PipelineError) {
        let _ = self.logger.error(&error.to_string());
    }
}

fn format_result(result: &ClassificationResult) -> String {
    format!(
        "{} (Confidence: {:.0}%)",
        result.label,
        result.confidence * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference_engine::interface::LabelProbability;
    use std::time::Instant;

    #[test]
    fn test_result_line_shows_percentage() {
        let result = ClassificationResult {
            label: "goldfinch".to_string(),
            confidence: 0.873,
            distribution: vec![LabelProbability {
                label: "goldfinch".to_string(),
                probability: 0.873,
            }],
            source_timestamp: Instant::now(),
        };

        assert_eq!(format_result(&result), "goldfinch (Confidence: 87%)");
    }
}
