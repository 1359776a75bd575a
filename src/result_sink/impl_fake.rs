use crate::error::PipelineError;
use crate::inference_engine::interface::ClassificationResult;
use crate::result_sink::interface::ResultSink;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Result(ClassificationResult),
    Error(PipelineError),
}

/// Records every callback in arrival order.
#[derive(Default)]
pub struct ResultSinkFake {
    events: Mutex<Vec<SinkEvent>>,
    delay: Duration,
}

impl ResultSinkFake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each callback records its event, then sleeps for `delay` before returning.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn results(&self) -> Vec<ClassificationResult> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Result(result) => Some(result),
                SinkEvent::Error(_) => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<PipelineError> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Error(error) => Some(error),
                SinkEvent::Result(_) => None,
            })
            .collect()
    }

    fn push(&self, event: SinkEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
    }
}

impl ResultSink for ResultSinkFake {
    fn on_result(&self, result: ClassificationResult) {
        self.push(SinkEvent::Result(result));
    }

    fn on_error(&self, error: PipelineError) {
        self.push(SinkEvent::Error(error));
    }
}
