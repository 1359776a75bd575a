use crate::error::PipelineError;
use crate::inference_engine::distribution::softmax;
use crate::inference_engine::interface::{ClassificationResult, InferenceEngine, LabelProbability};
use crate::library::logger::interface::Logger;
use crate::preprocessor::PreprocessedBuffer;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Deterministic stand-in for a real model. Scores come from the buffer's channel
/// means, so identical input gives an identical distribution.
pub struct InferenceEngineFake {
    logger: Arc<dyn Logger + Send + Sync>,
    labels: Vec<String>,
    input_size: (u32, u32),
    latency: Duration,
    failing_calls: HashSet<usize>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    seen_timestamps: Mutex<Vec<Instant>>,
}

impl InferenceEngineFake {
    pub fn new(logger: Arc<dyn Logger + Send + Sync>, input_size: (u32, u32)) -> Self {
        Self {
            logger: logger.with_namespace("inference_engine").with_namespace("fake"),
            labels: vec![
                "tabby cat".to_string(),
                "golden retriever".to_string(),
                "goldfinch".to_string(),
            ],
            input_size,
            latency: Duration::ZERO,
            failing_calls: HashSet::new(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen_timestamps: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Zero-based call indices that return `InferenceFailure`.
    pub fn with_failing_calls(mut self, calls: &[usize]) -> Self {
        self.failing_calls = calls.iter().copied().collect();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping `classify` calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn seen_timestamps(&self) -> Vec<Instant> {
        self.seen_timestamps
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }

    fn scores(&self, buffer: &PreprocessedBuffer) -> Vec<f32> {
        let plane = (buffer.width * buffer.height) as usize;
        let means: Vec<f32> = buffer
            .data
            .chunks(plane.max(1))
            .take(3)
            .map(|channel| channel.iter().sum::<f32>() / channel.len().max(1) as f32)
            .collect();

        (0..self.labels.len())
            .map(|i| means.get(i % 3).copied().unwrap_or(0.0) * 4.0 - i as f32 * 0.01)
            .collect()
    }

    fn run(&self, call: usize, buffer: PreprocessedBuffer) -> Result<ClassificationResult, PipelineError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        if self.failing_calls.contains(&call) {
            return Err(PipelineError::InferenceFailure(format!(
                "injected failure on call {}",
                call
            )));
        }

        let (width, height) = self.input_size;
        if buffer.width != width
            || buffer.height != height
            || buffer.data.len() != 3 * (width * height) as usize
        {
            return Err(PipelineError::InferenceFailure(format!(
                "expected 1x3x{}x{} input, got {:?} with {} values",
                height,
                width,
                buffer.shape(),
                buffer.data.len()
            )));
        }

        let distribution = softmax(&self.scores(&buffer))
            .into_iter()
            .zip(self.labels.iter())
            .map(|(probability, label)| LabelProbability {
                label: label.clone(),
                probability,
            })
            .collect();

        ClassificationResult::from_distribution(distribution, None, buffer.source_timestamp)
    }
}

impl InferenceEngine for InferenceEngineFake {
    fn classify(&self, buffer: PreprocessedBuffer) -> Result<ClassificationResult, PipelineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let overlapping = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(overlapping, Ordering::SeqCst);

        if let Ok(mut seen) = self.seen_timestamps.lock() {
            seen.push(buffer.source_timestamp);
        }
        let _ = self.logger.debug(&format!("Classifying {:?}", buffer));

        let result = self.run(call, buffer);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
