use crate::error::PipelineError;
use crate::frame_source::interface::Frame;
use crate::inference_engine::interface::{ClassificationResult, InferenceEngine};
use crate::library::logger::interface::Logger;
use crate::pipeline::core::Event;
use crate::pipeline::main::Shared;
use crate::pipeline::stats::PipelineStats;
use crate::preprocessor::preprocess;
use crate::result_sink::interface::ResultSink;
use std::sync::mpsc::{channel, sync_channel, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};

pub(crate) struct Job {
    pub session: u64,
    pub frame: Frame,
}

pub(crate) enum Delivery {
    Result {
        session: u64,
        result: ClassificationResult,
    },
    Error {
        session: u64,
        error: PipelineError,
    },
}

impl Delivery {
    fn session(&self) -> u64 {
        match self {
            Delivery::Result { session, .. } | Delivery::Error { session, .. } => *session,
        }
    }
}

/// Threads that live as long as the loaded model: one inference worker, one
/// delivery thread, and a ticker when an inference deadline is configured.
/// All of them exit once the pipeline is dropped.
pub(crate) struct Runtime {
    /// Single slot: the worker holds one frame, at most one more may wait.
    pub jobs: SyncSender<Job>,
    pub deliveries: Sender<Delivery>,
}

impl Runtime {
    pub(crate) fn spawn(
        shared: &Arc<Shared>,
        engine: Arc<dyn InferenceEngine + Send + Sync>,
    ) -> Result<Self, PipelineError> {
        let (jobs, job_receiver) = sync_channel(1);
        let (deliveries, delivery_receiver) = channel();

        let pipeline = Arc::downgrade(shared);
        let input_size = shared.config.model_input_size();
        let logger = shared.logger.with_namespace("worker");
        spawn("inference-worker", move || {
            run_worker(job_receiver, engine, input_size, pipeline, logger)
        })?;

        let sink = Arc::clone(&shared.sink);
        let gate = Arc::clone(&shared.gate);
        let stats = Arc::clone(&shared.stats);
        let logger = shared.logger.with_namespace("delivery");
        spawn("result-delivery", move || {
            run_delivery(delivery_receiver, sink, gate, stats, logger)
        })?;

        if shared.config.inference_deadline.is_some() {
            let pipeline = Arc::downgrade(shared);
            let tick_rate = shared.config.tick_rate;
            spawn("pipeline-ticker", move || run_ticker(pipeline, tick_rate))?;
        }

        Ok(Self { jobs, deliveries })
    }
}

fn spawn<F>(name: &str, body: F) -> Result<(), PipelineError>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map(|_| ())
        .map_err(|e| PipelineError::ModelLoadFailure(format!("{} thread: {}", name, e)))
}

fn run_worker(
    jobs: Receiver<Job>,
    engine: Arc<dyn InferenceEngine + Send + Sync>,
    input_size: (u32, u32),
    pipeline: Weak<Shared>,
    logger: Arc<dyn Logger + Send + Sync>,
) {
    for job in jobs {
        let source_timestamp = job.frame.timestamp;
        let started = Instant::now();

        let result = preprocess(&job.frame, input_size).and_then(|buffer| engine.classify(buffer));
        drop(job.frame);

        let _ = logger.debug(&format!(
            "Frame processed in {:?} (ok: {})",
            started.elapsed(),
            result.is_ok()
        ));

        let Some(pipeline) = pipeline.upgrade() else {
            break;
        };
        pipeline.dispatch(Event::FrameProcessed {
            session: job.session,
            source_timestamp,
            result,
        });
    }

    let _ = logger.debug("Inference worker exiting");
}

fn run_delivery(
    deliveries: Receiver<Delivery>,
    sink: Arc<dyn ResultSink + Send + Sync>,
    gate: Arc<Mutex<Option<u64>>>,
    stats: Arc<PipelineStats>,
    logger: Arc<dyn Logger + Send + Sync>,
) {
    for delivery in deliveries {
        // Held across the callback so `stop` waits for an in-progress delivery.
        let active = gate.lock().unwrap_or_else(PoisonError::into_inner);
        if *active != Some(delivery.session()) {
            let _ = logger.debug(&format!(
                "Discarding output of inactive session {}",
                delivery.session()
            ));
            continue;
        }

        match delivery {
            Delivery::Result { result, .. } => {
                stats.record_published();
                sink.on_result(result);
            }
            Delivery::Error { error, .. } => {
                stats.record_error();
                sink.on_error(error);
            }
        }
    }

    let _ = logger.debug("Result delivery exiting");
}

fn run_ticker(pipeline: Weak<Shared>, tick_rate: Duration) {
    loop {
        std::thread::sleep(tick_rate);

        match pipeline.upgrade() {
            Some(pipeline) => pipeline.dispatch(Event::Tick(Instant::now())),
            None => break,
        }
    }
}
