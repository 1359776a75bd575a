use crate::config::Config;
use crate::error::PipelineError;
use crate::frame_source::interface::{FrameSource, PreviewBounds};
use crate::frame_source::orientation::DeviceOrientation;
use crate::inference_engine::interface::EngineLoader;
use crate::library::logger::interface::Logger;
use crate::pipeline::core::{init, transition, Effect, Event, State};
use crate::pipeline::stats::{PipelineStats, PipelineStatsSnapshot};
use crate::pipeline::worker::Runtime;
use crate::result_sink::interface::ResultSink;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Camera frames in, classification results out.
///
/// Frames are handed to a single inference worker one at a time; anything that
/// arrives while the worker is busy is dropped. Results and transient errors
/// reach the [`ResultSink`] on a separate delivery thread.
pub struct ClassificationPipeline {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    pub config: Config,
    pub logger: Arc<dyn Logger + Send + Sync>,
    pub frame_source: Arc<dyn FrameSource + Send + Sync>,
    pub sink: Arc<dyn ResultSink + Send + Sync>,
    pub stats: Arc<PipelineStats>,
    /// Session allowed to reach the sink, `None` while idle or stopped.
    pub gate: Arc<Mutex<Option<u64>>>,
    pub runtime: OnceLock<Runtime>,
    state: Mutex<State>,
    engine_loader: EngineLoader,
    loading: Mutex<()>,
    lifecycle: Mutex<()>,
}

impl ClassificationPipeline {
    pub fn new(
        config: Config,
        logger: Arc<dyn Logger + Send + Sync>,
        frame_source: Arc<dyn FrameSource + Send + Sync>,
        engine_loader: EngineLoader,
        sink: Arc<dyn ResultSink + Send + Sync>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let (initial, _) = init();

        Ok(Self {
            shared: Arc::new(Shared {
                logger: logger.with_namespace("pipeline"),
                config,
                frame_source,
                sink,
                stats: Arc::new(PipelineStats::default()),
                gate: Arc::new(Mutex::new(None)),
                runtime: OnceLock::new(),
                state: Mutex::new(initial),
                engine_loader,
                loading: Mutex::new(()),
                lifecycle: Mutex::new(()),
            }),
        })
    }

    /// Load the model on first use, then open the camera.
    ///
    /// Returns `ModelLoadFailure` and stays idle when the model cannot be
    /// loaded. A camera that fails to open is reported to the sink as a
    /// `CaptureFailure` while the session stays up. Calling `start` on a
    /// running pipeline does nothing.
    pub fn start(&self) -> Result<(), PipelineError> {
        let shared = &self.shared;

        if let Err(error) = shared.ensure_runtime() {
            let _ = shared.logger.error(&format!("Start aborted: {}", error));
            return Err(error);
        }

        for effect in shared.change_lifecycle(Event::Start) {
            match shared.run_effect(effect) {
                Ok(()) => {}
                Err(error) if error.is_fatal() => {
                    let _ = shared.logger.error(&format!("Start aborted: {}", error));
                    self.stop();
                    return Err(error);
                }
                Err(error) => shared.dispatch(Event::CaptureFailed(error)),
            }
        }

        Ok(())
    }

    /// Stop capturing. Once this returns the sink gets no further callbacks,
    /// even if an inference is still running. Safe to call repeatedly.
    pub fn stop(&self) {
        let shared = &self.shared;

        for effect in shared.change_lifecycle(Event::Stop) {
            if let Err(error) = shared.run_effect(effect) {
                let _ = shared.logger.error(&format!("Effect failed: {}", error));
            }
        }
    }

    pub fn on_layout_change(&self, bounds: PreviewBounds) {
        self.shared.frame_source.on_layout_change(bounds);
    }

    pub fn set_device_orientation(&self, orientation: DeviceOrientation) {
        self.shared.frame_source.set_device_orientation(orientation);
    }

    pub fn state(&self) -> State {
        *self.shared.lock_state()
    }

    pub fn stats(&self) -> PipelineStatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl Drop for ClassificationPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Transition under the state lock and return the effects to run outside it.
    /// Never waits on the sink, so it is safe on the capture thread.
    pub(crate) fn apply(&self, event: Event) -> (State, Vec<Effect>) {
        let mut state = self.lock_state();
        let event_display = event.to_display_string();

        let (new_state, effects) = transition(&self.config, *state, event);

        if new_state != *state || !effects.is_empty() {
            let _ = self.logger.debug(&format!(
                "{} --{}--> {} {:?}",
                state.to_display_string(),
                event_display,
                new_state.to_display_string(),
                effects
                    .iter()
                    .map(|effect| effect.to_display_string())
                    .collect::<Vec<_>>()
            ));
        }

        *state = new_state;
        (new_state, effects)
    }

    /// Start and stop are the only events that change the active session.
    /// The gate is moved after the state lock is released: closing it waits
    /// for an in-progress sink callback, and that wait must not hold up frames.
    fn change_lifecycle(&self, event: Event) -> Vec<Effect> {
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        let (state, effects) = self.apply(event);

        let mut gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        *gate = state.active_session();

        effects
    }

    pub(crate) fn dispatch(self: &Arc<Self>, event: Event) {
        let (_, effects) = self.apply(event);
        for effect in effects {
            if let Err(error) = self.run_effect(effect) {
                let _ = self.logger.error(&format!("Effect failed: {}", error));
            }
        }
    }

    fn ensure_runtime(self: &Arc<Self>) -> Result<&Runtime, PipelineError> {
        let _loading = self.loading.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(runtime) = self.runtime.get() {
            return Ok(runtime);
        }

        let _ = self.logger.info("Loading inference engine...");
        let engine = (self.engine_loader)()?;
        let runtime = Runtime::spawn(self, engine)?;
        let _ = self.logger.info("Inference engine ready");

        Ok(self.runtime.get_or_init(|| runtime))
    }
}
