use crate::error::PipelineError;
use crate::frame_source::interface::{Frame, FrameCallback};
use crate::pipeline::core::{Effect, Event};
use crate::pipeline::main::Shared;
use crate::pipeline::worker::{Delivery, Job};
use std::sync::Arc;

impl Shared {
    pub(crate) fn run_effect(self: &Arc<Self>, effect: Effect) -> Result<(), PipelineError> {
        match effect {
            Effect::StartSource { session } => {
                let _ = self
                    .logger
                    .info(&format!("Starting frame source for session {}", session));
                self.frame_source.start(self.frame_callback())
            }

            Effect::StopSource => {
                let _ = self.logger.info("Stopping frame source");
                self.frame_source.stop()
            }

            Effect::Classify { session, frame } => {
                self.stats.record_accepted();
                self.submit(session, frame);
                Ok(())
            }

            Effect::Publish { session, result } => {
                let _ = self.logger.debug(&format!(
                    "Publishing {} ({:.3})",
                    result.label, result.confidence
                ));
                self.deliver(Delivery::Result { session, result });
                Ok(())
            }

            Effect::Report { session, error } => {
                let _ = self.logger.error(&error.to_string());
                self.deliver(Delivery::Error { session, error });
                Ok(())
            }

            Effect::RecordDrop => {
                let _ = self.logger.debug("Inference busy, frame dropped");
                self.stats.record_dropped();
                Ok(())
            }

            Effect::RecordTimeout => {
                self.stats.record_timeout();
                Ok(())
            }

            Effect::DiscardStale => {
                let _ = self.logger.debug("Discarding result of an abandoned frame");
                self.stats.record_stale();
                Ok(())
            }
        }
    }

    /// Runs on the source's capture thread; must not block.
    fn frame_callback(self: &Arc<Self>) -> FrameCallback {
        let pipeline = Arc::downgrade(self);

        Arc::new(move |frame: Result<Frame, PipelineError>| {
            let Some(pipeline) = pipeline.upgrade() else {
                return;
            };

            match frame {
                Ok(frame) => {
                    pipeline.stats.record_received();
                    pipeline.dispatch(Event::FrameArrived(frame));
                }
                Err(error) => pipeline.dispatch(Event::CaptureFailed(error)),
            }
        })
    }

    fn submit(self: &Arc<Self>, session: u64, frame: Frame) {
        let source_timestamp = frame.timestamp;

        let submitted = match self.runtime.get() {
            Some(runtime) => runtime.jobs.try_send(Job { session, frame }).is_ok(),
            None => false,
        };

        if !submitted {
            self.dispatch(Event::FrameProcessed {
                session,
                source_timestamp,
                result: Err(PipelineError::InferenceFailure(
                    "inference worker is still occupied by an abandoned frame".to_string(),
                )),
            });
        }
    }

    fn deliver(&self, delivery: Delivery) {
        let sent = self
            .runtime
            .get()
            .is_some_and(|runtime| runtime.deliveries.send(delivery).is_ok());

        if !sent {
            let _ = self.logger.error("Result delivery thread is gone");
        }
    }
}
