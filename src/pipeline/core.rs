use crate::config::Config;
use crate::error::PipelineError;
use crate::frame_source::interface::Frame;
use crate::inference_engine::interface::ClassificationResult;
use std::time::Instant;

/// The frame currently owned by the inference worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub source_timestamp: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    #[default]
    Idle,
    Capturing {
        session: u64,
    },
    Busy {
        session: u64,
        in_flight: InFlight,
    },
    Stopped {
        session: u64,
    },
}

impl State {
    /// Session whose output may still reach the sink.
    pub fn active_session(&self) -> Option<u64> {
        match self {
            State::Capturing { session } | State::Busy { session, .. } => Some(*session),
            State::Idle | State::Stopped { .. } => None,
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            State::Idle => "Idle".to_string(),
            State::Capturing { session } => format!("Capturing (session {})", session),
            State::Busy { session, .. } => format!("Busy (session {})", session),
            State::Stopped { session } => format!("Stopped (session {})", session),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    Start,
    Stop,
    FrameArrived(Frame),
    CaptureFailed(PipelineError),
    FrameProcessed {
        session: u64,
        source_timestamp: Instant,
        result: Result<ClassificationResult, PipelineError>,
    },
    Tick(Instant),
}

impl Event {
    pub fn to_display_string(&self) -> String {
        match self {
            Event::FrameArrived(frame) => format!("FrameArrived({:?})", frame.timestamp),
            Event::FrameProcessed {
                session, result, ..
            } => format!(
                "FrameProcessed {{ session: {}, ok: {} }}",
                session,
                result.is_ok()
            ),
            event => format!("{:?}", event),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartSource { session: u64 },
    StopSource,
    Classify { session: u64, frame: Frame },
    Publish { session: u64, result: ClassificationResult },
    Report { session: u64, error: PipelineError },
    RecordDrop,
    RecordTimeout,
    DiscardStale,
}

impl Effect {
    pub fn to_display_string(&self) -> String {
        match self {
            Effect::Classify { session, frame } => format!(
                "Classify {{ session: {}, frame: {:?} }}",
                session, frame.timestamp
            ),
            Effect::Publish { session, result } => format!(
                "Publish {{ session: {}, label: {:?} }}",
                session, result.label
            ),
            effect => format!("{:?}", effect),
        }
    }
}

pub fn init() -> (State, Vec<Effect>) {
    (State::Idle, vec![])
}

pub fn transition(config: &Config, state: State, event: Event) -> (State, Vec<Effect>) {
    match (state, event) {
        // Lifecycle
        (State::Idle, Event::Start) => start_session(1),
        (State::Stopped { session }, Event::Start) => start_session(session + 1),
        (State::Capturing { session } | State::Busy { session, .. }, Event::Stop) => {
            (State::Stopped { session }, vec![Effect::StopSource])
        }

        // Backpressure
        (State::Capturing { session }, Event::FrameArrived(frame)) => (
            State::Busy {
                session,
                in_flight: InFlight {
                    source_timestamp: frame.timestamp,
                },
            },
            vec![Effect::Classify { session, frame }],
        ),
        (state @ State::Busy { .. }, Event::FrameArrived(_)) => (state, vec![Effect::RecordDrop]),

        (
            state @ (State::Capturing { session } | State::Busy { session, .. }),
            Event::CaptureFailed(error),
        ) => (state, vec![Effect::Report { session, error }]),

        // Completion
        (
            State::Busy { session, in_flight },
            Event::FrameProcessed {
                session: done_session,
                source_timestamp,
                result,
            },
        ) if session == done_session && in_flight.source_timestamp == source_timestamp => {
            let effect = match result {
                Ok(result) => Effect::Publish { session, result },
                Err(error) => Effect::Report { session, error },
            };
            (State::Capturing { session }, vec![effect])
        }
        (state, Event::FrameProcessed { .. }) => (state, vec![Effect::DiscardStale]),

        // Deadline
        (State::Busy { session, in_flight }, Event::Tick(now)) => match config.inference_deadline
        {
            Some(deadline)
                if now.saturating_duration_since(in_flight.source_timestamp) >= deadline =>
            {
                (
                    State::Capturing { session },
                    vec![
                        Effect::RecordTimeout,
                        Effect::Report {
                            session,
                            error: PipelineError::InferenceFailure(format!(
                                "inference exceeded deadline of {:?}",
                                deadline
                            )),
                        },
                    ],
                )
            }
            _ => (State::Busy { session, in_flight }, vec![]),
        },

        // Everything else is a no-op: repeated start/stop, frames while not capturing.
        (state, _) => (state, vec![]),
    }
}

fn start_session(session: u64) -> (State, Vec<Effect>) {
    (
        State::Capturing { session },
        vec![Effect::StartSource { session }],
    )
}
