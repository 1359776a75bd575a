use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the capture, worker and delivery threads.
#[derive(Debug, Default)]
pub struct PipelineStats {
    frames_received: AtomicU64,
    frames_accepted: AtomicU64,
    frames_dropped: AtomicU64,
    results_published: AtomicU64,
    errors_reported: AtomicU64,
    inference_timeouts: AtomicU64,
    stale_results_discarded: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStatsSnapshot {
    pub frames_received: u64,
    pub frames_accepted: u64,
    pub frames_dropped: u64,
    pub results_published: u64,
    pub errors_reported: u64,
    pub inference_timeouts: u64,
    pub stale_results_discarded: u64,
}

impl PipelineStats {
    pub fn record_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.frames_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.results_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors_reported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.inference_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale_results_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_accepted: self.frames_accepted.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            results_published: self.results_published.load(Ordering::Relaxed),
            errors_reported: self.errors_reported.load(Ordering::Relaxed),
            inference_timeouts: self.inference_timeouts.load(Ordering::Relaxed),
            stale_results_discarded: self.stale_results_discarded.load(Ordering::Relaxed),
        }
    }
}

impl PipelineStatsSnapshot {
    /// Share of received frames that never reached inference.
    pub fn drop_rate(&self) -> f64 {
        if self.frames_received == 0 {
            0.0
        } else {
            self.frames_dropped as f64 / self.frames_received as f64
        }
    }
}
