use crate::config::CaptureConfig;
use crate::error::PipelineError;
use crate::frame_source::interface::{Frame, FrameCallback, FrameSource, PixelFormat, PreviewBounds};
use crate::frame_source::orientation::{exif_orientation_for, DeviceOrientation};
use crate::library::logger::interface::Logger;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Frame source without hardware. Frames are pushed by hand, or produced by a
/// generator thread at `target_fps` when built `with_generator`.
pub struct FrameSourceFake {
    config: CaptureConfig,
    logger: Arc<dyn Logger + Send + Sync>,
    generate: bool,
    corrupt_frame_rate: f32,
    start_failure: Option<String>,
    running: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    callback: Arc<Mutex<Option<FrameCallback>>>,
    orientation: Arc<Mutex<DeviceOrientation>>,
    bounds: Mutex<Option<PreviewBounds>>,
    start_count: AtomicUsize,
}

impl FrameSourceFake {
    pub fn new(config: CaptureConfig, logger: Arc<dyn Logger + Send + Sync>) -> Self {
        Self {
            config,
            logger: logger.with_namespace("frame_source").with_namespace("fake"),
            generate: false,
            corrupt_frame_rate: 0.0,
            start_failure: None,
            running: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            callback: Arc::new(Mutex::new(None)),
            orientation: Arc::new(Mutex::new(DeviceOrientation::default())),
            bounds: Mutex::new(None),
            start_count: AtomicUsize::new(0),
        }
    }

    /// Emit noise frames on a background thread; `corrupt_frame_rate` of them
    /// arrive as capture failures instead.
    pub fn with_generator(mut self, corrupt_frame_rate: f32) -> Self {
        self.generate = true;
        self.corrupt_frame_rate = corrupt_frame_rate.clamp(0.0, 1.0);
        self
    }

    /// Every `start` fails with `CaptureFailure(reason)`, like a camera that
    /// is missing or held by another process.
    pub fn with_start_failure(mut self, reason: &str) -> Self {
        self.start_failure = Some(reason.to_string());
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn start_count(&self) -> usize {
        self.start_count.load(Ordering::SeqCst)
    }

    pub fn preview_bounds(&self) -> Option<PreviewBounds> {
        self.bounds.lock().ok().and_then(|bounds| *bounds)
    }

    /// Deliver `frame` on the calling thread. Returns false when not started.
    pub fn push_frame(&self, frame: Frame) -> bool {
        self.deliver(Ok(frame))
    }

    pub fn push_capture_failure(&self, reason: &str) -> bool {
        self.deliver(Err(PipelineError::CaptureFailure(reason.to_string())))
    }

    /// A noise frame at the configured capture size, stamped with the current pose.
    pub fn synthetic_frame(&self, timestamp: Instant) -> Frame {
        let device = self
            .orientation
            .lock()
            .map(|orientation| *orientation)
            .unwrap_or_default();
        noise_frame(
            self.config.frame_width,
            self.config.frame_height,
            device,
            timestamp,
        )
    }

    fn deliver(&self, frame: Result<Frame, PipelineError>) -> bool {
        if !self.is_running() {
            return false;
        }

        let callback = self.callback.lock().ok().and_then(|callback| callback.clone());
        match callback {
            Some(callback) => {
                callback(frame);
                true
            }
            None => false,
        }
    }

    fn spawn_generator(&self) -> Result<(), PipelineError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current_generation = Arc::clone(&self.generation);
        let running = Arc::clone(&self.running);
        let callback = Arc::clone(&self.callback);
        let orientation = Arc::clone(&self.orientation);
        let interval = self.config.frame_interval();
        let (width, height) = (self.config.frame_width, self.config.frame_height);
        let corrupt_frame_rate = self.corrupt_frame_rate;

        std::thread::Builder::new()
            .name("frame-source-fake".to_string())
            .spawn(move || {
                while running.load(Ordering::SeqCst)
                    && current_generation.load(Ordering::SeqCst) == generation
                {
                    let started = Instant::now();
                    let callback = callback.lock().ok().and_then(|callback| callback.clone());

                    if let Some(callback) = callback {
                        if rand::random::<f32>() < corrupt_frame_rate {
                            callback(Err(PipelineError::CaptureFailure(
                                "sensor returned an undecodable frame".to_string(),
                            )));
                        } else {
                            let device = orientation
                                .lock()
                                .map(|orientation| *orientation)
                                .unwrap_or_default();
                            callback(Ok(noise_frame(width, height, device, started)));
                        }
                    }

                    std::thread::sleep(interval.saturating_sub(started.elapsed()));
                }
            })
            .map(|_| ())
            .map_err(|e| PipelineError::CaptureFailure(format!("generator thread: {}", e)))
    }
}

impl FrameSource for FrameSourceFake {
    fn start(&self, on_frame: FrameCallback) -> Result<(), PipelineError> {
        let _ = self.logger.info("Starting fake frame source...");
        self.start_count.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = &self.start_failure {
            let _ = self.logger.error(&format!("Fake frame source failed to open: {}", reason));
            return Err(PipelineError::CaptureFailure(reason.clone()));
        }

        if let Ok(mut callback) = self.callback.lock() {
            *callback = Some(on_frame);
        }
        self.running.store(true, Ordering::SeqCst);

        if self.generate {
            self.spawn_generator()?;
        }

        let _ = self.logger.info(&format!(
            "Fake frame source started at {} fps, {}x{}",
            self.config.target_fps, self.config.frame_width, self.config.frame_height
        ));
        Ok(())
    }

    fn stop(&self) -> Result<(), PipelineError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let _ = self.logger.info("Stopping fake frame source...");
        if let Ok(mut callback) = self.callback.lock() {
            *callback = None;
        }
        let _ = self.logger.info("Fake frame source stopped");
        Ok(())
    }

    fn on_layout_change(&self, bounds: PreviewBounds) {
        let _ = self.logger.debug(&format!("Preview resized to {:?}", bounds));
        if let Ok(mut current) = self.bounds.lock() {
            *current = Some(bounds);
        }
    }

    fn set_device_orientation(&self, orientation: DeviceOrientation) {
        let _ = self.logger.debug(&format!(
            "Device orientation {:?}, frames tagged with EXIF {}",
            orientation,
            exif_orientation_for(orientation).code()
        ));
        if let Ok(mut current) = self.orientation.lock() {
            *current = orientation;
        }
    }
}

fn noise_frame(width: u32, height: u32, device: DeviceOrientation, timestamp: Instant) -> Frame {
    let mut pixels = vec![0u8; width as usize * height as usize * 3];
    rand::rng().fill(&mut pixels[..]);

    Frame {
        pixels: pixels.into(),
        width,
        height,
        pixel_format: PixelFormat::Rgb8,
        orientation: exif_orientation_for(device),
        timestamp,
    }
}
