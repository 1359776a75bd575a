use crate::config::{CaptureConfig, DeviceFacing};
use crate::error::PipelineError;
use crate::frame_source::interface::{Frame, FrameCallback, FrameSource, PixelFormat, PreviewBounds};
use crate::frame_source::orientation::{exif_orientation_for, DeviceOrientation};
use crate::library::logger::interface::Logger;
use opencv::{
    core::{Mat, MatTraitConst, MatTraitConstManual},
    videoio::{self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Pause between attempts to open a camera that is missing or busy.
const OPEN_RETRY_DELAY: Duration = Duration::from_secs(1);
const RETRY_POLL: Duration = Duration::from_millis(20);

/// V4L/UVC camera read through OpenCV on a dedicated capture thread.
///
/// The device is opened on the capture thread. Until it opens, every attempt
/// is reported through the frame callback as a `CaptureFailure` and retried.
pub struct FrameSourceOpenCv {
    config: CaptureConfig,
    logger: Arc<dyn Logger + Send + Sync>,
    running: Arc<AtomicBool>,
    orientation: Arc<Mutex<DeviceOrientation>>,
    bounds: Mutex<Option<PreviewBounds>>,
    capture_thread: Mutex<Option<JoinHandle<()>>>,
}

impl FrameSourceOpenCv {
    pub fn new(config: CaptureConfig, logger: Arc<dyn Logger + Send + Sync>) -> Self {
        Self {
            config,
            logger: logger.with_namespace("frame_source").with_namespace("opencv"),
            running: Arc::new(AtomicBool::new(false)),
            orientation: Arc::new(Mutex::new(DeviceOrientation::default())),
            bounds: Mutex::new(None),
            capture_thread: Mutex::new(None),
        }
    }

    fn join_capture_thread(&self) -> Result<(), PipelineError> {
        let handle = match self.capture_thread.lock() {
            Ok(mut capture_thread) => capture_thread.take(),
            Err(_) => None,
        };

        match handle {
            // A callback that stops the source runs on the capture thread itself.
            Some(handle) if handle.thread().id() != std::thread::current().id() => handle
                .join()
                .map_err(|_| PipelineError::CaptureFailure("capture thread panicked".to_string())),
            _ => Ok(()),
        }
    }
}

impl FrameSource for FrameSourceOpenCv {
    fn start(&self, on_frame: FrameCallback) -> Result<(), PipelineError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let running = Arc::clone(&self.running);
        let orientation = Arc::clone(&self.orientation);
        let logger = self.logger.clone();
        let config = self.config.clone();

        let spawned = std::thread::Builder::new()
            .name("frame-source-opencv".to_string())
            .spawn(move || capture_loop(&config, &logger, &running, &orientation, &on_frame));

        match spawned {
            Ok(handle) => {
                if let Ok(mut capture_thread) = self.capture_thread.lock() {
                    *capture_thread = Some(handle);
                }
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(PipelineError::CaptureFailure(format!("capture thread: {}", e)))
            }
        }
    }

    /// Returns once the capture thread has exited and the device is released.
    fn stop(&self) -> Result<(), PipelineError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let _ = self.logger.info("Stopping camera capture");
        self.join_capture_thread()?;
        let _ = self.logger.info("Camera capture stopped");
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

fn capture_loop(
    config: &CaptureConfig,
    logger: &Arc<dyn Logger + Send + Sync>,
    running: &AtomicBool,
    orientation: &Mutex<DeviceOrientation>,
    on_frame: &FrameCallback,
) {
    let interval = config.frame_interval();
    let mut capture: Option<VideoCapture> = None;
    let mut mat = Mat::default();

    while running.load(Ordering::SeqCst) {
        let started = Instant::now();

        let Some(device) = capture.as_mut() else {
            let _ = logger.info("Opening camera device");
            match open_device(config, logger) {
                Ok(opened) => capture = Some(opened),
                Err(e) => {
                    on_frame(Err(e));
                    while running.load(Ordering::SeqCst) && started.elapsed() < OPEN_RETRY_DELAY {
                        std::thread::sleep(RETRY_POLL);
                    }
                }
            }
            continue;
        };

        let pose = orientation
            .lock()
            .map(|orientation| *orientation)
            .unwrap_or_default();
        on_frame(read_frame(device, &mut mat, pose, started));

        std::thread::sleep(interval.saturating_sub(started.elapsed()));
    }

    if let Some(mut device) = capture {
        let _ = device.release();
        let _ = logger.info("Camera device released");
    }
}

fn device_index(facing: DeviceFacing) -> i32 {
    match facing {
        DeviceFacing::Back => 0,
        DeviceFacing::Front => 1,
    }
}

fn open_device(
    config: &CaptureConfig,
    logger: &Arc<dyn Logger + Send + Sync>,
) -> Result<VideoCapture, PipelineError> {
    let index = device_index(config.device_facing);

    for backend in [videoio::CAP_V4L, videoio::CAP_ANY] {
        match VideoCapture::new(index, backend) {
            Ok(mut capture) => {
                if capture.is_opened().unwrap_or(false) {
                    let _ = capture.set(videoio::CAP_PROP_FRAME_WIDTH, config.frame_width as f64);
                    let _ = capture.set(videoio::CAP_PROP_FRAME_HEIGHT, config.frame_height as f64);
                    let _ = capture.set(videoio::CAP_PROP_FPS, config.target_fps as f64);
                    return Ok(capture);
                }
            }
            Err(e) => {
                let _ = logger.error(&format!(
                    "failed to open device #{} with backend {}: {}",
                    index, backend, e
                ));
            }
        }
    }

    Err(PipelineError::CaptureFailure(format!(
        "could not open camera device #{}",
        index
    )))
}

fn read_frame(
    capture: &mut VideoCapture,
    mat: &mut Mat,
    device: DeviceOrientation,
    timestamp: Instant,
) -> Result<Frame, PipelineError> {
    let grabbed = capture
        .read(mat)
        .map_err(|e| PipelineError::CaptureFailure(e.to_string()))?;

    if !grabbed || mat.empty() {
        return Err(PipelineError::CaptureFailure(
            "device returned an empty frame".to_string(),
        ));
    }

    let (width, height) = (mat.cols(), mat.rows());
    if width <= 0 || height <= 0 {
        return Err(PipelineError::CaptureFailure(format!(
            "device returned a {}x{} frame",
            width, height
        )));
    }

    let pixels = mat
        .data_bytes()
        .map_err(|e| PipelineError::CaptureFailure(e.to_string()))?
        .to_vec();

    Ok(Frame {
        pixels: pixels.into(),
        width: width as u32,
        height: height as u32,
        pixel_format: PixelFormat::Bgr8,
        orientation: exif_orientation_for(device),
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::logger::impl_console::LoggerConsole;
    use crate::library::logger::interface::LogLevel;
    use std::sync::atomic::AtomicUsize;

    // Holds with or without a camera attached: either frames or open failures
    // reach the callback, and neither may arrive once `stop` has returned.
    #[test]
    fn test_stop_joins_capture_thread() {
        let logger = Arc::new(LoggerConsole::new(
            chrono::FixedOffset::east_opt(0).unwrap(),
            LogLevel::Error,
        ));
        let source = FrameSourceOpenCv::new(CaptureConfig::default(), logger);
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);

        source
            .start(Arc::new(move |_frame: Result<Frame, PipelineError>| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while delivered.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(delivered.load(Ordering::SeqCst) > 0);

        source.stop().unwrap();
        let seen = delivered.load(Ordering::SeqCst);
        assert!(source.capture_thread.lock().unwrap().is_none());

        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(delivered.load(Ordering::SeqCst), seen);
    }
}
