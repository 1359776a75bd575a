use crate::error::PipelineError;
use crate::frame_source::orientation::{DeviceOrientation, ExifOrientation};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
    Bgr8,
    Bgra8,
    Gray8,
    /// Bi-planar YUV 4:2:0 as delivered by most phone sensors. Not decoded here.
    Nv12,
}

impl PixelFormat {
    /// Bytes per pixel for packed formats, `None` for planar ones.
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => Some(3),
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => Some(4),
            PixelFormat::Gray8 => Some(1),
            PixelFormat::Nv12 => None,
        }
    }
}

/// One captured image. Never mutated after the source hands it out.
#[derive(Clone, PartialEq)]
pub struct Frame {
    pub pixels: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub orientation: ExifOrientation,
    pub timestamp: Instant,
}

// Pixel data is left out on purpose, frames show up in every transition log.
impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixel_format", &self.pixel_format)
            .field("orientation", &self.orientation)
            .field("timestamp", &self.timestamp)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Geometry of the host's preview surface. Pixel contents are never read.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PreviewBounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub type FrameCallback = Arc<dyn Fn(Result<Frame, PipelineError>) + Send + Sync>;

pub trait FrameSource: Send + Sync {
    /// Begin delivering frames to `on_frame` from the source's own capture thread.
    /// The callback must return quickly; it runs on the producer.
    /// An `Err` means the source is not running; the pipeline reports it and
    /// keeps the session open.
    fn start(&self, on_frame: FrameCallback) -> Result<(), PipelineError>;

    /// Halt delivery and release the device before returning. Safe to call
    /// when already stopped.
    fn stop(&self) -> Result<(), PipelineError>;

    fn on_layout_change(&self, bounds: PreviewBounds);

    fn set_device_orientation(&self, orientation: DeviceOrientation);
}
