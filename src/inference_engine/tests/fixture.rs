use crate::frame_source::interface::{Frame, PixelFormat};
use crate::frame_source::orientation::ExifOrientation;
use crate::inference_engine::impl_fake::InferenceEngineFake;
use crate::inference_engine::model_config::ModelConfig;
use crate::library::logger::impl_console::LoggerConsole;
use crate::library::logger::interface::{LogLevel, Logger};
use crate::preprocessor::{preprocess, PreprocessedBuffer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

pub struct Fixture {
    pub logger: Arc<dyn Logger + Send + Sync>,
    pub input_size: (u32, u32),
    pub engine: InferenceEngineFake,
}

impl Fixture {
    pub fn new() -> Self {
        let logger: Arc<dyn Logger + Send + Sync> = Arc::new(LoggerConsole::new(
            chrono::FixedOffset::east_opt(0).unwrap(),
            LogLevel::Error,
        ));
        let input_size = (299, 299);
        let engine = InferenceEngineFake::new(logger.clone(), input_size);

        Self {
            logger,
            input_size,
            engine,
        }
    }

    pub fn buffer(&self, rgb: [u8; 3]) -> PreprocessedBuffer {
        solid_buffer(rgb, self.input_size)
    }

    pub fn missing_model() -> ModelConfig {
        ModelConfig {
            onnx_model_path: PathBuf::from("/nonexistent/model.onnx"),
            labels_path: None,
            ..ModelConfig::default()
        }
    }

    /// Checked-in ONNX graph: a `GlobalAveragePool` over a 1x3x8x8 input, so the
    /// scores are the channel means and the labels are `red`, `green`, `blue`.
    pub fn rgb_means_model() -> ModelConfig {
        let models =
            Path::new(env!("CARGO_MANIFEST_DIR")).join("src/inference_engine/tests/models");
        ModelConfig {
            onnx_model_path: models.join("rgb_means.onnx"),
            input_shape: (8, 8),
            labels_path: Some(models.join("rgb_means_labels.txt")),
            top_k: None,
        }
    }
}

pub fn solid_buffer(rgb: [u8; 3], input_size: (u32, u32)) -> PreprocessedBuffer {
    let (width, height) = (64, 48);
    let frame = Frame {
        pixels: (0..width * height).flat_map(|_| rgb).collect::<Vec<u8>>().into(),
        width,
        height,
        pixel_format: PixelFormat::Rgb8,
        orientation: ExifOrientation::RightTop,
        timestamp: Instant::now(),
    };
    preprocess(&frame, input_size).unwrap()
}
