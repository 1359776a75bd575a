use crate::error::PipelineError;
use crate::inference_engine::model_config::ModelConfig;
use crate::library::logger::interface::LogLevel;
use chrono::{Offset, Utc};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceFacing {
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub target_fps: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub device_facing: DeviceFacing,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_fps: 10,
            frame_width: 299,
            frame_height: 299,
            device_facing: DeviceFacing::Back,
        }
    }
}

impl CaptureConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.target_fps == 0 {
            return Err(PipelineError::InvalidConfig(
                "target_fps must be greater than zero".to_string(),
            ));
        }

        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "frame size must be non-zero, got {}x{}",
                self.frame_width, self.frame_height
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub capture: CaptureConfig,
    pub model: ModelConfig,
    /// `None` lets a slow inference hold the pipeline busy until it returns.
    pub inference_deadline: Option<Duration>,
    pub tick_rate: Duration,
    /// Offset log timestamps are rendered in. UTC unless the host sets one.
    pub logger_timezone: chrono::FixedOffset,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            model: ModelConfig::default(),
            inference_deadline: None,
            tick_rate: Duration::from_millis(50),
            logger_timezone: Utc.fix(),
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.capture.validate()?;
        self.model.validate()?;

        if self.inference_deadline.is_some() && self.tick_rate.is_zero() {
            return Err(PipelineError::InvalidConfig(
                "tick_rate must be non-zero when an inference deadline is set".to_string(),
            ));
        }

        Ok(())
    }

    /// Size the preprocessor scales frames to, as `(width, height)`.
    pub fn model_input_size(&self) -> (u32, u32) {
        (self.model.input_shape.1, self.model.input_shape.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_reference_deployment() {
        let config = Config::default();

        assert_eq!(config.capture.target_fps, 10);
        assert_eq!(config.capture.frame_width, 299);
        assert_eq!(config.capture.frame_height, 299);
        assert_eq!(config.capture.device_facing, DeviceFacing::Back);
        assert_eq!(config.model_input_size(), (299, 299));
        assert!(config.inference_deadline.is_none());
        assert_eq!(config.logger_timezone.local_minus_utc(), 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_frame_interval() {
        let capture = CaptureConfig::default();
        assert_eq!(capture.frame_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_rejects_zero_fps_and_empty_frames() {
        let mut capture = CaptureConfig::default();
        capture.target_fps = 0;
        assert!(matches!(
            capture.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));

        let mut capture = CaptureConfig::default();
        capture.frame_height = 0;
        assert!(matches!(
            capture.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }
}
