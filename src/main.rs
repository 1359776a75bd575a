use live_classifier::config::Config;
use live_classifier::frame_source::interface::FrameSource;
use live_classifier::inference_engine::impl_fake::InferenceEngineFake;
use live_classifier::inference_engine::impl_tract_onnx::InferenceEngineTractOnnx;
use live_classifier::inference_engine::interface::{EngineLoader, InferenceEngine};
use live_classifier::library::logger::impl_console::LoggerConsole;
use live_classifier::library::logger::interface::Logger;
use live_classifier::pipeline::ClassificationPipeline;
use live_classifier::result_sink::impl_console::ResultSinkConsole;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const RUN_FOR: Duration = Duration::from_secs(5);

/// Usage: `live-classifier [model.onnx [labels.txt]]`. Without a model the fake engine is used.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let model_path = args.next().map(PathBuf::from);
    let labels_path = args.next().map(PathBuf::from);

    let mut config = Config::default();
    if let Some(path) = &model_path {
        config.model.onnx_model_path = path.clone();
        config.model.labels_path = labels_path;
    }

    let logger: Arc<dyn Logger + Send + Sync> =
        Arc::new(LoggerConsole::new(config.logger_timezone, config.log_level));

    let frame_source = frame_source(&config, logger.clone());

    let engine_loader: EngineLoader = {
        let model = config.model.clone();
        let input_size = config.model_input_size();
        let logger = logger.clone();
        let use_model = model_path.is_some();
        Box::new(move || {
            let engine: Arc<dyn InferenceEngine + Send + Sync> = if use_model {
                Arc::new(InferenceEngineTractOnnx::load_model(
                    model.clone(),
                    logger.clone(),
                )?)
            } else {
                Arc::new(
                    InferenceEngineFake::new(logger.clone(), input_size)
                        .with_latency(Duration::from_millis(250)),
                )
            };
            Ok(engine)
        })
    };

    let sink = Arc::new(ResultSinkConsole::new(logger.clone()));

    let pipeline =
        ClassificationPipeline::new(config, logger.clone(), frame_source, engine_loader, sink)?;

    pipeline.start()?;
    std::thread::sleep(RUN_FOR);
    pipeline.stop();

    let stats = pipeline.stats();
    let _ = logger.info(&format!(
        "Received {} frames, classified {}, dropped {} ({:.0}%), {} errors",
        stats.frames_received,
        stats.results_published,
        stats.frames_dropped,
        stats.drop_rate() * 100.0,
        stats.errors_reported
    ));

    Ok(())
}

#[cfg(feature = "opencv")]
fn frame_source(
    config: &Config,
    logger: Arc<dyn Logger + Send + Sync>,
) -> Arc<dyn FrameSource + Send + Sync> {
    use live_classifier::frame_source::impl_opencv::FrameSourceOpenCv;

    Arc::new(FrameSourceOpenCv::new(config.capture.clone(), logger))
}

#[cfg(not(feature = "opencv"))]
fn frame_source(
    config: &Config,
    logger: Arc<dyn Logger + Send + Sync>,
) -> Arc<dyn FrameSource + Send + Sync> {
    use live_classifier::frame_source::impl_fake::FrameSourceFake;

    Arc::new(FrameSourceFake::new(config.capture.clone(), logger).with_generator(0.05))
}
