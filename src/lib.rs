pub mod config;
pub mod error;
pub mod frame_source;
pub mod inference_engine;
pub mod library;
pub mod pipeline;
pub mod preprocessor;
pub mod result_sink;
