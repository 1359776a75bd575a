pub mod core;
pub mod main;
pub mod run_effect;
pub mod stats;
pub mod worker;


pub use self::main::ClassificationPipeline;
