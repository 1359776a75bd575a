pub mod distribution;
pub mod impl_fake;
pub mod impl_tract_onnx;
pub mod interface;
pub mod model_config;

#[cfg(test)]
mod tests;
