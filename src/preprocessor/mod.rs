pub mod image;

pub use self::image::{preprocess, PreprocessedBuffer};
