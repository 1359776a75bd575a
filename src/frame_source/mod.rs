pub mod impl_fake;
#[cfg(feature = "opencv")]
pub mod impl_opencv;
pub mod interface;
pub mod orientation;
