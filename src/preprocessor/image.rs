use crate::error::PipelineError;
use crate::frame_source::interface::{Frame, PixelFormat};
use crate::frame_source::orientation::ExifOrientation;
use image::{imageops, RgbImage};
use std::time::Instant;

/// Model-ready input: planar RGB (`1x3xHxW`) scaled to `[0, 1]`.
#[derive(Clone, PartialEq)]
pub struct PreprocessedBuffer {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub orientation: ExifOrientation,
    pub source_timestamp: Instant,
}

impl PreprocessedBuffer {
    pub fn shape(&self) -> [usize; 4] {
        [1, 3, self.height as usize, self.width as usize]
    }
}

impl std::fmt::Debug for PreprocessedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreprocessedBuffer")
            .field("shape", &self.shape())
            .field("orientation", &self.orientation)
            .field("source_timestamp", &self.source_timestamp)
            .finish()
    }
}

/// Aspect-fill `frame` into `target_size` (width, height) and lay it out for the model.
///
/// Pure: the same frame and size always produce the same buffer. Orientation
/// is carried through untouched for the engine to interpret.
pub fn preprocess(
    frame: &Frame,
    target_size: (u32, u32),
) -> Result<PreprocessedBuffer, PipelineError> {
    let (target_width, target_height) = target_size;
    if target_width == 0 || target_height == 0 {
        return Err(PipelineError::PreprocessFailure(format!(
            "target size must be non-zero, got {}x{}",
            target_width, target_height
        )));
    }

    let rgb = frame_to_rgb(frame)?;
    let filled = aspect_fill(&rgb, target_width, target_height);

    Ok(PreprocessedBuffer {
        data: image_to_chw(&filled),
        width: target_width,
        height: target_height,
        orientation: frame.orientation,
        source_timestamp: frame.timestamp,
    })
}

fn frame_to_rgb(frame: &Frame) -> Result<RgbImage, PipelineError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(PipelineError::PreprocessFailure(format!(
            "frame has zero dimension {}x{}",
            frame.width, frame.height
        )));
    }

    let bytes_per_pixel = frame.pixel_format.bytes_per_pixel().ok_or_else(|| {
        PipelineError::PreprocessFailure(format!(
            "unsupported pixel format {:?}",
            frame.pixel_format
        ))
    })?;

    let expected = frame.width as usize * frame.height as usize * bytes_per_pixel;
    if frame.pixels.len() != expected {
        return Err(PipelineError::PreprocessFailure(format!(
            "expected {} bytes for {}x{} {:?}, got {}",
            expected,
            frame.width,
            frame.height,
            frame.pixel_format,
            frame.pixels.len()
        )));
    }

    let pixels = &frame.pixels;
    let rgb: Vec<u8> = match frame.pixel_format {
        PixelFormat::Rgb8 => pixels.to_vec(),
        PixelFormat::Bgr8 => pixels
            .chunks_exact(3)
            .flat_map(|p| [p[2], p[1], p[0]])
            .collect(),
        PixelFormat::Rgba8 => pixels
            .chunks_exact(4)
            .flat_map(|p| [p[0], p[1], p[2]])
            .collect(),
        PixelFormat::Bgra8 => pixels
            .chunks_exact(4)
            .flat_map(|p| [p[2], p[1], p[0]])
            .collect(),
        PixelFormat::Gray8 => pixels.iter().flat_map(|&v| [v, v, v]).collect(),
        PixelFormat::Nv12 => {
            return Err(PipelineError::PreprocessFailure(
                "unsupported pixel format Nv12".to_string(),
            ))
        }
    };

    RgbImage::from_raw(frame.width, frame.height, rgb).ok_or_else(|| {
        PipelineError::PreprocessFailure("pixel buffer does not match frame size".to_string())
    })
}

/// Centre-crop the largest window with the target's aspect ratio, then scale
/// that window to the target. Intermediate buffers never exceed the source.
pub fn aspect_fill(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (source_width, source_height) = image.dimensions();
    let (w, h) = (source_width as u64, source_height as u64);

    let (crop_width, crop_height) = if w * height as u64 > h * width as u64 {
        (((h * width as u64) / height as u64).max(1) as u32, source_height)
    } else {
        (source_width, ((w * height as u64) / width as u64).max(1) as u32)
    };

    let window = imageops::crop_imm(
        image,
        (source_width - crop_width) / 2,
        (source_height - crop_height) / 2,
        crop_width,
        crop_height,
    )
    .to_image();

    if window.dimensions() == (width, height) {
        window
    } else {
        imageops::resize(&window, width, height, imageops::FilterType::Triangle)
    }
}

fn image_to_chw(image: &RgbImage) -> Vec<f32> {
    let plane = (image.width() * image.height()) as usize;
    let mut data = vec![0f32; plane * 3];

    for (index, pixel) in image.pixels().enumerate() {
        for c in 0..3 {
            data[c * plane + index] = pixel[c] as f32 / 255.0;
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn frame(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Frame {
        Frame {
            pixels: Arc::from(pixels),
            width,
            height,
            pixel_format: format,
            orientation: ExifOrientation::RightTop,
            timestamp: Instant::now(),
        }
    }

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let pixels = (0..width * height).flat_map(|_| rgb).collect();
        frame(width, height, PixelFormat::Rgb8, pixels)
    }

    #[test]
    fn test_solid_frame_to_299_square() {
        let input = solid(640, 480, [255, 0, 0]);

        let buffer = preprocess(&input, (299, 299)).unwrap();
        let plane = 299 * 299;

        assert_eq!(buffer.shape(), [1, 3, 299, 299]);
        assert_eq!(buffer.data.len(), 3 * plane);
        assert!(buffer.data[..plane].iter().all(|&v| v == 1.0));
        assert!(buffer.data[plane..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_repeated_calls_are_deterministic() {
        let pixels = (0..320u32 * 240)
            .flat_map(|i| {
                let (x, y) = (i % 320, i / 320);
                [(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8]
            })
            .collect();
        let input = frame(320, 240, PixelFormat::Rgb8, pixels);

        let first = preprocess(&input, (299, 299)).unwrap();
        let second = preprocess(&input, (299, 299)).unwrap();

        assert_eq!(first.data.len(), 3 * 299 * 299);
        assert_eq!(first, second);
    }

    #[test]
    fn test_aspect_fill_crops_instead_of_padding() {
        // 200x100: left quarter blue, rest red. Filling 100x100 keeps the centre.
        let pixels = (0..200u32 * 100)
            .flat_map(|i| if i % 200 < 50 { [0, 0, 255] } else { [255, 0, 0] })
            .collect();
        let input = frame(200, 100, PixelFormat::Rgb8, pixels);

        let buffer = preprocess(&input, (100, 100)).unwrap();
        let plane = 100 * 100;

        assert!(buffer.data[..plane].iter().all(|&v| v == 1.0));
        assert!(buffer.data[2 * plane..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_extreme_aspect_frames_stay_bounded() {
        // 2000x1 fills a square from its single centre pixel, x = 999.
        let pixels = (0..2000u32).flat_map(|x| [(x % 251) as u8, 7, 9]).collect();
        let wide = frame(2000, 1, PixelFormat::Rgb8, pixels);

        let started = Instant::now();
        let buffer = preprocess(&wide, (299, 299)).unwrap();
        let plane = 299 * 299;

        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(buffer.data.len(), 3 * plane);
        let red = (999 % 251) as f32 / 255.0;
        assert!(buffer.data[..plane].iter().all(|&v| (v - red).abs() < 1e-6));

        let tall = solid(1, 2000, [0, 255, 0]);
        let buffer = preprocess(&tall, (299, 299)).unwrap();
        assert!(buffer.data[plane..2 * plane].iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_channel_order_is_normalised_to_rgb() {
        let bgra = frame(2, 2, PixelFormat::Bgra8, [10, 20, 30, 255].repeat(4));
        let buffer = preprocess(&bgra, (2, 2)).unwrap();

        assert!((buffer.data[0] - 30.0 / 255.0).abs() < 1e-6);
        assert!((buffer.data[4] - 20.0 / 255.0).abs() < 1e-6);
        assert!((buffer.data[8] - 10.0 / 255.0).abs() < 1e-6);

        let gray = frame(2, 2, PixelFormat::Gray8, vec![51; 4]);
        let buffer = preprocess(&gray, (2, 2)).unwrap();
        assert!(buffer.data.iter().all(|&v| (v - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_metadata_passes_through() {
        let input = solid(10, 10, [1, 2, 3]);
        let buffer = preprocess(&input, (4, 4)).unwrap();

        assert_eq!(buffer.orientation, ExifOrientation::RightTop);
        assert_eq!(buffer.source_timestamp, input.timestamp);
    }

    #[test]
    fn test_malformed_frames_fail() {
        let empty = frame(0, 10, PixelFormat::Rgb8, vec![]);
        assert!(matches!(
            preprocess(&empty, (299, 299)),
            Err(PipelineError::PreprocessFailure(_))
        ));

        let planar = frame(4, 4, PixelFormat::Nv12, vec![0; 24]);
        assert!(matches!(
            preprocess(&planar, (299, 299)),
            Err(PipelineError::PreprocessFailure(_))
        ));

        let short = frame(4, 4, PixelFormat::Rgb8, vec![0; 47]);
        assert!(matches!(
            preprocess(&short, (299, 299)),
            Err(PipelineError::PreprocessFailure(_))
        ));

        let input = solid(4, 4, [0, 0, 0]);
        assert!(matches!(
            preprocess(&input, (0, 299)),
            Err(PipelineError::PreprocessFailure(_))
        ));
    }
}
