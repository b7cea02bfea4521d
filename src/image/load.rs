//! Image loading utilities.

use std::fs;
use std::path::Path;

use image::{DynamicImage, ImageBuffer, Pixel};
use ndarray::Array3;

use crate::error::{Error, Result};

use super::{ImageTensor, MAX_CHANNELS};

/// Where encoded image bytes come from.
#[derive(Debug, Clone, Copy)]
pub enum ImageSource<'a> {
    /// Read the file first, then decode its contents.
    Path(&'a Path),
    /// Already-read encoded bytes.
    Bytes(&'a [u8]),
}

/// Decode an image into a normalized HWC array with exactly `channels` channels.
///
/// The container format is guessed from the content, so JPEG, PNG and the
/// other formats enabled in the `image` crate are all accepted. The source is
/// converted as follows:
///
/// | channels | layout          |
/// |----------|-----------------|
/// | 1        | luma            |
/// | 2        | luma + alpha    |
/// | 3        | RGB             |
/// | 4        | RGBA            |
///
/// # Errors
///
/// Returns [`Error::Io`] if a path cannot be read, [`Error::Decode`] if the
/// bytes are not a supported image, and [`Error::InvalidParameter`] if
/// `channels` is outside `1..=4`.
pub fn decode(source: ImageSource<'_>, channels: usize) -> Result<ImageTensor> {
    if !(1..=MAX_CHANNELS).contains(&channels) {
        return Err(Error::invalid(
            "channels",
            format!("must be between 1 and {MAX_CHANNELS}, got {channels}"),
        ));
    }

    let img = match source {
        ImageSource::Path(path) => {
            let bytes = fs::read(path).map_err(|source| Error::io(path, source))?;
            image::load_from_memory(&bytes).map_err(|source| Error::Decode {
                path: Some(path.to_path_buf()),
                source,
            })?
        }
        ImageSource::Bytes(bytes) => {
            image::load_from_memory(bytes).map_err(|source| Error::Decode { path: None, source })?
        }
    };

    tracing::debug!(
        "Decoded {}x{} {:?} image into {channels} channel(s)",
        img.width(),
        img.height(),
        img.color()
    );

    image_to_tensor(&img, channels)
}

/// Read and decode an image file.
///
/// # Errors
///
/// See [`decode`].
pub fn read_image<P: AsRef<Path>>(path: P, channels: usize) -> Result<ImageTensor> {
    decode(ImageSource::Path(path.as_ref()), channels)
}

/// Decode in-memory encoded bytes.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_bytes(bytes: &[u8], channels: usize) -> Result<ImageTensor> {
    decode(ImageSource::Bytes(bytes), channels)
}

/// Convert a `DynamicImage` to a normalized HWC array.
fn image_to_tensor(img: &DynamicImage, channels: usize) -> Result<ImageTensor> {
    match channels {
        1 => buffer_to_tensor(img.to_luma32f()),
        2 => buffer_to_tensor(img.to_luma_alpha32f()),
        3 => buffer_to_tensor(img.to_rgb32f()),
        _ => buffer_to_tensor(img.to_rgba32f()),
    }
}

/// Float buffers are already in [0, 1] and stored row-major with interleaved
/// channels, which is exactly HWC.
fn buffer_to_tensor<P>(buffer: ImageBuffer<P, Vec<f32>>) -> Result<ImageTensor>
where
    P: Pixel<Subpixel = f32>,
{
    let height = buffer.height() as usize;
    let width = buffer.width() as usize;
    let channels = usize::from(P::CHANNEL_COUNT);

    Array3::from_shape_vec((height, width, channels), buffer.into_raw()).map_err(|err| {
        Error::ShapeMismatch {
            expected: format!("{height}x{width}x{channels}"),
            actual: err.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    #[test]
    fn test_decode_forces_single_channel() {
        let bytes = encode(&gradient(40, 30), ImageFormat::Png);
        let tensor = decode_bytes(&bytes, 1).unwrap();

        assert_eq!(tensor.dim(), (30, 40, 1));
    }

    #[test]
    fn test_decode_rgb_from_jpeg() {
        let bytes = encode(&gradient(64, 48), ImageFormat::Jpeg);
        let tensor = decode_bytes(&bytes, 3).unwrap();

        assert_eq!(tensor.dim(), (48, 64, 3));
    }

    #[test]
    fn test_normalization_range() {
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 255, 255])));
        let tensor = decode_bytes(&encode(&white, ImageFormat::Png), 1).unwrap();

        let min = tensor.iter().copied().fold(f32::INFINITY, f32::min);
        let max = tensor.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        assert!((min - 1.0).abs() < 0.01);
        assert!((max - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = decode_bytes(b"definitely not an image", 1).unwrap_err();
        assert!(matches!(err, Error::Decode { path: None, .. }));
    }

    #[test]
    fn test_decode_missing_file() {
        let err = read_image("/nonexistent/upsample/test.jpg", 1).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_invalid_channel_count() {
        let bytes = encode(&gradient(4, 4), ImageFormat::Png);
        assert!(matches!(
            decode_bytes(&bytes, 0),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            decode_bytes(&bytes, 5),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
