//! Image saving utilities.

use std::fs;
use std::path::Path;

use image::{DynamicImage, ImageBuffer};

use crate::error::{Error, Result};

use super::ImageTensor;

/// Save a normalized HWC array as an image file.
///
/// The array is:
/// 1. Denormalized from [0, 1] to [0, 255]
/// 2. Interpreted as luma, luma + alpha, RGB or RGBA by its channel count
/// 3. Saved to the specified path (format inferred from extension)
///
/// Parent directories are created as needed. JPEG output drops the alpha
/// channel since the encoder cannot store it.
///
/// # Arguments
///
/// * `tensor` - HWC array with values in [0, 1]
/// * `path` - Output file path
/// * `quality` - JPEG quality (1-100), ignored for other formats
///
/// # Errors
///
/// Returns an error if the array has an unsupported channel count or the
/// image cannot be written.
pub fn save_image<P: AsRef<Path>>(tensor: &ImageTensor, path: P, quality: u8) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::io(parent, source))?;
    }

    let img = tensor_to_image(tensor)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png")
        .to_lowercase();

    match extension.as_str() {
        "jpg" | "jpeg" => {
            let img = if img.color().has_alpha() {
                drop_alpha(&img)
            } else {
                img
            };
            let mut output = fs::File::create(path).map_err(|source| Error::io(path, source))?;
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
            img.write_with_encoder(encoder)
                .map_err(|source| Error::Save {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        _ => {
            img.save(path).map_err(|source| Error::Save {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }

    Ok(())
}

/// Convert a normalized HWC array to an 8-bit image.
fn tensor_to_image(tensor: &ImageTensor) -> Result<DynamicImage> {
    let (height, width, channels) = tensor.dim();
    let raw: Vec<u8> = tensor.iter().copied().map(denormalize).collect();

    let (width, height) = (
        u32::try_from(width).map_err(|_| Error::invalid("width", "exceeds u32"))?,
        u32::try_from(height).map_err(|_| Error::invalid("height", "exceeds u32"))?,
    );
    let short = || Error::ShapeMismatch {
        expected: format!("{height}x{width}x{channels}"),
        actual: "short buffer".to_string(),
    };

    let img = match channels {
        1 => DynamicImage::ImageLuma8(
            ImageBuffer::from_raw(width, height, raw).ok_or_else(short)?,
        ),
        2 => DynamicImage::ImageLumaA8(
            ImageBuffer::from_raw(width, height, raw).ok_or_else(short)?,
        ),
        3 => DynamicImage::ImageRgb8(
            ImageBuffer::from_raw(width, height, raw).ok_or_else(short)?,
        ),
        4 => DynamicImage::ImageRgba8(
            ImageBuffer::from_raw(width, height, raw).ok_or_else(short)?,
        ),
        other => {
            return Err(Error::invalid(
                "channels",
                format!("cannot save an image with {other} channels"),
            ))
        }
    };

    Ok(img)
}

fn drop_alpha(img: &DynamicImage) -> DynamicImage {
    if img.color().has_color() {
        DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        DynamicImage::ImageLuma8(img.to_luma8())
    }
}

/// Denormalize a value from [0, 1] to [0, 255] with clamping.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn denormalize(value: f32) -> u8 {
    // Safe: clamped to [0, 255] range before casting
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::read_image;
    use ndarray::Array3;

    #[test]
    fn test_denormalize() {
        assert_eq!(denormalize(0.0), 0);
        assert_eq!(denormalize(0.5), 128);
        assert_eq!(denormalize(1.0), 255);
    }

    #[test]
    fn test_denormalize_clamp() {
        assert_eq!(denormalize(-1.0), 0);
        assert_eq!(denormalize(2.0), 255);
    }

    #[test]
    fn test_save_png_roundtrip_gray() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("patch.png");
        let image = Array3::from_shape_fn((6, 9, 1), |(y, x, _)| {
            if (y + x) % 2 == 0 {
                1.0_f32
            } else {
                0.0
            }
        });

        save_image(&image, &path, 95).unwrap();
        let loaded = read_image(&path, 1).unwrap();

        assert_eq!(loaded.dim(), (6, 9, 1));
        assert!(loaded
            .iter()
            .zip(image.iter())
            .all(|(a, b)| (a - b).abs() < 1e-3));
    }

    #[test]
    fn test_save_jpeg_with_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.jpg");
        let image = Array3::<f32>::from_elem((8, 8, 4), 0.5);

        save_image(&image, &path, 90).unwrap();
        assert_eq!(read_image(&path, 3).unwrap().dim(), (8, 8, 3));
    }

    #[test]
    fn test_save_rejects_odd_channels() {
        let dir = tempfile::tempdir().unwrap();
        let image = Array3::<f32>::zeros((2, 2, 5));
        assert!(save_image(&image, dir.path().join("x.png"), 90).is_err());
    }
}
