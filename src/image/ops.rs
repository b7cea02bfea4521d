//! Shape-level operations: channel checks, crops and padding.
//!
//! Spatial arguments always follow (height, width) order.

use ndarray::{s, Array3};

use crate::error::{Error, Result};

use super::{ImageBatch, ImageTensor};

/// Check that `image` carries exactly `channels` channels.
///
/// The channel axis of an array is part of its data layout, so this never
/// rewrites anything; a mismatch is reported instead of papered over.
///
/// # Errors
///
/// Returns [`Error::ChannelMismatch`] if the channel axis differs.
pub fn ensure_channels(image: ImageTensor, channels: usize) -> Result<ImageTensor> {
    let actual = image.dim().2;
    if actual == channels {
        Ok(image)
    } else {
        Err(Error::ChannelMismatch {
            expected: channels,
            actual,
        })
    }
}

/// Center-crop or zero-pad `image` to `height` x `width`.
///
/// Each axis is handled independently: larger axes are cropped around the
/// center, smaller ones are padded evenly on both sides (the extra pixel of
/// an odd difference goes to the bottom/right).
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if a target dimension is zero.
pub fn crop_or_pad(image: &ImageTensor, height: usize, width: usize) -> Result<ImageTensor> {
    if height == 0 || width == 0 {
        return Err(Error::invalid(
            "target shape",
            format!("{height}x{width} has an empty axis"),
        ));
    }

    let (current_height, current_width, channels) = image.dim();
    let rows = AxisWindow::new(current_height, height);
    let cols = AxisWindow::new(current_width, width);

    let mut output = Array3::<f32>::zeros((height, width, channels));
    output
        .slice_mut(s![
            rows.dst..rows.dst + rows.len,
            cols.dst..cols.dst + cols.len,
            ..
        ])
        .assign(&image.slice(s![
            rows.src..rows.src + rows.len,
            cols.src..cols.src + cols.len,
            ..
        ]));

    Ok(output)
}

/// Run `image` through [`crop_or_pad`] with its own shape.
///
/// The result has the same shape and pixels in standard (row-major) layout,
/// which is what downstream patching expects.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] for an empty image.
pub fn normalize_shape(image: &ImageTensor) -> Result<ImageTensor> {
    let (height, width, _) = image.dim();
    crop_or_pad(image, height, width)
}

/// Extract the `height` x `width` window whose top-left corner is `(top, left)`.
///
/// # Errors
///
/// Returns [`Error::Size`] if the window leaves the image.
pub fn crop_to_box(
    image: &ImageTensor,
    top: usize,
    left: usize,
    height: usize,
    width: usize,
) -> Result<ImageTensor> {
    let (image_height, image_width, _) = image.dim();
    if top + height > image_height || left + width > image_width {
        return Err(Error::Size {
            requested_height: top + height,
            requested_width: left + width,
            height: image_height,
            width: image_width,
        });
    }

    Ok(image
        .slice(s![top..top + height, left..left + width, ..])
        .to_owned())
}

/// Center-crop every image in an NHWC batch to `target` (height, width).
///
/// A batch that already has the target size is returned as is.
///
/// # Errors
///
/// Returns [`Error::Size`] if the batch is smaller than `target` on either axis.
pub fn center_crop_to_box(batch: ImageBatch, target: (usize, usize)) -> Result<ImageBatch> {
    let (target_height, target_width) = target;
    let (_, height, width, _) = batch.dim();

    if height < target_height || width < target_width {
        return Err(Error::Size {
            requested_height: target_height,
            requested_width: target_width,
            height,
            width,
        });
    }

    if (height, width) == target {
        return Ok(batch);
    }

    let offset_height = (height - target_height) / 2;
    let offset_width = (width - target_width) / 2;

    Ok(batch
        .slice(s![
            ..,
            offset_height..offset_height + target_height,
            offset_width..offset_width + target_width,
            ..
        ])
        .to_owned())
}

/// Source/destination ranges along one axis for a centered crop or pad.
struct AxisWindow {
    src: usize,
    dst: usize,
    len: usize,
}

impl AxisWindow {
    const fn new(current: usize, target: usize) -> Self {
        if current >= target {
            Self {
                src: (current - target) / 2,
                dst: 0,
                len: target,
            }
        } else {
            Self {
                src: 0,
                dst: (target - current) / 2,
                len: current,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};

    fn ramp(height: usize, width: usize) -> ImageTensor {
        Array3::from_shape_fn((height, width, 1), |(y, x, _)| (y * width + x) as f32)
    }

    #[test]
    fn test_ensure_channels() {
        let image = Array3::<f32>::zeros((4, 4, 1));
        assert!(ensure_channels(image.clone(), 1).is_ok());

        let err = ensure_channels(image, 3).unwrap_err();
        assert!(matches!(
            err,
            Error::ChannelMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_crop_centered() {
        let image = ramp(6, 8);
        let cropped = crop_or_pad(&image, 2, 4).unwrap();

        assert_eq!(cropped.dim(), (2, 4, 1));
        // Offsets are (6-2)/2 = 2 rows and (8-4)/2 = 2 columns.
        assert_eq!(cropped[[0, 0, 0]], image[[2, 2, 0]]);
        assert_eq!(cropped[[1, 3, 0]], image[[3, 5, 0]]);
    }

    #[test]
    fn test_pad_centered() {
        let image = Array3::<f32>::ones((2, 2, 1));
        let padded = crop_or_pad(&image, 4, 5).unwrap();

        assert_eq!(padded.dim(), (4, 5, 1));
        assert!((padded.sum() - 4.0).abs() < f32::EPSILON);
        assert!((padded[[1, 1, 0]] - 1.0).abs() < f32::EPSILON);
        assert!(padded[[0, 0, 0]].abs() < f32::EPSILON);
    }

    #[test]
    fn test_normalize_shape_is_identity() {
        let image = ramp(5, 7);
        assert_eq!(normalize_shape(&image).unwrap(), image);
    }

    #[test]
    fn test_crop_to_box_bounds() {
        let image = ramp(10, 10);
        let patch = crop_to_box(&image, 3, 4, 5, 6).unwrap();
        assert_eq!(patch.dim(), (5, 6, 1));
        assert_eq!(patch[[0, 0, 0]], image[[3, 4, 0]]);

        assert!(matches!(
            crop_to_box(&image, 6, 0, 5, 5),
            Err(Error::Size { .. })
        ));
    }

    #[test]
    fn test_center_crop_batch_uses_height_and_width() {
        let batch = Array4::from_shape_fn((2, 8, 12, 1), |(_, y, x, _)| (y * 100 + x) as f32);
        let cropped = center_crop_to_box(batch, (4, 6)).unwrap();

        assert_eq!(cropped.dim(), (2, 4, 6, 1));
        // Offsets: (8-4)/2 = 2, (12-6)/2 = 3.
        assert!((cropped[[1, 0, 0, 0]] - 203.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_center_crop_noop_and_too_small() {
        let batch = Array4::<f32>::ones((1, 4, 4, 1));
        assert_eq!(center_crop_to_box(batch.clone(), (4, 4)).unwrap(), batch);
        assert!(matches!(
            center_crop_to_box(batch, (5, 4)),
            Err(Error::Size { .. })
        ));
    }
}
