//! Resampling with selectable interpolation.

use std::fmt;
use std::str::FromStr;

use image::{imageops, imageops::FilterType, ImageBuffer, Luma};
use ndarray::{Array2, Array3, ArrayView2, Axis};

use crate::error::{Error, Result};

use super::ImageTensor;

/// Interpolation used when resizing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResizeMethod {
    Bilinear,
    NearestNeighbor,
    #[default]
    Bicubic,
    /// Box average weighted by the fraction of each source pixel covered.
    Area,
    /// Frequency-domain resampling. Recognized but not implemented.
    Fft,
}

impl ResizeMethod {
    /// Name used in configs and on the command line.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bilinear => "bilinear",
            Self::NearestNeighbor => "nearest_neighbor",
            Self::Bicubic => "bicubic",
            Self::Area => "area",
            Self::Fft => "fft",
        }
    }

    /// `image` filter backing this method, `None` for methods resampled here.
    const fn filter(self) -> Option<FilterType> {
        match self {
            Self::Bilinear => Some(FilterType::Triangle),
            Self::NearestNeighbor => Some(FilterType::Nearest),
            Self::Bicubic => Some(FilterType::CatmullRom),
            Self::Area | Self::Fft => None,
        }
    }
}

impl fmt::Display for ResizeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResizeMethod {
    type Err = Error;

    /// Case-insensitive. Unknown names are reported as not implemented.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bilinear" => Ok(Self::Bilinear),
            "nearest_neighbor" => Ok(Self::NearestNeighbor),
            "bicubic" => Ok(Self::Bicubic),
            "area" => Ok(Self::Area),
            "fft" => Ok(Self::Fft),
            _ => Err(Error::NotImplemented {
                method: s.to_string(),
            }),
        }
    }
}

/// Downsample `image` by `scale` on both axes.
///
/// The new size is `floor(size * scale)` per axis, so a 201 pixel side at
/// scale 0.5 becomes 100.
///
/// # Errors
///
/// Returns [`Error::NotImplemented`] for [`ResizeMethod::Fft`] and
/// [`Error::InvalidParameter`] if `scale` is not a positive finite number or
/// would shrink an axis to zero.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn downsample(image: &ImageTensor, method: ResizeMethod, scale: f64) -> Result<ImageTensor> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(Error::invalid(
            "scale",
            format!("must be a positive finite number, got {scale}"),
        ));
    }

    let (height, width, _) = image.dim();
    // Safe: scale is positive and finite, the product is non-negative
    let new_height = (height as f64 * scale) as usize;
    let new_width = (width as f64 * scale) as usize;

    if new_height == 0 || new_width == 0 {
        return Err(Error::invalid(
            "scale",
            format!("{scale} reduces {height}x{width} to an empty image"),
        ));
    }

    resize(image, method, new_height, new_width)
}

/// Resize `image` to exactly `height` x `width`, channel by channel.
///
/// Output values are clamped to [0, 1] since cubic kernels overshoot.
///
/// # Errors
///
/// Returns [`Error::NotImplemented`] for [`ResizeMethod::Fft`] and
/// [`Error::InvalidParameter`] for an empty source or target.
pub fn resize(
    image: &ImageTensor,
    method: ResizeMethod,
    height: usize,
    width: usize,
) -> Result<ImageTensor> {
    if method == ResizeMethod::Fft {
        return Err(Error::NotImplemented {
            method: method.name().to_string(),
        });
    }

    let (src_height, src_width, channels) = image.dim();
    if src_height == 0 || src_width == 0 || height == 0 || width == 0 {
        return Err(Error::invalid(
            "shape",
            format!("cannot resize {src_height}x{src_width} to {height}x{width}"),
        ));
    }

    let mut output = Array3::<f32>::zeros((height, width, channels));
    for (channel, plane) in image.axis_iter(Axis(2)).enumerate() {
        let resized = match method.filter() {
            Some(filter) => resize_filtered(plane, filter, height, width)?,
            None => resize_area(plane, height, width),
        };
        output.index_axis_mut(Axis(2), channel).assign(&resized);
    }

    output.mapv_inplace(|v| v.clamp(0.0, 1.0));
    Ok(output)
}

/// Resize one channel through the `image` crate's separable filters.
fn resize_filtered(
    plane: ArrayView2<'_, f32>,
    filter: FilterType,
    height: usize,
    width: usize,
) -> Result<Array2<f32>> {
    let (src_height, src_width) = plane.dim();
    let raw: Vec<f32> = plane.iter().copied().collect();

    let buffer: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_raw(to_u32(src_width)?, to_u32(src_height)?, raw).ok_or_else(|| {
            Error::ShapeMismatch {
                expected: format!("{src_height}x{src_width} plane"),
                actual: "short buffer".to_string(),
            }
        })?;

    let resized = imageops::resize(&buffer, to_u32(width)?, to_u32(height)?, filter);

    Array2::from_shape_vec((height, width), resized.into_raw()).map_err(|err| {
        Error::ShapeMismatch {
            expected: format!("{height}x{width}"),
            actual: err.to_string(),
        }
    })
}

/// Area resampling: every output pixel is the mean of the source region it
/// covers, with partially covered source pixels weighted by their overlap.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn resize_area(plane: ArrayView2<'_, f32>, height: usize, width: usize) -> Array2<f32> {
    let (src_height, src_width) = plane.dim();
    let scale_y = src_height as f64 / height as f64;
    let scale_x = src_width as f64 / width as f64;

    let rows: Vec<Vec<(usize, f64)>> = (0..height)
        .map(|i| coverage(i, scale_y, src_height))
        .collect();
    let cols: Vec<Vec<(usize, f64)>> = (0..width)
        .map(|i| coverage(i, scale_x, src_width))
        .collect();
    let norm = scale_y * scale_x;

    Array2::from_shape_fn((height, width), |(y, x)| {
        let mut acc = 0.0_f64;
        for &(sy, wy) in &rows[y] {
            for &(sx, wx) in &cols[x] {
                acc += f64::from(plane[[sy, sx]]) * wy * wx;
            }
        }
        (acc / norm) as f32
    })
}

/// Source indices overlapped by output cell `index` and the overlap lengths.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn coverage(index: usize, scale: f64, limit: usize) -> Vec<(usize, f64)> {
    let start = index as f64 * scale;
    let end = start + scale;
    // Safe: start and end are non-negative and end is clamped to limit
    let first = start.floor() as usize;
    let last = (end.ceil() as usize).min(limit);

    (first..last)
        .filter_map(|i| {
            let lo = (i as f64).max(start);
            let hi = ((i + 1) as f64).min(end);
            let weight = hi - lo;
            (weight > 0.0).then_some((i, weight))
        })
        .collect()
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::invalid("dimension", format!("{value} exceeds u32")))
}
