//! Image decoding, cropping, resampling, and saving utilities.

mod load;
mod ops;
mod resize;
mod save;

pub use load::{decode, decode_bytes, read_image, ImageSource};
pub use ops::{center_crop_to_box, crop_or_pad, crop_to_box, ensure_channels, normalize_shape};
pub use resize::{downsample, resize, ResizeMethod};
pub use save::save_image;

use ndarray::{Array3, Array4};

/// Image array in HWC format (height, width, channels).
/// Values are normalized to [0, 1].
pub type ImageTensor = Array3<f32>;

/// Batch of images in NHWC format (batch, height, width, channels).
pub type ImageBatch = Array4<f32>;

/// Channel count used for training patches.
pub const GRAY_CHANNELS: usize = 1;

/// Largest channel count the decoder produces (RGBA).
pub const MAX_CHANNELS: usize = 4;
