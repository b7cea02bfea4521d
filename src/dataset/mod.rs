//! Patch datasets for super-resolution training.
//!
//! A [`DatasetFactory`] turns a source image into an endless stream of random
//! square patches; [`DatasetFactory::add_downsampled`] pairs every patch with
//! a synthesized low-resolution companion.

mod batch;
mod downsample;
mod factory;

pub use batch::stack_batch;
pub use downsample::{DownsampleOptions, Downsampled};
pub use factory::{DatasetFactory, Patches};

use std::path::{Path, PathBuf};

use crate::image::ImageTensor;
use crate::record::Record;

/// Record key of the high-resolution patch.
pub const HR_KEY: &str = "hrimage";

/// Record key of the low-resolution companion.
pub const LR_KEY: &str = "lrimage";

/// Image file extensions picked up by [`DatasetFactory::sources`].
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// A training sample: named image arrays.
pub type PatchRecord = Record<ImageTensor>;

/// Identifies one source image.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceDescriptor {
    pub path: PathBuf,
}

impl SourceDescriptor {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl From<PathBuf> for SourceDescriptor {
    fn from(path: PathBuf) -> Self {
        Self { path }
    }
}

impl From<&Path> for SourceDescriptor {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}
