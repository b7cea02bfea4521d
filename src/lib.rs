//! # `upsample`
//!
//! Training data for single-image super-resolution.
//!
//! Full-resolution images are cut into random square patches and each patch
//! is paired with a synthetically downsampled copy, giving the
//! low-resolution / high-resolution pairs a super-resolution model learns
//! from. Training hyperparameters live in a small config file next to the
//! model and are validated against a reference set of keys when reloaded.
//!
//! ## Example
//!
//! ```no_run
//! use upsample::config::{self, ConfigStore, LoadOptions, TrainingParams};
//! use upsample::dataset::{DatasetFactory, DownsampleOptions, SourceDescriptor, HR_KEY};
//!
//! # fn main() -> upsample::Result<()> {
//! let store = ConfigStore::new("models/run1");
//! let options = LoadOptions::validated_against(config::defaults());
//! let params = match store.load(&options)? {
//!     Some(stored) => TrainingParams::from_config(&stored)?,
//!     None => TrainingParams::default(),
//! };
//!
//! let factory = DatasetFactory::from_params("data", &params)?;
//! let patches = factory.patches(&SourceDescriptor::new("data/photo.jpg"), HR_KEY)?;
//! let pairs = factory.add_downsampled(patches, &DownsampleOptions::from_params(&params))?;
//!
//! for pair in pairs.take(4) {
//!     let pair = pair?;
//!     println!("{:?}", pair.keys().collect::<Vec<_>>());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod image;
pub mod record;

pub use error::{Error, Result};
pub use record::Record;
