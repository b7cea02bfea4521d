//! Random patch extraction.

use std::fs;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use ndarray::s;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::TrainingParams;
use crate::error::{Error, Result};
use crate::image::{self, ImageTensor, GRAY_CHANNELS};

use super::downsample::{DownsampleOptions, Downsampled};
use super::{PatchRecord, SourceDescriptor, IMAGE_EXTENSIONS};

/// Builds patch streams for a fixed patch size.
#[derive(Debug, Clone)]
pub struct DatasetFactory {
    base_dir: PathBuf,
    patch_size: usize,
    seed: Option<u64>,
}

impl DatasetFactory {
    /// Create a factory producing `patch_size` x `patch_size` patches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `patch_size` is zero.
    pub fn new<P: Into<PathBuf>>(base_dir: P, patch_size: usize) -> Result<Self> {
        if patch_size == 0 {
            return Err(Error::invalid("patch_size", "must be greater than 0"));
        }

        Ok(Self {
            base_dir: base_dir.into(),
            patch_size,
            seed: None,
        })
    }

    /// Create a factory from training parameters (patch size and seed).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the patch size is zero.
    pub fn from_params<P: Into<PathBuf>>(base_dir: P, params: &TrainingParams) -> Result<Self> {
        let factory = Self::new(base_dir, params.patch_size)?;
        Ok(match params.seed {
            Some(seed) => factory.with_seed(seed),
            None => factory,
        })
    }

    /// Make every patch stream start from the same seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[must_use]
    pub const fn patch_size(&self) -> usize {
        self.patch_size
    }

    /// List the image files directly inside the base directory, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be read.
    pub fn sources(&self) -> Result<Vec<SourceDescriptor>> {
        let entries =
            fs::read_dir(&self.base_dir).map_err(|source| Error::io(&self.base_dir, source))?;

        let mut sources = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| Error::io(&self.base_dir, source))?
                .path();
            if path.is_file() && has_image_extension(&path) {
                sources.push(SourceDescriptor::from(path));
            }
        }
        sources.sort();

        tracing::debug!(
            "Found {} source image(s) in {}",
            sources.len(),
            self.base_dir.display()
        );
        Ok(sources)
    }

    /// Decode `source` as grayscale and stream random patches stored under `output_key`.
    ///
    /// The stream never ends on its own; take as many patches as needed.
    ///
    /// # Errors
    ///
    /// Returns the decode error for unreadable images and [`Error::Size`] if
    /// the patch does not fit inside the image.
    pub fn patches(&self, source: &SourceDescriptor, output_key: &str) -> Result<Patches> {
        let image = image::read_image(&source.path, GRAY_CHANNELS)?;
        tracing::debug!("Extracting patches from {}", source.path.display());
        self.patches_from_image(image, output_key)
    }

    /// Stream random patches from an already decoded image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Size`] if the patch does not fit inside `image`.
    pub fn patches_from_image(&self, image: ImageTensor, output_key: &str) -> Result<Patches> {
        let (height, width, _) = image.dim();
        if self.patch_size > height || self.patch_size > width {
            return Err(Error::Size {
                requested_height: self.patch_size,
                requested_width: self.patch_size,
                height,
                width,
            });
        }

        tracing::debug!(
            "Drawing {size}x{size} patches from a {height}x{width} image",
            size = self.patch_size
        );

        let rng = self
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

        Ok(Patches {
            image,
            patch_size: self.patch_size,
            output_key: output_key.to_string(),
            rng,
        })
    }

    /// Attach a downsampled companion to every record of `patches`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotImplemented`] for an unimplemented method and
    /// [`Error::InvalidParameter`] if `options.scale` would shrink this
    /// factory's patches to nothing. Both are reported before any patch is
    /// drawn.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn add_downsampled<I>(
        &self,
        patches: I,
        options: &DownsampleOptions,
    ) -> Result<Downsampled<I::IntoIter>>
    where
        I: IntoIterator<Item = PatchRecord>,
    {
        if options.method == image::ResizeMethod::Fft {
            return Err(Error::NotImplemented {
                method: options.method.name().to_string(),
            });
        }

        let scale = options.scale;
        // Safe: only cast after checking the product is finite and positive
        if !scale.is_finite() || scale <= 0.0 || (self.patch_size as f64 * scale) as usize == 0 {
            return Err(Error::invalid(
                "scale",
                format!(
                    "{scale} cannot downsample {size}x{size} patches",
                    size = self.patch_size
                ),
            ));
        }

        Ok(Downsampled::new(patches.into_iter(), options.clone()))
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Endless stream of random square patches from one image.
///
/// Every draw picks a top-left corner uniformly among the positions where the
/// patch fits, independently of earlier draws.
#[derive(Debug)]
pub struct Patches {
    image: ImageTensor,
    patch_size: usize,
    output_key: String,
    rng: StdRng,
}

impl Patches {
    /// Height and width of the source image.
    #[must_use]
    pub fn source_shape(&self) -> (usize, usize) {
        let (height, width, _) = self.image.dim();
        (height, width)
    }
}

impl Iterator for Patches {
    type Item = PatchRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let (height, width) = self.source_shape();
        let top = self.rng.random_range(0..=height - self.patch_size);
        let left = self.rng.random_range(0..=width - self.patch_size);

        let size = self.patch_size;

        // Corner ranges keep the window inside the image.
        let patch = self
            .image
            .slice(s![top..top + size, left..left + size, ..])
            .to_owned();
        Some(PatchRecord::new().with(self.output_key.clone(), patch))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

impl FusedIterator for Patches {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{HR_KEY, LR_KEY};
    use ndarray::Array3;

    fn ramp(height: usize, width: usize) -> ImageTensor {
        Array3::from_shape_fn((height, width, 1), |(y, x, _)| {
            (y * width + x) as f32 / (height * width) as f32
        })
    }

    #[test]
    fn test_zero_patch_size() {
        assert!(matches!(
            DatasetFactory::new("", 0),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_patch_shape() {
        let factory = DatasetFactory::new("", 16).unwrap();
        let patches = factory.patches_from_image(ramp(40, 30), HR_KEY).unwrap();

        for record in patches.take(50) {
            assert_eq!(record.len(), 1);
            assert_eq!(record.get(HR_KEY).unwrap().dim(), (16, 16, 1));
        }
    }

    #[test]
    fn test_patch_is_contiguous_crop() {
        let width = 30;
        let image = ramp(20, width);
        let factory = DatasetFactory::new("", 5).unwrap().with_seed(3);

        for record in factory.patches_from_image(image.clone(), "output").unwrap().take(20) {
            let patch = record.get("output").unwrap();
            let first = patch[[0, 0, 0]];
            let index = (first * (20 * width) as f32).round() as usize;
            let (top, left) = (index / width, index % width);
            assert!(top + 5 <= 20 && left + 5 <= width);
            assert_eq!(patch, &image.slice(ndarray::s![top..top + 5, left..left + 5, ..]));
        }
    }

    #[test]
    fn test_patch_stream_does_not_end() {
        let factory = DatasetFactory::new("", 7).unwrap().with_seed(2);
        let mut patches = factory.patches_from_image(ramp(9, 13), HR_KEY).unwrap();

        for _ in 0..2_000 {
            let record = patches.next().expect("patch stream ended");
            assert_eq!(record.get(HR_KEY).unwrap().dim(), (7, 7, 1));
        }
    }

    #[test]
    fn test_patch_equal_to_image() {
        let image = ramp(12, 12);
        let factory = DatasetFactory::new("", 12).unwrap();
        let record = factory
            .patches_from_image(image.clone(), HR_KEY)
            .unwrap()
            .next()
            .unwrap();
        assert_eq!(record.get(HR_KEY).unwrap(), &image);
    }

    #[test]
    fn test_patch_too_large() {
        let factory = DatasetFactory::new("", 50).unwrap();
        let err = factory.patches_from_image(ramp(40, 100), HR_KEY).unwrap_err();
        assert!(matches!(err, Error::Size { height: 40, width: 100, .. }));
    }

    #[test]
    fn test_seeded_streams_repeat() {
        let factory = DatasetFactory::new("", 8).unwrap().with_seed(11);
        let a: Vec<_> = factory.patches_from_image(ramp(64, 64), HR_KEY).unwrap().take(5).collect();
        let b: Vec<_> = factory.patches_from_image(ramp(64, 64), HR_KEY).unwrap().take(5).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_add_downsampled_rejects_bad_options() {
        let factory = DatasetFactory::new("", 3).unwrap();
        let patches = factory.patches_from_image(ramp(10, 10), HR_KEY).unwrap();

        let fft = DownsampleOptions {
            method: image::ResizeMethod::Fft,
            ..DownsampleOptions::default()
        };
        assert!(matches!(
            factory.add_downsampled(patches, &fft),
            Err(Error::NotImplemented { .. })
        ));

        let tiny = DownsampleOptions {
            scale: 0.2,
            ..DownsampleOptions::default()
        };
        assert!(factory
            .add_downsampled(Vec::<PatchRecord>::new(), &tiny)
            .is_err());
    }

    #[test]
    fn test_add_downsampled_shapes() {
        let factory = DatasetFactory::new("", 21).unwrap();
        let patches = factory.patches_from_image(ramp(50, 60), HR_KEY).unwrap();
        let pairs = factory
            .add_downsampled(patches, &DownsampleOptions::default())
            .unwrap();

        for record in pairs.take(5) {
            let record = record.unwrap();
            assert_eq!(record.get(HR_KEY).unwrap().dim(), (21, 21, 1));
            assert_eq!(record.get(LR_KEY).unwrap().dim(), (10, 10, 1));
        }
    }

    #[test]
    fn test_sources_lists_images() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "notes.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("sub.jpg")).unwrap();

        let sources = DatasetFactory::new(dir.path(), 4).unwrap().sources().unwrap();
        let names: Vec<_> = sources
            .iter()
            .map(|s| s.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG"]);
    }
}
