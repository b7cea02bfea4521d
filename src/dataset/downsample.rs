//! Low-resolution companions for patch streams.

use crate::config::TrainingParams;
use crate::error::Result;
use crate::image::{downsample, ResizeMethod};

use super::{PatchRecord, HR_KEY, LR_KEY};

/// How the low-resolution companion is synthesized.
#[derive(Debug, Clone, PartialEq)]
pub struct DownsampleOptions {
    /// Factor applied to both sides of the source image.
    pub scale: f64,
    /// Interpolation method.
    pub method: ResizeMethod,
    /// Key of the image to downsample.
    pub source_key: String,
    /// Key the companion is stored under.
    pub target_key: String,
}

impl Default for DownsampleOptions {
    fn default() -> Self {
        Self {
            scale: 0.5,
            method: ResizeMethod::Bicubic,
            source_key: HR_KEY.to_string(),
            target_key: LR_KEY.to_string(),
        }
    }
}

impl DownsampleOptions {
    /// Scale and method from training parameters, default keys.
    #[must_use]
    pub fn from_params(params: &TrainingParams) -> Self {
        Self {
            scale: params.scale,
            method: params.downsample_method,
            ..Self::default()
        }
    }
}

/// Iterator adaptor produced by
/// [`DatasetFactory::add_downsampled`](super::DatasetFactory::add_downsampled).
#[derive(Debug)]
pub struct Downsampled<I> {
    inner: I,
    options: DownsampleOptions,
}

impl<I> Downsampled<I> {
    pub(super) fn new(inner: I, options: DownsampleOptions) -> Self {
        Self { inner, options }
    }
}

impl<I> Iterator for Downsampled<I>
where
    I: Iterator<Item = PatchRecord>,
{
    type Item = Result<PatchRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.inner.next()?;
        let DownsampleOptions {
            scale,
            method,
            source_key,
            target_key,
        } = &self.options;

        Some(record.map_key(source_key, target_key, |hr| {
            downsample(hr, *method, *scale)
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetFactory;
    use crate::error::Error;
    use ndarray::Array3;

    fn record(key: &str, side: usize) -> PatchRecord {
        PatchRecord::new().with(key, Array3::from_elem((side, side, 1), 0.25))
    }

    #[test]
    fn test_custom_keys_and_method() {
        let factory = DatasetFactory::new("", 8).unwrap();
        let options = DownsampleOptions {
            scale: 0.25,
            method: ResizeMethod::Area,
            source_key: "output".to_string(),
            target_key: "small".to_string(),
        };

        let out: Vec<_> = factory
            .add_downsampled(vec![record("output", 8)], &options)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        let small = out[0].get("small").unwrap();
        assert_eq!(small.dim(), (2, 2, 1));
        assert!(small.iter().all(|v| (v - 0.25).abs() < 1e-6));
        assert!(out[0].contains_key("output"));
    }

    #[test]
    fn test_missing_source_key() {
        let factory = DatasetFactory::new("", 8).unwrap();
        let mut pairs = factory
            .add_downsampled(vec![record("output", 8)], &DownsampleOptions::default())
            .unwrap();

        assert!(matches!(
            pairs.next(),
            Some(Err(Error::MissingKey { key })) if key == HR_KEY
        ));
        assert!(pairs.next().is_none());
    }

    #[test]
    fn test_from_params() {
        let params = TrainingParams {
            scale: 0.25,
            downsample_method: ResizeMethod::Bilinear,
            ..TrainingParams::default()
        };
        let options = DownsampleOptions::from_params(&params);
        assert_eq!(options.method, ResizeMethod::Bilinear);
        assert_eq!(options.target_key, LR_KEY);
    }
}
