//! Reference configuration and its typed view.

use crate::error::{Error, Result};
use crate::image::ResizeMethod;

use super::value::{ConfigValue, Configuration};

pub const PATCH_SIZE: &str = "patch_size";
pub const SCALE: &str = "scale";
pub const DOWNSAMPLE_METHOD: &str = "downsample_method";
pub const BATCH_SIZE: &str = "batch_size";
pub const LEARNING_RATE: &str = "learning_rate";
pub const SEED: &str = "seed";

/// Keys that may appear in a stored config without being in [`defaults`].
pub const RELAXED_KEYS: &[&str] = &[SEED];

/// Reference configuration. Stored configs are validated against its keys.
#[must_use]
pub fn defaults() -> Configuration {
    TrainingParams::default().to_config()
}

/// Training hyperparameters read from a [`Configuration`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingParams {
    /// Side length of the square high-resolution patch.
    pub patch_size: usize,

    /// Downsampling factor for the low-resolution companion (0.0-1.0].
    pub scale: f64,

    /// Interpolation used to synthesize the low-resolution companion.
    pub downsample_method: ResizeMethod,

    /// Patches per training step.
    pub batch_size: usize,

    /// Optimizer learning rate.
    pub learning_rate: f64,

    /// Random seed for patch positions. None for random.
    pub seed: Option<u64>,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            patch_size: 96,
            scale: 0.5,
            downsample_method: ResizeMethod::Bicubic,
            batch_size: 16,
            learning_rate: 1e-4,
            seed: None,
        }
    }
}

impl TrainingParams {
    /// Read parameters from `config`. Keys not listed here are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingKey`] for a missing required key and
    /// [`Error::InvalidParameter`] for a value of the wrong type or range.
    pub fn from_config(config: &Configuration) -> Result<Self> {
        let method_name = config
            .require(DOWNSAMPLE_METHOD)?
            .as_str()
            .ok_or_else(|| wrong_type(config, DOWNSAMPLE_METHOD, "string"))?;

        let seed = config
            .get(SEED)
            .map(|value| seed_from_value(value).ok_or_else(|| wrong_type(config, SEED, "int")))
            .transpose()?;

        let params = Self {
            patch_size: read_usize(config, PATCH_SIZE)?,
            scale: read_float(config, SCALE)?,
            downsample_method: method_name.parse()?,
            batch_size: read_usize(config, BATCH_SIZE)?,
            learning_rate: read_float(config, LEARNING_RATE)?,
            seed,
        };
        params.validate()?;
        Ok(params)
    }

    /// Write the parameters back as a configuration record.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn to_config(&self) -> Configuration {
        let mut config: Configuration = [
            (PATCH_SIZE, ConfigValue::Int(self.patch_size as i64)),
            (SCALE, ConfigValue::Float(self.scale)),
            (
                DOWNSAMPLE_METHOD,
                ConfigValue::from(self.downsample_method.name()),
            ),
            (BATCH_SIZE, ConfigValue::Int(self.batch_size as i64)),
            (LEARNING_RATE, ConfigValue::Float(self.learning_rate)),
        ]
        .into_iter()
        .collect();

        if let Some(seed) = self.seed {
            config.insert(SEED, seed_value(seed));
        }
        config
    }

    /// Validate the parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.patch_size == 0 {
            return Err(Error::invalid(PATCH_SIZE, "must be greater than 0"));
        }

        if !(self.scale > 0.0 && self.scale <= 1.0) {
            return Err(Error::invalid(SCALE, "must be in (0.0, 1.0]"));
        }

        if self.downsample_method == ResizeMethod::Fft {
            return Err(Error::NotImplemented {
                method: self.downsample_method.name().to_string(),
            });
        }

        if self.batch_size == 0 {
            return Err(Error::invalid(BATCH_SIZE, "must be greater than 0"));
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::invalid(LEARNING_RATE, "must be a positive number"));
        }

        Ok(())
    }
}

/// Store a seed as the bit pattern of an `Int`, so every `u64` survives a save.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub const fn seed_value(seed: u64) -> ConfigValue {
    ConfigValue::Int(seed as i64)
}

#[allow(clippy::cast_sign_loss)]
fn seed_from_value(value: &ConfigValue) -> Option<u64> {
    value.as_int().map(|v| v as u64)
}

fn read_usize(config: &Configuration, key: &str) -> Result<usize> {
    let value = config.require(key)?;
    value
        .as_int()
        .ok_or_else(|| wrong_type(config, key, "int"))
        .and_then(|v| usize::try_from(v).map_err(|_| Error::invalid(key, "must be non-negative")))
}

fn read_float(config: &Configuration, key: &str) -> Result<f64> {
    config
        .require(key)?
        .as_float()
        .ok_or_else(|| wrong_type(config, key, "float"))
}

fn wrong_type(config: &Configuration, key: &str, expected: &str) -> Error {
    let actual = config.get(key).map_or("nothing", ConfigValue::kind);
    Error::invalid(key, format!("expected {expected}, found {actual}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_roundtrip() {
        let params = TrainingParams::from_config(&defaults()).unwrap();
        assert_eq!(params, TrainingParams::default());
    }

    #[test]
    fn test_seed_and_extra_keys() {
        let config = defaults()
            .with(SEED, ConfigValue::from(42_i64))
            .with("notes", ConfigValue::from("first run"));
        let params = TrainingParams::from_config(&config).unwrap();

        assert_eq!(params.seed, Some(42));
        assert_eq!(params.to_config().get(SEED), Some(&ConfigValue::Int(42)));
    }

    #[test]
    fn test_large_seed_survives_config() {
        for seed in [u64::MAX - 1, u64::MAX, 1 << 63, 0] {
            let params = TrainingParams {
                seed: Some(seed),
                ..TrainingParams::default()
            };
            let reread = TrainingParams::from_config(&params.to_config()).unwrap();
            assert_eq!(reread.seed, Some(seed));
        }
    }

    #[test]
    fn test_seed_wrong_type() {
        let config = defaults().with(SEED, ConfigValue::from("lucky"));
        let err = TrainingParams::from_config(&config).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name, .. } if name == SEED));
    }

    #[test]
    fn test_integer_scale_widens() {
        let config = defaults().with(SCALE, ConfigValue::from(1_i64));
        assert!((TrainingParams::from_config(&config).unwrap().scale - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_wrong_type() {
        let config = defaults().with(PATCH_SIZE, ConfigValue::from("big"));
        let err = TrainingParams::from_config(&config).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name, .. } if name == PATCH_SIZE));
    }

    #[test]
    fn test_missing_key() {
        let config = defaults().delete(&[BATCH_SIZE]).unwrap();
        assert!(matches!(
            TrainingParams::from_config(&config),
            Err(Error::MissingKey { .. })
        ));
    }

    #[test]
    fn test_validation() {
        let bad_scale = defaults().with(SCALE, ConfigValue::from(1.5));
        assert!(TrainingParams::from_config(&bad_scale).is_err());

        let fft = defaults().with(DOWNSAMPLE_METHOD, ConfigValue::from("fft"));
        assert!(matches!(
            TrainingParams::from_config(&fft),
            Err(Error::NotImplemented { .. })
        ));

        let zero = defaults().with(PATCH_SIZE, ConfigValue::from(0_i64));
        assert!(TrainingParams::from_config(&zero).is_err());
    }
}
