//! Persistence for named configuration files inside a model directory.

use std::collections::BTreeSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bincode::Options;
use tracing::Span;

use crate::error::{Error, Result};
use crate::record::Record;

use super::value::Configuration;

/// File name used when none is given.
pub const DEFAULT_CONFIG_NAME: &str = "config";

/// Upper bound on the size of a stored config, guards against corrupt length prefixes.
const MAX_CONFIG_BYTES: u64 = 16 * 1024 * 1024;

fn codec() -> impl Options {
    bincode::options().with_limit(MAX_CONFIG_BYTES)
}

/// Path of the config file `name` inside `model_dir`.
pub fn config_path<P: AsRef<Path>>(model_dir: P, name: &str) -> PathBuf {
    model_dir.as_ref().join(name)
}

/// Whether a config file `name` exists inside `model_dir`.
pub fn exists<P: AsRef<Path>>(model_dir: P, name: &str) -> bool {
    config_path(model_dir, name).is_file()
}

/// Check that `test` introduces no keys outside `reference` and `relax_set`.
///
/// Computes `keys(test) ∪ relax ⊆ keys(reference) ∪ relax`. Keys present in
/// `reference` but missing from `test` are fine, so configs saved before a
/// default was added keep loading.
#[must_use]
pub fn validate_subset<A, B>(
    test: &Record<A>,
    reference: &Record<B>,
    relax_set: Option<&BTreeSet<String>>,
) -> bool {
    let mut test_keys = test.key_set();
    let mut reference_keys = reference.key_set();

    if let Some(relax) = relax_set {
        test_keys.extend(relax.iter().cloned());
        reference_keys.extend(relax.iter().cloned());
    }

    test_keys.is_subset(&reference_keys)
}

/// Write `record` to `path`, leaving out `exclude_keys`.
///
/// Parent directories are created as needed. The caller's record is not
/// modified.
///
/// # Errors
///
/// Returns [`Error::MissingKey`] if an excluded key is absent from the record,
/// [`Error::Io`] if the file cannot be written, and [`Error::ConfigFormat`] if
/// encoding fails.
pub fn save<P, K>(path: P, record: &Configuration, exclude_keys: &[K]) -> Result<()>
where
    P: AsRef<Path>,
    K: AsRef<str>,
{
    let path = path.as_ref();
    let record = record.clone().delete(exclude_keys)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::io(parent, source))?;
    }

    let file = fs::File::create(path).map_err(|source| Error::io(path, source))?;
    let mut writer = BufWriter::new(file);
    codec()
        .serialize_into(&mut writer, &record)
        .map_err(|source| Error::ConfigFormat {
            path: path.to_path_buf(),
            source,
        })?;
    writer.flush().map_err(|source| Error::io(path, source))?;

    Ok(())
}

/// Merge records so that earlier ones win on key collisions.
///
/// `None` entries are skipped, which lets callers pass optional layers
/// (command line overrides, a loaded file, defaults) without unwrapping.
pub fn merge<'a, I>(records: I) -> Configuration
where
    I: IntoIterator<Item = Option<&'a Configuration>>,
{
    let mut merged = Configuration::new();
    for record in records.into_iter().flatten() {
        for (key, value) in record {
            if !merged.contains_key(key) {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

fn read_config(path: &Path) -> Result<Configuration> {
    let bytes = fs::read(path).map_err(|source| Error::io(path, source))?;
    codec()
        .deserialize(&bytes)
        .map_err(|source| Error::ConfigFormat {
            path: path.to_path_buf(),
            source,
        })
}

/// How [`ConfigStore::load`] treats the stored record.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Reference configuration. Required when `validate` is set.
    pub default: Option<Configuration>,
    /// Keys accepted even though the reference lacks them.
    pub relax_set: BTreeSet<String>,
    /// Check the stored keys against `default`.
    pub validate: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            default: None,
            relax_set: BTreeSet::new(),
            validate: true,
        }
    }
}

impl LoadOptions {
    /// Validate against `default`.
    #[must_use]
    pub fn validated_against(default: Configuration) -> Self {
        Self {
            default: Some(default),
            ..Self::default()
        }
    }

    /// Return whatever is stored without checking it.
    #[must_use]
    pub fn unvalidated() -> Self {
        Self {
            validate: false,
            ..Self::default()
        }
    }

    /// Add keys to the relaxation set.
    #[must_use]
    pub fn relax<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relax_set.extend(keys.into_iter().map(Into::into));
        self
    }
}

/// A named config file in a model directory.
///
/// All log lines are emitted inside the store's span, so callers decide the
/// context they appear under.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    model_dir: PathBuf,
    name: String,
    span: Span,
}

impl ConfigStore {
    /// Store for the default `config` file in `model_dir`.
    pub fn new<P: Into<PathBuf>>(model_dir: P) -> Self {
        let model_dir = model_dir.into();
        let span = tracing::info_span!("config_store", dir = %model_dir.display());
        Self {
            model_dir,
            name: DEFAULT_CONFIG_NAME.to_string(),
            span,
        }
    }

    /// Use a different file name inside the model directory.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Emit log lines inside `span` instead of the default one.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    #[must_use]
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        config_path(&self.model_dir, &self.name)
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        exists(&self.model_dir, &self.name)
    }

    /// Load the stored configuration.
    ///
    /// Returns `Ok(None)` when there is no file, when validation is requested
    /// without a reference, or when the stored keys fail validation. Callers
    /// should fall back to defaults in that case.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file exists but cannot be read and
    /// [`Error::ConfigFormat`] if its contents are malformed.
    pub fn load(&self, options: &LoadOptions) -> Result<Option<Configuration>> {
        let _guard = self.span.enter();

        if !self.exists() {
            tracing::info!("Config file not found in {}", self.model_dir.display());
            return Ok(None);
        }

        tracing::info!("Config file found in {}", self.model_dir.display());
        let loaded = read_config(&self.path())?;

        if !options.validate {
            tracing::warn!("Config is not validated");
            return Ok(Some(loaded));
        }

        let Some(default) = options.default.as_ref() else {
            tracing::error!("Default config is not provided, cannot validate");
            return Ok(None);
        };

        if validate_subset(&loaded, default, Some(&options.relax_set)) {
            tracing::info!("Config keys confirmed to be valid");
            Ok(Some(loaded))
        } else {
            let unknown: Vec<&str> = loaded
                .keys()
                .filter(|k| !default.contains_key(k) && !options.relax_set.contains(*k))
                .collect();
            tracing::info!("Config is invalid, unknown keys: {unknown:?}");
            Ok(None)
        }
    }

    /// Save `record` as this store's config file.
    ///
    /// # Errors
    ///
    /// See [`save`].
    pub fn save<K: AsRef<str>>(&self, record: &Configuration, exclude_keys: &[K]) -> Result<()> {
        let _guard = self.span.enter();
        let path = self.path();
        save(&path, record, exclude_keys)?;
        tracing::info!("Saved config to {}", path.display());
        Ok(())
    }
}
