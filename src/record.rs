//! String-keyed records shared by the patch pipeline and the config store.
//!
//! Every transform consumes the record and hands it back, so a record is
//! never mutated behind a caller's back and nothing is copied on the way.

use std::collections::{btree_map, BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ordered map from string keys to values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record<V> {
    entries: BTreeMap<String, V>,
}

impl<V> Default for Record<V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<V> Record<V> {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `target = f(&self[source])`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingKey`] if `source` is absent, or whatever `f` returns.
    pub fn map_key<F>(mut self, source: &str, target: &str, f: F) -> Result<Self>
    where
        F: FnOnce(&V) -> Result<V>,
    {
        let value = f(self.require(source)?)?;
        self.entries.insert(target.to_string(), value);
        Ok(self)
    }

    /// Move `keys` into a new record, returning `(remaining, extracted)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingKey`] if any key is absent. The record is
    /// checked before anything moves.
    pub fn split<K: AsRef<str>>(mut self, keys: &[K]) -> Result<(Self, Self)> {
        self.check_keys(keys)?;
        let mut extracted = Self::new();
        for key in keys {
            let key: &str = key.as_ref();
            if let Some((k, v)) = self.entries.remove_entry(key) {
                extracted.entries.insert(k, v);
            }
        }
        Ok((self, extracted))
    }

    /// Remove every key in `keys`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingKey`] if any key is absent.
    pub fn delete<K: AsRef<str>>(mut self, keys: &[K]) -> Result<Self> {
        self.check_keys(keys)?;
        for key in keys {
            let key: &str = key.as_ref();
            self.entries.remove(key);
        }
        Ok(self)
    }

    /// Add `key = value`, replacing any previous value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: V) -> Self {
        self.entries.insert(key.into(), value);
        self
    }

    /// Set `key` in place, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        self.entries.insert(key.into(), value)
    }

    /// Take the value at `key` out of the record.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key)
    }

    /// Borrow the value at `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    /// Borrow the value at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingKey`] if `key` is absent.
    pub fn require(&self, key: &str) -> Result<&V> {
        self.entries.get(key).ok_or_else(|| Error::MissingKey {
            key: key.to_string(),
        })
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Owned set of keys, used for subset checks.
    #[must_use]
    pub fn key_set(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, V> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_keys<K: AsRef<str>>(&self, keys: &[K]) -> Result<()> {
        for key in keys {
            let key: &str = key.as_ref();
            if !self.entries.contains_key(key) {
                return Err(Error::MissingKey {
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for Record<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<V> IntoIterator for Record<V> {
    type Item = (String, V);
    type IntoIter = btree_map::IntoIter<String, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a, V> IntoIterator for &'a Record<V> {
    type Item = (&'a String, &'a V);
    type IntoIter = btree_map::Iter<'a, String, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
