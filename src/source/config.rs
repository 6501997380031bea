//! Data Source Configuration
//!
//! A flat string-to-string property map is the only configuration format
//! the contract mandates. Recognized keys are named here as constants;
//! engine-specific options travel in the same map untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};

/// Engine selector key.
pub const KEY_ENGINE: &str = "engine";

/// Connection URI key.
pub const KEY_URI: &str = "uri";

/// Default bucket name key.
pub const KEY_BUCKET: &str = "bucket";

/// Credential: user name key.
pub const KEY_USERNAME: &str = "username";

/// Credential: secret reference key.
pub const KEY_PASSWORD: &str = "password";

/// Connection pool size key.
pub const KEY_POOL_SIZE: &str = "pool_size";

/// Flat configuration map for creating a data source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceConfig {
    entries: BTreeMap<String, String>,
}

impl SourceConfig {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Read a property.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Read a property that must be present.
    pub fn require(&self, key: &str) -> DataResult<&str> {
        self.get(key)
            .ok_or_else(|| DataError::config(format!("missing required property {key}")))
    }

    /// Read a numeric property.
    pub fn get_usize(&self, key: &str) -> DataResult<Option<usize>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| DataError::format(format!("property {key} is not a number: {raw:?}"))),
        }
    }

    /// The engine selector, if set.
    #[must_use]
    pub fn engine(&self) -> Option<&str> {
        self.get(KEY_ENGINE)
    }

    /// The connection URI, if set.
    #[must_use]
    pub fn uri(&self) -> Option<&str> {
        self.get(KEY_URI)
    }

    /// The default bucket name, if set.
    #[must_use]
    pub fn default_bucket(&self) -> Option<&str> {
        self.get(KEY_BUCKET)
    }

    /// All properties, in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for SourceConfig {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
