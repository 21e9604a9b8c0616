//! Engine configuration.
//!
//! A [`Config`] is a flat mapping of dotted string keys to string values, validated
//! against a registry of recognized keys. Unrecognized keys are rejected with a
//! [`ConfigError`] unless `config.allow_unknown` is set to `"true"`.

use std::collections::BTreeMap;

use thiserror::Error;

/// A configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The key is not in the registry of recognized configuration keys.
    #[error("unrecognized configuration key {0:?}")]
    UnrecognizedKey(String),
    /// The value does not parse for the key.
    #[error("invalid value {value:?} for configuration key {key:?}")]
    InvalidValue {
        /// The configuration key.
        key: String,
        /// The rejected value.
        value: String,
    },
}

/// The storage backend selection key.
pub const KEY_BACKEND: &str = "backend";
/// The base directory of the filesystem backend.
pub const KEY_FILESYSTEM_ROOT: &str = "filesystem.root";
/// Whether unrecognized configuration keys are retained rather than rejected.
pub const KEY_ALLOW_UNKNOWN: &str = "config.allow_unknown";
/// Advisory tile cache size in bytes.
pub const KEY_TILE_CACHE_SIZE: &str = "sm.tile_cache_size";
/// Whether the engine deduplicates sparse coordinates on write.
pub const KEY_DEDUP_COORDS: &str = "sm.dedup_coords";

struct RegisteredKey {
    key: &'static str,
    default: &'static str,
    validate: fn(&str) -> bool,
}

fn value_any(_: &str) -> bool {
    true
}

fn value_bool(value: &str) -> bool {
    value == "true" || value == "false"
}

fn value_u64(value: &str) -> bool {
    value.parse::<u64>().is_ok()
}

fn value_backend(value: &str) -> bool {
    value == "memory" || value == "filesystem"
}

const REGISTRY: &[RegisteredKey] = &[
    RegisteredKey {
        key: KEY_BACKEND,
        default: "filesystem",
        validate: value_backend,
    },
    RegisteredKey {
        key: KEY_FILESYSTEM_ROOT,
        default: ".",
        validate: value_any,
    },
    RegisteredKey {
        key: KEY_ALLOW_UNKNOWN,
        default: "false",
        validate: value_bool,
    },
    RegisteredKey {
        key: KEY_TILE_CACHE_SIZE,
        default: "10000000",
        validate: value_u64,
    },
    RegisteredKey {
        key: KEY_DEDUP_COORDS,
        default: "false",
        validate: value_bool,
    },
];

fn registry_lookup(key: &str) -> Option<&'static RegisteredKey> {
    REGISTRY.iter().find(|registered| registered.key == key)
}

/// Engine configuration: dotted string keys mapping to string values.
///
/// Keys not explicitly set resolve to their registry defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    values: BTreeMap<String, String>,
}

impl Config {
    /// Create a configuration holding only registry defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnrecognizedKey`] if `key` is not registered and
    /// `config.allow_unknown` is not `"true"`, or [`ConfigError::InvalidValue`] if
    /// the value does not parse for the key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<&mut Self, ConfigError> {
        if let Some(registered) = registry_lookup(key) {
            if !(registered.validate)(value) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
        } else if !self.allow_unknown() {
            return Err(ConfigError::UnrecognizedKey(key.to_string()));
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(self)
    }

    /// Get the value of `key`, falling back to the registry default.
    ///
    /// Returns [`None`] for an unrecognized key that was never set.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .or_else(|| registry_lookup(key).map(|registered| registered.default))
    }

    /// Iterate over the explicitly set key/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    fn allow_unknown(&self) -> bool {
        self.get(KEY_ALLOW_UNKNOWN) == Some("true")
    }
}
