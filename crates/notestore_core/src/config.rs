//! Note store configuration.
//!
//! # Responsibility
//! - Carry the note cache capacity threshold into the manager.
//! - Load overrides from the process environment.
//!
//! # Invariants
//! - A validated config always has `note_cache_threshold >= 1`.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default number of notes kept resident in the cache.
pub const DEFAULT_NOTE_CACHE_THRESHOLD: usize = 50;

/// Environment variable overriding `note_cache_threshold`.
pub const NOTE_CACHE_THRESHOLD_ENV: &str = "NOTESTORE_NOTE_CACHE_THRESHOLD";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Threshold must allow at least one resident note.
    InvalidThreshold(usize),
    /// Environment value could not be parsed.
    InvalidEnvValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidThreshold(value) => {
                write!(f, "note cache threshold must be at least 1, got {value}")
            }
            Self::InvalidEnvValue { key, value } => {
                write!(f, "invalid value `{value}` for environment variable {key}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Runtime options for `NoteManager`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NoteStoreConfig {
    /// Soft capacity `T` of the note cache. Pinned notes may push the
    /// resident count above it.
    pub note_cache_threshold: usize,
}

impl Default for NoteStoreConfig {
    fn default() -> Self {
        Self {
            note_cache_threshold: DEFAULT_NOTE_CACHE_THRESHOLD,
        }
    }
}

impl NoteStoreConfig {
    /// Builds a config with the given threshold.
    pub fn with_threshold(note_cache_threshold: usize) -> Self {
        Self {
            note_cache_threshold,
        }
    }

    /// Loads defaults overridden by `NOTESTORE_NOTE_CACHE_THRESHOLD`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads defaults overridden by values returned from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(NOTE_CACHE_THRESHOLD_ENV) {
            config.note_cache_threshold =
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidEnvValue {
                        key: NOTE_CACHE_THRESHOLD_ENV,
                        value: raw.clone(),
                    })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the cache cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.note_cache_threshold == 0 {
            return Err(ConfigError::InvalidThreshold(self.note_cache_threshold));
        }
        Ok(())
    }
}
