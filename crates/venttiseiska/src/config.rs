//! Emitter configuration.
//!
//! Controls how event queries are tokenised and whether unhandled emits are
//! reported. Can be built in code or loaded from a TOML document.

use crate::error::EmitterError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

fn default_event_delimiter() -> char {
    ' '
}

fn default_tag_delimiter() -> char {
    ':'
}

/// Configuration shared by every listener of one emitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitterConfig {
    /// Separator between event tokens in a query string
    #[serde(default = "default_event_delimiter")]
    pub event_delimiter: char,
    /// Separator between the event name and its tags inside a token
    #[serde(default = "default_tag_delimiter")]
    pub tag_delimiter: char,
    /// Log a warning when an emitted event has no listeners
    #[serde(default)]
    pub warn_on_unhandled: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            event_delimiter: default_event_delimiter(),
            tag_delimiter: default_tag_delimiter(),
            warn_on_unhandled: false,
        }
    }
}

impl EmitterConfig {
    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(source: &str) -> Result<Self, EmitterError> {
        let config: EmitterConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EmitterError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        info!("🔧 Loaded emitter configuration from {}", path.display());
        Ok(config)
    }

    /// Checks that the delimiters can be told apart.
    pub fn validate(&self) -> Result<(), EmitterError> {
        if self.event_delimiter == self.tag_delimiter {
            return Err(EmitterError::InvalidConfig(format!(
                "event and tag delimiters are both '{}'",
                self.event_delimiter
            )));
        }
        Ok(())
    }
}
