//! Module: config
//! Responsibility: tunables shared by store builders (tag widths, sequence
//! lease size, index component widths, decode bounds).
//! Boundary: builders read a `StackConfig`; every value can also be set
//! directly on the builder.

use crate::error::{ErrorOrigin, InternalError};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Default byte width of a name-registry tag.
pub const DEFAULT_REGISTRY_TAG_LEN: usize = 1;

/// Default number of ids leased from a sequence per persisted refill.
pub const DEFAULT_SEQUENCE_BANDWIDTH: u64 = 10;

/// Default fixed width of string/bytes index components.
pub const DEFAULT_COMPONENT_WIDTH: usize = 256;

/// Max encoded bytes accepted when decoding a stored value.
pub const DEFAULT_MAX_VALUE_BYTES: usize = 4 * 1024 * 1024;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(String),

    #[error("registry_tag_len must be between 1 and 8, got {0}")]
    TagLen(usize),

    #[error("sequence_bandwidth must be non-zero")]
    ZeroBandwidth,

    #[error("default_component_width must be non-zero")]
    ZeroComponentWidth,
}

impl From<ConfigError> for InternalError {
    fn from(err: ConfigError) -> Self {
        Self::invalid_argument(ErrorOrigin::Config, err.to_string())
    }
}

///
/// StackConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    pub registry_tag_len: usize,
    pub sequence_bandwidth: u64,
    pub default_component_width: usize,
    pub max_value_bytes: usize,
}

impl StackConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.registry_tag_len == 0 || self.registry_tag_len > 8 {
            return Err(ConfigError::TagLen(self.registry_tag_len));
        }
        if self.sequence_bandwidth == 0 {
            return Err(ConfigError::ZeroBandwidth);
        }
        if self.default_component_width == 0 {
            return Err(ConfigError::ZeroComponentWidth);
        }

        Ok(())
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            registry_tag_len: DEFAULT_REGISTRY_TAG_LEN,
            sequence_bandwidth: DEFAULT_SEQUENCE_BANDWIDTH,
            default_component_width: DEFAULT_COMPONENT_WIDTH,
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = StackConfig::from_toml_str("").unwrap();

        assert_eq!(config, StackConfig::default());
    }

    #[test]
    fn partial_document_overrides_selected_fields() {
        let config =
            StackConfig::from_toml_str("registry_tag_len = 2\nsequence_bandwidth = 64\n").unwrap();

        assert_eq!(config.registry_tag_len, 2);
        assert_eq!(config.sequence_bandwidth, 64);
        assert_eq!(config.default_component_width, DEFAULT_COMPONENT_WIDTH);
    }

    #[test]
    fn rejects_out_of_range_tag_len() {
        let err = StackConfig::from_toml_str("registry_tag_len = 9").unwrap_err();

        assert!(matches!(err, ConfigError::TagLen(9)));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = StackConfig::from_toml_str("bogus = 1").unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
