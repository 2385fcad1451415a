use crate::{file_map::MAX_ERRORS, writer::BagWriterType};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Identifier written to `BagIt-Profile-Identifier` when the profile has none
pub const UNSPECIFIED_PROFILE_IDENTIFIER: &str = "http://example.com/unspecified_profile_identifier";

#[derive(thiserror::Error, Debug, PartialEq)]
/// Possible errors when loading an [`EngineConfig`]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read configuration `{path}`: {kind}")]
    Read {
        /// Configuration file
        path: PathBuf,
        /// Cause
        kind: std::io::ErrorKind,
    },
    /// Not valid TOML, or unknown values
    #[error("Invalid configuration: {0}")]
    Parse(String),
}

/// What to do with file names holding control characters, which many file systems and tools
/// handle badly
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlCharacterPolicy {
    /// Accept silently
    Ignore,
    /// Accept, with a warning
    #[default]
    Warn,
    /// Bag is invalid
    FailValidation,
}

/// Settings of the [`Bagger`](crate::Bagger) and [`Validator`](crate::Validator)
///
/// Every field has a default, so an empty document is a valid configuration:
///
/// ```
/// use async_bagger::EngineConfig;
///
/// let config = EngineConfig::from_toml_str(r#"
///     writer = "filesystem"
///     ignore_oxum_mismatch = true
/// "#).unwrap();
/// assert_eq!(config.max_errors, 30);
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Value of `Bagging-Software`
    pub bagging_software: String,
    /// `BagIt-Profile-Identifier` of bags whose profile does not name one
    pub default_profile_identifier: String,
    /// Serialization of new bags
    pub writer: BagWriterType,
    /// Compute every payload checksum even when `Payload-Oxum` already tells the bag is invalid
    pub ignore_oxum_mismatch: bool,
    /// Most checksum errors reported per file map
    pub max_errors: usize,
    /// File names with control characters
    pub control_characters: ControlCharacterPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bagging_software: format!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            default_profile_identifier: UNSPECIFIED_PROFILE_IDENTIFIER.to_string(),
            writer: BagWriterType::default(),
            ignore_oxum_mismatch: false,
            max_errors: MAX_ERRORS,
            control_characters: ControlCharacterPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read a TOML file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let toml = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| ConfigError::Read {
                path: path.as_ref().to_path_buf(),
                kind: e.kind(),
            })?;
        Self::from_toml_str(&toml)
    }
}
