//! Layered configuration loading
//!
//! Every configuration type is assembled from, in increasing priority:
//! 1. `Default` values
//! 2. An optional TOML file
//! 3. Environment variables carrying the type's prefix, nested keys split on `__`

use crate::error::ConfigurationError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tracing::debug;

/// Loader shared by all configuration structs
pub trait ConfigLoader: Sized + Default + Serialize + DeserializeOwned {
    /// Prefix for environment overrides, e.g. `TOKENGUARD_`
    const ENV_PREFIX: &'static str;

    /// Validate a freshly extracted configuration
    fn validate(&self) -> Result<(), ConfigurationError> {
        Ok(())
    }

    /// Base figment holding defaults, an optional file and the environment
    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = path {
            if path.exists() {
                debug!("Merging configuration file: {}", path.display());
                figment = figment.merge(Toml::file(path));
            } else {
                debug!(
                    "Configuration file not found, using defaults: {}",
                    path.display()
                );
            }
        }

        figment.merge(Env::prefixed(Self::ENV_PREFIX).split("__"))
    }

    /// Extract and validate from an already assembled figment
    fn from_figment(figment: Figment) -> Result<Self, ConfigurationError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from defaults, the optional file and the environment
    fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        Self::from_figment(Self::figment(path))
    }

    /// Load from a file that must exist
    fn load_from_file(path: &Path) -> Result<Self, ConfigurationError> {
        if !path.exists() {
            return Err(ConfigurationError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        Self::load(Some(path))
    }

    /// Render the configuration as pretty TOML
    fn to_toml(&self) -> Result<String, ConfigurationError> {
        toml::to_string_pretty(self).map_err(|e| ConfigurationError::ParseError {
            details: format!("Failed to serialize config: {e}"),
        })
    }
}
