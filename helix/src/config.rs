//! Application configuration.
//!
//! Sources are merged in this order, later ones overriding earlier ones:
//!
//! 1. [`AppConfig::default()`]
//! 2. a TOML file: the configured path, else `helix.toml` in the working
//!    directory if it exists
//! 3. environment variables prefixed `HELIX_`, nested keys split on `__`
//!    (`HELIX_APP__DEBUG=true` sets `app.debug`)
//!
//! Environment keys are lowercased, so `HELIX_PARAMETERS__DB_HOST` sets the
//! `db_host` parameter.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::logging::parse_log_level;

/// File looked up in the working directory when no path is configured.
pub const DEFAULT_CONFIG_FILE: &str = "helix.toml";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "HELIX_";

/// Root configuration, passed explicitly into the bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub logging: LoggingConfig,
    /// Extension names to boot, in order. Empty boots every known extension.
    pub extensions: Vec<String>,
    /// String values answering `Env` parameters.
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    pub env: String,
    pub debug: bool,
    /// Base of absolute URLs.
    pub url: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "helix".to_string(),
            env: "production".to_string(),
            debug: false,
            url: "http://localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Loads an [`AppConfig`] from defaults, a TOML file and the environment.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// The merged providers, before extraction.
    pub fn figment(&self) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));

        match &self.config_path {
            Some(path) if path.exists() => figment = figment.merge(Toml::file(path)),
            Some(path) => warn!(path = %path.display(), "Configuration file not found"),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        figment.merge(Env::prefixed(&self.env_prefix).split("__"))
    }

    /// Loads and validates the configuration.
    ///
    /// # Errors
    /// - [`Error::Config`](crate::Error::Config) if a source cannot be read
    ///   or does not fit [`AppConfig`]
    /// - [`Error::InvalidConfig`](crate::Error::InvalidConfig) for an
    ///   unknown log level
    pub fn load(&self) -> Result<AppConfig> {
        let config: AppConfig = self.figment().extract()?;
        parse_log_level(&config.logging.level)?;
        Ok(config)
    }
}
