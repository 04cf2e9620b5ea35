//! Configuration Loader
//!
//! Loads pipeline configuration:
//! 0. Loads a `.env` file if present (via dotenvy)
//! 1. Reads the TOML file named by `STATEWATCH_CONFIG_PATH`, or starts from defaults
//! 2. Substitutes `${VAR}` and `${VAR:-default}` placeholders
//! 3. Deserializes to [`StatewatchConfig`]
//! 4. Applies `STATEWATCH_BROKER_URL` on top
//! 5. Validates with the validator library

use std::path::Path;

use validator::Validate;

use super::error::{ConfigResult, ConfigurationError};
use super::StatewatchConfig;

/// Environment variable naming the TOML configuration file
pub const CONFIG_PATH_ENV: &str = "STATEWATCH_CONFIG_PATH";

/// Environment variable overriding the broker address
pub const BROKER_URL_ENV: &str = "STATEWATCH_BROKER_URL";

/// Environment variable naming the deployment environment
pub const ENVIRONMENT_ENV: &str = "STATEWATCH_ENV";

/// Zero-state configuration loader; all methods are associated functions
#[derive(Debug)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Detect environment from STATEWATCH_ENV or default to "development"
    pub fn detect_environment() -> String {
        std::env::var(ENVIRONMENT_ENV).unwrap_or_else(|_| "development".to_string())
    }

    /// Load configuration for a pipeline process
    ///
    /// Without `STATEWATCH_CONFIG_PATH` the defaults are used, so a process can
    /// start with nothing but (optionally) a broker address in the environment.
    pub fn load_from_env() -> ConfigResult<StatewatchConfig> {
        dotenvy::dotenv().ok();

        let environment = Self::detect_environment();
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                tracing::info!(
                    config_path = %path,
                    environment = %environment,
                    "Loading configuration from {}",
                    CONFIG_PATH_ENV
                );
                Self::parse_file(Path::new(&path))?
            }
            Err(_) => {
                tracing::info!(
                    environment = %environment,
                    "{} not set, using default configuration",
                    CONFIG_PATH_ENV
                );
                StatewatchConfig::default()
            }
        };

        Self::apply_env_overrides(&mut config);
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load and validate configuration from a specific TOML file
    pub fn load_from_path(path: &Path) -> ConfigResult<StatewatchConfig> {
        let config = Self::parse_file(path)?;
        Self::validate(&config)?;
        tracing::info!("Configuration loaded successfully from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn load_from_str(contents: &str) -> ConfigResult<StatewatchConfig> {
        let config = Self::parse(contents, "<inline>")?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> ConfigResult<StatewatchConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))?;
        Self::parse(&contents, &path.display().to_string())
    }

    fn parse(contents: &str, origin: &str) -> ConfigResult<StatewatchConfig> {
        let contents_with_env = Self::substitute_env_vars(contents)?;
        toml::from_str(&contents_with_env).map_err(|e| ConfigurationError::invalid_toml(origin, e))
    }

    fn validate(config: &StatewatchConfig) -> ConfigResult<()> {
        config
            .validate()
            .map_err(ConfigurationError::validation_error)
    }

    fn apply_env_overrides(config: &mut StatewatchConfig) {
        if let Ok(url) = std::env::var(BROKER_URL_ENV) {
            if !url.trim().is_empty() {
                tracing::info!("Broker address overridden by {}", BROKER_URL_ENV);
                config.broker.url = url;
            }
        }
    }

    /// Escape TOML special characters so substituted values stay inside their string
    fn escape_toml_string(value: &str) -> String {
        value
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    /// Replace `${VAR}` and `${VAR:-default}` placeholders
    ///
    /// Environment values are escaped; defaults come from the file itself and are
    /// inserted as written. A placeholder with no value and no default is an error.
    fn substitute_env_vars(content: &str) -> ConfigResult<String> {
        let mut result = String::with_capacity(content.len());
        let mut rest = content;

        while let Some(start) = rest.find("${") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| {
                ConfigurationError::environment_variable_error(
                    after.chars().take(32).collect::<String>(),
                    "unterminated ${...} placeholder",
                )
            })?;

            let expr = &after[..end];
            let (var_name, default_value) = match expr.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (expr, None),
            };

            let replacement = match (std::env::var(var_name), default_value) {
                (Ok(value), _) => Self::escape_toml_string(&value),
                (Err(_), Some(default)) => default.to_string(),
                (Err(_), None) => {
                    return Err(ConfigurationError::environment_variable_error(
                        var_name,
                        "variable is not set and has no default",
                    ))
                }
            };

            result.push_str(&replacement);
            rest = &after[end + 1..];
        }

        result.push_str(rest);
        Ok(result)
    }
}
