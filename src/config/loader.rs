//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

pub const ENV_A_URL: &str = "GATEWAY_A_URL";
pub const ENV_B_URL: &str = "GATEWAY_B_URL";
pub const ENV_PORT: &str = "GATEWAY_PORT";
pub const ENV_HOST: &str = "GATEWAY_HOST";
pub const ENV_LOG_LEVEL: &str = "GATEWAY_LOG_LEVEL";
pub const ENV_NO_ROUTE_HEADER: &str = "GATEWAY_NO_ROUTE_HEADER";
pub const ENV_METRICS_ADDRESS: &str = "GATEWAY_METRICS_ADDRESS";
pub const ENV_MAX_BODY_BYTES: &str = "GATEWAY_MAX_BODY_BYTES";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("env variable {var} is invalid: '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file plus the process environment.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    load_config_with(path, |var| std::env::var(var).ok())
}

/// Like [`load_config`], reading variables through `env` instead of the process.
///
/// Environment values override the file. The merged result is validated.
pub fn load_config_with<F>(path: Option<&Path>, env: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env(&mut config, env)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(
        a_url = %config.backends.a_url,
        b_url = %config.backends.b_url,
        port = ?config.listener.port,
        "Configuration loaded"
    );
    Ok(config)
}

fn apply_env<F>(config: &mut GatewayConfig, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| env(var).filter(|value| !value.is_empty());

    if let Some(url) = get(ENV_A_URL) {
        config.backends.a_url = url;
    }
    if let Some(url) = get(ENV_B_URL) {
        config.backends.b_url = url;
    }
    if let Some(port) = get(ENV_PORT) {
        config.listener.port = Some(parse_env(ENV_PORT, port)?);
    }
    if let Some(host) = get(ENV_HOST) {
        config.listener.host = host;
    }
    if let Some(level) = get(ENV_LOG_LEVEL) {
        config.observability.log_level = level;
    }
    if let Some(header) = get(ENV_NO_ROUTE_HEADER) {
        config.routing.no_route_header = header;
    }
    if let Some(address) = get(ENV_METRICS_ADDRESS) {
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = address;
    }
    if let Some(limit) = get(ENV_MAX_BODY_BYTES) {
        config.limits.max_body_bytes = Some(parse_env(ENV_MAX_BODY_BYTES, limit)?);
    }

    Ok(())
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}
