//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check backend URLs are usable forwarding targets
//! - Validate value ranges (timeouts > 0, limits > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{field} is not a valid URL: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    #[error("{field} uses unsupported scheme '{scheme}' (only http is supported)")]
    UnsupportedScheme { field: &'static str, scheme: String },

    #[error("{0} has no host")]
    MissingHost(&'static str),

    #[error("routing.no_route_header '{0}' is not a valid header name")]
    InvalidHeaderName(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Parse a backend base URL, rejecting anything the forwarder cannot reach.
pub fn parse_backend_url(field: &'static str, raw: &str) -> Result<Url, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::Missing(field));
    }

    let url = Url::parse(raw.trim()).map_err(|e| ValidationError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" {
        return Err(ValidationError::UnsupportedScheme {
            field,
            scheme: url.scheme().to_string(),
        });
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::MissingHost(field));
    }

    Ok(url)
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = parse_backend_url("backends.a_url", &config.backends.a_url) {
        errors.push(e);
    }
    if let Err(e) = parse_backend_url("backends.b_url", &config.backends.b_url) {
        errors.push(e);
    }

    if config.listener.port.is_none() {
        errors.push(ValidationError::Missing("listener.port"));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero("listener.max_connections"));
    }

    if HeaderName::from_bytes(config.routing.no_route_header.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeaderName(
            config.routing.no_route_header.clone(),
        ));
    }

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.connect_secs", timeouts.connect_secs),
        ("timeouts.upstream_secs", timeouts.upstream_secs),
        ("timeouts.request_secs", timeouts.request_secs),
        ("timeouts.read_header_secs", timeouts.read_header_secs),
        ("timeouts.idle_secs", timeouts.idle_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if config.limits.max_body_bytes == Some(0) {
        errors.push(ValidationError::Zero("limits.max_body_bytes"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
