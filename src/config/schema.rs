//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind host, port).
    pub listener: ListenerConfig,

    /// Base URLs of backends A and B.
    pub backends: BackendsConfig,

    /// Fallback protocol settings.
    pub routing: RoutingConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request buffering limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Port to listen on. Required; 0 picks an ephemeral port.
    pub port: Option<u16>,

    /// Maximum concurrent client connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: None,
            max_connections: 10_000,
        }
    }
}

impl ListenerConfig {
    /// `host:port` string, if the port is known.
    pub fn bind_address(&self) -> Option<String> {
        self.port.map(|port| format!("{}:{}", self.host, port))
    }
}

/// Backend base addresses.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendsConfig {
    /// Primary backend, probed first (e.g., "http://10.0.0.5:8080").
    pub a_url: String,

    /// Fallback backend.
    pub b_url: String,
}

/// Settings for the probe/fallback protocol.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Response header backend A sets on a 404 to mean "no such route".
    pub no_route_header: String,

    /// Cache B for a route when A could not be reached at all.
    pub cache_on_upstream_error: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            no_route_header: "x-no-route".to_string(),
            cache_on_upstream_error: false,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for a backend to return response headers, in seconds.
    pub upstream_secs: u64,

    /// Total time for a client request/response exchange in seconds.
    pub request_secs: u64,

    /// Time a client has to send request headers, in seconds.
    pub read_header_secs: u64,

    /// Idle keep-alive connection timeout in seconds.
    pub idle_secs: u64,

    /// How long shutdown waits for in-flight requests, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
            request_secs: 60,
            read_header_secs: 5,
            idle_secs: 30,
            shutdown_grace_secs: 1,
        }
    }
}

/// Request body limits.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest body buffered for a first-time route, in bytes.
    /// Unset means first-time bodies are buffered whatever their size.
    pub max_body_bytes: Option<usize>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
