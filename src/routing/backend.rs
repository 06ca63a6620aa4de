//! Backend identities.
//!
//! # Responsibilities
//! - Name the two upstream services (A is primary, B is the fallback)
//! - Carry each backend's parsed base URL
//! - Stay immutable once the server is built

use std::fmt;

use url::Url;

use crate::config::BackendsConfig;
use crate::config::validation::{parse_backend_url, ValidationError};

/// One of the two fixed upstream services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Primary service, always probed first.
    A,
    /// Secondary service, used when A has no route.
    B,
}

impl Backend {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::A => "a",
            Backend::B => "b",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::A => write!(f, "A"),
            Backend::B => write!(f, "B"),
        }
    }
}

/// A backend identity bound to its base address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    pub backend: Backend,
    pub base_url: Url,
}

impl BackendTarget {
    pub fn new(backend: Backend, base_url: Url) -> Self {
        Self { backend, base_url }
    }
}

/// The A/B pair the proxy splits traffic between.
#[derive(Debug, Clone)]
pub struct Backends {
    a: BackendTarget,
    b: BackendTarget,
}

impl Backends {
    pub fn new(a: Url, b: Url) -> Self {
        Self {
            a: BackendTarget::new(Backend::A, a),
            b: BackendTarget::new(Backend::B, b),
        }
    }

    /// Parse both base URLs from configuration.
    pub fn from_config(config: &BackendsConfig) -> Result<Self, ValidationError> {
        let a = parse_backend_url("backends.a_url", &config.a_url)?;
        let b = parse_backend_url("backends.b_url", &config.b_url)?;
        Ok(Self::new(a, b))
    }

    pub fn a(&self) -> &BackendTarget {
        &self.a
    }

    pub fn b(&self) -> &BackendTarget {
        &self.b
    }
}
