//! Route fingerprinting.
//!
//! A [`RouteKey`] identifies a logical route by method and path only. Query
//! string, headers and body never participate, so two requests that differ
//! only in those always resolve to the same backend.

use std::fmt;

use axum::http::{Method, Request, Uri};

/// The `(method, path)` pair a routing decision is remembered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    method: Method,
    path: String,
}

impl RouteKey {
    /// Build a key from a method and request URI.
    ///
    /// The path is taken as sent, without percent-decoding or normalisation,
    /// so `/a%2Fb` and `/a/b` (or `/%61` and `/a`) are distinct keys.
    pub fn new(method: &Method, uri: &Uri) -> Self {
        Self {
            method: method.clone(),
            path: uri.path().to_string(),
        }
    }

    /// Derive the key of an inbound request.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self::new(request.method(), request.uri())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}
