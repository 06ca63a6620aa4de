//! The no-route signal.
//!
//! Backend A answers a request it has no handler for with `404 Not Found`
//! plus a reserved, non-empty response header. A 404 without the header is
//! application data ("that record does not exist") and is served as-is.

use axum::http::header::InvalidHeaderName;
use axum::http::{HeaderName, Response, StatusCode};

pub const DEFAULT_NO_ROUTE_HEADER: &str = "x-no-route";

/// Recognizes backend A's "I don't own this route" responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoRouteSignal {
    header: HeaderName,
}

impl NoRouteSignal {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }

    pub fn from_name(name: &str) -> Result<Self, InvalidHeaderName> {
        Ok(Self::new(HeaderName::from_bytes(name.as_bytes())?))
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// True for a 404 carrying the header with a non-empty value.
    pub fn is_signalled<B>(&self, response: &Response<B>) -> bool {
        response.status() == StatusCode::NOT_FOUND
            && response
                .headers()
                .get_all(&self.header)
                .iter()
                .any(|value| !value.is_empty())
    }
}

impl Default for NoRouteSignal {
    fn default() -> Self {
        Self::new(HeaderName::from_static(DEFAULT_NO_ROUTE_HEADER))
    }
}
