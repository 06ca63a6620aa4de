//! Gateway-generated error responses.
//!
//! # Responsibilities
//! - Name every failure the gateway itself reports to a client
//! - Map each one to an HTTP status code
//!
//! # Design Decisions
//! - Backend responses are never rewritten; only failures to obtain one
//!   produce a gateway response
//! - Upstream timeouts result in 504 Gateway Timeout, other transport
//!   failures in 502 Bad Gateway

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::proxy::body::{BufferError, ReplayError};
use crate::proxy::forward::ForwardError;
use crate::routing::Backend;

/// A terminal failure for one request.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error("backend {backend} failed: {source}")]
    Upstream {
        backend: Backend,
        #[source]
        source: ForwardError,
    },
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Buffer(BufferError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Buffer(BufferError::Read(_)) | GatewayError::Replay(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::Upstream {
                source: ForwardError::Timeout(_),
                ..
            } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn status_mapping() {
        let too_large = GatewayError::from(BufferError::TooLarge { limit: 8 });
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let replay = GatewayError::from(ReplayError::from(std::io::Error::other("gone")));
        assert_eq!(replay.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let timeout = GatewayError::Upstream {
            backend: Backend::B,
            source: ForwardError::Timeout(Duration::from_secs(30)),
        };
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);

        let bad_uri = GatewayError::Upstream {
            backend: Backend::A,
            source: "not a uri".parse::<axum::http::Uri>().unwrap_err().into(),
        };
        assert_eq!(bad_uri.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn response_carries_status_and_message() {
        let response = GatewayError::Upstream {
            backend: Backend::B,
            source: ForwardError::Timeout(Duration::from_secs(1)),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
