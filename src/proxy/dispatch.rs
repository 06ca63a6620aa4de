//! Direct dispatch to a known backend.
//!
//! Used once the route cache has an answer: no inspection, no caching side
//! effects, the response streams back exactly as the backend sent it.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;

use crate::http::response::GatewayError;
use crate::proxy::forward::{Forward, ForwardError};
use crate::routing::{Backend, BackendTarget};

pub struct DirectDispatcher<F> {
    target: BackendTarget,
    forwarder: Arc<F>,
}

impl<F: Forward> DirectDispatcher<F> {
    pub fn new(target: BackendTarget, forwarder: Arc<F>) -> Self {
        Self { target, forwarder }
    }

    pub fn backend(&self) -> Backend {
        self.target.backend
    }

    /// Forward and return the raw outcome.
    pub async fn try_dispatch(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError> {
        self.forwarder.forward(&self.target.base_url, request).await
    }

    /// Forward, turning transport failures into a 502/504 for the client.
    pub async fn dispatch(&self, request: Request<Body>) -> Response<Body> {
        match self.try_dispatch(request).await {
            Ok(response) => response,
            Err(source) => {
                tracing::warn!(
                    backend = %self.target.backend,
                    target = %self.target.base_url,
                    error = %source,
                    "Backend request failed"
                );
                GatewayError::Upstream {
                    backend: self.target.backend,
                    source,
                }
                .into_response()
            }
        }
    }
}
