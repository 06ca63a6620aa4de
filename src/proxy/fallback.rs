//! The probe-then-fallback decision engine.
//!
//! # Protocol
//! ```text
//! not yet tried
//!     → try A ──────────────┬─ answer without signal → cache A → resolved (A's response)
//!                           ├─ 404 + no-route signal → cache B ─┐
//!                           └─ transport failure ───────────────┤ (cache B only if configured)
//!                                                               ▼
//!                                        rewind body → dispatch to B → resolved (B's response)
//! ```
//!
//! A's response is fully inspected before anything reaches the client, so a
//! no-route answer is dropped and never leaks out. B is the last resort and
//! its response is never inspected.

use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use thiserror::Error;

use crate::http::response::GatewayError;
use crate::observability::metrics;
use crate::proxy::body::BufferedRequest;
use crate::proxy::dispatch::DirectDispatcher;
use crate::proxy::forward::{Forward, ForwardError};
use crate::proxy::signal::NoRouteSignal;
use crate::routing::{Backend, Backends, RouteCache, RouteKey};

/// Why a request is being retried against B.
#[derive(Debug, Error)]
pub enum FallbackReason {
    #[error("backend A has no route")]
    NoRoute,

    #[error("backend A unreachable: {0}")]
    UpstreamError(ForwardError),
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::NoRoute => "no_route",
            FallbackReason::UpstreamError(_) => "upstream_error",
        }
    }
}

/// Result of trying backend A.
#[derive(Debug)]
pub enum Probe {
    /// A answered for this route; its response goes to the client untouched.
    Served(Response<Body>),
    /// A could not serve the route; B must be tried.
    NeedsFallback(FallbackReason),
}

/// How the serving backend was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Via {
    /// Route cache hit.
    Cache,
    /// First-time route answered by A.
    Probe,
    /// First-time route retried on B.
    Fallback,
    /// First-time request the gateway could not pass on.
    Rejected,
}

impl Via {
    pub fn as_str(&self) -> &'static str {
        match self {
            Via::Cache => "cache",
            Via::Probe => "probe",
            Via::Fallback => "fallback",
            Via::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A first-time route that reached a backend.
#[derive(Debug)]
pub struct Resolution {
    pub response: Response<Body>,
    pub served_by: Backend,
    pub via: Via,
}

pub struct FallbackEngine<F> {
    forwarder: Arc<F>,
    backends: Backends,
    fallback: DirectDispatcher<F>,
    cache: RouteCache,
    signal: NoRouteSignal,
    cache_on_upstream_error: bool,
}

impl<F: Forward> FallbackEngine<F> {
    pub fn new(forwarder: Arc<F>, backends: Backends, cache: RouteCache, signal: NoRouteSignal) -> Self {
        let fallback = DirectDispatcher::new(backends.b().clone(), Arc::clone(&forwarder));
        Self {
            forwarder,
            backends,
            fallback,
            cache,
            signal,
            cache_on_upstream_error: false,
        }
    }

    /// Also cache B when A fails at the transport level.
    pub fn cache_on_upstream_error(mut self, enabled: bool) -> Self {
        self.cache_on_upstream_error = enabled;
        self
    }

    /// Send `request` to A and classify the answer, recording the decision.
    pub async fn try_backend_a(&self, key: &RouteKey, request: Request<Body>) -> Probe {
        let target = self.backends.a();

        match self.forwarder.forward(&target.base_url, request).await {
            Ok(response) if self.signal.is_signalled(&response) => {
                // Dropping the response discards A's body unread.
                drop(response);
                self.cache.record(key.clone(), Backend::B);
                Probe::NeedsFallback(FallbackReason::NoRoute)
            }
            Ok(response) => {
                self.cache.record(key.clone(), Backend::A);
                Probe::Served(response)
            }
            Err(e) => {
                tracing::warn!(route = %key, target = %target.base_url, error = %e, "Backend A request failed");
                if self.cache_on_upstream_error {
                    self.cache.record(key.clone(), Backend::B);
                }
                Probe::NeedsFallback(FallbackReason::UpstreamError(e))
            }
        }
    }

    /// Serve a first-time route: probe A, then fall back to B when needed.
    ///
    /// Fails only when the buffered body cannot be reproduced; B is never
    /// contacted in that case.
    pub async fn serve(&self, key: &RouteKey, buffered: &BufferedRequest) -> Result<Resolution, GatewayError> {
        let request = buffered.rewind()?;

        let reason = match self.try_backend_a(key, request).await {
            Probe::Served(response) => {
                return Ok(Resolution {
                    response,
                    served_by: Backend::A,
                    via: Via::Probe,
                })
            }
            Probe::NeedsFallback(reason) => reason,
        };

        metrics::record_fallback(reason.as_str());
        tracing::debug!(route = %key, reason = %reason, "Falling back to B");

        let replay = buffered.rewind().map_err(|e| {
            tracing::error!(route = %key, error = %e, "Cannot replay request body for B");
            GatewayError::from(e)
        })?;

        let response = self.fallback.dispatch(replay).await;
        Ok(Resolution {
            response,
            served_by: Backend::B,
            via: Via::Fallback,
        })
    }
}
