//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Create the Axum app that hands every request to the request router
//! - Wire up middleware (tracing, timeout, request ID)
//! - Accept connections on the bounded listener and serve them with hyper
//! - Close idle keep-alive connections
//! - Drain in-flight requests on shutdown, bounded by a grace period

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use thiserror::Error;
use tokio::net::TcpStream;
use tower::ServiceExt;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::loader::ConfigError;
use crate::config::validation::{validate_config, ValidationError};
use crate::config::{GatewayConfig, TimeoutConfig};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::{Lifecycle, ServerState, ShutdownSignal};
use crate::net::connection::{ConnectionActivity, ConnectionTracker};
use crate::net::listener::{Accepted, ConnectionPermit, Listener, ListenerError};
use crate::proxy::{HttpForwarder, NoRouteSignal, RequestRouter};
use crate::routing::{Backends, RouteCache};

/// Error type for building or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RequestRouter<HttpForwarder>>,
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState, timeouts: &TimeoutConfig) -> Router {
    Router::new()
        .route("/{*path}", any(proxy_handler))
        .route("/", any(proxy_handler))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs)))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(set_request_id_layer())
}

async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.router.handle(request).await
}

/// Per-connection settings copied into every connection task.
#[derive(Debug, Clone, Copy)]
struct ConnectionSettings {
    read_header_timeout: Duration,
    idle_timeout: Duration,
}

/// A bound, not yet running gateway.
pub struct GatewayServer {
    listener: Listener,
    local_addr: SocketAddr,
    app: Router,
    router: Arc<RequestRouter<HttpForwarder>>,
    lifecycle: Lifecycle,
    tracker: ConnectionTracker,
    settings: ConnectionSettings,
    shutdown_grace: Duration,
}

impl GatewayServer {
    /// Validate `config`, bind the listener and build the app.
    ///
    /// Nothing is served until [`GatewayServer::run`].
    pub async fn bind(config: &GatewayConfig) -> Result<Self, ServerError> {
        validate_config(config).map_err(ConfigError::Validation)?;

        let backends = Backends::from_config(&config.backends)
            .map_err(|e| ConfigError::Validation(vec![e]))?;
        let signal = NoRouteSignal::from_name(&config.routing.no_route_header).map_err(|_| {
            ConfigError::Validation(vec![ValidationError::InvalidHeaderName(
                config.routing.no_route_header.clone(),
            )])
        })?;

        tracing::info!(
            backend_a = %backends.a().base_url,
            backend_b = %backends.b().base_url,
            no_route_header = %signal.header(),
            "Backends configured"
        );

        let router = Arc::new(RequestRouter::new(
            HttpForwarder::new(&config.timeouts),
            backends,
            signal,
            config.limits.max_body_bytes,
            config.routing.cache_on_upstream_error,
        ));
        let app = build_router(
            AppState {
                router: Arc::clone(&router),
            },
            &config.timeouts,
        );

        let listener = Listener::bind(&config.listener).await?;
        let local_addr = listener.local_addr();

        Ok(Self {
            listener,
            local_addr,
            app,
            router,
            lifecycle: Lifecycle::new(),
            tracker: ConnectionTracker::new(),
            settings: ConnectionSettings {
                read_header_timeout: Duration::from_secs(config.timeouts.read_header_secs),
                idle_timeout: Duration::from_secs(config.timeouts.idle_secs),
            },
            shutdown_grace: Duration::from_secs(config.timeouts.shutdown_grace_secs),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A handle that can stop the server from another task.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            lifecycle: self.lifecycle.clone(),
        }
    }

    /// The route cache, shared with the running server.
    pub fn route_cache(&self) -> RouteCache {
        self.router.cache().clone()
    }

    /// Serve until shutdown is requested, then drain.
    pub async fn run(self) -> Result<(), ServerError> {
        let GatewayServer {
            listener,
            local_addr,
            app,
            router: _,
            lifecycle,
            tracker,
            settings,
            shutdown_grace,
        } = self;

        if !lifecycle.start() {
            tracing::info!("Shutdown requested before start; not serving");
            lifecycle.finish();
            return Ok(());
        }

        tracing::info!(address = %local_addr, "Gateway serving");

        let mut shutdown = lifecycle.subscribe();
        loop {
            let accepted = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok(Accepted {
                    stream,
                    peer,
                    permit,
                }) => {
                    let guard = tracker.track();
                    tracing::debug!(connection_id = %guard.id(), peer = %peer, "Connection opened");
                    let task = ConnectionTask {
                        app: app.clone(),
                        peer,
                        permit,
                        settings,
                        shutdown: lifecycle.subscribe(),
                        activity: ConnectionActivity::shared(),
                    };
                    tokio::spawn(async move {
                        task.serve(stream).await;
                        drop(guard);
                    });
                }
                Err(ListenerError::Accept(e)) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Listener failed");
                    break;
                }
            }
        }

        // Stop accepting before draining.
        drop(listener);
        lifecycle.request_stop();
        tracing::info!(
            open_connections = tracker.open_connections(),
            grace_secs = shutdown_grace.as_secs(),
            "Draining connections"
        );

        if tokio::time::timeout(shutdown_grace, tracker.wait_until_idle())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = tracker.open_connections(),
                "Grace period elapsed with connections still open"
            );
        }

        lifecycle.finish();
        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Stops a [`GatewayServer`] from outside its `run` task.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    lifecycle: Lifecycle,
}

impl ServerHandle {
    /// Request a graceful shutdown. Returns false if one was already requested.
    pub fn shutdown(&self) -> bool {
        let first = self.lifecycle.request_stop();
        if first {
            tracing::info!("Shutdown requested");
        }
        first
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }
}

/// One accepted client connection.
struct ConnectionTask {
    app: Router,
    peer: SocketAddr,
    permit: ConnectionPermit,
    settings: ConnectionSettings,
    shutdown: ShutdownSignal,
    activity: Arc<ConnectionActivity>,
}

impl ConnectionTask {
    async fn serve(self, stream: TcpStream) {
        let ConnectionTask {
            app,
            peer,
            permit: _permit,
            settings,
            mut shutdown,
            activity,
        } = self;

        let service = {
            let activity = Arc::clone(&activity);
            service_fn(move |mut request: Request<Incoming>| {
                let active = activity.begin();
                request.extensions_mut().insert(ConnectInfo(peer));
                let app = app.clone();
                async move {
                    let response = app.oneshot(request.map(Body::new)).await;
                    drop(active);
                    response
                }
            })
        };

        let conn = http1::Builder::new()
            .timer(TokioTimer::new())
            .header_read_timeout(settings.read_header_timeout)
            .serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        let check_every = (settings.idle_timeout / 4)
            .clamp(Duration::from_millis(10), Duration::from_secs(1));
        let mut idle_check = tokio::time::interval(check_every);
        let mut draining = false;

        loop {
            tokio::select! {
                result = conn.as_mut() => {
                    if let Err(e) = result {
                        tracing::debug!(peer = %peer, error = %e, "Connection ended with error");
                    }
                    break;
                }
                _ = shutdown.recv(), if !draining => {
                    draining = true;
                    conn.as_mut().graceful_shutdown();
                }
                _ = idle_check.tick(), if !draining => {
                    if activity
                        .idle_for()
                        .is_some_and(|idle| idle >= settings.idle_timeout)
                    {
                        tracing::debug!(peer = %peer, "Closing idle connection");
                        draining = true;
                        conn.as_mut().graceful_shutdown();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(a_url: &str) -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.listener.host = "127.0.0.1".into();
        config.listener.port = Some(0);
        config.backends.a_url = a_url.into();
        config.backends.b_url = "http://127.0.0.1:9".into();
        config
    }

    #[tokio::test]
    async fn bind_rejects_bad_backend() {
        let err = GatewayServer::bind(&config("ftp://files.internal"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ServerError::Config(ConfigError::Validation(_))));
    }

    #[tokio::test]
    async fn shutdown_before_run_returns_immediately() {
        let server = GatewayServer::bind(&config("http://127.0.0.1:9")).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);

        let handle = server.handle();
        assert_eq!(handle.state(), ServerState::NotStarted);
        assert!(handle.shutdown());
        assert!(!handle.shutdown());

        tokio::time::timeout(Duration::from_secs(1), server.run())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handle.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn running_server_stops_on_shutdown() {
        let server = GatewayServer::bind(&config("http://127.0.0.1:9")).await.unwrap();
        let handle = server.handle();
        let task = tokio::spawn(server.run());

        while handle.state() != ServerState::Running {
            tokio::task::yield_now().await;
        }
        handle.shutdown();

        tokio::time::timeout(Duration::from_secs(3), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(handle.state(), ServerState::Stopped);
    }
}
