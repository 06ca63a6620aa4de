//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use gateway_proxy::http::{GatewayServer, ServerError, ServerHandle};
use gateway_proxy::{GatewayConfig, RouteCache};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Backend hits in arrival order, shared by both backends.
pub type Hits = Arc<Mutex<Vec<String>>>;

#[derive(Clone)]
struct EchoState {
    label: &'static str,
    hits: Hits,
}

/// Start an echo backend labelled `label` ("a" or "b") on an ephemeral port.
///
/// - `/exists-in-<label>` → 200
/// - `/exists-in-<label>-but-no-data` → 404 without the no-route header
/// - anything else → 404 with `x-no-route: <label>`
///
/// Every response body is `I am the <LABEL> backend, you sent <body>`.
pub async fn start_echo_backend(label: &'static str, hits: Hits) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new()
        .fallback(echo)
        .with_state(EchoState { label, hits });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    addr
}

async fn echo(State(state): State<EchoState>, uri: Uri, body: Bytes) -> Response {
    state.hits.lock().unwrap().push(state.label.to_string());

    let text = format!(
        "I am the {} backend, you sent {}",
        state.label.to_uppercase(),
        String::from_utf8_lossy(&body)
    );
    let owned = format!("/exists-in-{}", state.label);
    let no_data = format!("/exists-in-{}-but-no-data", state.label);

    if uri.path() == owned {
        (StatusCode::OK, text).into_response()
    } else if uri.path() == no_data {
        (StatusCode::NOT_FOUND, text).into_response()
    } else {
        (StatusCode::NOT_FOUND, [("x-no-route", state.label)], text).into_response()
    }
}

/// A gateway running on an ephemeral port.
#[allow(dead_code)]
pub struct RunningGateway {
    pub addr: SocketAddr,
    pub handle: ServerHandle,
    pub cache: RouteCache,
    pub task: JoinHandle<Result<(), ServerError>>,
}

#[allow(dead_code)]
impl RunningGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Config pointing at the given backends, listening on an ephemeral port.
pub fn gateway_config(a_url: &str, b_url: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = Some(0);
    config.backends.a_url = a_url.into();
    config.backends.b_url = b_url.into();
    config.timeouts.connect_secs = 1;
    config.timeouts.upstream_secs = 5;
    config
}

/// Bind and spawn a gateway for `config`.
pub async fn start_gateway(config: GatewayConfig) -> RunningGateway {
    let server = GatewayServer::bind(&config).await.unwrap();
    let addr = server.local_addr();
    let handle = server.handle();
    let cache = server.route_cache();
    let task = tokio::spawn(server.run());

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;

    RunningGateway {
        addr,
        handle,
        cache,
        task,
    }
}

/// HTTP client that never goes through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Take and clear the recorded hits.
pub fn take_hits(hits: &Hits) -> String {
    let mut hits = hits.lock().unwrap();
    let joined = hits.join(", ");
    hits.clear();
    joined
}
