//! Echo backend for trying the gateway locally.
//!
//! Answers `<NAME>:<request body>` on the paths it owns and `404` plus the
//! no-route header everywhere else.
//!
//! ```text
//! NAME=A PORT=3001 ROUTES=/exists-in-a cargo run --example echo_backend
//! NAME=B PORT=3002 ROUTES=/exists-in-b cargo run --example echo_backend
//! GATEWAY_A_URL=http://127.0.0.1:3001 GATEWAY_B_URL=http://127.0.0.1:3002 \
//!     GATEWAY_PORT=3000 cargo run
//! ```

use std::env;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use gateway_proxy::proxy::DEFAULT_NO_ROUTE_HEADER;
use tokio::net::TcpListener;

struct Echo {
    name: String,
    routes: Vec<String>,
}

async fn echo(State(echo): State<Arc<Echo>>, uri: Uri, body: Bytes) -> Response {
    let text = format!("{}:{}", echo.name, String::from_utf8_lossy(&body));
    if echo.routes.iter().any(|route| route == uri.path()) {
        (StatusCode::OK, text).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            [(DEFAULT_NO_ROUTE_HEADER, echo.name.to_lowercase())],
            text,
        )
            .into_response()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    gateway_proxy::observability::logging::init_logging("info");

    let name = env::var("NAME").unwrap_or_else(|_| "A".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let routes = env::var("ROUTES")
        .map(|raw| raw.split(',').map(|r| r.trim().to_string()).collect())
        .unwrap_or_else(|_| vec![format!("/exists-in-{}", name.to_lowercase())]);

    tracing::info!(name = %name, port = %port, routes = ?routes, "Echo backend starting");

    let app = Router::new()
        .fallback(echo)
        .with_state(Arc::new(Echo { name, routes }));
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
