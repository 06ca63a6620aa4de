//! The forwarding primitive.
//!
//! # Responsibilities
//! - Rewrite the request URI onto a backend base URL
//! - Strip hop-by-hop headers in both directions
//! - Add `X-Forwarded-*` headers
//! - Stream the backend response back unbuffered
//!
//! # Design Decisions
//! - [`Forward`] is the only seam between routing logic and the transport
//! - Connect timeout lives on the connector; a separate timeout bounds the
//!   wait for response headers
//! - Plain HTTP only; no TLS client

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Response, Uri, Version};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use url::Url;

use crate::config::TimeoutConfig;

/// Failure to obtain a response from a backend.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid upstream uri: {0}")]
    InvalidUri(#[from] axum::http::uri::InvalidUri),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

/// Sends a request to a backend and returns its response.
pub trait Forward: Send + Sync + 'static {
    fn forward(
        &self,
        target: &Url,
        request: Request<Body>,
    ) -> impl Future<Output = Result<Response<Body>, ForwardError>> + Send;
}

/// [`Forward`] over a pooled hyper client.
#[derive(Clone)]
pub struct HttpForwarder {
    client: Client<HttpConnector, Body>,
    upstream_timeout: Duration,
}

impl HttpForwarder {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(timeouts.idle_secs))
            .build(connector);

        Self {
            client,
            upstream_timeout: Duration::from_secs(timeouts.upstream_secs),
        }
    }
}

impl Forward for HttpForwarder {
    fn forward(
        &self,
        target: &Url,
        request: Request<Body>,
    ) -> impl Future<Output = Result<Response<Body>, ForwardError>> + Send {
        let prepared = prepare_request(target, request);
        async move {
            let request = prepared?;
            let response = tokio::time::timeout(self.upstream_timeout, self.client.request(request))
                .await
                .map_err(|_| ForwardError::Timeout(self.upstream_timeout))??;

            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Ok(Response::from_parts(parts, Body::new(body)))
        }
    }
}

/// Turn an inbound request into one addressed to `target`.
pub fn prepare_request(target: &Url, request: Request<Body>) -> Result<Request<Body>, ForwardError> {
    let (mut parts, body) = request.into_parts();

    let original_host = parts
        .headers
        .get(header::HOST)
        .cloned()
        .or_else(|| {
            parts
                .uri
                .authority()
                .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
        });
    let client_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    parts.uri = rewrite_uri(target, &parts.uri)?;
    parts.version = Version::HTTP_11;

    strip_hop_by_hop(&mut parts.headers);
    add_forwarded_headers(&mut parts.headers, original_host, client_addr);

    if let Some(authority) = parts.uri.authority() {
        if let Ok(host) = HeaderValue::from_str(authority.as_str()) {
            parts.headers.insert(header::HOST, host);
        }
    }

    Ok(Request::from_parts(parts, body))
}

/// Join the backend base URL with the inbound path and query.
pub fn rewrite_uri(target: &Url, uri: &Uri) -> Result<Uri, ForwardError> {
    let host = target.host_str().unwrap_or_default();
    let authority = match target.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let path = join_paths(target.path(), uri.path());

    let query = match (
        target.query().filter(|q| !q.is_empty()),
        uri.query().filter(|q| !q.is_empty()),
    ) {
        (Some(base), Some(inbound)) => format!("?{base}&{inbound}"),
        (Some(q), None) | (None, Some(q)) => format!("?{q}"),
        (None, None) => String::new(),
    };

    Ok(format!("{}://{}{}{}", target.scheme(), authority, path, query).parse()?)
}

/// Join two path segments with exactly one slash between them.
pub fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove headers that only apply to a single transport hop.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn add_forwarded_headers(
    headers: &mut HeaderMap,
    original_host: Option<HeaderValue>,
    client_addr: Option<SocketAddr>,
) {
    if let Some(host) = original_host {
        headers.insert("x-forwarded-host", host);
    }

    if let Some(addr) = client_addr {
        let ip = addr.ip().to_string();
        let forwarded_for = match headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            Some(prior) => format!("{prior}, {ip}"),
            None => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert("x-forwarded-for", value);
        }
    }

    headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
}
