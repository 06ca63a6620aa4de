//! In-process backends for unit tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Method, Request, Response, StatusCode};
use url::Url;

use crate::proxy::forward::{Forward, ForwardError};
use crate::proxy::signal::DEFAULT_NO_ROUTE_HEADER;
use crate::routing::Backends;

/// Answers a request given its path and body.
pub(crate) type Responder =
    Box<dyn Fn(&str, &Bytes) -> Result<Response<Body>, ForwardError> + Send + Sync>;

/// A [`Forward`] that dispatches on the target host's first label
/// (`a.test` → `"a"`) and records every call.
#[derive(Default)]
pub(crate) struct StubForwarder {
    responders: HashMap<String, Responder>,
    hits: Mutex<Vec<String>>,
    uris: Mutex<Vec<String>>,
    bodies: Mutex<Vec<Bytes>>,
}

impl StubForwarder {
    pub(crate) fn with(mut self, label: &str, responder: Responder) -> Self {
        self.responders.insert(label.to_string(), responder);
        self
    }

    pub(crate) fn unreachable_a(self) -> Self {
        self.with("a", unreachable())
    }

    pub(crate) fn unreachable_b(self) -> Self {
        self.with("b", unreachable())
    }

    /// Backend labels in call order.
    pub(crate) fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    /// Path and query of every forwarded request.
    pub(crate) fn uris(&self) -> Vec<String> {
        self.uris.lock().unwrap().clone()
    }

    pub(crate) fn bodies(&self) -> Vec<Bytes> {
        self.bodies.lock().unwrap().clone()
    }

    pub(crate) fn reset(&self) {
        self.hits.lock().unwrap().clear();
        self.uris.lock().unwrap().clear();
        self.bodies.lock().unwrap().clear();
    }
}

impl Forward for StubForwarder {
    fn forward(
        &self,
        target: &Url,
        request: Request<Body>,
    ) -> impl Future<Output = Result<Response<Body>, ForwardError>> + Send {
        let label = target
            .host_str()
            .and_then(|host| host.split('.').next())
            .unwrap_or_default()
            .to_string();

        async move {
            let (parts, body) = request.into_parts();
            let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();

            let uri = parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_default();
            self.hits.lock().unwrap().push(label.clone());
            self.uris.lock().unwrap().push(uri);
            self.bodies.lock().unwrap().push(bytes.clone());

            match self.responders.get(&label) {
                Some(responder) => responder(parts.uri.path(), &bytes),
                None => Err(ForwardError::Timeout(Duration::from_millis(1))),
            }
        }
    }
}

fn unreachable() -> Responder {
    Box::new(|_: &str, _: &Bytes| Err(ForwardError::Timeout(Duration::from_secs(1))))
}

/// Echoes `"<LABEL>:<body>"`, serving `owned` paths with 200 and answering
/// everything else with a no-route 404. `plain_404` paths get a 404 without
/// the header.
fn echo(label: &'static str, owned: &'static [&'static str], plain_404: &'static [&'static str]) -> Responder {
    Box::new(move |path: &str, body: &Bytes| {
        let text = format!("{}:{}", label.to_uppercase(), String::from_utf8_lossy(body));
        let mut builder = Response::builder();
        builder = if owned.iter().any(|p| *p == path) {
            builder.status(StatusCode::OK)
        } else if plain_404.iter().any(|p| *p == path) {
            builder.status(StatusCode::NOT_FOUND)
        } else {
            builder
                .status(StatusCode::NOT_FOUND)
                .header(DEFAULT_NO_ROUTE_HEADER, label)
        };
        Ok(builder.body(Body::from(text)).unwrap())
    })
}

/// A owns `/exists-in-a`, B owns `/exists-in-b`.
pub(crate) fn echo_forwarder() -> StubForwarder {
    StubForwarder::default()
        .with("a", echo("a", &["/exists-in-a"], &["/exists-in-a-but-no-data"]))
        .with("b", echo("b", &["/exists-in-b"], &["/exists-in-b-but-no-data"]))
}

pub(crate) fn stub_backends() -> Backends {
    Backends::new(
        Url::parse("http://a.test").unwrap(),
        Url::parse("http://b.test").unwrap(),
    )
}

pub(crate) fn request(method: Method, uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body))
        .unwrap()
}

pub(crate) async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
