//! Replayable request buffering.
//!
//! A first-time route may need to be sent twice: once to A and, if A has no
//! route for it, again to B. The inbound body stream can only be read once,
//! so it is collected up front and re-opened for every attempt.

use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::extract::ConnectInfo;
use axum::http::{request, HeaderMap, Method, Request, Uri, Version};
use axum::BoxError;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use thiserror::Error;

/// Failure collecting the inbound body.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("error reading body: {0}")]
    Read(BoxError),
}

/// Failure reproducing a buffered body.
#[derive(Debug, Error)]
#[error("error re-reading body: {source}")]
pub struct ReplayError {
    #[from]
    source: std::io::Error,
}

/// A body that can be read from the start any number of times.
pub trait ReplayableBody: Send + Sync {
    /// A fresh body, byte-identical to the original.
    fn open(&self) -> Result<Body, ReplayError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Body held entirely in memory.
#[derive(Debug, Clone)]
pub struct InMemoryBody(Bytes);

impl InMemoryBody {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }
}

impl ReplayableBody for InMemoryBody {
    fn open(&self) -> Result<Body, ReplayError> {
        Ok(Body::from(self.0.clone()))
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

/// An inbound request whose body can be replayed.
pub struct BufferedRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    client_addr: Option<SocketAddr>,
    body: Box<dyn ReplayableBody>,
}

impl BufferedRequest {
    /// Read the whole body of `request` into memory.
    ///
    /// With a `limit`, bodies longer than that many bytes fail with
    /// [`BufferError::TooLarge`]. Without one the body is read in full.
    pub async fn buffer(request: Request<Body>, limit: Option<usize>) -> Result<Self, BufferError> {
        let (parts, body) = request.into_parts();

        let bytes = match limit {
            Some(limit) => match Limited::new(body, limit).collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) if e.is::<LengthLimitError>() => return Err(BufferError::TooLarge { limit }),
                Err(e) => return Err(BufferError::Read(e)),
            },
            None => body
                .collect()
                .await
                .map_err(|e| BufferError::Read(e.into()))?
                .to_bytes(),
        };

        Ok(Self::from_parts(parts, InMemoryBody::new(bytes)))
    }

    pub fn from_parts(parts: request::Parts, body: impl ReplayableBody + 'static) -> Self {
        let client_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            client_addr,
            body: Box::new(body),
        }
    }

    /// A new request positioned at the start of the original body.
    pub fn rewind(&self) -> Result<Request<Body>, ReplayError> {
        let mut request = Request::new(self.body.open()?);
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.version_mut() = self.version;
        *request.headers_mut() = self.headers.clone();
        if let Some(addr) = self.client_addr {
            request.extensions_mut().insert(ConnectInfo(addr));
        }
        Ok(request)
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}
