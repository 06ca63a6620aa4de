//! Per-request routing.
//!
//! # Request flow
//! 1. Derive the route key from method and path
//! 2. Cache hit: stream the request straight to the known backend
//! 3. Cache miss: buffer the body, then let the fallback engine decide
//!
//! Cached routes are never re-validated; a route that later moves from B
//! to A keeps going to B for the life of the process.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;

use crate::http::response::GatewayError;
use crate::observability::metrics;
use crate::proxy::body::BufferedRequest;
use crate::proxy::dispatch::DirectDispatcher;
use crate::proxy::fallback::{FallbackEngine, Resolution, Via};
use crate::proxy::forward::Forward;
use crate::proxy::signal::NoRouteSignal;
use crate::routing::{Backend, Backends, RouteCache, RouteKey};

pub struct RequestRouter<F> {
    forwarder: Arc<F>,
    cache: RouteCache,
    direct_a: DirectDispatcher<F>,
    direct_b: DirectDispatcher<F>,
    engine: FallbackEngine<F>,
    max_body_bytes: Option<usize>,
}

impl<F: Forward> RequestRouter<F> {
    pub fn new(
        forwarder: F,
        backends: Backends,
        signal: NoRouteSignal,
        max_body_bytes: Option<usize>,
        cache_on_upstream_error: bool,
    ) -> Self {
        let forwarder = Arc::new(forwarder);
        let cache = RouteCache::new();

        let direct_a = DirectDispatcher::new(backends.a().clone(), Arc::clone(&forwarder));
        let direct_b = DirectDispatcher::new(backends.b().clone(), Arc::clone(&forwarder));
        let engine = FallbackEngine::new(Arc::clone(&forwarder), backends, cache.clone(), signal)
            .cache_on_upstream_error(cache_on_upstream_error);

        Self {
            forwarder,
            cache,
            direct_a,
            direct_b,
            engine,
            max_body_bytes,
        }
    }

    pub fn forwarder(&self) -> &F {
        &self.forwarder
    }

    /// The route cache shared by every request through this router.
    pub fn cache(&self) -> &RouteCache {
        &self.cache
    }

    /// Route one client request and produce the response to send back.
    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        let start = Instant::now();
        let key = RouteKey::from_request(&request);
        let method = request.method().clone();

        let (response, served_by, via) = self.route(&key, request).await;

        let served_label = served_by.map(|b| b.as_str()).unwrap_or("none");
        tracing::debug!(
            method = %method,
            path = %key.path(),
            served_by = served_label,
            via = %via,
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request routed"
        );
        metrics::record_request(
            method.as_str(),
            response.status().as_u16(),
            served_label,
            via.as_str(),
            start,
        );

        response
    }

    async fn route(&self, key: &RouteKey, request: Request<Body>) -> (Response<Body>, Option<Backend>, Via) {
        if let Some(backend) = self.cache.lookup(key) {
            let dispatcher = match backend {
                Backend::A => &self.direct_a,
                Backend::B => &self.direct_b,
            };
            return (dispatcher.dispatch(request).await, Some(backend), Via::Cache);
        }

        match self.resolve(key, request).await {
            Ok(Resolution {
                response,
                served_by,
                via,
            }) => (response, Some(served_by), via),
            Err(e) => (e.into_response(), None, Via::Rejected),
        }
    }

    async fn resolve(&self, key: &RouteKey, request: Request<Body>) -> Result<Resolution, GatewayError> {
        let buffered = BufferedRequest::buffer(request, self.max_body_bytes)
            .await
            .inspect_err(|e| tracing::warn!(route = %key, error = %e, "Could not buffer request body"))?;

        self.engine.serve(key, &buffered).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::proxy::testing::{body_string, echo_forwarder, request, stub_backends, StubForwarder};
    use axum::http::{Method, StatusCode};

    fn router(forwarder: StubForwarder) -> RequestRouter<StubForwarder> {
        RequestRouter::new(forwarder, stub_backends(), NoRouteSignal::default(), Some(1024), false)
    }

    fn hits(router: &RequestRouter<StubForwarder>) -> Vec<String> {
        router.forwarder().hits()
    }

    #[tokio::test]
    async fn route_owned_by_a() {
        let router = router(echo_forwarder());

        let response = router.handle(request(Method::POST, "/exists-in-a", "hello")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "A:hello");
        assert_eq!(hits(&router), vec!["a"]);

        let response = router.handle(request(Method::POST, "/exists-in-a", "again")).await;
        assert_eq!(body_string(response).await, "A:again");
        assert_eq!(hits(&router), vec!["a", "a"]);
    }

    #[tokio::test]
    async fn route_owned_by_b_is_probed_once() {
        let router = router(echo_forwarder());

        let response = router.handle(request(Method::GET, "/exists-in-b", "hello")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "B:hello");
        assert_eq!(hits(&router), vec!["a", "b"]);

        // Cached: A is skipped from now on.
        let response = router.handle(request(Method::GET, "/exists-in-b", "hello")).await;
        assert_eq!(body_string(response).await, "B:hello");
        assert_eq!(hits(&router), vec!["a", "b", "b"]);
    }

    #[tokio::test]
    async fn a_application_404_is_final() {
        let router = router(echo_forwarder());

        let response = router
            .handle(request(Method::POST, "/exists-in-a-but-no-data", "hello"))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!response.headers().contains_key("x-no-route"));
        assert_eq!(body_string(response).await, "A:hello");
        assert_eq!(hits(&router), vec!["a"]);
        assert_eq!(
            router.cache().lookup(&RouteKey::new(&Method::POST, &"/exists-in-a-but-no-data".parse().unwrap())),
            Some(Backend::A)
        );
    }

    #[tokio::test]
    async fn unknown_route_relays_b_not_found() {
        let router = router(echo_forwarder());

        let response = router.handle(request(Method::POST, "/missing", "hello")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["x-no-route"], "b");
        assert_eq!(body_string(response).await, "B:hello");

        let response = router.handle(request(Method::POST, "/missing", "hello")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(hits(&router), vec!["a", "b", "b"]);
    }

    #[tokio::test]
    async fn method_is_part_of_the_key() {
        let router = router(echo_forwarder());

        router.handle(request(Method::GET, "/exists-in-b", "")).await;
        router.handle(request(Method::POST, "/exists-in-b", "")).await;
        assert_eq!(hits(&router), vec!["a", "b", "a", "b"]);
        assert_eq!(router.cache().len(), 2);
    }

    #[tokio::test]
    async fn query_and_body_do_not_split_the_key() {
        let router = router(echo_forwarder());

        router.handle(request(Method::GET, "/exists-in-b?page=1", "x")).await;
        let response = router.handle(request(Method::GET, "/exists-in-b?page=2", "y")).await;

        assert_eq!(body_string(response).await, "B:y");
        assert_eq!(hits(&router), vec!["a", "b", "b"]);
        assert_eq!(router.cache().len(), 1);
        // The query still reaches the backend.
        assert_eq!(
            router.forwarder().uris(),
            vec!["/exists-in-b?page=1", "/exists-in-b?page=1", "/exists-in-b?page=2"]
        );
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_before_any_backend() {
        let router = RequestRouter::new(echo_forwarder(), stub_backends(), NoRouteSignal::default(), Some(4), false);

        let response = router.handle(request(Method::POST, "/exists-in-a", "too long")).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(router.forwarder().hits().is_empty());
        assert!(router.cache().is_empty());
    }

    #[tokio::test]
    async fn rejected_body_is_labelled_rejected() {
        let router = RequestRouter::new(echo_forwarder(), stub_backends(), NoRouteSignal::default(), Some(4), false);
        let key = RouteKey::new(&Method::POST, &"/exists-in-a".parse().unwrap());

        let (response, served_by, via) = router
            .route(&key, request(Method::POST, "/exists-in-a", "too long"))
            .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(served_by, None);
        assert_eq!(via, Via::Rejected);
        assert_eq!(via.as_str(), "rejected");
    }

    #[tokio::test]
    async fn large_first_body_is_accepted_by_default() {
        let limit = GatewayConfig::default().limits.max_body_bytes;
        let router = RequestRouter::new(echo_forwarder(), stub_backends(), NoRouteSignal::default(), limit, false);

        let payload = vec![b'x'; 3 * 1024 * 1024];
        let inbound = Request::builder()
            .method(Method::POST)
            .uri("/exists-in-a")
            .body(Body::from(payload.clone()))
            .unwrap();

        let response = router.handle(inbound).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits(&router), vec!["a"]);
        assert_eq!(router.forwarder().bodies()[0].len(), payload.len());
        assert_eq!(
            router.cache().lookup(&RouteKey::new(&Method::POST, &"/exists-in-a".parse().unwrap())),
            Some(Backend::A)
        );
    }

    #[tokio::test]
    async fn unreachable_a_is_retried_on_every_request() {
        let router = router(echo_forwarder().unreachable_a());

        for _ in 0..2 {
            let response = router.handle(request(Method::GET, "/exists-in-b", "")).await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(hits(&router), vec!["a", "b", "a", "b"]);
        assert!(router.cache().is_empty());
    }

    #[tokio::test]
    async fn cache_clear_forces_a_new_probe() {
        let router = router(echo_forwarder());

        router.handle(request(Method::GET, "/exists-in-b", "")).await;
        router.cache().clear();
        router.forwarder().reset();

        router.handle(request(Method::GET, "/exists-in-b", "")).await;
        assert_eq!(hits(&router), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn concurrent_first_requests_converge() {
        let router = Arc::new(router(echo_forwarder()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let router = Arc::clone(&router);
                tokio::spawn(async move {
                    let response = router.handle(request(Method::GET, "/exists-in-b", "p")).await;
                    body_string(response).await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), "B:p");
        }
        assert_eq!(
            router.cache().lookup(&RouteKey::new(&Method::GET, &"/exists-in-b".parse().unwrap())),
            Some(Backend::B)
        );
        // Every request reached B exactly once, however many probed A.
        let b_hits = hits(&router).iter().filter(|h| *h == "b").count();
        assert_eq!(b_hits, 16);
    }
}
