//! A-then-B reverse proxying.
//!
//! # Data Flow
//! ```text
//! client request
//!     → router.rs (route key, cache lookup)
//!         ├─ hit  → dispatch.rs (stream to the cached backend)
//!         └─ miss → body.rs (buffer) → fallback.rs (probe A, maybe replay to B)
//!     → forward.rs (rewrite URI and headers, send upstream)
//!     → response back to the client
//! ```

pub mod body;
pub mod dispatch;
pub mod fallback;
pub mod forward;
pub mod router;
pub mod signal;

#[cfg(test)]
pub(crate) mod testing;

pub use body::{BufferError, BufferedRequest, InMemoryBody, ReplayError, ReplayableBody};
pub use dispatch::DirectDispatcher;
pub use fallback::{FallbackEngine, FallbackReason, Probe, Resolution, Via};
pub use forward::{Forward, ForwardError, HttpForwarder};
pub use router::RequestRouter;
pub use signal::{NoRouteSignal, DEFAULT_NO_ROUTE_HEADER};
