//! A-then-B fallback reverse proxy library.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod proxy;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::GatewayConfig;
pub use http::{GatewayServer, ServerHandle};
pub use lifecycle::Shutdown;
pub use routing::RouteCache;
