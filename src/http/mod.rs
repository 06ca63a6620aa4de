//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper connection, Axum app)
//!     → request.rs (add request ID)
//!     → proxy::router (cache lookup, probe A, fall back to B)
//!     → response.rs (gateway errors mapped to status codes)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::GatewayError;
pub use server::{GatewayServer, ServerError, ServerHandle};
