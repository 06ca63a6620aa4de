//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → GatewayServer::bind → run
//!
//! Shutdown (shutdown.rs, state.rs):
//!     ServerHandle::shutdown → Stop accepting → Drain connections → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → ServerHandle::shutdown
//! ```
//!
//! # Design Decisions
//! - Explicit NotStarted → Running → Stopped flag instead of locking around the server
//! - Shutdown has a grace deadline: connections still busy after it are abandoned

pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use state::{Lifecycle, ServerState};
