//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → key.rs (derive RouteKey)
//!     → cache.rs (lookup remembered backend)
//!     → Return: Backend A | Backend B | unknown
//!
//! Route Learning (at runtime):
//!     first request for a key probes A
//!     → fallback engine records A or B
//!     → later requests skip the probe
//! ```
//!
//! # Design Decisions
//! - No routing table: routes are learned from backend A's answers
//! - Query string, headers and body never influence the key
//! - Entries live for the process lifetime; nothing expires them

pub mod backend;
pub mod cache;
pub mod key;

pub use backend::{Backend, BackendTarget, Backends};
pub use cache::RouteCache;
pub use key::RouteKey;
