//! Ports - Interfaces implemented by broadcast backends.
//!
//! Following hexagonal architecture, ports define the contract between
//! callers and the delivery infrastructure. Adapters implement these
//! ports.
//!
//! - `BroadcastBackend` - The capability set every backend variant
//!   implements, regardless of delivery model.

mod backend;

pub use backend::BroadcastBackend;
