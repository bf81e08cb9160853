//! Fanout - Pluggable channel-broadcast backends.
//!
//! One contract, two delivery models: a transient publish/subscribe
//! backend over Redis Pub/Sub (fire-and-forget, no replay) and a durable
//! backend over Redis Streams (ordered, replayable from a cursor).
//! Callers drive either variant through the [`BroadcastBackend`] port.

pub mod adapters;
pub mod config;
pub mod error;
pub mod event;
pub mod ports;

pub use adapters::{RedisPubSubBackend, RedisStreamBackend};
pub use config::RedisConfig;
pub use error::BackendError;
pub use event::Event;
pub use ports::BroadcastBackend;
