//! Adapters - Backend implementations of the port interfaces.
//!
//! - `redis` - Transient (Pub/Sub) and durable (stream) backends over a
//!   Redis-compatible store

pub mod redis;

pub use redis::{RedisPubSubBackend, RedisStreamBackend};
