//! Redis-backed broadcast backends.
//!
//! Two adapters over the same store, with different delivery guarantees:
//!
//! - [`RedisPubSubBackend`] - transient delivery over Redis Pub/Sub
//! - [`RedisStreamBackend`] - durable, replayable delivery over Redis
//!   Streams

mod pubsub;
mod stream;

pub use pubsub::RedisPubSubBackend;
pub use stream::RedisStreamBackend;
