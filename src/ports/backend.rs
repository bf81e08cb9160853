//! BroadcastBackend port - Interface for channel-broadcast delivery.
//!
//! This port defines the contract a caller drives against any backend
//! variant interchangeably. The two delivery models behind it differ in
//! guarantees, not in surface:
//!
//! - **Transient** (Pub/Sub): messages exist only in transit; a message
//!   published while nobody is subscribed is dropped.
//! - **Durable** (streams): messages are appended to a persisted,
//!   ordered per-channel log and replayed from a cursor.
//!
//! Neither model is transactional; delivery is at-most-once or
//! at-least-once depending on consumer behavior, never exactly-once.

use async_trait::async_trait;

use crate::error::BackendError;
use crate::event::Event;

/// Port for broadcasting messages to named channels.
///
/// Methods take `&mut self`: a backend instance serves one caller at a
/// time, and concurrent operations on the same instance are serialized
/// by ownership. Wrap an instance in a lock if it must be shared.
///
/// # Example
///
/// ```ignore
/// let mut backend: Box<dyn BroadcastBackend> = Box::new(RedisPubSubBackend::new(url)?);
/// backend.connect().await?;
/// backend.subscribe("news").await?;
/// backend.publish("news", "hello").await?;
/// let event = backend.next_event().await?;
/// backend.disconnect().await?;
/// ```
#[async_trait]
pub trait BroadcastBackend: Send {
    /// Establish the underlying store connection(s).
    ///
    /// Called once per instance lifetime. Fails with
    /// [`BackendError::Connection`] when the store is unreachable.
    async fn connect(&mut self) -> Result<(), BackendError>;

    /// Release all connections and stop any background consumption.
    ///
    /// Best-effort cleanup: never fails, including after a failed
    /// `connect`. The instance is not reusable afterwards.
    async fn disconnect(&mut self) -> Result<(), BackendError>;

    /// Register interest in a channel.
    ///
    /// Safe to call for a channel that is already subscribed.
    async fn subscribe(&mut self, channel: &str) -> Result<(), BackendError>;

    /// Remove interest in a channel.
    ///
    /// Subsequent `next_event` calls will not surface events for it.
    /// No-op when the channel is not subscribed.
    async fn unsubscribe(&mut self, channel: &str) -> Result<(), BackendError>;

    /// Send a message to a channel.
    ///
    /// Succeeds even when no subscriber is listening: the transient
    /// variant drops the message, the durable variant appends it to the
    /// channel's log.
    async fn publish(&mut self, channel: &str, message: &str) -> Result<(), BackendError>;

    /// Wait until one event is available and return it.
    ///
    /// Never busy-spins. Abandoning the wait leaves backend state
    /// unaffected: an event that was not returned is not lost.
    async fn next_event(&mut self) -> Result<Event, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that the trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &mut dyn BroadcastBackend) {}

    // Compile-time check that implementations can cross task boundaries
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}

    #[test]
    fn broadcast_backend_is_send() {
        fn check<T: BroadcastBackend>() {
            assert_send::<T>();
        }
    }
}
