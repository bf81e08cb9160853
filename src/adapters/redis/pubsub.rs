//! Transient broadcast backend over Redis Pub/Sub.
//!
//! Bridges the push-based Pub/Sub feed into the pull-based
//! [`BroadcastBackend`] contract. The feed is connection-scoped and
//! delivers nothing until at least one channel is subscribed, so the
//! listener task waits on a readiness gate before it starts draining
//! messages.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──connect──▶ WaitingForFirstSubscription ──subscribe──▶ Consuming ──disconnect──▶ Stopped
//! ```
//!
//! The listener task owns the Pub/Sub connection; `subscribe` and
//! `unsubscribe` are routed to it over a command channel and report the
//! store's response back to the caller. Incoming data messages are
//! decoded into [`Event`]s and pushed onto a FIFO queue that
//! `next_event` drains.
//!
//! Messages published while no subscriber is listening are dropped by
//! the store; there is no replay.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::RedisConfig;
use crate::error::BackendError;
use crate::event::Event;
use crate::ports::BroadcastBackend;

/// Subscription change routed to the listener task, with a responder
/// for the store's answer.
enum FeedCommand {
    Subscribe(String, oneshot::Sender<Result<(), BackendError>>),
    Unsubscribe(String, oneshot::Sender<Result<(), BackendError>>),
}

/// Transient (fire-and-forget) broadcast backend over Redis Pub/Sub.
pub struct RedisPubSubBackend {
    client: redis::Client,
    publisher: Option<MultiplexedConnection>,
    commands: Option<mpsc::UnboundedSender<FeedCommand>>,
    events: Option<mpsc::UnboundedReceiver<Event>>,
    ready: watch::Sender<bool>,
    listener: Option<JoinHandle<()>>,
}

impl RedisPubSubBackend {
    /// Create a backend for the given store URL.
    ///
    /// No connection is opened until [`BroadcastBackend::connect`].
    pub fn new(url: &str) -> Result<Self, BackendError> {
        let client = redis::Client::open(url)?;
        let (ready, _) = watch::channel(false);
        Ok(Self {
            client,
            publisher: None,
            commands: None,
            events: None,
            ready,
            listener: None,
        })
    }

    /// Create a backend from a validated configuration.
    pub fn from_config(config: &RedisConfig) -> Result<Self, BackendError> {
        config.validate()?;
        Self::new(&config.url)
    }

    async fn send_command(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<(), BackendError>>) -> FeedCommand,
    ) -> Result<(), BackendError> {
        let commands = self.commands.as_ref().ok_or(BackendError::NotConnected)?;
        let (ack, response) = oneshot::channel();
        commands
            .send(command(ack))
            .map_err(|_| BackendError::FeedClosed)?;
        response.await.map_err(|_| BackendError::FeedClosed)?
    }
}

#[async_trait]
impl BroadcastBackend for RedisPubSubBackend {
    async fn connect(&mut self) -> Result<(), BackendError> {
        let publisher = self.client.get_multiplexed_tokio_connection().await?;
        let feed = self.client.get_async_connection().await?.into_pubsub();

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.listener = Some(tokio::spawn(listen(
            feed,
            command_rx,
            event_tx,
            self.ready.subscribe(),
        )));
        self.publisher = Some(publisher);
        self.commands = Some(command_tx);
        self.events = Some(event_rx);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), BackendError> {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.commands = None;
        self.events = None;
        self.publisher = None;
        Ok(())
    }

    async fn subscribe(&mut self, channel: &str) -> Result<(), BackendError> {
        if self.commands.is_none() {
            return Err(BackendError::NotConnected);
        }
        // Open the gate before the registration reaches the listener.
        // Signaling an already-open gate is a no-op.
        self.ready.send_replace(true);
        let channel = channel.to_string();
        self.send_command(|ack| FeedCommand::Subscribe(channel, ack))
            .await
    }

    async fn unsubscribe(&mut self, channel: &str) -> Result<(), BackendError> {
        if self.commands.is_none() {
            return Err(BackendError::NotConnected);
        }
        // Nothing was ever subscribed, so there is nothing to remove and
        // the listener is still parked at the gate.
        if !*self.ready.borrow() {
            return Ok(());
        }
        let channel = channel.to_string();
        self.send_command(|ack| FeedCommand::Unsubscribe(channel, ack))
            .await
    }

    async fn publish(&mut self, channel: &str, message: &str) -> Result<(), BackendError> {
        let publisher = self.publisher.as_mut().ok_or(BackendError::NotConnected)?;
        publisher.publish::<_, _, ()>(channel, message).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Event, BackendError> {
        let events = self.events.as_mut().ok_or(BackendError::NotConnected)?;
        events.recv().await.ok_or(BackendError::FeedClosed)
    }
}

impl std::fmt::Debug for RedisPubSubBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPubSubBackend")
            .field("connected", &self.commands.is_some())
            .field("consuming", &*self.ready.borrow())
            .finish_non_exhaustive()
    }
}

/// Listener task: owns the Pub/Sub connection, applies subscription
/// changes, and drains the feed into the event queue.
async fn listen(
    mut feed: redis::aio::PubSub,
    mut commands: mpsc::UnboundedReceiver<FeedCommand>,
    events: mpsc::UnboundedSender<Event>,
    mut ready: watch::Receiver<bool>,
) {
    // The feed delivers nothing until a channel is registered; entering
    // the message loop earlier would wait on a connection the server
    // never writes to.
    if ready.wait_for(|ready| *ready).await.is_err() {
        return;
    }

    loop {
        let mut messages = feed.on_message();
        let command = tokio::select! {
            command = commands.recv() => command,
            message = messages.next() => {
                match message {
                    Some(message) => {
                        let channel = message.get_channel_name().to_string();
                        match message.get_payload::<String>() {
                            Ok(payload) => {
                                tracing::debug!(channel = %channel, "Received pub/sub message");
                                if events.send(Event::new(channel, payload)).is_err() {
                                    // Receiver side is gone; stop consuming.
                                    break;
                                }
                            }
                            Err(error) => {
                                tracing::warn!(
                                    channel = %channel,
                                    error = %error,
                                    "Dropping pub/sub message with undecodable payload"
                                );
                            }
                        }
                        continue;
                    }
                    None => {
                        tracing::error!("Pub/sub feed closed, stopping listener");
                        break;
                    }
                }
            }
        };
        drop(messages);

        match command {
            Some(FeedCommand::Subscribe(channel, ack)) => {
                let result = feed.subscribe(&channel).await.map_err(BackendError::from);
                let _ = ack.send(result);
            }
            Some(FeedCommand::Unsubscribe(channel, ack)) => {
                let result = feed.unsubscribe(&channel).await.map_err(BackendError::from);
                let _ = ack.send(result);
            }
            None => break,
        }
    }
    // Dropping the event sender wakes any pending `next_event`, which
    // then reports the feed as closed instead of waiting forever.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_url() {
        let result = RedisPubSubBackend::new("not a url");
        assert!(matches!(result, Err(BackendError::Connection(_))));
    }

    #[test]
    fn from_config_rejects_unsupported_scheme() {
        let config = RedisConfig::new("amqp://localhost:5672");
        let result = RedisPubSubBackend::from_config(&config);
        assert!(matches!(result, Err(BackendError::Config(_))));
    }

    #[tokio::test]
    async fn operations_before_connect_are_rejected() {
        let mut backend = RedisPubSubBackend::new("redis://localhost:6379").unwrap();
        assert!(matches!(
            backend.subscribe("news").await,
            Err(BackendError::NotConnected)
        ));
        assert!(matches!(
            backend.unsubscribe("news").await,
            Err(BackendError::NotConnected)
        ));
        assert!(matches!(
            backend.publish("news", "hello").await,
            Err(BackendError::NotConnected)
        ));
        assert!(matches!(
            backend.next_event().await,
            Err(BackendError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn disconnect_without_connect_is_best_effort() {
        let mut backend = RedisPubSubBackend::new("redis://localhost:6379").unwrap();
        assert!(backend.disconnect().await.is_ok());
        // Torn down instances stay torn down.
        assert!(matches!(
            backend.next_event().await,
            Err(BackendError::NotConnected)
        ));
    }
}
