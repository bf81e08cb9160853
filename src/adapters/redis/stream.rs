//! Durable broadcast backend over Redis Streams.
//!
//! Every channel is an append-only stream. The backend tracks one read
//! cursor per subscribed channel and polls `XREAD` across all of them
//! from inside `next_event`; there is no background task. A cursor is
//! the id of the last entry delivered for that channel, or `"0"` to
//! replay the stream from the beginning.
//!
//! Per-channel delivery follows append order and each entry is
//! delivered at most once per backend instance. Ordering across
//! channels is unspecified.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamInfoStreamReply, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tokio::sync::watch;

use crate::config::RedisConfig;
use crate::error::BackendError;
use crate::event::Event;
use crate::ports::BroadcastBackend;

/// Cursor that replays a stream from its first entry.
const BEGINNING: &str = "0";

/// Entry field that carries the payload.
const MESSAGE_FIELD: &str = "message";

/// Durable, replayable broadcast backend over Redis Streams.
pub struct RedisStreamBackend {
    client: redis::Client,
    producer: Option<MultiplexedConnection>,
    consumer: Option<MultiplexedConnection>,
    cursors: HashMap<String, String>,
    ready: watch::Sender<bool>,
    block: Duration,
}

impl RedisStreamBackend {
    /// Create a backend for the given store URL.
    ///
    /// Accepts the `redis-stream://` scheme used to select this variant
    /// and rewrites it to plain `redis://` for the driver. No connection
    /// is opened until [`BroadcastBackend::connect`].
    pub fn new(url: &str) -> Result<Self, BackendError> {
        let client = redis::Client::open(rewrite_stream_scheme(url))?;
        let (ready, _) = watch::channel(false);
        Ok(Self {
            client,
            producer: None,
            consumer: None,
            cursors: HashMap::new(),
            ready,
            block: Duration::from_millis(1000),
        })
    }

    /// Create a backend from a validated configuration.
    pub fn from_config(config: &RedisConfig) -> Result<Self, BackendError> {
        config.validate()?;
        let mut backend = Self::new(&config.url)?;
        backend.block = config.stream_block();
        Ok(backend)
    }

    /// The recorded cursor for a channel, if subscribed.
    pub fn cursor(&self, channel: &str) -> Option<&str> {
        self.cursors.get(channel).map(String::as_str)
    }
}

#[async_trait]
impl BroadcastBackend for RedisStreamBackend {
    async fn connect(&mut self) -> Result<(), BackendError> {
        let producer = self.client.get_multiplexed_tokio_connection().await?;
        let consumer = self.client.get_multiplexed_tokio_connection().await?;
        self.producer = Some(producer);
        self.consumer = Some(consumer);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), BackendError> {
        self.producer = None;
        self.consumer = None;
        self.cursors.clear();
        Ok(())
    }

    async fn subscribe(&mut self, channel: &str) -> Result<(), BackendError> {
        let consumer = self.consumer.as_mut().ok_or(BackendError::NotConnected)?;
        let cursor = match consumer
            .xinfo_stream::<_, StreamInfoStreamReply>(channel)
            .await
        {
            Ok(info) => info.last_generated_id,
            // The stream does not exist until something is appended;
            // start from the beginning instead of failing.
            Err(error) if is_missing_stream(&error) => BEGINNING.to_string(),
            Err(error) => return Err(error.into()),
        };
        tracing::debug!(channel = %channel, cursor = %cursor, "Subscribed to stream");
        self.cursors.insert(channel.to_string(), cursor);
        self.ready.send_replace(true);
        Ok(())
    }

    async fn unsubscribe(&mut self, channel: &str) -> Result<(), BackendError> {
        self.cursors.remove(channel);
        Ok(())
    }

    async fn publish(&mut self, channel: &str, message: &str) -> Result<(), BackendError> {
        let producer = self.producer.as_mut().ok_or(BackendError::NotConnected)?;
        producer
            .xadd::<_, _, _, _, ()>(channel, "*", &[(MESSAGE_FIELD, message)])
            .await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Event, BackendError> {
        if self.consumer.is_none() {
            return Err(BackendError::NotConnected);
        }
        // Blocks until the first subscription of the instance's
        // lifetime; the gate never closes again after that.
        let mut ready = self.ready.subscribe();
        ready
            .wait_for(|ready| *ready)
            .await
            .map_err(|_| BackendError::NotConnected)?;

        loop {
            if self.cursors.is_empty() {
                // Every channel was unsubscribed; nothing to poll until
                // the caller subscribes again.
                tokio::time::sleep(self.block).await;
                continue;
            }

            let (keys, ids) = poll_targets(&self.cursors);
            let options = StreamReadOptions::default()
                .count(1)
                .block(self.block.as_millis() as usize);
            let consumer = self.consumer.as_mut().ok_or(BackendError::NotConnected)?;
            let reply: StreamReadReply = consumer.xread_options(&keys, &ids, &options).await?;

            let Some((channel, entry)) = first_entry(reply) else {
                continue;
            };
            // Advance before returning so a retried call can never see
            // this entry again.
            self.cursors.insert(channel.clone(), entry.id.clone());
            match entry.get::<String>(MESSAGE_FIELD) {
                Some(message) => return Ok(Event::new(channel, message)),
                None => {
                    tracing::warn!(
                        channel = %channel,
                        id = %entry.id,
                        "Skipping stream entry without a message field"
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for RedisStreamBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamBackend")
            .field("connected", &self.consumer.is_some())
            .field("cursors", &self.cursors)
            .field("block", &self.block)
            .finish_non_exhaustive()
    }
}

/// Rewrite the backend-selecting `redis-stream` scheme to the scheme the
/// driver understands. Other URLs pass through unchanged.
fn rewrite_stream_scheme(url: &str) -> String {
    match url.strip_prefix("redis-stream") {
        Some(rest) => format!("redis{rest}"),
        None => url.to_string(),
    }
}

/// Pairwise-aligned stream names and cursor positions for `XREAD`.
fn poll_targets(cursors: &HashMap<String, String>) -> (Vec<String>, Vec<String>) {
    cursors
        .iter()
        .map(|(channel, cursor)| (channel.clone(), cursor.clone()))
        .unzip()
}

/// The single entry requested from the store, with its stream name.
fn first_entry(reply: StreamReadReply) -> Option<(String, StreamId)> {
    let key = reply.keys.into_iter().next()?;
    let entry = key.ids.into_iter().next()?;
    Some((key.key, entry))
}

fn is_missing_stream(error: &redis::RedisError) -> bool {
    error.kind() == redis::ErrorKind::ResponseError
}
