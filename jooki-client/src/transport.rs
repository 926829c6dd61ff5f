//! The pub/sub transport seam.
//!
//! The session never talks to a broker directly; it drives a [`Transport`],
//! which publishes fire-and-forget commands and feeds every inbound message
//! into a single mailbox. Responses are correlated through state notifications,
//! not request ids, so the transport stays one-way in each direction.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{ClientError, Result};

/// Topic names the device publishes and listens on.
pub mod topics {
    /// Session termination notices.
    pub const QUIT: &str = "/j/all/quit";
    /// Sparse state notifications.
    pub const STATE: &str = "/j/web/output/state";
    /// Device-reported errors.
    pub const ERROR: &str = "/j/web/output/error";
    /// Liveness answers.
    pub const PONG: &str = "/j/debug/output/pong";
    /// Liveness probes from the client.
    pub const PING: &str = "/j/debug/input/ping";

    const COMMAND_PREFIX: &str = "/j/web/input/";

    /// Inbound command topic for a named operation, e.g. `DO_PLAY`.
    pub fn command(name: &str) -> String {
        format!("{COMMAND_PREFIX}{name}")
    }
}

/// Everything the transport can hand to the dispatch task.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A message arrived on a subscribed topic.
    Message { topic: String, payload: Vec<u8> },
    /// The connection dropped and will not recover on its own.
    ConnectionLost { reason: String },
}

/// A connected pub/sub endpoint.
///
/// Implementations must deliver events into the returned mailbox in receipt
/// order; the session relies on that ordering for its state merges.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Open the connection and return the inbound event mailbox.
    async fn connect(&self) -> Result<mpsc::Receiver<TransportEvent>>;

    /// Subscribe to a topic. Resolves once the broker acknowledges.
    async fn subscribe(&self, topic: &str) -> Result<()>;

    /// Publish a payload to a topic. Fire-and-forget at the protocol level;
    /// resolves once the message is handed to the broker.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

/// In-process transport backed by channels.
///
/// The session end behaves like any other transport; the paired
/// [`TransportHandle`] plays the device, injecting messages and inspecting
/// what was published.
pub struct ChannelTransport {
    inner: Arc<ChannelInner>,
}

#[derive(Default)]
struct ChannelInner {
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    subscriptions: Mutex<Vec<String>>,
    published: Mutex<Vec<PublishedMessage>>,
}

/// A message the session published, captured for inspection.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl ChannelTransport {
    /// Create a transport and the handle that plays its remote end.
    pub fn new() -> (Self, TransportHandle) {
        let inner = Arc::new(ChannelInner::default());
        let handle = TransportHandle {
            inner: Arc::clone(&inner),
        };
        (Self { inner }, handle)
    }
}

#[async_trait::async_trait]
impl Transport for ChannelTransport {
    async fn connect(&self) -> Result<mpsc::Receiver<TransportEvent>> {
        let (tx, rx) = mpsc::channel(64);
        *self.inner.events.lock() = Some(tx);
        Ok(rx)
    }

    async fn subscribe(&self, topic: &str) -> Result<()> {
        if self.inner.events.lock().is_none() {
            return Err(ClientError::Connection("not connected".to_string()));
        }
        self.inner.subscriptions.lock().push(topic.to_string());
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        if self.inner.events.lock().is_none() {
            return Err(ClientError::Connection("not connected".to_string()));
        }
        self.inner.published.lock().push(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }
}

/// The device end of a [`ChannelTransport`].
#[derive(Clone)]
pub struct TransportHandle {
    inner: Arc<ChannelInner>,
}

impl TransportHandle {
    /// Inject a message as if the device published it. Returns false once the
    /// session's mailbox is gone.
    pub async fn send_message(&self, topic: &str, payload: &[u8]) -> bool {
        let tx = self.inner.events.lock().clone();
        match tx {
            Some(tx) => tx
                .send(TransportEvent::Message {
                    topic: topic.to_string(),
                    payload: payload.to_vec(),
                })
                .await
                .is_ok(),
            None => false,
        }
    }

    /// Inject a state notification.
    pub async fn send_state(&self, payload: &str) -> bool {
        self.send_message(topics::STATE, payload.as_bytes()).await
    }

    /// Signal an unrecoverable connection loss.
    pub async fn drop_connection(&self, reason: &str) -> bool {
        let tx = self.inner.events.lock().clone();
        match tx {
            Some(tx) => tx
                .send(TransportEvent::ConnectionLost {
                    reason: reason.to_string(),
                })
                .await
                .is_ok(),
            None => false,
        }
    }

    /// Topics the session has subscribed to, in order.
    pub fn subscriptions(&self) -> Vec<String> {
        self.inner.subscriptions.lock().clone()
    }

    /// Everything the session has published, in order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.inner.published.lock().clone()
    }

    /// Payloads published to one topic, in order.
    pub fn published_to(&self, topic: &str) -> Vec<Vec<u8>> {
        self.inner
            .published
            .lock()
            .iter()
            .filter(|message| message.topic == topic)
            .map(|message| message.payload.clone())
            .collect()
    }
}
