//! The single-consumer dispatch task.
//!
//! Exactly one task drains the transport mailbox, so state notifications are
//! merged in receipt order and every awaiter sees updates in that same order.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use jooki_state::{StateCache, StateUpdate};

use crate::registry::AwaiterRegistry;
use crate::transport::{topics, TransportEvent};

pub(crate) struct Dispatcher {
    cache: Arc<StateCache>,
    registry: Arc<AwaiterRegistry>,
    last_device_error: Arc<Mutex<Option<String>>>,
}

impl Dispatcher {
    pub(crate) fn spawn(
        cache: Arc<StateCache>,
        registry: Arc<AwaiterRegistry>,
        last_device_error: Arc<Mutex<Option<String>>>,
        events: mpsc::Receiver<TransportEvent>,
    ) -> JoinHandle<()> {
        let dispatcher = Self {
            cache,
            registry,
            last_device_error,
        };
        tokio::spawn(dispatcher.run(events))
    }

    async fn run(self, mut events: mpsc::Receiver<TransportEvent>) {
        loop {
            match events.recv().await {
                Some(TransportEvent::Message { topic, payload }) => {
                    self.on_message(&topic, &payload);
                }
                Some(TransportEvent::ConnectionLost { reason }) => {
                    tracing::error!(%reason, "connection lost");
                    break;
                }
                // Transport gone; nothing further can arrive.
                None => break,
            }
        }
        self.registry.close_all();
    }

    fn on_message(&self, topic: &str, payload: &[u8]) {
        match topic {
            topics::STATE => self.on_state(payload),
            topics::ERROR => {
                let message = String::from_utf8_lossy(payload).into_owned();
                tracing::error!(error = %message, "device reported error");
                *self.last_device_error.lock() = Some(message);
            }
            topics::QUIT => {
                tracing::warn!("device terminated the session");
                self.registry.close_all();
            }
            topics::PONG => tracing::debug!("pong"),
            other => tracing::debug!(topic = other, "message on unhandled topic"),
        }
    }

    fn on_state(&self, payload: &[u8]) {
        match self.cache.merge(payload) {
            Ok((before, after, delta)) => {
                let update = StateUpdate {
                    before,
                    after,
                    deltas: vec![delta],
                };
                self.registry.broadcast(&update);
            }
            // The snapshot is untouched; drop the notification.
            Err(err) => tracing::warn!(%err, "discarding undecodable state notification"),
        }
    }
}
