//! Session lifecycle and command orchestration.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use jooki_discovery::DeviceDescriptor;
use jooki_state::{DeviceState, StateCache, StateUpdate};

use crate::awaiter::Awaiter;
use crate::dispatcher::Dispatcher;
use crate::error::{ClientError, Result};
use crate::registry::AwaiterRegistry;
use crate::transport::{topics, Transport};

/// Announces the client to the device, in the shape its web app sends.
#[derive(Serialize)]
struct ConnectEnvelope<'a> {
    jooki: ConnectInfo<'a>,
}

#[derive(Serialize)]
struct ConnectInfo<'a> {
    label: String,
    ip: ConnectAddress<'a>,
    live: &'a str,
    version: &'a str,
}

#[derive(Serialize)]
struct ConnectAddress<'a> {
    address: &'a str,
    ping: &'static str,
}

/// Payload for commands that carry no arguments.
#[derive(Serialize)]
pub(crate) struct Empty {}

/// A live session with one device.
///
/// Construction performs the full handshake; afterwards the state snapshot
/// tracks the device continuously and commands can be issued from any task.
/// Dropping the session tears it down.
pub struct Session {
    descriptor: DeviceDescriptor,
    firmware_version: String,
    transport: Arc<dyn Transport>,
    cache: Arc<StateCache>,
    registry: Arc<AwaiterRegistry>,
    http: reqwest::Client,
    last_device_error: Arc<Mutex<Option<String>>>,
    dispatcher: JoinHandle<()>,
}

impl Session {
    /// Connect over `transport` and perform the handshake: subscribe to the
    /// device's output topics, probe liveness, announce ourselves, and
    /// request a full state snapshot.
    pub async fn connect(
        transport: Arc<dyn Transport>,
        descriptor: DeviceDescriptor,
        firmware_version: impl Into<String>,
    ) -> Result<Self> {
        let events = transport.connect().await?;

        let cache = Arc::new(StateCache::new());
        let registry = Arc::new(AwaiterRegistry::new());
        let last_device_error = Arc::new(Mutex::new(None));
        let dispatcher = Dispatcher::spawn(
            Arc::clone(&cache),
            Arc::clone(&registry),
            Arc::clone(&last_device_error),
            events,
        );

        let session = Self {
            descriptor,
            firmware_version: firmware_version.into(),
            transport,
            cache,
            registry,
            http: reqwest::Client::new(),
            last_device_error,
            dispatcher,
        };

        if let Err(err) = session.handshake().await {
            session.disconnect();
            return Err(err);
        }
        tracing::info!(device = %session.descriptor.hostname, "session established");
        Ok(session)
    }

    async fn handshake(&self) -> Result<()> {
        for topic in [topics::QUIT, topics::STATE, topics::ERROR, topics::PONG] {
            self.transport.subscribe(topic).await?;
        }
        self.transport.publish(topics::PING, Vec::new()).await?;

        let hello = ConnectEnvelope {
            jooki: ConnectInfo {
                label: format!("{} *", self.descriptor.hostname),
                ip: ConnectAddress {
                    address: &self.descriptor.hostname,
                    ping: "LIVE",
                },
                live: &self.descriptor.hostname,
                version: &self.firmware_version,
            },
        };
        self.publish("CONNECT", &hello).await?;
        self.publish("GET_STATE", &Empty {}).await?;
        Ok(())
    }

    /// The device this session talks to.
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// Deep copy of the current state snapshot.
    pub fn state(&self) -> DeviceState {
        self.cache.read()
    }

    /// Whether the session has been torn down.
    pub fn is_closed(&self) -> bool {
        self.registry.is_closed()
    }

    /// The most recent error the device reported, if any.
    pub fn last_device_error(&self) -> Option<String> {
        self.last_device_error.lock().clone()
    }

    /// State updates dropped because an awaiter fell behind.
    pub fn dropped_updates(&self) -> u64 {
        self.registry.dropped_updates()
    }

    /// Register an awaiter anchored at the current snapshot. Callers who need
    /// to observe the effect of a command should register before publishing.
    pub fn add_awaiter(&self) -> Result<Awaiter> {
        self.registry.add(self.cache.read())
    }

    /// Collect whatever state change arrives within `timeout`. The returned
    /// window may be empty if the device stayed quiet.
    pub async fn await_update(&self, timeout: Duration) -> Result<StateUpdate> {
        let mut awaiter = self.add_awaiter()?;
        awaiter.read_until(Instant::now() + timeout).await;
        Ok(awaiter.close())
    }

    /// Tear the session down: close every outstanding awaiter and stop the
    /// dispatch task. Idempotent.
    pub fn disconnect(&self) {
        tracing::debug!(device = %self.descriptor.hostname, "disconnecting session");
        self.registry.close_all();
        self.dispatcher.abort();
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) async fn publish<M: Serialize>(&self, command: &str, msg: &M) -> Result<()> {
        let payload = serde_json::to_vec(msg).map_err(ClientError::Encode)?;
        self.transport
            .publish(&topics::command(command), payload)
            .await
    }

    /// Register an awaiter, then publish. The awaiter is registered first so
    /// no state notification can slip between publish and listen.
    pub(crate) async fn publish_with_awaiter<M: Serialize>(
        &self,
        command: &str,
        msg: &M,
    ) -> Result<Awaiter> {
        let mut awaiter = self.add_awaiter()?;
        if let Err(err) = self.publish(command, msg).await {
            awaiter.close();
            return Err(err);
        }
        Ok(awaiter)
    }

    /// Publish a command and block until `predicate` holds or `timeout`
    /// passes. The awaiter is closed on every path.
    pub(crate) async fn publish_and_wait_for<M, F>(
        &self,
        command: &str,
        msg: &M,
        predicate: F,
        timeout: Duration,
    ) -> Result<DeviceState>
    where
        M: Serialize,
        F: Fn(&DeviceState) -> bool,
    {
        let mut awaiter = self.publish_with_awaiter(command, msg).await?;
        let result = awaiter.wait_for(predicate, timeout).await;
        awaiter.close();
        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.registry.close_all();
        self.dispatcher.abort();
    }
}
