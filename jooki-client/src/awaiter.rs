//! Single-use accumulators for observing state change.
//!
//! Commands on the wire are fire-and-forget; the only evidence that one took
//! effect is a later state notification. An [`Awaiter`] is registered before
//! a command is published so no notification can slip between publish and
//! listen, then accumulates every update it is fed until the caller has seen
//! what it was waiting for.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use jooki_state::{DeviceState, StateUpdate};

use crate::error::{ClientError, Result};
use crate::registry::AwaiterRegistry;

/// Result of one blocking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// An update arrived and was absorbed.
    Received,
    /// The deadline passed with nothing received.
    TimedOut,
    /// The session closed; nothing further will ever arrive.
    Closed,
}

/// A single-use subscription to state updates.
///
/// Every update read is absorbed into one growing [`StateUpdate`] window, so
/// [`state`](Awaiter::state) always reflects everything observed so far.
/// Closing is idempotent and drains any queued updates into the window first.
pub struct Awaiter {
    id: u64,
    registry: Arc<AwaiterRegistry>,
    rx: mpsc::Receiver<StateUpdate>,
    update: StateUpdate,
    cursor: usize,
    closed: bool,
}

impl Awaiter {
    pub(crate) fn new(
        id: u64,
        registry: Arc<AwaiterRegistry>,
        rx: mpsc::Receiver<StateUpdate>,
        initial: DeviceState,
    ) -> Self {
        Self {
            id,
            registry,
            rx,
            update: StateUpdate::initial(initial),
            cursor: 0,
            closed: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The latest accumulated snapshot.
    pub fn state(&self) -> &DeviceState {
        &self.update.after
    }

    /// The full accumulated window: anchor snapshot, latest snapshot, and
    /// every delta in receipt order.
    pub fn update(&self) -> &StateUpdate {
        &self.update
    }

    /// Block until the next update arrives, the deadline passes, or the
    /// session closes. A received update is absorbed before returning.
    pub async fn read_until(&mut self, deadline: Instant) -> ReadOutcome {
        if self.closed {
            return ReadOutcome::Closed;
        }
        tokio::select! {
            received = self.rx.recv() => match received {
                Some(update) => {
                    self.update.absorb(update);
                    ReadOutcome::Received
                }
                None => {
                    self.closed = true;
                    ReadOutcome::Closed
                }
            },
            _ = tokio::time::sleep_until(deadline) => ReadOutcome::TimedOut,
        }
    }

    /// Block until `predicate` holds, within `timeout`.
    ///
    /// The predicate is tried against each unexamined delta in receipt order
    /// and then against the accumulated snapshot, after every read. A delta
    /// match returns that delta (only the fields from the matching message);
    /// a snapshot match returns the full snapshot. Examined deltas are never
    /// examined again, so a predicate with per-call side effects fires at
    /// most once per delta.
    pub async fn wait_for<F>(&mut self, predicate: F, timeout: Duration) -> Result<DeviceState>
    where
        F: Fn(&DeviceState) -> bool,
    {
        let deadline = Instant::now() + timeout;
        if predicate(&self.update.after) {
            return Ok(self.update.after.clone());
        }
        loop {
            match self.read_until(deadline).await {
                ReadOutcome::Received => {}
                ReadOutcome::TimedOut => {
                    return Err(ClientError::PredicateTimeout {
                        last: Box::new(self.update.after.clone()),
                    });
                }
                ReadOutcome::Closed => {
                    return Err(ClientError::SessionClosed {
                        last: Box::new(self.update.after.clone()),
                    });
                }
            }
            while self.cursor < self.update.deltas.len() {
                if predicate(&self.update.deltas[self.cursor]) {
                    return Ok(self.update.deltas[self.cursor].clone());
                }
                self.cursor += 1;
            }
            if predicate(&self.update.after) {
                return Ok(self.update.after.clone());
            }
        }
    }

    /// Deregister, drain anything still queued into the window, and return
    /// the accumulated window. Idempotent; a second close returns the same
    /// window.
    pub fn close(&mut self) -> StateUpdate {
        if !self.closed {
            self.closed = true;
            self.registry.remove(self.id);
            while let Ok(update) = self.rx.try_recv() {
                self.update.absorb(update);
            }
        }
        self.update.clone()
    }
}

impl Drop for Awaiter {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
