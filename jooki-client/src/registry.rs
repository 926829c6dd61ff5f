//! Fan-out of state updates to outstanding awaiters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use jooki_state::{DeviceState, StateUpdate};

use crate::awaiter::Awaiter;
use crate::error::{ClientError, Result};

/// Bound on each awaiter's update queue. A waiter that falls this far behind
/// loses newest-first; the device re-sends full state often enough that a
/// later notification supersedes anything dropped.
pub const AWAITER_QUEUE_CAPACITY: usize = 100;

/// Tracks every outstanding [`Awaiter`] and broadcasts each state update to
/// all of them.
///
/// The registry holds only the sending half of each awaiter's queue; the
/// awaiter itself stays with the caller. Dropping a sender is how the
/// registry closes an awaiter: the blocked reader observes end-of-stream and
/// reports the session as closed rather than timed out.
#[derive(Debug, Default)]
pub struct AwaiterRegistry {
    senders: Mutex<HashMap<u64, mpsc::Sender<StateUpdate>>>,
    closed: AtomicBool,
    dropped_updates: AtomicU64,
}

impl AwaiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new awaiter anchored at `initial` (the current snapshot at
    /// registration, so updates delivered from now on chain onto it).
    ///
    /// Fails with [`ClientError::NotConnected`] once the registry has been
    /// closed.
    pub fn add(self: &Arc<Self>, initial: DeviceState) -> Result<Awaiter> {
        let (tx, rx) = mpsc::channel(AWAITER_QUEUE_CAPACITY);

        let id = {
            let mut senders = self.senders.lock();
            if self.closed.load(Ordering::SeqCst) {
                return Err(ClientError::NotConnected);
            }
            let mut id = rand::random::<u64>();
            while senders.contains_key(&id) {
                id = id.wrapping_add(1);
            }
            senders.insert(id, tx);
            id
        };

        Ok(Awaiter::new(id, Arc::clone(self), rx, initial))
    }

    /// Drop an awaiter's sender. Returns false if it was already gone.
    pub fn remove(&self, id: u64) -> bool {
        self.senders.lock().remove(&id).is_some()
    }

    /// Deliver one update to every registered awaiter without blocking.
    ///
    /// A full queue drops the update for that awaiter only; delivery to the
    /// others is unaffected.
    pub fn broadcast(&self, update: &StateUpdate) {
        let senders = self.senders.lock();
        for (id, tx) in senders.iter() {
            match tx.try_send(update.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.dropped_updates.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(awaiter = *id, "awaiter queue full, dropping update");
                }
                // The awaiter is mid-close; its sender will be removed shortly.
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }

    /// Close every outstanding awaiter and refuse new registrations.
    ///
    /// Idempotent. Safe to call with readers blocked: dropping the senders
    /// wakes them with end-of-stream.
    pub fn close_all(&self) {
        let mut senders = self.senders.lock();
        self.closed.store(true, Ordering::SeqCst);
        let outstanding = senders.len();
        senders.clear();
        if outstanding > 0 {
            tracing::debug!(awaiters = outstanding, "force-closed outstanding awaiters");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Updates dropped to backpressure since the session started.
    pub fn dropped_updates(&self) -> u64 {
        self.dropped_updates.load(Ordering::Relaxed)
    }

    /// Number of outstanding awaiters.
    pub fn len(&self) -> usize {
        self.senders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.lock().is_empty()
    }
}
