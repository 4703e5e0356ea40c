//! Keyed single-slot mailbox matching replies to outstanding requests.
//!
//! Each [`CorrelationKey`] owns at most one slot. A slot either holds a value
//! that arrived with nobody waiting, or a one-shot sender installed by a
//! caller that is about to send its request:
//!
//! ```text
//! caller                      store                     receive loop
//!   register(key) ────────► Waiting{epoch, tx}
//!   send frame ─────────────────────────────────────────► (wire)
//!                                                    ◄── post(key, reply)
//!   wait(budget) ◄───────── tx.send(reply), slot freed
//! ```
//!
//! Posting is first-write-wins: a duplicate or late reply never overwrites a
//! value already sitting in the slot.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{GatewayError, Result};
use crate::protocol::CommandCode;

/// Namespaced correlation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CorrelationKey {
    /// Reply to a command addressed to a known object.
    ById(String),
    /// Provisioning reply before the object has an id.
    ByMac(u64),
    /// Reply that is not tied to one object.
    ByCommand(CommandCode),
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ById(id) => write!(f, "id:{}", id),
            Self::ByMac(mac) => write!(f, "mac:{:x}", mac),
            Self::ByCommand(code) => write!(f, "cmd:{}", code),
        }
    }
}

enum Slot<V> {
    Ready(V),
    Waiting { epoch: u64, tx: oneshot::Sender<V> },
}

struct Inner<V> {
    slots: Mutex<HashMap<CorrelationKey, Slot<V>>>,
    next_epoch: AtomicU64,
}

/// Shared correlation store. Cloning shares the same slots.
pub struct CorrelationStore<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for CorrelationStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for CorrelationStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> CorrelationStore<V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                next_epoch: AtomicU64::new(1),
            }),
        }
    }

    /// Clear the slot for `key`. Idempotent.
    ///
    /// A caller waiting on this key sees its wait end with `ReplyTimeout`.
    pub fn reset(&self, key: &CorrelationKey) {
        self.inner.slots.lock().remove(key);
    }

    /// Post a value under `key`.
    ///
    /// Delivered straight to a registered waiter if there is one, otherwise
    /// stored. Returns `false` when a value is already stored, in which case
    /// the new one is discarded.
    pub fn post(&self, key: CorrelationKey, value: V) -> bool {
        let mut slots = self.inner.slots.lock();
        match slots.remove(&key) {
            None => {
                slots.insert(key, Slot::Ready(value));
                true
            }
            Some(Slot::Ready(existing)) => {
                slots.insert(key, Slot::Ready(existing));
                false
            }
            Some(Slot::Waiting { tx, .. }) => {
                // Receiver gone between timeout and cleanup; keep the value
                if let Err(value) = tx.send(value) {
                    slots.insert(key, Slot::Ready(value));
                }
                true
            }
        }
    }

    /// Remove and return a stored value without waiting.
    pub fn take(&self, key: &CorrelationKey) -> Option<V> {
        let mut slots = self.inner.slots.lock();
        match slots.remove(key) {
            Some(Slot::Ready(value)) => Some(value),
            Some(waiting) => {
                slots.insert(key.clone(), waiting);
                None
            }
            None => None,
        }
    }

    /// Reset `key` and install a one-shot waiter for its next value.
    ///
    /// Must be called before the request is sent so a fast reply cannot be
    /// missed.
    pub fn register(&self, key: CorrelationKey) -> PendingReply<V> {
        let epoch = self.inner.next_epoch.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inner
            .slots
            .lock()
            .insert(key.clone(), Slot::Waiting { epoch, tx });

        PendingReply {
            store: self.clone(),
            key,
            epoch,
            rx,
        }
    }

    /// Install a waiter for `key`, keeping a value that already arrived.
    ///
    /// Used to keep waiting after a delivered value was not the one
    /// expected; a value posted in between is handed over at once.
    pub fn resume(&self, key: CorrelationKey) -> PendingReply<V> {
        let epoch = self.inner.next_epoch.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let mut slots = self.inner.slots.lock();
        match slots.remove(&key) {
            Some(Slot::Ready(value)) => {
                let _ = tx.send(value);
            }
            _ => {
                slots.insert(key.clone(), Slot::Waiting { epoch, tx });
            }
        }
        drop(slots);

        PendingReply {
            store: self.clone(),
            key,
            epoch,
            rx,
        }
    }

    /// Whether a caller is currently waiting on `key`.
    pub fn has_waiter(&self, key: &CorrelationKey) -> bool {
        matches!(self.inner.slots.lock().get(key), Some(Slot::Waiting { .. }))
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.inner.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.lock().is_empty()
    }

    /// Remove the waiter for `key` if it still belongs to `epoch`.
    fn release(&self, key: &CorrelationKey, epoch: u64) {
        let mut slots = self.inner.slots.lock();
        if let Some(Slot::Waiting { epoch: current, .. }) = slots.get(key) {
            if *current == epoch {
                slots.remove(key);
            }
        }
    }

    /// Bounded-polling wait.
    ///
    /// Resets `key`, then checks the slot every `poll_interval`, giving up
    /// with `ReplyTimeout` after `max_attempts` intervals.
    pub async fn await_reply(
        &self,
        key: CorrelationKey,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> Result<V> {
        self.reset(&key);
        for _ in 0..max_attempts {
            if let Some(value) = self.take(&key) {
                return Ok(value);
            }
            tokio::time::sleep(poll_interval).await;
        }
        self.take(&key).ok_or(GatewayError::ReplyTimeout)
    }
}

/// Handle for one registered wait.
///
/// Dropping it without waiting frees the slot.
pub struct PendingReply<V> {
    store: CorrelationStore<V>,
    key: CorrelationKey,
    epoch: u64,
    rx: oneshot::Receiver<V>,
}

impl<V> PendingReply<V> {
    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    /// Wait up to `budget` for the value.
    pub async fn wait(mut self, budget: Duration) -> Result<V> {
        match tokio::time::timeout(budget, &mut self.rx).await {
            Ok(Ok(value)) => Ok(value),
            // Sender dropped: the key was reset or re-registered
            Ok(Err(_)) => Err(GatewayError::ReplyTimeout),
            Err(_) => {
                tracing::debug!("No reply under {} within {:?}", self.key, budget);
                Err(GatewayError::ReplyTimeout)
            }
        }
    }
}

impl<V> Drop for PendingReply<V> {
    fn drop(&mut self) {
        self.store.release(&self.key, self.epoch);
    }
}
