//! Per-key subscriber registry for streaming push notifications.
//!
//! # Responsibilities
//! - Hand out one notification channel per subscription key
//! - Deliver published messages without ever blocking the publisher
//! - Remove an entry when the party that registered it goes away
//!
//! # Design Decisions
//! - DashMap shards give each operation a single short lock; no operation
//!   holds a map guard while taking another
//! - Subscriptions are drop guards, so a disconnecting stream cleans up its
//!   own entry and never a newer one registered under the same key
//! - Publishing to a missing, full, or closed channel is a silent no-op

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::observability::metrics;

/// Messages buffered per subscriber before new ones are dropped.
pub const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Debug)]
struct Entry {
    id: u64,
    tx: mpsc::Sender<String>,
}

/// Concurrent map from subscription key to an open notification channel.
#[derive(Debug, Clone, Default)]
pub struct SubscriberRegistry {
    entries: Arc<DashMap<String, Entry>>,
    next_id: Arc<AtomicU64>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel for `key`, replacing any previous one.
    ///
    /// A replaced subscriber sees its stream end.
    pub fn subscribe(&self, key: impl Into<String>) -> Subscription {
        let key = key.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);

        if self.entries.insert(key.clone(), Entry { id, tx }).is_some() {
            tracing::debug!(key = %key, "subscriber replaced");
        }
        metrics::set_subscribers(self.entries.len());
        tracing::debug!(key = %key, subscription = id, "subscriber registered");

        Subscription {
            key,
            id,
            rx,
            registry: self.clone(),
        }
    }

    /// Drop whatever channel is registered for `key`.
    pub fn unsubscribe(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            metrics::set_subscribers(self.entries.len());
            tracing::debug!(key = %key, "subscriber removed");
        }
        removed
    }

    /// Deliver `message` to the subscriber of `key`, if any.
    ///
    /// Returns whether the message was queued. Never blocks.
    pub fn publish(&self, key: &str, message: impl Into<String>) -> bool {
        let (id, result) = match self.entries.get(key) {
            Some(entry) => (entry.id, entry.tx.try_send(message.into())),
            None => return false,
        };

        match result {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(key = %key, "subscriber is not keeping up, message dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.remove_entry(key, id);
                false
            }
        }
    }

    /// Whether a subscriber is registered for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_entry(&self, key: &str, id: u64) {
        if self.entries.remove_if(key, |_, entry| entry.id == id).is_some() {
            metrics::set_subscribers(self.entries.len());
            tracing::debug!(key = %key, subscription = id, "subscriber released");
        }
    }
}

/// A registered subscriber. Unregisters itself on drop.
#[derive(Debug)]
pub struct Subscription {
    key: String,
    id: u64,
    rx: mpsc::Receiver<String>,
    registry: SubscriberRegistry,
}

impl Subscription {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Next published message; `None` once the entry was removed or replaced.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove_entry(&self.key, self.id);
    }
}
