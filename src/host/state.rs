//! Service host state shared by the RPC and HTTP front-ends.

use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use thiserror::Error;

use crate::credentials::TlsIdentity;
use crate::host::registry::{SubscriberRegistry, Subscription};
use crate::store::{Store, StoreConnector, StoreError};

/// Returned when a handler asks for the store before it is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("store is not ready")]
pub struct NotReady;

/// State owned by the host for the lifetime of the process.
///
/// The readiness flag and the subscriber registry are guarded separately and
/// no method takes both.
pub struct ServiceHost {
    facility: String,
    store: Arc<dyn Store>,
    ready: RwLock<bool>,
    subscribers: SubscriberRegistry,
    identity: Arc<TlsIdentity>,
}

impl ServiceHost {
    /// Connect the backing store and mark the host ready.
    pub async fn connect(
        connector: &dyn StoreConnector,
        facility: impl Into<String>,
        identity: Arc<TlsIdentity>,
    ) -> Result<Self, StoreError> {
        let store = connector.connect().await?;
        let host = Self::unready(store, facility.into(), identity);
        host.mark_ready();
        Ok(host)
    }

    fn unready(store: Arc<dyn Store>, facility: String, identity: Arc<TlsIdentity>) -> Self {
        Self {
            facility,
            store,
            ready: RwLock::new(false),
            subscribers: SubscriberRegistry::new(),
            identity,
        }
    }

    fn mark_ready(&self) {
        let mut ready = self.ready.write().unwrap_or_else(|e| e.into_inner());
        *ready = true;
        tracing::info!(backend = self.store.backend(), "store connected, host ready");
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.read().unwrap_or_else(|e| e.into_inner())
    }

    /// The store handle, only once the host is ready.
    pub fn store(&self) -> Result<Arc<dyn Store>, NotReady> {
        if self.is_ready() {
            Ok(Arc::clone(&self.store))
        } else {
            Err(NotReady)
        }
    }

    pub fn facility(&self) -> &str {
        &self.facility
    }

    /// Certificate bytes served to clients that want to pin them.
    pub fn certificate_pem(&self) -> &[u8] {
        self.identity.chain_pem()
    }

    /// Freshness watermark of the certificate.
    pub fn certificate_modified(&self) -> SystemTime {
        self.identity.modified()
    }

    pub fn subscribe(&self, key: impl Into<String>) -> Subscription {
        self.subscribers.subscribe(key)
    }

    pub fn unsubscribe(&self, key: &str) -> bool {
        self.subscribers.unsubscribe(key)
    }

    pub fn publish(&self, key: &str, message: impl Into<String>) -> bool {
        self.subscribers.publish(key, message)
    }
}
