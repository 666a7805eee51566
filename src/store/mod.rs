//! Backing data store boundary.
//!
//! The host never looks inside the store; it only needs a connected handle
//! and a way to ask whether that handle is alive. Real database backends live
//! outside this crate and plug in through [`StoreConnector`].

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::{MemoryConnector, MemoryStore};

/// Errors reported by a store or its connector.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to {backend}: {reason}")]
    Connect { backend: String, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A connected store handle, shared by every RPC handler.
///
/// Implementations carry their own internal concurrency control.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Short backend name for logs.
    fn backend(&self) -> &str;

    /// Cheap liveness check.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Produces a connected [`Store`] at startup.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn Store>, StoreError>;
}
