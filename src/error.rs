//! Top-level error type of the host.

use thiserror::Error;

use crate::config::ConfigError;
use crate::credentials::CredentialError;
use crate::lifecycle::coordinator::{ListenerKind, ServeError};
use crate::store::StoreError;

/// Everything that can end the process with a non-zero status.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error("failed to connect to the backing store: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Listener(#[from] ServeError),

    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),

    #[error("{listener} listener stopped before shutdown was requested")]
    UnexpectedExit { listener: ListenerKind },

    #[error("a listener exited without reporting")]
    ListenerLost,
}
