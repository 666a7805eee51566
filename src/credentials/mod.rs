//! Credential resolution subsystem.
//!
//! # Data Flow
//! ```text
//! CredentialConfig (flags / file / env)
//!     → CredentialSources
//!     → resolver.rs
//!         explicit paths: read ca, cert, key (track newest mtime)
//!         nothing read:   <certs dir or /certs/<facility>>/{bundle.pem, server-key.pem}
//!     → identity.rs (parse PEM, verify key matches leaf)
//!     → TlsIdentity (immutable, shared by both listeners)
//! ```
//!
//! # Design Decisions
//! - Every failure is fatal; there is no partial startup
//! - Errors name the failing artifact (ca / cert / key)
//! - No refresh: a new certificate needs a restart

pub mod error;
pub mod identity;
pub mod resolver;

pub use error::{Artifact, CredentialError, IngestError};
pub use identity::TlsIdentity;
pub use resolver::{resolve, CredentialSources};
