//! Credential resolution errors.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which credential file an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Ca,
    Cert,
    Key,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Ca => write!(f, "ca cert"),
            Artifact::Cert => write!(f, "tls cert"),
            Artifact::Key => write!(f, "tls key"),
        }
    }
}

/// Problems turning PEM bytes into a usable key-pair.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed PEM in {artifact}: {source}")]
    Pem {
        artifact: Artifact,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {0}")]
    NoCertificates(Artifact),

    #[error("no private key found in tls key")]
    NoPrivateKey,

    #[error("private key does not match the certificate")]
    KeyMismatch,

    #[error(transparent)]
    Rustls(#[from] rustls::Error),
}

/// Errors that can occur while resolving the TLS identity.
///
/// All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// An explicitly configured file could not be read.
    #[error("failed to read {artifact} {path:?}: {source}")]
    Read {
        artifact: Artifact,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The fallback certificate could not be opened or read.
    #[error("failed to open TLS cert {path:?}: {source}")]
    FallbackCert {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The fallback key could not be read.
    #[error("failed to read TLS key {path:?}: {source}")]
    FallbackKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tls-cert is required")]
    CertRequired,

    #[error("tls-key is required")]
    KeyRequired,

    #[error("failed to ingest TLS files: {0}")]
    Ingest(#[from] IngestError),
}

impl CredentialError {
    /// The artifact this error is about, when there is a single one.
    pub fn artifact(&self) -> Option<Artifact> {
        match self {
            CredentialError::Read { artifact, .. } => Some(*artifact),
            CredentialError::FallbackCert { .. } | CredentialError::CertRequired => {
                Some(Artifact::Cert)
            }
            CredentialError::FallbackKey { .. } | CredentialError::KeyRequired => {
                Some(Artifact::Key)
            }
            CredentialError::Ingest(IngestError::Pem { artifact, .. })
            | CredentialError::Ingest(IngestError::NoCertificates(artifact)) => Some(*artifact),
            CredentialError::Ingest(IngestError::NoPrivateKey) => Some(Artifact::Key),
            CredentialError::Ingest(_) => None,
        }
    }
}
