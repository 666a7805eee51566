//! The resolved TLS identity.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::time::SystemTime;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use rustls::InconsistentKeys;

use crate::credentials::error::{Artifact, IngestError};

/// The crypto provider used for every TLS config built by this crate.
///
/// Chosen explicitly so the process never depends on a global default.
pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Certificate chain plus private key, validated against each other.
///
/// Built once at startup and never mutated; share it behind an `Arc`.
pub struct TlsIdentity {
    /// Raw PEM bytes as read from disk (CA bytes first when a CA was given).
    chain_pem: Vec<u8>,
    /// DER chain presented to peers, end-entity first.
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    /// Latest modification time among the files that were read.
    modified: SystemTime,
}

impl TlsIdentity {
    /// Build an identity from a PEM bundle whose first certificate is the
    /// end-entity certificate.
    pub fn from_pem(
        chain_pem: Vec<u8>,
        key_pem: &[u8],
        modified: SystemTime,
    ) -> Result<Self, IngestError> {
        let chain = parse_certificates(&chain_pem, Artifact::Cert)?;
        Self::with_chain(chain_pem, chain, key_pem, modified)
    }

    /// Build an identity whose presented chain was assembled by the caller.
    pub(crate) fn with_chain(
        chain_pem: Vec<u8>,
        chain: Vec<CertificateDer<'static>>,
        key_pem: &[u8],
        modified: SystemTime,
    ) -> Result<Self, IngestError> {
        if chain.is_empty() {
            return Err(IngestError::NoCertificates(Artifact::Cert));
        }
        let key = parse_private_key(key_pem)?;
        check_key_matches(&chain, &key)?;

        Ok(Self {
            chain_pem,
            chain,
            key,
            modified,
        })
    }

    /// Certificate bytes exactly as they will be served to clients.
    pub fn chain_pem(&self) -> &[u8] {
        &self.chain_pem
    }

    /// DER certificates presented during the handshake.
    pub fn certificates(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    pub fn private_key(&self) -> PrivateKeyDer<'static> {
        self.key.clone_key()
    }

    /// Freshness watermark.
    pub fn modified(&self) -> SystemTime {
        self.modified
    }
}

impl fmt::Debug for TlsIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsIdentity")
            .field("certificates", &self.chain.len())
            .field("chain_pem_len", &self.chain_pem.len())
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}

/// Parse every certificate in a PEM buffer.
pub(crate) fn parse_certificates(
    pem: &[u8],
    artifact: Artifact,
) -> Result<Vec<CertificateDer<'static>>, IngestError> {
    let mut reader = Cursor::new(pem);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| IngestError::Pem { artifact, source })?;
    if certs.is_empty() {
        return Err(IngestError::NoCertificates(artifact));
    }
    Ok(certs)
}

fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, IngestError> {
    let mut reader = Cursor::new(pem);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| IngestError::Pem {
            artifact: Artifact::Key,
            source,
        })?
        .ok_or(IngestError::NoPrivateKey)
}

fn check_key_matches(
    chain: &[CertificateDer<'static>],
    key: &PrivateKeyDer<'static>,
) -> Result<(), IngestError> {
    let provider = crypto_provider();
    let signing_key = provider.key_provider.load_private_key(key.clone_key())?;
    let certified = CertifiedKey::new(chain.to_vec(), signing_key);

    match certified.keys_match() {
        // Unknown: the key type cannot expose its public half; the handshake
        // will still fail loudly if the pair is wrong.
        Ok(()) | Err(rustls::Error::InconsistentKeys(InconsistentKeys::Unknown)) => Ok(()),
        Err(rustls::Error::InconsistentKeys(InconsistentKeys::KeyMismatch)) => {
            Err(IngestError::KeyMismatch)
        }
        Err(e) => Err(IngestError::Rustls(e)),
    }
}
