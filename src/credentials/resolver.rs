//! Certificate/key resolution with explicit-path and facility fallback.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::CredentialConfig;
use crate::credentials::error::{Artifact, CredentialError};
use crate::credentials::identity::{parse_certificates, TlsIdentity};

/// Certificate bundle name inside the fallback directory.
pub const FALLBACK_CERT_FILE: &str = "bundle.pem";
/// Private key name inside the fallback directory.
pub const FALLBACK_KEY_FILE: &str = "server-key.pem";
/// Parent of the per-facility fallback directories.
pub const FALLBACK_ROOT: &str = "/certs/";

/// Where credentials may come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSources {
    pub ca_cert: Option<PathBuf>,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub facility: String,
    /// Replaces `/certs/<facility>` when set.
    pub certs_dir: Option<PathBuf>,
}

fn non_empty(path: &str) -> Option<PathBuf> {
    (!path.is_empty()).then(|| PathBuf::from(path))
}

impl From<&CredentialConfig> for CredentialSources {
    fn from(config: &CredentialConfig) -> Self {
        Self {
            ca_cert: non_empty(&config.ca_cert),
            tls_cert: non_empty(&config.tls_cert),
            tls_key: non_empty(&config.tls_key),
            facility: config.facility.clone(),
            certs_dir: config.certs_dir.as_deref().and_then(non_empty),
        }
    }
}

impl CredentialSources {
    /// The fallback directory, always ending with a separator.
    pub fn fallback_dir(&self) -> String {
        let mut dir = match &self.certs_dir {
            Some(dir) => dir.display().to_string(),
            None => format!("{}{}", FALLBACK_ROOT, self.facility),
        };
        if !dir.ends_with('/') {
            dir.push('/');
        }
        dir
    }
}

/// Resolve the TLS identity from the configured sources.
///
/// Explicit paths are read first. If every read produced no bytes, the
/// facility directory is used exclusively. Otherwise both the certificate
/// and the key must be present; a CA, when given, is prepended to the
/// certificate bytes.
pub fn resolve(sources: &CredentialSources) -> Result<TlsIdentity, CredentialError> {
    let mut freshness = UNIX_EPOCH;

    let ca = read_optional(Artifact::Ca, sources.ca_cert.as_deref(), &mut freshness)?;
    let cert = read_optional(Artifact::Cert, sources.tls_cert.as_deref(), &mut freshness)?;
    let key = read_optional(Artifact::Key, sources.tls_key.as_deref(), &mut freshness)?;

    if ca.is_empty() && cert.is_empty() && key.is_empty() {
        return resolve_fallback(sources);
    }

    if cert.is_empty() {
        return Err(CredentialError::CertRequired);
    }
    if key.is_empty() {
        return Err(CredentialError::KeyRequired);
    }

    // Peers expect the end-entity certificate first, so the presented chain
    // is cert then CA even though the served bytes are CA then cert.
    let mut chain = parse_certificates(&cert, Artifact::Cert)?;
    if !ca.is_empty() {
        chain.extend(parse_certificates(&ca, Artifact::Ca)?);
    }

    let mut chain_pem = ca;
    chain_pem.extend_from_slice(&cert);

    let identity = TlsIdentity::with_chain(chain_pem, chain, &key, freshness)?;
    tracing::info!(
        source = "explicit",
        certificates = identity.certificates().len(),
        modified = ?identity.modified(),
        "TLS identity resolved"
    );
    Ok(identity)
}

fn resolve_fallback(sources: &CredentialSources) -> Result<TlsIdentity, CredentialError> {
    let dir = sources.fallback_dir();
    let cert_path = PathBuf::from(format!("{}{}", dir, FALLBACK_CERT_FILE));
    let key_path = PathBuf::from(format!("{}{}", dir, FALLBACK_KEY_FILE));

    tracing::debug!(directory = %dir, "no explicit credentials, using fallback directory");

    // Only the certificate's timestamp feeds the watermark here.
    let (cert, modified) =
        read_with_mtime(&cert_path).map_err(|source| CredentialError::FallbackCert {
            path: cert_path.clone(),
            source,
        })?;
    let key = std::fs::read(&key_path).map_err(|source| CredentialError::FallbackKey {
        path: key_path.clone(),
        source,
    })?;

    let identity = TlsIdentity::from_pem(cert, &key, modified)?;
    tracing::info!(
        source = "fallback",
        directory = %dir,
        certificates = identity.certificates().len(),
        modified = ?identity.modified(),
        "TLS identity resolved"
    );
    Ok(identity)
}

fn read_optional(
    artifact: Artifact,
    path: Option<&Path>,
    freshness: &mut SystemTime,
) -> Result<Vec<u8>, CredentialError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };

    let (contents, modified) =
        read_with_mtime(path).map_err(|source| CredentialError::Read {
            artifact,
            path: path.to_path_buf(),
            source,
        })?;
    if modified > *freshness {
        *freshness = modified;
    }

    tracing::debug!(%artifact, path = %path.display(), bytes = contents.len(), "read credential file");
    Ok(contents)
}

fn read_with_mtime(path: &Path) -> std::io::Result<(Vec<u8>, SystemTime)> {
    let mut file = File::open(path)?;
    let modified = file.metadata()?.modified()?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    Ok((contents, modified))
}
