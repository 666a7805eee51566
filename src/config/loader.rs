//! Configuration loading from disk, environment and flags.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::HostConfig;
use crate::config::validation::{normalize_authority, validate_config, ValidationError};

/// Facility identifier, consulted when none was configured.
pub const ENV_FACILITY: &str = "FACILITY";
/// Fallback certificate directory override.
pub const ENV_CERTS_DIR: &str = "TINKERBELL_CERTS_DIR";
/// Remote-procedure bind address override.
pub const ENV_RPC_AUTHORITY: &str = "TINKERBELL_GRPC_AUTHORITY";
/// HTTP bind address override.
pub const ENV_HTTP_AUTHORITY: &str = "TINKERBELL_HTTP_AUTHORITY";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values given on the command line. `None` leaves the layered value alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub ca_cert: Option<String>,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub facility: Option<String>,
}

/// Parse a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<HostConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

impl HostConfig {
    /// Layer environment variables on top of the current values.
    ///
    /// `lookup` abstracts `std::env::var` so callers and tests decide where
    /// the environment comes from. Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if self.credentials.facility.is_empty() {
            if let Some(facility) = get(ENV_FACILITY) {
                self.credentials.facility = facility;
            }
        }
        if let Some(dir) = get(ENV_CERTS_DIR) {
            self.credentials.certs_dir = Some(dir);
        }
        if let Some(addr) = get(ENV_RPC_AUTHORITY) {
            self.rpc.bind_address = addr;
        }
        if let Some(addr) = get(ENV_HTTP_AUTHORITY) {
            self.http.bind_address = addr;
        }
    }

    /// Layer command-line flags on top of the current values.
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(ca) = overrides.ca_cert {
            self.credentials.ca_cert = ca;
        }
        if let Some(cert) = overrides.tls_cert {
            self.credentials.tls_cert = cert;
        }
        if let Some(key) = overrides.tls_key {
            self.credentials.tls_key = key;
        }
        if let Some(facility) = overrides.facility.filter(|f| !f.is_empty()) {
            self.credentials.facility = facility;
        }
    }

    /// Normalize addresses and run semantic validation.
    pub fn finalize(mut self) -> Result<Self, ConfigError> {
        self.rpc.bind_address = normalize_authority(&self.rpc.bind_address);
        self.http.bind_address = normalize_authority(&self.http.bind_address);
        validate_config(&self).map_err(ConfigError::Validation)?;
        Ok(self)
    }
}
