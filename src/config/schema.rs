//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the host.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Default port for the remote-procedure listener.
pub const DEFAULT_RPC_PORT: u16 = 42113;

/// Largest request message the RPC listener decodes, in bytes.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

/// Default port for the HTTP listener.
pub const DEFAULT_HTTP_PORT: u16 = 42114;

/// Root configuration for the service host.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HostConfig {
    /// Where the TLS identity comes from.
    pub credentials: CredentialConfig,

    /// Remote-procedure listener settings.
    pub rpc: RpcConfig,

    /// HTTP listener settings.
    pub http: HttpConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Credential source configuration.
///
/// An empty path means "not configured". When every explicit path yields
/// nothing, the facility directory is used instead.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// File containing the CA certificate (optional).
    pub ca_cert: String,

    /// File containing the TLS certificate.
    pub tls_cert: String,

    /// File containing the TLS private key.
    pub tls_key: String,

    /// Facility identifier selecting the fallback directory.
    pub facility: String,

    /// Override for the fallback certificate directory.
    pub certs_dir: Option<String>,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            ca_cert: String::new(),
            tls_cert: "bundle.pem".to_string(),
            tls_key: "server-key.pem".to_string(),
            facility: String::new(),
            certs_dir: None,
        }
    }
}

/// Remote-procedure listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Bind address (e.g., "0.0.0.0:42113").
    pub bind_address: String,

    /// Requests larger than this are refused with `OUT_OF_RANGE`.
    pub max_message_bytes: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{}", DEFAULT_RPC_PORT),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (e.g., "0.0.0.0:42114").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{}", DEFAULT_HTTP_PORT),
            request_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output for development.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Install the Prometheus recorder and expose `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
        }
    }
}
