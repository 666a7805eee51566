//! TLS configuration for both listeners.

use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::credentials::identity::crypto_provider;
use crate::credentials::TlsIdentity;

/// gRPC runs over HTTP/2 only.
pub const RPC_ALPN: &[u8] = b"h2";

/// Build a server config presenting `identity`, advertising `alpn`.
pub fn server_config(identity: &TlsIdentity, alpn: &[&[u8]]) -> Result<ServerConfig, rustls::Error> {
    let mut config = ServerConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(identity.certificates().to_vec(), identity.private_key())?;
    config.alpn_protocols = alpn.iter().map(|proto| proto.to_vec()).collect();
    Ok(config)
}

/// Acceptor for the gRPC listener.
pub fn rpc_acceptor(identity: &TlsIdentity) -> Result<TlsAcceptor, rustls::Error> {
    let config = server_config(identity, &[RPC_ALPN])?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Config for the HTTP listener (h2 preferred, HTTP/1.1 fallback).
pub fn http_config(identity: &TlsIdentity) -> Result<RustlsConfig, rustls::Error> {
    let config = server_config(identity, &[b"h2", b"http/1.1"])?;
    Ok(RustlsConfig::from_config(Arc::new(config)))
}
