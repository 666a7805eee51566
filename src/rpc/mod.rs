//! Remote-procedure front-end: gRPC over TLS.
//!
//! # Data Flow
//! ```text
//! TCP accept (server.rs)
//!     → TLS handshake (net::tls acceptor, off the accept loop)
//!     → tonic router (every registered service)
//!     → service.rs (built-in Host service) or a business service
//! ```
//!
//! # Design Decisions
//! - Business services join the same router through a [`ServiceFactory`]
//! - A failed call yields a `Status` for that caller only
//! - Watch streams end when the host drains, so the graceful stop can finish

pub mod server;
pub mod service;

/// Messages and stubs generated from `proto/host.proto`.
pub mod pb {
    tonic::include_proto!("provision.host.v1");
}

pub use server::RpcServer;
pub use service::{HostService, ServiceFactory};
