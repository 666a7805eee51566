//! Provisioning host library.
//!
//! Resolves a TLS identity, connects the backing store, and runs the RPC and
//! HTTP front-ends under one supervisor until a termination signal drains
//! them.

pub mod config;
pub mod credentials;
pub mod error;
pub mod host;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rpc;
pub mod store;

pub use config::schema::HostConfig;
pub use error::HostError;
pub use host::ServiceHost;
pub use http::HttpServer;
pub use lifecycle::{Shutdown, Supervisor, SupervisorState};
