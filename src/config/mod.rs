//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → environment (FACILITY, TINKERBELL_*)
//!     → command-line flags
//!     → validation.rs (semantic checks)
//!     → HostConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; certificate changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Environment is read once, at the edge, through an injectable lookup

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigError, Overrides};
pub use schema::{
    CredentialConfig, HostConfig, HttpConfig, LogFormat, ObservabilityConfig, RpcConfig,
};
