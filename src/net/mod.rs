//! TLS setup shared by both listeners.
//!
//! # Design Decisions
//! - TLS is mandatory; both listeners present one identity
//! - Configs are built with an explicit ring provider, never a process default
//! - Each listener advertises only the ALPN protocols it serves

pub mod tls;
