//! HTTP front-end.
//!
//! # Data Flow
//! ```text
//! TLS connection (axum-server + rustls)
//!     → server.rs (router, middleware)
//!     → request.rs (request ID)
//!     → handlers.rs (/cert, /healthz, /version, /metrics)
//! ```

pub mod handlers;
pub mod request;
pub mod server;

pub use request::RequestIdMaker;
pub use server::{AppState, HttpServer};
