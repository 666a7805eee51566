//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → GET /metrics on the HTTP listener (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
