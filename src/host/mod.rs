//! Service host: the state every front-end handler depends on.
//!
//! # Data Flow
//! ```text
//! StoreConnector::connect()
//!     → ServiceHost (store handle, readiness flag)
//!     → shared via Arc to the RPC services and the HTTP router
//!
//! Streaming clients:
//!     watch(key)   → registry.rs subscribe → Subscription (drop = unsubscribe)
//!     publish(key) → registry.rs try_send  → subscriber stream
//! ```

pub mod registry;
pub mod state;

pub use registry::{SubscriberRegistry, Subscription};
pub use state::{NotReady, ServiceHost};
