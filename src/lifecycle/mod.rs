//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor (supervisor.rs):
//!     Resolve credentials → Connect store → Start listeners → Serve
//!
//! Coordinator (coordinator.rs):
//!     Bind → Serve → Report outcome (once per listener)
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Every listener stops accepting → Drain → Report
//!
//! Signals (signals.rs):
//!     SIGINT/SIGQUIT/SIGTERM → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: credentials first, then the store, then listeners
//! - Cancellation is broadcast and issued at most once
//! - Drain has no deadline

pub mod coordinator;
pub mod shutdown;
pub mod signals;
pub mod supervisor;

pub use coordinator::{ListenerKind, ListenerOutcome, ServeError};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::TerminationSignal;
pub use supervisor::{Supervisor, SupervisorState};
