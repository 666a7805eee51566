//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGINT, SIGQUIT and SIGTERM
//! - Report which one arrived first
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers are installed when the future is created, not when it is polled
//! - All three signals mean the same thing: drain and exit

use std::fmt;
use std::future::Future;
use std::io;

/// The termination signals the host reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Quit,
    Terminate,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TerminationSignal::Interrupt => "interrupt",
            TerminationSignal::Quit => "quit",
            TerminationSignal::Terminate => "terminated",
        };
        f.write_str(name)
    }
}

/// Install the handlers now and return a future resolving to the first
/// termination signal.
///
/// Signals that arrive before the future is first polled are kept, so
/// installing early covers startup. The future fails only if the handlers
/// could not be installed. Must be called inside the runtime.
#[cfg(unix)]
pub fn terminate() -> impl Future<Output = io::Result<TerminationSignal>> {
    use tokio::signal::unix::{signal, SignalKind};

    let installed = (|| {
        Ok::<_, io::Error>((
            signal(SignalKind::interrupt())?,
            signal(SignalKind::quit())?,
            signal(SignalKind::terminate())?,
        ))
    })();

    async move {
        let (mut interrupt, mut quit, mut terminate) = installed?;
        let received = tokio::select! {
            _ = interrupt.recv() => TerminationSignal::Interrupt,
            _ = quit.recv() => TerminationSignal::Quit,
            _ = terminate.recv() => TerminationSignal::Terminate,
        };
        Ok(received)
    }
}

/// Wait for Ctrl-C.
#[cfg(windows)]
pub fn terminate() -> impl Future<Output = io::Result<TerminationSignal>> {
    let installed = tokio::signal::windows::ctrl_c();
    async move {
        installed?.recv().await;
        Ok(TerminationSignal::Interrupt)
    }
}
