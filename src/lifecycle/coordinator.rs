//! Listener coordination.
//!
//! # Responsibilities
//! - Build the TLS configuration of both listeners from one identity
//! - Run each listener as its own task: bind, serve, report
//! - Turn the shared cancellation into each listener's graceful stop
//! - Report every listener's terminal outcome exactly once
//!
//! # Design Decisions
//! - A bind failure is reported before the accept loop exists
//! - Outcomes travel over one bounded channel sized for both listeners,
//!   so a listener never blocks on reporting
//! - A panicking listener still reports, as [`ServeError::Aborted`]

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use crate::config::{HttpConfig, RpcConfig};
use crate::credentials::TlsIdentity;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::net::tls;
use crate::rpc::RpcServer;

/// Capacity of the outcome channel: one slot per listener.
pub const OUTCOME_CAPACITY: usize = 2;

/// Which listener an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Rpc,
    Http,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerKind::Rpc => f.write_str("rpc"),
            ListenerKind::Http => f.write_str("http"),
        }
    }
}

/// Why a listener did not shut down cleanly.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("failed to configure TLS for the {listener} listener: {source}")]
    Tls {
        listener: ListenerKind,
        #[source]
        source: rustls::Error,
    },

    #[error("{listener} listener failed to bind {address}: {source}")]
    Bind {
        listener: ListenerKind,
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("rpc listener failed: {0}")]
    Rpc(#[source] tonic::transport::Error),

    #[error("http listener failed: {0}")]
    Http(#[source] std::io::Error),

    #[error("{listener} listener task aborted")]
    Aborted { listener: ListenerKind },
}

impl ServeError {
    /// The listener the error came from.
    pub fn listener(&self) -> ListenerKind {
        match self {
            ServeError::Tls { listener, .. }
            | ServeError::Bind { listener, .. }
            | ServeError::Aborted { listener } => *listener,
            ServeError::Rpc(_) => ListenerKind::Rpc,
            ServeError::Http(_) => ListenerKind::Http,
        }
    }
}

/// Terminal report of one listener.
#[derive(Debug)]
pub struct ListenerOutcome {
    pub listener: ListenerKind,
    pub result: Result<(), ServeError>,
}

/// Create the shared outcome channel.
pub fn outcome_channel() -> (mpsc::Sender<ListenerOutcome>, mpsc::Receiver<ListenerOutcome>) {
    mpsc::channel(OUTCOME_CAPACITY)
}

/// The two front-ends and where they should listen.
pub struct Listeners {
    pub rpc: RpcServer,
    pub rpc_config: RpcConfig,
    pub http: HttpServer,
    pub http_config: HttpConfig,
}

/// Addresses the listeners bound, delivered once each has bound.
///
/// A notice fails when its listener could not bind; the reason is on the
/// outcome channel.
#[derive(Debug)]
pub struct BindNotices {
    pub rpc: oneshot::Receiver<SocketAddr>,
    pub http: oneshot::Receiver<SocketAddr>,
}

impl BindNotices {
    /// Wait for both listeners. `None` if either failed to bind.
    pub async fn bound(self) -> Option<(SocketAddr, SocketAddr)> {
        let rpc = self.rpc.await;
        let http = self.http.await;
        match (rpc, http) {
            (Ok(rpc), Ok(http)) => Some((rpc, http)),
            _ => None,
        }
    }
}

/// Launch both listeners, authenticated with `identity`.
///
/// Each listener reports its terminal outcome on `outcomes` exactly once:
/// `Ok(())` after a graceful stop triggered through `shutdown`, an error
/// otherwise. Fails without spawning anything if the TLS configuration
/// cannot be built.
pub fn start(
    shutdown: &Shutdown,
    identity: &TlsIdentity,
    listeners: Listeners,
    outcomes: mpsc::Sender<ListenerOutcome>,
) -> Result<BindNotices, ServeError> {
    let acceptor = tls::rpc_acceptor(identity).map_err(|source| ServeError::Tls {
        listener: ListenerKind::Rpc,
        source,
    })?;
    let http_tls = tls::http_config(identity).map_err(|source| ServeError::Tls {
        listener: ListenerKind::Http,
        source,
    })?;

    let Listeners {
        rpc,
        rpc_config,
        http,
        http_config,
    } = listeners;

    let (rpc_notice, rpc_bound) = oneshot::channel();
    let cancelled = shutdown.subscribe();
    supervise(ListenerKind::Rpc, outcomes.clone(), async move {
        let address = rpc_config.bind_address;
        let bound = TcpListener::bind(&address)
            .await
            .and_then(|listener| Ok((listener.local_addr()?, listener)));
        let (local, listener) = match bound {
            Ok(bound) => bound,
            Err(source) => {
                return Err(ServeError::Bind {
                    listener: ListenerKind::Rpc,
                    address,
                    source,
                })
            }
        };
        tracing::info!(address = %local, listener = %ListenerKind::Rpc, "Listener bound");
        let _ = rpc_notice.send(local);

        rpc.serve(listener, acceptor, cancelled)
            .await
            .map_err(ServeError::Rpc)
    });

    let (http_notice, http_bound) = oneshot::channel();
    let mut cancelled = shutdown.subscribe();
    supervise(ListenerKind::Http, outcomes, async move {
        let address = http_config.bind_address;
        let listener = match TcpListener::bind(&address).await {
            Ok(listener) => listener,
            Err(source) => {
                return Err(ServeError::Bind {
                    listener: ListenerKind::Http,
                    address,
                    source,
                })
            }
        };
        let local = listener.local_addr().map_err(ServeError::Http)?;
        tracing::info!(address = %local, listener = %ListenerKind::Http, "Listener bound");
        let _ = http_notice.send(local);

        let handle = axum_server::Handle::new();
        let stopper = handle.clone();
        tokio::spawn(async move {
            cancelled.recv().await;
            tracing::info!("HTTP graceful stop requested");
            stopper.graceful_shutdown(None);
        });

        http.serve(listener, http_tls, handle)
            .await
            .map_err(ServeError::Http)
    });

    Ok(BindNotices {
        rpc: rpc_bound,
        http: http_bound,
    })
}

/// Run `listener` on its own task and report how it ended.
fn supervise<F>(kind: ListenerKind, outcomes: mpsc::Sender<ListenerOutcome>, listener: F)
where
    F: Future<Output = Result<(), ServeError>> + Send + 'static,
{
    tokio::spawn(async move {
        let result = match tokio::spawn(listener).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(listener = %kind, error = %e, "listener task aborted");
                Err(ServeError::Aborted { listener: kind })
            }
        };
        match &result {
            Ok(()) => tracing::info!(listener = %kind, "listener stopped"),
            Err(e) => tracing::error!(listener = %kind, error = %e, "listener failed"),
        }
        if outcomes
            .send(ListenerOutcome {
                listener: kind,
                result,
            })
            .await
            .is_err()
        {
            tracing::warn!(listener = %kind, "outcome dropped, nobody is waiting");
        }
    });
}
