//! Process supervisor.
//!
//! # States
//! ```text
//! Starting ──▶ Serving ──▶ Draining ──▶ Stopped
//!    │            │            │
//!    └────────────┴────────────┴──────▶ Failed
//! ```
//!
//! # Design Decisions
//! - Starting resolves credentials, connects the store, then starts the
//!   listeners; any failure there is final
//! - Serving waits for whichever comes first: a termination signal or a
//!   listener's terminal report
//! - Draining waits for both listeners to report. There is no deadline: a
//!   listener that never finishes keeps the process alive
//! - A listener failing early still cancels the other one and waits for it

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::{mpsc, watch};
use tonic::service::RoutesBuilder;
use tracing::Instrument;

use crate::config::HostConfig;
use crate::credentials::{self, CredentialSources};
use crate::error::HostError;
use crate::host::ServiceHost;
use crate::http::HttpServer;
use crate::lifecycle::coordinator::{self, ListenerOutcome, Listeners};
use crate::lifecycle::signals::{self, TerminationSignal};
use crate::lifecycle::Shutdown;
use crate::rpc::{HostService, RpcServer, ServiceFactory};
use crate::store::StoreConnector;

/// Where the supervisor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Serving { rpc: SocketAddr, http: SocketAddr },
    Draining,
    Stopped,
    Failed,
}

impl SupervisorState {
    /// `Stopped` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SupervisorState::Stopped | SupervisorState::Failed)
    }
}

/// Owns the host from credential resolution to the last listener report.
pub struct Supervisor {
    config: HostConfig,
    connector: Arc<dyn StoreConnector>,
    services: Vec<ServiceFactory>,
    metrics: Option<PrometheusHandle>,
    state: watch::Sender<SupervisorState>,
}

impl Supervisor {
    pub fn new(config: HostConfig, connector: Arc<dyn StoreConnector>) -> Self {
        let (state, _) = watch::channel(SupervisorState::Starting);
        Self {
            config,
            connector,
            services: Vec::new(),
            metrics: None,
            state,
        }
    }

    /// Register a business service, built once the host is ready.
    pub fn with_service(mut self, factory: ServiceFactory) -> Self {
        self.services.push(factory);
        self
    }

    /// Expose this recorder on the HTTP `/metrics` route.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Follow state changes.
    pub fn state(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    /// Serve until interrupt, quit or terminate.
    ///
    /// The handlers are installed before anything else starts, so a signal
    /// that arrives while the listeners bind still drains them.
    pub async fn run(self) -> Result<(), HostError> {
        self.run_until(signals::terminate()).await
    }

    /// Serve until `stop` resolves, then drain.
    ///
    /// An `Err` from `stop` (signal handlers could not be installed) drains
    /// the same way and is returned once both listeners have reported.
    pub async fn run_until<F>(self, stop: F) -> Result<(), HostError>
    where
        F: Future<Output = std::io::Result<TerminationSignal>>,
    {
        let span = tracing::info_span!("supervisor", facility = %self.config.credentials.facility);
        let result = self.drive(stop).instrument(span).await;

        match &result {
            Ok(()) => {
                tracing::info!("shutdown complete");
                self.transition(SupervisorState::Stopped);
            }
            Err(e) => {
                tracing::error!(error = %e, "host failed");
                self.transition(SupervisorState::Failed);
            }
        }
        result
    }

    async fn drive<F>(&self, stop: F) -> Result<(), HostError>
    where
        F: Future<Output = std::io::Result<TerminationSignal>>,
    {
        tracing::info!(version = env!("CARGO_PKG_VERSION"), "host starting");

        let sources = CredentialSources::from(&self.config.credentials);
        let identity = Arc::new(credentials::resolve(&sources)?);
        let host = Arc::new(
            ServiceHost::connect(
                self.connector.as_ref(),
                self.config.credentials.facility.clone(),
                Arc::clone(&identity),
            )
            .await?,
        );

        let shutdown = Shutdown::new();
        let mut routes = RoutesBuilder::default();
        routes.add_service(
            HostService::new(Arc::clone(&host), shutdown.subscribe())
                .into_server(self.config.rpc.max_message_bytes),
        );
        for factory in &self.services {
            factory(Arc::clone(&host), &mut routes);
        }
        let rpc = RpcServer::new(routes);
        let http = HttpServer::new(Arc::clone(&host), self.metrics.clone(), &self.config.http);

        let (outcomes_tx, mut outcomes) = coordinator::outcome_channel();
        let notices = coordinator::start(
            &shutdown,
            &identity,
            Listeners {
                rpc,
                rpc_config: self.config.rpc.clone(),
                http,
                http_config: self.config.http.clone(),
            },
            outcomes_tx,
        )?;

        let Some((rpc_addr, http_addr)) = notices.bound().await else {
            let first = outcomes.recv().await;
            return Err(fail(&shutdown, &mut outcomes, first).await);
        };
        self.transition(SupervisorState::Serving {
            rpc: rpc_addr,
            http: http_addr,
        });
        tracing::info!(rpc = %rpc_addr, http = %http_addr, "serving");

        let signal_error = tokio::select! {
            signal = stop => match signal {
                Ok(signal) => {
                    tracing::info!(signal = %signal, "received signal, draining");
                    None
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to wait for signals, draining");
                    Some(HostError::Signal(e))
                }
            },
            first = outcomes.recv() => {
                return Err(fail(&shutdown, &mut outcomes, first).await);
            }
        };

        self.transition(SupervisorState::Draining);
        shutdown.trigger();
        drain(&mut outcomes, 2).await?;

        match signal_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn transition(&self, next: SupervisorState) {
        tracing::debug!(state = ?next, "supervisor state");
        self.state.send_replace(next);
    }
}

/// A listener ended while serving. Cancel the other and wait for it, then
/// hand back what went wrong with the first.
async fn fail(
    shutdown: &Shutdown,
    outcomes: &mut mpsc::Receiver<ListenerOutcome>,
    first: Option<ListenerOutcome>,
) -> HostError {
    let (error, remaining) = match first {
        Some(ListenerOutcome {
            result: Err(e), ..
        }) => (HostError::Listener(e), 1),
        Some(ListenerOutcome {
            listener,
            result: Ok(()),
        }) => (HostError::UnexpectedExit { listener }, 1),
        None => (HostError::ListenerLost, 0),
    };
    tracing::error!(error = %error, "listener exited before shutdown, cancelling the other");

    shutdown.trigger();
    if let Err(e) = drain(outcomes, remaining).await {
        tracing::warn!(error = %e, "remaining listener also failed");
    }
    error
}

/// Wait for `expected` terminal reports. Any failure is returned once all of
/// them are in; the first one wins.
async fn drain(outcomes: &mut mpsc::Receiver<ListenerOutcome>, expected: usize) -> Result<(), HostError> {
    let mut first_error = None;
    for _ in 0..expected {
        let Some(ListenerOutcome { listener, result }) = outcomes.recv().await else {
            return Err(first_error.map_or(HostError::ListenerLost, HostError::Listener));
        };
        match result {
            Ok(()) => tracing::info!(listener = %listener, "listener drained"),
            Err(e) => {
                tracing::error!(listener = %listener, error = %e, "listener failed while draining");
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(HostError::Listener(e)),
        None => Ok(()),
    }
}
