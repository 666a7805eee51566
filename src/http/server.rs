//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout)
//! - Serve over TLS on a pre-bound listener
//! - Stop gracefully through an `axum_server::Handle`

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::HttpConfig;
use crate::host::ServiceHost;
use crate::http::handlers;
use crate::http::request::RequestIdMaker;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub host: Arc<ServiceHost>,
    pub metrics: Option<PrometheusHandle>,
}

/// HTTP front-end of the host.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(host: Arc<ServiceHost>, metrics: Option<PrometheusHandle>, config: &HttpConfig) -> Self {
        let state = AppState { host, metrics };
        let router = Self::build_router(config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &HttpConfig, state: AppState) -> Router {
        Router::new()
            .route("/cert", get(handlers::cert))
            .route("/healthz", get(handlers::healthz))
            .route("/version", get(handlers::version))
            .route("/metrics", get(handlers::metrics))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(RequestIdMaker))
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.request_timeout_secs,
                    )))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Serve TLS on `listener` until `handle` shuts the server down.
    ///
    /// In-flight requests finish; there is no deadline.
    pub async fn serve(
        self,
        listener: TcpListener,
        tls: RustlsConfig,
        handle: Handle,
    ) -> Result<(), std::io::Error> {
        let address = listener.local_addr()?;
        tracing::info!(address = %address, "HTTP server starting");

        let listener = listener.into_std()?;
        axum_server::from_tcp_rustls(listener, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
