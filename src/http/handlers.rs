//! HTTP handlers: certificate, health, version, metrics.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::SystemTime;

use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub store_ready: bool,
    pub facility: String,
    pub certificate_modified: String,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Version {
    pub version: &'static str,
}

/// Format a timestamp the way `Last-Modified` expects (RFC 7231).
pub fn http_date(time: SystemTime) -> String {
    let time: DateTime<Utc> = time.into();
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// The certificate chain served to clients that pin it.
pub async fn cert(State(state): State<AppState>) -> Response {
    let modified = http_date(state.host.certificate_modified());
    (
        [
            (header::CONTENT_TYPE, "application/x-pem-file".to_string()),
            (header::LAST_MODIFIED, modified),
        ],
        state.host.certificate_pem().to_vec(),
    )
        .into_response()
}

pub async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    let store_ready = match state.host.store() {
        Ok(store) => match store.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "store ping failed");
                false
            }
        },
        Err(_) => false,
    };
    let modified: DateTime<Utc> = state.host.certificate_modified().into();

    let status = if store_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(Health {
            status: if store_ready { "ok" } else { "degraded" },
            store_ready,
            facility: state.host.facility().to_string(),
            certificate_modified: modified.to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

pub async fn version() -> Json<Version> {
    Json(Version {
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
