//! provision-host
//!
//! Serves the provisioning RPC and HTTP front-ends over TLS.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                  PROVISION HOST                  │
//!                      │                                                  │
//!   flags / env / toml │  ┌────────┐    ┌─────────────┐    ┌───────────┐  │
//!   ───────────────────┼─▶│ config │───▶│ credentials │───▶│   host    │  │
//!                      │  └────────┘    │  resolver   │    │ (store +  │  │
//!                      │                └─────────────┘    │ registry) │  │
//!                      │                                   └─────┬─────┘  │
//!                      │                                         │        │
//!                      │         ┌───────────────────────────────┤        │
//!                      │         ▼                               ▼        │
//!   RPC clients        │  ┌─────────────┐                 ┌─────────────┐ │
//!   ◀──────────────────┼─▶│ rpc (TLS)   │                 │ http (TLS)  │◀┼──── HTTP clients
//!                      │  └──────┬──────┘                 └──────┬──────┘ │
//!                      │         └──────────┬────────────────────┘        │
//!                      │                    ▼                             │
//!                      │          ┌───────────────────┐                   │
//!                      │          │ lifecycle         │◀── SIGINT/QUIT/TERM
//!                      │          │ supervisor        │                   │
//!                      │          └───────────────────┘                   │
//!                      └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use provision_host::config::{loader, ConfigError, HostConfig, Overrides};
use provision_host::lifecycle::Supervisor;
use provision_host::observability::{logging, metrics};
use provision_host::store::MemoryConnector;

#[derive(Parser)]
#[command(name = "provision-host")]
#[command(about = "TLS host for the provisioning RPC and HTTP services", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// CA certificate, prepended to the served chain
    #[arg(long)]
    ca_cert: Option<String>,

    /// TLS certificate (empty string: use the facility directory)
    #[arg(long)]
    tls_cert: Option<String>,

    /// TLS private key (empty string: use the facility directory)
    #[arg(long)]
    tls_key: Option<String>,

    /// Facility selecting the fallback certificate directory
    #[arg(long)]
    facility: Option<String>,
}

impl Cli {
    fn load(self) -> Result<HostConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => loader::read_config(path)?,
            None => HostConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.apply_overrides(Overrides {
            ca_cert: self.ca_cert,
            tls_cert: self.tls_cert,
            tls_key: self.tls_key,
            facility: self.facility,
        });
        config.finalize()
    }
}

#[tokio::main]
async fn main() {
    let config = match Cli::parse().load() {
        Ok(config) => config,
        Err(e) => {
            // Logging is configured by the file that just failed to load.
            eprintln!("provision-host: {e}");
            std::process::exit(1);
        }
    };

    logging::init(&config.observability);
    tracing::info!(
        rpc_address = %config.rpc.bind_address,
        http_address = %config.http.bind_address,
        facility = %config.credentials.facility,
        "Configuration loaded"
    );

    let mut supervisor = Supervisor::new(config.clone(), Arc::new(MemoryConnector::new()));
    if config.observability.metrics_enabled {
        match metrics::install_recorder() {
            Ok(handle) => supervisor = supervisor.with_metrics(handle),
            Err(e) => tracing::error!(error = %e, "Failed to install metrics recorder"),
        }
    }

    if let Err(e) = supervisor.run().await {
        tracing::error!(error = %e, "provision-host exiting");
        std::process::exit(1);
    }
}
