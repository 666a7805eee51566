//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};

use provision_host::config::HostConfig;
use provision_host::credentials::identity::crypto_provider;
use provision_host::lifecycle::{Supervisor, TerminationSignal};
use provision_host::rpc::pb::host_client::HostClient;
use provision_host::store::MemoryConnector;
use provision_host::{HostError, SupervisorState};

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(10);

/// A CA and a `localhost` leaf signed by it, as PEM.
pub struct Pki {
    pub ca_pem: String,
    pub ca_der: CertificateDer<'static>,
    pub cert_pem: String,
    pub key_pem: String,
}

impl Pki {
    pub fn new() -> Self {
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "provision test ca");
        let ca_key = KeyPair::generate().unwrap();
        let ca = ca_params.self_signed(&ca_key).unwrap();

        let leaf_params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        let leaf_key = KeyPair::generate().unwrap();
        let leaf = leaf_params.signed_by(&leaf_key, &ca, &ca_key).unwrap();

        Self {
            ca_pem: ca.pem(),
            ca_der: ca.der().clone(),
            cert_pem: leaf.pem(),
            key_pem: leaf_key.serialize_pem(),
        }
    }
}

/// A self-signed `localhost` certificate and its key, as PEM, plus the DER
/// a client can trust.
pub fn self_signed() -> (String, String, CertificateDer<'static>) {
    let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    (
        generated.cert.pem(),
        generated.key_pair.serialize_pem(),
        generated.cert.der().clone(),
    )
}

pub fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Host config with explicit credentials and ephemeral loopback ports.
pub fn host_config(cert: &Path, key: &Path) -> HostConfig {
    let mut config = HostConfig::default();
    config.credentials.tls_cert = cert.display().to_string();
    config.credentials.tls_key = key.display().to_string();
    config.credentials.facility = "test".into();
    config.rpc.bind_address = "127.0.0.1:0".into();
    config.http.bind_address = "127.0.0.1:0".into();
    config
}

/// Client config trusting only `root`.
pub fn client_config(root: &CertificateDer<'static>, alpn: &[&[u8]]) -> Arc<ClientConfig> {
    let mut roots = RootCertStore::empty();
    roots.add(root.clone()).unwrap();
    let mut config = ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = alpn.iter().map(|proto| proto.to_vec()).collect();
    Arc::new(config)
}

/// Complete a TLS handshake against `addr` as `localhost`.
pub async fn tls_connect(
    addr: SocketAddr,
    root: &CertificateDer<'static>,
    alpn: &[&[u8]],
) -> std::io::Result<TlsStream<TcpStream>> {
    let connector = TlsConnector::from(client_config(root, alpn));
    let stream = TcpStream::connect(addr).await?;
    let name = ServerName::try_from("localhost").unwrap();
    connector.connect(name, stream).await
}

/// Wait until the supervisor serves, returning (rpc, http) addresses.
pub async fn serving(state: &mut watch::Receiver<SupervisorState>) -> (SocketAddr, SocketAddr) {
    let state = tokio::time::timeout(
        WAIT,
        state.wait_for(|s| matches!(s, SupervisorState::Serving { .. }) || s.is_terminal()),
    )
    .await
    .expect("supervisor never served")
    .unwrap();
    match *state {
        SupervisorState::Serving { rpc, http } => (rpc, http),
        other => panic!("supervisor ended in {other:?}"),
    }
}

/// gRPC channel to `addr`, trusting `root_pem` and verifying `localhost`.
pub async fn rpc_channel(addr: SocketAddr, root_pem: &str) -> Channel {
    // Client-side TLS may consult the process default provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let tls = ClientTlsConfig::new()
        .ca_certificate(Certificate::from_pem(root_pem))
        .domain_name("localhost");
    Endpoint::from_shared(format!("https://{addr}"))
        .unwrap()
        .tls_config(tls)
        .unwrap()
        .connect_timeout(WAIT)
        .timeout(WAIT)
        .connect()
        .await
        .unwrap()
}

/// A supervisor serving on ephemeral ports with a self-signed identity.
pub struct RunningHost {
    pub rpc: SocketAddr,
    pub http: SocketAddr,
    pub root: CertificateDer<'static>,
    pub root_pem: String,
    pub state: watch::Receiver<SupervisorState>,
    stop: oneshot::Sender<()>,
    run: JoinHandle<Result<(), HostError>>,
    _dir: tempfile::TempDir,
}

impl RunningHost {
    pub async fn start() -> Self {
        Self::start_with(|supervisor| supervisor).await
    }

    /// Start with extra services or a metrics handle.
    pub async fn start_with<F>(customize: F) -> Self
    where
        F: FnOnce(Supervisor) -> Supervisor,
    {
        Self::start_with_connector(Arc::new(MemoryConnector::new()), customize).await
    }

    pub async fn start_with_connector<F>(connector: Arc<MemoryConnector>, customize: F) -> Self
    where
        F: FnOnce(Supervisor) -> Supervisor,
    {
        Self::launch(connector, |_| {}, customize).await
    }

    /// Start with adjusted configuration.
    pub async fn start_configured<C>(configure: C) -> Self
    where
        C: FnOnce(&mut HostConfig),
    {
        Self::launch(Arc::new(MemoryConnector::new()), configure, |s| s).await
    }

    async fn launch<C, F>(connector: Arc<MemoryConnector>, configure: C, customize: F) -> Self
    where
        C: FnOnce(&mut HostConfig),
        F: FnOnce(Supervisor) -> Supervisor,
    {
        let dir = tempfile::tempdir().unwrap();
        let (cert_pem, key, root) = self_signed();
        let cert = write(dir.path(), "bundle.pem", &cert_pem);
        let key = write(dir.path(), "server-key.pem", &key);

        let mut config = host_config(&cert, &key);
        configure(&mut config);
        let supervisor = customize(Supervisor::new(config, connector));
        let mut state = supervisor.state();
        let (stop, stopped) = oneshot::channel::<()>();
        let run = tokio::spawn(supervisor.run_until(async move {
            let _ = stopped.await;
            Ok(TerminationSignal::Interrupt)
        }));
        let (rpc, http) = serving(&mut state).await;

        Self {
            rpc,
            http,
            root,
            root_pem: cert_pem,
            state,
            stop,
            run,
            _dir: dir,
        }
    }

    /// Client for the built-in host service.
    pub async fn host_client(&self) -> HostClient<Channel> {
        HostClient::new(rpc_channel(self.rpc, &self.root_pem).await)
    }

    /// Deliver the termination signal and wait for the supervisor.
    pub async fn shutdown(self) -> Result<(), HostError> {
        let _ = self.stop.send(());
        tokio::time::timeout(WAIT, self.run)
            .await
            .expect("supervisor did not drain")
            .unwrap()
    }
}
