//! The built-in host service and the hook for business services.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::service::RoutesBuilder;
use tonic::{Request, Response, Status};

use crate::host::{NotReady, ServiceHost, Subscription};
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::rpc::pb;
use crate::rpc::pb::host_server::{Host, HostServer};
use crate::store::StoreError;

/// Events buffered per watch stream before the relay waits on the client.
const WATCH_BUFFER: usize = 16;

/// Adds a business service (hardware, workflow, template) to the RPC router
/// once the host exists.
pub type ServiceFactory = Box<dyn Fn(Arc<ServiceHost>, &mut RoutesBuilder) + Send + Sync>;

impl From<NotReady> for Status {
    fn from(err: NotReady) -> Self {
        Status::unavailable(err.to_string())
    }
}

impl From<StoreError> for Status {
    fn from(err: StoreError) -> Self {
        Status::unavailable(err.to_string())
    }
}

/// Host-level methods: health, certificate, publish, watch.
pub struct HostService {
    host: Arc<ServiceHost>,
    stop: ShutdownSignal,
}

impl HostService {
    /// `stop` ends every open watch stream when the host drains.
    pub fn new(host: Arc<ServiceHost>, stop: ShutdownSignal) -> Self {
        Self { host, stop }
    }

    /// Wrap in a tonic service refusing messages over `max_message_bytes`.
    pub fn into_server(self, max_message_bytes: usize) -> HostServer<Self> {
        HostServer::new(self).max_decoding_message_size(max_message_bytes)
    }

    async fn check_health(&self) -> Result<pb::HealthResponse, Status> {
        let store = self.host.store()?;
        store.ping().await?;
        Ok(pb::HealthResponse {
            ready: true,
            backend: store.backend().to_string(),
            facility: self.host.facility().to_string(),
        })
    }
}

fn observe<T>(method: &'static str, result: Result<T, Status>) -> Result<T, Status> {
    metrics::record_rpc_call("host", method, result.is_ok());
    if let Err(status) = &result {
        tracing::debug!(
            method,
            code = ?status.code(),
            error = status.message(),
            "host call failed"
        );
    }
    result
}

fn require_key(key: &str) -> Result<(), Status> {
    if key.is_empty() {
        Err(Status::invalid_argument("key must not be empty"))
    } else {
        Ok(())
    }
}

#[tonic::async_trait]
impl Host for HostService {
    async fn health(
        &self,
        _request: Request<pb::HealthRequest>,
    ) -> Result<Response<pb::HealthResponse>, Status> {
        observe("health", self.check_health().await).map(Response::new)
    }

    async fn certificate(
        &self,
        _request: Request<pb::CertificateRequest>,
    ) -> Result<Response<pb::CertificateResponse>, Status> {
        let modified: DateTime<Utc> = self.host.certificate_modified().into();
        let response = pb::CertificateResponse {
            pem: self.host.certificate_pem().to_vec(),
            modified: modified.to_rfc3339(),
        };
        observe("certificate", Ok(Response::new(response)))
    }

    async fn publish(
        &self,
        request: Request<pb::PublishRequest>,
    ) -> Result<Response<pb::PublishResponse>, Status> {
        let pb::PublishRequest { key, message } = request.into_inner();
        let result = require_key(&key).map(|()| pb::PublishResponse {
            delivered: self.host.publish(&key, message),
        });
        observe("publish", result).map(Response::new)
    }

    type WatchStream = ReceiverStream<Result<pb::WatchEvent, Status>>;

    async fn watch(
        &self,
        request: Request<pb::WatchRequest>,
    ) -> Result<Response<Self::WatchStream>, Status> {
        let key = request.into_inner().key;
        observe("watch", require_key(&key))?;

        let subscription = self.host.subscribe(key);
        let (events, stream) = mpsc::channel(WATCH_BUFFER);
        tokio::spawn(relay(subscription, events, self.stop.clone()));
        Ok(Response::new(ReceiverStream::new(stream)))
    }
}

/// Forward published messages to one watch stream until the client leaves,
/// the entry is replaced, or the host drains. Dropping the subscription on
/// exit unregisters it.
async fn relay(
    mut subscription: Subscription,
    events: mpsc::Sender<Result<pb::WatchEvent, Status>>,
    mut stop: ShutdownSignal,
) {
    tracing::debug!(key = %subscription.key(), "watch stream opened");
    loop {
        let message = tokio::select! {
            _ = stop.recv() => break,
            _ = events.closed() => break,
            message = subscription.recv() => message,
        };
        let Some(message) = message else { break };

        let sent = tokio::select! {
            _ = stop.recv() => break,
            sent = events.send(Ok(pb::WatchEvent { message })) => sent,
        };
        if sent.is_err() {
            break;
        }
    }
    tracing::debug!(key = %subscription.key(), "watch stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::TlsIdentity;
    use crate::lifecycle::Shutdown;
    use crate::store::MemoryConnector;
    use std::time::{Duration, SystemTime};
    use tokio_stream::StreamExt;
    use tonic::Code;

    async fn service(connector: &MemoryConnector, shutdown: &Shutdown) -> HostService {
        let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let identity = TlsIdentity::from_pem(
            generated.cert.pem().into_bytes(),
            generated.key_pair.serialize_pem().as_bytes(),
            SystemTime::now(),
        )
        .unwrap();
        let host = ServiceHost::connect(connector, "dc1", Arc::new(identity))
            .await
            .unwrap();
        HostService::new(Arc::new(host), shutdown.subscribe())
    }

    #[tokio::test]
    async fn health_reports_store_state() {
        let connector = MemoryConnector::new();
        let svc = service(&connector, &Shutdown::new()).await;

        let health = svc
            .health(Request::new(pb::HealthRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert!(health.ready);
        assert_eq!(health.backend, "memory");
        assert_eq!(health.facility, "dc1");

        connector.store().set_offline(true);
        let status = svc
            .health(Request::new(pb::HealthRequest {}))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
    }

    #[tokio::test]
    async fn certificate_returns_pem() {
        let svc = service(&MemoryConnector::new(), &Shutdown::new()).await;
        let cert = svc
            .certificate(Request::new(pb::CertificateRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert!(String::from_utf8(cert.pem).unwrap().contains("BEGIN CERTIFICATE"));
        assert!(DateTime::parse_from_rfc3339(&cert.modified).is_ok());
    }

    #[tokio::test]
    async fn empty_keys_are_rejected() {
        let svc = service(&MemoryConnector::new(), &Shutdown::new()).await;

        let status = svc
            .publish(Request::new(pb::PublishRequest {
                key: String::new(),
                message: "hi".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);

        let status = svc
            .watch(Request::new(pb::WatchRequest { key: String::new() }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn watch_relays_until_shutdown() {
        let shutdown = Shutdown::new();
        let svc = service(&MemoryConnector::new(), &shutdown).await;
        let mut stream = svc
            .watch(Request::new(pb::WatchRequest { key: "wf-1".into() }))
            .await
            .unwrap()
            .into_inner();

        let delivered = svc
            .publish(Request::new(pb::PublishRequest {
                key: "wf-1".into(),
                message: "running".into(),
            }))
            .await
            .unwrap()
            .into_inner()
            .delivered;
        assert!(delivered);

        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event.message, "running");

        shutdown.trigger();
        let end = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap();
        assert!(end.is_none());
    }
}
