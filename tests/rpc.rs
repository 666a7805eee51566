//! gRPC listener end to end.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use provision_host::rpc::pb;
use provision_host::store::MemoryConnector;
use provision_host::ServiceHost;
use tonic::service::RoutesBuilder;
use tonic::Code;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

mod common;

use common::RunningHost;

fn publish(key: &str, message: &str) -> pb::PublishRequest {
    pb::PublishRequest {
        key: key.into(),
        message: message.into(),
    }
}

#[tokio::test]
async fn test_host_health_and_certificate() {
    let host = RunningHost::start().await;
    let mut client = host.host_client().await;

    let health = client.health(pb::HealthRequest {}).await.unwrap().into_inner();
    assert!(health.ready);
    assert_eq!(health.backend, "memory");
    assert_eq!(health.facility, "test");

    let cert = client
        .certificate(pb::CertificateRequest {})
        .await
        .unwrap()
        .into_inner();
    assert_eq!(String::from_utf8(cert.pem).unwrap(), host.root_pem);

    drop(client);
    host.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_calls_do_not_end_the_connection() {
    let host = RunningHost::start().await;
    let channel = common::rpc_channel(host.rpc, &host.root_pem).await;
    let mut client = pb::host_client::HostClient::new(channel.clone());

    let status = client.publish(publish("", "hi")).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    // Nothing registered the standard health service on this host.
    let status = HealthClient::new(channel)
        .check(HealthCheckRequest {
            service: String::new(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);

    let health = client.health(pb::HealthRequest {}).await.unwrap().into_inner();
    assert!(health.ready);

    drop(client);
    host.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_registered_service_receives_the_host() {
    let connector = Arc::new(MemoryConnector::new());
    let seen = Arc::new(Mutex::new(None));
    let recorded = Arc::clone(&seen);

    let host = RunningHost::start_with_connector(Arc::clone(&connector), move |supervisor| {
        supervisor.with_service(Box::new(
            move |host: Arc<ServiceHost>, routes: &mut RoutesBuilder| {
                *recorded.lock().unwrap() = Some(host.facility().to_string());
                let (_reporter, service) = tonic_health::server::health_reporter();
                routes.add_service(service);
            },
        ))
    })
    .await;
    assert_eq!(seen.lock().unwrap().as_deref(), Some("test"));

    let channel = common::rpc_channel(host.rpc, &host.root_pem).await;
    let reply = HealthClient::new(channel.clone())
        .check(HealthCheckRequest {
            service: String::new(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(reply.status, ServingStatus::Serving as i32);

    // The host service shares the router and still tracks the store.
    let mut client = pb::host_client::HostClient::new(channel);
    connector.store().set_offline(true);
    let status = client.health(pb::HealthRequest {}).await.unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);

    drop(client);
    host.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_publish_without_subscriber_is_a_no_op() {
    let host = RunningHost::start().await;
    let mut client = host.host_client().await;

    let reply = client
        .publish(publish("nobody", "hi"))
        .await
        .unwrap()
        .into_inner();
    assert!(!reply.delivered);

    drop(client);
    host.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_oversized_message_is_refused() {
    let host = RunningHost::start_configured(|config| config.rpc.max_message_bytes = 1024).await;
    let mut client = host.host_client().await;

    let status = client
        .publish(publish("wf-1", &"x".repeat(64 * 1024)))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::OutOfRange);

    // Only that call failed.
    let reply = client
        .publish(publish("wf-1", "small"))
        .await
        .unwrap()
        .into_inner();
    assert!(!reply.delivered);

    drop(client);
    host.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_inflight_call_finishes_during_drain() {
    let connector = Arc::new(MemoryConnector::new());
    let host = RunningHost::start_with_connector(Arc::clone(&connector), |s| s).await;
    let mut client = host.host_client().await;

    connector.store().set_latency(Duration::from_millis(500));
    let call = tokio::spawn(async move { client.health(pb::HealthRequest {}).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    host.shutdown().await.unwrap();
    let health = call.await.unwrap().unwrap().into_inner();
    assert!(health.ready);
}

#[tokio::test]
async fn test_watch_streams_until_shutdown() {
    let host = RunningHost::start().await;
    let mut watcher = host.host_client().await;
    let mut publisher = host.host_client().await;

    let mut events = watcher
        .watch(pb::WatchRequest { key: "wf-1".into() })
        .await
        .unwrap()
        .into_inner();

    let reply = publisher
        .publish(publish("wf-1", "running"))
        .await
        .unwrap()
        .into_inner();
    assert!(reply.delivered);

    let event = events.message().await.unwrap().unwrap();
    assert_eq!(event.message, "running");

    drop(publisher);
    let shutdown = tokio::spawn(host.shutdown());

    let end = tokio::time::timeout(common::WAIT, events.message())
        .await
        .unwrap();
    assert!(end.unwrap().is_none());

    shutdown.await.unwrap().unwrap();
}
