//! Remote-procedure server: TLS accept loop feeding a tonic router.
//!
//! # Responsibilities
//! - Accept connections and run each TLS handshake on its own task
//! - Serve every registered gRPC service on the handshaken streams
//! - Stop gracefully: refuse new connections, let in-flight calls finish

use std::io;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tokio_stream::wrappers::ReceiverStream;
use tonic::service::{Routes, RoutesBuilder};
use tonic::transport::Server;

use crate::lifecycle::ShutdownSignal;

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// A client that has not finished its handshake by then is dropped.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Handshaken connections waiting for the router.
const HANDSHAKE_QUEUE: usize = 128;

/// gRPC server for the host and business services.
pub struct RpcServer {
    routes: Routes,
}

impl RpcServer {
    pub fn new(routes: RoutesBuilder) -> Self {
        Self {
            routes: routes.routes(),
        }
    }

    /// Serve until `stop` fires, then wait for open calls to finish.
    pub async fn serve(
        self,
        listener: TcpListener,
        acceptor: TlsAcceptor,
        stop: ShutdownSignal,
    ) -> Result<(), tonic::transport::Error> {
        if let Ok(address) = listener.local_addr() {
            tracing::info!(address = %address, "RPC server starting");
        }

        let incoming = incoming(listener, acceptor, stop.clone());
        let mut stop = stop;
        Server::builder()
            .trace_fn(|request| tracing::info_span!("rpc", path = %request.uri().path()))
            .add_routes(self.routes)
            .serve_with_incoming_shutdown(incoming, async move {
                stop.recv().await;
                tracing::info!("RPC graceful stop requested");
            })
            .await?;

        tracing::info!("RPC server stopped");
        Ok(())
    }
}

/// Accept on `listener` until `stop` fires, yielding TLS streams.
///
/// Handshakes run on their own tasks so a slow client never holds up the
/// accept loop. The listener closes as soon as the loop ends.
fn incoming(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    mut stop: ShutdownSignal,
) -> ReceiverStream<io::Result<TlsStream<TcpStream>>> {
    let (tx, rx) = mpsc::channel(HANDSHAKE_QUEUE);

    tokio::spawn(async move {
        loop {
            let (stream, peer) = tokio::select! {
                _ = stop.recv() => break,
                _ = tx.closed() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "RPC accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
            };

            let acceptor = acceptor.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                match tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                    Ok(Ok(tls)) => {
                        let _ = tx.send(Ok(tls)).await;
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(peer_addr = %peer, error = %e, "TLS handshake failed");
                    }
                    Err(_) => tracing::debug!(peer_addr = %peer, "TLS handshake timed out"),
                }
            });
        }
        tracing::debug!("RPC accept loop finished");
    });

    ReceiverStream::new(rx)
}
