//! Event-stream server listener
//!
//! Handles TCP accept loop and spawns connection handlers.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::Router;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::hub::Hub;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::server::routes::routes;
use crate::stats::{ServerStats, ServerStatsSnapshot};

/// Server-Sent Events server
///
/// Every accepted connection becomes one subscriber of the hub.
pub struct SseServer {
    config: ServerConfig,
    hub: Hub,
    stats: Arc<ServerStats>,
    router: Router,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl SseServer {
    /// Create a new server publishing events from `hub`
    pub fn new(config: ServerConfig, hub: Hub) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let stats = Arc::new(ServerStats::new());
        let router = routes(hub.clone(), Arc::clone(&stats));

        Self {
            config,
            hub,
            stats,
            router,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get the hub subscribers are attached to
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Connection counters
    pub fn stats(&self) -> ServerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Run the server
    ///
    /// Accepts connections until the returned future is dropped.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "SSE server listening");

        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "SSE server listening");

        self.serve_until(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// Stops accepting; existing streams end when the hub shuts down or the
    /// peers disconnect.
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.stats.connection_rejected();
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let config = self.config.clone();
        let router = self.router.clone();
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            // Held for the life of the connection
            let _permit = permit;
            stats.connection_opened();

            let connection = Connection::new(session_id, socket, peer_addr, config, router);

            if let Err(e) = connection.run().await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }

            stats.connection_closed();
            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::oneshot;

    use super::*;
    use crate::hub::HubConfig;

    async fn start(config: ServerConfig, hub: Hub) -> (SocketAddr, oneshot::Sender<()>, Arc<SseServer>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(SseServer::new(config, hub));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let running = Arc::clone(&server);
        tokio::spawn(async move {
            running
                .serve_until(listener, async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        (addr, stop_tx, server)
    }

    async fn wait_for_subscribers(hub: &Hub, expected: usize) {
        for _ in 0..400 {
            if hub.subscriber_count().await.unwrap() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("subscriber count never reached {}", expected);
    }

    /// Read until `needle` shows up in the received bytes
    async fn read_until(stream: &mut TcpStream, received: &mut Vec<u8>, needle: &str) {
        let mut buf = [0u8; 1024];
        while !String::from_utf8_lossy(received).contains(needle) {
            let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
                .await
                .unwrap()
                .unwrap();
            assert!(n > 0, "connection closed early");
            received.extend_from_slice(&buf[..n]);
        }
    }

    /// Publish until the hub notices the subscriber went away
    async fn wait_for_disconnect(hub: &Hub) {
        for _ in 0..400 {
            if hub.subscriber_count().await.unwrap() == 0 {
                return;
            }
            let _ = hub.send_string("", "ping", "").await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("subscriber never unregistered");
    }

    #[tokio::test]
    async fn test_stream_over_tcp() {
        let hub = Hub::new();
        let (addr, _stop, server) = start(ServerConfig::default(), hub.clone()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /events HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        wait_for_subscribers(&hub, 1).await;

        let mut received = Vec::new();
        read_until(&mut client, &mut received, "\r\n\r\n").await;
        let head = String::from_utf8_lossy(&received).to_lowercase();
        assert!(head.starts_with("http/1.1 200 ok\r\n"));
        assert!(head.contains("cache-control: no-cache\r\n"));
        assert!(head.contains("content-type: text/event-stream\r\n"));

        hub.send_string("", "msg", "Hi!").await.unwrap();
        read_until(&mut client, &mut received, "event:msg\ndata:Hi!\n\n").await;

        drop(client);
        wait_for_disconnect(&hub).await;
        assert_eq!(server.stats().total_connections, 1);
        assert!(server.stats().bytes_sent >= 20);
    }

    #[tokio::test]
    async fn test_rejects_non_get() {
        let hub = Hub::new();
        let (addr, _stop, server) = start(ServerConfig::default(), hub.clone()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"POST /events HTTP/1.1\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));

        assert_eq!(hub.subscriber_count().await.unwrap(), 0);
        assert_eq!(server.stats().rejected_connections, 1);
    }

    #[tokio::test]
    async fn test_request_timeout_closes_connection() {
        let hub = Hub::new();
        let config = ServerConfig::default().request_timeout(Duration::from_millis(50));
        let (addr, _stop, _server) = start(config, hub.clone()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();

        let mut response = Vec::new();
        let _ = tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut response))
            .await
            .unwrap();
        assert!(response.is_empty());
        assert_eq!(hub.subscriber_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_closed_hub_answers_unavailable() {
        let hub = Hub::new();
        hub.shutdown().await.unwrap();
        let (addr, _stop, _server) = start(ServerConfig::default(), hub.clone()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
        assert!(response.ends_with("Hub is closed\n"));
    }

    #[tokio::test]
    async fn test_hub_shutdown_closes_streams() {
        let hub = Hub::with_config(HubConfig::default().mailbox_capacity(4));
        let (addr, stop, _server) = start(ServerConfig::default(), hub.clone()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        wait_for_subscribers(&hub, 1).await;

        stop.send(()).unwrap();
        hub.send_int("", "", -1).await.unwrap();
        assert_eq!(hub.shutdown().await.unwrap(), 1);

        // Remaining events are delivered, then the body ends and the server
        // closes the connection
        let mut response = String::new();
        tokio::time::timeout(Duration::from_secs(5), client.read_to_string(&mut response))
            .await
            .unwrap()
            .unwrap();
        assert!(response.contains("data:-1\n\n"));
        assert!(response.ends_with("0\r\n\r\n"));
    }
}
