//! Per-connection handler
//!
//! Serves one accepted socket as an HTTP/1.1 connection. Keep-alive is off:
//! the connection carries a single event stream and closes when it ends.
//! Request heads that are too large are answered with `431`; a head that
//! does not arrive within the request timeout closes the connection.

use std::net::SocketAddr;

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;

use crate::error::Result;
use crate::server::config::ServerConfig;

/// Smallest read buffer the HTTP/1 codec accepts
const MIN_REQUEST_HEAD_SIZE: usize = 8 * 1024;

pub(crate) struct Connection {
    session_id: u64,
    socket: TcpStream,
    peer_addr: SocketAddr,
    config: ServerConfig,
    router: Router,
}

impl Connection {
    pub(crate) fn new(
        session_id: u64,
        socket: TcpStream,
        peer_addr: SocketAddr,
        config: ServerConfig,
        router: Router,
    ) -> Self {
        Self {
            session_id,
            socket,
            peer_addr,
            config,
            router,
        }
    }

    pub(crate) async fn run(self) -> Result<()> {
        tracing::debug!(
            session_id = self.session_id,
            peer = %self.peer_addr,
            "Serving connection"
        );

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(self.config.request_timeout)
            .max_buf_size(self.config.max_request_head_size.max(MIN_REQUEST_HEAD_SIZE))
            .keep_alive(false);

        builder
            .serve_connection(
                TokioIo::new(self.socket),
                TowerToHyperService::new(self.router),
            )
            .await?;

        Ok(())
    }
}
