//! Scoped HTTP server for a local image directory.
//!
//! The server lives exactly as long as its guard: `shutdown` stops it
//! gracefully, and dropping the guard without calling `shutdown` still stops
//! the listener, so the port is released on every exit path.

use crate::error::BootMediaError;
use crate::image::ResolvedImageAddress;
use axum::Router;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// How long `shutdown` waits for in-flight transfers before aborting them
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A running static file server; stops when shut down or dropped
#[derive(Debug)]
pub struct EphemeralImageServer {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl EphemeralImageServer {
    /// Serve `dir` on all IPv4 interfaces at `port` (0 picks a free port).
    pub async fn start(dir: &Path, port: u16) -> Result<Self, BootMediaError> {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
            .await
            .map_err(|source| BootMediaError::Bind { port, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| BootMediaError::Bind { port, source })?;

        let app = Router::new()
            .fallback_service(ServeDir::new(dir))
            .layer(TraceLayer::new_for_http());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                warn!("Image server stopped with error: {}", e);
            }
        });

        info!(addr = %local_addr, dir = %dir.display(), "Image server listening");
        Ok(Self {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Address of `file_name` as seen by a client that reaches this host at `host`
    pub fn image_address(
        &self,
        host: IpAddr,
        file_name: &str,
    ) -> Result<ResolvedImageAddress, BootMediaError> {
        ResolvedImageAddress::served(host, self.port(), file_name)
    }

    /// Stop accepting connections and wait briefly for transfers to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(DRAIN_TIMEOUT, &mut task).await.is_err() {
                debug!("Image server did not drain in {:?}, aborting", DRAIN_TIMEOUT);
                task.abort();
            }
        }
        info!(port = self.port(), "Image server stopped");
    }
}

impl Drop for EphemeralImageServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(port = self.local_addr.port(), "Image server dropped");
        }
    }
}
