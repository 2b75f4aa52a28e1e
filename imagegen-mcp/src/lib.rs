//! Image generation MCP server
//!
//! Exposes a single `generate_image` tool that renders a prompt with Gemini
//! and saves the result as a JPEG on disk.
//!
//! Can be served:
//! - over stdio (`serve_stdio`), the usual way an MCP client launches it
//! - over streamable HTTP (`start_server_on`)

pub mod logging;
pub mod tools;

pub use tools::ImageGenServer;

use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_service::Service;
use tracing::info;

/// Serve MCP over stdin/stdout until the client disconnects.
pub async fn serve_stdio(server: ImageGenServer) -> anyhow::Result<()> {
    info!("Starting image generation MCP server on stdio");
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    info!("stdio client disconnected");
    Ok(())
}

/// Handle to a running server that can be used to stop it
pub struct ServerHandle {
    shutdown_tx: oneshot::Sender<()>,
    local_addr: SocketAddr,
}

impl ServerHandle {
    /// Get the port the server is running on
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the URL for the MCP endpoint
    pub fn url(&self) -> String {
        format!("http://{}/mcp", self.local_addr)
    }

    /// Stop the server
    pub fn stop(self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Start the MCP server over HTTP on the specified host and port
///
/// Use port 0 to get a random available port.
pub async fn start_server_on(
    host: &str,
    port: u16,
    server: ImageGenServer,
) -> anyhow::Result<ServerHandle> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    info!("Starting image generation MCP server on {}", local_addr);

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    tokio::spawn(async move {
        let config = StreamableHttpServerConfig::default();
        let session_manager = Arc::new(LocalSessionManager::default());

        let mcp_service = StreamableHttpService::new(
            move || Ok(server.clone()),
            session_manager,
            config,
        );

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Shutting down image generation MCP server");
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let io = TokioIo::new(stream);
                            let service = mcp_service.clone();

                            tokio::spawn(async move {
                                if let Err(err) = http1::Builder::new()
                                    .serve_connection(
                                        io,
                                        hyper::service::service_fn(move |req| {
                                            let mut svc = service.clone();
                                            async move {
                                                svc.call(req).await
                                            }
                                        }),
                                    )
                                    .await
                                {
                                    tracing::error!("Error serving connection: {:?}", err);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }
    });

    Ok(ServerHandle {
        shutdown_tx,
        local_addr,
    })
}
