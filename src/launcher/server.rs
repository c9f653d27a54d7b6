use crate::launcher::entry::AppRef;
use crate::utils::error::{IngestError, Result};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// A loaded application bound to its listener, ready to serve.
pub struct Server {
    listener: TcpListener,
    router: Router,
    app_ref: AppRef,
}

impl Server {
    pub async fn bind(addr: SocketAddr, router: Router, app_ref: AppRef) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| IngestError::BindError { addr, source })?;
        Ok(Self {
            listener,
            router,
            app_ref,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        tracing::info!(%addr, app = %self.app_ref, "🚀 Listening");

        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| IngestError::ServerError {
            message: e.to_string(),
        })?;

        tracing::info!(app = %self.app_ref, "Server stopped");
        Ok(())
    }

    /// Serves until SIGTERM or SIGINT.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }
}

pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                    _ = sigint.recv() => tracing::info!("Received SIGINT"),
                }
                return;
            }
            _ => tracing::warn!("Cannot register signal handlers, falling back to Ctrl-C"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Ctrl-C handler failed");
        std::future::pending::<()>().await;
    }
}
