use anyhow::{Context, Result};
use axum::{http::StatusCode, serve::Serve, Router};
use tokio::net::TcpListener;

use crate::config::Config;

pub mod middlewares;
pub mod routes;

use middlewares::RequestTracer;

pub struct Api {
    port: u16,
    server: Serve<Router, Router>,
}

impl Api {
    pub async fn build(configuration: &Config, tracer: RequestTracer) -> Result<Self> {
        let address = format!(
            "{}:{}",
            configuration.application.host, configuration.application.port
        );
        let listener = TcpListener::bind(&address)
            .await
            .context("Failed to bind address")?;
        let port = listener
            .local_addr()
            .context("Failed to get local address")?
            .port();

        let router = Router::new()
            .merge(routes::greeting::create_router(&tracer))
            .merge(routes::failure::create_router(&tracer))
            .merge(routes::health::create_router())
            .fallback(not_found);

        tracing::info!(
            name = %configuration.application.name,
            version = %configuration.application.version,
            %address,
            port = port,
            flush_timeout = ?tracer.flush_timeout(),
            "API listening"
        );

        let server = axum::serve(listener, router);

        Ok(Self { port, server })
    }

    pub async fn run_until_stopped(self) -> Result<()> {
        self.server
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server failed to start")
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for the shutdown signal");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown signal received, draining connections");
}
