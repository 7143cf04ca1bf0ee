//! Turnstile server library.
//!
//! Serves the admission endpoint for the binary and the integration tests, and
//! exports [`GuardLayer`] for services that embed the guard in their own router.

#![deny(missing_docs)]

mod admission;
mod health;
mod rate_limit;
mod response;

use std::{net::SocketAddr, sync::Arc};

use ::rate_limit::Guard;
use anyhow::anyhow;
use axum::{Router, routing::get};
use axum_server::tls_rustls::RustlsConfig;
use config::Config;
use tokio::net::TcpListener;

pub use self::rate_limit::{GuardLayer, GuardService, Principal};
pub use self::response::RateLimitHeaders;

/// Configuration for serving Turnstile.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to
    pub listen_address: SocketAddr,
    /// The deserialized Turnstile TOML configuration.
    pub config: Config,
}

/// Builds the guard described by `config` and the admission routes around it.
///
/// The health route is added here only when it shares the main listener.
pub async fn router(config: &Config) -> anyhow::Result<Router> {
    let guard = Guard::from_config(&config.guard)
        .await
        .map_err(|e| anyhow!("Failed to initialize the admission guard: {e}"))?;

    if !guard.is_enabled() {
        log::warn!("Guard is disabled, every admission request will be accepted");
    }

    let mut app = admission::router(Arc::new(guard), config.guard.clone())?;

    if config.server.health.enabled && config.server.health.listen.is_none() {
        app = app.route(&config.server.health.path, get(health::health));
    }

    Ok(app)
}

/// Starts and runs the Turnstile server with the provided configuration.
pub async fn serve(ServeConfig { listen_address, config }: ServeConfig) -> anyhow::Result<()> {
    let app = router(&config).await?;

    if config.server.health.enabled
        && let Some(listen) = config.server.health.listen
    {
        tokio::spawn(health::bind_health_endpoint(
            listen,
            config.server.tls.clone(),
            config.server.health.clone(),
        ));
    }

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    let service = app.into_make_service_with_connect_info::<SocketAddr>();

    match &config.server.tls {
        Some(tls_config) => {
            let rustls_config = RustlsConfig::from_pem_file(&tls_config.certificate, &tls_config.key)
                .await
                .map_err(|e| anyhow!("Failed to load TLS certificate and key: {e}"))?;

            log::info!("Admission endpoint available at: https://{listen_address}/admission/{{operation}}");

            axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)
                .serve(service)
                .await
                .map_err(|e| anyhow!("Failed to start HTTPS server: {e}"))?;
        }
        None => {
            log::info!("Admission endpoint available at: http://{listen_address}/admission/{{operation}}");

            axum::serve(listener, service)
                .await
                .map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;
        }
    }

    Ok(())
}
