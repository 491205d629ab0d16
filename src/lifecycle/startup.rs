//! Startup orchestration.
//!
//! Order: configuration, logging, metrics, config watcher, admin listener,
//! signal handler, then the viewer listener.

use std::path::Path;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::admin::setup_admin_router;
use crate::config::{load_config, ConfigError, ConfigWatcher, EdgeConfig};
use crate::http::origin::OriginError;
use crate::http::HttpServer;
use crate::lifecycle::{signals::wait_for_signal, Shutdown};
use crate::net::listener::{self, ListenerError};
use crate::net::tls::{load_tls_config, TlsError};
use crate::observability::{logging, metrics};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Origin(#[from] OriginError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the edge until a shutdown signal arrives.
///
/// Without a config file the built-in defaults are used and hot reload is
/// off.
pub async fn run(config_path: Option<&Path>) -> Result<(), StartupError> {
    let config = match config_path {
        Some(path) => load_config(path)?,
        None => EdgeConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "static-edge starting");
    tracing::info!(
        domain = %config.site.domain_name,
        host_policy = ?config.site.host_policy,
        csp = ?config.site.content_security_policy,
        origin = %config.origin.url,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = listener::parse_address(&config.observability.metrics_address)?;
        metrics::init_metrics(addr);
    }

    // The watcher must outlive the server for events to flow.
    let (config_updates, _watcher) = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let guard = match watcher.run() {
                Ok(guard) => Some(guard),
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
                    None
                }
            };
            (updates, guard)
        }
        None => (mpsc::unbounded_channel().1, None),
    };

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config.clone())?;

    if config.admin.enabled {
        let addr = listener::parse_address(&config.admin.bind_address)?;
        let admin_listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { address: addr, source })?;
        let router = setup_admin_router(server.state());
        let mut admin_shutdown = shutdown.subscribe();
        tracing::info!(address = %addr, "Admin API listening");
        tokio::spawn(async move {
            let result = axum::serve(admin_listener, router)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin API stopped");
            }
        });
    }

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    match &config.listener.tls {
        Some(tls) => {
            let rustls = load_tls_config(tls).await?;
            let addr = listener::parse_address(&config.listener.bind_address)?;
            server
                .run_tls(addr, rustls, config_updates, shutdown.subscribe())
                .await?;
        }
        None => {
            let viewer_listener = listener::bind(&config.listener).await?;
            server
                .run(viewer_listener, config_updates, shutdown.subscribe())
                .await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
