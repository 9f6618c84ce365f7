use std::sync::Arc;

use config::Config;
use runtime::DockerRuntime;

/// Dockmon: a small HTTP service reporting the status, resource usage and recent
/// log output of the containers managed by a local Docker daemon.
///
/// The library is organised around the [`runtime::Runtime`] trait. Everything above
/// it ([`monitor`], [`logs`] and [`api`]) only talks to that trait, so the Docker
/// backed implementation can be swapped out.
pub mod api;
pub mod config;
pub mod container;
pub mod error;
pub mod logs;
pub mod monitor;
pub mod runtime;

/// Runs the Dockmon service until `SIGINT` or `SIGTERM` is received.
///
/// Reads the configuration from the environment, connects to the container
/// runtime and serves the HTTP API. A runtime that cannot be reached at startup
/// does not abort the service; requests are answered with `503` until it comes
/// back.
///
/// # Errors
///
/// Possible errors include:
/// - Invalid `DOCKMON_*` environment variables.
/// - Failure to bind the listen address.
/// - I/O errors while serving requests.
pub async fn run() -> error::Result<()> {
    let config = Config::from_env()?;
    log::debug!("Configuration: {:?}", config);

    let runtime = Arc::new(DockerRuntime::connect_or_degrade(&config).await);
    let server = api::ApiServer::new(Arc::clone(&runtime), &config);
    let served = server.listen(&config.listen_addr, shutdown_signal()).await;

    log::info!("Shutting down");
    runtime.close().await;
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                log::error!("failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
