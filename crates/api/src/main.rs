use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use edgegate_core::jobs::JobRegistry;
use edgegate_core::runner::TaskRunner;
use edgegate_engine::{DockerEngine, EngineClient};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edgegate_api::background;
use edgegate_api::config::ServerConfig;
use edgegate_api::router::build_app_router;
use edgegate_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "edgegate_api=debug,edgegate_core=info,edgegate_engine=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(host = %config.host, port = config.port, "Loaded server configuration");

    // --- Container engine ---
    let engine = Arc::new(DockerEngine::new(
        &config.docker_host,
        config.docker_api_version.as_deref(),
    ));
    match engine.ping().await {
        Ok(()) => tracing::info!(base_url = engine.base_url(), "Container engine reachable"),
        // Not fatal: jobs fail individually until the daemon comes up.
        Err(e) => tracing::warn!(base_url = engine.base_url(), error = %e, "Container engine not reachable"),
    }

    // --- Job registry ---
    let runner = TaskRunner::start(config.job_concurrency, config.job_queue_capacity);
    let registry = Arc::new(JobRegistry::new(Arc::clone(&runner)));
    tracing::info!(
        concurrency = runner.concurrency(),
        queue_capacity = config.job_queue_capacity,
        "Job registry started"
    );

    // --- Background purge ---
    let purge_cancel = CancellationToken::new();
    let purge_handle = tokio::spawn(background::job_purge::run(
        Arc::clone(&registry),
        config.job_max_age(),
        config.job_purge_interval(),
        purge_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        registry: Arc::clone(&registry),
        engine,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    purge_cancel.cancel();
    match tokio::time::timeout(Duration::from_secs(5), purge_handle).await {
        Ok(Ok(())) => tracing::info!("Job purge stopped"),
        Ok(Err(e)) => tracing::error!(error = %e, "Job purge task failed"),
        Err(_) => tracing::warn!("Job purge did not stop within 5s"),
    }

    registry.shutdown();
    runner.stop().await;
    tracing::info!(active = runner.active_count(), "Task runner stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
