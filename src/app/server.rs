use crate::app::routes::router;
use crate::app::state::AppState;
use crate::config::AppConfig;
use crate::core::port_reclaim::PortReclaimer;
use crate::utils::error::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// 啟動伺服器，直到 `shutdown` 完成
pub async fn serve<F>(config: AppConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if config.reclaim_port {
        let report = PortReclaimer::new(config.port).reclaim().await?;
        if report.found.is_empty() {
            tracing::info!("🧹 Port {} is clear", config.port);
        } else {
            tracing::info!(
                "🧹 Reclaimed port {}: killed {:?}, failed {:?}",
                config.port,
                report.killed,
                report.failed
            );
        }
    }

    let bind_addr = config.bind_address();
    let state = Arc::new(AppState::from_config(config)?);
    state.monitor.log_stats("Startup");

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("🚀 Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown)
        .await?;

    state.monitor.log_stats("Shutdown");
    tracing::info!("👋 Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down gracefully..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down gracefully..."),
    }
}
