use log::*;
use service::{config::Config, logging::Logger, AppState};
use sse::Manager;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
        std::process::exit(1);
    }

    info!(
        "Starting push engine: max_connections={}, heartbeat_interval={}ms, connection_timeout={}ms",
        config.max_connections, config.heartbeat_interval_ms, config.connection_timeout_ms
    );

    let sse_manager = Manager::start(config.engine_config());
    let app_state = AppState::new(config, &sse_manager);

    if let Err(e) = web::init_server(app_state, shutdown_signal(sse_manager)).await {
        error!("Server exited with an error: {e}");
        std::process::exit(1);
    }
}

/// Waits for Ctrl+C or SIGTERM, then closes every open stream so the graceful
/// shutdown is not held up by clients that never disconnect.
async fn shutdown_signal(sse_manager: Arc<Manager>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
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
                error!("Failed to listen for SIGTERM: {e}");
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

    info!("Shutdown signal received, closing event streams");
    let closed = sse_manager.shutdown();
    info!("Closed {closed} event stream(s)");
}
