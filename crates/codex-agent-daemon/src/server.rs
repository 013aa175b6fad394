//! Wires `routes::router` and `cors::cors` into a bindable axum server.

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::ApiError;
use crate::routes;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> axum::Router {
    routes::router(state).layer(axum::middleware::from_fn(crate::cors::cors))
}

/// Binds `{host}:{port}` and serves until `shutdown` resolves. `stop()`
/// on the daemon's owner resolves `shutdown` by dropping its sender.
pub async fn serve(
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), ApiError> {
    let app = router(Arc::clone(&state));
    let addr = format!("{}:{}", state.host, state.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|err| ApiError::Internal(format!("failed to bind {addr}: {err}")))?;

    tracing::info!(%addr, "codex-agent daemon listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    state.supervisor.kill_all().await;
    tracing::info!("codex-agent daemon stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use tokio::sync::oneshot;

    use crate::state::DaemonConfig;

    use super::*;

    #[tokio::test]
    async fn serve_binds_port_zero_and_stops_on_shutdown_signal() {
        let dir = tempdir().unwrap();
        let state = AppState::new(DaemonConfig {
            config_dir: dir.path().to_path_buf(),
            home: dir.path().to_path_buf(),
            host: "127.0.0.1".to_string(),
            port: 0,
            static_token: None,
            binary: "codex".to_string(),
            mode: codex_agent_core::DaemonMode::Http,
        });

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve(state, async {
            let _ = stop_rx.await;
        }));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
