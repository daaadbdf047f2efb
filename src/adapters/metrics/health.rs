//! Health Check Server - Liveness, Readiness and Metrics
//!
//! Exposes `/live`, `/ready` and `/metrics` via axum 0.7. Readiness
//! depends on the settlement RPC, the ledger store, and the engine not
//! being in shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::broadcast;
use tracing::{error, info, instrument};

use super::prometheus::MetricsRegistry;

/// Shared health flags, updated by the background loops.
#[derive(Debug)]
pub struct HealthState {
    pub chain_healthy: AtomicBool,
    pub store_healthy: AtomicBool,
    /// Cleared at the start of graceful shutdown.
    pub accepting: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// All healthy by default.
    pub const fn new() -> Self {
        Self {
            chain_healthy: AtomicBool::new(true),
            store_healthy: AtomicBool::new(true),
            accepting: AtomicBool::new(true),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.chain_healthy.load(Ordering::Relaxed)
            && self.store_healthy.load(Ordering::Relaxed)
            && self.accepting.load(Ordering::Relaxed)
    }
}

#[derive(Clone)]
struct AppState {
    health: Arc<HealthState>,
    metrics: Arc<MetricsRegistry>,
}

pub struct HealthServer {
    health: Arc<HealthState>,
    metrics: Arc<MetricsRegistry>,
    bind_address: String,
}

impl HealthServer {
    pub const fn new(
        health: Arc<HealthState>,
        metrics: Arc<MetricsRegistry>,
        bind_address: String,
    ) -> Self {
        Self {
            health,
            metrics,
            bind_address,
        }
    }

    /// Routes, without binding. Used directly by tests.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/metrics", get(Self::metrics))
            .with_state(AppState {
                health: Arc::clone(&self.health),
                metrics: Arc::clone(&self.metrics),
            })
    }

    /// Serve until the shutdown signal.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        info!(address = %self.bind_address, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;
        Ok(())
    }

    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
        if state.health.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }

    async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
        match state.metrics.render() {
            Ok(body) => (StatusCode::OK, body),
            Err(e) => {
                error!(error = %e, "Metrics encoding failed");
                (StatusCode::INTERNAL_SERVER_ERROR, String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_requires_all_flags() {
        let state = HealthState::new();
        assert!(state.is_ready());
        state.store_healthy.store(false, Ordering::Relaxed);
        assert!(!state.is_ready());
        state.store_healthy.store(true, Ordering::Relaxed);
        state.accepting.store(false, Ordering::Relaxed);
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn test_server_answers_health_routes() {
        let health = Arc::new(HealthState::new());
        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let server = HealthServer::new(Arc::clone(&health), metrics, "127.0.0.1:0".to_string());
        let app = server.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let status = |path: &'static str| async move {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
            stream.write_all(request.as_bytes()).await.unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).await.unwrap();
            response
        };

        assert!(status("/live").await.starts_with("HTTP/1.1 200"));
        assert!(status("/ready").await.starts_with("HTTP/1.1 200"));
        health.chain_healthy.store(false, Ordering::Relaxed);
        assert!(status("/ready").await.starts_with("HTTP/1.1 503"));
        assert!(status("/metrics").await.contains("mining_ledger_deposits_credited_total"));
    }
}
