//! Health check endpoint

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use discord_commands::SyncSummary;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `ok` once declarations are built, `starting` before
    pub status: String,
    pub bot_username: Option<String>,
    pub uptime_secs: u64,
    pub built: bool,
    /// Outcome of the most recent command sync
    pub last_sync: Option<SyncSummary>,
}

/// Bot state the health endpoint reports, shared with the dispatcher
#[derive(Clone)]
pub struct AppState {
    pub start_time: SystemTime,
    pub bot_username: Arc<RwLock<Option<String>>>,
    pub built: Arc<AtomicBool>,
    pub last_sync: Arc<RwLock<Option<SyncSummary>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            start_time: SystemTime::now(),
            bot_username: Arc::default(),
            built: Arc::default(),
            last_sync: Arc::default(),
        }
    }

    pub async fn set_bot_username(&self, username: String) {
        *self.bot_username.write().await = Some(username);
    }

    pub fn set_built(&self, built: bool) {
        self.built.store(built, Ordering::Relaxed);
    }

    pub async fn record_sync(&self, summary: SyncSummary) {
        *self.last_sync.write().await = Some(summary);
    }

    pub async fn snapshot(&self) -> HealthStatus {
        let built = self.built.load(Ordering::Relaxed);
        HealthStatus {
            status: if built { "ok" } else { "starting" }.to_string(),
            bot_username: self.bot_username.read().await.clone(),
            uptime_secs: self.start_time.elapsed().unwrap_or_default().as_secs(),
            built,
            last_sync: self.last_sync.read().await.clone(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    (StatusCode::OK, Json(state.snapshot().await))
}

async fn live_handler() -> StatusCode {
    StatusCode::OK
}

/// Create the health check router
pub fn create_health_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/live", get(live_handler))
        .with_state(state)
}

/// Start the health check server
pub async fn start_health_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_health_router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Health check server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_starting_until_built() {
        let status = AppState::new().snapshot().await;
        assert_eq!(status.status, "starting");
        assert!(!status.built);
        assert!(status.bot_username.is_none());
        assert!(status.last_sync.is_none());
    }

    #[tokio::test]
    async fn test_health_reports_build_and_sync() {
        let state = AppState::new();
        state.set_bot_username("helper".to_string()).await;
        state.set_built(true);
        state
            .record_sync(SyncSummary {
                scopes_synced: 2,
                scopes_failed: 1,
                guilds_unavailable: vec![9],
            })
            .await;

        let (code, Json(status)) = health_handler(State(state)).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(status.status, "ok");
        assert_eq!(status.bot_username.as_deref(), Some("helper"));
        let sync = status.last_sync.unwrap();
        assert_eq!(sync.scopes_failed, 1);
        assert_eq!(sync.guilds_unavailable, vec![9]);
    }

    #[tokio::test]
    async fn test_body_shape() {
        let state = AppState::new();
        state.record_sync(SyncSummary::default()).await;
        let json = serde_json::to_value(state.snapshot().await).unwrap();
        assert_eq!(json["built"], false);
        assert_eq!(json["last_sync"]["scopes_synced"], 0);
        assert!(json["bot_username"].is_null());
    }

    #[tokio::test]
    async fn test_live_is_ok() {
        assert_eq!(live_handler().await, StatusCode::OK);
    }
}
