//! HTTP request handlers.

use super::AppState;
use crate::metrics::{AlertReport, AlertState, WindowReport};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Window used when a snapshot request names none.
const DEFAULT_WINDOW: &str = "10m";

/// API error types.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("unknown target: {0}")]
    UnknownTarget(String),
    #[error("unknown window: {0} (expected one of {1})")]
    UnknownWindow(String, String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::NOT_FOUND, self.to_string()).into_response()
    }
}

pub async fn handle_health() -> &'static str {
    "ok"
}

// ============================================================================
// API: Targets
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TargetSummary {
    pub id: String,
    pub state: Option<AlertState>,
    pub availability: Option<f64>,
}

pub async fn handle_get_targets(State(state): State<AppState>) -> Json<Vec<TargetSummary>> {
    let summaries = state
        .store
        .target_ids()
        .into_iter()
        .map(|id| {
            let alert = state.store.alert_state(&id);
            TargetSummary {
                state: alert.as_ref().map(|a| a.state),
                availability: alert.map(|a| a.availability),
                id,
            }
        })
        .collect();
    Json(summaries)
}

// ============================================================================
// API: Snapshots & alerts
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    pub target: String,
    pub window: Option<String>,
}

pub async fn handle_get_snapshot(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> Result<Json<WindowReport>, ApiError> {
    let window = query.window.as_deref().unwrap_or(DEFAULT_WINDOW);
    if !state.store.has_window(window) {
        let known = state.store.window_names().collect::<Vec<_>>().join(", ");
        return Err(ApiError::UnknownWindow(window.to_string(), known));
    }

    state
        .store
        .snapshot(&query.target, window)
        .map(Json)
        .ok_or(ApiError::UnknownTarget(query.target))
}

#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    pub target: String,
}

pub async fn handle_get_alert(
    State(state): State<AppState>,
    Query(query): Query<AlertQuery>,
) -> Result<Json<AlertReport>, ApiError> {
    state
        .store
        .alert_state(&query.target)
        .map(Json)
        .ok_or(ApiError::UnknownTarget(query.target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{ProbeOutcome, ProbeStatus, StatsStore, Target};
    use std::sync::Arc;
    use std::time::Duration;

    fn state_with_site() -> AppState {
        let store = Arc::new(StatsStore::default());
        let site = Target::new("https://example.com", Duration::from_secs(10));
        for code in [200, 200, 200, 500] {
            store
                .record(&site, ProbeOutcome::new(Duration::from_millis(40), ProbeStatus::Code(code)))
                .unwrap();
        }
        AppState { store }
    }

    fn snapshot_query(target: &str, window: Option<&str>) -> Query<SnapshotQuery> {
        Query(SnapshotQuery {
            target: target.to_string(),
            window: window.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_get_targets() {
        let Json(targets) = handle_get_targets(State(state_with_site())).await;
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].id, "https://example.com");
        // 3/4 is below the default 0.8 threshold.
        assert_eq!(targets[0].state, Some(AlertState::Unavailable));
        assert_eq!(targets[0].availability, Some(0.75));
    }

    #[tokio::test]
    async fn test_get_snapshot() {
        let state = state_with_site();

        let Json(report) = handle_get_snapshot(State(state.clone()), snapshot_query("https://example.com", None))
            .await
            .unwrap();
        assert_eq!(report.total, 4);
        assert_eq!(report.availability, Some(75.0));

        let Json(report) =
            handle_get_snapshot(State(state.clone()), snapshot_query("https://example.com", Some("2m")))
                .await
                .unwrap();
        assert_eq!(report.successful, 3);
    }

    #[tokio::test]
    async fn test_snapshot_errors() {
        let state = state_with_site();

        let err = handle_get_snapshot(State(state.clone()), snapshot_query("https://example.com", Some("5m")))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UnknownWindow(..)));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

        let err = handle_get_snapshot(State(state), snapshot_query("https://missing.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UnknownTarget(_)));
    }

    #[tokio::test]
    async fn test_get_alert() {
        let state = state_with_site();
        let query = |target: &str| {
            Query(AlertQuery {
                target: target.to_string(),
            })
        };

        let Json(alert) = handle_get_alert(State(state.clone()), query("https://example.com"))
            .await
            .unwrap();
        assert_eq!(alert.state, AlertState::Unavailable);
        assert_eq!(alert.unavailable_since.len(), 1);
        assert_eq!(alert.available_since.len(), 1);

        assert!(handle_get_alert(State(state), query("https://missing.com")).await.is_err());
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(handle_health().await, "ok");
    }
}
