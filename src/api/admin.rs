use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::utils::Metrics;

/// Liveness des Reconciliation-Dienstes
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// Bereit, sobald die AWS Clients stehen (der Router existiert erst danach).
/// Liefert zusätzlich die bisherigen Läufe dieses Prozesses.
pub async fn ready(State(metrics): State<Arc<Metrics>>) -> (StatusCode, Json<serde_json::Value>) {
    let runs = |outcome: &str| metrics.runs.with_label_values(&[outcome]).get();
    (
        StatusCode::OK,
        Json(json!({
            "ready": true,
            "version": env!("CARGO_PKG_VERSION"),
            "runs": {
                "succeeded": runs("succeeded"),
                "failed": runs("failed"),
            },
        })),
    )
}

/// Prometheus Metrics im Text-Format
pub async fn metrics(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics.render(),
    )
}

/// Router für Admin/Health Endpoints
pub fn admin_router(state: Arc<Metrics>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_names_service() {
        let (status, Json(body)) = health().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "sfmc-recon");
    }

    #[tokio::test]
    async fn test_ready_reports_run_counts() {
        let metrics = Arc::new(Metrics::new());
        metrics.runs.with_label_values(&["succeeded"]).inc();
        metrics.runs.with_label_values(&["failed"]).inc_by(2);

        let (status, Json(body)) = ready(State(metrics)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ready"], true);
        assert_eq!(body["runs"]["succeeded"], 1);
        assert_eq!(body["runs"]["failed"], 2);
    }
}
