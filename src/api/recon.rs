use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use std::sync::Arc;

use crate::aws::S3Location;
use crate::error::ReconError;
use crate::recon::{Reconciler, RunSummary};

pub struct ReconState {
    pub reconciler: Reconciler,
    /// Fallback wenn der Request keine Landing-Datei nennt
    pub default_landing: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub landing_s3_uri: Option<String>,
}

/// POST /api/recon/run - Starte einen Reconciliation-Lauf
pub async fn run_reconciliation(
    State(state): State<Arc<ReconState>>,
    payload: Option<Json<RunRequest>>,
) -> Result<Json<RunSummary>, ReconError> {
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    let uri = request
        .landing_s3_uri
        .or_else(|| state.default_landing.clone())
        .ok_or_else(|| ReconError::InvalidRequest("landing_s3_uri is required".to_string()))?;

    let landing = S3Location::parse(&uri)?;
    tracing::info!(landing = %landing, "Reconciliation requested");

    let summary = state.reconciler.run(&landing).await?;
    Ok(Json(summary))
}

/// Router für Reconciliation Endpoints
pub fn recon_router(state: Arc<ReconState>) -> Router {
    Router::new()
        .route("/run", post(run_reconciliation))
        .with_state(state)
}
