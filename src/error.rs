use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Fehler-Taxonomie eines Reconciliation-Laufs
///
/// Nur `Config`, `InvalidRequest`, `Fetch`, `Decode` und `Report` brechen einen Lauf ab.
/// Alle anderen Varianten werden geloggt und führen zu einem Teilreport.
#[derive(Error, Debug)]
pub enum ReconError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Could not fetch {location}: {message}")]
    Fetch { location: String, message: String },

    #[error("Could not decode input as {encoding}: {message}")]
    Decode { encoding: String, message: String },

    #[error("Row {row_id} skipped: {message}")]
    RowParse { row_id: String, message: String },

    #[error("Row {row_id} skipped: object type '{object_type}' not recognized")]
    CategoryLookup { row_id: String, object_type: String },

    #[error("Athena query failed: {reason}")]
    Query { reason: String },

    #[error("Could not write report to {location}: {message}")]
    Report { location: String, message: String },

    #[error("Could not publish notification: {0}")]
    Notification(String),

    #[error("Could not move {from} to {to}: {message}")]
    Archive {
        from: String,
        to: String,
        message: String,
    },
}

impl ReconError {
    /// Kurzer, stabiler Name der Fehlerart (für JSON-Antworten und Metrik-Labels)
    pub fn kind(&self) -> &'static str {
        match self {
            ReconError::Config(_) => "config",
            ReconError::InvalidRequest(_) => "invalid_request",
            ReconError::Fetch { .. } => "fetch",
            ReconError::Decode { .. } => "decode",
            ReconError::RowParse { .. } => "row_parse",
            ReconError::CategoryLookup { .. } => "category_lookup",
            ReconError::Query { .. } => "query",
            ReconError::Report { .. } => "report",
            ReconError::Notification(_) => "notification",
            ReconError::Archive { .. } => "archive",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReconError::Config(_)
                | ReconError::InvalidRequest(_)
                | ReconError::Fetch { .. }
                | ReconError::Decode { .. }
                | ReconError::Report { .. }
        )
    }

    /// Einzige Stelle, an der Fehler auf HTTP-Status abgebildet werden
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReconError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ReconError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ReconError::Decode { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ReconError::Fetch { .. }
            | ReconError::Query { .. }
            | ReconError::Report { .. }
            | ReconError::Notification(_)
            | ReconError::Archive { .. } => StatusCode::BAD_GATEWAY,
            ReconError::RowParse { .. } | ReconError::CategoryLookup { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        }
    }
}

impl IntoResponse for ReconError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

impl From<config::ConfigError> for ReconError {
    fn from(err: config::ConfigError) -> Self {
        ReconError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReconError>;
