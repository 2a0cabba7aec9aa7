use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eine Zeile der Landing-Datei: erwartete Zeilenzahl pro Business Unit, Objekt und Tag
#[derive(Debug, Clone, PartialEq)]
pub struct InputRow {
    pub row_id: String,
    pub mid: Option<String>,
    pub business_unit: String,
    pub object_type: String,
    pub event_date: NaiveDate,
    pub expected_count: u64,
}

/// Athena Datenbank und Tabelle für eine Zeile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTarget {
    pub database: String,
    pub table: String,
}

impl TableTarget {
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }
}

/// Zeile mit aufgelöstem Ziel, bereit zur Verifikation
#[derive(Debug, Clone)]
pub struct PlannedRow {
    pub input: InputRow,
    /// Kanonischer Objekttyp aus der Lookup-Tabelle
    pub object_type: String,
    pub target: TableTarget,
}

/// Status einer asynchronen Athena-Abfrage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl QueryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueryState::Succeeded | QueryState::Failed | QueryState::Cancelled
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            QueryState::Queued => "QUEUED",
            QueryState::Running => "RUNNING",
            QueryState::Succeeded => "SUCCEEDED",
            QueryState::Failed => "FAILED",
            QueryState::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Observed(u64),
    Failed(String),
}

/// Ergebnis der Gegenprüfung einer Zeile
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationResult {
    pub row_id: String,
    pub state: QueryState,
    pub outcome: VerificationOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStatus {
    Match,
    NoMatch,
    Error,
}

impl RowStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RowStatus::Match => "Match",
            RowStatus::NoMatch => "NoMatch",
            RowStatus::Error => "Error",
        }
    }
}

/// Eine Report-Zeile, genau eine pro verifizierter InputRow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeRow {
    pub row_id: String,
    pub mid: Option<String>,
    pub event_date: NaiveDate,
    pub business_unit: String,
    pub object_type: String,
    pub target: String,
    pub expected_count: u64,
    pub observed_count: Option<u64>,
    pub difference: i64,
    pub percent_deviation: Option<f64>,
    pub status: RowStatus,
    pub error_description: Option<String>,
}

/// Zeile, deren Abweichung den Schwellwert überschreitet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MismatchRecord {
    pub row_id: String,
    pub mid: Option<String>,
    pub business_unit: String,
    pub object_type: String,
    pub database: String,
    pub table: String,
    pub event_date: NaiveDate,
    pub expected_count: u64,
    pub observed_count: u64,
    pub percent_deviation: f64,
}

/// Ausgang der SNS-Benachrichtigung
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationOutcome {
    NotRequired,
    Sent,
    Failed,
}

/// Zusammenfassung eines Laufs, wird geloggt und von der API zurückgegeben
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub landing: String,
    pub report: String,
    pub archived_to: Option<String>,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub matched: usize,
    pub mismatched: usize,
    pub errored: usize,
    pub flagged: usize,
    pub notification: NotificationOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!QueryState::Queued.is_terminal());
        assert!(!QueryState::Running.is_terminal());
        assert!(QueryState::Succeeded.is_terminal());
        assert!(QueryState::Failed.is_terminal());
        assert!(QueryState::Cancelled.is_terminal());
    }

    #[test]
    fn test_qualified_table_name() {
        let target = TableTarget {
            database: "sfmc".to_string(),
            table: "bronze_acme_send_delta".to_string(),
        };
        assert_eq!(target.qualified(), "sfmc.bronze_acme_send_delta");
    }
}
