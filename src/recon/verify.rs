use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

use crate::aws::QueryEngine;
use crate::error::{ReconError, Result};
use crate::recon::models::{
    PlannedRow, QueryState, TableTarget, VerificationOutcome, VerificationResult,
};
use crate::utils::Metrics;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

const NO_REASON: &str = "No reason provided by Athena.";

/// Zählabfrage für genau einen Tag
pub fn count_query_sql(target: &TableTarget, date_column: &str, event_date: NaiveDate) -> String {
    format!(
        "SELECT COUNT(*) AS total FROM {} WHERE CAST({} AS DATE) = DATE '{}'",
        target.qualified(),
        date_column,
        event_date.format("%Y-%m-%d")
    )
}

/// Gegenprüfung der erwarteten Zeilenzahlen gegen Athena
pub struct Verifier {
    engine: Arc<dyn QueryEngine>,
    output_location: String,
    date_column: String,
    poll_interval: Duration,
    metrics: Arc<Metrics>,
}

impl Verifier {
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        output_bucket: &str,
        date_column: impl Into<String>,
        poll_interval: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            engine,
            output_location: format!("s3://{}/", output_bucket.trim_end_matches('/')),
            date_column: date_column.into(),
            poll_interval,
            metrics,
        }
    }

    /// Verifiziere eine Zeile, Fehler werden zum Ergebnis und nicht weitergereicht
    pub async fn verify(&self, planned: &PlannedRow) -> VerificationResult {
        let timer = self.metrics.query_duration.start_timer();
        let (state, result) = self
            .execute(&planned.target, planned.input.event_date)
            .await;
        timer.observe_duration();

        let outcome = match result {
            Ok(count) => VerificationOutcome::Observed(count),
            Err(e) => {
                tracing::error!(
                    row_id = %planned.input.row_id,
                    mid = planned.input.mid.as_deref().unwrap_or("-"),
                    business_unit = %planned.input.business_unit,
                    object_type = %planned.object_type,
                    table = %planned.target.qualified(),
                    state = state.as_str(),
                    error = %e,
                    "Athena query failed"
                );
                VerificationOutcome::Failed(e.to_string())
            }
        };

        VerificationResult {
            row_id: planned.input.row_id.clone(),
            state,
            outcome,
        }
    }

    async fn execute(&self, target: &TableTarget, event_date: NaiveDate) -> (QueryState, Result<u64>) {
        let sql = count_query_sql(target, &self.date_column, event_date);
        tracing::info!(query = %sql, table = %target.qualified(), "Starting Athena query");

        let execution_id = match self
            .engine
            .start_query(&sql, &target.database, &self.output_location)
            .await
        {
            Ok(id) => id,
            Err(e) => return (QueryState::Failed, Err(query_error(e.to_string()))),
        };

        // Kein Timeout: es wird gepollt bis Athena einen Endzustand meldet
        let status = loop {
            match self.engine.query_status(&execution_id).await {
                Ok(status) if status.state.is_terminal() => break status,
                Ok(_) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => return (QueryState::Failed, Err(query_error(e.to_string()))),
            }
        };

        if status.state != QueryState::Succeeded {
            let reason = status.reason.unwrap_or_else(|| NO_REASON.to_string());
            return (status.state, Err(query_error(reason)));
        }

        tracing::info!(
            execution_id = %execution_id,
            table = %target.qualified(),
            "Athena query succeeded. Fetching results..."
        );

        let result = match self.engine.query_results(&execution_id).await {
            Ok(rows) => extract_count(&rows),
            Err(e) => Err(query_error(e.to_string())),
        };

        (QueryState::Succeeded, result)
    }
}

/// Zweite Zeile, erste Spalte (die erste Zeile ist der Header)
fn extract_count(rows: &[Vec<Option<String>>]) -> Result<u64> {
    let cell = rows
        .get(1)
        .and_then(|row| row.first())
        .and_then(|cell| cell.as_deref())
        .ok_or_else(|| query_error("query returned no count row".to_string()))?;

    cell.trim()
        .parse::<u64>()
        .map_err(|_| query_error(format!("count '{}' is not an integer", cell)))
}

fn query_error(reason: String) -> ReconError {
    ReconError::Query { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::athena::MockQueryEngine;
    use crate::aws::QueryStatus;
    use crate::recon::models::InputRow;
    use mockall::Sequence;

    fn target() -> TableTarget {
        TableTarget {
            database: "sfmc".to_string(),
            table: "bronze_acme_send_delta".to_string(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn planned() -> PlannedRow {
        PlannedRow {
            input: InputRow {
                row_id: "1".to_string(),
                mid: None,
                business_unit: "Acme".to_string(),
                object_type: "Send".to_string(),
                event_date: date(),
                expected_count: 1000,
            },
            object_type: "Send".to_string(),
            target: target(),
        }
    }

    fn status(state: QueryState, reason: Option<&str>) -> QueryStatus {
        QueryStatus {
            state,
            reason: reason.map(str::to_string),
        }
    }

    fn verifier(engine: MockQueryEngine) -> Verifier {
        Verifier::new(
            Arc::new(engine),
            "athena-results/",
            "event_date",
            Duration::ZERO,
            Arc::new(Metrics::new()),
        )
    }

    #[test]
    fn test_count_query_sql() {
        assert_eq!(
            count_query_sql(&target(), "event_date", date()),
            "SELECT COUNT(*) AS total FROM sfmc.bronze_acme_send_delta WHERE CAST(event_date AS DATE) = DATE '2024-01-01'"
        );
    }

    #[tokio::test]
    async fn test_polls_until_succeeded() {
        let mut engine = MockQueryEngine::new();
        let mut seq = Sequence::new();

        engine
            .expect_start_query()
            .withf(|sql, database, output| {
                sql.contains("sfmc.bronze_acme_send_delta")
                    && database == "sfmc"
                    && output == "s3://athena-results/"
            })
            .times(1)
            .returning(|_, _, _| Ok("exec-1".to_string()));
        engine
            .expect_query_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(status(QueryState::Queued, None)));
        engine
            .expect_query_status()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(status(QueryState::Running, None)));
        engine
            .expect_query_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(status(QueryState::Succeeded, None)));
        engine
            .expect_query_results()
            .times(1)
            .returning(|_| {
                Ok(vec![
                    vec![Some("total".to_string())],
                    vec![Some("1050".to_string())],
                ])
            });

        let result = verifier(engine).verify(&planned()).await;
        assert_eq!(result.state, QueryState::Succeeded);
        assert_eq!(result.outcome, VerificationOutcome::Observed(1050));
    }

    #[tokio::test]
    async fn test_failed_query_carries_reason() {
        let mut engine = MockQueryEngine::new();
        engine
            .expect_start_query()
            .returning(|_, _, _| Ok("exec-2".to_string()));
        engine.expect_query_status().returning(|_| {
            Ok(status(
                QueryState::Failed,
                Some("TABLE_NOT_FOUND: Table sfmc.bronze_acme_send_delta does not exist"),
            ))
        });
        engine.expect_query_results().never();

        let result = verifier(engine).verify(&planned()).await;
        assert_eq!(result.state, QueryState::Failed);
        match result.outcome {
            VerificationOutcome::Failed(reason) => assert!(reason.contains("TABLE_NOT_FOUND")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_query_without_reason() {
        let mut engine = MockQueryEngine::new();
        engine
            .expect_start_query()
            .returning(|_, _, _| Ok("exec-3".to_string()));
        engine
            .expect_query_status()
            .returning(|_| Ok(status(QueryState::Cancelled, None)));

        let result = verifier(engine).verify(&planned()).await;
        assert_eq!(result.state, QueryState::Cancelled);
        assert_eq!(
            result.outcome,
            VerificationOutcome::Failed(format!("Athena query failed: {}", NO_REASON))
        );
    }

    #[tokio::test]
    async fn test_submission_error_is_query_error() {
        let mut engine = MockQueryEngine::new();
        engine
            .expect_start_query()
            .returning(|_, _, _| Err(anyhow::anyhow!("AccessDeniedException")));
        engine.expect_query_status().never();

        let result = verifier(engine).verify(&planned()).await;
        assert_eq!(result.state, QueryState::Failed);
        assert_eq!(
            result.outcome,
            VerificationOutcome::Failed("Athena query failed: AccessDeniedException".to_string())
        );
    }

    #[test]
    fn test_extract_count() {
        let rows = vec![vec![Some("total".to_string())], vec![Some(" 42 ".to_string())]];
        assert_eq!(extract_count(&rows).unwrap(), 42);

        assert!(extract_count(&rows[..1]).is_err());
        assert!(extract_count(&[vec![], vec![None]]).is_err());
        assert!(extract_count(&[vec![], vec![Some("n/a".to_string())]]).is_err());
    }
}
