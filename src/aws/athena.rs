use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_athena::types::{QueryExecutionContext, QueryExecutionState, ResultConfiguration};
use aws_sdk_athena::Client;

use crate::aws::sdk_error;
use crate::recon::models::QueryState;

/// Status einer Abfrage inklusive Athena `StateChangeReason`
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStatus {
    pub state: QueryState,
    pub reason: Option<String>,
}

/// Asynchrone SQL-Abfragen gegen den Tabellenspeicher
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Starte Abfrage, liefert die Execution-ID
    async fn start_query(&self, sql: &str, database: &str, output_location: &str) -> Result<String>;

    async fn query_status(&self, execution_id: &str) -> Result<QueryStatus>;

    /// Ergebniszeilen, erste Zeile ist der Header
    async fn query_results(&self, execution_id: &str) -> Result<Vec<Vec<Option<String>>>>;
}

pub struct AthenaEngine {
    client: Client,
}

impl AthenaEngine {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl QueryEngine for AthenaEngine {
    async fn start_query(&self, sql: &str, database: &str, output_location: &str) -> Result<String> {
        let output = self
            .client
            .start_query_execution()
            .query_string(sql)
            .query_execution_context(QueryExecutionContext::builder().database(database).build())
            .result_configuration(
                ResultConfiguration::builder()
                    .output_location(output_location)
                    .build(),
            )
            .send()
            .await
            .map_err(sdk_error)?;

        output
            .query_execution_id()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Athena returned no QueryExecutionId"))
    }

    async fn query_status(&self, execution_id: &str) -> Result<QueryStatus> {
        let output = self
            .client
            .get_query_execution()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(sdk_error)?;

        let status = output.query_execution().and_then(|q| q.status());

        let state = match status.and_then(|s| s.state()) {
            Some(QueryExecutionState::Queued) => QueryState::Queued,
            Some(QueryExecutionState::Running) => QueryState::Running,
            Some(QueryExecutionState::Succeeded) => QueryState::Succeeded,
            Some(QueryExecutionState::Failed) => QueryState::Failed,
            Some(QueryExecutionState::Cancelled) => QueryState::Cancelled,
            Some(other) => bail!("Unknown Athena query state: {}", other.as_str()),
            None => QueryState::Queued,
        };

        Ok(QueryStatus {
            state,
            reason: status
                .and_then(|s| s.state_change_reason())
                .map(str::to_string),
        })
    }

    async fn query_results(&self, execution_id: &str) -> Result<Vec<Vec<Option<String>>>> {
        let output = self
            .client
            .get_query_results()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(sdk_error)?;

        let rows = output
            .result_set()
            .map(|rs| rs.rows())
            .unwrap_or_default()
            .iter()
            .map(|row| {
                row.data()
                    .iter()
                    .map(|datum| datum.var_char_value().map(str::to_string))
                    .collect()
            })
            .collect();

        Ok(rows)
    }
}
