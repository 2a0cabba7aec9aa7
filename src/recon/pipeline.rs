use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::aws::{AwsClients, Notifier, ObjectStore, S3Location};
use crate::error::{ReconError, Result};
use crate::recon::compare::{build_outcome, collect_mismatches};
use crate::recon::encoding::TextEncoding;
use crate::recon::input::{check_header, parse_input};
use crate::recon::models::{
    MismatchRecord, NotificationOutcome, OutcomeRow, PlannedRow, RowStatus, RunSummary,
};
use crate::recon::naming::TableNaming;
use crate::recon::report::{notification_message, render_report, NOTIFICATION_SUBJECT};
use crate::recon::verify::Verifier;
use crate::utils::{Config, Metrics};

/// Phasen eines Laufs, nur für Logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Fetching,
    Parsing,
    Verifying,
    Reporting,
    Notifying,
    Archiving,
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Orchestriert einen kompletten Reconciliation-Lauf
pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    notifier: Arc<dyn Notifier>,
    verifier: Verifier,
    naming: TableNaming,
    report: S3Location,
    sns_topic_arn: String,
    threshold: f64,
    input_encoding: TextEncoding,
    report_encoding: TextEncoding,
    aliases: HashMap<String, String>,
    max_concurrent_queries: usize,
    metrics: Arc<Metrics>,
}

impl Reconciler {
    pub fn new(config: &Config, clients: AwsClients, metrics: Arc<Metrics>) -> Result<Self> {
        let verifier = Verifier::new(
            clients.engine,
            &config.athena_output_bucket,
            config.athena_date_column.clone(),
            config.poll_interval(),
            metrics.clone(),
        );

        Ok(Self {
            store: clients.store,
            notifier: clients.notifier,
            verifier,
            naming: config.table_naming()?,
            report: config.report_location()?,
            sns_topic_arn: config.sns_topic_arn.clone(),
            threshold: config.threshold,
            input_encoding: config.input_encoding,
            report_encoding: config.report_encoding,
            aliases: config
                .business_unit_aliases
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone()))
                .collect(),
            max_concurrent_queries: config.max_concurrent_queries.max(1),
            metrics,
        })
    }

    /// Führe einen Lauf für die Landing-Datei aus
    ///
    /// Fatal sind nur Fetch-, Decode- und Report-Fehler. Alles andere landet im Report
    /// oder wird geloggt.
    #[tracing::instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, landing: &S3Location) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let started_at = Utc::now();

        let result = self.execute(run_id, landing, started_at).await;
        match &result {
            Ok(summary) => {
                self.metrics.runs.with_label_values(&["succeeded"]).inc();
                tracing::info!(
                    rows_read = summary.rows_read,
                    rows_skipped = summary.rows_skipped,
                    matched = summary.matched,
                    mismatched = summary.mismatched,
                    errored = summary.errored,
                    flagged = summary.flagged,
                    "Reconciliation finished"
                );
            }
            Err(e) => {
                self.metrics.runs.with_label_values(&["failed"]).inc();
                tracing::error!(error = %e, kind = e.kind(), fatal = e.is_fatal(), "Reconciliation aborted");
            }
        }
        result
    }

    async fn execute(
        &self,
        run_id: Uuid,
        landing: &S3Location,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<RunSummary> {
        stage(RunStage::Fetching);
        let bytes = self
            .store
            .get_object(landing)
            .await
            .map_err(|e| ReconError::Fetch {
                location: landing.to_string(),
                message: e.to_string(),
            })?;

        stage(RunStage::Parsing);
        let text = self.input_encoding.decode(&bytes)?;
        check_header(&text).map_err(|message| ReconError::Decode {
            encoding: self.input_encoding.to_string(),
            message,
        })?;
        tracing::info!(location = %landing, encoding = %self.input_encoding, "CSV file downloaded and decoded");

        let parsed = parse_input(&text, &self.aliases);
        let rows_read = parsed.rows.len() + parsed.skipped.len();
        let mut rows_skipped = parsed.skipped.len();
        for err in &parsed.skipped {
            self.metrics.rows_skipped.with_label_values(&[err.kind()]).inc();
        }

        let mut planned = Vec::with_capacity(parsed.rows.len());
        for row in &parsed.rows {
            match self.naming.resolve(row) {
                Ok(plan) => planned.push(plan),
                Err(e) => {
                    rows_skipped += 1;
                    self.metrics.rows_skipped.with_label_values(&[e.kind()]).inc();
                }
            }
        }

        stage(RunStage::Verifying);
        let outcomes = self.verify_all(&planned).await;
        let mismatches = collect_mismatches(&planned, &outcomes, self.threshold);

        stage(RunStage::Reporting);
        self.upload_report(&outcomes).await?;

        stage(RunStage::Notifying);
        let notification = self.notify(&mismatches).await;

        stage(RunStage::Archiving);
        let archived_to = self.archive(landing).await.ok();

        stage(RunStage::Done);
        let count = |status: RowStatus| outcomes.iter().filter(|o| o.status == status).count();

        Ok(RunSummary {
            run_id,
            landing: landing.to_string(),
            report: self.report.to_string(),
            archived_to: archived_to.map(|loc| loc.to_string()),
            rows_read,
            rows_skipped,
            matched: count(RowStatus::Match),
            mismatched: count(RowStatus::NoMatch),
            errored: count(RowStatus::Error),
            flagged: mismatches.len(),
            notification,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Verifiziere alle Zeilen, Reihenfolge bleibt erhalten
    async fn verify_all(&self, planned: &[PlannedRow]) -> Vec<OutcomeRow> {
        // Eigene Kopien je Zeile, sonst ist der Future nicht für jede Lebensdauer Send
        let outcomes: Vec<OutcomeRow> = stream::iter(planned.iter().cloned())
            .map(|plan| async move {
                let result = self.verifier.verify(&plan).await;
                build_outcome(&plan, &result)
            })
            .buffered(self.max_concurrent_queries)
            .collect()
            .await;

        for outcome in &outcomes {
            self.metrics
                .rows
                .with_label_values(&[outcome.status.as_str()])
                .inc();
        }

        outcomes
    }

    async fn upload_report(&self, outcomes: &[OutcomeRow]) -> Result<()> {
        let to_report_error = |message: String| ReconError::Report {
            location: self.report.to_string(),
            message,
        };

        let csv = render_report(outcomes).map_err(|e| to_report_error(e.to_string()))?;
        let body = self
            .report_encoding
            .encode(&csv)
            .map_err(|e| to_report_error(e.to_string()))?;

        tracing::info!(location = %self.report, rows = outcomes.len(), "Uploading reconciliation report");
        self.store
            .put_object(&self.report, body)
            .await
            .map_err(|e| to_report_error(e.to_string()))?;
        tracing::info!("Reconciliation report uploaded successfully");

        Ok(())
    }

    async fn notify(&self, mismatches: &[MismatchRecord]) -> NotificationOutcome {
        if mismatches.is_empty() {
            tracing::info!("No mismatches found above threshold. No SNS notification sent.");
            return NotificationOutcome::NotRequired;
        }

        tracing::warn!(
            count = mismatches.len(),
            threshold = self.threshold,
            "Mismatches found above threshold. Preparing SNS notification..."
        );
        let message = notification_message(mismatches);

        match self
            .notifier
            .publish(&self.sns_topic_arn, NOTIFICATION_SUBJECT, &message)
            .await
        {
            Ok(()) => {
                self.metrics.notifications.with_label_values(&["sent"]).inc();
                tracing::info!(topic = %self.sns_topic_arn, "SNS notification sent successfully");
                NotificationOutcome::Sent
            }
            Err(e) => {
                let err = ReconError::Notification(e.to_string());
                self.metrics.notifications.with_label_values(&["failed"]).inc();
                tracing::error!(topic = %self.sns_topic_arn, error = %err, "Failed to publish SNS notification");
                NotificationOutcome::Failed
            }
        }
    }

    /// Verschiebe die Landing-Datei nach `processed/`, Fehler werden nur geloggt
    async fn archive(&self, landing: &S3Location) -> Result<S3Location> {
        let destination = landing.processed();
        let to_archive_error = |message: String| ReconError::Archive {
            from: landing.to_string(),
            to: destination.to_string(),
            message,
        };

        let moved = async {
            self.store.copy_object(landing, &destination).await?;
            self.store.delete_object(landing).await
        }
        .await;

        match moved {
            Ok(()) => {
                tracing::info!(from = %landing, to = %destination, "Moved landing file to processed folder");
                Ok(destination.clone())
            }
            Err(e) => {
                let err = to_archive_error(e.to_string());
                tracing::error!(error = %err, "Could not move file to processed directory");
                Err(err)
            }
        }
    }
}

fn stage(stage: RunStage) {
    tracing::debug!(stage = %stage, "Entering stage");
}
