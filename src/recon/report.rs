use serde::Serialize;

use crate::error::{ReconError, Result};
use crate::recon::models::{MismatchRecord, OutcomeRow};

pub const NOTIFICATION_SUBJECT: &str = "SFMC Reconciliation Mismatch";

pub const REPORT_COLUMNS: [&str; 9] = [
    "EventDate",
    "BusinessUnit",
    "ObjectType",
    "AthenaTable",
    "SFMCRowCount",
    "AthenaRowCount",
    "Difference",
    "Status",
    "ErrorDescription",
];

/// Eine CSV-Zeile des Reports, Reihenfolge entspricht `REPORT_COLUMNS`
#[derive(Debug, Serialize)]
struct ReportRecord<'a> {
    event_date: String,
    business_unit: &'a str,
    object_type: &'a str,
    athena_table: &'a str,
    sfmc_row_count: u64,
    athena_row_count: u64,
    difference: i64,
    status: &'a str,
    error_description: &'a str,
}

impl<'a> From<&'a OutcomeRow> for ReportRecord<'a> {
    fn from(row: &'a OutcomeRow) -> Self {
        Self {
            event_date: row.event_date.format("%Y-%m-%d").to_string(),
            business_unit: &row.business_unit,
            object_type: &row.object_type,
            athena_table: &row.target,
            sfmc_row_count: row.expected_count,
            athena_row_count: row.observed_count.unwrap_or(0),
            difference: row.difference,
            status: row.status.as_str(),
            error_description: row.error_description.as_deref().unwrap_or(""),
        }
    }
}

/// Serialisiere alle Report-Zeilen als CSV inklusive Kopfzeile
pub fn render_report(rows: &[OutcomeRow]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(REPORT_COLUMNS).map_err(report_error)?;
    for row in rows {
        writer.serialize(ReportRecord::from(row)).map_err(report_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| report_error(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ReconError::Report {
        location: "<memory>".to_string(),
        message: e.to_string(),
    })
}

fn report_error(err: impl std::fmt::Display) -> ReconError {
    ReconError::Report {
        location: "<memory>".to_string(),
        message: err.to_string(),
    }
}

/// Text der SNS-Nachricht, eine Zeile pro Abweichung
pub fn notification_message(mismatches: &[MismatchRecord]) -> String {
    let mut lines = Vec::with_capacity(mismatches.len() + 1);
    lines.push("MISMATCHES FOUND (above threshold):".to_string());

    for m in mismatches {
        lines.push(format!(
            "RowNumber={}, MID={}, BusinessUnit={}, ObjectType={}, DB={}, Table={}, EventDate={}, AthenaRowCount={}, SFMCRowCount={}, PercentDiff={:.2}%",
            m.row_id,
            m.mid.as_deref().unwrap_or("None"),
            m.business_unit,
            m.object_type,
            m.database,
            m.table,
            m.event_date.format("%Y-%m-%d"),
            m.observed_count,
            m.expected_count,
            m.percent_deviation,
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recon::models::RowStatus;
    use chrono::NaiveDate;

    fn outcome(status: RowStatus) -> OutcomeRow {
        OutcomeRow {
            row_id: "1".to_string(),
            mid: Some("100".to_string()),
            event_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            business_unit: "Acme".to_string(),
            object_type: "Send".to_string(),
            target: "sfmc.bronze_acme_send_delta".to_string(),
            expected_count: 1000,
            observed_count: Some(1050),
            difference: 50,
            percent_deviation: Some(5.0),
            status,
            error_description: None,
        }
    }

    #[test]
    fn test_report_has_fixed_header_and_rows() {
        let csv = render_report(&[outcome(RowStatus::NoMatch)]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "EventDate,BusinessUnit,ObjectType,AthenaTable,SFMCRowCount,AthenaRowCount,Difference,Status,ErrorDescription"
        );
        assert_eq!(
            lines[1],
            "2024-01-01,Acme,Send,sfmc.bronze_acme_send_delta,1000,1050,50,NoMatch,"
        );
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_empty_report_still_has_header() {
        let csv = render_report(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_error_row_reports_zero_counts_and_reason() {
        let mut row = outcome(RowStatus::Error);
        row.observed_count = None;
        row.difference = 0;
        row.percent_deviation = None;
        row.error_description = Some("Table not found, sfmc.x".to_string());

        let csv = render_report(&[row]).unwrap();
        let data = csv.lines().nth(1).unwrap();
        assert_eq!(
            data,
            "2024-01-01,Acme,Send,sfmc.bronze_acme_send_delta,1000,0,0,Error,\"Table not found, sfmc.x\""
        );
    }

    #[test]
    fn test_notification_message_format() {
        let mismatch = MismatchRecord {
            row_id: "3".to_string(),
            mid: None,
            business_unit: "Acme".to_string(),
            object_type: "ClickEvent".to_string(),
            database: "sfmc".to_string(),
            table: "bronze_acme_clickevent_delta".to_string(),
            event_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            expected_count: 300,
            observed_count: 200,
            percent_deviation: -100.0 / 3.0,
        };

        let message = notification_message(&[mismatch]);
        let lines: Vec<&str> = message.lines().collect();
        assert_eq!(lines[0], "MISMATCHES FOUND (above threshold):");
        assert_eq!(
            lines[1],
            "RowNumber=3, MID=None, BusinessUnit=Acme, ObjectType=ClickEvent, DB=sfmc, Table=bronze_acme_clickevent_delta, EventDate=2024-01-01, AthenaRowCount=200, SFMCRowCount=300, PercentDiff=-33.33%"
        );
    }
}
