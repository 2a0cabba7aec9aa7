use crate::recon::models::{
    MismatchRecord, OutcomeRow, PlannedRow, RowStatus, VerificationOutcome, VerificationResult,
};

pub const DEFAULT_THRESHOLD: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    /// observed − expected
    pub difference: i64,
    /// `None` wenn expected == 0
    pub percent_deviation: Option<f64>,
    pub status: RowStatus,
}

/// Vergleiche erwartete und beobachtete Zeilenzahl
///
/// Gerechnet wird in i128, die Differenz wird für den Report auf den i64-Bereich begrenzt.
pub fn compare(expected: u64, observed: u64) -> Comparison {
    let exact = i128::from(observed) - i128::from(expected);
    let difference = i64::try_from(exact).unwrap_or(if exact < 0 { i64::MIN } else { i64::MAX });
    let percent_deviation = if expected == 0 {
        None
    } else {
        Some(exact as f64 * 100.0 / expected as f64)
    };
    let status = if exact == 0 {
        RowStatus::Match
    } else {
        RowStatus::NoMatch
    };

    Comparison {
        difference,
        percent_deviation,
        status,
    }
}

pub fn exceeds_threshold(row: &OutcomeRow, threshold: f64) -> bool {
    row.status != RowStatus::Error
        && row
            .percent_deviation
            .map(|pct| pct.abs() > threshold)
            .unwrap_or(false)
}

/// Kombiniere geplante Zeile und Verifikationsergebnis zur Report-Zeile
pub fn build_outcome(planned: &PlannedRow, result: &VerificationResult) -> OutcomeRow {
    let input = &planned.input;
    let base = OutcomeRow {
        row_id: input.row_id.clone(),
        mid: input.mid.clone(),
        event_date: input.event_date,
        business_unit: input.business_unit.clone(),
        object_type: planned.object_type.clone(),
        target: planned.target.qualified(),
        expected_count: input.expected_count,
        observed_count: None,
        difference: 0,
        percent_deviation: None,
        status: RowStatus::Error,
        error_description: None,
    };

    match &result.outcome {
        VerificationOutcome::Observed(observed) => {
            let comparison = compare(input.expected_count, *observed);
            OutcomeRow {
                observed_count: Some(*observed),
                difference: comparison.difference,
                percent_deviation: comparison.percent_deviation,
                status: comparison.status,
                ..base
            }
        }
        VerificationOutcome::Failed(reason) => OutcomeRow {
            error_description: Some(reason.clone()),
            ..base
        },
    }
}

/// Sammle alle Zeilen über dem Schwellwert
pub fn collect_mismatches(
    planned: &[PlannedRow],
    outcomes: &[OutcomeRow],
    threshold: f64,
) -> Vec<MismatchRecord> {
    planned
        .iter()
        .zip(outcomes)
        .filter(|(_, outcome)| exceeds_threshold(outcome, threshold))
        .filter_map(|(plan, outcome)| {
            Some(MismatchRecord {
                row_id: outcome.row_id.clone(),
                mid: outcome.mid.clone(),
                business_unit: outcome.business_unit.clone(),
                object_type: outcome.object_type.clone(),
                database: plan.target.database.clone(),
                table: plan.target.table.clone(),
                event_date: outcome.event_date,
                expected_count: outcome.expected_count,
                observed_count: outcome.observed_count?,
                percent_deviation: outcome.percent_deviation?,
            })
        })
        .collect()
}
