use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::ReconError;
use crate::recon::models::InputRow;

/// Rohdatensatz wie er in der Landing-Datei steht
///
/// Die Aliase decken das ältere Exportformat (`Business Unit`, `Object`, `Date`, `Row Count`) ab.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "Number", default)]
    number: Option<String>,
    #[serde(rename = "MID", default)]
    mid: Option<String>,
    #[serde(rename = "BusinessUnit", alias = "Business Unit", default)]
    business_unit: Option<String>,
    #[serde(rename = "ObjectType", alias = "Object", default)]
    object_type: Option<String>,
    #[serde(rename = "EventDate", alias = "Date", default)]
    event_date: Option<String>,
    #[serde(rename = "RowCount", alias = "Row Count", default)]
    row_count: Option<String>,
}

/// Ergebnis des Parsens: gültige Zeilen plus übersprungene Zeilen mit Grund
#[derive(Debug, Default)]
pub struct ParsedInput {
    pub rows: Vec<InputRow>,
    pub skipped: Vec<ReconError>,
}

/// Pflichtspalten, jeweils mit dem Namen aus dem älteren Exportformat
const REQUIRED_COLUMNS: [(&str, &str); 4] = [
    ("BusinessUnit", "Business Unit"),
    ("ObjectType", "Object"),
    ("EventDate", "Date"),
    ("RowCount", "Row Count"),
];

/// Prüfe die Kopfzeile der dekodierten Datei
///
/// Falsch dekodierter Text ergibt keine erkennbaren Spalten. Der Fehlertext nennt die
/// fehlenden Spalten.
pub fn check_header(text: &str) -> Result<(), String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| format!("unreadable header row: {}", e))?;

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|(name, legacy)| !headers.iter().any(|h| h == *name || h == *legacy))
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "header row lacks required columns {}",
            missing.join(", ")
        ))
    }
}

/// Parse die dekodierte Landing-Datei
///
/// Fehlerhafte Datensätze brechen nichts ab, sie landen in `skipped`.
pub fn parse_input(text: &str, aliases: &HashMap<String, String>) -> ParsedInput {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut parsed = ParsedInput::default();

    for (index, result) in reader.deserialize::<RawRecord>().enumerate() {
        let fallback_id = (index + 1).to_string();

        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                let err = ReconError::RowParse {
                    row_id: fallback_id,
                    message: e.to_string(),
                };
                tracing::error!(error = %err, "Malformed record in landing file");
                parsed.skipped.push(err);
                continue;
            }
        };

        match to_input_row(raw, fallback_id, aliases) {
            Ok(row) => parsed.rows.push(row),
            Err(err) => {
                parsed.skipped.push(err);
            }
        }
    }

    parsed
}

fn to_input_row(
    raw: RawRecord,
    fallback_id: String,
    aliases: &HashMap<String, String>,
) -> Result<InputRow, ReconError> {
    let row_id = non_empty(raw.number).unwrap_or(fallback_id);
    let mid = non_empty(raw.mid);
    let business_unit = non_empty(raw.business_unit);
    let object_type = non_empty(raw.object_type);

    let skip = |message: String| {
        tracing::error!(
            row_id = %row_id,
            mid = mid.as_deref().unwrap_or("-"),
            business_unit = business_unit.as_deref().unwrap_or("-"),
            object_type = object_type.as_deref().unwrap_or("-"),
            "{}. Skipping.",
            message
        );
        ReconError::RowParse {
            row_id: row_id.clone(),
            message,
        }
    };

    let count_str = raw.row_count.unwrap_or_default();
    let expected_count = match count_str.parse::<u64>() {
        Ok(count) => count,
        Err(_) => return Err(skip(format!("Invalid RowCount '{}'", count_str))),
    };

    let event_date = match non_empty(raw.event_date) {
        Some(date) => match parse_event_date(&date) {
            Some(parsed) => parsed,
            None => return Err(skip(format!("Invalid EventDate '{}'", date))),
        },
        None => return Err(skip("No EventDate found".to_string())),
    };

    let business_unit = match &business_unit {
        Some(bu) => apply_alias(bu, aliases),
        None => return Err(skip("No BusinessUnit found".to_string())),
    };
    let object_type = match &object_type {
        Some(object) => object.clone(),
        None => return Err(skip("No ObjectType found".to_string())),
    };

    Ok(InputRow {
        row_id,
        mid,
        business_unit,
        object_type,
        event_date,
        expected_count,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// ISO 8601 Datum, optional mit Zeitanteil (`2024-01-01T00:00:00`)
fn parse_event_date(value: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    let (date, rest) = (value.get(..10)?, value.get(10..)?);
    if rest.starts_with('T') || rest.starts_with(' ') {
        return NaiveDate::parse_from_str(date, "%Y-%m-%d").ok();
    }
    None
}

fn apply_alias(business_unit: &str, aliases: &HashMap<String, String>) -> String {
    aliases
        .get(&business_unit.to_lowercase())
        .cloned()
        .unwrap_or_else(|| business_unit.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Number,MID,BusinessUnit,ObjectType,ProcessingDate,EventDate,RowCount\n";

    fn aliases() -> HashMap<String, String> {
        HashMap::from([("lennar corporation".to_string(), "lennar".to_string())])
    }

    #[test]
    fn test_check_header_accepts_both_layouts() {
        assert!(check_header(HEADER).is_ok());
        assert!(check_header("Business Unit,Object,Date,Row Count\n").is_ok());
    }

    #[test]
    fn test_check_header_rejects_misdecoded_text() {
        // UTF-8 Bytes als UTF-16LE gelesen
        let bytes = HEADER.as_bytes();
        let units: Vec<u16> = bytes
            .chunks(2)
            .map(|pair| u16::from_le_bytes([pair[0], *pair.get(1).unwrap_or(&0)]))
            .collect();
        let garbage = String::from_utf16_lossy(&units);

        let err = check_header(&garbage).unwrap_err();
        assert!(err.contains("BusinessUnit"));
        assert!(err.contains("RowCount"));
    }

    #[test]
    fn test_check_header_names_missing_columns() {
        let err = check_header("Number,MID,BusinessUnit,ObjectType,EventDate\n").unwrap_err();
        assert_eq!(err, "header row lacks required columns RowCount");
        assert!(check_header("").is_err());
    }

    #[test]
    fn test_parse_valid_rows() {
        let text = format!(
            "{}1,100,Acme,Send,2024-01-02,2024-01-01,1000\n2,101,Acme,Open,2024-01-02,2024-01-01,0\n",
            HEADER
        );
        let parsed = parse_input(&text, &HashMap::new());

        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].row_id, "1");
        assert_eq!(parsed.rows[0].mid.as_deref(), Some("100"));
        assert_eq!(parsed.rows[0].object_type, "Send");
        assert_eq!(parsed.rows[0].expected_count, 1000);
        assert_eq!(
            parsed.rows[0].event_date,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert_eq!(parsed.rows[1].expected_count, 0);
    }

    #[test]
    fn test_bad_count_and_missing_date_are_skipped() {
        let text = format!(
            "{}1,100,Acme,Send,,2024-01-01,lots\n2,100,Acme,Send,,,10\n3,100,Acme,Click,,2024-01-01,5\n",
            HEADER
        );
        let parsed = parse_input(&text, &HashMap::new());

        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].row_id, "3");
        assert_eq!(parsed.skipped.len(), 2);
        assert!(parsed
            .skipped
            .iter()
            .all(|e| matches!(e, ReconError::RowParse { .. })));
    }

    #[test]
    fn test_negative_count_is_skipped() {
        let text = format!("{}1,100,Acme,Send,,2024-01-01,-4\n", HEADER);
        let parsed = parse_input(&text, &HashMap::new());
        assert!(parsed.rows.is_empty());
        assert_eq!(parsed.skipped.len(), 1);
    }

    #[test]
    fn test_legacy_headers_are_accepted() {
        let text = "Business Unit,Object,Date,Row Count\nAcme West,Click,2024-03-05,42\n";
        let parsed = parse_input(text, &HashMap::new());

        assert_eq!(parsed.rows.len(), 1);
        let row = &parsed.rows[0];
        assert_eq!(row.row_id, "1");
        assert_eq!(row.business_unit, "Acme West");
        assert_eq!(row.object_type, "Click");
        assert_eq!(row.expected_count, 42);
    }

    #[test]
    fn test_business_unit_alias_is_case_insensitive() {
        let text = format!("{}7,1,Lennar Corporation,Send,,2024-01-01,3\n", HEADER);
        let parsed = parse_input(&text, &aliases());
        assert_eq!(parsed.rows[0].business_unit, "lennar");
    }

    #[test]
    fn test_event_date_with_time_component() {
        assert_eq!(
            parse_event_date("2024-01-01T13:00:00Z"),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(parse_event_date("01/02/2024"), None);
        assert_eq!(parse_event_date("2024-01-01'; DROP"), None);
    }
}
