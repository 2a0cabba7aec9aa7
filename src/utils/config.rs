use clap::Args;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::aws::S3Location;
use crate::error::{ReconError, Result};
use crate::recon::compare::DEFAULT_THRESHOLD;
use crate::recon::verify::DEFAULT_POLL_INTERVAL;
use crate::recon::encoding::TextEncoding;
use crate::recon::naming::{
    default_business_unit_aliases, default_categories, NamePattern, TableNaming,
};

/// Hauptkonfiguration für einen Reconciliation-Lauf bzw. den API-Server
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Optional, beim Server kann die Landing-Datei pro Request kommen
    pub landing_s3_uri: Option<String>,
    pub report_s3_uri: String,
    /// Bucket (ohne `s3://`) für Athena-Ergebnisse, optional mit Ordner
    pub athena_output_bucket: String,
    pub athena_database: String,
    pub athena_table_pattern: String,
    pub athena_date_column: String,
    pub sns_topic_arn: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub threshold: f64,
    pub input_encoding: TextEncoding,
    pub report_encoding: TextEncoding,
    pub poll_interval_ms: u64,
    pub max_concurrent_queries: usize,
    pub api_port: u16,
    #[serde(default = "default_categories")]
    pub categories: HashMap<String, String>,
    #[serde(default = "default_business_unit_aliases")]
    pub business_unit_aliases: HashMap<String, String>,
}

/// Kommandozeilen-Overrides, höchste Priorität
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// TOML config file
    #[arg(long, env = "RECON_CONFIG")]
    pub config: Option<PathBuf>,

    /// S3 URI of the landing CSV, e.g. s3://my-bucket/sfmc/daily-row-counts/file.csv
    #[arg(long)]
    pub landing_s3_uri: Option<String>,

    /// S3 URI the reconciliation report is written to
    #[arg(long)]
    pub report_s3_uri: Option<String>,

    /// Bucket (no s3://) for Athena query results
    #[arg(long)]
    pub athena_output_bucket: Option<String>,

    /// Athena database, may use {business_unit} and {object}
    #[arg(long)]
    pub athena_database: Option<String>,

    /// Athena table name pattern, may use {business_unit} and {object}
    #[arg(long)]
    pub athena_table_pattern: Option<String>,

    /// Date column the count query filters on
    #[arg(long)]
    pub athena_date_column: Option<String>,

    /// SNS topic ARN for mismatch notifications
    #[arg(long)]
    pub sns_topic_arn: Option<String>,

    #[arg(long)]
    pub region: Option<String>,

    /// Custom AWS endpoint (e.g. localstack)
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Percent deviation above which a row is reported as mismatch
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Encoding of the landing file (utf-8, utf-16, utf-16le, utf-16be, windows-1252)
    #[arg(long)]
    pub input_encoding: Option<String>,

    /// Encoding of the uploaded report
    #[arg(long)]
    pub report_encoding: Option<String>,

    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Number of Athena queries in flight at once
    #[arg(long)]
    pub max_concurrent_queries: Option<usize>,

    #[arg(long)]
    pub api_port: Option<u16>,
}

impl Config {
    /// Lade Config: Defaults → TOML-Datei → RECON_* Environment → CLI-Flags
    pub fn load(args: &ConfigArgs) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder()
            .set_default("region", "us-east-1")?
            .set_default("athena_table_pattern", "bronze_{business_unit}_{object}_delta")?
            .set_default("threshold", DEFAULT_THRESHOLD)?
            .set_default("input_encoding", "utf-16")?
            .set_default("report_encoding", "utf-16")?
            .set_default("poll_interval_ms", DEFAULT_POLL_INTERVAL.as_millis() as i64)?
            .set_default("max_concurrent_queries", 1i64)?
            .set_default("api_port", 8080i64)?
            .add_source(config::File::with_name("recon").required(false));

        if let Some(path) = &args.config {
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("RECON"))
            .set_override_option("landing_s3_uri", args.landing_s3_uri.clone())?
            .set_override_option("report_s3_uri", args.report_s3_uri.clone())?
            .set_override_option("athena_output_bucket", args.athena_output_bucket.clone())?
            .set_override_option("athena_database", args.athena_database.clone())?
            .set_override_option("athena_table_pattern", args.athena_table_pattern.clone())?
            .set_override_option("athena_date_column", args.athena_date_column.clone())?
            .set_override_option("sns_topic_arn", args.sns_topic_arn.clone())?
            .set_override_option("region", args.region.clone())?
            .set_override_option("endpoint_url", args.endpoint_url.clone())?
            .set_override_option("threshold", args.threshold)?
            .set_override_option("input_encoding", args.input_encoding.clone())?
            .set_override_option("report_encoding", args.report_encoding.clone())?
            .set_override_option("poll_interval_ms", args.poll_interval_ms.map(|v| v as i64))?
            .set_override_option(
                "max_concurrent_queries",
                args.max_concurrent_queries.map(|v| v as i64),
            )?
            .set_override_option("api_port", args.api_port.map(i64::from))?
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(uri) = &self.landing_s3_uri {
            S3Location::parse(uri).map_err(as_config_error)?;
        }
        self.report_location()?;

        if self.athena_output_bucket.trim().is_empty()
            || self.athena_output_bucket.starts_with("s3://")
        {
            return Err(ReconError::Config(format!(
                "athena_output_bucket must be a bucket name without s3://, got '{}'",
                self.athena_output_bucket
            )));
        }

        if !is_identifier(&self.athena_date_column) {
            return Err(ReconError::Config(format!(
                "athena_date_column '{}' is not a plain column name",
                self.athena_date_column
            )));
        }

        if !self.sns_topic_arn.starts_with("arn:") {
            return Err(ReconError::Config(format!(
                "sns_topic_arn '{}' is not an ARN",
                self.sns_topic_arn
            )));
        }

        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(ReconError::Config(format!(
                "threshold must be a non-negative number, got {}",
                self.threshold
            )));
        }

        if self.max_concurrent_queries == 0 {
            return Err(ReconError::Config(
                "max_concurrent_queries must be at least 1".to_string(),
            ));
        }

        self.table_naming()?;

        Ok(())
    }

    pub fn table_naming(&self) -> Result<TableNaming> {
        Ok(TableNaming::new(
            NamePattern::parse(&self.athena_database)?,
            NamePattern::parse(&self.athena_table_pattern)?,
            self.categories.clone(),
        ))
    }

    pub fn report_location(&self) -> Result<S3Location> {
        S3Location::parse(&self.report_s3_uri).map_err(as_config_error)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn as_config_error(err: ReconError) -> ReconError {
    match err {
        ReconError::InvalidRequest(message) => ReconError::Config(message),
        other => other,
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        landing_s3_uri: Some("s3://landing/sfmc/daily-row-counts/file.csv".to_string()),
        report_s3_uri: "s3://reports/sfmc/recon/report.csv".to_string(),
        athena_output_bucket: "athena-results".to_string(),
        athena_database: "sfmc".to_string(),
        athena_table_pattern: "bronze_{business_unit}_{object}_delta".to_string(),
        athena_date_column: "event_date".to_string(),
        sns_topic_arn: "arn:aws:sns:us-east-1:123456789012:recon".to_string(),
        region: "us-east-1".to_string(),
        endpoint_url: None,
        threshold: 10.0,
        input_encoding: TextEncoding::Utf8,
        report_encoding: TextEncoding::Utf8,
        poll_interval_ms: 0,
        max_concurrent_queries: 1,
        api_port: 8080,
        categories: default_categories(),
        business_unit_aliases: default_business_unit_aliases(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = test_config();
        config.threshold = -1.0;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.threshold = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.athena_date_column = "event_date) OR (1=1".to_string();
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.athena_table_pattern = "bronze_{bu}".to_string();
        assert!(matches!(config.validate(), Err(ReconError::Config(_))));

        let mut config = test_config();
        config.report_s3_uri = "reports/report.csv".to_string();
        assert!(matches!(config.validate(), Err(ReconError::Config(_))));

        let mut config = test_config();
        config.max_concurrent_queries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_identifier() {
        assert!(is_identifier("event_date"));
        assert!(is_identifier("_ts"));
        assert!(!is_identifier("1col"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }

    #[test]
    fn test_load_from_file_with_cli_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
report_s3_uri = "s3://reports/recon/report.csv"
athena_output_bucket = "athena-results"
athena_database = "sfmc"
athena_date_column = "event_date"
sns_topic_arn = "arn:aws:sns:us-east-1:123456789012:recon"
threshold = 5.0
input_encoding = "utf-8"

[categories]
Send = "Send"
"#
        )
        .unwrap();

        let args = ConfigArgs {
            config: Some(file.path().to_path_buf()),
            threshold: Some(2.5),
            ..Default::default()
        };

        let config = Config::load(&args).unwrap();
        assert_eq!(config.threshold, 2.5);
        assert_eq!(config.input_encoding, TextEncoding::Utf8);
        assert_eq!(config.report_encoding, TextEncoding::Utf16);
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.categories.len(), 1);
        assert!(config.business_unit_aliases.contains_key("lennar corporation"));
    }
}
