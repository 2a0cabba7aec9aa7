use std::fmt;

use crate::error::{ReconError, Result};

/// Bucket + Key eines S3-Objekts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
}

impl S3Location {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse `s3://bucket/key`
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .trim()
            .strip_prefix("s3://")
            .ok_or_else(|| ReconError::InvalidRequest(format!("'{}' is not an s3:// URI", uri)))?;

        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        let key = key.trim_start_matches('/');

        if bucket.is_empty() {
            return Err(ReconError::InvalidRequest(format!("'{}' has no bucket", uri)));
        }
        if key.is_empty() {
            return Err(ReconError::InvalidRequest(format!("'{}' has no object key", uri)));
        }

        Ok(Self::new(bucket, key))
    }

    /// Archivziel im selben Bucket
    pub fn processed(&self) -> Self {
        Self::new(self.bucket.clone(), processed_key(&self.key))
    }
}

impl fmt::Display for S3Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Ersetze den Elternordner durch `processed`, oberster Ordner und Dateiname bleiben
///
/// `sfmc/daily-row-counts/file.csv` → `sfmc/processed/file.csv`
pub fn processed_key(key: &str) -> String {
    let parts: Vec<&str> = key.split('/').collect();
    match parts.as_slice() {
        [] | [_] => format!("processed/{}", key),
        [top, .., filename] => format!("{}/processed/{}", top, filename),
    }
}

/// `CopySource` für S3 CopyObject, Key URL-kodiert
pub fn copy_source(location: &S3Location) -> String {
    let mut encoded = String::with_capacity(location.key.len());
    for byte in location.key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(byte as char)
            }
            other => encoded.push_str(&format!("%{:02X}", other)),
        }
    }
    format!("{}/{}", location.bucket, encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uri() {
        let loc = S3Location::parse("s3://my-bucket/sfmc/daily-row-counts/file.csv").unwrap();
        assert_eq!(loc.bucket, "my-bucket");
        assert_eq!(loc.key, "sfmc/daily-row-counts/file.csv");
        assert_eq!(loc.to_string(), "s3://my-bucket/sfmc/daily-row-counts/file.csv");
    }

    #[test]
    fn test_parse_rejects_bad_uris() {
        assert!(S3Location::parse("https://my-bucket/file.csv").is_err());
        assert!(S3Location::parse("s3:///file.csv").is_err());
        assert!(S3Location::parse("s3://my-bucket").is_err());
        assert!(S3Location::parse("s3://my-bucket/").is_err());
    }

    #[test]
    fn test_processed_key() {
        assert_eq!(
            processed_key("sfmc/daily-row-counts/file.csv"),
            "sfmc/processed/file.csv"
        );
        assert_eq!(processed_key("sfmc/a/b/c/file.csv"), "sfmc/processed/file.csv");
        assert_eq!(processed_key("sfmc/file.csv"), "sfmc/processed/file.csv");
        assert_eq!(processed_key("file.csv"), "processed/file.csv");
    }

    #[test]
    fn test_processed_location_keeps_bucket() {
        let loc = S3Location::new("landing", "sfmc/daily-row-counts/file.csv");
        assert_eq!(
            loc.processed(),
            S3Location::new("landing", "sfmc/processed/file.csv")
        );
    }

    #[test]
    fn test_copy_source_encodes_key() {
        let loc = S3Location::new("landing", "sfmc/daily counts/file+1.csv");
        assert_eq!(copy_source(&loc), "landing/sfmc/daily%20counts/file%2B1.csv");
    }
}
