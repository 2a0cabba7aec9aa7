use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ReconError, Result};

/// Textkodierung der Landing-Datei bzw. des Reports
///
/// Wird explizit konfiguriert. Es gibt keine automatische Erkennung, ein BOM das der
/// Konfiguration widerspricht ist ein Fehler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TextEncoding {
    Utf8,
    /// UTF-16 mit BOM-Erkennung, ohne BOM Little Endian
    Utf16,
    Utf16Le,
    Utf16Be,
    Windows1252,
}

impl TextEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf16 => "utf-16",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Utf16Be => "utf-16be",
            TextEncoding::Windows1252 => "windows-1252",
        }
    }

    fn accepts_bom(&self, bom: &'static Encoding) -> bool {
        match self {
            TextEncoding::Utf8 => bom == UTF_8,
            TextEncoding::Utf16 => bom == UTF_16LE || bom == UTF_16BE,
            TextEncoding::Utf16Le => bom == UTF_16LE,
            TextEncoding::Utf16Be => bom == UTF_16BE,
            TextEncoding::Windows1252 => false,
        }
    }

    /// Dekodiere Bytes strikt, ohne Ersetzungszeichen
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        let (encoding, body) = match Encoding::for_bom(bytes) {
            Some((bom, len)) if self.accepts_bom(bom) => (bom, &bytes[len..]),
            Some((bom, _)) => {
                return Err(self.decode_error(format!(
                    "byte order mark indicates {}",
                    bom.name().to_lowercase()
                )))
            }
            None => (self.default_encoding(), bytes),
        };

        encoding
            .decode_without_bom_handling_and_without_replacement(body)
            .map(|text| text.into_owned())
            .ok_or_else(|| self.decode_error("malformed byte sequence".to_string()))
    }

    /// Kodiere Text für den Upload. `utf-16` schreibt ein Little-Endian-BOM.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Utf16 => {
                let mut out = vec![0xFF, 0xFE];
                out.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
                Ok(out)
            }
            TextEncoding::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            TextEncoding::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            TextEncoding::Windows1252 => {
                let (bytes, _, had_unmappable) = WINDOWS_1252.encode(text);
                if had_unmappable {
                    return Err(ReconError::Config(
                        "report contains characters not representable in windows-1252".to_string(),
                    ));
                }
                Ok(bytes.into_owned())
            }
        }
    }

    fn default_encoding(&self) -> &'static Encoding {
        match self {
            TextEncoding::Utf8 => UTF_8,
            TextEncoding::Utf16 | TextEncoding::Utf16Le => UTF_16LE,
            TextEncoding::Utf16Be => UTF_16BE,
            TextEncoding::Windows1252 => WINDOWS_1252,
        }
    }

    fn decode_error(&self, message: String) -> ReconError {
        ReconError::Decode {
            encoding: self.as_str().to_string(),
            message,
        }
    }
}

impl FromStr for TextEncoding {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "utf-16" | "utf16" => Ok(TextEncoding::Utf16),
            "utf-16le" | "utf-16-le" => Ok(TextEncoding::Utf16Le),
            "utf-16be" | "utf-16-be" => Ok(TextEncoding::Utf16Be),
            "windows-1252" | "cp1252" | "latin1" | "latin-1" => Ok(TextEncoding::Windows1252),
            other => Err(ReconError::Config(format!("unsupported text encoding '{}'", other))),
        }
    }
}

impl TryFrom<String> for TextEncoding {
    type Error = ReconError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TextEncoding> for String {
    fn from(value: TextEncoding) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
