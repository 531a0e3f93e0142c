//! Conversion of the export envelope to its serialized form

use crate::error::{Error, Result};
use crate::store::ExportEnvelope;
use serde::{Deserialize, Serialize};

/// Output format of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    /// Compact JSON
    #[default]
    Json,
    /// Indented JSON
    JsonPretty,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::JsonPretty => "json-pretty",
        }
    }

    /// Serialize the envelope in this format
    pub fn convert(&self, envelope: &ExportEnvelope) -> Result<String> {
        let output = match self {
            Self::Json => serde_json::to_string(envelope)?,
            Self::JsonPretty => serde_json::to_string_pretty(envelope)?,
        };
        Ok(output)
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "json-pretty" => Ok(Self::JsonPretty),
            _ => Err(Error::UnsupportedFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert an envelope to the named format
pub fn convert(envelope: &ExportEnvelope, format: &str) -> Result<String> {
    format.parse::<ExportFormat>()?.convert(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ExportStore;

    #[test]
    fn test_convert_json() {
        let envelope = ExportEnvelope::new(ExportStore::new());
        assert_eq!(convert(&envelope, "json").unwrap(), r#"{"version":2,"data":{}}"#);
        assert!(convert(&envelope, "JSON-Pretty").unwrap().contains('\n'));
    }

    #[test]
    fn test_unsupported_format() {
        let envelope = ExportEnvelope::new(ExportStore::new());
        assert!(matches!(
            convert(&envelope, "csv"),
            Err(Error::UnsupportedFormat(f)) if f == "csv"
        ));
    }
}
