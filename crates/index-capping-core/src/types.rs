use chrono::{DateTime, NaiveDate, Utc};

use crate::error::IndexCappingError;
use crate::IndexCappingResult;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Currency amounts (market caps, AUM, trade sizes). Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Weights and caps expressed as decimals (0.045 = 4.5%). Never as percentages.
pub type Rate = Decimal;

/// One row of a raw vendor snapshot: field name to JSON value, any field may be absent.
pub type RawRow = serde_json::Map<String, serde_json::Value>;

/// A raw constituent table as handed over by the market-data collaborator.
pub type RawTable = Vec<RawRow>;

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

/// Render an as-of date as the UTC-midnight ISO-8601 timestamp stored alongside every row.
pub fn as_of_timestamp(as_of: NaiveDate) -> String {
    let midnight: DateTime<Utc> = as_of.and_time(chrono::NaiveTime::MIN).and_utc();
    midnight.to_rfc3339()
}

/// Parse an as-of date given either as `YYYY-MM-DD` or as a stored RFC 3339 timestamp.
pub fn parse_as_of(s: &str) -> IndexCappingResult<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.date_naive()))
        .map_err(|e| IndexCappingError::DateError(format!("'{s}' is not a valid as-of date: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_of_is_utc_midnight() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        assert_eq!(as_of_timestamp(d), "2025-03-31T00:00:00+00:00");
    }

    #[test]
    fn test_parse_as_of_accepts_date_and_timestamp() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        assert_eq!(parse_as_of("2025-03-31").unwrap(), d);
        assert_eq!(parse_as_of("2025-03-31T00:00:00+00:00").unwrap(), d);
        assert!(matches!(
            parse_as_of("31/03/2025"),
            Err(IndexCappingError::DateError(_))
        ));
    }

    #[test]
    fn test_envelope_carries_version_and_warnings() {
        let out = with_metadata("test", &"none", vec!["w".into()], 7, 42u32);
        assert_eq!(out.result, 42);
        assert_eq!(out.warnings, vec!["w".to_string()]);
        assert_eq!(out.metadata.computation_time_us, 7);
        assert_eq!(out.metadata.precision, "rust_decimal_128bit");
    }
}
