use rust_decimal::Decimal;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Year fractions or counts
pub type Years = Decimal;

/// A single requested output metric, extracted by name from a results
/// object. Unknown metric names are reported as `Unavailable` rather than
/// omitted or treated as errors.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// The metric exists; `None` means the underlying solver did not
    /// converge (reported as JSON null).
    Present(Option<Decimal>),
    /// The metric name is not part of the results object.
    Unavailable,
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Present(Some(v)) => Serialize::serialize(v, serializer),
            MetricValue::Present(None) => serializer.serialize_none(),
            MetricValue::Unavailable => serializer.serialize_str("Metric not available"),
        }
    }
}

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

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_metric_value_serialization() {
        // Decimal serializes as a string (serde-with-str), matching the
        // rest of the crate's monetary output.
        let present = serde_json::to_value(MetricValue::Present(Some(dec!(7.25)))).unwrap();
        assert_eq!(present, serde_json::json!("7.25"));

        let null = serde_json::to_value(MetricValue::Present(None)).unwrap();
        assert!(null.is_null());

        let missing = serde_json::to_value(MetricValue::Unavailable).unwrap();
        assert_eq!(missing, serde_json::json!("Metric not available"));
    }
}
