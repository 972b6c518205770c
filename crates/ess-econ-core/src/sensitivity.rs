use std::collections::BTreeMap;
use std::time::Instant;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::engine::calculate_economics;
use crate::error::EssEconError;
use crate::params::InputBag;
use crate::types::{with_metadata, ComputationOutput, MetricValue};
use crate::EssEconResult;

// ─────────────────────────── Request types ───────────────────────────

/// One variable to sweep, with the set of variations to apply to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityVariable {
    pub variable_name: String,
    #[serde(default)]
    pub display_name: String,
    pub variations: Vec<VariationSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationSpec {
    #[serde(rename = "type")]
    pub variation_type: VariationType,
    pub value: Decimal,
}

/// How a variation perturbs the base value. Unrecognized type strings
/// deserialize to `Unknown` and are reported per-entry instead of failing
/// the whole analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariationType {
    /// base × (1 + value/100)
    Percentage,
    /// value, replacing the base outright
    Absolute,
    /// base + value
    Increment,
    #[serde(other)]
    Unknown,
}

// ─────────────────────────── Report types ────────────────────────────

/// Outcome of a single variation run: either the requested metrics or a
/// captured error. Serializes as a plain object either way, with failures
/// carrying a single `error` key.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum VariationOutcome {
    Metrics(BTreeMap<String, MetricValue>),
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityResult {
    pub variable_name: String,
    pub display_name: String,
    pub variation_type: VariationType,
    /// The magnitude of the variation as requested (e.g. -10 for -10%)
    pub variation_value: Decimal,
    /// The actual parameter value the engine was invoked with; absent when
    /// the variation itself was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub varied_input_parameter_value: Option<Decimal>,
    pub outputs: VariationOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityReport {
    pub analysis_title: String,
    pub base_case_results: BTreeMap<String, MetricValue>,
    pub sensitivity_results: Vec<SensitivityResult>,
}

// ──────────────────────────── The driver ─────────────────────────────

/// Run a one-dimensional sensitivity sweep over the first variable.
///
/// The base case runs first; any failure there aborts the whole analysis
/// as a `BaseCaseFailure`. Each variation then re-runs the engine on a
/// clone of the base inputs with the perturbed parameter value. Per-entry
/// problems (unknown variation type, non-numeric base under arithmetic
/// variations, engine failure) are captured in that entry's `outputs`, not
/// raised.
///
/// Only the first element of `variables` is swept; additional entries
/// produce a warning and are otherwise ignored.
pub fn perform_analysis(
    base_inputs: &InputBag,
    variables: &[SensitivityVariable],
    output_metrics: &[String],
) -> EssEconResult<ComputationOutput<SensitivityReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if variables.is_empty() {
        return Err(EssEconError::InvalidInput {
            field: "sensitivityVariables".to_string(),
            reason: "at least one variable definition is required".to_string(),
        });
    }
    if output_metrics.is_empty() {
        return Err(EssEconError::InvalidInput {
            field: "outputMetrics".to_string(),
            reason: "at least one output metric is required".to_string(),
        });
    }

    let base_output =
        calculate_economics(base_inputs).map_err(|e| EssEconError::BaseCaseFailure(e.to_string()))?;
    warnings.extend(base_output.warnings.iter().cloned());
    let base_case_results = extract_metrics(&base_output.result, output_metrics);

    let main_variable = &variables[0];
    if main_variable.variable_name.is_empty() {
        return Err(EssEconError::InvalidInput {
            field: "sensitivityVariables[0].variableName".to_string(),
            reason: "variable name must not be empty".to_string(),
        });
    }
    if !base_inputs.contains_key(&main_variable.variable_name) {
        return Err(EssEconError::InvalidInput {
            field: main_variable.variable_name.clone(),
            reason: "sensitivity variable not present in base inputs".to_string(),
        });
    }
    if variables.len() > 1 {
        warnings.push(format!(
            "only the first sensitivity variable ({}) is swept; {} additional variable(s) ignored",
            main_variable.variable_name,
            variables.len() - 1
        ));
    }

    let display_name = if main_variable.display_name.is_empty() {
        main_variable.variable_name.clone()
    } else {
        main_variable.display_name.clone()
    };

    let base_value = base_inputs.get(&main_variable.variable_name);
    let base_numeric = base_value.and_then(numeric_value);

    let mut sensitivity_results = Vec::with_capacity(main_variable.variations.len());
    for variation in &main_variable.variations {
        let mut entry = SensitivityResult {
            variable_name: main_variable.variable_name.clone(),
            display_name: display_name.clone(),
            variation_type: variation.variation_type,
            variation_value: variation.value,
            varied_input_parameter_value: None,
            outputs: VariationOutcome::Metrics(BTreeMap::new()),
        };

        let varied_value = match (variation.variation_type, base_numeric) {
            (VariationType::Percentage, Some(base)) => {
                base * (Decimal::ONE + variation.value / dec!(100))
            }
            (VariationType::Increment, Some(base)) => base + variation.value,
            (VariationType::Absolute, _) => variation.value,
            (kind @ (VariationType::Percentage | VariationType::Increment), None) => {
                let kind = match kind {
                    VariationType::Percentage => "percentage",
                    _ => "increment",
                };
                entry.outputs = VariationOutcome::Failed {
                    error: format!(
                        "cannot apply a {kind} variation to the non-numeric base value of '{}'",
                        main_variable.variable_name
                    ),
                };
                sensitivity_results.push(entry);
                continue;
            }
            (VariationType::Unknown, _) => {
                entry.outputs = VariationOutcome::Failed {
                    error: "unknown variation type".to_string(),
                };
                sensitivity_results.push(entry);
                continue;
            }
        };

        entry.varied_input_parameter_value = Some(varied_value);
        let mut varied_inputs = base_inputs.clone();
        // Stored as a string so the full decimal survives the JSON bag.
        varied_inputs.insert(
            main_variable.variable_name.clone(),
            Value::String(varied_value.to_string()),
        );

        entry.outputs = match calculate_economics(&varied_inputs) {
            Ok(output) => VariationOutcome::Metrics(extract_metrics(&output.result, output_metrics)),
            Err(e) => VariationOutcome::Failed {
                error: e.to_string(),
            },
        };
        sensitivity_results.push(entry);
    }

    let report = SensitivityReport {
        analysis_title: format!("Sensitivity analysis of \"{display_name}\""),
        base_case_results,
        sensitivity_results,
    };

    let assumptions = json!({
        "variableName": main_variable.variable_name,
        "variationCount": main_variable.variations.len(),
        "outputMetrics": output_metrics,
    });

    Ok(with_metadata(
        "One-dimensional sensitivity sweep re-running the DCF engine per variation",
        &assumptions,
        warnings,
        start.elapsed().as_micros() as u64,
        report,
    ))
}

fn extract_metrics(
    results: &crate::engine::EconomicResults,
    output_metrics: &[String],
) -> BTreeMap<String, MetricValue> {
    output_metrics
        .iter()
        .map(|name| (name.clone(), results.metric(name)))
        .collect()
}

/// Arithmetic variations only apply to genuinely numeric base values;
/// numeric strings deliberately do not count.
fn numeric_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                n.as_f64().and_then(Decimal::from_f64)
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn bag(value: serde_json::Value) -> InputBag {
        value.as_object().cloned().unwrap_or_default()
    }

    fn base_inputs() -> InputBag {
        bag(json!({
            "p_rated_mw": 100,
            "e_rated_mwh": 200,
            "capex_per_kwh": 750,
            "tech_type": "LiFePO4",
        }))
    }

    fn capex_variable(variations: Vec<VariationSpec>) -> SensitivityVariable {
        SensitivityVariable {
            variable_name: "capex_per_kwh".to_string(),
            display_name: "Unit CAPEX".to_string(),
            variations,
        }
    }

    fn metrics() -> Vec<String> {
        vec!["projectNPV".to_string(), "equityIRRPostTax".to_string()]
    }

    #[test]
    fn test_variation_arithmetic() {
        let variable = capex_variable(vec![
            VariationSpec {
                variation_type: VariationType::Percentage,
                value: dec!(-10),
            },
            VariationSpec {
                variation_type: VariationType::Absolute,
                value: dec!(42),
            },
            VariationSpec {
                variation_type: VariationType::Increment,
                value: dec!(5),
            },
        ]);
        let output = perform_analysis(&base_inputs(), &[variable], &metrics()).unwrap();
        let results = &output.result.sensitivity_results;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].varied_input_parameter_value, Some(dec!(675.0)));
        assert_eq!(results[1].varied_input_parameter_value, Some(dec!(42)));
        assert_eq!(results[2].varied_input_parameter_value, Some(dec!(755)));
        for entry in results {
            assert!(matches!(entry.outputs, VariationOutcome::Metrics(_)));
        }
    }

    #[test]
    fn test_base_case_failure_aborts() {
        let mut inputs = base_inputs();
        inputs.insert("eta_rt_percent".into(), json!(0));
        let variable = capex_variable(vec![VariationSpec {
            variation_type: VariationType::Percentage,
            value: dec!(-10),
        }]);
        let err = perform_analysis(&inputs, &[variable], &metrics()).unwrap_err();
        assert!(matches!(err, EssEconError::BaseCaseFailure(_)));
    }

    #[test]
    fn test_unknown_metric_reported_as_unavailable() {
        let variable = capex_variable(vec![VariationSpec {
            variation_type: VariationType::Increment,
            value: dec!(0),
        }]);
        let metrics = vec!["projectNPV".to_string(), "bogusMetric".to_string()];
        let output = perform_analysis(&base_inputs(), &[variable], &metrics).unwrap();

        let base = &output.result.base_case_results;
        assert_eq!(base["bogusMetric"], MetricValue::Unavailable);
        assert!(matches!(base["projectNPV"], MetricValue::Present(Some(_))));

        let json = serde_json::to_value(&output.result).unwrap();
        assert_eq!(
            json["baseCaseResults"]["bogusMetric"],
            json!("Metric not available")
        );
    }

    #[test]
    fn test_unknown_variation_type_is_per_entry_error() {
        let spec: VariationSpec =
            serde_json::from_value(json!({"type": "wobble", "value": 3})).unwrap();
        assert_eq!(spec.variation_type, VariationType::Unknown);

        let variable = capex_variable(vec![spec]);
        let output = perform_analysis(&base_inputs(), &[variable], &metrics()).unwrap();
        let entry = &output.result.sensitivity_results[0];
        assert!(entry.varied_input_parameter_value.is_none());
        assert!(matches!(entry.outputs, VariationOutcome::Failed { .. }));
    }

    #[test]
    fn test_arithmetic_on_non_numeric_base_is_per_entry_error() {
        let variable = SensitivityVariable {
            variable_name: "tech_type".to_string(),
            display_name: "Technology".to_string(),
            variations: vec![
                VariationSpec {
                    variation_type: VariationType::Percentage,
                    value: dec!(-10),
                },
                VariationSpec {
                    variation_type: VariationType::Absolute,
                    value: dec!(42),
                },
            ],
        };
        let output = perform_analysis(&base_inputs(), &[variable], &metrics()).unwrap();
        let results = &output.result.sensitivity_results;
        // Percentage against a string fails; absolute replaces it outright.
        assert!(matches!(results[0].outputs, VariationOutcome::Failed { .. }));
        assert!(matches!(results[1].outputs, VariationOutcome::Metrics(_)));
    }

    #[test]
    fn test_variable_missing_from_base_inputs() {
        let variable = SensitivityVariable {
            variable_name: "nonexistent_param".to_string(),
            display_name: String::new(),
            variations: vec![],
        };
        let err = perform_analysis(&base_inputs(), &[variable], &metrics()).unwrap_err();
        assert!(matches!(err, EssEconError::InvalidInput { .. }));
    }

    #[test]
    fn test_empty_variables_and_metrics_rejected() {
        assert!(matches!(
            perform_analysis(&base_inputs(), &[], &metrics()).unwrap_err(),
            EssEconError::InvalidInput { .. }
        ));
        let variable = capex_variable(vec![]);
        assert!(matches!(
            perform_analysis(&base_inputs(), &[variable], &[]).unwrap_err(),
            EssEconError::InvalidInput { .. }
        ));
    }

    #[test]
    fn test_extra_variables_warn_but_do_not_run() {
        let first = capex_variable(vec![VariationSpec {
            variation_type: VariationType::Increment,
            value: dec!(10),
        }]);
        let second = SensitivityVariable {
            variable_name: "e_rated_mwh".to_string(),
            display_name: String::new(),
            variations: vec![VariationSpec {
                variation_type: VariationType::Increment,
                value: dec!(100),
            }],
        };
        let output = perform_analysis(&base_inputs(), &[first, second], &metrics()).unwrap();
        assert!(output
            .warnings
            .iter()
            .any(|w| w.contains("additional variable")));
        // Only the capex sweep ran.
        assert_eq!(output.result.sensitivity_results.len(), 1);
        assert_eq!(
            output.result.sensitivity_results[0].variable_name,
            "capex_per_kwh"
        );
    }

    #[test]
    fn test_analysis_title_embeds_display_name() {
        let variable = capex_variable(vec![]);
        let output = perform_analysis(&base_inputs(), &[variable], &metrics()).unwrap();
        assert_eq!(
            output.result.analysis_title,
            "Sensitivity analysis of \"Unit CAPEX\""
        );
    }

    #[test]
    fn test_percentage_sweep_moves_npv_monotonically() {
        let variable = capex_variable(vec![
            VariationSpec {
                variation_type: VariationType::Percentage,
                value: dec!(-20),
            },
            VariationSpec {
                variation_type: VariationType::Percentage,
                value: dec!(0),
            },
            VariationSpec {
                variation_type: VariationType::Percentage,
                value: dec!(20),
            },
        ]);
        let output =
            perform_analysis(&base_inputs(), &[variable], &["projectNPV".to_string()]).unwrap();
        let npvs: Vec<Decimal> = output
            .result
            .sensitivity_results
            .iter()
            .map(|entry| match &entry.outputs {
                VariationOutcome::Metrics(m) => match m["projectNPV"] {
                    MetricValue::Present(Some(v)) => v,
                    _ => panic!("projectNPV missing"),
                },
                VariationOutcome::Failed { error } => panic!("variation failed: {error}"),
            })
            .collect();
        // Cheaper plant, better NPV.
        assert!(npvs[0] > npvs[1]);
        assert!(npvs[1] > npvs[2]);
    }
}
