use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use ess_econ_core::params::InputBag;
use ess_econ_core::sensitivity::{self, SensitivityVariable};

use crate::input;

/// Arguments for sensitivity analysis
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to JSON request file with baseInputs, sensitivityVariables,
    /// and outputMetrics (read from stdin when omitted)
    #[arg(long)]
    pub request: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SensitivityRequest {
    base_inputs: InputBag,
    sensitivity_variables: Vec<SensitivityVariable>,
    output_metrics: Vec<String>,
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: SensitivityRequest = match args.request.as_deref() {
        Some(path) => input::file::load_request(path)?,
        None => match input::stdin::piped_json()? {
            Some(value) => serde_json::from_value(value)?,
            None => {
                return Err(
                    "No sensitivity request given: pass --request or pipe JSON on stdin".into(),
                )
            }
        },
    };

    let output = sensitivity::perform_analysis(
        &request.base_inputs,
        &request.sensitivity_variables,
        &request.output_metrics,
    )?;
    Ok(serde_json::to_value(output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_deserializes_wire_shape() {
        let request: SensitivityRequest = serde_json::from_value(json!({
            "baseInputs": { "capex_per_kwh": 750 },
            "sensitivityVariables": [{
                "variableName": "capex_per_kwh",
                "displayName": "Unit CAPEX",
                "variations": [{ "type": "percentage", "value": -10 }]
            }],
            "outputMetrics": ["projectNPV"]
        }))
        .unwrap();
        assert_eq!(request.sensitivity_variables.len(), 1);
        assert_eq!(request.output_metrics, vec!["projectNPV"]);
        assert_eq!(
            request.sensitivity_variables[0].variable_name,
            "capex_per_kwh"
        );
    }
}
