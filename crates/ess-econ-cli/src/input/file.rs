use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use ess_econ_core::params::InputBag;

/// Load a parameter bag from a JSON file. The file must hold a single
/// object; values may be numbers, numeric strings, or booleans, exactly
/// as the engine's coercion layer accepts them.
pub fn load_params(path: &str) -> Result<InputBag, Box<dyn std::error::Error>> {
    match parse_file::<Value>(path)? {
        Value::Object(map) => Ok(map),
        other => Err(format!(
            "'{path}' must contain a JSON object of parameters, found {}",
            json_kind(&other)
        )
        .into()),
    }
}

/// Load a typed request document (e.g. a sensitivity request) from a
/// JSON file.
pub fn load_request<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn std::error::Error>> {
    parse_file(path)
}

fn parse_file<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn std::error::Error>> {
    let file = locate(path)?;
    let contents = fs::read_to_string(&file)
        .map_err(|e| format!("Cannot read '{}': {}", file.display(), e))?;
    serde_json::from_str(&contents)
        .map_err(|e| format!("Invalid JSON in '{}': {}", file.display(), e).into())
}

fn locate(path: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let full = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };
    if !full.is_file() {
        return Err(format!("Input file not found: {}", full.display()).into());
    }
    Ok(full)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_params_reads_a_bag() {
        let path = write_temp("esa_params_ok.json", r#"{"capex_per_kwh": 700}"#);
        let bag = load_params(path.to_str().unwrap()).unwrap();
        assert_eq!(bag["capex_per_kwh"], serde_json::json!(700));
    }

    #[test]
    fn test_load_params_rejects_non_object() {
        let path = write_temp("esa_params_array.json", "[1, 2]");
        let err = load_params(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("JSON object of parameters"));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = load_params("/no/such/esa-file.json").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
