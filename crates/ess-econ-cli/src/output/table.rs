use serde_json::Value;
use tabled::{builder::Builder, Table};

/// Format output as tables using the tabled crate.
///
/// Economic-analysis envelopes get a metric table plus an investment
/// summary table; the year-by-year statement is left to the csv formatter.
/// Sensitivity envelopes get the base case followed by one row per
/// variation. Anything else falls back to a flat field/value table.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_tables(result, map);
            } else {
                print_flat_object(value);
            }
        }
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{}", value),
    }
}

fn print_result_tables(result: &Value, envelope: &serde_json::Map<String, Value>) {
    match result {
        Value::Object(res_map) if res_map.contains_key("annualCashFlows") => {
            print_metrics_and_summary(res_map);
        }
        Value::Object(res_map) if res_map.contains_key("sensitivityResults") => {
            print_sensitivity(res_map);
        }
        Value::Object(_) => print_flat_object(result),
        _ => print_flat_object(&Value::Object(envelope.clone())),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_metrics_and_summary(res_map: &serde_json::Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Metric", "Value"]);
    for (key, val) in res_map {
        // Scalar metrics only; the statement and summary render separately.
        if key == "annualCashFlows" || key == "summary" {
            continue;
        }
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    println!("{}", Table::from(builder));

    if let Some(Value::Object(summary)) = res_map.get("summary") {
        let mut builder = Builder::default();
        builder.push_record(["Investment", "Value"]);
        for (key, val) in summary {
            builder.push_record([key.as_str(), &format_value(val)]);
        }
        println!("\n{}", Table::from(builder));
    }

    if let Some(Value::Array(flows)) = res_map.get("annualCashFlows") {
        println!(
            "\n({} annual cash-flow records; use --output csv for the full statement)",
            flows.len()
        );
    }
}

fn print_sensitivity(res_map: &serde_json::Map<String, Value>) {
    if let Some(Value::String(title)) = res_map.get("analysisTitle") {
        println!("{}\n", title);
    }

    if let Some(Value::Object(base)) = res_map.get("baseCaseResults") {
        let mut builder = Builder::default();
        builder.push_record(["Base metric", "Value"]);
        for (key, val) in base {
            builder.push_record([key.as_str(), &format_value(val)]);
        }
        println!("{}\n", Table::from(builder));
    }

    if let Some(Value::Array(entries)) = res_map.get("sensitivityResults") {
        print_array_table(entries);
    }
}

fn print_flat_object(value: &Value) {
    if let Value::Object(map) = value {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in map {
            builder.push_record([key.as_str(), &format_value(val)]);
        }
        println!("{}", Table::from(builder));
    }
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }
        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
