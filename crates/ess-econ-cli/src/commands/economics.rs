use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use ess_econ_core::engine;
use ess_econ_core::params::InputBag;

use crate::input;

/// Arguments for the full economic analysis
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct CalculateArgs {
    /// Path to JSON file with the parameter bag (flags below override it)
    #[arg(long)]
    pub inputs: Option<String>,

    /// Rated power in MW
    #[arg(long)]
    pub p_rated_mw: Option<Decimal>,

    /// Rated energy in MWh
    #[arg(long)]
    pub e_rated_mwh: Option<Decimal>,

    /// Project life in years
    #[arg(long)]
    pub life_span_years: Option<i64>,

    /// EPC cost per kWh of rated energy
    #[arg(long)]
    pub capex_per_kwh: Option<Decimal>,

    /// Debt share of the construction cost, in percent (e.g. 70)
    #[arg(long)]
    pub loan_percent: Option<Decimal>,

    /// Annual loan interest rate, in percent
    #[arg(long)]
    pub interest_rate: Option<Decimal>,

    /// Project discount rate (WACC), in percent
    #[arg(long)]
    pub wacc: Option<Decimal>,

    /// Annual equivalent full cycles
    #[arg(long)]
    pub cycles: Option<i64>,
}

pub fn run_calculate(args: CalculateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut bag = load_bag(args.inputs.as_deref())?;

    overlay_decimal(&mut bag, "p_rated_mw", args.p_rated_mw);
    overlay_decimal(&mut bag, "e_rated_mwh", args.e_rated_mwh);
    overlay_int(&mut bag, "life_span_years", args.life_span_years);
    overlay_decimal(&mut bag, "capex_per_kwh", args.capex_per_kwh);
    overlay_decimal(&mut bag, "loan_percent_input", args.loan_percent);
    overlay_decimal(&mut bag, "interest_rate_annual_percent", args.interest_rate);
    overlay_decimal(&mut bag, "discount_rate_wacc_percent", args.wacc);
    overlay_int(&mut bag, "n_cycles_per_year", args.cycles);

    let output = engine::calculate_economics(&bag)?;
    Ok(serde_json::to_value(output)?)
}

/// Parameter bag from --inputs, piped stdin, or (all defaults) empty.
fn load_bag(path: Option<&str>) -> Result<InputBag, Box<dyn std::error::Error>> {
    match path {
        Some(p) => input::file::load_params(p),
        None => match input::stdin::piped_json()? {
            Some(Value::Object(map)) => Ok(map),
            Some(other) => {
                Err(format!("Expected a JSON object of parameters on stdin, got: {other}").into())
            }
            None => Ok(InputBag::new()),
        },
    }
}

// Flag overrides land as strings; the bag coercion layer parses them back
// with full precision.
fn overlay_decimal(bag: &mut InputBag, key: &str, value: Option<Decimal>) {
    if let Some(v) = value {
        bag.insert(key.to_string(), Value::String(v.to_string()));
    }
}

fn overlay_int(bag: &mut InputBag, key: &str, value: Option<i64>) {
    if let Some(v) = value {
        bag.insert(key.to_string(), Value::from(v));
    }
}
