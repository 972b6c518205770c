use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::types::{Money, Rate};

/// The raw parameter bag the engine accepts: a loose JSON object whose
/// values may be numbers, numeric strings (optionally `%`-suffixed), or
/// booleans. Produced by whatever caller fronts the engine.
pub type InputBag = serde_json::Map<String, Value>;

/// Coerce a bag entry to a number, substituting `default` when the field
/// is missing or not numeric.
pub fn num_or(bag: &InputBag, key: &str, default: Decimal) -> Decimal {
    bag.get(key).and_then(value_as_decimal).unwrap_or(default)
}

/// Coerce a bag entry to an integer year/count. Mirrors `parseInt(x) || d`
/// semantics: missing, non-numeric, and zero all yield the default;
/// fractional values truncate.
pub fn int_or(bag: &InputBag, key: &str, default: i64) -> i64 {
    match bag
        .get(key)
        .and_then(value_as_decimal)
        .and_then(|d| d.trunc().to_i64())
    {
        Some(0) | None => default,
        Some(i) => i,
    }
}

/// Coerce a bag entry to a boolean flag: `true` or the string `"true"`
/// (case-insensitive). Anything else is false.
pub fn flag(bag: &InputBag, key: &str) -> bool {
    match bag.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn value_as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                n.as_f64().and_then(Decimal::from_f64)
            }
        }
        Value::String(s) => {
            let trimmed = s.trim().trim_end_matches('%').trim();
            trimmed.parse::<Decimal>().ok()
        }
        _ => None,
    }
}

/// Fully normalized engine parameters.
///
/// Every field carries its final unit: all `*_percent` inputs have been
/// divided by 100 exactly once, here and nowhere else, so downstream code
/// only ever sees decimal fractions. Missing or invalid inputs have been
/// replaced by their documented defaults.
#[derive(Debug, Clone)]
pub struct NormalizedParams {
    // Physical sizing
    pub p_rated_mw: Decimal,
    pub e_rated_mwh: Decimal,
    pub life_span_years: i64,
    /// Round-trip efficiency (fraction)
    pub eta_rt: Rate,
    /// Annual capacity degradation (fraction)
    pub deg_rate_annual: Rate,
    /// Opaque technology label, echoed in metadata only
    pub tech_type: String,

    // Cost structure
    pub capex_per_kwh: Money,
    pub capex_per_kw: Money,
    pub other_capex_rate: Rate,
    pub opex_rate_on_epc: Rate,
    pub opex_annual_fixed_other: Money,

    // Replacement policy
    pub include_battery_replacement: bool,
    pub replacement_year: i64,
    pub replacement_cost_per_kwh: Money,
    pub depreciation_years_replacement: i64,

    // Financing
    pub loan_percent: Rate,
    pub interest_rate_annual: Rate,
    pub loan_term_years: i64,

    // VAT / surtax / income tax
    pub vat_rate_output: Rate,
    pub vat_rate_capex_input: Rate,
    pub vat_rate_opex_input: Rate,
    pub surtax_rate_on_vat: Rate,
    /// Effective income-tax rate; the preferential western-development
    /// policy flag resolves to 15% here during normalization.
    pub income_tax_rate: Rate,
    pub max_loss_carry_forward_years: i64,

    // Discount rates
    pub discount_rate_wacc: Rate,
    pub equity_discount_rate: Rate,

    // Operating profile (arbitrage)
    pub n_cycles_per_year: i64,
    pub dod: Rate,
    pub price_peak_kwh: Money,
    pub price_valley_kwh: Money,

    // Primary frequency response
    pub pfr_capacity_mw: Decimal,
    pub pfr_annual_service_hours: Decimal,
    pub pfr_compensation_price_mw_hour: Money,
    pub pfr_availability_factor: Rate,

    // AGC capacity and mileage
    pub agc_capacity_mw: Decimal,
    pub agc_annual_effective_service_days: Decimal,
    pub agc_compensation_fixed_price_mw_day: Money,
    pub agc_mileage_price_mwh: Money,
    pub agc_k_value: Decimal,
    pub agc_response_time_s: Decimal,
    pub agc_regulation_accuracy: Rate,
    pub agc_regulation_rate_mw_min: Decimal,
    pub agc_daily_calls: Decimal,
    pub agc_avg_duration_per_call_min: Decimal,
    pub agc_regulation_depth: Rate,
    pub agc_standard_response_time_s_ref: Decimal,
    pub agc_standard_accuracy_ref: Rate,
    pub agc_standard_regulation_rate_ratio_ref: Rate,

    // Capacity market / flat-revenue fallbacks
    pub capacity_market_participation_mw: Decimal,
    pub capacity_market_price_mw_month: Money,
    pub aux_services_annual_revenue_input_before_vat: Money,
    pub capacity_lease_annual_revenue_input_before_vat: Money,

    // Depreciation / salvage
    pub depreciation_years_initial: i64,
    pub salvage_rate: Rate,
}

impl NormalizedParams {
    /// Normalize a raw parameter bag, applying documented defaults and the
    /// one-time percent-to-fraction conversion.
    pub fn from_bag(bag: &InputBag) -> Self {
        // Rated power/energy first: several service-capacity defaults
        // derive from them.
        let p_rated_mw = num_or(bag, "p_rated_mw", dec!(100));
        let e_rated_mwh = num_or(bag, "e_rated_mwh", dec!(200));

        let income_tax_rate = if flag(bag, "use_western_dev_tax") {
            dec!(0.15)
        } else {
            num_or(bag, "income_tax_rate_standard_percent", dec!(25)) / dec!(100)
        };

        NormalizedParams {
            p_rated_mw,
            e_rated_mwh,
            life_span_years: int_or(bag, "life_span_years", 15),
            eta_rt: num_or(bag, "eta_rt_percent", dec!(88)) / dec!(100),
            deg_rate_annual: num_or(bag, "deg_rate_annual_percent", dec!(1.5)) / dec!(100),
            tech_type: bag
                .get("tech_type")
                .and_then(Value::as_str)
                .unwrap_or("LiFePO4")
                .to_string(),

            capex_per_kwh: num_or(bag, "capex_per_kwh", dec!(750)),
            capex_per_kw: num_or(bag, "capex_per_kw", dec!(0)),
            other_capex_rate: num_or(bag, "other_capex_rate_percent", dec!(5)) / dec!(100),
            opex_rate_on_epc: num_or(bag, "opex_rate_on_epc_percent", dec!(1.5)) / dec!(100),
            opex_annual_fixed_other: num_or(bag, "opex_annual_fixed_other", dec!(0)),

            include_battery_replacement: flag(bag, "include_battery_replacement"),
            replacement_year: int_or(bag, "replacement_year", 10),
            replacement_cost_per_kwh: num_or(bag, "replacement_cost_per_kwh", dec!(250)),
            depreciation_years_replacement: int_or(bag, "depreciation_years_replacement", 5),

            loan_percent: num_or(bag, "loan_percent_input", dec!(70)) / dec!(100),
            interest_rate_annual: num_or(bag, "interest_rate_annual_percent", dec!(3.0))
                / dec!(100),
            loan_term_years: int_or(bag, "loan_term_years", 10),

            vat_rate_output: num_or(bag, "vat_rate_output_percent", dec!(6)) / dec!(100),
            vat_rate_capex_input: num_or(bag, "vat_rate_capex_input_percent", dec!(13))
                / dec!(100),
            vat_rate_opex_input: num_or(bag, "vat_rate_opex_input_percent", dec!(6)) / dec!(100),
            surtax_rate_on_vat: num_or(bag, "surtax_rate_on_vat_percent", dec!(12)) / dec!(100),
            income_tax_rate,
            max_loss_carry_forward_years: int_or(bag, "max_loss_carry_forward_years", 5),

            discount_rate_wacc: num_or(bag, "discount_rate_wacc_percent", dec!(5.38)) / dec!(100),
            equity_discount_rate: num_or(bag, "equity_discount_rate_percent", dec!(10.0))
                / dec!(100),

            n_cycles_per_year: int_or(bag, "n_cycles_per_year", 700),
            dod: num_or(bag, "dod_percent", dec!(80)) / dec!(100),
            price_peak_kwh: num_or(bag, "price_peak_kwh", dec!(0.5037)),
            price_valley_kwh: num_or(bag, "price_valley_kwh", dec!(0.1679)),

            pfr_capacity_mw: num_or(bag, "pfr_capacity_mw", p_rated_mw * dec!(0.5)),
            pfr_annual_service_hours: num_or(bag, "pfr_annual_service_hours", dec!(8000)),
            pfr_compensation_price_mw_hour: num_or(
                bag,
                "pfr_compensation_price_mw_hour",
                dec!(10),
            ),
            pfr_availability_factor: num_or(bag, "pfr_availability_factor_percent", dec!(95))
                / dec!(100),

            agc_capacity_mw: num_or(bag, "agc_capacity_mw", p_rated_mw),
            agc_annual_effective_service_days: num_or(
                bag,
                "agc_annual_effective_service_days",
                dec!(300),
            ),
            agc_compensation_fixed_price_mw_day: num_or(
                bag,
                "agc_compensation_fixed_price_mw_day",
                dec!(150),
            ),
            agc_mileage_price_mwh: num_or(bag, "agc_mileage_price_mwh", dec!(200)),
            agc_k_value: num_or(bag, "agc_k_value", dec!(1.0)),
            agc_response_time_s: num_or(bag, "agc_response_time_s", dec!(30)),
            agc_regulation_accuracy: num_or(bag, "agc_regulation_accuracy_percent", dec!(95))
                / dec!(100),
            agc_regulation_rate_mw_min: num_or(
                bag,
                "agc_regulation_rate_mw_min",
                p_rated_mw * dec!(0.1),
            ),
            agc_daily_calls: num_or(bag, "agc_daily_calls", dec!(20)),
            agc_avg_duration_per_call_min: num_or(bag, "agc_avg_duration_per_call_min", dec!(5)),
            agc_regulation_depth: num_or(bag, "agc_regulation_depth_percent", dec!(20))
                / dec!(100),
            agc_standard_response_time_s_ref: num_or(
                bag,
                "agc_standard_response_time_s_ref",
                dec!(60),
            ),
            agc_standard_accuracy_ref: num_or(
                bag,
                "agc_standard_accuracy_ref_percent",
                dec!(90),
            ) / dec!(100),
            agc_standard_regulation_rate_ratio_ref: num_or(
                bag,
                "agc_standard_regulation_rate_ratio_ref_percent",
                dec!(10),
            ) / dec!(100),

            capacity_market_participation_mw: num_or(
                bag,
                "capacity_market_participation_mw",
                p_rated_mw,
            ),
            capacity_market_price_mw_month: num_or(
                bag,
                "capacity_market_price_mw_month",
                dec!(0),
            ),
            aux_services_annual_revenue_input_before_vat: num_or(
                bag,
                "aux_services_annual_revenue_input_before_vat",
                dec!(0),
            ),
            capacity_lease_annual_revenue_input_before_vat: num_or(
                bag,
                "capacity_lease_annual_revenue_input_before_vat",
                dec!(0),
            ),

            depreciation_years_initial: int_or(bag, "depreciation_years_initial", 10),
            salvage_rate: num_or(bag, "salvage_rate_percent", dec!(5)) / dec!(100),
        }
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

    #[test]
    fn test_defaults_applied_on_empty_bag() {
        let p = NormalizedParams::from_bag(&bag(json!({})));
        assert_eq!(p.p_rated_mw, dec!(100));
        assert_eq!(p.e_rated_mwh, dec!(200));
        assert_eq!(p.life_span_years, 15);
        assert_eq!(p.eta_rt, dec!(0.88));
        assert_eq!(p.deg_rate_annual, dec!(0.015));
        assert_eq!(p.capex_per_kwh, dec!(750));
        assert_eq!(p.loan_percent, dec!(0.70));
        assert_eq!(p.income_tax_rate, dec!(0.25));
        assert_eq!(p.discount_rate_wacc, dec!(0.0538));
        assert_eq!(p.n_cycles_per_year, 700);
        assert_eq!(p.tech_type, "LiFePO4");
        // Service capacities derive from rated power
        assert_eq!(p.pfr_capacity_mw, dec!(50));
        assert_eq!(p.agc_capacity_mw, dec!(100));
        assert_eq!(p.agc_regulation_rate_mw_min, dec!(10));
        assert_eq!(p.capacity_market_participation_mw, dec!(100));
    }

    #[test]
    fn test_percent_fields_divided_exactly_once() {
        let p = NormalizedParams::from_bag(&bag(json!({
            "eta_rt_percent": 90,
            "dod_percent": "85",
            "vat_rate_output_percent": "6%",
        })));
        assert_eq!(p.eta_rt, dec!(0.90));
        assert_eq!(p.dod, dec!(0.85));
        assert_eq!(p.vat_rate_output, dec!(0.06));
    }

    #[test]
    fn test_non_numeric_falls_back_to_default() {
        let p = NormalizedParams::from_bag(&bag(json!({
            "capex_per_kwh": "not-a-number",
            "e_rated_mwh": null,
        })));
        assert_eq!(p.capex_per_kwh, dec!(750));
        assert_eq!(p.e_rated_mwh, dec!(200));
    }

    #[test]
    fn test_integer_zero_defaults_like_parse_int_or() {
        let p = NormalizedParams::from_bag(&bag(json!({
            "life_span_years": 0,
            "loan_term_years": "0",
            "depreciation_years_initial": 8.9,
        })));
        assert_eq!(p.life_span_years, 15);
        assert_eq!(p.loan_term_years, 10);
        // Fractional years truncate
        assert_eq!(p.depreciation_years_initial, 8);
    }

    #[test]
    fn test_boolean_flags() {
        let p = NormalizedParams::from_bag(&bag(json!({
            "include_battery_replacement": "TRUE",
            "use_western_dev_tax": true,
        })));
        assert!(p.include_battery_replacement);
        assert_eq!(p.income_tax_rate, dec!(0.15));

        let p = NormalizedParams::from_bag(&bag(json!({
            "include_battery_replacement": "yes",
            "use_western_dev_tax": 1,
        })));
        assert!(!p.include_battery_replacement);
        assert_eq!(p.income_tax_rate, dec!(0.25));
    }

    #[test]
    fn test_service_capacity_defaults_follow_rated_power() {
        let p = NormalizedParams::from_bag(&bag(json!({ "p_rated_mw": 40 })));
        assert_eq!(p.pfr_capacity_mw, dec!(20));
        assert_eq!(p.agc_capacity_mw, dec!(40));
        assert_eq!(p.agc_regulation_rate_mw_min, dec!(4));
    }

    #[test]
    fn test_explicit_values_override_derived_defaults() {
        let p = NormalizedParams::from_bag(&bag(json!({
            "p_rated_mw": 40,
            "pfr_capacity_mw": 33,
        })));
        assert_eq!(p.pfr_capacity_mw, dec!(33));
    }
}
