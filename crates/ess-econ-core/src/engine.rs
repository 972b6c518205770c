use std::time::Instant;

use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::EssEconError;
use crate::financing::equal_principal_payment;
use crate::params::{InputBag, NormalizedParams};
use crate::time_value::{irr, npv, IrrOutcome};
use crate::types::{with_metadata, ComputationOutput, MetricValue, Money, Rate};
use crate::EssEconResult;

const IRR_GUESS: Rate = dec!(0.1);

// ─────────────────────────── Output types ───────────────────────────

/// One year of the cash-flow statement. Year 0 is the construction year:
/// only capex, financing, and the initial VAT credit are populated, with
/// every operating line at zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnualCashFlow {
    pub year: i64,
    pub capex: Money,
    pub vat_input_initial_credit: Money,
    pub equity_contribution: Money,
    pub debt_drawdown: Money,
    pub total_revenue_before_vat: Money,
    pub revenue_arbitrage: Money,
    pub revenue_pfr: Money,
    pub revenue_agc_capacity: Money,
    pub revenue_agc_mileage: Money,
    pub revenue_capacity_market: Money,
    pub revenue_aux_other_input: Money,
    pub opex_before_vat: Money,
    pub vat_payable_net: Money,
    pub surtax_on_vat: Money,
    pub ebitda: Money,
    pub depreciation: Money,
    pub ebit: Money,
    pub interest: Money,
    pub ebt: Money,
    pub loss_offset: Money,
    pub taxable_income_final: Money,
    pub income_tax: Money,
    pub net_profit: Money,
    pub principal_repayment: Money,
    pub current_year_replacement_vat_credit: Money,
    pub project_pre_tax_cash_flow: Money,
    pub fcff: Money,
    pub fcfe: Money,
}

/// Headline investment figures, rounded to 2 decimal places.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicSummary {
    #[serde(rename = "totalInitialInvestment")]
    pub total_initial_investment: Money,
    #[serde(rename = "netInitialInvestmentAfterVATCredit")]
    pub net_initial_investment_after_vat_credit: Money,
    #[serde(rename = "equityInvestment")]
    pub equity_investment: Money,
    #[serde(rename = "loanAmount")]
    pub loan_amount: Money,
    #[serde(rename = "totalRevenueYear1")]
    pub total_revenue_year1: Money,
    #[serde(rename = "totalOpexYear1")]
    pub total_opex_year1: Money,
}

/// Full analysis results. IRR/NPV/payback metrics are `None` when the
/// underlying solver did not converge (or the IRR is unbounded); the
/// cash-flow statement itself is always present and unrounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicResults {
    #[serde(rename = "projectIRRPreTax")]
    pub project_irr_pre_tax: Option<Decimal>,
    #[serde(rename = "projectIRRPostTax")]
    pub project_irr_post_tax: Option<Decimal>,
    #[serde(rename = "equityIRRPostTax")]
    pub equity_irr_post_tax: Option<Decimal>,
    #[serde(rename = "projectNPV")]
    pub project_npv: Option<Money>,
    #[serde(rename = "equityNPV")]
    pub equity_npv: Option<Money>,
    #[serde(rename = "staticPaybackPeriodEquity")]
    pub static_payback_period_equity: Option<Decimal>,
    #[serde(rename = "dynamicPaybackPeriodEquity")]
    pub dynamic_payback_period_equity: Option<Decimal>,
    pub lcos: Option<Decimal>,
    #[serde(rename = "annualCashFlows")]
    pub annual_cash_flows: Vec<AnnualCashFlow>,
    pub summary: EconomicSummary,
}

impl EconomicResults {
    /// Look up a scalar metric by its wire name. Structured fields (the
    /// cash-flow statement, the summary block) are not addressable here.
    pub fn metric(&self, name: &str) -> MetricValue {
        match name {
            "projectIRRPreTax" => MetricValue::Present(self.project_irr_pre_tax),
            "projectIRRPostTax" => MetricValue::Present(self.project_irr_post_tax),
            "equityIRRPostTax" => MetricValue::Present(self.equity_irr_post_tax),
            "projectNPV" => MetricValue::Present(self.project_npv),
            "equityNPV" => MetricValue::Present(self.equity_npv),
            "staticPaybackPeriodEquity" => {
                MetricValue::Present(self.static_payback_period_equity)
            }
            "dynamicPaybackPeriodEquity" => {
                MetricValue::Present(self.dynamic_payback_period_equity)
            }
            "lcos" => MetricValue::Present(self.lcos),
            _ => MetricValue::Unavailable,
        }
    }
}

// ─────────────────────── Tax-loss carryforward ───────────────────────

#[derive(Debug, Clone)]
struct TaxLossEntry {
    loss: Money,
    year_generated: i64,
    remaining_years: i64,
}

/// Queue of unexpired tax losses, offset oldest-first.
#[derive(Debug, Clone, Default)]
pub(crate) struct TaxLossLedger {
    entries: Vec<TaxLossEntry>,
}

impl TaxLossLedger {
    /// Offset positive taxable income against carried losses, oldest
    /// first. Returns the total amount offset; each entry's tracked loss
    /// is reduced by exactly what it contributed, and entries worn down
    /// below 0.01 are purged.
    pub(crate) fn offset(&mut self, taxable_income: Money) -> Money {
        if taxable_income <= Decimal::ZERO || self.entries.is_empty() {
            return Decimal::ZERO;
        }
        self.entries.sort_by_key(|e| e.year_generated);
        let mut remaining_income = taxable_income;
        let mut total_offset = Decimal::ZERO;
        for entry in &mut self.entries {
            if remaining_income <= Decimal::ZERO {
                break;
            }
            let offset_amount = remaining_income.min(entry.loss);
            remaining_income -= offset_amount;
            entry.loss -= offset_amount;
            total_offset += offset_amount;
        }
        self.entries.retain(|e| e.loss > dec!(0.01));
        total_offset
    }

    pub(crate) fn record_loss(&mut self, loss: Money, year: i64, max_carry_years: i64) {
        self.entries.push(TaxLossEntry {
            loss,
            year_generated: year,
            remaining_years: max_carry_years,
        });
    }

    /// End-of-year aging: entries born in earlier years lose a year of
    /// life; expired entries drop out.
    pub(crate) fn age(&mut self, current_year: i64) {
        for entry in &mut self.entries {
            if entry.year_generated < current_year {
                entry.remaining_years -= 1;
            }
        }
        self.entries.retain(|e| e.remaining_years >= 0);
    }

    #[cfg(test)]
    fn total_outstanding(&self) -> Money {
        self.entries.iter().map(|e| e.loss).sum()
    }
}

// ─────────────────────────── Engine proper ───────────────────────────

fn round2(v: Decimal) -> Decimal {
    v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn round4(v: Decimal) -> Decimal {
    v.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

fn degradation_factor(deg_rate_annual: Rate, year: i64) -> Decimal {
    (Decimal::ONE - deg_rate_annual)
        .checked_powi(year - 1)
        .unwrap_or(Decimal::ZERO)
}

/// End-of-life book values of the initial and replacement assets.
///
/// Fully depreciated assets are worth their salvage fraction; assets whose
/// depreciation window outruns the project life are worth the undepreciated
/// remainder instead.
fn salvage_values(
    p: &NormalizedParams,
    total_construction_cost: Money,
    annual_depreciation_initial: Money,
    replacement_cost_before_vat: Money,
    annual_depreciation_replacement: Money,
) -> (Money, Money) {
    let life = Decimal::from(p.life_span_years);
    let salvage_initial = if p.life_span_years >= p.depreciation_years_initial {
        total_construction_cost * p.salvage_rate
    } else {
        total_construction_cost - annual_depreciation_initial * life
    };

    let mut salvage_replacement = Decimal::ZERO;
    if p.include_battery_replacement && p.replacement_year < p.life_span_years {
        let remaining_life = p.life_span_years - p.replacement_year;
        let dep_years = p.depreciation_years_replacement.min(remaining_life);
        salvage_replacement = if remaining_life >= dep_years {
            replacement_cost_before_vat * p.salvage_rate
        } else {
            replacement_cost_before_vat
                - annual_depreciation_replacement * Decimal::from(remaining_life)
        };
    }
    (salvage_initial, salvage_replacement)
}

/// Run the full discounted-cash-flow analysis over a raw parameter bag.
///
/// Normalizes the bag, builds the CAPEX stack and financing split, walks
/// the project life year by year (degradation, revenue streams, VAT and
/// surtax, depreciation windows, debt service, loss carryforward, free
/// cash flows, payback interpolation), then derives the IRR/NPV/LCOS
/// metrics from the accumulated series.
pub fn calculate_economics(
    inputs: &InputBag,
) -> EssEconResult<ComputationOutput<EconomicResults>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let p = NormalizedParams::from_bag(inputs);
    if p.eta_rt <= Decimal::ZERO {
        return Err(EssEconError::DivisionByZero {
            context: "round-trip efficiency (eta_rt_percent must be positive)".to_string(),
        });
    }

    // ── Initial investment ──
    let e_rated_kwh = p.e_rated_mwh * dec!(1000);
    let p_rated_kw = p.p_rated_mw * dec!(1000);
    let mut initial_epc_cost = p.capex_per_kwh * e_rated_kwh + p.capex_per_kw * p_rated_kw;
    if initial_epc_cost <= Decimal::ZERO {
        // Zero or negative unit costs fall back to a 750/kWh build-up so
        // the model never runs on a free plant.
        initial_epc_cost = if p.capex_per_kwh > Decimal::ZERO {
            p.capex_per_kwh * e_rated_kwh
        } else if p.capex_per_kw > Decimal::ZERO {
            p.capex_per_kw * p_rated_kw
        } else {
            dec!(750) * e_rated_kwh
        };
    }
    let other_initial_cost = initial_epc_cost * p.other_capex_rate;
    let total_construction_cost = initial_epc_cost + other_initial_cost;
    let initial_investment_vat_credit = total_construction_cost * p.vat_rate_capex_input;
    let loan_amount = total_construction_cost * p.loan_percent;
    let equity_investment = total_construction_cost - loan_amount;

    // ── Recurring figures ──
    let annual_opex_before_vat =
        initial_epc_cost * p.opex_rate_on_epc + p.opex_annual_fixed_other;
    let initial_depreciable_value = total_construction_cost * (Decimal::ONE - p.salvage_rate);
    let annual_depreciation_initial =
        initial_depreciable_value / Decimal::from(p.depreciation_years_initial);

    let mut replacement_cost_before_vat = Decimal::ZERO;
    let mut replacement_vat_credit = Decimal::ZERO;
    let mut annual_depreciation_replacement = Decimal::ZERO;
    if p.include_battery_replacement
        && p.replacement_year > 0
        && p.replacement_year < p.life_span_years
    {
        replacement_cost_before_vat = p.replacement_cost_per_kwh * e_rated_kwh;
        replacement_vat_credit = replacement_cost_before_vat * p.vat_rate_capex_input;
        let replacement_depreciable_value =
            replacement_cost_before_vat * (Decimal::ONE - p.salvage_rate);
        let dep_years = p
            .depreciation_years_replacement
            .min(p.life_span_years - p.replacement_year);
        if dep_years > 0 {
            annual_depreciation_replacement =
                replacement_depreciable_value / Decimal::from(dep_years);
        }
    }

    // ── Year-by-year simulation ──
    let mut records: Vec<AnnualCashFlow> = Vec::new();
    let mut project_pre_tax_series: Vec<Money> =
        vec![-total_construction_cost + initial_investment_vat_credit];
    let mut loss_ledger = TaxLossLedger::default();

    let year0_net_equity_outlay = -equity_investment + initial_investment_vat_credit;
    let mut cumulative_fcfe = year0_net_equity_outlay;
    let mut cumulative_discounted_fcfe = year0_net_equity_outlay;
    let mut static_payback: Option<Decimal> = None;
    let mut dynamic_payback: Option<Decimal> = None;

    for year in 0..=p.life_span_years {
        if year == 0 {
            let fcf0 = -total_construction_cost + initial_investment_vat_credit;
            records.push(AnnualCashFlow {
                year: 0,
                capex: -total_construction_cost,
                vat_input_initial_credit: initial_investment_vat_credit,
                equity_contribution: -equity_investment,
                debt_drawdown: loan_amount,
                fcff: fcf0,
                fcfe: year0_net_equity_outlay,
                ..AnnualCashFlow::default()
            });
            continue;
        }

        let mut cf = AnnualCashFlow {
            year,
            ..AnnualCashFlow::default()
        };

        let capacity_factor = degradation_factor(p.deg_rate_annual, year);
        let p_effective_mw = p.p_rated_mw * capacity_factor;
        let e_effective_kwh = e_rated_kwh * capacity_factor;

        // Revenue streams (all before VAT)
        let annual_discharge_kwh =
            Decimal::from(p.n_cycles_per_year) * e_effective_kwh * p.dod;
        let annual_charge_kwh = annual_discharge_kwh / p.eta_rt;
        cf.revenue_arbitrage =
            annual_discharge_kwh * p.price_peak_kwh - annual_charge_kwh * p.price_valley_kwh;

        let actual_pfr_capacity = p.pfr_capacity_mw.min(p_effective_mw);
        cf.revenue_pfr = actual_pfr_capacity
            * p.pfr_annual_service_hours
            * p.pfr_compensation_price_mw_hour
            * p.pfr_availability_factor;

        let actual_agc_capacity = p.agc_capacity_mw.min(p_effective_mw);
        cf.revenue_agc_capacity = actual_agc_capacity
            * p.agc_annual_effective_service_days
            * p.agc_compensation_fixed_price_mw_day;

        // AGC mileage: performance factors K_T, K_D, K_R each capped at 1,
        // combined with the market adjustment coefficient.
        let kt_response = if p.agc_response_time_s > Decimal::ZERO {
            (p.agc_standard_response_time_s_ref / p.agc_response_time_s).min(Decimal::ONE)
        } else {
            Decimal::ONE
        };
        let kd_accuracy = if p.agc_standard_accuracy_ref > Decimal::ZERO {
            (p.agc_regulation_accuracy / p.agc_standard_accuracy_ref).min(Decimal::ONE)
        } else {
            Decimal::ONE
        };
        let standard_rate_ref = actual_agc_capacity * p.agc_standard_regulation_rate_ratio_ref;
        let kr_rate = if p.agc_regulation_rate_mw_min > Decimal::ZERO
            && standard_rate_ref > Decimal::ZERO
        {
            (p.agc_regulation_rate_mw_min / standard_rate_ref).min(Decimal::ONE)
        } else {
            Decimal::ONE
        };
        let k_overall = p.agc_k_value * kt_response * kd_accuracy * kr_rate;
        let daily_mileage_mwh = actual_agc_capacity
            * p.agc_daily_calls
            * (p.agc_avg_duration_per_call_min / dec!(60))
            * p.agc_regulation_depth;
        let annual_effective_mileage_mwh =
            daily_mileage_mwh * p.agc_annual_effective_service_days * k_overall;
        cf.revenue_agc_mileage = annual_effective_mileage_mwh * p.agc_mileage_price_mwh;

        let actual_capacity_market = p.capacity_market_participation_mw.min(p_effective_mw);
        cf.revenue_capacity_market =
            actual_capacity_market * p.capacity_market_price_mw_month * dec!(12);

        // Flat-revenue fallbacks: when the itemized ancillary model
        // produces nothing, degrade the caller's flat annual figure
        // instead.
        let calculated_aux_revenue =
            cf.revenue_pfr + cf.revenue_agc_capacity + cf.revenue_agc_mileage;
        if calculated_aux_revenue.abs() < Decimal::ONE
            && p.aux_services_annual_revenue_input_before_vat > Decimal::ZERO
        {
            cf.revenue_aux_other_input =
                p.aux_services_annual_revenue_input_before_vat * capacity_factor;
            cf.revenue_pfr = Decimal::ZERO;
            cf.revenue_agc_capacity = Decimal::ZERO;
            cf.revenue_agc_mileage = Decimal::ZERO;
        }
        if cf.revenue_capacity_market.abs() < Decimal::ONE
            && p.capacity_lease_annual_revenue_input_before_vat > Decimal::ZERO
        {
            cf.revenue_capacity_market =
                p.capacity_lease_annual_revenue_input_before_vat * capacity_factor;
        }

        cf.total_revenue_before_vat = cf.revenue_arbitrage
            + cf.revenue_pfr
            + cf.revenue_agc_capacity
            + cf.revenue_agc_mileage
            + cf.revenue_aux_other_input
            + cf.revenue_capacity_market;

        // VAT and surtax
        cf.opex_before_vat = annual_opex_before_vat;
        let vat_output = cf.total_revenue_before_vat * p.vat_rate_output;
        let mut vat_input = cf.opex_before_vat * p.vat_rate_opex_input;
        if p.include_battery_replacement && year == p.replacement_year {
            vat_input += replacement_cost_before_vat * p.vat_rate_capex_input;
        }
        cf.vat_payable_net = (vat_output - vat_input).max(Decimal::ZERO);
        cf.surtax_on_vat = cf.vat_payable_net * p.surtax_rate_on_vat;
        // Surtax is treated as an operating charge above the EBITDA line.
        cf.ebitda = cf.total_revenue_before_vat - cf.opex_before_vat - cf.surtax_on_vat;

        // Depreciation: initial and replacement windows stack.
        cf.depreciation = Decimal::ZERO;
        if year <= p.depreciation_years_initial {
            cf.depreciation += annual_depreciation_initial;
        }
        if p.include_battery_replacement && year > p.replacement_year {
            let dep_years = p
                .depreciation_years_replacement
                .min(p.life_span_years - p.replacement_year);
            if year <= p.replacement_year + dep_years {
                cf.depreciation += annual_depreciation_replacement;
            }
        }
        cf.ebit = cf.ebitda - cf.depreciation;

        // Debt service
        let payment =
            equal_principal_payment(loan_amount, p.interest_rate_annual, p.loan_term_years, year);
        cf.interest = payment.interest;
        cf.principal_repayment = payment.principal;
        cf.ebt = cf.ebit - cf.interest;

        // Income tax with loss carryforward
        cf.loss_offset = loss_ledger.offset(cf.ebt);
        cf.taxable_income_final = cf.ebt - cf.loss_offset;
        cf.income_tax = (cf.taxable_income_final * p.income_tax_rate).max(Decimal::ZERO);
        if cf.ebt < Decimal::ZERO {
            loss_ledger.record_loss(cf.ebt.abs(), year, p.max_loss_carry_forward_years);
        }
        loss_ledger.age(year);
        cf.net_profit = cf.ebt - cf.income_tax;

        // Replacement capex event
        if p.include_battery_replacement && year == p.replacement_year {
            cf.capex = -replacement_cost_before_vat;
            cf.current_year_replacement_vat_credit = replacement_vat_credit;
        }

        cf.project_pre_tax_cash_flow = cf.total_revenue_before_vat - cf.opex_before_vat
            + cf.capex
            + cf.current_year_replacement_vat_credit;

        let mut salvage_total = Decimal::ZERO;
        if year == p.life_span_years {
            let (salvage_initial, salvage_replacement) = salvage_values(
                &p,
                total_construction_cost,
                annual_depreciation_initial,
                replacement_cost_before_vat,
                annual_depreciation_replacement,
            );
            salvage_total =
                salvage_initial.max(Decimal::ZERO) + salvage_replacement.max(Decimal::ZERO);
            cf.project_pre_tax_cash_flow += salvage_total;
        }
        project_pre_tax_series.push(cf.project_pre_tax_cash_flow);

        // Free cash flows
        let nopat = cf.ebit * (Decimal::ONE - p.income_tax_rate);
        let net_vat_and_surtax = cf.vat_payable_net + cf.surtax_on_vat;
        cf.fcff = nopat + cf.depreciation + cf.capex + cf.current_year_replacement_vat_credit
            - net_vat_and_surtax
            + salvage_total;
        cf.fcfe = cf.net_profit + cf.depreciation + cf.capex
            + cf.current_year_replacement_vat_credit
            - cf.principal_repayment
            - net_vat_and_surtax
            + salvage_total;

        // Payback accumulation freezes at the first crossing; years with
        // non-positive FCFE do not accumulate at all.
        if static_payback.is_none() && cf.fcfe > Decimal::ZERO {
            cumulative_fcfe += cf.fcfe;
            if cumulative_fcfe >= Decimal::ZERO {
                let mut prev_cumulative = year0_net_equity_outlay;
                for record in records.iter().skip(1) {
                    prev_cumulative += record.fcfe;
                }
                static_payback =
                    Some(Decimal::from(year - 1) + prev_cumulative.abs() / cf.fcfe);
            }
        }
        if dynamic_payback.is_none() && cf.fcfe > Decimal::ZERO {
            if let Some(discount) = (Decimal::ONE + p.equity_discount_rate).checked_powi(year) {
                if !discount.is_zero() {
                    let discounted_fcfe = cf.fcfe / discount;
                    cumulative_discounted_fcfe += discounted_fcfe;
                    if cumulative_discounted_fcfe >= Decimal::ZERO {
                        let mut prev_cumulative = year0_net_equity_outlay;
                        for record in records.iter().skip(1) {
                            let factor = (Decimal::ONE + p.equity_discount_rate)
                                .checked_powi(record.year)
                                .unwrap_or(Decimal::ONE);
                            if !factor.is_zero() {
                                prev_cumulative += record.fcfe / factor;
                            }
                        }
                        dynamic_payback = Some(
                            Decimal::from(year - 1) + prev_cumulative.abs() / discounted_fcfe,
                        );
                    }
                }
            }
        }

        records.push(cf);
    }

    // ── Financial metrics ──
    let fcff_series: Vec<Money> = records.iter().map(|r| r.fcff).collect();
    let fcfe_series: Vec<Money> = records.iter().map(|r| r.fcfe).collect();

    let project_irr_pre_tax =
        resolve_irr("projectIRRPreTax", &project_pre_tax_series, &mut warnings);
    let project_irr_post_tax = resolve_irr("projectIRRPostTax", &fcff_series, &mut warnings);
    let equity_irr_post_tax = resolve_irr("equityIRRPostTax", &fcfe_series, &mut warnings);

    let project_npv = resolve_npv("projectNPV", p.discount_rate_wacc, &fcff_series, &mut warnings);
    let equity_npv = resolve_npv("equityNPV", p.equity_discount_rate, &fcfe_series, &mut warnings);

    // ── LCOS (undiscounted lifecycle cost per kWh discharged) ──
    let mut lifecycle_cost = total_construction_cost - initial_investment_vat_credit;
    let mut lifetime_discharge_mwh = Decimal::ZERO;
    for year in 1..=p.life_span_years {
        let record = &records[year as usize];
        lifecycle_cost += record.opex_before_vat + record.surtax_on_vat;
        if p.include_battery_replacement && year == p.replacement_year {
            lifecycle_cost += replacement_cost_before_vat - replacement_vat_credit;
        }
        if year == p.life_span_years {
            let (salvage_initial, salvage_replacement) = salvage_values(
                &p,
                total_construction_cost,
                annual_depreciation_initial,
                replacement_cost_before_vat,
                annual_depreciation_replacement,
            );
            lifecycle_cost -=
                salvage_initial.max(Decimal::ZERO) + salvage_replacement.max(Decimal::ZERO);
        }
        lifetime_discharge_mwh += Decimal::from(p.n_cycles_per_year)
            * p.e_rated_mwh
            * degradation_factor(p.deg_rate_annual, year)
            * p.dod;
    }
    let lcos = if lifetime_discharge_mwh > Decimal::ZERO {
        Some(round4(lifecycle_cost / (lifetime_discharge_mwh * dec!(1000))))
    } else {
        None
    };

    let summary = EconomicSummary {
        total_initial_investment: round2(total_construction_cost),
        net_initial_investment_after_vat_credit: round2(
            total_construction_cost - initial_investment_vat_credit,
        ),
        equity_investment: round2(equity_investment),
        loan_amount: round2(loan_amount),
        total_revenue_year1: records
            .get(1)
            .map(|r| round2(r.total_revenue_before_vat))
            .unwrap_or(Decimal::ZERO),
        total_opex_year1: records
            .get(1)
            .map(|r| round2(r.opex_before_vat))
            .unwrap_or(Decimal::ZERO),
    };

    let results = EconomicResults {
        project_irr_pre_tax,
        project_irr_post_tax,
        equity_irr_post_tax,
        project_npv: project_npv.map(round2),
        equity_npv: equity_npv.map(round2),
        static_payback_period_equity: static_payback.map(round2),
        dynamic_payback_period_equity: dynamic_payback.map(round2),
        lcos,
        annual_cash_flows: records,
        summary,
    };

    let assumptions = json!({
        "tech_type": p.tech_type,
        "life_span_years": p.life_span_years,
        "discount_rate_wacc": p.discount_rate_wacc,
        "equity_discount_rate": p.equity_discount_rate,
        "income_tax_rate": p.income_tax_rate,
        "include_battery_replacement": p.include_battery_replacement,
    });

    Ok(with_metadata(
        "Discounted cash flow with equal-principal debt service, net VAT settlement, \
         additive depreciation windows, and tax-loss carryforward",
        &assumptions,
        warnings,
        start.elapsed().as_micros() as u64,
        results,
    ))
}

/// IRR as a rounded percentage; `None` (with a warning) when the return is
/// unbounded or no solver converged.
fn resolve_irr(name: &str, series: &[Money], warnings: &mut Vec<String>) -> Option<Decimal> {
    match irr(series, IRR_GUESS) {
        IrrOutcome::Rate(rate) => Some(round2(rate * dec!(100))),
        IrrOutcome::Infinite => {
            warnings.push(format!(
                "{name}: cash flows contain no investment, return is unbounded"
            ));
            None
        }
        IrrOutcome::Undetermined => {
            warnings.push(format!("{name}: IRR solvers did not converge"));
            None
        }
    }
}

fn resolve_npv(
    name: &str,
    rate: Rate,
    series: &[Money],
    warnings: &mut Vec<String>,
) -> Option<Money> {
    match npv(rate, series) {
        Ok(value) => Some(value),
        Err(e) => {
            warnings.push(format!("{name}: {e}"));
            None
        }
    }
}
