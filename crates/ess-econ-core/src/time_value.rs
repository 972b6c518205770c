use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::EssEconError;
use crate::types::{Money, Rate};
use crate::EssEconResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const FLAT_DERIVATIVE_THRESHOLD: Decimal = dec!(0.0000000001);
const MAX_ITERATIONS: u32 = 100;
const BISECTION_LOW: Decimal = dec!(-0.99);
const BISECTION_HIGH: Decimal = dec!(2.0);

/// Outcome of an IRR computation.
///
/// `Infinite` marks the no-investment/pure-gain degenerate case (the return
/// is undefined upward); `Undetermined` means every solver in the chain
/// failed to converge. Both map to a null metric at the result boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IrrOutcome {
    Rate(Rate),
    Infinite,
    Undetermined,
}

impl IrrOutcome {
    pub fn rate(self) -> Option<Rate> {
        match self {
            IrrOutcome::Rate(r) => Some(r),
            _ => None,
        }
    }
}

/// Net Present Value of a series of cash flows (index = period).
pub fn npv(rate: Rate, cash_flows: &[Money]) -> EssEconResult<Money> {
    let mut result = Decimal::ZERO;
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            // Overflowed discount factors mean negligible contributions.
            discount = match discount.checked_mul(one_plus_r) {
                Some(d) => d,
                None => break,
            };
        }
        if discount.is_zero() {
            return Err(EssEconError::DivisionByZero {
                context: format!("NPV discount factor at period {t}"),
            });
        }
        result = cf
            .checked_div(discount)
            .and_then(|term| result.checked_add(term))
            .ok_or_else(|| {
                EssEconError::CalculationFailure(format!("NPV overflow at period {t}"))
            })?;
    }

    Ok(result)
}

/// Internal Rate of Return of a cash-flow sequence.
///
/// Degenerate sequences short-circuit before any solver runs:
/// - empty or all-zero flows: 0
/// - a single negative flow: -1 (total loss)
/// - non-negative throughout with at least one positive: `Infinite`
/// - non-positive throughout with at least one negative: -1
///
/// Otherwise an ordered solver chain is tried (Newton-Raphson seeded with
/// `guess`, then bisection over [-0.99, 2.0]) and the first rate to
/// converge wins. `Undetermined` when the chain is exhausted.
pub fn irr(cash_flows: &[Money], guess: Rate) -> IrrOutcome {
    if cash_flows.is_empty() || cash_flows.iter().all(|cf| cf.is_zero()) {
        return IrrOutcome::Rate(Decimal::ZERO);
    }
    if cash_flows.len() == 1 && cash_flows[0] < Decimal::ZERO {
        return IrrOutcome::Rate(dec!(-1.0));
    }
    if cash_flows.iter().all(|cf| *cf >= Decimal::ZERO)
        && cash_flows.iter().any(|cf| *cf > Decimal::ZERO)
    {
        return IrrOutcome::Infinite;
    }
    if cash_flows.iter().all(|cf| *cf <= Decimal::ZERO)
        && cash_flows.iter().any(|cf| *cf < Decimal::ZERO)
    {
        return IrrOutcome::Rate(dec!(-1.0));
    }

    let solvers: &[fn(&[Money], Rate) -> Option<Rate>] = &[newton_raphson_irr, bisection_irr];
    for solve in solvers {
        if let Some(rate) = solve(cash_flows, guess) {
            return IrrOutcome::Rate(rate);
        }
    }
    IrrOutcome::Undetermined
}

/// NPV evaluated without error plumbing, for solver-internal use.
/// Periods whose discount factor underflows to zero are skipped; a term
/// that overflows saturates the sum, which preserves the sign the
/// bisection bracket needs.
fn npv_at(rate: Rate, cash_flows: &[Money]) -> Decimal {
    let mut result = Decimal::ZERO;
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = match discount.checked_mul(one_plus_r) {
                Some(d) => d,
                None => break,
            };
        }
        if discount.is_zero() {
            continue;
        }
        match cf
            .checked_div(discount)
            .and_then(|term| result.checked_add(term))
        {
            Some(sum) => result = sum,
            None => {
                return if *cf > Decimal::ZERO {
                    Decimal::MAX
                } else {
                    Decimal::MIN
                }
            }
        }
    }
    result
}

/// Newton-Raphson on NPV(rate) = 0 with the analytic derivative of the
/// NPV polynomial. Gives up on a numerically flat derivative so the next
/// solver in the chain can take over.
///
/// Iterates are clamped to [-0.99, 100]: rates at or below -100% make the
/// discount factor meaningless, and runaway positive iterates overflow
/// `Decimal` powers long before they converge. A wild iterate therefore
/// either recovers inside the clamp or exhausts the iteration budget and
/// falls through to bisection.
fn newton_raphson_irr(cash_flows: &[Money], guess: Rate) -> Option<Rate> {
    let mut rate = guess;

    for _ in 0..MAX_ITERATIONS {
        let one_plus_r = Decimal::ONE + rate;
        if one_plus_r.is_zero() {
            return None;
        }

        let mut npv_val = Decimal::ZERO;
        let mut dnpv = Decimal::ZERO;
        let mut discount = Decimal::ONE;
        for (t, cf) in cash_flows.iter().enumerate() {
            if t > 0 {
                discount = match discount.checked_mul(one_plus_r) {
                    Some(d) => d,
                    None => break,
                };
            }
            if discount.is_zero() {
                continue;
            }
            npv_val = match cf
                .checked_div(discount)
                .and_then(|term| npv_val.checked_add(term))
            {
                Some(sum) => sum,
                // The iterate left the trustworthy region; let the next
                // solver in the chain take over.
                None => return None,
            };
            if t > 0 && !cf.is_zero() {
                if let Some(d) = discount.checked_mul(one_plus_r) {
                    if !d.is_zero() {
                        if let Some(next) = Decimal::from(t as i64)
                            .checked_mul(*cf)
                            .and_then(|n| n.checked_div(d))
                            .and_then(|term| dnpv.checked_sub(term))
                        {
                            dnpv = next;
                        }
                    }
                }
            }
        }

        if npv_val.abs() < CONVERGENCE_THRESHOLD {
            return Some(rate);
        }
        if dnpv.abs() < FLAT_DERIVATIVE_THRESHOLD {
            return None;
        }

        let new_rate = match npv_val.checked_div(dnpv).and_then(|s| rate.checked_sub(s)) {
            Some(r) => r,
            None => return None,
        };
        if (new_rate - rate).abs() < CONVERGENCE_THRESHOLD {
            return Some(new_rate);
        }
        rate = new_rate;

        // Divergence clamp, see the doc comment
        if rate < dec!(-0.99) {
            rate = dec!(-0.99);
        } else if rate > dec!(100.0) {
            rate = dec!(100.0);
        }
    }

    None
}

/// 100-step bisection over a fixed bracket. Only useful when NPV changes
/// sign inside [-0.99, 2.0]; returns None otherwise.
fn bisection_irr(cash_flows: &[Money], _guess: Rate) -> Option<Rate> {
    let mut low = BISECTION_LOW;
    let mut high = BISECTION_HIGH;

    for _ in 0..MAX_ITERATIONS {
        let mid = (low + high) / dec!(2);
        if (high - low).abs() < CONVERGENCE_THRESHOLD || mid == low || mid == high {
            break;
        }
        let npv_mid = npv_at(mid, cash_flows);
        if npv_mid.abs() < CONVERGENCE_THRESHOLD {
            return Some(mid);
        }
        if npv_at(low, cash_flows) * npv_mid < Decimal::ZERO {
            high = mid;
        } else {
            low = mid;
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_npv_basic() {
        let cfs = vec![dec!(-1000), dec!(300), dec!(400), dec!(500)];
        let result = npv(dec!(0.10), &cfs).unwrap();
        // -1000 + 300/1.1 + 400/1.21 + 500/1.331 ≈ -21.04
        assert!((result - dec!(-21.04)).abs() < dec!(1.0));
    }

    #[test]
    fn test_npv_zero_rate() {
        let cfs = vec![dec!(-100), dec!(50), dec!(50), dec!(50)];
        assert_eq!(npv(dec!(0.0), &cfs).unwrap(), dec!(50));
    }

    #[test]
    fn test_npv_rate_of_minus_one_errors() {
        let cfs = vec![dec!(-100), dec!(50)];
        assert!(npv(dec!(-1.0), &cfs).is_err());
    }

    #[test]
    fn test_irr_basic() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let rate = irr(&cfs, dec!(0.10)).rate().unwrap();
        // IRR should be ~9.7%
        assert!((rate - dec!(0.097)).abs() < dec!(0.01));
    }

    #[test]
    fn test_irr_npv_consistency() {
        let cfs = vec![dec!(-5000), dec!(1200), dec!(1500), dec!(1800), dec!(2100)];
        let rate = irr(&cfs, dec!(0.10)).rate().unwrap();
        let residual = npv(rate, &cfs).unwrap();
        assert!(residual.abs() < dec!(0.0001), "NPV at IRR = {residual}");
    }

    #[test]
    fn test_irr_all_zero_flows() {
        assert_eq!(
            irr(&[dec!(0), dec!(0), dec!(0)], dec!(0.10)),
            IrrOutcome::Rate(dec!(0))
        );
        assert_eq!(irr(&[], dec!(0.10)), IrrOutcome::Rate(dec!(0)));
    }

    #[test]
    fn test_irr_single_outflow_is_total_loss() {
        assert_eq!(irr(&[dec!(-100)], dec!(0.10)), IrrOutcome::Rate(dec!(-1.0)));
    }

    #[test]
    fn test_irr_no_recovery_is_total_loss() {
        assert_eq!(
            irr(&[dec!(-100), dec!(0), dec!(0)], dec!(0.10)),
            IrrOutcome::Rate(dec!(-1.0))
        );
    }

    #[test]
    fn test_irr_pure_gain_is_infinite() {
        assert_eq!(irr(&[dec!(0), dec!(50), dec!(60)], dec!(0.10)), IrrOutcome::Infinite);
        assert_eq!(irr(&[dec!(10), dec!(50)], dec!(0.10)), IrrOutcome::Infinite);
    }

    #[test]
    fn test_irr_negative_rate_solution() {
        // Recovers less than invested: IRR is negative but defined.
        let cfs = vec![dec!(-1000), dec!(300), dec!(300), dec!(300)];
        let rate = irr(&cfs, dec!(0.10)).rate().unwrap();
        assert!(rate < Decimal::ZERO);
        assert!(npv(rate, &cfs).unwrap().abs() < dec!(0.0001));
    }

    #[test]
    fn test_extreme_guess_still_converges() {
        // A far-off guess flattens the NPV derivative; the chain must
        // still land on the bracketed root via bisection.
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let rate = irr(&cfs, dec!(99)).rate().unwrap();
        assert!((rate - dec!(0.097)).abs() < dec!(0.01));
        assert!(npv(rate, &cfs).unwrap().abs() < dec!(0.0001));
    }

    #[test]
    fn test_bisection_finds_bracketed_root() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let rate = bisection_irr(&cfs, dec!(0.10)).unwrap();
        assert!((rate - dec!(0.097)).abs() < dec!(0.01));
    }
}
