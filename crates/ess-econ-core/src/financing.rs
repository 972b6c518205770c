use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Rate};

/// One year's debt service under an equal-principal schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanPayment {
    pub interest: Money,
    pub principal: Money,
    pub remaining_balance: Money,
}

/// Compute one year's interest, principal, and end-of-year balance for an
/// equal-principal (not equal-installment) loan.
///
/// Each eligible year repays `loan_amount / loan_term_years` of principal;
/// interest is charged on the balance outstanding at the start of the year.
/// The final year's principal is clamped to the remaining balance so
/// rounding residue is never overpaid.
///
/// Guarded cases (`year <= 0`, `year > loan_term_years`,
/// `loan_amount <= 0.01`, `annual_rate < 0`, `loan_term_years == 0`) return
/// zero interest and principal. The remaining balance on that path is still
/// the amount outstanding after `year - 1` scheduled repayments, with no
/// floor at zero; for `year > loan_term_years` it goes negative. Callers
/// only read interest/principal in the guarded region.
pub fn equal_principal_payment(
    loan_amount: Money,
    annual_rate: Rate,
    loan_term_years: i64,
    year: i64,
) -> LoanPayment {
    if year <= 0
        || year > loan_term_years
        || loan_amount <= dec!(0.01)
        || annual_rate < Decimal::ZERO
        || loan_term_years <= 0
    {
        let remaining = if loan_amount > dec!(0.01) {
            if loan_term_years > 0 {
                let annual_principal = loan_amount / Decimal::from(loan_term_years);
                loan_amount - annual_principal * Decimal::from((year - 1).max(0))
            } else {
                loan_amount
            }
        } else {
            Decimal::ZERO
        };
        return LoanPayment {
            interest: Decimal::ZERO,
            principal: Decimal::ZERO,
            remaining_balance: remaining,
        };
    }

    let annual_principal = loan_amount / Decimal::from(loan_term_years);
    let balance_at_start = loan_amount - annual_principal * Decimal::from(year - 1);
    let interest = balance_at_start * annual_rate;
    let principal = annual_principal.min(balance_at_start);

    LoanPayment {
        interest,
        principal,
        remaining_balance: balance_at_start - principal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_principal_sums_to_loan_amount() {
        let loan = dec!(70_000_000);
        let mut total_principal = Decimal::ZERO;
        let mut last_balance = loan;
        for year in 1..=10 {
            let p = equal_principal_payment(loan, dec!(0.03), 10, year);
            total_principal += p.principal;
            last_balance = p.remaining_balance;
        }
        assert!((total_principal - loan).abs() < dec!(0.01));
        assert!(last_balance.abs() < dec!(0.01));
    }

    #[test]
    fn test_interest_on_start_of_year_balance() {
        // Year 1: full balance. Year 2: balance less one repayment.
        let p1 = equal_principal_payment(dec!(1000), dec!(0.05), 5, 1);
        assert_eq!(p1.interest, dec!(50));
        assert_eq!(p1.principal, dec!(200));
        assert_eq!(p1.remaining_balance, dec!(800));

        let p2 = equal_principal_payment(dec!(1000), dec!(0.05), 5, 2);
        assert_eq!(p2.interest, dec!(40));
        assert_eq!(p2.principal, dec!(200));
        assert_eq!(p2.remaining_balance, dec!(600));
    }

    #[test]
    fn test_year_zero_is_guarded() {
        let p = equal_principal_payment(dec!(1000), dec!(0.05), 5, 0);
        assert_eq!(p.interest, Decimal::ZERO);
        assert_eq!(p.principal, Decimal::ZERO);
        // year - 1 clamps to 0 repayments: full balance outstanding
        assert_eq!(p.remaining_balance, dec!(1000));
    }

    #[test]
    fn test_year_past_term_keeps_unfloored_balance() {
        let p = equal_principal_payment(dec!(1000), dec!(0.05), 5, 7);
        assert_eq!(p.interest, Decimal::ZERO);
        assert_eq!(p.principal, Decimal::ZERO);
        // 6 repayments of 200 against a 1000 loan: -200, preserved unfloored
        assert_eq!(p.remaining_balance, dec!(-200));
    }

    #[test]
    fn test_negligible_loan_is_guarded() {
        let p = equal_principal_payment(dec!(0.005), dec!(0.05), 5, 3);
        assert_eq!(p.interest, Decimal::ZERO);
        assert_eq!(p.principal, Decimal::ZERO);
        assert_eq!(p.remaining_balance, Decimal::ZERO);
    }

    #[test]
    fn test_negative_rate_is_guarded() {
        let p = equal_principal_payment(dec!(1000), dec!(-0.01), 5, 2);
        assert_eq!(p.interest, Decimal::ZERO);
        assert_eq!(p.principal, Decimal::ZERO);
        assert_eq!(p.remaining_balance, dec!(800));
    }

    #[test]
    fn test_zero_term_is_guarded() {
        let p = equal_principal_payment(dec!(1000), dec!(0.05), 0, 1);
        assert_eq!(p.interest, Decimal::ZERO);
        assert_eq!(p.principal, Decimal::ZERO);
        assert_eq!(p.remaining_balance, dec!(1000));
    }

    #[test]
    fn test_final_year_principal_clamp() {
        // 3-year term over 100: repayments of 33.33..; the clamp keeps the
        // last principal at the remaining balance, never above it.
        let loan = dec!(100);
        let mut balance = loan;
        for year in 1..=3 {
            let p = equal_principal_payment(loan, dec!(0.04), 3, year);
            assert!(p.principal <= balance + dec!(0.0000001));
            balance = p.remaining_balance;
        }
        assert!(balance.abs() < dec!(0.0000001));
    }
}
