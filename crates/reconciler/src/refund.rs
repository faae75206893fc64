//! Refund estimate for accepted filings
//!
//! A deliberately simplified placeholder: a flat rate applied to income above
//! a standard deduction. The constants come from [`RefundEstimateConfig`].
//! Amounts are stored as decimal dollars but computed in integer cents.

use crate::config::RefundEstimateConfig;

/// Breakdown of a refund estimate, in cents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundEstimate {
    pub taxable_income_cents: i64,
    pub estimated_liability_cents: i64,
    /// Positive means a refund, negative means an amount owed
    pub refund_cents: i64,
}

impl RefundEstimate {
    /// Refund in dollars, as written to `refund_estimate`
    pub fn refund_dollars(&self) -> f64 {
        cents_to_dollars(self.refund_cents)
    }
}

/// Convert a dollar amount to whole cents, rejecting NaN and infinities
pub fn dollars_to_cents(amount: f64) -> Option<i64> {
    if !amount.is_finite() {
        return None;
    }
    // Float-to-int casts saturate at the i64 bounds
    Some((amount * 100.0).round() as i64)
}

pub fn cents_to_dollars(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Estimate the refund for the given wages and federal withholding
///
/// Returns `None` when any input or configured constant is not finite.
pub fn estimate_refund(
    config: &RefundEstimateConfig,
    wages: f64,
    federal_tax_withheld: f64,
) -> Option<RefundEstimate> {
    let wages_cents = dollars_to_cents(wages)?;
    let withheld_cents = dollars_to_cents(federal_tax_withheld)?;
    let deduction_cents = dollars_to_cents(config.standard_deduction)?;
    if !config.flat_rate.is_finite() {
        return None;
    }

    let taxable_income_cents = wages_cents.saturating_sub(deduction_cents).max(0);
    let estimated_liability_cents = (taxable_income_cents as f64 * config.flat_rate).round() as i64;
    let refund_cents = withheld_cents.saturating_sub(estimated_liability_cents);

    Some(RefundEstimate {
        taxable_income_cents,
        estimated_liability_cents,
        refund_cents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_scenario() {
        let estimate =
            estimate_refund(&RefundEstimateConfig::default(), 75_000.0, 10_000.0).unwrap();

        assert_eq!(estimate.taxable_income_cents, 6_115_000);
        assert_eq!(estimate.estimated_liability_cents, 611_500);
        assert_eq!(estimate.refund_cents, 388_500);
        assert_eq!(estimate.refund_dollars(), 3_885.0);
    }

    #[test]
    fn test_wages_below_deduction_have_no_liability() {
        let estimate = estimate_refund(&RefundEstimateConfig::default(), 9_000.0, 450.0).unwrap();

        assert_eq!(estimate.taxable_income_cents, 0);
        assert_eq!(estimate.estimated_liability_cents, 0);
        assert_eq!(estimate.refund_cents, 45_000);
    }

    #[test]
    fn test_zero_wages_refund_everything_withheld() {
        let estimate = estimate_refund(&RefundEstimateConfig::default(), 0.0, 1_200.0).unwrap();

        assert_eq!(estimate.estimated_liability_cents, 0);
        assert_eq!(estimate.refund_dollars(), 1_200.0);
    }

    #[test]
    fn test_under_withholding_is_negative() {
        let estimate =
            estimate_refund(&RefundEstimateConfig::default(), 113_850.0, 2_000.0).unwrap();

        assert_eq!(estimate.estimated_liability_cents, 1_000_000);
        assert_eq!(estimate.refund_cents, -800_000);
    }

    #[test]
    fn test_constants_are_configurable() {
        let config = RefundEstimateConfig {
            standard_deduction: 10_000.0,
            flat_rate: 0.2,
        };
        let estimate = estimate_refund(&config, 20_000.0, 1_500.0).unwrap();

        assert_eq!(estimate.estimated_liability_cents, 200_000);
        assert_eq!(estimate.refund_dollars(), -500.0);
    }

    #[test]
    fn test_inputs_are_rounded_to_cents() {
        let config = RefundEstimateConfig {
            standard_deduction: 0.0,
            flat_rate: 0.1,
        };
        let estimate = estimate_refund(&config, 100.126, 20.0).unwrap();

        assert_eq!(estimate.taxable_income_cents, 10_013);
        assert_eq!(estimate.estimated_liability_cents, 1_001);
        assert_eq!(estimate.refund_dollars(), 9.99);
    }

    #[test]
    fn test_non_finite_amounts_produce_no_estimate() {
        let config = RefundEstimateConfig::default();
        assert!(estimate_refund(&config, f64::NAN, 100.0).is_none());
        assert!(estimate_refund(&config, 50_000.0, f64::INFINITY).is_none());

        let bad_rate = RefundEstimateConfig {
            flat_rate: f64::NAN,
            ..config
        };
        assert!(estimate_refund(&bad_rate, 50_000.0, 100.0).is_none());
    }
}
