use super::tax::TaxSchedule;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ConversionPolicy {
    /// Convert a fixed amount each year the window is open.
    Manual { annual_amount: f64 },
    /// Convert just enough to fill the bracket at `target_bracket`.
    AutoOptimize { target_bracket: usize },
}

/// Roth conversions run for every age in `start_age..=end_age` while the traditional pool
/// still holds funds.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RothConversionPlan {
    pub start_age: u32,
    pub end_age: u32,
    pub policy: ConversionPolicy,
}

impl RothConversionPlan {
    pub fn is_active(&self, age: u32) -> bool {
        (self.start_age..=self.end_age).contains(&age)
    }

    /// Amount to move from traditional to Roth this year, never more than
    /// `traditional_balance`. `taxable_income` is the income already recognised this year.
    pub fn conversion_amount(
        &self,
        age: u32,
        traditional_balance: f64,
        taxable_income: f64,
        tax: &TaxSchedule,
    ) -> f64 {
        if !self.is_active(age) || traditional_balance <= 0.0 {
            return 0.0;
        }

        let requested = match self.policy {
            ConversionPolicy::Manual { annual_amount } => annual_amount,
            ConversionPolicy::AutoOptimize { target_bracket } => {
                match tax.gross_income_ceiling(target_bracket) {
                    Some(ceiling) => ceiling - taxable_income,
                    None => traditional_balance,
                }
            }
        };

        requested.clamp(0.0, traditional_balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    fn manual(amount: f64) -> RothConversionPlan {
        RothConversionPlan {
            start_age: 60,
            end_age: 65,
            policy: ConversionPolicy::Manual {
                annual_amount: amount,
            },
        }
    }

    fn auto(target_bracket: usize) -> RothConversionPlan {
        RothConversionPlan {
            start_age: 60,
            end_age: 65,
            policy: ConversionPolicy::AutoOptimize { target_bracket },
        }
    }

    #[test]
    fn manual_conversion_is_capped_by_balance() {
        let tax = TaxSchedule::reference();
        assert_eq!(manual(20_000.0).conversion_amount(62, 50_000.0, 0.0, &tax), 20_000.0);
        assert_eq!(manual(20_000.0).conversion_amount(62, 5_000.0, 0.0, &tax), 5_000.0);
    }

    #[test]
    fn window_is_inclusive_on_both_ends() {
        let tax = TaxSchedule::reference();
        let plan = manual(1_000.0);
        assert_eq!(plan.conversion_amount(59, 10_000.0, 0.0, &tax), 0.0);
        assert_eq!(plan.conversion_amount(60, 10_000.0, 0.0, &tax), 1_000.0);
        assert_eq!(plan.conversion_amount(65, 10_000.0, 0.0, &tax), 1_000.0);
        assert_eq!(plan.conversion_amount(66, 10_000.0, 0.0, &tax), 0.0);
    }

    #[test]
    fn auto_optimize_fills_target_bracket_after_existing_income() {
        let tax = TaxSchedule::reference();
        // 12% bracket tops out at 47,150 + 14,600 deduction of gross income.
        let amount = auto(1).conversion_amount(62, 500_000.0, 20_000.0, &tax);
        assert!((amount - (61_750.0 - 20_000.0)).abs() < 1e-9);
    }

    #[test]
    fn auto_optimize_converts_nothing_once_bracket_is_full() {
        let tax = TaxSchedule::reference();
        assert_eq!(auto(0).conversion_amount(62, 500_000.0, 90_000.0, &tax), 0.0);
    }

    #[test]
    fn auto_optimize_top_bracket_converts_everything() {
        let tax = TaxSchedule::reference();
        assert_eq!(auto(6).conversion_amount(62, 75_000.0, 10_000.0, &tax), 75_000.0);
    }

    #[test]
    fn empty_traditional_pool_converts_nothing() {
        let tax = TaxSchedule::reference();
        assert_eq!(auto(1).conversion_amount(62, 0.0, 0.0, &tax), 0.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(128))]

        #[test]
        fn prop_conversion_never_exceeds_balance(
            age in 50u32..80,
            balance in 0u32..2_000_000,
            income in 0u32..400_000,
            amount in 0u32..500_000,
            bracket in 0usize..8,
            use_auto in proptest::bool::ANY
        ) {
            let tax = TaxSchedule::reference();
            let plan = if use_auto { auto(bracket) } else { manual(amount as f64) };
            let converted = plan.conversion_amount(age, balance as f64, income as f64, &tax);
            prop_assert!(converted >= 0.0);
            prop_assert!(converted <= balance as f64);
            if !plan.is_active(age) {
                prop_assert!(converted == 0.0);
            }
        }
    }
}
