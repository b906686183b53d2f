use super::error::ConfigError;

/// One band of a progressive schedule. `income_ceiling` is measured in income after the
/// standard deduction; `None` marks the unbounded top band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxBracket {
    pub income_ceiling: Option<f64>,
    pub marginal_rate: f64,
}

impl TaxBracket {
    pub fn bounded(income_ceiling: f64, marginal_rate: f64) -> Self {
        Self {
            income_ceiling: Some(income_ceiling),
            marginal_rate,
        }
    }

    pub fn top(marginal_rate: f64) -> Self {
        Self {
            income_ceiling: None,
            marginal_rate,
        }
    }
}

/// Progressive income tax: ordered brackets plus a standard deduction.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxSchedule {
    brackets: Vec<TaxBracket>,
    standard_deduction: f64,
}

impl TaxSchedule {
    pub fn new(brackets: Vec<TaxBracket>, standard_deduction: f64) -> Result<Self, ConfigError> {
        if brackets.is_empty() {
            return Err(ConfigError::EmptyTaxSchedule);
        }
        if !standard_deduction.is_finite() || standard_deduction < 0.0 {
            return Err(ConfigError::NegativeDeduction);
        }

        let last = brackets.len() - 1;
        let mut previous_ceiling = 0.0;
        let mut previous_rate = f64::NEG_INFINITY;
        for (index, bracket) in brackets.iter().enumerate() {
            if !(0.0..=1.0).contains(&bracket.marginal_rate) {
                return Err(ConfigError::RateOutOfRange { index });
            }
            if bracket.marginal_rate <= previous_rate {
                return Err(ConfigError::RatesNotIncreasing { index });
            }
            previous_rate = bracket.marginal_rate;

            match bracket.income_ceiling {
                None if index != last => {
                    return Err(ConfigError::UnboundedBracketNotLast { index });
                }
                None => {}
                Some(_) if index == last => return Err(ConfigError::TopBracketBounded),
                Some(ceiling) => {
                    if !ceiling.is_finite() || ceiling <= previous_ceiling {
                        return Err(ConfigError::CeilingsNotIncreasing { index });
                    }
                    previous_ceiling = ceiling;
                }
            }
        }

        Ok(Self {
            brackets,
            standard_deduction,
        })
    }

    /// Seven-band single-filer schedule used as the default table.
    pub fn reference() -> Self {
        Self {
            brackets: vec![
                TaxBracket::bounded(11_600.0, 0.10),
                TaxBracket::bounded(47_150.0, 0.12),
                TaxBracket::bounded(100_525.0, 0.22),
                TaxBracket::bounded(191_950.0, 0.24),
                TaxBracket::bounded(243_725.0, 0.32),
                TaxBracket::bounded(609_350.0, 0.35),
                TaxBracket::top(0.37),
            ],
            standard_deduction: 14_600.0,
        }
    }

    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }

    pub fn standard_deduction(&self) -> f64 {
        self.standard_deduction
    }

    pub fn tax(&self, taxable_income: f64) -> f64 {
        let income = (taxable_income - self.standard_deduction).max(0.0);
        let mut tax = 0.0;
        let mut floor = 0.0;

        for bracket in &self.brackets {
            if income <= floor {
                break;
            }
            let ceiling = bracket.income_ceiling.unwrap_or(f64::INFINITY);
            tax += (income.min(ceiling) - floor) * bracket.marginal_rate;
            floor = ceiling;
        }

        tax
    }

    /// Gross income (before the deduction) at which the bracket at `index` is full.
    /// `None` for the unbounded top bracket; indices past the end resolve to the top.
    pub fn gross_income_ceiling(&self, index: usize) -> Option<f64> {
        self.brackets
            .get(index)
            .and_then(|bracket| bracket.income_ceiling)
            .map(|ceiling| ceiling + self.standard_deduction)
    }

    pub fn marginal_rate(&self, taxable_income: f64) -> f64 {
        let income = (taxable_income - self.standard_deduction).max(0.0);
        if income <= 0.0 {
            return 0.0;
        }
        self.brackets
            .iter()
            .find(|bracket| bracket.income_ceiling.is_none_or(|ceiling| income <= ceiling))
            .map(|bracket| bracket.marginal_rate)
            .unwrap_or(0.0)
    }
}
