use std::collections::BTreeMap;

use super::error::ConfigError;

/// Required-minimum-distribution divisors keyed by age.
#[derive(Debug, Clone, PartialEq)]
pub struct RmdTable {
    trigger_age: u32,
    divisors: BTreeMap<u32, f64>,
}

const UNIFORM_LIFETIME_DIVISORS: [(u32, f64); 28] = [
    (73, 26.5),
    (74, 25.5),
    (75, 24.6),
    (76, 23.7),
    (77, 22.9),
    (78, 22.0),
    (79, 21.1),
    (80, 20.2),
    (81, 19.4),
    (82, 18.5),
    (83, 17.7),
    (84, 16.8),
    (85, 16.0),
    (86, 15.2),
    (87, 14.4),
    (88, 13.7),
    (89, 12.9),
    (90, 12.2),
    (91, 11.5),
    (92, 10.8),
    (93, 10.1),
    (94, 9.5),
    (95, 8.9),
    (96, 8.4),
    (97, 7.8),
    (98, 7.3),
    (99, 6.8),
    (100, 6.4),
];

impl RmdTable {
    pub fn new(trigger_age: u32, divisors: BTreeMap<u32, f64>) -> Result<Self, ConfigError> {
        if divisors.is_empty() {
            return Err(ConfigError::EmptyRmdTable);
        }
        if let Some((&age, _)) = divisors
            .iter()
            .find(|(_, divisor)| !divisor.is_finite() || **divisor <= 0.0)
        {
            return Err(ConfigError::NonPositiveDivisor { age });
        }
        Ok(Self {
            trigger_age,
            divisors,
        })
    }

    /// Uniform Lifetime divisors for ages 73 through 100, triggered at 73.
    pub fn reference() -> Self {
        Self {
            trigger_age: 73,
            divisors: UNIFORM_LIFETIME_DIVISORS.into_iter().collect(),
        }
    }

    pub fn trigger_age(&self) -> u32 {
        self.trigger_age
    }

    /// Ages between keys use the nearest lower entry; ages outside the table use the
    /// boundary entry on that side.
    pub fn divisor_for(&self, age: u32) -> f64 {
        self.divisors
            .range(..=age)
            .next_back()
            .or_else(|| self.divisors.iter().next())
            .map(|(_, divisor)| *divisor)
            .unwrap_or(1.0)
    }

    pub fn required_withdrawal(&self, traditional_balance: f64, age: u32) -> f64 {
        if age < self.trigger_age || traditional_balance <= 0.0 {
            return 0.0;
        }
        traditional_balance / self.divisor_for(age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_table_covers_73_through_100() {
        let table = RmdTable::reference();
        assert_eq!(table.trigger_age(), 73);
        assert_eq!(table.divisor_for(73), 26.5);
        assert_eq!(table.divisor_for(85), 16.0);
        assert_eq!(table.divisor_for(100), 6.4);
    }

    #[test]
    fn out_of_range_ages_use_boundary_entries() {
        let table = RmdTable::reference();
        assert_eq!(table.divisor_for(104), 6.4);
        assert_eq!(table.divisor_for(60), 26.5);
    }

    #[test]
    fn gaps_fall_back_to_nearest_lower_entry() {
        let table = RmdTable::new(70, BTreeMap::from([(70, 20.0), (80, 10.0)])).expect("valid");
        assert_eq!(table.divisor_for(75), 20.0);
        assert_eq!(table.divisor_for(80), 10.0);
        assert_eq!(table.divisor_for(95), 10.0);
    }

    #[test]
    fn required_withdrawal_is_zero_before_trigger_age() {
        let table = RmdTable::reference();
        assert_eq!(table.required_withdrawal(500_000.0, 72), 0.0);
        assert!((table.required_withdrawal(530_000.0, 73) - 20_000.0).abs() < 1e-9);
        assert_eq!(table.required_withdrawal(0.0, 80), 0.0);
    }

    #[test]
    fn new_rejects_empty_and_non_positive_tables() {
        assert_eq!(
            RmdTable::new(73, BTreeMap::new()).expect_err("empty"),
            ConfigError::EmptyRmdTable
        );
        assert_eq!(
            RmdTable::new(73, BTreeMap::from([(73, 26.5), (74, 0.0)])).expect_err("zero"),
            ConfigError::NonPositiveDivisor { age: 74 }
        );
    }

    #[test]
    fn lookups_are_stable_across_calls() {
        let table = RmdTable::reference();
        for age in 60..110 {
            assert_eq!(table.divisor_for(age), table.divisor_for(age));
        }
    }
}
