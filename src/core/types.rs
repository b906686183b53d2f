use serde::Serialize;

use super::conversion::RothConversionPlan;
use super::ledger::AccountLedger;
use super::rmd::RmdTable;
use super::tax::TaxSchedule;
use super::withdrawal::{WithdrawalStrategy, Withdrawals};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SocialSecurity {
    /// Annual benefit in today's money.
    pub annual_amount: f64,
    pub start_age: u32,
}

/// Simplifying constants the year simulator applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineAssumptions {
    pub social_security_taxable_share: f64,
    pub bracket_filler_ceiling: f64,
    pub stress_return: f64,
    pub stress_years: u32,
    pub start_year: i32,
}

impl Default for EngineAssumptions {
    fn default() -> Self {
        Self {
            social_security_taxable_share: 0.85,
            bracket_filler_ceiling: 60_000.0,
            stress_return: -0.12,
            stress_years: 3,
            start_year: 2026,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub current_age: u32,
    pub target_retirement_age: u32,
    pub retirement_end_age: u32,
    /// Annual spending in today's money.
    pub annual_spending: f64,
    pub inflation_rate: f64,
    pub avg_return: f64,
    pub stress_test: bool,
    pub withdrawal_strategy: WithdrawalStrategy,
    pub roth_conversion: Option<RothConversionPlan>,
    pub social_security: SocialSecurity,
    pub balances: AccountLedger,
    pub tax: TaxSchedule,
    pub rmd: RmdTable,
    pub assumptions: EngineAssumptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearResult {
    pub age: u32,
    pub year: i32,
    pub starting_total: f64,
    pub spending: f64,
    pub social_security: f64,
    pub conversion: f64,
    pub rmd: f64,
    pub portfolio_need: f64,
    pub withdrawals: Withdrawals,
    pub reinvested: f64,
    pub taxable_income: f64,
    pub tax_paid: f64,
    /// Rate on the next dollar of this year's income.
    pub marginal_rate: f64,
    pub unfunded_tax: f64,
    pub shortfall: f64,
    pub growth_rate: f64,
    pub ending: AccountLedger,
    pub ending_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub years_simulated: usize,
    pub total_tax_paid: f64,
    pub total_shortfall: f64,
    pub total_converted: f64,
    /// `None` when the portfolio never runs dry.
    pub depletion_age: Option<u32>,
    pub estate_value: f64,
    pub conversion_plan: Vec<YearResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRun {
    pub years: Vec<YearResult>,
    pub summary: SimulationSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyComparison {
    pub strategy: WithdrawalStrategy,
    pub summary: SimulationSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StressComparison {
    pub baseline_estate_value: f64,
    pub stressed_estate_value: f64,
    pub estate_value_lost: f64,
    pub baseline_depletion_age: Option<u32>,
    pub stressed_depletion_age: Option<u32>,
}
