use rayon::prelude::*;
use tracing::{debug, trace, warn};

use super::ledger::{AccountLedger, Pool};
use super::types::{
    SimulationConfig, SimulationRun, SimulationSummary, StrategyComparison, StressComparison,
    YearResult,
};
use super::withdrawal::{WithdrawalStrategy, withdraw_for_need};

const DEPLETION_EPS: f64 = 1e-6;

/// Runs the configuration from `current_age` through `retirement_end_age` inclusive on a
/// private copy of the starting balances.
pub fn simulate(config: &SimulationConfig) -> SimulationRun {
    let starting_total = config.balances.total();
    if config.retirement_end_age < config.current_age {
        warn!(
            current_age = config.current_age,
            retirement_end_age = config.retirement_end_age,
            "end age precedes current age; returning an empty run"
        );
        return SimulationRun {
            years: Vec::new(),
            summary: summarize(&[], starting_total),
        };
    }

    debug!(
        current_age = config.current_age,
        retirement_age = config.target_retirement_age,
        end_age = config.retirement_end_age,
        strategy = ?config.withdrawal_strategy,
        stress_test = config.stress_test,
        "starting drawdown simulation"
    );

    let mut ledger = config.balances;
    let mut years =
        Vec::with_capacity((config.retirement_end_age - config.current_age) as usize + 1);
    for (year_index, age) in (config.current_age..=config.retirement_end_age).enumerate() {
        years.push(simulate_year(config, &mut ledger, age, year_index as u32));
    }

    let summary = summarize(&years, starting_total);
    debug!(
        total_tax_paid = summary.total_tax_paid,
        depletion_age = ?summary.depletion_age,
        estate_value = summary.estate_value,
        "finished drawdown simulation"
    );

    SimulationRun { years, summary }
}

/// Same configuration under every withdrawal strategy, in `WithdrawalStrategy::ALL` order.
pub fn compare_strategies(config: &SimulationConfig) -> Vec<StrategyComparison> {
    WithdrawalStrategy::ALL
        .par_iter()
        .map(|strategy| {
            let mut candidate = config.clone();
            candidate.withdrawal_strategy = *strategy;
            StrategyComparison {
                strategy: *strategy,
                summary: simulate(&candidate).summary,
            }
        })
        .collect()
}

pub fn compare_stress(config: &SimulationConfig) -> StressComparison {
    let (baseline, stressed) = rayon::join(
        || {
            let mut calm = config.clone();
            calm.stress_test = false;
            simulate(&calm).summary
        },
        || {
            let mut stressed = config.clone();
            stressed.stress_test = true;
            simulate(&stressed).summary
        },
    );

    StressComparison {
        baseline_estate_value: baseline.estate_value,
        stressed_estate_value: stressed.estate_value,
        estate_value_lost: baseline.estate_value - stressed.estate_value,
        baseline_depletion_age: baseline.depletion_age,
        stressed_depletion_age: stressed.depletion_age,
    }
}

fn simulate_year(
    config: &SimulationConfig,
    ledger: &mut AccountLedger,
    age: u32,
    year_index: u32,
) -> YearResult {
    let starting_total = ledger.total();
    let price_index = (1.0 + config.inflation_rate).powi(year_index as i32);
    let mut taxable_income = 0.0;

    let social_security = social_security_income(config, age, price_index);
    taxable_income += social_security * config.assumptions.social_security_taxable_share;

    let spending = if age >= config.target_retirement_age {
        (config.annual_spending * price_index).max(0.0)
    } else {
        0.0
    };
    let mut remaining_need = (spending - social_security).max(0.0);
    let mut reinvested = (social_security - spending).max(0.0);

    let conversion = match &config.roth_conversion {
        Some(plan) => {
            let amount =
                plan.conversion_amount(age, ledger.traditional, taxable_income, &config.tax);
            ledger.transfer(Pool::Traditional, Pool::Roth, amount)
        }
        None => 0.0,
    };
    taxable_income += conversion;

    let rmd_required = config.rmd.required_withdrawal(ledger.traditional, age);
    let rmd = ledger.withdraw(Pool::Traditional, rmd_required);
    taxable_income += rmd;
    let rmd_spent = rmd.min(remaining_need);
    remaining_need -= rmd_spent;
    reinvested += rmd - rmd_spent;
    ledger.deposit(Pool::Taxable, reinvested);

    let portfolio_need = remaining_need;
    let withdrawals = withdraw_for_need(
        config.withdrawal_strategy,
        portfolio_need,
        ledger,
        &mut taxable_income,
        config.assumptions.bracket_filler_ceiling,
    );
    let shortfall = (portfolio_need - withdrawals.total()).max(0.0);

    let tax_paid = config.tax.tax(taxable_income);
    let from_taxable = ledger.withdraw(Pool::Taxable, tax_paid);
    let from_roth = ledger.withdraw(Pool::Roth, tax_paid - from_taxable);
    let unfunded_tax = (tax_paid - from_taxable - from_roth).max(0.0);

    let growth_rate = growth_rate_for_year(config, year_index);
    ledger.grow(growth_rate);

    trace!(age, taxable_income, tax_paid, shortfall, "simulated year");

    YearResult {
        age,
        year: config.assumptions.start_year.saturating_add_unsigned(year_index),
        starting_total,
        spending,
        social_security,
        conversion,
        rmd,
        portfolio_need,
        withdrawals,
        reinvested,
        taxable_income,
        tax_paid,
        marginal_rate: config.tax.marginal_rate(taxable_income),
        unfunded_tax,
        shortfall,
        growth_rate,
        ending: *ledger,
        ending_total: ledger.total(),
    }
}

fn social_security_income(config: &SimulationConfig, age: u32, price_index: f64) -> f64 {
    if age < config.social_security.start_age {
        0.0
    } else {
        (config.social_security.annual_amount * price_index).max(0.0)
    }
}

fn growth_rate_for_year(config: &SimulationConfig, year_index: u32) -> f64 {
    if config.stress_test && year_index < config.assumptions.stress_years {
        config.assumptions.stress_return
    } else {
        config.avg_return
    }
}

fn summarize(years: &[YearResult], starting_total: f64) -> SimulationSummary {
    let mut total_tax_paid = 0.0;
    let mut total_shortfall = 0.0;
    let mut total_converted = 0.0;
    let mut depletion_age = None;
    let mut conversion_plan = Vec::new();

    for year in years {
        total_tax_paid += year.tax_paid;
        total_shortfall += year.shortfall;
        total_converted += year.conversion;
        if depletion_age.is_none()
            && year.ending_total <= DEPLETION_EPS
            && year.shortfall > DEPLETION_EPS
        {
            depletion_age = Some(year.age);
        }
        if year.conversion > 0.0 {
            conversion_plan.push(year.clone());
        }
    }

    SimulationSummary {
        years_simulated: years.len(),
        total_tax_paid,
        total_shortfall,
        total_converted,
        depletion_age,
        estate_value: years
            .last()
            .map(|year| year.ending_total)
            .unwrap_or(starting_total),
        conversion_plan,
    }
}
