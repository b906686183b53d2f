mod conversion;
mod engine;
mod error;
mod ledger;
mod rmd;
mod solver;
mod tax;
mod types;
mod withdrawal;

pub use conversion::{ConversionPolicy, RothConversionPlan};
pub use engine::{compare_strategies, compare_stress, simulate};
pub use error::{ConfigError, SolveError};
pub use ledger::{AccountLedger, Pool};
pub use rmd::RmdTable;
pub use solver::{
    SpendingSolveConfig, SpendingSolveIteration, SpendingSolveResult, solve_max_spending,
};
pub use tax::{TaxBracket, TaxSchedule};
pub use types::{
    EngineAssumptions, SimulationConfig, SimulationRun, SimulationSummary, SocialSecurity,
    StrategyComparison, StressComparison, YearResult,
};
pub use withdrawal::{WithdrawalStrategy, Withdrawals, withdraw_for_need};
