use thiserror::Error;

/// Rejections raised while assembling a [`SimulationConfig`](super::SimulationConfig)
/// or one of the lookup tables it carries.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("tax schedule must contain at least one bracket")]
    EmptyTaxSchedule,
    #[error("only the last tax bracket may be unbounded (bracket {index})")]
    UnboundedBracketNotLast { index: usize },
    #[error("the last tax bracket must be unbounded")]
    TopBracketBounded,
    #[error("tax bracket ceilings must be strictly increasing (bracket {index})")]
    CeilingsNotIncreasing { index: usize },
    #[error("tax bracket rates must be strictly increasing (bracket {index})")]
    RatesNotIncreasing { index: usize },
    #[error("tax bracket rate must be between 0 and 1 (bracket {index})")]
    RateOutOfRange { index: usize },
    #[error("--standard-deduction must be >= 0")]
    NegativeDeduction,
    #[error("RMD table must contain at least one age")]
    EmptyRmdTable,
    #[error("RMD divisor for age {age} must be > 0")]
    NonPositiveDivisor { age: u32 },
    #[error("{flag} must be {requirement}")]
    InvalidField {
        flag: &'static str,
        requirement: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn field(flag: &'static str, requirement: &'static str) -> Self {
        Self::InvalidField { flag, requirement }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SolveError {
    #[error("search bounds must be finite and >= 0")]
    InvalidBounds,
    #[error("search_max must be greater than search_min")]
    EmptySearchRange,
    #[error("tolerance must be > 0")]
    InvalidTolerance,
    #[error("max_iterations must be > 0")]
    NoIterations,
}
