use serde::Serialize;
use tracing::debug;

use super::engine::simulate;
use super::error::SolveError;
use super::types::{SimulationConfig, SimulationSummary};

const SHORTFALL_EPS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpendingSolveConfig {
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for SpendingSolveConfig {
    fn default() -> Self {
        Self {
            search_min: 0.0,
            search_max: 500_000.0,
            tolerance: 50.0,
            max_iterations: 40,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_spending: f64,
    pub sustainable: bool,
    pub depletion_age: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingSolveResult {
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub solved_spending: Option<f64>,
    pub solved_summary: Option<SimulationSummary>,
    pub iterations: Vec<SpendingSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Bisects for the highest annual spending (today's money) that never leaves a shortfall.
pub fn solve_max_spending(
    config: &SimulationConfig,
    solve: SpendingSolveConfig,
) -> Result<SpendingSolveResult, SolveError> {
    validate_solve_config(solve)?;

    let mut iterations = Vec::with_capacity(solve.max_iterations as usize);
    let mut solved_spending = None;
    let mut converged = false;
    let feasible;
    let message;

    let low_eval = evaluate_candidate(config, solve.search_min);
    let high_eval = evaluate_candidate(config, solve.search_max);

    if !low_eval.sustainable {
        feasible = false;
        message = "No sustainable spending found within the search bounds.".to_string();
    } else if high_eval.sustainable {
        solved_spending = Some(solve.search_max);
        converged = true;
        feasible = true;
        message = "Upper spending bound is still sustainable; increase search max for a higher target."
            .to_string();
    } else {
        let mut lo = solve.search_min;
        let mut hi = solve.search_max;
        let mut it = 0;
        while it < solve.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let eval = evaluate_candidate(config, mid);
            iterations.push(SpendingSolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_spending: mid,
                sustainable: eval.sustainable,
                depletion_age: eval.depletion_age,
            });

            if eval.sustainable {
                lo = mid;
            } else {
                hi = mid;
            }

            if (hi - lo).abs() <= solve.tolerance {
                converged = true;
                break;
            }
        }
        solved_spending = Some(lo);
        feasible = true;
        message = if converged {
            "Solved maximum sustainable spending.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate.".to_string()
        };
    }

    let solved_summary = solved_spending.map(|spending| {
        let mut candidate = config.clone();
        candidate.annual_spending = spending;
        simulate(&candidate).summary
    });

    debug!(
        ?solved_spending,
        converged,
        iterations = iterations.len(),
        "spending solve finished"
    );

    Ok(SpendingSolveResult {
        search_min: solve.search_min,
        search_max: solve.search_max,
        tolerance: solve.tolerance,
        max_iterations: solve.max_iterations,
        solved_spending,
        solved_summary,
        iterations,
        converged,
        feasible,
        message,
    })
}

#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    sustainable: bool,
    depletion_age: Option<u32>,
}

fn evaluate_candidate(base: &SimulationConfig, spending: f64) -> CandidateEval {
    let mut config = base.clone();
    config.annual_spending = spending.max(0.0);
    let run = simulate(&config);
    CandidateEval {
        sustainable: run.years.iter().all(|year| year.shortfall <= SHORTFALL_EPS),
        depletion_age: run.summary.depletion_age,
    }
}

fn validate_solve_config(solve: SpendingSolveConfig) -> Result<(), SolveError> {
    if !solve.search_min.is_finite() || !solve.search_max.is_finite() || solve.search_min < 0.0 {
        return Err(SolveError::InvalidBounds);
    }
    if solve.search_max <= solve.search_min {
        return Err(SolveError::EmptySearchRange);
    }
    if !solve.tolerance.is_finite() || solve.tolerance <= 0.0 {
        return Err(SolveError::InvalidTolerance);
    }
    if solve.max_iterations == 0 {
        return Err(SolveError::NoIterations);
    }
    Ok(())
}
