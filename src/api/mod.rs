use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{
    AccountLedger, ConfigError, ConversionPolicy, EngineAssumptions, RmdTable,
    RothConversionPlan, SimulationConfig, SimulationSummary, SocialSecurity, SpendingSolveConfig,
    SpendingSolveResult, StrategyComparison, StressComparison, TaxBracket, TaxSchedule,
    WithdrawalStrategy, YearResult, compare_strategies, compare_stress, simulate,
    solve_max_spending,
};

const MAX_AGE: u32 = 130;
const START_YEAR_RANGE: std::ops::RangeInclusive<i32> = 1900..=2200;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliWithdrawalStrategy {
    TaxableFirst,
    BracketFiller,
    Proportional,
}

impl From<CliWithdrawalStrategy> for WithdrawalStrategy {
    fn from(value: CliWithdrawalStrategy) -> Self {
        match value {
            CliWithdrawalStrategy::TaxableFirst => WithdrawalStrategy::TaxableFirst,
            CliWithdrawalStrategy::BracketFiller => WithdrawalStrategy::BracketFiller,
            CliWithdrawalStrategy::Proportional => WithdrawalStrategy::Proportional,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliConversionMode {
    Off,
    Manual,
    AutoOptimize,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliReport {
    Simulate,
    Compare,
    MaxSpending,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiWithdrawalStrategy {
    #[serde(alias = "taxableFirst", alias = "taxable_first")]
    TaxableFirst,
    #[serde(alias = "bracketFiller", alias = "bracket_filler")]
    BracketFiller,
    #[serde(alias = "pro-rata", alias = "proRata")]
    Proportional,
}

impl From<ApiWithdrawalStrategy> for CliWithdrawalStrategy {
    fn from(value: ApiWithdrawalStrategy) -> Self {
        match value {
            ApiWithdrawalStrategy::TaxableFirst => CliWithdrawalStrategy::TaxableFirst,
            ApiWithdrawalStrategy::BracketFiller => CliWithdrawalStrategy::BracketFiller,
            ApiWithdrawalStrategy::Proportional => CliWithdrawalStrategy::Proportional,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiConversionMode {
    #[serde(alias = "none")]
    Off,
    Manual,
    #[serde(alias = "autoOptimize", alias = "auto_optimize", alias = "auto")]
    AutoOptimize,
}

impl From<ApiConversionMode> for CliConversionMode {
    fn from(value: ApiConversionMode) -> Self {
        match value {
            ApiConversionMode::Off => CliConversionMode::Off,
            ApiConversionMode::Manual => CliConversionMode::Manual,
            ApiConversionMode::AutoOptimize => CliConversionMode::AutoOptimize,
        }
    }
}

/// Rates are in percent; a missing ceiling marks the top bracket.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTaxBracket {
    ceiling: Option<f64>,
    rate: f64,
}

impl From<ApiTaxBracket> for TaxBracket {
    fn from(value: ApiTaxBracket) -> Self {
        TaxBracket {
            income_ceiling: value.ceiling,
            marginal_rate: value.rate / 100.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    current_age: Option<u32>,
    target_retirement_age: Option<u32>,
    retirement_end_age: Option<u32>,
    start_year: Option<i32>,

    annual_spending: Option<f64>,
    inflation_rate: Option<f64>,
    avg_return: Option<f64>,
    stress_test: Option<bool>,
    stress_return: Option<f64>,
    stress_years: Option<u32>,

    taxable_balance: Option<f64>,
    traditional_balance: Option<f64>,
    roth_balance: Option<f64>,

    withdrawal_strategy: Option<ApiWithdrawalStrategy>,
    bracket_filler_ceiling: Option<f64>,

    social_security_amount: Option<f64>,
    social_security_start_age: Option<u32>,
    social_security_taxable_share: Option<f64>,

    conversion_mode: Option<ApiConversionMode>,
    conversion_start_age: Option<u32>,
    conversion_end_age: Option<u32>,
    conversion_amount: Option<f64>,
    conversion_target_bracket: Option<usize>,

    tax_brackets: Option<Vec<ApiTaxBracket>>,
    standard_deduction: Option<f64>,

    search_min: Option<f64>,
    search_max: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<u32>,
}

#[derive(Parser, Debug)]
#[command(
    name = "drawdown",
    about = "Retirement drawdown simulator (taxable + traditional + Roth, RMDs, Roth conversions)"
)]
struct Cli {
    #[arg(long)]
    current_age: u32,
    #[arg(long, help = "Age spending starts; defaults to current-age")]
    target_retirement_age: Option<u32>,
    #[arg(long, default_value_t = 95, help = "Last simulated age (inclusive)")]
    retirement_end_age: u32,
    #[arg(long, default_value_t = 2026, help = "Calendar year of the first simulated age")]
    start_year: i32,
    #[arg(long, help = "Annual spending in today's money")]
    annual_spending: f64,
    #[arg(long, default_value_t = 2.5, help = "Annual inflation in percent")]
    inflation_rate: f64,
    #[arg(long, default_value_t = 5.0, help = "Average annual portfolio return in percent")]
    avg_return: f64,
    #[arg(long, help = "Replace the first years' return with the stress return")]
    stress_test: bool,
    #[arg(
        long,
        default_value_t = -12.0,
        allow_negative_numbers = true,
        help = "Return applied during stressed years in percent"
    )]
    stress_return: f64,
    #[arg(long, default_value_t = 3)]
    stress_years: u32,
    #[arg(long, default_value_t = 0.0)]
    taxable_balance: f64,
    #[arg(long, default_value_t = 0.0)]
    traditional_balance: f64,
    #[arg(long, default_value_t = 0.0)]
    roth_balance: f64,
    #[arg(long, value_enum, default_value_t = CliWithdrawalStrategy::TaxableFirst)]
    withdrawal_strategy: CliWithdrawalStrategy,
    #[arg(
        long,
        default_value_t = 60_000.0,
        help = "Gross income the bracket-filler strategy fills with traditional draws"
    )]
    bracket_filler_ceiling: f64,
    #[arg(long, default_value_t = 0.0, help = "Annual Social Security in today's money")]
    social_security_amount: f64,
    #[arg(long, default_value_t = 67)]
    social_security_start_age: u32,
    #[arg(
        long,
        default_value_t = 85.0,
        help = "Share of Social Security counted as taxable income in percent"
    )]
    social_security_taxable_share: f64,
    #[arg(long, value_enum, default_value_t = CliConversionMode::Off)]
    conversion_mode: CliConversionMode,
    #[arg(long, help = "First conversion age; defaults to target-retirement-age")]
    conversion_start_age: Option<u32>,
    #[arg(long, help = "Last conversion age; defaults to the year before RMDs begin")]
    conversion_end_age: Option<u32>,
    #[arg(long, default_value_t = 0.0, help = "Manual mode: amount converted per year")]
    conversion_amount: f64,
    #[arg(
        long,
        default_value_t = 2,
        help = "Auto mode: zero-based bracket index to fill"
    )]
    conversion_target_bracket: usize,
    #[arg(long, default_value_t = 14_600.0)]
    standard_deduction: f64,
    #[arg(skip)]
    tax_brackets: Option<Vec<TaxBracket>>,
    #[arg(long, value_enum, default_value_t = CliReport::Simulate)]
    report: CliReport,
    #[arg(long, default_value_t = 0.0, help = "Max-spending search floor")]
    search_min: f64,
    #[arg(long, default_value_t = 500_000.0, help = "Max-spending search ceiling")]
    search_max: f64,
    #[arg(long, default_value_t = 50.0)]
    tolerance: f64,
    #[arg(long, default_value_t = 40)]
    max_iterations: u32,
}

#[derive(Debug)]
struct ApiRequest {
    config: SimulationConfig,
    solve: SpendingSolveConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    withdrawal_strategy: WithdrawalStrategy,
    stress_test: bool,
    start_year: i32,
    years: Vec<YearResult>,
    summary: SimulationSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    strategies: Vec<StrategyComparison>,
    stress: StressComparison,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MaxSpendingResponse {
    withdrawal_strategy: WithdrawalStrategy,
    solve: SpendingSolveResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_config(cli: Cli) -> Result<SimulationConfig, ConfigError> {
    if cli.retirement_end_age < cli.current_age {
        return Err(ConfigError::field(
            "--retirement-end-age",
            ">= --current-age",
        ));
    }

    if cli.retirement_end_age > MAX_AGE {
        return Err(ConfigError::field("--retirement-end-age", "<= 130"));
    }

    if !START_YEAR_RANGE.contains(&cli.start_year) {
        return Err(ConfigError::field(
            "--start-year",
            "between 1900 and 2200",
        ));
    }

    let target_retirement_age = cli.target_retirement_age.unwrap_or(cli.current_age);
    if target_retirement_age < cli.current_age {
        return Err(ConfigError::field(
            "--target-retirement-age",
            ">= --current-age",
        ));
    }

    for (flag, amount) in [
        ("--annual-spending", cli.annual_spending),
        ("--taxable-balance", cli.taxable_balance),
        ("--traditional-balance", cli.traditional_balance),
        ("--roth-balance", cli.roth_balance),
        ("--social-security-amount", cli.social_security_amount),
        ("--bracket-filler-ceiling", cli.bracket_filler_ceiling),
    ] {
        if !amount.is_finite() || amount < 0.0 {
            return Err(ConfigError::field(flag, ">= 0"));
        }
    }

    for (flag, rate) in [
        ("--inflation-rate", cli.inflation_rate),
        ("--avg-return", cli.avg_return),
        ("--stress-return", cli.stress_return),
    ] {
        if !rate.is_finite() || rate <= -100.0 {
            return Err(ConfigError::field(flag, "> -100"));
        }
    }

    if cli.stress_years > 100 {
        return Err(ConfigError::field("--stress-years", "<= 100"));
    }

    if !(0.0..=100.0).contains(&cli.social_security_taxable_share) {
        return Err(ConfigError::field(
            "--social-security-taxable-share",
            "between 0 and 100",
        ));
    }

    let brackets = match cli.tax_brackets {
        Some(brackets) => brackets,
        None => TaxSchedule::reference().brackets().to_vec(),
    };
    let tax = TaxSchedule::new(brackets, cli.standard_deduction)?;
    let rmd = RmdTable::reference();

    let roth_conversion = match cli.conversion_mode {
        CliConversionMode::Off => None,
        mode => {
            let start_age = cli.conversion_start_age.unwrap_or(target_retirement_age);
            let end_age = cli
                .conversion_end_age
                .unwrap_or_else(|| rmd.trigger_age().saturating_sub(1));
            if end_age < start_age {
                return Err(ConfigError::field(
                    "--conversion-end-age",
                    ">= --conversion-start-age",
                ));
            }

            let policy = if mode == CliConversionMode::Manual {
                if !cli.conversion_amount.is_finite() || cli.conversion_amount < 0.0 {
                    return Err(ConfigError::field("--conversion-amount", ">= 0"));
                }
                ConversionPolicy::Manual {
                    annual_amount: cli.conversion_amount,
                }
            } else {
                if cli.conversion_target_bracket >= tax.brackets().len() {
                    return Err(ConfigError::field(
                        "--conversion-target-bracket",
                        "a bracket index within the tax schedule",
                    ));
                }
                ConversionPolicy::AutoOptimize {
                    target_bracket: cli.conversion_target_bracket,
                }
            };

            Some(RothConversionPlan {
                start_age,
                end_age,
                policy,
            })
        }
    };

    Ok(SimulationConfig {
        current_age: cli.current_age,
        target_retirement_age,
        retirement_end_age: cli.retirement_end_age,
        annual_spending: cli.annual_spending,
        inflation_rate: cli.inflation_rate / 100.0,
        avg_return: cli.avg_return / 100.0,
        stress_test: cli.stress_test,
        withdrawal_strategy: cli.withdrawal_strategy.into(),
        roth_conversion,
        social_security: SocialSecurity {
            annual_amount: cli.social_security_amount,
            start_age: cli.social_security_start_age,
        },
        balances: AccountLedger::new(
            cli.taxable_balance,
            cli.traditional_balance,
            cli.roth_balance,
        ),
        tax,
        rmd,
        assumptions: EngineAssumptions {
            social_security_taxable_share: cli.social_security_taxable_share / 100.0,
            bracket_filler_ceiling: cli.bracket_filler_ceiling,
            stress_return: cli.stress_return / 100.0,
            stress_years: cli.stress_years,
            start_year: cli.start_year,
        },
    })
}

fn build_request(cli: Cli) -> Result<ApiRequest, ConfigError> {
    let solve = SpendingSolveConfig {
        search_min: cli.search_min,
        search_max: cli.search_max,
        tolerance: cli.tolerance,
        max_iterations: cli.max_iterations,
    };
    let config = build_config(cli)?;
    Ok(ApiRequest { config, solve })
}

/// Parses process arguments and renders the selected report as pretty JSON.
pub fn run_cli() -> Result<String, String> {
    render_report(Cli::parse())
}

fn render_report(cli: Cli) -> Result<String, String> {
    let report = cli.report;
    let request = build_request(cli).map_err(|e| e.to_string())?;
    match report {
        CliReport::Simulate => to_json(&build_simulate_response(&request.config)),
        CliReport::Compare => to_json(&build_compare_response(&request.config)),
        CliReport::MaxSpending => to_json(&build_max_spending_response(&request)?),
    }
}

fn to_json<T: Serialize>(body: &T) -> Result<String, String> {
    serde_json::to_string_pretty(body).map_err(|e| format!("Failed to encode response: {e}"))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/compare",
            get(compare_get_handler).post(compare_post_handler),
        )
        .route("/api/max-spending", post(max_spending_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "drawdown HTTP API listening");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload)
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload)
}

async fn compare_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    compare_handler_impl(payload)
}

async fn compare_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    compare_handler_impl(payload)
}

async fn max_spending_handler(Json(payload): Json<SimulatePayload>) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    log_request("max-spending", &request.config);
    match build_max_spending_response(&request) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    log_request("simulate", &request.config);
    json_response(StatusCode::OK, build_simulate_response(&request.config))
}

fn compare_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    log_request("compare", &request.config);
    json_response(StatusCode::OK, build_compare_response(&request.config))
}

fn log_request(route: &'static str, config: &SimulationConfig) {
    info!(
        route,
        strategy = ?config.withdrawal_strategy,
        current_age = config.current_age,
        end_age = config.retirement_end_age,
        "handling request"
    );
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.target_retirement_age {
        cli.target_retirement_age = Some(v);
    }
    if let Some(v) = payload.retirement_end_age {
        cli.retirement_end_age = v;
    }
    if let Some(v) = payload.start_year {
        cli.start_year = v;
    }

    if let Some(v) = payload.annual_spending {
        cli.annual_spending = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.avg_return {
        cli.avg_return = v;
    }
    if let Some(v) = payload.stress_test {
        cli.stress_test = v;
    }
    if let Some(v) = payload.stress_return {
        cli.stress_return = v;
    }
    if let Some(v) = payload.stress_years {
        cli.stress_years = v;
    }

    if let Some(v) = payload.taxable_balance {
        cli.taxable_balance = v;
    }
    if let Some(v) = payload.traditional_balance {
        cli.traditional_balance = v;
    }
    if let Some(v) = payload.roth_balance {
        cli.roth_balance = v;
    }

    if let Some(v) = payload.withdrawal_strategy {
        cli.withdrawal_strategy = v.into();
    }
    if let Some(v) = payload.bracket_filler_ceiling {
        cli.bracket_filler_ceiling = v;
    }

    if let Some(v) = payload.social_security_amount {
        cli.social_security_amount = v;
    }
    if let Some(v) = payload.social_security_start_age {
        cli.social_security_start_age = v;
    }
    if let Some(v) = payload.social_security_taxable_share {
        cli.social_security_taxable_share = v;
    }

    if let Some(v) = payload.conversion_mode {
        cli.conversion_mode = v.into();
    }
    if let Some(v) = payload.conversion_start_age {
        cli.conversion_start_age = Some(v);
    }
    if let Some(v) = payload.conversion_end_age {
        cli.conversion_end_age = Some(v);
    }
    if let Some(v) = payload.conversion_amount {
        cli.conversion_amount = v;
    }
    if let Some(v) = payload.conversion_target_bracket {
        cli.conversion_target_bracket = v;
    }

    if let Some(brackets) = payload.tax_brackets {
        cli.tax_brackets = Some(brackets.into_iter().map(TaxBracket::from).collect());
    }
    if let Some(v) = payload.standard_deduction {
        cli.standard_deduction = v;
    }

    if let Some(v) = payload.search_min {
        cli.search_min = v;
    }
    if let Some(v) = payload.search_max {
        cli.search_max = v;
    }
    if let Some(v) = payload.tolerance {
        cli.tolerance = v;
    }
    if let Some(v) = payload.max_iterations {
        cli.max_iterations = v;
    }

    build_request(cli).map_err(|e| e.to_string())
}

fn default_cli_for_api() -> Cli {
    Cli {
        current_age: 60,
        target_retirement_age: Some(65),
        retirement_end_age: 95,
        start_year: 2026,
        annual_spending: 60_000.0,
        inflation_rate: 2.5,
        avg_return: 5.0,
        stress_test: false,
        stress_return: -12.0,
        stress_years: 3,
        taxable_balance: 200_000.0,
        traditional_balance: 600_000.0,
        roth_balance: 100_000.0,
        withdrawal_strategy: CliWithdrawalStrategy::TaxableFirst,
        bracket_filler_ceiling: 60_000.0,
        social_security_amount: 30_000.0,
        social_security_start_age: 67,
        social_security_taxable_share: 85.0,
        conversion_mode: CliConversionMode::Off,
        conversion_start_age: None,
        conversion_end_age: None,
        conversion_amount: 0.0,
        conversion_target_bracket: 2,
        standard_deduction: 14_600.0,
        tax_brackets: None,
        report: CliReport::Simulate,
        search_min: 0.0,
        search_max: 500_000.0,
        tolerance: 50.0,
        max_iterations: 40,
    }
}

fn build_simulate_response(config: &SimulationConfig) -> SimulateResponse {
    let run = simulate(config);
    SimulateResponse {
        withdrawal_strategy: config.withdrawal_strategy,
        stress_test: config.stress_test,
        start_year: config.assumptions.start_year,
        years: run.years,
        summary: run.summary,
    }
}

fn build_compare_response(config: &SimulationConfig) -> CompareResponse {
    CompareResponse {
        strategies: compare_strategies(config),
        stress: compare_stress(config),
    }
}

fn build_max_spending_response(request: &ApiRequest) -> Result<MaxSpendingResponse, String> {
    let solve = solve_max_spending(&request.config, request.solve).map_err(|e| e.to_string())?;
    Ok(MaxSpendingResponse {
        withdrawal_strategy: request.config.withdrawal_strategy,
        solve,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn build_config_converts_percent_rates() {
        let config = build_config(sample_cli()).expect("valid config");
        assert_approx(config.inflation_rate, 0.025);
        assert_approx(config.avg_return, 0.05);
        assert_approx(config.assumptions.stress_return, -0.12);
        assert_approx(config.assumptions.social_security_taxable_share, 0.85);
        assert_eq!(config.tax, TaxSchedule::reference());
        assert!(config.roth_conversion.is_none());
    }

    #[test]
    fn build_config_defaults_target_retirement_age_to_current_age() {
        let mut cli = sample_cli();
        cli.target_retirement_age = None;
        let config = build_config(cli).expect("valid config");
        assert_eq!(config.target_retirement_age, config.current_age);
    }

    #[test]
    fn build_config_rejects_end_age_before_current_age() {
        let mut cli = sample_cli();
        cli.retirement_end_age = 50;
        let err = build_config(cli).expect_err("must reject end age");
        assert!(err.to_string().contains("--retirement-end-age"));
    }

    #[test]
    fn build_config_rejects_unbounded_horizon() {
        let mut cli = sample_cli();
        cli.current_age = 0;
        cli.target_retirement_age = None;
        cli.retirement_end_age = u32::MAX;
        let err = build_config(cli).expect_err("must reject horizon");
        assert_eq!(err.to_string(), "--retirement-end-age must be <= 130");

        let mut cli = sample_cli();
        cli.retirement_end_age = MAX_AGE;
        assert!(build_config(cli).is_ok());
    }

    #[test]
    fn build_config_rejects_out_of_range_start_year() {
        for start_year in [i32::MAX, 1899, 2201] {
            let mut cli = sample_cli();
            cli.start_year = start_year;
            let err = build_config(cli).expect_err("must reject start year");
            assert!(err.to_string().contains("--start-year"));
        }
    }

    #[test]
    fn api_request_from_json_rejects_extreme_year_and_age() {
        let err = api_request_from_json(r#"{ "startYear": 2147483647 }"#)
            .expect_err("must reject start year");
        assert!(err.contains("--start-year"));

        let err = api_request_from_json(r#"{ "currentAge": 0, "retirementEndAge": 4294967295 }"#)
            .expect_err("must reject horizon");
        assert!(err.contains("--retirement-end-age"));
    }

    #[test]
    fn build_config_rejects_negative_balances() {
        let mut cli = sample_cli();
        cli.roth_balance = -1.0;
        let err = build_config(cli).expect_err("must reject negative balance");
        assert_eq!(err.to_string(), "--roth-balance must be >= 0");
    }

    #[test]
    fn build_config_rejects_return_at_or_below_minus_hundred() {
        let mut cli = sample_cli();
        cli.avg_return = -100.0;
        let err = build_config(cli).expect_err("must reject -100% return");
        assert!(err.to_string().contains("--avg-return"));
    }

    #[test]
    fn build_config_rejects_inverted_conversion_window() {
        let mut cli = sample_cli();
        cli.conversion_mode = CliConversionMode::Manual;
        cli.conversion_start_age = Some(70);
        cli.conversion_end_age = Some(66);
        let err = build_config(cli).expect_err("must reject inverted window");
        assert!(err.to_string().contains("--conversion-end-age"));
    }

    #[test]
    fn build_config_rejects_out_of_range_target_bracket() {
        let mut cli = sample_cli();
        cli.conversion_mode = CliConversionMode::AutoOptimize;
        cli.conversion_target_bracket = 7;
        let err = build_config(cli).expect_err("must reject bracket index");
        assert!(err.to_string().contains("--conversion-target-bracket"));
    }

    #[test]
    fn build_config_conversion_window_defaults_to_retirement_until_rmds() {
        let mut cli = sample_cli();
        cli.conversion_mode = CliConversionMode::AutoOptimize;
        let config = build_config(cli).expect("valid config");
        let plan = config.roth_conversion.expect("plan expected");
        assert_eq!(plan.start_age, 65);
        assert_eq!(plan.end_age, 72);
        assert_eq!(
            plan.policy,
            ConversionPolicy::AutoOptimize { target_bracket: 2 }
        );
    }

    #[test]
    fn api_request_from_json_parses_web_keys() {
        let json = r#"{
          "currentAge": 62,
          "targetRetirementAge": 64,
          "retirementEndAge": 90,
          "annualSpending": 70000,
          "inflationRate": 3,
          "avgReturn": 6,
          "stressTest": true,
          "taxableBalance": 150000,
          "traditionalBalance": 800000,
          "rothBalance": 50000,
          "withdrawalStrategy": "bracketFiller",
          "socialSecurityAmount": 28000,
          "socialSecurityStartAge": 70,
          "conversionMode": "manual",
          "conversionStartAge": 64,
          "conversionEndAge": 69,
          "conversionAmount": 40000
        }"#;
        let request = api_request_from_json(json).expect("json should parse");
        let config = request.config;

        assert_eq!(config.current_age, 62);
        assert_eq!(config.target_retirement_age, 64);
        assert_eq!(config.retirement_end_age, 90);
        assert_approx(config.annual_spending, 70_000.0);
        assert_approx(config.inflation_rate, 0.03);
        assert_approx(config.avg_return, 0.06);
        assert!(config.stress_test);
        assert_eq!(config.balances, AccountLedger::new(150_000.0, 800_000.0, 50_000.0));
        assert_eq!(config.withdrawal_strategy, WithdrawalStrategy::BracketFiller);
        assert_approx(config.social_security.annual_amount, 28_000.0);
        assert_eq!(config.social_security.start_age, 70);
        assert_eq!(
            config.roth_conversion,
            Some(RothConversionPlan {
                start_age: 64,
                end_age: 69,
                policy: ConversionPolicy::Manual {
                    annual_amount: 40_000.0
                },
            })
        );
    }

    #[test]
    fn api_request_from_json_accepts_custom_bracket_table() {
        let json = r#"{
          "taxBrackets": [
            { "ceiling": 20000, "rate": 10 },
            { "rate": 20 }
          ],
          "standardDeduction": 5000
        }"#;
        let request = api_request_from_json(json).expect("json should parse");
        let tax = request.config.tax;
        assert_eq!(
            tax.brackets(),
            &[TaxBracket::bounded(20_000.0, 0.10), TaxBracket::top(0.20)]
        );
        assert_approx(tax.standard_deduction(), 5_000.0);
    }

    #[test]
    fn api_request_from_json_rejects_malformed_bracket_table() {
        let json = r#"{
          "taxBrackets": [
            { "ceiling": 20000, "rate": 10 },
            { "ceiling": 40000, "rate": 20 }
          ]
        }"#;
        let err = api_request_from_json(json).expect_err("top bracket must be unbounded");
        assert!(err.contains("unbounded"));
    }

    #[test]
    fn api_request_from_json_reads_solver_bounds() {
        let json = r#"{ "searchMin": 1000, "searchMax": 90000, "tolerance": 10, "maxIterations": 12 }"#;
        let request = api_request_from_json(json).expect("json should parse");
        assert_eq!(
            request.solve,
            SpendingSolveConfig {
                search_min: 1_000.0,
                search_max: 90_000.0,
                tolerance: 10.0,
                max_iterations: 12,
            }
        );
    }

    #[test]
    fn cli_parses_flags_and_negative_stress_return() {
        let cli = Cli::try_parse_from([
            "drawdown",
            "--current-age",
            "66",
            "--annual-spending",
            "45000",
            "--traditional-balance",
            "400000",
            "--withdrawal-strategy",
            "proportional",
            "--stress-test",
            "--stress-return",
            "-20",
            "--report",
            "compare",
        ])
        .expect("flags should parse");
        assert_eq!(cli.report, CliReport::Compare);

        let config = build_config(cli).expect("valid config");
        assert_eq!(config.current_age, 66);
        assert_eq!(config.withdrawal_strategy, WithdrawalStrategy::Proportional);
        assert!(config.stress_test);
        assert_approx(config.assumptions.stress_return, -0.20);
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let mut cli = sample_cli();
        cli.retirement_end_age = 66;
        let config = build_config(cli).expect("valid config");
        let response = build_simulate_response(&config);
        assert_eq!(response.years.len(), 7);

        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"withdrawalStrategy\":\"taxable-first\""));
        assert!(json.contains("\"years\""));
        assert!(json.contains("\"taxPaid\""));
        assert!(json.contains("\"marginalRate\""));
        assert!(json.contains("\"endingTotal\""));
        assert!(json.contains("\"depletionAge\""));
        assert!(json.contains("\"estateValue\""));
        assert!(json.contains("\"conversionPlan\""));
    }

    #[test]
    fn compare_response_lists_all_strategies() {
        let mut cli = sample_cli();
        cli.retirement_end_age = 70;
        let config = build_config(cli).expect("valid config");
        let response = build_compare_response(&config);
        let strategies: Vec<_> = response.strategies.iter().map(|c| c.strategy).collect();
        assert_eq!(strategies, WithdrawalStrategy::ALL.to_vec());
        assert!(response.stress.estate_value_lost >= 0.0);

        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"bracket-filler\""));
        assert!(json.contains("\"stressedEstateValue\""));
    }

    #[test]
    fn max_spending_response_reports_solver_errors() {
        let mut cli = sample_cli();
        cli.search_min = 10_000.0;
        cli.search_max = 5_000.0;
        let request = build_request(cli).expect("valid config");
        let err = build_max_spending_response(&request).expect_err("must reject bounds");
        assert!(err.contains("search_max"));
    }

    #[test]
    fn render_report_prints_json() {
        let mut cli = sample_cli();
        cli.retirement_end_age = 62;
        let rendered = render_report(cli).expect("report renders");
        let value: serde_json::Value = serde_json::from_str(&rendered).expect("valid json");
        assert_eq!(value["years"].as_array().map(Vec::len), Some(3));
        assert_eq!(value["summary"]["yearsSimulated"], 3);
    }
}
