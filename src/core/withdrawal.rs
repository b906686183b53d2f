use serde::Serialize;

use super::ledger::{AccountLedger, Pool};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WithdrawalStrategy {
    TaxableFirst,
    BracketFiller,
    Proportional,
}

impl WithdrawalStrategy {
    pub const ALL: [WithdrawalStrategy; 3] = [
        WithdrawalStrategy::TaxableFirst,
        WithdrawalStrategy::BracketFiller,
        WithdrawalStrategy::Proportional,
    ];
}

/// Amounts taken from each pool to cover spending in one year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawals {
    pub taxable: f64,
    pub traditional: f64,
    pub roth: f64,
}

impl Withdrawals {
    pub fn total(&self) -> f64 {
        self.taxable + self.traditional + self.roth
    }

    fn record(&mut self, pool: Pool, amount: f64) {
        match pool {
            Pool::Taxable => self.taxable += amount,
            Pool::Traditional => self.traditional += amount,
            Pool::Roth => self.roth += amount,
        }
    }
}

const TAXABLE_FIRST_ORDER: [Pool; 3] = [Pool::Taxable, Pool::Traditional, Pool::Roth];
const BRACKET_FILLER_FALLBACK: [Pool; 3] = [Pool::Taxable, Pool::Roth, Pool::Traditional];

/// Covers up to `need` from the ledger using `strategy`. Traditional draws are added to
/// `taxable_income`. Whatever the returned total falls short of `need` is the caller's
/// shortfall.
pub fn withdraw_for_need(
    strategy: WithdrawalStrategy,
    need: f64,
    ledger: &mut AccountLedger,
    taxable_income: &mut f64,
    bracket_filler_ceiling: f64,
) -> Withdrawals {
    let mut withdrawals = Withdrawals::default();
    if need <= 0.0 {
        return withdrawals;
    }

    match strategy {
        WithdrawalStrategy::TaxableFirst => {
            draw_in_order(
                &TAXABLE_FIRST_ORDER,
                need,
                ledger,
                taxable_income,
                &mut withdrawals,
            );
        }
        WithdrawalStrategy::BracketFiller => {
            let room = (bracket_filler_ceiling - *taxable_income).max(0.0);
            let filled = take_from_pool(
                Pool::Traditional,
                room.min(need),
                ledger,
                taxable_income,
                &mut withdrawals,
            );
            draw_in_order(
                &BRACKET_FILLER_FALLBACK,
                need - filled,
                ledger,
                taxable_income,
                &mut withdrawals,
            );
        }
        WithdrawalStrategy::Proportional => {
            withdraw_proportional(need, ledger, taxable_income, &mut withdrawals);
        }
    }

    withdrawals
}

fn draw_in_order(
    sequence: &[Pool],
    need: f64,
    ledger: &mut AccountLedger,
    taxable_income: &mut f64,
    withdrawals: &mut Withdrawals,
) -> f64 {
    let mut remaining = need.max(0.0);
    let mut realized = 0.0;

    for pool in sequence {
        if remaining <= 0.0 {
            break;
        }
        let taken = take_from_pool(*pool, remaining, ledger, taxable_income, withdrawals);
        realized += taken;
        remaining -= taken;
    }

    realized
}

fn withdraw_proportional(
    need: f64,
    ledger: &mut AccountLedger,
    taxable_income: &mut f64,
    withdrawals: &mut Withdrawals,
) -> f64 {
    let total = ledger.total();
    if total <= 0.0 {
        return 0.0;
    }

    // Shares are fixed from the opening balances so each pool is drawn simultaneously.
    let targets = TAXABLE_FIRST_ORDER.map(|pool| (pool, need * (ledger.balance(pool) / total)));
    targets
        .into_iter()
        .map(|(pool, target)| take_from_pool(pool, target, ledger, taxable_income, withdrawals))
        .sum()
}

fn take_from_pool(
    pool: Pool,
    amount: f64,
    ledger: &mut AccountLedger,
    taxable_income: &mut f64,
    withdrawals: &mut Withdrawals,
) -> f64 {
    let taken = ledger.withdraw(pool, amount);
    if pool == Pool::Traditional {
        *taxable_income += taken;
    }
    withdrawals.record(pool, taken);
    taken
}
