use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Pool {
    Taxable,
    Traditional,
    Roth,
}

/// Balances of the three account pools. Every mutation keeps each pool at or above zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLedger {
    pub taxable: f64,
    pub traditional: f64,
    pub roth: f64,
}

impl AccountLedger {
    pub fn new(taxable: f64, traditional: f64, roth: f64) -> Self {
        Self {
            taxable: taxable.max(0.0),
            traditional: traditional.max(0.0),
            roth: roth.max(0.0),
        }
    }

    pub fn balance(&self, pool: Pool) -> f64 {
        match pool {
            Pool::Taxable => self.taxable,
            Pool::Traditional => self.traditional,
            Pool::Roth => self.roth,
        }
    }

    fn balance_mut(&mut self, pool: Pool) -> &mut f64 {
        match pool {
            Pool::Taxable => &mut self.taxable,
            Pool::Traditional => &mut self.traditional,
            Pool::Roth => &mut self.roth,
        }
    }

    pub fn total(&self) -> f64 {
        self.taxable + self.traditional + self.roth
    }

    /// Takes up to `amount` from `pool` and returns what was actually taken.
    pub fn withdraw(&mut self, pool: Pool, amount: f64) -> f64 {
        let balance = self.balance_mut(pool);
        let taken = amount.max(0.0).min(*balance);
        *balance = (*balance - taken).max(0.0);
        taken
    }

    pub fn deposit(&mut self, pool: Pool, amount: f64) {
        *self.balance_mut(pool) += amount.max(0.0);
    }

    pub fn transfer(&mut self, from: Pool, to: Pool, amount: f64) -> f64 {
        let moved = self.withdraw(from, amount);
        self.deposit(to, moved);
        moved
    }

    pub fn grow(&mut self, rate: f64) {
        for pool in [Pool::Taxable, Pool::Traditional, Pool::Roth] {
            let balance = self.balance_mut(pool);
            *balance = (*balance * (1.0 + rate)).max(0.0);
        }
    }
}
