use crate::{Amount, BalanceTable, SupplyTable, Symbol, TokenError};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateSupply {
        issuer: Uuid,
        max_supply: Amount,
    },
    AdjustSupply {
        code: String,
        delta: Amount,
    },
    Credit {
        owner: Uuid,
        amount: Amount,
        allow_create: bool,
    },
    Debit {
        owner: Uuid,
        amount: Amount,
    },
    Open {
        owner: Uuid,
        symbol: Symbol,
    },
}

/// Rows a store should lock for a plan, in locking order.
///
/// Balance changes also lock their symbol's supply row, which serializes
/// every plan on one symbol behind that row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum LockKey {
    Supply(String),
    Balance(Uuid, String),
}

/// The validated mutations of a single call, applied all-or-nothing by a
/// [`TokenStore`](crate::TokenStore).
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    mutations: Vec<Mutation>,
}

impl ExecutionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Runs every mutation against the given tables, stopping at the first
    /// failure. Callers stage the tables so a failure leaves live rows alone.
    pub(crate) fn apply(
        &self,
        supply: &mut SupplyTable,
        balances: &mut BalanceTable,
    ) -> Result<(), TokenError> {
        for mutation in &self.mutations {
            match mutation {
                Mutation::CreateSupply { issuer, max_supply } => {
                    supply.create(*issuer, max_supply.clone())?;
                }
                Mutation::AdjustSupply { code, delta } => {
                    supply.adjust(code, delta)?;
                }
                Mutation::Credit {
                    owner,
                    amount,
                    allow_create,
                } => balances.credit(*owner, amount, *allow_create)?,
                Mutation::Debit { owner, amount } => balances.debit(*owner, amount)?,
                Mutation::Open { owner, symbol } => balances.open(*owner, symbol)?,
            }
        }
        Ok(())
    }

    /// Deduplicated and sorted: supply rows first, then balances.
    pub fn lock_keys(&self) -> Vec<LockKey> {
        let mut keys = BTreeSet::new();

        for mutation in &self.mutations {
            match mutation {
                Mutation::CreateSupply { max_supply, .. } => {
                    keys.insert(LockKey::Supply(max_supply.symbol.code.clone()));
                }
                Mutation::AdjustSupply { code, .. } => {
                    keys.insert(LockKey::Supply(code.clone()));
                }
                Mutation::Credit { owner, amount, .. } | Mutation::Debit { owner, amount } => {
                    keys.insert(LockKey::Supply(amount.symbol.code.clone()));
                    keys.insert(LockKey::Balance(*owner, amount.symbol.code.clone()));
                }
                Mutation::Open { owner, symbol } => {
                    keys.insert(LockKey::Supply(symbol.code.clone()));
                    keys.insert(LockKey::Balance(*owner, symbol.code.clone()));
                }
            }
        }

        keys.into_iter().collect()
    }
}
