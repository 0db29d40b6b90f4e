use crate::{
    BalanceRecord, BalanceTable, ExecutionPlan, LockKey, SupplyRecord, SupplyTable, TokenError,
    TokenStore,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    supply: SupplyTable,
    balances: BalanceTable,
}

impl Tables {
    /// Copies out the rows named by `keys`. Missing rows stay missing.
    fn stage(&self, keys: &[LockKey]) -> (SupplyTable, BalanceTable) {
        let mut supply = SupplyTable::new();
        let mut balances = BalanceTable::new();

        for key in keys {
            match key {
                LockKey::Supply(code) => {
                    if let Ok(record) = self.supply.find(code) {
                        supply.load(record.clone());
                    }
                }
                LockKey::Balance(owner, code) => {
                    if let Some(record) = self.balances.find(*owner, code) {
                        balances.load(record.clone());
                    }
                }
            }
        }

        (supply, balances)
    }

    /// Writes staged rows back for `keys` only. A balance key with no staged
    /// row was debited to zero and is removed.
    fn write_back(&mut self, keys: &[LockKey], supply: SupplyTable, balances: BalanceTable) {
        for key in keys {
            match key {
                LockKey::Supply(code) => {
                    if let Ok(record) = supply.find(code) {
                        self.supply.load(record.clone());
                    }
                }
                LockKey::Balance(owner, code) => match balances.find(*owner, code) {
                    Some(record) => self.balances.load(record.clone()),
                    None => {
                        self.balances.remove(*owner, code);
                    }
                },
            }
        }
    }
}

/// In-process store. One mutex guards both tables, so a plan sees and
/// leaves them in a consistent state.
#[derive(Clone, Default)]
pub struct MemoryAdapter {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, TokenError> {
        self.tables
            .lock()
            .map_err(|_| TokenError::Storage("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl TokenStore for MemoryAdapter {
    async fn execute_plan(&self, plan: &ExecutionPlan) -> Result<(), TokenError> {
        let mut tables = self.lock()?;

        let keys = plan.lock_keys();
        let (mut supply, mut balances) = tables.stage(&keys);
        plan.apply(&mut supply, &mut balances)?;

        tables.write_back(&keys, supply, balances);
        Ok(())
    }

    async fn find_supply(&self, code: &str) -> Result<SupplyRecord, TokenError> {
        let tables = self.lock()?;
        tables.supply.find(code).cloned()
    }

    async fn find_balance(
        &self,
        owner: Uuid,
        code: &str,
    ) -> Result<Option<BalanceRecord>, TokenError> {
        let tables = self.lock()?;
        Ok(tables.balances.find(owner, code).cloned())
    }

    async fn balances(&self, code: &str) -> Result<Vec<BalanceRecord>, TokenError> {
        let tables = self.lock()?;
        Ok(tables.balances.holders(code))
    }

    async fn symbols(&self) -> Result<Vec<SupplyRecord>, TokenError> {
        let tables = self.lock()?;
        Ok(tables.supply.records().cloned().collect())
    }
}
