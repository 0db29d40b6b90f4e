use crate::{Amount, Symbol, TokenError, table::Table};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub owner: Uuid,
    pub balance: Amount,
    pub updated_at: DateTime<Utc>,
}

impl BalanceRecord {
    pub fn new(owner: Uuid, balance: Amount) -> Self {
        Self {
            owner,
            balance,
            updated_at: Utc::now(),
        }
    }

    pub fn code(&self) -> &str {
        &self.balance.symbol.code
    }
}

type BalanceKey = (Uuid, String);

/// One record per (owner, symbol code).
///
/// A debit that brings a balance to exactly zero removes the record, so the
/// table only grows with active holders. Zero records can still exist when
/// created explicitly through `open`.
#[derive(Debug, Clone, Default)]
pub struct BalanceTable {
    rows: Table<BalanceKey, BalanceRecord>,
}

impl BalanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, owner: Uuid, code: &str) -> Option<&BalanceRecord> {
        self.rows.lookup(&(owner, code.to_string()))
    }

    /// Puts a stored record into the table as-is, replacing any copy.
    pub fn load(&mut self, record: BalanceRecord) {
        let key = (record.owner, record.code().to_string());
        self.rows.put(key, record);
    }

    pub fn remove(&mut self, owner: Uuid, code: &str) -> Option<BalanceRecord> {
        self.rows.delete(&(owner, code.to_string()))
    }

    pub fn credit(
        &mut self,
        owner: Uuid,
        amount: &Amount,
        allow_create: bool,
    ) -> Result<(), TokenError> {
        let key = (owner, amount.symbol.code.clone());

        let updated = self.rows.update(&key, |record| -> Result<(), TokenError> {
            let next = record.balance.checked_add(amount).ok_or_else(|| {
                TokenError::InvalidAmount("balance overflow or symbol mismatch".to_string())
            })?;
            record.balance = next;
            record.updated_at = Utc::now();
            Ok(())
        });

        match updated {
            Some(result) => result,
            None if allow_create => {
                self.rows
                    .insert_if_absent(key, BalanceRecord::new(owner, amount.clone()));
                Ok(())
            }
            None => Err(TokenError::NoBalanceObject),
        }
    }

    pub fn debit(&mut self, owner: Uuid, amount: &Amount) -> Result<(), TokenError> {
        let key = (owner, amount.symbol.code.clone());
        let record = self
            .rows
            .lookup(&key)
            .ok_or_else(|| TokenError::NotFound("no balance object found".to_string()))?;

        if record.balance.symbol != amount.symbol {
            return Err(TokenError::InvalidAmount(
                "symbol precision mismatch".to_string(),
            ));
        }
        if record.balance.value < amount.value {
            return Err(TokenError::Overdrawn);
        }

        if record.balance.value == amount.value {
            self.rows.delete(&key);
        } else {
            self.rows.update(&key, |record| {
                record.balance.value -= amount.value;
                record.updated_at = Utc::now();
            });
        }

        Ok(())
    }

    /// Registers a zero balance for `owner`. Fails if any record exists.
    pub fn open(&mut self, owner: Uuid, symbol: &Symbol) -> Result<(), TokenError> {
        let key = (owner, symbol.code.clone());
        if !self
            .rows
            .insert_if_absent(key, BalanceRecord::new(owner, Amount::zero(symbol.clone())))
        {
            return Err(TokenError::AlreadyExists(
                "you have already signed up".to_string(),
            ));
        }
        Ok(())
    }

    pub fn holders(&self, code: &str) -> Vec<BalanceRecord> {
        self.rows
            .iter()
            .filter(|((_, c), _)| c == code)
            .map(|(_, record)| record.clone())
            .collect()
    }
}
