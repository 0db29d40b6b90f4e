use crate::{Amount, Symbol, TokenError, table::Table};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyRecord {
    pub symbol: Symbol,
    pub issuer: Uuid,
    pub supply: Amount,
    pub max_supply: Amount,
    pub created_at: DateTime<Utc>,
}

impl SupplyRecord {
    pub fn new(issuer: Uuid, max_supply: Amount) -> Self {
        Self {
            symbol: max_supply.symbol.clone(),
            issuer,
            supply: Amount::zero(max_supply.symbol.clone()),
            max_supply,
            created_at: Utc::now(),
        }
    }

    pub fn code(&self) -> &str {
        &self.symbol.code
    }

    /// What can still be issued before hitting `max_supply`.
    pub fn headroom(&self) -> i64 {
        self.max_supply.value - self.supply.value
    }
}

/// Checks shared by `SupplyTable::create` and the operation layer.
pub fn validate_new_supply(max_supply: &Amount) -> Result<(), TokenError> {
    if !max_supply.symbol.is_valid() {
        return Err(TokenError::InvalidSymbol(max_supply.symbol.to_string()));
    }
    if !max_supply.is_valid() {
        return Err(TokenError::InvalidAmount("invalid supply".to_string()));
    }
    if max_supply.value <= 0 {
        return Err(TokenError::InvalidAmount(
            "max-supply must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Applies `delta` to a current supply, enforcing `0 <= supply <= max_supply`.
pub fn adjusted_supply(record: &SupplyRecord, delta: &Amount) -> Result<Amount, TokenError> {
    if delta.symbol != record.symbol {
        return Err(TokenError::InvalidAmount(
            "symbol precision mismatch".to_string(),
        ));
    }
    let next = record
        .supply
        .checked_add(delta)
        .ok_or_else(|| TokenError::InvalidAmount("supply overflow".to_string()))?;

    if next.value < 0 || next.value > record.max_supply.value {
        return Err(TokenError::SupplyExceeded);
    }
    Ok(next)
}

/// One record per symbol code. Records are never deleted.
#[derive(Debug, Clone, Default)]
pub struct SupplyTable {
    rows: Table<String, SupplyRecord>,
}

impl SupplyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, issuer: Uuid, max_supply: Amount) -> Result<&SupplyRecord, TokenError> {
        validate_new_supply(&max_supply)?;

        let code = max_supply.symbol.code.clone();
        if !self
            .rows
            .insert_if_absent(code.clone(), SupplyRecord::new(issuer, max_supply))
        {
            return Err(TokenError::AlreadyExists(format!(
                "token with symbol {} already exists",
                code
            )));
        }

        self.find(&code)
    }

    /// Puts a stored record into the table as-is, replacing any copy.
    pub fn load(&mut self, record: SupplyRecord) {
        self.rows.put(record.code().to_string(), record);
    }

    pub fn find(&self, code: &str) -> Result<&SupplyRecord, TokenError> {
        self.rows
            .lookup(&code.to_string())
            .ok_or_else(|| TokenError::NotFound(format!("token with symbol {} does not exist", code)))
    }

    /// The single supply mutation point. `delta` is negative for burns.
    pub fn adjust(&mut self, code: &str, delta: &Amount) -> Result<&SupplyRecord, TokenError> {
        let next = adjusted_supply(self.find(code)?, delta)?;

        let key = code.to_string();
        self.rows.update(&key, |record| record.supply = next);
        self.find(code)
    }

    pub fn records(&self) -> impl Iterator<Item = &SupplyRecord> {
        self.rows.values()
    }
}
