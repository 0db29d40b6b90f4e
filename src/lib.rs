//! # token-ledger
//!
//! A bounded-supply fungible token ledger. Each symbol has one supply record
//! (issuer, current supply, max supply) and each holder one balance record
//! per symbol. Five operations move value: `create`, `issue`, `signup`,
//! `burn` and `transfer`.
//!
//! For every symbol the sum of all balances equals the current supply, and
//! the current supply never leaves `0..=max_supply`. Each call is validated
//! first, then its mutations are handed to the store as one
//! [`ExecutionPlan`] and applied all-or-nothing.
//!
//! ```rust,ignore
//! let ledger = TokenLedger::new(LedgerConfig::new(authority), Arc::new(MemoryAdapter::new()));
//!
//! ledger.create(authority, issuer, "1000.0000 TOK".parse()?).await?;
//! ledger.issue(issuer, issuer, "100.0000 TOK".parse()?, "", true).await?;
//! ledger.transfer(issuer, issuer, user, "40.0000 TOK".parse()?, "hi", true).await?;
//! ```

pub mod adapters;
pub mod amount;
pub mod balance;
pub mod config;
pub mod error;
pub mod host;
pub mod plan;
pub mod supply;
pub mod symbol;
pub mod table;
pub mod token;

pub use amount::{Amount, MAX_AMOUNT};
pub use balance::{BalanceRecord, BalanceTable};
pub use config::LedgerConfig;
pub use error::TokenError;
pub use host::{AccountDirectory, Action, Authorizer, Host, Notice, Notifier};
pub use plan::{ExecutionPlan, LockKey, Mutation};
pub use supply::{SupplyRecord, SupplyTable};
pub use symbol::Symbol;
pub use token::TokenLedger;

use async_trait::async_trait;
use uuid::Uuid;

/// Storage behind the supply and balance tables.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Apply every mutation of `plan` atomically.
    /// Implementors MUST:
    /// 1. Take exclusive access to the rows in `plan.lock_keys()`
    /// 2. Re-check supply bounds, balance sufficiency and record existence
    /// 3. Apply all mutations, or none of them on the first failure
    async fn execute_plan(&self, plan: &ExecutionPlan) -> Result<(), TokenError>;

    // READ OPERATIONS
    async fn find_supply(&self, code: &str) -> Result<SupplyRecord, TokenError>;
    async fn find_balance(
        &self,
        owner: Uuid,
        code: &str,
    ) -> Result<Option<BalanceRecord>, TokenError>;
    async fn balances(&self, code: &str) -> Result<Vec<BalanceRecord>, TokenError>;
    async fn symbols(&self) -> Result<Vec<SupplyRecord>, TokenError>;
}
