//! Capabilities the ledger borrows from its host environment.
//!
//! The ledger never authenticates anyone. It receives an already verified
//! caller identity and asks the [`Authorizer`] whether that caller carries a
//! given account's authority.

use crate::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, caller: Uuid, account: Uuid) -> bool;
}

pub trait AccountDirectory: Send + Sync {
    fn exists(&self, account: Uuid) -> bool;
}

pub trait Notifier: Send + Sync {
    fn notify(&self, recipient: Uuid, notice: &Notice);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Create,
    Issue,
    Signup,
    Burn,
    Transfer,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Issue => "issue",
            Action::Signup => "signup",
            Action::Burn => "burn",
            Action::Transfer => "transfer",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a party is told after a call it took part in has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub action: Action,
    pub from: Option<Uuid>,
    pub to: Option<Uuid>,
    pub quantity: Amount,
    pub memo: String,
}

/// A caller only carries its own authority.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameAccount;

impl Authorizer for SameAccount {
    fn is_authorized(&self, caller: Uuid, account: Uuid) -> bool {
        caller == account
    }
}

/// Every account exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenDirectory;

impl AccountDirectory for OpenDirectory {
    fn exists(&self, _account: Uuid) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, recipient: Uuid, notice: &Notice) {
        tracing::debug!(
            %recipient,
            action = %notice.action,
            quantity = %notice.quantity,
            memo = %notice.memo,
            "token notice"
        );
    }
}

#[derive(Clone)]
pub struct Host {
    pub authorizer: Arc<dyn Authorizer>,
    pub directory: Arc<dyn AccountDirectory>,
    pub notifier: Arc<dyn Notifier>,
}

impl Host {
    pub fn new(
        authorizer: Arc<dyn Authorizer>,
        directory: Arc<dyn AccountDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            authorizer,
            directory,
            notifier,
        }
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new(
            Arc::new(SameAccount),
            Arc::new(OpenDirectory),
            Arc::new(TracingNotifier),
        )
    }
}
