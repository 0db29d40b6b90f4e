use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    InvalidSymbol(String),
    InvalidAmount(String),
    AlreadyExists(String),
    NotFound(String),
    /// Credit to an account with no balance record while auto-create is off.
    NoBalanceObject,
    Overdrawn,
    SupplyExceeded,
    Unauthorized(Uuid),
    SelfTransfer,
    MemoTooLong(usize),
    UnknownAccount(Uuid),
    Storage(String),
    Config(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSymbol(msg) => write!(f, "Invalid symbol: {}", msg),
            Self::InvalidAmount(msg) => write!(f, "Invalid amount: {}", msg),
            Self::AlreadyExists(what) => write!(f, "Already exists: {}", what),
            Self::NotFound(what) => write!(f, "Not found: {}", what),
            Self::NoBalanceObject => write!(f, "Destination account does not have balance"),
            Self::Overdrawn => write!(f, "Overdrawn balance"),
            Self::SupplyExceeded => write!(f, "Quantity exceeds available supply"),
            Self::Unauthorized(account) => write!(f, "Missing authority of {}", account),
            Self::SelfTransfer => write!(f, "Cannot transfer to self"),
            Self::MemoTooLong(len) => write!(f, "Memo has {} bytes, limit exceeded", len),
            Self::UnknownAccount(account) => write!(f, "Account does not exist: {}", account),
            Self::Storage(msg) => write!(f, "Storage error: {}", msg),
            Self::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for TokenError {}
