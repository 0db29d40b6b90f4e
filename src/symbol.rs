use crate::TokenError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MAX_CODE_LEN: usize = 7;
pub const MAX_PRECISION: u8 = 18;

/// Token symbol: an uppercase code plus the number of fractional digits.
///
/// Two symbols are equal only when both code and precision match, so
/// `"TOK,4"` and `"TOK,2"` are different symbols sharing one supply key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub code: String,
    pub precision: u8,
}

impl Symbol {
    pub fn new(code: &str, precision: u8) -> Self {
        Self {
            code: code.to_string(),
            precision,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.code.is_empty()
            && self.code.len() <= MAX_CODE_LEN
            && self.code.bytes().all(|b| b.is_ascii_uppercase())
            && self.precision <= MAX_PRECISION
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// 10^precision, the number of raw units in one whole token. `None`
    /// past `MAX_PRECISION`, where the power no longer fits an `i64`.
    pub fn scale(&self) -> Option<i64> {
        if self.precision > MAX_PRECISION {
            return None;
        }
        10_i64.checked_pow(self.precision as u32)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.code, self.precision)
    }
}

impl FromStr for Symbol {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (code, precision) = s
            .split_once(',')
            .ok_or_else(|| TokenError::InvalidSymbol(format!("expected CODE,precision: {}", s)))?;

        let precision = precision
            .trim()
            .parse::<u8>()
            .map_err(|_| TokenError::InvalidSymbol(format!("bad precision: {}", s)))?;

        let symbol = Symbol::new(code.trim(), precision);
        if !symbol.is_valid() {
            return Err(TokenError::InvalidSymbol(s.to_string()));
        }

        Ok(symbol)
    }
}
