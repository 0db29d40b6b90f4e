use crate::{Symbol, TokenError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

/// Largest magnitude an amount may carry (2^62 - 1 raw units).
pub const MAX_AMOUNT: i64 = (1 << 62) - 1;

/// A signed fixed-point quantity tagged with its symbol.
///
/// `value` is expressed in raw units: `100.0000 TOK` on a `TOK,4` symbol is
/// `value = 1_000_000`. Combining amounts of different symbols through the
/// operator impls panics; storage code goes through `checked_add` and
/// `checked_sub` instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub value: i64,
    pub symbol: Symbol,
}

impl Amount {
    pub fn new(value: i64, symbol: Symbol) -> Self {
        Self { value, symbol }
    }

    pub fn zero(symbol: Symbol) -> Self {
        Self::new(0, symbol)
    }

    pub fn is_valid(&self) -> bool {
        (-MAX_AMOUNT..=MAX_AMOUNT).contains(&self.value) && self.symbol.is_valid()
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    pub fn code(&self) -> &str {
        &self.symbol.code
    }

    pub fn checked_add(&self, other: &Amount) -> Option<Amount> {
        if self.symbol != other.symbol {
            return None;
        }
        let value = self.value.checked_add(other.value)?;
        bounded(value).map(|value| Amount::new(value, self.symbol.clone()))
    }

    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        if self.symbol != other.symbol {
            return None;
        }
        let value = self.value.checked_sub(other.value)?;
        bounded(value).map(|value| Amount::new(value, self.symbol.clone()))
    }

    /// Display form as a float, lossy for large values.
    pub fn to_display(&self) -> f64 {
        self.value as f64 / 10_f64.powi(self.symbol.precision as i32)
    }
}

fn bounded(value: i64) -> Option<i64> {
    (-MAX_AMOUNT..=MAX_AMOUNT).contains(&value).then_some(value)
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.symbol != other.symbol {
            return None;
        }
        Some(self.value.cmp(&other.value))
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        assert_eq!(self.symbol, rhs.symbol, "attempt to add amounts of different symbols");
        self.checked_add(&rhs).expect("addition overflow")
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        assert_eq!(self.symbol, rhs.symbol, "attempt to subtract amounts of different symbols");
        self.checked_sub(&rhs).expect("subtraction underflow")
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        *self = self.clone() + rhs;
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        *self = self.clone() - rhs;
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(scale) = self.symbol.scale() else {
            return write!(f, "{} {}", self.value, self.symbol);
        };
        let sign = if self.value < 0 { "-" } else { "" };
        let raw = self.value.unsigned_abs();
        let scale = scale as u64;
        let precision = self.symbol.precision as usize;

        if precision == 0 {
            write!(f, "{}{} {}", sign, raw, self.symbol.code)
        } else {
            write!(
                f,
                "{}{}.{:0width$} {}",
                sign,
                raw / scale,
                raw % scale,
                self.symbol.code,
                width = precision
            )
        }
    }
}

impl FromStr for Amount {
    type Err = TokenError;

    /// Parses `"1000.0000 TOK"`; the fractional digits fix the precision.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TokenError::InvalidAmount(format!("cannot parse amount: {}", s));

        let (number, code) = s.trim().split_once(' ').ok_or_else(invalid)?;
        let (negative, digits) = match number.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, number),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) || (digits.contains('.') && frac.is_empty())
        {
            return Err(invalid());
        }

        let precision = u8::try_from(frac.len()).map_err(|_| invalid())?;
        let symbol = Symbol::new(code.trim(), precision);
        if !symbol.is_valid() {
            return Err(TokenError::InvalidSymbol(symbol.to_string()));
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let frac: i64 = if frac.is_empty() {
            0
        } else {
            frac.parse().map_err(|_| invalid())?
        };

        let magnitude = whole
            .checked_mul(symbol.scale().ok_or_else(invalid)?)
            .and_then(|v| v.checked_add(frac))
            .and_then(bounded)
            .ok_or_else(|| TokenError::InvalidAmount(format!("magnitude out of range: {}", s)))?;

        let value = if negative { -magnitude } else { magnitude };
        Ok(Amount::new(value, symbol))
    }
}
