use std::fmt;
use std::str::FromStr;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MoneyError {
    #[error("not a money amount: '{0}'")]
    Malformed(String),
    #[error("amount out of range: '{0}'")]
    Overflow(String),
}

/// A non-negative dollar amount, held as whole cents so bets, payouts and
/// bankrolls add up exactly.
///
/// ```
/// use blackjack_rs::money::Money;
///
/// let bankroll: Money = "100".parse().unwrap();
/// assert_eq!(bankroll, Money::from_dollars(100));
/// assert_eq!(bankroll.to_string(), "100.00");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub const fn from_dollars(dollars: u64) -> Self {
        Self(dollars * 100)
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// `self * num / den`, truncated to the cent. `None` on overflow or a
    /// zero denominator.
    pub fn checked_ratio(self, num: u64, den: u64) -> Option<Money> {
        if den == 0 {
            return None;
        }
        self.0.checked_mul(num).map(|v| Money(v / den))
    }

    /// True when `self` is a whole number of `step`s. A zero step never divides.
    pub fn is_multiple_of(self, step: Money) -> bool {
        step.0 != 0 && self.0 % step.0 == 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        let malformed = || MoneyError::Malformed(s.to_string());
        let (whole, frac) = match t.split_once('.') {
            Some((w, f)) => (w, f),
            None => (t, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(malformed());
        }
        if frac.len() > 2
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(malformed());
        }
        let dollars: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| MoneyError::Overflow(s.to_string()))?
        };
        let cents: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().map_err(|_| malformed())? * 10,
            _ => frac.parse().map_err(|_| malformed())?,
        };
        dollars
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .map(Money)
            .ok_or_else(|| MoneyError::Overflow(s.to_string()))
    }
}
