use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;

/// Exact non-negative quantity of an asset, in the smallest unit.
///
/// All ledger arithmetic goes through this type; there is no floating
/// point anywhere in the crate. Quantities serialize as decimal strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Value(BigUint);

impl Value {
    pub fn zero() -> Self {
        Value(BigUint::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtraction that reports underflow instead of wrapping.
    pub fn checked_sub(&self, other: &Value) -> Option<Value> {
        if self >= other {
            Some(Value(&self.0 - &other.0))
        } else {
            None
        }
    }

    /// Narrow to `u64`; `None` when the quantity does not fit.
    pub fn to_u64(&self) -> Option<u64> {
        self.0.to_u64()
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value(BigUint::from(value))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Value {
    type Err = num_bigint::ParseBigIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Value(BigUint::from_str(s)?))
    }
}

impl Add<&Value> for &Value {
    type Output = Value;

    fn add(self, rhs: &Value) -> Value {
        Value(&self.0 + &rhs.0)
    }
}

impl AddAssign<&Value> for Value {
    fn add_assign(&mut self, rhs: &Value) {
        self.0 += &rhs.0;
    }
}

impl Sub<&Value> for &Value {
    type Output = Value;

    /// Panics on underflow; use [`Value::checked_sub`] when the ordering
    /// is not already established.
    fn sub(self, rhs: &Value) -> Value {
        Value(&self.0 - &rhs.0)
    }
}

impl SubAssign<&Value> for Value {
    fn sub_assign(&mut self, rhs: &Value) {
        self.0 -= &rhs.0;
    }
}

impl Mul<u64> for &Value {
    type Output = Value;

    fn mul(self, rhs: u64) -> Value {
        Value(&self.0 * rhs)
    }
}

impl<'a> Sum<&'a Value> for Value {
    fn sum<I: Iterator<Item = &'a Value>>(iter: I) -> Value {
        let mut total = Value::zero();
        for value in iter {
            total += value;
        }
        total
    }
}

impl Sum<Value> for Value {
    fn sum<I: Iterator<Item = Value>>(iter: I) -> Value {
        let mut total = Value::zero();
        for value in iter {
            total += &value;
        }
        total
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Value::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

/// Signed accumulator over [`Value`].
///
/// Differences that may be negative (deposit netting, the satisfaction
/// test) are tracked here rather than in `Value`, which is strictly
/// non-negative.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Balance {
    Debt(Value),
    Balanced,
    Excess(Value),
}

impl Balance {
    pub fn zero() -> Self {
        Balance::Balanced
    }

    pub fn balanced(&self) -> bool {
        matches!(self, Balance::Balanced)
    }

    pub fn excess(&self) -> Option<&Value> {
        match self {
            Balance::Excess(value) => Some(value),
            _ => None,
        }
    }

    pub fn debt(&self) -> Option<&Value> {
        match self {
            Balance::Debt(value) => Some(value),
            _ => None,
        }
    }

    /// Non-negative side of the balance, zero otherwise.
    pub fn excess_or_zero(&self) -> Value {
        match self {
            Balance::Excess(value) => value.clone(),
            _ => Value::zero(),
        }
    }

    fn normalize(self) -> Self {
        match self {
            Balance::Debt(value) if value.is_zero() => Balance::Balanced,
            Balance::Excess(value) if value.is_zero() => Balance::Balanced,
            other => other,
        }
    }
}

impl Default for Balance {
    fn default() -> Self {
        Balance::Balanced
    }
}

impl AddAssign<&Value> for Balance {
    fn add_assign(&mut self, rhs: &Value) {
        let current = std::mem::take(self);
        *self = match current {
            Balance::Balanced => Balance::Excess(rhs.clone()),
            Balance::Excess(value) => Balance::Excess(&value + rhs),
            Balance::Debt(value) => match rhs.checked_sub(&value) {
                Some(excess) => Balance::Excess(excess),
                None => Balance::Debt(&value - rhs),
            },
        }
        .normalize();
    }
}

impl SubAssign<&Value> for Balance {
    fn sub_assign(&mut self, rhs: &Value) {
        let current = std::mem::take(self);
        *self = match current {
            Balance::Balanced => Balance::Debt(rhs.clone()),
            Balance::Debt(value) => Balance::Debt(&value + rhs),
            Balance::Excess(value) => match value.checked_sub(rhs) {
                Some(excess) => Balance::Excess(excess),
                None => Balance::Debt(rhs - &value),
            },
        }
        .normalize();
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Balance::Debt(value) => write!(f, "-{}", value),
            Balance::Balanced => write!(f, "0"),
            Balance::Excess(value) => write!(f, "{}", value),
        }
    }
}
