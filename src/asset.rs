use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Asset unit identifier.
///
/// The sentinel `"lovelace"` denotes the native coin; every other unit
/// is the hex concatenation of a 28-byte policy hash and the asset name
/// bytes.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenId(String);

/// Hex length of a policy hash inside a token unit.
const POLICY_HEX_LEN: usize = 56;

impl TokenId {
    pub const LOVELACE: &'static str = "lovelace";

    pub fn new(unit: impl Into<String>) -> Self {
        TokenId(unit.into())
    }

    pub fn lovelace() -> Self {
        TokenId(Self::LOVELACE.to_string())
    }

    pub fn is_lovelace(&self) -> bool {
        self.0 == Self::LOVELACE
    }

    /// Splits a token unit into `(policy_hex, asset_name_hex)`.
    ///
    /// `None` for the lovelace sentinel or units shorter than a policy
    /// hash.
    pub fn policy_and_name(&self) -> Option<(&str, &str)> {
        if self.is_lovelace() || self.0.len() < POLICY_HEX_LEN {
            return None;
        }
        Some(self.0.split_at(POLICY_HEX_LEN))
    }
}

impl AsRef<str> for TokenId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A quantity of one asset unit, the element type of UTXO and output
/// amounts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionAsset {
    pub unit: TokenId,
    pub quantity: Value,
}

impl TransactionAsset {
    pub fn new(unit: TokenId, quantity: Value) -> Self {
        TransactionAsset { unit, quantity }
    }

    pub fn lovelace(quantity: Value) -> Self {
        TransactionAsset {
            unit: TokenId::lovelace(),
            quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lovelace_sentinel() {
        assert!(TokenId::lovelace().is_lovelace());
        assert!(!TokenId::new("abcd").is_lovelace());
        assert!(TokenId::lovelace().policy_and_name().is_none());
    }

    #[test]
    fn unit_splits_into_policy_and_name() {
        let unit = TokenId::new(format!("{}{}", "ab".repeat(28), "534e454b"));
        let (policy, name) = unit.policy_and_name().unwrap();
        assert_eq!(policy.len(), 56);
        assert_eq!(name, "534e454b");

        // a policy with an empty asset name is still a valid unit
        let bare = TokenId::new("cd".repeat(28));
        let (_, name) = bare.policy_and_name().unwrap();
        assert!(name.is_empty());
    }
}
