use crate::asset::{TokenId, TransactionAsset};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex-encoded 32-byte transaction hash. Stored lowercase so that the
/// derived ordering matches the byte-wise ordering used by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(hash: impl Into<String>) -> Self {
        TransactionId(hash.into().to_lowercase())
    }
}

impl From<String> for TransactionId {
    fn from(hash: String) -> Self {
        TransactionId::new(hash)
    }
}

impl AsRef<str> for TransactionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct OutputIndex(u32);

impl OutputIndex {
    pub fn new(index: u32) -> Self {
        OutputIndex(index)
    }
}

impl From<OutputIndex> for u32 {
    fn from(index: OutputIndex) -> u32 {
        index.0
    }
}

/// Uniqueness key of a UTXO.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtxoPointer {
    pub transaction_id: TransactionId,
    pub output_index: OutputIndex,
}

impl fmt::Display for UtxoPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.transaction_id, u32::from(self.output_index))
    }
}

/// Bech32 address newtype. The engine never interprets the payload; the
/// ledger backend decodes it for size and serialization math.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Address(address.into())
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An unspent output as supplied by the caller. `amount` always carries
/// at least one lovelace entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    #[serde(rename = "txHash")]
    pub tx_hash: TransactionId,
    #[serde(rename = "outputIndex")]
    pub output_index: OutputIndex,
    pub address: Address,
    pub amount: Vec<TransactionAsset>,
}

impl Utxo {
    pub fn pointer(&self) -> UtxoPointer {
        UtxoPointer {
            transaction_id: self.tx_hash.clone(),
            output_index: self.output_index,
        }
    }

    pub fn lovelace(&self) -> Value {
        self.quantity_of(&TokenId::lovelace())
    }

    pub fn quantity_of(&self, unit: &TokenId) -> Value {
        self.amount
            .iter()
            .filter(|asset| &asset.unit == unit)
            .map(|asset| &asset.quantity)
            .sum()
    }

    pub fn has_unit(&self, unit: &TokenId) -> bool {
        self.amount
            .iter()
            .any(|asset| &asset.unit == unit && !asset.quantity.is_zero())
    }

    /// Token entries, lovelace excluded.
    pub fn tokens(&self) -> impl Iterator<Item = &TransactionAsset> {
        self.amount.iter().filter(|asset| !asset.unit.is_lovelace())
    }
}

/// A concrete transaction output: resolved address, lovelace amount and
/// token payload. Change outputs carry `is_change = true`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: Address,
    #[serde(rename = "amount")]
    pub value: Value,
    pub assets: Vec<TransactionAsset>,
    #[serde(rename = "isChange", default)]
    pub is_change: bool,
}

impl TxOutput {
    pub fn new(address: Address, value: Value, assets: Vec<TransactionAsset>) -> Self {
        TxOutput {
            address,
            value,
            assets,
            is_change: false,
        }
    }

    pub fn change(address: Address, value: Value, assets: Vec<TransactionAsset>) -> Self {
        TxOutput {
            address,
            value,
            assets,
            is_change: true,
        }
    }

    pub fn quantity_of(&self, unit: &TokenId) -> Value {
        if unit.is_lovelace() {
            return self.value.clone();
        }
        self.assets
            .iter()
            .filter(|asset| &asset.unit == unit)
            .map(|asset| &asset.quantity)
            .sum()
    }

    pub fn has_tokens(&self) -> bool {
        self.assets.iter().any(|asset| !asset.quantity.is_zero())
    }
}

/// A requested asset amount inside a [`OutputRequest`]. A missing
/// quantity switches the composition into precompose mode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAsset {
    pub unit: TokenId,
    #[serde(default)]
    pub quantity: Option<Value>,
}

/// A user-requested payment, before normalization. Address and amount
/// may be absent while the caller is still filling in the form; the
/// composer then answers with fee and total only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRequest {
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub assets: Vec<RequestedAsset>,
    #[serde(rename = "setMax", default)]
    pub set_max: bool,
}

impl OutputRequest {
    /// The unit a `setMax` output drains: the first requested asset, or
    /// lovelace when the output carries none.
    pub fn max_target(&self) -> Option<TokenId> {
        if !self.set_max {
            return None;
        }
        Some(
            self.assets
                .first()
                .map(|asset| asset.unit.clone())
                .unwrap_or_else(TokenId::lovelace),
        )
    }
}

/// Whether every field needed for a signable transaction was present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComposeMode {
    Final,
    Precompose,
}

/// A normalized user output: address resolved (placeholder in
/// precompose mode), amount bumped to the output's min-ada where the
/// ledger demands it, `setMax` target zeroed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedOutput {
    pub output: TxOutput,
    pub set_max: bool,
}

impl PreparedOutput {
    pub fn max_target(&self) -> Option<TokenId> {
        if !self.set_max {
            return None;
        }
        Some(
            self.output
                .assets
                .first()
                .map(|asset| asset.unit.clone())
                .unwrap_or_else(TokenId::lovelace),
        )
    }
}

/// A costed change output: the output itself plus the two oracle
/// figures the selection loop needs to reason about it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputCost {
    pub output: TxOutput,
    pub output_fee: Value,
    pub min_output_amount: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(unit: &str, quantity: u64) -> TransactionAsset {
        TransactionAsset::new(TokenId::new(unit), Value::from(quantity))
    }

    fn utxo(hash: &str, index: u32, lovelace: u64, tokens: Vec<TransactionAsset>) -> Utxo {
        let mut amount = vec![TransactionAsset::lovelace(Value::from(lovelace))];
        amount.extend(tokens);
        Utxo {
            tx_hash: TransactionId::new(hash),
            output_index: OutputIndex::new(index),
            address: Address::new("addr1test"),
            amount,
        }
    }

    #[test]
    fn utxo_quantities() {
        let utxo = utxo("ff00", 1, 5_000_000, vec![token("aa", 120)]);
        assert_eq!(utxo.lovelace(), Value::from(5_000_000));
        assert_eq!(utxo.quantity_of(&TokenId::new("aa")), Value::from(120));
        assert_eq!(utxo.quantity_of(&TokenId::new("bb")), Value::zero());
        assert!(utxo.has_unit(&TokenId::new("aa")));
        assert!(!utxo.has_unit(&TokenId::new("bb")));
        assert_eq!(utxo.tokens().count(), 1);
    }

    #[test]
    fn pointer_orders_like_the_ledger() {
        let a = utxo("00aa", 1, 1, vec![]).pointer();
        let b = utxo("00aa", 0, 1, vec![]).pointer();
        let c = utxo("ff00", 0, 1, vec![]).pointer();
        let mut pointers = vec![c.clone(), a.clone(), b.clone()];
        pointers.sort();
        assert_eq!(pointers, vec![b, a, c]);
    }

    #[test]
    fn transaction_id_normalizes_case() {
        assert_eq!(
            TransactionId::new("AB12").as_ref(),
            TransactionId::new("ab12").as_ref()
        );
    }

    #[test]
    fn max_target_defaults_to_lovelace() {
        let mut request = OutputRequest {
            set_max: true,
            ..OutputRequest::default()
        };
        assert_eq!(request.max_target(), Some(TokenId::lovelace()));

        request.assets.push(RequestedAsset {
            unit: TokenId::new("aa".repeat(28)),
            quantity: Some(Value::from(1)),
        });
        assert_eq!(request.max_target(), Some(TokenId::new("aa".repeat(28))));

        request.set_max = false;
        assert_eq!(request.max_target(), None);
    }

    #[test]
    fn request_wire_shape() {
        let json = r#"{
            "address": "addr1test",
            "amount": "2000000",
            "assets": [{"unit": "lovelace", "quantity": "1"}],
            "setMax": true
        }"#;
        let request: OutputRequest = serde_json::from_str(json).unwrap();
        assert!(request.set_max);
        assert_eq!(request.amount, Some(Value::from(2_000_000)));

        let partial: OutputRequest = serde_json::from_str(r#"{"assets": []}"#).unwrap();
        assert!(partial.address.is_none());
        assert!(partial.amount.is_none());
        assert!(!partial.set_max);
    }
}
