//! Pure multiset accounting over UTXOs and outputs.

use crate::asset::TokenId;
use crate::tx::{TxOutput, Utxo};
use crate::value::Value;
use std::collections::HashSet;

/// Total quantity of `unit` across the given inputs.
pub fn sum_inputs(utxos: &[Utxo], unit: &TokenId) -> Value {
    let mut total = Value::zero();
    for utxo in utxos {
        total += &utxo.quantity_of(unit);
    }
    total
}

/// Total quantity of `unit` across the given outputs.
pub fn sum_outputs(outputs: &[TxOutput], unit: &TokenId) -> Value {
    let mut total = Value::zero();
    for output in outputs {
        total += &output.quantity_of(unit);
    }
    total
}

/// Distinct token units held by `utxos`, first-seen order, lovelace
/// excluded.
pub fn unique_token_units(utxos: &[Utxo]) -> Vec<TokenId> {
    let mut seen = HashSet::new();
    let mut units = Vec::new();
    for utxo in utxos {
        for asset in utxo.tokens() {
            if seen.insert(asset.unit.clone()) {
                units.push(asset.unit.clone());
            }
        }
    }
    units
}

/// Distinct token units requested by `outputs`, first-seen order.
pub fn requested_token_units(outputs: &[TxOutput]) -> Vec<TokenId> {
    let mut seen = HashSet::new();
    let mut units = Vec::new();
    for output in outputs {
        for asset in &output.assets {
            if seen.insert(asset.unit.clone()) {
                units.push(asset.unit.clone());
            }
        }
    }
    units
}
