//! CBOR encoding of the Shelley-era transaction body. The same encoder
//! drives serialization, the size model and the min-ada rule, so every
//! byte the fee math reasons about is a byte that ends up on the wire.

use crate::asset::TransactionAsset;
use crate::certs::{Certificate, StakeCredential};
use crate::error::ComposeError;
use crate::tx::{TxOutput, UtxoPointer};
use crate::value::Value;
use minicbor::Encoder;
use std::collections::BTreeMap;

use super::addresses::address_bytes;

fn cbor_error<E: std::fmt::Display>(err: minicbor::encode::Error<E>) -> ComposeError {
    ComposeError::Codec(err.to_string())
}

fn quantity_u64(quantity: &Value) -> Result<u64, ComposeError> {
    quantity
        .to_u64()
        .ok_or_else(|| ComposeError::Codec(format!("quantity {} exceeds u64", quantity)))
}

fn tx_hash_bytes(pointer: &UtxoPointer) -> Result<Vec<u8>, ComposeError> {
    let bytes = hex::decode(pointer.transaction_id.as_ref())
        .map_err(|err| ComposeError::InvalidRequest(format!("tx hash: {}", err)))?;
    if bytes.len() != 32 {
        return Err(ComposeError::InvalidRequest(format!(
            "tx hash {} is not 32 bytes",
            pointer.transaction_id
        )));
    }
    Ok(bytes)
}

/// `policy bytes -> asset name bytes -> quantity`, in the canonical
/// order the ledger serializes multiassets in. Zero quantities are kept
/// so that a zeroed set-max target still contributes its bytes to size
/// and min-ada estimates.
type MultiAsset = BTreeMap<Vec<u8>, BTreeMap<Vec<u8>, u64>>;

fn build_multiasset(assets: &[TransactionAsset]) -> Result<MultiAsset, ComposeError> {
    let mut multiasset = MultiAsset::new();
    for asset in assets {
        let (policy_hex, name_hex) = asset.unit.policy_and_name().ok_or_else(|| {
            ComposeError::InvalidRequest(format!("malformed token unit: {}", asset.unit))
        })?;
        let policy = hex::decode(policy_hex)
            .map_err(|err| ComposeError::InvalidRequest(format!("token policy: {}", err)))?;
        let name = hex::decode(name_hex)
            .map_err(|err| ComposeError::InvalidRequest(format!("asset name: {}", err)))?;
        let quantity = quantity_u64(&asset.quantity)?;
        *multiasset.entry(policy).or_default().entry(name).or_default() += quantity;
    }
    Ok(multiasset)
}

fn encode_value(e: &mut Encoder<&mut Vec<u8>>, output: &TxOutput) -> Result<(), ComposeError> {
    let coin = quantity_u64(&output.value)?;
    if output.assets.is_empty() {
        e.u64(coin).map_err(cbor_error)?;
        return Ok(());
    }
    let multiasset = build_multiasset(&output.assets)?;
    e.array(2).map_err(cbor_error)?;
    e.u64(coin).map_err(cbor_error)?;
    e.map(multiasset.len() as u64).map_err(cbor_error)?;
    for (policy, assets) in &multiasset {
        e.bytes(policy).map_err(cbor_error)?;
        e.map(assets.len() as u64).map_err(cbor_error)?;
        for (name, quantity) in assets {
            e.bytes(name).map_err(cbor_error)?;
            e.u64(*quantity).map_err(cbor_error)?;
        }
    }
    Ok(())
}

fn encode_input(e: &mut Encoder<&mut Vec<u8>>, pointer: &UtxoPointer) -> Result<(), ComposeError> {
    let hash = tx_hash_bytes(pointer)?;
    e.array(2).map_err(cbor_error)?;
    e.bytes(&hash).map_err(cbor_error)?;
    e.u32(u32::from(pointer.output_index)).map_err(cbor_error)?;
    Ok(())
}

fn encode_output(e: &mut Encoder<&mut Vec<u8>>, output: &TxOutput) -> Result<(), ComposeError> {
    let address = address_bytes(&output.address)?;
    e.array(2).map_err(cbor_error)?;
    e.bytes(&address).map_err(cbor_error)?;
    encode_value(e, output)
}

fn encode_credential(
    e: &mut Encoder<&mut Vec<u8>>,
    credential: &StakeCredential,
) -> Result<(), ComposeError> {
    e.array(2).map_err(cbor_error)?;
    e.u8(0).map_err(cbor_error)?;
    e.bytes(&credential.0).map_err(cbor_error)?;
    Ok(())
}

fn encode_certificate(
    e: &mut Encoder<&mut Vec<u8>>,
    certificate: &Certificate,
    credential: &StakeCredential,
) -> Result<(), ComposeError> {
    match certificate {
        Certificate::StakeRegistration => {
            e.array(2).map_err(cbor_error)?;
            e.u8(0).map_err(cbor_error)?;
            encode_credential(e, credential)
        }
        Certificate::StakeDeregistration => {
            e.array(2).map_err(cbor_error)?;
            e.u8(1).map_err(cbor_error)?;
            encode_credential(e, credential)
        }
        Certificate::StakeDelegation { pool } => {
            let pool_hash = hex::decode(pool.as_ref())
                .map_err(|err| ComposeError::InvalidRequest(format!("pool hash: {}", err)))?;
            e.array(3).map_err(cbor_error)?;
            e.u8(2).map_err(cbor_error)?;
            encode_credential(e, credential)?;
            e.bytes(&pool_hash).map_err(cbor_error)?;
            Ok(())
        }
        // pool parameters are supplied by the registration flow itself;
        // only the tag participates in size accounting here
        Certificate::StakePoolRegistration => {
            e.array(1).map_err(cbor_error)?;
            e.u8(3).map_err(cbor_error)?;
            Ok(())
        }
    }
}

/// Serialized size and bytes of a single input.
pub fn input_bytes(pointer: &UtxoPointer) -> Result<Vec<u8>, ComposeError> {
    let mut buffer = Vec::new();
    encode_input(&mut Encoder::new(&mut buffer), pointer)?;
    Ok(buffer)
}

/// Serialized size and bytes of a single output.
pub fn output_bytes(output: &TxOutput) -> Result<Vec<u8>, ComposeError> {
    let mut buffer = Vec::new();
    encode_output(&mut Encoder::new(&mut buffer), output)?;
    Ok(buffer)
}

/// Serialized bytes of an output's value field alone, the quantity the
/// protocol's `max_value_size` limit is measured against.
pub fn value_bytes(output: &TxOutput) -> Result<Vec<u8>, ComposeError> {
    let mut buffer = Vec::new();
    encode_value(&mut Encoder::new(&mut buffer), output)?;
    Ok(buffer)
}

/// Everything a body serialization needs, with inputs and withdrawals
/// already in their canonical order.
pub struct BodyView<'a> {
    pub inputs: &'a [UtxoPointer],
    pub outputs: &'a [TxOutput],
    pub fee: &'a Value,
    pub ttl: Option<u64>,
    pub certificates: &'a [Certificate],
    pub credential: Option<&'a StakeCredential>,
    pub withdrawals: &'a [(Vec<u8>, Value)],
}

pub fn body_bytes(view: &BodyView<'_>) -> Result<Vec<u8>, ComposeError> {
    let mut entries = 3u64;
    if view.ttl.is_some() {
        entries += 1;
    }
    if !view.certificates.is_empty() {
        entries += 1;
    }
    if !view.withdrawals.is_empty() {
        entries += 1;
    }

    let mut buffer = Vec::new();
    let mut e = Encoder::new(&mut buffer);
    e.map(entries).map_err(cbor_error)?;

    e.u8(0).map_err(cbor_error)?;
    e.array(view.inputs.len() as u64).map_err(cbor_error)?;
    for pointer in view.inputs {
        encode_input(&mut e, pointer)?;
    }

    e.u8(1).map_err(cbor_error)?;
    e.array(view.outputs.len() as u64).map_err(cbor_error)?;
    for output in view.outputs {
        encode_output(&mut e, output)?;
    }

    e.u8(2).map_err(cbor_error)?;
    e.u64(quantity_u64(view.fee)?).map_err(cbor_error)?;

    if let Some(ttl) = view.ttl {
        e.u8(3).map_err(cbor_error)?;
        e.u64(ttl).map_err(cbor_error)?;
    }

    if !view.certificates.is_empty() {
        let credential = view.credential.ok_or_else(|| {
            ComposeError::InvalidRequest("certificates without a stake credential".to_string())
        })?;
        e.u8(4).map_err(cbor_error)?;
        e.array(view.certificates.len() as u64).map_err(cbor_error)?;
        for certificate in view.certificates {
            encode_certificate(&mut e, certificate, credential)?;
        }
    }

    if !view.withdrawals.is_empty() {
        e.u8(5).map_err(cbor_error)?;
        e.map(view.withdrawals.len() as u64).map_err(cbor_error)?;
        for (account, amount) in view.withdrawals {
            e.bytes(account).map_err(cbor_error)?;
            e.u64(quantity_u64(amount)?).map_err(cbor_error)?;
        }
    }

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::TokenId;
    use crate::ledger::addresses::placeholder_address;
    use crate::tx::{OutputIndex, TransactionId};

    fn pointer(hash_byte: u8, index: u32) -> UtxoPointer {
        UtxoPointer {
            transaction_id: TransactionId::new(hex::encode([hash_byte; 32])),
            output_index: OutputIndex::new(index),
        }
    }

    fn plain_output(lovelace: u64) -> TxOutput {
        TxOutput::new(placeholder_address(), Value::from(lovelace), vec![])
    }

    #[test]
    fn input_encoding_shape() {
        let bytes = input_bytes(&pointer(0xab, 3)).unwrap();
        let mut d = minicbor::Decoder::new(&bytes);
        assert_eq!(d.array().unwrap(), Some(2));
        assert_eq!(d.bytes().unwrap(), [0xab; 32]);
        assert_eq!(d.u32().unwrap(), 3);
    }

    #[test]
    fn rejects_short_tx_hash() {
        let bad = UtxoPointer {
            transaction_id: TransactionId::new("abcd"),
            output_index: OutputIndex::new(0),
        };
        assert!(input_bytes(&bad).is_err());
    }

    #[test]
    fn plain_value_is_a_bare_coin() {
        let bytes = value_bytes(&plain_output(4_820_000)).unwrap();
        let mut d = minicbor::Decoder::new(&bytes);
        assert_eq!(d.u64().unwrap(), 4_820_000);
    }

    #[test]
    fn token_value_nests_policies_canonically() {
        let mut output = plain_output(1_500_000);
        output.assets = vec![
            TransactionAsset::new(
                TokenId::new(format!("{}{}", "ff".repeat(28), "aa")),
                Value::from(7),
            ),
            TransactionAsset::new(
                TokenId::new(format!("{}{}", "00".repeat(28), "bb")),
                Value::from(9),
            ),
        ];
        let bytes = value_bytes(&output).unwrap();
        let mut d = minicbor::Decoder::new(&bytes);
        assert_eq!(d.array().unwrap(), Some(2));
        assert_eq!(d.u64().unwrap(), 1_500_000);
        assert_eq!(d.map().unwrap(), Some(2));
        // policy 00.. sorts before ff..
        assert_eq!(d.bytes().unwrap(), [0x00; 28]);
        assert_eq!(d.map().unwrap(), Some(1));
        assert_eq!(d.bytes().unwrap(), [0xbb]);
        assert_eq!(d.u64().unwrap(), 9);
        assert_eq!(d.bytes().unwrap(), [0xff; 28]);
    }

    #[test]
    fn zero_quantity_assets_still_take_bytes() {
        let mut zeroed = plain_output(1_000_000);
        zeroed.assets = vec![TransactionAsset::new(
            TokenId::new(format!("{}{}", "aa".repeat(28), "00")),
            Value::zero(),
        )];
        let with_tokens = value_bytes(&zeroed).unwrap();
        let without = value_bytes(&plain_output(1_000_000)).unwrap();
        assert!(with_tokens.len() > without.len());
    }

    #[test]
    fn body_contains_expected_fields() {
        let inputs = vec![pointer(0x01, 0), pointer(0x02, 1)];
        let outputs = vec![plain_output(1_000_000)];
        let fee = Value::from(170_000);
        let withdrawals = vec![(vec![0xe1; 29], Value::from(10_000_000))];
        let credential = StakeCredential([0x07; 28]);
        let body = body_bytes(&BodyView {
            inputs: &inputs,
            outputs: &outputs,
            fee: &fee,
            ttl: Some(7_000_000),
            certificates: &[Certificate::StakeDeregistration],
            credential: Some(&credential),
            withdrawals: &withdrawals,
        })
        .unwrap();

        let mut d = minicbor::Decoder::new(&body);
        assert_eq!(d.map().unwrap(), Some(6));
        assert_eq!(d.u8().unwrap(), 0);
        assert_eq!(d.array().unwrap(), Some(2));
        d.array().unwrap();
        d.bytes().unwrap();
        d.u32().unwrap();
        d.array().unwrap();
        d.bytes().unwrap();
        d.u32().unwrap();
        assert_eq!(d.u8().unwrap(), 1);
        assert_eq!(d.array().unwrap(), Some(1));
        d.array().unwrap();
        d.bytes().unwrap();
        d.u64().unwrap();
        assert_eq!(d.u8().unwrap(), 2);
        assert_eq!(d.u64().unwrap(), 170_000);
        assert_eq!(d.u8().unwrap(), 3);
        assert_eq!(d.u64().unwrap(), 7_000_000);
        assert_eq!(d.u8().unwrap(), 4);
        assert_eq!(d.array().unwrap(), Some(1));
        assert_eq!(d.array().unwrap(), Some(2));
        assert_eq!(d.u8().unwrap(), 1);
        assert_eq!(d.array().unwrap(), Some(2));
        assert_eq!(d.u8().unwrap(), 0);
        assert_eq!(d.bytes().unwrap(), [0x07; 28]);
        assert_eq!(d.u8().unwrap(), 5);
        assert_eq!(d.map().unwrap(), Some(1));
        assert_eq!(d.bytes().unwrap(), [0xe1; 29]);
        assert_eq!(d.u64().unwrap(), 10_000_000);
    }

    #[test]
    fn ttl_absence_shrinks_the_map() {
        let inputs = vec![pointer(0x01, 0)];
        let outputs = vec![plain_output(1_000_000)];
        let fee = Value::from(170_000);
        let view = |ttl| BodyView {
            inputs: &inputs,
            outputs: &outputs,
            fee: &fee,
            ttl,
            certificates: &[],
            credential: None,
            withdrawals: &[],
        };
        let without = body_bytes(&view(None)).unwrap();
        let with = body_bytes(&view(Some(1))).unwrap();
        let mut d = minicbor::Decoder::new(&without);
        assert_eq!(d.map().unwrap(), Some(3));
        assert!(with.len() > without.len());
    }
}
