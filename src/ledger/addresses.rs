//! Raw bech32 payload handling. The engine treats addresses as opaque
//! strings; only the ledger backend ever looks at the bytes, and only
//! for serialization and size math.

use crate::error::ComposeError;
use crate::tx::Address;
use bech32::{FromBase32, ToBase32, Variant};
use std::sync::OnceLock;

/// Byte length of a Shelley base-address payload (header + two 28-byte
/// credential hashes).
const BASE_ADDRESS_LEN: usize = 57;

/// Byte length of a reward-account payload (header + one credential).
const REWARD_ADDRESS_LEN: usize = 29;

pub fn address_bytes(address: &Address) -> Result<Vec<u8>, ComposeError> {
    let (_, data, _) = bech32::decode(address.as_ref())
        .map_err(|err| ComposeError::InvalidAddress(format!("{}: {}", address, err)))?;
    Vec::<u8>::from_base32(&data)
        .map_err(|err| ComposeError::InvalidAddress(format!("{}: {}", address, err)))
}

/// Reward account bytes for a withdrawal entry.
pub fn reward_account_bytes(address: &Address) -> Result<Vec<u8>, ComposeError> {
    let bytes = address_bytes(address)?;
    if bytes.len() != REWARD_ADDRESS_LEN {
        return Err(ComposeError::InvalidAddress(format!(
            "{}: not a reward account",
            address
        )));
    }
    Ok(bytes)
}

pub fn encode_address(hrp: &str, bytes: &[u8]) -> Result<Address, ComposeError> {
    let encoded = bech32::encode(hrp, bytes.to_base32(), Variant::Bech32)
        .map_err(|err| ComposeError::InvalidAddress(err.to_string()))?;
    Ok(Address::new(encoded))
}

/// Fixed stand-in for outputs whose address the caller has not supplied
/// yet. Same payload length as a mainnet base address, so size and fee
/// math match the eventual real output.
pub fn placeholder_address() -> Address {
    static PLACEHOLDER: OnceLock<Address> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| {
            let mut payload = [0u8; BASE_ADDRESS_LEN];
            // header nibbles: base address, mainnet
            payload[0] = 0x01;
            encode_address("addr", &payload).expect("static payload encodes")
        })
        .clone()
}
