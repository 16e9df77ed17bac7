//! Default ledger backend: linear fees, CBOR sizing, Blake2b hashing
//! and the Shelley body serializer, all behind the estimator seams the
//! engine is written against.

pub mod addresses;
pub mod builder;
pub mod codec;
pub mod fees;

pub use addresses::placeholder_address;
pub use builder::ShelleyTxBuilder;

use crate::certs::StakeCredential;
use crate::error::ComposeError;
use blake2::digest::consts::{U28, U32};
use blake2::{Blake2b, Digest};

type Blake2b256 = Blake2b<U32>;
type Blake2b224 = Blake2b<U28>;

pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

pub fn blake2b_224(data: &[u8]) -> [u8; 28] {
    let mut hasher = Blake2b224::new();
    hasher.update(data);
    let mut out = [0u8; 28];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Stake credential for certificate building: the Blake2b-224 hash of
/// the account public key bytes. The key arrives hex-encoded or as a
/// bech32 string; the 2/0 soft derivation happens upstream of this
/// crate, which only needs the raw key material.
pub fn stake_credential_from_key(account_key: &str) -> Result<StakeCredential, ComposeError> {
    let bytes = match hex::decode(account_key) {
        Ok(bytes) => bytes,
        Err(_) => {
            use bech32::FromBase32;
            let (_, data, _) = bech32::decode(account_key).map_err(|err| {
                ComposeError::InvalidRequest(format!("account public key: {}", err))
            })?;
            Vec::<u8>::from_base32(&data).map_err(|err| {
                ComposeError::InvalidRequest(format!("account public key: {}", err))
            })?
        }
    };
    if bytes.is_empty() {
        return Err(ComposeError::InvalidRequest(
            "empty account public key".to_string(),
        ));
    }
    Ok(StakeCredential(blake2b_224(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_have_fixed_widths() {
        let body = blake2b_256(b"body");
        let cred = blake2b_224(b"key");
        assert_eq!(body.len(), 32);
        assert_eq!(cred.len(), 28);
        assert_ne!(blake2b_256(b"a"), blake2b_256(b"b"));
    }

    #[test]
    fn credential_from_hex_key() {
        let key = hex::encode([0x11u8; 64]);
        let credential = stake_credential_from_key(&key).unwrap();
        assert_eq!(credential, stake_credential_from_key(&key).unwrap());
        assert!(stake_credential_from_key("zz-not-a-key").is_err());
        assert!(stake_credential_from_key("").is_err());
    }
}
