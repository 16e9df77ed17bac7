use crate::error::ComposeError;
use crate::params::ProtocolParams;
use crate::tx::Address;
use crate::value::{Balance, Value};
use serde::{Deserialize, Serialize};

/// Hex-encoded 28-byte stake pool key hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolId(String);

impl PoolId {
    pub fn new(hash: impl Into<String>) -> Self {
        PoolId(hash.into().to_lowercase())
    }
}

impl AsRef<str> for PoolId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 28-byte stake credential hash, derived from the wallet's account key
/// by the ledger backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StakeCredential(pub [u8; 28]);

/// Staking certificates the composer accounts for. Tags follow the
/// ledger numbering; anything else is rejected at the boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CertificateWire", into = "CertificateWire")]
pub enum Certificate {
    StakeRegistration,
    StakeDeregistration,
    StakeDelegation { pool: PoolId },
    StakePoolRegistration,
}

impl Certificate {
    pub fn kind(&self) -> u8 {
        match self {
            Certificate::StakeRegistration => 0,
            Certificate::StakeDeregistration => 1,
            Certificate::StakeDelegation { .. } => 2,
            Certificate::StakePoolRegistration => 3,
        }
    }

    pub fn from_wire(kind: u8, pool: Option<PoolId>) -> Result<Self, ComposeError> {
        match (kind, pool) {
            (0, _) => Ok(Certificate::StakeRegistration),
            (1, _) => Ok(Certificate::StakeDeregistration),
            (2, Some(pool)) => Ok(Certificate::StakeDelegation { pool }),
            (2, None) => Err(ComposeError::InvalidRequest(
                "stake delegation without a pool hash".to_string(),
            )),
            (3, _) => Ok(Certificate::StakePoolRegistration),
            _ => Err(ComposeError::UnsupportedCertificateType),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct CertificateWire {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pool: Option<PoolId>,
}

impl TryFrom<CertificateWire> for Certificate {
    type Error = ComposeError;

    fn try_from(wire: CertificateWire) -> Result<Self, Self::Error> {
        Certificate::from_wire(wire.kind, wire.pool)
    }
}

impl From<Certificate> for CertificateWire {
    fn from(certificate: Certificate) -> Self {
        let pool = match &certificate {
            Certificate::StakeDelegation { pool } => Some(pool.clone()),
            _ => None,
        };
        CertificateWire {
            kind: certificate.kind(),
            pool,
        }
    }
}

/// A reward-account withdrawal; the amount joins the input side of the
/// balance equation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    #[serde(rename = "stakeAddress")]
    pub stake_address: Address,
    pub amount: Value,
}

/// Net deposit across all certificates: `Excess` is lovelace the
/// transaction must pay in, `Debt` is a refund joining the inputs.
pub fn deposit_balance(certificates: &[Certificate], params: &ProtocolParams) -> Balance {
    let mut balance = Balance::zero();
    for certificate in certificates {
        match certificate {
            Certificate::StakeRegistration => balance += &params.key_deposit,
            Certificate::StakeDeregistration => balance -= &params.key_deposit,
            Certificate::StakeDelegation { .. } => {}
            Certificate::StakePoolRegistration => balance += &params.pool_deposit,
        }
    }
    balance
}

pub fn total_withdrawn(withdrawals: &[Withdrawal]) -> Value {
    withdrawals.iter().map(|withdrawal| &withdrawal.amount).sum()
}
