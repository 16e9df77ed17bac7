//! Coin selection and transaction composition for Shelley-era Cardano
//! wallets: pick inputs, build change, pin the minimum fee and emit a
//! serialized transaction body ready for signing.

pub mod accounting;
pub mod asset;
pub mod certs;
pub mod change;
pub mod compose;
pub mod error;
pub mod estimate;
pub mod finalize;
pub mod ledger;
pub mod normalize;
pub mod params;
pub mod select;
pub mod tx;
pub mod value;

pub use asset::{TokenId, TransactionAsset};
pub use certs::{Certificate, PoolId, StakeCredential, Withdrawal};
pub use compose::{compose, compose_with, ComposeRequest, ComposeResult, TxPayload};
pub use error::ComposeError;
pub use estimate::{AssembledTx, TransactionAssembler, TransactionFeeEstimator};
pub use ledger::ShelleyTxBuilder;
pub use params::{ComposeOptions, ProtocolParams};
pub use select::UtxoChooser;
pub use tx::{Address, OutputIndex, OutputRequest, TransactionId, TxOutput, Utxo, UtxoPointer};
pub use value::{Balance, Value};
