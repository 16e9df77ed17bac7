//! Seams between the composition engine and the ledger arithmetic.
//!
//! The engine never computes a fee, a min-ada or a byte itself; it asks
//! an estimator. The default implementation lives in [`crate::ledger`],
//! and tests or embedders can substitute their own.

use crate::certs::{Certificate, StakeCredential, Withdrawal};
use crate::error::ComposeError;
use crate::tx::{TxOutput, Utxo, UtxoPointer};
use crate::value::Value;

/// Mutable per-composition transaction state plus the cost queries the
/// selection loop needs.
///
/// State only grows: inputs, certificates and withdrawals are added,
/// never removed. Outputs are *not* part of the state. Every fee query
/// receives the candidate output list of the current iteration, so
/// change outputs that get discarded on reselection never pollute the
/// builder.
pub trait TransactionFeeEstimator {
    fn add_input(&mut self, utxo: &Utxo) -> Result<(), ComposeError>;

    fn set_certificates(
        &mut self,
        certificates: &[Certificate],
        credential: &StakeCredential,
    ) -> Result<(), ComposeError>;

    fn set_withdrawals(&mut self, withdrawals: &[Withdrawal]) -> Result<(), ComposeError>;

    fn set_ttl(&mut self, ttl: Option<u64>);

    /// Minimum fee of the current state extended with `outputs`.
    fn min_fee(&self, outputs: &[TxOutput]) -> Result<Value, ComposeError>;

    /// Marginal fee contribution of one input (witness included).
    fn fee_for_input(&self, utxo: &Utxo) -> Result<Value, ComposeError>;

    /// Marginal fee contribution of one output.
    fn fee_for_output(&self, output: &TxOutput) -> Result<Value, ComposeError>;

    /// Minimum lovelace an output with this shape must carry.
    fn min_ada_required(&self, output: &TxOutput) -> Result<Value, ComposeError>;
}

/// Final serialization of a converged composition.
pub trait TransactionAssembler {
    fn assemble(&self, outputs: &[TxOutput], fee: &Value) -> Result<AssembledTx, ComposeError>;
}

/// A serialized transaction body ready for signing.
#[derive(Clone, Debug)]
pub struct AssembledTx {
    pub body: Vec<u8>,
    /// Blake2b-256 of the body bytes.
    pub hash: [u8; 32],
    /// Inputs in the order the body serializes them; the composer
    /// reorders its answer to match.
    pub input_order: Vec<UtxoPointer>,
}

impl AssembledTx {
    pub fn size(&self) -> usize {
        self.body.len()
    }
}
