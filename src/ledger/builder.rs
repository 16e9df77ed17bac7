use crate::certs::{Certificate, StakeCredential, Withdrawal};
use crate::error::ComposeError;
use crate::estimate::{AssembledTx, TransactionAssembler, TransactionFeeEstimator};
use crate::params::ProtocolParams;
use crate::tx::{TxOutput, Utxo, UtxoPointer};
use crate::value::Value;
use std::collections::BTreeSet;

use super::addresses::reward_account_bytes;
use super::codec::{self, BodyView};
use super::fees::LinearFee;

/// ```cddl
/// vkeywitness = [ vkey, signature ]
/// ```
const SIZE_OF_KEY_WITNESS: usize = 1 // 2-tuple declaration
    + (32 + 2) // verification key + bytestring declaration
    + (64 + 2); // signature + bytestring declaration

/// Witness-set map key and list declaration, plus the transaction
/// envelope around the body.
const SIZE_OF_TX_ENVELOPE: usize = (1 + 3 + 3) + 3;

/// Sizing stand-in while the real fee is still unknown; every realistic
/// mainnet fee occupies the same five CBOR bytes.
const PLACEHOLDER_FEE: u64 = 2_000_000;

/// Constant the coins-per-byte min-ada rule adds to the serialized
/// output size.
const MIN_ADA_OUTPUT_OVERHEAD: usize = 160;

/// The default oracle: tracks the transaction under construction and
/// answers every cost query from the same CBOR encoder that serializes
/// the final body.
///
/// Inputs, certificates and withdrawals only ever grow. Outputs are
/// passed into each query so the selection loop can rebuild change
/// candidates freely.
pub struct ShelleyTxBuilder {
    params: ProtocolParams,
    fees: LinearFee,
    inputs: Vec<Utxo>,
    seen_inputs: BTreeSet<UtxoPointer>,
    certificates: Vec<Certificate>,
    credential: Option<StakeCredential>,
    withdrawals: Vec<(Vec<u8>, Value)>,
    ttl: Option<u64>,
}

impl ShelleyTxBuilder {
    pub fn new(params: &ProtocolParams) -> Self {
        ShelleyTxBuilder {
            params: params.clone(),
            fees: LinearFee::new(params),
            inputs: Vec::new(),
            seen_inputs: BTreeSet::new(),
            certificates: Vec::new(),
            credential: None,
            withdrawals: Vec::new(),
            ttl: None,
        }
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    /// Inputs in the order the body serializes them.
    fn sorted_inputs(&self) -> Vec<UtxoPointer> {
        self.seen_inputs.iter().cloned().collect()
    }

    fn sorted_withdrawals(&self) -> Vec<(Vec<u8>, Value)> {
        let mut withdrawals = self.withdrawals.clone();
        withdrawals.sort_by(|a, b| a.0.cmp(&b.0));
        withdrawals
    }

    /// One signature per distinct input address, plus one for the stake
    /// key when certificates or withdrawals are present.
    fn signer_estimate(&self) -> usize {
        let addresses: BTreeSet<&str> = self
            .inputs
            .iter()
            .map(|utxo| utxo.address.as_ref())
            .collect();
        let stake_signer = !self.certificates.is_empty() || !self.withdrawals.is_empty();
        addresses.len() + usize::from(stake_signer)
    }

    fn body_with(&self, outputs: &[TxOutput], fee: &Value) -> Result<Vec<u8>, ComposeError> {
        codec::body_bytes(&BodyView {
            inputs: &self.sorted_inputs(),
            outputs,
            fee,
            ttl: self.ttl,
            certificates: &self.certificates,
            credential: self.credential.as_ref(),
            withdrawals: &self.sorted_withdrawals(),
        })
    }
}

impl TransactionFeeEstimator for ShelleyTxBuilder {
    fn add_input(&mut self, utxo: &Utxo) -> Result<(), ComposeError> {
        // validates the hash early so later encodes cannot fail
        codec::input_bytes(&utxo.pointer())?;
        if self.seen_inputs.insert(utxo.pointer()) {
            self.inputs.push(utxo.clone());
        }
        Ok(())
    }

    fn set_certificates(
        &mut self,
        certificates: &[Certificate],
        credential: &StakeCredential,
    ) -> Result<(), ComposeError> {
        self.certificates = certificates.to_vec();
        self.credential = Some(credential.clone());
        Ok(())
    }

    fn set_withdrawals(&mut self, withdrawals: &[Withdrawal]) -> Result<(), ComposeError> {
        for withdrawal in withdrawals {
            let account = reward_account_bytes(&withdrawal.stake_address)?;
            self.withdrawals.push((account, withdrawal.amount.clone()));
        }
        Ok(())
    }

    fn set_ttl(&mut self, ttl: Option<u64>) {
        self.ttl = ttl;
    }

    fn min_fee(&self, outputs: &[TxOutput]) -> Result<Value, ComposeError> {
        let body = self.body_with(outputs, &Value::from(PLACEHOLDER_FEE))?;
        let size =
            body.len() + SIZE_OF_TX_ENVELOPE + SIZE_OF_KEY_WITNESS * self.signer_estimate();
        Ok(self.fees.fee_for_size(size))
    }

    fn fee_for_input(&self, utxo: &Utxo) -> Result<Value, ComposeError> {
        let bytes = codec::input_bytes(&utxo.pointer())?;
        Ok(self.fees.marginal_fee(bytes.len() + SIZE_OF_KEY_WITNESS))
    }

    fn fee_for_output(&self, output: &TxOutput) -> Result<Value, ComposeError> {
        let bytes = codec::output_bytes(output)?;
        Ok(self.fees.marginal_fee(bytes.len()))
    }

    fn min_ada_required(&self, output: &TxOutput) -> Result<Value, ComposeError> {
        let bytes = codec::output_bytes(output)?;
        Ok(&self.params.coins_per_utxo_byte * (MIN_ADA_OUTPUT_OVERHEAD + bytes.len()) as u64)
    }
}

impl TransactionAssembler for ShelleyTxBuilder {
    fn assemble(&self, outputs: &[TxOutput], fee: &Value) -> Result<AssembledTx, ComposeError> {
        for output in outputs {
            let value = codec::value_bytes(output)?;
            if value.len() > self.params.max_value_size as usize {
                return Err(ComposeError::MaxValueSizeReached);
            }
        }
        let body = self.body_with(outputs, fee)?;
        if body.len() > self.params.max_tx_size as usize {
            return Err(ComposeError::MaxTxSizeReached);
        }
        let hash = super::blake2b_256(&body);
        Ok(AssembledTx {
            body,
            hash,
            input_order: self.sorted_inputs(),
        })
    }
}
