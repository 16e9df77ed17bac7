//! The entry point: wires normalization, selection, finalization and
//! serialization into one composition pass.

use crate::accounting::{sum_inputs, sum_outputs};
use crate::asset::TokenId;
use crate::certs::{deposit_balance, total_withdrawn, Certificate, Withdrawal};
use crate::error::ComposeError;
use crate::estimate::{TransactionAssembler, TransactionFeeEstimator};
use crate::finalize::finalize_max;
use crate::ledger::{placeholder_address, stake_credential_from_key, ShelleyTxBuilder};
use crate::normalize::normalize;
use crate::params::{ComposeOptions, ProtocolParams};
use crate::select::{select_inputs, SelectionContext, UtxoChooser};
use crate::tx::{Address, ComposeMode, OutputCost, OutputRequest, TxOutput, Utxo, UtxoPointer};
use crate::value::{Balance, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// A full composition request, mirroring the wallet wire protocol.
#[derive(Clone, Debug, Deserialize)]
pub struct ComposeRequest {
    pub utxos: Vec<Utxo>,
    #[serde(default)]
    pub outputs: Vec<OutputRequest>,
    #[serde(rename = "changeAddress")]
    pub change_address: Address,
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    #[serde(default)]
    pub withdrawals: Vec<Withdrawal>,
    /// Account public key the staking credential derives from; required
    /// only when certificates are present.
    #[serde(rename = "accountPubKey", default)]
    pub account_pub_key: Option<String>,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub options: ComposeOptions,
}

/// Serialized transaction body ready for signing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TxPayload {
    pub body: String,
    pub hash: String,
    pub size: u32,
}

/// Composition summary. Precompose answers carry the totals only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComposeResult {
    #[serde(rename = "totalSpent")]
    pub total_spent: Value,
    pub fee: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<Utxo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<TxOutput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx: Option<TxPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
}

/// Composes a transaction with the default ledger backend and mainnet
/// parameters, adjusted by the request's options.
pub fn compose(request: &ComposeRequest) -> Result<ComposeResult, ComposeError> {
    let params = ProtocolParams::mainnet().with_options(&request.options);
    let mut builder = ShelleyTxBuilder::new(&params);
    compose_with(&mut builder, &params, request, None)
}

/// Composes against a caller-supplied estimator; `params` must match
/// the estimator's own configuration. A fresh estimator is required per
/// composition.
pub fn compose_with<E: TransactionFeeEstimator + TransactionAssembler>(
    estimator: &mut E,
    params: &ProtocolParams,
    request: &ComposeRequest,
    chooser: Option<UtxoChooser<'_>>,
) -> Result<ComposeResult, ComposeError> {
    if !request.certificates.is_empty() {
        let key = request.account_pub_key.as_deref().ok_or_else(|| {
            ComposeError::InvalidRequest("certificates require accountPubKey".to_string())
        })?;
        let credential = stake_credential_from_key(key)?;
        estimator.set_certificates(&request.certificates, &credential)?;
    }
    if !request.withdrawals.is_empty() {
        estimator.set_withdrawals(&request.withdrawals)?;
    }
    estimator.set_ttl(request.ttl);

    let normalized = normalize(estimator, &request.outputs, &placeholder_address())?;
    let mut prepared = normalized.outputs;

    let mut implicit_input = total_withdrawn(&request.withdrawals);
    let mut implicit_output = Value::zero();
    match deposit_balance(&request.certificates, params) {
        Balance::Excess(deposit) => implicit_output += &deposit,
        Balance::Debt(refund) => implicit_input += &refund,
        Balance::Balanced => {}
    }

    let ctx = SelectionContext {
        change_address: &request.change_address,
        implicit_input: &implicit_input,
        implicit_output: &implicit_output,
        params,
    };
    let mut selection = select_inputs(estimator, &request.utxos, &prepared, &ctx, chooser)?;

    let max_value = finalize_max(estimator, &mut prepared, &mut selection.change)?;
    let ada_max = prepared
        .iter()
        .any(|p| p.set_max && p.max_target().map(|u| u.is_lovelace()).unwrap_or(false));
    let max_ada_index = ada_max
        .then(|| prepared.iter().position(|p| p.set_max))
        .flatten();

    let mut user_outputs: Vec<TxOutput> = prepared.iter().map(|p| p.output.clone()).collect();
    let fee = settle_fee(
        estimator,
        &selection.used,
        &mut user_outputs,
        max_ada_index,
        &mut selection.change,
        &implicit_input,
        &implicit_output,
    )?;

    // the settlement may have trimmed the drained output
    let max_value = match max_ada_index {
        Some(index) if max_value.is_some() => Some(user_outputs[index].value.clone()),
        _ => max_value,
    };

    let change_lovelace: Option<Value> = selection.change.as_ref().map(|costs| {
        let mut total = Value::zero();
        for cost in costs {
            total += &cost.output.value;
        }
        total
    });

    let total_spent = if ada_max {
        let mut total = max_value.clone().unwrap_or_else(Value::zero);
        total += &fee;
        if let Some(change_total) = &change_lovelace {
            total += change_total;
        }
        total
    } else {
        let mut total = sum_outputs(&user_outputs, &TokenId::lovelace());
        total += &fee;
        total
    };

    debug!(mode = ?normalized.mode, %total_spent, %fee, "composition settled");

    if normalized.mode == ComposeMode::Precompose {
        return Ok(ComposeResult {
            total_spent,
            fee,
            inputs: None,
            outputs: None,
            ttl: None,
            tx: None,
            max: max_value,
        });
    }

    let mut all_outputs = user_outputs;
    all_outputs.extend(selection.change.iter().flatten().map(|c| c.output.clone()));
    let assembled = estimator.assemble(&all_outputs, &fee)?;

    let mut by_pointer: HashMap<UtxoPointer, Utxo> = selection
        .used
        .into_iter()
        .map(|utxo| (utxo.pointer(), utxo))
        .collect();
    let inputs: Vec<Utxo> = assembled
        .input_order
        .iter()
        .filter_map(|pointer| by_pointer.remove(pointer))
        .collect();

    Ok(ComposeResult {
        total_spent,
        fee,
        inputs: Some(inputs),
        outputs: Some(all_outputs),
        ttl: request.ttl,
        tx: Some(TxPayload {
            body: hex::encode(&assembled.body),
            hash: hex::encode(assembled.hash),
            size: assembled.size() as u32,
        }),
        max: max_value,
    })
}

fn all_outputs(user: &[TxOutput], change: &Option<Vec<OutputCost>>) -> Vec<TxOutput> {
    let mut outputs = user.to_vec();
    outputs.extend(change.iter().flatten().map(|c| c.output.clone()));
    outputs
}

/// Pins the final fee so that the balance equation holds exactly.
///
/// Without change, the whole lovelace surplus burns as fee. With
/// change, the fee snaps to the transaction's minimum and the last
/// change output absorbs the difference; one more `min_fee` query
/// accounts for any byte-width shift the adjustment caused. A deficit
/// the change cannot yield comes out of a drained-ADA output instead;
/// when neither can give it up, the composition aborts.
fn settle_fee<E: TransactionFeeEstimator>(
    estimator: &E,
    used: &[Utxo],
    user_outputs: &mut [TxOutput],
    max_ada_index: Option<usize>,
    change: &mut Option<Vec<OutputCost>>,
    implicit_input: &Value,
    implicit_output: &Value,
) -> Result<Value, ComposeError> {
    let mut exact = Balance::zero();
    exact += &sum_inputs(used, &TokenId::lovelace());
    exact += implicit_input;
    exact -= &sum_outputs(&all_outputs(user_outputs, change), &TokenId::lovelace());
    exact -= implicit_output;
    let fee_exact = match exact {
        Balance::Excess(value) => value,
        _ => return Err(ComposeError::UtxoBalanceInsufficient),
    };

    let min_fee = estimator.min_fee(&all_outputs(user_outputs, change))?;

    match fee_exact.checked_sub(&min_fee) {
        Some(surplus) => match change.as_mut().and_then(|costs| costs.last_mut()) {
            Some(last) => last.output.value += &surplus,
            // no change to absorb it: the surplus burns as fee
            None => return Ok(fee_exact),
        },
        None => {
            let deficit = &min_fee - &fee_exact;
            reduce_outputs(estimator, user_outputs, max_ada_index, change, &deficit)?;
        }
    }

    let requeried = estimator.min_fee(&all_outputs(user_outputs, change))?;
    if requeried > min_fee {
        let diff = &requeried - &min_fee;
        reduce_outputs(estimator, user_outputs, max_ada_index, change, &diff)?;
        return Ok(requeried);
    }
    Ok(min_fee)
}

/// Takes `amount` of lovelace back out of the composition: from the
/// last change output while it stays above its min-ada, otherwise from
/// the drained-ADA output.
fn reduce_outputs<E: TransactionFeeEstimator>(
    estimator: &E,
    user_outputs: &mut [TxOutput],
    max_ada_index: Option<usize>,
    change: &mut Option<Vec<OutputCost>>,
    amount: &Value,
) -> Result<(), ComposeError> {
    if let Some(last) = change.as_mut().and_then(|costs| costs.last_mut()) {
        if let Some(reduced) = last.output.value.checked_sub(amount) {
            if reduced >= last.min_output_amount {
                last.output.value = reduced;
                return Ok(());
            }
        }
    }
    if let Some(index) = max_ada_index {
        let output = &mut user_outputs[index];
        if let Some(reduced) = output.value.checked_sub(amount) {
            if reduced >= estimator.min_ada_required(output)? {
                output.value = reduced;
                return Ok(());
            }
        }
    }
    Err(ComposeError::UtxoBalanceInsufficient)
}
