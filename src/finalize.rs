//! Applies the `setMax` drain after the selection loop converges: one
//! output receives everything that is left of its target asset, and the
//! change is reshaped around it.

use crate::asset::TokenId;
use crate::error::ComposeError;
use crate::estimate::TransactionFeeEstimator;
use crate::tx::{OutputCost, PreparedOutput};
use crate::value::Value;
use tracing::debug;

/// Drains the target asset into the `setMax` output, if the request has
/// one. Returns the drained amount.
///
/// Runs exactly once per composition. For an ADA drain the change (or
/// its last bundle, when split) gives up everything above its min-ada;
/// pure-ADA change disappears entirely, fee included. For a token drain
/// the change's whole quantity of the unit moves over and the output's
/// coin snaps to its new min-ada.
pub fn finalize_max<E: TransactionFeeEstimator>(
    estimator: &E,
    prepared: &mut [PreparedOutput],
    change: &mut Option<Vec<OutputCost>>,
) -> Result<Option<Value>, ComposeError> {
    let Some(index) = prepared.iter().position(|output| output.set_max) else {
        return Ok(None);
    };
    let target = prepared[index]
        .max_target()
        .unwrap_or_else(TokenId::lovelace);

    if target.is_lovelace() {
        let drained = drain_lovelace(estimator, &mut prepared[index], change)?;
        debug!(%drained, "ada drained into max output");
        Ok(Some(drained))
    } else {
        let drained = drain_token(estimator, &mut prepared[index], change, &target)?;
        debug!(%drained, unit = %target, "tokens drained into max output");
        Ok(Some(drained))
    }
}

fn drain_lovelace<E: TransactionFeeEstimator>(
    estimator: &E,
    max_output: &mut PreparedOutput,
    change: &mut Option<Vec<OutputCost>>,
) -> Result<Value, ComposeError> {
    let output = &mut max_output.output;

    match change {
        None => {
            // nothing left to drain
            output.value = Value::zero();
        }
        Some(costs) if costs.iter().all(|cost| !cost.output.has_tokens()) => {
            // pure-ADA change: the max output absorbs its coin and the
            // fee the change output would have cost
            let mut absorbed = Value::zero();
            for cost in costs.iter() {
                absorbed += &cost.output.value;
                absorbed += &cost.output_fee;
            }
            output.value = absorbed;
            *change = None;
        }
        Some(costs) => {
            // token-carrying change keeps exactly its min-ada; the rest
            // of the coin moves over. The leftover sits on the last
            // bundle by construction.
            let last = costs
                .last_mut()
                .ok_or_else(|| ComposeError::InvalidRequest("empty change set".to_string()))?;
            let drained = last
                .output
                .value
                .checked_sub(&last.min_output_amount)
                .unwrap_or_else(Value::zero);
            last.output.value = last.min_output_amount.clone();
            output.value = drained;
        }
    }

    let min_output_amount = estimator.min_ada_required(output)?;
    if output.value < min_output_amount {
        return Err(ComposeError::UtxoBalanceInsufficient);
    }
    Ok(output.value.clone())
}

fn drain_token<E: TransactionFeeEstimator>(
    estimator: &E,
    max_output: &mut PreparedOutput,
    change: &mut Option<Vec<OutputCost>>,
    target: &TokenId,
) -> Result<Value, ComposeError> {
    let mut drained = Value::zero();
    if let Some(costs) = change {
        for cost in costs.iter_mut() {
            drained += &cost.output.quantity_of(target);
            cost.output.assets.retain(|asset| &asset.unit != target);
        }
    }

    let output = &mut max_output.output;
    if let Some(first) = output.assets.first_mut() {
        first.quantity = drained.clone();
    }
    output.value = estimator.min_ada_required(output)?;
    Ok(drained)
}
