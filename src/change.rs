//! Builds the change side of a composition: one output in the common
//! case, several when the token count crosses the per-output cap, none
//! when the leftover is dust that burns as fee.

use crate::accounting::{sum_inputs, sum_outputs, unique_token_units};
use crate::asset::{TokenId, TransactionAsset};
use crate::error::ComposeError;
use crate::estimate::TransactionFeeEstimator;
use crate::params::ProtocolParams;
use crate::tx::{Address, OutputCost, TxOutput, Utxo};
use crate::value::{Balance, Value};
use itertools::Itertools;
use tracing::{debug, trace};

/// Coin floor used when sizing change candidates, so a near-empty input
/// set still produces realistically-sized coin fields.
const SIZING_COIN: u64 = 1_000_000;

/// Balance-side context the change computation folds in besides the
/// UTXO set itself.
pub struct ChangeContext<'a> {
    pub change_address: &'a Address,
    /// Withdrawals plus deposit refunds.
    pub implicit_input: &'a Value,
    /// Deposits owed.
    pub implicit_output: &'a Value,
    pub params: &'a ProtocolParams,
}

/// Computes the change outputs for the current `used` set against the
/// prepared user `outputs` and the running `total_fee`.
///
/// `None` means dust burn: the lovelace leftover is too small for a
/// valid change output and becomes additional fee. When the leftover is
/// worth rescuing, `pick_extra` is asked for one more UTXO (it is moved
/// into `used` and the estimator) and the computation restarts.
///
/// A returned change output is *not* guaranteed to be covered by the
/// inputs: when tokens must flow back, the output exists even if its
/// min-ada exceeds the lovelace leftover. The caller's satisfaction
/// test resolves that on the next iteration.
pub fn build_change<E: TransactionFeeEstimator>(
    estimator: &mut E,
    used: &mut Vec<Utxo>,
    outputs: &[TxOutput],
    total_fee: &Value,
    ctx: &ChangeContext<'_>,
    mut pick_extra: Option<&mut dyn FnMut() -> Option<Utxo>>,
) -> Result<Option<Vec<OutputCost>>, ComposeError> {
    let lovelace = TokenId::lovelace();
    // grows by the marginal input fee of every extra pull, so the
    // leftover stays an upper bound of what the final fee leaves over
    let mut running_fee = total_fee.clone();

    loop {
        let mut change_assets = Vec::new();
        for unit in unique_token_units(used) {
            let mut balance = Balance::zero();
            balance += &sum_inputs(used, &unit);
            balance -= &sum_outputs(outputs, &unit);
            if let Some(excess) = balance.excess() {
                change_assets.push(TransactionAsset::new(unit, excess.clone()));
            }
        }

        let input_lovelace = sum_inputs(used, &lovelace);
        let sizing_coin = std::cmp::max(input_lovelace.clone(), Value::from(SIZING_COIN));

        let bundles: Vec<Vec<TransactionAsset>> =
            if change_assets.len() >= ctx.params.max_tokens_per_output {
                let chunks = change_assets
                    .iter()
                    .cloned()
                    .chunks(ctx.params.max_tokens_per_output);
                chunks.into_iter().map(|chunk| chunk.collect()).collect()
            } else {
                vec![change_assets.clone()]
            };

        let mut costed = Vec::with_capacity(bundles.len());
        let mut change_fees = Value::zero();
        for bundle in bundles {
            let candidate = TxOutput::change(ctx.change_address.clone(), sizing_coin.clone(), bundle);
            let output_fee = estimator.fee_for_output(&candidate)?;
            let min_output_amount = estimator.min_ada_required(&candidate)?;
            change_fees += &output_fee;
            costed.push(OutputCost {
                output: candidate,
                output_fee,
                min_output_amount,
            });
        }

        let mut change_ada = Balance::zero();
        change_ada += &input_lovelace;
        change_ada += ctx.implicit_input;
        change_ada -= &sum_outputs(outputs, &lovelace);
        change_ada -= ctx.implicit_output;
        change_ada -= &running_fee;
        change_ada -= &change_fees;
        let available = change_ada.excess_or_zero();

        let has_tokens = !change_assets.is_empty();
        let single_min = &costed[0].min_output_amount;
        trace!(
            tokens = change_assets.len(),
            bundles = costed.len(),
            %available,
            min = %single_min,
            "change candidate"
        );

        if !has_tokens && &available < single_min {
            if available >= ctx.params.dust_threshold {
                if let Some(pick) = pick_extra.as_mut() {
                    if let Some(utxo) = pick() {
                        debug!(utxo = %utxo.pointer(), "pulling extra input to rescue change");
                        running_fee += &estimator.fee_for_input(&utxo)?;
                        estimator.add_input(&utxo)?;
                        used.push(utxo);
                        continue;
                    }
                }
            }
            // dust burn: the leftover becomes fee
            return Ok(None);
        }

        // distribute the lovelace: every bundle gets its own min-ada,
        // the last one takes whatever is left on top
        let mut distributed = available.clone();
        let last = costed.len() - 1;
        for (index, cost) in costed.iter_mut().enumerate() {
            if index != last {
                cost.output.value = cost.min_output_amount.clone();
                distributed = distributed
                    .checked_sub(&cost.min_output_amount)
                    .unwrap_or_else(Value::zero);
            } else {
                cost.output.value = std::cmp::max(distributed.clone(), cost.min_output_amount.clone());
            }
        }

        return Ok(Some(costed));
    }
}
