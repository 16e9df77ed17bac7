//! Brings user-requested outputs into ledger-valid shape before the
//! selection loop sees them.

use crate::asset::TransactionAsset;
use crate::error::ComposeError;
use crate::estimate::TransactionFeeEstimator;
use crate::tx::{Address, ComposeMode, OutputRequest, PreparedOutput, TxOutput};
use crate::value::Value;

/// Coin magnitude used when sizing an output whose final amount is not
/// known yet, so the min-ada answer reflects a realistically-sized coin
/// field.
const SIZING_COIN: u64 = 1_000_000;

#[derive(Debug)]
pub struct Normalized {
    pub outputs: Vec<PreparedOutput>,
    pub mode: ComposeMode,
}

/// Normalizes every requested output:
///
/// 1. outputs carrying tokens get their coin bumped to the ledger's
///    min-ada when below it,
/// 2. the `setMax` target quantity is zeroed (the finalizer fills it in
///    after selection converges),
/// 3. an explicit token-free amount below min-ada is rejected,
/// 4. missing addresses/amounts switch the composition into precompose
///    mode, with `placeholder` standing in for size and fee math.
pub fn normalize<E: TransactionFeeEstimator>(
    estimator: &E,
    requests: &[OutputRequest],
    placeholder: &Address,
) -> Result<Normalized, ComposeError> {
    let max_outputs = requests.iter().filter(|request| request.set_max).count();
    if max_outputs > 1 {
        return Err(ComposeError::InvalidRequest(format!(
            "{} setMax outputs, at most one allowed",
            max_outputs
        )));
    }

    let mut outputs = Vec::with_capacity(requests.len());
    let mut mode = ComposeMode::Final;

    for request in requests {
        let address = match &request.address {
            Some(address) => address.clone(),
            None => {
                mode = ComposeMode::Precompose;
                placeholder.clone()
            }
        };

        let mut assets = Vec::with_capacity(request.assets.len());
        for (index, asset) in request.assets.iter().enumerate() {
            let quantity = match &asset.quantity {
                Some(quantity) => quantity.clone(),
                None => {
                    // the setMax target is allowed to omit its quantity:
                    // it means "whatever is left", not an unfinished form
                    if !(request.set_max && index == 0) {
                        mode = ComposeMode::Precompose;
                    }
                    Value::zero()
                }
            };
            assets.push(TransactionAsset::new(asset.unit.clone(), quantity));
        }

        let explicit_amount = request.amount.is_some();
        if !explicit_amount && !request.set_max {
            mode = ComposeMode::Precompose;
        }

        let mut output = TxOutput::new(
            address,
            request.amount.clone().unwrap_or_else(Value::zero),
            assets,
        );

        let min_output_amount = {
            let mut candidate = output.clone();
            if candidate.value < Value::from(SIZING_COIN) {
                candidate.value = Value::from(SIZING_COIN);
            }
            estimator.min_ada_required(&candidate)?
        };

        let has_tokens = !output.assets.is_empty();
        if has_tokens && output.value < min_output_amount {
            output.value = min_output_amount.clone();
        }

        if request.set_max {
            match request.max_target() {
                Some(unit) if unit.is_lovelace() => output.value = Value::zero(),
                _ => {
                    if let Some(first) = output.assets.first_mut() {
                        first.quantity = Value::zero();
                    }
                }
            }
        } else if !has_tokens {
            if explicit_amount && output.value < min_output_amount {
                return Err(ComposeError::UtxoValueTooSmall);
            }
            if !explicit_amount {
                output.value = min_output_amount.clone();
            }
        }

        outputs.push(PreparedOutput {
            output,
            set_max: request.set_max,
        });
    }

    Ok(Normalized { outputs, mode })
}
