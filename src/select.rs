//! The fee/change/selection fixed-point loop. Inputs migrate from
//! `remaining` to `used` and never come back; every added input perturbs
//! the fee, which perturbs the change, which the next satisfaction test
//! re-examines.

use crate::accounting::{requested_token_units, sum_inputs, sum_outputs};
use crate::asset::TokenId;
use crate::change::{build_change, ChangeContext};
use crate::error::ComposeError;
use crate::estimate::TransactionFeeEstimator;
use crate::params::ProtocolParams;
use crate::tx::{Address, OutputCost, PreparedOutput, TxOutput, Utxo};
use crate::value::{Balance, Value};
use std::collections::HashSet;
use tracing::debug;

/// Optional tie-breaking hook for the extra-UTXO pull of the change
/// builder. Receives the remaining set, answers with an index into it.
/// Without one the engine picks deterministically.
pub type UtxoChooser<'a> = &'a mut dyn FnMut(&[Utxo]) -> Option<usize>;

pub struct SelectionContext<'a> {
    pub change_address: &'a Address,
    /// Withdrawals plus deposit refunds.
    pub implicit_input: &'a Value,
    /// Deposits owed.
    pub implicit_output: &'a Value,
    pub params: &'a ProtocolParams,
}

/// A converged selection: the inputs to spend, the change outputs (if
/// any) and the minimum fee of the resulting transaction.
#[derive(Debug)]
pub struct Selection {
    pub used: Vec<Utxo>,
    pub change: Option<Vec<OutputCost>>,
    pub fee: Value,
}

impl Selection {
    pub fn change_outputs(&self) -> Vec<TxOutput> {
        self.change
            .iter()
            .flatten()
            .map(|cost| cost.output.clone())
            .collect()
    }
}

/// Index of the best remaining UTXO for covering `unit`: the largest
/// quantity of the unit, lovelace breaking ties, position breaking the
/// rest.
fn best_for_unit(remaining: &[Utxo], unit: &TokenId) -> Option<usize> {
    remaining
        .iter()
        .enumerate()
        .filter(|(_, utxo)| utxo.has_unit(unit))
        .max_by(|(ia, a), (ib, b)| {
            (a.quantity_of(unit), a.lovelace(), std::cmp::Reverse(*ia)).cmp(&(
                b.quantity_of(unit),
                b.lovelace(),
                std::cmp::Reverse(*ib),
            ))
        })
        .map(|(index, _)| index)
}

/// Runs the selection loop until fees, outputs and change balance.
///
/// With a `setMax` output present, every UTXO holding the drained unit
/// is committed up front (all of them for an ADA drain); the rest joins
/// `remaining` sorted so the most valuable candidates are pulled first.
pub fn select_inputs<E: TransactionFeeEstimator>(
    estimator: &mut E,
    utxos: &[Utxo],
    prepared: &[PreparedOutput],
    ctx: &SelectionContext<'_>,
    mut chooser: Option<UtxoChooser<'_>>,
) -> Result<Selection, ComposeError> {
    let lovelace = TokenId::lovelace();

    // duplicate pointers would double-count balances
    let mut seen = HashSet::new();
    let deduped: Vec<Utxo> = utxos
        .iter()
        .filter(|utxo| seen.insert(utxo.pointer()))
        .cloned()
        .collect();

    let max_target = prepared.iter().find_map(|output| output.max_target());

    let mut used: Vec<Utxo> = Vec::new();
    let mut remaining: Vec<Utxo> = Vec::new();
    match &max_target {
        Some(target) if target.is_lovelace() => used = deduped,
        Some(target) => {
            for utxo in deduped {
                if utxo.has_unit(target) {
                    used.push(utxo);
                } else {
                    remaining.push(utxo);
                }
            }
        }
        None => remaining = deduped,
    }

    let sort_unit = max_target.clone().unwrap_or_else(TokenId::lovelace);
    remaining.sort_by(|a, b| {
        (b.quantity_of(&sort_unit), b.lovelace()).cmp(&(a.quantity_of(&sort_unit), a.lovelace()))
    });

    for utxo in &used {
        estimator.add_input(utxo)?;
    }

    let user_outputs: Vec<TxOutput> = prepared.iter().map(|p| p.output.clone()).collect();
    let change_ctx = ChangeContext {
        change_address: ctx.change_address,
        implicit_input: ctx.implicit_input,
        implicit_output: ctx.implicit_output,
        params: ctx.params,
    };

    let mut iteration = 0usize;
    loop {
        iteration += 1;

        let mut total_user_fee = Value::zero();
        for output in &user_outputs {
            total_user_fee += &estimator.fee_for_output(output)?;
        }
        let mut placeholder_total_fee = estimator.min_fee(&[])?;
        placeholder_total_fee += &total_user_fee;

        let change = {
            // extra-UTXO hook for the change builder: deterministic
            // best-lovelace pull unless the caller injected a chooser
            let mut pull = || -> Option<Utxo> {
                let index = match chooser.as_mut() {
                    Some(chooser) => {
                        let picked = chooser(&remaining)?;
                        if picked >= remaining.len() {
                            return None;
                        }
                        picked
                    }
                    None => best_for_unit(&remaining, &lovelace)?,
                };
                Some(remaining.remove(index))
            };
            build_change(
                estimator,
                &mut used,
                &user_outputs,
                &placeholder_total_fee,
                &change_ctx,
                Some(&mut pull),
            )?
        };

        let mut all_outputs = user_outputs.clone();
        all_outputs.extend(change.iter().flatten().map(|cost| cost.output.clone()));
        let total_fee = estimator.min_fee(&all_outputs)?;

        let mut unsatisfied_units: Vec<TokenId> = Vec::new();
        for unit in requested_token_units(&all_outputs) {
            if sum_inputs(&used, &unit) < sum_outputs(&all_outputs, &unit) {
                unsatisfied_units.push(unit);
            }
        }

        let mut coin_balance = Balance::zero();
        coin_balance += &sum_inputs(&used, &lovelace);
        coin_balance += ctx.implicit_input;
        coin_balance -= &sum_outputs(&all_outputs, &lovelace);
        coin_balance -= ctx.implicit_output;
        coin_balance -= &total_fee;
        // a transaction with no inputs is never valid, whatever the math says
        let lovelace_unsatisfied = coin_balance.debt().is_some() || used.is_empty();

        debug!(
            iteration,
            used = used.len(),
            remaining = remaining.len(),
            unsatisfied = unsatisfied_units.len(),
            lovelace_unsatisfied,
            fee = %total_fee,
            "selection iteration"
        );

        if unsatisfied_units.is_empty() && !lovelace_unsatisfied {
            return Ok(Selection {
                used,
                change,
                fee: total_fee,
            });
        }

        // lovelace shortfall wins the pull; missing tokens are covered
        // once the coin side is satisfied
        let priority = if lovelace_unsatisfied {
            TokenId::lovelace()
        } else {
            unsatisfied_units
                .first()
                .cloned()
                .unwrap_or_else(TokenId::lovelace)
        };
        match best_for_unit(&remaining, &priority) {
            Some(index) => {
                let utxo = remaining.remove(index);
                debug!(utxo = %utxo.pointer(), unit = %priority, "pulling input");
                estimator.add_input(&utxo)?;
                used.push(utxo);
            }
            None => {
                debug!(unit = %priority, "no eligible input left");
                return Err(ComposeError::UtxoBalanceInsufficient);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::TransactionAsset;
    use crate::ledger::{placeholder_address, ShelleyTxBuilder};
    use crate::tx::{OutputIndex, TransactionId};

    const DEST: &str = "addr1qxu84ftxpzh3zd8p9awp2ytwzk5exj0fxcj7paur4kd4ytun36yuhgl049rxhhuckm2lpq3rmz5dcraddyl45d6xgvqqsp504c";

    fn token_unit(tag: &str) -> TokenId {
        TokenId::new(format!("{}{}", tag.repeat(28), "beef"))
    }

    fn utxo(index: u32, lovelace: u64, tokens: Vec<TransactionAsset>) -> Utxo {
        let mut amount = vec![TransactionAsset::lovelace(Value::from(lovelace))];
        amount.extend(tokens);
        Utxo {
            tx_hash: TransactionId::new(hex::encode([index as u8; 32])),
            output_index: OutputIndex::new(index),
            address: Address::new(DEST),
            amount,
        }
    }

    fn prepared(lovelace: u64, assets: Vec<TransactionAsset>) -> PreparedOutput {
        PreparedOutput {
            output: TxOutput::new(Address::new(DEST), Value::from(lovelace), assets),
            set_max: false,
        }
    }

    struct Fixture {
        estimator: ShelleyTxBuilder,
        params: ProtocolParams,
        change_address: Address,
        zero: Value,
    }

    impl Fixture {
        fn new() -> Self {
            let params = ProtocolParams::mainnet();
            Fixture {
                estimator: ShelleyTxBuilder::new(&params),
                params,
                change_address: placeholder_address(),
                zero: Value::zero(),
            }
        }

        fn select(
            &mut self,
            utxos: &[Utxo],
            prepared: &[PreparedOutput],
        ) -> Result<Selection, ComposeError> {
            let ctx = SelectionContext {
                change_address: &self.change_address,
                implicit_input: &self.zero,
                implicit_output: &self.zero,
                params: &self.params,
            };
            select_inputs(&mut self.estimator, utxos, prepared, &ctx, None)
        }
    }

    fn assert_balanced(selection: &Selection, outputs: &[PreparedOutput]) {
        let mut all: Vec<TxOutput> = outputs.iter().map(|p| p.output.clone()).collect();
        all.extend(selection.change_outputs());
        let mut balance = Balance::zero();
        balance += &sum_inputs(&selection.used, &TokenId::lovelace());
        balance -= &sum_outputs(&all, &TokenId::lovelace());
        balance -= &selection.fee;
        assert!(balance.debt().is_none(), "lovelace in debt: {}", balance);
    }

    #[test]
    fn covers_one_payment_from_two_utxos() {
        let mut fixture = Fixture::new();
        let utxos = vec![utxo(0, 2_000_000, vec![]), utxo(1, 1_000_000, vec![])];
        let outputs = vec![prepared(1_000_000, vec![])];
        let selection = fixture.select(&utxos, &outputs).unwrap();

        // 2 ADA alone cannot pay the output, a valid change and the fee
        assert_eq!(selection.used.len(), 2);
        let change = selection.change.as_ref().unwrap();
        assert_eq!(change.len(), 1);
        assert!(change[0].output.value >= change[0].min_output_amount);
        assert_balanced(&selection, &outputs);
    }

    #[test]
    fn single_utxo_with_dust_burn_converges() {
        let mut fixture = Fixture::new();
        let utxos = vec![utxo(0, 5_000_000, vec![])];
        let outputs = vec![prepared(4_820_000, vec![])];
        let selection = fixture.select(&utxos, &outputs).unwrap();
        assert_eq!(selection.used.len(), 1);
        assert!(selection.change.is_none());
        assert_balanced(&selection, &outputs);
    }

    #[test]
    fn token_pull_prefers_the_largest_holding() {
        let mut fixture = Fixture::new();
        let x = token_unit("ab");
        let y = token_unit("cd");
        let utxos = vec![
            utxo(0, 20_000_000, vec![]),
            utxo(1, 2_000_000, vec![TransactionAsset::new(x.clone(), Value::from(1_000))]),
            utxo(
                2,
                2_000_000,
                vec![
                    TransactionAsset::new(x.clone(), Value::from(2_000)),
                    TransactionAsset::new(y.clone(), Value::from(9)),
                ],
            ),
        ];
        let outputs = vec![prepared(
            1_500_000,
            vec![TransactionAsset::new(x.clone(), Value::from(50))],
        )];
        let selection = fixture.select(&utxos, &outputs).unwrap();

        // the first pull covers the coin side; the token pull that
        // follows takes the 2000-token holding over the smaller one
        assert_eq!(selection.used.len(), 2);
        assert_eq!(selection.used[0].pointer(), utxos[0].pointer());
        assert_eq!(
            selection.used[1].pointer(),
            utxos[2].pointer(),
            "the larger holding of the missing token goes in"
        );
        let change_outputs = selection.change_outputs();
        assert_eq!(sum_outputs(&change_outputs, &x), Value::from(1_950));
        assert_eq!(sum_outputs(&change_outputs, &y), Value::from(9));
        assert_balanced(&selection, &outputs);
    }

    #[test]
    fn lovelace_shortfall_outranks_a_missing_token() {
        let mut fixture = Fixture::new();
        let x = token_unit("ab");
        let utxos = vec![
            utxo(0, 20_000_000, vec![]),
            utxo(1, 2_000_000, vec![TransactionAsset::new(x.clone(), Value::from(100))]),
        ];
        let outputs = vec![prepared(
            1_500_000,
            vec![TransactionAsset::new(x.clone(), Value::from(50))],
        )];
        let selection = fixture.select(&utxos, &outputs).unwrap();

        // with both the coin and the token short, the lovelace-richest
        // entry is pulled first even though it carries no token
        assert_eq!(selection.used[0].pointer(), utxos[0].pointer());
        assert_balanced(&selection, &outputs);
    }

    #[test]
    fn exhausted_remaining_set_fails() {
        let mut fixture = Fixture::new();
        let utxos = vec![utxo(0, 5_000_000, vec![])];
        let outputs = vec![prepared(10_000_000, vec![])];
        let err = fixture.select(&utxos, &outputs).unwrap_err();
        assert_eq!(err, ComposeError::UtxoBalanceInsufficient);
    }

    #[test]
    fn missing_token_fails_even_with_plenty_of_lovelace() {
        let mut fixture = Fixture::new();
        let utxos = vec![utxo(0, 50_000_000, vec![])];
        let outputs = vec![prepared(
            2_000_000,
            vec![TransactionAsset::new(token_unit("ab"), Value::from(1))],
        )];
        let err = fixture.select(&utxos, &outputs).unwrap_err();
        assert_eq!(err, ComposeError::UtxoBalanceInsufficient);
    }

    #[test]
    fn ada_max_seeds_every_utxo() {
        let mut fixture = Fixture::new();
        let utxos = vec![utxo(0, 2_000_000, vec![]), utxo(1, 3_000_000, vec![])];
        let outputs = vec![PreparedOutput {
            output: TxOutput::new(Address::new(DEST), Value::zero(), vec![]),
            set_max: true,
        }];
        let selection = fixture.select(&utxos, &outputs).unwrap();
        assert_eq!(selection.used.len(), 2);
        // everything above the zeroed max output lands in change for
        // the finalizer to drain
        assert!(selection.change.is_some());
    }

    #[test]
    fn duplicate_utxos_are_counted_once() {
        let mut fixture = Fixture::new();
        let utxos = vec![utxo(0, 5_000_000, vec![]), utxo(0, 5_000_000, vec![])];
        let outputs = vec![prepared(4_820_000, vec![])];
        let selection = fixture.select(&utxos, &outputs).unwrap();
        assert_eq!(selection.used.len(), 1);
    }

    #[test]
    fn injected_chooser_drives_the_extra_pull() {
        let mut fixture = Fixture::new();
        let utxos = vec![
            utxo(0, 2_000_000, vec![]),
            utxo(1, 1_000_000, vec![]),
            utxo(2, 1_500_000, vec![]),
        ];
        let outputs = vec![prepared(1_000_000, vec![])];
        let mut picked = Vec::new();
        let mut chooser = |remaining: &[Utxo]| {
            // always take the last entry, against the deterministic rule
            let index = remaining.len().checked_sub(1)?;
            picked.push(remaining[index].pointer());
            Some(index)
        };
        let ctx = SelectionContext {
            change_address: &fixture.change_address,
            implicit_input: &fixture.zero,
            implicit_output: &fixture.zero,
            params: &fixture.params,
        };
        let selection =
            select_inputs(&mut fixture.estimator, &utxos, &outputs, &ctx, Some(&mut chooser))
                .unwrap();
        assert!(!picked.is_empty(), "chooser was consulted");
        assert_balanced(&selection, &outputs);
    }
}
