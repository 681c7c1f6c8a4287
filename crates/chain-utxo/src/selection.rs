//! Accumulative coin selection.
//!
//! Candidates are consumed in the order given. Callers that want fewer
//! inputs sort with [`crate::utxo::sort_largest_first`] first; the order is
//! part of the observable contract because it decides which inputs are
//! spent.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::error::UtxoError;
use crate::fee::{tx_size, FeeRate, OutputShape};
use crate::rules::ChainRules;
use crate::utxo::{OutputRole, SelectionTarget, TxOutput, Utxo};

/// Inputs and outputs chosen for one transfer.
///
/// `sum(inputs) == sum(outputs) + fee`. When change fell below the dust
/// threshold there is no change output, `change` is zero and the excess
/// is part of `fee`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResult {
    /// In accumulation order.
    pub inputs: Vec<Utxo>,
    /// Targets in caller order, then the change output if any.
    pub outputs: Vec<TxOutput>,
    pub change: Amount,
    /// Fee actually paid.
    pub fee: Amount,
    /// Fee the size model asked for; less than `fee` when dust was absorbed.
    pub estimated_fee: Amount,
}

impl SelectionResult {
    pub fn input_total(&self) -> Result<Amount, UtxoError> {
        Amount::sum(self.inputs.iter().map(|u| u.value), self.fee.decimals())
    }

    pub fn output_total(&self) -> Result<Amount, UtxoError> {
        Amount::sum(self.outputs.iter().map(|o| o.value), self.fee.decimals())
    }

    pub fn change_output(&self) -> Option<&TxOutput> {
        self.outputs.iter().find(|o| o.role == OutputRole::Change)
    }
}

fn check_tag(value: Amount, decimals: u8) -> Result<(), UtxoError> {
    if value.decimals() != decimals {
        return Err(UtxoError::DecimalMismatch {
            left: value.decimals(),
            right: decimals,
        });
    }
    Ok(())
}

/// Validate targets and turn them into outputs plus their size shapes.
fn target_outputs<R: ChainRules + ?Sized>(
    targets: &[SelectionTarget],
    rules: &R,
) -> Result<(Vec<TxOutput>, Vec<OutputShape>), UtxoError> {
    let mut outputs = Vec::with_capacity(targets.len() + 1);
    let mut shapes = Vec::with_capacity(targets.len() + 1);

    for target in targets {
        check_tag(target.value, rules.decimals())?;
        match (&target.address, &target.script) {
            (Some(address), None) => {
                rules
                    .validate_address(address)
                    .map_err(|e| UtxoError::InvalidTarget(format!("{address}: {e}")))?;
                outputs.push(TxOutput {
                    address: Some(address.clone()),
                    value: target.value,
                    script: None,
                    role: OutputRole::Recipient,
                });
                shapes.push(OutputShape::Address);
            }
            (None, Some(script)) => {
                if !target.value.is_zero() {
                    return Err(UtxoError::InvalidTarget(
                        "data outputs must carry zero value".into(),
                    ));
                }
                outputs.push(TxOutput {
                    address: None,
                    value: target.value,
                    script: Some(script.clone()),
                    role: OutputRole::Memo,
                });
                shapes.push(OutputShape::Script(script.len()));
            }
            (Some(_), Some(_)) => {
                return Err(UtxoError::InvalidTarget(
                    "target sets both an address and a script".into(),
                ))
            }
            (None, None) => {
                return Err(UtxoError::InvalidTarget(
                    "target sets neither an address nor a script".into(),
                ))
            }
        }
    }
    Ok((outputs, shapes))
}

/// Select inputs from `candidates` to pay `targets` at `fee_rate`.
///
/// After each accepted input the fee is re-estimated for the current
/// input count and the targets plus a change output; selection stops as
/// soon as the accumulated value covers targets and fee. Inputs that cost
/// more to spend than they are worth are skipped.
pub fn select<R: ChainRules + ?Sized>(
    candidates: &[Utxo],
    targets: &[SelectionTarget],
    fee_rate: FeeRate,
    rules: &R,
) -> Result<SelectionResult, UtxoError> {
    let decimals = rules.decimals();
    let model = rules.size_model();

    let (mut outputs, mut shapes) = target_outputs(targets, rules)?;
    let target_total = Amount::sum(targets.iter().map(|t| t.value), decimals)?;
    // Hypothetical change output, always sized in.
    shapes.push(OutputShape::Address);

    let input_cost = fee_rate.fee_for(model.input_bytes, decimals)?;

    debug!(
        "selecting from {} candidates for {} outputs, target {} at {} per byte",
        candidates.len(),
        targets.len(),
        target_total,
        fee_rate.units()
    );

    let mut inputs: Vec<Utxo> = Vec::new();
    let mut accumulated = Amount::zero(decimals);

    for utxo in candidates {
        check_tag(utxo.value, decimals)?;
        if input_cost > utxo.value {
            trace!("skipping {}: worth {}, costs {}", utxo.outpoint(), utxo.value, input_cost);
            continue;
        }

        inputs.push(utxo.clone());
        accumulated = accumulated.checked_add(utxo.value)?;

        let estimated_fee = fee_rate.fee_for(tx_size(&model, inputs.len(), &shapes), decimals)?;
        let needed = target_total.checked_add(estimated_fee)?;
        trace!(
            "added {} ({}): accumulated {}, need {}",
            utxo.outpoint(),
            utxo.value,
            accumulated,
            needed
        );
        if accumulated < needed {
            continue;
        }

        let mut change = accumulated.checked_sub(needed)?;
        let mut fee = estimated_fee;
        if change.units() >= rules.dust_threshold() {
            outputs.push(TxOutput {
                address: None,
                value: change,
                script: None,
                role: OutputRole::Change,
            });
        } else {
            debug!("change {} below dust threshold, absorbed into fee", change);
            fee = fee.checked_add(change)?;
            change = Amount::zero(decimals);
        }

        debug!(
            "selected {} inputs worth {}, fee {} (estimated {}), change {}",
            inputs.len(),
            accumulated,
            fee,
            estimated_fee,
            change
        );
        return Ok(SelectionResult {
            inputs,
            outputs,
            change,
            fee,
            estimated_fee,
        });
    }

    let fee = fee_rate.fee_for(tx_size(&model, inputs.len().max(1), &shapes), decimals)?;
    let needed = target_total.checked_add(fee)?;
    Err(UtxoError::InsufficientFunds {
        needed: needed.units(),
        available: accumulated.units(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo;
    use crate::params::{Chain, Network};
    use crate::rules::StandardChain;

    const RECIPIENT: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

    fn btc() -> StandardChain {
        StandardChain::for_chain(Chain::Bitcoin, Network::Mainnet)
    }

    fn make_utxo(txid: &str, vout: u32, value: u64) -> Utxo {
        Utxo {
            txid: txid.to_string(),
            vout,
            value: Amount::new(value, 8),
            script_pubkey: vec![0xaa; 22], // dummy script bytes
            confirmations: Some(1),
        }
    }

    fn sats(v: u64) -> Amount {
        Amount::new(v, 8)
    }

    fn assert_balanced(result: &SelectionResult) {
        assert_eq!(
            result.input_total().unwrap(),
            result.output_total().unwrap().checked_add(result.fee).unwrap()
        );
    }

    #[test]
    fn single_input_with_change() {
        let utxos = vec![make_utxo("aaaa", 0, 100_000)];
        let targets = vec![SelectionTarget::pay(RECIPIENT, sats(50_000))];
        let result = select(&utxos, &targets, FeeRate::from_units(10), &btc()).unwrap();

        // 1 input, 2 outputs: 11 + 68 + 62 = 141 bytes
        assert_eq!(result.inputs.len(), 1);
        assert_eq!(result.outputs.len(), 2);
        assert_eq!(result.fee, sats(1_410));
        assert_eq!(result.outputs[0].value, sats(50_000));
        assert_eq!(result.outputs[0].role, OutputRole::Recipient);
        assert_eq!(result.outputs[1].role, OutputRole::Change);
        assert_eq!(result.change, sats(100_000 - 50_000 - 1_410));
        assert_balanced(&result);
    }

    #[test]
    fn insufficient_funds_returns_error() {
        let utxos = vec![make_utxo("aaaa", 0, 1_000)];
        let targets = vec![SelectionTarget::pay(RECIPIENT, sats(50_000))];
        let result = select(&utxos, &targets, FeeRate::from_units(1), &btc());
        assert!(matches!(
            result,
            Err(UtxoError::InsufficientFunds { available: 1_000, .. })
        ));
    }

    #[test]
    fn empty_candidates_are_insufficient() {
        let targets = vec![SelectionTarget::pay(RECIPIENT, sats(1_000))];
        let result = select(&[], &targets, FeeRate::ZERO, &btc());
        assert!(matches!(
            result,
            Err(UtxoError::InsufficientFunds { available: 0, .. })
        ));
    }

    #[test]
    fn accumulates_until_covered() {
        let utxos = vec![make_utxo("aaaa", 0, 60_000), make_utxo("bbbb", 0, 60_000)];
        let targets = vec![SelectionTarget::pay(RECIPIENT, sats(100_000))];
        let result = select(&utxos, &targets, FeeRate::from_units(5), &btc()).unwrap();

        assert_eq!(result.inputs.len(), 2);
        assert_eq!(result.inputs[0].txid, "aaaa");
        assert_eq!(result.inputs[1].txid, "bbbb");
        // 11 + 2 * 68 + 2 * 31 = 209 bytes
        assert_eq!(result.estimated_fee, sats(1_045));
        assert_balanced(&result);
    }

    #[test]
    fn stops_at_first_sufficient_input() {
        let utxos = vec![
            make_utxo("aaaa", 0, 200_000),
            make_utxo("bbbb", 0, 200_000),
        ];
        let targets = vec![SelectionTarget::pay(RECIPIENT, sats(100_000))];
        let result = select(&utxos, &targets, FeeRate::from_units(5), &btc()).unwrap();
        assert_eq!(result.inputs.len(), 1);
    }

    #[test]
    fn source_order_decides_inputs() {
        let utxos = vec![
            make_utxo("small", 0, 30_000),
            make_utxo("large", 0, 100_000),
        ];
        let targets = vec![SelectionTarget::pay(RECIPIENT, sats(10_000))];
        let result = select(&utxos, &targets, FeeRate::from_units(1), &btc()).unwrap();
        assert_eq!(result.inputs.len(), 1);
        assert_eq!(result.inputs[0].txid, "small");
    }

    #[test]
    fn dust_change_is_absorbed_into_fee() {
        // fee 141 at 1/byte; change would be 200 - 141 = 59 < 546
        let utxos = vec![make_utxo("aaaa", 0, 100_000)];
        let targets = vec![SelectionTarget::pay(RECIPIENT, sats(99_800))];
        let result = select(&utxos, &targets, FeeRate::from_units(1), &btc()).unwrap();

        assert_eq!(result.outputs.len(), 1);
        assert!(result.change_output().is_none());
        assert!(result.change.is_zero());
        assert_eq!(result.estimated_fee, sats(141));
        assert_eq!(result.fee, sats(200));
        assert_balanced(&result);
    }

    #[test]
    fn change_at_dust_threshold_is_kept() {
        // 100_000 - 141 - 546 = 99_313
        let utxos = vec![make_utxo("aaaa", 0, 100_000)];
        let targets = vec![SelectionTarget::pay(RECIPIENT, sats(99_313))];
        let result = select(&utxos, &targets, FeeRate::from_units(1), &btc()).unwrap();
        assert_eq!(result.change, sats(546));
        assert!(result.change_output().is_some());
    }

    #[test]
    fn zero_fee_rate_covers_exact_target() {
        let utxos = vec![make_utxo("aaaa", 0, 40_000), make_utxo("bbbb", 0, 10_000)];
        let targets = vec![SelectionTarget::pay(RECIPIENT, sats(50_000))];
        let result = select(&utxos, &targets, FeeRate::ZERO, &btc()).unwrap();
        assert_eq!(result.inputs.len(), 2);
        assert!(result.fee.is_zero());
        assert_eq!(result.outputs.len(), 1);
    }

    #[test]
    fn memo_target_is_sized_into_fee() {
        let utxos = vec![make_utxo("aaaa", 0, 100_000)];
        let script = memo::encode("SWAP:THOR:addr", 80).unwrap();
        let targets = vec![
            SelectionTarget::pay(RECIPIENT, sats(50_000)),
            SelectionTarget::data(script.clone(), 8),
        ];
        let result = select(&utxos, &targets, FeeRate::from_units(10), &btc()).unwrap();

        // 141 + (8 + 1 + 16) = 166 bytes
        assert_eq!(result.fee, sats(1_660));
        assert_eq!(result.outputs[1].role, OutputRole::Memo);
        assert_eq!(result.outputs[1].script.as_deref(), Some(script.as_slice()));
        assert!(result.outputs[1].value.is_zero());
        assert_balanced(&result);
    }

    #[test]
    fn detrimental_inputs_are_skipped() {
        // One input costs 68 * 10 = 680 > 500
        let utxos = vec![make_utxo("tiny", 0, 500), make_utxo("big", 0, 100_000)];
        let targets = vec![SelectionTarget::pay(RECIPIENT, sats(10_000))];
        let result = select(&utxos, &targets, FeeRate::from_units(10), &btc()).unwrap();
        assert_eq!(result.inputs.len(), 1);
        assert_eq!(result.inputs[0].txid, "big");
    }

    #[test]
    fn invalid_target_address_is_rejected() {
        let utxos = vec![make_utxo("aaaa", 0, 100_000)];
        let targets = vec![SelectionTarget::pay("not_a_valid_address", sats(1_000))];
        let result = select(&utxos, &targets, FeeRate::from_units(1), &btc());
        assert!(matches!(result, Err(UtxoError::InvalidTarget(_))));
    }

    #[test]
    fn wrong_network_target_is_rejected() {
        let testnet = StandardChain::for_chain(Chain::Bitcoin, Network::Testnet);
        let utxos = vec![make_utxo("aaaa", 0, 100_000)];
        let targets = vec![SelectionTarget::pay(RECIPIENT, sats(1_000))];
        assert!(matches!(
            select(&utxos, &targets, FeeRate::from_units(1), &testnet),
            Err(UtxoError::InvalidTarget(_))
        ));
    }

    #[test]
    fn mismatched_decimals_are_rejected() {
        let utxos = vec![make_utxo("aaaa", 0, 100_000)];
        let targets = vec![SelectionTarget::pay(RECIPIENT, Amount::new(1_000, 6))];
        assert!(matches!(
            select(&utxos, &targets, FeeRate::from_units(1), &btc()),
            Err(UtxoError::DecimalMismatch { .. })
        ));
    }

    #[test]
    fn failed_selection_is_repeatable() {
        let utxos = vec![make_utxo("aaaa", 0, 1_000)];
        let targets = vec![SelectionTarget::pay(RECIPIENT, sats(50_000))];
        let first = select(&utxos, &targets, FeeRate::from_units(1), &btc());
        let second = select(&utxos, &targets, FeeRate::from_units(1), &btc());
        assert_eq!(first, second);
    }
}
