//! Turns a [`SelectionResult`] into an unsigned transaction skeleton.

use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::script::ScriptBuf;
use bitcoin::transaction::Version;
use bitcoin::{OutPoint, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use log::debug;

use crate::amount::Amount;
use crate::error::UtxoError;
use crate::memo;
use crate::params::ChainParams;
use crate::rules::ChainRules;
use crate::selection::SelectionResult;
use crate::signer::InputSignature;
use crate::utxo::{OutputRole, TxOutput, Utxo};

/// An input of the skeleton together with the output it spends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonInput {
    pub index: usize,
    pub utxo: Utxo,
}

/// Inputs and outputs of a transaction, in final order, without signatures.
///
/// Built only by [`assemble`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTxSkeleton {
    inputs: Vec<SkeletonInput>,
    outputs: Vec<TxOutput>,
    /// scriptPubKey of each output, resolved at assembly.
    output_scripts: Vec<Vec<u8>>,
    params: ChainParams,
    fee: Amount,
}

/// A fully signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub raw: Vec<u8>,
    /// Display-order hex.
    pub txid: String,
}

impl SignedTx {
    pub fn raw_hex(&self) -> String {
        hex::encode(&self.raw)
    }
}

impl UnsignedTxSkeleton {
    pub fn inputs(&self) -> &[SkeletonInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn output_scripts(&self) -> &[Vec<u8>] {
        &self.output_scripts
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn fee(&self) -> Amount {
        self.fee
    }

    pub fn change_output(&self) -> Option<&TxOutput> {
        self.outputs.iter().find(|o| o.role == OutputRole::Change)
    }

    fn sequence(&self) -> Sequence {
        if self.params.replaceable {
            Sequence::ENABLE_RBF_NO_LOCKTIME
        } else {
            Sequence::MAX
        }
    }

    /// The outputs being spent, in input order.
    pub fn prevouts(&self) -> Vec<TxOut> {
        self.inputs
            .iter()
            .map(|input| TxOut {
                value: bitcoin::Amount::from_sat(input.utxo.value.units()),
                script_pubkey: ScriptBuf::from_bytes(input.utxo.script_pubkey.clone()),
            })
            .collect()
    }

    /// Version 2, lock time 0, empty script sigs and witnesses.
    pub fn to_unsigned_transaction(&self) -> Result<Transaction, UtxoError> {
        let sequence = self.sequence();
        let input = self
            .inputs
            .iter()
            .map(|input| {
                let txid = Txid::from_str(&input.utxo.txid).map_err(|e| {
                    UtxoError::TransactionBuildError(format!("invalid txid {}: {e}", input.utxo.txid))
                })?;
                Ok(TxIn {
                    previous_output: OutPoint::new(txid, input.utxo.vout),
                    script_sig: ScriptBuf::new(),
                    sequence,
                    witness: Witness::default(),
                })
            })
            .collect::<Result<Vec<_>, UtxoError>>()?;

        let output = self
            .outputs
            .iter()
            .zip(&self.output_scripts)
            .map(|(out, script)| TxOut {
                value: bitcoin::Amount::from_sat(out.value.units()),
                script_pubkey: ScriptBuf::from_bytes(script.clone()),
            })
            .collect();

        Ok(Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input,
            output,
        })
    }

    /// Attach one signature per input and serialize.
    ///
    /// Segwit encoding is used when any input carries a witness.
    pub fn finalize(&self, signatures: &[InputSignature]) -> Result<SignedTx, UtxoError> {
        if signatures.len() != self.inputs.len() {
            return Err(UtxoError::SigningError(format!(
                "expected {} signatures, got {}",
                self.inputs.len(),
                signatures.len()
            )));
        }
        let mut tx = self.to_unsigned_transaction()?;
        for (txin, sig) in tx.input.iter_mut().zip(signatures) {
            txin.script_sig = ScriptBuf::from_bytes(sig.script_sig.clone());
            txin.witness = Witness::from_slice(sig.witness.as_slice());
        }
        Ok(SignedTx {
            raw: bitcoin::consensus::serialize(&tx),
            txid: tx.compute_txid().to_string(),
        })
    }
}

fn sum_values<'a>(
    values: impl IntoIterator<Item = &'a Amount>,
    decimals: u8,
) -> Result<Amount, UtxoError> {
    Amount::sum(values.into_iter().copied(), decimals)
}

/// Build the skeleton for `selection`, sending change back to `sender`.
///
/// Outputs are ordered recipients, change, memo. When `memo` is given its
/// script must already be among the selection's outputs, so that its bytes
/// were paid for.
pub fn assemble<R: ChainRules + ?Sized>(
    selection: &SelectionResult,
    sender: &str,
    memo: Option<&str>,
    rules: &R,
) -> Result<UnsignedTxSkeleton, UtxoError> {
    let decimals = rules.decimals();
    let sender_script = rules
        .address_to_script(sender)
        .map_err(|e| UtxoError::InvalidAddress(format!("sender {sender}: {e}")))?;

    let memo_script = match memo.filter(|m| !m.is_empty()) {
        Some(m) => Some(memo::encode(m, rules.max_memo_bytes())?),
        None => None,
    };
    if let Some(script) = &memo_script {
        let sized = selection
            .outputs
            .iter()
            .any(|o| o.role == OutputRole::Memo && o.script.as_ref() == Some(script));
        if !sized {
            return Err(UtxoError::TransactionBuildError(
                "memo was not part of the selection".into(),
            ));
        }
    }

    let mut recipients = Vec::new();
    let mut change = Vec::new();
    let mut memos = Vec::new();
    for out in &selection.outputs {
        match out.role {
            OutputRole::Recipient => {
                let address = out.address.as_deref().ok_or_else(|| {
                    UtxoError::TransactionBuildError("recipient output without address".into())
                })?;
                let script = rules
                    .address_to_script(address)
                    .map_err(|e| UtxoError::InvalidTarget(format!("{address}: {e}")))?;
                recipients.push((out.clone(), script));
            }
            OutputRole::Change => {
                let out = TxOutput {
                    address: Some(sender.to_string()),
                    value: out.value,
                    script: None,
                    role: OutputRole::Change,
                };
                change.push((out, sender_script.clone()));
            }
            OutputRole::Memo => {
                let script = out.script.clone().ok_or_else(|| {
                    UtxoError::TransactionBuildError("memo output without script".into())
                })?;
                memos.push((out.clone(), script));
            }
        }
    }

    let (outputs, output_scripts): (Vec<_>, Vec<_>) =
        recipients.into_iter().chain(change).chain(memos).unzip();

    let inputs: Vec<SkeletonInput> = selection
        .inputs
        .iter()
        .enumerate()
        .map(|(index, utxo)| SkeletonInput {
            index,
            utxo: utxo.clone(),
        })
        .collect();

    let input_total = sum_values(inputs.iter().map(|i| &i.utxo.value), decimals)?;
    let output_total = sum_values(outputs.iter().map(|o: &TxOutput| &o.value), decimals)?;
    if input_total != output_total.checked_add(selection.fee)? {
        return Err(UtxoError::TransactionBuildError(format!(
            "inputs {input_total} do not balance outputs {output_total} plus fee {}",
            selection.fee
        )));
    }

    debug!(
        "assembled {} inputs, {} outputs, fee {}",
        inputs.len(),
        outputs.len(),
        selection.fee
    );

    Ok(UnsignedTxSkeleton {
        inputs,
        outputs,
        output_scripts,
        params: rules.params().clone(),
        fee: selection.fee,
    })
}
