use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::error::UtxoError;

/// A single unspent transaction output (UTXO).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Transaction ID as a hex string (big-endian / display order).
    pub txid: String,
    /// Output index within the transaction.
    pub vout: u32,
    pub value: Amount,
    /// The locking script (scriptPubKey) serialized bytes.
    pub script_pubkey: Vec<u8>,
    /// `None` when the data source does not report confirmations.
    pub confirmations: Option<u32>,
}

impl Utxo {
    /// Pending when the source reports zero confirmations. An unknown count
    /// is not pending: the source was asked to apply the filter itself.
    pub fn is_pending(&self) -> bool {
        self.confirmations == Some(0)
    }

    /// `txid:vout`
    pub fn outpoint(&self) -> String {
        format!("{}:{}", self.txid, self.vout)
    }
}

/// Sort candidates by value descending. Stable, so equal values keep source order.
pub fn sort_largest_first(utxos: &mut [Utxo]) {
    utxos.sort_by(|a, b| b.value.units().cmp(&a.value.units()));
}

/// Drop outputs the source reported as pending.
pub fn confirmed_only(utxos: Vec<Utxo>) -> Vec<Utxo> {
    utxos.into_iter().filter(|u| !u.is_pending()).collect()
}

/// Spendable balance of a UTXO set.
pub fn balance(utxos: &[Utxo], decimals: u8) -> Result<Amount, UtxoError> {
    Amount::sum(utxos.iter().map(|u| u.value), decimals)
}

/// One payment the caller wants made.
///
/// `address = None` marks a data output (e.g. a memo) that carries `script`
/// and pays nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionTarget {
    pub address: Option<String>,
    pub value: Amount,
    pub script: Option<Vec<u8>>,
}

impl SelectionTarget {
    pub fn pay(address: impl Into<String>, value: Amount) -> Self {
        SelectionTarget {
            address: Some(address.into()),
            value,
            script: None,
        }
    }

    /// A zero-value output carrying `script`.
    pub fn data(script: Vec<u8>, decimals: u8) -> Self {
        SelectionTarget {
            address: None,
            value: Amount::zero(decimals),
            script: Some(script),
        }
    }
}

/// What an output is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputRole {
    Recipient,
    Change,
    Memo,
}

/// A transaction output as decided by selection and assembly.
///
/// After assembly exactly one of `address`/`script` is set. A change output
/// coming out of the selector has neither until the assembler directs it
/// to the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: Option<String>,
    pub value: Amount,
    pub script: Option<Vec<u8>>,
    pub role: OutputRole,
}
