//! The transfer pipeline: fetch, select, assemble, sign, broadcast.
//!
//! Nothing here locks. Two transfers prepared concurrently from the same
//! address may select the same outputs, and one of them will be rejected by
//! the network. Callers that send in parallel must serialize transfers per
//! sender address.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::assembly::{assemble, SignedTx, UnsignedTxSkeleton};
use crate::error::UtxoError;
use crate::fee::FeeRate;
use crate::memo;
use crate::rules::ChainRules;
use crate::selection::{select, SelectionResult};
use crate::signer::{sign_skeleton, Signer};
use crate::source::{Broadcaster, UtxoSource};
use crate::utxo::{self, SelectionTarget, Utxo};

/// What the caller wants sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub sender: String,
    pub recipient: String,
    pub amount: Amount,
    pub memo: Option<String>,
    pub fee_rate: FeeRate,
    /// Allow spending outputs that are not yet confirmed. Ignored for
    /// transfers carrying a memo, which only spend confirmed outputs.
    pub spend_pending: bool,
}

impl TransferRequest {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: Amount,
        fee_rate: FeeRate,
    ) -> Self {
        TransferRequest {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
            memo: None,
            fee_rate,
            spend_pending: false,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_spend_pending(mut self, spend_pending: bool) -> Self {
        self.spend_pending = spend_pending;
        self
    }

    /// The memo, with an empty string treated as none.
    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref().filter(|m| !m.is_empty())
    }

    /// Whether the UTXO scan is limited to confirmed outputs.
    pub fn confirmed_only(&self) -> bool {
        !self.spend_pending || self.memo().is_some()
    }
}

/// A transfer that has been selected and assembled but not yet signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransfer {
    pub request: TransferRequest,
    pub selection: SelectionResult,
    pub skeleton: UnsignedTxSkeleton,
}

impl PendingTransfer {
    pub fn fee(&self) -> Amount {
        self.skeleton.fee()
    }
}

/// Outcome of a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Txid as reported by the broadcaster.
    pub txid: String,
    pub fee: Amount,
    pub signed: SignedTx,
}

/// Recipient payment plus memo output, validated.
pub fn build_targets<R: ChainRules + ?Sized>(
    request: &TransferRequest,
    rules: &R,
) -> Result<Vec<SelectionTarget>, UtxoError> {
    rules
        .validate_address(&request.recipient)
        .map_err(|e| UtxoError::InvalidAddress(format!("recipient {}: {e}", request.recipient)))?;

    let mut targets = vec![SelectionTarget::pay(request.recipient.clone(), request.amount)];
    if let Some(text) = request.memo() {
        let script = memo::encode(text, rules.max_memo_bytes())?;
        targets.push(SelectionTarget::data(script, rules.decimals()));
    }
    Ok(targets)
}

/// Select and assemble `request` from `candidates` without fetching.
pub fn prepare_from_candidates<R: ChainRules + ?Sized>(
    request: &TransferRequest,
    candidates: &[Utxo],
    rules: &R,
) -> Result<PendingTransfer, UtxoError> {
    let targets = build_targets(request, rules)?;
    let selection = select(candidates, &targets, request.fee_rate, rules)?;
    let skeleton = assemble(&selection, &request.sender, request.memo(), rules)?;
    Ok(PendingTransfer {
        request: request.clone(),
        selection,
        skeleton,
    })
}

/// Fetch the sender's outputs and build an unsigned transfer.
pub fn prepare_transfer<S, R>(
    source: &S,
    request: &TransferRequest,
    rules: &R,
) -> Result<PendingTransfer, UtxoError>
where
    S: UtxoSource + ?Sized,
    R: ChainRules + ?Sized,
{
    // Fail on a bad recipient or memo before touching the network.
    build_targets(request, rules)?;

    let confirmed_only = request.confirmed_only();
    let mut utxos = source.fetch_unspent(&request.sender, confirmed_only)?;
    if confirmed_only {
        utxos = utxo::confirmed_only(utxos);
    }
    debug!(
        "{} candidate utxos for {} (confirmed only: {confirmed_only})",
        utxos.len(),
        request.sender
    );
    prepare_from_candidates(request, &utxos, rules)
}

pub fn sign_transfer<S: Signer + ?Sized>(
    pending: &PendingTransfer,
    signer: &S,
) -> Result<SignedTx, UtxoError> {
    sign_skeleton(signer, &pending.skeleton)
}

/// Submit a signed transfer.
pub fn broadcast_transfer<B: Broadcaster + ?Sized>(
    pending: &PendingTransfer,
    signed: SignedTx,
    broadcaster: &B,
) -> Result<TransferReceipt, UtxoError> {
    let txid = broadcaster.submit(&signed.raw)?;
    if txid != signed.txid {
        warn!("broadcaster reported txid {txid}, computed {}", signed.txid);
    }
    info!("broadcast {txid} paying fee {}", pending.fee());
    Ok(TransferReceipt {
        txid,
        fee: pending.fee(),
        signed,
    })
}

/// Prepare, sign and broadcast in one go.
pub fn execute_transfer<S, B, K, R>(
    source: &S,
    broadcaster: &B,
    signer: &K,
    request: &TransferRequest,
    rules: &R,
) -> Result<TransferReceipt, UtxoError>
where
    S: UtxoSource + ?Sized,
    B: Broadcaster + ?Sized,
    K: Signer + ?Sized,
    R: ChainRules + ?Sized,
{
    let pending = prepare_transfer(source, request, rules)?;
    let signed = sign_transfer(&pending, signer)?;
    broadcast_transfer(&pending, signed, broadcaster)
}

/// Rebuild `pending` at a higher fee rate for replacement.
///
/// The original inputs are offered first so the replacement conflicts with
/// the original; `extra` outputs are appended after them. Pure: nothing is
/// fetched or broadcast.
pub fn bump_fee<R: ChainRules + ?Sized>(
    pending: &PendingTransfer,
    new_rate: FeeRate,
    extra: &[Utxo],
    rules: &R,
) -> Result<PendingTransfer, UtxoError> {
    if !rules.params().replaceable {
        return Err(UtxoError::TransactionBuildError(format!(
            "{} transactions are not replaceable",
            rules.params().chain
        )));
    }
    if new_rate <= pending.request.fee_rate {
        return Err(UtxoError::InvalidFeeRate(format!(
            "replacement rate {} must exceed {}",
            new_rate.units(),
            pending.request.fee_rate.units()
        )));
    }

    let original = &pending.selection.inputs;
    let mut candidates = original.clone();
    candidates.extend(
        extra
            .iter()
            .filter(|u| !original.iter().any(|o| o.outpoint() == u.outpoint()))
            .cloned(),
    );

    let request = TransferRequest {
        fee_rate: new_rate,
        ..pending.request.clone()
    };
    let replacement = prepare_from_candidates(&request, &candidates, rules)?;

    let conflicts = replacement
        .selection
        .inputs
        .iter()
        .any(|u| original.iter().any(|o| o.outpoint() == u.outpoint()));
    if !conflicts {
        return Err(UtxoError::TransactionBuildError(
            "replacement spends none of the original inputs".into(),
        ));
    }
    if replacement.fee() <= pending.fee() {
        return Err(UtxoError::InvalidFeeRate(format!(
            "replacement fee {} does not exceed original fee {}",
            replacement.fee(),
            pending.fee()
        )));
    }

    debug!(
        "fee bumped from {} to {} ({} -> {} per byte)",
        pending.fee(),
        replacement.fee(),
        pending.request.fee_rate.units(),
        new_rate.units()
    );
    Ok(replacement)
}
