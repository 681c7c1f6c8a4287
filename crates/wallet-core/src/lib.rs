//! Wallet facade over `chain-utxo`: mnemonic handling, HD derivation, and
//! one-shot transfer signing for the supported UTXO chains.
//!
//! The free functions here take owned arguments and hold no state between
//! calls. Anything longer-lived goes through [`session::WalletSession`].

pub mod address;
pub mod cache;
pub mod error;
pub mod hd_derivation;
pub mod mnemonic;
pub mod session;
pub mod types;

use chain_utxo::transfer::{self, TransferRequest};
use chain_utxo::{fee, Amount, ChainRules, FeeRate, FeeRates, StandardChain, TxShape, Utxo};
use log::info;
use zeroize::Zeroize;

use error::WalletError;
use types::{Chain, DerivedAddress, FeeQuote, Network, SignedTransfer, UtxoData};

/// Generate a new BIP-39 mnemonic of `words` words
pub fn generate_mnemonic(words: u32) -> Result<String, WalletError> {
    mnemonic::generate_mnemonic(words as usize)
}

/// Validate a mnemonic phrase
pub fn validate_mnemonic(phrase: String) -> bool {
    mnemonic::validate_mnemonic(&phrase)
}

/// Check if a single word is in the BIP-39 word list
pub fn is_valid_bip39_word(word: String) -> bool {
    mnemonic::is_valid_word(&word)
}

pub fn mnemonic_to_seed(mnemonic_phrase: String, passphrase: String) -> Result<Vec<u8>, WalletError> {
    Ok(mnemonic::mnemonic_to_seed(&mnemonic_phrase, &passphrase)?.to_vec())
}

/// Derive an address for a specific chain from mnemonic
pub fn derive_address_from_mnemonic(
    mnemonic_phrase: String,
    passphrase: String,
    chain: Chain,
    network: Network,
    account: u32,
    index: u32,
) -> Result<DerivedAddress, WalletError> {
    let seed = mnemonic::mnemonic_to_seed(&mnemonic_phrase, &passphrase)?;
    address::derive_address(&seed, chain, network, account, index)
}

/// Derive the first address of `account` on every chain
pub fn derive_all_addresses_from_mnemonic(
    mnemonic_phrase: String,
    passphrase: String,
    network: Network,
    account: u32,
) -> Result<Vec<DerivedAddress>, WalletError> {
    let seed = mnemonic::mnemonic_to_seed(&mnemonic_phrase, &passphrase)?;
    address::derive_all_addresses(&seed, network, account)
}

pub fn validate_address(addr: String, chain: Chain, network: Network) -> bool {
    address::validate_address(&addr, chain, network)
}

/// Fee per tier for a one-input transfer at the chain's default rates
pub fn estimate_fees(chain: Chain, network: Network, memo: Option<String>) -> Result<FeeQuote, WalletError> {
    let rules = StandardChain::for_chain(chain, network);
    let fees = fee::estimate(
        &rules,
        &FeeRates::defaults(&rules),
        memo.as_deref(),
        TxShape::default(),
    )?;
    Ok(FeeQuote {
        slow: fees.slow.units(),
        average: fees.average.units(),
        fast: fees.fast.units(),
    })
}

/// Select, assemble and sign a transfer from the address at
/// `account`/`index`, spending only the given `utxos`.
///
/// Change returns to the sending address. `fee_rate` is in base units
/// per byte.
#[allow(clippy::too_many_arguments)]
pub fn sign_utxo_transfer(
    mut seed: Vec<u8>,
    chain: Chain,
    network: Network,
    account: u32,
    index: u32,
    utxos: Vec<UtxoData>,
    recipient_address: String,
    amount: u64,
    memo: Option<String>,
    fee_rate: f64,
) -> Result<SignedTransfer, WalletError> {
    let result = sign_with_seed(
        &seed,
        chain,
        network,
        account,
        index,
        utxos,
        recipient_address,
        amount,
        memo,
        fee_rate,
    );
    seed.zeroize();
    result
}

#[allow(clippy::too_many_arguments)]
fn sign_with_seed(
    seed: &[u8],
    chain: Chain,
    network: Network,
    account: u32,
    index: u32,
    utxos: Vec<UtxoData>,
    recipient_address: String,
    amount: u64,
    memo: Option<String>,
    fee_rate: f64,
) -> Result<SignedTransfer, WalletError> {
    let rules = StandardChain::for_chain(chain, network);
    let decimals = rules.decimals();
    let sender = address::derive_address(seed, chain, network, account, index)?;

    let candidates: Vec<Utxo> = utxos
        .into_iter()
        .map(|u| Utxo {
            txid: u.txid,
            vout: u.vout,
            value: Amount::new(u.amount, decimals),
            script_pubkey: u.script_pubkey,
            confirmations: u.confirmations,
        })
        .collect();

    let mut request = TransferRequest::new(
        sender.address,
        recipient_address,
        Amount::new(amount, decimals),
        FeeRate::from_per_byte(fee_rate)?,
    );
    request.memo = memo;

    let pending = transfer::prepare_from_candidates(&request, &candidates, &rules)?;

    let key = hd_derivation::derive_secp256k1_key(seed, rules.params(), account, index)?;
    let signer = chain_utxo::signer::KeySigner::from_secret_bytes(&key.private_key)?;
    let signed = transfer::sign_transfer(&pending, &signer)?;

    info!("signed {chain} transfer {} paying fee {}", signed.txid, pending.fee());
    Ok(SignedTransfer {
        txid: signed.txid.clone(),
        raw_tx_hex: signed.raw_hex(),
        fee: pending.fee().units(),
    })
}
