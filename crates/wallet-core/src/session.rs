//! A wallet session: one seed, one network, and the addresses derived from
//! it so far.

use chain_utxo::assembly::SignedTx;
use chain_utxo::fee::{self, FeeRates, Fees, TxShape};
use chain_utxo::signer::KeySigner;
use chain_utxo::source::{Broadcaster, UtxoSource};
use chain_utxo::transfer::{self, PendingTransfer, TransferReceipt, TransferRequest};
use chain_utxo::utxo;
use chain_utxo::{Amount, ChainRules, FeeRate, StandardChain};
use log::debug;
use zeroize::Zeroizing;

use crate::address;
use crate::cache::DerivationCache;
use crate::error::WalletError;
use crate::hd_derivation;
use crate::mnemonic;
use crate::types::{AddressKey, Chain, DerivedAddress, Network};

pub struct WalletSession {
    seed: Zeroizing<Vec<u8>>,
    network: Network,
    cache: DerivationCache,
}

impl WalletSession {
    pub fn from_mnemonic(phrase: &str, passphrase: &str, network: Network) -> Result<Self, WalletError> {
        let seed = mnemonic::mnemonic_to_seed(phrase, passphrase)?;
        Ok(Self::from_seed(seed, network))
    }

    pub fn from_seed(seed: Zeroizing<Vec<u8>>, network: Network) -> Self {
        Self {
            seed,
            network,
            cache: DerivationCache::default(),
        }
    }

    pub fn with_cache(mut self, cache: DerivationCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn cache(&self) -> &DerivationCache {
        &self.cache
    }

    pub fn rules(&self, chain: Chain) -> StandardChain {
        StandardChain::for_chain(chain, self.network)
    }

    /// Receive address at `account`/`index`, derived once per session.
    pub fn address(&mut self, chain: Chain, account: u32, index: u32) -> Result<DerivedAddress, WalletError> {
        let key = AddressKey {
            chain,
            network: self.network,
            account,
            index,
        };
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }
        let derived = address::derive_address(&self.seed, chain, self.network, account, index)?;
        debug!("derived {chain} address at {}", derived.derivation_path);
        self.cache.insert(key, derived.clone());
        Ok(derived)
    }

    /// Signer for the key behind `account`/`index`.
    pub fn signer(&self, chain: Chain, account: u32, index: u32) -> Result<KeySigner, WalletError> {
        let params = self.rules(chain).params().clone();
        let key = hd_derivation::derive_secp256k1_key(&self.seed, &params, account, index)?;
        Ok(KeySigner::from_secret_bytes(&key.private_key)?)
    }

    /// Spendable balance of `account`/`index`, pending outputs included.
    pub fn balance<S: UtxoSource + ?Sized>(
        &mut self,
        source: &S,
        chain: Chain,
        account: u32,
        index: u32,
    ) -> Result<Amount, WalletError> {
        let sender = self.address(chain, account, index)?;
        let utxos = source.fetch_unspent(&sender.address, false)?;
        Ok(utxo::balance(&utxos, self.rules(chain).decimals())?)
    }

    /// Fee per tier for a typical one-input transfer at the chain's default rates.
    pub fn fee_estimates(&self, chain: Chain, memo: Option<&str>) -> Result<Fees, WalletError> {
        let rules = self.rules(chain);
        Ok(fee::estimate(&rules, &FeeRates::defaults(&rules), memo, TxShape::default())?)
    }

    /// A request to send `amount` from `account`/`index` to `recipient`.
    ///
    /// Pending outputs may be spent unless a memo is attached later, which
    /// limits the scan to confirmed outputs.
    pub fn transfer_request(
        &mut self,
        chain: Chain,
        account: u32,
        index: u32,
        recipient: &str,
        amount: Amount,
        fee_rate: FeeRate,
    ) -> Result<TransferRequest, WalletError> {
        let sender = self.address(chain, account, index)?;
        Ok(TransferRequest::new(sender.address, recipient, amount, fee_rate).with_spend_pending(true))
    }

    pub fn prepare<S: UtxoSource + ?Sized>(
        &self,
        source: &S,
        chain: Chain,
        request: &TransferRequest,
    ) -> Result<PendingTransfer, WalletError> {
        Ok(transfer::prepare_transfer(source, request, &self.rules(chain))?)
    }

    /// Sign a prepared transfer with the key behind `account`/`index`.
    pub fn sign(
        &self,
        chain: Chain,
        account: u32,
        index: u32,
        pending: &PendingTransfer,
    ) -> Result<SignedTx, WalletError> {
        let signer = self.signer(chain, account, index)?;
        Ok(transfer::sign_transfer(pending, &signer)?)
    }

    /// Prepare, sign and broadcast. The request's sender must be the
    /// address at `account`/`index`.
    pub fn send<S, B>(
        &mut self,
        source: &S,
        broadcaster: &B,
        chain: Chain,
        account: u32,
        index: u32,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, WalletError>
    where
        S: UtxoSource + ?Sized,
        B: Broadcaster + ?Sized,
    {
        let sender = self.address(chain, account, index)?;
        if sender.address != request.sender {
            return Err(WalletError::InvalidAddress(format!(
                "sender {} is not {}",
                request.sender, sender.derivation_path
            )));
        }
        let signer = self.signer(chain, account, index)?;
        Ok(transfer::execute_transfer(
            source,
            broadcaster,
            &signer,
            request,
            &self.rules(chain),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn address_is_cached() {
        let mut session = WalletSession::from_mnemonic(TEST_MNEMONIC, "", Network::Mainnet).unwrap();
        assert!(session.cache().is_empty());
        let first = session.address(Chain::Bitcoin, 0, 0).unwrap();
        let second = session.address(Chain::Bitcoin, 0, 0).unwrap();
        assert_eq!(first, second);
        assert_eq!(session.cache().len(), 1);
    }

    #[test]
    fn cache_is_bounded() {
        let mut session = WalletSession::from_mnemonic(TEST_MNEMONIC, "", Network::Testnet)
            .unwrap()
            .with_cache(DerivationCache::new(3));
        for index in 0..10 {
            session.address(Chain::Dogecoin, 0, index).unwrap();
        }
        assert_eq!(session.cache().len(), 3);
    }

    #[test]
    fn signer_matches_address() {
        let mut session = WalletSession::from_mnemonic(TEST_MNEMONIC, "", Network::Mainnet).unwrap();
        let derived = session.address(Chain::BitcoinCash, 0, 2).unwrap();
        let signer = session.signer(Chain::BitcoinCash, 0, 2).unwrap();
        assert_eq!(hex::encode(signer.public_key()), derived.public_key);
    }

    #[test]
    fn fee_estimates_follow_chain_defaults() {
        let session = WalletSession::from_mnemonic(TEST_MNEMONIC, "", Network::Mainnet).unwrap();
        let fees = session.fee_estimates(Chain::Bitcoin, None).unwrap();
        assert_eq!(fees.slow, Amount::new(1_410, 8));
        assert!(fees.slow < fees.average && fees.average < fees.fast);
    }

    #[test]
    fn requests_spend_pending_until_memo_added() {
        let mut session = WalletSession::from_mnemonic(TEST_MNEMONIC, "", Network::Mainnet).unwrap();
        let to = session.address(Chain::Bitcoin, 1, 0).unwrap().address;
        let request = session
            .transfer_request(Chain::Bitcoin, 0, 0, &to, Amount::new(1_000, 8), FeeRate::from_units(1))
            .unwrap();
        assert!(!request.confirmed_only());
        assert!(request.with_memo("=:BTC.BTC:x").confirmed_only());
    }

    #[test]
    fn bad_mnemonic_is_rejected() {
        assert!(matches!(
            WalletSession::from_mnemonic("not a phrase", "", Network::Mainnet),
            Err(WalletError::InvalidMnemonic(_))
        ));
    }
}
