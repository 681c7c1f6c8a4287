use chain_utxo::address::pubkey_to_address;
use chain_utxo::{ChainParams, ChainRules, StandardChain};

use crate::error::WalletError;
use crate::hd_derivation;
use crate::types::{Chain, DerivedAddress, Network};

/// Derive the receive address at `account`/`index` from seed bytes
pub fn derive_address(
    seed: &[u8],
    chain: Chain,
    network: Network,
    account: u32,
    index: u32,
) -> Result<DerivedAddress, WalletError> {
    let params = ChainParams::for_chain(chain, network);
    let key = hd_derivation::derive_secp256k1_key(seed, &params, account, index)?;

    let format = params
        .address_formats
        .first()
        .ok_or_else(|| WalletError::InvalidAddress(format!("no address format for {chain}")))?;
    let address = pubkey_to_address(&key.public_key_compressed, format)?;

    Ok(DerivedAddress {
        chain,
        network,
        address,
        derivation_path: key.derivation_path.clone(),
        public_key: hex::encode(key.public_key_compressed),
    })
}

/// Derive the first address of `account` on every supported chain
pub fn derive_all_addresses(
    seed: &[u8],
    network: Network,
    account: u32,
) -> Result<Vec<DerivedAddress>, WalletError> {
    Chain::ALL
        .iter()
        .map(|chain| derive_address(seed, *chain, network, account, 0))
        .collect()
}

/// Validate an address for a given chain and network
pub fn validate_address(addr: &str, chain: Chain, network: Network) -> bool {
    StandardChain::for_chain(chain, network)
        .validate_address(addr)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mnemonic::mnemonic_to_seed;

    const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn test_seed() -> Vec<u8> {
        mnemonic_to_seed(TEST_MNEMONIC, "").unwrap().to_vec()
    }

    #[test]
    fn test_btc_bip84_vector() {
        let addr = derive_address(&test_seed(), Chain::Bitcoin, Network::Mainnet, 0, 0).unwrap();
        assert_eq!(addr.address, "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu");
        assert_eq!(addr.derivation_path, "m/84'/0'/0'/0/0");
        assert_eq!(addr.public_key.len(), 66);
    }

    #[test]
    fn test_addresses_use_network_prefix() {
        let seed = test_seed();
        for network in [Network::Mainnet, Network::Testnet] {
            for addr in derive_all_addresses(&seed, network, 0).unwrap() {
                let prefix = ChainParams::for_chain(addr.chain, network).address_prefix();
                assert!(
                    addr.address.starts_with(&prefix),
                    "{} {} does not start with {prefix}",
                    addr.chain,
                    addr.address
                );
                assert!(validate_address(&addr.address, addr.chain, network));
            }
        }
    }

    #[test]
    fn test_stagenet_matches_mainnet() {
        let seed = test_seed();
        let main = derive_address(&seed, Chain::Litecoin, Network::Mainnet, 0, 0).unwrap();
        let stage = derive_address(&seed, Chain::Litecoin, Network::Stagenet, 0, 0).unwrap();
        assert_eq!(main.address, stage.address);
    }

    #[test]
    fn test_validate_rejects_other_chain() {
        let seed = test_seed();
        let btc = derive_address(&seed, Chain::Bitcoin, Network::Mainnet, 0, 0).unwrap();
        assert!(!validate_address(&btc.address, Chain::Litecoin, Network::Mainnet));
        assert!(!validate_address(&btc.address, Chain::Bitcoin, Network::Testnet));
        assert!(!validate_address("", Chain::Bitcoin, Network::Mainnet));
    }
}
