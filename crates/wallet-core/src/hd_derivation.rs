use bip32::{DerivationPath, XPrv};
use chain_utxo::ChainParams;
use k256::ecdsa::SigningKey;
use zeroize::Zeroize;

use crate::error::WalletError;

/// BIP-44/84 path for `account` and `index`: m/purpose'/coin_type'/account'/0/index
///
/// The chain's path template fixes purpose, coin type and the external
/// chain; only the account level is replaced.
pub fn derivation_path(params: &ChainParams, account: u32, index: u32) -> Result<String, WalletError> {
    let template = params.derivation_path.trim_end_matches('/');
    let mut parts: Vec<String> = template.split('/').map(str::to_string).collect();
    if parts.len() != 5 || parts[0] != "m" {
        return Err(WalletError::DerivationFailed(format!(
            "unexpected path template {:?}",
            params.derivation_path
        )));
    }
    parts[3] = format!("{account}'");
    Ok(format!("{}/{index}", parts.join("/")))
}

/// Derive a secp256k1 private key from seed using BIP-32
pub fn derive_secp256k1_key(
    seed: &[u8],
    params: &ChainParams,
    account: u32,
    index: u32,
) -> Result<DerivedKey, WalletError> {
    if seed.len() < 16 || seed.len() > 64 {
        return Err(WalletError::InvalidSeed(format!(
            "seed must be 16 to 64 bytes, got {}",
            seed.len()
        )));
    }
    let path_str = derivation_path(params, account, index)?;

    let path: DerivationPath = path_str
        .parse()
        .map_err(|e: bip32::Error| WalletError::DerivationFailed(e.to_string()))?;

    let xprv = XPrv::derive_from_path(seed, &path)
        .map_err(|e| WalletError::DerivationFailed(e.to_string()))?;

    let mut private_key_bytes: [u8; 32] = xprv.to_bytes();
    let signing_key = SigningKey::from_bytes(&private_key_bytes.into())
        .map_err(|e| WalletError::DerivationFailed(e.to_string()))?;

    let public_key_compressed: [u8; 33] = signing_key
        .verifying_key()
        .to_sec1_bytes()
        .as_ref()
        .try_into()
        .map_err(|_| WalletError::DerivationFailed("Invalid public key length".into()))?;

    let key = DerivedKey {
        private_key: private_key_bytes,
        public_key_compressed,
        derivation_path: path_str,
    };
    private_key_bytes.zeroize();
    Ok(key)
}

/// Derived secp256k1 key
pub struct DerivedKey {
    pub private_key: [u8; 32],
    pub public_key_compressed: [u8; 33],
    pub derivation_path: String,
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}
