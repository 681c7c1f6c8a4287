use chain_utxo::{SourceError, UtxoError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Selection, assembly, signing or a collaborator failed.
    #[error("Transfer failed: {0}")]
    Transfer(UtxoError),
}

impl From<UtxoError> for WalletError {
    fn from(e: UtxoError) -> Self {
        match e {
            UtxoError::InvalidAddress(msg) => WalletError::InvalidAddress(msg),
            UtxoError::InvalidAmount(msg) => WalletError::InvalidAmount(msg),
            other => WalletError::Transfer(other),
        }
    }
}

impl From<SourceError> for WalletError {
    fn from(e: SourceError) -> Self {
        WalletError::Transfer(e.into())
    }
}
