use serde::{Deserialize, Serialize};

pub use chain_utxo::{Chain, Network};

/// Derived address for a specific chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAddress {
    pub chain: Chain,
    pub network: Network,
    pub address: String,
    pub derivation_path: String,
    /// Compressed public key, hex.
    pub public_key: String,
}

/// Identifies one derived address within a wallet session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressKey {
    pub chain: Chain,
    pub network: Network,
    pub account: u32,
    pub index: u32,
}

/// UTXO data passed in by the host application for signing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoData {
    pub txid: String,
    pub vout: u32,
    pub amount: u64,
    pub script_pubkey: Vec<u8>,
    pub confirmations: Option<u32>,
}

/// Result of signing a transfer, ready for broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransfer {
    pub txid: String,
    pub raw_tx_hex: String,
    /// Fee in base units.
    pub fee: u64,
}

/// Fee per tier in base units, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    pub slow: u64,
    pub average: u64,
    pub fast: u64,
}
