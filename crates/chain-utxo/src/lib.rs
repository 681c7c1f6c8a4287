//! UTXO transfer engine shared by the Bitcoin-family chains of the wallet.
//!
//! One accumulative coin selector and one transaction assembler,
//! parameterized by per-chain constants (decimals, address encodings, dust
//! threshold, size model). Fetching, signing and broadcasting happen behind
//! traits so the engine itself stays synchronous and free of I/O.

pub mod address;
pub mod amount;
pub mod assembly;
pub mod error;
pub mod fee;
pub mod memo;
pub mod params;
pub mod retry;
pub mod rules;
pub mod selection;
pub mod signer;
pub mod source;
pub mod transfer;
pub mod utxo;

pub use amount::Amount;
pub use error::{SourceError, UtxoError};
pub use fee::{FeeRate, FeeRates, FeeTier, Fees, TxShape};
pub use params::{Chain, ChainParams, Network};
pub use rules::{ChainRules, StandardChain};
pub use utxo::{SelectionTarget, TxOutput, Utxo};
