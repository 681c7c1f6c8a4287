//! Per-chain network parameters.
//!
//! Every numeric policy the selector and assembler apply (dust threshold,
//! byte-size constants, memo limit) comes from a [`ChainParams`] value.
//! The built-in table covers Bitcoin, Litecoin, Dogecoin and Bitcoin Cash;
//! callers may load their own from JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::UtxoError;

/// Supported UTXO chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
    Bitcoin,
    Litecoin,
    Dogecoin,
    BitcoinCash,
}

impl Chain {
    pub const ALL: [Chain; 4] = [
        Chain::Bitcoin,
        Chain::Litecoin,
        Chain::Dogecoin,
        Chain::BitcoinCash,
    ];

    /// Native token symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Chain::Bitcoin => "BTC",
            Chain::Litecoin => "LTC",
            Chain::Dogecoin => "DOGE",
            Chain::BitcoinCash => "BCH",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Network selector. Stagenet runs against mainnet parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    Mainnet,
    Stagenet,
    Testnet,
}

impl Network {
    pub fn is_testnet(self) -> bool {
        self == Network::Testnet
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Stagenet => write!(f, "stagenet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

/// How inputs of this chain are signed and therefore serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigScheme {
    /// BIP-143 P2WPKH, witness encoding.
    SegwitV0,
    /// Pre-segwit P2PKH with the original sighash.
    Legacy,
    /// P2PKH with BIP-143 digest and `SIGHASH_FORKID` (Bitcoin Cash).
    LegacyForkId,
}

/// An address encoding accepted on a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressFormat {
    /// Base58Check with one-byte version prefixes.
    Base58 { p2pkh: u8, p2sh: u8 },
    /// BIP-173/350 segwit with the given human-readable part.
    Segwit { hrp: String },
    /// Bitcoin Cash CashAddr; the prefix may be omitted in the address.
    CashAddr { prefix: String },
}

/// Linear transaction size model, in bytes (vbytes for segwit chains).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeModel {
    /// Version, lock time, input/output counts and segwit marker.
    pub overhead: u64,
    /// One signed input of the chain's standard script type.
    pub input_bytes: u64,
    /// One output paying a standard address.
    pub output_bytes: u64,
}

/// Default fee rates per tier, in base units per byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTiers {
    pub slow: u64,
    pub average: u64,
    pub fast: u64,
}

/// Per-tier multipliers in thousandths, applied to one observed rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierMultipliers {
    pub slow: u64,
    pub average: u64,
    pub fast: u64,
}

/// Everything the engine needs to know about one chain on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    pub chain: Chain,
    pub network: Network,
    pub decimals: u8,
    /// Change below this many base units is not emitted as an output.
    pub dust_threshold: u64,
    pub size: SizeModel,
    pub fee_tiers: FeeTiers,
    /// Multipliers applied to a single observed rate (e.g. next-block fee).
    pub tier_multipliers: TierMultipliers,
    /// HD derivation path without the trailing address index.
    pub derivation_path: String,
    /// Address encodings accepted; the first one is used for new addresses.
    pub address_formats: Vec<AddressFormat>,
    pub sig_scheme: SigScheme,
    /// Signal BIP-125 replaceability on inputs.
    pub replaceable: bool,
    pub max_memo_bytes: usize,
}

const SEGWIT_SIZE: SizeModel = SizeModel {
    overhead: 11,
    input_bytes: 68,
    output_bytes: 31,
};

const LEGACY_SIZE: SizeModel = SizeModel {
    overhead: 10,
    input_bytes: 148,
    output_bytes: 34,
};

/// Half, one and five times the next-block rate.
const SEGWIT_MULTIPLIERS: TierMultipliers = TierMultipliers {
    slow: 500,
    average: 1_000,
    fast: 5_000,
};

const LEGACY_MULTIPLIERS: TierMultipliers = TierMultipliers {
    slow: 1_000,
    average: 2_000,
    fast: 5_000,
};

/// Conventional OP_RETURN data limit for cross-chain routing memos.
pub const DEFAULT_MAX_MEMO_BYTES: usize = 80;

impl ChainParams {
    /// Built-in parameters for `chain` on `network`.
    pub fn for_chain(chain: Chain, network: Network) -> ChainParams {
        let testnet = network.is_testnet();
        match chain {
            Chain::Bitcoin => ChainParams {
                chain,
                network,
                decimals: 8,
                dust_threshold: 546,
                size: SEGWIT_SIZE,
                fee_tiers: FeeTiers {
                    slow: 10,
                    average: 20,
                    fast: 50,
                },
                tier_multipliers: SEGWIT_MULTIPLIERS,
                derivation_path: if testnet { "m/84'/1'/0'/0/" } else { "m/84'/0'/0'/0/" }.into(),
                address_formats: if testnet {
                    vec![
                        AddressFormat::Segwit { hrp: "tb".into() },
                        AddressFormat::Base58 { p2pkh: 0x6f, p2sh: 0xc4 },
                    ]
                } else {
                    vec![
                        AddressFormat::Segwit { hrp: "bc".into() },
                        AddressFormat::Base58 { p2pkh: 0x00, p2sh: 0x05 },
                    ]
                },
                sig_scheme: SigScheme::SegwitV0,
                replaceable: true,
                max_memo_bytes: DEFAULT_MAX_MEMO_BYTES,
            },
            Chain::Litecoin => ChainParams {
                chain,
                network,
                decimals: 8,
                dust_threshold: 1_000,
                size: SEGWIT_SIZE,
                fee_tiers: FeeTiers {
                    slow: 10,
                    average: 20,
                    fast: 50,
                },
                tier_multipliers: SEGWIT_MULTIPLIERS,
                derivation_path: if testnet { "m/84'/1'/0'/0/" } else { "m/84'/2'/0'/0/" }.into(),
                address_formats: if testnet {
                    vec![
                        AddressFormat::Segwit { hrp: "tltc".into() },
                        AddressFormat::Base58 { p2pkh: 0x6f, p2sh: 0x3a },
                        AddressFormat::Base58 { p2pkh: 0x6f, p2sh: 0xc4 },
                    ]
                } else {
                    vec![
                        AddressFormat::Segwit { hrp: "ltc".into() },
                        AddressFormat::Base58 { p2pkh: 0x30, p2sh: 0x32 },
                        AddressFormat::Base58 { p2pkh: 0x30, p2sh: 0x05 },
                    ]
                },
                sig_scheme: SigScheme::SegwitV0,
                replaceable: true,
                max_memo_bytes: DEFAULT_MAX_MEMO_BYTES,
            },
            // 0.01 and 0.011 DOGE/kB, and 1 DOGE/kB for the fast tier.
            Chain::Dogecoin => ChainParams {
                chain,
                network,
                decimals: 8,
                dust_threshold: 1_000_000,
                size: LEGACY_SIZE,
                fee_tiers: FeeTiers {
                    slow: 1_000,
                    average: 1_100,
                    fast: 100_000,
                },
                tier_multipliers: LEGACY_MULTIPLIERS,
                derivation_path: if testnet { "m/44'/1'/0'/0/" } else { "m/44'/3'/0'/0/" }.into(),
                address_formats: if testnet {
                    vec![AddressFormat::Base58 { p2pkh: 0x71, p2sh: 0xc4 }]
                } else {
                    vec![AddressFormat::Base58 { p2pkh: 0x1e, p2sh: 0x16 }]
                },
                sig_scheme: SigScheme::Legacy,
                replaceable: false,
                max_memo_bytes: DEFAULT_MAX_MEMO_BYTES,
            },
            Chain::BitcoinCash => ChainParams {
                chain,
                network,
                decimals: 8,
                dust_threshold: 546,
                size: LEGACY_SIZE,
                fee_tiers: FeeTiers {
                    slow: 1,
                    average: 2,
                    fast: 5,
                },
                tier_multipliers: LEGACY_MULTIPLIERS,
                derivation_path: if testnet { "m/44'/1'/0'/0/" } else { "m/44'/145'/0'/0/" }.into(),
                address_formats: if testnet {
                    vec![
                        AddressFormat::CashAddr { prefix: "bchtest".into() },
                        AddressFormat::Base58 { p2pkh: 0x6f, p2sh: 0xc4 },
                    ]
                } else {
                    vec![
                        AddressFormat::CashAddr { prefix: "bitcoincash".into() },
                        AddressFormat::Base58 { p2pkh: 0x00, p2sh: 0x05 },
                    ]
                },
                sig_scheme: SigScheme::LegacyForkId,
                replaceable: false,
                max_memo_bytes: DEFAULT_MAX_MEMO_BYTES,
            },
        }
    }

    /// Load parameters from JSON, rejecting values the engine cannot use.
    pub fn from_json(json: &str) -> Result<ChainParams, UtxoError> {
        let params: ChainParams =
            serde_json::from_str(json).map_err(|e| UtxoError::InvalidConfig(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn to_json(&self) -> Result<String, UtxoError> {
        serde_json::to_string_pretty(self).map_err(|e| UtxoError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), UtxoError> {
        if self.decimals > crate::amount::MAX_DECIMALS {
            return Err(UtxoError::InvalidConfig(format!(
                "decimals {} out of range",
                self.decimals
            )));
        }
        if self.address_formats.is_empty() {
            return Err(UtxoError::InvalidConfig("no address formats".into()));
        }
        if self.size.input_bytes == 0 || self.size.output_bytes == 0 {
            return Err(UtxoError::InvalidConfig("size model has zero-sized parts".into()));
        }
        if !self.derivation_path.starts_with("m/") {
            return Err(UtxoError::InvalidConfig(format!(
                "derivation path {:?} must start with m/",
                self.derivation_path
            )));
        }
        Ok(())
    }

    /// Full derivation path for address `index`.
    pub fn derivation_path_for(&self, index: u32) -> String {
        format!("{}{}", self.derivation_path, index)
    }

    /// Prefix that addresses freshly derived on this network start with.
    pub fn address_prefix(&self) -> String {
        match &self.address_formats[0] {
            AddressFormat::Segwit { hrp } => format!("{hrp}1"),
            AddressFormat::CashAddr { prefix } => format!("{prefix}:"),
            AddressFormat::Base58 { p2pkh, .. } => match p2pkh {
                0x00 => "1".into(),
                0x1e => "D".into(),
                0x30 => "L".into(),
                0x6f | 0x71 => "n".into(),
                other => format!("0x{other:02x}"),
            },
        }
    }
}
