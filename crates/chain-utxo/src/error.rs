use thiserror::Error;

/// UTXO engine errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UtxoError {
    #[error("insufficient funds: need {needed} base units, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("invalid fee rate: {0}")]
    InvalidFeeRate(String),

    #[error("memo too long: {len} bytes, max {max}")]
    MemoTooLong { len: usize, max: usize },

    #[error("decimal mismatch: {left} vs {right}")]
    DecimalMismatch { left: u8, right: u8 },

    #[error("amount overflow")]
    AmountOverflow,

    #[error("inexact rescale from {from} to {to} decimals")]
    InexactRescale { from: u8, to: u8 },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Failures reported by external collaborators (UTXO sources, broadcasters).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// HTTP 429 or an equivalent "max rate limit reached" payload.
    #[error("rate limited")]
    RateLimited,

    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Still rate limited when the retry policy gave up.
    #[error("rate limited after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

impl From<SourceError> for UtxoError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::RateLimited => UtxoError::RateLimited { attempts: 1 },
            SourceError::Unavailable(msg) => UtxoError::UpstreamUnavailable(msg),
            SourceError::RetriesExhausted { attempts } => UtxoError::RateLimited { attempts },
        }
    }
}
