//! Fee rates, the shared transaction size model, and tiered fee estimates.
//!
//! [`tx_size`] is the only sizing function in the crate. The coin selector
//! and [`estimate`] both call it, so a quoted fee and the fee a selection
//! actually pays are computed from the same byte count.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::error::UtxoError;
use crate::memo;
use crate::params::{SizeModel, TierMultipliers};
use crate::rules::ChainRules;

/// Value field of every output.
const OUTPUT_VALUE_BYTES: u64 = 8;

/// Fee rate in whole base units per byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeeRate(u64);

impl FeeRate {
    pub const ZERO: FeeRate = FeeRate(0);

    pub const fn from_units(units_per_byte: u64) -> Self {
        FeeRate(units_per_byte)
    }

    /// Accept a caller-supplied rate, rounded to a whole unit per byte.
    pub fn from_per_byte(rate: f64) -> Result<Self, UtxoError> {
        if !rate.is_finite() {
            return Err(UtxoError::InvalidFeeRate(format!("{rate} is not finite")));
        }
        if rate < 0.0 {
            return Err(UtxoError::InvalidFeeRate(format!("{rate} is negative")));
        }
        let rounded = rate.round();
        if rounded >= u64::MAX as f64 {
            return Err(UtxoError::InvalidFeeRate(format!("{rate} is too large")));
        }
        Ok(FeeRate(rounded as u64))
    }

    pub const fn units(&self) -> u64 {
        self.0
    }

    /// Absolute fee for `bytes` at this rate.
    pub fn fee_for(&self, bytes: u64, decimals: u8) -> Result<Amount, UtxoError> {
        Amount::new(bytes, decimals).checked_mul(self.0)
    }
}

/// Shape of one output for sizing purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    /// Pays a standard address of the chain.
    Address,
    /// Carries an explicit script of the given length (e.g. OP_RETURN).
    Script(usize),
}

fn varint_len(n: usize) -> u64 {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        _ => 5,
    }
}

/// Size of an output carrying a script of `script_len` bytes.
pub fn script_output_bytes(script_len: usize) -> u64 {
    OUTPUT_VALUE_BYTES + varint_len(script_len) + script_len as u64
}

/// Projected transaction size: overhead + inputs + outputs.
pub fn tx_size(model: &SizeModel, inputs: usize, outputs: &[OutputShape]) -> u64 {
    let output_bytes: u64 = outputs
        .iter()
        .map(|shape| match shape {
            OutputShape::Address => model.output_bytes,
            OutputShape::Script(len) => script_output_bytes(*len),
        })
        .sum();
    model.overhead + inputs as u64 * model.input_bytes + output_bytes
}

/// Fee tier selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeTier {
    Slow,
    Average,
    Fast,
}

/// A rate for each tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRates {
    pub slow: FeeRate,
    pub average: FeeRate,
    pub fast: FeeRate,
}

impl FeeRates {
    /// The chain's fixed default tiers.
    pub fn defaults<R: ChainRules + ?Sized>(rules: &R) -> Self {
        let tiers = rules.params().fee_tiers;
        FeeRates {
            slow: FeeRate::from_units(tiers.slow),
            average: FeeRate::from_units(tiers.average),
            fast: FeeRate::from_units(tiers.fast),
        }
    }

    /// Derive tiers from a single observed rate, e.g. the next-block fee.
    /// Fractional results round up to the next whole unit.
    pub fn from_base(base: FeeRate, multipliers: &TierMultipliers) -> Result<Self, UtxoError> {
        let scale = |m: u64| {
            base.units()
                .checked_mul(m)
                .map(|milli| FeeRate::from_units(milli.div_ceil(1_000)))
                .ok_or_else(|| {
                    UtxoError::InvalidFeeRate(format!("{} x {m}/1000 overflows", base.units()))
                })
        };
        Ok(FeeRates {
            slow: scale(multipliers.slow)?,
            average: scale(multipliers.average)?,
            fast: scale(multipliers.fast)?,
        })
    }

    pub fn rate(&self, tier: FeeTier) -> FeeRate {
        match tier {
            FeeTier::Slow => self.slow,
            FeeTier::Average => self.average,
            FeeTier::Fast => self.fast,
        }
    }
}

/// Absolute fee per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fees {
    pub slow: Amount,
    pub average: Amount,
    pub fast: Amount,
}

impl Fees {
    pub fn get(&self, tier: FeeTier) -> Amount {
        match tier {
            FeeTier::Slow => self.slow,
            FeeTier::Average => self.average,
            FeeTier::Fast => self.fast,
        }
    }
}

/// Expected number of inputs and address outputs of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxShape {
    pub inputs: usize,
    /// Recipient and change outputs; a memo is accounted separately.
    pub address_outputs: usize,
}

impl Default for TxShape {
    /// One input paying a recipient with change.
    fn default() -> Self {
        TxShape {
            inputs: 1,
            address_outputs: 2,
        }
    }
}

/// Projected size of a transfer of `shape`, plus the memo output if any.
pub fn projected_size<R: ChainRules + ?Sized>(
    rules: &R,
    memo: Option<&str>,
    shape: TxShape,
) -> Result<u64, UtxoError> {
    let mut outputs = vec![OutputShape::Address; shape.address_outputs];
    if let Some(memo) = memo.filter(|m| !m.is_empty()) {
        outputs.push(OutputShape::Script(memo::encoded_len(memo, rules.max_memo_bytes())?));
    }
    Ok(tx_size(&rules.size_model(), shape.inputs, &outputs))
}

/// Fee for each tier: `rate * projected_size`.
pub fn estimate<R: ChainRules + ?Sized>(
    rules: &R,
    rates: &FeeRates,
    memo: Option<&str>,
    shape: TxShape,
) -> Result<Fees, UtxoError> {
    let size = projected_size(rules, memo, shape)?;
    let decimals = rules.decimals();
    Ok(Fees {
        slow: rates.slow.fee_for(size, decimals)?,
        average: rates.average.fee_for(size, decimals)?,
        fast: rates.fast.fee_for(size, decimals)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Chain, Network};
    use crate::rules::StandardChain;

    fn btc() -> StandardChain {
        StandardChain::for_chain(Chain::Bitcoin, Network::Mainnet)
    }

    #[test]
    fn size_one_input_two_outputs() {
        // 11 + 68 + 2 * 31
        let size = tx_size(&btc().size_model(), 1, &[OutputShape::Address, OutputShape::Address]);
        assert_eq!(size, 141);
    }

    #[test]
    fn size_scales_with_inputs() {
        let model = btc().size_model();
        let one = tx_size(&model, 1, &[OutputShape::Address]);
        let two = tx_size(&model, 2, &[OutputShape::Address]);
        assert_eq!(two - one, model.input_bytes);
    }

    #[test]
    fn script_output_size_includes_value_and_length() {
        assert_eq!(script_output_bytes(16), 8 + 1 + 16);
        assert_eq!(script_output_bytes(300), 8 + 3 + 300);
    }

    #[test]
    fn fee_rate_rounds_to_whole_units() {
        assert_eq!(FeeRate::from_per_byte(9.6).unwrap(), FeeRate::from_units(10));
        assert_eq!(FeeRate::from_per_byte(9.4).unwrap(), FeeRate::from_units(9));
        assert_eq!(FeeRate::from_per_byte(0.0).unwrap(), FeeRate::ZERO);
    }

    #[test]
    fn fee_rate_rejects_negative_and_non_finite() {
        assert!(matches!(FeeRate::from_per_byte(-1.0), Err(UtxoError::InvalidFeeRate(_))));
        assert!(matches!(FeeRate::from_per_byte(f64::NAN), Err(UtxoError::InvalidFeeRate(_))));
        assert!(matches!(
            FeeRate::from_per_byte(f64::INFINITY),
            Err(UtxoError::InvalidFeeRate(_))
        ));
    }

    #[test]
    fn estimate_without_memo() {
        let rules = btc();
        let fees = estimate(&rules, &FeeRates::defaults(&rules), None, TxShape::default()).unwrap();
        assert_eq!(fees.slow, Amount::new(141 * 10, 8));
        assert_eq!(fees.average, Amount::new(141 * 20, 8));
        assert_eq!(fees.fast, Amount::new(141 * 50, 8));
        assert_eq!(fees.get(FeeTier::Average), fees.average);
    }

    #[test]
    fn estimate_includes_memo_bytes() {
        let rules = btc();
        let rates = FeeRates::defaults(&rules);
        let memo = "SWAP:THOR:addr";
        let plain = estimate(&rules, &rates, None, TxShape::default()).unwrap();
        let with_memo = estimate(&rules, &rates, Some(memo), TxShape::default()).unwrap();
        // OP_RETURN script is 16 bytes, its output 25
        let extra = with_memo.slow.checked_sub(plain.slow).unwrap();
        assert_eq!(extra, Amount::new(25 * 10, 8));
    }

    #[test]
    fn empty_memo_counts_as_none() {
        let rules = btc();
        let rates = FeeRates::defaults(&rules);
        assert_eq!(
            estimate(&rules, &rates, Some(""), TxShape::default()).unwrap(),
            estimate(&rules, &rates, None, TxShape::default()).unwrap()
        );
    }

    #[test]
    fn estimate_rejects_oversized_memo() {
        let rules = btc();
        let memo = "m".repeat(81);
        let result = estimate(&rules, &FeeRates::defaults(&rules), Some(&memo), TxShape::default());
        assert!(matches!(result, Err(UtxoError::MemoTooLong { .. })));
    }

    #[test]
    fn tiers_from_base_rate() {
        let rules = StandardChain::for_chain(Chain::BitcoinCash, Network::Mainnet);
        let rates = FeeRates::from_base(FeeRate::from_units(3), &rules.params().tier_multipliers).unwrap();
        assert_eq!(rates.slow, FeeRate::from_units(3));
        assert_eq!(rates.average, FeeRate::from_units(6));
        assert_eq!(rates.fast, FeeRate::from_units(15));
        assert_eq!(rates.rate(FeeTier::Fast), rates.fast);
    }

    #[test]
    fn bitcoin_tiers_halve_and_quintuple_next_block_rate() {
        let rules = btc();
        let rates = FeeRates::from_base(FeeRate::from_units(20), &rules.params().tier_multipliers).unwrap();
        assert_eq!(rates.slow, FeeRate::from_units(10));
        assert_eq!(rates.average, FeeRate::from_units(20));
        assert_eq!(rates.fast, FeeRate::from_units(100));
    }

    #[test]
    fn half_rate_rounds_up() {
        let rules = StandardChain::for_chain(Chain::Litecoin, Network::Mainnet);
        let rates = FeeRates::from_base(FeeRate::from_units(3), &rules.params().tier_multipliers).unwrap();
        assert_eq!(rates.slow, FeeRate::from_units(2));
        let rates = FeeRates::from_base(FeeRate::from_units(1), &rules.params().tier_multipliers).unwrap();
        assert_eq!(rates.slow, FeeRate::from_units(1));
    }

    #[test]
    fn from_base_overflow_is_an_error() {
        let result = FeeRates::from_base(FeeRate::from_units(u64::MAX), &btc().params().tier_multipliers);
        assert!(matches!(result, Err(UtxoError::InvalidFeeRate(_))));
    }

    #[test]
    fn dogecoin_defaults_use_legacy_size() {
        let rules = StandardChain::for_chain(Chain::Dogecoin, Network::Mainnet);
        let fees = estimate(&rules, &FeeRates::defaults(&rules), None, TxShape::default()).unwrap();
        // 10 + 148 + 2 * 34 = 226 bytes at 1_000 per byte
        assert_eq!(fees.slow, Amount::new(226_000, 8));
        assert_eq!(fees.average, Amount::new(248_600, 8));
        assert_eq!(fees.fast, Amount::new(22_600_000, 8));
    }
}
