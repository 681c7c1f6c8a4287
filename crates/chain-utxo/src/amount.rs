use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::UtxoError;

/// Largest decimal-places tag an [`Amount`] may carry (10^19 overflows `u64`).
pub const MAX_DECIMALS: u8 = 18;

/// A fixed-point amount in base units, tagged with its decimal places.
///
/// `Amount { units: 50_000, decimals: 8 }` is 0.0005 of the whole coin.
/// Arithmetic between amounts requires identical tags and never wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    units: u64,
    decimals: u8,
}

fn pow10(exp: u8) -> Result<u64, UtxoError> {
    10u64.checked_pow(u32::from(exp)).ok_or(UtxoError::AmountOverflow)
}

impl Amount {
    pub const fn new(units: u64, decimals: u8) -> Self {
        Self { units, decimals }
    }

    pub const fn zero(decimals: u8) -> Self {
        Self { units: 0, decimals }
    }

    pub const fn units(&self) -> u64 {
        self.units
    }

    pub const fn decimals(&self) -> u8 {
        self.decimals
    }

    pub const fn is_zero(&self) -> bool {
        self.units == 0
    }

    fn same_tag(&self, other: &Amount) -> Result<(), UtxoError> {
        if self.decimals != other.decimals {
            return Err(UtxoError::DecimalMismatch {
                left: self.decimals,
                right: other.decimals,
            });
        }
        Ok(())
    }

    pub fn checked_add(self, other: Amount) -> Result<Amount, UtxoError> {
        self.same_tag(&other)?;
        let units = self
            .units
            .checked_add(other.units)
            .ok_or(UtxoError::AmountOverflow)?;
        Ok(Amount::new(units, self.decimals))
    }

    /// Subtract `other`; going below zero is an error, not a saturation.
    pub fn checked_sub(self, other: Amount) -> Result<Amount, UtxoError> {
        self.same_tag(&other)?;
        let units = self
            .units
            .checked_sub(other.units)
            .ok_or(UtxoError::AmountOverflow)?;
        Ok(Amount::new(units, self.decimals))
    }

    /// Multiply by a plain scalar, e.g. a fee rate times a byte count.
    pub fn checked_mul(self, factor: u64) -> Result<Amount, UtxoError> {
        let units = self
            .units
            .checked_mul(factor)
            .ok_or(UtxoError::AmountOverflow)?;
        Ok(Amount::new(units, self.decimals))
    }

    /// Re-express this amount with a different decimal-places tag.
    ///
    /// Scaling up is exact unless it overflows. Scaling down only succeeds
    /// when the dropped digits are all zero.
    pub fn rescale(self, to: u8) -> Result<Amount, UtxoError> {
        if to > MAX_DECIMALS {
            return Err(UtxoError::InvalidAmount(format!(
                "decimals {to} exceed maximum {MAX_DECIMALS}"
            )));
        }
        match to.cmp(&self.decimals) {
            Ordering::Equal => Ok(self),
            Ordering::Greater => {
                let factor = pow10(to - self.decimals)?;
                let units = self
                    .units
                    .checked_mul(factor)
                    .ok_or(UtxoError::AmountOverflow)?;
                Ok(Amount::new(units, to))
            }
            Ordering::Less => {
                let factor = pow10(self.decimals - to)?;
                if self.units % factor != 0 {
                    return Err(UtxoError::InexactRescale {
                        from: self.decimals,
                        to,
                    });
                }
                Ok(Amount::new(self.units / factor, to))
            }
        }
    }

    /// Sum a sequence of amounts sharing `decimals`.
    pub fn sum<I>(amounts: I, decimals: u8) -> Result<Amount, UtxoError>
    where
        I: IntoIterator<Item = Amount>,
    {
        amounts
            .into_iter()
            .try_fold(Amount::zero(decimals), Amount::checked_add)
    }

    /// Parse a whole-coin decimal string such as `"0.0005"` into base units.
    ///
    /// More fractional digits than `decimals` is an error rather than a
    /// silent truncation.
    pub fn from_decimal_str(s: &str, decimals: u8) -> Result<Amount, UtxoError> {
        if decimals > MAX_DECIMALS {
            return Err(UtxoError::InvalidAmount(format!(
                "decimals {decimals} exceed maximum {MAX_DECIMALS}"
            )));
        }
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(UtxoError::InvalidAmount(format!("empty amount: {s:?}")));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(UtxoError::InvalidAmount(format!("not a decimal number: {s:?}")));
        }
        if frac.len() > usize::from(decimals) {
            return Err(UtxoError::InvalidAmount(format!(
                "{s:?} has more than {decimals} fractional digits"
            )));
        }

        let whole_units = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u64>()
                .map_err(|_| UtxoError::AmountOverflow)?
        };
        let mut padded = frac.to_string();
        padded.extend(std::iter::repeat('0').take(usize::from(decimals) - frac.len()));
        let frac_units = if padded.is_empty() {
            0
        } else {
            padded
                .parse::<u64>()
                .map_err(|_| UtxoError::AmountOverflow)?
        };

        let units = whole_units
            .checked_mul(pow10(decimals)?)
            .and_then(|w| w.checked_add(frac_units))
            .ok_or(UtxoError::AmountOverflow)?;
        Ok(Amount::new(units, decimals))
    }
}

impl PartialOrd for Amount {
    /// Amounts with different tags are incomparable.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.decimals != other.decimals {
            return None;
        }
        Some(self.units.cmp(&other.units))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.decimals == 0 {
            return write!(f, "{}", self.units);
        }
        // decimals <= MAX_DECIMALS for every constructor that validates
        let factor = 10u64.saturating_pow(u32::from(self.decimals));
        write!(
            f,
            "{}.{:0width$}",
            self.units / factor,
            self.units % factor,
            width = usize::from(self.decimals)
        )
    }
}
