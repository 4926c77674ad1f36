//! Bounded random perturbation for "live" display values.
//!
//! Jitter only ever feeds a display metric. It is never logged and never
//! written back to a profile.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How a display value is derived from its base attribute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum JitterSpec {
    /// Add a uniform integer offset in `[-range, range]` to the base.
    Offset {
        /// Maximum absolute offset.
        range: u32,
    },
    /// Ignore the base and draw uniformly from `[low, high]`.
    Resample {
        /// Lower bound, inclusive.
        low: f64,
        /// Upper bound, inclusive.
        high: f64,
    },
}

impl Default for JitterSpec {
    fn default() -> Self {
        Self::Offset { range: 2 }
    }
}

impl JitterSpec {
    /// Check the band is well formed.
    ///
    /// # Errors
    ///
    /// Returns an error if a resample band is inverted or not finite.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Offset { .. } => Ok(()),
            Self::Resample { low, high } => {
                if !low.is_finite() || !high.is_finite() {
                    return Err(Error::script("resample bounds must be finite"));
                }
                if low > high {
                    return Err(Error::script(format!(
                        "resample low ({low}) cannot be greater than high ({high})"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Produce a jittered value for `base`.
    ///
    /// The result always lies within [`JitterSpec::bounds`].
    pub fn apply<R: Rng + ?Sized>(&self, base: f64, rng: &mut R) -> f64 {
        match *self {
            Self::Offset { range: 0 } => base,
            Self::Offset { range } => {
                let k = i64::from(range);
                #[allow(clippy::cast_precision_loss)]
                let offset = rng.gen_range(-k..=k) as f64;
                base + offset
            }
            Self::Resample { low, high } => {
                if low >= high {
                    low
                } else {
                    rng.gen_range(low..=high)
                }
            }
        }
    }

    /// Inclusive interval every value for `base` falls in.
    #[must_use]
    pub fn bounds(&self, base: f64) -> (f64, f64) {
        match *self {
            Self::Offset { range } => (base - f64::from(range), base + f64::from(range)),
            Self::Resample { low, high } => (low, high),
        }
    }
}
