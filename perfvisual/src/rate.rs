//! I/O throughput from two successive snapshots.

use serde::{Deserialize, Serialize};

use crate::types::{DerivedSample, RawSnapshot};

const BYTES_PER_MB: f64 = 1_048_576.0;

/// What to do with a negative rate, which only happens when a byte counter goes backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegativeRates {
    /// Report the negative value; consumers read it as a counter reset.
    #[default]
    Preserve,
    /// Report 0.0 instead.
    Clamp,
}

impl std::str::FromStr for NegativeRates {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve" => Ok(Self::Preserve),
            "clamp" => Ok(Self::Clamp),
            other => Err(format!("unknown negative rate policy '{other}'")),
        }
    }
}

/// Round to `places` decimals (at most 18), ties to even.
///
/// Works on the exact binary value of the float instead of scaling by 10^N in floating
/// point, so 2.675 rounds to 2.67 just like a decimal printer would show it.
pub fn round_half_even(value: f64, places: u32) -> f64 {
    if !value.is_finite() || value == 0.0 {
        return value;
    }
    let bits = value.abs().to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exp) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    };
    if exp >= 0 {
        // no fractional part
        return value;
    }
    let scale = 10u128.pow(places.min(18));
    let n = mantissa as u128 * scale;
    let k = exp.unsigned_abs();
    let q = if k >= 128 {
        0
    } else {
        let q = n >> k;
        let rem = n - (q << k);
        let half = 1u128 << (k - 1);
        if rem > half || (rem == half && q & 1 == 1) {
            q + 1
        } else {
            q
        }
    };
    (q as f64 / scale as f64).copysign(value)
}

/// MiB/s for a byte delta over `elapsed_secs`, rounded to 3 places.
pub fn rate_mbps(delta_bytes: i128, elapsed_secs: f64) -> f64 {
    round_half_even(delta_bytes as f64 / elapsed_secs / BYTES_PER_MB, 3)
}

/// Seconds between two snapshots with microsecond resolution. Negative if `current` is older.
pub fn elapsed_secs(previous: &RawSnapshot, current: &RawSnapshot) -> f64 {
    let delta = current.timestamp - previous.timestamp;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RateEstimator {
    negative: NegativeRates,
}

impl RateEstimator {
    pub fn new(negative: NegativeRates) -> Self {
        Self { negative }
    }

    pub fn negative_rates(&self) -> NegativeRates {
        self.negative
    }

    /// Derive read/write throughput for `current`.
    ///
    /// Without a previous snapshot, or when the clock did not advance, both rates are 0.0.
    pub fn derive(&self, previous: Option<&RawSnapshot>, current: RawSnapshot) -> DerivedSample {
        let (read_rate_mbps, write_rate_mbps) = match previous {
            Some(prev) => {
                let elapsed = elapsed_secs(prev, &current);
                if elapsed > 0.0 {
                    let d_read = current.io_read_bytes as i128 - prev.io_read_bytes as i128;
                    let d_write = current.io_write_bytes as i128 - prev.io_write_bytes as i128;
                    (
                        self.apply_policy(rate_mbps(d_read, elapsed)),
                        self.apply_policy(rate_mbps(d_write, elapsed)),
                    )
                } else {
                    (0.0, 0.0)
                }
            }
            None => (0.0, 0.0),
        };
        DerivedSample {
            raw: current,
            read_rate_mbps,
            write_rate_mbps,
        }
    }

    fn apply_policy(&self, rate: f64) -> f64 {
        match self.negative {
            NegativeRates::Clamp if rate < 0.0 => 0.0,
            _ => rate,
        }
    }
}
