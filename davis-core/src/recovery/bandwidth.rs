// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::time::Duration;
use num_rational::Ratio;

const MICRO_BITS_PER_BYTE: u64 = 8 * 1000000;
const NANO_BITS_PER_BYTE: u64 = 8 * 1000000000;

/// A transfer rate in bits per second
///
/// Used for pacing rates, link rates and the send-interval arithmetic in the
/// simulator driver.
#[derive(Copy, Clone, Debug, Default, Eq, Ord, PartialOrd, PartialEq)]
pub struct Bandwidth {
    bits_per_second: u64,
}

impl Bandwidth {
    pub const ZERO: Bandwidth = Bandwidth { bits_per_second: 0 };

    pub const MAX: Bandwidth = Bandwidth {
        bits_per_second: u64::MAX,
    };

    /// Constructs a new `Bandwidth` with the given bytes per interval
    ///
    /// Intervals shorter than a microsecond are treated as zero.
    pub const fn new(bytes: u64, interval: Duration) -> Self {
        let micros = interval.as_micros() as u64;
        if micros == 0 {
            Bandwidth::ZERO
        } else {
            Self {
                // Prefer multiplying by MICRO_BITS_PER_BYTE first to avoid losing resolution
                bits_per_second: match bytes.checked_mul(MICRO_BITS_PER_BYTE) {
                    Some(micro_bits) => micro_bits / micros,
                    None => {
                        // If that overflows, divide first by the interval
                        (bytes / micros).saturating_mul(MICRO_BITS_PER_BYTE)
                    }
                },
            }
        }
    }

    /// Constructs a new `Bandwidth` from a bits per second value
    pub const fn from_bits_per_second(bits_per_second: u64) -> Self {
        Self { bits_per_second }
    }

    /// Returns the `Bandwidth` as bits per second
    pub const fn as_bits_per_second(self) -> u64 {
        self.bits_per_second
    }

    /// Returns the `Bandwidth` as bytes per second
    pub const fn as_bytes_per_second(self) -> u64 {
        self.bits_per_second / 8
    }

    /// True if this `Bandwidth` represents a zero transfer rate
    pub const fn is_zero(self) -> bool {
        self.bits_per_second == 0
    }
}

impl core::ops::Mul<Ratio<u64>> for Bandwidth {
    type Output = Bandwidth;

    fn mul(self, rhs: Ratio<u64>) -> Self::Output {
        Bandwidth {
            bits_per_second: (rhs * self.bits_per_second).to_integer(),
        }
    }
}

impl core::ops::Mul<Duration> for Bandwidth {
    type Output = u64;

    fn mul(self, rhs: Duration) -> Self::Output {
        // Prefer multiplying by the duration first to avoid losing resolution
        match self.bits_per_second.checked_mul(rhs.as_micros() as u64) {
            Some(micro_bits) => micro_bits / MICRO_BITS_PER_BYTE,
            None => {
                // If that overflows, divide first by MICRO_BITS_PER_BYTE
                (self.bits_per_second / MICRO_BITS_PER_BYTE).saturating_mul(rhs.as_micros() as u64)
            }
        }
    }
}

/// Divides a count of bytes represented as a u64 by the given `Bandwidth`
///
/// Since `Bandwidth` is a rate of bytes over a time period, this division
/// results in a `Duration` being returned, representing how long a path
/// with the given `Bandwidth` would take to transmit the given number of
/// bytes. A zero `Bandwidth` never transmits, represented as the maximum
/// `Duration`.
impl core::ops::Div<Bandwidth> for u64 {
    type Output = Duration;

    fn div(self, rhs: Bandwidth) -> Self::Output {
        if rhs.bits_per_second == 0 {
            return Duration::MAX;
        }

        // nanosecond resolution keeps per-segment transmission delays on
        // fast links representable
        match self.checked_mul(NANO_BITS_PER_BYTE) {
            Some(nano_bits) => Duration::from_nanos(nano_bits / rhs.bits_per_second),
            None => Duration::from_micros(
                (self / rhs.bits_per_second).saturating_mul(MICRO_BITS_PER_BYTE),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_per_interval() {
        let bandwidth = Bandwidth::new(1500, Duration::from_millis(1));

        assert_eq!(12_000_000, bandwidth.as_bits_per_second());
        assert_eq!(1_500_000, bandwidth.as_bytes_per_second());
    }

    #[test]
    fn zero_interval() {
        assert_eq!(Bandwidth::ZERO, Bandwidth::new(1500, Duration::ZERO));
        assert!(Bandwidth::ZERO.is_zero());
    }

    #[test]
    fn mul_duration() {
        let bandwidth = Bandwidth::new(1000, Duration::from_millis(1));

        // 1000 bytes/ms over 30ms = 30_000 bytes
        assert_eq!(30_000, bandwidth * Duration::from_millis(30));
    }

    #[test]
    fn div_bandwidth() {
        let bandwidth = Bandwidth::new(1000, Duration::from_millis(1));

        // 5000 bytes at 1000 bytes/ms take 5ms to transmit
        assert_eq!(Duration::from_millis(5), 5000 / bandwidth);
        assert_eq!(Duration::MAX, 5000 / Bandwidth::ZERO);
    }

    #[test]
    fn mul_ratio() {
        let bandwidth = Bandwidth::from_bits_per_second(1_000_000);

        assert_eq!(
            Bandwidth::from_bits_per_second(500_000),
            bandwidth * Ratio::new(1, 2)
        );
    }
}
