// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::time::Timestamp;
use core::time::Duration;

/// The value `min_rtt` holds before any sample has been observed
pub const RTT_INF: Duration = Duration::from_secs(10);

/// Samples at or below this value are dominated by scheduling and processing
/// delay rather than propagation and queueing delay, and would drag `min_rtt`
/// far below the real base RTT on fast local links. The smoothed RTT is
/// substituted for them.
const PROCESSING_NOISE: Duration = Duration::from_millis(1);

/// Round trip time bookkeeping for one flow
///
/// Tracks the latest sample, the minimum observed (with the time it was last
/// refreshed, for the periodic base-RTT probe) and an RFC 6298 style smoothed
/// RTT.
#[derive(Clone, Copy, Debug)]
pub struct RttEstimator {
    /// Latest RTT sample
    latest_rtt: Duration,
    /// The minimum value observed over the lifetime of the flow
    min_rtt: Duration,
    /// When `min_rtt` was last refreshed
    min_rtt_time: Timestamp,
    /// An exponentially-weighted moving average
    smoothed_rtt: Duration,
}

impl RttEstimator {
    /// Creates a new `RttEstimator` with no samples recorded
    pub fn new(now: Timestamp) -> Self {
        Self {
            latest_rtt: Duration::ZERO,
            min_rtt: RTT_INF,
            min_rtt_time: now,
            smoothed_rtt: Duration::ZERO,
        }
    }

    /// Gets the latest round trip time sample
    #[inline]
    pub fn latest_rtt(&self) -> Duration {
        self.latest_rtt
    }

    /// Gets the minimum round trip time
    #[inline]
    pub fn min_rtt(&self) -> Duration {
        self.min_rtt
    }

    /// Gets the time `min_rtt` was last refreshed
    #[inline]
    pub fn min_rtt_time(&self) -> Timestamp {
        self.min_rtt_time
    }

    /// Gets the weighted average round trip time
    #[inline]
    pub fn smoothed_rtt(&self) -> Duration {
        self.smoothed_rtt
    }

    /// Updates the estimate with the given `rtt_sample`
    ///
    /// Zero samples are ignored.
    #[inline]
    pub fn update_rtt(&mut self, rtt_sample: Duration, now: Timestamp) {
        if rtt_sample.is_zero() {
            return;
        }

        let rtt = if rtt_sample <= PROCESSING_NOISE && !self.smoothed_rtt.is_zero() {
            self.smoothed_rtt
        } else {
            rtt_sample
        };

        self.latest_rtt = rtt;

        if self.smoothed_rtt.is_zero() {
            self.smoothed_rtt = rtt;
        } else {
            self.smoothed_rtt = (self.smoothed_rtt * 7 + rtt) / 8;
        }

        if rtt < self.min_rtt {
            self.min_rtt = rtt;
            self.min_rtt_time = now;
        }
    }

    /// True if `min_rtt` has not been refreshed within `timeout`
    #[inline]
    pub fn is_min_rtt_expired(&self, now: Timestamp, timeout: Duration) -> bool {
        now.saturating_duration_since(self.min_rtt_time) > timeout
    }

    /// Discards the current minimum so the next samples re-probe the base RTT
    ///
    /// The minimum is re-seeded from the latest sample rather than cleared,
    /// keeping `min_rtt <= latest_rtt` continuously true.
    #[inline]
    pub fn reset_min_rtt(&mut self, now: Timestamp) {
        self.min_rtt = if self.latest_rtt.is_zero() {
            RTT_INF
        } else {
            self.latest_rtt
        };
        self.min_rtt_time = now;
    }
}
