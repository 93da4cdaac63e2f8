// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    random,
    recovery::{bandwidth::Bandwidth, Mode},
    time::Timestamp,
};
use core::{fmt::Debug, time::Duration};

/// An algorithm deciding, at each acknowledgement, how many segments a
/// sender may keep in flight.
///
/// Controllers are single-threaded and synchronous: every callback completes
/// before the caller observes the updated window, and "after k RTTs"
/// behavior is realized by comparing timestamps on each incoming ack rather
/// than by timers. Each flow owns its own controller.
pub trait CongestionController: 'static + Clone + Send + Debug {
    /// Invoked for each acknowledgement
    ///
    /// `rtt` is the sample measured for the acknowledged segment (zero if no
    /// sample is available) and `delivered` the flow's cumulative count of
    /// delivered segments. Randomness is injected so that flow behavior is
    /// reproducible under a seeded generator.
    ///
    /// The congestion window is within `[MIN_CWND, MAX_CWND]` on return.
    fn on_ack(
        &mut self,
        now: Timestamp,
        rtt: Duration,
        delivered: u64,
        random_generator: &mut dyn random::Generator,
    );

    /// Invoked for each segment declared lost
    fn on_loss(&mut self, now: Timestamp);

    /// Returns the current congestion window in segments
    fn congestion_window(&self) -> u32;

    /// Returns the current slow start threshold in segments
    fn slow_start_threshold(&self) -> u32;

    /// True if the controller is in slow start
    fn is_in_slow_start(&self) -> bool {
        self.congestion_window() < self.slow_start_threshold()
    }

    /// Returns the current pacing rate hint
    ///
    /// [`Bandwidth::ZERO`] means unrestricted: the congestion window alone
    /// dictates the send rate.
    fn pacing_rate(&self) -> Bandwidth;

    /// Returns the phase the controller is currently in
    fn mode(&self) -> Mode;

    /// Returns the latest bandwidth-delay-product estimate in segments
    fn bdp(&self) -> u32;

    /// Returns the minimum round trip time observed
    fn min_rtt(&self) -> Duration;
}

#[cfg(test)]
mod fuzz_target;
