// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

pub use congestion_controller::CongestionController;
pub use davis::DavisCongestionController;
pub use dumb::DumbCongestionController;
pub use rtt_estimator::*;

pub mod bandwidth;
pub mod congestion_controller;
pub mod davis;
pub mod dumb;
mod phase;
mod rtt_estimator;

/// The smallest congestion window either controller will produce (segments)
///
/// Four segments keeps an ack clock running against delayed-ack receivers.
pub const MIN_CWND: u32 = 4;

/// The largest congestion window either controller will produce (segments)
pub const MAX_CWND: u32 = 1 << 25;

/// The probing phase a controller is currently in
///
/// Slow start is not a phase of its own: a controller is in slow start
/// whenever `cwnd < ssthresh`, and runs a miniature `Gain1`/`Gain2` cycle
/// while it is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Hold the window at the minimum so the bottleneck queue empties
    Drain,
    /// Inflate the window above the BDP estimate to create measurable queue
    Gain1,
    /// Measure delivery over the inflated window to re-estimate the BDP
    Gain2,
    /// Hold the window at the BDP estimate
    Stable,
    /// Hold the window at the BDP estimate after a loss reaction
    Recover,
}

/// The wire encoding used in simulator records
///
/// The order is fixed for a release; reordering it breaks trace consumers.
impl From<Mode> for u8 {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Drain => 0,
            Mode::Gain1 => 1,
            Mode::Gain2 => 2,
            Mode::Stable => 3,
            Mode::Recover => 4,
        }
    }
}

impl core::fmt::Display for Mode {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let name = match self {
            Mode::Drain => "DRAIN",
            Mode::Gain1 => "GAIN_1",
            Mode::Gain2 => "GAIN_2",
            Mode::Stable => "STABLE",
            Mode::Recover => "RECOVER",
        };
        write!(f, "{name}")
    }
}
