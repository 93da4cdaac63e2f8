// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    random,
    recovery::{
        bandwidth::Bandwidth, congestion_controller::CongestionController, phase::Phase, Mode,
        RttEstimator, MAX_CWND, MIN_CWND,
    },
    time::Timestamp,
};
use core::time::Duration;
use num_rational::Ratio;

/// RTT budgets for the fixed-length phases
const REC_RTTS: u32 = 1;
const DRAIN_RTTS: u32 = 2;
const GAIN_1_RTTS: u32 = 2;
const GAIN_2_RTTS: u32 = 2;

/// Tunable parameters, sanitized once at construction
#[derive(Clone, Debug)]
pub struct Config {
    /// How long the window holds at the BDP estimate between probes, in RTTs
    pub stable_rtts: u32,
    /// The fraction of the BDP estimate added while probing
    pub gain_rate: Ratio<u64>,
    /// Hard cap on any probing window, as a multiple of the BDP estimate
    pub max_gain_factor: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stable_rtts: 32,
            gain_rate: Ratio::new_raw(1, 2),
            max_gain_factor: 2,
        }
    }
}

impl Config {
    /// Clamps all parameters into their legal ranges, reporting adjustments
    pub fn sanitize(mut self) -> Self {
        if self.stable_rtts < 1 {
            tracing::warn!(stable_rtts = self.stable_rtts, "stable_rtts must be at least 1");
            self.stable_rtts = 1;
        }
        if self.gain_rate.numer() == &0 {
            tracing::warn!("gain_rate must be non-zero");
            self.gain_rate = Config::default().gain_rate;
        }
        if self.max_gain_factor < 1 {
            tracing::warn!(
                max_gain_factor = self.max_gain_factor,
                "max_gain_factor must be at least 1"
            );
            self.max_gain_factor = 1;
        }
        self
    }
}

/// A congestion controller that estimates the path's bandwidth-delay product
/// from the fastest rate sample observed in each probing cycle.
///
/// The phase cycle is the same as [`DavisCongestionController`]'s; the two
/// differ in how they measure. Where Davis integrates the delivered counter
/// over a probing interval, Dumb keeps the maximum of per-ack `cwnd / rtt`
/// samples and re-arms the measurement at every GAIN_2 entry, so every cycle
/// re-probes the path from scratch.
///
/// [`DavisCongestionController`]: crate::recovery::DavisCongestionController
#[derive(Clone, Debug)]
pub struct DumbCongestionController {
    phase: Phase,
    config: Config,
    mss: u16,
    cwnd: u32,
    ssthresh: u32,
    /// Latest bandwidth-delay-product estimate, in segments
    bdp: u32,
    /// The fastest rate sample observed since the measurement was re-armed
    max_rate: Bandwidth,
    /// The largest RTT observed since the measurement was re-armed
    max_rtt: Duration,
    rtt_estimator: RttEstimator,
    pacing_rate: Bandwidth,
}

impl DumbCongestionController {
    /// Constructs a new `DumbCongestionController`
    pub fn new(now: Timestamp, mss: u16, config: Config) -> Self {
        Self {
            phase: Phase::new(Mode::Gain1, now),
            config: config.sanitize(),
            mss,
            cwnd: MIN_CWND,
            ssthresh: MAX_CWND,
            // start high so the first slow-start measurement never reads as
            // an immediate plateau
            bdp: MAX_CWND,
            max_rate: Bandwidth::ZERO,
            max_rtt: Duration::ZERO,
            rtt_estimator: RttEstimator::new(now),
            pacing_rate: Bandwidth::ZERO,
        }
    }

    /// The BDP implied by the current measurement, in segments
    fn measured_bdp(&self) -> u32 {
        let bytes = self.max_rate * self.rtt_estimator.min_rtt();
        let segments = bytes / self.mss as u64;
        segments.clamp(MIN_CWND as u64, MAX_CWND as u64) as u32
    }

    /// The window used while probing
    fn gain_window(&self) -> u32 {
        let gain = (self.config.gain_rate * self.bdp as u64).to_integer() as u32;
        let target = self.bdp.saturating_add(gain);
        target
            .min(self.bdp.saturating_mul(self.config.max_gain_factor))
            .max(self.bdp + MIN_CWND)
    }

    /// Grows the window once per RTT until the measurement plateaus or the
    /// queue visibly builds, then drains
    fn slow_start(&mut self, now: Timestamp, last_rtt: Duration) {
        if !self.phase.has_elapsed(now, 1, last_rtt) {
            return;
        }

        let new_bdp = self.measured_bdp();
        let queue_building = self.max_rtt > self.rtt_estimator.min_rtt() * 3 / 2;

        if queue_building || new_bdp == self.bdp {
            self.enter_drain(now);
        } else {
            self.bdp = new_bdp;
            self.phase.restart(now);
            self.cwnd = self.gain_window();
        }
    }

    fn enter_recovery(&mut self, now: Timestamp) {
        self.phase.transition_to(Mode::Recover, now);
        self.cwnd = self.bdp;
        self.ssthresh = self.bdp;
    }

    fn enter_stable(&mut self, now: Timestamp) {
        self.phase.transition_to(Mode::Stable, now);
        self.bdp = self.measured_bdp();
        self.cwnd = self.bdp;
        self.ssthresh = self.bdp;
    }

    fn enter_drain(&mut self, now: Timestamp) {
        self.phase.transition_to(Mode::Drain, now);
        self.cwnd = MIN_CWND;
        self.ssthresh = MIN_CWND;
    }

    fn enter_gain_1(&mut self, now: Timestamp) {
        self.phase.transition_to(Mode::Gain1, now);
        self.cwnd = self.gain_window();
    }

    /// Entering GAIN_2 re-arms the measurement so the estimate reflects only
    /// the probed window
    fn enter_gain_2(&mut self, now: Timestamp) {
        self.phase.transition_to(Mode::Gain2, now);
        self.max_rate = Bandwidth::ZERO;
        self.max_rtt = Duration::ZERO;
        self.rtt_estimator.reset_min_rtt(now);
    }

    fn update_pacing_rate(&mut self) {
        let last_rtt = self.rtt_estimator.latest_rtt();
        self.pacing_rate = match self.phase.mode() {
            Mode::Gain1 | Mode::Gain2 => Bandwidth::ZERO,
            _ if last_rtt.is_zero() => Bandwidth::ZERO,
            _ => Bandwidth::new(self.cwnd as u64 * self.mss as u64, last_rtt),
        };
    }
}

impl CongestionController for DumbCongestionController {
    fn on_ack(
        &mut self,
        now: Timestamp,
        rtt: Duration,
        _delivered: u64,
        _random_generator: &mut dyn random::Generator,
    ) {
        self.rtt_estimator.update_rtt(rtt, now);
        let last_rtt = self.rtt_estimator.latest_rtt();

        if !last_rtt.is_zero() {
            self.max_rtt = self.max_rtt.max(last_rtt);
            let sample = Bandwidth::new(self.cwnd as u64 * self.mss as u64, last_rtt);
            self.max_rate = self.max_rate.max(sample);
        }

        if self.is_in_slow_start() {
            self.slow_start(now, last_rtt);
        } else {
            match self.phase.mode() {
                Mode::Recover => {
                    if self.phase.has_elapsed(now, REC_RTTS, last_rtt) {
                        self.enter_stable(now);
                    }
                }
                Mode::Stable => {
                    if self.phase.has_elapsed(now, self.config.stable_rtts, last_rtt) {
                        self.enter_gain_1(now);
                    }
                }
                Mode::Gain1 => {
                    if self.phase.has_elapsed(now, GAIN_1_RTTS, last_rtt) {
                        self.enter_gain_2(now);
                    } else {
                        self.cwnd = self.gain_window();
                    }
                }
                Mode::Gain2 => {
                    if self.phase.has_elapsed(now, GAIN_2_RTTS, last_rtt) {
                        self.bdp = self.measured_bdp();
                        self.enter_drain(now);
                    }
                }
                Mode::Drain => {
                    if self.phase.has_elapsed(now, DRAIN_RTTS, last_rtt) {
                        self.enter_stable(now);
                    } else {
                        // keep refining while the queue empties and the
                        // minimum RTT settles
                        self.bdp = self.measured_bdp();
                    }
                }
            }
        }

        self.cwnd = self.cwnd.clamp(MIN_CWND, MAX_CWND);
        self.update_pacing_rate();
    }

    fn on_loss(&mut self, now: Timestamp) {
        if self.is_in_slow_start() {
            self.enter_drain(now);
        } else if matches!(self.phase.mode(), Mode::Gain1 | Mode::Gain2) {
            // back the estimate off and re-arm the measurement
            self.bdp = (self.bdp / 2).max(MIN_CWND);
            self.max_rate = Bandwidth::ZERO;
            self.max_rtt = Duration::ZERO;
            self.rtt_estimator.reset_min_rtt(now);
            self.enter_recovery(now);
        }
        // losses in STABLE, DRAIN and RECOVER are ignored so bursty loss
        // cannot collapse the window

        self.cwnd = self.cwnd.clamp(MIN_CWND, MAX_CWND);
        self.update_pacing_rate();
    }

    fn congestion_window(&self) -> u32 {
        self.cwnd
    }

    fn slow_start_threshold(&self) -> u32 {
        self.ssthresh
    }

    fn pacing_rate(&self) -> Bandwidth {
        self.pacing_rate
    }

    fn mode(&self) -> Mode {
        self.phase.mode()
    }

    fn bdp(&self) -> u32 {
        self.bdp
    }

    fn min_rtt(&self) -> Duration {
        self.rtt_estimator.min_rtt()
    }
}
