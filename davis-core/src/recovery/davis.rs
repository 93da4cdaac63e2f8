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

mod gain;

pub use gain::GainModel;
use gain::Gain;

//
//          +---------------- loss during a gain phase ------------+
//          v                                                      |
//  RECOVER --> STABLE --> GAIN_1 --> GAIN_2 --> DRAIN --> STABLE --+--> ...
//
// Slow start runs a miniature GAIN_1/GAIN_2 cycle of its own until the
// delivery measurement stops growing, then drains.

/// RTT budgets for the fixed-length phases
const REC_RTTS: u32 = 1;
const DRAIN_RTTS: u32 = 2;
const GAIN_1_RTTS: u32 = 2;
const GAIN_2_RTTS: u32 = 2;

/// Tunable parameters, sanitized once at construction
#[derive(Clone, Debug)]
pub struct Config {
    /// Lower bound of the randomized STABLE duration, in RTTs
    pub stable_rtts_min: u32,
    /// Upper bound of the randomized STABLE duration, in RTTs
    pub stable_rtts_max: u32,
    /// How long `min_rtt` may go unrefreshed before a base-RTT re-probe is
    /// forced
    pub rtt_timeout: Duration,
    /// Additive-increase factor of the slow-start sub-cycle
    pub ss_inc_factor: u32,
    /// Hard cap on any probing window, as a multiple of the BDP estimate
    pub max_gain_factor: u32,
    /// The gain family used when leaving STABLE
    pub gain: GainModel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stable_rtts_min: 3,
            stable_rtts_max: 6,
            rtt_timeout: Duration::from_secs(10),
            ss_inc_factor: 2,
            max_gain_factor: 2,
            gain: GainModel::default(),
        }
    }
}

impl Config {
    /// Clamps all parameters into their legal ranges, reporting adjustments
    ///
    /// Invalid values never corrupt controller state; they are moved to the
    /// nearest legal value before the controller sees them.
    pub fn sanitize(mut self) -> Self {
        if self.stable_rtts_min < 1 {
            tracing::warn!(
                stable_rtts_min = self.stable_rtts_min,
                "stable_rtts_min must be at least 1"
            );
            self.stable_rtts_min = 1;
        }
        if self.stable_rtts_max < self.stable_rtts_min {
            tracing::warn!(
                stable_rtts_max = self.stable_rtts_max,
                stable_rtts_min = self.stable_rtts_min,
                "stable_rtts_max must not be below stable_rtts_min"
            );
            self.stable_rtts_max = self.stable_rtts_min;
        }
        if self.rtt_timeout.is_zero() {
            tracing::warn!("rtt_timeout must be non-zero");
            self.rtt_timeout = Config::default().rtt_timeout;
        }
        if self.ss_inc_factor < 1 {
            tracing::warn!(
                ss_inc_factor = self.ss_inc_factor,
                "ss_inc_factor must be at least 1"
            );
            self.ss_inc_factor = 1;
        }
        if self.max_gain_factor < 1 {
            tracing::warn!(
                max_gain_factor = self.max_gain_factor,
                "max_gain_factor must be at least 1"
            );
            self.max_gain_factor = 1;
        }
        self.gain.sanitize();
        self
    }
}

/// A congestion controller that estimates the path's bandwidth-delay product
/// from the delivered-segment counter and cycles through probe, measure,
/// drain and hold phases around that estimate.
#[derive(Clone, Debug)]
pub struct DavisCongestionController {
    phase: Phase,
    config: Config,
    mss: u16,
    cwnd: u32,
    ssthresh: u32,
    /// Latest bandwidth-delay-product estimate, in segments
    bdp: u32,
    /// The estimate produced by the previous measurement
    last_bdp: u32,
    /// The estimate the current slow-start cycle has to beat to keep probing
    ss_last_bdp: u32,
    /// The STABLE duration drawn for the current cycle, in RTTs
    stable_rtts: u32,
    gain: Gain,
    /// Delivered-counter snapshot taken when GAIN_2 was entered
    delivered_start: u64,
    delivered_start_time: Timestamp,
    rtt_estimator: RttEstimator,
    pacing_rate: Bandwidth,
}

impl DavisCongestionController {
    /// Constructs a new `DavisCongestionController`
    pub fn new(now: Timestamp, mss: u16, config: Config) -> Self {
        let config = config.sanitize();
        Self {
            phase: Phase::new(Mode::Gain1, now),
            mss,
            cwnd: MIN_CWND,
            ssthresh: MAX_CWND,
            bdp: MIN_CWND,
            last_bdp: 0,
            ss_last_bdp: 0,
            stable_rtts: config.stable_rtts_min,
            gain: Gain::new(config.gain.clone()),
            delivered_start: 0,
            delivered_start_time: now,
            rtt_estimator: RttEstimator::new(now),
            pacing_rate: Bandwidth::ZERO,
            config,
        }
    }

    /// The current additive-increase factor, if the factor gain family is in
    /// use
    pub fn inc_factor(&self) -> Option<u32> {
        self.gain.inc_factor()
    }

    /// The slow-start sub-cycle: probe, measure, and keep going while the
    /// measurement still grows
    fn slow_start(&mut self, now: Timestamp, delivered: u64, last_rtt: Duration) {
        match self.phase.mode() {
            Mode::Gain1 => {
                if self.phase.has_elapsed(now, GAIN_1_RTTS, last_rtt) {
                    self.enter_gain_2(now, delivered);
                }
            }
            Mode::Gain2 => {
                if self.phase.has_elapsed(now, GAIN_2_RTTS, last_rtt) {
                    self.measure_bdp(now, delivered);

                    if self.bdp > self.ss_last_bdp {
                        self.phase.transition_to(Mode::Gain1, now);
                        self.cwnd = self.slow_start_window();
                        self.ss_last_bdp = self.bdp;
                    } else {
                        // the path stopped delivering more; slow start is over
                        self.enter_drain(now);
                    }
                }
            }
            _ => self.enter_drain(now),
        }
    }

    /// Re-estimates the BDP from the delivery observed since GAIN_2 started
    ///
    /// Rounding up matters for fairness at small shares. A zero measurement
    /// interval keeps the previous estimate.
    fn measure_bdp(&mut self, now: Timestamp, delivered: u64) {
        let delivered = delivered.saturating_sub(self.delivered_start);
        let interval = now.saturating_duration_since(self.delivered_start_time);

        if interval.is_zero() {
            return;
        }

        let min_rtt = self.rtt_estimator.min_rtt();
        let bdp = delivered
            .saturating_mul(min_rtt.as_nanos() as u64)
            .div_ceil(interval.as_nanos() as u64);
        self.bdp = bdp.clamp(MIN_CWND as u64, MAX_CWND as u64) as u32;
    }

    /// The window used while probing: BDP plus the gain increment, capped at
    /// `max_gain_factor` times the BDP estimate
    fn gain_window(&self) -> u32 {
        let target = self.bdp.saturating_add(self.gain.increment(self.bdp));
        target
            .min(self.bdp.saturating_mul(self.config.max_gain_factor))
            .max(self.bdp + MIN_CWND)
    }

    /// The window used for slow-start up-transitions
    fn slow_start_window(&self) -> u32 {
        let gain = (self.bdp / self.config.ss_inc_factor).max(MIN_CWND);
        self.bdp.saturating_add(gain)
    }

    fn enter_recovery(&mut self, now: Timestamp) {
        self.phase.transition_to(Mode::Recover, now);
        self.cwnd = self.bdp;
        self.ssthresh = self.bdp;
    }

    fn enter_stable(&mut self, now: Timestamp, random_generator: &mut dyn random::Generator) {
        let from_drain = self.phase.mode() == Mode::Drain;
        self.phase.transition_to(Mode::Stable, now);

        self.cwnd = self.bdp;
        self.ssthresh = self.bdp;

        if from_drain {
            self.gain.on_enter_stable();
        }

        // decorrelate competing flows by randomizing the hold duration
        let spread = (self.config.stable_rtts_max - self.config.stable_rtts_min) as u64;
        self.stable_rtts = self.config.stable_rtts_min
            + random::gen_range_biased(random_generator, 0..=spread) as u32;
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

    fn enter_gain_2(&mut self, now: Timestamp, delivered: u64) {
        self.phase.transition_to(Mode::Gain2, now);
        self.delivered_start = delivered;
        self.delivered_start_time = now;
    }

    fn update_pacing_rate(&mut self) {
        let last_rtt = self.rtt_estimator.latest_rtt();
        self.pacing_rate = match self.phase.mode() {
            // let the window dictate the rate while probing
            Mode::Gain1 | Mode::Gain2 => Bandwidth::ZERO,
            _ if last_rtt.is_zero() => Bandwidth::ZERO,
            _ => Bandwidth::new(self.cwnd as u64 * self.mss as u64, last_rtt),
        };
    }
}

impl CongestionController for DavisCongestionController {
    fn on_ack(
        &mut self,
        now: Timestamp,
        rtt: Duration,
        delivered: u64,
        random_generator: &mut dyn random::Generator,
    ) {
        self.rtt_estimator.update_rtt(rtt, now);
        let last_rtt = self.rtt_estimator.latest_rtt();

        if self.is_in_slow_start() {
            self.slow_start(now, delivered, last_rtt);
        } else {
            match self.phase.mode() {
                Mode::Recover => {
                    if self.phase.has_elapsed(now, REC_RTTS, last_rtt) {
                        self.enter_stable(now, random_generator);
                    }
                }
                Mode::Stable => {
                    if self.phase.has_elapsed(now, self.stable_rtts, last_rtt) {
                        self.enter_gain_1(now);
                    }
                }
                Mode::Gain1 => {
                    if self.phase.has_elapsed(now, GAIN_1_RTTS, last_rtt) {
                        self.enter_gain_2(now, delivered);
                    } else {
                        self.cwnd = self.gain_window();
                    }
                }
                Mode::Gain2 => {
                    if self.phase.has_elapsed(now, GAIN_2_RTTS, last_rtt) {
                        self.last_bdp = self.bdp;
                        self.measure_bdp(now, delivered);
                        self.gain.on_bdp_update(self.bdp, self.last_bdp);

                        if self
                            .rtt_estimator
                            .is_min_rtt_expired(now, self.config.rtt_timeout)
                        {
                            // the queue hid the base RTT for too long;
                            // re-probe it during the drain
                            self.rtt_estimator.reset_min_rtt(now);
                        }

                        self.enter_drain(now);
                    }
                }
                Mode::Drain => {
                    if self.phase.has_elapsed(now, DRAIN_RTTS, last_rtt) {
                        self.enter_stable(now, random_generator);
                    }
                }
            }
        }

        self.cwnd = self.cwnd.clamp(MIN_CWND, MAX_CWND);
        self.update_pacing_rate();
    }

    fn on_loss(&mut self, now: Timestamp) {
        if self.is_in_slow_start() {
            // leave slow start; the drain refreshes the base RTT estimate
            self.enter_drain(now);
        } else if matches!(self.phase.mode(), Mode::Gain1 | Mode::Gain2) && self.gain.on_loss() {
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
