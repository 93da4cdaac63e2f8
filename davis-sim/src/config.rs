// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use anyhow::{anyhow, Context, Error};
use davis_core::recovery::bandwidth::Bandwidth;
use num_rational::Ratio;
use std::{str::FromStr, time::Duration};
use structopt::StructOpt;

/// Which congestion controller drives the flows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerKind {
    Davis,
    Dumb,
}

impl FromStr for ControllerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "davis" => Ok(ControllerKind::Davis),
            "dumb" => Ok(ControllerKind::Dumb),
            _ => Err(anyhow!("unknown controller {s:?}")),
        }
    }
}

/// Which gain family the davis controller uses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GainModelKind {
    Factor,
    Reactive,
}

impl FromStr for GainModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "factor" => Ok(GainModelKind::Factor),
            "reactive" => Ok(GainModelKind::Reactive),
            _ => Err(anyhow!("unknown gain model {s:?}")),
        }
    }
}

/// A bandwidth argument such as `10Gbps`, `250Mbps`, `64Kbps` or `8bps`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rate(pub Bandwidth);

impl FromStr for Rate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        let (value, multiplier) = if let Some(value) = s.strip_suffix("Gbps") {
            (value, 1_000_000_000u64)
        } else if let Some(value) = s.strip_suffix("Mbps") {
            (value, 1_000_000)
        } else if let Some(value) = s.strip_suffix("Kbps") {
            (value, 1_000)
        } else if let Some(value) = s.strip_suffix("bps") {
            (value, 1)
        } else {
            return Err(anyhow!("missing bandwidth unit in {s:?}"));
        };

        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("invalid bandwidth value in {s:?}"))?;
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow!("invalid bandwidth value in {s:?}"));
        }

        Ok(Rate(Bandwidth::from_bits_per_second(
            (value * multiplier as f64) as u64,
        )))
    }
}

/// A scheduled change of a link parameter, written as `<at>:<value>`
/// (for example `30s:1Gbps`)
#[derive(Clone, Copy, Debug)]
pub struct Step<T> {
    pub at: Duration,
    pub value: T,
}

impl<T> FromStr for Step<T>
where
    T: FromStr,
    Error: From<T::Err>,
{
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let (at, value) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("expected <at>:<value> in {s:?}"))?;
        let at = humantime::parse_duration(at.trim())
            .with_context(|| format!("invalid step time in {s:?}"))?;
        let value = value.trim().parse().map_err(Error::from)?;
        Ok(Step { at, value })
    }
}

/// Returns the value of the latest step at or before `t`, if any
fn step_value<T: Copy>(steps: &[Step<T>], t: Duration) -> Option<T> {
    steps
        .iter()
        .filter(|step| step.at <= t)
        .max_by_key(|step| step.at)
        .map(|step| step.value)
}

pub(crate) fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}

#[derive(Clone, Debug, StructOpt)]
#[structopt(
    name = "davis-sim",
    about = "Discrete-event bottleneck simulator for the Dumb and Davis congestion controllers"
)]
pub struct Config {
    /// Congestion controller to run
    #[structopt(long, default_value = "davis", possible_values = &["davis", "dumb"])]
    pub controller: ControllerKind,

    /// Gain family used by the davis controller
    #[structopt(long, default_value = "factor", possible_values = &["factor", "reactive"])]
    pub gain_model: GainModelKind,

    /// Number of concurrent flows
    #[structopt(long, default_value = "1")]
    pub flows: usize,

    /// Segment size in bytes
    #[structopt(long, default_value = "512")]
    pub mss: u16,

    /// Bottleneck link rate
    #[structopt(long, default_value = "10Gbps")]
    pub bw: Rate,

    /// Bottleneck rate changes, as <at>:<rate>
    #[structopt(long = "bw-step")]
    pub bw_steps: Vec<Step<Rate>>,

    /// Base round trip times, cycled across flows
    #[structopt(long, default_value = "30ms", use_delimiter = true, parse(try_from_str = parse_duration))]
    pub rtt: Vec<Duration>,

    /// Bottleneck buffer size in segments (defaults to one BDP)
    #[structopt(long)]
    pub buffer: Option<u32>,

    /// Buffer size changes, as <at>:<segments>
    #[structopt(long = "buffer-step")]
    pub buffer_steps: Vec<Step<u32>>,

    /// Application send rate per flow (defaults to twice the link rate)
    #[structopt(long)]
    pub app_rate: Option<Rate>,

    /// Application rate changes, as <at>:<rate>
    #[structopt(long = "app-rate-step")]
    pub app_rate_steps: Vec<Step<Rate>>,

    /// Probability that an arriving segment is dropped
    #[structopt(long, default_value = "0")]
    pub loss_prob: f64,

    /// Simulated duration
    #[structopt(long, default_value = "60s", parse(try_from_str = parse_duration))]
    pub runtime: Duration,

    /// Interval between report records (defaults to runtime / 1000)
    #[structopt(long, parse(try_from_str = parse_duration))]
    pub report_interval: Option<Duration>,

    /// Delay between consecutive flow starts
    #[structopt(long, default_value = "0s", parse(try_from_str = parse_duration))]
    pub flow_stagger: Duration,

    /// Seed for all randomness in the run
    #[structopt(long, default_value = "42")]
    pub seed: u64,

    /// Suppress the progress meter on standard error
    #[structopt(long)]
    pub quiet: bool,

    /// STABLE hold duration for the dumb controller, in RTTs
    #[structopt(long, default_value = "32")]
    pub stable_rtts: u32,

    /// Smallest randomized STABLE hold for the davis controller, in RTTs
    #[structopt(long, default_value = "3")]
    pub stable_rtts_min: u32,

    /// Largest randomized STABLE hold for the davis controller, in RTTs
    #[structopt(long, default_value = "6")]
    pub stable_rtts_max: u32,

    /// Smallest additive-increase factor of the factor gain family
    #[structopt(long, default_value = "2")]
    pub min_inc_factor: u32,

    /// Largest additive-increase factor of the factor gain family
    #[structopt(long, default_value = "128")]
    pub max_inc_factor: u32,

    /// Additive-increase factor of the slow-start sub-cycle
    #[structopt(long, default_value = "2")]
    pub ss_inc_factor: u32,

    /// Reactivity of the reactive gain family, as a fraction
    #[structopt(long, default_value = "1/8")]
    pub reactivity: Ratio<i64>,

    /// Sensitivity of the reactive gain family, as a fraction
    #[structopt(long, default_value = "1/64")]
    pub sensitivity: Ratio<i64>,

    /// Smallest gain of the reactive gain family, in segments
    #[structopt(long, default_value = "4")]
    pub min_gain_cwnd: u32,

    /// Hard cap on any probing window, as a multiple of the BDP estimate
    #[structopt(long, default_value = "2")]
    pub max_gain_factor: u32,

    /// Probing gain fraction of the dumb controller
    #[structopt(long, default_value = "1/2")]
    pub gain_rate: Ratio<u64>,

    /// How long min_rtt may go unrefreshed before a base-RTT probe is forced
    #[structopt(long, default_value = "10s", parse(try_from_str = parse_duration))]
    pub rtt_timeout: Duration,
}

impl Config {
    /// Clamps the simulator-level parameters into their legal ranges,
    /// reporting adjustments
    ///
    /// Controller tunables are sanitized separately when each controller is
    /// constructed.
    pub fn sanitize(mut self) -> Self {
        if self.flows == 0 {
            tracing::warn!("flows must be at least 1");
            self.flows = 1;
        }
        if self.mss == 0 {
            tracing::warn!("mss must be non-zero");
            self.mss = 512;
        }
        if self.bw.0.is_zero() {
            tracing::warn!("bw must be non-zero");
            self.bw = Rate(Bandwidth::from_bits_per_second(10_000_000_000));
        }
        if !(0.0..1.0).contains(&self.loss_prob) {
            tracing::warn!(loss_prob = self.loss_prob, "loss_prob must be within [0, 1)");
            self.loss_prob = self.loss_prob.clamp(0.0, 1.0 - f64::EPSILON);
        }
        if self.rtt.is_empty() {
            self.rtt = vec![Duration::from_millis(30)];
        }
        for rtt in &mut self.rtt {
            if rtt.is_zero() {
                tracing::warn!("rtt must be non-zero");
                *rtt = Duration::from_millis(30);
            }
        }
        if self.runtime.is_zero() {
            tracing::warn!("runtime must be non-zero");
            self.runtime = Duration::from_secs(60);
        }
        if self
            .app_rate
            .map_or(false, |app_rate| app_rate.0.is_zero())
        {
            tracing::warn!("app_rate must be non-zero; using the default");
            self.app_rate = None;
        }
        if self
            .report_interval
            .map_or(false, |interval| interval.is_zero())
        {
            tracing::warn!("report_interval must be non-zero; using the default");
            self.report_interval = None;
        }
        self
    }

    /// The base round trip time of `flow` at simulated time `t`
    pub fn base_rtt(&self, _t: Duration, flow: usize) -> Duration {
        self.rtt[flow % self.rtt.len()]
    }

    /// The bottleneck service rate at simulated time `t`
    pub fn max_bw(&self, t: Duration) -> Bandwidth {
        step_value(&self.bw_steps, t).map_or(self.bw.0, |rate| rate.0)
    }

    /// The application send rate of `flow` at simulated time `t`
    pub fn app_rate(&self, t: Duration, _flow: usize) -> Bandwidth {
        if let Some(rate) = step_value(&self.app_rate_steps, t) {
            return rate.0;
        }
        self.app_rate
            .map_or_else(|| self.max_bw(t) * Ratio::new(2, 1), |rate| rate.0)
    }

    /// The bottleneck buffer size in segments at simulated time `t`
    pub fn buf_size(&self, t: Duration) -> usize {
        if let Some(segments) = step_value(&self.buffer_steps, t) {
            return segments as usize;
        }
        if let Some(segments) = self.buffer {
            return segments as usize;
        }
        // one bandwidth-delay product
        let bdp_bytes = self.max_bw(t) * self.base_rtt(t, 0);
        (bdp_bytes / self.mss as u64).max(1) as usize
    }

    /// The duration between report records at simulated time `t`
    pub fn report_interval(&self, _t: Duration) -> Duration {
        self.report_interval.unwrap_or(self.runtime / 1000)
    }

    /// When `flow` starts transmitting, relative to the start of the run
    pub fn flow_start_time(&self, flow: usize) -> Duration {
        self.flow_stagger * flow as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(args: &[&str]) -> Config {
        let mut full = vec!["davis-sim"];
        full.extend_from_slice(args);
        Config::from_iter(full)
    }

    #[test]
    fn rate_parsing() {
        assert_eq!(
            Bandwidth::from_bits_per_second(10_000_000_000),
            "10Gbps".parse::<Rate>().unwrap().0
        );
        assert_eq!(
            Bandwidth::from_bits_per_second(250_000_000),
            "250Mbps".parse::<Rate>().unwrap().0
        );
        assert_eq!(
            Bandwidth::from_bits_per_second(64_000),
            "64Kbps".parse::<Rate>().unwrap().0
        );
        assert_eq!(
            Bandwidth::from_bits_per_second(8),
            "8bps".parse::<Rate>().unwrap().0
        );

        assert!("10".parse::<Rate>().is_err());
        assert!("tenGbps".parse::<Rate>().is_err());
        assert!("-1Mbps".parse::<Rate>().is_err());
    }

    #[test]
    fn step_parsing() {
        let step: Step<Rate> = "30s:1Gbps".parse().unwrap();
        assert_eq!(Duration::from_secs(30), step.at);
        assert_eq!(Bandwidth::from_bits_per_second(1_000_000_000), step.value.0);

        let step: Step<u32> = "500ms:128".parse().unwrap();
        assert_eq!(Duration::from_millis(500), step.at);
        assert_eq!(128, step.value);

        assert!("30s".parse::<Step<u32>>().is_err());
    }

    #[test]
    fn schedules_are_piecewise_constant() {
        let config = config(&["--bw", "10Gbps", "--bw-step", "30s:1Gbps"]);

        assert_eq!(
            Bandwidth::from_bits_per_second(10_000_000_000),
            config.max_bw(Duration::from_secs(29))
        );
        assert_eq!(
            Bandwidth::from_bits_per_second(1_000_000_000),
            config.max_bw(Duration::from_secs(30))
        );
        assert_eq!(
            Bandwidth::from_bits_per_second(1_000_000_000),
            config.max_bw(Duration::from_secs(59))
        );
    }

    #[test]
    fn buffer_defaults_to_one_bdp() {
        let config = config(&["--bw", "10Gbps", "--rtt", "30ms", "--mss", "512"]);

        // 10 Gbit/s * 30 ms / 8 / 512 bytes
        assert_eq!(73_242, config.buf_size(Duration::ZERO));
    }

    #[test]
    fn app_rate_defaults_to_twice_the_link() {
        let config = config(&["--bw", "100Mbps"]);

        assert_eq!(
            Bandwidth::from_bits_per_second(200_000_000),
            config.app_rate(Duration::ZERO, 0)
        );
    }

    #[test]
    fn rtts_cycle_across_flows() {
        let config = config(&["--rtt", "30ms,40ms"]);

        assert_eq!(Duration::from_millis(30), config.base_rtt(Duration::ZERO, 0));
        assert_eq!(Duration::from_millis(40), config.base_rtt(Duration::ZERO, 1));
        assert_eq!(Duration::from_millis(30), config.base_rtt(Duration::ZERO, 2));
    }

    #[test]
    fn sanitize_clamps_invalid_values() {
        let mut config = config(&[]);
        config.flows = 0;
        config.mss = 0;
        config.loss_prob = 1.5;
        config.runtime = Duration::ZERO;
        let config = config.sanitize();

        assert_eq!(1, config.flows);
        assert_eq!(512, config.mss);
        assert!(config.loss_prob < 1.0);
        assert!(!config.runtime.is_zero());
    }

    #[test]
    fn flow_start_times_stagger() {
        let config = config(&["--flows", "2", "--flow-stagger", "5s"]);

        assert_eq!(Duration::ZERO, config.flow_start_time(0));
        assert_eq!(Duration::from_secs(5), config.flow_start_time(1));
    }
}
