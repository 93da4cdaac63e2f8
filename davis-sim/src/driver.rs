// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    config::{Config, GainModelKind},
    flow::Flow,
    packet::{Packet, PacketQueue},
    report,
};
use anyhow::Result;
use davis_core::{
    random,
    recovery::{
        bandwidth::Bandwidth, davis, dumb, CongestionController, DavisCongestionController,
        DumbCongestionController,
    },
    time::{Clock as _, NoopClock, Timestamp},
};
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
use std::io::Write;

/// Adapts the run's seeded rng stream to the controller randomness seam
struct ControllerRng(StdRng);

impl random::Generator for ControllerRng {
    fn random_fill(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }
}

/// Builds a controller from the simulator configuration
pub trait BuildController: CongestionController {
    fn build(config: &Config, now: Timestamp) -> Self;
}

impl BuildController for DavisCongestionController {
    fn build(config: &Config, now: Timestamp) -> Self {
        let gain = match config.gain_model {
            GainModelKind::Factor => davis::GainModel::Factor {
                min_inc_factor: config.min_inc_factor,
                max_inc_factor: config.max_inc_factor,
            },
            GainModelKind::Reactive => davis::GainModel::Reactive {
                reactivity: config.reactivity,
                sensitivity: config.sensitivity,
                min_gain_cwnd: config.min_gain_cwnd,
            },
        };

        DavisCongestionController::new(
            now,
            config.mss,
            davis::Config {
                stable_rtts_min: config.stable_rtts_min,
                stable_rtts_max: config.stable_rtts_max,
                rtt_timeout: config.rtt_timeout,
                ss_inc_factor: config.ss_inc_factor,
                max_gain_factor: config.max_gain_factor,
                gain,
            },
        )
    }
}

impl BuildController for DumbCongestionController {
    fn build(config: &Config, now: Timestamp) -> Self {
        DumbCongestionController::new(
            now,
            config.mss,
            dumb::Config {
                stable_rtts: config.stable_rtts,
                gain_rate: config.gain_rate,
                max_gain_factor: config.max_gain_factor,
            },
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Event {
    Send(usize),
    Departure,
    Arrival(usize),
}

/// The discrete-event loop driving every flow against one bottleneck link
///
/// Each iteration advances simulated time to the earliest candidate event.
/// Candidates are evaluated SEND first (per flow), then DEPARTURE, then
/// ARRIVAL (per flow); a later candidate wins only when strictly earlier, so
/// equal timestamps resolve in iteration order.
pub struct Driver<CC> {
    config: Config,
    epoch: Timestamp,
    now: Timestamp,
    end: Timestamp,
    flows: Vec<Flow<CC>>,
    bottleneck: PacketQueue,
    loss_sink: PacketQueue,
    next_departure: Option<Timestamp>,
    loss_rng: StdRng,
    controller_rng: ControllerRng,
    last_report: Timestamp,
    /// Running maximum of the single-flow rate column
    max_rate: Bandwidth,
    last_progress: u64,
}

impl<CC: BuildController> Driver<CC> {
    pub fn new(config: Config) -> Self {
        let config = config.sanitize();
        let epoch = NoopClock.get_time();

        let flows = (0..config.flows)
            .map(|id| {
                let start = epoch + config.flow_start_time(id);
                Flow::new(CC::build(&config, start), start)
            })
            .collect();

        Self {
            epoch,
            now: epoch,
            end: epoch + config.runtime,
            flows,
            bottleneck: PacketQueue::new(),
            loss_sink: PacketQueue::new(),
            next_departure: None,
            loss_rng: StdRng::seed_from_u64(config.seed),
            controller_rng: ControllerRng(StdRng::seed_from_u64(config.seed.wrapping_add(1))),
            last_report: epoch,
            max_rate: Bandwidth::ZERO,
            last_progress: 0,
            config,
        }
    }

    /// Runs the simulation to completion, writing records to `out`, and
    /// returns the final per-flow state
    pub fn run<W: Write>(mut self, out: &mut W) -> Result<Vec<Flow<CC>>> {
        report::write_header(out, self.flows.len())?;

        while let Some((time, event)) = self.next_event() {
            if time >= self.end {
                break;
            }
            if time > self.now {
                self.now = time;
            }

            match event {
                Event::Send(flow_id) => self.on_send(flow_id),
                Event::Departure => self.on_departure(),
                Event::Arrival(flow_id) => self.on_arrival(flow_id),
            }

            self.drain_loss_sink();
            self.maybe_report(out)?;
            self.progress();
        }

        if !self.config.quiet {
            eprintln!("\r100%");
        }

        Ok(self.flows)
    }

    fn next_event(&self) -> Option<(Timestamp, Event)> {
        let mut best: Option<(Timestamp, Event)> = None;

        for (id, flow) in self.flows.iter().enumerate() {
            if flow.can_send() {
                let time = self.now.max(flow.next_send_time);
                if best.map_or(true, |(earliest, _)| time < earliest) {
                    best = Some((time, Event::Send(id)));
                }
            }
        }

        if let Some(time) = self.next_departure {
            if !self.bottleneck.is_empty() && best.map_or(true, |(earliest, _)| time < earliest) {
                best = Some((time, Event::Departure));
            }
        }

        for (id, flow) in self.flows.iter().enumerate() {
            if let Some(packet) = flow.network.peek() {
                let sent_at = packet.send_time.saturating_duration_since(self.epoch);
                let time = packet.send_time + self.config.base_rtt(sent_at, id);
                if best.map_or(true, |(earliest, _)| time < earliest) {
                    best = Some((time, Event::Arrival(id)));
                }
            }
        }

        best
    }

    fn on_send(&mut self, flow_id: usize) {
        let t = self.now - self.epoch;
        let app_rate = self.config.app_rate(t, flow_id);
        let mss = self.config.mss;

        let flow = &mut self.flows[flow_id];
        flow.network.enqueue(Packet {
            flow_id,
            send_time: self.now,
        });
        flow.inflight += 1;
        flow.bytes_sent += mss as u64;

        let pacing_rate = flow.controller.pacing_rate();
        let send_rate = if pacing_rate.is_zero() {
            app_rate
        } else {
            app_rate.min(pacing_rate)
        };
        flow.next_send_time = self.now + mss as u64 / send_rate;
    }

    fn on_arrival(&mut self, flow_id: usize) {
        let t = self.now - self.epoch;
        let packet = self.flows[flow_id]
            .network
            .dequeue()
            .expect("arrival requires a queued packet");

        let buffer_full = self.bottleneck.len() >= self.config.buf_size(t);
        if buffer_full || self.loss_rng.gen_bool(self.config.loss_prob) {
            self.loss_sink.enqueue(packet);
            return;
        }

        if self.bottleneck.is_empty() {
            self.next_departure = Some(self.now + self.config.mss as u64 / self.config.max_bw(t));
        }
        self.bottleneck.enqueue(packet);
    }

    fn on_departure(&mut self) {
        let packet = self
            .bottleneck
            .dequeue()
            .expect("departure requires a queued packet");
        let rtt = self.now - packet.send_time;

        let flow = &mut self.flows[packet.flow_id];
        flow.inflight = flow.inflight.saturating_sub(1);
        flow.delivered += 1;
        flow.last_rtt = rtt;
        flow.controller
            .on_ack(self.now, rtt, flow.delivered, &mut self.controller_rng);

        let t = self.now - self.epoch;
        self.next_departure = if self.bottleneck.is_empty() {
            None
        } else {
            Some(self.now + self.config.mss as u64 / self.config.max_bw(t))
        };
    }

    fn drain_loss_sink(&mut self) {
        while let Some(packet) = self.loss_sink.dequeue() {
            let flow = &mut self.flows[packet.flow_id];
            flow.inflight = flow.inflight.saturating_sub(1);
            flow.losses += 1;
            flow.controller.on_loss(self.now);
        }
    }

    fn maybe_report<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let t = self.now - self.epoch;
        if self.now > self.last_report + self.config.report_interval(t) {
            report::write_records(out, &self.config, t, &self.flows, &mut self.max_rate)?;
            self.last_report = self.now;
            for flow in &mut self.flows {
                flow.bytes_sent = 0;
            }
        }
        Ok(())
    }

    fn progress(&mut self) {
        if self.config.quiet {
            return;
        }
        let elapsed = (self.now - self.epoch).as_secs_f64();
        let total = (self.end - self.epoch).as_secs_f64();
        let percent = (elapsed / total * 100.0) as u64;
        if percent != self.last_progress {
            self.last_progress = percent;
            eprint!("\r{percent:>3}%");
        }
    }
}
