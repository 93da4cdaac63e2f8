// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{config::Config, flow::Flow};
use davis_core::recovery::{bandwidth::Bandwidth, CongestionController};
use std::{io, io::Write, time::Duration};

/// Writes the CSV header for the run
///
/// Single-flow runs use the reduced column set; multi-flow runs prefix each
/// record with the flow id and report per-interval byte counts.
pub fn write_header<W: Write>(out: &mut W, flows: usize) -> io::Result<()> {
    if flows == 1 {
        writeln!(out, "time,rtt,cwnd,rate,losses,max_rate,min_rtt,bdp,mode")
    } else {
        writeln!(
            out,
            "flow_id,time,rtt,cwnd,bytes_sent,losses,pacing_rate,min_rtt,bdp,mode"
        )
    }
}

/// Writes one record per flow for the report interval ending at `t`
pub fn write_records<W: Write, CC: CongestionController>(
    out: &mut W,
    config: &Config,
    t: Duration,
    flows: &[Flow<CC>],
    max_rate: &mut Bandwidth,
) -> io::Result<()> {
    if let [flow] = flows {
        let controller = &flow.controller;
        let rate = if flow.last_rtt.is_zero() {
            Bandwidth::ZERO
        } else {
            Bandwidth::new(
                controller.congestion_window() as u64 * config.mss as u64,
                flow.last_rtt,
            )
            .min(config.max_bw(t))
        };
        *max_rate = (*max_rate).max(rate);

        writeln!(
            out,
            "{:.6},{:.6},{},{},{},{},{:.6},{},{}",
            t.as_secs_f64(),
            flow.last_rtt.as_secs_f64(),
            controller.congestion_window(),
            rate.as_bytes_per_second(),
            flow.losses,
            max_rate.as_bytes_per_second(),
            controller.min_rtt().as_secs_f64(),
            controller.bdp(),
            u8::from(controller.mode()),
        )?;
        return Ok(());
    }

    for (flow_id, flow) in flows.iter().enumerate() {
        let controller = &flow.controller;
        writeln!(
            out,
            "{},{:.6},{:.6},{},{},{},{},{:.6},{},{}",
            flow_id,
            t.as_secs_f64(),
            flow.last_rtt.as_secs_f64(),
            controller.congestion_window(),
            flow.bytes_sent,
            flow.losses,
            controller.pacing_rate().as_bytes_per_second(),
            controller.min_rtt().as_secs_f64(),
            controller.bdp(),
            u8::from(controller.mode()),
        )?;
    }
    Ok(())
}
