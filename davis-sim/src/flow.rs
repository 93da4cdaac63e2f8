// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::packet::PacketQueue;
use davis_core::{recovery::CongestionController, time::Timestamp};
use std::time::Duration;

/// Per-flow bookkeeping maintained by the driver
#[derive(Debug)]
pub struct Flow<CC> {
    pub controller: CC,
    /// Packets sent but not yet arrived at the bottleneck
    pub network: PacketQueue,
    /// When the flow may transmit its next segment
    pub next_send_time: Timestamp,
    /// Segments somewhere on the path
    pub inflight: u32,
    /// Cumulative count of segments delivered through the bottleneck
    pub delivered: u64,
    /// Cumulative count of segments dropped
    pub losses: u64,
    /// Bytes sent during the current report interval
    pub bytes_sent: u64,
    /// The most recent round trip sample observed for this flow
    pub last_rtt: Duration,
}

impl<CC: CongestionController> Flow<CC> {
    pub fn new(controller: CC, start: Timestamp) -> Self {
        Self {
            controller,
            network: PacketQueue::new(),
            next_send_time: start,
            inflight: 0,
            delivered: 0,
            losses: 0,
            bytes_sent: 0,
            last_rtt: Duration::ZERO,
        }
    }

    /// True if the congestion window admits another segment
    pub fn can_send(&self) -> bool {
        self.inflight < self.controller.congestion_window()
    }
}
