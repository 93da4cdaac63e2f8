// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    random,
    recovery::{
        davis, dumb, CongestionController, DavisCongestionController, DumbCongestionController,
        MAX_CWND, MIN_CWND,
    },
    time::{Clock as _, NoopClock, Timestamp},
};
use bolero::{check, generator::*};
use core::time::Duration;

#[derive(Debug, TypeGenerator)]
enum Operation {
    IncrementTime {
        /// The milli-second value by which to increase the timestamp
        millis: u16,
    },
    AckReceived {
        #[generator(0..=2000)]
        rtt_millis: u16,
        #[generator(1..=64)]
        count: u8,
    },
    PacketLost,
}

struct Model<CC: CongestionController> {
    /// The congestion controller being fuzzed
    subject: CC,
    /// The flow's cumulative delivered-segment counter
    delivered: u64,
    /// A monotonically increasing timestamp
    timestamp: Timestamp,
}

impl<CC: CongestionController> Model<CC> {
    fn new(congestion_controller: CC) -> Self {
        Self {
            subject: congestion_controller,
            delivered: 0,
            timestamp: NoopClock.get_time(),
        }
    }

    fn apply(&mut self, operation: &Operation, rng: &mut dyn random::Generator) {
        match operation {
            Operation::IncrementTime { millis } => {
                self.timestamp += Duration::from_millis(*millis as u64);
            }
            Operation::AckReceived { rtt_millis, count } => {
                let rtt = Duration::from_millis(*rtt_millis as u64);
                for _ in 0..*count {
                    self.delivered += 1;
                    self.subject.on_ack(self.timestamp, rtt, self.delivered, rng);
                    self.invariants();
                }
            }
            Operation::PacketLost => {
                self.subject.on_loss(self.timestamp);
            }
        }

        self.invariants();
    }

    fn invariants(&self) {
        let cwnd = self.subject.congestion_window();
        assert!(
            (MIN_CWND..=MAX_CWND).contains(&cwnd),
            "cwnd {cwnd} out of bounds"
        );
        assert!(
            self.subject.bdp() >= MIN_CWND,
            "bdp {} below the minimum window",
            self.subject.bdp()
        );
    }
}

#[cfg_attr(miri, ignore)]
#[test]
fn davis_fuzz() {
    check!()
        .with_generator((gen(), gen::<Vec<Operation>>()))
        .for_each(|(seed, operations): &(u64, Vec<Operation>)| {
            let now = NoopClock.get_time();
            let mut model = Model::new(DavisCongestionController::new(
                now,
                1500,
                davis::Config::default(),
            ));
            let mut rng = random::testing::Generator(*seed);

            for operation in operations.iter() {
                model.apply(operation, &mut rng);
            }

            // inc_factor stays within its configured range
            if let Some(inc_factor) = model.subject.inc_factor() {
                assert!((2..=128).contains(&inc_factor));
            }
        });
}

#[cfg_attr(miri, ignore)]
#[test]
fn davis_reactive_fuzz() {
    check!()
        .with_generator((gen(), gen::<Vec<Operation>>()))
        .for_each(|(seed, operations): &(u64, Vec<Operation>)| {
            let now = NoopClock.get_time();
            let config = davis::Config {
                gain: davis::GainModel::Reactive {
                    reactivity: num_rational::Ratio::new(1, 8),
                    sensitivity: num_rational::Ratio::new(1, 64),
                    min_gain_cwnd: 4,
                },
                ..Default::default()
            };
            let mut model = Model::new(DavisCongestionController::new(now, 1500, config));
            let mut rng = random::testing::Generator(*seed);

            for operation in operations.iter() {
                model.apply(operation, &mut rng);
            }
        });
}

#[cfg_attr(miri, ignore)]
#[test]
fn dumb_fuzz() {
    check!()
        .with_generator((gen(), gen::<Vec<Operation>>()))
        .for_each(|(seed, operations): &(u64, Vec<Operation>)| {
            let now = NoopClock.get_time();
            let mut model = Model::new(DumbCongestionController::new(
                now,
                1500,
                dumb::Config::default(),
            ));
            let mut rng = random::testing::Generator(*seed);

            for operation in operations.iter() {
                model.apply(operation, &mut rng);
            }
        });
}
