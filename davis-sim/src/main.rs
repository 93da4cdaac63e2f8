// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use davis_core::recovery::{DavisCongestionController, DumbCongestionController};
use davis_sim::{
    config::{Config, ControllerKind},
    driver::Driver,
};
use structopt::StructOpt;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_args();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match config.controller {
        ControllerKind::Davis => {
            Driver::<DavisCongestionController>::new(config).run(&mut out)?;
        }
        ControllerKind::Dumb => {
            Driver::<DumbCongestionController>::new(config).run(&mut out)?;
        }
    }

    Ok(())
}
