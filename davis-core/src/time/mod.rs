// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Defines time related datatypes and functions

mod clock;
mod timestamp;

pub use clock::*;
pub use timestamp::Timestamp;

pub use core::time::Duration;
