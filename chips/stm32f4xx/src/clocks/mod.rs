// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

pub mod clocks;
pub mod phclk;
pub mod pll;

pub use crate::clocks::clocks::{Clocks, Stm32f4Clocks};
