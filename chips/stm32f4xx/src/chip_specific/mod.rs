// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! This module contains all chip-specific code.
//!
//! Some models in the STM32F4 family may have additional features, while others not. Or they can
//! operate internally in different ways for the same feature. This module provides all the
//! chip-specific types and traits to be used by others modules in this crate or by other crates.

pub mod chip_specs;
pub mod clock_constants;
pub mod flash;

pub use chip_specs::{ChipSpecs, Stm32f401Specs, Stm32f412Specs, Stm32f429Specs, Stm32f446Specs};
