// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Peripheral implementations for the STM32F4xx MCU.
//!
//! STM32F446RE: <https://www.st.com/en/microcontrollers/stm32f4.html>

#![no_std]

pub mod chip;
pub mod chip_specific;
pub mod clocks;
pub mod flash;
pub mod rcc;
pub mod syscfg;
