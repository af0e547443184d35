// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Peripheral IP shared by the STM32F4, GD32F4 and AT32F43x families.
//!
//! The three vendors license the same timer, 12-bit ADC, bxCAN and
//! DesignWare Ethernet MAC blocks and place them at the same offsets. The
//! drivers here take their register base and clock from the chip crate that
//! instantiates them.

#![no_std]

pub mod adc;
pub mod bxcan;
pub mod dwmac;
pub mod tim;
