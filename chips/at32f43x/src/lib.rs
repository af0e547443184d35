// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Peripheral implementations for the Artery AT32F435/437 MCUs.

#![no_std]

pub mod chip;
pub mod crm;
pub mod scfg;
