// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Support crate for the peripheral drivers.
//!
//! The kernel crate holds the code every chip crate shares: the error type,
//! static register references, the register interface, bounded polling, the
//! compile-time configuration and the Hardware Interface Layer (HIL)
//! definitions implemented by the drivers.

#![no_std]

#[cfg(any(test, feature = "emulated-registers"))]
extern crate alloc;

pub mod config;
pub mod errorcode;
pub mod hil;
pub mod platform;
pub mod utilities;

pub use crate::errorcode::ErrorCode;
