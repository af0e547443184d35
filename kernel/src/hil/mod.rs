// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Public traits for interfaces between the peripheral drivers and their
//! users.

pub mod adc;
pub mod can;
pub mod ethernet;
