// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Chip-specific flash code

/// Flash wait states for a specific chip.
pub trait FlashChipSpecific {
    /// Largest value the ACR.LATENCY field accepts on this chip
    const MAX_WAIT_STATES: u8;

    /// Wait states needed at `frequency_mhz`. This assumes the default
    /// 2.7-3.6V supply.
    fn get_number_wait_cycles_based_on_frequency(frequency_mhz: usize) -> u8;
}
