// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Specifications of the supported STM32F4 parts.

use super::clock_constants::{ClockConstants, PllConstants, SystemClockConstants};
use super::flash::FlashChipSpecific;

/// Everything the clock and flash drivers need to know about a part.
pub trait ChipSpecs: ClockConstants + FlashChipSpecific {}

impl<T: ClockConstants + FlashChipSpecific> ChipSpecs for T {}

// Wait states in 30 MHz steps, shared by the F429 and F446.
fn wait_states_30mhz_steps(frequency_mhz: usize) -> u8 {
    match frequency_mhz {
        0..=30 => 0,
        31..=60 => 1,
        61..=90 => 2,
        91..=120 => 3,
        121..=150 => 4,
        _ => 5,
    }
}

pub enum Stm32f401Specs {}

impl PllConstants for Stm32f401Specs {
    // STM32F401 supports frequency down to 24MHz
    const MIN_FREQ_MHZ: usize = 24;
}

impl SystemClockConstants for Stm32f401Specs {
    const APB1_FREQUENCY_LIMIT_MHZ: usize = 42;
    const SYS_CLOCK_FREQUENCY_LIMIT_MHZ: usize = 84;
}

impl FlashChipSpecific for Stm32f401Specs {
    const MAX_WAIT_STATES: u8 = 15;

    fn get_number_wait_cycles_based_on_frequency(frequency_mhz: usize) -> u8 {
        match frequency_mhz {
            0..=30 => 0,
            31..=64 => 1,
            _ => 2,
        }
    }
}

pub enum Stm32f412Specs {}

impl PllConstants for Stm32f412Specs {}

impl SystemClockConstants for Stm32f412Specs {
    const APB1_FREQUENCY_LIMIT_MHZ: usize = 50;
    const SYS_CLOCK_FREQUENCY_LIMIT_MHZ: usize = 100;
}

impl FlashChipSpecific for Stm32f412Specs {
    const MAX_WAIT_STATES: u8 = 15;

    fn get_number_wait_cycles_based_on_frequency(frequency_mhz: usize) -> u8 {
        match frequency_mhz {
            0..=30 => 0,
            31..=64 => 1,
            65..=90 => 2,
            _ => 3,
        }
    }
}

pub enum Stm32f429Specs {}

impl PllConstants for Stm32f429Specs {}

impl SystemClockConstants for Stm32f429Specs {
    const APB1_FREQUENCY_LIMIT_MHZ: usize = 45;
    const SYS_CLOCK_FREQUENCY_LIMIT_MHZ: usize = 180;
}

impl FlashChipSpecific for Stm32f429Specs {
    const MAX_WAIT_STATES: u8 = 15;

    fn get_number_wait_cycles_based_on_frequency(frequency_mhz: usize) -> u8 {
        wait_states_30mhz_steps(frequency_mhz)
    }
}

pub enum Stm32f446Specs {}

impl PllConstants for Stm32f446Specs {}

impl SystemClockConstants for Stm32f446Specs {
    const APB1_FREQUENCY_LIMIT_MHZ: usize = 45;
    const SYS_CLOCK_FREQUENCY_LIMIT_MHZ: usize = 180;
}

impl FlashChipSpecific for Stm32f446Specs {
    const MAX_WAIT_STATES: u8 = 15;

    fn get_number_wait_cycles_based_on_frequency(frequency_mhz: usize) -> u8 {
        wait_states_30mhz_steps(frequency_mhz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_per_part() {
        assert_eq!(84, Stm32f401Specs::APB2_FREQUENCY_LIMIT_MHZ);
        assert_eq!(100, Stm32f412Specs::APB2_FREQUENCY_LIMIT_MHZ);
        assert_eq!(90, Stm32f429Specs::APB2_FREQUENCY_LIMIT_MHZ);
        assert_eq!(24, Stm32f401Specs::MIN_FREQ_MHZ);
        assert_eq!(13, Stm32f446Specs::MIN_FREQ_MHZ);
    }

    #[test]
    fn wait_states_follow_frequency() {
        assert_eq!(0, Stm32f429Specs::get_number_wait_cycles_based_on_frequency(16));
        assert_eq!(5, Stm32f429Specs::get_number_wait_cycles_based_on_frequency(168));
        assert_eq!(2, Stm32f401Specs::get_number_wait_cycles_based_on_frequency(84));
        assert_eq!(1, Stm32f412Specs::get_number_wait_cycles_based_on_frequency(64));
        assert_eq!(3, Stm32f412Specs::get_number_wait_cycles_based_on_frequency(100));
    }
}
