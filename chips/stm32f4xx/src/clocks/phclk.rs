// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

use crate::clocks::Stm32f4Clocks;
use crate::rcc::{APBPrescaler, PeripheralClockType, Rcc, TimerPrescaler};
use kernel::platform::chip::ClockInterface;

/// Clock gate of one peripheral, handed to the peripheral drivers as their
/// `ClockInterface`.
pub struct PeripheralClock<'a> {
    pub clock: PeripheralClockType,
    clocks: &'a dyn Stm32f4Clocks,
}

impl<'a> PeripheralClock<'a> {
    pub const fn new(clock: PeripheralClockType, clocks: &'a dyn Stm32f4Clocks) -> Self {
        Self { clock, clocks }
    }

    /// Hold the peripheral in reset, then release it.
    pub fn reset(&self) {
        let rcc = self.clocks.get_rcc();
        rcc.peripheral_reset(self.clock, true);
        rcc.peripheral_reset(self.clock, false);
    }

    /// Keep the peripheral clocked while the core sleeps.
    pub fn low_power_enable(&self, enable: bool) {
        self.clocks
            .get_rcc()
            .peripheral_lp_clock_enable(self.clock, enable);
    }

    /// Kernel clock frequency of the peripheral in Hz.
    pub fn get_frequency(&self) -> u32 {
        #[inline(always)]
        fn tim_freq(rcc: &Rcc, hclk_freq: usize, prescaler: APBPrescaler) -> usize {
            // Reference Manual RM0090 section 6.2
            // When TIMPRE bit of the RCC_DCKCFGR register is reset, if APBx prescaler is 1, then
            // TIMxCLK = PCLKx, otherwise TIMxCLK = 2x PCLKx.
            // When TIMPRE bit in the RCC_DCKCFGR register is set, if APBx prescaler is 1,2 or 4,
            // then TIMxCLK = HCLK, otherwise TIMxCLK = 4x PCLKx.
            match rcc.get_timer_prescaler() {
                TimerPrescaler::Twice => match prescaler {
                    APBPrescaler::DivideBy1 | APBPrescaler::DivideBy2 => hclk_freq,
                    _ => hclk_freq / usize::from(prescaler) * 2,
                },
                TimerPrescaler::FourTimes => match prescaler {
                    APBPrescaler::DivideBy1 | APBPrescaler::DivideBy2 | APBPrescaler::DivideBy4 => {
                        hclk_freq
                    }
                    _ => hclk_freq / usize::from(prescaler) * 4,
                },
            }
        }
        let rcc = self.clocks.get_rcc();
        let hclk_freq = self.clocks.get_ahb_frequency();
        let prescaler = match self.clock {
            PeripheralClockType::AHB1(_)
            | PeripheralClockType::AHB2(_)
            | PeripheralClockType::AHB3(_) => return hclk_freq as u32,
            PeripheralClockType::APB1(_) => rcc.get_apb1_prescaler(),
            PeripheralClockType::APB2(_) => rcc.get_apb2_prescaler(),
        };
        if self.clock.is_timer() {
            tim_freq(rcc, hclk_freq, prescaler) as u32
        } else {
            (hclk_freq / usize::from(prescaler)) as u32
        }
    }
}

impl ClockInterface for PeripheralClock<'_> {
    fn is_enabled(&self) -> bool {
        self.clocks
            .get_rcc()
            .is_enabled_peripheral_clock(self.clock)
    }

    fn enable(&self) {
        self.clocks
            .get_rcc()
            .peripheral_clock_enable(self.clock, true);
    }

    fn disable(&self) {
        self.clocks
            .get_rcc()
            .peripheral_clock_enable(self.clock, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip_specific::Stm32f429Specs;
    use crate::clocks::clocks::tests::{bench, CFGR};
    use crate::clocks::Clocks;
    use crate::flash::Flash;
    use crate::rcc::{HCLK1, PCLK1, PCLK2};

    const AHB1RSTR: usize = 0x10;
    const AHB1ENR: usize = 0x30;
    const APB1LPENR: usize = 0x60;
    const DCKCFGR: usize = 0x8C;

    #[test]
    fn gates_and_frequencies() {
        let bench = bench();
        let flash = Flash::<Stm32f429Specs>::new(bench.flash_regs.registers());
        let clocks = Clocks::new(bench.rcc, &flash);

        let eth = PeripheralClock::new(PeripheralClockType::AHB1(HCLK1::ETHMAC), &clocks);
        assert!(!eth.is_enabled());
        eth.enable();
        assert!(eth.is_enabled());
        assert_eq!(1 << 25, bench.rcc_regs.peek(AHB1ENR));
        eth.reset();
        assert_eq!(0, bench.rcc_regs.peek(AHB1RSTR));
        eth.disable();
        assert_eq!(0, bench.rcc_regs.peek(AHB1ENR));

        let tim2 = PeripheralClock::new(PeripheralClockType::APB1(PCLK1::TIM2), &clocks);
        let can1 = PeripheralClock::new(PeripheralClockType::APB1(PCLK1::CAN1), &clocks);
        let adc1 = PeripheralClock::new(PeripheralClockType::APB2(PCLK2::ADC1), &clocks);
        can1.low_power_enable(true);
        assert_eq!(1 << 25, bench.rcc_regs.peek(APB1LPENR));

        // HSI 16 MHz, APB1 / 4, APB2 / 8
        bench.rcc_regs.poke(CFGR, (0b101 << 10) | (0b110 << 13));
        assert_eq!(16_000_000, eth.get_frequency());
        assert_eq!(4_000_000, can1.get_frequency());
        assert_eq!(8_000_000, tim2.get_frequency());
        assert_eq!(2_000_000, adc1.get_frequency());

        bench.rcc_regs.poke(DCKCFGR, 1 << 24);
        assert_eq!(16_000_000, tim2.get_frequency());
        let tim1 = PeripheralClock::new(PeripheralClockType::APB2(PCLK2::TIM1), &clocks);
        assert_eq!(8_000_000, tim1.get_frequency());
    }
}
