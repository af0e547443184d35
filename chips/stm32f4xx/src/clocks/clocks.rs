// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! STM32F4xx clock driver
//!
//! [`Clocks`] sits on top of [`Rcc`] and [`Flash`] and enforces what the
//! register level drivers cannot: the frequency limits of the part given by
//! `ChipSpecs`, and the ordering of the flash latency change around a system
//! clock switch.
//!
//! # Usage
//!
//! ```rust,ignore
//! // Assuming a STM32F429 chip. Change this to correspond to the chip model.
//! use stm32f4xx::chip_specific::Stm32f429Specs;
//! use stm32f4xx::rcc::{APBPrescaler, PllSource, SysClockSource};
//!
//! let clocks: Clocks<Stm32f429Specs> = Clocks::new(&rcc, &flash);
//!
//! // 168 MHz from the HSI. APB1 must stay at or below 45 MHz, APB2 at or below 90 MHz.
//! clocks.set_apb1_prescaler(APBPrescaler::DivideBy4)?;
//! clocks.set_apb2_prescaler(APBPrescaler::DivideBy2)?;
//! clocks.set_pll_frequency_mhz(PllSource::HSI, 168)?;
//! clocks.enable_pll()?;
//! clocks.set_sys_clock_source(SysClockSource::PLL)?;
//! ```

use crate::chip_specific::ChipSpecs as ChipSpecsTrait;
use crate::clocks::pll;
use crate::flash::Flash;
use crate::rcc::{
    AHBPrescaler, APBPrescaler, ClockFrequencies, HseMode, PllSource, Rcc, SysClockSource,
    HSI_FREQUENCY_HZ,
};

use core::cell::Cell;
use kernel::ErrorCode;

const HSI_FREQUENCY_MHZ: usize = HSI_FREQUENCY_HZ as usize / 1_000_000;

/// Main struct for configuring on-board clocks.
pub struct Clocks<'a, ChipSpecs> {
    rcc: &'a Rcc,
    flash: &'a Flash<ChipSpecs>,
    hse_frequency_mhz: Cell<Option<usize>>,
}

impl<'a, ChipSpecs: ChipSpecsTrait> Clocks<'a, ChipSpecs> {
    pub const fn new(rcc: &'a Rcc, flash: &'a Flash<ChipSpecs>) -> Self {
        Self {
            rcc,
            flash,
            hse_frequency_mhz: Cell::new(None),
        }
    }

    /* === Sources === */

    /// Start the HSE and record its frequency.
    ///
    /// # Errors:
    ///
    /// + [Err]\([ErrorCode::INVAL]\) if the frequency is outside 4-26 MHz for a crystal or 1-50
    ///   MHz for an external clock, or if `mode` is [HseMode::Off]
    /// + [Err]\([ErrorCode::BUSY]\) if the oscillator did not become ready. It is turned off again.
    pub fn enable_hse(&self, mode: HseMode, frequency_mhz: usize) -> Result<(), ErrorCode> {
        let range = match mode {
            HseMode::Off => return Err(ErrorCode::INVAL),
            HseMode::Crystal => 4..=26,
            HseMode::Bypass => 1..=50,
        };
        if !range.contains(&frequency_mhz) {
            return Err(ErrorCode::INVAL);
        }

        self.rcc.hse_config(mode);
        if let Err(e) = self.rcc.wait_for_hse_ready() {
            self.rcc.hse_config(HseMode::Off);
            return Err(e);
        }
        self.hse_frequency_mhz.set(Some(frequency_mhz));
        Ok(())
    }

    /// Stop the HSE.
    ///
    /// # Errors:
    ///
    /// + [Err]\([ErrorCode::FAIL]\) if the HSE drives the system clock directly or through the
    ///   running PLL
    pub fn disable_hse(&self) -> Result<(), ErrorCode> {
        if self.is_in_use(SysClockSource::HSE) {
            return Err(ErrorCode::FAIL);
        }
        self.rcc.hse_config(HseMode::Off);
        self.hse_frequency_mhz.set(None);
        Ok(())
    }

    /// Frequency of the HSE, if it was started through [Clocks::enable_hse].
    pub fn get_hse_frequency_mhz(&self) -> Option<usize> {
        self.hse_frequency_mhz.get()
    }

    pub fn enable_hsi(&self) -> Result<(), ErrorCode> {
        self.rcc.enable_hsi_clock();
        self.rcc.wait_for_hsi_ready()
    }

    /// Stop the HSI.
    ///
    /// # Errors:
    ///
    /// + [Err]\([ErrorCode::FAIL]\) if the HSI drives the system clock directly or through the
    ///   running PLL
    pub fn disable_hsi(&self) -> Result<(), ErrorCode> {
        if self.is_in_use(SysClockSource::HSI) {
            return Err(ErrorCode::FAIL);
        }
        self.rcc.disable_hsi_clock();
        Ok(())
    }

    fn is_in_use(&self, oscillator: SysClockSource) -> bool {
        let pll_source = match self.rcc.get_pll_clocks_source() {
            PllSource::HSI => SysClockSource::HSI,
            PllSource::HSE => SysClockSource::HSE,
        };
        match self.get_sys_clock_source() {
            SysClockSource::PLL => pll_source == oscillator,
            source => source == oscillator,
        }
    }

    fn source_frequency_mhz(&self, source: PllSource) -> Option<usize> {
        match source {
            PllSource::HSI => Some(HSI_FREQUENCY_MHZ),
            PllSource::HSE => self.hse_frequency_mhz.get(),
        }
    }

    /* === PLL === */

    /// Set the frequency of the PLL clock.
    ///
    /// # Parameters
    ///
    /// + pll_source: PLL source clock (HSI or HSE)
    ///
    /// + desired_frequency_mhz: the desired frequency in MHz. Supported values: 24-216MHz for
    ///   STM32F401 and 13-216MHz for all the other chips
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::INVAL]\): if the desired frequency can't be achieved
    /// + [Err]\([ErrorCode::FAIL]\): if the PLL clock is already enabled. It must be disabled
    ///   before. Also returned when the HSE is requested but was not started.
    pub fn set_pll_frequency_mhz(
        &self,
        pll_source: PllSource,
        desired_frequency_mhz: usize,
    ) -> Result<(), ErrorCode> {
        if self.rcc.is_enabled_pll_clock() {
            return Err(ErrorCode::FAIL);
        }
        let source_frequency_mhz = self.source_frequency_mhz(pll_source).ok_or(ErrorCode::FAIL)?;
        let config = pll::compute_pll_config::<ChipSpecs>(
            pll_source,
            source_frequency_mhz,
            desired_frequency_mhz,
        )?;
        self.rcc
            .pll_config(&config, (source_frequency_mhz * 1_000_000) as u32)
    }

    /// Start the PLL and wait for lock.
    ///
    /// # Errors
    ///
    /// + [Err]\([ErrorCode::FAIL]\): if the PLL input is not ready
    /// + [Err]\([ErrorCode::BUSY]\): if the PLL did not lock in time
    pub fn enable_pll(&self) -> Result<(), ErrorCode> {
        let source_ready = match self.rcc.get_pll_clocks_source() {
            PllSource::HSI => self.rcc.is_ready_hsi_clock(),
            PllSource::HSE => self.rcc.is_ready_hse_clock(),
        };
        if !source_ready {
            return Err(ErrorCode::FAIL);
        }
        self.rcc.enable_pll_clock()
    }

    /// Stop the PLL. Fails with `FAIL` while it drives the system clock.
    pub fn disable_pll(&self) -> Result<(), ErrorCode> {
        if self.get_sys_clock_source() == SysClockSource::PLL {
            return Err(ErrorCode::FAIL);
        }
        self.rcc.disable_pll_clock();
        Ok(())
    }

    /// PLL output frequency, or `None` while the PLL is off.
    pub fn get_pll_frequency_mhz(&self) -> Option<usize> {
        if !self.rcc.is_enabled_pll_clock() {
            return None;
        }
        Some(self.pll_output_frequency_mhz())
    }

    fn pll_output_frequency_mhz(&self) -> usize {
        self.rcc.get_pll_frequency_hz(self.hse_frequency_hz()) as usize / 1_000_000
    }

    fn hse_frequency_hz(&self) -> u32 {
        (self.hse_frequency_mhz.get().unwrap_or(0) * 1_000_000) as u32
    }

    /* === Bus prescalers === */

    /// Set the AHB prescaler
    ///
    /// AHB bus, core, memory, DMA, Cortex System timer and FCLK Cortex free-running clock
    /// frequencies are equal to the system clock frequency divided by the AHB prescaler.
    ///
    /// # Errors:
    ///
    /// + [Err]\([ErrorCode::FAIL]\) if changing the AHB prescaler doesn't preserve APB frequency
    ///   constraints
    /// + [Err]\([ErrorCode::BUSY]\) if changing the AHB prescaler took too long. Retry.
    pub fn set_ahb_prescaler(&self, prescaler: AHBPrescaler) -> Result<(), ErrorCode> {
        // Changing the AHB prescaler affects the APB frequencies
        let divider: usize = prescaler.into();
        let new_ahb_frequency = self.get_sys_clock_frequency_mhz() / divider;
        if !self.check_apb1_frequency_limit(new_ahb_frequency)
            || !self.check_apb2_frequency_limit(new_ahb_frequency)
        {
            return Err(ErrorCode::FAIL);
        }

        self.rcc.set_ahb_prescaler(prescaler);

        for _ in 0..16 {
            if self.get_ahb_prescaler() == prescaler {
                return Ok(());
            }
        }

        Err(ErrorCode::BUSY)
    }

    pub fn get_ahb_prescaler(&self) -> AHBPrescaler {
        self.rcc.get_ahb_prescaler()
    }

    pub fn get_ahb_frequency_mhz(&self) -> usize {
        let ahb_divider: usize = self.get_ahb_prescaler().into();
        self.get_sys_clock_frequency_mhz() / ahb_divider
    }

    // APB1 frequency must not be higher than the maximum allowable frequency. The
    // ahb_frequency_mhz is the hypothetical future frequency.
    fn check_apb1_frequency_limit(&self, ahb_frequency_mhz: usize) -> bool {
        ahb_frequency_mhz
            <= ChipSpecs::APB1_FREQUENCY_LIMIT_MHZ
                * Into::<usize>::into(self.rcc.get_apb1_prescaler())
    }

    /// Set the APB1 prescaler.
    ///
    /// # Errors:
    ///
    /// + [Err]\([ErrorCode::FAIL]\) if the desired prescaler would break the APB1 frequency limit
    /// + [Err]\([ErrorCode::BUSY]\) if setting the prescaler took too long. Retry.
    pub fn set_apb1_prescaler(&self, prescaler: APBPrescaler) -> Result<(), ErrorCode> {
        let ahb_frequency = self.get_ahb_frequency_mhz();
        let divider: usize = prescaler.into();
        if ahb_frequency / divider > ChipSpecs::APB1_FREQUENCY_LIMIT_MHZ {
            return Err(ErrorCode::FAIL);
        }

        self.rcc.set_apb1_prescaler(prescaler);

        for _ in 0..16 {
            if self.rcc.get_apb1_prescaler() == prescaler {
                return Ok(());
            }
        }

        Err(ErrorCode::BUSY)
    }

    pub fn get_apb1_prescaler(&self) -> APBPrescaler {
        self.rcc.get_apb1_prescaler()
    }

    pub fn get_apb1_frequency_mhz(&self) -> usize {
        let divider: usize = self.rcc.get_apb1_prescaler().into();
        self.get_ahb_frequency_mhz() / divider
    }

    fn check_apb2_frequency_limit(&self, ahb_frequency_mhz: usize) -> bool {
        ahb_frequency_mhz
            <= ChipSpecs::APB2_FREQUENCY_LIMIT_MHZ
                * Into::<usize>::into(self.rcc.get_apb2_prescaler())
    }

    /// Set the APB2 prescaler.
    ///
    /// # Errors:
    ///
    /// + [Err]\([ErrorCode::FAIL]\) if the desired prescaler would break the APB2 frequency limit
    /// + [Err]\([ErrorCode::BUSY]\) if setting the prescaler took too long. Retry.
    pub fn set_apb2_prescaler(&self, prescaler: APBPrescaler) -> Result<(), ErrorCode> {
        let current_ahb_frequency = self.get_ahb_frequency_mhz();
        let divider: usize = prescaler.into();
        if current_ahb_frequency / divider > ChipSpecs::APB2_FREQUENCY_LIMIT_MHZ {
            return Err(ErrorCode::FAIL);
        }

        self.rcc.set_apb2_prescaler(prescaler);

        for _ in 0..16 {
            if self.rcc.get_apb2_prescaler() == prescaler {
                return Ok(());
            }
        }

        Err(ErrorCode::BUSY)
    }

    pub fn get_apb2_prescaler(&self) -> APBPrescaler {
        self.rcc.get_apb2_prescaler()
    }

    pub fn get_apb2_frequency_mhz(&self) -> usize {
        let divider: usize = self.rcc.get_apb2_prescaler().into();
        self.get_ahb_frequency_mhz() / divider
    }

    /* === System clock === */

    /// Set the system clock source
    ///
    /// # Errors:
    ///
    /// + [Err]\([ErrorCode::FAIL]\) if the source is not ready.
    /// + [Err]\([ErrorCode::SIZE]\) if the source frequency surpasses the system clock frequency
    ///   limit, or the APB1 and APB2 limits are not satisfied.
    /// + [Err]\([ErrorCode::BUSY]\) if the flash latency or the source switching took too long.
    pub fn set_sys_clock_source(&self, source: SysClockSource) -> Result<(), ErrorCode> {
        if source == self.get_sys_clock_source() {
            return Ok(());
        }

        if !self.rcc.is_ready_sys_clock_source(source) {
            log::warn!("clocks: {:?} is not ready", source);
            return Err(ErrorCode::FAIL);
        }

        let current_frequency = self.get_sys_clock_frequency_mhz();
        let alternate_frequency = match source {
            SysClockSource::HSI => HSI_FREQUENCY_MHZ,
            SysClockSource::HSE => self.hse_frequency_mhz.get().ok_or(ErrorCode::FAIL)?,
            SysClockSource::PLL => self.pll_output_frequency_mhz(),
        };

        if alternate_frequency > ChipSpecs::SYS_CLOCK_FREQUENCY_LIMIT_MHZ {
            log::warn!(
                "clocks: {} MHz exceeds the {} MHz limit",
                alternate_frequency,
                ChipSpecs::SYS_CLOCK_FREQUENCY_LIMIT_MHZ
            );
            return Err(ErrorCode::SIZE);
        }

        let ahb_divider: usize = self.get_ahb_prescaler().into();
        let ahb_frequency = alternate_frequency / ahb_divider;
        if !self.check_apb1_frequency_limit(ahb_frequency)
            || !self.check_apb2_frequency_limit(ahb_frequency)
        {
            log::warn!("clocks: APB prescalers too small for {} MHz", ahb_frequency);
            return Err(ErrorCode::SIZE);
        }

        // When speeding up, the flash must be slowed down first. When slowing down, the flash
        // latency can only be reduced once the new clock is in place.
        if alternate_frequency > current_frequency {
            self.flash.set_latency(alternate_frequency)?;
        }
        self.rcc.set_sys_clock_source(source)?;
        if alternate_frequency < current_frequency {
            self.flash.set_latency(alternate_frequency)?;
        }

        Ok(())
    }

    pub fn get_sys_clock_source(&self) -> SysClockSource {
        self.rcc.get_sys_clock_source()
    }

    /// Current system clock frequency in MHz, computed from the RCC registers.
    pub fn get_sys_clock_frequency_mhz(&self) -> usize {
        match self.get_sys_clock_source() {
            SysClockSource::HSI => HSI_FREQUENCY_MHZ,
            SysClockSource::HSE => self.hse_frequency_mhz.get().unwrap_or(0),
            SysClockSource::PLL => self.pll_output_frequency_mhz(),
        }
    }

    /// SYSCLK, HCLK, PCLK1 and PCLK2 in Hz.
    pub fn get_clocks_freq(&self) -> ClockFrequencies {
        self.rcc.get_clocks_freq(self.hse_frequency_hz())
    }
}

/// Stm32f4Clocks trait
///
/// This can be used to control clocks without the need to keep a reference of the chip specific
/// Clocks struct, for instance by peripherals
pub trait Stm32f4Clocks {
    /// Get RCC instance
    fn get_rcc(&self) -> &Rcc;

    /// Get current AHB clock (HCLK) frequency in Hz
    fn get_ahb_frequency(&self) -> usize;
}

impl<'a, ChipSpecs: ChipSpecsTrait> Stm32f4Clocks for Clocks<'a, ChipSpecs> {
    fn get_rcc(&self) -> &'a Rcc {
        self.rcc
    }

    fn get_ahb_frequency(&self) -> usize {
        self.get_ahb_frequency_mhz() * 1_000_000
    }
}

#[cfg(test)]
pub(crate) mod tests {
    extern crate std;

    use super::*;
    use crate::chip_specific::{Stm32f401Specs, Stm32f429Specs};
    use crate::flash::FlashRegisters;
    use crate::rcc::RccRegisters;
    use kernel::utilities::emulated::EmulatedRegisters;

    pub(crate) const CR: usize = 0x00;
    const PLLCFGR: usize = 0x04;
    pub(crate) const CFGR: usize = 0x08;
    const ACR: usize = 0x00;

    const HSIRDY: u32 = 1 << 1;
    const HSERDY: u32 = 1 << 17;
    const PLLRDY: u32 = 1 << 25;
    const SWS_PLL: u32 = 0b10 << 2;

    pub(crate) struct Bench {
        pub rcc_regs: EmulatedRegisters<RccRegisters>,
        pub flash_regs: EmulatedRegisters<FlashRegisters>,
        pub rcc: &'static Rcc,
    }

    pub(crate) fn bench() -> Bench {
        let rcc_regs = EmulatedRegisters::new();
        let flash_regs = EmulatedRegisters::new();
        let rcc = std::boxed::Box::leak(std::boxed::Box::new(Rcc::new(rcc_regs.registers())));
        Bench {
            rcc_regs,
            flash_regs,
            rcc,
        }
    }

    fn clocks<Specs: ChipSpecsTrait + 'static>(bench: &Bench) -> Clocks<'static, Specs> {
        let flash = std::boxed::Box::leak(std::boxed::Box::new(Flash::<Specs>::new(
            bench.flash_regs.registers(),
        )));
        Clocks::new(bench.rcc, flash)
    }

    #[test]
    fn reset_state_runs_from_hsi() {
        let bench = bench();
        let clocks = clocks::<Stm32f429Specs>(&bench);
        assert_eq!(SysClockSource::HSI, clocks.get_sys_clock_source());
        assert_eq!(16, clocks.get_sys_clock_frequency_mhz());
        assert_eq!(16, clocks.get_apb1_frequency_mhz());
        assert_eq!(None, clocks.get_pll_frequency_mhz());
        assert_eq!(16_000_000, clocks.get_ahb_frequency());
    }

    #[test]
    fn switch_to_pll_orders_flash_latency() {
        let bench = bench();
        let clocks = clocks::<Stm32f429Specs>(&bench);

        assert_eq!(Ok(()), clocks.set_pll_frequency_mhz(PllSource::HSI, 168));
        assert_eq!((7 << 24) | (168 << 6) | 8, bench.rcc_regs.peek(PLLCFGR));

        // PLL not locked
        assert_eq!(
            Err(ErrorCode::FAIL),
            clocks.set_sys_clock_source(SysClockSource::PLL)
        );
        bench.rcc_regs.set_bits(CR, PLLRDY | HSIRDY);
        assert_eq!(Ok(()), clocks.enable_pll());
        assert_eq!(Some(168), clocks.get_pll_frequency_mhz());

        // APB1 and APB2 would run at 168 MHz
        assert_eq!(
            Err(ErrorCode::SIZE),
            clocks.set_sys_clock_source(SysClockSource::PLL)
        );
        assert_eq!(0, bench.flash_regs.peek(ACR));

        assert_eq!(Ok(()), clocks.set_apb1_prescaler(APBPrescaler::DivideBy4));
        assert_eq!(Ok(()), clocks.set_apb2_prescaler(APBPrescaler::DivideBy2));

        // The switch status never follows: latency was raised before the switch
        assert_eq!(
            Err(ErrorCode::BUSY),
            clocks.set_sys_clock_source(SysClockSource::PLL)
        );
        assert_eq!(5, bench.flash_regs.peek(ACR));

        bench.rcc_regs.set_bits(CFGR, SWS_PLL);
        assert_eq!(168, clocks.get_sys_clock_frequency_mhz());
        assert_eq!(42, clocks.get_apb1_frequency_mhz());
        assert_eq!(84, clocks.get_apb2_frequency_mhz());
        assert_eq!(168_000_000, clocks.get_clocks_freq().sysclk_hz);

        // A running PLL cannot be changed or stopped
        assert_eq!(
            Err(ErrorCode::FAIL),
            clocks.set_pll_frequency_mhz(PllSource::HSI, 100)
        );
        assert_eq!(Err(ErrorCode::FAIL), clocks.disable_pll());
        assert_eq!(Err(ErrorCode::FAIL), clocks.disable_hsi());
    }

    #[test]
    fn sys_clock_limit_is_per_part() {
        let bench = bench();
        let clocks = clocks::<Stm32f401Specs>(&bench);
        assert_eq!(Ok(()), clocks.set_pll_frequency_mhz(PllSource::HSI, 100));
        bench.rcc_regs.set_bits(CR, PLLRDY | HSIRDY);
        assert_eq!(Ok(()), clocks.enable_pll());
        assert_eq!(
            Err(ErrorCode::SIZE),
            clocks.set_sys_clock_source(SysClockSource::PLL)
        );
    }

    #[test]
    fn prescaler_limits() {
        let bench = bench();
        let clocks = clocks::<Stm32f429Specs>(&bench);
        bench.rcc_regs.poke(PLLCFGR, (7 << 24) | (180 << 6) | 8);
        bench.rcc_regs.set_bits(CR, (1 << 24) | PLLRDY);
        bench.rcc_regs.poke(CFGR, SWS_PLL | (0b101 << 10) | (0b100 << 13));
        assert_eq!(180, clocks.get_sys_clock_frequency_mhz());

        // 180 / 2 = 90 MHz exceeds the 45 MHz APB1 limit
        assert_eq!(
            Err(ErrorCode::FAIL),
            clocks.set_apb1_prescaler(APBPrescaler::DivideBy2)
        );
        // 180 / 1 = 180 MHz exceeds the 90 MHz APB2 limit
        assert_eq!(
            Err(ErrorCode::FAIL),
            clocks.set_apb2_prescaler(APBPrescaler::DivideBy1)
        );
        assert_eq!(Ok(()), clocks.set_ahb_prescaler(AHBPrescaler::DivideBy2));
        assert_eq!(90, clocks.get_ahb_frequency_mhz());
        assert_eq!(Ok(()), clocks.set_apb2_prescaler(APBPrescaler::DivideBy1));
        // Going back to HCLK = SYSCLK would break APB2
        assert_eq!(
            Err(ErrorCode::FAIL),
            clocks.set_ahb_prescaler(AHBPrescaler::DivideBy1)
        );
    }

    #[test]
    fn hse_bookkeeping() {
        let bench = bench();
        let clocks = clocks::<Stm32f429Specs>(&bench);
        assert_eq!(
            Err(ErrorCode::INVAL),
            clocks.enable_hse(HseMode::Crystal, 30)
        );
        assert_eq!(
            Err(ErrorCode::FAIL),
            clocks.set_pll_frequency_mhz(PllSource::HSE, 168)
        );

        assert_eq!(Err(ErrorCode::BUSY), clocks.enable_hse(HseMode::Crystal, 8));
        assert_eq!(0, bench.rcc_regs.peek(CR) & (1 << 16));
        assert_eq!(None, clocks.get_hse_frequency_mhz());

        bench.rcc_regs.set_bits(CR, HSERDY);
        assert_eq!(Ok(()), clocks.enable_hse(HseMode::Crystal, 8));
        assert_eq!(Some(8), clocks.get_hse_frequency_mhz());
        assert_eq!(Ok(()), clocks.set_pll_frequency_mhz(PllSource::HSE, 168));
        assert_eq!(Ok(()), clocks.disable_hse());
        assert_eq!(None, clocks.get_hse_frequency_mhz());
    }
}
