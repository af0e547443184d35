// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Clock and reset manager (CRM).
//!
//! The PLL reference `source / MS` must stay within 2..=16 MHz, the VCO `reference * NS`
//! within 500..=1200 MHz and the output is `VCO / FR`.
//! [`Crm::pll_parameter_calculate`] searches these factors for a target
//! frequency.
//!
//! [`Crm::set_sys_clock_source`] runs switches to a source above 108 MHz in
//! auto step mode.

use core::cell::Cell;

use kernel::config::CONFIG;
use kernel::platform::chip::ClockInterface;
use kernel::utilities::poll;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

register_structs! {
    pub CrmRegisters {
        /// clock control register
        (0x00 => ctrl: ReadWrite<u32, CTRL::Register>),
        /// PLL configuration register
        (0x04 => pllcfg: ReadWrite<u32, PLLCFG::Register>),
        /// clock configuration register
        (0x08 => cfg: ReadWrite<u32, CFG::Register>),
        /// clock interrupt register
        (0x0C => clkint: ReadWrite<u32, CLKINT::Register>),
        /// AHB peripheral reset registers 1 to 3
        (0x10 => ahbrst: [ReadWrite<u32>; 3]),
        (0x1C => _reserved0),
        /// APB1 peripheral reset register
        (0x20 => apb1rst: ReadWrite<u32>),
        /// APB2 peripheral reset register
        (0x24 => apb2rst: ReadWrite<u32>),
        (0x28 => _reserved1),
        /// AHB peripheral clock enable registers 1 to 3
        (0x30 => ahben: [ReadWrite<u32>; 3]),
        (0x3C => _reserved2),
        /// APB1 peripheral clock enable register
        (0x40 => apb1en: ReadWrite<u32>),
        /// APB2 peripheral clock enable register
        (0x44 => apb2en: ReadWrite<u32>),
        (0x48 => _reserved3),
        /// AHB peripheral clock enable in low power mode registers 1 to 3
        (0x50 => ahblpen: [ReadWrite<u32>; 3]),
        (0x5C => _reserved4),
        /// APB1 peripheral clock enable in low power mode register
        (0x60 => apb1lpen: ReadWrite<u32>),
        /// APB2 peripheral clock enable in low power mode register
        (0x64 => apb2lpen: ReadWrite<u32>),
        (0x68 => _reserved5),
        /// battery powered domain control register
        (0x70 => bpdc: ReadWrite<u32, BPDC::Register>),
        /// control/status register
        (0x74 => ctrlsts: ReadWrite<u32, CTRLSTS::Register>),
        (0x78 => _reserved6),
        /// miscellaneous register 1
        (0x88 => misc1: ReadWrite<u32, MISC1::Register>),
        (0x8C => _reserved7),
        /// miscellaneous register 2
        (0xA0 => misc2: ReadWrite<u32, MISC2::Register>),
        (0xA4 => @END),
    }
}

register_bitfields![u32,
    CTRL [
        PLLSTBL OFFSET(25) NUMBITS(1) [],
        PLLEN OFFSET(24) NUMBITS(1) [],
        /// clock failure detection enable
        CFDEN OFFSET(19) NUMBITS(1) [],
        HEXTBYPS OFFSET(18) NUMBITS(1) [],
        HEXTSTBL OFFSET(17) NUMBITS(1) [],
        HEXTEN OFFSET(16) NUMBITS(1) [],
        HICKCAL OFFSET(8) NUMBITS(8) [],
        HICKTRIM OFFSET(2) NUMBITS(6) [],
        HICKSTBL OFFSET(1) NUMBITS(1) [],
        HICKEN OFFSET(0) NUMBITS(1) []
    ],
    PLLCFG [
        PLLRCS OFFSET(22) NUMBITS(1) [
            HICK = 0,
            HEXT = 1
        ],
        PLL_FR OFFSET(16) NUMBITS(3) [],
        PLL_NS OFFSET(6) NUMBITS(9) [],
        PLL_MS OFFSET(0) NUMBITS(4) []
    ],
    CFG [
        CLKOUT2_SEL1 OFFSET(30) NUMBITS(2) [],
        CLKOUT2DIV1 OFFSET(27) NUMBITS(3) [],
        CLKOUT1DIV1 OFFSET(24) NUMBITS(3) [],
        CLKOUT1_SEL OFFSET(21) NUMBITS(2) [],
        ERTCDIV OFFSET(16) NUMBITS(5) [],
        APB2DIV OFFSET(13) NUMBITS(3) [],
        APB1DIV OFFSET(10) NUMBITS(3) [],
        AHBDIV OFFSET(4) NUMBITS(4) [],
        SCLKSTS OFFSET(2) NUMBITS(2) [],
        SCLKSEL OFFSET(0) NUMBITS(2) []
    ],
    CLKINT [
        CFDFC OFFSET(23) NUMBITS(1) [],
        /// stable flag clear bits
        STBLFC OFFSET(16) NUMBITS(5) [],
        /// stable interrupt enable bits
        STBLIEN OFFSET(8) NUMBITS(5) [],
        CFDF OFFSET(7) NUMBITS(1) [],
        /// stable flags
        STBLF OFFSET(0) NUMBITS(5) []
    ],
    BPDC [
        BPDRST OFFSET(16) NUMBITS(1) [],
        ERTCEN OFFSET(15) NUMBITS(1) [],
        ERTCSEL OFFSET(8) NUMBITS(2) [],
        LEXTBYPS OFFSET(2) NUMBITS(1) [],
        LEXTSTBL OFFSET(1) NUMBITS(1) [],
        LEXTEN OFFSET(0) NUMBITS(1) []
    ],
    CTRLSTS [
        LPRSTF OFFSET(31) NUMBITS(1) [],
        WWDTRSTF OFFSET(30) NUMBITS(1) [],
        WDTRSTF OFFSET(29) NUMBITS(1) [],
        SWRSTF OFFSET(28) NUMBITS(1) [],
        PORRSTF OFFSET(27) NUMBITS(1) [],
        NRSTF OFFSET(26) NUMBITS(1) [],
        RSTFC OFFSET(24) NUMBITS(1) [],
        LICKSTBL OFFSET(1) NUMBITS(1) [],
        LICKEN OFFSET(0) NUMBITS(1) []
    ],
    MISC1 [
        CLKOUT2_SEL2 OFFSET(16) NUMBITS(4) [],
        /// USB clock from the 48 MHz HICK instead of the PLL
        HICK_TO_USB OFFSET(13) NUMBITS(1) []
    ],
    MISC2 [
        USBDIV OFFSET(12) NUMBITS(4) [],
        AUTO_STEP_EN OFFSET(4) NUMBITS(2) []
    ]
];

pub const HICK_FREQUENCY_HZ: u32 = 8_000_000;
const DEFAULT_HEXT_FREQUENCY_HZ: u32 = 8_000_000;
/// System clock above which a switch is made in auto step mode.
pub const AUTO_STEP_THRESHOLD_HZ: u32 = 108_000_000;

const PLLCFG_RESET_VALUE: u32 = 0x0003_3002;
const CLKINT_CLEAR_ALL: u32 = 0x009F_0000;

const PLL_MS: core::ops::RangeInclusive<u32> = 1..=15;
const PLL_NS: core::ops::RangeInclusive<u32> = 31..=500;
const PLL_REFERENCE_HZ: core::ops::RangeInclusive<u64> = 2_000_000..=16_000_000;
const PLL_VCO_HZ: core::ops::RangeInclusive<u64> = 500_000_000..=1_200_000_000;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysClockSource {
    HICK = 0b00,
    HEXT = 0b01,
    PLL = 0b10,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllSource {
    HICK = 0,
    HEXT = 1,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OscillatorMode {
    Off,
    Crystal,
    Bypass,
}

/// PLL post divider
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllFr {
    DivideBy1 = 0,
    DivideBy2 = 1,
    DivideBy4 = 2,
    DivideBy8 = 3,
    DivideBy16 = 4,
    DivideBy32 = 5,
}

impl PllFr {
    const ALL: [PllFr; 6] = [
        PllFr::DivideBy1,
        PllFr::DivideBy2,
        PllFr::DivideBy4,
        PllFr::DivideBy8,
        PllFr::DivideBy16,
        PllFr::DivideBy32,
    ];

    pub fn divider(self) -> u32 {
        1 << self as u32
    }

    fn from_bits(bits: u32) -> Option<Self> {
        Self::ALL.get(bits as usize).copied()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllConfig {
    pub source: PllSource,
    pub ms: u8,
    pub ns: u16,
    pub fr: PllFr,
}

/// Result of [`Crm::pll_parameter_calculate`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllParameters {
    pub ms: u8,
    pub ns: u16,
    pub fr: PllFr,
    /// Output frequency these factors produce
    pub frequency_hz: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AhbDivider {
    DivideBy1 = 0b0000,
    DivideBy2 = 0b1000,
    DivideBy4 = 0b1001,
    DivideBy8 = 0b1010,
    DivideBy16 = 0b1011,
    DivideBy64 = 0b1100,
    DivideBy128 = 0b1101,
    DivideBy256 = 0b1110,
    DivideBy512 = 0b1111,
}

impl AhbDivider {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0b1000 => AhbDivider::DivideBy2,
            0b1001 => AhbDivider::DivideBy4,
            0b1010 => AhbDivider::DivideBy8,
            0b1011 => AhbDivider::DivideBy16,
            0b1100 => AhbDivider::DivideBy64,
            0b1101 => AhbDivider::DivideBy128,
            0b1110 => AhbDivider::DivideBy256,
            0b1111 => AhbDivider::DivideBy512,
            _ => AhbDivider::DivideBy1,
        }
    }

    pub fn divider(self) -> u32 {
        match self {
            AhbDivider::DivideBy1 => 1,
            AhbDivider::DivideBy2 => 2,
            AhbDivider::DivideBy4 => 4,
            AhbDivider::DivideBy8 => 8,
            AhbDivider::DivideBy16 => 16,
            AhbDivider::DivideBy64 => 64,
            AhbDivider::DivideBy128 => 128,
            AhbDivider::DivideBy256 => 256,
            AhbDivider::DivideBy512 => 512,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApbDivider {
    DivideBy1 = 0b000,
    DivideBy2 = 0b100,
    DivideBy4 = 0b101,
    DivideBy8 = 0b110,
    DivideBy16 = 0b111,
}

impl ApbDivider {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0b100 => ApbDivider::DivideBy2,
            0b101 => ApbDivider::DivideBy4,
            0b110 => ApbDivider::DivideBy8,
            0b111 => ApbDivider::DivideBy16,
            _ => ApbDivider::DivideBy1,
        }
    }

    pub fn divider(self) -> u32 {
        match self {
            ApbDivider::DivideBy1 => 1,
            ApbDivider::DivideBy2 => 2,
            ApbDivider::DivideBy4 => 4,
            ApbDivider::DivideBy8 => 8,
            ApbDivider::DivideBy16 => 16,
        }
    }
}

/// USB clock divider from the PLL output. Half steps are encoded below the
/// whole step that follows them.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbDivider {
    DivideBy1_5 = 0x0,
    DivideBy1 = 0x1,
    DivideBy2_5 = 0x2,
    DivideBy2 = 0x3,
    DivideBy3_5 = 0x4,
    DivideBy3 = 0x5,
    DivideBy4_5 = 0x6,
    DivideBy4 = 0x7,
    DivideBy5_5 = 0x8,
    DivideBy5 = 0x9,
    DivideBy6_5 = 0xA,
    DivideBy6 = 0xB,
    DivideBy7 = 0xC,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbClockSource {
    /// PLL output through [`UsbDivider`]
    Pll,
    /// 48 MHz internal oscillator
    Hick,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClkOut1Source {
    HICK = 0b00,
    LEXT = 0b01,
    HEXT = 0b10,
    PLL = 0b11,
}

/// CLKOUT2 sources. The first group is selected by CFG, the second through
/// MISC1 when CFG selects "second group".
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClkOut2Source {
    SCLK,
    HEXT,
    PLL,
    USB,
    ADC,
    HICK,
    LICK,
    LEXT,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClkOutDivider {
    DivideBy1 = 0b000,
    DivideBy2 = 0b100,
    DivideBy3 = 0b101,
    DivideBy4 = 0b110,
    DivideBy5 = 0b111,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErtcClockSource {
    LEXT,
    LICK,
    /// HEXT divided by 2..=31
    HEXT(u8),
}

/// Stable and clock failure interrupts. The discriminant is the flag bit in
/// CLKINT.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CrmInterrupt {
    LICKSTBL = 0,
    LEXTSTBL = 1,
    HICKSTBL = 2,
    HEXTSTBL = 3,
    PLLSTBL = 4,
    /// Clock failure detected. Always enabled with [`Crm::clock_failure_detection`].
    CFD = 7,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CrmFlag {
    HICKSTBL,
    HEXTSTBL,
    PLLSTBL,
    LEXTSTBL,
    LICKSTBL,
    NRST,
    PORRST,
    SWRST,
    WDTRST,
    WWDTRST,
    LPRST,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralClockType {
    AHB1(HCLK1),
    AHB2(HCLK2),
    AHB3(HCLK3),
    APB1(PCLK1),
    APB2(PCLK2),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HCLK1 {
    GPIOA = 0,
    GPIOB = 1,
    GPIOC = 2,
    GPIOD = 3,
    GPIOE = 4,
    GPIOF = 5,
    GPIOG = 6,
    GPIOH = 7,
    CRC = 12,
    EDMA = 21,
    DMA1 = 22,
    DMA2 = 24,
    EMAC = 25,
    EMACTX = 26,
    EMACRX = 27,
    EMACPTP = 28,
    OTGFS2 = 29,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HCLK2 {
    DVP = 0,
    OTGFS1 = 7,
    SDIO1 = 15,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HCLK3 {
    XMC = 0,
    QSPI1 = 1,
    QSPI2 = 14,
    SDIO2 = 15,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PCLK1 {
    TMR2 = 0,
    TMR3 = 1,
    TMR4 = 2,
    TMR5 = 3,
    TMR6 = 4,
    TMR7 = 5,
    TMR12 = 6,
    TMR13 = 7,
    TMR14 = 8,
    WWDT = 11,
    SPI2 = 14,
    SPI3 = 15,
    USART2 = 17,
    USART3 = 18,
    UART4 = 19,
    UART5 = 20,
    I2C1 = 21,
    I2C2 = 22,
    I2C3 = 23,
    CAN1 = 25,
    CAN2 = 26,
    PWC = 28,
    DAC = 29,
    UART7 = 30,
    UART8 = 31,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PCLK2 {
    TMR1 = 0,
    TMR8 = 1,
    USART1 = 4,
    USART6 = 5,
    ADC1 = 8,
    ADC2 = 9,
    ADC3 = 10,
    SPI1 = 12,
    SPI4 = 13,
    SCFG = 14,
    TMR9 = 16,
    TMR10 = 17,
    TMR11 = 18,
    TMR20 = 20,
    ACC = 29,
}

impl PeripheralClockType {
    fn mask(self) -> u32 {
        1 << match self {
            PeripheralClockType::AHB1(p) => p as u32,
            PeripheralClockType::AHB2(p) => p as u32,
            PeripheralClockType::AHB3(p) => p as u32,
            PeripheralClockType::APB1(p) => p as u32,
            PeripheralClockType::APB2(p) => p as u32,
        }
    }

    fn is_timer(self) -> bool {
        match self {
            PeripheralClockType::APB1(p) => (p as u32) <= PCLK1::TMR14 as u32,
            PeripheralClockType::APB2(p) => matches!(
                p,
                PCLK2::TMR1 | PCLK2::TMR8 | PCLK2::TMR9 | PCLK2::TMR10 | PCLK2::TMR11 | PCLK2::TMR20
            ),
            _ => false,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockFrequencies {
    pub sclk_hz: u32,
    pub ahb_hz: u32,
    pub apb1_hz: u32,
    pub apb2_hz: u32,
}

pub struct Crm {
    registers: StaticRef<CrmRegisters>,
    hext_frequency_hz: Cell<u32>,
}

impl Crm {
    pub const fn new(registers: StaticRef<CrmRegisters>) -> Self {
        Self {
            registers,
            hext_frequency_hz: Cell::new(DEFAULT_HEXT_FREQUENCY_HZ),
        }
    }

    /// Board HEXT frequency, 8 MHz unless set.
    pub fn set_hext_frequency(&self, hz: u32) {
        self.hext_frequency_hz.set(hz);
    }

    pub fn deinit(&self) -> Result<(), ErrorCode> {
        self.registers.ctrl.modify(CTRL::HICKEN::SET);
        self.wait_for_hick_ready()?;

        self.registers.cfg.set(0);
        self.registers
            .ctrl
            .modify(CTRL::HEXTEN::CLEAR + CTRL::CFDEN::CLEAR + CTRL::PLLEN::CLEAR);
        self.registers.ctrl.modify(CTRL::HEXTBYPS::CLEAR);
        self.registers.pllcfg.set(PLLCFG_RESET_VALUE);
        self.registers
            .misc1
            .modify(MISC1::CLKOUT2_SEL2::CLEAR + MISC1::HICK_TO_USB::CLEAR);
        self.registers
            .misc2
            .modify(MISC2::USBDIV::CLEAR + MISC2::AUTO_STEP_EN::CLEAR);
        self.registers.clkint.set(CLKINT_CLEAR_ALL);
        log::debug!("crm: clock tree back to reset configuration");
        Ok(())
    }

    /* === Oscillators === */

    pub fn hext_config(&self, mode: OscillatorMode) {
        self.registers
            .ctrl
            .modify(CTRL::HEXTEN::CLEAR + CTRL::HEXTBYPS::CLEAR);
        match mode {
            OscillatorMode::Off => {}
            OscillatorMode::Crystal => self.registers.ctrl.modify(CTRL::HEXTEN::SET),
            OscillatorMode::Bypass => self
                .registers
                .ctrl
                .modify(CTRL::HEXTBYPS::SET + CTRL::HEXTEN::SET),
        }
    }

    pub fn wait_for_hext_ready(&self) -> Result<(), ErrorCode> {
        poll::wait_until(CONFIG.hse_startup_timeout, || {
            self.registers.ctrl.is_set(CTRL::HEXTSTBL)
        })
        .inspect_err(|_| log::warn!("crm: HEXT not stable"))
    }

    pub fn hick_enable(&self, enable: bool) {
        self.registers.ctrl.modify(CTRL::HICKEN.val(enable as u32));
    }

    pub fn wait_for_hick_ready(&self) -> Result<(), ErrorCode> {
        poll::wait_until(CONFIG.hsi_startup_timeout, || {
            self.registers.ctrl.is_set(CTRL::HICKSTBL)
        })
        .inspect_err(|_| log::warn!("crm: HICK not stable"))
    }

    /// HICK trimming, 0..=63 with 32 as the factory centre.
    pub fn hick_trim_adjust(&self, trim: u8) -> Result<(), ErrorCode> {
        if trim > 0x3F {
            return Err(ErrorCode::INVAL);
        }
        self.registers.ctrl.modify(CTRL::HICKTRIM.val(trim as u32));
        Ok(())
    }

    pub fn lext_config(&self, mode: OscillatorMode) {
        self.registers
            .bpdc
            .modify(BPDC::LEXTEN::CLEAR + BPDC::LEXTBYPS::CLEAR);
        match mode {
            OscillatorMode::Off => {}
            OscillatorMode::Crystal => self.registers.bpdc.modify(BPDC::LEXTEN::SET),
            OscillatorMode::Bypass => self
                .registers
                .bpdc
                .modify(BPDC::LEXTBYPS::SET + BPDC::LEXTEN::SET),
        }
    }

    pub fn wait_for_lext_ready(&self) -> Result<(), ErrorCode> {
        poll::wait_until(CONFIG.lse_startup_timeout, || {
            self.registers.bpdc.is_set(BPDC::LEXTSTBL)
        })
        .inspect_err(|_| log::warn!("crm: LEXT not stable"))
    }

    pub fn lick_enable(&self, enable: bool) {
        self.registers
            .ctrlsts
            .modify(CTRLSTS::LICKEN.val(enable as u32));
    }

    pub fn wait_for_lick_ready(&self) -> Result<(), ErrorCode> {
        poll::wait_until(CONFIG.lsi_startup_timeout, || {
            self.registers.ctrlsts.is_set(CTRLSTS::LICKSTBL)
        })
        .inspect_err(|_| log::warn!("crm: LICK not stable"))
    }

    /* === PLL === */

    fn source_frequency_hz(&self, source: PllSource) -> u32 {
        match source {
            PllSource::HICK => HICK_FREQUENCY_HZ,
            PllSource::HEXT => self.hext_frequency_hz.get(),
        }
    }

    fn pll_output_hz(source_hz: u32, ms: u32, ns: u32, fr: PllFr) -> Option<u64> {
        if !PLL_MS.contains(&ms) || !PLL_NS.contains(&ns) {
            return None;
        }
        let reference = source_hz as u64 / ms as u64;
        let vco = source_hz as u64 * ns as u64 / ms as u64;
        if !PLL_REFERENCE_HZ.contains(&reference) || !PLL_VCO_HZ.contains(&vco) {
            return None;
        }
        Some(vco / fr.divider() as u64)
    }

    /// Search MS, NS and FR for `target_hz` from a `source_hz` input. Returns
    /// the exact factors when they exist, otherwise the closest frequency
    /// within the PLL limits.
    pub fn pll_parameter_calculate(
        source_hz: u32,
        target_hz: u32,
    ) -> Result<PllParameters, ErrorCode> {
        if source_hz == 0 {
            return Err(ErrorCode::INVAL);
        }
        let mut best: Option<(PllParameters, u64)> = None;
        for ms in PLL_MS {
            for fr in PllFr::ALL {
                // NS rounded to the nearest integer
                let scaled = target_hz as u64 * fr.divider() as u64 * ms as u64;
                let ns = (scaled + source_hz as u64 / 2) / source_hz as u64;
                let Ok(ns) = u32::try_from(ns) else {
                    continue;
                };
                let Some(frequency) = Self::pll_output_hz(source_hz, ms, ns, fr) else {
                    continue;
                };
                let error = frequency.abs_diff(target_hz as u64);
                let closer = match best {
                    Some((_, best_error)) => error < best_error,
                    None => true,
                };
                if closer {
                    let parameters = PllParameters {
                        ms: ms as u8,
                        ns: ns as u16,
                        fr,
                        frequency_hz: frequency as u32,
                    };
                    if error == 0 {
                        return Ok(parameters);
                    }
                    best = Some((parameters, error));
                }
            }
        }
        best.map(|(parameters, _)| parameters).ok_or_else(|| {
            log::warn!(
                "crm: no PLL factors reach {} Hz from {} Hz",
                target_hz,
                source_hz
            );
            ErrorCode::INVAL
        })
    }

    pub fn pll_config(&self, config: &PllConfig) -> Result<(), ErrorCode> {
        if self.registers.ctrl.is_set(CTRL::PLLEN) {
            log::warn!("crm: PLL must be off to be reconfigured");
            return Err(ErrorCode::FAIL);
        }
        let source_hz = self.source_frequency_hz(config.source);
        if Self::pll_output_hz(source_hz, config.ms as u32, config.ns as u32, config.fr).is_none() {
            log::warn!("crm: PLL factors out of range: {:?}", config);
            return Err(ErrorCode::INVAL);
        }
        self.registers.pllcfg.write(
            PLLCFG::PLLRCS.val(config.source as u32)
                + PLLCFG::PLL_MS.val(config.ms as u32)
                + PLLCFG::PLL_NS.val(config.ns as u32)
                + PLLCFG::PLL_FR.val(config.fr as u32),
        );
        Ok(())
    }

    pub fn get_pll_config(&self) -> PllConfig {
        let pllcfg = self.registers.pllcfg.extract();
        PllConfig {
            source: match pllcfg.read_as_enum(PLLCFG::PLLRCS) {
                Some(PLLCFG::PLLRCS::Value::HEXT) => PllSource::HEXT,
                _ => PllSource::HICK,
            },
            ms: pllcfg.read(PLLCFG::PLL_MS) as u8,
            ns: pllcfg.read(PLLCFG::PLL_NS) as u16,
            fr: PllFr::from_bits(pllcfg.read(PLLCFG::PLL_FR)).unwrap_or(PllFr::DivideBy32),
        }
    }

    pub fn get_pll_frequency_hz(&self) -> u32 {
        let config = self.get_pll_config();
        if config.ms == 0 {
            return 0;
        }
        let source_hz = self.source_frequency_hz(config.source) as u64;
        (source_hz * config.ns as u64 / config.ms as u64 / config.fr.divider() as u64) as u32
    }

    pub fn pll_enable(&self) -> Result<(), ErrorCode> {
        self.registers.ctrl.modify(CTRL::PLLEN::SET);
        poll::wait_until(CONFIG.pll_lock_timeout, || {
            self.registers.ctrl.is_set(CTRL::PLLSTBL)
        })
        .inspect_err(|_| log::warn!("crm: PLL did not lock"))
    }

    pub fn pll_disable(&self) {
        self.registers.ctrl.modify(CTRL::PLLEN::CLEAR);
    }

    /* === System clock === */

    pub fn auto_step_mode(&self, enable: bool) {
        self.registers.misc2.modify(if enable {
            MISC2::AUTO_STEP_EN.val(0b11)
        } else {
            MISC2::AUTO_STEP_EN::CLEAR
        });
    }

    pub fn is_auto_step_mode(&self) -> bool {
        self.registers.misc2.read(MISC2::AUTO_STEP_EN) == 0b11
    }

    pub fn get_sys_clock_source(&self) -> SysClockSource {
        match self.registers.cfg.read(CFG::SCLKSTS) {
            0b00 => SysClockSource::HICK,
            0b01 => SysClockSource::HEXT,
            _ => SysClockSource::PLL,
        }
    }

    fn frequency_of(&self, source: SysClockSource) -> u32 {
        match source {
            SysClockSource::HICK => HICK_FREQUENCY_HZ,
            SysClockSource::HEXT => self.hext_frequency_hz.get(),
            SysClockSource::PLL => self.get_pll_frequency_hz(),
        }
    }

    /// Switch the system clock and wait for SCLKSTS. Switches to a source
    /// above [`AUTO_STEP_THRESHOLD_HZ`] run in auto step mode.
    pub fn set_sys_clock_source(&self, source: SysClockSource) -> Result<(), ErrorCode> {
        let auto_step = self.frequency_of(source) > AUTO_STEP_THRESHOLD_HZ;
        if auto_step {
            self.auto_step_mode(true);
        }
        self.registers.cfg.modify(CFG::SCLKSEL.val(source as u32));
        let result = poll::wait_until(CONFIG.clock_switch_timeout, || {
            self.registers.cfg.read(CFG::SCLKSTS) == source as u32
        })
        .inspect_err(|_| log::warn!("crm: switch to {:?} timed out", source));
        if auto_step {
            self.auto_step_mode(false);
        }
        result
    }

    pub fn set_ahb_divider(&self, divider: AhbDivider) {
        self.registers.cfg.modify(CFG::AHBDIV.val(divider as u32));
    }

    pub fn get_ahb_divider(&self) -> AhbDivider {
        AhbDivider::from_bits(self.registers.cfg.read(CFG::AHBDIV))
    }

    pub fn set_apb1_divider(&self, divider: ApbDivider) {
        self.registers.cfg.modify(CFG::APB1DIV.val(divider as u32));
    }

    pub fn get_apb1_divider(&self) -> ApbDivider {
        ApbDivider::from_bits(self.registers.cfg.read(CFG::APB1DIV))
    }

    pub fn set_apb2_divider(&self, divider: ApbDivider) {
        self.registers.cfg.modify(CFG::APB2DIV.val(divider as u32));
    }

    pub fn get_apb2_divider(&self) -> ApbDivider {
        ApbDivider::from_bits(self.registers.cfg.read(CFG::APB2DIV))
    }

    pub fn get_clocks_freq(&self) -> ClockFrequencies {
        let sclk_hz = self.frequency_of(self.get_sys_clock_source());
        let ahb_hz = sclk_hz / self.get_ahb_divider().divider();
        ClockFrequencies {
            sclk_hz,
            ahb_hz,
            apb1_hz: ahb_hz / self.get_apb1_divider().divider(),
            apb2_hz: ahb_hz / self.get_apb2_divider().divider(),
        }
    }

    /* === USB clock === */

    pub fn usb_clock_source(&self, source: UsbClockSource) {
        self.registers
            .misc1
            .modify(MISC1::HICK_TO_USB.val((source == UsbClockSource::Hick) as u32));
    }

    pub fn usb_divider(&self, divider: UsbDivider) {
        self.registers
            .misc2
            .modify(MISC2::USBDIV.val(divider as u32));
    }

    /* === Peripheral gates === */

    fn enable_register(&self, clock: PeripheralClockType) -> &ReadWrite<u32> {
        match clock {
            PeripheralClockType::AHB1(_) => &self.registers.ahben[0],
            PeripheralClockType::AHB2(_) => &self.registers.ahben[1],
            PeripheralClockType::AHB3(_) => &self.registers.ahben[2],
            PeripheralClockType::APB1(_) => &self.registers.apb1en,
            PeripheralClockType::APB2(_) => &self.registers.apb2en,
        }
    }

    fn reset_register(&self, clock: PeripheralClockType) -> &ReadWrite<u32> {
        match clock {
            PeripheralClockType::AHB1(_) => &self.registers.ahbrst[0],
            PeripheralClockType::AHB2(_) => &self.registers.ahbrst[1],
            PeripheralClockType::AHB3(_) => &self.registers.ahbrst[2],
            PeripheralClockType::APB1(_) => &self.registers.apb1rst,
            PeripheralClockType::APB2(_) => &self.registers.apb2rst,
        }
    }

    fn low_power_register(&self, clock: PeripheralClockType) -> &ReadWrite<u32> {
        match clock {
            PeripheralClockType::AHB1(_) => &self.registers.ahblpen[0],
            PeripheralClockType::AHB2(_) => &self.registers.ahblpen[1],
            PeripheralClockType::AHB3(_) => &self.registers.ahblpen[2],
            PeripheralClockType::APB1(_) => &self.registers.apb1lpen,
            PeripheralClockType::APB2(_) => &self.registers.apb2lpen,
        }
    }

    fn write_mask(register: &ReadWrite<u32>, mask: u32, set: bool) {
        if set {
            register.set(register.get() | mask);
        } else {
            register.set(register.get() & !mask);
        }
    }

    pub fn peripheral_clock_enable(&self, clock: PeripheralClockType, enable: bool) {
        Self::write_mask(self.enable_register(clock), clock.mask(), enable);
    }

    pub fn is_enabled_peripheral_clock(&self, clock: PeripheralClockType) -> bool {
        self.enable_register(clock).get() & clock.mask() != 0
    }

    pub fn peripheral_reset(&self, clock: PeripheralClockType, reset: bool) {
        Self::write_mask(self.reset_register(clock), clock.mask(), reset);
    }

    pub fn peripheral_low_power_mode_enable(&self, clock: PeripheralClockType, enable: bool) {
        Self::write_mask(self.low_power_register(clock), clock.mask(), enable);
    }

    /* === Clock failure detection, outputs, ERTC === */

    pub fn clock_failure_detection(&self, enable: bool) {
        self.registers.ctrl.modify(CTRL::CFDEN.val(enable as u32));
    }

    pub fn clkout1_config(&self, source: ClkOut1Source, divider: ClkOutDivider) {
        self.registers.cfg.modify(
            CFG::CLKOUT1_SEL.val(source as u32) + CFG::CLKOUT1DIV1.val(divider as u32),
        );
    }

    pub fn clkout2_config(&self, source: ClkOut2Source, divider: ClkOutDivider) {
        let (sel1, sel2) = match source {
            ClkOut2Source::SCLK => (0b00, None),
            ClkOut2Source::HEXT => (0b10, None),
            ClkOut2Source::PLL => (0b11, None),
            ClkOut2Source::USB => (0b01, Some(0b0000)),
            ClkOut2Source::ADC => (0b01, Some(0b0001)),
            ClkOut2Source::HICK => (0b01, Some(0b0010)),
            ClkOut2Source::LICK => (0b01, Some(0b0011)),
            ClkOut2Source::LEXT => (0b01, Some(0b0100)),
        };
        if let Some(sel2) = sel2 {
            self.registers.misc1.modify(MISC1::CLKOUT2_SEL2.val(sel2));
        }
        self.registers
            .cfg
            .modify(CFG::CLKOUT2_SEL1.val(sel1) + CFG::CLKOUT2DIV1.val(divider as u32));
    }

    pub fn ertc_clock_config(&self, source: ErtcClockSource) -> Result<(), ErrorCode> {
        let ertcsel = match source {
            ErtcClockSource::LEXT => 0b01,
            ErtcClockSource::LICK => 0b10,
            ErtcClockSource::HEXT(divider) => {
                if !(2..=31).contains(&divider) {
                    return Err(ErrorCode::INVAL);
                }
                self.registers.cfg.modify(CFG::ERTCDIV.val(divider as u32));
                0b11
            }
        };
        self.registers.bpdc.modify(BPDC::ERTCSEL.val(ertcsel));
        Ok(())
    }

    pub fn ertc_clock_enable(&self, enable: bool) {
        self.registers.bpdc.modify(BPDC::ERTCEN.val(enable as u32));
    }

    /// Reset the battery powered domain.
    pub fn battery_powered_domain_reset(&self, reset: bool) {
        self.registers.bpdc.modify(BPDC::BPDRST.val(reset as u32));
    }

    /* === Interrupts and flags === */

    pub fn interrupt_enable(&self, interrupt: CrmInterrupt, enable: bool) -> Result<(), ErrorCode> {
        if interrupt == CrmInterrupt::CFD {
            return Err(ErrorCode::NOSUPPORT);
        }
        let mask = 1 << interrupt as u32;
        let enables = self.registers.clkint.read(CLKINT::STBLIEN);
        self.registers.clkint.write(CLKINT::STBLIEN.val(if enable {
            enables | mask
        } else {
            enables & !mask
        }));
        Ok(())
    }

    pub fn interrupt_flag_get(&self, interrupt: CrmInterrupt) -> bool {
        self.registers.clkint.get() & (1 << interrupt as u32) != 0
    }

    pub fn interrupt_flag_clear(&self, interrupt: CrmInterrupt) {
        let enables = CLKINT::STBLIEN.val(self.registers.clkint.read(CLKINT::STBLIEN));
        let clear = match interrupt {
            CrmInterrupt::CFD => CLKINT::CFDFC::SET,
            _ => CLKINT::STBLFC.val(1 << interrupt as u32),
        };
        self.registers.clkint.write(enables + clear);
    }

    pub fn flag_get(&self, flag: CrmFlag) -> bool {
        let ctrl = &self.registers.ctrl;
        let ctrlsts = &self.registers.ctrlsts;
        match flag {
            CrmFlag::HICKSTBL => ctrl.is_set(CTRL::HICKSTBL),
            CrmFlag::HEXTSTBL => ctrl.is_set(CTRL::HEXTSTBL),
            CrmFlag::PLLSTBL => ctrl.is_set(CTRL::PLLSTBL),
            CrmFlag::LEXTSTBL => self.registers.bpdc.is_set(BPDC::LEXTSTBL),
            CrmFlag::LICKSTBL => ctrlsts.is_set(CTRLSTS::LICKSTBL),
            CrmFlag::NRST => ctrlsts.is_set(CTRLSTS::NRSTF),
            CrmFlag::PORRST => ctrlsts.is_set(CTRLSTS::PORRSTF),
            CrmFlag::SWRST => ctrlsts.is_set(CTRLSTS::SWRSTF),
            CrmFlag::WDTRST => ctrlsts.is_set(CTRLSTS::WDTRSTF),
            CrmFlag::WWDTRST => ctrlsts.is_set(CTRLSTS::WWDTRSTF),
            CrmFlag::LPRST => ctrlsts.is_set(CTRLSTS::LPRSTF),
        }
    }

    pub fn reset_flags_clear(&self) {
        self.registers.ctrlsts.modify(CTRLSTS::RSTFC::SET);
    }
}

pub struct PeripheralClock<'a> {
    pub clock: PeripheralClockType,
    crm: &'a Crm,
}

impl<'a> PeripheralClock<'a> {
    pub const fn new(clock: PeripheralClockType, crm: &'a Crm) -> Self {
        Self { clock, crm }
    }

    pub fn reset(&self) {
        self.crm.peripheral_reset(self.clock, true);
        self.crm.peripheral_reset(self.clock, false);
    }

    /// In Hz. Timers on an APB bus with a divider above 1 run at twice the
    /// bus clock.
    pub fn get_frequency(&self) -> u32 {
        let clocks = self.crm.get_clocks_freq();
        let (bus_hz, divider) = match self.clock {
            PeripheralClockType::APB1(_) => (clocks.apb1_hz, self.crm.get_apb1_divider()),
            PeripheralClockType::APB2(_) => (clocks.apb2_hz, self.crm.get_apb2_divider()),
            _ => return clocks.ahb_hz,
        };
        if self.clock.is_timer() && divider != ApbDivider::DivideBy1 {
            bus_hz * 2
        } else {
            bus_hz
        }
    }
}

impl ClockInterface for PeripheralClock<'_> {
    fn is_enabled(&self) -> bool {
        self.crm.is_enabled_peripheral_clock(self.clock)
    }

    fn enable(&self) {
        self.crm.peripheral_clock_enable(self.clock, true);
    }

    fn disable(&self) {
        self.crm.peripheral_clock_enable(self.clock, false);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use kernel::utilities::emulated::EmulatedRegisters;

    const CTRL: usize = 0x00;
    const PLLCFG: usize = 0x04;
    const CFG: usize = 0x08;
    const CLKINT: usize = 0x0C;
    const APB1EN: usize = 0x40;
    const APB2RST: usize = 0x24;
    const APB2EN: usize = 0x44;
    const APB1LPEN: usize = 0x60;
    const BPDC: usize = 0x70;
    const CTRLSTS: usize = 0x74;
    const MISC1: usize = 0x88;
    const MISC2: usize = 0xA0;

    pub(crate) fn crm() -> (EmulatedRegisters<CrmRegisters>, Crm) {
        let emu = EmulatedRegisters::new();
        let crm = Crm::new(emu.registers());
        (emu, crm)
    }

    // 8 MHz / 1 * 72 / 2 = 288 MHz
    const PLL_288MHZ: PllConfig = PllConfig {
        source: PllSource::HICK,
        ms: 1,
        ns: 72,
        fr: PllFr::DivideBy2,
    };

    #[test]
    fn pll_parameter_search() {
        assert_eq!(
            Ok(PllParameters {
                ms: 1,
                ns: 72,
                fr: PllFr::DivideBy2,
                frequency_hz: 288_000_000,
            }),
            Crm::pll_parameter_calculate(8_000_000, 288_000_000)
        );
        assert_eq!(
            Ok(PllParameters {
                ms: 3,
                ns: 200,
                fr: PllFr::DivideBy4,
                frequency_hz: 200_000_000,
            }),
            Crm::pll_parameter_calculate(12_000_000, 200_000_000)
        );
        // no exact factors, closest is 4 MHz * 247 / 8
        assert_eq!(
            Ok(PllParameters {
                ms: 2,
                ns: 247,
                fr: PllFr::DivideBy8,
                frequency_hz: 123_500_000,
            }),
            Crm::pll_parameter_calculate(8_000_000, 123_456_789)
        );
        // below VCO minimum / 32
        assert_eq!(
            Err(ErrorCode::INVAL),
            Crm::pll_parameter_calculate(8_000_000, 1_000_000)
        );
        assert_eq!(
            Err(ErrorCode::INVAL),
            Crm::pll_parameter_calculate(0, 100_000_000)
        );
    }

    #[test]
    fn pll_ranges() {
        let (emu, crm) = crm();
        // VCO 8 MHz * 62 is below 500 MHz
        assert_eq!(
            Err(ErrorCode::INVAL),
            crm.pll_config(&PllConfig { ns: 62, ..PLL_288MHZ })
        );
        assert_eq!(
            Err(ErrorCode::INVAL),
            crm.pll_config(&PllConfig { ns: 501, ms: 4, ..PLL_288MHZ })
        );
        // reference 8 MHz / 5 is below 2 MHz
        assert_eq!(
            Err(ErrorCode::INVAL),
            crm.pll_config(&PllConfig { ms: 5, ..PLL_288MHZ })
        );
        assert_eq!(
            Err(ErrorCode::INVAL),
            crm.pll_config(&PllConfig { ms: 0, ..PLL_288MHZ })
        );

        assert_eq!(Ok(()), crm.pll_config(&PLL_288MHZ));
        assert_eq!((1 << 16) | (72 << 6) | 1, emu.peek(PLLCFG));
        assert_eq!(PLL_288MHZ, crm.get_pll_config());
        assert_eq!(288_000_000, crm.get_pll_frequency_hz());

        emu.set_bits(CTRL, 1 << 24);
        assert_eq!(Err(ErrorCode::FAIL), crm.pll_config(&PLL_288MHZ));
    }

    #[test]
    fn reset_pll_configuration_decodes() {
        let (emu, crm) = crm();
        emu.poke(PLLCFG, 0x0003_3002);
        assert_eq!(
            PllConfig {
                source: PllSource::HICK,
                ms: 2,
                ns: 192,
                fr: PllFr::DivideBy8,
            },
            crm.get_pll_config()
        );
        assert_eq!(96_000_000, crm.get_pll_frequency_hz());
    }

    #[test]
    fn pll_frequency_with_uneven_reference() {
        let (_emu, crm) = crm();
        crm.set_hext_frequency(25_000_000);
        // 25 MHz / 3 * 120 = 1000 MHz exactly
        let config = PllConfig {
            source: PllSource::HEXT,
            ms: 3,
            ns: 120,
            fr: PllFr::DivideBy4,
        };
        assert_eq!(Ok(()), crm.pll_config(&config));
        assert_eq!(250_000_000, crm.get_pll_frequency_hz());
        assert_eq!(
            Ok(PllParameters {
                ms: 2,
                ns: 40,
                fr: PllFr::DivideBy2,
                frequency_hz: 250_000_000,
            }),
            Crm::pll_parameter_calculate(25_000_000, 250_000_000)
        );
    }

    #[test]
    fn oscillator_waits() {
        let (emu, crm) = crm();
        crm.hext_config(OscillatorMode::Bypass);
        assert_eq!((1 << 18) | (1 << 16), emu.peek(CTRL));
        assert_eq!(Err(ErrorCode::BUSY), crm.wait_for_hext_ready());
        emu.set_bits(CTRL, 1 << 17);
        assert!(crm.flag_get(CrmFlag::HEXTSTBL));
        assert_eq!(Ok(()), crm.wait_for_hext_ready());
        crm.hext_config(OscillatorMode::Off);
        assert_eq!(0, emu.peek(CTRL) & ((1 << 18) | (1 << 16)));

        crm.lext_config(OscillatorMode::Crystal);
        assert_eq!(1, emu.peek(BPDC));
        assert_eq!(Err(ErrorCode::BUSY), crm.wait_for_lext_ready());

        crm.lick_enable(true);
        assert_eq!(1, emu.peek(CTRLSTS));
        assert_eq!(Err(ErrorCode::BUSY), crm.wait_for_lick_ready());

        assert_eq!(Err(ErrorCode::BUSY), crm.pll_enable());
        emu.set_bits(CTRL, 1 << 25);
        assert_eq!(Ok(()), crm.pll_enable());

        assert_eq!(Err(ErrorCode::INVAL), crm.hick_trim_adjust(64));
        assert_eq!(Ok(()), crm.hick_trim_adjust(40));
        assert_eq!(40 << 2, emu.peek(CTRL) & (0x3F << 2));
    }

    #[test]
    fn clock_switch_and_frequencies() {
        let (emu, crm) = crm();
        assert_eq!(8_000_000, crm.get_clocks_freq().sclk_hz);

        assert_eq!(Ok(()), crm.pll_config(&PLL_288MHZ));
        crm.set_apb1_divider(ApbDivider::DivideBy2);
        crm.set_apb2_divider(ApbDivider::DivideBy2);
        assert_eq!(Err(ErrorCode::BUSY), crm.set_sys_clock_source(SysClockSource::PLL));
        assert!(!crm.is_auto_step_mode());
        emu.set_bits(CFG, 0b10 << 2);
        assert_eq!(Ok(()), crm.set_sys_clock_source(SysClockSource::PLL));
        assert_eq!(0, emu.peek(MISC2));
        assert_eq!(
            ClockFrequencies {
                sclk_hz: 288_000_000,
                ahb_hz: 288_000_000,
                apb1_hz: 144_000_000,
                apb2_hz: 144_000_000,
            },
            crm.get_clocks_freq()
        );

        crm.set_ahb_divider(AhbDivider::DivideBy16);
        assert_eq!(AhbDivider::DivideBy16, crm.get_ahb_divider());
        assert_eq!(18_000_000, crm.get_clocks_freq().ahb_hz);

        crm.auto_step_mode(true);
        assert_eq!(0b11 << 4, emu.peek(MISC2));
        assert!(crm.is_auto_step_mode());

        crm.set_hext_frequency(12_000_000);
        crm.set_ahb_divider(AhbDivider::DivideBy1);
        emu.poke(CFG, 0b01 << 2);
        assert_eq!(12_000_000, crm.get_clocks_freq().sclk_hz);
    }

    #[test]
    fn peripheral_clock_gates_and_timer_frequency() {
        let (emu, crm) = crm();
        let can1 = PeripheralClock::new(PeripheralClockType::APB1(PCLK1::CAN1), &crm);
        let tmr2 = PeripheralClock::new(PeripheralClockType::APB1(PCLK1::TMR2), &crm);
        let scfg = PeripheralClock::new(PeripheralClockType::APB2(PCLK2::SCFG), &crm);

        can1.enable();
        scfg.enable();
        assert_eq!(1 << 25, emu.peek(APB1EN));
        assert_eq!(1 << 14, emu.peek(APB2EN));
        assert!(can1.is_enabled());
        assert!(!tmr2.is_enabled());
        scfg.reset();
        assert_eq!(0, emu.peek(APB2RST));
        crm.peripheral_low_power_mode_enable(can1.clock, true);
        assert_eq!(1 << 25, emu.peek(APB1LPEN));

        // HICK, APB1 / 4
        crm.set_apb1_divider(ApbDivider::DivideBy4);
        assert_eq!(2_000_000, can1.get_frequency());
        assert_eq!(4_000_000, tmr2.get_frequency());
        crm.set_apb1_divider(ApbDivider::DivideBy1);
        assert_eq!(8_000_000, tmr2.get_frequency());
        assert_eq!(8_000_000, scfg.get_frequency());
    }

    #[test]
    fn usb_outputs_and_ertc() {
        let (emu, crm) = crm();
        crm.usb_divider(UsbDivider::DivideBy6);
        crm.usb_clock_source(UsbClockSource::Hick);
        assert_eq!(0xB << 12, emu.peek(MISC2));
        assert_eq!(1 << 13, emu.peek(MISC1));

        crm.clkout1_config(ClkOut1Source::PLL, ClkOutDivider::DivideBy2);
        crm.clkout2_config(ClkOut2Source::USB, ClkOutDivider::DivideBy3);
        assert_eq!(
            (0b01 << 30) | (0b101 << 27) | (0b100 << 24) | (0b11 << 21),
            emu.peek(CFG)
        );
        crm.clkout2_config(ClkOut2Source::LEXT, ClkOutDivider::DivideBy1);
        assert_eq!((1 << 13) | (0b0100 << 16), emu.peek(MISC1));

        assert_eq!(
            Err(ErrorCode::INVAL),
            crm.ertc_clock_config(ErtcClockSource::HEXT(32))
        );
        assert_eq!(Ok(()), crm.ertc_clock_config(ErtcClockSource::HEXT(25)));
        assert_eq!(25 << 16, emu.peek(CFG) & (0x1F << 16));
        crm.ertc_clock_enable(true);
        assert_eq!((1 << 15) | (0b11 << 8), emu.peek(BPDC));
        crm.battery_powered_domain_reset(true);
        assert_ne!(0, emu.peek(BPDC) & (1 << 16));
    }

    #[test]
    fn interrupts_and_reset_flags() {
        let (emu, crm) = crm();
        assert_eq!(
            Err(ErrorCode::NOSUPPORT),
            crm.interrupt_enable(CrmInterrupt::CFD, true)
        );
        assert_eq!(Ok(()), crm.interrupt_enable(CrmInterrupt::PLLSTBL, true));
        assert_eq!(1 << 12, emu.peek(CLKINT));
        emu.set_bits(CLKINT, 1 << 4);
        assert!(crm.interrupt_flag_get(CrmInterrupt::PLLSTBL));
        crm.interrupt_flag_clear(CrmInterrupt::PLLSTBL);
        assert_eq!((1 << 20) | (1 << 12), emu.peek(CLKINT));
        crm.interrupt_flag_clear(CrmInterrupt::CFD);
        assert_eq!((1 << 23) | (1 << 12), emu.peek(CLKINT));

        emu.poke(CTRLSTS, 1 << 28);
        assert!(crm.flag_get(CrmFlag::SWRST));
        assert!(!crm.flag_get(CrmFlag::PORRST));
        crm.reset_flags_clear();
        assert_ne!(0, emu.peek(CTRLSTS) & (1 << 24));
    }

    #[test]
    fn deinit_restores_reset_values() {
        let (emu, crm) = crm();
        assert_eq!(Err(ErrorCode::BUSY), crm.deinit());

        emu.poke(CTRL, (1 << 1) | (1 << 16) | (1 << 18) | (1 << 19) | (1 << 24));
        emu.poke(CFG, 0x0000_1C02);
        emu.poke(MISC2, (0b11 << 4) | (0x5 << 12));
        assert_eq!(Ok(()), crm.deinit());
        assert_eq!((1 << 1) | 1, emu.peek(CTRL));
        assert_eq!(0, emu.peek(CFG));
        assert_eq!(0, emu.peek(MISC2));
        assert_eq!(0x0003_3002, emu.peek(PLLCFG));
        assert_eq!(0x009F_0000, emu.peek(CLKINT));
    }
}
