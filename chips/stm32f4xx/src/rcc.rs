// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Reset and clock control (RCC).
//!
//! `Rcc` is the register level driver: oscillators, the main and I2S PLLs,
//! the system clock multiplexer, bus prescalers and the peripheral clock
//! gates. It validates PLL factors against the datasheet ranges but knows
//! nothing about the frequency limits of a particular part. Those are checked
//! one level up, by [`crate::clocks::Clocks`].
//!
//! Constructing an `Rcc` does not touch the hardware.

use kernel::config::CONFIG;
use kernel::utilities::poll;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

register_structs! {
    /// Reset and clock control
    pub RccRegisters {
        /// clock control register
        (0x00 => cr: ReadWrite<u32, CR::Register>),
        /// PLL configuration register
        (0x04 => pllcfgr: ReadWrite<u32, PLLCFGR::Register>),
        /// clock configuration register
        (0x08 => cfgr: ReadWrite<u32, CFGR::Register>),
        /// clock interrupt register
        (0x0C => cir: ReadWrite<u32, CIR::Register>),
        /// AHB1 peripheral reset register
        (0x10 => ahb1rstr: ReadWrite<u32>),
        /// AHB2 peripheral reset register
        (0x14 => ahb2rstr: ReadWrite<u32>),
        /// AHB3 peripheral reset register
        (0x18 => ahb3rstr: ReadWrite<u32>),
        (0x1C => _reserved0),
        /// APB1 peripheral reset register
        (0x20 => apb1rstr: ReadWrite<u32>),
        /// APB2 peripheral reset register
        (0x24 => apb2rstr: ReadWrite<u32>),
        (0x28 => _reserved1),
        /// AHB1 peripheral clock register
        (0x30 => ahb1enr: ReadWrite<u32>),
        /// AHB2 peripheral clock enable register
        (0x34 => ahb2enr: ReadWrite<u32>),
        /// AHB3 peripheral clock enable register
        (0x38 => ahb3enr: ReadWrite<u32>),
        (0x3C => _reserved2),
        /// APB1 peripheral clock enable register
        (0x40 => apb1enr: ReadWrite<u32>),
        /// APB2 peripheral clock enable register
        (0x44 => apb2enr: ReadWrite<u32>),
        (0x48 => _reserved3),
        /// AHB1 peripheral clock enable in low power mode register
        (0x50 => ahb1lpenr: ReadWrite<u32>),
        /// AHB2 peripheral clock enable in low power mode register
        (0x54 => ahb2lpenr: ReadWrite<u32>),
        /// AHB3 peripheral clock enable in low power mode register
        (0x58 => ahb3lpenr: ReadWrite<u32>),
        (0x5C => _reserved4),
        /// APB1 peripheral clock enable in low power mode register
        (0x60 => apb1lpenr: ReadWrite<u32>),
        /// APB2 peripheral clock enabled in low power mode register
        (0x64 => apb2lpenr: ReadWrite<u32>),
        (0x68 => _reserved5),
        /// Backup domain control register
        (0x70 => bdcr: ReadWrite<u32, BDCR::Register>),
        /// clock control & status register
        (0x74 => csr: ReadWrite<u32, CSR::Register>),
        (0x78 => _reserved6),
        /// PLLI2S configuration register
        (0x84 => plli2scfgr: ReadWrite<u32, PLLI2SCFGR::Register>),
        (0x88 => _reserved8),
        /// Dedicated Clock Configuration Register
        (0x8C => dckcfgr: ReadWrite<u32, DCKCFGR::Register>),
        (0x90 => @END),
    }
}

register_bitfields![u32,
    CR [
        /// PLLI2S clock ready flag
        PLLI2SRDY OFFSET(27) NUMBITS(1) [],
        /// PLLI2S enable
        PLLI2SON OFFSET(26) NUMBITS(1) [],
        /// Main PLL (PLL) clock ready flag
        PLLRDY OFFSET(25) NUMBITS(1) [],
        /// Main PLL (PLL) enable
        PLLON OFFSET(24) NUMBITS(1) [],
        /// Clock security system enable
        CSSON OFFSET(19) NUMBITS(1) [],
        /// HSE clock bypass
        HSEBYP OFFSET(18) NUMBITS(1) [],
        /// HSE clock ready flag
        HSERDY OFFSET(17) NUMBITS(1) [],
        /// HSE clock enable
        HSEON OFFSET(16) NUMBITS(1) [],
        /// Internal high-speed clock calibration
        HSICAL OFFSET(8) NUMBITS(8) [],
        /// Internal high-speed clock trimming
        HSITRIM OFFSET(3) NUMBITS(5) [],
        /// Internal high-speed clock ready flag
        HSIRDY OFFSET(1) NUMBITS(1) [],
        /// Internal high-speed clock enable
        HSION OFFSET(0) NUMBITS(1) []
    ],
    PLLCFGR [
        /// Main PLL (PLL) division factor for USB OTG FS, SDIO and random num
        PLLQ OFFSET(24) NUMBITS(4) [],
        /// Main PLL(PLL) and audio PLL (PLLI2S) entry clock source
        PLLSRC OFFSET(22) NUMBITS(1) [
            HSI = 0,
            HSE = 1,
        ],
        /// Main PLL (PLL) division factor for main system clock
        PLLP OFFSET(16) NUMBITS(2) [],
        /// Main PLL (PLL) multiplication factor for VCO
        PLLN OFFSET(6) NUMBITS(9) [],
        /// Division factor for the main PLL (PLL) and audio PLL (PLLI2S) input
        PLLM OFFSET(0) NUMBITS(6) []
    ],
    CFGR [
        /// Microcontroller clock output 2
        MCO2 OFFSET(30) NUMBITS(2) [],
        /// MCO2 prescaler
        MCO2PRE OFFSET(27) NUMBITS(3) [],
        /// MCO1 prescaler
        MCO1PRE OFFSET(24) NUMBITS(3) [],
        /// I2S clock selection
        I2SSRC OFFSET(23) NUMBITS(1) [],
        /// Microcontroller clock output 1
        MCO1 OFFSET(21) NUMBITS(2) [],
        /// HSE division factor for RTC clock
        RTCPRE OFFSET(16) NUMBITS(5) [],
        /// APB high-speed prescaler (APB2)
        PPRE2 OFFSET(13) NUMBITS(3) [],
        /// APB Low speed prescaler (APB1)
        PPRE1 OFFSET(10) NUMBITS(3) [],
        /// AHB prescaler
        HPRE OFFSET(4) NUMBITS(4) [],
        /// System clock switch status
        SWS OFFSET(2) NUMBITS(2) [],
        /// System clock switch
        SW OFFSET(0) NUMBITS(2) []
    ],
    CIR [
        /// Clock security system interrupt clear
        CSSC OFFSET(23) NUMBITS(1) [],
        /// Ready interrupt clear bits, one per oscillator or PLL
        RDYC OFFSET(16) NUMBITS(6) [],
        /// Ready interrupt enable bits
        RDYIE OFFSET(8) NUMBITS(6) [],
        /// Clock security system interrupt flag
        CSSF OFFSET(7) NUMBITS(1) [],
        /// Ready interrupt flags
        RDYF OFFSET(0) NUMBITS(6) []
    ],
    BDCR [
        /// Backup domain software reset
        BDRST OFFSET(16) NUMBITS(1) [],
        /// RTC clock enable
        RTCEN OFFSET(15) NUMBITS(1) [],
        /// RTC clock source selection
        RTCSEL OFFSET(8) NUMBITS(2) [],
        /// External low-speed oscillator bypass
        LSEBYP OFFSET(2) NUMBITS(1) [],
        /// External low-speed oscillator ready
        LSERDY OFFSET(1) NUMBITS(1) [],
        /// External low-speed oscillator enable
        LSEON OFFSET(0) NUMBITS(1) []
    ],
    CSR [
        /// Low-power reset flag
        LPWRRSTF OFFSET(31) NUMBITS(1) [],
        /// Window watchdog reset flag
        WWDGRSTF OFFSET(30) NUMBITS(1) [],
        /// Independent watchdog reset flag
        WDGRSTF OFFSET(29) NUMBITS(1) [],
        /// Software reset flag
        SFTRSTF OFFSET(28) NUMBITS(1) [],
        /// POR/PDR reset flag
        PORRSTF OFFSET(27) NUMBITS(1) [],
        /// PIN reset flag
        PADRSTF OFFSET(26) NUMBITS(1) [],
        /// BOR reset flag
        BORRSTF OFFSET(25) NUMBITS(1) [],
        /// Remove reset flag
        RMVF OFFSET(24) NUMBITS(1) [],
        /// Internal low-speed oscillator ready
        LSIRDY OFFSET(1) NUMBITS(1) [],
        /// Internal low-speed oscillator enable
        LSION OFFSET(0) NUMBITS(1) []
    ],
    PLLI2SCFGR [
        /// PLLI2S division factor for I2S clocks
        PLLI2SR OFFSET(28) NUMBITS(3) [],
        /// PLLI2S multiplication factor for VCO
        PLLI2SN OFFSET(6) NUMBITS(9) []
    ],
    DCKCFGR [
        /// Timers clocks prescalers selection
        TIMPRE OFFSET(24) NUMBITS(1) []
    ]
];

/// Frequency of the internal high speed RC oscillator.
pub const HSI_FREQUENCY_HZ: u32 = 16_000_000;

const PLLCFGR_RESET_VALUE: u32 = 0x2400_3010;
const PLLI2SCFGR_RESET_VALUE: u32 = 0x2000_3000;

const PLL_VCO_INPUT_HZ: core::ops::RangeInclusive<u64> = 1_000_000..=2_000_000;
const PLL_VCO_OUTPUT_HZ: core::ops::RangeInclusive<u64> = 100_000_000..=432_000_000;

/// Clock sources for the CPU
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysClockSource {
    HSI = 0b00,
    HSE = 0b01,
    PLL = 0b10,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllSource {
    HSI = 0b0,
    HSE = 0b1,
}

/// HSE Mode
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HseMode {
    Off,
    Crystal,
    Bypass,
}

/// LSE Mode
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LseMode {
    Off,
    Crystal,
    Bypass,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PLLP {
    DivideBy2 = 0b00,
    DivideBy4 = 0b01,
    DivideBy6 = 0b10,
    DivideBy8 = 0b11,
}

impl From<PLLP> for usize {
    // (variant_value + 1) * 2 = X for X in DivideByX
    fn from(item: PLLP) -> Self {
        (item as usize + 1) << 1
    }
}

/// Main PLL settings.
///
/// `m` divides the source into the VCO input, `n` multiplies it, `p` divides
/// the VCO output into the system clock and `q` into the 48 MHz clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllConfig {
    pub source: PllSource,
    pub m: u8,
    pub n: u16,
    pub p: PLLP,
    pub q: u8,
}

impl Default for PllConfig {
    /// The reset configuration: HSI / 16 * 192 / 2, Q = 4.
    fn default() -> Self {
        Self {
            source: PllSource::HSI,
            m: 16,
            n: 192,
            p: PLLP::DivideBy2,
            q: 4,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AHBPrescaler {
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

impl From<AHBPrescaler> for usize {
    fn from(item: AHBPrescaler) -> usize {
        match item {
            AHBPrescaler::DivideBy1 => 1,
            AHBPrescaler::DivideBy2 => 2,
            AHBPrescaler::DivideBy4 => 4,
            AHBPrescaler::DivideBy8 => 8,
            AHBPrescaler::DivideBy16 => 16,
            AHBPrescaler::DivideBy64 => 64,
            AHBPrescaler::DivideBy128 => 128,
            AHBPrescaler::DivideBy256 => 256,
            AHBPrescaler::DivideBy512 => 512,
        }
    }
}

impl AHBPrescaler {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0b1000 => AHBPrescaler::DivideBy2,
            0b1001 => AHBPrescaler::DivideBy4,
            0b1010 => AHBPrescaler::DivideBy8,
            0b1011 => AHBPrescaler::DivideBy16,
            0b1100 => AHBPrescaler::DivideBy64,
            0b1101 => AHBPrescaler::DivideBy128,
            0b1110 => AHBPrescaler::DivideBy256,
            0b1111 => AHBPrescaler::DivideBy512,
            _ => AHBPrescaler::DivideBy1,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum APBPrescaler {
    DivideBy1 = 0b000, // No division
    DivideBy2 = 0b100,
    DivideBy4 = 0b101,
    DivideBy8 = 0b110,
    DivideBy16 = 0b111,
}

impl From<APBPrescaler> for usize {
    fn from(item: APBPrescaler) -> Self {
        match item {
            APBPrescaler::DivideBy1 => 1,
            APBPrescaler::DivideBy2 => 2,
            APBPrescaler::DivideBy4 => 4,
            APBPrescaler::DivideBy8 => 8,
            APBPrescaler::DivideBy16 => 16,
        }
    }
}

impl APBPrescaler {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0b100 => APBPrescaler::DivideBy2,
            0b101 => APBPrescaler::DivideBy4,
            0b110 => APBPrescaler::DivideBy8,
            0b111 => APBPrescaler::DivideBy16,
            _ => APBPrescaler::DivideBy1,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MCO1Source {
    HSI = 0b00,
    LSE = 0b01,
    HSE = 0b10,
    PLL = 0b11,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MCO2Source {
    SYSCLK = 0b00,
    PLLI2S = 0b01,
    HSE = 0b10,
    PLL = 0b11,
}

/// Prescaler shared by both clock outputs.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MCODivider {
    DivideBy1 = 0b000,
    DivideBy2 = 0b100,
    DivideBy3 = 0b101,
    DivideBy4 = 0b110,
    DivideBy5 = 0b111,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RtcClockSource {
    LSE,
    LSI,
    /// HSE divided by a prescaler in 2..=31
    HSE(u8),
}

/// Timer clock multiplier selection (DCKCFGR.TIMPRE).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerPrescaler {
    /// Timers run at twice PCLKx when the APB prescaler is not 1
    Twice,
    /// Timers run at HCLK when the APB prescaler is 1, 2 or 4, else 4 × PCLKx
    FourTimes,
}

/// Ready and clock security interrupts. The discriminant is the flag bit in
/// CIR; the enable bit sits 8 above it and the clear bit 16 above it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RccInterrupt {
    LSIRDY = 0,
    LSERDY = 1,
    HSIRDY = 2,
    HSERDY = 3,
    PLLRDY = 4,
    PLLI2SRDY = 5,
    /// Always enabled while the clock security system is on
    CSS = 7,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RccFlag {
    HSIRDY,
    HSERDY,
    PLLRDY,
    PLLI2SRDY,
    LSERDY,
    LSIRDY,
    BORRST,
    PINRST,
    PORRST,
    SFTRST,
    IWDGRST,
    WWDGRST,
    LPWRRST,
}

/// Bus + Clock name for the peripherals
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralClockType {
    AHB1(HCLK1),
    AHB2(HCLK2),
    AHB3(HCLK3),
    APB1(PCLK1),
    APB2(PCLK2),
}

/// Peripherals clocked by HCLK1. The discriminant is the bit in the AHB1
/// enable, reset and low power enable registers.
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
    GPIOI = 8,
    CRC = 12,
    BKPSRAM = 18,
    DMA1 = 21,
    DMA2 = 22,
    ETHMAC = 25,
    /// Enable register only
    ETHMACTX = 26,
    /// Enable register only
    ETHMACRX = 27,
    /// Enable register only
    ETHMACPTP = 28,
    OTGHS = 29,
}

/// Peripherals clocked by HCLK2
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HCLK2 {
    DCMI = 0,
    CRYP = 4,
    HASH = 5,
    RNG = 6,
    OTGFS = 7,
}

/// Peripherals clocked by HCLK3
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HCLK3 {
    FMC = 0,
}

/// Peripherals clocked by PCLK1
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PCLK1 {
    TIM2 = 0,
    TIM3 = 1,
    TIM4 = 2,
    TIM5 = 3,
    TIM6 = 4,
    TIM7 = 5,
    TIM12 = 6,
    TIM13 = 7,
    TIM14 = 8,
    WWDG = 11,
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
    PWR = 28,
    DAC = 29,
}

/// Peripherals clocked by PCLK2
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PCLK2 {
    TIM1 = 0,
    TIM8 = 1,
    USART1 = 4,
    USART6 = 5,
    ADC1 = 8,
    ADC2 = 9,
    ADC3 = 10,
    SDIO = 11,
    SPI1 = 12,
    SPI4 = 13,
    SYSCFG = 14,
    TIM9 = 16,
    TIM10 = 17,
    TIM11 = 18,
}

impl PeripheralClockType {
    fn mask(self) -> u32 {
        let bit = match self {
            PeripheralClockType::AHB1(p) => p as u32,
            PeripheralClockType::AHB2(p) => p as u32,
            PeripheralClockType::AHB3(p) => p as u32,
            PeripheralClockType::APB1(p) => p as u32,
            PeripheralClockType::APB2(p) => p as u32,
        };
        1 << bit
    }

    /// Whether a timer on this bus runs at a multiple of the bus clock.
    pub fn is_timer(self) -> bool {
        match self {
            PeripheralClockType::APB1(p) => matches!(
                p,
                PCLK1::TIM2
                    | PCLK1::TIM3
                    | PCLK1::TIM4
                    | PCLK1::TIM5
                    | PCLK1::TIM6
                    | PCLK1::TIM7
                    | PCLK1::TIM12
                    | PCLK1::TIM13
                    | PCLK1::TIM14
            ),
            PeripheralClockType::APB2(p) => matches!(
                p,
                PCLK2::TIM1 | PCLK2::TIM8 | PCLK2::TIM9 | PCLK2::TIM10 | PCLK2::TIM11
            ),
            _ => false,
        }
    }
}

/// Bus clock frequencies computed from the current register state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockFrequencies {
    pub sysclk_hz: u32,
    pub hclk_hz: u32,
    pub pclk1_hz: u32,
    pub pclk2_hz: u32,
}

enum GateRegister {
    Enable,
    Reset,
    LowPower,
}

pub struct Rcc {
    registers: StaticRef<RccRegisters>,
}

impl Rcc {
    pub const fn new(registers: StaticRef<RccRegisters>) -> Self {
        Self { registers }
    }

    /// Put the clock tree back to its reset configuration: HSI on and
    /// selected, HSE, PLL, PLLI2S and CSS off, prescalers at 1, interrupts
    /// disabled.
    pub fn deinit(&self) -> Result<(), ErrorCode> {
        self.registers.cr.modify(CR::HSION::SET);
        self.wait_for_hsi_ready()?;

        self.registers.cfgr.set(0);
        self.registers.cr.modify(
            CR::HSEON::CLEAR + CR::CSSON::CLEAR + CR::PLLON::CLEAR + CR::PLLI2SON::CLEAR,
        );
        self.registers.pllcfgr.set(PLLCFGR_RESET_VALUE);
        self.registers.plli2scfgr.set(PLLI2SCFGR_RESET_VALUE);
        self.registers.cr.modify(CR::HSEBYP::CLEAR);
        self.registers.cir.set(0);
        self.registers.dckcfgr.modify(DCKCFGR::TIMPRE::CLEAR);
        log::debug!("rcc: clock tree back to reset configuration");
        Ok(())
    }

    /* === Oscillators === */

    /// Switch the external high speed oscillator. The oscillator is turned off
    /// before a new mode is applied since HSEBYP may only change while it is
    /// off.
    pub fn hse_config(&self, mode: HseMode) {
        self.registers.cr.modify(CR::HSEON::CLEAR + CR::HSEBYP::CLEAR);
        match mode {
            HseMode::Off => {}
            HseMode::Crystal => self.registers.cr.modify(CR::HSEON::SET),
            HseMode::Bypass => self.registers.cr.modify(CR::HSEBYP::SET + CR::HSEON::SET),
        }
    }

    pub fn is_enabled_hse_clock(&self) -> bool {
        self.registers.cr.is_set(CR::HSEON)
    }

    pub fn is_ready_hse_clock(&self) -> bool {
        self.registers.cr.is_set(CR::HSERDY)
    }

    pub fn wait_for_hse_ready(&self) -> Result<(), ErrorCode> {
        poll::wait_until(CONFIG.hse_startup_timeout, || self.is_ready_hse_clock())
            .inspect_err(|_| log::warn!("rcc: HSE did not start"))
    }

    pub fn enable_hsi_clock(&self) {
        self.registers.cr.modify(CR::HSION::SET);
    }

    pub fn disable_hsi_clock(&self) {
        self.registers.cr.modify(CR::HSION::CLEAR);
    }

    pub fn is_enabled_hsi_clock(&self) -> bool {
        self.registers.cr.is_set(CR::HSION)
    }

    pub fn is_ready_hsi_clock(&self) -> bool {
        self.registers.cr.is_set(CR::HSIRDY)
    }

    pub fn wait_for_hsi_ready(&self) -> Result<(), ErrorCode> {
        poll::wait_until(CONFIG.hsi_startup_timeout, || self.is_ready_hsi_clock())
            .inspect_err(|_| log::warn!("rcc: HSI did not start"))
    }

    /// Adjust the HSI trimming value (0..=31, 16 is the factory default).
    pub fn hsi_trim_adjust(&self, trim: u8) -> Result<(), ErrorCode> {
        if trim > 0x1F {
            return Err(ErrorCode::INVAL);
        }
        self.registers.cr.modify(CR::HSITRIM.val(trim as u32));
        Ok(())
    }

    pub fn hsi_calibration(&self) -> u8 {
        self.registers.cr.read(CR::HSICAL) as u8
    }

    pub fn lse_config(&self, mode: LseMode) {
        self.registers
            .bdcr
            .modify(BDCR::LSEON::CLEAR + BDCR::LSEBYP::CLEAR);
        match mode {
            LseMode::Off => {}
            LseMode::Crystal => self.registers.bdcr.modify(BDCR::LSEON::SET),
            LseMode::Bypass => self
                .registers
                .bdcr
                .modify(BDCR::LSEBYP::SET + BDCR::LSEON::SET),
        }
    }

    pub fn is_ready_lse_clock(&self) -> bool {
        self.registers.bdcr.is_set(BDCR::LSERDY)
    }

    pub fn wait_for_lse_ready(&self) -> Result<(), ErrorCode> {
        poll::wait_until(CONFIG.lse_startup_timeout, || self.is_ready_lse_clock())
            .inspect_err(|_| log::warn!("rcc: LSE did not start"))
    }

    pub fn enable_lsi_clock(&self) {
        self.registers.csr.modify(CSR::LSION::SET);
    }

    pub fn disable_lsi_clock(&self) {
        self.registers.csr.modify(CSR::LSION::CLEAR);
    }

    pub fn is_ready_lsi_clock(&self) -> bool {
        self.registers.csr.is_set(CSR::LSIRDY)
    }

    pub fn wait_for_lsi_ready(&self) -> Result<(), ErrorCode> {
        poll::wait_until(CONFIG.lsi_startup_timeout, || self.is_ready_lsi_clock())
            .inspect_err(|_| log::warn!("rcc: LSI did not start"))
    }

    /* === Main PLL === */

    /// Program the main PLL. `source_frequency_hz` is the frequency of the
    /// selected input and is used to check the VCO input and output ranges.
    ///
    /// Fails with `FAIL` while the PLL runs and with `INVAL` when a factor or
    /// the resulting VCO frequency is out of range.
    pub fn pll_config(&self, config: &PllConfig, source_frequency_hz: u32) -> Result<(), ErrorCode> {
        if self.is_enabled_pll_clock() {
            log::warn!("rcc: PLL must be off to be reconfigured");
            return Err(ErrorCode::FAIL);
        }
        if !(2..=63).contains(&config.m)
            || !(50..=432).contains(&config.n)
            || !(2..=15).contains(&config.q)
        {
            log::warn!("rcc: PLL factors out of range: {:?}", config);
            return Err(ErrorCode::INVAL);
        }
        let vco_input = source_frequency_hz as u64 / config.m as u64;
        let vco_output = vco_input * config.n as u64;
        if !PLL_VCO_INPUT_HZ.contains(&vco_input) || !PLL_VCO_OUTPUT_HZ.contains(&vco_output) {
            log::warn!(
                "rcc: PLL VCO out of range ({} Hz in, {} Hz out)",
                vco_input,
                vco_output
            );
            return Err(ErrorCode::INVAL);
        }

        self.registers.pllcfgr.modify(
            PLLCFGR::PLLSRC.val(config.source as u32)
                + PLLCFGR::PLLM.val(config.m as u32)
                + PLLCFGR::PLLN.val(config.n as u32)
                + PLLCFGR::PLLP.val(config.p as u32)
                + PLLCFGR::PLLQ.val(config.q as u32),
        );
        Ok(())
    }

    pub fn get_pll_config(&self) -> PllConfig {
        let pllcfgr = self.registers.pllcfgr.extract();
        PllConfig {
            source: self.get_pll_clocks_source(),
            m: pllcfgr.read(PLLCFGR::PLLM) as u8,
            n: pllcfgr.read(PLLCFGR::PLLN) as u16,
            p: match pllcfgr.read(PLLCFGR::PLLP) {
                0b00 => PLLP::DivideBy2,
                0b01 => PLLP::DivideBy4,
                0b10 => PLLP::DivideBy6,
                _ => PLLP::DivideBy8,
            },
            q: pllcfgr.read(PLLCFGR::PLLQ) as u8,
        }
    }

    pub fn get_pll_clocks_source(&self) -> PllSource {
        match self.registers.pllcfgr.read_as_enum(PLLCFGR::PLLSRC) {
            Some(PLLCFGR::PLLSRC::Value::HSE) => PllSource::HSE,
            _ => PllSource::HSI,
        }
    }

    /// Turn the PLL on and wait for it to lock.
    pub fn enable_pll_clock(&self) -> Result<(), ErrorCode> {
        self.registers.cr.modify(CR::PLLON::SET);
        poll::wait_until(CONFIG.pll_lock_timeout, || self.is_locked_pll_clock())
            .inspect_err(|_| log::warn!("rcc: PLL did not lock"))
    }

    pub fn disable_pll_clock(&self) {
        self.registers.cr.modify(CR::PLLON::CLEAR);
    }

    pub fn is_enabled_pll_clock(&self) -> bool {
        self.registers.cr.is_set(CR::PLLON)
    }

    pub fn is_locked_pll_clock(&self) -> bool {
        self.registers.cr.is_set(CR::PLLRDY)
    }

    /// Main PLL output frequency, derived from the programmed factors.
    pub fn get_pll_frequency_hz(&self, hse_frequency_hz: u32) -> u32 {
        let config = self.get_pll_config();
        let source = match config.source {
            PllSource::HSI => HSI_FREQUENCY_HZ,
            PllSource::HSE => hse_frequency_hz,
        } as u64;
        if config.m == 0 {
            return 0;
        }
        (source * config.n as u64 / config.m as u64 / usize::from(config.p) as u64) as u32
    }

    /* === I2S PLL === */

    /// Program the I2S PLL. It shares the input divider M with the main PLL.
    pub fn plli2s_config(&self, n: u16, r: u8) -> Result<(), ErrorCode> {
        if self.registers.cr.is_set(CR::PLLI2SON) {
            log::warn!("rcc: PLLI2S must be off to be reconfigured");
            return Err(ErrorCode::FAIL);
        }
        if !(50..=432).contains(&n) || !(2..=7).contains(&r) {
            return Err(ErrorCode::INVAL);
        }
        self.registers
            .plli2scfgr
            .modify(PLLI2SCFGR::PLLI2SN.val(n as u32) + PLLI2SCFGR::PLLI2SR.val(r as u32));
        Ok(())
    }

    pub fn enable_plli2s_clock(&self) -> Result<(), ErrorCode> {
        self.registers.cr.modify(CR::PLLI2SON::SET);
        poll::wait_until(CONFIG.pll_lock_timeout, || {
            self.registers.cr.is_set(CR::PLLI2SRDY)
        })
        .inspect_err(|_| log::warn!("rcc: PLLI2S did not lock"))
    }

    pub fn disable_plli2s_clock(&self) {
        self.registers.cr.modify(CR::PLLI2SON::CLEAR);
    }

    /// Select the I2S clock: the I2S PLL (false) or the I2S_CKIN pin (true).
    pub fn i2s_clock_external(&self, external: bool) {
        self.registers.cfgr.modify(if external {
            CFGR::I2SSRC::SET
        } else {
            CFGR::I2SSRC::CLEAR
        });
    }

    /* === System clock === */

    pub fn get_sys_clock_source(&self) -> SysClockSource {
        match self.registers.cfgr.read(CFGR::SWS) {
            0b00 => SysClockSource::HSI,
            0b01 => SysClockSource::HSE,
            _ => SysClockSource::PLL,
        }
    }

    /// Switch the system clock and wait until the switch status reports the
    /// new source.
    ///
    /// NOTE: the flash latency must be adjusted around this call. See
    /// [`crate::clocks::Clocks::set_sys_clock_source`].
    pub fn set_sys_clock_source(&self, source: SysClockSource) -> Result<(), ErrorCode> {
        self.registers.cfgr.modify(CFGR::SW.val(source as u32));
        poll::wait_until(CONFIG.clock_switch_timeout, || {
            self.registers.cfgr.read(CFGR::SWS) == source as u32
        })
        .inspect_err(|_| log::warn!("rcc: system clock switch to {:?} timed out", source))?;
        log::debug!("rcc: system clock is {:?}", source);
        Ok(())
    }

    pub fn is_ready_sys_clock_source(&self, source: SysClockSource) -> bool {
        match source {
            SysClockSource::HSI => self.is_ready_hsi_clock(),
            SysClockSource::HSE => self.is_ready_hse_clock(),
            SysClockSource::PLL => self.is_locked_pll_clock(),
        }
    }

    pub fn set_ahb_prescaler(&self, ahb_prescaler: AHBPrescaler) {
        self.registers
            .cfgr
            .modify(CFGR::HPRE.val(ahb_prescaler as u32));
    }

    pub fn get_ahb_prescaler(&self) -> AHBPrescaler {
        AHBPrescaler::from_bits(self.registers.cfgr.read(CFGR::HPRE))
    }

    pub fn set_apb1_prescaler(&self, apb1_prescaler: APBPrescaler) {
        self.registers
            .cfgr
            .modify(CFGR::PPRE1.val(apb1_prescaler as u32));
    }

    pub fn get_apb1_prescaler(&self) -> APBPrescaler {
        APBPrescaler::from_bits(self.registers.cfgr.read(CFGR::PPRE1))
    }

    pub fn set_apb2_prescaler(&self, apb2_prescaler: APBPrescaler) {
        self.registers
            .cfgr
            .modify(CFGR::PPRE2.val(apb2_prescaler as u32));
    }

    pub fn get_apb2_prescaler(&self) -> APBPrescaler {
        APBPrescaler::from_bits(self.registers.cfgr.read(CFGR::PPRE2))
    }

    /// Compute SYSCLK, HCLK, PCLK1 and PCLK2 from the clock tree registers.
    /// `hse_frequency_hz` is the frequency of the board's HSE crystal or
    /// bypass clock.
    pub fn get_clocks_freq(&self, hse_frequency_hz: u32) -> ClockFrequencies {
        let sysclk_hz = match self.get_sys_clock_source() {
            SysClockSource::HSI => HSI_FREQUENCY_HZ,
            SysClockSource::HSE => hse_frequency_hz,
            SysClockSource::PLL => self.get_pll_frequency_hz(hse_frequency_hz),
        };
        let hclk_hz = sysclk_hz / usize::from(self.get_ahb_prescaler()) as u32;
        ClockFrequencies {
            sysclk_hz,
            hclk_hz,
            pclk1_hz: hclk_hz / usize::from(self.get_apb1_prescaler()) as u32,
            pclk2_hz: hclk_hz / usize::from(self.get_apb2_prescaler()) as u32,
        }
    }

    /* === Peripheral clocks === */

    fn gate(&self, clock: PeripheralClockType, register: GateRegister) -> &ReadWrite<u32> {
        let regs = &*self.registers;
        match (clock, register) {
            (PeripheralClockType::AHB1(_), GateRegister::Enable) => &regs.ahb1enr,
            (PeripheralClockType::AHB1(_), GateRegister::Reset) => &regs.ahb1rstr,
            (PeripheralClockType::AHB1(_), GateRegister::LowPower) => &regs.ahb1lpenr,
            (PeripheralClockType::AHB2(_), GateRegister::Enable) => &regs.ahb2enr,
            (PeripheralClockType::AHB2(_), GateRegister::Reset) => &regs.ahb2rstr,
            (PeripheralClockType::AHB2(_), GateRegister::LowPower) => &regs.ahb2lpenr,
            (PeripheralClockType::AHB3(_), GateRegister::Enable) => &regs.ahb3enr,
            (PeripheralClockType::AHB3(_), GateRegister::Reset) => &regs.ahb3rstr,
            (PeripheralClockType::AHB3(_), GateRegister::LowPower) => &regs.ahb3lpenr,
            (PeripheralClockType::APB1(_), GateRegister::Enable) => &regs.apb1enr,
            (PeripheralClockType::APB1(_), GateRegister::Reset) => &regs.apb1rstr,
            (PeripheralClockType::APB1(_), GateRegister::LowPower) => &regs.apb1lpenr,
            (PeripheralClockType::APB2(_), GateRegister::Enable) => &regs.apb2enr,
            (PeripheralClockType::APB2(_), GateRegister::Reset) => &regs.apb2rstr,
            (PeripheralClockType::APB2(_), GateRegister::LowPower) => &regs.apb2lpenr,
        }
    }

    fn write_gate(&self, clock: PeripheralClockType, register: GateRegister, set: bool) {
        let reg = self.gate(clock, register);
        if set {
            reg.set(reg.get() | clock.mask());
        } else {
            reg.set(reg.get() & !clock.mask());
        }
    }

    pub fn peripheral_clock_enable(&self, clock: PeripheralClockType, enable: bool) {
        self.write_gate(clock, GateRegister::Enable, enable);
    }

    pub fn is_enabled_peripheral_clock(&self, clock: PeripheralClockType) -> bool {
        self.gate(clock, GateRegister::Enable).get() & clock.mask() != 0
    }

    /// Hold (`true`) or release (`false`) a peripheral in reset.
    pub fn peripheral_reset(&self, clock: PeripheralClockType, reset: bool) {
        self.write_gate(clock, GateRegister::Reset, reset);
    }

    /// Keep the peripheral clocked in sleep mode.
    pub fn peripheral_lp_clock_enable(&self, clock: PeripheralClockType, enable: bool) {
        self.write_gate(clock, GateRegister::LowPower, enable);
    }

    /// Timer kernel clock multiplier. Affects every timer on both APB buses.
    pub fn set_timer_prescaler(&self, prescaler: TimerPrescaler) {
        self.registers.dckcfgr.modify(match prescaler {
            TimerPrescaler::Twice => DCKCFGR::TIMPRE::CLEAR,
            TimerPrescaler::FourTimes => DCKCFGR::TIMPRE::SET,
        });
    }

    pub fn get_timer_prescaler(&self) -> TimerPrescaler {
        if self.registers.dckcfgr.is_set(DCKCFGR::TIMPRE) {
            TimerPrescaler::FourTimes
        } else {
            TimerPrescaler::Twice
        }
    }

    /* === Clock security, outputs and RTC === */

    pub fn clock_security_system(&self, enable: bool) {
        self.registers.cr.modify(if enable {
            CR::CSSON::SET
        } else {
            CR::CSSON::CLEAR
        });
    }

    pub fn mco1_config(&self, source: MCO1Source, divider: MCODivider) {
        self.registers
            .cfgr
            .modify(CFGR::MCO1.val(source as u32) + CFGR::MCO1PRE.val(divider as u32));
    }

    pub fn mco2_config(&self, source: MCO2Source, divider: MCODivider) {
        self.registers
            .cfgr
            .modify(CFGR::MCO2.val(source as u32) + CFGR::MCO2PRE.val(divider as u32));
    }

    /// Select the RTC clock. The selection can only change after a backup
    /// domain reset, which is the caller's decision.
    pub fn rtc_clock_config(&self, source: RtcClockSource) -> Result<(), ErrorCode> {
        let rtcsel = match source {
            RtcClockSource::LSE => 0b01,
            RtcClockSource::LSI => 0b10,
            RtcClockSource::HSE(prescaler) => {
                if !(2..=31).contains(&prescaler) {
                    return Err(ErrorCode::INVAL);
                }
                self.registers
                    .cfgr
                    .modify(CFGR::RTCPRE.val(prescaler as u32));
                0b11
            }
        };
        self.registers.bdcr.modify(BDCR::RTCSEL.val(rtcsel));
        Ok(())
    }

    pub fn rtc_clock_enable(&self, enable: bool) {
        self.registers.bdcr.modify(if enable {
            BDCR::RTCEN::SET
        } else {
            BDCR::RTCEN::CLEAR
        });
    }

    pub fn is_enabled_rtc_clock(&self) -> bool {
        self.registers.bdcr.is_set(BDCR::RTCEN)
    }

    /// Assert (`true`) or release (`false`) the backup domain reset.
    pub fn backup_reset(&self, reset: bool) {
        self.registers.bdcr.modify(if reset {
            BDCR::BDRST::SET
        } else {
            BDCR::BDRST::CLEAR
        });
    }

    /* === Interrupts and flags === */

    /// Enable or disable a ready interrupt. The CSS interrupt follows
    /// [`Rcc::clock_security_system`] and cannot be masked here.
    pub fn interrupt_enable(&self, interrupt: RccInterrupt, enable: bool) -> Result<(), ErrorCode> {
        if interrupt == RccInterrupt::CSS {
            return Err(ErrorCode::NOSUPPORT);
        }
        let mask = 1 << interrupt as u32;
        let enables = self.registers.cir.read(CIR::RDYIE);
        let enables = if enable { enables | mask } else { enables & !mask };
        self.registers.cir.write(CIR::RDYIE.val(enables));
        Ok(())
    }

    pub fn interrupt_flag_get(&self, interrupt: RccInterrupt) -> bool {
        self.registers.cir.get() & (1 << interrupt as u32) != 0
    }

    pub fn interrupt_flag_clear(&self, interrupt: RccInterrupt) {
        let enables = self.registers.cir.read(CIR::RDYIE);
        let clear = if interrupt == RccInterrupt::CSS {
            CIR::CSSC::SET
        } else {
            CIR::RDYC.val(1 << interrupt as u32)
        };
        self.registers.cir.write(CIR::RDYIE.val(enables) + clear);
    }

    pub fn flag_get(&self, flag: RccFlag) -> bool {
        let cr = &self.registers.cr;
        let csr = &self.registers.csr;
        match flag {
            RccFlag::HSIRDY => cr.is_set(CR::HSIRDY),
            RccFlag::HSERDY => cr.is_set(CR::HSERDY),
            RccFlag::PLLRDY => cr.is_set(CR::PLLRDY),
            RccFlag::PLLI2SRDY => cr.is_set(CR::PLLI2SRDY),
            RccFlag::LSERDY => self.registers.bdcr.is_set(BDCR::LSERDY),
            RccFlag::LSIRDY => csr.is_set(CSR::LSIRDY),
            RccFlag::BORRST => csr.is_set(CSR::BORRSTF),
            RccFlag::PINRST => csr.is_set(CSR::PADRSTF),
            RccFlag::PORRST => csr.is_set(CSR::PORRSTF),
            RccFlag::SFTRST => csr.is_set(CSR::SFTRSTF),
            RccFlag::IWDGRST => csr.is_set(CSR::WDGRSTF),
            RccFlag::WWDGRST => csr.is_set(CSR::WWDGRSTF),
            RccFlag::LPWRRST => csr.is_set(CSR::LPWRRSTF),
        }
    }

    /// Clear all reset cause flags.
    pub fn reset_flags_clear(&self) {
        self.registers.csr.modify(CSR::RMVF::SET);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::utilities::emulated::EmulatedRegisters;

    const CR: usize = 0x00;
    const PLLCFGR: usize = 0x04;
    const CFGR: usize = 0x08;
    const CIR: usize = 0x0C;
    const AHB1RSTR: usize = 0x10;
    const AHB1ENR: usize = 0x30;
    const APB1ENR: usize = 0x40;
    const APB2ENR: usize = 0x44;
    const APB2LPENR: usize = 0x64;
    const BDCR: usize = 0x70;
    const CSR: usize = 0x74;
    const PLLI2SCFGR: usize = 0x84;
    const DCKCFGR: usize = 0x8C;

    fn rcc() -> (EmulatedRegisters<RccRegisters>, Rcc) {
        let emu = EmulatedRegisters::new();
        let rcc = Rcc::new(emu.registers());
        (emu, rcc)
    }

    #[test]
    fn hse_modes_program_on_and_bypass() {
        let (emu, rcc) = rcc();
        rcc.hse_config(HseMode::Bypass);
        assert_eq!((1 << 18) | (1 << 16), emu.peek(CR));
        rcc.hse_config(HseMode::Crystal);
        assert_eq!(1 << 16, emu.peek(CR));
        rcc.hse_config(HseMode::Off);
        assert_eq!(0, emu.peek(CR));
    }

    #[test]
    fn oscillator_waits_are_bounded() {
        let (emu, rcc) = rcc();
        assert_eq!(Err(ErrorCode::BUSY), rcc.wait_for_hse_ready());
        assert_eq!(Err(ErrorCode::BUSY), rcc.wait_for_lsi_ready());
        emu.set_bits(CR, 1 << 17);
        assert_eq!(Ok(()), rcc.wait_for_hse_ready());
        emu.set_bits(BDCR, 1 << 1);
        assert_eq!(Ok(()), rcc.wait_for_lse_ready());
    }

    #[test]
    fn hsi_trim_is_five_bits() {
        let (emu, rcc) = rcc();
        assert_eq!(Err(ErrorCode::INVAL), rcc.hsi_trim_adjust(32));
        assert_eq!(Ok(()), rcc.hsi_trim_adjust(0x11));
        assert_eq!(0x11 << 3, emu.peek(CR));
    }

    #[test]
    fn pll_factors_are_range_checked() {
        let (emu, rcc) = rcc();
        let good = PllConfig {
            source: PllSource::HSE,
            m: 8,
            n: 336,
            p: PLLP::DivideBy2,
            q: 7,
        };
        assert_eq!(
            Err(ErrorCode::INVAL),
            rcc.pll_config(&PllConfig { m: 1, ..good }, 8_000_000)
        );
        assert_eq!(
            Err(ErrorCode::INVAL),
            rcc.pll_config(&PllConfig { n: 433, ..good }, 8_000_000)
        );
        assert_eq!(
            Err(ErrorCode::INVAL),
            rcc.pll_config(&PllConfig { q: 16, ..good }, 8_000_000)
        );
        // 25 MHz / 8 is above the VCO input range
        assert_eq!(Err(ErrorCode::INVAL), rcc.pll_config(&good, 25_000_000));
        // 8 MHz / 8 * 50 is below the VCO output range
        assert_eq!(
            Err(ErrorCode::INVAL),
            rcc.pll_config(&PllConfig { n: 50, ..good }, 8_000_000)
        );
        assert_eq!(0, emu.peek(PLLCFGR));

        assert_eq!(Ok(()), rcc.pll_config(&good, 8_000_000));
        assert_eq!(
            (7 << 24) | (1 << 22) | (336 << 6) | 8,
            emu.peek(PLLCFGR)
        );
        assert_eq!(good, rcc.get_pll_config());
    }

    #[test]
    fn running_pll_is_not_reconfigured() {
        let (emu, rcc) = rcc();
        emu.set_bits(CR, 1 << 24);
        assert_eq!(
            Err(ErrorCode::FAIL),
            rcc.pll_config(&PllConfig::default(), HSI_FREQUENCY_HZ)
        );
        // PLLI2S only depends on its own enable bit
        assert_eq!(Ok(()), rcc.plli2s_config(192, 2));
        emu.set_bits(CR, 1 << 26);
        assert_eq!(Err(ErrorCode::FAIL), rcc.plli2s_config(192, 2));
    }

    #[test]
    fn pll_lock_wait() {
        let (emu, rcc) = rcc();
        assert_eq!(Err(ErrorCode::BUSY), rcc.enable_pll_clock());
        assert!(rcc.is_enabled_pll_clock());
        emu.set_bits(CR, 1 << 25);
        assert_eq!(Ok(()), rcc.enable_pll_clock());
    }

    #[test]
    fn plli2s_ranges() {
        let (emu, rcc) = rcc();
        assert_eq!(Err(ErrorCode::INVAL), rcc.plli2s_config(49, 2));
        assert_eq!(Err(ErrorCode::INVAL), rcc.plli2s_config(192, 8));
        assert_eq!(Ok(()), rcc.plli2s_config(258, 3));
        assert_eq!((3 << 28) | (258 << 6), emu.peek(PLLI2SCFGR));
        assert_eq!(Err(ErrorCode::BUSY), rcc.enable_plli2s_clock());
    }

    #[test]
    fn sys_clock_switch_waits_for_status() {
        let (emu, rcc) = rcc();
        assert_eq!(
            Err(ErrorCode::BUSY),
            rcc.set_sys_clock_source(SysClockSource::PLL)
        );
        assert_eq!(0b10, emu.peek(CFGR) & 0b11);
        emu.set_bits(CFGR, 0b10 << 2);
        assert_eq!(Ok(()), rcc.set_sys_clock_source(SysClockSource::PLL));
        assert_eq!(SysClockSource::PLL, rcc.get_sys_clock_source());
    }

    #[test]
    fn clock_frequencies_follow_registers() {
        let (emu, rcc) = rcc();
        assert_eq!(
            ClockFrequencies {
                sysclk_hz: 16_000_000,
                hclk_hz: 16_000_000,
                pclk1_hz: 16_000_000,
                pclk2_hz: 16_000_000,
            },
            rcc.get_clocks_freq(8_000_000)
        );

        // HSE 8 MHz / 8 * 336 / 2 = 168 MHz, APB1 / 4, APB2 / 2
        emu.poke(PLLCFGR, (7 << 24) | (1 << 22) | (336 << 6) | 8);
        rcc.set_apb1_prescaler(APBPrescaler::DivideBy4);
        rcc.set_apb2_prescaler(APBPrescaler::DivideBy2);
        emu.set_bits(CFGR, 0b10 << 2);
        assert_eq!(
            ClockFrequencies {
                sysclk_hz: 168_000_000,
                hclk_hz: 168_000_000,
                pclk1_hz: 42_000_000,
                pclk2_hz: 84_000_000,
            },
            rcc.get_clocks_freq(8_000_000)
        );
        assert_eq!(APBPrescaler::DivideBy4, rcc.get_apb1_prescaler());

        rcc.set_ahb_prescaler(AHBPrescaler::DivideBy2);
        assert_eq!(AHBPrescaler::DivideBy2, rcc.get_ahb_prescaler());
        assert_eq!(84_000_000, rcc.get_clocks_freq(8_000_000).hclk_hz);
    }

    #[test]
    fn peripheral_gates_select_bus_register() {
        let (emu, rcc) = rcc();
        let eth = PeripheralClockType::AHB1(HCLK1::ETHMAC);
        let syscfg = PeripheralClockType::APB2(PCLK2::SYSCFG);
        let can2 = PeripheralClockType::APB1(PCLK1::CAN2);

        rcc.peripheral_clock_enable(eth, true);
        rcc.peripheral_clock_enable(syscfg, true);
        rcc.peripheral_clock_enable(can2, true);
        assert_eq!(1 << 25, emu.peek(AHB1ENR));
        assert_eq!(1 << 14, emu.peek(APB2ENR));
        assert_eq!(1 << 26, emu.peek(APB1ENR));
        assert!(rcc.is_enabled_peripheral_clock(can2));

        rcc.peripheral_clock_enable(can2, false);
        assert!(!rcc.is_enabled_peripheral_clock(can2));

        rcc.peripheral_reset(eth, true);
        assert_eq!(1 << 25, emu.peek(AHB1RSTR));
        rcc.peripheral_reset(eth, false);
        assert_eq!(0, emu.peek(AHB1RSTR));

        rcc.peripheral_lp_clock_enable(syscfg, true);
        assert_eq!(1 << 14, emu.peek(APB2LPENR));
    }

    #[test]
    fn timer_prescaler_and_outputs() {
        let (emu, rcc) = rcc();
        rcc.set_timer_prescaler(TimerPrescaler::FourTimes);
        assert_eq!(1 << 24, emu.peek(DCKCFGR));
        assert_eq!(TimerPrescaler::FourTimes, rcc.get_timer_prescaler());

        rcc.mco1_config(MCO1Source::PLL, MCODivider::DivideBy4);
        rcc.mco2_config(MCO2Source::HSE, MCODivider::DivideBy2);
        assert_eq!(
            (0b10 << 30) | (0b100 << 27) | (0b110 << 24) | (0b11 << 21),
            emu.peek(CFGR)
        );

        rcc.clock_security_system(true);
        assert_eq!(1 << 19, emu.peek(CR));
    }

    #[test]
    fn rtc_clock_from_hse_needs_valid_prescaler() {
        let (emu, rcc) = rcc();
        assert_eq!(
            Err(ErrorCode::INVAL),
            rcc.rtc_clock_config(RtcClockSource::HSE(1))
        );
        assert_eq!(Ok(()), rcc.rtc_clock_config(RtcClockSource::HSE(25)));
        assert_eq!(25 << 16, emu.peek(CFGR));
        assert_eq!(0b11 << 8, emu.peek(BDCR));

        assert_eq!(Ok(()), rcc.rtc_clock_config(RtcClockSource::LSE));
        rcc.rtc_clock_enable(true);
        assert_eq!((1 << 15) | (0b01 << 8), emu.peek(BDCR));
        assert!(rcc.is_enabled_rtc_clock());

        rcc.backup_reset(true);
        assert_ne!(0, emu.peek(BDCR) & (1 << 16));
    }

    #[test]
    fn interrupt_bits() {
        let (emu, rcc) = rcc();
        assert_eq!(
            Err(ErrorCode::NOSUPPORT),
            rcc.interrupt_enable(RccInterrupt::CSS, true)
        );
        assert_eq!(Ok(()), rcc.interrupt_enable(RccInterrupt::PLLRDY, true));
        assert_eq!(Ok(()), rcc.interrupt_enable(RccInterrupt::HSERDY, true));
        assert_eq!((1 << 12) | (1 << 11), emu.peek(CIR));

        emu.set_bits(CIR, 1 << 4);
        assert!(rcc.interrupt_flag_get(RccInterrupt::PLLRDY));
        rcc.interrupt_flag_clear(RccInterrupt::PLLRDY);
        assert_eq!((1 << 20) | (1 << 12) | (1 << 11), emu.peek(CIR));
    }

    #[test]
    fn reset_flags() {
        let (emu, rcc) = rcc();
        emu.poke(CSR, (1 << 26) | (1 << 27));
        assert!(rcc.flag_get(RccFlag::PINRST));
        assert!(rcc.flag_get(RccFlag::PORRST));
        assert!(!rcc.flag_get(RccFlag::IWDGRST));
        rcc.reset_flags_clear();
        assert_ne!(0, emu.peek(CSR) & (1 << 24));
    }

    #[test]
    fn deinit_restores_reset_values() {
        let (emu, rcc) = rcc();
        emu.poke(CR, (1 << 24) | (1 << 19) | (1 << 18) | (1 << 16));
        emu.poke(CFGR, 0x0000_940A);
        emu.poke(CIR, 0x0000_1F00);
        assert_eq!(Err(ErrorCode::BUSY), rcc.deinit());
        assert_eq!(0x0000_940A, emu.peek(CFGR));

        emu.set_bits(CR, 1 << 1);
        assert_eq!(Ok(()), rcc.deinit());
        assert_eq!(0b11, emu.peek(CR));
        assert_eq!(0, emu.peek(CFGR));
        assert_eq!(0, emu.peek(CIR));
        assert_eq!(0x2400_3010, emu.peek(PLLCFGR));
        assert_eq!(0x2000_3000, emu.peek(PLLI2SCFGR));
    }
}
