// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Reset and clock unit (RCU).
//!
//! The GD32F4 clock tree: the IRC16M and HXTAL high speed oscillators, the
//! IRC32K and LXTAL low speed oscillators, the main PLL and the I2S PLL, the
//! CK_SYS multiplexer, the bus prescalers and the peripheral clock gates.
//!
//! The HXTAL frequency is a property of the board. It defaults to 25 MHz and
//! is only used to compute frequencies.

use core::cell::Cell;

use kernel::config::CONFIG;
use kernel::platform::chip::ClockInterface;
use kernel::utilities::poll;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

register_structs! {
    pub RcuRegisters {
        /// control register
        (0x000 => ctl: ReadWrite<u32, CTL::Register>),
        /// PLL register
        (0x004 => pll: ReadWrite<u32, PLL::Register>),
        /// clock configuration register 0
        (0x008 => cfg0: ReadWrite<u32, CFG0::Register>),
        /// clock interrupt register
        (0x00C => int: ReadWrite<u32, INT::Register>),
        /// AHB1 reset register
        (0x010 => ahb1rst: ReadWrite<u32>),
        /// AHB2 reset register
        (0x014 => ahb2rst: ReadWrite<u32>),
        /// AHB3 reset register
        (0x018 => ahb3rst: ReadWrite<u32>),
        (0x01C => _reserved0),
        /// APB1 reset register
        (0x020 => apb1rst: ReadWrite<u32>),
        /// APB2 reset register
        (0x024 => apb2rst: ReadWrite<u32>),
        (0x028 => _reserved1),
        /// AHB1 enable register
        (0x030 => ahb1en: ReadWrite<u32>),
        /// AHB2 enable register
        (0x034 => ahb2en: ReadWrite<u32>),
        /// AHB3 enable register
        (0x038 => ahb3en: ReadWrite<u32>),
        (0x03C => _reserved2),
        /// APB1 enable register
        (0x040 => apb1en: ReadWrite<u32>),
        /// APB2 enable register
        (0x044 => apb2en: ReadWrite<u32>),
        (0x048 => _reserved3),
        /// AHB1 sleep mode enable register
        (0x050 => ahb1spen: ReadWrite<u32>),
        /// AHB2 sleep mode enable register
        (0x054 => ahb2spen: ReadWrite<u32>),
        /// AHB3 sleep mode enable register
        (0x058 => ahb3spen: ReadWrite<u32>),
        (0x05C => _reserved4),
        /// APB1 sleep mode enable register
        (0x060 => apb1spen: ReadWrite<u32>),
        /// APB2 sleep mode enable register
        (0x064 => apb2spen: ReadWrite<u32>),
        (0x068 => _reserved5),
        /// backup domain control register
        (0x070 => bdctl: ReadWrite<u32, BDCTL::Register>),
        /// reset source / clock register
        (0x074 => rstsck: ReadWrite<u32, RSTSCK::Register>),
        (0x078 => _reserved6),
        /// PLLI2S register
        (0x084 => plli2s: ReadWrite<u32, PLLI2S::Register>),
        /// PLLSAI register
        (0x088 => pllsai: ReadWrite<u32>),
        /// clock configuration register 1
        (0x08C => cfg1: ReadWrite<u32, CFG1::Register>),
        (0x090 => _reserved7),
        /// additional clock control register
        (0x2C0 => addctl: ReadWrite<u32, ADDCTL::Register>),
        (0x2C4 => @END),
    }
}

register_bitfields![u32,
    CTL [
        PLLI2SSTB OFFSET(27) NUMBITS(1) [],
        PLLI2SEN OFFSET(26) NUMBITS(1) [],
        PLLSTB OFFSET(25) NUMBITS(1) [],
        PLLEN OFFSET(24) NUMBITS(1) [],
        /// HXTAL clock monitor enable
        CKMEN OFFSET(19) NUMBITS(1) [],
        HXTALBPS OFFSET(18) NUMBITS(1) [],
        HXTALSTB OFFSET(17) NUMBITS(1) [],
        HXTALEN OFFSET(16) NUMBITS(1) [],
        IRC16MCALIB OFFSET(8) NUMBITS(8) [],
        IRC16MADJ OFFSET(3) NUMBITS(5) [],
        IRC16MSTB OFFSET(1) NUMBITS(1) [],
        IRC16MEN OFFSET(0) NUMBITS(1) []
    ],
    PLL [
        PLLQ OFFSET(24) NUMBITS(4) [],
        PLLSEL OFFSET(22) NUMBITS(1) [
            IRC16M = 0,
            HXTAL = 1
        ],
        PLLP OFFSET(16) NUMBITS(2) [],
        PLLN OFFSET(6) NUMBITS(9) [],
        PLLPSC OFFSET(0) NUMBITS(6) []
    ],
    CFG0 [
        CKOUT1SEL OFFSET(30) NUMBITS(2) [],
        CKOUT1DIV OFFSET(27) NUMBITS(3) [],
        CKOUT0DIV OFFSET(24) NUMBITS(3) [],
        /// I2S clock source: PLLI2S or the I2S_CKIN pin
        I2SSEL OFFSET(23) NUMBITS(1) [],
        CKOUT0SEL OFFSET(21) NUMBITS(2) [],
        RTCDIV OFFSET(16) NUMBITS(5) [],
        APB2PSC OFFSET(13) NUMBITS(3) [],
        APB1PSC OFFSET(10) NUMBITS(3) [],
        AHBPSC OFFSET(4) NUMBITS(4) [],
        /// system clock switch status
        SCSS OFFSET(2) NUMBITS(2) [],
        /// system clock switch
        SCS OFFSET(0) NUMBITS(2) []
    ],
    INT [
        CKMIC OFFSET(23) NUMBITS(1) [],
        /// stabilization interrupt clear bits
        STBIC OFFSET(16) NUMBITS(7) [],
        /// stabilization interrupt enable bits
        STBIE OFFSET(8) NUMBITS(7) [],
        CKMIF OFFSET(7) NUMBITS(1) [],
        /// stabilization interrupt flags
        STBIF OFFSET(0) NUMBITS(7) []
    ],
    BDCTL [
        BKPRST OFFSET(16) NUMBITS(1) [],
        RTCEN OFFSET(15) NUMBITS(1) [],
        RTCSRC OFFSET(8) NUMBITS(2) [],
        LXTALBPS OFFSET(2) NUMBITS(1) [],
        LXTALSTB OFFSET(1) NUMBITS(1) [],
        LXTALEN OFFSET(0) NUMBITS(1) []
    ],
    RSTSCK [
        LPRSTF OFFSET(31) NUMBITS(1) [],
        WWDGTRSTF OFFSET(30) NUMBITS(1) [],
        FWDGTRSTF OFFSET(29) NUMBITS(1) [],
        SWRSTF OFFSET(28) NUMBITS(1) [],
        PORRSTF OFFSET(27) NUMBITS(1) [],
        EPRSTF OFFSET(26) NUMBITS(1) [],
        BORRSTF OFFSET(25) NUMBITS(1) [],
        /// reset flags clear
        RSTFC OFFSET(24) NUMBITS(1) [],
        IRC32KSTB OFFSET(1) NUMBITS(1) [],
        IRC32KEN OFFSET(0) NUMBITS(1) []
    ],
    PLLI2S [
        PLLI2SR OFFSET(28) NUMBITS(3) [],
        PLLI2SN OFFSET(6) NUMBITS(9) []
    ],
    CFG1 [
        /// timer clock selection
        TIMSEL OFFSET(24) NUMBITS(1) []
    ],
    ADDCTL [
        IRC48MSTB OFFSET(17) NUMBITS(1) [],
        IRC48MEN OFFSET(16) NUMBITS(1) [],
        /// PLL48M source: PLLQ (0) or PLLSAIP (1)
        PLL48MSEL OFFSET(1) NUMBITS(1) [],
        /// CK48M source: PLL48M (0) or IRC48M (1)
        CK48MSEL OFFSET(0) NUMBITS(1) []
    ]
];

pub const IRC16M_FREQUENCY_HZ: u32 = 16_000_000;
pub const IRC48M_FREQUENCY_HZ: u32 = 48_000_000;
const DEFAULT_HXTAL_FREQUENCY_HZ: u32 = 25_000_000;

const PLL_RESET_VALUE: u32 = 0x2400_3010;
const PLLI2S_RESET_VALUE: u32 = 0x2400_3000;
const PLLSAI_RESET_VALUE: u32 = 0x2400_3010;

const PLL_VCO_INPUT_HZ: core::ops::RangeInclusive<u64> = 1_000_000..=2_000_000;
const PLL_VCO_OUTPUT_HZ: core::ops::RangeInclusive<u64> = 100_000_000..=500_000_000;

/// CK_SYS sources
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysClockSource {
    IRC16M = 0b00,
    HXTAL = 0b01,
    PLLP = 0b10,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllSource {
    IRC16M = 0,
    HXTAL = 1,
}

/// Operating mode of an external oscillator.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OscillatorMode {
    Off,
    Crystal,
    Bypass,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllP {
    DivideBy2 = 0b00,
    DivideBy4 = 0b01,
    DivideBy6 = 0b10,
    DivideBy8 = 0b11,
}

impl From<PllP> for u32 {
    fn from(item: PllP) -> Self {
        (item as u32 + 1) << 1
    }
}

/// Main PLL settings: CK_PLLP = source / `psc` * `n` / `p`, CK_PLLQ =
/// source / `psc` * `n` / `q`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllConfig {
    pub source: PllSource,
    pub psc: u8,
    pub n: u16,
    pub p: PllP,
    pub q: u8,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AhbPrescaler {
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

impl AhbPrescaler {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0b1000 => AhbPrescaler::DivideBy2,
            0b1001 => AhbPrescaler::DivideBy4,
            0b1010 => AhbPrescaler::DivideBy8,
            0b1011 => AhbPrescaler::DivideBy16,
            0b1100 => AhbPrescaler::DivideBy64,
            0b1101 => AhbPrescaler::DivideBy128,
            0b1110 => AhbPrescaler::DivideBy256,
            0b1111 => AhbPrescaler::DivideBy512,
            _ => AhbPrescaler::DivideBy1,
        }
    }

    pub fn divider(self) -> u32 {
        match self {
            AhbPrescaler::DivideBy1 => 1,
            // 0b1000 + k divides by 2^(k+1), with 32 skipped
            AhbPrescaler::DivideBy2
            | AhbPrescaler::DivideBy4
            | AhbPrescaler::DivideBy8
            | AhbPrescaler::DivideBy16 => 1 << ((self as u32 & 0b111) + 1),
            _ => 1 << ((self as u32 & 0b111) + 2),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApbPrescaler {
    DivideBy1 = 0b000,
    DivideBy2 = 0b100,
    DivideBy4 = 0b101,
    DivideBy8 = 0b110,
    DivideBy16 = 0b111,
}

impl ApbPrescaler {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0b100 => ApbPrescaler::DivideBy2,
            0b101 => ApbPrescaler::DivideBy4,
            0b110 => ApbPrescaler::DivideBy8,
            0b111 => ApbPrescaler::DivideBy16,
            _ => ApbPrescaler::DivideBy1,
        }
    }

    pub fn divider(self) -> u32 {
        match self {
            ApbPrescaler::DivideBy1 => 1,
            _ => 1 << ((self as u32 & 0b11) + 1),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CkOut0Source {
    IRC16M = 0b00,
    LXTAL = 0b01,
    HXTAL = 0b10,
    PLLP = 0b11,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CkOut1Source {
    SystemClock = 0b00,
    PLLI2SR = 0b01,
    HXTAL = 0b10,
    PLLP = 0b11,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CkOutDivider {
    DivideBy1 = 0b000,
    DivideBy2 = 0b100,
    DivideBy3 = 0b101,
    DivideBy4 = 0b110,
    DivideBy5 = 0b111,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RtcClockSource {
    LXTAL,
    IRC32K,
    /// HXTAL divided by 2..=31
    HXTAL(u8),
}

/// Timer clock selection (CFG1.TIMSEL).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerClockMultiplier {
    /// CK_TIMER is twice CK_APBx unless the APB prescaler is 1
    Twice,
    /// CK_TIMER is CK_AHB for APB prescalers 1, 2 and 4, else 4 × CK_APBx
    FourTimes,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ck48mSource {
    /// PLLQ output
    PllQ,
    /// PLLSAI P output
    PllSaiP,
    IRC48M,
}

/// Stabilization and clock monitor interrupts. The discriminant is the flag
/// bit in INT; the enable bit is 8 above it and the clear bit 16 above it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RcuInterrupt {
    IRC32KSTB = 0,
    LXTALSTB = 1,
    IRC16MSTB = 2,
    HXTALSTB = 3,
    PLLSTB = 4,
    PLLI2SSTB = 5,
    PLLSAISTB = 6,
    /// HXTAL clock stuck. Raised whenever the clock monitor is on.
    CKM = 7,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RcuFlag {
    IRC16MSTB,
    HXTALSTB,
    PLLSTB,
    PLLI2SSTB,
    LXTALSTB,
    IRC32KSTB,
    IRC48MSTB,
    BORRST,
    EPRST,
    PORRST,
    SWRST,
    FWDGTRST,
    WWDGTRST,
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

/// AHB1 peripherals, by bit in the enable, reset and sleep enable registers.
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
    TCMSRAM = 20,
    DMA0 = 21,
    DMA1 = 22,
    IPA = 23,
    ENET = 25,
    ENETTX = 26,
    ENETRX = 27,
    ENETPTP = 28,
    USBHS = 29,
    USBHSULPI = 30,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HCLK2 {
    DCI = 0,
    TRNG = 6,
    USBFS = 7,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HCLK3 {
    EXMC = 0,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PCLK1 {
    TIMER1 = 0,
    TIMER2 = 1,
    TIMER3 = 2,
    TIMER4 = 3,
    TIMER5 = 4,
    TIMER6 = 5,
    TIMER11 = 6,
    TIMER12 = 7,
    TIMER13 = 8,
    WWDGT = 11,
    SPI1 = 14,
    SPI2 = 15,
    USART1 = 17,
    USART2 = 18,
    UART3 = 19,
    UART4 = 20,
    I2C0 = 21,
    I2C1 = 22,
    I2C2 = 23,
    CAN0 = 25,
    CAN1 = 26,
    PMU = 28,
    DAC = 29,
    UART6 = 30,
    UART7 = 31,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PCLK2 {
    TIMER0 = 0,
    TIMER7 = 1,
    USART0 = 4,
    USART5 = 5,
    ADC0 = 8,
    ADC1 = 9,
    ADC2 = 10,
    SDIO = 11,
    SPI0 = 12,
    SPI3 = 13,
    SYSCFG = 14,
    TIMER8 = 16,
    TIMER9 = 17,
    TIMER10 = 18,
    SPI4 = 20,
    SPI5 = 21,
    TLI = 26,
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
            PeripheralClockType::APB1(p) => (p as u32) <= PCLK1::TIMER13 as u32,
            PeripheralClockType::APB2(p) => matches!(
                p,
                PCLK2::TIMER0 | PCLK2::TIMER7 | PCLK2::TIMER8 | PCLK2::TIMER9 | PCLK2::TIMER10
            ),
            _ => false,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockFrequencies {
    pub ck_sys_hz: u32,
    pub ck_ahb_hz: u32,
    pub ck_apb1_hz: u32,
    pub ck_apb2_hz: u32,
}

enum Gate {
    Enable,
    Reset,
    Sleep,
}

pub struct Rcu {
    registers: StaticRef<RcuRegisters>,
    hxtal_frequency_hz: Cell<u32>,
}

impl Rcu {
    pub const fn new(registers: StaticRef<RcuRegisters>) -> Self {
        Self {
            registers,
            hxtal_frequency_hz: Cell::new(DEFAULT_HXTAL_FREQUENCY_HZ),
        }
    }

    pub fn set_hxtal_frequency(&self, hz: u32) {
        self.hxtal_frequency_hz.set(hz);
    }

    /// Restore the reset clock configuration. CK_SYS goes back to IRC16M and
    /// every PLL and the HXTAL are switched off.
    pub fn deinit(&self) -> Result<(), ErrorCode> {
        self.registers.ctl.modify(CTL::IRC16MEN::SET);
        self.wait_for_irc16m_ready()?;

        self.registers.cfg0.set(0);
        self.registers.ctl.modify(
            CTL::HXTALEN::CLEAR + CTL::CKMEN::CLEAR + CTL::PLLEN::CLEAR + CTL::PLLI2SEN::CLEAR,
        );
        self.registers.pll.set(PLL_RESET_VALUE);
        self.registers.plli2s.set(PLLI2S_RESET_VALUE);
        self.registers.pllsai.set(PLLSAI_RESET_VALUE);
        self.registers.ctl.modify(CTL::HXTALBPS::CLEAR);
        self.registers.int.set(0);
        self.registers.cfg1.set(0);
        self.registers.addctl.modify(
            ADDCTL::CK48MSEL::CLEAR + ADDCTL::PLL48MSEL::CLEAR + ADDCTL::IRC48MEN::CLEAR,
        );
        log::debug!("rcu: clock tree back to reset configuration");
        Ok(())
    }

    /* === Oscillators === */

    pub fn hxtal_config(&self, mode: OscillatorMode) {
        self.registers
            .ctl
            .modify(CTL::HXTALEN::CLEAR + CTL::HXTALBPS::CLEAR);
        match mode {
            OscillatorMode::Off => {}
            OscillatorMode::Crystal => self.registers.ctl.modify(CTL::HXTALEN::SET),
            OscillatorMode::Bypass => self
                .registers
                .ctl
                .modify(CTL::HXTALBPS::SET + CTL::HXTALEN::SET),
        }
    }

    pub fn wait_for_hxtal_ready(&self) -> Result<(), ErrorCode> {
        poll::wait_until(CONFIG.hse_startup_timeout, || {
            self.registers.ctl.is_set(CTL::HXTALSTB)
        })
        .inspect_err(|_| log::warn!("rcu: HXTAL did not stabilize"))
    }

    pub fn irc16m_enable(&self, enable: bool) {
        self.registers.ctl.modify(if enable {
            CTL::IRC16MEN::SET
        } else {
            CTL::IRC16MEN::CLEAR
        });
    }

    pub fn wait_for_irc16m_ready(&self) -> Result<(), ErrorCode> {
        poll::wait_until(CONFIG.hsi_startup_timeout, || {
            self.registers.ctl.is_set(CTL::IRC16MSTB)
        })
        .inspect_err(|_| log::warn!("rcu: IRC16M did not stabilize"))
    }

    /// IRC16M trim adjustment, 0..=31.
    pub fn irc16m_adjust(&self, adjust: u8) -> Result<(), ErrorCode> {
        if adjust > 0x1F {
            return Err(ErrorCode::INVAL);
        }
        self.registers
            .ctl
            .modify(CTL::IRC16MADJ.val(adjust as u32));
        Ok(())
    }

    pub fn lxtal_config(&self, mode: OscillatorMode) {
        self.registers
            .bdctl
            .modify(BDCTL::LXTALEN::CLEAR + BDCTL::LXTALBPS::CLEAR);
        match mode {
            OscillatorMode::Off => {}
            OscillatorMode::Crystal => self.registers.bdctl.modify(BDCTL::LXTALEN::SET),
            OscillatorMode::Bypass => self
                .registers
                .bdctl
                .modify(BDCTL::LXTALBPS::SET + BDCTL::LXTALEN::SET),
        }
    }

    pub fn wait_for_lxtal_ready(&self) -> Result<(), ErrorCode> {
        poll::wait_until(CONFIG.lse_startup_timeout, || {
            self.registers.bdctl.is_set(BDCTL::LXTALSTB)
        })
        .inspect_err(|_| log::warn!("rcu: LXTAL did not stabilize"))
    }

    pub fn irc32k_enable(&self, enable: bool) {
        self.registers.rstsck.modify(if enable {
            RSTSCK::IRC32KEN::SET
        } else {
            RSTSCK::IRC32KEN::CLEAR
        });
    }

    pub fn wait_for_irc32k_ready(&self) -> Result<(), ErrorCode> {
        poll::wait_until(CONFIG.lsi_startup_timeout, || {
            self.registers.rstsck.is_set(RSTSCK::IRC32KSTB)
        })
        .inspect_err(|_| log::warn!("rcu: IRC32K did not stabilize"))
    }

    /* === PLLs === */

    pub fn pll_config(&self, config: &PllConfig) -> Result<(), ErrorCode> {
        if self.registers.ctl.is_set(CTL::PLLEN) {
            log::warn!("rcu: PLL must be off to be reconfigured");
            return Err(ErrorCode::FAIL);
        }
        if !(2..=63).contains(&config.psc)
            || !(64..=500).contains(&config.n)
            || !(2..=15).contains(&config.q)
        {
            log::warn!("rcu: PLL factors out of range: {:?}", config);
            return Err(ErrorCode::INVAL);
        }
        let source_hz = match config.source {
            PllSource::IRC16M => IRC16M_FREQUENCY_HZ,
            PllSource::HXTAL => self.hxtal_frequency_hz.get(),
        } as u64;
        let vco_input = source_hz / config.psc as u64;
        let vco_output = vco_input * config.n as u64;
        if !PLL_VCO_INPUT_HZ.contains(&vco_input) || !PLL_VCO_OUTPUT_HZ.contains(&vco_output) {
            log::warn!("rcu: PLL VCO {} Hz from {} Hz input", vco_output, vco_input);
            return Err(ErrorCode::INVAL);
        }
        self.registers.pll.write(
            PLL::PLLSEL.val(config.source as u32)
                + PLL::PLLPSC.val(config.psc as u32)
                + PLL::PLLN.val(config.n as u32)
                + PLL::PLLP.val(config.p as u32)
                + PLL::PLLQ.val(config.q as u32),
        );
        Ok(())
    }

    pub fn get_pll_config(&self) -> PllConfig {
        let pll = self.registers.pll.extract();
        PllConfig {
            source: match pll.read_as_enum(PLL::PLLSEL) {
                Some(PLL::PLLSEL::Value::HXTAL) => PllSource::HXTAL,
                _ => PllSource::IRC16M,
            },
            psc: pll.read(PLL::PLLPSC) as u8,
            n: pll.read(PLL::PLLN) as u16,
            p: match pll.read(PLL::PLLP) {
                0b00 => PllP::DivideBy2,
                0b01 => PllP::DivideBy4,
                0b10 => PllP::DivideBy6,
                _ => PllP::DivideBy8,
            },
            q: pll.read(PLL::PLLQ) as u8,
        }
    }

    pub fn pll_enable(&self) -> Result<(), ErrorCode> {
        self.registers.ctl.modify(CTL::PLLEN::SET);
        poll::wait_until(CONFIG.pll_lock_timeout, || {
            self.registers.ctl.is_set(CTL::PLLSTB)
        })
        .inspect_err(|_| log::warn!("rcu: PLL did not lock"))
    }

    pub fn pll_disable(&self) {
        self.registers.ctl.modify(CTL::PLLEN::CLEAR);
    }

    /// VCO output of the main PLL, or 0 if the prescaler is unprogrammed.
    fn pll_vco_hz(&self, config: &PllConfig) -> u64 {
        let source = match config.source {
            PllSource::IRC16M => IRC16M_FREQUENCY_HZ,
            PllSource::HXTAL => self.hxtal_frequency_hz.get(),
        } as u64;
        if config.psc == 0 {
            return 0;
        }
        source / config.psc as u64 * config.n as u64
    }

    pub fn plli2s_config(&self, n: u16, r: u8) -> Result<(), ErrorCode> {
        if self.registers.ctl.is_set(CTL::PLLI2SEN) {
            return Err(ErrorCode::FAIL);
        }
        if !(50..=500).contains(&n) || !(2..=7).contains(&r) {
            return Err(ErrorCode::INVAL);
        }
        self.registers
            .plli2s
            .write(PLLI2S::PLLI2SN.val(n as u32) + PLLI2S::PLLI2SR.val(r as u32));
        Ok(())
    }

    pub fn plli2s_enable(&self) -> Result<(), ErrorCode> {
        self.registers.ctl.modify(CTL::PLLI2SEN::SET);
        poll::wait_until(CONFIG.pll_lock_timeout, || {
            self.registers.ctl.is_set(CTL::PLLI2SSTB)
        })
        .inspect_err(|_| log::warn!("rcu: PLLI2S did not lock"))
    }

    pub fn plli2s_disable(&self) {
        self.registers.ctl.modify(CTL::PLLI2SEN::CLEAR);
    }

    /// Select the I2S clock: PLLI2S (false) or the I2S_CKIN pin (true).
    pub fn i2s_clock_external(&self, external: bool) {
        self.registers.cfg0.modify(CFG0::I2SSEL.val(external as u32));
    }

    /* === 48 MHz clock === */

    pub fn irc48m_enable(&self, enable: bool) -> Result<(), ErrorCode> {
        if !enable {
            self.registers.addctl.modify(ADDCTL::IRC48MEN::CLEAR);
            return Ok(());
        }
        self.registers.addctl.modify(ADDCTL::IRC48MEN::SET);
        poll::wait_until(CONFIG.hsi_startup_timeout, || {
            self.registers.addctl.is_set(ADDCTL::IRC48MSTB)
        })
        .inspect_err(|_| log::warn!("rcu: IRC48M did not stabilize"))
    }

    /// Select the source of CK48M, the USBFS/USBHS, SDIO and TRNG clock.
    pub fn ck48m_clock_select(&self, source: Ck48mSource) {
        self.registers.addctl.modify(match source {
            Ck48mSource::PllQ => ADDCTL::CK48MSEL::CLEAR + ADDCTL::PLL48MSEL::CLEAR,
            Ck48mSource::PllSaiP => ADDCTL::CK48MSEL::CLEAR + ADDCTL::PLL48MSEL::SET,
            Ck48mSource::IRC48M => ADDCTL::CK48MSEL::SET,
        });
    }

    /* === System clock and buses === */

    pub fn get_sys_clock_source(&self) -> SysClockSource {
        match self.registers.cfg0.read(CFG0::SCSS) {
            0b00 => SysClockSource::IRC16M,
            0b01 => SysClockSource::HXTAL,
            _ => SysClockSource::PLLP,
        }
    }

    /// Switch CK_SYS. The FMC wait states must be raised first when the
    /// frequency goes up.
    pub fn set_sys_clock_source(&self, source: SysClockSource) -> Result<(), ErrorCode> {
        self.registers.cfg0.modify(CFG0::SCS.val(source as u32));
        poll::wait_until(CONFIG.clock_switch_timeout, || {
            self.registers.cfg0.read(CFG0::SCSS) == source as u32
        })
        .inspect_err(|_| log::warn!("rcu: switch to {:?} timed out", source))
    }

    pub fn set_ahb_prescaler(&self, prescaler: AhbPrescaler) {
        self.registers
            .cfg0
            .modify(CFG0::AHBPSC.val(prescaler as u32));
    }

    pub fn get_ahb_prescaler(&self) -> AhbPrescaler {
        AhbPrescaler::from_bits(self.registers.cfg0.read(CFG0::AHBPSC))
    }

    pub fn set_apb1_prescaler(&self, prescaler: ApbPrescaler) {
        self.registers
            .cfg0
            .modify(CFG0::APB1PSC.val(prescaler as u32));
    }

    pub fn get_apb1_prescaler(&self) -> ApbPrescaler {
        ApbPrescaler::from_bits(self.registers.cfg0.read(CFG0::APB1PSC))
    }

    pub fn set_apb2_prescaler(&self, prescaler: ApbPrescaler) {
        self.registers
            .cfg0
            .modify(CFG0::APB2PSC.val(prescaler as u32));
    }

    pub fn get_apb2_prescaler(&self) -> ApbPrescaler {
        ApbPrescaler::from_bits(self.registers.cfg0.read(CFG0::APB2PSC))
    }

    pub fn get_clocks_freq(&self) -> ClockFrequencies {
        let ck_sys_hz = match self.get_sys_clock_source() {
            SysClockSource::IRC16M => IRC16M_FREQUENCY_HZ,
            SysClockSource::HXTAL => self.hxtal_frequency_hz.get(),
            SysClockSource::PLLP => {
                let config = self.get_pll_config();
                (self.pll_vco_hz(&config) / u32::from(config.p) as u64) as u32
            }
        };
        let ck_ahb_hz = ck_sys_hz / self.get_ahb_prescaler().divider();
        ClockFrequencies {
            ck_sys_hz,
            ck_ahb_hz,
            ck_apb1_hz: ck_ahb_hz / self.get_apb1_prescaler().divider(),
            ck_apb2_hz: ck_ahb_hz / self.get_apb2_prescaler().divider(),
        }
    }

    pub fn set_timer_clock_multiplier(&self, multiplier: TimerClockMultiplier) {
        self.registers.cfg1.modify(match multiplier {
            TimerClockMultiplier::Twice => CFG1::TIMSEL::CLEAR,
            TimerClockMultiplier::FourTimes => CFG1::TIMSEL::SET,
        });
    }

    pub fn get_timer_clock_multiplier(&self) -> TimerClockMultiplier {
        if self.registers.cfg1.is_set(CFG1::TIMSEL) {
            TimerClockMultiplier::FourTimes
        } else {
            TimerClockMultiplier::Twice
        }
    }

    /* === Peripheral gates === */

    fn gate(&self, clock: PeripheralClockType, gate: Gate) -> &ReadWrite<u32> {
        let regs = &*self.registers;
        match clock {
            PeripheralClockType::AHB1(_) => match gate {
                Gate::Enable => &regs.ahb1en,
                Gate::Reset => &regs.ahb1rst,
                Gate::Sleep => &regs.ahb1spen,
            },
            PeripheralClockType::AHB2(_) => match gate {
                Gate::Enable => &regs.ahb2en,
                Gate::Reset => &regs.ahb2rst,
                Gate::Sleep => &regs.ahb2spen,
            },
            PeripheralClockType::AHB3(_) => match gate {
                Gate::Enable => &regs.ahb3en,
                Gate::Reset => &regs.ahb3rst,
                Gate::Sleep => &regs.ahb3spen,
            },
            PeripheralClockType::APB1(_) => match gate {
                Gate::Enable => &regs.apb1en,
                Gate::Reset => &regs.apb1rst,
                Gate::Sleep => &regs.apb1spen,
            },
            PeripheralClockType::APB2(_) => match gate {
                Gate::Enable => &regs.apb2en,
                Gate::Reset => &regs.apb2rst,
                Gate::Sleep => &regs.apb2spen,
            },
        }
    }

    fn write_gate(&self, clock: PeripheralClockType, gate: Gate, set: bool) {
        let register = self.gate(clock, gate);
        let value = if set {
            register.get() | clock.mask()
        } else {
            register.get() & !clock.mask()
        };
        register.set(value);
    }

    pub fn peripheral_clock_enable(&self, clock: PeripheralClockType, enable: bool) {
        self.write_gate(clock, Gate::Enable, enable);
    }

    pub fn is_enabled_peripheral_clock(&self, clock: PeripheralClockType) -> bool {
        self.gate(clock, Gate::Enable).get() & clock.mask() != 0
    }

    pub fn peripheral_reset(&self, clock: PeripheralClockType, reset: bool) {
        self.write_gate(clock, Gate::Reset, reset);
    }

    pub fn peripheral_sleep_clock_enable(&self, clock: PeripheralClockType, enable: bool) {
        self.write_gate(clock, Gate::Sleep, enable);
    }

    /* === Clock monitor, outputs, RTC === */

    pub fn clock_monitor(&self, enable: bool) {
        self.registers.ctl.modify(CTL::CKMEN.val(enable as u32));
    }

    pub fn ckout0_config(&self, source: CkOut0Source, divider: CkOutDivider) {
        self.registers
            .cfg0
            .modify(CFG0::CKOUT0SEL.val(source as u32) + CFG0::CKOUT0DIV.val(divider as u32));
    }

    pub fn ckout1_config(&self, source: CkOut1Source, divider: CkOutDivider) {
        self.registers
            .cfg0
            .modify(CFG0::CKOUT1SEL.val(source as u32) + CFG0::CKOUT1DIV.val(divider as u32));
    }

    pub fn rtc_clock_config(&self, source: RtcClockSource) -> Result<(), ErrorCode> {
        let rtcsrc = match source {
            RtcClockSource::LXTAL => 0b01,
            RtcClockSource::IRC32K => 0b10,
            RtcClockSource::HXTAL(divider) => {
                if !(2..=31).contains(&divider) {
                    return Err(ErrorCode::INVAL);
                }
                self.registers
                    .cfg0
                    .modify(CFG0::RTCDIV.val(divider as u32));
                0b11
            }
        };
        self.registers.bdctl.modify(BDCTL::RTCSRC.val(rtcsrc));
        Ok(())
    }

    pub fn rtc_clock_enable(&self, enable: bool) {
        self.registers.bdctl.modify(BDCTL::RTCEN.val(enable as u32));
    }

    pub fn backup_reset(&self, reset: bool) {
        self.registers.bdctl.modify(BDCTL::BKPRST.val(reset as u32));
    }

    /* === Interrupts and flags === */

    pub fn interrupt_enable(&self, interrupt: RcuInterrupt, enable: bool) -> Result<(), ErrorCode> {
        if interrupt == RcuInterrupt::CKM {
            return Err(ErrorCode::NOSUPPORT);
        }
        let mask = 1 << interrupt as u32;
        let enables = self.registers.int.read(INT::STBIE);
        let enables = if enable { enables | mask } else { enables & !mask };
        self.registers.int.write(INT::STBIE.val(enables));
        Ok(())
    }

    pub fn interrupt_flag_get(&self, interrupt: RcuInterrupt) -> bool {
        self.registers.int.get() & (1 << interrupt as u32) != 0
    }

    pub fn interrupt_flag_clear(&self, interrupt: RcuInterrupt) {
        let enables = INT::STBIE.val(self.registers.int.read(INT::STBIE));
        self.registers.int.write(
            enables
                + if interrupt == RcuInterrupt::CKM {
                    INT::CKMIC::SET
                } else {
                    INT::STBIC.val(1 << interrupt as u32)
                },
        );
    }

    pub fn flag_get(&self, flag: RcuFlag) -> bool {
        let ctl = &self.registers.ctl;
        let rstsck = &self.registers.rstsck;
        match flag {
            RcuFlag::IRC16MSTB => ctl.is_set(CTL::IRC16MSTB),
            RcuFlag::HXTALSTB => ctl.is_set(CTL::HXTALSTB),
            RcuFlag::PLLSTB => ctl.is_set(CTL::PLLSTB),
            RcuFlag::PLLI2SSTB => ctl.is_set(CTL::PLLI2SSTB),
            RcuFlag::LXTALSTB => self.registers.bdctl.is_set(BDCTL::LXTALSTB),
            RcuFlag::IRC32KSTB => rstsck.is_set(RSTSCK::IRC32KSTB),
            RcuFlag::IRC48MSTB => self.registers.addctl.is_set(ADDCTL::IRC48MSTB),
            RcuFlag::BORRST => rstsck.is_set(RSTSCK::BORRSTF),
            RcuFlag::EPRST => rstsck.is_set(RSTSCK::EPRSTF),
            RcuFlag::PORRST => rstsck.is_set(RSTSCK::PORRSTF),
            RcuFlag::SWRST => rstsck.is_set(RSTSCK::SWRSTF),
            RcuFlag::FWDGTRST => rstsck.is_set(RSTSCK::FWDGTRSTF),
            RcuFlag::WWDGTRST => rstsck.is_set(RSTSCK::WWDGTRSTF),
            RcuFlag::LPRST => rstsck.is_set(RSTSCK::LPRSTF),
        }
    }

    pub fn reset_flags_clear(&self) {
        self.registers.rstsck.modify(RSTSCK::RSTFC::SET);
    }
}

/// One peripheral's clock gate in the RCU.
pub struct PeripheralClock<'a> {
    pub clock: PeripheralClockType,
    rcu: &'a Rcu,
}

impl<'a> PeripheralClock<'a> {
    pub const fn new(clock: PeripheralClockType, rcu: &'a Rcu) -> Self {
        Self { clock, rcu }
    }

    pub fn reset(&self) {
        self.rcu.peripheral_reset(self.clock, true);
        self.rcu.peripheral_reset(self.clock, false);
    }

    pub fn sleep_enable(&self, enable: bool) {
        self.rcu.peripheral_sleep_clock_enable(self.clock, enable);
    }

    /// Clock frequency seen by the peripheral, in Hz.
    pub fn get_frequency(&self) -> u32 {
        let clocks = self.rcu.get_clocks_freq();
        let (bus_hz, prescaler) = match self.clock {
            PeripheralClockType::AHB1(_)
            | PeripheralClockType::AHB2(_)
            | PeripheralClockType::AHB3(_) => return clocks.ck_ahb_hz,
            PeripheralClockType::APB1(_) => (clocks.ck_apb1_hz, self.rcu.get_apb1_prescaler()),
            PeripheralClockType::APB2(_) => (clocks.ck_apb2_hz, self.rcu.get_apb2_prescaler()),
        };
        if !self.clock.is_timer() {
            return bus_hz;
        }
        match (self.rcu.get_timer_clock_multiplier(), prescaler) {
            (_, ApbPrescaler::DivideBy1) => bus_hz,
            (TimerClockMultiplier::Twice, _) => bus_hz * 2,
            (TimerClockMultiplier::FourTimes, ApbPrescaler::DivideBy2)
            | (TimerClockMultiplier::FourTimes, ApbPrescaler::DivideBy4) => clocks.ck_ahb_hz,
            (TimerClockMultiplier::FourTimes, _) => bus_hz * 4,
        }
    }
}

impl ClockInterface for PeripheralClock<'_> {
    fn is_enabled(&self) -> bool {
        self.rcu.is_enabled_peripheral_clock(self.clock)
    }

    fn enable(&self) {
        self.rcu.peripheral_clock_enable(self.clock, true);
    }

    fn disable(&self) {
        self.rcu.peripheral_clock_enable(self.clock, false);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use kernel::utilities::emulated::EmulatedRegisters;

    const CTL: usize = 0x00;
    const PLL: usize = 0x04;
    const CFG0: usize = 0x08;
    const INT: usize = 0x0C;
    const APB1EN: usize = 0x40;
    const APB2RST: usize = 0x24;
    const APB2EN: usize = 0x44;
    const BDCTL: usize = 0x70;
    const RSTSCK: usize = 0x74;
    const PLLI2S: usize = 0x84;
    const CFG1: usize = 0x8C;
    const ADDCTL: usize = 0x2C0;

    pub(crate) fn rcu() -> (EmulatedRegisters<RcuRegisters>, Rcu) {
        let emu = EmulatedRegisters::new();
        let rcu = Rcu::new(emu.registers());
        (emu, rcu)
    }

    // 25 MHz / 25 * 480 / 2 = 240 MHz, Q = 10 gives 48 MHz
    const PLL_240MHZ: PllConfig = PllConfig {
        source: PllSource::HXTAL,
        psc: 25,
        n: 480,
        p: PllP::DivideBy2,
        q: 10,
    };

    #[test]
    fn pll_ranges() {
        let (emu, rcu) = rcu();
        assert_eq!(
            Err(ErrorCode::INVAL),
            rcu.pll_config(&PllConfig { n: 63, ..PLL_240MHZ })
        );
        assert_eq!(
            Err(ErrorCode::INVAL),
            rcu.pll_config(&PllConfig { psc: 64, ..PLL_240MHZ })
        );
        // 25 MHz / 10 is above the VCO input range
        assert_eq!(
            Err(ErrorCode::INVAL),
            rcu.pll_config(&PllConfig { psc: 10, ..PLL_240MHZ })
        );
        // 1 MHz * 500 is the top of the VCO range
        assert_eq!(
            Ok(()),
            rcu.pll_config(&PllConfig { n: 500, ..PLL_240MHZ })
        );

        assert_eq!(Ok(()), rcu.pll_config(&PLL_240MHZ));
        assert_eq!((10 << 24) | (1 << 22) | (480 << 6) | 25, emu.peek(PLL));
        assert_eq!(PLL_240MHZ, rcu.get_pll_config());

        emu.set_bits(CTL, 1 << 24);
        assert_eq!(Err(ErrorCode::FAIL), rcu.pll_config(&PLL_240MHZ));
    }

    #[test]
    fn pll_and_oscillator_waits() {
        let (emu, rcu) = rcu();
        assert_eq!(Err(ErrorCode::BUSY), rcu.pll_enable());
        emu.set_bits(CTL, 1 << 25);
        assert_eq!(Ok(()), rcu.pll_enable());

        rcu.hxtal_config(OscillatorMode::Bypass);
        assert_eq!((1 << 18) | (1 << 16), emu.peek(CTL) & (0b111 << 16));
        assert_eq!(Err(ErrorCode::BUSY), rcu.wait_for_hxtal_ready());
        emu.set_bits(CTL, 1 << 17);
        assert!(rcu.flag_get(RcuFlag::HXTALSTB));
        assert_eq!(Ok(()), rcu.wait_for_hxtal_ready());

        rcu.irc32k_enable(true);
        assert_eq!(1, emu.peek(RSTSCK));
        assert_eq!(Err(ErrorCode::BUSY), rcu.wait_for_irc32k_ready());
    }

    #[test]
    fn plli2s_ranges() {
        let (emu, rcu) = rcu();
        assert_eq!(Err(ErrorCode::INVAL), rcu.plli2s_config(49, 2));
        assert_eq!(Err(ErrorCode::INVAL), rcu.plli2s_config(501, 2));
        assert_eq!(Err(ErrorCode::INVAL), rcu.plli2s_config(100, 1));
        assert_eq!(Ok(()), rcu.plli2s_config(500, 7));
        assert_eq!((7 << 28) | (500 << 6), emu.peek(PLLI2S));
    }

    #[test]
    fn clock_frequencies() {
        let (emu, rcu) = rcu();
        assert_eq!(16_000_000, rcu.get_clocks_freq().ck_sys_hz);

        assert_eq!(Ok(()), rcu.pll_config(&PLL_240MHZ));
        rcu.set_apb1_prescaler(ApbPrescaler::DivideBy4);
        rcu.set_apb2_prescaler(ApbPrescaler::DivideBy2);
        assert_eq!(Err(ErrorCode::BUSY), rcu.set_sys_clock_source(SysClockSource::PLLP));
        emu.set_bits(CFG0, 0b10 << 2);
        assert_eq!(Ok(()), rcu.set_sys_clock_source(SysClockSource::PLLP));
        assert_eq!(
            ClockFrequencies {
                ck_sys_hz: 240_000_000,
                ck_ahb_hz: 240_000_000,
                ck_apb1_hz: 60_000_000,
                ck_apb2_hz: 120_000_000,
            },
            rcu.get_clocks_freq()
        );

        rcu.set_ahb_prescaler(AhbPrescaler::DivideBy64);
        assert_eq!(AhbPrescaler::DivideBy64, rcu.get_ahb_prescaler());
        assert_eq!(240_000_000 / 64, rcu.get_clocks_freq().ck_ahb_hz);

        rcu.set_hxtal_frequency(8_000_000);
        rcu.set_ahb_prescaler(AhbPrescaler::DivideBy1);
        emu.poke(CFG0, 0b01 << 2);
        assert_eq!(8_000_000, rcu.get_clocks_freq().ck_sys_hz);
    }

    #[test]
    fn peripheral_clock_gates_and_timer_frequency() {
        let (emu, rcu) = rcu();
        let can1 = PeripheralClock::new(PeripheralClockType::APB1(PCLK1::CAN1), &rcu);
        let timer1 = PeripheralClock::new(PeripheralClockType::APB1(PCLK1::TIMER1), &rcu);
        let syscfg = PeripheralClock::new(PeripheralClockType::APB2(PCLK2::SYSCFG), &rcu);

        can1.enable();
        syscfg.enable();
        assert_eq!(1 << 26, emu.peek(APB1EN));
        assert_eq!(1 << 14, emu.peek(APB2EN));
        assert!(can1.is_enabled());
        assert!(!timer1.is_enabled());
        syscfg.reset();
        assert_eq!(0, emu.peek(APB2RST));

        // IRC16M, APB1 / 8
        rcu.set_apb1_prescaler(ApbPrescaler::DivideBy8);
        assert_eq!(2_000_000, can1.get_frequency());
        assert_eq!(4_000_000, timer1.get_frequency());
        rcu.set_timer_clock_multiplier(TimerClockMultiplier::FourTimes);
        assert_eq!(1 << 24, emu.peek(CFG1));
        assert_eq!(8_000_000, timer1.get_frequency());
        rcu.set_apb1_prescaler(ApbPrescaler::DivideBy4);
        assert_eq!(16_000_000, timer1.get_frequency());
    }

    #[test]
    fn ck48m_selection() {
        let (emu, rcu) = rcu();
        rcu.ck48m_clock_select(Ck48mSource::PllSaiP);
        assert_eq!(0b10, emu.peek(ADDCTL));
        rcu.ck48m_clock_select(Ck48mSource::IRC48M);
        assert_eq!(0b11, emu.peek(ADDCTL) & 0b11);
        assert_eq!(Err(ErrorCode::BUSY), rcu.irc48m_enable(true));
        emu.set_bits(ADDCTL, 1 << 17);
        assert_eq!(Ok(()), rcu.irc48m_enable(true));
        assert!(rcu.flag_get(RcuFlag::IRC48MSTB));
    }

    #[test]
    fn outputs_rtc_and_backup_domain() {
        let (emu, rcu) = rcu();
        rcu.ckout0_config(CkOut0Source::HXTAL, CkOutDivider::DivideBy3);
        rcu.ckout1_config(CkOut1Source::PLLP, CkOutDivider::DivideBy1);
        assert_eq!((0b11 << 30) | (0b101 << 24) | (0b10 << 21), emu.peek(CFG0));

        assert_eq!(
            Err(ErrorCode::INVAL),
            rcu.rtc_clock_config(RtcClockSource::HXTAL(32))
        );
        assert_eq!(Ok(()), rcu.rtc_clock_config(RtcClockSource::IRC32K));
        rcu.rtc_clock_enable(true);
        assert_eq!((1 << 15) | (0b10 << 8), emu.peek(BDCTL));
        rcu.backup_reset(true);
        assert_ne!(0, emu.peek(BDCTL) & (1 << 16));
    }

    #[test]
    fn interrupts_and_reset_flags() {
        let (emu, rcu) = rcu();
        assert_eq!(
            Err(ErrorCode::NOSUPPORT),
            rcu.interrupt_enable(RcuInterrupt::CKM, true)
        );
        assert_eq!(Ok(()), rcu.interrupt_enable(RcuInterrupt::PLLSTB, true));
        emu.set_bits(INT, 1 << 4);
        assert!(rcu.interrupt_flag_get(RcuInterrupt::PLLSTB));
        rcu.interrupt_flag_clear(RcuInterrupt::PLLSTB);
        assert_eq!((1 << 20) | (1 << 12), emu.peek(INT));
        rcu.interrupt_flag_clear(RcuInterrupt::CKM);
        assert_eq!((1 << 23) | (1 << 12), emu.peek(INT));

        emu.poke(RSTSCK, 1 << 26);
        assert!(rcu.flag_get(RcuFlag::EPRST));
        assert!(!rcu.flag_get(RcuFlag::PORRST));
        rcu.reset_flags_clear();
        assert_ne!(0, emu.peek(RSTSCK) & (1 << 24));
    }

    #[test]
    fn deinit_restores_reset_values() {
        let (emu, rcu) = rcu();
        assert_eq!(Err(ErrorCode::BUSY), rcu.deinit());

        emu.poke(CTL, (1 << 1) | (1 << 16) | (1 << 18) | (1 << 24));
        emu.poke(CFG0, 0x0000_1C02);
        emu.poke(CFG1, 1 << 24);
        assert_eq!(Ok(()), rcu.deinit());
        assert_eq!((1 << 1) | 1, emu.peek(CTL));
        assert_eq!(0, emu.peek(CFG0));
        assert_eq!(0, emu.peek(CFG1));
        assert_eq!(0x2400_3010, emu.peek(PLL));
        assert_eq!(0x2400_3000, emu.peek(PLLI2S));
    }
}
