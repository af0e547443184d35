// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! 12-bit successive approximation ADC.
//!
//! Each converter has its own register block. The common block (offset
//! 0x300 from the first converter) holds the prescaler, the multi-ADC mode
//! and the internal channel switches shared by all converters.

use core::cell::Cell;

use kernel::config::CONFIG;
use kernel::hil;
use kernel::platform::chip::ClockInterface;
use kernel::utilities::poll;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadOnly, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

register_structs! {
    pub AdcRegisters {
        (0x000 => sr: ReadWrite<u32, SR::Register>),
        (0x004 => cr1: ReadWrite<u32, CR1::Register>),
        (0x008 => cr2: ReadWrite<u32, CR2::Register>),
        /// Sample time of channels 10 to 18
        (0x00C => smpr1: ReadWrite<u32>),
        /// Sample time of channels 0 to 9
        (0x010 => smpr2: ReadWrite<u32>),
        /// Injected channel data offsets
        (0x014 => jofr: [ReadWrite<u32, JOFR::Register>; 4]),
        /// Watchdog higher threshold
        (0x024 => htr: ReadWrite<u32, THRESHOLD::Register>),
        /// Watchdog lower threshold
        (0x028 => ltr: ReadWrite<u32, THRESHOLD::Register>),
        (0x02C => sqr1: ReadWrite<u32, SQR1::Register>),
        (0x030 => sqr2: ReadWrite<u32>),
        (0x034 => sqr3: ReadWrite<u32>),
        (0x038 => jsqr: ReadWrite<u32, JSQR::Register>),
        (0x03C => jdr: [ReadOnly<u32, DR::Register>; 4]),
        (0x04C => dr: ReadOnly<u32, DR::Register>),
        (0x050 => @END),
    }
}

register_structs! {
    pub AdcCommonRegisters {
        (0x000 => csr: ReadOnly<u32>),
        (0x004 => ccr: ReadWrite<u32, CCR::Register>),
        /// Data of the multi-ADC modes
        (0x008 => cdr: ReadOnly<u32>),
        (0x00C => @END),
    }
}

register_bitfields![u32,
    SR [
        /// Overrun
        OVR OFFSET(5) NUMBITS(1) [],
        /// Regular channel start flag
        STRT OFFSET(4) NUMBITS(1) [],
        /// Injected channel start flag
        JSTRT OFFSET(3) NUMBITS(1) [],
        /// Injected channel end of conversion
        JEOC OFFSET(2) NUMBITS(1) [],
        /// Regular channel end of conversion
        EOC OFFSET(1) NUMBITS(1) [],
        /// Analog watchdog flag
        AWD OFFSET(0) NUMBITS(1) []
    ],
    CR1 [
        /// Overrun interrupt enable
        OVRIE OFFSET(26) NUMBITS(1) [],
        /// Resolution
        RES OFFSET(24) NUMBITS(2) [],
        /// Analog watchdog enable on regular channels
        AWDEN OFFSET(23) NUMBITS(1) [],
        /// Analog watchdog enable on injected channels
        JAWDEN OFFSET(22) NUMBITS(1) [],
        /// Discontinuous mode channel count
        DISCNUM OFFSET(13) NUMBITS(3) [],
        /// Discontinuous mode on injected channels
        JDISCEN OFFSET(12) NUMBITS(1) [],
        /// Discontinuous mode on regular channels
        DISCEN OFFSET(11) NUMBITS(1) [],
        /// Automatic injected group conversion
        JAUTO OFFSET(10) NUMBITS(1) [],
        /// Enable the watchdog on a single channel in scan mode
        AWDSGL OFFSET(9) NUMBITS(1) [],
        /// Scan mode
        SCAN OFFSET(8) NUMBITS(1) [],
        /// Interrupt enable for injected channels
        JEOCIE OFFSET(7) NUMBITS(1) [],
        /// Analog watchdog interrupt enable
        AWDIE OFFSET(6) NUMBITS(1) [],
        /// Interrupt enable for EOC
        EOCIE OFFSET(5) NUMBITS(1) [],
        /// Analog watchdog channel select bits
        AWDCH OFFSET(0) NUMBITS(5) []
    ],
    CR2 [
        /// Start conversion of regular channels
        SWSTART OFFSET(30) NUMBITS(1) [],
        /// External trigger enable for regular channels
        EXTEN OFFSET(28) NUMBITS(2) [],
        /// External event select for regular group
        EXTSEL OFFSET(24) NUMBITS(4) [],
        /// Start conversion of injected channels
        JSWSTART OFFSET(22) NUMBITS(1) [],
        /// External trigger enable for injected channels
        JEXTEN OFFSET(20) NUMBITS(2) [],
        /// External event select for injected group
        JEXTSEL OFFSET(16) NUMBITS(4) [],
        /// Data alignment
        ALIGN OFFSET(11) NUMBITS(1) [],
        /// End of conversion selection
        EOCS OFFSET(10) NUMBITS(1) [],
        /// DMA disable selection (for single ADC mode)
        DDS OFFSET(9) NUMBITS(1) [],
        /// Direct memory access mode (for single ADC mode)
        DMA OFFSET(8) NUMBITS(1) [],
        /// Continuous conversion
        CONT OFFSET(1) NUMBITS(1) [],
        /// A/D Converter ON / OFF
        ADON OFFSET(0) NUMBITS(1) []
    ],
    JOFR [
        JOFFSET OFFSET(0) NUMBITS(12) []
    ],
    THRESHOLD [
        VALUE OFFSET(0) NUMBITS(12) []
    ],
    SQR1 [
        /// Regular channel sequence length
        L OFFSET(20) NUMBITS(4) []
    ],
    JSQR [
        /// Injected sequence length
        JL OFFSET(20) NUMBITS(2) []
    ],
    DR [
        DATA OFFSET(0) NUMBITS(16) []
    ],
    CCR [
        /// Temperature sensor and VREFINT enable
        TSVREFE OFFSET(23) NUMBITS(1) [],
        /// VBAT enable
        VBATE OFFSET(22) NUMBITS(1) [],
        /// ADC prescaler
        ADCPRE OFFSET(16) NUMBITS(2) [],
        /// Direct memory access mode for multi ADC mode
        DMA OFFSET(14) NUMBITS(2) [],
        /// DMA disable selection (for multi-ADC mode)
        DDS OFFSET(13) NUMBITS(1) [],
        /// Delay between 2 sampling phases
        DELAY OFFSET(8) NUMBITS(4) [],
        /// Multi ADC mode selection
        MULTI OFFSET(0) NUMBITS(5) []
    ]
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum Channel {
    Channel0 = 0,
    Channel1 = 1,
    Channel2 = 2,
    Channel3 = 3,
    Channel4 = 4,
    Channel5 = 5,
    Channel6 = 6,
    Channel7 = 7,
    Channel8 = 8,
    Channel9 = 9,
    Channel10 = 10,
    Channel11 = 11,
    Channel12 = 12,
    Channel13 = 13,
    Channel14 = 14,
    Channel15 = 15,
    /// Temperature sensor on ADC1
    Channel16 = 16,
    /// VREFINT on ADC1
    Channel17 = 17,
    /// VBAT on ADC1
    Channel18 = 18,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum Resolution {
    Bits12 = 0b00,
    Bits10 = 0b01,
    Bits8 = 0b10,
    Bits6 = 0b11,
}

impl Resolution {
    pub fn bits(self) -> usize {
        match self {
            Resolution::Bits12 => 12,
            Resolution::Bits10 => 10,
            Resolution::Bits8 => 8,
            Resolution::Bits6 => 6,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum TriggerEdge {
    None = 0b00,
    Rising = 0b01,
    Falling = 0b10,
    Both = 0b11,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataAlign {
    Right,
    Left,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum SampleTime {
    Cycles3 = 0b000,
    Cycles15 = 0b001,
    Cycles28 = 0b010,
    Cycles56 = 0b011,
    Cycles84 = 0b100,
    Cycles112 = 0b101,
    Cycles144 = 0b110,
    Cycles480 = 0b111,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AdcInit {
    pub resolution: Resolution,
    pub scan: bool,
    pub continuous: bool,
    pub external_trigger_edge: TriggerEdge,
    /// EXTSEL event, 0 to 15
    pub external_trigger: u8,
    pub data_align: DataAlign,
    /// Length of the regular sequence, 1 to 16
    pub number_of_conversions: u8,
}

impl Default for AdcInit {
    fn default() -> Self {
        Self {
            resolution: Resolution::Bits12,
            scan: false,
            continuous: false,
            external_trigger_edge: TriggerEdge::None,
            external_trigger: 0,
            data_align: DataAlign::Right,
            number_of_conversions: 1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum MultiMode {
    Independent = 0x00,
    DualRegularSimultaneousInjectedSimultaneous = 0x01,
    DualRegularSimultaneousAlternateTrigger = 0x02,
    DualInjectedSimultaneous = 0x05,
    DualRegularSimultaneous = 0x06,
    DualInterleaved = 0x07,
    DualAlternateTrigger = 0x09,
    TripleRegularSimultaneousInjectedSimultaneous = 0x11,
    TripleRegularSimultaneousAlternateTrigger = 0x12,
    TripleInjectedSimultaneous = 0x15,
    TripleRegularSimultaneous = 0x16,
    TripleInterleaved = 0x17,
    TripleAlternateTrigger = 0x19,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum AdcPrescaler {
    Div2 = 0b00,
    Div4 = 0b01,
    Div6 = 0b10,
    Div8 = 0b11,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum DmaAccessMode {
    Disabled = 0b00,
    Mode1 = 0b01,
    Mode2 = 0b10,
    Mode3 = 0b11,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AdcCommonInit {
    pub mode: MultiMode,
    pub prescaler: AdcPrescaler,
    pub dma_access_mode: DmaAccessMode,
    /// ADC clock cycles between two sampling phases in interleaved mode,
    /// 5 to 20
    pub two_sampling_delay: u8,
}

impl Default for AdcCommonInit {
    fn default() -> Self {
        Self {
            mode: MultiMode::Independent,
            prescaler: AdcPrescaler::Div2,
            dma_access_mode: DmaAccessMode::Disabled,
            two_sampling_delay: 5,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnalogWatchdog {
    None,
    SingleRegular,
    SingleInjected,
    SingleRegularOrInjected,
    AllRegular,
    AllInjected,
    AllRegularAllInjected,
}

/// Interrupt sources, as CR1 bit positions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum AdcInterrupt {
    EndOfConversion = 5,
    AnalogWatchdog = 6,
    InjectedEndOfConversion = 7,
    Overrun = 26,
}

impl AdcInterrupt {
    fn flag(self) -> AdcFlag {
        match self {
            AdcInterrupt::EndOfConversion => AdcFlag::EndOfConversion,
            AdcInterrupt::AnalogWatchdog => AdcFlag::AnalogWatchdog,
            AdcInterrupt::InjectedEndOfConversion => AdcFlag::InjectedEndOfConversion,
            AdcInterrupt::Overrun => AdcFlag::Overrun,
        }
    }
}

/// Status flags, as SR bit positions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum AdcFlag {
    AnalogWatchdog = 0,
    EndOfConversion = 1,
    InjectedEndOfConversion = 2,
    InjectedStart = 3,
    RegularStart = 4,
    Overrun = 5,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum AdcStatus {
    Idle,
    Off,
    OneSample,
}

pub struct Adc<'a> {
    registers: StaticRef<AdcRegisters>,
    common_registers: StaticRef<AdcCommonRegisters>,
    clock: &'a dyn ClockInterface,
    status: Cell<AdcStatus>,
    client: Cell<Option<&'a dyn hil::adc::Client>>,
}

impl<'a> Adc<'a> {
    pub const fn new(
        registers: StaticRef<AdcRegisters>,
        common_registers: StaticRef<AdcCommonRegisters>,
        clock: &'a dyn ClockInterface,
    ) -> Self {
        Self {
            registers,
            common_registers,
            clock,
            status: Cell::new(AdcStatus::Off),
            client: Cell::new(None),
        }
    }

    pub fn is_enabled_clock(&self) -> bool {
        self.clock.is_enabled()
    }

    pub fn enable_clock(&self) {
        self.clock.enable();
    }

    pub fn disable_clock(&self) {
        self.clock.disable();
    }

    pub fn init(&self, init: &AdcInit) -> Result<(), ErrorCode> {
        if !(1..=16).contains(&init.number_of_conversions) || init.external_trigger > 0xF {
            log::warn!("adc: rejected init {:?}", init);
            return Err(ErrorCode::INVAL);
        }

        self.registers.cr1.modify(
            CR1::RES.val(init.resolution as u32) + CR1::SCAN.val(init.scan as u32),
        );
        self.registers.cr2.modify(
            CR2::ALIGN.val((init.data_align == DataAlign::Left) as u32)
                + CR2::EXTEN.val(init.external_trigger_edge as u32)
                + CR2::EXTSEL.val(init.external_trigger as u32)
                + CR2::CONT.val(init.continuous as u32),
        );
        self.registers
            .sqr1
            .modify(SQR1::L.val(init.number_of_conversions as u32 - 1));
        Ok(())
    }

    pub fn common_init(&self, init: &AdcCommonInit) -> Result<(), ErrorCode> {
        if !(5..=20).contains(&init.two_sampling_delay) {
            return Err(ErrorCode::INVAL);
        }
        self.common_registers.ccr.modify(
            CCR::MULTI.val(init.mode as u32)
                + CCR::DELAY.val(init.two_sampling_delay as u32 - 5)
                + CCR::DMA.val(init.dma_access_mode as u32)
                + CCR::ADCPRE.val(init.prescaler as u32),
        );
        Ok(())
    }

    pub fn enable(&self) {
        self.registers.cr2.modify(CR2::ADON::SET);
        if self.status.get() == AdcStatus::Off {
            self.status.set(AdcStatus::Idle);
        }
    }

    pub fn disable(&self) {
        self.registers.cr2.modify(CR2::ADON::CLEAR);
        self.status.set(AdcStatus::Off);
    }

    pub fn is_enabled(&self) -> bool {
        self.registers.cr2.is_set(CR2::ADON)
    }

    fn resolution(&self) -> Resolution {
        match self.registers.cr1.read(CR1::RES) {
            0b00 => Resolution::Bits12,
            0b01 => Resolution::Bits10,
            0b10 => Resolution::Bits8,
            _ => Resolution::Bits6,
        }
    }

    fn set_sample_time(&self, channel: Channel, sample_time: SampleTime) {
        let channel = channel as u32;
        let (register, shift) = if channel < 10 {
            (&self.registers.smpr2, channel * 3)
        } else {
            (&self.registers.smpr1, (channel - 10) * 3)
        };
        let value = register.get() & !(0b111 << shift);
        register.set(value | ((sample_time as u32) << shift));
    }

    /* === Regular group === */

    /// Place `channel` at `rank` (1 to 16) of the regular sequence.
    pub fn regular_channel_config(
        &self,
        channel: Channel,
        rank: u8,
        sample_time: SampleTime,
    ) -> Result<(), ErrorCode> {
        if !(1..=16).contains(&rank) {
            return Err(ErrorCode::INVAL);
        }
        self.set_sample_time(channel, sample_time);
        let slot = |value: u32, shift: u32| {
            (value & !(0b11111 << shift)) | ((channel as u32) << shift)
        };
        match rank {
            1..=6 => {
                let shift = 5 * (rank as u32 - 1);
                self.registers.sqr3.set(slot(self.registers.sqr3.get(), shift));
            }
            7..=12 => {
                let shift = 5 * (rank as u32 - 7);
                self.registers.sqr2.set(slot(self.registers.sqr2.get(), shift));
            }
            _ => {
                let shift = 5 * (rank as u32 - 13);
                self.registers.sqr1.set(slot(self.registers.sqr1.get(), shift));
            }
        }
        Ok(())
    }

    pub fn software_start(&self) {
        self.registers.cr2.modify(CR2::SWSTART::SET);
    }

    pub fn is_software_start_pending(&self) -> bool {
        self.registers.cr2.is_set(CR2::SWSTART)
    }

    /// Set EOC after every conversion instead of after the whole sequence.
    pub fn eoc_on_each_conversion(&self, enable: bool) {
        self.registers.cr2.modify(CR2::EOCS.val(enable as u32));
    }

    pub fn continuous_mode(&self, enable: bool) {
        self.registers.cr2.modify(CR2::CONT.val(enable as u32));
    }

    /// Number of regular channels converted per trigger in discontinuous
    /// mode, 1 to 8.
    pub fn discontinuous_mode_count(&self, count: u8) -> Result<(), ErrorCode> {
        if !(1..=8).contains(&count) {
            return Err(ErrorCode::INVAL);
        }
        self.registers
            .cr1
            .modify(CR1::DISCNUM.val(count as u32 - 1));
        Ok(())
    }

    pub fn discontinuous_mode(&self, enable: bool) {
        self.registers.cr1.modify(CR1::DISCEN.val(enable as u32));
    }

    pub fn get_conversion_value(&self) -> u16 {
        self.registers.dr.read(DR::DATA) as u16
    }

    /// Data of the last multi-ADC conversion: ADC1 in the low half and ADC2
    /// in the high half in dual mode.
    pub fn get_multi_mode_conversion_value(&self) -> u32 {
        self.common_registers.cdr.get()
    }

    /// Convert `channel` once and wait for the result.
    pub fn read_blocking(
        &self,
        channel: Channel,
        sample_time: SampleTime,
    ) -> Result<u16, ErrorCode> {
        if !self.is_enabled() {
            return Err(ErrorCode::OFF);
        }
        if self.status.get() == AdcStatus::OneSample {
            return Err(ErrorCode::BUSY);
        }
        self.registers.sqr1.modify(SQR1::L.val(0));
        self.regular_channel_config(channel, 1, sample_time)?;
        self.software_start();

        poll::wait_until(CONFIG.adc_conversion_timeout, || {
            self.registers.sr.is_set(SR::EOC)
        })
        .inspect_err(|_| log::warn!("adc: conversion of {:?} timed out", channel))?;

        Ok(self.get_conversion_value())
    }

    /* === Injected group === */

    /// Number of injected conversions, 1 to 4.
    pub fn injected_sequencer_length(&self, length: u8) -> Result<(), ErrorCode> {
        if !(1..=4).contains(&length) {
            return Err(ErrorCode::INVAL);
        }
        self.registers.jsqr.modify(JSQR::JL.val(length as u32 - 1));
        Ok(())
    }

    /// Place `channel` at `rank` of the injected sequence.
    ///
    /// A sequence shorter than four conversions occupies the last JSQ
    /// fields, so the field used for a rank depends on the programmed
    /// length. Set the length first; ranks beyond it are rejected.
    pub fn injected_channel_config(
        &self,
        channel: Channel,
        rank: u8,
        sample_time: SampleTime,
    ) -> Result<(), ErrorCode> {
        let length = self.registers.jsqr.read(JSQR::JL) + 1;
        if rank == 0 || rank as u32 > length {
            return Err(ErrorCode::INVAL);
        }
        self.set_sample_time(channel, sample_time);
        let shift = 5 * (rank as u32 + 3 - length);
        let value = self.registers.jsqr.get() & !(0b11111 << shift);
        self.registers.jsqr.set(value | ((channel as u32) << shift));
        Ok(())
    }

    /// Offset subtracted from the conversions of injected rank `rank` (1 to 4).
    pub fn set_injected_offset(&self, rank: u8, offset: u16) -> Result<(), ErrorCode> {
        if !(1..=4).contains(&rank) || offset > 0xFFF {
            return Err(ErrorCode::INVAL);
        }
        self.registers.jofr[rank as usize - 1].write(JOFR::JOFFSET.val(offset as u32));
        Ok(())
    }

    pub fn external_trigger_injected(&self, trigger: u8) -> Result<(), ErrorCode> {
        if trigger > 0xF {
            return Err(ErrorCode::INVAL);
        }
        self.registers.cr2.modify(CR2::JEXTSEL.val(trigger as u32));
        Ok(())
    }

    pub fn external_trigger_injected_edge(&self, edge: TriggerEdge) {
        self.registers.cr2.modify(CR2::JEXTEN.val(edge as u32));
    }

    pub fn software_start_injected(&self) {
        self.registers.cr2.modify(CR2::JSWSTART::SET);
    }

    pub fn is_software_start_injected_pending(&self) -> bool {
        self.registers.cr2.is_set(CR2::JSWSTART)
    }

    /// Convert the injected group automatically after the regular group.
    pub fn auto_injected(&self, enable: bool) {
        self.registers.cr1.modify(CR1::JAUTO.val(enable as u32));
    }

    pub fn injected_discontinuous_mode(&self, enable: bool) {
        self.registers.cr1.modify(CR1::JDISCEN.val(enable as u32));
    }

    pub fn get_injected_conversion_value(&self, rank: u8) -> Result<u16, ErrorCode> {
        if !(1..=4).contains(&rank) {
            return Err(ErrorCode::INVAL);
        }
        Ok(self.registers.jdr[rank as usize - 1].read(DR::DATA) as u16)
    }

    /* === Analog watchdog === */

    pub fn analog_watchdog(&self, watchdog: AnalogWatchdog) {
        let (single, regular, injected) = match watchdog {
            AnalogWatchdog::None => (false, false, false),
            AnalogWatchdog::SingleRegular => (true, true, false),
            AnalogWatchdog::SingleInjected => (true, false, true),
            AnalogWatchdog::SingleRegularOrInjected => (true, true, true),
            AnalogWatchdog::AllRegular => (false, true, false),
            AnalogWatchdog::AllInjected => (false, false, true),
            AnalogWatchdog::AllRegularAllInjected => (false, true, true),
        };
        self.registers.cr1.modify(
            CR1::AWDSGL.val(single as u32)
                + CR1::AWDEN.val(regular as u32)
                + CR1::JAWDEN.val(injected as u32),
        );
    }

    pub fn analog_watchdog_thresholds(&self, high: u16, low: u16) -> Result<(), ErrorCode> {
        if high > 0xFFF || low > 0xFFF {
            return Err(ErrorCode::INVAL);
        }
        self.registers.htr.write(THRESHOLD::VALUE.val(high as u32));
        self.registers.ltr.write(THRESHOLD::VALUE.val(low as u32));
        Ok(())
    }

    pub fn analog_watchdog_single_channel(&self, channel: Channel) {
        self.registers.cr1.modify(CR1::AWDCH.val(channel as u32));
    }

    /* === Internal channels === */

    pub fn temp_sensor_vrefint(&self, enable: bool) {
        self.common_registers
            .ccr
            .modify(CCR::TSVREFE.val(enable as u32));
    }

    pub fn vbat(&self, enable: bool) {
        self.common_registers.ccr.modify(CCR::VBATE.val(enable as u32));
    }

    /* === DMA === */

    pub fn dma(&self, enable: bool) {
        self.registers.cr2.modify(CR2::DMA.val(enable as u32));
    }

    /// Keep issuing DMA requests after the last transfer (circular DMA).
    pub fn dma_request_after_last_transfer(&self, enable: bool) {
        self.registers.cr2.modify(CR2::DDS.val(enable as u32));
    }

    pub fn multi_mode_dma_request_after_last_transfer(&self, enable: bool) {
        self.common_registers.ccr.modify(CCR::DDS.val(enable as u32));
    }

    /* === Interrupts and flags === */

    pub fn interrupt_enable(&self, interrupt: AdcInterrupt, enable: bool) {
        let mask = 1 << interrupt as u32;
        let cr1 = self.registers.cr1.get();
        self.registers
            .cr1
            .set(if enable { cr1 | mask } else { cr1 & !mask });
    }

    pub fn get_flag(&self, flag: AdcFlag) -> bool {
        self.registers.sr.get() & (1 << flag as u32) != 0
    }

    /// Status bits are cleared by writing zero.
    pub fn clear_flag(&self, flag: AdcFlag) {
        self.registers.sr.set(!(1 << flag as u32) & 0x3F);
    }

    pub fn get_interrupt_status(&self, interrupt: AdcInterrupt) -> bool {
        let enabled = self.registers.cr1.get() & (1 << interrupt as u32) != 0;
        enabled && self.get_flag(interrupt.flag())
    }

    pub fn handle_interrupt(&self) {
        if self.registers.sr.is_set(SR::EOC) {
            self.registers.cr1.modify(CR1::EOCIE::CLEAR);
            if self.status.get() == AdcStatus::OneSample {
                self.status.set(AdcStatus::Idle);
            }
            let sample = self.left_justified(self.get_conversion_value());
            if let Some(client) = self.client.get() {
                client.sample_ready(sample);
            }
        }
        if self.registers.sr.is_set(SR::OVR) {
            log::warn!("adc: overrun");
            self.clear_flag(AdcFlag::Overrun);
        }
    }

    fn left_justified(&self, raw: u16) -> u16 {
        if self.registers.cr2.is_set(CR2::ALIGN) {
            raw
        } else {
            raw << (16 - self.resolution().bits())
        }
    }
}

impl<'a> hil::adc::Adc<'a> for Adc<'a> {
    type Channel = Channel;

    fn sample(&self, channel: &Self::Channel) -> Result<(), ErrorCode> {
        if self.status.get() == AdcStatus::Off {
            self.enable_clock();
            self.enable();
        }
        if *channel == Channel::Channel16 || *channel == Channel::Channel17 {
            self.temp_sensor_vrefint(true);
        }
        if *channel == Channel::Channel18 {
            self.vbat(true);
        }
        if self.status.get() != AdcStatus::Idle {
            return Err(ErrorCode::BUSY);
        }

        self.status.set(AdcStatus::OneSample);
        self.registers.sqr1.modify(SQR1::L.val(0));
        self.regular_channel_config(*channel, 1, SampleTime::Cycles84)?;
        self.registers.cr1.modify(CR1::EOCIE::SET);
        self.software_start();
        Ok(())
    }

    fn stop_sampling(&self) -> Result<(), ErrorCode> {
        if self.status.get() != AdcStatus::OneSample {
            return Err(ErrorCode::OFF);
        }
        self.registers.cr1.modify(CR1::EOCIE::CLEAR);
        self.status.set(AdcStatus::Idle);
        Ok(())
    }

    fn get_resolution_bits(&self) -> usize {
        self.resolution().bits()
    }

    fn get_voltage_reference_mv(&self) -> Option<usize> {
        Some(3300)
    }

    fn set_client(&self, client: &'a dyn hil::adc::Client) {
        self.client.set(Some(client));
    }
}
