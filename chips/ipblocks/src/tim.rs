// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! General purpose, advanced control and basic timers.
//!
//! One register layout covers every instance. Which parts of it exist
//! depends on the [`TimerKind`]: basic timers only have the time base,
//! complementary outputs, the repetition counter and break/dead-time belong to
//! advanced timers, and only 32-bit general purpose timers accept counter,
//! reload and compare values wider than 16 bits. Operations an instance does
//! not support return `Err(ErrorCode::NOSUPPORT)`.

use kernel::platform::chip::ClockInterface;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, Field, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

register_structs! {
    pub TimRegisters {
        /// control register 1
        (0x000 => cr1: ReadWrite<u32, CR1::Register>),
        /// control register 2
        (0x004 => cr2: ReadWrite<u32, CR2::Register>),
        /// slave mode control register
        (0x008 => smcr: ReadWrite<u32, SMCR::Register>),
        /// DMA/Interrupt enable register
        (0x00C => dier: ReadWrite<u32>),
        /// status register
        (0x010 => sr: ReadWrite<u32>),
        /// event generation register
        (0x014 => egr: ReadWrite<u32>),
        /// capture/compare mode register 1
        (0x018 => ccmr1: ReadWrite<u32, CCMR::Register>),
        /// capture/compare mode register 2
        (0x01C => ccmr2: ReadWrite<u32, CCMR::Register>),
        /// capture/compare enable register
        (0x020 => ccer: ReadWrite<u32, CCER::Register>),
        /// counter
        (0x024 => cnt: ReadWrite<u32>),
        /// prescaler
        (0x028 => psc: ReadWrite<u32>),
        /// auto-reload register
        (0x02C => arr: ReadWrite<u32>),
        /// repetition counter register
        (0x030 => rcr: ReadWrite<u32>),
        /// capture/compare registers 1 to 4
        (0x034 => ccr: [ReadWrite<u32>; 4]),
        /// break and dead-time register
        (0x044 => bdtr: ReadWrite<u32, BDTR::Register>),
        /// DMA control register
        (0x048 => dcr: ReadWrite<u32, DCR::Register>),
        /// DMA address for full transfer
        (0x04C => dmar: ReadWrite<u32>),
        /// option register
        (0x050 => or: ReadWrite<u32>),
        (0x054 => @END),
    }
}

register_bitfields![u32,
    CR1 [
        /// Clock division
        CKD OFFSET(8) NUMBITS(2) [],
        /// Auto-reload preload enable
        ARPE OFFSET(7) NUMBITS(1) [],
        /// Center-aligned mode selection
        CMS OFFSET(5) NUMBITS(2) [],
        /// Direction
        DIR OFFSET(4) NUMBITS(1) [],
        /// One-pulse mode
        OPM OFFSET(3) NUMBITS(1) [],
        /// Update request source
        URS OFFSET(2) NUMBITS(1) [],
        /// Update disable
        UDIS OFFSET(1) NUMBITS(1) [],
        /// Counter enable
        CEN OFFSET(0) NUMBITS(1) []
    ],
    CR2 [
        /// Output idle states, OIS1 at bit 8 up to OIS4 at bit 14
        OIS OFFSET(8) NUMBITS(7) [],
        /// TI1 selection
        TI1S OFFSET(7) NUMBITS(1) [],
        /// Master mode selection
        MMS OFFSET(4) NUMBITS(3) [],
        /// Capture/compare DMA selection
        CCDS OFFSET(3) NUMBITS(1) [],
        /// Capture/compare control update selection
        CCUS OFFSET(2) NUMBITS(1) [],
        /// Capture/compare preloaded control
        CCPC OFFSET(0) NUMBITS(1) []
    ],
    SMCR [
        /// External trigger polarity
        ETP OFFSET(15) NUMBITS(1) [],
        /// External clock enable
        ECE OFFSET(14) NUMBITS(1) [],
        /// External trigger prescaler
        ETPS OFFSET(12) NUMBITS(2) [],
        /// External trigger filter
        ETF OFFSET(8) NUMBITS(4) [],
        /// Master/Slave mode
        MSM OFFSET(7) NUMBITS(1) [],
        /// Trigger selection
        TS OFFSET(4) NUMBITS(3) [],
        /// Slave mode selection
        SMS OFFSET(0) NUMBITS(3) []
    ],
    CCMR [
        /// Capture/compare selection of the lower channel. The upper channel
        /// repeats the layout 8 bits higher.
        CCS OFFSET(0) NUMBITS(2) []
    ],
    CCER [
        /// Capture/compare 1 output enable. Every channel uses a nibble.
        CC1E OFFSET(0) NUMBITS(1) []
    ],
    BDTR [
        /// Main output enable
        MOE OFFSET(15) NUMBITS(1) [],
        /// Automatic output enable
        AOE OFFSET(14) NUMBITS(1) [],
        /// Break polarity
        BKP OFFSET(13) NUMBITS(1) [],
        /// Break enable
        BKE OFFSET(12) NUMBITS(1) [],
        /// Off-state selection for Run mode
        OSSR OFFSET(11) NUMBITS(1) [],
        /// Off-state selection for Idle mode
        OSSI OFFSET(10) NUMBITS(1) [],
        /// Lock configuration
        LOCK OFFSET(8) NUMBITS(2) [],
        /// Dead-time generator setup
        DTG OFFSET(0) NUMBITS(8) []
    ],
    DCR [
        /// DMA burst length
        DBL OFFSET(8) NUMBITS(5) [],
        /// DMA base address
        DBA OFFSET(0) NUMBITS(5) []
    ]
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerKind {
    /// TIM1/TIM8, TMR1/TMR8/TMR20, TIMER0/TIMER7
    Advanced,
    /// TIM2/TIM5
    General32,
    /// TIM3/TIM4 and TIM9 to TIM14
    General16,
    /// TIM6/TIM7
    Basic,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CounterMode {
    Up,
    Down,
    CenterAligned1,
    CenterAligned2,
    CenterAligned3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum ClockDivision {
    Div1 = 0b00,
    Div2 = 0b01,
    Div4 = 0b10,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeBaseInit {
    pub prescaler: u16,
    pub counter_mode: CounterMode,
    /// Auto-reload value
    pub period: u32,
    pub clock_division: ClockDivision,
    /// Advanced timers only; ignored elsewhere
    pub repetition_counter: u8,
}

impl Default for TimeBaseInit {
    fn default() -> Self {
        Self {
            prescaler: 0,
            counter_mode: CounterMode::Up,
            period: 0xFFFF,
            clock_division: ClockDivision::Div1,
            repetition_counter: 0,
        }
    }
}

/// When a new prescaler value takes effect.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PrescalerReload {
    /// At the next update event
    Update,
    /// Immediately, by generating an update event
    Immediate,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateSource {
    /// Counter overflow, UG bit and slave mode controller
    Global,
    /// Counter overflow only
    Regular,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OnePulseMode {
    Single,
    Repetitive,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Ch1,
    Ch2,
    Ch3,
    Ch4,
}

impl Channel {
    fn index(self) -> usize {
        match self {
            Channel::Ch1 => 0,
            Channel::Ch2 => 1,
            Channel::Ch3 => 2,
            Channel::Ch4 => 3,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum OcMode {
    Timing = 0b000,
    Active = 0b001,
    Inactive = 0b010,
    Toggle = 0b011,
    ForcedInactive = 0b100,
    ForcedActive = 0b101,
    Pwm1 = 0b110,
    Pwm2 = 0b111,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OcPolarity {
    High,
    Low,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OcInit {
    pub mode: OcMode,
    pub output_state: bool,
    /// Complementary output, advanced timers on channels 1 to 3
    pub output_n_state: bool,
    pub pulse: u32,
    pub polarity: OcPolarity,
    pub n_polarity: OcPolarity,
    /// Output level while MOE is clear, advanced timers only
    pub idle_state: bool,
    pub n_idle_state: bool,
}

impl Default for OcInit {
    fn default() -> Self {
        Self {
            mode: OcMode::Timing,
            output_state: false,
            output_n_state: false,
            pulse: 0,
            polarity: OcPolarity::High,
            n_polarity: OcPolarity::High,
            idle_state: false,
            n_idle_state: false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IcPolarity {
    Rising,
    Falling,
    BothEdge,
}

impl IcPolarity {
    fn opposite(self) -> Self {
        match self {
            IcPolarity::Rising => IcPolarity::Falling,
            IcPolarity::Falling => IcPolarity::Rising,
            IcPolarity::BothEdge => IcPolarity::BothEdge,
        }
    }
}

/// Input mapped onto a capture channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum IcSelection {
    /// TIx onto ICx
    DirectTi = 0b01,
    /// The paired channel's input onto ICx
    IndirectTi = 0b10,
    /// Trigger input (TRC)
    Trc = 0b11,
}

impl IcSelection {
    fn opposite(self) -> Self {
        match self {
            IcSelection::DirectTi => IcSelection::IndirectTi,
            IcSelection::IndirectTi => IcSelection::DirectTi,
            IcSelection::Trc => IcSelection::Trc,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum IcPrescaler {
    Div1 = 0b00,
    Div2 = 0b01,
    Div4 = 0b10,
    Div8 = 0b11,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IcInit {
    pub channel: Channel,
    pub polarity: IcPolarity,
    pub selection: IcSelection,
    pub prescaler: IcPrescaler,
    /// Digital filter, 0 to 15
    pub filter: u8,
}

impl Default for IcInit {
    fn default() -> Self {
        Self {
            channel: Channel::Ch1,
            polarity: IcPolarity::Rising,
            selection: IcSelection::DirectTi,
            prescaler: IcPrescaler::Div1,
            filter: 0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum LockLevel {
    Off = 0b00,
    Level1 = 0b01,
    Level2 = 0b10,
    Level3 = 0b11,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BdtrInit {
    pub off_state_run: bool,
    pub off_state_idle: bool,
    pub lock_level: LockLevel,
    pub dead_time: u8,
    pub break_enable: bool,
    /// `true` for an active high break input
    pub break_polarity_high: bool,
    pub automatic_output: bool,
}

impl Default for BdtrInit {
    fn default() -> Self {
        Self {
            off_state_run: false,
            off_state_idle: false,
            lock_level: LockLevel::Off,
            dead_time: 0,
            break_enable: false,
            break_polarity_high: false,
            automatic_output: false,
        }
    }
}

/// Interrupt sources, as DIER/SR bit positions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum TimInterrupt {
    Update = 0,
    Cc1 = 1,
    Cc2 = 2,
    Cc3 = 3,
    Cc4 = 4,
    Com = 5,
    Trigger = 6,
    Break = 7,
}

/// Status flags, as SR bit positions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum TimFlag {
    Update = 0,
    Cc1 = 1,
    Cc2 = 2,
    Cc3 = 3,
    Cc4 = 4,
    Com = 5,
    Trigger = 6,
    Break = 7,
    Cc1Overcapture = 9,
    Cc2Overcapture = 10,
    Cc3Overcapture = 11,
    Cc4Overcapture = 12,
}

/// Software generated events, as EGR bit positions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum TimEvent {
    Update = 0,
    Cc1 = 1,
    Cc2 = 2,
    Cc3 = 3,
    Cc4 = 4,
    Com = 5,
    Trigger = 6,
    Break = 7,
}

/// DMA request sources, as DIER bit positions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum TimDmaRequest {
    Update = 8,
    Cc1 = 9,
    Cc2 = 10,
    Cc3 = 11,
    Cc4 = 12,
    Com = 13,
    Trigger = 14,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum TriggerSource {
    Itr0 = 0b000,
    Itr1 = 0b001,
    Itr2 = 0b010,
    Itr3 = 0b011,
    /// TI1 edge detector
    Ti1FEd = 0b100,
    Ti1Fp1 = 0b101,
    Ti2Fp2 = 0b110,
    /// External trigger input
    Etrf = 0b111,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum TriggerOutput {
    Reset = 0b000,
    Enable = 0b001,
    Update = 0b010,
    Oc1 = 0b011,
    Oc1Ref = 0b100,
    Oc2Ref = 0b101,
    Oc3Ref = 0b110,
    Oc4Ref = 0b111,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum SlaveMode {
    Disabled = 0b000,
    Encoder1 = 0b001,
    Encoder2 = 0b010,
    Encoder3 = 0b011,
    Reset = 0b100,
    Gated = 0b101,
    Trigger = 0b110,
    External1 = 0b111,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum EncoderMode {
    /// Count on TI1 edges
    Ti1 = 0b001,
    /// Count on TI2 edges
    Ti2 = 0b010,
    /// Count on both
    Ti12 = 0b011,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum EtrPrescaler {
    Off = 0b00,
    Div2 = 0b01,
    Div4 = 0b10,
    Div8 = 0b11,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EtrPolarity {
    NonInverted,
    Inverted,
}

/// Capture/compare mode fields of one channel.
struct CcmrFields {
    selection: Field<u32, CCMR::Register>,
    oc_fast: Field<u32, CCMR::Register>,
    oc_preload: Field<u32, CCMR::Register>,
    oc_mode: Field<u32, CCMR::Register>,
    oc_clear: Field<u32, CCMR::Register>,
    ic_prescaler: Field<u32, CCMR::Register>,
    ic_filter: Field<u32, CCMR::Register>,
}

impl CcmrFields {
    fn of(channel: Channel) -> Self {
        let shift = (channel.index() % 2) * 8;
        Self {
            selection: Field::new(0b11, shift),
            oc_fast: Field::new(0b1, shift + 2),
            oc_preload: Field::new(0b1, shift + 3),
            oc_mode: Field::new(0b111, shift + 4),
            oc_clear: Field::new(0b1, shift + 7),
            ic_prescaler: Field::new(0b11, shift + 2),
            ic_filter: Field::new(0b1111, shift + 4),
        }
    }
}

/// Capture/compare enable fields of one channel.
struct CcerFields {
    enable: Field<u32, CCER::Register>,
    polarity: Field<u32, CCER::Register>,
    n_enable: Field<u32, CCER::Register>,
    n_polarity: Field<u32, CCER::Register>,
}

impl CcerFields {
    fn of(channel: Channel) -> Self {
        let shift = channel.index() * 4;
        Self {
            enable: Field::new(0b1, shift),
            polarity: Field::new(0b1, shift + 1),
            n_enable: Field::new(0b1, shift + 2),
            n_polarity: Field::new(0b1, shift + 3),
        }
    }
}

pub struct Tim<'a> {
    registers: StaticRef<TimRegisters>,
    kind: TimerKind,
    option_register: bool,
    clock: &'a dyn ClockInterface,
}

impl<'a> Tim<'a> {
    pub const fn new(
        registers: StaticRef<TimRegisters>,
        kind: TimerKind,
        clock: &'a dyn ClockInterface,
    ) -> Self {
        Self {
            registers,
            kind,
            option_register: false,
            clock,
        }
    }

    /// Mark the instance as having the input remap option register.
    pub const fn with_option_register(self) -> Self {
        Self {
            option_register: true,
            ..self
        }
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
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

    fn max_count(&self) -> u32 {
        match self.kind {
            TimerKind::General32 => u32::MAX,
            _ => u16::MAX as u32,
        }
    }

    fn check_width(&self, value: u32) -> Result<(), ErrorCode> {
        if value > self.max_count() {
            log::warn!("tim: {:#x} does not fit a 16-bit timer", value);
            return Err(ErrorCode::SIZE);
        }
        Ok(())
    }

    fn require_advanced(&self) -> Result<(), ErrorCode> {
        match self.kind {
            TimerKind::Advanced => Ok(()),
            _ => Err(ErrorCode::NOSUPPORT),
        }
    }

    fn require_channels(&self) -> Result<(), ErrorCode> {
        match self.kind {
            TimerKind::Basic => Err(ErrorCode::NOSUPPORT),
            _ => Ok(()),
        }
    }

    fn ccmr(&self, channel: Channel) -> &ReadWrite<u32, CCMR::Register> {
        if channel.index() < 2 {
            &self.registers.ccmr1
        } else {
            &self.registers.ccmr2
        }
    }

    /* === Time base === */

    /// Program the time base and generate an update event so that the
    /// prescaler and the repetition counter are loaded immediately.
    pub fn time_base_init(&self, init: &TimeBaseInit) -> Result<(), ErrorCode> {
        self.check_width(init.period)?;
        if self.kind == TimerKind::Basic {
            if init.counter_mode != CounterMode::Up || init.clock_division != ClockDivision::Div1
            {
                return Err(ErrorCode::NOSUPPORT);
            }
        } else {
            self.set_counter_mode(init.counter_mode)?;
            self.set_clock_division(init.clock_division)?;
        }

        self.registers.arr.set(init.period);
        self.registers.psc.set(init.prescaler as u32);
        if self.kind == TimerKind::Advanced {
            self.registers.rcr.set(init.repetition_counter as u32);
        }
        self.generate_event(TimEvent::Update)
    }

    pub fn set_prescaler(&self, prescaler: u16, reload: PrescalerReload) {
        self.registers.psc.set(prescaler as u32);
        if reload == PrescalerReload::Immediate {
            self.registers.egr.set(1 << TimEvent::Update as u32);
        }
    }

    pub fn get_prescaler(&self) -> u16 {
        self.registers.psc.get() as u16
    }

    pub fn set_counter_mode(&self, mode: CounterMode) -> Result<(), ErrorCode> {
        self.require_channels()?;
        let value = match mode {
            CounterMode::Up => CR1::DIR::CLEAR + CR1::CMS.val(0),
            CounterMode::Down => CR1::DIR::SET + CR1::CMS.val(0),
            CounterMode::CenterAligned1 => CR1::DIR::CLEAR + CR1::CMS.val(1),
            CounterMode::CenterAligned2 => CR1::DIR::CLEAR + CR1::CMS.val(2),
            CounterMode::CenterAligned3 => CR1::DIR::CLEAR + CR1::CMS.val(3),
        };
        self.registers.cr1.modify(value);
        Ok(())
    }

    pub fn set_counter(&self, value: u32) -> Result<(), ErrorCode> {
        self.check_width(value)?;
        self.registers.cnt.set(value);
        Ok(())
    }

    pub fn get_counter(&self) -> u32 {
        self.registers.cnt.get() & self.max_count()
    }

    pub fn set_autoreload(&self, value: u32) -> Result<(), ErrorCode> {
        self.check_width(value)?;
        self.registers.arr.set(value);
        Ok(())
    }

    pub fn get_autoreload(&self) -> u32 {
        self.registers.arr.get()
    }

    pub fn set_clock_division(&self, division: ClockDivision) -> Result<(), ErrorCode> {
        self.require_channels()?;
        self.registers.cr1.modify(CR1::CKD.val(division as u32));
        Ok(())
    }

    pub fn auto_reload_preload(&self, enable: bool) {
        self.registers.cr1.modify(if enable {
            CR1::ARPE::SET
        } else {
            CR1::ARPE::CLEAR
        });
    }

    pub fn update_disable(&self, disable: bool) {
        self.registers.cr1.modify(if disable {
            CR1::UDIS::SET
        } else {
            CR1::UDIS::CLEAR
        });
    }

    pub fn update_request_source(&self, source: UpdateSource) {
        self.registers.cr1.modify(match source {
            UpdateSource::Global => CR1::URS::CLEAR,
            UpdateSource::Regular => CR1::URS::SET,
        });
    }

    pub fn one_pulse_mode(&self, mode: OnePulseMode) {
        self.registers.cr1.modify(match mode {
            OnePulseMode::Single => CR1::OPM::SET,
            OnePulseMode::Repetitive => CR1::OPM::CLEAR,
        });
    }

    pub fn enable(&self) {
        self.registers.cr1.modify(CR1::CEN::SET);
    }

    pub fn disable(&self) {
        self.registers.cr1.modify(CR1::CEN::CLEAR);
    }

    pub fn is_enabled(&self) -> bool {
        self.registers.cr1.is_set(CR1::CEN)
    }

    /* === Output compare === */

    /// Configure `channel` as an output compare channel.
    ///
    /// The channel is disabled while its mode is changed and enabled again
    /// according to `output_state`.
    pub fn oc_init(&self, channel: Channel, init: &OcInit) -> Result<(), ErrorCode> {
        self.require_channels()?;
        self.check_width(init.pulse)?;
        let uses_complementary = init.output_n_state || init.idle_state || init.n_idle_state;
        if uses_complementary && self.kind != TimerKind::Advanced {
            return Err(ErrorCode::NOSUPPORT);
        }
        if init.output_n_state && channel == Channel::Ch4 {
            return Err(ErrorCode::NOSUPPORT);
        }

        let ccer = CcerFields::of(channel);
        self.registers.ccer.modify(ccer.enable.val(0));

        let ccmr = CcmrFields::of(channel);
        self.ccmr(channel)
            .modify(ccmr.selection.val(0) + ccmr.oc_mode.val(init.mode as u32));

        let mut value = ccer.enable.val(init.output_state as u32)
            + ccer.polarity.val((init.polarity == OcPolarity::Low) as u32);
        if self.kind == TimerKind::Advanced && channel != Channel::Ch4 {
            value = value
                + ccer.n_enable.val(init.output_n_state as u32)
                + ccer.n_polarity.val((init.n_polarity == OcPolarity::Low) as u32);
        }

        if self.kind == TimerKind::Advanced {
            let shift = channel.index() * 2;
            let mut ois = self.registers.cr2.read(CR2::OIS);
            ois &= !(0b11 << shift);
            ois |= (init.idle_state as u32) << shift;
            if channel != Channel::Ch4 {
                ois |= (init.n_idle_state as u32) << (shift + 1);
            }
            self.registers.cr2.modify(CR2::OIS.val(ois));
        }

        self.registers.ccr[channel.index()].set(init.pulse);
        self.registers.ccer.modify(value);
        Ok(())
    }

    pub fn select_oc_mode(&self, channel: Channel, mode: OcMode) -> Result<(), ErrorCode> {
        self.require_channels()?;
        let ccer = CcerFields::of(channel);
        self.registers.ccer.modify(ccer.enable.val(0));
        let ccmr = CcmrFields::of(channel);
        self.ccmr(channel)
            .modify(ccmr.selection.val(0) + ccmr.oc_mode.val(mode as u32));
        Ok(())
    }

    pub fn set_compare(&self, channel: Channel, value: u32) -> Result<(), ErrorCode> {
        self.require_channels()?;
        self.check_width(value)?;
        self.registers.ccr[channel.index()].set(value);
        Ok(())
    }

    pub fn get_compare(&self, channel: Channel) -> Result<u32, ErrorCode> {
        self.require_channels()?;
        Ok(self.registers.ccr[channel.index()].get())
    }

    /// Force the output reference high (`active`) or low.
    pub fn forced_output(&self, channel: Channel, active: bool) -> Result<(), ErrorCode> {
        self.require_channels()?;
        let mode = if active {
            OcMode::ForcedActive
        } else {
            OcMode::ForcedInactive
        };
        let ccmr = CcmrFields::of(channel);
        self.ccmr(channel).modify(ccmr.oc_mode.val(mode as u32));
        Ok(())
    }

    pub fn oc_preload(&self, channel: Channel, enable: bool) -> Result<(), ErrorCode> {
        self.require_channels()?;
        let ccmr = CcmrFields::of(channel);
        self.ccmr(channel).modify(ccmr.oc_preload.val(enable as u32));
        Ok(())
    }

    pub fn oc_fast(&self, channel: Channel, enable: bool) -> Result<(), ErrorCode> {
        self.require_channels()?;
        let ccmr = CcmrFields::of(channel);
        self.ccmr(channel).modify(ccmr.oc_fast.val(enable as u32));
        Ok(())
    }

    /// Clear the output reference on an ETRF high level.
    pub fn oc_clear(&self, channel: Channel, enable: bool) -> Result<(), ErrorCode> {
        self.require_channels()?;
        let ccmr = CcmrFields::of(channel);
        self.ccmr(channel).modify(ccmr.oc_clear.val(enable as u32));
        Ok(())
    }

    pub fn oc_polarity(&self, channel: Channel, polarity: OcPolarity) -> Result<(), ErrorCode> {
        self.require_channels()?;
        let ccer = CcerFields::of(channel);
        self.registers
            .ccer
            .modify(ccer.polarity.val((polarity == OcPolarity::Low) as u32));
        Ok(())
    }

    pub fn oc_n_polarity(&self, channel: Channel, polarity: OcPolarity) -> Result<(), ErrorCode> {
        self.require_advanced()?;
        if channel == Channel::Ch4 {
            return Err(ErrorCode::NOSUPPORT);
        }
        let ccer = CcerFields::of(channel);
        self.registers
            .ccer
            .modify(ccer.n_polarity.val((polarity == OcPolarity::Low) as u32));
        Ok(())
    }

    pub fn cc_enable(&self, channel: Channel, enable: bool) -> Result<(), ErrorCode> {
        self.require_channels()?;
        let ccer = CcerFields::of(channel);
        self.registers.ccer.modify(ccer.enable.val(enable as u32));
        Ok(())
    }

    pub fn ccn_enable(&self, channel: Channel, enable: bool) -> Result<(), ErrorCode> {
        self.require_advanced()?;
        if channel == Channel::Ch4 {
            return Err(ErrorCode::NOSUPPORT);
        }
        let ccer = CcerFields::of(channel);
        self.registers.ccer.modify(ccer.n_enable.val(enable as u32));
        Ok(())
    }

    /* === Input capture === */

    fn configure_input(
        &self,
        channel: Channel,
        polarity: IcPolarity,
        selection: IcSelection,
        filter: u8,
    ) -> Result<(), ErrorCode> {
        if filter > 0xF {
            return Err(ErrorCode::INVAL);
        }
        let ccer = CcerFields::of(channel);
        self.registers.ccer.modify(ccer.enable.val(0));

        let ccmr = CcmrFields::of(channel);
        self.ccmr(channel)
            .modify(ccmr.selection.val(selection as u32) + ccmr.ic_filter.val(filter as u32));

        let (p, np) = match polarity {
            IcPolarity::Rising => (0, 0),
            IcPolarity::Falling => (1, 0),
            IcPolarity::BothEdge => (1, 1),
        };
        self.registers
            .ccer
            .modify(ccer.polarity.val(p) + ccer.n_polarity.val(np) + ccer.enable.val(1));
        Ok(())
    }

    pub fn ic_init(&self, init: &IcInit) -> Result<(), ErrorCode> {
        self.require_channels()?;
        self.configure_input(init.channel, init.polarity, init.selection, init.filter)?;
        self.set_ic_prescaler(init.channel, init.prescaler)
    }

    /// Measure period and duty cycle of one signal: `init.channel` (1 or 2)
    /// captures as requested and the paired channel captures the opposite
    /// edge of the same input.
    pub fn pwm_input_config(&self, init: &IcInit) -> Result<(), ErrorCode> {
        self.require_channels()?;
        let paired = match init.channel {
            Channel::Ch1 => Channel::Ch2,
            Channel::Ch2 => Channel::Ch1,
            _ => return Err(ErrorCode::INVAL),
        };
        self.ic_init(init)?;
        self.ic_init(&IcInit {
            channel: paired,
            polarity: init.polarity.opposite(),
            selection: init.selection.opposite(),
            ..*init
        })
    }

    pub fn set_ic_prescaler(
        &self,
        channel: Channel,
        prescaler: IcPrescaler,
    ) -> Result<(), ErrorCode> {
        self.require_channels()?;
        let ccmr = CcmrFields::of(channel);
        self.ccmr(channel)
            .modify(ccmr.ic_prescaler.val(prescaler as u32));
        Ok(())
    }

    pub fn get_capture(&self, channel: Channel) -> Result<u32, ErrorCode> {
        self.get_compare(channel)
    }

    /* === Break and dead time === */

    pub fn bdtr_config(&self, init: &BdtrInit) -> Result<(), ErrorCode> {
        self.require_advanced()?;
        self.registers.bdtr.write(
            BDTR::OSSR.val(init.off_state_run as u32)
                + BDTR::OSSI.val(init.off_state_idle as u32)
                + BDTR::LOCK.val(init.lock_level as u32)
                + BDTR::DTG.val(init.dead_time as u32)
                + BDTR::BKE.val(init.break_enable as u32)
                + BDTR::BKP.val(init.break_polarity_high as u32)
                + BDTR::AOE.val(init.automatic_output as u32),
        );
        Ok(())
    }

    pub fn main_output(&self, enable: bool) -> Result<(), ErrorCode> {
        self.require_advanced()?;
        self.registers.bdtr.modify(BDTR::MOE.val(enable as u32));
        Ok(())
    }

    /// Update the preloaded capture/compare control bits on a trigger input
    /// rising edge as well as on COMG.
    pub fn select_com(&self, enable: bool) -> Result<(), ErrorCode> {
        self.require_advanced()?;
        self.registers.cr2.modify(CR2::CCUS.val(enable as u32));
        Ok(())
    }

    pub fn cc_preload_control(&self, enable: bool) -> Result<(), ErrorCode> {
        self.require_advanced()?;
        self.registers.cr2.modify(CR2::CCPC.val(enable as u32));
        Ok(())
    }

    /* === Interrupts, flags and events === */

    fn check_source(&self, bit: u32) -> Result<(), ErrorCode> {
        let advanced_only = bit == TimFlag::Com as u32 || bit == TimFlag::Break as u32;
        if advanced_only && self.kind != TimerKind::Advanced {
            return Err(ErrorCode::NOSUPPORT);
        }
        let channel_source = bit != TimFlag::Update as u32;
        if channel_source && self.kind == TimerKind::Basic {
            return Err(ErrorCode::NOSUPPORT);
        }
        Ok(())
    }

    pub fn interrupt_enable(&self, interrupt: TimInterrupt, enable: bool) -> Result<(), ErrorCode> {
        let bit = interrupt as u32;
        self.check_source(bit)?;
        let dier = self.registers.dier.get();
        if enable {
            self.registers.dier.set(dier | (1 << bit));
        } else {
            self.registers.dier.set(dier & !(1 << bit));
        }
        Ok(())
    }

    pub fn generate_event(&self, event: TimEvent) -> Result<(), ErrorCode> {
        let bit = event as u32;
        self.check_source(bit)?;
        self.registers.egr.set(1 << bit);
        Ok(())
    }

    pub fn get_flag(&self, flag: TimFlag) -> bool {
        self.registers.sr.get() & (1 << flag as u32) != 0
    }

    /// The status bits are cleared by writing zero, other bits are written
    /// one to leave them untouched.
    pub fn clear_flag(&self, flag: TimFlag) {
        self.registers.sr.set(!(1 << flag as u32));
    }

    pub fn get_interrupt_status(&self, interrupt: TimInterrupt) -> bool {
        let mask = 1 << interrupt as u32;
        self.registers.sr.get() & mask != 0 && self.registers.dier.get() & mask != 0
    }

    /* === DMA === */

    /// Configure DMA bursts: `base` is the register offset in words from CR1,
    /// `burst_length` the number of transfers (1 to 18).
    pub fn dma_config(&self, base: u8, burst_length: u8) -> Result<(), ErrorCode> {
        self.require_channels()?;
        if base > 0x14 || !(1..=18).contains(&burst_length) {
            return Err(ErrorCode::INVAL);
        }
        self.registers
            .dcr
            .write(DCR::DBA.val(base as u32) + DCR::DBL.val(burst_length as u32 - 1));
        Ok(())
    }

    pub fn dma_request(&self, request: TimDmaRequest, enable: bool) -> Result<(), ErrorCode> {
        let bit = request as u32;
        if bit == TimDmaRequest::Com as u32 {
            self.require_advanced()?;
        } else if bit != TimDmaRequest::Update as u32 {
            self.require_channels()?;
        }
        let dier = self.registers.dier.get();
        if enable {
            self.registers.dier.set(dier | (1 << bit));
        } else {
            self.registers.dier.set(dier & !(1 << bit));
        }
        Ok(())
    }

    /// Send capture/compare DMA requests on update events instead of on
    /// capture/compare events.
    pub fn select_cc_dma(&self, on_update: bool) -> Result<(), ErrorCode> {
        self.require_channels()?;
        self.registers.cr2.modify(CR2::CCDS.val(on_update as u32));
        Ok(())
    }

    /* === Clock sources and synchronisation === */

    /// Clock the prescaler from the internal timer clock.
    pub fn internal_clock(&self) {
        self.registers.smcr.modify(SMCR::SMS.val(SlaveMode::Disabled as u32));
    }

    /// Clock the counter from another timer through an internal trigger.
    pub fn itr_external_clock(&self, trigger: TriggerSource) -> Result<(), ErrorCode> {
        let internal = matches!(
            trigger,
            TriggerSource::Itr0 | TriggerSource::Itr1 | TriggerSource::Itr2 | TriggerSource::Itr3
        );
        if !internal {
            return Err(ErrorCode::INVAL);
        }
        self.select_input_trigger(trigger)?;
        self.select_slave_mode(SlaveMode::External1)
    }

    /// Clock the counter from a timer input pin.
    pub fn ti_external_clock(
        &self,
        source: TriggerSource,
        polarity: IcPolarity,
        filter: u8,
    ) -> Result<(), ErrorCode> {
        self.require_channels()?;
        let channel = match source {
            TriggerSource::Ti1FEd | TriggerSource::Ti1Fp1 => Channel::Ch1,
            TriggerSource::Ti2Fp2 => Channel::Ch2,
            _ => return Err(ErrorCode::INVAL),
        };
        self.configure_input(channel, polarity, IcSelection::DirectTi, filter)?;
        self.select_input_trigger(source)?;
        self.select_slave_mode(SlaveMode::External1)
    }

    pub fn etr_config(
        &self,
        prescaler: EtrPrescaler,
        polarity: EtrPolarity,
        filter: u8,
    ) -> Result<(), ErrorCode> {
        self.require_channels()?;
        if filter > 0xF {
            return Err(ErrorCode::INVAL);
        }
        self.registers.smcr.modify(
            SMCR::ETPS.val(prescaler as u32)
                + SMCR::ETP.val((polarity == EtrPolarity::Inverted) as u32)
                + SMCR::ETF.val(filter as u32),
        );
        Ok(())
    }

    /// External clock mode 1: ETRF through the slave mode controller.
    pub fn etr_clock_mode1(
        &self,
        prescaler: EtrPrescaler,
        polarity: EtrPolarity,
        filter: u8,
    ) -> Result<(), ErrorCode> {
        self.etr_config(prescaler, polarity, filter)?;
        self.registers.smcr.modify(
            SMCR::SMS.val(SlaveMode::External1 as u32) + SMCR::TS.val(TriggerSource::Etrf as u32),
        );
        Ok(())
    }

    /// External clock mode 2: ETRF clocks the counter directly, leaving the
    /// slave mode controller free.
    pub fn etr_clock_mode2(
        &self,
        prescaler: EtrPrescaler,
        polarity: EtrPolarity,
        filter: u8,
    ) -> Result<(), ErrorCode> {
        self.etr_config(prescaler, polarity, filter)?;
        self.registers.smcr.modify(SMCR::ECE::SET);
        Ok(())
    }

    pub fn select_input_trigger(&self, trigger: TriggerSource) -> Result<(), ErrorCode> {
        self.require_channels()?;
        self.registers.smcr.modify(SMCR::TS.val(trigger as u32));
        Ok(())
    }

    /// Basic timers only provide `Reset`, `Enable` and `Update`.
    pub fn select_output_trigger(&self, output: TriggerOutput) -> Result<(), ErrorCode> {
        if self.kind == TimerKind::Basic && output as u32 > TriggerOutput::Update as u32 {
            return Err(ErrorCode::NOSUPPORT);
        }
        self.registers.cr2.modify(CR2::MMS.val(output as u32));
        Ok(())
    }

    pub fn select_slave_mode(&self, mode: SlaveMode) -> Result<(), ErrorCode> {
        self.require_channels()?;
        self.registers.smcr.modify(SMCR::SMS.val(mode as u32));
        Ok(())
    }

    pub fn master_slave_mode(&self, enable: bool) -> Result<(), ErrorCode> {
        self.require_channels()?;
        self.registers.smcr.modify(SMCR::MSM.val(enable as u32));
        Ok(())
    }

    /* === Encoder and hall sensor === */

    pub fn encoder_interface_config(
        &self,
        mode: EncoderMode,
        ic1_polarity: IcPolarity,
        ic2_polarity: IcPolarity,
    ) -> Result<(), ErrorCode> {
        self.require_channels()?;
        self.registers.smcr.modify(SMCR::SMS.val(mode as u32));

        let ch1 = CcmrFields::of(Channel::Ch1);
        let ch2 = CcmrFields::of(Channel::Ch2);
        self.registers.ccmr1.modify(
            ch1.selection.val(IcSelection::DirectTi as u32)
                + ch2.selection.val(IcSelection::DirectTi as u32),
        );

        let cc1 = CcerFields::of(Channel::Ch1);
        let cc2 = CcerFields::of(Channel::Ch2);
        self.registers.ccer.modify(
            cc1.polarity.val((ic1_polarity != IcPolarity::Rising) as u32)
                + cc1.n_polarity.val((ic1_polarity == IcPolarity::BothEdge) as u32)
                + cc2.polarity.val((ic2_polarity != IcPolarity::Rising) as u32)
                + cc2.n_polarity.val((ic2_polarity == IcPolarity::BothEdge) as u32),
        );
        Ok(())
    }

    /// Connect TI1 to the XOR of the CH1, CH2 and CH3 pins.
    pub fn select_hall_sensor(&self, enable: bool) -> Result<(), ErrorCode> {
        self.require_channels()?;
        self.registers.cr2.modify(CR2::TI1S.val(enable as u32));
        Ok(())
    }

    /// Write the input remap option register.
    pub fn remap(&self, value: u32) -> Result<(), ErrorCode> {
        if !self.option_register {
            return Err(ErrorCode::NOSUPPORT);
        }
        self.registers.or.set(value);
        Ok(())
    }
}
