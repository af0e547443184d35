// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Basic extended CAN controller (bxCAN).
//!
//! Three transmit mailboxes, two three-deep receive FIFOs and 28 filter banks.
//! On dual-CAN parts the filter banks live in the register block of the
//! first controller and are split between the two controllers by
//! [`Can::slave_start_bank`].

use core::cell::Cell;

use kernel::config::CONFIG;
use kernel::hil::can::{self, BitTiming, Id, IdentifierMode, OperationMode, ScaleBits};
use kernel::platform::chip::ClockInterface;
use kernel::utilities::poll;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

pub const TX_MAILBOX_COUNT: usize = 3;
pub const RX_FIFO_COUNT: usize = 2;
pub const FILTER_BANK_COUNT: u8 = 28;

register_structs! {
    pub CanRegisters {
        (0x000 => mcr: ReadWrite<u32, MCR::Register>),
        (0x004 => msr: ReadWrite<u32, MSR::Register>),
        (0x008 => tsr: ReadWrite<u32, TSR::Register>),
        /// Receive FIFO 0 and 1
        (0x00C => rfr: [ReadWrite<u32, RFR::Register>; RX_FIFO_COUNT]),
        (0x014 => ier: ReadWrite<u32>),
        (0x018 => esr: ReadWrite<u32, ESR::Register>),
        (0x01C => btr: ReadWrite<u32, BTR::Register>),
        (0x020 => _reserved0),
        (0x180 => tx_mailbox: [TransmitMailbox; TX_MAILBOX_COUNT]),
        (0x1B0 => rx_mailbox: [ReceiveMailbox; RX_FIFO_COUNT]),
        (0x1D0 => _reserved1),
        (0x200 => fmr: ReadWrite<u32, FMR::Register>),
        /// Filter mode, one bit per bank (1: identifier list)
        (0x204 => fm1r: ReadWrite<u32>),
        (0x208 => _reserved2),
        /// Filter scale, one bit per bank (1: single 32-bit)
        (0x20C => fs1r: ReadWrite<u32>),
        (0x210 => _reserved3),
        /// Filter FIFO assignment, one bit per bank
        (0x214 => ffa1r: ReadWrite<u32>),
        (0x218 => _reserved4),
        /// Filter activation, one bit per bank
        (0x21C => fa1r: ReadWrite<u32>),
        (0x220 => _reserved5),
        /// Two registers per filter bank
        (0x240 => firx: [ReadWrite<u32>; 2 * FILTER_BANK_COUNT as usize]),
        (0x320 => @END),
    },

    TransmitMailbox {
        (0x00 => tir: ReadWrite<u32, TIR::Register>),
        (0x04 => tdtr: ReadWrite<u32, TDTR::Register>),
        (0x08 => tdlr: ReadWrite<u32>),
        (0x0C => tdhr: ReadWrite<u32>),
        (0x10 => @END),
    },

    ReceiveMailbox {
        (0x00 => rir: ReadWrite<u32, TIR::Register>),
        (0x04 => rdtr: ReadWrite<u32, RDTR::Register>),
        (0x08 => rdlr: ReadWrite<u32>),
        (0x0C => rdhr: ReadWrite<u32>),
        (0x10 => @END),
    }
}

register_bitfields![u32,
    MCR [
        /// Debug freeze
        DBF OFFSET(16) NUMBITS(1) [],
        /// bxCAN software master reset
        RESET OFFSET(15) NUMBITS(1) [],
        /// Time triggered communication mode
        TTCM OFFSET(7) NUMBITS(1) [],
        /// Automatic bus-off management
        ABOM OFFSET(6) NUMBITS(1) [],
        /// Automatic wakeup mode
        AWUM OFFSET(5) NUMBITS(1) [],
        /// No automatic retransmission
        NART OFFSET(4) NUMBITS(1) [],
        /// Receive FIFO locked mode
        RFLM OFFSET(3) NUMBITS(1) [],
        /// Transmit FIFO priority
        TXFP OFFSET(2) NUMBITS(1) [],
        /// Sleep mode request
        SLEEP OFFSET(1) NUMBITS(1) [],
        /// Initialization request
        INRQ OFFSET(0) NUMBITS(1) []
    ],
    MSR [
        /// Sleep acknowledge interrupt
        SLAKI OFFSET(4) NUMBITS(1) [],
        /// Wakeup interrupt
        WKUI OFFSET(3) NUMBITS(1) [],
        /// Error interrupt
        ERRI OFFSET(2) NUMBITS(1) [],
        /// Sleep acknowledge
        SLAK OFFSET(1) NUMBITS(1) [],
        /// Initialization acknowledge
        INAK OFFSET(0) NUMBITS(1) []
    ],
    TSR [
        /// Transmit mailbox 2 empty
        TME2 OFFSET(28) NUMBITS(1) [],
        /// Transmit mailbox 1 empty
        TME1 OFFSET(27) NUMBITS(1) [],
        /// Transmit mailbox 0 empty
        TME0 OFFSET(26) NUMBITS(1) [],
        /// Abort request for mailbox 2
        ABRQ2 OFFSET(23) NUMBITS(1) [],
        /// Transmission OK of mailbox 2
        TXOK2 OFFSET(17) NUMBITS(1) [],
        /// Request completed mailbox 2
        RQCP2 OFFSET(16) NUMBITS(1) [],
        /// Abort request for mailbox 1
        ABRQ1 OFFSET(15) NUMBITS(1) [],
        /// Transmission OK of mailbox 1
        TXOK1 OFFSET(9) NUMBITS(1) [],
        /// Request completed mailbox 1
        RQCP1 OFFSET(8) NUMBITS(1) [],
        /// Abort request for mailbox 0
        ABRQ0 OFFSET(7) NUMBITS(1) [],
        /// Transmission OK of mailbox 0
        TXOK0 OFFSET(1) NUMBITS(1) [],
        /// Request completed mailbox 0
        RQCP0 OFFSET(0) NUMBITS(1) []
    ],
    RFR [
        /// Release FIFO output mailbox
        RFOM OFFSET(5) NUMBITS(1) [],
        /// FIFO overrun
        FOVR OFFSET(4) NUMBITS(1) [],
        /// FIFO full
        FULL OFFSET(3) NUMBITS(1) [],
        /// FIFO message pending
        FMP OFFSET(0) NUMBITS(2) []
    ],
    ESR [
        /// Receive error counter
        REC OFFSET(24) NUMBITS(8) [],
        /// Least significant byte of the 9-bit transmit error counter
        TEC OFFSET(16) NUMBITS(8) [],
        /// Last error code
        LEC OFFSET(4) NUMBITS(3) [
            NoError = 0,
            StuffError = 1,
            FormError = 2,
            AcknowledgmentError = 3,
            BitRecessiveError = 4,
            BitDominantError = 5,
            CrcError = 6,
            SetBySoftware = 7
        ],
        /// Bus-off flag
        BOFF OFFSET(2) NUMBITS(1) [],
        /// Error passive flag
        EPVF OFFSET(1) NUMBITS(1) [],
        /// Error warning flag
        EWGF OFFSET(0) NUMBITS(1) []
    ],
    BTR [
        /// Silent mode (debug)
        SILM OFFSET(31) NUMBITS(1) [],
        /// Loop back mode (debug)
        LBKM OFFSET(30) NUMBITS(1) [],
        /// Resynchronization jump width
        SJW OFFSET(24) NUMBITS(2) [],
        /// Time segment 2
        TS2 OFFSET(20) NUMBITS(3) [],
        /// Time segment 1
        TS1 OFFSET(16) NUMBITS(4) [],
        /// Baud rate prescaler
        BRP OFFSET(0) NUMBITS(10) []
    ],
    /// Identifier register of both transmit and receive mailboxes
    TIR [
        /// Standard identifier or upper part of the extended identifier
        STID OFFSET(21) NUMBITS(11) [],
        /// Lower part of the extended identifier
        EXID OFFSET(3) NUMBITS(18) [],
        /// Identifier extension
        IDE OFFSET(2) NUMBITS(1) [],
        /// Remote transmission request
        RTR OFFSET(1) NUMBITS(1) [],
        /// Transmit mailbox request
        TXRQ OFFSET(0) NUMBITS(1) []
    ],
    TDTR [
        /// Message time stamp
        TIME OFFSET(16) NUMBITS(16) [],
        /// Transmit global time
        TGT OFFSET(8) NUMBITS(1) [],
        /// Data length code
        DLC OFFSET(0) NUMBITS(4) []
    ],
    RDTR [
        /// Message time stamp
        TIME OFFSET(16) NUMBITS(16) [],
        /// Filter match index
        FMI OFFSET(8) NUMBITS(8) [],
        /// Data length code
        DLC OFFSET(0) NUMBITS(4) []
    ],
    FMR [
        /// First filter bank assigned to the second controller
        CANSB OFFSET(8) NUMBITS(6) [],
        /// Filter initialization mode
        FINIT OFFSET(0) NUMBITS(1) []
    ]
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CanInit {
    pub mode: OperationMode,
    /// Resynchronisation jump width in time quanta, 1 to 4
    pub sjw: u8,
    /// Time segment 1 in time quanta, 1 to 16
    pub bs1: u8,
    /// Time segment 2 in time quanta, 1 to 8
    pub bs2: u8,
    /// Time quantum length in peripheral clock cycles, 1 to 1024
    pub prescaler: u16,
    /// Time triggered communication
    pub ttcm: bool,
    /// Automatic bus-off management
    pub abom: bool,
    /// Automatic wake-up on bus activity
    pub awum: bool,
    /// No automatic retransmission
    pub nart: bool,
    /// Receive FIFO locked: a full FIFO discards new messages
    pub rflm: bool,
    /// Transmit mailboxes by request order instead of identifier priority
    pub txfp: bool,
}

impl Default for CanInit {
    fn default() -> Self {
        Self {
            mode: OperationMode::Normal,
            sjw: 1,
            bs1: 4,
            bs2: 3,
            prescaler: 1,
            ttcm: false,
            abom: false,
            awum: false,
            nart: false,
            rflm: false,
            txfp: false,
        }
    }
}

impl CanInit {
    pub fn with_bit_timing(self, timing: BitTiming) -> Self {
        Self {
            sjw: timing.sync_jump_width as u8,
            bs1: timing.segment1,
            bs2: timing.segment2,
            prescaler: timing.baud_rate_prescaler as u16,
            ..self
        }
    }

    fn bit_timing(&self) -> BitTiming {
        BitTiming {
            segment1: self.bs1,
            segment2: self.bs2,
            sync_jump_width: self.sjw as u32,
            baud_rate_prescaler: self.prescaler as u32,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fifo {
    Fifo0 = 0,
    Fifo1 = 1,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FilterInit {
    /// Filter bank, 0 to 27
    pub number: u8,
    pub mode: IdentifierMode,
    pub scale: ScaleBits,
    pub id_high: u16,
    pub id_low: u16,
    pub mask_id_high: u16,
    pub mask_id_low: u16,
    pub fifo: Fifo,
    pub activation: bool,
}

impl From<can::FilterParameters> for FilterInit {
    /// An active filter accepting every identifier.
    fn from(parameters: can::FilterParameters) -> Self {
        Self {
            number: parameters.number as u8,
            mode: parameters.identifier_mode,
            scale: parameters.scale_bits,
            id_high: 0,
            id_low: 0,
            mask_id_high: 0,
            mask_id_low: 0,
            fifo: if parameters.fifo_number == 0 {
                Fifo::Fifo0
            } else {
                Fifo::Fifo1
            },
            activation: true,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mailbox {
    Mailbox0 = 0,
    Mailbox1 = 1,
    Mailbox2 = 2,
}

impl Mailbox {
    fn index(self) -> usize {
        self as usize
    }

    /// First bit of the mailbox's status byte in TSR.
    fn status_shift(self) -> u32 {
        8 * self as u32
    }

    fn empty_bit(self) -> u32 {
        26 + self as u32
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxStatus {
    Ok,
    Failed,
    Pending,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CanTxMessage {
    pub id: Id,
    pub remote: bool,
    /// Data length code, 0 to 8
    pub dlc: u8,
    pub data: [u8; can::STANDARD_CAN_PACKET_SIZE],
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CanRxMessage {
    pub id: Id,
    pub remote: bool,
    pub dlc: u8,
    pub data: [u8; can::STANDARD_CAN_PACKET_SIZE],
    /// Index of the filter that accepted the message
    pub filter_match_index: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    Initialization,
    Normal,
    Sleep,
}

/// Interrupt sources, as IER bit positions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum CanInterrupt {
    TransmitMailboxEmpty = 0,
    Fifo0MessagePending = 1,
    Fifo0Full = 2,
    Fifo0Overrun = 3,
    Fifo1MessagePending = 4,
    Fifo1Full = 5,
    Fifo1Overrun = 6,
    ErrorWarning = 8,
    ErrorPassive = 9,
    BusOff = 10,
    LastErrorCode = 11,
    Error = 15,
    Wakeup = 16,
    Sleep = 17,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CanFlag {
    RequestComplete(Mailbox),
    MessagePending(Fifo),
    Full(Fifo),
    Overrun(Fifo),
    Wakeup,
    SleepAcknowledge,
    ErrorWarning,
    ErrorPassive,
    BusOff,
    LastErrorCode,
}

pub struct Can<'a> {
    registers: StaticRef<CanRegisters>,
    clock: &'a dyn ClockInterface,

    // Settings stored through `can::Configure`, applied by `enable`.
    automatic_retransmission: Cell<bool>,
    automatic_wake_up: Cell<bool>,
    operation_mode: Cell<Option<OperationMode>>,
    bit_timing: Cell<Option<BitTiming>>,
}

impl<'a> Can<'a> {
    pub const fn new(registers: StaticRef<CanRegisters>, clock: &'a dyn ClockInterface) -> Self {
        Self {
            registers,
            clock,
            automatic_retransmission: Cell::new(true),
            automatic_wake_up: Cell::new(false),
            operation_mode: Cell::new(None),
            bit_timing: Cell::new(None),
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

    fn check_bit_timing(timing: &BitTiming) -> Result<(), ErrorCode> {
        use can::Configure;

        let min = <Self as Configure>::MIN_BIT_TIMINGS;
        let max = <Self as Configure>::MAX_BIT_TIMINGS;
        if (min.segment1..=max.segment1).contains(&timing.segment1)
            && (min.segment2..=max.segment2).contains(&timing.segment2)
            && (min.sync_jump_width..=max.sync_jump_width).contains(&timing.sync_jump_width)
            && (min.baud_rate_prescaler..=max.baud_rate_prescaler)
                .contains(&timing.baud_rate_prescaler)
        {
            Ok(())
        } else {
            Err(ErrorCode::INVAL)
        }
    }

    /// Configure the controller and bring it on the bus.
    pub fn init(&self, init: &CanInit) -> Result<(), ErrorCode> {
        Self::check_bit_timing(&init.bit_timing()).inspect_err(|_| {
            log::warn!("can: rejected bit timing {:?}", init.bit_timing());
        })?;

        self.enter_initialization()?;
        self.configure(init);
        self.leave_initialization()
    }

    /// Leave sleep mode and request initialization mode.
    pub fn enter_initialization(&self) -> Result<(), ErrorCode> {
        self.registers.mcr.modify(MCR::SLEEP::CLEAR + MCR::INRQ::SET);
        poll::wait_until(CONFIG.can_inak_timeout, || {
            self.registers.msr.is_set(MSR::INAK)
        })
        .inspect_err(|_| log::warn!("can: initialization request not acknowledged"))
    }

    /// Program MCR and BTR. Only effective in initialization mode.
    pub fn configure(&self, init: &CanInit) {
        self.registers.mcr.modify(
            MCR::TTCM.val(init.ttcm as u32)
                + MCR::ABOM.val(init.abom as u32)
                + MCR::AWUM.val(init.awum as u32)
                + MCR::NART.val(init.nart as u32)
                + MCR::RFLM.val(init.rflm as u32)
                + MCR::TXFP.val(init.txfp as u32),
        );

        let (silent, loopback) = match init.mode {
            OperationMode::Normal => (false, false),
            OperationMode::Loopback => (false, true),
            OperationMode::Monitoring => (true, false),
            OperationMode::SilentLoopback => (true, true),
        };
        self.registers.btr.write(
            BTR::SILM.val(silent as u32)
                + BTR::LBKM.val(loopback as u32)
                + BTR::SJW.val(init.sjw as u32 - 1)
                + BTR::TS1.val(init.bs1 as u32 - 1)
                + BTR::TS2.val(init.bs2 as u32 - 1)
                + BTR::BRP.val(init.prescaler as u32 - 1),
        );
    }

    /// Request normal mode and wait for the controller to synchronise on
    /// the bus.
    pub fn leave_initialization(&self) -> Result<(), ErrorCode> {
        self.registers.mcr.modify(MCR::INRQ::CLEAR);
        poll::wait_until(CONFIG.can_inak_timeout, || {
            !self.registers.msr.is_set(MSR::INAK)
        })
        .inspect_err(|_| log::warn!("can: did not leave initialization mode"))?;
        log::debug!("can: running");
        Ok(())
    }

    /// Configure one filter bank.
    ///
    /// In 32-bit scale the bank holds one identifier and one mask (or two
    /// identifiers in list mode). In 16-bit scale it holds two of each.
    pub fn filter_init(&self, filter: &FilterInit) -> Result<(), ErrorCode> {
        if filter.number >= FILTER_BANK_COUNT {
            return Err(ErrorCode::INVAL);
        }
        let bit = 1u32 << filter.number;
        let bank = 2 * filter.number as usize;

        self.registers.fmr.modify(FMR::FINIT::SET);
        self.registers.fa1r.set(self.registers.fa1r.get() & !bit);

        match filter.scale {
            ScaleBits::Bits16 => {
                self.registers.fs1r.set(self.registers.fs1r.get() & !bit);
                self.registers.firx[bank]
                    .set(((filter.mask_id_low as u32) << 16) | filter.id_low as u32);
                self.registers.firx[bank + 1]
                    .set(((filter.mask_id_high as u32) << 16) | filter.id_high as u32);
            }
            ScaleBits::Bits32 => {
                self.registers.fs1r.set(self.registers.fs1r.get() | bit);
                self.registers.firx[bank]
                    .set(((filter.id_high as u32) << 16) | filter.id_low as u32);
                self.registers.firx[bank + 1]
                    .set(((filter.mask_id_high as u32) << 16) | filter.mask_id_low as u32);
            }
        }

        let fm1r = self.registers.fm1r.get();
        self.registers.fm1r.set(match filter.mode {
            IdentifierMode::Mask => fm1r & !bit,
            IdentifierMode::List => fm1r | bit,
        });

        let ffa1r = self.registers.ffa1r.get();
        self.registers.ffa1r.set(match filter.fifo {
            Fifo::Fifo0 => ffa1r & !bit,
            Fifo::Fifo1 => ffa1r | bit,
        });

        if filter.activation {
            self.registers.fa1r.set(self.registers.fa1r.get() | bit);
        }

        self.registers.fmr.modify(FMR::FINIT::CLEAR);
        Ok(())
    }

    /// Assign filter banks `bank..28` to the second controller.
    pub fn slave_start_bank(&self, bank: u8) -> Result<(), ErrorCode> {
        if !(1..FILTER_BANK_COUNT).contains(&bank) {
            return Err(ErrorCode::INVAL);
        }
        self.registers.fmr.modify(FMR::FINIT::SET);
        self.registers.fmr.modify(FMR::CANSB.val(bank as u32));
        self.registers.fmr.modify(FMR::FINIT::CLEAR);
        Ok(())
    }

    /// Freeze the controller while the core is halted by a debugger.
    pub fn debug_freeze(&self, freeze: bool) {
        self.registers.mcr.modify(MCR::DBF.val(freeze as u32));
    }

    /// Time triggered communication. When enabled, the last two data bytes
    /// of every transmitted message carry the timer value.
    pub fn ttcm(&self, enable: bool) {
        self.registers.mcr.modify(MCR::TTCM.val(enable as u32));
        for mailbox in self.registers.tx_mailbox.iter() {
            mailbox.tdtr.modify(TDTR::TGT.val(enable as u32));
        }
    }

    fn empty_mailbox(&self) -> Option<Mailbox> {
        let tsr = self.registers.tsr.get();
        [Mailbox::Mailbox0, Mailbox::Mailbox1, Mailbox::Mailbox2]
            .into_iter()
            .find(|mailbox| tsr & (1 << mailbox.empty_bit()) != 0)
    }

    /// Queue a message in the first empty transmit mailbox.
    pub fn transmit(&self, message: &CanTxMessage) -> Result<Mailbox, ErrorCode> {
        if message.dlc as usize > can::STANDARD_CAN_PACKET_SIZE {
            return Err(ErrorCode::SIZE);
        }
        if !message.id.is_valid() {
            return Err(ErrorCode::INVAL);
        }
        let mailbox = self.empty_mailbox().ok_or(ErrorCode::NOMEM)?;
        let registers = &self.registers.tx_mailbox[mailbox.index()];

        let id = match message.id {
            Id::Standard(id) => TIR::STID.val(id as u32) + TIR::IDE::CLEAR,
            Id::Extended(id) => {
                TIR::STID.val(id >> 18) + TIR::EXID.val(id & 0x3_FFFF) + TIR::IDE::SET
            }
        };
        registers.tir.write(id + TIR::RTR.val(message.remote as u32));
        registers.tdtr.modify(TDTR::DLC.val(message.dlc as u32));

        let [d0, d1, d2, d3, d4, d5, d6, d7] = message.data;
        registers.tdlr.set(u32::from_le_bytes([d0, d1, d2, d3]));
        registers.tdhr.set(u32::from_le_bytes([d4, d5, d6, d7]));

        registers.tir.modify(TIR::TXRQ::SET);
        Ok(mailbox)
    }

    pub fn transmit_status(&self, mailbox: Mailbox) -> TxStatus {
        let tsr = self.registers.tsr.get();
        let request_complete = tsr & (1 << mailbox.status_shift()) != 0;
        let transmit_ok = tsr & (1 << (mailbox.status_shift() + 1)) != 0;
        let empty = tsr & (1 << mailbox.empty_bit()) != 0;
        match (request_complete, transmit_ok, empty) {
            (false, false, false) => TxStatus::Pending,
            (true, true, true) => TxStatus::Ok,
            _ => TxStatus::Failed,
        }
    }

    pub fn cancel_transmit(&self, mailbox: Mailbox) {
        let abort = match mailbox {
            Mailbox::Mailbox0 => TSR::ABRQ0::SET,
            Mailbox::Mailbox1 => TSR::ABRQ1::SET,
            Mailbox::Mailbox2 => TSR::ABRQ2::SET,
        };
        self.registers.tsr.write(abort);
    }

    /// Number of messages waiting in `fifo`.
    pub fn message_pending(&self, fifo: Fifo) -> u8 {
        self.registers.rfr[fifo as usize].read(RFR::FMP) as u8
    }

    /// Release the output mailbox of `fifo`.
    pub fn fifo_release(&self, fifo: Fifo) {
        self.registers.rfr[fifo as usize].write(RFR::RFOM::SET);
    }

    /// Read the oldest message of `fifo` and release it.
    pub fn receive(&self, fifo: Fifo) -> Result<CanRxMessage, ErrorCode> {
        if self.message_pending(fifo) == 0 {
            return Err(ErrorCode::BUSY);
        }
        let registers = &self.registers.rx_mailbox[fifo as usize];

        let id = if registers.rir.is_set(TIR::IDE) {
            Id::Extended((registers.rir.read(TIR::STID) << 18) | registers.rir.read(TIR::EXID))
        } else {
            Id::Standard(registers.rir.read(TIR::STID) as u16)
        };
        let mut data = [0; can::STANDARD_CAN_PACKET_SIZE];
        data[..4].copy_from_slice(&registers.rdlr.get().to_le_bytes());
        data[4..].copy_from_slice(&registers.rdhr.get().to_le_bytes());

        let message = CanRxMessage {
            id,
            remote: registers.rir.is_set(TIR::RTR),
            dlc: registers.rdtr.read(RDTR::DLC) as u8,
            data,
            filter_match_index: registers.rdtr.read(RDTR::FMI) as u8,
        };
        self.fifo_release(fifo);
        Ok(message)
    }

    /// Request an operating mode and wait for the controller to report it.
    pub fn operating_mode_request(&self, mode: OperatingMode) -> Result<(), ErrorCode> {
        let acknowledged = |inak: bool, slak: bool| {
            self.registers.msr.is_set(MSR::INAK) == inak
                && self.registers.msr.is_set(MSR::SLAK) == slak
        };
        let result = match mode {
            OperatingMode::Initialization => {
                self.registers.mcr.modify(MCR::SLEEP::CLEAR + MCR::INRQ::SET);
                poll::wait_until(CONFIG.can_inak_timeout, || acknowledged(true, false))
            }
            OperatingMode::Normal => {
                self.registers.mcr.modify(MCR::SLEEP::CLEAR + MCR::INRQ::CLEAR);
                poll::wait_until(CONFIG.can_inak_timeout, || acknowledged(false, false))
            }
            OperatingMode::Sleep => {
                self.registers.mcr.modify(MCR::SLEEP::SET + MCR::INRQ::CLEAR);
                poll::wait_until(CONFIG.can_slak_timeout, || acknowledged(false, true))
            }
        };
        match result {
            Ok(()) => log::debug!("can: entered {:?} mode", mode),
            Err(_) => log::warn!("can: {:?} mode not acknowledged", mode),
        }
        result
    }

    /// Request sleep mode. Fails if the controller did not acknowledge it
    /// immediately.
    pub fn sleep(&self) -> Result<(), ErrorCode> {
        self.registers.mcr.modify(MCR::SLEEP::SET + MCR::INRQ::CLEAR);
        if self.registers.msr.is_set(MSR::SLAK) && !self.registers.msr.is_set(MSR::INAK) {
            Ok(())
        } else {
            Err(ErrorCode::FAIL)
        }
    }

    pub fn wake_up(&self) -> Result<(), ErrorCode> {
        self.registers.mcr.modify(MCR::SLEEP::CLEAR);
        poll::wait_until(CONFIG.can_slak_timeout, || {
            !self.registers.msr.is_set(MSR::SLAK)
        })
        .inspect_err(|_| log::warn!("can: wake up not acknowledged"))
    }

    /// Error recorded by the last bus transfer, `None` if it succeeded.
    pub fn last_error_code(&self) -> Option<can::Error> {
        match self.registers.esr.read_as_enum(ESR::LEC) {
            Some(ESR::LEC::Value::StuffError) => Some(can::Error::Stuff),
            Some(ESR::LEC::Value::FormError) => Some(can::Error::Form),
            Some(ESR::LEC::Value::AcknowledgmentError) => Some(can::Error::Ack),
            Some(ESR::LEC::Value::BitRecessiveError) => Some(can::Error::BitRecessive),
            Some(ESR::LEC::Value::BitDominantError) => Some(can::Error::BitDominant),
            Some(ESR::LEC::Value::CrcError) => Some(can::Error::Crc),
            Some(ESR::LEC::Value::SetBySoftware) => Some(can::Error::SetBySoftware),
            Some(ESR::LEC::Value::NoError) | None => None,
        }
    }

    pub fn receive_error_counter(&self) -> u8 {
        self.registers.esr.read(ESR::REC) as u8
    }

    pub fn transmit_error_counter(&self) -> u8 {
        self.registers.esr.read(ESR::TEC) as u8
    }

    pub fn interrupt_enable(&self, interrupt: CanInterrupt, enable: bool) {
        let mask = 1 << interrupt as u32;
        let ier = self.registers.ier.get();
        self.registers
            .ier
            .set(if enable { ier | mask } else { ier & !mask });
    }

    pub fn get_flag(&self, flag: CanFlag) -> bool {
        match flag {
            CanFlag::RequestComplete(mailbox) => {
                self.registers.tsr.get() & (1 << mailbox.status_shift()) != 0
            }
            CanFlag::MessagePending(fifo) => self.message_pending(fifo) != 0,
            CanFlag::Full(fifo) => self.registers.rfr[fifo as usize].is_set(RFR::FULL),
            CanFlag::Overrun(fifo) => self.registers.rfr[fifo as usize].is_set(RFR::FOVR),
            CanFlag::Wakeup => self.registers.msr.is_set(MSR::WKUI),
            CanFlag::SleepAcknowledge => self.registers.msr.is_set(MSR::SLAKI),
            CanFlag::ErrorWarning => self.registers.esr.is_set(ESR::EWGF),
            CanFlag::ErrorPassive => self.registers.esr.is_set(ESR::EPVF),
            CanFlag::BusOff => self.registers.esr.is_set(ESR::BOFF),
            CanFlag::LastErrorCode => self.registers.esr.read(ESR::LEC) != 0,
        }
    }

    /// Clear a status flag. The pending count and the error state flags
    /// follow the hardware and cannot be cleared.
    pub fn clear_flag(&self, flag: CanFlag) -> Result<(), ErrorCode> {
        match flag {
            CanFlag::RequestComplete(mailbox) => {
                self.registers.tsr.set(1 << mailbox.status_shift())
            }
            CanFlag::Full(fifo) => self.registers.rfr[fifo as usize].write(RFR::FULL::SET),
            CanFlag::Overrun(fifo) => self.registers.rfr[fifo as usize].write(RFR::FOVR::SET),
            CanFlag::Wakeup => self.registers.msr.write(MSR::WKUI::SET),
            CanFlag::SleepAcknowledge => self.registers.msr.write(MSR::SLAKI::SET),
            CanFlag::LastErrorCode => self.registers.esr.set(0),
            CanFlag::MessagePending(_)
            | CanFlag::ErrorWarning
            | CanFlag::ErrorPassive
            | CanFlag::BusOff => return Err(ErrorCode::INVAL),
        }
        Ok(())
    }

    pub fn get_interrupt_status(&self, interrupt: CanInterrupt) -> bool {
        if self.registers.ier.get() & (1 << interrupt as u32) == 0 {
            return false;
        }
        match interrupt {
            CanInterrupt::TransmitMailboxEmpty => {
                [Mailbox::Mailbox0, Mailbox::Mailbox1, Mailbox::Mailbox2]
                    .into_iter()
                    .any(|mailbox| self.get_flag(CanFlag::RequestComplete(mailbox)))
            }
            CanInterrupt::Fifo0MessagePending => self.get_flag(CanFlag::MessagePending(Fifo::Fifo0)),
            CanInterrupt::Fifo0Full => self.get_flag(CanFlag::Full(Fifo::Fifo0)),
            CanInterrupt::Fifo0Overrun => self.get_flag(CanFlag::Overrun(Fifo::Fifo0)),
            CanInterrupt::Fifo1MessagePending => self.get_flag(CanFlag::MessagePending(Fifo::Fifo1)),
            CanInterrupt::Fifo1Full => self.get_flag(CanFlag::Full(Fifo::Fifo1)),
            CanInterrupt::Fifo1Overrun => self.get_flag(CanFlag::Overrun(Fifo::Fifo1)),
            CanInterrupt::ErrorWarning => self.get_flag(CanFlag::ErrorWarning),
            CanInterrupt::ErrorPassive => self.get_flag(CanFlag::ErrorPassive),
            CanInterrupt::BusOff => self.get_flag(CanFlag::BusOff),
            CanInterrupt::LastErrorCode => self.get_flag(CanFlag::LastErrorCode),
            CanInterrupt::Error => self.registers.msr.is_set(MSR::ERRI),
            CanInterrupt::Wakeup => self.get_flag(CanFlag::Wakeup),
            CanInterrupt::Sleep => self.get_flag(CanFlag::SleepAcknowledge),
        }
    }

    /// Bring the controller on the bus with the settings stored through
    /// [`can::Configure`].
    pub fn enable(&self) -> Result<(), ErrorCode> {
        let timing = self.bit_timing.get().ok_or(ErrorCode::INVAL)?;
        let init = CanInit {
            mode: self.operation_mode.get().unwrap_or(OperationMode::Normal),
            awum: self.automatic_wake_up.get(),
            nart: !self.automatic_retransmission.get(),
            ..CanInit::default()
        }
        .with_bit_timing(timing);
        self.init(&init)
    }
}

impl can::Configure for Can<'_> {
    const MIN_BIT_TIMINGS: BitTiming = BitTiming {
        segment1: 1,
        segment2: 1,
        sync_jump_width: 1,
        baud_rate_prescaler: 1,
    };

    const MAX_BIT_TIMINGS: BitTiming = BitTiming {
        segment1: 16,
        segment2: 8,
        sync_jump_width: 4,
        baud_rate_prescaler: 1024,
    };

    fn set_bit_timing(&self, bit_timing: BitTiming) -> Result<(), ErrorCode> {
        Self::check_bit_timing(&bit_timing)?;
        self.bit_timing.set(Some(bit_timing));
        Ok(())
    }

    fn set_operation_mode(&self, mode: OperationMode) -> Result<(), ErrorCode> {
        self.operation_mode.set(Some(mode));
        Ok(())
    }

    fn get_bit_timing(&self) -> Result<BitTiming, ErrorCode> {
        self.bit_timing.get().ok_or(ErrorCode::INVAL)
    }

    fn get_operation_mode(&self) -> Result<OperationMode, ErrorCode> {
        self.operation_mode.get().ok_or(ErrorCode::INVAL)
    }

    fn set_automatic_retransmission(&self, automatic: bool) -> Result<(), ErrorCode> {
        self.automatic_retransmission.set(automatic);
        Ok(())
    }

    fn set_wake_up(&self, wake_up: bool) -> Result<(), ErrorCode> {
        self.automatic_wake_up.set(wake_up);
        Ok(())
    }

    fn get_automatic_retransmission(&self) -> Result<bool, ErrorCode> {
        Ok(self.automatic_retransmission.get())
    }

    fn get_wake_up(&self) -> Result<bool, ErrorCode> {
        Ok(self.automatic_wake_up.get())
    }

    fn receive_fifo_count(&self) -> usize {
        RX_FIFO_COUNT
    }
}
