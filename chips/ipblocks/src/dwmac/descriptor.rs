// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! DMA descriptor and buffer formats.
//!
//! Descriptors are 32-byte records. In normal descriptor mode the DMA only
//! reads and writes the first four words. The extended status and timestamp
//! words are used in enhanced mode only.

use core::cell::Cell;

use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{
    register_bitfields, register_structs, FieldValue, InMemoryRegister,
};

/// Largest frame the buffers hold: 1518 bytes plus a VLAN tag and padding.
pub const ENET_MAX_FRAME_SIZE: usize = 1524;

/// Bytes between consecutive descriptors.
pub const DESCRIPTOR_SIZE: usize = 32;

/// Frame check sequence appended to every received frame.
pub(super) const CRC_LENGTH: usize = 4;

register_bitfields![u32,
    pub(super) TDES0 [
        OWN OFFSET(31) NUMBITS(1) [],
        /// Interrupt on completion
        IC OFFSET(30) NUMBITS(1) [],
        /// Last segment
        LS OFFSET(29) NUMBITS(1) [],
        /// First segment
        FS OFFSET(28) NUMBITS(1) [],
        /// Disable CRC
        DC OFFSET(27) NUMBITS(1) [],
        /// Disable pad
        DP OFFSET(26) NUMBITS(1) [],
        /// Transmit timestamp enable
        TTSE OFFSET(25) NUMBITS(1) [],
        /// Checksum insertion control
        CIC OFFSET(22) NUMBITS(2) [
            Disabled = 0,
            IpHeader = 1,
            IpHeaderAndPayload = 2,
            Full = 3
        ],
        /// Transmit end of ring
        TER OFFSET(21) NUMBITS(1) [],
        /// Second address chained
        TCH OFFSET(20) NUMBITS(1) [],
        /// Transmit timestamp status
        TTSS OFFSET(17) NUMBITS(1) [],
        /// IP header error
        IHE OFFSET(16) NUMBITS(1) [],
        /// Error summary
        ES OFFSET(15) NUMBITS(1) [],
        /// Jabber timeout
        JT OFFSET(14) NUMBITS(1) [],
        /// Frame flushed
        FF OFFSET(13) NUMBITS(1) [],
        /// IP payload error
        IPE OFFSET(12) NUMBITS(1) [],
        /// Loss of carrier
        LCA OFFSET(11) NUMBITS(1) [],
        /// No carrier
        NC OFFSET(10) NUMBITS(1) [],
        /// Late collision
        LCO OFFSET(9) NUMBITS(1) [],
        /// Excessive collision
        EC OFFSET(8) NUMBITS(1) [],
        /// VLAN frame
        VF OFFSET(7) NUMBITS(1) [],
        /// Collision count
        CC OFFSET(3) NUMBITS(4) [],
        /// Excessive deferral
        ED OFFSET(2) NUMBITS(1) [],
        /// Underflow error
        UF OFFSET(1) NUMBITS(1) [],
        /// Deferred bit
        DB OFFSET(0) NUMBITS(1) []
    ],
    pub(super) TDES1 [
        TBS2 OFFSET(16) NUMBITS(13) [],
        TBS1 OFFSET(0) NUMBITS(13) []
    ],
    pub(super) RDES0 [
        OWN OFFSET(31) NUMBITS(1) [],
        /// Destination address filter fail
        AFM OFFSET(30) NUMBITS(1) [],
        /// Frame length, CRC included
        FL OFFSET(16) NUMBITS(14) [],
        /// Error summary
        ES OFFSET(15) NUMBITS(1) [],
        /// Descriptor error
        DE OFFSET(14) NUMBITS(1) [],
        /// Source address filter fail
        SAF OFFSET(13) NUMBITS(1) [],
        /// Length error
        LE OFFSET(12) NUMBITS(1) [],
        /// Overflow error
        OE OFFSET(11) NUMBITS(1) [],
        /// VLAN tag
        VLAN OFFSET(10) NUMBITS(1) [],
        /// First descriptor
        FS OFFSET(9) NUMBITS(1) [],
        /// Last descriptor
        LS OFFSET(8) NUMBITS(1) [],
        /// IP header checksum error, or timestamp valid in enhanced mode
        IPHCE_TSV OFFSET(7) NUMBITS(1) [],
        /// Late collision
        LCO OFFSET(6) NUMBITS(1) [],
        /// Frame type
        FT OFFSET(5) NUMBITS(1) [],
        /// Receive watchdog timeout
        RWT OFFSET(4) NUMBITS(1) [],
        /// Receive error
        RE OFFSET(3) NUMBITS(1) [],
        /// Dribble bit error
        DBE OFFSET(2) NUMBITS(1) [],
        /// CRC error
        CE OFFSET(1) NUMBITS(1) [],
        /// Payload checksum error, or extended status available in enhanced mode
        PCE_ESA OFFSET(0) NUMBITS(1) []
    ],
    pub(super) RDES1 [
        /// Disable interrupt on completion
        DIC OFFSET(31) NUMBITS(1) [],
        RBS2 OFFSET(16) NUMBITS(13) [],
        /// Receive end of ring
        RER OFFSET(15) NUMBITS(1) [],
        /// Second address chained
        RCH OFFSET(14) NUMBITS(1) [],
        RBS1 OFFSET(0) NUMBITS(13) []
    ]
];

register_structs! {
    pub TxDescriptor {
        (0x00 => pub(super) des0: InMemoryRegister<u32, TDES0::Register>),
        (0x04 => pub(super) des1: InMemoryRegister<u32, TDES1::Register>),
        /// Buffer 1 address
        (0x08 => pub(super) des2: InMemoryRegister<u32>),
        /// Buffer 2 or next descriptor address
        (0x0C => pub(super) des3: InMemoryRegister<u32>),
        (0x10 => pub(super) des4: InMemoryRegister<u32>),
        (0x14 => pub(super) des5: InMemoryRegister<u32>),
        /// Timestamp low
        (0x18 => pub(super) des6: InMemoryRegister<u32>),
        /// Timestamp high
        (0x1C => pub(super) des7: InMemoryRegister<u32>),
        (0x20 => @END),
    },

    pub RxDescriptor {
        (0x00 => pub(super) des0: InMemoryRegister<u32, RDES0::Register>),
        (0x04 => pub(super) des1: InMemoryRegister<u32, RDES1::Register>),
        (0x08 => pub(super) des2: InMemoryRegister<u32>),
        (0x0C => pub(super) des3: InMemoryRegister<u32>),
        /// Extended status
        (0x10 => pub(super) des4: InMemoryRegister<u32>),
        (0x14 => pub(super) des5: InMemoryRegister<u32>),
        (0x18 => pub(super) des6: InMemoryRegister<u32>),
        (0x1C => pub(super) des7: InMemoryRegister<u32>),
        (0x20 => @END),
    }
}

/// Control bits of a transmit descriptor that survive frame setup.
const TX_CONTROL_MASK: u32 = (1 << 27) | (1 << 26) | (0b11 << 22) | (1 << 21) | (1 << 20);

impl TxDescriptor {
    pub const fn new() -> Self {
        Self {
            des0: InMemoryRegister::new(0),
            des1: InMemoryRegister::new(0),
            des2: InMemoryRegister::new(0),
            des3: InMemoryRegister::new(0),
            des4: InMemoryRegister::new(0),
            des5: InMemoryRegister::new(0),
            des6: InMemoryRegister::new(0),
            des7: InMemoryRegister::new(0),
        }
    }

    pub fn address(&self) -> u32 {
        core::ptr::from_ref(self) as u32
    }

    pub(super) fn reset(&self) {
        self.des0.set(0);
        self.des1.set(0);
        self.des2.set(0);
        self.des3.set(0);
        self.des4.set(0);
        self.des5.set(0);
        self.des6.set(0);
        self.des7.set(0);
    }

    pub fn is_owned_by_dma(&self) -> bool {
        self.des0.is_set(TDES0::OWN)
    }

    pub(super) fn give_to_dma(&self) {
        self.des0.modify(TDES0::OWN::SET);
    }

    /// Drop the segment markers and the status left by the previous frame.
    pub(super) fn clear_frame_state(&self) {
        self.des0.set(self.des0.get() & TX_CONTROL_MASK);
    }

    pub(super) fn timestamp(&self) -> u64 {
        (u64::from(self.des7.get()) << 32) | u64::from(self.des6.get())
    }
}

impl RxDescriptor {
    pub const fn new() -> Self {
        Self {
            des0: InMemoryRegister::new(0),
            des1: InMemoryRegister::new(0),
            des2: InMemoryRegister::new(0),
            des3: InMemoryRegister::new(0),
            des4: InMemoryRegister::new(0),
            des5: InMemoryRegister::new(0),
            des6: InMemoryRegister::new(0),
            des7: InMemoryRegister::new(0),
        }
    }

    pub fn address(&self) -> u32 {
        core::ptr::from_ref(self) as u32
    }

    pub(super) fn reset(&self) {
        self.des0.set(0);
        self.des1.set(0);
        self.des2.set(0);
        self.des3.set(0);
        self.des4.set(0);
        self.des5.set(0);
        self.des6.set(0);
        self.des7.set(0);
    }

    pub fn is_owned_by_dma(&self) -> bool {
        self.des0.is_set(RDES0::OWN)
    }

    /// Hand the descriptor back to the DMA, discarding the receive status.
    pub(super) fn give_to_dma(&self) {
        self.des0.write(RDES0::OWN::SET);
    }

    pub(super) fn is_last(&self) -> bool {
        self.des0.is_set(RDES0::LS)
    }

    pub(super) fn has_error(&self) -> bool {
        self.des0.is_set(RDES0::ES)
    }

    /// Received length without the CRC.
    pub(super) fn payload_length(&self) -> usize {
        (self.des0.read(RDES0::FL) as usize).saturating_sub(CRC_LENGTH)
    }

    pub(super) fn timestamp(&self) -> u64 {
        (u64::from(self.des7.get()) << 32) | u64::from(self.des6.get())
    }
}

/// A word aligned frame buffer shared with the DMA.
#[repr(C, align(4))]
pub struct DmaBuffer {
    data: Cell<[u8; ENET_MAX_FRAME_SIZE]>,
}

impl DmaBuffer {
    pub const fn new() -> Self {
        Self {
            data: Cell::new([0; ENET_MAX_FRAME_SIZE]),
        }
    }

    pub fn address(&self) -> u32 {
        self.data.as_ptr() as u32
    }

    fn cells(&self) -> &[Cell<u8>] {
        let data: &Cell<[u8]> = &self.data;
        data.as_slice_of_cells()
    }

    pub(super) fn write(&self, bytes: &[u8]) {
        for (cell, byte) in self.cells().iter().zip(bytes) {
            cell.set(*byte);
        }
    }

    pub(super) fn read(&self, bytes: &mut [u8]) {
        for (byte, cell) in bytes.iter_mut().zip(self.cells()) {
            *byte = cell.get();
        }
    }
}

/// Descriptor fields readable through `desc_info_get`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DescInfo {
    /// Collisions before a transmit completed (transmit only)
    CollisionCount,
    /// Received frame length including the CRC (receive only)
    FrameLength,
    Buffer1Size,
    Buffer2Size,
    Buffer1Address,
    Buffer2Address,
}

/// Single-bit transmit descriptor flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxDescFlag {
    Own,
    InterruptOnCompletion,
    LastSegment,
    FirstSegment,
    DisableCrc,
    DisablePad,
    TimestampEnable,
    EndOfRing,
    SecondAddressChained,
    TimestampStatus,
    IpHeaderError,
    ErrorSummary,
    JabberTimeout,
    FrameFlushed,
    IpPayloadError,
    LossOfCarrier,
    NoCarrier,
    LateCollision,
    ExcessiveCollision,
    VlanFrame,
    ExcessiveDeferral,
    Underflow,
    Deferred,
}

impl TxDescFlag {
    pub(super) fn mask(self) -> u32 {
        let bit = match self {
            TxDescFlag::Own => 31,
            TxDescFlag::InterruptOnCompletion => 30,
            TxDescFlag::LastSegment => 29,
            TxDescFlag::FirstSegment => 28,
            TxDescFlag::DisableCrc => 27,
            TxDescFlag::DisablePad => 26,
            TxDescFlag::TimestampEnable => 25,
            TxDescFlag::EndOfRing => 21,
            TxDescFlag::SecondAddressChained => 20,
            TxDescFlag::TimestampStatus => 17,
            TxDescFlag::IpHeaderError => 16,
            TxDescFlag::ErrorSummary => 15,
            TxDescFlag::JabberTimeout => 14,
            TxDescFlag::FrameFlushed => 13,
            TxDescFlag::IpPayloadError => 12,
            TxDescFlag::LossOfCarrier => 11,
            TxDescFlag::NoCarrier => 10,
            TxDescFlag::LateCollision => 9,
            TxDescFlag::ExcessiveCollision => 8,
            TxDescFlag::VlanFrame => 7,
            TxDescFlag::ExcessiveDeferral => 2,
            TxDescFlag::Underflow => 1,
            TxDescFlag::Deferred => 0,
        };
        1 << bit
    }
}

/// Single-bit receive descriptor flags, from des0 unless noted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxDescFlag {
    Own,
    DestinationFilterFail,
    ErrorSummary,
    DescriptorError,
    SourceFilterFail,
    LengthError,
    Overflow,
    VlanTag,
    FirstDescriptor,
    LastDescriptor,
    IpHeaderChecksumError,
    LateCollision,
    FrameType,
    WatchdogTimeout,
    ReceiveError,
    DribbleBitError,
    CrcError,
    PayloadChecksumError,
    /// des1
    DisableInterrupt,
    /// des1
    EndOfRing,
    /// des1
    SecondAddressChained,
}

/// Descriptor word holding a receive flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum RxWord {
    Status,
    Control,
}

impl RxDescFlag {
    pub(super) fn location(self) -> (RxWord, u32) {
        let (word, bit) = match self {
            RxDescFlag::Own => (RxWord::Status, 31),
            RxDescFlag::DestinationFilterFail => (RxWord::Status, 30),
            RxDescFlag::ErrorSummary => (RxWord::Status, 15),
            RxDescFlag::DescriptorError => (RxWord::Status, 14),
            RxDescFlag::SourceFilterFail => (RxWord::Status, 13),
            RxDescFlag::LengthError => (RxWord::Status, 12),
            RxDescFlag::Overflow => (RxWord::Status, 11),
            RxDescFlag::VlanTag => (RxWord::Status, 10),
            RxDescFlag::FirstDescriptor => (RxWord::Status, 9),
            RxDescFlag::LastDescriptor => (RxWord::Status, 8),
            RxDescFlag::IpHeaderChecksumError => (RxWord::Status, 7),
            RxDescFlag::LateCollision => (RxWord::Status, 6),
            RxDescFlag::FrameType => (RxWord::Status, 5),
            RxDescFlag::WatchdogTimeout => (RxWord::Status, 4),
            RxDescFlag::ReceiveError => (RxWord::Status, 3),
            RxDescFlag::DribbleBitError => (RxWord::Status, 2),
            RxDescFlag::CrcError => (RxWord::Status, 1),
            RxDescFlag::PayloadChecksumError => (RxWord::Status, 0),
            RxDescFlag::DisableInterrupt => (RxWord::Control, 31),
            RxDescFlag::EndOfRing => (RxWord::Control, 15),
            RxDescFlag::SecondAddressChained => (RxWord::Control, 14),
        };
        (word, 1 << bit)
    }
}

/// Hardware checksum insertion on transmit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Checksum {
    Disabled,
    IpHeader,
    IpHeaderAndPayload,
    /// IP header and payload, with the pseudo-header computed in hardware
    Full,
}

impl Checksum {
    pub(super) fn field(self) -> FieldValue<u32, TDES0::Register> {
        match self {
            Checksum::Disabled => TDES0::CIC::Disabled,
            Checksum::IpHeader => TDES0::CIC::IpHeader,
            Checksum::IpHeaderAndPayload => TDES0::CIC::IpHeaderAndPayload,
            Checksum::Full => TDES0::CIC::Full,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_are_32_bytes() {
        assert_eq!(DESCRIPTOR_SIZE, core::mem::size_of::<TxDescriptor>());
        assert_eq!(DESCRIPTOR_SIZE, core::mem::size_of::<RxDescriptor>());
        assert_eq!(4, core::mem::align_of::<DmaBuffer>());
    }

    #[test]
    fn transmit_frame_state_keeps_control_bits() {
        let desc = TxDescriptor::new();
        desc.des0.write(
            TDES0::OWN::SET
                + TDES0::FS::SET
                + TDES0::LS::SET
                + TDES0::ES::SET
                + TDES0::TCH::SET
                + TDES0::CIC::Full
                + TDES0::CC.val(3),
        );
        desc.clear_frame_state();
        assert_eq!((1 << 20) | (0b11 << 22), desc.des0.get());
    }

    #[test]
    fn receive_length_excludes_crc() {
        let desc = RxDescriptor::new();
        desc.des0.write(RDES0::FL.val(64) + RDES0::LS::SET);
        assert_eq!(60, desc.payload_length());
        desc.des0.write(RDES0::FL.val(2));
        assert_eq!(0, desc.payload_length());
    }

    #[test]
    fn buffer_copies() {
        let buffer = DmaBuffer::new();
        buffer.write(&[1, 2, 3, 4]);
        let mut out = [0; 3];
        buffer.read(&mut out);
        assert_eq!([1, 2, 3], out);
    }

    #[test]
    fn flag_masks() {
        assert_eq!(1 << 31, TxDescFlag::Own.mask());
        assert_eq!(1 << 0, TxDescFlag::Deferred.mask());
        assert_eq!((RxWord::Control, 1 << 31), RxDescFlag::DisableInterrupt.location());
        assert_eq!((RxWord::Status, 1 << 9), RxDescFlag::FirstDescriptor.location());
    }
}
