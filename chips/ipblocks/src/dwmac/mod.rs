// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! DesignWare Ethernet MAC with its DMA engine.
//!
//! The MAC, MMC counters, PTP timestamp unit and DMA share one register
//! block. Frames move between memory and the MAC through the descriptor
//! lists in [`TxRing`] and [`RxRing`]. The controller copies outgoing frames
//! into the transmit buffers, so the HIL buffer is only held until the DMA
//! reports completion.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! static TX_DESCRIPTORS: [TxDescriptor; 4] = [const { TxDescriptor::new() }; 4];
//! static TX_BUFFERS: [DmaBuffer; 4] = [const { DmaBuffer::new() }; 4];
//! // Same for the receive side.
//!
//! let ethernet = Dwmac::new(
//!     ETH_BASE,
//!     &clock,
//!     TxRing::new(&TX_DESCRIPTORS, &TX_BUFFERS, ENET_MAX_FRAME_SIZE),
//!     RxRing::new(&RX_DESCRIPTORS, &RX_BUFFERS, ENET_MAX_FRAME_SIZE),
//! );
//! let media = ethernet.init(&EthernetInit::default())?;
//! ethernet.tx_ring_init(DescriptorLayout::Chain)?;
//! ethernet.rx_ring_init(DescriptorLayout::Chain)?;
//! ethernet.enable()?;
//! ```

use core::cell::Cell;

use kernel::config::CONFIG;
use kernel::hil::ethernet::{EthernetAdapterDatapath, EthernetAdapterDatapathClient, MacAddress};
use kernel::platform::chip::ClockInterface;
use kernel::utilities::poll;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

mod descriptor;
mod registers;
mod ring;

pub use self::descriptor::{
    Checksum, DescInfo, DmaBuffer, RxDescFlag, RxDescriptor, TxDescFlag, TxDescriptor,
    DESCRIPTOR_SIZE, ENET_MAX_FRAME_SIZE,
};
pub use self::registers::DwmacRegisters;
pub use self::ring::{DescriptorLayout, DescriptorMode, RxRing, TxRing};

use self::registers::{
    DMABMR, DMAMFBOCR, DMAOMR, DMASR, MACAHR, MACCR, MACDBGR, MACFCR, MACFFR, MACIMR, MACMIIAR,
    MACMIIDR, MACPMTCSR, MACSR, MACVLANTR, MMCCR, PTPTSCR, PTPTSLR,
};

/// Number of MAC address slots.
pub const MAC_ADDRESS_COUNT: usize = 4;

// PHY registers and bits defined by IEEE 802.3 clause 22.
const PHY_BCR: u8 = 0x00;
const PHY_BSR: u8 = 0x01;

const PHY_RESET: u16 = 0x8000;
const PHY_LOOPBACK: u16 = 0x4000;
const PHY_SPEED_100M: u16 = 0x2000;
const PHY_AUTONEGOTIATION: u16 = 0x1000;
const PHY_RESTART_AUTONEGOTIATION: u16 = 0x0200;
const PHY_FULL_DUPLEX: u16 = 0x0100;

const PHY_LINKED_STATUS: u16 = 0x0004;
const PHY_AUTONEGO_COMPLETE: u16 = 0x0020;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    Speed10M = 0,
    Speed100M = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Duplex {
    Half = 0,
    Full = 1,
}

/// Speed and duplex the MAC runs at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MediaMode {
    pub speed: Speed,
    pub duplex: Duplex,
}

/// How [`Dwmac::init`] settles the media mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Media {
    /// Let the PHY negotiate, then read the result back.
    AutoNegotiation,
    /// Force the PHY to the given mode.
    Fixed(MediaMode),
}

/// Where a PHY reports the negotiated speed and duplex.
///
/// The location is vendor specific. The defaults match the DP83848 PHY
/// status register: bit 1 set for 10 Mbit/s, bit 2 set for full duplex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhyConfig {
    pub status_register: u8,
    /// Set when the link runs at 10 Mbit/s.
    pub speed_mask: u16,
    /// Set when the link runs full duplex.
    pub duplex_mask: u16,
}

impl Default for PhyConfig {
    fn default() -> Self {
        Self {
            status_register: 0x10,
            speed_mask: 0x0002,
            duplex_mask: 0x0004,
        }
    }
}

impl PhyConfig {
    pub fn media_mode(&self, status: u16) -> MediaMode {
        MediaMode {
            speed: if status & self.speed_mask != 0 {
                Speed::Speed10M
            } else {
                Speed::Speed100M
            },
            duplex: if status & self.duplex_mask != 0 {
                Duplex::Full
            } else {
                Duplex::Half
            },
        }
    }
}

/// Minimum gap between frames, in bit times.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterFrameGap {
    Bits96 = 0,
    Bits88 = 1,
    Bits80 = 2,
    Bits72 = 3,
    Bits64 = 4,
    Bits56 = 5,
    Bits48 = 6,
    Bits40 = 7,
}

/// Upper bound of the retransmission back-off, as 2^k slot times.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BackoffLimit {
    K10 = 0,
    K8 = 1,
    K4 = 2,
    K1 = 3,
}

/// Threshold, in slot times below the pause time, at which the next pause
/// frame is sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PauseLowThreshold {
    Minus4 = 0,
    Minus28 = 1,
    Minus144 = 2,
    Minus256 = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlowControl {
    pub pause_time: u16,
    pub zero_quanta_pause: bool,
    pub pause_low_threshold: PauseLowThreshold,
    pub unicast_pause_frame_detect: bool,
    pub receive: bool,
    pub transmit: bool,
}

impl Default for FlowControl {
    fn default() -> Self {
        Self {
            pause_time: 0,
            zero_quanta_pause: false,
            pause_low_threshold: PauseLowThreshold::Minus4,
            unicast_pause_frame_detect: false,
            receive: false,
            transmit: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VlanTag {
    pub identifier: u16,
    /// Compare only the 12-bit VLAN identifier.
    pub twelve_bit: bool,
}

/// MAC core settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacConfig {
    pub watchdog: bool,
    pub jabber: bool,
    pub interframe_gap: InterFrameGap,
    pub carrier_sense: bool,
    pub receive_own: bool,
    pub loopback: bool,
    pub retry: bool,
    pub automatic_pad_crc_strip: bool,
    pub backoff_limit: BackoffLimit,
    pub deferral_check: bool,
    pub flow_control: FlowControl,
    pub vlan: Option<VlanTag>,
}

impl Default for MacConfig {
    fn default() -> Self {
        Self {
            watchdog: true,
            jabber: true,
            interframe_gap: InterFrameGap::Bits96,
            carrier_sense: true,
            receive_own: true,
            loopback: false,
            retry: true,
            automatic_pad_crc_strip: false,
            backoff_limit: BackoffLimit::K10,
            deferral_check: false,
            flow_control: FlowControl::default(),
            vlan: None,
        }
    }
}

/// Bytes in the transmit FIFO before transmission starts, when store and
/// forward is off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransmitThreshold {
    Bytes64 = 0,
    Bytes128 = 1,
    Bytes192 = 2,
    Bytes256 = 3,
    Bytes40 = 4,
    Bytes32 = 5,
    Bytes24 = 6,
    Bytes16 = 7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReceiveThreshold {
    Bytes64 = 0,
    Bytes32 = 1,
    Bytes96 = 2,
    Bytes128 = 3,
}

/// Beats per DMA burst.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BurstLength {
    Beats1 = 1,
    Beats2 = 2,
    Beats4 = 4,
    Beats8 = 8,
    Beats16 = 16,
    Beats32 = 32,
}

/// Sharing of the bus between the receive and transmit DMA.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaArbitration {
    RoundRobin1To1,
    RoundRobin2To1,
    RoundRobin3To1,
    RoundRobin4To1,
    ReceivePriority,
}

/// DMA engine settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaConfig {
    pub drop_checksum_error_frames: bool,
    pub receive_store_forward: bool,
    pub flush_received_frames: bool,
    pub transmit_store_forward: bool,
    pub transmit_threshold: TransmitThreshold,
    pub forward_error_frames: bool,
    pub forward_undersized_good_frames: bool,
    pub receive_threshold: ReceiveThreshold,
    pub second_frame_operate: bool,
    pub address_aligned_beats: bool,
    pub fixed_burst: bool,
    pub mixed_burst: bool,
    /// Multiply both burst lengths by four.
    pub burst_4x: bool,
    pub receive_burst_length: BurstLength,
    pub transmit_burst_length: BurstLength,
    pub arbitration: DmaArbitration,
    pub descriptor_mode: DescriptorMode,
}

impl Default for DmaConfig {
    fn default() -> Self {
        Self {
            drop_checksum_error_frames: true,
            receive_store_forward: true,
            flush_received_frames: true,
            transmit_store_forward: true,
            transmit_threshold: TransmitThreshold::Bytes64,
            forward_error_frames: false,
            forward_undersized_good_frames: false,
            receive_threshold: ReceiveThreshold::Bytes64,
            second_frame_operate: false,
            address_aligned_beats: true,
            fixed_burst: true,
            mixed_burst: false,
            burst_4x: false,
            receive_burst_length: BurstLength::Beats32,
            transmit_burst_length: BurstLength::Beats32,
            arbitration: DmaArbitration::RoundRobin1To1,
            descriptor_mode: DescriptorMode::Normal,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SourceAddressFilter {
    Disabled,
    Normal,
    Inverse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlFrames {
    BlockAll = 1,
    ForwardAll = 2,
    ForwardPassedAddressFilter = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MulticastFilter {
    Perfect,
    Hash,
    PerfectAndHash,
    PassAll,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UnicastFilter {
    Perfect,
    Hash,
    PerfectAndHash,
}

/// Receive frame filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameFilter {
    pub receive_all: bool,
    pub source_address: SourceAddressFilter,
    pub control_frames: ControlFrames,
    pub broadcast: bool,
    pub destination_inverse: bool,
    pub promiscuous: bool,
    pub multicast: MulticastFilter,
    pub unicast: UnicastFilter,
    /// Upper word in MACHTHR, lower word in MACHTLR.
    pub hash_table: u64,
}

impl Default for FrameFilter {
    fn default() -> Self {
        Self {
            receive_all: false,
            source_address: SourceAddressFilter::Disabled,
            control_frames: ControlFrames::BlockAll,
            broadcast: true,
            destination_inverse: false,
            promiscuous: false,
            multicast: MulticastFilter::Perfect,
            unicast: UnicastFilter::Perfect,
            hash_table: 0,
        }
    }
}

/// Everything [`Dwmac::init`] programs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EthernetInit {
    pub media: Media,
    pub phy_address: u8,
    pub phy: PhyConfig,
    pub mac: MacConfig,
    pub dma: DmaConfig,
    /// IPv4 header and TCP/UDP/ICMP payload checksum checking on receive.
    pub checksum_offload: bool,
    pub frame_filter: FrameFilter,
    pub mac_address: MacAddress,
    /// AHB clock, which sets the MDC divider.
    pub hclk_hz: u32,
}

impl Default for EthernetInit {
    fn default() -> Self {
        Self {
            media: Media::AutoNegotiation,
            phy_address: 0,
            phy: PhyConfig::default(),
            mac: MacConfig::default(),
            dma: DmaConfig::default(),
            checksum_offload: false,
            frame_filter: FrameFilter::default(),
            mac_address: MacAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x00]),
            hclk_hz: 168_000_000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressFilterKind {
    Destination,
    Source,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Transmit,
    Receive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxProcessState {
    Stopped,
    FetchingDescriptor,
    WaitingForStatus,
    ReadingData,
    Suspended,
    ClosingDescriptor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxProcessState {
    Stopped,
    FetchingDescriptor,
    WaitingForFrame,
    Suspended,
    ClosingDescriptor,
    TransferringData,
}

/// DMA status flags in DMASR.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaFlag {
    TimestampTrigger,
    PowerManagement,
    Mmc,
    NormalSummary,
    AbnormalSummary,
    EarlyReceive,
    FatalBusError,
    EarlyTransmit,
    ReceiveWatchdogTimeout,
    ReceiveProcessStopped,
    ReceiveBufferUnavailable,
    Receive,
    TransmitUnderflow,
    ReceiveOverflow,
    TransmitJabberTimeout,
    TransmitBufferUnavailable,
    TransmitProcessStopped,
    Transmit,
}

impl DmaFlag {
    fn mask(self) -> u32 {
        let bit = match self {
            DmaFlag::TimestampTrigger => 29,
            DmaFlag::PowerManagement => 28,
            DmaFlag::Mmc => 27,
            DmaFlag::NormalSummary => 16,
            DmaFlag::AbnormalSummary => 15,
            DmaFlag::EarlyReceive => 14,
            DmaFlag::FatalBusError => 13,
            DmaFlag::EarlyTransmit => 10,
            DmaFlag::ReceiveWatchdogTimeout => 9,
            DmaFlag::ReceiveProcessStopped => 8,
            DmaFlag::ReceiveBufferUnavailable => 7,
            DmaFlag::Receive => 6,
            DmaFlag::TransmitUnderflow => 5,
            DmaFlag::ReceiveOverflow => 4,
            DmaFlag::TransmitJabberTimeout => 3,
            DmaFlag::TransmitBufferUnavailable => 2,
            DmaFlag::TransmitProcessStopped => 1,
            DmaFlag::Transmit => 0,
        };
        1 << bit
    }

    /// Summaries of MAC events, cleared at their source.
    fn is_read_only(self) -> bool {
        matches!(
            self,
            DmaFlag::TimestampTrigger | DmaFlag::PowerManagement | DmaFlag::Mmc
        )
    }
}

/// Interrupt sources. All but the last two are enabled in DMAIER and share
/// their bit position with the DMASR flag. The timestamp trigger and power
/// management interrupts are unmasked in MACIMR.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaInterrupt {
    NormalSummary,
    AbnormalSummary,
    EarlyReceive,
    FatalBusError,
    EarlyTransmit,
    ReceiveWatchdogTimeout,
    ReceiveProcessStopped,
    ReceiveBufferUnavailable,
    Receive,
    TransmitUnderflow,
    ReceiveOverflow,
    TransmitJabberTimeout,
    TransmitBufferUnavailable,
    TransmitProcessStopped,
    Transmit,
    TimestampTrigger,
    PowerManagement,
}

impl DmaInterrupt {
    fn dma_mask(self) -> Option<u32> {
        let flag = match self {
            DmaInterrupt::NormalSummary => DmaFlag::NormalSummary,
            DmaInterrupt::AbnormalSummary => DmaFlag::AbnormalSummary,
            DmaInterrupt::EarlyReceive => DmaFlag::EarlyReceive,
            DmaInterrupt::FatalBusError => DmaFlag::FatalBusError,
            DmaInterrupt::EarlyTransmit => DmaFlag::EarlyTransmit,
            DmaInterrupt::ReceiveWatchdogTimeout => DmaFlag::ReceiveWatchdogTimeout,
            DmaInterrupt::ReceiveProcessStopped => DmaFlag::ReceiveProcessStopped,
            DmaInterrupt::ReceiveBufferUnavailable => DmaFlag::ReceiveBufferUnavailable,
            DmaInterrupt::Receive => DmaFlag::Receive,
            DmaInterrupt::TransmitUnderflow => DmaFlag::TransmitUnderflow,
            DmaInterrupt::ReceiveOverflow => DmaFlag::ReceiveOverflow,
            DmaInterrupt::TransmitJabberTimeout => DmaFlag::TransmitJabberTimeout,
            DmaInterrupt::TransmitBufferUnavailable => DmaFlag::TransmitBufferUnavailable,
            DmaInterrupt::TransmitProcessStopped => DmaFlag::TransmitProcessStopped,
            DmaInterrupt::Transmit => DmaFlag::Transmit,
            DmaInterrupt::TimestampTrigger | DmaInterrupt::PowerManagement => return None,
        };
        Some(flag.mask())
    }
}

/// Fields of the MAC debug register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DebugStatus {
    TxFifoFull,
    TxFifoNotEmpty,
    TxFifoWriteActive,
    TxFifoReadStatus,
    TransmitterPaused,
    TransmitFrameControllerStatus,
    TransmitEngineActive,
    RxFifoFillLevel,
    RxFifoReadStatus,
    RxFifoWriteActive,
    SmallFifoStatus,
    ReceiveEngineActive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CurrentDesc {
    TxDescriptor,
    RxDescriptor,
    TxBuffer,
    RxBuffer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MscFeature {
    CounterStopRollover,
    ResetOnRead,
    Freeze,
    Preset,
    /// Preset to almost full instead of almost half
    PresetFull,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MscCounter {
    TxSingleCollision,
    TxMultipleCollision,
    TxGood,
    RxCrcError,
    RxAlignmentError,
    RxGoodUnicast,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sign {
    Positive,
    Negative,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PtpTime {
    pub sign: Sign,
    pub seconds: u32,
    pub subseconds: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WumFlag {
    MagicPacketReceived,
    WakeupFrameReceived,
}

struct PendingTransmit {
    buffer: &'static mut [u8],
    len: u16,
    identifier: usize,
}

pub struct Dwmac<'a> {
    registers: StaticRef<DwmacRegisters>,
    clock: &'a dyn ClockInterface,
    tx: TxRing<'a>,
    rx: RxRing<'a>,
    descriptor_mode: Cell<DescriptorMode>,
    client: Cell<Option<&'a dyn EthernetAdapterDatapathClient>>,
    transmit: Cell<Option<PendingTransmit>>,
    receive_buffer: Cell<Option<&'a mut [u8]>>,
    receive_enabled: Cell<bool>,
    missed_frames: Cell<usize>,
}

impl<'a> Dwmac<'a> {
    pub const fn new(
        registers: StaticRef<DwmacRegisters>,
        clock: &'a dyn ClockInterface,
        tx: TxRing<'a>,
        rx: RxRing<'a>,
    ) -> Self {
        Self {
            registers,
            clock,
            tx,
            rx,
            descriptor_mode: Cell::new(DescriptorMode::Normal),
            client: Cell::new(None),
            transmit: Cell::new(None),
            receive_buffer: Cell::new(None),
            receive_enabled: Cell::new(false),
            missed_frames: Cell::new(0),
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

    pub fn tx_ring(&self) -> &TxRing<'a> {
        &self.tx
    }

    pub fn rx_ring(&self) -> &RxRing<'a> {
        &self.rx
    }

    /// Buffer the received frames are copied into before they are handed to
    /// the client.
    pub fn set_receive_buffer(&self, buffer: &'a mut [u8]) {
        self.receive_buffer.set(Some(buffer));
    }

    /// Frames dropped because the receive FIFO overflowed.
    pub fn missed_frames(&self) -> usize {
        self.missed_frames.get()
    }

    // Reset and PHY access

    /// Reset the MAC and DMA. The PHY clock must be running for the reset to
    /// complete.
    pub fn software_reset(&self) -> Result<(), ErrorCode> {
        self.registers.dmabmr.modify(DMABMR::SR::SET);
        poll::wait_until(CONFIG.enet_delay_timeout, || {
            !self.registers.dmabmr.is_set(DMABMR::SR)
        })
        .inspect_err(|_| log::warn!("dwmac: software reset timed out"))
    }

    pub fn txfifo_flush(&self) -> Result<(), ErrorCode> {
        self.registers.dmaomr.modify(DMAOMR::FTF::SET);
        poll::wait_until(CONFIG.enet_delay_timeout, || {
            !self.registers.dmaomr.is_set(DMAOMR::FTF)
        })
        .inspect_err(|_| log::warn!("dwmac: transmit FIFO flush timed out"))
    }

    /// Select the MDC divider that keeps the management clock within 2.5 MHz.
    pub fn mdc_clock_config(&self, hclk_hz: u32) -> Result<(), ErrorCode> {
        let range = match hclk_hz {
            0..=19_999_999 => {
                log::warn!("dwmac: HCLK {} Hz too slow for the MAC", hclk_hz);
                return Err(ErrorCode::INVAL);
            }
            20_000_000..=34_999_999 => 0b010,
            35_000_000..=59_999_999 => 0b011,
            60_000_000..=99_999_999 => 0b000,
            100_000_000..=149_999_999 => 0b001,
            150_000_000..=249_999_999 => 0b100,
            _ => 0b101,
        };
        self.registers.macmiiar.modify(MACMIIAR::CR.val(range));
        Ok(())
    }

    fn check_phy_address(phy_address: u8, register: u8) -> Result<(), ErrorCode> {
        if phy_address > 31 || register > 31 {
            return Err(ErrorCode::INVAL);
        }
        Ok(())
    }

    pub fn phy_read(&self, phy_address: u8, register: u8) -> Result<u16, ErrorCode> {
        Self::check_phy_address(phy_address, register)?;
        self.registers.macmiiar.modify(
            MACMIIAR::PA.val(phy_address.into())
                + MACMIIAR::MR.val(register.into())
                + MACMIIAR::MW::CLEAR
                + MACMIIAR::MB::SET,
        );
        poll::wait_until(CONFIG.phy_read_timeout, || {
            !self.registers.macmiiar.is_set(MACMIIAR::MB)
        })
        .inspect_err(|_| log::warn!("dwmac: PHY {} read of {} timed out", phy_address, register))?;
        Ok(self.registers.macmiidr.read(MACMIIDR::MD) as u16)
    }

    pub fn phy_write(&self, phy_address: u8, register: u8, value: u16) -> Result<(), ErrorCode> {
        Self::check_phy_address(phy_address, register)?;
        self.registers.macmiidr.write(MACMIIDR::MD.val(value.into()));
        self.registers.macmiiar.modify(
            MACMIIAR::PA.val(phy_address.into())
                + MACMIIAR::MR.val(register.into())
                + MACMIIAR::MW::SET
                + MACMIIAR::MB::SET,
        );
        poll::wait_until(CONFIG.phy_write_timeout, || {
            !self.registers.macmiiar.is_set(MACMIIAR::MB)
        })
        .inspect_err(|_| log::warn!("dwmac: PHY {} write of {} timed out", phy_address, register))
    }

    pub fn phy_loopback(&self, phy_address: u8, enable: bool) -> Result<(), ErrorCode> {
        let control = self.phy_read(phy_address, PHY_BCR)?;
        let control = if enable {
            control | PHY_LOOPBACK
        } else {
            control & !PHY_LOOPBACK
        };
        self.phy_write(phy_address, PHY_BCR, control)
    }

    /// Read `register` until one of the `mask` bits is set.
    fn phy_wait(&self, phy_address: u8, register: u8, mask: u16) -> Result<(), ErrorCode> {
        for _ in 0..CONFIG.phy_autonegotiation_timeout {
            if self.phy_read(phy_address, register)? & mask != 0 {
                return Ok(());
            }
        }
        log::warn!("dwmac: PHY {} register {} never set {:#06x}", phy_address, register, mask);
        Err(ErrorCode::BUSY)
    }

    fn phy_reset(&self, phy_address: u8) -> Result<(), ErrorCode> {
        self.phy_write(phy_address, PHY_BCR, PHY_RESET)?;
        for _ in 0..CONFIG.phy_autonegotiation_timeout {
            if self.phy_read(phy_address, PHY_BCR)? & PHY_RESET == 0 {
                return Ok(());
            }
        }
        log::warn!("dwmac: PHY {} stuck in reset", phy_address);
        Err(ErrorCode::BUSY)
    }

    /// Bring the PHY link up and return the mode it runs at.
    pub fn phy_media_config(
        &self,
        phy_address: u8,
        phy: &PhyConfig,
        media: Media,
    ) -> Result<MediaMode, ErrorCode> {
        self.phy_reset(phy_address)?;
        match media {
            Media::AutoNegotiation => {
                self.phy_wait(phy_address, PHY_BSR, PHY_LINKED_STATUS)?;
                self.phy_write(
                    phy_address,
                    PHY_BCR,
                    PHY_AUTONEGOTIATION | PHY_RESTART_AUTONEGOTIATION,
                )?;
                self.phy_wait(phy_address, PHY_BSR, PHY_AUTONEGO_COMPLETE)?;
                let status = self.phy_read(phy_address, phy.status_register)?;
                Ok(phy.media_mode(status))
            }
            Media::Fixed(mode) => {
                let mut control = 0;
                if mode.speed == Speed::Speed100M {
                    control |= PHY_SPEED_100M;
                }
                if mode.duplex == Duplex::Full {
                    control |= PHY_FULL_DUPLEX;
                }
                self.phy_write(phy_address, PHY_BCR, control)?;
                Ok(mode)
            }
        }
    }

    /// Reset the controller, bring up the PHY and program the MAC, the DMA,
    /// the frame filter and MAC address 0.
    pub fn init(&self, init: &EthernetInit) -> Result<MediaMode, ErrorCode> {
        self.mdc_clock_config(init.hclk_hz)?;
        self.software_reset()?;
        let media = self.phy_media_config(init.phy_address, &init.phy, init.media)?;
        self.configure_mac(&init.mac, media, init.checksum_offload);
        self.frame_filter_config(&init.frame_filter);
        self.configure_dma(&init.dma);
        self.mac_address_set(0, init.mac_address)?;
        log::debug!(
            "dwmac: {:?} {:?}, address {}",
            media.speed,
            media.duplex,
            init.mac_address
        );
        Ok(media)
    }

    /// Program MACCR, flow control and VLAN tagging. The transmitter and
    /// receiver enables are left as they are.
    pub fn configure_mac(&self, config: &MacConfig, media: MediaMode, checksum_offload: bool) {
        self.registers.maccr.modify(
            MACCR::WD.val(u32::from(!config.watchdog))
                + MACCR::JD.val(u32::from(!config.jabber))
                + MACCR::IFG.val(config.interframe_gap as u32)
                + MACCR::CSD.val(u32::from(!config.carrier_sense))
                + MACCR::FES.val(media.speed as u32)
                + MACCR::ROD.val(u32::from(!config.receive_own))
                + MACCR::LM.val(u32::from(config.loopback))
                + MACCR::DM.val(media.duplex as u32)
                + MACCR::IPCO.val(u32::from(checksum_offload))
                + MACCR::RD.val(u32::from(!config.retry))
                + MACCR::APCS.val(u32::from(config.automatic_pad_crc_strip))
                + MACCR::BL.val(config.backoff_limit as u32)
                + MACCR::DC.val(u32::from(config.deferral_check)),
        );
        self.flow_control_config(&config.flow_control);
        match config.vlan {
            Some(tag) => self.registers.macvlantr.write(
                MACVLANTR::VLANTC.val(u32::from(tag.twelve_bit))
                    + MACVLANTR::VLANTI.val(tag.identifier.into()),
            ),
            None => self.registers.macvlantr.set(0),
        }
    }

    /// Program the operation mode and bus mode registers. The transmit and
    /// receive starts are left as they are.
    pub fn configure_dma(&self, config: &DmaConfig) {
        self.registers.dmaomr.modify(
            DMAOMR::DTCEFD.val(u32::from(!config.drop_checksum_error_frames))
                + DMAOMR::RSF.val(u32::from(config.receive_store_forward))
                + DMAOMR::DFRF.val(u32::from(!config.flush_received_frames))
                + DMAOMR::TSF.val(u32::from(config.transmit_store_forward))
                + DMAOMR::TTC.val(config.transmit_threshold as u32)
                + DMAOMR::FEF.val(u32::from(config.forward_error_frames))
                + DMAOMR::FUGF.val(u32::from(config.forward_undersized_good_frames))
                + DMAOMR::RTC.val(config.receive_threshold as u32)
                + DMAOMR::OSF.val(u32::from(config.second_frame_operate)),
        );

        let (ratio, receive_priority) = match config.arbitration {
            DmaArbitration::RoundRobin1To1 => (0, false),
            DmaArbitration::RoundRobin2To1 => (1, false),
            DmaArbitration::RoundRobin3To1 => (2, false),
            DmaArbitration::RoundRobin4To1 => (3, false),
            DmaArbitration::ReceivePriority => (0, true),
        };
        // Normal descriptors are 16 bytes, skip the other half of the record.
        let skip = match config.descriptor_mode {
            DescriptorMode::Normal => 4,
            DescriptorMode::Enhanced => 0,
        };
        self.registers.dmabmr.write(
            DMABMR::MB.val(u32::from(config.mixed_burst))
                + DMABMR::AAB.val(u32::from(config.address_aligned_beats))
                + DMABMR::FPM.val(u32::from(config.burst_4x))
                + DMABMR::USP::SET
                + DMABMR::RDP.val(config.receive_burst_length as u32)
                + DMABMR::FB.val(u32::from(config.fixed_burst))
                + DMABMR::PM.val(ratio)
                + DMABMR::PBL.val(config.transmit_burst_length as u32)
                + DMABMR::EDFE.val(u32::from(
                    config.descriptor_mode == DescriptorMode::Enhanced,
                ))
                + DMABMR::DSL.val(skip)
                + DMABMR::DA.val(u32::from(receive_priority)),
        );
        self.descriptor_mode.set(config.descriptor_mode);
    }

    // Descriptor lists

    /// Initialize the transmit descriptors and program their address. The
    /// transmit DMA must be stopped.
    pub fn tx_ring_init(&self, layout: DescriptorLayout) -> Result<(), ErrorCode> {
        if self.registers.dmaomr.is_set(DMAOMR::ST) {
            return Err(ErrorCode::FAIL);
        }
        self.tx.init(layout, self.descriptor_mode.get())?;
        self.registers.dmatdlar.set(self.tx.base_address());
        Ok(())
    }

    /// Initialize the receive descriptors and program their address. The
    /// receive DMA must be stopped.
    pub fn rx_ring_init(&self, layout: DescriptorLayout) -> Result<(), ErrorCode> {
        if self.registers.dmaomr.is_set(DMAOMR::SR) {
            return Err(ErrorCode::FAIL);
        }
        self.rx.init(layout, self.descriptor_mode.get())?;
        self.registers.dmardlar.set(self.rx.base_address());
        Ok(())
    }

    /// Queue a frame and wake the transmit DMA if it ran out of descriptors.
    pub fn frame_transmit(&self, frame: &[u8]) -> Result<(), ErrorCode> {
        self.tx.frame_transmit(frame)?;
        if self.registers.dmasr.is_set(DMASR::TBUS) {
            self.registers.dmasr.write(DMASR::TBUS::SET);
            self.registers.dmatpdr.set(1);
        }
        Ok(())
    }

    /// Read the next frame and wake the receive DMA if it ran out of
    /// descriptors.
    pub fn frame_receive(&self, frame: &mut [u8]) -> Result<usize, ErrorCode> {
        let result = self.rx.frame_receive(frame);
        if result != Err(ErrorCode::BUSY) {
            self.resume_receive_if_starved();
        }
        result
    }

    /// Length of the pending frame without the CRC, 0 if none is complete.
    /// A frame with errors is dropped and the receive DMA woken if it ran
    /// out of descriptors.
    pub fn rxframe_size_get(&self) -> usize {
        let (size, dropped) = self.rx.frame_size_or_drop();
        if dropped {
            self.resume_receive_if_starved();
        }
        size
    }

    pub fn rxframe_drop(&self) -> Result<(), ErrorCode> {
        self.rx.rxframe_drop()?;
        self.resume_receive_if_starved();
        Ok(())
    }

    fn resume_receive_if_starved(&self) {
        if self.registers.dmasr.is_set(DMASR::RBUS) {
            self.registers.dmasr.write(DMASR::RBUS::SET);
            self.registers.dmarpdr.set(1);
        }
    }

    pub fn current_desc_address_get(&self, which: CurrentDesc) -> u32 {
        match which {
            CurrentDesc::TxDescriptor => self.registers.dmachtdr.get(),
            CurrentDesc::RxDescriptor => self.registers.dmachrdr.get(),
            CurrentDesc::TxBuffer => self.registers.dmachtbar.get(),
            CurrentDesc::RxBuffer => self.registers.dmachrbar.get(),
        }
    }

    // Enable and disable

    /// Start the MAC and both DMA directions.
    pub fn enable(&self) -> Result<(), ErrorCode> {
        self.registers.maccr.modify(MACCR::TE::SET + MACCR::RE::SET);
        self.txfifo_flush()?;
        self.registers
            .dmaomr
            .modify(DMAOMR::ST::SET + DMAOMR::SR::SET);
        log::debug!("dwmac: enabled");
        Ok(())
    }

    pub fn disable(&self) -> Result<(), ErrorCode> {
        self.registers
            .dmaomr
            .modify(DMAOMR::ST::CLEAR + DMAOMR::SR::CLEAR);
        self.registers.maccr.modify(MACCR::RE::CLEAR);
        let flushed = self.txfifo_flush();
        self.registers.maccr.modify(MACCR::TE::CLEAR);
        log::debug!("dwmac: disabled");
        flushed
    }

    pub fn tx_enable(&self) -> Result<(), ErrorCode> {
        self.registers.maccr.modify(MACCR::TE::SET);
        self.txfifo_flush()?;
        self.registers.dmaomr.modify(DMAOMR::ST::SET);
        Ok(())
    }

    pub fn tx_disable(&self) -> Result<(), ErrorCode> {
        self.registers.dmaomr.modify(DMAOMR::ST::CLEAR);
        let flushed = self.txfifo_flush();
        self.registers.maccr.modify(MACCR::TE::CLEAR);
        flushed
    }

    pub fn rx_enable(&self) {
        self.registers.maccr.modify(MACCR::RE::SET);
        self.registers.dmaomr.modify(DMAOMR::SR::SET);
    }

    pub fn rx_disable(&self) {
        self.registers.dmaomr.modify(DMAOMR::SR::CLEAR);
        self.registers.maccr.modify(MACCR::RE::CLEAR);
    }

    fn is_transmit_enabled(&self) -> bool {
        self.registers.maccr.is_set(MACCR::TE) && self.registers.dmaomr.is_set(DMAOMR::ST)
    }

    // Addresses and filtering

    /// Address 0 is the station address. Addresses 1 to 3 take part in
    /// perfect filtering once enabled with [`Dwmac::address_filter`].
    pub fn mac_address_set(&self, index: usize, address: MacAddress) -> Result<(), ErrorCode> {
        let slot = self.registers.maca.get(index).ok_or(ErrorCode::INVAL)?;
        let b = address.as_bytes();
        slot.high
            .modify(MACAHR::ADDRH.val((u32::from(b[5]) << 8) | u32::from(b[4])));
        slot.low.set(u32::from_le_bytes([b[0], b[1], b[2], b[3]]));
        Ok(())
    }

    pub fn mac_address_get(&self, index: usize) -> Result<MacAddress, ErrorCode> {
        let slot = self.registers.maca.get(index).ok_or(ErrorCode::INVAL)?;
        let high = slot.high.read(MACAHR::ADDRH);
        let low = slot.low.get().to_le_bytes();
        Ok(MacAddress::new([
            low[0],
            low[1],
            low[2],
            low[3],
            high as u8,
            (high >> 8) as u8,
        ]))
    }

    /// Configure how address 1 to 3 is compared. Bit `n` of `mask_bytes`
    /// excludes address byte `n` from the comparison.
    pub fn address_filter_config(
        &self,
        index: usize,
        kind: AddressFilterKind,
        mask_bytes: u8,
    ) -> Result<(), ErrorCode> {
        if index == 0 || index >= MAC_ADDRESS_COUNT || mask_bytes > 0x3F {
            return Err(ErrorCode::INVAL);
        }
        self.registers.maca[index].high.modify(
            MACAHR::SA.val(u32::from(kind == AddressFilterKind::Source))
                + MACAHR::MBC.val(mask_bytes.into()),
        );
        Ok(())
    }

    pub fn address_filter(&self, index: usize, enable: bool) -> Result<(), ErrorCode> {
        if index == 0 || index >= MAC_ADDRESS_COUNT {
            return Err(ErrorCode::INVAL);
        }
        self.registers.maca[index]
            .high
            .modify(MACAHR::AE.val(u32::from(enable)));
        Ok(())
    }

    pub fn frame_filter_config(&self, filter: &FrameFilter) {
        let (saf, saif) = match filter.source_address {
            SourceAddressFilter::Disabled => (0, 0),
            SourceAddressFilter::Normal => (1, 0),
            SourceAddressFilter::Inverse => (1, 1),
        };
        let (hm, pam, multicast_hpf) = match filter.multicast {
            MulticastFilter::Perfect => (0, 0, false),
            MulticastFilter::Hash => (1, 0, false),
            MulticastFilter::PerfectAndHash => (1, 0, true),
            MulticastFilter::PassAll => (0, 1, false),
        };
        let (hu, unicast_hpf) = match filter.unicast {
            UnicastFilter::Perfect => (0, false),
            UnicastFilter::Hash => (1, false),
            UnicastFilter::PerfectAndHash => (1, true),
        };
        self.registers.macffr.write(
            MACFFR::RA.val(u32::from(filter.receive_all))
                + MACFFR::HPF.val(u32::from(multicast_hpf || unicast_hpf))
                + MACFFR::SAF.val(saf)
                + MACFFR::SAIF.val(saif)
                + MACFFR::PCF.val(filter.control_frames as u32)
                + MACFFR::BFD.val(u32::from(!filter.broadcast))
                + MACFFR::PAM.val(pam)
                + MACFFR::DAIF.val(u32::from(filter.destination_inverse))
                + MACFFR::HM.val(hm)
                + MACFFR::HU.val(hu)
                + MACFFR::PM.val(u32::from(filter.promiscuous)),
        );
        self.registers
            .machthr
            .set((filter.hash_table >> 32) as u32);
        self.registers.machtlr.set(filter.hash_table as u32);
    }

    // Flow control

    pub fn flow_control_config(&self, flow: &FlowControl) {
        self.registers.macfcr.write(
            MACFCR::PT.val(flow.pause_time.into())
                + MACFCR::ZQPD.val(u32::from(!flow.zero_quanta_pause))
                + MACFCR::PLT.val(flow.pause_low_threshold as u32)
                + MACFCR::UPFD.val(u32::from(flow.unicast_pause_frame_detect))
                + MACFCR::RFCE.val(u32::from(flow.receive))
                + MACFCR::TFCE.val(u32::from(flow.transmit)),
        );
    }

    /// Send a pause frame (full duplex). `BUSY` while the previous one is
    /// still being sent.
    pub fn pause_frame_generate(&self) -> Result<(), ErrorCode> {
        if self.registers.macfcr.is_set(MACFCR::FCB_BPA) {
            return Err(ErrorCode::BUSY);
        }
        self.registers.macfcr.modify(MACFCR::FCB_BPA::SET);
        Ok(())
    }

    /// Apply back pressure on the link (half duplex).
    pub fn back_pressure(&self, enable: bool) {
        self.registers
            .macfcr
            .modify(MACFCR::FCB_BPA.val(u32::from(enable)));
    }

    // DMA status and interrupts

    pub fn flag_get(&self, flag: DmaFlag) -> bool {
        self.registers.dmasr.get() & flag.mask() != 0
    }

    /// Clear a write-one-to-clear status flag. The MAC event summaries clear
    /// at their source and give `INVAL`.
    pub fn flag_clear(&self, flag: DmaFlag) -> Result<(), ErrorCode> {
        if flag.is_read_only() {
            return Err(ErrorCode::INVAL);
        }
        self.registers.dmasr.set(flag.mask());
        Ok(())
    }

    pub fn interrupt_enable(&self, interrupt: DmaInterrupt) {
        match interrupt {
            DmaInterrupt::TimestampTrigger => self.registers.macimr.modify(MACIMR::TSTIM::CLEAR),
            DmaInterrupt::PowerManagement => self.registers.macimr.modify(MACIMR::PMTIM::CLEAR),
            _ => {
                let mask = interrupt.dma_mask().unwrap_or(0);
                self.registers
                    .dmaier
                    .set(self.registers.dmaier.get() | mask);
            }
        }
    }

    pub fn interrupt_disable(&self, interrupt: DmaInterrupt) {
        match interrupt {
            DmaInterrupt::TimestampTrigger => self.registers.macimr.modify(MACIMR::TSTIM::SET),
            DmaInterrupt::PowerManagement => self.registers.macimr.modify(MACIMR::PMTIM::SET),
            _ => {
                let mask = interrupt.dma_mask().unwrap_or(0);
                self.registers
                    .dmaier
                    .set(self.registers.dmaier.get() & !mask);
            }
        }
    }

    /// Pending and enabled.
    pub fn interrupt_flag_get(&self, interrupt: DmaInterrupt) -> bool {
        match interrupt {
            DmaInterrupt::TimestampTrigger => {
                self.registers.macsr.is_set(MACSR::TSTS)
                    && !self.registers.macimr.is_set(MACIMR::TSTIM)
            }
            DmaInterrupt::PowerManagement => {
                self.registers.macsr.is_set(MACSR::PMTS)
                    && !self.registers.macimr.is_set(MACIMR::PMTIM)
            }
            _ => {
                let mask = interrupt.dma_mask().unwrap_or(0);
                self.registers.dmasr.get() & self.registers.dmaier.get() & mask != 0
            }
        }
    }

    /// Clear a pending interrupt. The MAC interrupts clear by reading their
    /// source register.
    pub fn interrupt_flag_clear(&self, interrupt: DmaInterrupt) {
        match interrupt {
            DmaInterrupt::TimestampTrigger => {
                let _ = self.registers.ptptssr.get();
            }
            DmaInterrupt::PowerManagement => {
                let _ = self.registers.macpmtcsr.get();
            }
            _ => self
                .registers
                .dmasr
                .set(interrupt.dma_mask().unwrap_or(0)),
        }
    }

    /// Frames missed by the controller for lack of a receive descriptor, and
    /// frames missed by the application because the receive FIFO
    /// overflowed. Both counters clear when read.
    pub fn missed_frame_counter_get(&self) -> (u32, u32) {
        let counters = self.registers.dmamfbocr.extract();
        (
            counters.read(DMAMFBOCR::MFC),
            counters.read(DMAMFBOCR::MFA),
        )
    }

    /// Raw TPS or RPS field.
    pub fn dma_process_state_get(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Transmit => self.registers.dmasr.read(DMASR::TPS),
            Direction::Receive => self.registers.dmasr.read(DMASR::RPS),
        }
    }

    pub fn tx_process_state(&self) -> Option<TxProcessState> {
        match self.registers.dmasr.read(DMASR::TPS) {
            0b000 => Some(TxProcessState::Stopped),
            0b001 => Some(TxProcessState::FetchingDescriptor),
            0b010 => Some(TxProcessState::WaitingForStatus),
            0b011 => Some(TxProcessState::ReadingData),
            0b110 => Some(TxProcessState::Suspended),
            0b111 => Some(TxProcessState::ClosingDescriptor),
            _ => None,
        }
    }

    pub fn rx_process_state(&self) -> Option<RxProcessState> {
        match self.registers.dmasr.read(DMASR::RPS) {
            0b000 => Some(RxProcessState::Stopped),
            0b001 => Some(RxProcessState::FetchingDescriptor),
            0b011 => Some(RxProcessState::WaitingForFrame),
            0b100 => Some(RxProcessState::Suspended),
            0b101 => Some(RxProcessState::ClosingDescriptor),
            0b111 => Some(RxProcessState::TransferringData),
            _ => None,
        }
    }

    /// Issue a poll demand to a suspended DMA direction.
    pub fn dma_process_resume(&self, direction: Direction) {
        match direction {
            Direction::Transmit => {
                self.registers.dmasr.write(DMASR::TBUS::SET);
                self.registers.dmatpdr.set(1);
            }
            Direction::Receive => {
                self.registers.dmasr.write(DMASR::RBUS::SET);
                self.registers.dmarpdr.set(1);
            }
        }
    }

    /// Recover a receive DMA that ran out of descriptors.
    ///
    /// When the current descriptor is owned by the DMA but the DMA works on
    /// another one, the ring follows the DMA. A receive process suspended on
    /// an unavailable buffer is then resumed.
    pub fn rx_process_check_recovery(&self) {
        self.rx_resync();
        if self.registers.dmasr.is_set(DMASR::RBUS) {
            self.dma_process_resume(Direction::Receive);
        }
    }

    fn rx_resync(&self) {
        if self.rx.is_current_owned_by_dma() {
            let dma_current = self.registers.dmachrdr.get();
            if let Some(index) = self.rx.index_of(dma_current) {
                if index != self.rx.current_descriptor_index() {
                    log::debug!("dwmac: receive ring resynchronized to {}", index);
                    self.rx.set_current(index);
                }
            }
        }
    }

    /// Follow the transmit DMA after it skipped descriptors.
    pub fn tx_process_check_recovery(&self) {
        let dma_current = self.registers.dmachtdr.get();
        if let Some(index) = self.tx.index_of(dma_current) {
            if self.transmit.take().is_some() {
                log::warn!("dwmac: pending transmit lost in recovery");
            }
            self.tx.set_current(index);
        }
    }

    pub fn debug_status_get(&self, status: DebugStatus) -> u32 {
        let field = match status {
            DebugStatus::TxFifoFull => MACDBGR::TFF,
            DebugStatus::TxFifoNotEmpty => MACDBGR::TFNEGU,
            DebugStatus::TxFifoWriteActive => MACDBGR::TFWA,
            DebugStatus::TxFifoReadStatus => MACDBGR::TFRS,
            DebugStatus::TransmitterPaused => MACDBGR::MTP,
            DebugStatus::TransmitFrameControllerStatus => MACDBGR::MTFCS,
            DebugStatus::TransmitEngineActive => MACDBGR::MMTEA,
            DebugStatus::RxFifoFillLevel => MACDBGR::RFFL,
            DebugStatus::RxFifoReadStatus => MACDBGR::RFRCS,
            DebugStatus::RxFifoWriteActive => MACDBGR::RFWRA,
            DebugStatus::SmallFifoStatus => MACDBGR::MSFRWCS,
            DebugStatus::ReceiveEngineActive => MACDBGR::MMRPEA,
        };
        self.registers.macdbgr.read(field)
    }

    // MMC counters

    pub fn msc_counters_reset(&self) {
        self.registers.mmccr.modify(MMCCR::CR::SET);
    }

    pub fn msc_feature(&self, feature: MscFeature, enable: bool) {
        let field = match feature {
            MscFeature::CounterStopRollover => MMCCR::CSR,
            MscFeature::ResetOnRead => MMCCR::ROR,
            MscFeature::Freeze => MMCCR::MCF,
            MscFeature::Preset => MMCCR::MCP,
            MscFeature::PresetFull => MMCCR::MCFHP,
        };
        self.registers.mmccr.modify(field.val(u32::from(enable)));
    }

    pub fn msc_counter_get(&self, counter: MscCounter) -> u32 {
        match counter {
            MscCounter::TxSingleCollision => self.registers.mmctgfsccr.get(),
            MscCounter::TxMultipleCollision => self.registers.mmctgfmsccr.get(),
            MscCounter::TxGood => self.registers.mmctgfcr.get(),
            MscCounter::RxCrcError => self.registers.mmcrfcecr.get(),
            MscCounter::RxAlignmentError => self.registers.mmcrfaecr.get(),
            MscCounter::RxGoodUnicast => self.registers.mmcrgufcr.get(),
        }
    }

    /// Mask the counter interrupts raised when a counter reaches half of its
    /// range.
    pub fn msc_interrupts_mask(&self, mask: bool) {
        // RGUFM, RFAEM and RFCEM
        let receive = (1 << 17) | (1 << 6) | (1 << 5);
        // TGFM, TGFMSCM and TGFSCM
        let transmit = (1 << 21) | (1 << 15) | (1 << 14);
        if mask {
            self.registers.mmcrimr.set(receive);
            self.registers.mmctimr.set(transmit);
        } else {
            self.registers.mmcrimr.set(0);
            self.registers.mmctimr.set(0);
        }
    }

    /// Counters that reached half of their range, receive then transmit.
    pub fn msc_interrupt_status(&self) -> (u32, u32) {
        (self.registers.mmcrir.get(), self.registers.mmctir.get())
    }

    // PTP

    /// Start the system time with fine correction.
    ///
    /// `subsecond_increment` is added on every update, which happens when
    /// the accumulator overflows after adding `addend` on each HCLK cycle.
    pub fn ptp_timestamp_init(&self, subsecond_increment: u8, addend: u32) -> Result<(), ErrorCode> {
        self.registers.macimr.modify(MACIMR::TSTIM::SET);
        self.registers.ptptscr.modify(PTPTSCR::TSE::SET);
        self.registers.ptpssir.set(subsecond_increment.into());

        self.registers.ptptsar.set(addend);
        self.registers.ptptscr.modify(PTPTSCR::TTSARU::SET);
        poll::wait_until(CONFIG.enet_delay_timeout, || {
            !self.registers.ptptscr.is_set(PTPTSCR::TTSARU)
        })
        .inspect_err(|_| log::warn!("dwmac: PTP addend update timed out"))?;

        self.registers.ptptscr.modify(PTPTSCR::TSFCU::SET);
        self.registers.ptptshur.set(0);
        self.registers.ptptslur.set(0);
        self.registers.ptptscr.modify(PTPTSCR::TSSTI::SET);
        poll::wait_until(CONFIG.enet_delay_timeout, || {
            !self.registers.ptptscr.is_set(PTPTSCR::TSSTI)
        })
        .inspect_err(|_| log::warn!("dwmac: PTP time initialization timed out"))
    }

    /// Add or subtract an offset from the system time.
    pub fn ptp_timestamp_update(
        &self,
        sign: Sign,
        seconds: u32,
        subseconds: u32,
    ) -> Result<(), ErrorCode> {
        if subseconds > 0x7FFF_FFFF {
            return Err(ErrorCode::INVAL);
        }
        if self.registers.ptptscr.is_set(PTPTSCR::TSSTU) {
            return Err(ErrorCode::BUSY);
        }
        self.registers.ptptshur.set(seconds);
        self.registers.ptptslur.write(
            PTPTSLR::NEG.val(u32::from(sign == Sign::Negative))
                + PTPTSLR::SUBSECONDS.val(subseconds),
        );
        self.registers.ptptscr.modify(PTPTSCR::TSSTU::SET);
        poll::wait_until(CONFIG.enet_delay_timeout, || {
            !self.registers.ptptscr.is_set(PTPTSCR::TSSTU)
        })
        .inspect_err(|_| log::warn!("dwmac: PTP time update timed out"))
    }

    /// Change the frequency correction.
    pub fn ptp_addend_update(&self, addend: u32) -> Result<(), ErrorCode> {
        self.registers.ptptsar.set(addend);
        self.registers.ptptscr.modify(PTPTSCR::TTSARU::SET);
        poll::wait_until(CONFIG.enet_delay_timeout, || {
            !self.registers.ptptscr.is_set(PTPTSCR::TTSARU)
        })
        .inspect_err(|_| log::warn!("dwmac: PTP addend update timed out"))
    }

    pub fn ptp_system_time_get(&self) -> PtpTime {
        let seconds = self.registers.ptptshr.get();
        let low = self.registers.ptptslr.extract();
        PtpTime {
            sign: if low.is_set(PTPTSLR::NEG) {
                Sign::Negative
            } else {
                Sign::Positive
            },
            seconds,
            subseconds: low.read(PTPTSLR::SUBSECONDS),
        }
    }

    /// Raise the timestamp trigger interrupt when the system time reaches
    /// the target.
    pub fn ptp_target_time_set(&self, seconds: u32, subseconds: u32) {
        self.registers.ptptthr.set(seconds);
        self.registers.ptpttlr.set(subseconds);
        self.registers.ptptscr.modify(PTPTSCR::TSITE::SET);
    }

    /// PPS output frequency, 2^`exponent` Hz.
    pub fn ptp_pps_output_frequency(&self, exponent: u8) -> Result<(), ErrorCode> {
        if exponent > 15 {
            return Err(ErrorCode::INVAL);
        }
        self.registers.ptpppscr.set(exponent.into());
        Ok(())
    }

    // Wake-up management

    pub fn wum_magic_packet(&self, enable: bool) {
        self.registers
            .macpmtcsr
            .modify(MACPMTCSR::MPE.val(u32::from(enable)));
    }

    pub fn wum_wakeup_frame(&self, enable: bool) {
        self.registers
            .macpmtcsr
            .modify(MACPMTCSR::WFE.val(u32::from(enable)));
    }

    pub fn wum_global_unicast(&self, enable: bool) {
        self.registers
            .macpmtcsr
            .modify(MACPMTCSR::GU.val(u32::from(enable)));
    }

    /// Enter power down. The MAC drops every frame until a wake-up event.
    pub fn wum_power_down(&self, enable: bool) {
        self.registers
            .macpmtcsr
            .modify(MACPMTCSR::PD.val(u32::from(enable)));
    }

    pub fn wum_filter_register_pointer_reset(&self) {
        self.registers.macpmtcsr.modify(MACPMTCSR::WFFRPR::SET);
    }

    /// Load the wake-up frame filter: four byte masks, the commands, the
    /// offsets and two CRC16 words.
    pub fn wum_filter_config(&self, filter: &[u32; 8]) {
        self.wum_filter_register_pointer_reset();
        for word in filter {
            self.registers.macrwuffr.set(*word);
        }
    }

    /// Both flags clear when the register is read.
    pub fn wum_flag_get(&self, flag: WumFlag) -> bool {
        match flag {
            WumFlag::MagicPacketReceived => self.registers.macpmtcsr.is_set(MACPMTCSR::MPR),
            WumFlag::WakeupFrameReceived => self.registers.macpmtcsr.is_set(MACPMTCSR::WFR),
        }
    }

    // Interrupt handling

    fn transmit_done(&self) {
        let Some(status) = self.tx.last_frame_status() else {
            return;
        };
        if let Some(pending) = self.transmit.take() {
            if status.is_err() {
                log::debug!("dwmac: transmit of frame {} failed", pending.identifier);
            }
            match self.client.get() {
                Some(client) => client.transmit_frame_done(
                    status,
                    pending.buffer,
                    pending.len,
                    pending.identifier,
                    self.tx.last_timestamp(),
                ),
                None => log::trace!("dwmac: transmit done without a client"),
            }
        }
    }

    fn receive_frames(&self) {
        let Some(buffer) = self.receive_buffer.take() else {
            log::warn!("dwmac: no receive buffer, dropping frames");
            while self.rx.rxframe_drop().is_ok() {}
            return;
        };
        for _ in 0..self.rx.len() {
            match self.rx.frame_receive(buffer) {
                Ok(length) => {
                    if let Some(client) = self.client.get() {
                        client.received_frame(&buffer[..length], self.rx.last_timestamp());
                    }
                }
                Err(ErrorCode::BUSY) | Err(ErrorCode::OFF) => break,
                Err(e) => log::debug!("dwmac: receive error {:?}", e),
            }
        }
        self.receive_buffer.set(Some(buffer));
        self.resume_receive_if_starved();
    }

    fn handle_abnormal_interrupt(&self, status: u32) {
        let is = |flag: DmaFlag| status & flag.mask() != 0;
        if is(DmaFlag::FatalBusError) {
            log::warn!(
                "dwmac: fatal bus error {}, DMA stopped",
                self.registers.dmasr.read(DMASR::EBS)
            );
        }
        if is(DmaFlag::TransmitUnderflow) {
            log::debug!("dwmac: transmit underflow");
            self.dma_process_resume(Direction::Transmit);
            self.transmit_done();
        }
        if is(DmaFlag::ReceiveOverflow) {
            self.missed_frames.set(self.missed_frames.get() + 1);
        }
        if is(DmaFlag::TransmitJabberTimeout) {
            log::warn!("dwmac: transmit jabber timeout");
        }
        if is(DmaFlag::ReceiveBufferUnavailable) {
            // The flag is already cleared, resume unconditionally.
            self.rx_resync();
            self.dma_process_resume(Direction::Receive);
        }
        if is(DmaFlag::ReceiveProcessStopped) || is(DmaFlag::TransmitProcessStopped) {
            log::debug!(
                "dwmac: DMA stopped, tx {:?} rx {:?}",
                self.tx_process_state(),
                self.rx_process_state()
            );
        }
    }

    /// Dispatch DMA events: completed transmits and received frames go to
    /// the client, errors are counted and recovered from.
    pub fn handle_interrupt(&self) {
        let status = self.registers.dmasr.get();
        // Clear what is about to be handled, so that new events raise the
        // interrupt again.
        let handled = status & 0x0001_E7FF;
        self.registers.dmasr.set(handled);

        if status & DmaFlag::Transmit.mask() != 0 {
            self.transmit_done();
        }
        if status & DmaFlag::Receive.mask() != 0 && self.receive_enabled.get() {
            self.receive_frames();
        }
        if status & DmaFlag::AbnormalSummary.mask() != 0 {
            self.handle_abnormal_interrupt(status);
        }
    }
}

impl<'a> EthernetAdapterDatapath<'a> for Dwmac<'a> {
    fn set_client(&self, client: &'a dyn EthernetAdapterDatapathClient) {
        self.client.set(Some(client));
    }

    fn enable_receive(&self) {
        self.rx_enable();
        self.receive_enabled.set(true);
        self.resume_receive_if_starved();
    }

    fn disable_receive(&self) {
        self.receive_enabled.set(false);
        self.rx_disable();
    }

    fn transmit_frame(
        &self,
        frame_buffer: &'static mut [u8],
        len: u16,
        transmission_identifier: usize,
    ) -> Result<(), (ErrorCode, &'static mut [u8])> {
        if !self.is_transmit_enabled() {
            return Err((ErrorCode::OFF, frame_buffer));
        }
        if let Some(pending) = self.transmit.take() {
            self.transmit.set(Some(pending));
            return Err((ErrorCode::BUSY, frame_buffer));
        }
        let frame_len = usize::from(len);
        if frame_len > frame_buffer.len() {
            return Err((ErrorCode::SIZE, frame_buffer));
        }
        if let Err(e) = self.frame_transmit(&frame_buffer[..frame_len]) {
            return Err((e, frame_buffer));
        }
        self.transmit.set(Some(PendingTransmit {
            buffer: frame_buffer,
            len,
            identifier: transmission_identifier,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use kernel::platform::chip::NO_CLOCK_CONTROL;
    use kernel::utilities::emulated::EmulatedRegisters;
    use std::boxed::Box;
    use std::vec::Vec;

    const MACCR: usize = 0x0000;
    const MACFFR: usize = 0x0004;
    const MACHTHR: usize = 0x0008;
    const MACHTLR: usize = 0x000C;
    const MACMIIAR: usize = 0x0010;
    const MACMIIDR: usize = 0x0014;
    const MACFCR: usize = 0x0018;
    const MACVLANTR: usize = 0x001C;
    const MACRWUFFR: usize = 0x0028;
    const MACPMTCSR: usize = 0x002C;
    const MACDBGR: usize = 0x0034;
    const MACIMR: usize = 0x003C;
    const MACA0HR: usize = 0x0040;
    const MACA0LR: usize = 0x0044;
    const MACA2HR: usize = 0x0050;
    const MMCCR: usize = 0x0100;
    const MMCRGUFCR: usize = 0x01C4;
    const PTPTSCR: usize = 0x0700;
    const PTPSSIR: usize = 0x0704;
    const PTPTSHR: usize = 0x0708;
    const PTPTSLR: usize = 0x070C;
    const PTPTSHUR: usize = 0x0710;
    const PTPTSLUR: usize = 0x0714;
    const PTPTSAR: usize = 0x0718;
    const DMABMR: usize = 0x1000;
    const DMATPDR: usize = 0x1004;
    const DMARPDR: usize = 0x1008;
    const DMARDLAR: usize = 0x100C;
    const DMATDLAR: usize = 0x1010;
    const DMASR: usize = 0x1014;
    const DMAOMR: usize = 0x1018;
    const DMAIER: usize = 0x101C;
    const DMAMFBOCR: usize = 0x1020;
    const DMACHRDR: usize = 0x104C;

    const OWN: u32 = 1 << 31;
    const TE: u32 = 1 << 3;
    const RE: u32 = 1 << 2;
    const ST: u32 = 1 << 13;
    const SR: u32 = 1 << 1;
    const NIS: u32 = 1 << 16;
    const AIS: u32 = 1 << 15;
    const RBUS: u32 = 1 << 7;
    const RS: u32 = 1 << 6;
    const TBUS: u32 = 1 << 2;
    const TS: u32 = 1 << 0;

    #[derive(Default)]
    struct Recorder {
        transmitted: Cell<Option<(Result<(), ErrorCode>, u16, usize)>>,
        received: core::cell::RefCell<Vec<Vec<u8>>>,
    }

    impl EthernetAdapterDatapathClient for Recorder {
        fn transmit_frame_done(
            &self,
            err: Result<(), ErrorCode>,
            _frame_buffer: &'static mut [u8],
            len: u16,
            transmission_identifier: usize,
            _timestamp: Option<u64>,
        ) {
            self.transmitted
                .set(Some((err, len, transmission_identifier)));
        }

        fn received_frame(&self, frame: &[u8], _timestamp: Option<u64>) {
            self.received.borrow_mut().push(frame.to_vec());
        }
    }

    struct Lists<const N: usize> {
        tx_descriptors: [TxDescriptor; N],
        tx_buffers: [DmaBuffer; N],
        rx_descriptors: [RxDescriptor; N],
        rx_buffers: [DmaBuffer; N],
    }

    impl<const N: usize> Lists<N> {
        fn new() -> Box<Self> {
            Box::new(Self {
                tx_descriptors: core::array::from_fn(|_| TxDescriptor::new()),
                tx_buffers: core::array::from_fn(|_| DmaBuffer::new()),
                rx_descriptors: core::array::from_fn(|_| RxDescriptor::new()),
                rx_buffers: core::array::from_fn(|_| DmaBuffer::new()),
            })
        }

        fn dwmac<'a>(&'a self, regs: &EmulatedRegisters<DwmacRegisters>) -> Dwmac<'a> {
            Dwmac::new(
                regs.registers(),
                &NO_CLOCK_CONTROL,
                TxRing::new(&self.tx_descriptors, &self.tx_buffers, ENET_MAX_FRAME_SIZE),
                RxRing::new(&self.rx_descriptors, &self.rx_buffers, ENET_MAX_FRAME_SIZE),
            )
        }
    }

    fn static_frame(len: usize) -> &'static mut [u8] {
        Box::leak(std::vec![0x5A; len].into_boxed_slice())
    }

    #[test]
    fn reset_and_flush_time_out() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);
        assert_eq!(Err(ErrorCode::BUSY), dwmac.software_reset());
        assert_eq!(1, regs.peek(DMABMR) & 1);
        assert_eq!(Err(ErrorCode::BUSY), dwmac.txfifo_flush());
        assert_eq!(1 << 20, regs.peek(DMAOMR));

        regs.poke(DMABMR, 0);
        regs.poke(DMAOMR, 0);
        assert_eq!(Err(ErrorCode::BUSY), dwmac.tx_enable());
        // The DMA is not started when the flush fails.
        assert_eq!(TE, regs.peek(MACCR));
        assert_eq!(0, regs.peek(DMAOMR) & ST);
    }

    #[test]
    fn mdc_clock_ranges() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);
        assert_eq!(Err(ErrorCode::INVAL), dwmac.mdc_clock_config(8_000_000));
        for (hclk, range) in [
            (25_000_000, 0b010),
            (48_000_000, 0b011),
            (72_000_000, 0b000),
            (120_000_000, 0b001),
            (168_000_000, 0b100),
            (288_000_000, 0b101),
        ] {
            assert_eq!(Ok(()), dwmac.mdc_clock_config(hclk));
            assert_eq!(range << 2, regs.peek(MACMIIAR));
        }
    }

    #[test]
    fn phy_access_encoding() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);
        assert_eq!(Err(ErrorCode::INVAL), dwmac.phy_read(32, 1));
        assert_eq!(Err(ErrorCode::INVAL), dwmac.phy_write(1, 32, 0));

        dwmac.mdc_clock_config(168_000_000).unwrap();
        // MB stays set in plain memory.
        assert_eq!(Err(ErrorCode::BUSY), dwmac.phy_write(3, 0, 0x1200));
        assert_eq!(0x1200, regs.peek(MACMIIDR));
        assert_eq!(
            (3 << 11) | (0b100 << 2) | (1 << 1) | 1,
            regs.peek(MACMIIAR)
        );
        assert_eq!(Err(ErrorCode::BUSY), dwmac.phy_read(3, 0x10));
        assert_eq!((3 << 11) | (0x10 << 6) | (0b100 << 2) | 1, regs.peek(MACMIIAR));
    }

    #[test]
    fn phy_status_decoding() {
        let phy = PhyConfig::default();
        assert_eq!(
            MediaMode {
                speed: Speed::Speed100M,
                duplex: Duplex::Full,
            },
            phy.media_mode(0x0004)
        );
        assert_eq!(
            MediaMode {
                speed: Speed::Speed10M,
                duplex: Duplex::Half,
            },
            phy.media_mode(0x0002)
        );

        let other = PhyConfig {
            status_register: 0x1F,
            speed_mask: 0x0004,
            duplex_mask: 0x0010,
        };
        assert_eq!(Speed::Speed10M, other.media_mode(0x0014).speed);
        assert_eq!(Duplex::Full, other.media_mode(0x0014).duplex);
    }

    #[test]
    fn init_stops_when_reset_times_out() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);
        assert_eq!(
            Err(ErrorCode::BUSY),
            dwmac.init(&EthernetInit::default())
        );
        assert_eq!(0, regs.peek(MACCR));
        assert_eq!(0, regs.peek(DMAOMR));
    }

    #[test]
    fn mac_configuration() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);
        regs.poke(MACCR, TE | RE);
        let full_100 = MediaMode {
            speed: Speed::Speed100M,
            duplex: Duplex::Full,
        };
        dwmac.configure_mac(&MacConfig::default(), full_100, true);
        assert_eq!((1 << 14) | (1 << 11) | (1 << 10) | TE | RE, regs.peek(MACCR));
        // Zero-quanta pause disabled by default.
        assert_eq!(1 << 7, regs.peek(MACFCR));
        assert_eq!(0, regs.peek(MACVLANTR));

        let config = MacConfig {
            watchdog: false,
            loopback: true,
            retry: false,
            interframe_gap: InterFrameGap::Bits40,
            backoff_limit: BackoffLimit::K1,
            vlan: Some(VlanTag {
                identifier: 0x123,
                twelve_bit: true,
            }),
            flow_control: FlowControl {
                pause_time: 0x100,
                zero_quanta_pause: true,
                receive: true,
                transmit: true,
                ..FlowControl::default()
            },
            ..MacConfig::default()
        };
        let half_10 = MediaMode {
            speed: Speed::Speed10M,
            duplex: Duplex::Half,
        };
        dwmac.configure_mac(&config, half_10, false);
        assert_eq!(
            (1 << 23) | (7 << 17) | (1 << 12) | (1 << 9) | (3 << 5) | TE | RE,
            regs.peek(MACCR)
        );
        assert_eq!((0x100 << 16) | (1 << 2) | (1 << 1), regs.peek(MACFCR));
        assert_eq!((1 << 16) | 0x123, regs.peek(MACVLANTR));
    }

    #[test]
    fn dma_configuration() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);
        regs.poke(DMAOMR, ST | SR);
        dwmac.configure_dma(&DmaConfig::default());
        assert_eq!((1 << 25) | (1 << 21) | ST | SR, regs.peek(DMAOMR));
        assert_eq!(0x02C1_2010, regs.peek(DMABMR));

        dwmac.configure_dma(&DmaConfig {
            descriptor_mode: DescriptorMode::Enhanced,
            arbitration: DmaArbitration::ReceivePriority,
            transmit_burst_length: BurstLength::Beats8,
            receive_burst_length: BurstLength::Beats4,
            burst_4x: true,
            address_aligned_beats: false,
            fixed_burst: false,
            ..DmaConfig::default()
        });
        assert_eq!(
            (1 << 24) | (1 << 23) | (4 << 17) | (8 << 8) | (1 << 7) | (1 << 1),
            regs.peek(DMABMR)
        );
    }

    #[test]
    fn ring_init_requires_stopped_dma() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<3>::new();
        let dwmac = lists.dwmac(&regs);

        regs.poke(DMAOMR, ST | SR);
        assert_eq!(Err(ErrorCode::FAIL), dwmac.tx_ring_init(DescriptorLayout::Chain));
        assert_eq!(Err(ErrorCode::FAIL), dwmac.rx_ring_init(DescriptorLayout::Chain));
        assert_eq!(0, regs.peek(DMATDLAR));

        regs.poke(DMAOMR, 0);
        assert_eq!(Ok(()), dwmac.tx_ring_init(DescriptorLayout::Ring));
        assert_eq!(Ok(()), dwmac.rx_ring_init(DescriptorLayout::Ring));
        assert_eq!(lists.tx_descriptors[0].address(), regs.peek(DMATDLAR));
        assert_eq!(lists.rx_descriptors[0].address(), regs.peek(DMARDLAR));
    }

    #[test]
    fn transmit_wakes_suspended_dma() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);
        dwmac.tx_ring_init(DescriptorLayout::Chain).unwrap();

        assert_eq!(Ok(()), dwmac.frame_transmit(&[1; 60]));
        assert_eq!(0, regs.peek(DMATPDR));

        regs.poke(DMASR, TBUS);
        assert_eq!(Ok(()), dwmac.frame_transmit(&[2; 60]));
        assert_eq!(1, regs.peek(DMATPDR));
        // Write-one-to-clear.
        assert_eq!(TBUS, regs.peek(DMASR));

        // Both descriptors now belong to the DMA.
        assert_eq!(Err(ErrorCode::BUSY), dwmac.frame_transmit(&[3; 60]));
    }

    #[test]
    fn receive_wakes_starved_dma() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);
        dwmac.rx_ring_init(DescriptorLayout::Chain).unwrap();

        let mut frame = [0; 128];
        regs.poke(DMASR, RBUS);
        assert_eq!(Err(ErrorCode::BUSY), dwmac.frame_receive(&mut frame));
        assert_eq!(0, regs.peek(DMARPDR));

        lists.rx_buffers[0].write(&[7; 68]);
        lists.rx_descriptors[0]
            .des0
            .set((68 << 16) | (1 << 9) | (1 << 8));
        assert_eq!(Ok(64), dwmac.frame_receive(&mut frame));
        assert_eq!(1, regs.peek(DMARPDR));
    }

    #[test]
    fn dropping_an_errored_frame_wakes_starved_dma() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);
        dwmac.rx_ring_init(DescriptorLayout::Chain).unwrap();

        regs.poke(DMASR, RBUS);
        assert_eq!(0, dwmac.rxframe_size_get());
        assert_eq!(0, regs.peek(DMARPDR));

        // error summary, first and last segment
        lists.rx_descriptors[0]
            .des0
            .set((68 << 16) | (1 << 15) | (1 << 9) | (1 << 8));
        assert_eq!(0, dwmac.rxframe_size_get());
        assert_eq!(1, dwmac.rx_ring().current_descriptor_index());
        assert_eq!(1, regs.peek(DMARPDR));
        assert_eq!(RBUS, regs.peek(DMASR));

        lists.rx_descriptors[1]
            .des0
            .set((68 << 16) | (1 << 9) | (1 << 8));
        assert_eq!(64, dwmac.rxframe_size_get());
    }

    #[test]
    fn mac_addresses() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);
        let address = MacAddress::new([0x02, 0x00, 0x00, 0x12, 0x34, 0x56]);

        regs.poke(MACA0HR, 1 << 31);
        assert_eq!(Ok(()), dwmac.mac_address_set(0, address));
        assert_eq!((1 << 31) | 0x5634, regs.peek(MACA0HR));
        assert_eq!(0x1200_0002, regs.peek(MACA0LR));
        assert_eq!(Ok(address), dwmac.mac_address_get(0));

        assert_eq!(Err(ErrorCode::INVAL), dwmac.mac_address_set(4, address));
        assert_eq!(Err(ErrorCode::INVAL), dwmac.mac_address_get(4));
    }

    #[test]
    fn address_filters() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);
        assert_eq!(
            Err(ErrorCode::INVAL),
            dwmac.address_filter_config(0, AddressFilterKind::Source, 0)
        );
        assert_eq!(
            Err(ErrorCode::INVAL),
            dwmac.address_filter_config(2, AddressFilterKind::Source, 0x40)
        );
        assert_eq!(Err(ErrorCode::INVAL), dwmac.address_filter(4, true));

        dwmac
            .address_filter_config(2, AddressFilterKind::Source, 0b11)
            .unwrap();
        dwmac.address_filter(2, true).unwrap();
        assert_eq!((1 << 31) | (1 << 30) | (0b11 << 24), regs.peek(MACA2HR));
        dwmac
            .address_filter_config(2, AddressFilterKind::Destination, 0)
            .unwrap();
        assert_eq!(1 << 31, regs.peek(MACA2HR));
    }

    #[test]
    fn frame_filter() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);
        dwmac.frame_filter_config(&FrameFilter::default());
        assert_eq!(1 << 6, regs.peek(MACFFR));

        dwmac.frame_filter_config(&FrameFilter {
            receive_all: true,
            source_address: SourceAddressFilter::Inverse,
            control_frames: ControlFrames::ForwardAll,
            broadcast: false,
            promiscuous: true,
            multicast: MulticastFilter::PerfectAndHash,
            unicast: UnicastFilter::Hash,
            hash_table: 0x8000_0000_0000_0001,
            ..FrameFilter::default()
        });
        assert_eq!(
            (1 << 31)
                | (1 << 10)
                | (1 << 9)
                | (1 << 8)
                | (2 << 6)
                | (1 << 5)
                | (1 << 2)
                | (1 << 1)
                | 1,
            regs.peek(MACFFR)
        );
        assert_eq!(0x8000_0000, regs.peek(MACHTHR));
        assert_eq!(1, regs.peek(MACHTLR));

        dwmac.frame_filter_config(&FrameFilter {
            multicast: MulticastFilter::PassAll,
            ..FrameFilter::default()
        });
        assert_eq!((1 << 6) | (1 << 4), regs.peek(MACFFR));
    }

    #[test]
    fn pause_frames_and_back_pressure() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);
        assert_eq!(Ok(()), dwmac.pause_frame_generate());
        assert_eq!(1, regs.peek(MACFCR));
        assert_eq!(Err(ErrorCode::BUSY), dwmac.pause_frame_generate());
        dwmac.back_pressure(false);
        assert_eq!(0, regs.peek(MACFCR));
        dwmac.back_pressure(true);
        assert_eq!(1, regs.peek(MACFCR));
    }

    #[test]
    fn flags_and_interrupts() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);

        regs.poke(DMASR, RS | NIS);
        assert!(dwmac.flag_get(DmaFlag::Receive));
        assert!(!dwmac.flag_get(DmaFlag::Transmit));
        assert!(!dwmac.interrupt_flag_get(DmaInterrupt::Receive));

        dwmac.interrupt_enable(DmaInterrupt::Receive);
        dwmac.interrupt_enable(DmaInterrupt::NormalSummary);
        assert_eq!(RS | NIS, regs.peek(DMAIER));
        assert!(dwmac.interrupt_flag_get(DmaInterrupt::Receive));
        dwmac.interrupt_disable(DmaInterrupt::Receive);
        assert_eq!(NIS, regs.peek(DMAIER));

        assert_eq!(Ok(()), dwmac.flag_clear(DmaFlag::Receive));
        assert_eq!(RS, regs.peek(DMASR));
        assert_eq!(
            Err(ErrorCode::INVAL),
            dwmac.flag_clear(DmaFlag::TimestampTrigger)
        );

        // MAC interrupts are unmasked rather than enabled.
        dwmac.interrupt_disable(DmaInterrupt::TimestampTrigger);
        assert_eq!(1 << 9, regs.peek(MACIMR));
        dwmac.interrupt_enable(DmaInterrupt::TimestampTrigger);
        assert_eq!(0, regs.peek(MACIMR));
    }

    #[test]
    fn dma_state_and_counters() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);

        regs.poke(DMAMFBOCR, (1 << 28) | (0x12 << 17) | (1 << 16) | 0x345);
        assert_eq!((0x345, 0x12), dwmac.missed_frame_counter_get());

        regs.poke(DMASR, (0b110 << 20) | (0b100 << 17));
        assert_eq!(Some(TxProcessState::Suspended), dwmac.tx_process_state());
        assert_eq!(Some(RxProcessState::Suspended), dwmac.rx_process_state());
        assert_eq!(0b110, dwmac.dma_process_state_get(Direction::Transmit));
        regs.poke(DMASR, (0b100 << 20) | (0b010 << 17));
        assert_eq!(None, dwmac.tx_process_state());
        assert_eq!(None, dwmac.rx_process_state());

        dwmac.dma_process_resume(Direction::Receive);
        assert_eq!(1, regs.peek(DMARPDR));
        assert_eq!(RBUS, regs.peek(DMASR));

        regs.poke(MACDBGR, (1 << 25) | (0b11 << 8));
        assert_eq!(1, dwmac.debug_status_get(DebugStatus::TxFifoFull));
        assert_eq!(3, dwmac.debug_status_get(DebugStatus::RxFifoFillLevel));
        assert_eq!(0, dwmac.debug_status_get(DebugStatus::ReceiveEngineActive));
    }

    #[test]
    fn receive_recovery_follows_dma() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<3>::new();
        let dwmac = lists.dwmac(&regs);
        dwmac.rx_ring_init(DescriptorLayout::Chain).unwrap();

        regs.poke(DMACHRDR, lists.rx_descriptors[2].address());
        regs.poke(DMASR, RBUS);
        dwmac.rx_process_check_recovery();
        assert_eq!(2, dwmac.rx_ring().current_descriptor_index());
        assert_eq!(1, regs.peek(DMARPDR));

        // A descriptor waiting for the CPU is never skipped.
        lists.rx_descriptors[2].des0.set((1 << 9) | (1 << 8));
        regs.poke(DMACHRDR, lists.rx_descriptors[0].address());
        dwmac.rx_process_check_recovery();
        assert_eq!(2, dwmac.rx_ring().current_descriptor_index());
    }

    #[test]
    fn mmc_counters() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);
        dwmac.msc_feature(MscFeature::ResetOnRead, true);
        dwmac.msc_feature(MscFeature::CounterStopRollover, true);
        dwmac.msc_counters_reset();
        assert_eq!(0b111, regs.peek(MMCCR));
        dwmac.msc_feature(MscFeature::ResetOnRead, false);
        assert_eq!(0b011, regs.peek(MMCCR));

        regs.poke(MMCRGUFCR, 42);
        assert_eq!(42, dwmac.msc_counter_get(MscCounter::RxGoodUnicast));
    }

    #[test]
    fn ptp_time() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);

        // The addend update never completes in plain memory.
        assert_eq!(Err(ErrorCode::BUSY), dwmac.ptp_timestamp_init(20, 0x9999_9999));
        assert_eq!(20, regs.peek(PTPSSIR));
        assert_eq!(0x9999_9999, regs.peek(PTPTSAR));
        assert_eq!((1 << 5) | 1, regs.peek(PTPTSCR));

        regs.poke(PTPTSCR, 1);
        assert_eq!(
            Err(ErrorCode::INVAL),
            dwmac.ptp_timestamp_update(Sign::Positive, 0, 0x8000_0000)
        );
        assert_eq!(
            Err(ErrorCode::BUSY),
            dwmac.ptp_timestamp_update(Sign::Negative, 3, 500)
        );
        assert_eq!(3, regs.peek(PTPTSHUR));
        assert_eq!((1 << 31) | 500, regs.peek(PTPTSLUR));
        // An update in progress blocks the next one.
        assert_eq!(
            Err(ErrorCode::BUSY),
            dwmac.ptp_timestamp_update(Sign::Positive, 1, 0)
        );
        assert_eq!(3, regs.peek(PTPTSHUR));

        regs.poke(PTPTSHR, 1000);
        regs.poke(PTPTSLR, 0x4000_0000);
        assert_eq!(
            PtpTime {
                sign: Sign::Positive,
                seconds: 1000,
                subseconds: 0x4000_0000,
            },
            dwmac.ptp_system_time_get()
        );
        assert_eq!(Err(ErrorCode::INVAL), dwmac.ptp_pps_output_frequency(16));
    }

    #[test]
    fn wake_up_management() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);
        dwmac.wum_magic_packet(true);
        dwmac.wum_wakeup_frame(true);
        dwmac.wum_power_down(true);
        assert_eq!((1 << 2) | (1 << 1) | 1, regs.peek(MACPMTCSR));
        dwmac.wum_power_down(false);
        assert_eq!((1 << 2) | (1 << 1), regs.peek(MACPMTCSR));

        let filter = [1, 2, 3, 4, 5, 6, 7, 8];
        dwmac.wum_filter_config(&filter);
        // Every word goes through the same register; the last one stays.
        assert_eq!(8, regs.peek(MACRWUFFR));
        assert_eq!(1 << 31, regs.peek(MACPMTCSR) & (1 << 31));

        regs.poke(MACPMTCSR, 1 << 5);
        assert!(dwmac.wum_flag_get(WumFlag::MagicPacketReceived));
        assert!(!dwmac.wum_flag_get(WumFlag::WakeupFrameReceived));
    }

    #[test]
    fn transmit_frame_through_the_datapath() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let recorder = Recorder::default();
        let dwmac = lists.dwmac(&regs);
        dwmac.set_client(&recorder);
        dwmac.tx_ring_init(DescriptorLayout::Chain).unwrap();

        let (e, frame) = dwmac.transmit_frame(static_frame(64), 60, 7).unwrap_err();
        assert_eq!(ErrorCode::OFF, e);

        regs.poke(MACCR, TE);
        regs.poke(DMAOMR, ST);
        let (e, frame) = dwmac.transmit_frame(frame, 65, 7).unwrap_err();
        assert_eq!(ErrorCode::SIZE, e);

        assert!(dwmac.transmit_frame(frame, 60, 7).is_ok());
        assert_eq!(60, lists.tx_descriptors[0].des1.get());

        let (e, _) = dwmac.transmit_frame(static_frame(10), 10, 8).unwrap_err();
        assert_eq!(ErrorCode::BUSY, e);

        // Interrupt before the DMA released the descriptor.
        regs.poke(DMASR, NIS | TS);
        dwmac.handle_interrupt();
        assert_eq!(None, recorder.transmitted.get());

        let desc = &lists.tx_descriptors[0];
        desc.des0.set(desc.des0.get() & !OWN);
        regs.poke(DMASR, NIS | TS);
        dwmac.handle_interrupt();
        assert_eq!(Some((Ok(()), 60, 7)), recorder.transmitted.get());

        assert!(dwmac.transmit_frame(static_frame(10), 10, 8).is_ok());
    }

    #[test]
    fn receive_frames_through_the_datapath() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<3>::new();
        let recorder = Recorder::default();
        let mut buffer = [0; ENET_MAX_FRAME_SIZE];
        let dwmac = lists.dwmac(&regs);
        dwmac.set_client(&recorder);
        dwmac.set_receive_buffer(&mut buffer);
        dwmac.rx_ring_init(DescriptorLayout::Ring).unwrap();

        lists.rx_buffers[0].write(&[1; 68]);
        lists.rx_descriptors[0]
            .des0
            .set((68 << 16) | (1 << 9) | (1 << 8));
        lists.rx_buffers[1].write(&[2; 100]);
        lists.rx_descriptors[1]
            .des0
            .set((100 << 16) | (1 << 9) | (1 << 8));

        // Nothing is delivered while reception is disabled.
        regs.poke(DMASR, NIS | RS);
        dwmac.handle_interrupt();
        assert!(recorder.received.borrow().is_empty());

        dwmac.enable_receive();
        assert_eq!(RE, regs.peek(MACCR));
        assert_eq!(SR, regs.peek(DMAOMR));
        regs.poke(DMASR, NIS | RS);
        dwmac.handle_interrupt();
        let received = recorder.received.borrow();
        assert_eq!(2, received.len());
        assert_eq!([1; 64][..], received[0][..]);
        assert_eq!([2; 96][..], received[1][..]);
        assert_eq!(2, dwmac.rx_ring().current_descriptor_index());
        assert_eq!(OWN, lists.rx_descriptors[0].des0.get());
    }

    #[test]
    fn abnormal_interrupts_are_counted() {
        let regs = EmulatedRegisters::new();
        let lists = Lists::<2>::new();
        let dwmac = lists.dwmac(&regs);
        dwmac.rx_ring_init(DescriptorLayout::Chain).unwrap();

        regs.poke(DMASR, AIS | (1 << 4));
        dwmac.handle_interrupt();
        assert_eq!(1, dwmac.missed_frames());

        regs.poke(DMASR, AIS | RBUS);
        dwmac.handle_interrupt();
        assert_eq!(1, regs.peek(DMARPDR));
    }
}
