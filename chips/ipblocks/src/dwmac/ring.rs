// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Transmit and receive descriptor lists.
//!
//! Each ring owns a slice of descriptors and an equally long slice of
//! buffers, descriptor `i` pointing at buffer `i`. The CPU only touches a
//! descriptor and its buffer while the OWN bit is clear. The current index is
//! the next descriptor the CPU fills (transmit) or drains (receive) and
//! advances with wrap-around in both layouts.

use core::cell::Cell;

use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::ErrorCode;

use super::descriptor::{
    Checksum, DescInfo, DmaBuffer, RxDescFlag, RxDescriptor, RxWord, TxDescFlag, TxDescriptor,
    ENET_MAX_FRAME_SIZE, RDES0, RDES1, TDES0, TDES1,
};

/// How the DMA finds the next descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DescriptorLayout {
    /// des3 holds the address of the next descriptor.
    Chain,
    /// Descriptors are contiguous and the last one carries the end of ring
    /// bit.
    Ring,
}

/// Descriptor format selected in DMABMR.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DescriptorMode {
    /// Four-word descriptors, skipped over to keep a 32-byte stride.
    Normal,
    /// Eight-word descriptors with extended status and timestamps.
    Enhanced,
}

fn check_lists(descriptors: usize, buffers: usize, buffer_size: usize) -> Result<(), ErrorCode> {
    if descriptors == 0 || descriptors != buffers {
        log::warn!("dwmac: {} descriptors for {} buffers", descriptors, buffers);
        return Err(ErrorCode::SIZE);
    }
    if buffer_size == 0 || buffer_size > ENET_MAX_FRAME_SIZE {
        log::warn!("dwmac: buffer size {} out of range", buffer_size);
        return Err(ErrorCode::SIZE);
    }
    Ok(())
}

pub struct TxRing<'a> {
    descriptors: &'a [TxDescriptor],
    buffers: &'a [DmaBuffer],
    buffer_size: usize,
    mode: Cell<DescriptorMode>,
    current: Cell<usize>,
    initialized: Cell<bool>,
    /// First and last descriptor of the most recent frame.
    last_frame: Cell<Option<(usize, usize)>>,
}

impl<'a> TxRing<'a> {
    /// `buffer_size` bytes of every buffer are used, at most
    /// [`ENET_MAX_FRAME_SIZE`]. Frames longer than one buffer span several
    /// descriptors.
    pub const fn new(
        descriptors: &'a [TxDescriptor],
        buffers: &'a [DmaBuffer],
        buffer_size: usize,
    ) -> Self {
        Self {
            descriptors,
            buffers,
            buffer_size,
            mode: Cell::new(DescriptorMode::Normal),
            current: Cell::new(0),
            initialized: Cell::new(false),
            last_frame: Cell::new(None),
        }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Link the descriptors to their buffers and to each other. Every
    /// descriptor starts owned by the CPU.
    pub fn init(&self, layout: DescriptorLayout, mode: DescriptorMode) -> Result<(), ErrorCode> {
        check_lists(self.descriptors.len(), self.buffers.len(), self.buffer_size)?;

        let count = self.descriptors.len();
        for (index, (desc, buffer)) in self.descriptors.iter().zip(self.buffers).enumerate() {
            desc.reset();
            desc.des2.set(buffer.address());
            match layout {
                DescriptorLayout::Chain => {
                    desc.des0.write(TDES0::TCH::SET);
                    desc.des3.set(self.descriptors[(index + 1) % count].address());
                }
                DescriptorLayout::Ring => {
                    if index == count - 1 {
                        desc.des0.write(TDES0::TER::SET);
                    }
                }
            }
        }

        self.mode.set(mode);
        self.current.set(0);
        self.last_frame.set(None);
        self.initialized.set(true);
        log::debug!("dwmac: {} transmit descriptors, {:?}", count, layout);
        Ok(())
    }

    /// Address programmed into the transmit descriptor list register.
    pub fn base_address(&self) -> u32 {
        self.descriptors.first().map_or(0, TxDescriptor::address)
    }

    pub fn current_descriptor_index(&self) -> usize {
        self.current.get()
    }

    pub fn descriptor_address(&self, index: usize) -> Option<u32> {
        self.descriptors.get(index).map(TxDescriptor::address)
    }

    fn descriptor(&self, index: usize) -> Result<&TxDescriptor, ErrorCode> {
        self.descriptors.get(index).ok_or(ErrorCode::INVAL)
    }

    /// Copy `frame` into the buffers starting at the current descriptor and
    /// hand them to the DMA.
    ///
    /// Nothing is touched unless every descriptor the frame needs is owned by
    /// the CPU. OWN is set on the first descriptor last, so the DMA never
    /// starts on a partially handed over frame.
    pub fn frame_transmit(&self, frame: &[u8]) -> Result<(), ErrorCode> {
        if !self.initialized.get() {
            return Err(ErrorCode::OFF);
        }
        if frame.is_empty() || frame.len() > ENET_MAX_FRAME_SIZE {
            return Err(ErrorCode::SIZE);
        }
        let count = self.descriptors.len();
        let segments = frame.len().div_ceil(self.buffer_size);
        if segments > count {
            return Err(ErrorCode::SIZE);
        }

        let first = self.current.get();
        let index = |segment: usize| (first + segment) % count;
        if (0..segments).any(|segment| self.descriptors[index(segment)].is_owned_by_dma()) {
            return Err(ErrorCode::BUSY);
        }

        for (segment, chunk) in frame.chunks(self.buffer_size).enumerate() {
            let desc = &self.descriptors[index(segment)];
            self.buffers[index(segment)].write(chunk);
            desc.clear_frame_state();
            desc.des1.write(TDES1::TBS1.val(chunk.len() as u32) + TDES1::TBS2.val(0));
            if segment == 0 {
                desc.des0.modify(TDES0::FS::SET);
                if self.mode.get() == DescriptorMode::Enhanced {
                    desc.des0.modify(TDES0::TTSE::SET);
                }
            }
            if segment == segments - 1 {
                desc.des0.modify(TDES0::LS::SET + TDES0::IC::SET);
            }
        }

        for segment in (0..segments).rev() {
            self.descriptors[index(segment)].give_to_dma();
        }

        self.last_frame.set(Some((first, index(segments - 1))));
        self.current.set(index(segments));
        Ok(())
    }

    /// Outcome of the most recent frame, once the DMA has released all its
    /// descriptors.
    pub fn last_frame_status(&self) -> Option<Result<(), ErrorCode>> {
        let (first, last) = self.last_frame.get()?;
        let count = self.descriptors.len();
        let mut index = first;
        loop {
            if self.descriptors[index].is_owned_by_dma() {
                return None;
            }
            if index == last {
                break;
            }
            index = (index + 1) % count;
        }
        if self.descriptors[last].des0.is_set(TDES0::ES) {
            Some(Err(ErrorCode::FAIL))
        } else {
            Some(Ok(()))
        }
    }

    /// Transmit timestamp of the most recent frame, enhanced mode only.
    pub fn last_timestamp(&self) -> Option<u64> {
        if self.mode.get() != DescriptorMode::Enhanced {
            return None;
        }
        let (_, last) = self.last_frame.get()?;
        let desc = &self.descriptors[last];
        if desc.is_owned_by_dma() || !desc.des0.is_set(TDES0::TTSS) {
            return None;
        }
        Some(desc.timestamp())
    }

    pub fn desc_info_get(&self, index: usize, info: DescInfo) -> Result<u32, ErrorCode> {
        let desc = self.descriptor(index)?;
        match info {
            DescInfo::CollisionCount => Ok(desc.des0.read(TDES0::CC)),
            DescInfo::Buffer1Size => Ok(desc.des1.read(TDES1::TBS1)),
            DescInfo::Buffer2Size => Ok(desc.des1.read(TDES1::TBS2)),
            DescInfo::Buffer1Address => Ok(desc.des2.get()),
            DescInfo::Buffer2Address => Ok(desc.des3.get()),
            DescInfo::FrameLength => Err(ErrorCode::INVAL),
        }
    }

    pub fn desc_flag_get(&self, index: usize, flag: TxDescFlag) -> Result<bool, ErrorCode> {
        Ok(self.descriptor(index)?.des0.get() & flag.mask() != 0)
    }

    pub fn desc_flag_set(&self, index: usize, flag: TxDescFlag) -> Result<(), ErrorCode> {
        let desc = self.descriptor(index)?;
        desc.des0.set(desc.des0.get() | flag.mask());
        Ok(())
    }

    pub fn desc_flag_clear(&self, index: usize, flag: TxDescFlag) -> Result<(), ErrorCode> {
        let desc = self.descriptor(index)?;
        desc.des0.set(desc.des0.get() & !flag.mask());
        Ok(())
    }

    /// Select hardware checksum insertion for frames sent from `index`.
    pub fn transmit_checksum_config(
        &self,
        index: usize,
        checksum: Checksum,
    ) -> Result<(), ErrorCode> {
        self.descriptor(index)?.des0.modify(checksum.field());
        Ok(())
    }

    /// Apply `checksum` to every descriptor.
    pub fn checksum_config_all(&self, checksum: Checksum) {
        for desc in self.descriptors {
            desc.des0.modify(checksum.field());
        }
    }

    /// Resynchronize with the DMA after it was restarted.
    pub(super) fn set_current(&self, index: usize) {
        if index < self.descriptors.len() {
            self.current.set(index);
        }
    }

    pub(super) fn index_of(&self, address: u32) -> Option<usize> {
        self.descriptors
            .iter()
            .position(|desc| desc.address() == address)
    }
}

pub struct RxRing<'a> {
    descriptors: &'a [RxDescriptor],
    buffers: &'a [DmaBuffer],
    buffer_size: usize,
    mode: Cell<DescriptorMode>,
    current: Cell<usize>,
    initialized: Cell<bool>,
    last_timestamp: Cell<Option<u64>>,
}

impl<'a> RxRing<'a> {
    pub const fn new(
        descriptors: &'a [RxDescriptor],
        buffers: &'a [DmaBuffer],
        buffer_size: usize,
    ) -> Self {
        Self {
            descriptors,
            buffers,
            buffer_size,
            mode: Cell::new(DescriptorMode::Normal),
            current: Cell::new(0),
            initialized: Cell::new(false),
            last_timestamp: Cell::new(None),
        }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Link the descriptors to their buffers and hand all of them to the
    /// DMA with the receive interrupt enabled.
    pub fn init(&self, layout: DescriptorLayout, mode: DescriptorMode) -> Result<(), ErrorCode> {
        check_lists(self.descriptors.len(), self.buffers.len(), self.buffer_size)?;

        let count = self.descriptors.len();
        for (index, (desc, buffer)) in self.descriptors.iter().zip(self.buffers).enumerate() {
            desc.reset();
            desc.des2.set(buffer.address());
            desc.des1.write(RDES1::RBS1.val(self.buffer_size as u32));
            match layout {
                DescriptorLayout::Chain => {
                    desc.des1.modify(RDES1::RCH::SET);
                    desc.des3.set(self.descriptors[(index + 1) % count].address());
                }
                DescriptorLayout::Ring => {
                    if index == count - 1 {
                        desc.des1.modify(RDES1::RER::SET);
                    }
                }
            }
            desc.give_to_dma();
        }

        self.mode.set(mode);
        self.current.set(0);
        self.last_timestamp.set(None);
        self.initialized.set(true);
        log::debug!("dwmac: {} receive descriptors, {:?}", count, layout);
        Ok(())
    }

    pub fn base_address(&self) -> u32 {
        self.descriptors.first().map_or(0, RxDescriptor::address)
    }

    pub fn current_descriptor_index(&self) -> usize {
        self.current.get()
    }

    pub fn descriptor_address(&self, index: usize) -> Option<u32> {
        self.descriptors.get(index).map(RxDescriptor::address)
    }

    fn descriptor(&self, index: usize) -> Result<&RxDescriptor, ErrorCode> {
        self.descriptors.get(index).ok_or(ErrorCode::INVAL)
    }

    /// Descriptors of the frame at the current index, from the first
    /// segment up to and including the last one.
    ///
    /// `BUSY` while any of them still belongs to the DMA. `FAIL` if no last
    /// segment is found within the ring.
    fn pending_frame(&self) -> Result<usize, ErrorCode> {
        if !self.initialized.get() {
            return Err(ErrorCode::OFF);
        }
        let count = self.descriptors.len();
        let first = self.current.get();
        for segment in 0..count {
            let desc = &self.descriptors[(first + segment) % count];
            if desc.is_owned_by_dma() {
                return Err(ErrorCode::BUSY);
            }
            if desc.is_last() {
                return Ok(segment + 1);
            }
        }
        Err(ErrorCode::FAIL)
    }

    /// Return `segments` descriptors from the current index to the DMA and
    /// advance past them.
    fn give_back(&self, segments: usize) {
        let count = self.descriptors.len();
        let first = self.current.get();
        for segment in 0..segments {
            self.descriptors[(first + segment) % count].give_to_dma();
        }
        self.current.set((first + segments) % count);
    }

    /// Copy the frame at the current index into `frame` and return its
    /// length without the CRC.
    ///
    /// A frame with the error summary bit is given back to the DMA and
    /// reported as `FAIL`. A frame that does not fit is given back and
    /// reported as `SIZE`. An incomplete frame stays in place and reports
    /// `BUSY`.
    pub fn frame_receive(&self, frame: &mut [u8]) -> Result<usize, ErrorCode> {
        let segments = match self.pending_frame() {
            Ok(segments) => segments,
            Err(ErrorCode::FAIL) => {
                log::warn!("dwmac: receive descriptors without a last segment");
                self.give_back(self.descriptors.len());
                return Err(ErrorCode::FAIL);
            }
            Err(e) => return Err(e),
        };

        let count = self.descriptors.len();
        let first = self.current.get();
        let last = &self.descriptors[(first + segments - 1) % count];

        if last.has_error() {
            log::debug!("dwmac: dropping frame, status {:#010x}", last.des0.get());
            self.give_back(segments);
            return Err(ErrorCode::FAIL);
        }

        let length = last.payload_length();
        if frame.len() < length {
            log::warn!("dwmac: {} byte frame for a {} byte buffer", length, frame.len());
            self.give_back(segments);
            return Err(ErrorCode::SIZE);
        }

        for (segment, chunk) in frame[..length].chunks_mut(self.buffer_size).enumerate() {
            self.buffers[(first + segment) % count].read(chunk);
        }

        let timestamp = if self.mode.get() == DescriptorMode::Enhanced
            && last.des0.is_set(RDES0::IPHCE_TSV)
        {
            Some(last.timestamp())
        } else {
            None
        };
        self.last_timestamp.set(timestamp);

        self.give_back(segments);
        Ok(length)
    }

    /// Length of the frame waiting at the current index, without the CRC.
    ///
    /// Zero when no complete frame is waiting. A frame with errors is
    /// dropped and also reports zero.
    pub fn rxframe_size_get(&self) -> usize {
        self.frame_size_or_drop().0
    }

    /// Size of the pending frame, and whether an errored frame was given
    /// back instead.
    pub(super) fn frame_size_or_drop(&self) -> (usize, bool) {
        let Ok(segments) = self.pending_frame() else {
            return (0, false);
        };
        let count = self.descriptors.len();
        let last = &self.descriptors[(self.current.get() + segments - 1) % count];
        if last.has_error() {
            self.give_back(segments);
            return (0, true);
        }
        (last.payload_length(), false)
    }

    /// Give the frame at the current index back to the DMA without reading
    /// it. An incomplete frame gives back only its CPU-owned descriptors.
    pub fn rxframe_drop(&self) -> Result<(), ErrorCode> {
        if !self.initialized.get() {
            return Err(ErrorCode::OFF);
        }
        let count = self.descriptors.len();
        let first = self.current.get();
        if self.descriptors[first].is_owned_by_dma() {
            return Err(ErrorCode::BUSY);
        }
        let segments = match self.pending_frame() {
            Ok(segments) => segments,
            Err(_) => (0..count)
                .take_while(|segment| !self.descriptors[(first + segment) % count].is_owned_by_dma())
                .count(),
        };
        self.give_back(segments);
        Ok(())
    }

    /// Receive timestamp of the most recently read frame, enhanced mode only.
    pub fn last_timestamp(&self) -> Option<u64> {
        self.last_timestamp.get()
    }

    pub fn desc_info_get(&self, index: usize, info: DescInfo) -> Result<u32, ErrorCode> {
        let desc = self.descriptor(index)?;
        match info {
            DescInfo::FrameLength => Ok(desc.des0.read(RDES0::FL)),
            DescInfo::Buffer1Size => Ok(desc.des1.read(RDES1::RBS1)),
            DescInfo::Buffer2Size => Ok(desc.des1.read(RDES1::RBS2)),
            DescInfo::Buffer1Address => Ok(desc.des2.get()),
            DescInfo::Buffer2Address => Ok(desc.des3.get()),
            DescInfo::CollisionCount => Err(ErrorCode::INVAL),
        }
    }

    pub fn desc_flag_get(&self, index: usize, flag: RxDescFlag) -> Result<bool, ErrorCode> {
        let desc = self.descriptor(index)?;
        let value = match flag.location() {
            (RxWord::Status, mask) => desc.des0.get() & mask,
            (RxWord::Control, mask) => desc.des1.get() & mask,
        };
        Ok(value != 0)
    }

    pub fn desc_flag_set(&self, index: usize, flag: RxDescFlag) -> Result<(), ErrorCode> {
        let desc = self.descriptor(index)?;
        match flag.location() {
            (RxWord::Status, mask) => desc.des0.set(desc.des0.get() | mask),
            (RxWord::Control, mask) => desc.des1.set(desc.des1.get() | mask),
        }
        Ok(())
    }

    pub fn desc_flag_clear(&self, index: usize, flag: RxDescFlag) -> Result<(), ErrorCode> {
        let desc = self.descriptor(index)?;
        match flag.location() {
            (RxWord::Status, mask) => desc.des0.set(desc.des0.get() & !mask),
            (RxWord::Control, mask) => desc.des1.set(desc.des1.get() & !mask),
        }
        Ok(())
    }

    /// Raise the receive interrupt as soon as the descriptor is closed.
    pub fn rx_desc_immediate_interrupt(&self, index: usize) -> Result<(), ErrorCode> {
        self.descriptor(index)?.des1.modify(RDES1::DIC::CLEAR);
        Ok(())
    }

    /// Defer the receive interrupt to the receive watchdog timer.
    pub fn rx_desc_delay_interrupt(&self, index: usize) -> Result<(), ErrorCode> {
        self.descriptor(index)?.des1.modify(RDES1::DIC::SET);
        Ok(())
    }

    pub(super) fn is_current_owned_by_dma(&self) -> bool {
        self.descriptors
            .get(self.current.get())
            .is_some_and(RxDescriptor::is_owned_by_dma)
    }

    pub(super) fn set_current(&self, index: usize) {
        if index < self.descriptors.len() {
            self.current.set(index);
        }
    }

    pub(super) fn index_of(&self, address: u32) -> Option<usize> {
        self.descriptors
            .iter()
            .position(|desc| desc.address() == address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWN: u32 = 1 << 31;
    const TX_FS: u32 = 1 << 28;
    const TX_LS: u32 = 1 << 29;
    const TX_IC: u32 = 1 << 30;
    const TX_TCH: u32 = 1 << 20;
    const TX_TER: u32 = 1 << 21;
    const RX_FS: u32 = 1 << 9;
    const RX_LS: u32 = 1 << 8;
    const RX_ES: u32 = 1 << 15;

    fn tx_lists<const N: usize>() -> ([TxDescriptor; N], [DmaBuffer; N]) {
        (
            core::array::from_fn(|_| TxDescriptor::new()),
            core::array::from_fn(|_| DmaBuffer::new()),
        )
    }

    fn rx_lists<const N: usize>() -> ([RxDescriptor; N], [DmaBuffer; N]) {
        (
            core::array::from_fn(|_| RxDescriptor::new()),
            core::array::from_fn(|_| DmaBuffer::new()),
        )
    }

    /// Close a receive descriptor the way the DMA does.
    fn dma_receive(desc: &RxDescriptor, buffer: &DmaBuffer, bytes: &[u8], status: u32) {
        buffer.write(bytes);
        desc.des0.set(status);
    }

    fn frame_length(length: usize) -> u32 {
        (length as u32) << 16
    }

    #[test]
    fn tx_chain_init_links_descriptors() {
        let (descs, buffers) = tx_lists::<3>();
        let ring = TxRing::new(&descs, &buffers, ENET_MAX_FRAME_SIZE);
        assert_eq!(
            Ok(()),
            ring.init(DescriptorLayout::Chain, DescriptorMode::Normal)
        );
        for i in 0..3 {
            assert_eq!(TX_TCH, descs[i].des0.get());
            assert_eq!(buffers[i].address(), descs[i].des2.get());
            assert_eq!(descs[(i + 1) % 3].address(), descs[i].des3.get());
        }
        assert_eq!(descs[0].address(), ring.base_address());
        assert_eq!(0, ring.current_descriptor_index());
    }

    #[test]
    fn tx_ring_init_marks_last_descriptor() {
        let (descs, buffers) = tx_lists::<3>();
        let ring = TxRing::new(&descs, &buffers, ENET_MAX_FRAME_SIZE);
        ring.init(DescriptorLayout::Ring, DescriptorMode::Normal).unwrap();
        assert_eq!(0, descs[0].des0.get());
        assert_eq!(0, descs[1].des0.get());
        assert_eq!(TX_TER, descs[2].des0.get());
        assert_eq!(0, descs[2].des3.get());
    }

    #[test]
    fn init_rejects_mismatched_lists() {
        let (descs, _) = tx_lists::<3>();
        let (_, buffers) = tx_lists::<2>();
        let ring = TxRing::new(&descs, &buffers, ENET_MAX_FRAME_SIZE);
        assert_eq!(
            Err(ErrorCode::SIZE),
            ring.init(DescriptorLayout::Chain, DescriptorMode::Normal)
        );

        let (descs, buffers) = rx_lists::<2>();
        let ring = RxRing::new(&descs, &buffers, ENET_MAX_FRAME_SIZE + 1);
        assert_eq!(
            Err(ErrorCode::SIZE),
            ring.init(DescriptorLayout::Chain, DescriptorMode::Normal)
        );
    }

    #[test]
    fn transmit_single_descriptor_frame() {
        let (descs, buffers) = tx_lists::<2>();
        let ring = TxRing::new(&descs, &buffers, ENET_MAX_FRAME_SIZE);
        ring.init(DescriptorLayout::Chain, DescriptorMode::Normal).unwrap();

        let frame = [0xAB; 60];
        assert_eq!(Ok(()), ring.frame_transmit(&frame));
        assert_eq!(OWN | TX_IC | TX_LS | TX_FS | TX_TCH, descs[0].des0.get());
        assert_eq!(60, descs[0].des1.get());
        assert_eq!(1, ring.current_descriptor_index());

        let mut copy = [0; 60];
        buffers[0].read(&mut copy);
        assert_eq!(frame, copy);

        // Pending until the DMA releases the descriptor.
        assert_eq!(None, ring.last_frame_status());
        descs[0].des0.set(descs[0].des0.get() & !OWN);
        assert_eq!(Some(Ok(())), ring.last_frame_status());
    }

    #[test]
    fn transmit_splits_frames_over_descriptors() {
        let (descs, buffers) = tx_lists::<4>();
        let ring = TxRing::new(&descs, &buffers, 64);
        ring.init(DescriptorLayout::Ring, DescriptorMode::Normal).unwrap();

        let frame: [u8; 150] = core::array::from_fn(|i| i as u8);
        assert_eq!(Ok(()), ring.frame_transmit(&frame));
        assert_eq!(OWN | TX_FS, descs[0].des0.get());
        assert_eq!(OWN, descs[1].des0.get());
        assert_eq!(OWN | TX_IC | TX_LS, descs[2].des0.get());
        assert_eq!([64, 64, 22], [0, 1, 2].map(|i| descs[i].des1.get()));
        // untouched apart from the end of ring bit
        assert_eq!(TX_TER, descs[3].des0.get());
        assert_eq!(3, ring.current_descriptor_index());

        let mut tail = [0; 22];
        buffers[2].read(&mut tail);
        assert_eq!(&frame[128..], &tail[..]);
    }

    #[test]
    fn transmit_wraps_and_keeps_end_of_ring() {
        let (descs, buffers) = tx_lists::<2>();
        let ring = TxRing::new(&descs, &buffers, ENET_MAX_FRAME_SIZE);
        ring.init(DescriptorLayout::Ring, DescriptorMode::Normal).unwrap();

        ring.frame_transmit(&[1; 20]).unwrap();
        ring.frame_transmit(&[2; 20]).unwrap();
        assert_eq!(0, ring.current_descriptor_index());
        assert_eq!(OWN | TX_IC | TX_LS | TX_FS | TX_TER, descs[1].des0.get());
    }

    #[test]
    fn transmit_busy_leaves_descriptors_untouched() {
        let (descs, buffers) = tx_lists::<3>();
        let ring = TxRing::new(&descs, &buffers, 64);
        ring.init(DescriptorLayout::Chain, DescriptorMode::Normal).unwrap();

        // The second descriptor of a two-segment frame is still with the DMA.
        descs[1].des0.set(TX_TCH | OWN);
        assert_eq!(Err(ErrorCode::BUSY), ring.frame_transmit(&[0; 100]));
        assert_eq!(TX_TCH, descs[0].des0.get());
        assert_eq!(0, descs[0].des1.get());
        assert_eq!(0, ring.current_descriptor_index());

        // A single segment still fits.
        assert_eq!(Ok(()), ring.frame_transmit(&[0; 64]));
    }

    #[test]
    fn transmit_size_limits() {
        let (descs, buffers) = tx_lists::<2>();
        let ring = TxRing::new(&descs, &buffers, 64);
        ring.init(DescriptorLayout::Chain, DescriptorMode::Normal).unwrap();
        assert_eq!(Err(ErrorCode::SIZE), ring.frame_transmit(&[]));
        assert_eq!(Err(ErrorCode::SIZE), ring.frame_transmit(&[0; 129]));
        assert_eq!(
            Err(ErrorCode::SIZE),
            ring.frame_transmit(&[0; ENET_MAX_FRAME_SIZE + 1])
        );
    }

    #[test]
    fn transmit_error_and_timestamp() {
        let (descs, buffers) = tx_lists::<2>();
        let ring = TxRing::new(&descs, &buffers, ENET_MAX_FRAME_SIZE);
        ring.init(DescriptorLayout::Chain, DescriptorMode::Enhanced).unwrap();
        ring.frame_transmit(&[0; 42]).unwrap();
        assert!(ring.desc_flag_get(0, TxDescFlag::TimestampEnable).unwrap());

        descs[0].des0.set(TX_TCH | TX_LS | (1 << 17) | (1 << 15));
        descs[0].des6.set(0x1234);
        descs[0].des7.set(0x5);
        assert_eq!(Some(Err(ErrorCode::FAIL)), ring.last_frame_status());
        assert_eq!(Some(0x5_0000_1234), ring.last_timestamp());
    }

    #[test]
    fn transmit_descriptor_accessors() {
        let (descs, buffers) = tx_lists::<2>();
        let ring = TxRing::new(&descs, &buffers, ENET_MAX_FRAME_SIZE);
        ring.init(DescriptorLayout::Chain, DescriptorMode::Normal).unwrap();

        descs[1].des0.set(descs[1].des0.get() | (5 << 3));
        assert_eq!(Ok(5), ring.desc_info_get(1, DescInfo::CollisionCount));
        assert_eq!(
            Ok(buffers[1].address()),
            ring.desc_info_get(1, DescInfo::Buffer1Address)
        );
        assert_eq!(
            Err(ErrorCode::INVAL),
            ring.desc_info_get(1, DescInfo::FrameLength)
        );
        assert_eq!(
            Err(ErrorCode::INVAL),
            ring.desc_info_get(2, DescInfo::Buffer1Size)
        );

        ring.desc_flag_set(0, TxDescFlag::DisablePad).unwrap();
        assert_eq!(Ok(true), ring.desc_flag_get(0, TxDescFlag::DisablePad));
        ring.desc_flag_clear(0, TxDescFlag::DisablePad).unwrap();
        assert_eq!(TX_TCH, descs[0].des0.get());

        ring.transmit_checksum_config(0, Checksum::IpHeader).unwrap();
        assert_eq!(TX_TCH | (1 << 22), descs[0].des0.get());
        // Checksum settings survive frame setup.
        ring.frame_transmit(&[0; 20]).unwrap();
        assert_eq!(1 << 22, descs[0].des0.get() & (0b11 << 22));
    }

    #[test]
    fn rx_init_gives_descriptors_to_dma() {
        let (descs, buffers) = rx_lists::<3>();
        let ring = RxRing::new(&descs, &buffers, 512);
        ring.init(DescriptorLayout::Chain, DescriptorMode::Normal).unwrap();
        for i in 0..3 {
            assert_eq!(OWN, descs[i].des0.get());
            assert_eq!((1 << 14) | 512, descs[i].des1.get());
            assert_eq!(descs[(i + 1) % 3].address(), descs[i].des3.get());
        }

        ring.init(DescriptorLayout::Ring, DescriptorMode::Normal).unwrap();
        assert_eq!(512, descs[0].des1.get());
        assert_eq!((1 << 15) | 512, descs[2].des1.get());
    }

    #[test]
    fn receive_single_descriptor_frame() {
        let (descs, buffers) = rx_lists::<2>();
        let ring = RxRing::new(&descs, &buffers, ENET_MAX_FRAME_SIZE);
        ring.init(DescriptorLayout::Chain, DescriptorMode::Normal).unwrap();

        let mut frame = [0; 64];
        assert_eq!(Err(ErrorCode::BUSY), ring.frame_receive(&mut frame));
        assert_eq!(0, ring.rxframe_size_get());

        dma_receive(
            &descs[0],
            &buffers[0],
            &[0x11; 64],
            RX_FS | RX_LS | frame_length(64),
        );
        assert_eq!(60, ring.rxframe_size_get());
        assert_eq!(Ok(60), ring.frame_receive(&mut frame));
        assert_eq!([0x11; 60], frame[..60]);
        assert_eq!(0, frame[60]);
        assert_eq!(OWN, descs[0].des0.get());
        assert_eq!(1, ring.current_descriptor_index());
        assert_eq!(None, ring.last_timestamp());
    }

    #[test]
    fn receive_frame_spanning_descriptors() {
        let (descs, buffers) = rx_lists::<4>();
        let ring = RxRing::new(&descs, &buffers, 64);
        ring.init(DescriptorLayout::Ring, DescriptorMode::Normal).unwrap();

        let payload: [u8; 100] = core::array::from_fn(|i| i as u8);
        dma_receive(&descs[0], &buffers[0], &payload[..64], RX_FS);
        // Last segment not closed yet.
        let mut frame = [0; 128];
        assert_eq!(Err(ErrorCode::BUSY), ring.frame_receive(&mut frame));
        assert_eq!(0, ring.rxframe_size_get());
        assert_eq!(0, ring.current_descriptor_index());

        dma_receive(
            &descs[1],
            &buffers[1],
            &payload[64..],
            RX_LS | frame_length(104),
        );
        assert_eq!(100, ring.rxframe_size_get());
        assert_eq!(Ok(100), ring.frame_receive(&mut frame));
        assert_eq!(payload, frame[..100]);
        assert_eq!(OWN, descs[0].des0.get());
        assert_eq!(OWN, descs[1].des0.get());
        assert_eq!(2, ring.current_descriptor_index());
    }

    #[test]
    fn receive_error_frame_is_given_back() {
        let (descs, buffers) = rx_lists::<2>();
        let ring = RxRing::new(&descs, &buffers, ENET_MAX_FRAME_SIZE);
        ring.init(DescriptorLayout::Chain, DescriptorMode::Normal).unwrap();

        dma_receive(
            &descs[0],
            &buffers[0],
            &[0; 64],
            RX_FS | RX_LS | RX_ES | (1 << 1) | frame_length(64),
        );
        let mut frame = [0; 64];
        assert_eq!(Err(ErrorCode::FAIL), ring.frame_receive(&mut frame));
        assert_eq!(OWN, descs[0].des0.get());
        assert_eq!(1, ring.current_descriptor_index());

        dma_receive(
            &descs[1],
            &buffers[1],
            &[0; 64],
            RX_FS | RX_LS | RX_ES | frame_length(64),
        );
        assert_eq!(0, ring.rxframe_size_get());
        assert_eq!(OWN, descs[1].des0.get());
        assert_eq!(0, ring.current_descriptor_index());
    }

    #[test]
    fn receive_into_short_buffer() {
        let (descs, buffers) = rx_lists::<2>();
        let ring = RxRing::new(&descs, &buffers, ENET_MAX_FRAME_SIZE);
        ring.init(DescriptorLayout::Chain, DescriptorMode::Normal).unwrap();
        dma_receive(
            &descs[0],
            &buffers[0],
            &[0; 100],
            RX_FS | RX_LS | frame_length(100),
        );
        let mut frame = [0; 64];
        assert_eq!(Err(ErrorCode::SIZE), ring.frame_receive(&mut frame));
        assert_eq!(OWN, descs[0].des0.get());
        assert_eq!(1, ring.current_descriptor_index());
    }

    #[test]
    fn receive_timestamp_in_enhanced_mode() {
        let (descs, buffers) = rx_lists::<2>();
        let ring = RxRing::new(&descs, &buffers, ENET_MAX_FRAME_SIZE);
        ring.init(DescriptorLayout::Chain, DescriptorMode::Enhanced).unwrap();
        dma_receive(
            &descs[0],
            &buffers[0],
            &[0; 64],
            RX_FS | RX_LS | (1 << 7) | frame_length(64),
        );
        descs[0].des6.set(0x8000_0000);
        descs[0].des7.set(12);
        let mut frame = [0; 64];
        assert_eq!(Ok(60), ring.frame_receive(&mut frame));
        assert_eq!(Some((12 << 32) | 0x8000_0000), ring.last_timestamp());
    }

    #[test]
    fn drop_frames() {
        let (descs, buffers) = rx_lists::<3>();
        let ring = RxRing::new(&descs, &buffers, 64);
        ring.init(DescriptorLayout::Chain, DescriptorMode::Normal).unwrap();
        assert_eq!(Err(ErrorCode::BUSY), ring.rxframe_drop());

        descs[0].des0.set(RX_FS | RX_LS | frame_length(64));
        assert_eq!(Ok(()), ring.rxframe_drop());
        assert_eq!(OWN, descs[0].des0.get());
        assert_eq!(1, ring.current_descriptor_index());

        // Incomplete: only the closed segment goes back.
        descs[1].des0.set(RX_FS);
        assert_eq!(Ok(()), ring.rxframe_drop());
        assert_eq!(OWN, descs[1].des0.get());
        assert_eq!(2, ring.current_descriptor_index());
    }

    #[test]
    fn receive_descriptor_accessors() {
        let (descs, buffers) = rx_lists::<2>();
        let ring = RxRing::new(&descs, &buffers, 256);
        ring.init(DescriptorLayout::Ring, DescriptorMode::Normal).unwrap();

        assert_eq!(Ok(256), ring.desc_info_get(0, DescInfo::Buffer1Size));
        descs[0].des0.set(frame_length(90));
        assert_eq!(Ok(90), ring.desc_info_get(0, DescInfo::FrameLength));
        assert_eq!(
            Err(ErrorCode::INVAL),
            ring.desc_info_get(0, DescInfo::CollisionCount)
        );

        assert_eq!(Ok(true), ring.desc_flag_get(1, RxDescFlag::EndOfRing));
        ring.rx_desc_delay_interrupt(1).unwrap();
        assert_eq!(Ok(true), ring.desc_flag_get(1, RxDescFlag::DisableInterrupt));
        ring.rx_desc_immediate_interrupt(1).unwrap();
        assert_eq!((1 << 15) | 256, descs[1].des1.get());

        ring.desc_flag_set(0, RxDescFlag::Own).unwrap();
        assert_eq!(Ok(true), ring.desc_flag_get(0, RxDescFlag::Own));
        ring.desc_flag_clear(0, RxDescFlag::Own).unwrap();
        assert_eq!(frame_length(90), descs[0].des0.get());
        assert_eq!(Err(ErrorCode::INVAL), ring.rx_desc_delay_interrupt(2));
    }
}
