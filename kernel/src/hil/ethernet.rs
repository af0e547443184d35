// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2023.

//! Raw Ethernet adapter HIL for devices transporting IEEE 802.3 frames.
//!
//! Frames are fully formed, with an Ethernet header containing source and
//! destination address, and exclude the FCS (Frame Check Sequence) trailer.

use core::fmt;

use crate::ErrorCode;

/// A 48-bit IEEE 802 MAC address, most significant byte first.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Group bit set in the first octet.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }
}

impl From<u64> for MacAddress {
    fn from(value: u64) -> Self {
        let bytes = value.to_be_bytes();
        Self([bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]])
    }
}

impl From<MacAddress> for u64 {
    fn from(address: MacAddress) -> u64 {
        let b = address.0;
        u64::from_be_bytes([0, 0, b[0], b[1], b[2], b[3], b[4], b[5]])
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Ethernet adapter datapath client HIL
pub trait EthernetAdapterDatapathClient {
    /// An Ethernet frame was transmitted, or an error occurred during
    /// transmission.
    ///
    /// `frame_buffer` is the buffer supplied to
    /// [`EthernetAdapterDatapath::transmit_frame`] and `len` the length given
    /// there. `transmission_identifier` is the opaque value passed alongside
    /// the frame. `timestamp` carries the raw transmit timestamp when frame
    /// timestamping is enabled.
    fn transmit_frame_done(
        &self,
        err: Result<(), ErrorCode>,
        frame_buffer: &'static mut [u8],
        len: u16,
        transmission_identifier: usize,
        timestamp: Option<u64>,
    );

    /// An Ethernet frame was received. `frame` holds the header and payload
    /// without the FCS trailer.
    fn received_frame(&self, frame: &[u8], timestamp: Option<u64>);
}

/// Ethernet adapter datapath HIL
pub trait EthernetAdapterDatapath<'a> {
    /// Set the Ethernet adapter client for this peripheral.
    fn set_client(&self, client: &'a dyn EthernetAdapterDatapathClient);

    /// Enable reception of Ethernet frames. No
    /// [`EthernetAdapterDatapathClient::received_frame`] callback is issued
    /// before this call.
    fn enable_receive(&self);

    /// Disable reception of Ethernet frames until the next
    /// [`EthernetAdapterDatapath::enable_receive`].
    fn disable_receive(&self);

    /// Enqueue a frame for transmission.
    ///
    /// The frame starts at offset `0` of `frame_buffer` and is `len` bytes
    /// long, excluding the FCS. On success the buffer is returned through
    /// [`EthernetAdapterDatapathClient::transmit_frame_done`] with the same
    /// `transmission_identifier`. Synchronous errors return the buffer
    /// immediately and raise no callback:
    ///
    /// - [`ErrorCode::BUSY`]: no free transmit descriptor. Try again later.
    /// - [`ErrorCode::OFF`]: the MAC is not enabled.
    /// - [`ErrorCode::SIZE`]: the frame does not fit the transmit buffers.
    fn transmit_frame(
        &self,
        frame_buffer: &'static mut [u8],
        len: u16,
        transmission_identifier: usize,
    ) -> Result<(), (ErrorCode, &'static mut [u8])>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_address_from_u64() {
        let address = MacAddress::from(0x1122_3344_5566);
        assert_eq!(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66], address.as_bytes());
        assert_eq!(0x1122_3344_5566, u64::from(address));
    }

    #[test]
    fn address_kinds() {
        assert!(MacAddress::BROADCAST.is_broadcast());
        assert!(MacAddress::BROADCAST.is_multicast());
        assert!(MacAddress::new([0x01, 0x00, 0x5E, 0, 0, 1]).is_multicast());
        assert!(MacAddress::new([0xD4, 0x5D, 0x64, 0x62, 0x95, 0x1A]).is_unicast());
    }
}
