// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interface for CAN peripherals.

use crate::ErrorCode;

pub const STANDARD_CAN_PACKET_SIZE: usize = 8;

/// Number of time quanta taken by the synchronisation segment of every bit.
pub const SYNC_SEG: u8 = 1;

/// Defines the error codes received from the CAN peripheral
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The internal Transmit Error Counter or the internal Receive Error
    /// Counter is greater than 96.
    Warning,

    /// The internal Transmit Error Counter or the internal Receive Error
    /// Counter is greater than 127 and the passive error state is entered.
    Passive,

    /// The internal Transmit Error Counter is greater than 255 and the
    /// bus-off state is entered.
    BusOff,

    /// 6 consecutive bits of equal value are detected on the bus.
    Stuff,

    /// The form of the received or the transmitted frame is different than
    /// the standard format.
    Form,

    /// There are no receivers on the bus or the sender caused an error.
    Ack,

    /// While transmitting a recessive bit, the receiver sensed a dominant bit.
    BitRecessive,

    /// While transmitting a dominant bit, the receiver sensed a recessive bit.
    BitDominant,

    /// The frame has been corrupted on the CAN bus
    Crc,

    /// Set by software to force the hardware to indicate the current
    /// communication status.
    SetBySoftware,
}

impl From<Error> for ErrorCode {
    fn from(error: Error) -> ErrorCode {
        match error {
            Error::BusOff => ErrorCode::OFF,
            Error::Form => ErrorCode::INVAL,
            Error::BitRecessive | Error::BitDominant => ErrorCode::BUSY,
            Error::Ack => ErrorCode::NOACK,
            Error::Crc | Error::SetBySoftware | Error::Warning | Error::Passive | Error::Stuff => {
                ErrorCode::FAIL
            }
        }
    }
}

/// The Scale Bits structure defines the 2 possible widths of the filter bank
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScaleBits {
    Bits16,
    Bits32,
}

/// The filter can be configured to filter the messages by matching an
/// identifier or by bitwise matching multiple identifiers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdentifierMode {
    /// The value of the identifier is used to filter the messages
    List,
    /// A mask is used to filter the messages
    Mask,
}

/// The identifier can be standard (11 bits) or extended (29 bits)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Id {
    Standard(u16),
    Extended(u32),
}

impl Id {
    /// Whether the identifier fits in its format.
    pub fn is_valid(&self) -> bool {
        match *self {
            Id::Standard(id) => id < (1 << 11),
            Id::Extended(id) => id < (1 << 29),
        }
    }
}

/// This structure defines the parameters to configure a filter bank
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FilterParameters {
    /// The filter bank number. Its range depends on the peripheral.
    pub number: u32,

    /// The width of the filter bank
    pub scale_bits: ScaleBits,

    /// The way in which the message Ids will be filtered.
    pub identifier_mode: IdentifierMode,

    /// The receive FIFO Id that the filter will be applied to
    pub fifo_number: usize,
}

/// Bit timing expressed in time quanta.
///
/// The values are the actual lengths of the segments, not the register
/// encodings (which are usually one less).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTiming {
    /// Time quanta between the synchronisation segment and the sample
    /// point.
    pub segment1: u8,

    /// Time quanta between the sample point and the end of the bit.
    pub segment2: u8,

    /// Maximum number of time quanta a bit may be lengthened or shortened
    /// by to resynchronise.
    pub sync_jump_width: u32,

    /// Divider from the peripheral clock to the time quantum.
    pub baud_rate_prescaler: u32,
}

impl BitTiming {
    /// Number of time quanta in one bit.
    pub fn time_quanta(&self) -> u32 {
        (SYNC_SEG + self.segment1 + self.segment2) as u32
    }

    /// The bitrate produced by this timing from a `clock_rate` Hz clock.
    pub fn bitrate(&self, clock_rate: u32) -> u32 {
        clock_rate / (self.baud_rate_prescaler * self.time_quanta())
    }
}

/// The peripheral can be configured to work in the following modes:
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperationMode {
    /// Each message is transmitted on the TX channel and immediately
    /// received on the RX channel
    Loopback,

    /// The peripheral only sends recessive bits on the bus and cannot start
    /// a transmission, but can receive valid data and remote frames
    Monitoring,

    /// Loopback and monitoring combined: nothing reaches the bus.
    SilentLoopback,

    /// Transmission and reception of frames are available
    Normal,
}

/// Bit timing configuration of a CAN peripheral.
///
/// The settings are stored by the driver and applied when the peripheral
/// leaves initialisation mode.
pub trait Configure {
    const MIN_BIT_TIMINGS: BitTiming;
    const MAX_BIT_TIMINGS: BitTiming;

    /// Store the bit timing. Returns `Err(ErrorCode::INVAL)` if a segment is
    /// outside `MIN_BIT_TIMINGS..=MAX_BIT_TIMINGS`.
    fn set_bit_timing(&self, bit_timing: BitTiming) -> Result<(), ErrorCode>;

    fn set_operation_mode(&self, mode: OperationMode) -> Result<(), ErrorCode>;

    fn get_bit_timing(&self) -> Result<BitTiming, ErrorCode>;

    fn get_operation_mode(&self) -> Result<OperationMode, ErrorCode>;

    fn set_automatic_retransmission(&self, automatic: bool) -> Result<(), ErrorCode>;

    fn set_wake_up(&self, wake_up: bool) -> Result<(), ErrorCode>;

    fn get_automatic_retransmission(&self) -> Result<bool, ErrorCode>;

    fn get_wake_up(&self) -> Result<bool, ErrorCode>;

    /// Returns the number of receive FIFOs the peripheral provides
    fn receive_fifo_count(&self) -> usize;
}

/// Computes bit timings for a bitrate from the limits of a [`Configure`]
/// implementation.
pub trait StandardBitTiming {
    /// Find the timing producing exactly `bitrate` from `clock_rate` whose
    /// sample point is closest to the CiA recommendation (87.5% up to
    /// 500 kbit/s, 80% up to 800 kbit/s, 75% above).
    ///
    /// Longer bits (more time quanta) win ties. Returns
    /// `Err(ErrorCode::INVAL)` if no prescaler divides the clock exactly.
    fn bit_timing_for_bitrate(clock_rate: u32, bitrate: u32) -> Result<BitTiming, ErrorCode>;
}

impl<T: Configure> StandardBitTiming for T {
    fn bit_timing_for_bitrate(clock_rate: u32, bitrate: u32) -> Result<BitTiming, ErrorCode> {
        if bitrate == 0 || bitrate > 1_000_000 {
            return Err(ErrorCode::INVAL);
        }

        let min = Self::MIN_BIT_TIMINGS;
        let max = Self::MAX_BIT_TIMINGS;

        // Sample point in tenths of a percent.
        let sample_point: u32 = if bitrate > 800_000 {
            750
        } else if bitrate > 500_000 {
            800
        } else {
            875
        };

        let mut best: Option<(u32, BitTiming)> = None;
        for quanta in (min.time_quanta()..=max.time_quanta()).rev() {
            let quanta_rate = bitrate * quanta;
            if clock_rate % quanta_rate != 0 {
                continue;
            }
            let prescaler = clock_rate / quanta_rate;
            if prescaler < min.baud_rate_prescaler || prescaler > max.baud_rate_prescaler {
                continue;
            }

            let before_sample = (quanta * sample_point + 500) / 1000;
            let segment1 = before_sample
                .saturating_sub(SYNC_SEG as u32)
                .clamp(min.segment1 as u32, max.segment1 as u32);
            let segment2 = quanta - SYNC_SEG as u32 - segment1;
            if segment2 < min.segment2 as u32 || segment2 > max.segment2 as u32 {
                continue;
            }

            let actual = (SYNC_SEG as u32 + segment1) * 1000 / quanta;
            let error = actual.abs_diff(sample_point);
            if best.map_or(true, |(best_error, _)| error < best_error) {
                best = Some((
                    error,
                    BitTiming {
                        segment1: segment1 as u8,
                        segment2: segment2 as u8,
                        sync_jump_width: min.sync_jump_width,
                        baud_rate_prescaler: prescaler,
                    },
                ));
            }
        }

        best.map(|(_, timing)| timing).ok_or(ErrorCode::INVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Limits;

    impl Configure for Limits {
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

        fn set_bit_timing(&self, _: BitTiming) -> Result<(), ErrorCode> {
            Ok(())
        }
        fn set_operation_mode(&self, _: OperationMode) -> Result<(), ErrorCode> {
            Ok(())
        }
        fn get_bit_timing(&self) -> Result<BitTiming, ErrorCode> {
            Err(ErrorCode::NOSUPPORT)
        }
        fn get_operation_mode(&self) -> Result<OperationMode, ErrorCode> {
            Ok(OperationMode::Normal)
        }
        fn set_automatic_retransmission(&self, _: bool) -> Result<(), ErrorCode> {
            Ok(())
        }
        fn set_wake_up(&self, _: bool) -> Result<(), ErrorCode> {
            Ok(())
        }
        fn get_automatic_retransmission(&self) -> Result<bool, ErrorCode> {
            Ok(true)
        }
        fn get_wake_up(&self) -> Result<bool, ErrorCode> {
            Ok(false)
        }
        fn receive_fifo_count(&self) -> usize {
            2
        }
    }

    #[test]
    fn apb1_42mhz_500kbit() {
        let timing = Limits::bit_timing_for_bitrate(42_000_000, 500_000).unwrap();
        assert_eq!(
            BitTiming {
                segment1: 11,
                segment2: 2,
                sync_jump_width: 1,
                baud_rate_prescaler: 6,
            },
            timing
        );
        assert_eq!(500_000, timing.bitrate(42_000_000));
    }

    #[test]
    fn exact_bitrate_is_always_produced() {
        for &(clock, bitrate) in &[
            (42_000_000, 1_000_000),
            (45_000_000, 250_000),
            (36_000_000, 125_000),
            (48_000_000, 800_000),
        ] {
            let timing = Limits::bit_timing_for_bitrate(clock, bitrate).unwrap();
            assert_eq!(bitrate, timing.bitrate(clock));
            assert!(timing.segment1 <= 16 && timing.segment2 <= 8);
        }
    }

    #[test]
    fn unreachable_bitrates_are_rejected() {
        assert_eq!(
            Err(ErrorCode::INVAL),
            Limits::bit_timing_for_bitrate(42_000_000, 2_000_000)
        );
        assert_eq!(Err(ErrorCode::INVAL), Limits::bit_timing_for_bitrate(42_000_000, 0));
        // A prime clock in MHz leaves 29 quanta per bit, above the maximum.
        assert_eq!(
            Err(ErrorCode::INVAL),
            Limits::bit_timing_for_bitrate(29_000_000, 1_000_000)
        );
    }

    #[test]
    fn bus_errors_map_to_error_codes() {
        assert_eq!(ErrorCode::OFF, ErrorCode::from(Error::BusOff));
        assert_eq!(ErrorCode::NOACK, ErrorCode::from(Error::Ack));
    }

    #[test]
    fn identifier_ranges() {
        assert!(Id::Standard(0x7FF).is_valid());
        assert!(!Id::Standard(0x800).is_valid());
        assert!(Id::Extended(0x1FFF_FFFF).is_valid());
        assert!(!Id::Extended(0x2000_0000).is_valid());
    }
}
