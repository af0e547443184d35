// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interfaces for analog to digital converter peripherals.

use crate::ErrorCode;

/// Simple interface for reading an ADC sample on any channel.
pub trait Adc<'a> {
    /// The chip-dependent type of an ADC channel.
    type Channel: PartialEq;

    /// Request a single ADC sample on a particular channel.
    ///
    /// Used for individual samples that have no timing requirements. All ADC
    /// samples will be the raw ADC value left-justified in the u16.
    fn sample(&self, channel: &Self::Channel) -> Result<(), ErrorCode>;

    /// Stop a sampling operation.
    ///
    /// Returns `Err(ErrorCode::OFF)` if no sampling is in progress.
    fn stop_sampling(&self) -> Result<(), ErrorCode>;

    /// Resolution of the reading.
    fn get_resolution_bits(&self) -> usize;

    /// Voltage reference is used to convert a raw sample into millivolts.
    /// Returns `None` if the reference is not known.
    fn get_voltage_reference_mv(&self) -> Option<usize>;

    fn set_client(&self, client: &'a dyn Client);
}

/// Trait for handling callbacks from simple ADC calls.
pub trait Client {
    /// Called when a sample is ready.
    fn sample_ready(&self, sample: u16);
}
