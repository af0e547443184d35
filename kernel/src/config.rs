// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Data structure for storing compile-time configuration options.
//!
//! Every wait on hardware in the drivers is a bounded poll loop. The number of
//! polls each loop may spend before giving up lives here, in a typed `const`
//! object, instead of being scattered through the drivers as magic numbers.
//! A typed constant keeps every setting type-checked, and the compiler folds
//! it into the loops as if it were a literal.
//!
//! The budgets count register reads, not time. They are sized for a core
//! clock in the 100 to 240 MHz range, where one poll costs a few bus cycles.

/// Data structure holding compile-time configuration options.
///
/// To change the configuration, modify the relevant values in the `CONFIG`
/// constant object defined at the end of this file.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Polls of the MII busy flag while reading a PHY register.
    pub phy_read_timeout: usize,

    /// Polls of the MII busy flag while writing a PHY register.
    pub phy_write_timeout: usize,

    /// PHY register reads spent waiting for the PHY to leave reset and to
    /// finish autonegotiation.
    pub phy_autonegotiation_timeout: usize,

    /// Polls spent waiting for the Ethernet DMA software reset, the transmit
    /// FIFO flush and the PTP timestamp update bits to self-clear.
    pub enet_delay_timeout: usize,

    /// Polls of the CAN initialization acknowledge bit (INAK).
    pub can_inak_timeout: usize,

    /// Polls of the CAN sleep acknowledge bit (SLAK).
    pub can_slak_timeout: usize,

    /// Polls of the external high speed oscillator ready flag.
    pub hse_startup_timeout: usize,

    /// Polls of the internal high speed oscillator ready flag.
    pub hsi_startup_timeout: usize,

    /// Polls of the external low speed oscillator ready flag. The 32.768 kHz
    /// crystal is slow to start, hence the larger budget.
    pub lse_startup_timeout: usize,

    /// Polls of the internal low speed oscillator ready flag.
    pub lsi_startup_timeout: usize,

    /// Polls of the PLL lock flags.
    pub pll_lock_timeout: usize,

    /// Polls of the system clock switch status after a source change.
    pub clock_switch_timeout: usize,

    /// Polls of the ADC end of conversion flag in blocking reads.
    pub adc_conversion_timeout: usize,

    /// Polls of the I/O compensation cell ready flag.
    pub compensation_cell_timeout: usize,
}

/// A unique instance of `Config` where compile-time configuration options are
/// defined.
pub const CONFIG: Config = Config {
    phy_read_timeout: 0x0004_FFFF,
    phy_write_timeout: 0x0004_FFFF,
    phy_autonegotiation_timeout: 0x0004_FFFF,
    enet_delay_timeout: 0x0004_FFFF,
    can_inak_timeout: 0x0000_FFFF,
    can_slak_timeout: 0x0000_FFFF,
    hse_startup_timeout: 0x0000_FFFF,
    hsi_startup_timeout: 0x0000_0500,
    lse_startup_timeout: 0x000F_FFFF,
    lsi_startup_timeout: 0x0000_FFFF,
    pll_lock_timeout: 0x0000_FFFF,
    clock_switch_timeout: 0x0000_FFFF,
    adc_conversion_timeout: 0x0000_FFFF,
    compensation_cell_timeout: 0x0000_FFFF,
};
