// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! STM32F4xx flash access control
//!
//! Only the access control register is driven here: wait states, prefetch
//! and the instruction and data caches. The wait states depend on the system
//! clock frequency and the part, so [`Flash`] is generic over the chip
//! specifications.
//!
//! Flash latency is dependent on the system clock frequency. It is normally
//! changed by [`crate::clocks::Clocks`] around a system clock switch, not by
//! board code.

use crate::chip_specific::flash::FlashChipSpecific as FlashChipSpecificTrait;

use kernel::utilities::poll;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

use core::marker::PhantomData;

register_structs! {
    /// FLASH
    pub FlashRegisters {
        /// Flash access control register
        (0x000 => acr: ReadWrite<u32, ACR::Register>),
        // Key, status, control and option registers are not driven here
        (0x004 => _reserved0),
        (0x01C => @END),
    }
}

register_bitfields![u32,
    ACR [
        /// Latency
        LATENCY OFFSET(0) NUMBITS(4) [],
        /// Prefetch enable
        PRFTEN OFFSET(8) NUMBITS(1) [],
        /// Instruction cache enable
        ICEN OFFSET(9) NUMBITS(1) [],
        /// Data cache enable
        DCEN OFFSET(10) NUMBITS(1) [],
        /// Instruction cache reset
        ICRST OFFSET(11) NUMBITS(1) [],
        /// Data cache reset
        DCRST OFFSET(12) NUMBITS(1) []
    ]
];

/// Main Flash struct
pub struct Flash<FlashChipSpecific> {
    registers: StaticRef<FlashRegisters>,
    _marker: PhantomData<FlashChipSpecific>,
}

impl<FlashChipSpecific: FlashChipSpecificTrait> Flash<FlashChipSpecific> {
    pub const fn new(registers: StaticRef<FlashRegisters>) -> Self {
        Self {
            registers,
            _marker: PhantomData,
        }
    }

    /// Program the wait states required at `sys_clock_frequency_mhz`.
    ///
    /// # Errors:
    ///
    /// + [Err]\([ErrorCode::INVAL]\) if the part cannot run from flash at that frequency
    /// + [Err]\([ErrorCode::BUSY]\) if the new latency was not read back in time. The caller can
    ///   either call this method again or poll [Flash::get_latency].
    pub fn set_latency(&self, sys_clock_frequency_mhz: usize) -> Result<(), ErrorCode> {
        let wait_states =
            FlashChipSpecific::get_number_wait_cycles_based_on_frequency(sys_clock_frequency_mhz);
        if wait_states > FlashChipSpecific::MAX_WAIT_STATES {
            return Err(ErrorCode::INVAL);
        }

        self.registers
            .acr
            .modify(ACR::LATENCY.val(wait_states as u32));

        // The value 16 behaves well on hardware. The new latency is normally visible on the next
        // read.
        poll::wait_until(16, || self.get_latency() == wait_states)
            .inspect_err(|_| log::warn!("flash: latency change to {} not observed", wait_states))?;
        log::debug!(
            "flash: {} wait states for {} MHz",
            wait_states,
            sys_clock_frequency_mhz
        );
        Ok(())
    }

    /// Current number of wait states.
    pub fn get_latency(&self) -> u8 {
        self.registers.acr.read(ACR::LATENCY) as u8
    }

    pub fn prefetch(&self, enable: bool) {
        self.registers.acr.modify(if enable {
            ACR::PRFTEN::SET
        } else {
            ACR::PRFTEN::CLEAR
        });
    }

    /// Enabling the cache also clears any pending cache reset. Disabling it
    /// flushes the cache so that it starts empty when enabled again.
    pub fn instruction_cache(&self, enable: bool) {
        if enable {
            self.registers
                .acr
                .modify(ACR::ICRST::CLEAR + ACR::ICEN::SET);
        } else {
            self.registers.acr.modify(ACR::ICEN::CLEAR);
            self.registers.acr.modify(ACR::ICRST::SET);
        }
    }

    pub fn data_cache(&self, enable: bool) {
        if enable {
            self.registers
                .acr
                .modify(ACR::DCRST::CLEAR + ACR::DCEN::SET);
        } else {
            self.registers.acr.modify(ACR::DCEN::CLEAR);
            self.registers.acr.modify(ACR::DCRST::SET);
        }
    }

    pub fn is_enabled_prefetch(&self) -> bool {
        self.registers.acr.is_set(ACR::PRFTEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip_specific::{Stm32f401Specs, Stm32f429Specs};
    use kernel::utilities::emulated::EmulatedRegisters;

    const ACR: usize = 0x00;

    #[test]
    fn latency_tracks_frequency() {
        let emu = EmulatedRegisters::<FlashRegisters>::new();
        let flash = Flash::<Stm32f429Specs>::new(emu.registers());
        assert_eq!(Ok(()), flash.set_latency(168));
        assert_eq!(5, emu.peek(ACR));
        assert_eq!(5, flash.get_latency());
        assert_eq!(Ok(()), flash.set_latency(16));
        assert_eq!(0, flash.get_latency());

        let flash = Flash::<Stm32f401Specs>::new(emu.registers());
        assert_eq!(Ok(()), flash.set_latency(84));
        assert_eq!(2, flash.get_latency());
    }

    #[test]
    fn latency_keeps_cache_bits() {
        let emu = EmulatedRegisters::<FlashRegisters>::new();
        let flash = Flash::<Stm32f429Specs>::new(emu.registers());
        flash.prefetch(true);
        flash.instruction_cache(true);
        flash.data_cache(true);
        assert_eq!(Ok(()), flash.set_latency(100));
        assert_eq!((1 << 10) | (1 << 9) | (1 << 8) | 3, emu.peek(ACR));
        assert!(flash.is_enabled_prefetch());
    }

    #[test]
    fn disabling_caches_resets_them() {
        let emu = EmulatedRegisters::<FlashRegisters>::new();
        let flash = Flash::<Stm32f429Specs>::new(emu.registers());
        flash.instruction_cache(true);
        flash.data_cache(true);
        flash.instruction_cache(false);
        flash.data_cache(false);
        assert_eq!((1 << 12) | (1 << 11), emu.peek(ACR));
        flash.instruction_cache(true);
        assert_eq!((1 << 12) | (1 << 9), emu.peek(ACR));
    }
}
