// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Flash memory controller (FMC) wait state control.
//!
//! FMC_WS only holds the wait state count. Program and erase are not driven
//! here.

use kernel::utilities::poll;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

/// FMC_WS reads before a latency change is reported as not taken.
const LATENCY_READBACK_POLLS: usize = 16;

register_structs! {
    pub FmcRegisters {
        /// wait state register
        (0x00 => ws: ReadWrite<u32, WS::Register>),
        (0x04 => _reserved0),
        (0x1C => @END),
    }
}

register_bitfields![u32,
    WS [
        WSCNT OFFSET(0) NUMBITS(4) []
    ]
];

/// Highest CK_SYS frequency of the family.
pub const MAX_SYS_CLOCK_MHZ: usize = 240;
const MHZ_PER_WAIT_STATE: usize = 30;

pub struct Fmc {
    registers: StaticRef<FmcRegisters>,
}

impl Fmc {
    pub const fn new(registers: StaticRef<FmcRegisters>) -> Self {
        Self { registers }
    }

    /// Wait states needed to read the flash at `sys_clock_mhz`.
    pub fn wait_states_for(sys_clock_mhz: usize) -> Option<u8> {
        if sys_clock_mhz > MAX_SYS_CLOCK_MHZ {
            return None;
        }
        Some((sys_clock_mhz.saturating_sub(1) / MHZ_PER_WAIT_STATE) as u8)
    }

    /// Program the wait states for `sys_clock_mhz` and confirm them by
    /// reading FMC_WS back. Raise the wait states before speeding CK_SYS up,
    /// lower them after slowing it down.
    pub fn set_latency(&self, sys_clock_mhz: usize) -> Result<(), ErrorCode> {
        let wait_states = Self::wait_states_for(sys_clock_mhz).ok_or(ErrorCode::INVAL)?;
        self.registers
            .ws
            .modify(WS::WSCNT.val(wait_states as u32));

        poll::wait_until(LATENCY_READBACK_POLLS, || self.get_latency() == wait_states)
            .inspect_err(|_| log::warn!("fmc: wait state change to {} not observed", wait_states))?;
        log::debug!("fmc: {} wait states for {} MHz", wait_states, sys_clock_mhz);
        Ok(())
    }

    pub fn get_latency(&self) -> u8 {
        self.registers.ws.read(WS::WSCNT) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::utilities::emulated::EmulatedRegisters;

    #[test]
    fn thirty_megahertz_per_wait_state() {
        assert_eq!(Some(0), Fmc::wait_states_for(16));
        assert_eq!(Some(0), Fmc::wait_states_for(30));
        assert_eq!(Some(1), Fmc::wait_states_for(31));
        assert_eq!(Some(5), Fmc::wait_states_for(168));
        assert_eq!(Some(7), Fmc::wait_states_for(240));
        assert_eq!(None, Fmc::wait_states_for(241));
    }

    #[test]
    fn latency_is_written_and_read_back() {
        let emu = EmulatedRegisters::<FmcRegisters>::new();
        let fmc = Fmc::new(emu.registers());
        emu.poke(0x00, 0xF0);
        assert_eq!(Ok(()), fmc.set_latency(200));
        assert_eq!(0xF6, emu.peek(0x00));
        assert_eq!(6, fmc.get_latency());
        assert_eq!(Err(ErrorCode::INVAL), fmc.set_latency(260));
        assert_eq!(6, fmc.get_latency());
    }
}
