// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! System configuration controller (SYSCFG)
//!
//! Memory remapping, the EXTI line to GPIO port multiplexer, the Ethernet PHY
//! interface selection and the I/O compensation cell.

use kernel::config::CONFIG;
use kernel::platform::chip::ClockInterface;
use kernel::utilities::poll;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

register_structs! {
    pub SyscfgRegisters {
        /// memory remap register
        (0x00 => memrmp: ReadWrite<u32, MEMRMP::Register>),
        /// peripheral mode configuration register
        (0x04 => pmc: ReadWrite<u32, PMC::Register>),
        /// external interrupt configuration registers 1 to 4
        (0x08 => exticr: [ReadWrite<u32>; 4]),
        (0x18 => _reserved0),
        /// compensation cell control register
        (0x20 => cmpcr: ReadWrite<u32, CMPCR::Register>),
        (0x24 => @END),
    }
}

register_bitfields![u32,
    MEMRMP [
        /// FMC memory mapping swap
        SWP_FMC OFFSET(10) NUMBITS(2) [],
        /// Flash bank mode selection
        FB_MODE OFFSET(8) NUMBITS(1) [],
        /// Memory mapping selection
        MEM_MODE OFFSET(0) NUMBITS(3) []
    ],
    PMC [
        /// Ethernet PHY interface selection
        MII_RMII_SEL OFFSET(23) NUMBITS(1) [
            Mii = 0,
            Rmii = 1
        ]
    ],
    CMPCR [
        /// Compensation cell ready flag
        READY OFFSET(8) NUMBITS(1) [],
        /// Compensation cell power-down
        CMP_PD OFFSET(0) NUMBITS(1) []
    ]
];

/// Memory mapped at address 0x0000_0000
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MemoryRemap {
    MainFlash = 0b000,
    SystemFlash = 0b001,
    Fsmc = 0b010,
    Sram = 0b011,
    Sdram = 0b100,
}

/// GPIO port routed to an EXTI line
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExtiPort {
    PA = 0,
    PB,
    PC,
    PD,
    PE,
    PF,
    PG,
    PH,
    PI,
    PJ,
    PK,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EthMediaInterface {
    Mii,
    Rmii,
}

pub struct Syscfg<'a> {
    registers: StaticRef<SyscfgRegisters>,
    clock: &'a dyn ClockInterface,
}

impl<'a> Syscfg<'a> {
    pub const fn new(registers: StaticRef<SyscfgRegisters>, clock: &'a dyn ClockInterface) -> Self {
        Self { registers, clock }
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

    /// Return every register to its reset value.
    pub fn deinit(&self) {
        self.registers.memrmp.set(0);
        self.registers.pmc.set(0);
        for exticr in self.registers.exticr.iter() {
            exticr.set(0);
        }
        self.registers.cmpcr.set(0);
    }

    pub fn memory_remap(&self, remap: MemoryRemap) {
        self.registers
            .memrmp
            .modify(MEMRMP::MEM_MODE.val(remap as u32));
    }

    pub fn get_memory_remap(&self) -> Option<MemoryRemap> {
        match self.registers.memrmp.read(MEMRMP::MEM_MODE) {
            0b000 => Some(MemoryRemap::MainFlash),
            0b001 => Some(MemoryRemap::SystemFlash),
            0b010 => Some(MemoryRemap::Fsmc),
            0b011 => Some(MemoryRemap::Sram),
            0b100 => Some(MemoryRemap::Sdram),
            _ => None,
        }
    }

    /// Swap flash bank 1 and bank 2 in the memory map (dual bank parts).
    pub fn memory_swapping_bank(&self, swap: bool) {
        self.registers.memrmp.modify(if swap {
            MEMRMP::FB_MODE::SET
        } else {
            MEMRMP::FB_MODE::CLEAR
        });
    }

    /// Swap the SDRAM banks with the NOR/RAM bank in the FMC address map.
    pub fn fmc_swap(&self, swap: bool) {
        self.registers
            .memrmp
            .modify(MEMRMP::SWP_FMC.val(swap as u32));
    }

    /// Route `pin` of `port` to EXTI line `pin`.
    pub fn exti_line_config(&self, port: ExtiPort, pin: u8) -> Result<(), ErrorCode> {
        if pin > 15 {
            return Err(ErrorCode::INVAL);
        }
        let register = &self.registers.exticr[pin as usize / 4];
        let shift = (pin as u32 % 4) * 4;
        register.set((register.get() & !(0xF << shift)) | ((port as u32) << shift));
        Ok(())
    }

    pub fn get_exti_line_port(&self, pin: u8) -> Option<u8> {
        if pin > 15 {
            return None;
        }
        let shift = (pin as u32 % 4) * 4;
        Some(((self.registers.exticr[pin as usize / 4].get() >> shift) & 0xF) as u8)
    }

    /// Select MII or RMII. The Ethernet MAC must be held in reset or have
    /// its clocks disabled while this changes.
    pub fn eth_media_interface(&self, interface: EthMediaInterface) {
        self.registers.pmc.modify(match interface {
            EthMediaInterface::Mii => PMC::MII_RMII_SEL::Mii,
            EthMediaInterface::Rmii => PMC::MII_RMII_SEL::Rmii,
        });
        log::debug!("syscfg: Ethernet PHY interface {:?}", interface);
    }

    /// Power the I/O compensation cell up or down. It is only useful with
    /// I/O speeds above 50 MHz and a supply above 2.4 V.
    pub fn compensation_cell(&self, enable: bool) {
        self.registers.cmpcr.modify(if enable {
            CMPCR::CMP_PD::SET
        } else {
            CMPCR::CMP_PD::CLEAR
        });
    }

    /// Wait for the compensation cell to report ready.
    pub fn compensation_ready(&self) -> Result<(), ErrorCode> {
        poll::wait_until(CONFIG.compensation_cell_timeout, || {
            self.registers.cmpcr.is_set(CMPCR::READY)
        })
        .inspect_err(|_| log::warn!("syscfg: compensation cell not ready"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::platform::chip::NO_CLOCK_CONTROL;
    use kernel::utilities::emulated::EmulatedRegisters;

    const MEMRMP: usize = 0x00;
    const PMC: usize = 0x04;
    const EXTICR1: usize = 0x08;
    const EXTICR4: usize = 0x14;
    const CMPCR: usize = 0x20;

    fn syscfg() -> (EmulatedRegisters<SyscfgRegisters>, Syscfg<'static>) {
        let emu = EmulatedRegisters::new();
        let syscfg = Syscfg::new(emu.registers(), &NO_CLOCK_CONTROL);
        (emu, syscfg)
    }

    #[test]
    fn exti_lines_use_one_nibble_each() {
        let (emu, syscfg) = syscfg();
        assert_eq!(Ok(()), syscfg.exti_line_config(ExtiPort::PC, 1));
        assert_eq!(Ok(()), syscfg.exti_line_config(ExtiPort::PB, 3));
        assert_eq!(Ok(()), syscfg.exti_line_config(ExtiPort::PI, 15));
        assert_eq!((0x1 << 12) | (0x2 << 4), emu.peek(EXTICR1));
        assert_eq!(0x8 << 12, emu.peek(EXTICR4));
        assert_eq!(Ok(()), syscfg.exti_line_config(ExtiPort::PA, 1));
        assert_eq!(0x1 << 12, emu.peek(EXTICR1));
        assert_eq!(Some(8), syscfg.get_exti_line_port(15));

        assert_eq!(Err(ErrorCode::INVAL), syscfg.exti_line_config(ExtiPort::PA, 16));
        assert_eq!(None, syscfg.get_exti_line_port(16));
    }

    #[test]
    fn remap_and_swap() {
        let (emu, syscfg) = syscfg();
        syscfg.memory_remap(MemoryRemap::Sram);
        syscfg.memory_swapping_bank(true);
        syscfg.fmc_swap(true);
        assert_eq!((1 << 10) | (1 << 8) | 0b011, emu.peek(MEMRMP));
        assert_eq!(Some(MemoryRemap::Sram), syscfg.get_memory_remap());
    }

    #[test]
    fn rmii_is_pmc_bit_23() {
        let (emu, syscfg) = syscfg();
        syscfg.eth_media_interface(EthMediaInterface::Rmii);
        assert_eq!(1 << 23, emu.peek(PMC));
        syscfg.eth_media_interface(EthMediaInterface::Mii);
        assert_eq!(0, emu.peek(PMC));
    }

    #[test]
    fn compensation_cell_wait() {
        let (emu, syscfg) = syscfg();
        syscfg.compensation_cell(true);
        assert_eq!(1, emu.peek(CMPCR));
        assert_eq!(Err(ErrorCode::BUSY), syscfg.compensation_ready());
        emu.set_bits(CMPCR, 1 << 8);
        assert_eq!(Ok(()), syscfg.compensation_ready());
    }

    #[test]
    fn deinit_clears_everything() {
        let (emu, syscfg) = syscfg();
        syscfg.memory_remap(MemoryRemap::SystemFlash);
        syscfg.eth_media_interface(EthMediaInterface::Rmii);
        assert_eq!(Ok(()), syscfg.exti_line_config(ExtiPort::PD, 13));
        syscfg.compensation_cell(true);
        syscfg.deinit();
        for offset in [MEMRMP, PMC, EXTICR4, CMPCR] {
            assert_eq!(0, emu.peek(offset));
        }
    }
}
