// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! System configuration (SYSCFG)

use kernel::config::CONFIG;
use kernel::platform::chip::ClockInterface;
use kernel::utilities::poll;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

register_structs! {
    pub SyscfgRegisters {
        /// configuration register 0
        (0x00 => cfg0: ReadWrite<u32, CFG0::Register>),
        /// configuration register 1
        (0x04 => cfg1: ReadWrite<u32, CFG1::Register>),
        /// EXTI sources selection registers 0 to 3
        (0x08 => extiss: [ReadWrite<u32>; 4]),
        (0x18 => _reserved0),
        /// I/O compensation control register
        (0x20 => cpsctl: ReadWrite<u32, CPSCTL::Register>),
        (0x24 => @END),
    }
}

register_bitfields![u32,
    CFG0 [
        /// EXMC memory swapping
        EXMC_SWP OFFSET(10) NUMBITS(2) [],
        /// FMC memory swapping (bank 0 and bank 1)
        FMC_SWP OFFSET(8) NUMBITS(1) [],
        /// memory mapped at 0x0000_0000
        BOOT_MODE OFFSET(0) NUMBITS(3) []
    ],
    CFG1 [
        ENET_PHY_SEL OFFSET(23) NUMBITS(1) [
            Mii = 0,
            Rmii = 1
        ]
    ],
    CPSCTL [
        CPS_RDY OFFSET(8) NUMBITS(1) [],
        CPS_EN OFFSET(0) NUMBITS(1) []
    ]
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MemoryRemap {
    MainFlash = 0b000,
    Bootloader = 0b001,
    ExmcSram = 0b010,
    Sram0 = 0b011,
    ExmcSdram = 0b100,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExtiPort {
    GPIOA = 0,
    GPIOB,
    GPIOC,
    GPIOD,
    GPIOE,
    GPIOF,
    GPIOG,
    GPIOH,
    GPIOI,
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

    pub fn enable_clock(&self) {
        self.clock.enable();
    }

    pub fn disable_clock(&self) {
        self.clock.disable();
    }

    pub fn deinit(&self) {
        self.registers.cfg0.set(0);
        self.registers.cfg1.set(0);
        self.registers.extiss.iter().for_each(|extiss| extiss.set(0));
        self.registers.cpsctl.set(0);
    }

    pub fn memory_remap(&self, remap: MemoryRemap) {
        self.registers
            .cfg0
            .modify(CFG0::BOOT_MODE.val(remap as u32));
    }

    /// Swap FMC bank 0 and bank 1 in the memory map.
    pub fn fmc_swap(&self, swap: bool) {
        self.registers.cfg0.modify(CFG0::FMC_SWP.val(swap as u32));
    }

    /// Swap the EXMC SDRAM banks with the NOR/PSRAM bank.
    pub fn exmc_swap(&self, swap: bool) {
        self.registers.cfg0.modify(CFG0::EXMC_SWP.val(swap as u32));
    }

    pub fn exti_line_config(&self, port: ExtiPort, pin: u8) -> Result<(), ErrorCode> {
        let register = self
            .registers
            .extiss
            .get(pin as usize / 4)
            .ok_or(ErrorCode::INVAL)?;
        let shift = (pin % 4) as u32 * 4;
        register.set((register.get() & !(0xF << shift)) | ((port as u32) << shift));
        Ok(())
    }

    pub fn eth_media_interface(&self, interface: EthMediaInterface) {
        self.registers.cfg1.modify(match interface {
            EthMediaInterface::Mii => CFG1::ENET_PHY_SEL::Mii,
            EthMediaInterface::Rmii => CFG1::ENET_PHY_SEL::Rmii,
        });
    }

    pub fn compensation_cell(&self, enable: bool) {
        self.registers.cpsctl.modify(CPSCTL::CPS_EN.val(enable as u32));
    }

    pub fn compensation_ready(&self) -> Result<(), ErrorCode> {
        poll::wait_until(CONFIG.compensation_cell_timeout, || {
            self.registers.cpsctl.is_set(CPSCTL::CPS_RDY)
        })
        .inspect_err(|_| log::warn!("syscfg: I/O compensation cell not ready"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::platform::chip::NO_CLOCK_CONTROL;
    use kernel::utilities::emulated::EmulatedRegisters;

    const CFG0: usize = 0x00;
    const CFG1: usize = 0x04;
    const EXTISS2: usize = 0x10;
    const CPSCTL: usize = 0x20;

    #[test]
    fn configuration_bits() {
        let emu = EmulatedRegisters::<SyscfgRegisters>::new();
        let syscfg = Syscfg::new(emu.registers(), &NO_CLOCK_CONTROL);

        syscfg.memory_remap(MemoryRemap::Sram0);
        syscfg.fmc_swap(true);
        syscfg.exmc_swap(true);
        assert_eq!((1 << 10) | (1 << 8) | 0b011, emu.peek(CFG0));

        syscfg.eth_media_interface(EthMediaInterface::Rmii);
        assert_eq!(1 << 23, emu.peek(CFG1));

        assert_eq!(Ok(()), syscfg.exti_line_config(ExtiPort::GPIOE, 10));
        assert_eq!(0x4 << 8, emu.peek(EXTISS2));
        assert_eq!(Err(ErrorCode::INVAL), syscfg.exti_line_config(ExtiPort::GPIOE, 16));

        syscfg.deinit();
        assert_eq!(0, emu.peek(CFG0) | emu.peek(CFG1) | emu.peek(EXTISS2));
    }

    #[test]
    fn compensation_cell() {
        let emu = EmulatedRegisters::<SyscfgRegisters>::new();
        let syscfg = Syscfg::new(emu.registers(), &NO_CLOCK_CONTROL);
        syscfg.compensation_cell(true);
        assert_eq!(1, emu.peek(CPSCTL));
        assert_eq!(Err(ErrorCode::BUSY), syscfg.compensation_ready());
        emu.set_bits(CPSCTL, 1 << 8);
        assert_eq!(Ok(()), syscfg.compensation_ready());
    }
}
