// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! System configuration controller (SCFG)

use kernel::platform::chip::ClockInterface;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

register_structs! {
    pub ScfgRegisters {
        /// configuration register 1
        (0x00 => cfg1: ReadWrite<u32, CFG1::Register>),
        /// configuration register 2
        (0x04 => cfg2: ReadWrite<u32, CFG2::Register>),
        /// external interrupt configuration registers 1 to 4
        (0x08 => exintc: [ReadWrite<u32>; 4]),
        (0x18 => _reserved0),
        /// ultra high sourcing/sinking strength register
        (0x2C => uhdrv: ReadWrite<u32>),
        (0x30 => @END),
    }
}

register_bitfields![u32,
    CFG1 [
        /// XMC address mapping swap
        SWAP_XMC OFFSET(10) NUMBITS(2) [],
        /// infrared modulation envelope source
        IR_SRC_SEL OFFSET(6) NUMBITS(2) [
            TMR10 = 0,
            USART1 = 1,
            USART2 = 2
        ],
        /// infrared output polarity
        IR_POL OFFSET(5) NUMBITS(1) [
            NotInverted = 0,
            Inverted = 1
        ],
        MEM_MAP_SEL OFFSET(0) NUMBITS(3) []
    ],
    CFG2 [
        MII_RMII_SEL OFFSET(23) NUMBITS(1) [
            Mii = 0,
            Rmii = 1
        ]
    ]
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MemoryRemap {
    MainFlash = 0b000,
    SystemMemory = 0b001,
    XmcBank1 = 0b010,
    InternalSram = 0b011,
    XmcSdramBank1 = 0b100,
}

/// XMC bank swapping in the memory map
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum XmcSwap {
    None = 0b00,
    /// SDRAM banks at 0x6000_0000 and 0x7000_0000
    SdramToNor = 0b01,
    /// QSPI2 at 0x6000_0000 and 0x8000_0000
    Qspi2 = 0b10,
    Both = 0b11,
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
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EthMediaInterface {
    Mii,
    Rmii,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InfraredSource {
    Tmr10,
    Usart1,
    Usart2,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InfraredPolarity {
    NotInverted,
    Inverted,
}

/// Pins with an ultra high sourcing/sinking strength option. The
/// discriminant is the UHDRV bit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UltraDrivePin {
    PB3 = 0,
    PB9 = 1,
    PB10 = 2,
    PD12 = 5,
    PD13 = 6,
    PD14 = 7,
    PD15 = 8,
    PF14 = 9,
    PF15 = 10,
}

pub struct Scfg<'a> {
    registers: StaticRef<ScfgRegisters>,
    clock: &'a dyn ClockInterface,
}

impl<'a> Scfg<'a> {
    pub const fn new(registers: StaticRef<ScfgRegisters>, clock: &'a dyn ClockInterface) -> Self {
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

    pub fn deinit(&self) {
        self.registers.cfg1.set(0);
        self.registers.cfg2.set(0);
        self.registers.exintc.iter().for_each(|exintc| exintc.set(0));
        self.registers.uhdrv.set(0);
    }

    pub fn memory_remap(&self, remap: MemoryRemap) {
        self.registers
            .cfg1
            .modify(CFG1::MEM_MAP_SEL.val(remap as u32));
    }

    pub fn xmc_swap(&self, swap: XmcSwap) {
        self.registers.cfg1.modify(CFG1::SWAP_XMC.val(swap as u32));
    }

    pub fn infrared_config(&self, source: InfraredSource, polarity: InfraredPolarity) {
        self.registers.cfg1.modify(
            match source {
                InfraredSource::Tmr10 => CFG1::IR_SRC_SEL::TMR10,
                InfraredSource::Usart1 => CFG1::IR_SRC_SEL::USART1,
                InfraredSource::Usart2 => CFG1::IR_SRC_SEL::USART2,
            } + match polarity {
                InfraredPolarity::NotInverted => CFG1::IR_POL::NotInverted,
                InfraredPolarity::Inverted => CFG1::IR_POL::Inverted,
            },
        );
    }

    pub fn exti_line_config(&self, port: ExtiPort, pin: u8) -> Result<(), ErrorCode> {
        let register = self
            .registers
            .exintc
            .get(pin as usize / 4)
            .ok_or(ErrorCode::INVAL)?;
        let shift = (pin % 4) as u32 * 4;
        register.set((register.get() & !(0xF << shift)) | ((port as u32) << shift));
        Ok(())
    }

    pub fn get_exti_line_port(&self, pin: u8) -> Result<u8, ErrorCode> {
        let register = self
            .registers
            .exintc
            .get(pin as usize / 4)
            .ok_or(ErrorCode::INVAL)?;
        Ok(((register.get() >> ((pin % 4) * 4)) & 0xF) as u8)
    }

    pub fn eth_media_interface(&self, interface: EthMediaInterface) {
        log::debug!("scfg: EMAC media interface {:?}", interface);
        self.registers.cfg2.modify(match interface {
            EthMediaInterface::Mii => CFG2::MII_RMII_SEL::Mii,
            EthMediaInterface::Rmii => CFG2::MII_RMII_SEL::Rmii,
        });
    }

    pub fn ultra_drive(&self, pin: UltraDrivePin, enable: bool) {
        let mask = 1 << pin as u32;
        let uhdrv = self.registers.uhdrv.get();
        self.registers
            .uhdrv
            .set(if enable { uhdrv | mask } else { uhdrv & !mask });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::platform::chip::NO_CLOCK_CONTROL;
    use kernel::utilities::emulated::EmulatedRegisters;

    const CFG1: usize = 0x00;
    const CFG2: usize = 0x04;
    const EXINTC4: usize = 0x14;
    const UHDRV: usize = 0x2C;

    #[test]
    fn configuration_bits() {
        let emu = EmulatedRegisters::<ScfgRegisters>::new();
        let scfg = Scfg::new(emu.registers(), &NO_CLOCK_CONTROL);

        scfg.memory_remap(MemoryRemap::InternalSram);
        scfg.xmc_swap(XmcSwap::SdramToNor);
        scfg.infrared_config(InfraredSource::Usart2, InfraredPolarity::Inverted);
        assert_eq!((0b01 << 10) | (0b10 << 6) | (1 << 5) | 0b011, emu.peek(CFG1));

        scfg.eth_media_interface(EthMediaInterface::Rmii);
        assert_eq!(1 << 23, emu.peek(CFG2));

        assert_eq!(Ok(()), scfg.exti_line_config(ExtiPort::GPIOH, 13));
        assert_eq!(0x7 << 4, emu.peek(EXINTC4));
        assert_eq!(Ok(ExtiPort::GPIOH as u8), scfg.get_exti_line_port(13));
        assert_eq!(Err(ErrorCode::INVAL), scfg.exti_line_config(ExtiPort::GPIOA, 16));
        assert_eq!(Err(ErrorCode::INVAL), scfg.get_exti_line_port(16));

        scfg.ultra_drive(UltraDrivePin::PD12, true);
        scfg.ultra_drive(UltraDrivePin::PF15, true);
        scfg.ultra_drive(UltraDrivePin::PD12, false);
        assert_eq!(1 << 10, emu.peek(UHDRV));

        scfg.deinit();
        assert_eq!(
            0,
            emu.peek(CFG1) | emu.peek(CFG2) | emu.peek(EXINTC4) | emu.peek(UHDRV)
        );
    }
}
