// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! AT32F43x memory map and the shared IP instances.

use ipblocks::adc::{Adc, AdcCommonRegisters, AdcRegisters};
use ipblocks::bxcan::{Can, CanRegisters};
use ipblocks::dwmac::{Dwmac, DwmacRegisters, RxRing, TxRing};
use ipblocks::tim::{Tim, TimRegisters, TimerKind};
use kernel::platform::chip::ClockInterface;
use kernel::utilities::StaticRef;

use crate::crm::{Crm, CrmRegisters, PeripheralClock, PeripheralClockType, HCLK1, PCLK1, PCLK2};
use crate::scfg::{Scfg, ScfgRegisters};

pub const CRM_BASE: StaticRef<CrmRegisters> =
    unsafe { StaticRef::new(0x4002_3800 as *const CrmRegisters) };
pub const SCFG_BASE: StaticRef<ScfgRegisters> =
    unsafe { StaticRef::new(0x4001_3800 as *const ScfgRegisters) };
pub const ADC1_BASE: StaticRef<AdcRegisters> =
    unsafe { StaticRef::new(0x4001_2000 as *const AdcRegisters) };
pub const ADC_COMMON_BASE: StaticRef<AdcCommonRegisters> =
    unsafe { StaticRef::new(0x4001_2300 as *const AdcCommonRegisters) };
pub const TMR1_BASE: StaticRef<TimRegisters> =
    unsafe { StaticRef::new(0x4001_0000 as *const TimRegisters) };
pub const TMR2_BASE: StaticRef<TimRegisters> =
    unsafe { StaticRef::new(0x4000_0000 as *const TimRegisters) };
pub const CAN1_BASE: StaticRef<CanRegisters> =
    unsafe { StaticRef::new(0x4000_6400 as *const CanRegisters) };
pub const CAN2_BASE: StaticRef<CanRegisters> =
    unsafe { StaticRef::new(0x4000_6800 as *const CanRegisters) };
pub const EMAC_BASE: StaticRef<DwmacRegisters> =
    unsafe { StaticRef::new(0x4002_8000 as *const DwmacRegisters) };

/// EMAC gates. The PTP gate is switched with the others but is not needed
/// for `is_enabled`.
pub struct EmacClock<'a> {
    mac: PeripheralClock<'a>,
    tx: PeripheralClock<'a>,
    rx: PeripheralClock<'a>,
    ptp: PeripheralClock<'a>,
}

impl<'a> EmacClock<'a> {
    pub const fn new(crm: &'a Crm) -> Self {
        Self {
            mac: PeripheralClock::new(PeripheralClockType::AHB1(HCLK1::EMAC), crm),
            tx: PeripheralClock::new(PeripheralClockType::AHB1(HCLK1::EMACTX), crm),
            rx: PeripheralClock::new(PeripheralClockType::AHB1(HCLK1::EMACRX), crm),
            ptp: PeripheralClock::new(PeripheralClockType::AHB1(HCLK1::EMACPTP), crm),
        }
    }
}

impl ClockInterface for EmacClock<'_> {
    fn is_enabled(&self) -> bool {
        self.mac.is_enabled() && self.tx.is_enabled() && self.rx.is_enabled()
    }

    fn enable(&self) {
        self.mac.enable();
        self.tx.enable();
        self.rx.enable();
        self.ptp.enable();
    }

    fn disable(&self) {
        self.ptp.disable();
        self.rx.disable();
        self.tx.disable();
        self.mac.disable();
    }
}

pub struct At32f43xPeripheralClocks<'a> {
    pub scfg: PeripheralClock<'a>,
    pub adc1: PeripheralClock<'a>,
    pub tmr1: PeripheralClock<'a>,
    pub tmr2: PeripheralClock<'a>,
    pub can1: PeripheralClock<'a>,
    pub can2: PeripheralClock<'a>,
    pub emac: EmacClock<'a>,
}

impl<'a> At32f43xPeripheralClocks<'a> {
    pub const fn new(crm: &'a Crm) -> Self {
        Self {
            scfg: PeripheralClock::new(PeripheralClockType::APB2(PCLK2::SCFG), crm),
            adc1: PeripheralClock::new(PeripheralClockType::APB2(PCLK2::ADC1), crm),
            tmr1: PeripheralClock::new(PeripheralClockType::APB2(PCLK2::TMR1), crm),
            tmr2: PeripheralClock::new(PeripheralClockType::APB1(PCLK1::TMR2), crm),
            can1: PeripheralClock::new(PeripheralClockType::APB1(PCLK1::CAN1), crm),
            can2: PeripheralClock::new(PeripheralClockType::APB1(PCLK1::CAN2), crm),
            emac: EmacClock::new(crm),
        }
    }
}

pub struct At32f43xDefaultPeripherals<'a> {
    pub scfg: Scfg<'a>,
    pub adc1: Adc<'a>,
    pub tmr1: Tim<'a>,
    pub tmr2: Tim<'a>,
    pub can1: Can<'a>,
    pub can2: Can<'a>,
    pub emac: Dwmac<'a>,
}

impl<'a> At32f43xDefaultPeripherals<'a> {
    pub fn new(
        clocks: &'a At32f43xPeripheralClocks<'a>,
        emac_tx: TxRing<'a>,
        emac_rx: RxRing<'a>,
    ) -> Self {
        Self {
            scfg: Scfg::new(SCFG_BASE, &clocks.scfg),
            adc1: Adc::new(ADC1_BASE, ADC_COMMON_BASE, &clocks.adc1),
            tmr1: Tim::new(TMR1_BASE, TimerKind::Advanced, &clocks.tmr1),
            tmr2: Tim::new(TMR2_BASE, TimerKind::General32, &clocks.tmr2)
                .with_option_register(),
            can1: Can::new(CAN1_BASE, &clocks.can1),
            can2: Can::new(CAN2_BASE, &clocks.can2),
            emac: Dwmac::new(EMAC_BASE, &clocks.emac, emac_tx, emac_rx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::tests::crm;
    use ipblocks::dwmac::{DmaBuffer, RxDescriptor, TxDescriptor, ENET_MAX_FRAME_SIZE};

    const AHBEN1: usize = 0x30;
    const APB1EN: usize = 0x40;
    const APB2EN: usize = 0x44;

    #[test]
    fn peripherals_enable_their_gates() {
        let (emu, crm) = crm();
        let clocks = At32f43xPeripheralClocks::new(&crm);
        let tx_descriptors = [TxDescriptor::new()];
        let tx_buffers = [DmaBuffer::new()];
        let rx_descriptors = [RxDescriptor::new()];
        let rx_buffers = [DmaBuffer::new()];
        let peripherals = At32f43xDefaultPeripherals::new(
            &clocks,
            TxRing::new(&tx_descriptors, &tx_buffers, ENET_MAX_FRAME_SIZE),
            RxRing::new(&rx_descriptors, &rx_buffers, ENET_MAX_FRAME_SIZE),
        );

        assert_eq!(TimerKind::Advanced, peripherals.tmr1.kind());
        assert_eq!(TimerKind::General32, peripherals.tmr2.kind());

        peripherals.emac.enable_clock();
        assert_eq!(0b1111 << 25, emu.peek(AHBEN1));
        assert!(peripherals.emac.is_enabled_clock());
        clocks.emac.disable();
        assert_eq!(0, emu.peek(AHBEN1));

        peripherals.can2.enable_clock();
        peripherals.tmr2.enable_clock();
        peripherals.adc1.enable_clock();
        peripherals.scfg.enable_clock();
        assert_eq!((1 << 26) | 1, emu.peek(APB1EN));
        assert_eq!((1 << 14) | (1 << 8), emu.peek(APB2EN));
        assert!(peripherals.scfg.is_enabled_clock());
    }
}
