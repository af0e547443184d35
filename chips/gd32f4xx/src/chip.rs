// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! GD32F4xx memory map and the shared IP instances.

use ipblocks::adc::{Adc, AdcCommonRegisters, AdcRegisters};
use ipblocks::bxcan::{Can, CanRegisters};
use ipblocks::dwmac::{Dwmac, DwmacRegisters, RxRing, TxRing};
use ipblocks::tim::{Tim, TimRegisters, TimerKind};
use kernel::platform::chip::ClockInterface;
use kernel::utilities::StaticRef;

use crate::fmc::FmcRegisters;
use crate::rcu::{PeripheralClock, PeripheralClockType, Rcu, RcuRegisters, HCLK1, PCLK1, PCLK2};
use crate::syscfg::{Syscfg, SyscfgRegisters};

pub const RCU_BASE: StaticRef<RcuRegisters> =
    unsafe { StaticRef::new(0x4002_3800 as *const RcuRegisters) };
pub const FMC_BASE: StaticRef<FmcRegisters> =
    unsafe { StaticRef::new(0x4002_3C00 as *const FmcRegisters) };
pub const SYSCFG_BASE: StaticRef<SyscfgRegisters> =
    unsafe { StaticRef::new(0x4001_3800 as *const SyscfgRegisters) };
pub const ADC0_BASE: StaticRef<AdcRegisters> =
    unsafe { StaticRef::new(0x4001_2000 as *const AdcRegisters) };
/// ADC sync registers, shared by ADC0..2
pub const ADC_COMMON_BASE: StaticRef<AdcCommonRegisters> =
    unsafe { StaticRef::new(0x4001_2300 as *const AdcCommonRegisters) };
pub const TIMER0_BASE: StaticRef<TimRegisters> =
    unsafe { StaticRef::new(0x4001_0000 as *const TimRegisters) };
pub const TIMER1_BASE: StaticRef<TimRegisters> =
    unsafe { StaticRef::new(0x4000_0000 as *const TimRegisters) };
pub const CAN0_BASE: StaticRef<CanRegisters> =
    unsafe { StaticRef::new(0x4000_6400 as *const CanRegisters) };
pub const CAN1_BASE: StaticRef<CanRegisters> =
    unsafe { StaticRef::new(0x4000_6800 as *const CanRegisters) };
pub const ENET_BASE: StaticRef<DwmacRegisters> =
    unsafe { StaticRef::new(0x4002_8000 as *const DwmacRegisters) };

/// ENET, ENETTX and ENETRX gates, switched together.
pub struct EnetClock<'a> {
    mac: PeripheralClock<'a>,
    tx: PeripheralClock<'a>,
    rx: PeripheralClock<'a>,
}

impl<'a> EnetClock<'a> {
    pub const fn new(rcu: &'a Rcu) -> Self {
        Self {
            mac: PeripheralClock::new(PeripheralClockType::AHB1(HCLK1::ENET), rcu),
            tx: PeripheralClock::new(PeripheralClockType::AHB1(HCLK1::ENETTX), rcu),
            rx: PeripheralClock::new(PeripheralClockType::AHB1(HCLK1::ENETRX), rcu),
        }
    }
}

impl ClockInterface for EnetClock<'_> {
    fn is_enabled(&self) -> bool {
        self.mac.is_enabled() && self.tx.is_enabled() && self.rx.is_enabled()
    }

    fn enable(&self) {
        self.mac.enable();
        self.tx.enable();
        self.rx.enable();
    }

    fn disable(&self) {
        self.rx.disable();
        self.tx.disable();
        self.mac.disable();
    }
}

pub struct Gd32f4xxPeripheralClocks<'a> {
    pub syscfg: PeripheralClock<'a>,
    pub adc0: PeripheralClock<'a>,
    pub timer0: PeripheralClock<'a>,
    pub timer1: PeripheralClock<'a>,
    pub can0: PeripheralClock<'a>,
    pub can1: PeripheralClock<'a>,
    pub enet: EnetClock<'a>,
}

impl<'a> Gd32f4xxPeripheralClocks<'a> {
    pub const fn new(rcu: &'a Rcu) -> Self {
        Self {
            syscfg: PeripheralClock::new(PeripheralClockType::APB2(PCLK2::SYSCFG), rcu),
            adc0: PeripheralClock::new(PeripheralClockType::APB2(PCLK2::ADC0), rcu),
            timer0: PeripheralClock::new(PeripheralClockType::APB2(PCLK2::TIMER0), rcu),
            timer1: PeripheralClock::new(PeripheralClockType::APB1(PCLK1::TIMER1), rcu),
            can0: PeripheralClock::new(PeripheralClockType::APB1(PCLK1::CAN0), rcu),
            can1: PeripheralClock::new(PeripheralClockType::APB1(PCLK1::CAN1), rcu),
            enet: EnetClock::new(rcu),
        }
    }
}

pub struct Gd32f4xxDefaultPeripherals<'a> {
    pub syscfg: Syscfg<'a>,
    pub adc0: Adc<'a>,
    pub timer0: Tim<'a>,
    pub timer1: Tim<'a>,
    pub can0: Can<'a>,
    pub can1: Can<'a>,
    pub enet: Dwmac<'a>,
}

impl<'a> Gd32f4xxDefaultPeripherals<'a> {
    pub fn new(
        clocks: &'a Gd32f4xxPeripheralClocks<'a>,
        enet_tx: TxRing<'a>,
        enet_rx: RxRing<'a>,
    ) -> Self {
        Self {
            syscfg: Syscfg::new(SYSCFG_BASE, &clocks.syscfg),
            adc0: Adc::new(ADC0_BASE, ADC_COMMON_BASE, &clocks.adc0),
            timer0: Tim::new(TIMER0_BASE, TimerKind::Advanced, &clocks.timer0),
            timer1: Tim::new(TIMER1_BASE, TimerKind::General32, &clocks.timer1)
                .with_option_register(),
            can0: Can::new(CAN0_BASE, &clocks.can0),
            can1: Can::new(CAN1_BASE, &clocks.can1),
            enet: Dwmac::new(ENET_BASE, &clocks.enet, enet_tx, enet_rx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rcu::tests::rcu;
    use ipblocks::dwmac::{DmaBuffer, RxDescriptor, TxDescriptor, ENET_MAX_FRAME_SIZE};

    const AHB1EN: usize = 0x30;
    const APB1EN: usize = 0x40;
    const APB2EN: usize = 0x44;

    #[test]
    fn peripherals_enable_their_gates() {
        let (emu, rcu) = rcu();
        let clocks = Gd32f4xxPeripheralClocks::new(&rcu);
        let tx_descriptors = [TxDescriptor::new()];
        let tx_buffers = [DmaBuffer::new()];
        let rx_descriptors = [RxDescriptor::new()];
        let rx_buffers = [DmaBuffer::new()];
        let peripherals = Gd32f4xxDefaultPeripherals::new(
            &clocks,
            TxRing::new(&tx_descriptors, &tx_buffers, ENET_MAX_FRAME_SIZE),
            RxRing::new(&rx_descriptors, &rx_buffers, ENET_MAX_FRAME_SIZE),
        );

        assert_eq!(TimerKind::Advanced, peripherals.timer0.kind());
        assert_eq!(TimerKind::General32, peripherals.timer1.kind());

        peripherals.enet.enable_clock();
        assert_eq!(0b111 << 25, emu.peek(AHB1EN));
        assert!(peripherals.enet.is_enabled_clock());

        peripherals.can0.enable_clock();
        peripherals.timer1.enable_clock();
        peripherals.adc0.enable_clock();
        assert_eq!((1 << 25) | 1, emu.peek(APB1EN));
        assert_eq!(1 << 8, emu.peek(APB2EN));
    }
}
