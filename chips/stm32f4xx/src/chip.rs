// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Memory map and default peripheral set of the STM32F4 family.

use ipblocks::adc::{Adc, AdcCommonRegisters, AdcRegisters};
use ipblocks::bxcan::{Can, CanRegisters};
use ipblocks::dwmac::{Dwmac, DwmacRegisters, RxRing, TxRing};
use ipblocks::tim::{Tim, TimRegisters, TimerKind};
use kernel::platform::chip::ClockInterface;
use kernel::utilities::StaticRef;

use crate::clocks::phclk::PeripheralClock;
use crate::clocks::Stm32f4Clocks;
use crate::flash::FlashRegisters;
use crate::rcc::{PeripheralClockType, RccRegisters, HCLK1, PCLK1, PCLK2};
use crate::syscfg::{Syscfg, SyscfgRegisters};

pub const RCC_BASE: StaticRef<RccRegisters> =
    unsafe { StaticRef::new(0x4002_3800 as *const RccRegisters) };
pub const FLASH_BASE: StaticRef<FlashRegisters> =
    unsafe { StaticRef::new(0x4002_3C00 as *const FlashRegisters) };
pub const SYSCFG_BASE: StaticRef<SyscfgRegisters> =
    unsafe { StaticRef::new(0x4001_3800 as *const SyscfgRegisters) };

pub const ADC1_BASE: StaticRef<AdcRegisters> =
    unsafe { StaticRef::new(0x4001_2000 as *const AdcRegisters) };
pub const ADC2_BASE: StaticRef<AdcRegisters> =
    unsafe { StaticRef::new(0x4001_2100 as *const AdcRegisters) };
pub const ADC3_BASE: StaticRef<AdcRegisters> =
    unsafe { StaticRef::new(0x4001_2200 as *const AdcRegisters) };
pub const ADC_COMMON_BASE: StaticRef<AdcCommonRegisters> =
    unsafe { StaticRef::new(0x4001_2300 as *const AdcCommonRegisters) };

pub const TIM1_BASE: StaticRef<TimRegisters> =
    unsafe { StaticRef::new(0x4001_0000 as *const TimRegisters) };
pub const TIM2_BASE: StaticRef<TimRegisters> =
    unsafe { StaticRef::new(0x4000_0000 as *const TimRegisters) };
pub const TIM3_BASE: StaticRef<TimRegisters> =
    unsafe { StaticRef::new(0x4000_0400 as *const TimRegisters) };
pub const TIM6_BASE: StaticRef<TimRegisters> =
    unsafe { StaticRef::new(0x4000_1000 as *const TimRegisters) };
pub const TIM8_BASE: StaticRef<TimRegisters> =
    unsafe { StaticRef::new(0x4001_0400 as *const TimRegisters) };

pub const CAN1_BASE: StaticRef<CanRegisters> =
    unsafe { StaticRef::new(0x4000_6400 as *const CanRegisters) };
pub const CAN2_BASE: StaticRef<CanRegisters> =
    unsafe { StaticRef::new(0x4000_6800 as *const CanRegisters) };

pub const ETH_BASE: StaticRef<DwmacRegisters> =
    unsafe { StaticRef::new(0x4002_8000 as *const DwmacRegisters) };

/// The Ethernet MAC has separate gates for the MAC, both DMA directions and
/// the PTP unit. They are switched together.
pub struct EthernetClocks<'a> {
    mac: PeripheralClock<'a>,
    mac_tx: PeripheralClock<'a>,
    mac_rx: PeripheralClock<'a>,
    mac_ptp: PeripheralClock<'a>,
}

impl<'a> EthernetClocks<'a> {
    pub const fn new(clocks: &'a dyn Stm32f4Clocks) -> Self {
        Self {
            mac: PeripheralClock::new(PeripheralClockType::AHB1(HCLK1::ETHMAC), clocks),
            mac_tx: PeripheralClock::new(PeripheralClockType::AHB1(HCLK1::ETHMACTX), clocks),
            mac_rx: PeripheralClock::new(PeripheralClockType::AHB1(HCLK1::ETHMACRX), clocks),
            mac_ptp: PeripheralClock::new(PeripheralClockType::AHB1(HCLK1::ETHMACPTP), clocks),
        }
    }

    /// Pulse the MAC reset line.
    pub fn reset(&self) {
        self.mac.reset();
    }
}

impl ClockInterface for EthernetClocks<'_> {
    fn is_enabled(&self) -> bool {
        self.mac.is_enabled() && self.mac_tx.is_enabled() && self.mac_rx.is_enabled()
    }

    fn enable(&self) {
        self.mac.enable();
        self.mac_tx.enable();
        self.mac_rx.enable();
        self.mac_ptp.enable();
    }

    fn disable(&self) {
        self.mac_ptp.disable();
        self.mac_rx.disable();
        self.mac_tx.disable();
        self.mac.disable();
    }
}

/// Clock gates of the peripherals in [`Stm32f4xxDefaultPeripherals`]. They
/// outlive the drivers that borrow them.
pub struct Stm32f4xxPeripheralClocks<'a> {
    pub syscfg: PeripheralClock<'a>,
    pub adc1: PeripheralClock<'a>,
    pub adc2: PeripheralClock<'a>,
    pub adc3: PeripheralClock<'a>,
    pub tim1: PeripheralClock<'a>,
    pub tim2: PeripheralClock<'a>,
    pub tim3: PeripheralClock<'a>,
    pub tim6: PeripheralClock<'a>,
    pub tim8: PeripheralClock<'a>,
    pub can1: PeripheralClock<'a>,
    pub can2: PeripheralClock<'a>,
    pub ethernet: EthernetClocks<'a>,
}

impl<'a> Stm32f4xxPeripheralClocks<'a> {
    pub const fn new(clocks: &'a dyn Stm32f4Clocks) -> Self {
        Self {
            syscfg: PeripheralClock::new(PeripheralClockType::APB2(PCLK2::SYSCFG), clocks),
            adc1: PeripheralClock::new(PeripheralClockType::APB2(PCLK2::ADC1), clocks),
            adc2: PeripheralClock::new(PeripheralClockType::APB2(PCLK2::ADC2), clocks),
            adc3: PeripheralClock::new(PeripheralClockType::APB2(PCLK2::ADC3), clocks),
            tim1: PeripheralClock::new(PeripheralClockType::APB2(PCLK2::TIM1), clocks),
            tim2: PeripheralClock::new(PeripheralClockType::APB1(PCLK1::TIM2), clocks),
            tim3: PeripheralClock::new(PeripheralClockType::APB1(PCLK1::TIM3), clocks),
            tim6: PeripheralClock::new(PeripheralClockType::APB1(PCLK1::TIM6), clocks),
            tim8: PeripheralClock::new(PeripheralClockType::APB2(PCLK2::TIM8), clocks),
            can1: PeripheralClock::new(PeripheralClockType::APB1(PCLK1::CAN1), clocks),
            can2: PeripheralClock::new(PeripheralClockType::APB1(PCLK1::CAN2), clocks),
            ethernet: EthernetClocks::new(clocks),
        }
    }
}

pub struct Stm32f4xxDefaultPeripherals<'a> {
    pub syscfg: Syscfg<'a>,
    pub adc1: Adc<'a>,
    pub adc2: Adc<'a>,
    pub adc3: Adc<'a>,
    pub tim1: Tim<'a>,
    pub tim2: Tim<'a>,
    pub tim3: Tim<'a>,
    pub tim6: Tim<'a>,
    pub tim8: Tim<'a>,
    pub can1: Can<'a>,
    pub can2: Can<'a>,
    pub ethernet: Dwmac<'a>,
}

impl<'a> Stm32f4xxDefaultPeripherals<'a> {
    /// The Ethernet descriptor rings are board memory and are passed in.
    pub fn new(
        clocks: &'a Stm32f4xxPeripheralClocks<'a>,
        ethernet_tx: TxRing<'a>,
        ethernet_rx: RxRing<'a>,
    ) -> Self {
        Self {
            syscfg: Syscfg::new(SYSCFG_BASE, &clocks.syscfg),
            adc1: Adc::new(ADC1_BASE, ADC_COMMON_BASE, &clocks.adc1),
            adc2: Adc::new(ADC2_BASE, ADC_COMMON_BASE, &clocks.adc2),
            adc3: Adc::new(ADC3_BASE, ADC_COMMON_BASE, &clocks.adc3),
            tim1: Tim::new(TIM1_BASE, TimerKind::Advanced, &clocks.tim1),
            // TIM2 can remap ITR1 to the Ethernet PTP trigger or the USB SOF.
            tim2: Tim::new(TIM2_BASE, TimerKind::General32, &clocks.tim2).with_option_register(),
            tim3: Tim::new(TIM3_BASE, TimerKind::General16, &clocks.tim3),
            tim6: Tim::new(TIM6_BASE, TimerKind::Basic, &clocks.tim6),
            tim8: Tim::new(TIM8_BASE, TimerKind::Advanced, &clocks.tim8),
            can1: Can::new(CAN1_BASE, &clocks.can1),
            can2: Can::new(CAN2_BASE, &clocks.can2),
            ethernet: Dwmac::new(ETH_BASE, &clocks.ethernet, ethernet_tx, ethernet_rx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip_specific::Stm32f429Specs;
    use crate::clocks::clocks::tests::bench;
    use crate::clocks::Clocks;
    use crate::flash::Flash;
    use ipblocks::dwmac::{DmaBuffer, RxDescriptor, TxDescriptor, ENET_MAX_FRAME_SIZE};

    const AHB1ENR: usize = 0x30;
    const APB1ENR: usize = 0x40;
    const APB2ENR: usize = 0x44;

    #[test]
    fn ethernet_gates_switch_together() {
        let bench = bench();
        let flash = Flash::<Stm32f429Specs>::new(bench.flash_regs.registers());
        let clocks = Clocks::new(bench.rcc, &flash);
        let ethernet = EthernetClocks::new(&clocks);

        assert!(!ethernet.is_enabled());
        ethernet.enable();
        assert!(ethernet.is_enabled());
        assert_eq!(0b1111 << 25, bench.rcc_regs.peek(AHB1ENR));
        ethernet.disable();
        assert_eq!(0, bench.rcc_regs.peek(AHB1ENR));
    }

    #[test]
    fn default_peripherals_use_their_own_gates() {
        let bench = bench();
        let flash = Flash::<Stm32f429Specs>::new(bench.flash_regs.registers());
        let clocks = Clocks::new(bench.rcc, &flash);
        let peripheral_clocks = Stm32f4xxPeripheralClocks::new(&clocks);

        let tx_descriptors = [TxDescriptor::new(), TxDescriptor::new()];
        let tx_buffers = [DmaBuffer::new(), DmaBuffer::new()];
        let rx_descriptors = [RxDescriptor::new(), RxDescriptor::new()];
        let rx_buffers = [DmaBuffer::new(), DmaBuffer::new()];
        let peripherals = Stm32f4xxDefaultPeripherals::new(
            &peripheral_clocks,
            TxRing::new(&tx_descriptors, &tx_buffers, ENET_MAX_FRAME_SIZE),
            RxRing::new(&rx_descriptors, &rx_buffers, ENET_MAX_FRAME_SIZE),
        );

        assert_eq!(TimerKind::Advanced, peripherals.tim1.kind());
        assert_eq!(TimerKind::General32, peripherals.tim2.kind());
        assert_eq!(TimerKind::Basic, peripherals.tim6.kind());

        peripherals.syscfg.enable_clock();
        peripherals.adc2.enable_clock();
        peripherals.tim3.enable_clock();
        peripherals.can2.enable_clock();
        assert_eq!((1 << 14) | (1 << 9), bench.rcc_regs.peek(APB2ENR));
        assert_eq!((1 << 26) | (1 << 1), bench.rcc_regs.peek(APB1ENR));
        assert!(peripherals.can2.is_enabled_clock());
        assert!(!peripherals.can1.is_enabled_clock());
    }
}
