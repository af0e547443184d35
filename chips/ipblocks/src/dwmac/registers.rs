// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Register map of the Ethernet MAC, MMC, PTP and DMA blocks.

use kernel::utilities::registers::{register_bitfields, register_structs, ReadOnly, ReadWrite};

register_structs! {
    pub DwmacRegisters {
        // MAC
        (0x0000 => pub(crate) maccr: ReadWrite<u32, MACCR::Register>),
        (0x0004 => pub(crate) macffr: ReadWrite<u32, MACFFR::Register>),
        (0x0008 => pub(crate) machthr: ReadWrite<u32>),
        (0x000C => pub(crate) machtlr: ReadWrite<u32>),
        (0x0010 => pub(crate) macmiiar: ReadWrite<u32, MACMIIAR::Register>),
        (0x0014 => pub(crate) macmiidr: ReadWrite<u32, MACMIIDR::Register>),
        (0x0018 => pub(crate) macfcr: ReadWrite<u32, MACFCR::Register>),
        (0x001C => pub(crate) macvlantr: ReadWrite<u32, MACVLANTR::Register>),
        (0x0020 => _reserved0),
        /// Remote wakeup frame filter, eight words written in sequence
        (0x0028 => pub(crate) macrwuffr: ReadWrite<u32>),
        (0x002C => pub(crate) macpmtcsr: ReadWrite<u32, MACPMTCSR::Register>),
        (0x0030 => _reserved1),
        (0x0034 => pub(crate) macdbgr: ReadOnly<u32, MACDBGR::Register>),
        (0x0038 => pub(crate) macsr: ReadWrite<u32, MACSR::Register>),
        (0x003C => pub(crate) macimr: ReadWrite<u32, MACIMR::Register>),
        /// MAC address 0 to 3, high and low halves
        (0x0040 => pub(crate) maca: [MacAddressRegisters; 4]),
        (0x0060 => _reserved2),

        // MMC
        (0x0100 => pub(crate) mmccr: ReadWrite<u32, MMCCR::Register>),
        (0x0104 => pub(crate) mmcrir: ReadWrite<u32>),
        (0x0108 => pub(crate) mmctir: ReadWrite<u32>),
        (0x010C => pub(crate) mmcrimr: ReadWrite<u32>),
        (0x0110 => pub(crate) mmctimr: ReadWrite<u32>),
        (0x0114 => _reserved3),
        /// Transmitted good frames after a single collision
        (0x014C => pub(crate) mmctgfsccr: ReadOnly<u32>),
        /// Transmitted good frames after more than one collision
        (0x0150 => pub(crate) mmctgfmsccr: ReadOnly<u32>),
        (0x0154 => _reserved4),
        /// Transmitted good frames
        (0x0168 => pub(crate) mmctgfcr: ReadOnly<u32>),
        (0x016C => _reserved5),
        /// Received frames with CRC error
        (0x0194 => pub(crate) mmcrfcecr: ReadOnly<u32>),
        /// Received frames with alignment error
        (0x0198 => pub(crate) mmcrfaecr: ReadOnly<u32>),
        (0x019C => _reserved6),
        /// Received good unicast frames
        (0x01C4 => pub(crate) mmcrgufcr: ReadOnly<u32>),
        (0x01C8 => _reserved7),

        // PTP
        (0x0700 => pub(crate) ptptscr: ReadWrite<u32, PTPTSCR::Register>),
        (0x0704 => pub(crate) ptpssir: ReadWrite<u32>),
        (0x0708 => pub(crate) ptptshr: ReadOnly<u32>),
        (0x070C => pub(crate) ptptslr: ReadOnly<u32, PTPTSLR::Register>),
        (0x0710 => pub(crate) ptptshur: ReadWrite<u32>),
        (0x0714 => pub(crate) ptptslur: ReadWrite<u32, PTPTSLR::Register>),
        (0x0718 => pub(crate) ptptsar: ReadWrite<u32>),
        (0x071C => pub(crate) ptptthr: ReadWrite<u32>),
        (0x0720 => pub(crate) ptpttlr: ReadWrite<u32>),
        (0x0724 => _reserved8),
        (0x0728 => pub(crate) ptptssr: ReadOnly<u32>),
        (0x072C => pub(crate) ptpppscr: ReadWrite<u32>),
        (0x0730 => _reserved9),

        // DMA
        (0x1000 => pub(crate) dmabmr: ReadWrite<u32, DMABMR::Register>),
        (0x1004 => pub(crate) dmatpdr: ReadWrite<u32>),
        (0x1008 => pub(crate) dmarpdr: ReadWrite<u32>),
        (0x100C => pub(crate) dmardlar: ReadWrite<u32>),
        (0x1010 => pub(crate) dmatdlar: ReadWrite<u32>),
        (0x1014 => pub(crate) dmasr: ReadWrite<u32, DMASR::Register>),
        (0x1018 => pub(crate) dmaomr: ReadWrite<u32, DMAOMR::Register>),
        (0x101C => pub(crate) dmaier: ReadWrite<u32>),
        (0x1020 => pub(crate) dmamfbocr: ReadOnly<u32, DMAMFBOCR::Register>),
        (0x1024 => pub(crate) dmarswtr: ReadWrite<u32>),
        (0x1028 => _reserved10),
        /// Current host transmit descriptor
        (0x1048 => pub(crate) dmachtdr: ReadOnly<u32>),
        /// Current host receive descriptor
        (0x104C => pub(crate) dmachrdr: ReadOnly<u32>),
        /// Current host transmit buffer address
        (0x1050 => pub(crate) dmachtbar: ReadOnly<u32>),
        /// Current host receive buffer address
        (0x1054 => pub(crate) dmachrbar: ReadOnly<u32>),
        (0x1058 => @END),
    },

    pub(crate) MacAddressRegisters {
        (0x00 => pub(crate) high: ReadWrite<u32, MACAHR::Register>),
        (0x04 => pub(crate) low: ReadWrite<u32>),
        (0x08 => @END),
    }
}

register_bitfields![u32,
    pub(crate) MACCR [
        /// CRC stripping for type frames
        CSTF OFFSET(25) NUMBITS(1) [],
        /// Watchdog disable
        WD OFFSET(23) NUMBITS(1) [],
        /// Jabber disable
        JD OFFSET(22) NUMBITS(1) [],
        /// Interframe gap
        IFG OFFSET(17) NUMBITS(3) [],
        /// Carrier sense disable
        CSD OFFSET(16) NUMBITS(1) [],
        /// Fast Ethernet speed (100 Mbit/s)
        FES OFFSET(14) NUMBITS(1) [],
        /// Receive own disable
        ROD OFFSET(13) NUMBITS(1) [],
        /// Loopback mode
        LM OFFSET(12) NUMBITS(1) [],
        /// Duplex mode
        DM OFFSET(11) NUMBITS(1) [],
        /// IPv4 checksum offload
        IPCO OFFSET(10) NUMBITS(1) [],
        /// Retry disable
        RD OFFSET(9) NUMBITS(1) [],
        /// Automatic pad/CRC stripping
        APCS OFFSET(7) NUMBITS(1) [],
        /// Back-off limit
        BL OFFSET(5) NUMBITS(2) [],
        /// Deferral check
        DC OFFSET(4) NUMBITS(1) [],
        /// Transmitter enable
        TE OFFSET(3) NUMBITS(1) [],
        /// Receiver enable
        RE OFFSET(2) NUMBITS(1) []
    ],
    pub(crate) MACFFR [
        /// Receive all
        RA OFFSET(31) NUMBITS(1) [],
        /// Hash or perfect filter
        HPF OFFSET(10) NUMBITS(1) [],
        /// Source address filter
        SAF OFFSET(9) NUMBITS(1) [],
        /// Source address inverse filtering
        SAIF OFFSET(8) NUMBITS(1) [],
        /// Pass control frames
        PCF OFFSET(6) NUMBITS(2) [],
        /// Broadcast frames disable
        BFD OFFSET(5) NUMBITS(1) [],
        /// Pass all multicast
        PAM OFFSET(4) NUMBITS(1) [],
        /// Destination address inverse filtering
        DAIF OFFSET(3) NUMBITS(1) [],
        /// Hash multicast
        HM OFFSET(2) NUMBITS(1) [],
        /// Hash unicast
        HU OFFSET(1) NUMBITS(1) [],
        /// Promiscuous mode
        PM OFFSET(0) NUMBITS(1) []
    ],
    pub(crate) MACMIIAR [
        /// PHY address
        PA OFFSET(11) NUMBITS(5) [],
        /// MII register
        MR OFFSET(6) NUMBITS(5) [],
        /// Clock range
        CR OFFSET(2) NUMBITS(3) [],
        /// MII write
        MW OFFSET(1) NUMBITS(1) [],
        /// MII busy
        MB OFFSET(0) NUMBITS(1) []
    ],
    pub(crate) MACMIIDR [
        MD OFFSET(0) NUMBITS(16) []
    ],
    pub(crate) MACFCR [
        /// Pause time
        PT OFFSET(16) NUMBITS(16) [],
        /// Zero-quanta pause disable
        ZQPD OFFSET(7) NUMBITS(1) [],
        /// Pause low threshold
        PLT OFFSET(4) NUMBITS(2) [],
        /// Unicast pause frame detect
        UPFD OFFSET(3) NUMBITS(1) [],
        /// Receive flow control enable
        RFCE OFFSET(2) NUMBITS(1) [],
        /// Transmit flow control enable
        TFCE OFFSET(1) NUMBITS(1) [],
        /// Flow control busy (full duplex) or back pressure activate (half duplex)
        FCB_BPA OFFSET(0) NUMBITS(1) []
    ],
    pub(crate) MACVLANTR [
        /// 12-bit VLAN tag comparison
        VLANTC OFFSET(16) NUMBITS(1) [],
        /// VLAN tag identifier
        VLANTI OFFSET(0) NUMBITS(16) []
    ],
    pub(crate) MACPMTCSR [
        /// Wakeup frame filter register pointer reset
        WFFRPR OFFSET(31) NUMBITS(1) [],
        /// Global unicast
        GU OFFSET(9) NUMBITS(1) [],
        /// Wakeup frame received
        WFR OFFSET(6) NUMBITS(1) [],
        /// Magic packet received
        MPR OFFSET(5) NUMBITS(1) [],
        /// Wakeup frame enable
        WFE OFFSET(2) NUMBITS(1) [],
        /// Magic packet enable
        MPE OFFSET(1) NUMBITS(1) [],
        /// Power down
        PD OFFSET(0) NUMBITS(1) []
    ],
    pub(crate) MACDBGR [
        TFF OFFSET(25) NUMBITS(1) [],
        TFNEGU OFFSET(24) NUMBITS(1) [],
        TFWA OFFSET(22) NUMBITS(1) [],
        TFRS OFFSET(20) NUMBITS(2) [],
        MTP OFFSET(19) NUMBITS(1) [],
        MTFCS OFFSET(17) NUMBITS(2) [],
        MMTEA OFFSET(16) NUMBITS(1) [],
        RFFL OFFSET(8) NUMBITS(2) [],
        RFRCS OFFSET(5) NUMBITS(2) [],
        RFWRA OFFSET(4) NUMBITS(1) [],
        MSFRWCS OFFSET(1) NUMBITS(2) [],
        MMRPEA OFFSET(0) NUMBITS(1) []
    ],
    pub(crate) MACSR [
        TSTS OFFSET(9) NUMBITS(1) [],
        MMCTS OFFSET(6) NUMBITS(1) [],
        MMCRS OFFSET(5) NUMBITS(1) [],
        MMCS OFFSET(4) NUMBITS(1) [],
        PMTS OFFSET(3) NUMBITS(1) []
    ],
    pub(crate) MACIMR [
        TSTIM OFFSET(9) NUMBITS(1) [],
        PMTIM OFFSET(3) NUMBITS(1) []
    ],
    pub(crate) MACAHR [
        /// Address enable (always one for address 0)
        AE OFFSET(31) NUMBITS(1) [],
        /// Compare with the source address
        SA OFFSET(30) NUMBITS(1) [],
        /// Mask byte control
        MBC OFFSET(24) NUMBITS(6) [],
        /// Address bytes 4 and 5
        ADDRH OFFSET(0) NUMBITS(16) []
    ],
    pub(crate) MMCCR [
        /// Full/half preset
        MCFHP OFFSET(5) NUMBITS(1) [],
        /// Counter preset
        MCP OFFSET(4) NUMBITS(1) [],
        /// Counter freeze
        MCF OFFSET(3) NUMBITS(1) [],
        /// Reset on read
        ROR OFFSET(2) NUMBITS(1) [],
        /// Counter stop rollover
        CSR OFFSET(1) NUMBITS(1) [],
        /// Counter reset
        CR OFFSET(0) NUMBITS(1) []
    ],
    pub(crate) PTPTSCR [
        TSPFFMAE OFFSET(18) NUMBITS(1) [],
        TSCNT OFFSET(16) NUMBITS(2) [],
        TSSMRME OFFSET(15) NUMBITS(1) [],
        TSSEME OFFSET(14) NUMBITS(1) [],
        TSSIPV4FE OFFSET(13) NUMBITS(1) [],
        TSSIPV6FE OFFSET(12) NUMBITS(1) [],
        TSSPTPOEFE OFFSET(11) NUMBITS(1) [],
        TSPTPPSV2E OFFSET(10) NUMBITS(1) [],
        /// Subsecond rollover at 999 999 999 instead of 0x7FFF_FFFF
        TSSSR OFFSET(9) NUMBITS(1) [],
        TSSARFE OFFSET(8) NUMBITS(1) [],
        /// Addend register update
        TTSARU OFFSET(5) NUMBITS(1) [],
        /// Interrupt trigger enable
        TSITE OFFSET(4) NUMBITS(1) [],
        /// System time update
        TSSTU OFFSET(3) NUMBITS(1) [],
        /// System time initialize
        TSSTI OFFSET(2) NUMBITS(1) [],
        /// Fine (1) or coarse (0) update
        TSFCU OFFSET(1) NUMBITS(1) [],
        /// Time stamp enable
        TSE OFFSET(0) NUMBITS(1) []
    ],
    pub(crate) PTPTSLR [
        /// Negative time
        NEG OFFSET(31) NUMBITS(1) [],
        SUBSECONDS OFFSET(0) NUMBITS(31) []
    ],
    pub(crate) DMABMR [
        /// Mixed burst
        MB OFFSET(26) NUMBITS(1) [],
        /// Address-aligned beats
        AAB OFFSET(25) NUMBITS(1) [],
        /// 4xPBL mode
        FPM OFFSET(24) NUMBITS(1) [],
        /// Use separate PBL
        USP OFFSET(23) NUMBITS(1) [],
        /// Receive DMA PBL
        RDP OFFSET(17) NUMBITS(6) [],
        /// Fixed burst
        FB OFFSET(16) NUMBITS(1) [],
        /// Receive/transmit priority ratio
        PM OFFSET(14) NUMBITS(2) [],
        /// Programmable burst length
        PBL OFFSET(8) NUMBITS(6) [],
        /// Enhanced descriptor format enable
        EDFE OFFSET(7) NUMBITS(1) [],
        /// Descriptor skip length, in words
        DSL OFFSET(2) NUMBITS(5) [],
        /// Receive has priority over transmit
        DA OFFSET(1) NUMBITS(1) [],
        /// Software reset
        SR OFFSET(0) NUMBITS(1) []
    ],
    pub(crate) DMASR [
        TSTS OFFSET(29) NUMBITS(1) [],
        PMTS OFFSET(28) NUMBITS(1) [],
        MMCS OFFSET(27) NUMBITS(1) [],
        /// Error bits
        EBS OFFSET(23) NUMBITS(3) [],
        /// Transmit process state
        TPS OFFSET(20) NUMBITS(3) [],
        /// Receive process state
        RPS OFFSET(17) NUMBITS(3) [],
        NIS OFFSET(16) NUMBITS(1) [],
        AIS OFFSET(15) NUMBITS(1) [],
        ERS OFFSET(14) NUMBITS(1) [],
        FBES OFFSET(13) NUMBITS(1) [],
        ETS OFFSET(10) NUMBITS(1) [],
        RWTS OFFSET(9) NUMBITS(1) [],
        RPSS OFFSET(8) NUMBITS(1) [],
        RBUS OFFSET(7) NUMBITS(1) [],
        RS OFFSET(6) NUMBITS(1) [],
        TUS OFFSET(5) NUMBITS(1) [],
        ROS OFFSET(4) NUMBITS(1) [],
        TJTS OFFSET(3) NUMBITS(1) [],
        TBUS OFFSET(2) NUMBITS(1) [],
        TPSS OFFSET(1) NUMBITS(1) [],
        TS OFFSET(0) NUMBITS(1) []
    ],
    pub(crate) DMAOMR [
        /// Dropping of TCP/IP checksum error frames disable
        DTCEFD OFFSET(26) NUMBITS(1) [],
        /// Receive store and forward
        RSF OFFSET(25) NUMBITS(1) [],
        /// Disable flushing of received frames
        DFRF OFFSET(24) NUMBITS(1) [],
        /// Transmit store and forward
        TSF OFFSET(21) NUMBITS(1) [],
        /// Flush transmit FIFO
        FTF OFFSET(20) NUMBITS(1) [],
        /// Transmit threshold control
        TTC OFFSET(14) NUMBITS(3) [],
        /// Start/stop transmission
        ST OFFSET(13) NUMBITS(1) [],
        /// Forward error frames
        FEF OFFSET(7) NUMBITS(1) [],
        /// Forward undersized good frames
        FUGF OFFSET(6) NUMBITS(1) [],
        /// Receive threshold control
        RTC OFFSET(3) NUMBITS(2) [],
        /// Operate on second frame
        OSF OFFSET(2) NUMBITS(1) [],
        /// Start/stop receive
        SR OFFSET(1) NUMBITS(1) []
    ],
    pub(crate) DMAMFBOCR [
        /// Overflow bit for FIFO overflow counter
        OFOC OFFSET(28) NUMBITS(1) [],
        /// Frames missed by the application
        MFA OFFSET(17) NUMBITS(11) [],
        /// Overflow bit for missed frame counter
        OMFC OFFSET(16) NUMBITS(1) [],
        /// Frames missed by the controller
        MFC OFFSET(0) NUMBITS(16) []
    ]
];
