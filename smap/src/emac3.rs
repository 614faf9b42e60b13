//! # EMAC3 MAC core register module.
use arbitrary_int::{u2, u5, u9};

pub const EMAC3_BASE_ADDR: usize = 0xB000_2000;

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Mode0 {
    #[bit(31, r)]
    rx_idle: bool,
    #[bit(30, r)]
    tx_idle: bool,
    /// Self-clearing.
    #[bit(29, rw)]
    soft_reset: bool,
    #[bit(28, rw)]
    tx_mac_enable: bool,
    #[bit(27, rw)]
    rx_mac_enable: bool,
    #[bit(26, rw)]
    wakeup_enable: bool,
}

#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum MediaSpeed {
    Mbps10 = 0b00,
    Mbps100 = 0b01,
    Mbps1000 = 0b10,
    Reserved = 0b11,
}

#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum RxFifoSize {
    Bytes512 = 0b00,
    Bytes1024 = 0b01,
    Bytes2048 = 0b10,
    Bytes4096 = 0b11,
}

#[bitbybit::bitenum(u2, exhaustive = false)]
#[derive(Debug, PartialEq, Eq)]
pub enum TxFifoSize {
    Bytes512 = 0b00,
    Bytes1024 = 0b01,
    Bytes2048 = 0b10,
}

#[bitbybit::bitenum(u2, exhaustive = false)]
#[derive(Debug, PartialEq, Eq)]
pub enum TxRequestMode {
    Single = 0b00,
    Multi = 0b01,
    Depend = 0b10,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct Mode1 {
    #[bit(31, rw)]
    full_duplex: bool,
    #[bit(30, rw)]
    internal_loopback: bool,
    #[bit(29, rw)]
    vlan_enable: bool,
    /// Integrated flow control with pause frames.
    #[bit(28, rw)]
    flow_ctrl_enable: bool,
    #[bit(27, rw)]
    ignore_sqe: bool,
    #[bits(22..=23, rw)]
    media: MediaSpeed,
    #[bits(20..=21, rw)]
    rx_fifo_size: RxFifoSize,
    #[bits(18..=19, rw)]
    tx_fifo_size: Option<TxFifoSize>,
    #[bits(15..=16, rw)]
    tx_req0: Option<TxRequestMode>,
    #[bits(13..=14, rw)]
    tx_req1: Option<TxRequestMode>,
    #[bit(12, rw)]
    jumbo_enable: bool,
    /// Allow pause frames from the link partner.
    #[bit(3, rw)]
    allow_pause: bool,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct TxMode0 {
    /// Get new packet on channel 0. Self-clearing once the MAC fetched the descriptor.
    #[bit(31, rw)]
    gnp_0: bool,
    #[bit(30, rw)]
    gnp_1: bool,
    #[bit(29, rw)]
    gnp_depend: bool,
    #[bit(28, rw)]
    first_channel: bool,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct TxMode1 {
    #[bits(27..=31, rw)]
    low_request: u5,
    #[bits(16..=23, rw)]
    urgent_request: u8,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct RxMode {
    #[bit(31, rw)]
    strip_pad: bool,
    #[bit(30, rw)]
    strip_fcs: bool,
    #[bit(29, rw)]
    receive_runt_frames: bool,
    #[bit(28, rw)]
    receive_fcs_errors: bool,
    #[bit(27, rw)]
    receive_too_long_frames: bool,
    #[bit(24, rw)]
    promiscuous: bool,
    #[bit(23, rw)]
    promiscuous_multicast: bool,
    #[bit(21, rw)]
    individual_address: bool,
    #[bit(20, rw)]
    individual_hash: bool,
    #[bit(19, rw)]
    broadcast: bool,
    #[bit(18, rw)]
    multicast: bool,
}

/// EMAC3 interrupt causes. Used for both the status (write 1 to clear) and the enable register.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct Emac3Interrupt {
    #[bit(25, rw)]
    overrun: bool,
    #[bit(24, rw)]
    pause_frame: bool,
    #[bit(23, rw)]
    bad_frame: bool,
    #[bit(22, rw)]
    runt_frame: bool,
    #[bit(21, rw)]
    short_event: bool,
    #[bit(20, rw)]
    alignment_error: bool,
    #[bit(19, rw)]
    bad_fcs: bool,
    #[bit(18, rw)]
    frame_too_long: bool,
    #[bit(17, rw)]
    out_of_range: bool,
    #[bit(16, rw)]
    in_range: bool,
    #[bit(9, rw)]
    dead_depend: bool,
    /// Transmit channel 0 stopped because of a fatal error.
    #[bit(8, rw)]
    dead_0: bool,
    #[bit(7, rw)]
    sqe_err_0: bool,
    #[bit(6, rw)]
    tx_err_0: bool,
    #[bit(5, rw)]
    dead_1: bool,
    #[bit(4, rw)]
    sqe_err_1: bool,
    #[bit(3, rw)]
    tx_err_1: bool,
    #[bit(1, rw)]
    mmaop_success: bool,
    #[bit(0, rw)]
    mmaop_fail: bool,
}

impl Emac3Interrupt {
    /// The MAC error causes the driver keeps armed on transmit channel 0.
    pub const TX_ERRORS: Self = Self::DEFAULT
        .with_dead_0(true)
        .with_sqe_err_0(true)
        .with_tx_err_0(true);
}

#[bitbybit::bitenum(u2, exhaustive = false)]
#[derive(Debug, PartialEq, Eq)]
pub enum StaOperation {
    Read = 0b01,
    Write = 0b10,
}

/// Station management control register. This is the only path to the PHY registers.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct StaCtrl {
    #[bits(16..=31, rw)]
    data: u16,
    /// Set by the hardware once the management operation has finished.
    #[bit(15, rw)]
    op_complete: bool,
    /// Read operation failed.
    #[bit(14, r)]
    phy_error: bool,
    #[bits(12..=13, rw)]
    op: Option<StaOperation>,
    #[bits(10..=11, rw)]
    opb_clock: u2,
    #[bits(5..=9, rw)]
    phy_addr: u5,
    #[bits(0..=4, rw)]
    reg_addr: u5,
}

/// Number of 64-byte units the TX FIFO must hold before transmission starts.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct TxThreshold {
    #[bits(27..=31, rw)]
    threshold: u5,
}

/// RX FIFO watermarks in units of 8 bytes. Used for pause frame generation.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct RxWatermark {
    #[bits(23..=31, rw)]
    low: u9,
    #[bits(7..=15, rw)]
    high: u9,
}

/// Register selector for the EMAC3 registers used by the driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Emac3Reg {
    Mode0,
    Mode1,
    TxMode0,
    TxMode1,
    RxMode,
    IntrStat,
    IntrEnable,
    AddrHi,
    AddrLo,
    VlanTpid,
    VlanTci,
    PauseTimer,
    GroupHash1,
    GroupHash2,
    GroupHash3,
    GroupHash4,
    LastSaHi,
    LastSaLo,
    InterFrameGap,
    StaCtrl,
    TxThreshold,
    RxWatermark,
    TxOctets,
    RxOctets,
}

impl Emac3Reg {
    /// Byte offset of the register inside the EMAC3 block.
    pub const fn offset(&self) -> usize {
        match self {
            Emac3Reg::Mode0 => 0x00,
            Emac3Reg::Mode1 => 0x04,
            Emac3Reg::TxMode0 => 0x08,
            Emac3Reg::TxMode1 => 0x0C,
            Emac3Reg::RxMode => 0x10,
            Emac3Reg::IntrStat => 0x14,
            Emac3Reg::IntrEnable => 0x18,
            Emac3Reg::AddrHi => 0x1C,
            Emac3Reg::AddrLo => 0x20,
            Emac3Reg::VlanTpid => 0x24,
            Emac3Reg::VlanTci => 0x28,
            Emac3Reg::PauseTimer => 0x2C,
            Emac3Reg::GroupHash1 => 0x40,
            Emac3Reg::GroupHash2 => 0x44,
            Emac3Reg::GroupHash3 => 0x48,
            Emac3Reg::GroupHash4 => 0x4C,
            Emac3Reg::LastSaHi => 0x50,
            Emac3Reg::LastSaLo => 0x54,
            Emac3Reg::InterFrameGap => 0x58,
            Emac3Reg::StaCtrl => 0x5C,
            Emac3Reg::TxThreshold => 0x60,
            Emac3Reg::RxWatermark => 0x64,
            Emac3Reg::TxOctets => 0x68,
            Emac3Reg::RxOctets => 0x6C,
        }
    }
}

/// EMAC3 register block.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Emac3 {
    mode0: Mode0,
    mode1: Mode1,
    tx_mode0: TxMode0,
    tx_mode1: TxMode1,
    rx_mode: RxMode,
    intr_stat: Emac3Interrupt,
    intr_enable: Emac3Interrupt,
    /// The two most significant address bytes.
    addr_hi: u32,
    addr_lo: u32,
    vlan_tpid: u32,
    vlan_tci: u32,
    pause_timer: u32,
    individual_hash_1: u32,
    individual_hash_2: u32,
    individual_hash_3: u32,
    individual_hash_4: u32,
    group_hash_1: u32,
    group_hash_2: u32,
    group_hash_3: u32,
    group_hash_4: u32,
    #[mmio(PureRead)]
    last_sa_hi: u32,
    #[mmio(PureRead)]
    last_sa_lo: u32,
    inter_frame_gap: u32,
    sta_ctrl: StaCtrl,
    tx_threshold: TxThreshold,
    rx_watermark: RxWatermark,
    #[mmio(PureRead)]
    tx_octets: u32,
    #[mmio(PureRead)]
    rx_octets: u32,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Emac3>(), 0x70);

impl Emac3 {
    /// Create a new EMAC3 MMIO instance at the fixed base address.
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    #[inline]
    pub const unsafe fn new_mmio_fixed() -> MmioEmac3<'static> {
        unsafe { Self::new_mmio_at(EMAC3_BASE_ADDR) }
    }
}

/// Split a MAC address into the values of the address high and low registers.
#[inline]
pub const fn mac_to_addr_regs(mac: [u8; 6]) -> (u32, u32) {
    let hi = ((mac[0] as u32) << 8) | mac[1] as u32;
    let lo = ((mac[2] as u32) << 24)
        | ((mac[3] as u32) << 16)
        | ((mac[4] as u32) << 8)
        | mac[5] as u32;
    (hi, lo)
}
