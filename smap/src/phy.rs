//! # National DP83846A PHY register definitions.
//!
//! The registers are only reachable through [crate::emac3::StaCtrl].
use arbitrary_int::u5;

/// Default PHY address of the transceiver on the adapter.
pub const PHY_ADDR: u5 = u5::new(1);

pub const DP83846A_ID1: u16 = 0x2000;
/// Upper 12 bits of the second identifier register. The lower 4 bits carry the revision.
pub const DP83846A_ID2: u16 = 0x5C90;
pub const DP83846A_ID2_MASK: u16 = 0xFFF0;

#[bitbybit::bitenum(u5, exhaustive = false)]
#[derive(Debug, PartialEq, Eq)]
pub enum PhyRegister {
    Bmcr = 0x00,
    Bmsr = 0x01,
    PhyIdr1 = 0x02,
    PhyIdr2 = 0x03,
    Anar = 0x04,
    Anlpar = 0x05,
    Aner = 0x06,
    Annptr = 0x07,
    PhySts = 0x10,
    Fcscr = 0x14,
    Recr = 0x15,
    Pcsr = 0x16,
    PhyCtrl = 0x19,
    TenBtScr = 0x1A,
    CdCtrl = 0x1B,
}

/// Vendor registers written by the DSP tuning sequence. They are not part of the documented
/// register map, so they are addressed by number.
pub mod dsp {
    use arbitrary_int::u5;

    pub const PAGE_SELECT: u5 = u5::new(0x13);
    pub const PHY_CTRL: u5 = u5::new(0x19);
    pub const TEN_BT_SCR: u5 = u5::new(0x1A);
    pub const REG_1D: u5 = u5::new(0x1D);
    pub const REG_1E: u5 = u5::new(0x1E);
    pub const REG_1F: u5 = u5::new(0x1F);
}

/// Basic mode control register.
#[bitbybit::bitfield(u16, default = 0x0, debug)]
pub struct Bmcr {
    /// Self-clearing once the reset has completed.
    #[bit(15, rw)]
    reset: bool,
    #[bit(14, rw)]
    loopback: bool,
    #[bit(13, rw)]
    speed_100: bool,
    #[bit(12, rw)]
    auto_negotiation_enable: bool,
    #[bit(11, rw)]
    power_down: bool,
    #[bit(10, rw)]
    isolate: bool,
    /// Self-clearing.
    #[bit(9, rw)]
    restart_auto_negotiation: bool,
    #[bit(8, rw)]
    full_duplex: bool,
    #[bit(7, rw)]
    collision_test: bool,
}

/// Basic mode status register.
#[bitbybit::bitfield(u16, default = 0x0, debug)]
pub struct Bmsr {
    #[bit(14, r)]
    tx_100_full_duplex: bool,
    #[bit(13, r)]
    tx_100_half_duplex: bool,
    #[bit(12, r)]
    t_10_full_duplex: bool,
    #[bit(11, r)]
    t_10_half_duplex: bool,
    #[bit(6, r)]
    preamble_suppression: bool,
    #[bit(5, r)]
    auto_negotiation_complete: bool,
    /// Latching high.
    #[bit(4, r)]
    remote_fault: bool,
    #[bit(3, r)]
    auto_negotiation_ability: bool,
    /// Latching low. Read the register back to back for the current link state.
    #[bit(2, r)]
    link_status: bool,
    /// Latching high.
    #[bit(1, r)]
    jabber_detect: bool,
    #[bit(0, r)]
    extended_capability: bool,
}

/// Auto-negotiation link partner ability register.
#[bitbybit::bitfield(u16, default = 0x0, debug)]
pub struct Anlpar {
    #[bit(15, r)]
    next_page: bool,
    #[bit(14, r)]
    ack: bool,
    #[bit(13, r)]
    remote_fault: bool,
    /// Link partner supports pause frames.
    #[bit(10, r)]
    pause: bool,
    #[bit(9, r)]
    t4: bool,
    #[bit(8, r)]
    tx_full_duplex: bool,
    #[bit(7, r)]
    tx: bool,
    #[bit(6, r)]
    t_10_full_duplex: bool,
    #[bit(5, r)]
    t_10: bool,
}

/// PHY status register with the real-time link state and the negotiated mode.
#[bitbybit::bitfield(u16, default = 0x0, debug)]
pub struct PhySts {
    #[bit(7, r)]
    remote_fault: bool,
    #[bit(6, r)]
    jabber_detect: bool,
    #[bit(4, r)]
    auto_negotiation_complete: bool,
    #[bit(3, r)]
    loopback: bool,
    #[bit(2, r)]
    full_duplex: bool,
    /// 1: 10 Mbps, 0: 100 Mbps
    #[bit(1, r)]
    speed_10: bool,
    #[bit(0, r)]
    link: bool,
}

/// Returns whether the identifier registers belong to a DP83846A.
#[inline]
pub const fn is_dp83846a(id1: u16, id2: u16) -> bool {
    id1 == DP83846A_ID1 && (id2 & DP83846A_ID2_MASK) == DP83846A_ID2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phy_identification() {
        assert!(is_dp83846a(0x2000, 0x5C91));
        assert!(is_dp83846a(0x2000, 0x5C9F));
        assert!(!is_dp83846a(0x2000, 0x5CA0));
        assert!(!is_dp83846a(0x0141, 0x5C90));
    }

    #[test]
    fn negotiation_request() {
        let bmcr = Bmcr::DEFAULT
            .with_auto_negotiation_enable(true)
            .with_restart_auto_negotiation(true);
        assert_eq!(bmcr.raw_value(), 0x1200);
        assert_eq!(PhyRegister::PhySts.raw_value().value(), 0x10);
    }
}
