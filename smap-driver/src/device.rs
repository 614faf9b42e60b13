//! Device state owned by the dispatch loop, and the adapter reset sequence.
use arbitrary_int::{u5, u9};
use embedded_hal::delay::DelayNs;
use smap::{
    emac3::{
        Emac3Interrupt, Emac3Reg, MediaSpeed, Mode0, Mode1, RxFifoSize, RxMode, RxWatermark,
        TxFifoSize, TxMode1, TxRequestMode, TxThreshold, mac_to_addr_regs,
    },
    fifo::FifoCtrl,
    speed::InterruptCause,
};

use crate::{
    config::DriverConfig,
    error::{Error, TimeoutCause},
    ll::Registers,
    packet::{HeapAllocator, Packet, PacketAllocator},
    phy::LinkStatus,
    platform::DmaEngine,
    ring::{RxRing, TxRing},
};

/// Number of polls of a self-clearing reset bit.
pub const RESET_POLL_LIMIT: u32 = 9;
/// Minimum SPEED revision with a usable SMAP core.
const MIN_SPEED_REVISION: u16 = 17;
/// Delay between polls of a reset bit or of the PHY management interface.
pub(crate) const POLL_DELAY_US: u32 = 1000;
/// Settle time after the MAC was enabled.
const MAC_ENABLE_SETTLE_US: u32 = 10_000;

/// The adapter and all state which is only touched by the dispatch loop.
pub struct SmapDevice<R, D, L, A = HeapAllocator> {
    pub(crate) regs: R,
    pub(crate) dma: D,
    pub(crate) delay: L,
    pub(crate) allocator: A,
    pub(crate) config: DriverConfig,
    pub(crate) tx_ring: TxRing,
    pub(crate) rx_ring: RxRing,
    /// Packet which could not be posted yet. It keeps its queue reference until it is sent.
    pub(crate) pending: Option<Packet>,
    /// Offset of the next frame inside the TX FIFO.
    pub(crate) tx_write_offset: usize,
    mac_address: [u8; 6],
    pub(crate) has_init: bool,
    pub(crate) has_link: bool,
    /// Alarm periods left until the link state is read again.
    pub(crate) link_retry: u8,
    pub(crate) link: Option<LinkStatus>,
}

impl<R: Registers, D: DmaEngine, L: DelayNs, A: PacketAllocator> SmapDevice<R, D, L, A> {
    pub fn new(regs: R, dma: D, delay: L, allocator: A, config: DriverConfig) -> Self {
        Self {
            regs,
            dma,
            delay,
            allocator,
            config,
            tx_ring: TxRing::new(),
            rx_ring: RxRing::new(),
            pending: None,
            tx_write_offset: 0,
            mac_address: [0; 6],
            has_init: false,
            has_link: false,
            link_retry: config.link_check_retries,
            link: None,
        }
    }

    /// Reset and configure the adapter.
    ///
    /// Verifies the device revision, resets both FIFOs and the MAC, initializes the descriptor
    /// tables and programs the MAC with the address stored in the EEPROM. Returns that address.
    pub fn reset(&mut self) -> Result<[u8; 6], Error> {
        if !self.regs.rev_3().smap() || self.regs.rev_1() < MIN_SPEED_REVISION {
            return Err(Error::UnsupportedDevice);
        }
        self.regs.disable_interrupts(InterruptCause::ALL);

        self.regs
            .write_tx_fifo_ctrl(FifoCtrl::DEFAULT.with_reset(true));
        self.poll_reset(TimeoutCause::TxFifoReset, |regs| {
            regs.tx_fifo_ctrl().reset()
        })?;
        self.regs
            .write_rx_fifo_ctrl(FifoCtrl::DEFAULT.with_reset(true));
        self.poll_reset(TimeoutCause::RxFifoReset, |regs| {
            regs.rx_fifo_ctrl().reset()
        })?;
        self.regs
            .write_mode0(Mode0::DEFAULT.with_soft_reset(true));
        self.poll_reset(TimeoutCause::EmacReset, |regs| regs.mode0().soft_reset())?;

        self.regs.write_bd_mode(0);
        self.tx_ring.reset(&mut self.regs);
        self.rx_ring.reset(&mut self.regs);
        self.tx_write_offset = 0;
        self.regs.clear_interrupts(InterruptCause::ALL);

        let mac = mac_from_eeprom(self.regs.read_eeprom())?;
        self.mac_address = mac;

        self.regs.write_mode1(
            Mode1::DEFAULT
                .with_full_duplex(true)
                .with_ignore_sqe(true)
                .with_media(MediaSpeed::Mbps100)
                .with_rx_fifo_size(RxFifoSize::Bytes2048)
                .with_tx_fifo_size(TxFifoSize::Bytes1024)
                .with_tx_req0(TxRequestMode::Multi),
        );
        self.regs.write_emac3(
            Emac3Reg::TxMode1,
            TxMode1::DEFAULT
                .with_low_request(u5::new(7))
                .with_urgent_request(15)
                .raw_value(),
        );
        self.regs.write_emac3(
            Emac3Reg::RxMode,
            RxMode::DEFAULT
                .with_strip_pad(true)
                .with_strip_fcs(true)
                .with_individual_address(true)
                .with_broadcast(true)
                .with_multicast(true)
                .raw_value(),
        );
        self.regs.clear_emac3_interrupts(Emac3Interrupt::TX_ERRORS);
        self.regs
            .write_emac3(Emac3Reg::IntrEnable, Emac3Interrupt::TX_ERRORS.raw_value());
        let (addr_hi, addr_lo) = mac_to_addr_regs(mac);
        self.regs.write_emac3(Emac3Reg::AddrHi, addr_hi);
        self.regs.write_emac3(Emac3Reg::AddrLo, addr_lo);
        self.regs.write_emac3(Emac3Reg::PauseTimer, 0xFFFF);
        for reg in [
            Emac3Reg::GroupHash1,
            Emac3Reg::GroupHash2,
            Emac3Reg::GroupHash3,
            Emac3Reg::GroupHash4,
        ] {
            self.regs.write_emac3(reg, 0);
        }
        self.regs.write_emac3(Emac3Reg::InterFrameGap, 4);
        self.regs.write_emac3(
            Emac3Reg::TxThreshold,
            TxThreshold::DEFAULT
                .with_threshold(u5::new(12))
                .raw_value(),
        );
        self.regs.write_emac3(
            Emac3Reg::RxWatermark,
            RxWatermark::DEFAULT
                .with_low(u9::new(16))
                .with_high(u9::new(128))
                .raw_value(),
        );
        log::info!(
            "SMAP reset done, MAC address {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            mac[0],
            mac[1],
            mac[2],
            mac[3],
            mac[4],
            mac[5]
        );
        Ok(mac)
    }

    fn poll_reset(
        &mut self,
        cause: TimeoutCause,
        mut in_reset: impl FnMut(&mut R) -> bool,
    ) -> Result<(), Error> {
        for _ in 0..RESET_POLL_LIMIT {
            if !in_reset(&mut self.regs) {
                return Ok(());
            }
            self.delay.delay_us(POLL_DELAY_US);
        }
        Err(Error::HardwareTimeout(cause))
    }

    /// Enable or disable both MAC directions.
    pub(crate) fn set_mac_enable(&mut self, enable: bool) {
        self.regs.write_mode0(
            Mode0::DEFAULT
                .with_tx_mac_enable(enable)
                .with_rx_mac_enable(enable),
        );
        if enable {
            self.delay.delay_us(MAC_ENABLE_SETTLE_US);
        }
    }

    #[inline]
    pub fn mac_address(&self) -> [u8; 6] {
        self.mac_address
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.has_init
    }

    #[inline]
    pub fn has_link(&self) -> bool {
        self.has_link
    }

    /// Negotiated link parameters, if the link was established.
    #[inline]
    pub fn link(&self) -> Option<LinkStatus> {
        self.link
    }

    #[inline]
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    #[inline]
    pub fn tx_ring(&self) -> &TxRing {
        &self.tx_ring
    }

    #[inline]
    pub fn has_pending_tx(&self) -> bool {
        self.pending.is_some()
    }

    #[inline]
    pub fn regs_mut(&mut self) -> &mut R {
        &mut self.regs
    }
}

/// Decode the MAC address from the first four EEPROM words.
///
/// Words 0 to 2 carry two address bytes each, low byte first, and must be non-zero. Word 3 is
/// their sum, which must not exceed 16 bits.
pub fn mac_from_eeprom(words: [u16; 4]) -> Result<[u8; 6], Error> {
    if words[..3].contains(&0) {
        return Err(Error::DeviceAddressInvalid);
    }
    let checksum: u32 = words[..3].iter().copied().map(u32::from).sum();
    if checksum != u32::from(words[3]) {
        return Err(Error::DeviceAddressInvalid);
    }
    let mut mac = [0; 6];
    for (bytes, word) in mac.chunks_exact_mut(2).zip(words) {
        bytes.copy_from_slice(&word.to_le_bytes());
    }
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimDelay, SimSmap};

    #[test]
    fn eeprom_address_decoding() {
        let mac = mac_from_eeprom([0x1100, 0x3322, 0x5544, 0x9966]).unwrap();
        assert_eq!(mac, [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    }

    #[test]
    fn eeprom_checksum_mismatch() {
        assert_eq!(
            mac_from_eeprom([0x1100, 0x3322, 0x5544, 0x0000]),
            Err(Error::DeviceAddressInvalid)
        );
        assert_eq!(
            mac_from_eeprom([0x0000, 0x3322, 0x5544, 0x8866]),
            Err(Error::DeviceAddressInvalid)
        );
    }

    #[test]
    fn eeprom_checksum_overflow_is_rejected() {
        // 0x2D000 truncated to 16 bits would match.
        assert_eq!(
            mac_from_eeprom([0xF000, 0xF000, 0xF000, 0xD000]),
            Err(Error::DeviceAddressInvalid)
        );
    }

    #[test]
    fn reset_programs_mac() {
        let sim = SimSmap::new();
        let mut device = sim.device(DriverConfig::default());
        let mac = device.reset().unwrap();
        assert_eq!(mac, SimSmap::DEFAULT_MAC);
        assert_eq!(device.mac_address(), mac);
        let regs = device.regs_mut();
        assert_eq!(regs.read_emac3(Emac3Reg::AddrHi), 0x0011);
        assert_eq!(regs.read_emac3(Emac3Reg::AddrLo), 0x2233_4455);
        assert_eq!(regs.read_emac3(Emac3Reg::InterFrameGap), 4);
        assert_eq!(regs.read_emac3(Emac3Reg::PauseTimer), 0xFFFF);
        let mode1 = regs.mode1();
        assert!(mode1.full_duplex());
        assert!(mode1.ignore_sqe());
        assert_eq!(mode1.media(), MediaSpeed::Mbps100);
        assert_eq!(
            regs.read_emac3(Emac3Reg::IntrEnable),
            Emac3Interrupt::TX_ERRORS.raw_value()
        );
        assert!(regs.read_rx_bd(63).rx_status().empty());
        assert_eq!(regs.intr_mask(), InterruptCause::DEFAULT);
    }

    #[test]
    fn reset_rejects_bad_checksum() {
        let sim = SimSmap::new();
        sim.with_state(|s| s.eeprom[3] = s.eeprom[3].wrapping_add(1));
        let mut device = sim.device(DriverConfig::default());
        assert_eq!(device.reset(), Err(Error::DeviceAddressInvalid));
    }

    #[test]
    fn reset_rejects_old_revision() {
        let sim = SimSmap::new();
        sim.with_state(|s| s.rev_1 = 16);
        let mut device = sim.device(DriverConfig::default());
        assert_eq!(device.reset(), Err(Error::UnsupportedDevice));
    }

    #[test]
    fn fifo_reset_timeout() {
        let sim = SimSmap::new();
        sim.with_state(|s| s.rx_fifo_reset_stuck = true);
        let delay = SimDelay::new();
        let mut device = SmapDevice::new(
            sim.clone(),
            sim.clone(),
            delay.clone(),
            HeapAllocator::default(),
            DriverConfig::default(),
        );
        assert_eq!(
            device.reset(),
            Err(Error::HardwareTimeout(TimeoutCause::RxFifoReset))
        );
        assert_eq!(delay.elapsed_us(), RESET_POLL_LIMIT as u64 * POLL_DELAY_US as u64);
    }

    #[test]
    fn emac_reset_timeout() {
        let sim = SimSmap::new();
        sim.with_state(|s| s.emac_reset_stuck = true);
        let mut device = sim.device(DriverConfig::default());
        assert_eq!(
            device.reset(),
            Err(Error::HardwareTimeout(TimeoutCause::EmacReset))
        );
    }
}
