//! PHY management and the link negotiation state machine.
//!
//! The transceiver is only reachable through the EMAC3 station management register. Every
//! access is polled for completion with a bounded number of 1 ms delays.
use arbitrary_int::u5;
use embedded_hal::delay::DelayNs;
use smap::{
    emac3::MediaSpeed,
    phy::{Anlpar, Bmcr, Bmsr, PhyRegister, PhySts, dsp, is_dp83846a},
};

use crate::{
    device::{POLL_DELAY_US, RESET_POLL_LIMIT, SmapDevice},
    error::{Error, TimeoutCause},
    ll::{Registers, sta_read_command, sta_write_command},
    packet::PacketAllocator,
    platform::DmaEngine,
};

/// Number of completion polls of one management operation.
pub const STA_POLL_LIMIT: u32 = 100;
/// Auto-negotiation attempts before giving up.
pub const NEGOTIATION_ATTEMPTS: u8 = 3;
/// Link polls per attempt once auto-negotiation completed.
pub const LINK_POLL_LIMIT: u32 = 20;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LinkSpeed {
    Mbps10,
    Mbps100,
}

impl LinkSpeed {
    #[inline]
    pub const fn media(&self) -> MediaSpeed {
        match self {
            LinkSpeed::Mbps10 => MediaSpeed::Mbps10,
            LinkSpeed::Mbps100 => MediaSpeed::Mbps100,
        }
    }
}

/// Result of a successful negotiation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub speed: LinkSpeed,
    pub full_duplex: bool,
    /// Pause frames are used in both directions.
    pub flow_control: bool,
}

#[derive(Debug, Copy, Clone)]
enum NegotiationState {
    Reset,
    Negotiate { attempt: u8 },
    PollLink { attempt: u8, bmsr: Bmsr },
    Linked,
}

#[inline]
const fn reg(reg: PhyRegister) -> u5 {
    u5::new(reg as u8)
}

impl<R: Registers, D: DmaEngine, L: DelayNs, A: PacketAllocator> SmapDevice<R, D, L, A> {
    pub fn phy_read(&mut self, reg: u5) -> Result<u16, Error> {
        self.regs
            .write_sta_ctrl(sta_read_command(self.config.phy_address, reg));
        for _ in 0..STA_POLL_LIMIT {
            let ctrl = self.regs.sta_ctrl();
            if ctrl.op_complete() {
                return Ok(ctrl.data());
            }
            self.delay.delay_us(POLL_DELAY_US);
        }
        log::error!("PHY read of register {reg} timed out");
        Err(Error::HardwareTimeout(TimeoutCause::PhyRead(reg.value())))
    }

    pub fn phy_write(&mut self, reg: u5, data: u16) -> Result<(), Error> {
        self.regs
            .write_sta_ctrl(sta_write_command(self.config.phy_address, reg, data));
        for _ in 0..STA_POLL_LIMIT {
            if self.regs.sta_ctrl().op_complete() {
                return Ok(());
            }
            self.delay.delay_us(POLL_DELAY_US);
        }
        log::error!("PHY write of register {reg} timed out");
        Err(Error::HardwareTimeout(TimeoutCause::PhyWrite(reg.value())))
    }

    #[inline]
    fn read_bmsr(&mut self) -> Result<Bmsr, Error> {
        Ok(Bmsr::new_with_raw_value(
            self.phy_read(reg(PhyRegister::Bmsr))?,
        ))
    }

    /// Reset the PHY, negotiate the link and program the MAC accordingly.
    pub fn negotiate_link(&mut self) -> Result<LinkStatus, Error> {
        let mut state = NegotiationState::Reset;
        loop {
            state = match state {
                NegotiationState::Reset => {
                    self.phy_reset()?;
                    NegotiationState::Negotiate { attempt: 1 }
                }
                NegotiationState::Negotiate { attempt } => {
                    if attempt > NEGOTIATION_ATTEMPTS {
                        log::error!("auto-negotiation failed");
                        return Err(Error::NegotiationFailed {
                            attempts: NEGOTIATION_ATTEMPTS,
                        });
                    }
                    log::debug!("auto-negotiation attempt {attempt}");
                    self.phy_write(
                        reg(PhyRegister::Bmcr),
                        Bmcr::DEFAULT
                            .with_auto_negotiation_enable(true)
                            .with_restart_auto_negotiation(true)
                            .raw_value(),
                    )?;
                    self.delay
                        .delay_us(self.config.negotiation_settle.to_micros());
                    let bmsr = self.read_bmsr()?;
                    NegotiationState::PollLink { attempt, bmsr }
                }
                NegotiationState::PollLink { attempt, bmsr } => {
                    if bmsr.auto_negotiation_complete() && self.poll_link()? {
                        NegotiationState::Linked
                    } else {
                        NegotiationState::Negotiate {
                            attempt: attempt + 1,
                        }
                    }
                }
                NegotiationState::Linked => {
                    let status = self.configure_link()?;
                    self.link = Some(status);
                    return Ok(status);
                }
            };
        }
    }

    fn phy_reset(&mut self) -> Result<(), Error> {
        self.phy_write(
            reg(PhyRegister::Bmcr),
            Bmcr::DEFAULT.with_reset(true).raw_value(),
        )?;
        for _ in 0..RESET_POLL_LIMIT {
            let bmcr = Bmcr::new_with_raw_value(self.phy_read(reg(PhyRegister::Bmcr))?);
            if !bmcr.reset() {
                return Ok(());
            }
            self.delay.delay_us(POLL_DELAY_US);
        }
        log::error!("PHY reset did not complete");
        Err(Error::HardwareTimeout(TimeoutCause::PhyReset))
    }

    fn poll_link(&mut self) -> Result<bool, Error> {
        for _ in 0..LINK_POLL_LIMIT {
            if self.read_bmsr()?.link_status() {
                return Ok(true);
            }
            self.delay.delay_us(self.config.link_poll_delay.to_micros());
        }
        Ok(false)
    }

    /// Read the negotiated mode and program duplex, flow control and media speed of the MAC.
    fn configure_link(&mut self) -> Result<LinkStatus, Error> {
        let phy_sts = PhySts::new_with_raw_value(self.phy_read(reg(PhyRegister::PhySts))?);
        let partner = Anlpar::new_with_raw_value(self.phy_read(reg(PhyRegister::Anlpar))?);
        let speed = if phy_sts.speed_10() {
            LinkSpeed::Mbps10
        } else {
            LinkSpeed::Mbps100
        };
        let full_duplex = phy_sts.full_duplex();
        let flow_control = full_duplex && partner.pause();
        let mut mode1 = self.regs.mode1();
        mode1.set_full_duplex(full_duplex);
        mode1.set_flow_ctrl_enable(flow_control);
        mode1.set_allow_pause(flow_control);
        mode1.set_media(speed.media());
        self.regs.write_mode1(mode1);
        log::info!(
            "link up: {speed:?}, {} duplex, flow control {}",
            if full_duplex { "full" } else { "half" },
            if flow_control { "on" } else { "off" }
        );

        let id1 = self.phy_read(reg(PhyRegister::PhyIdr1))?;
        let id2 = self.phy_read(reg(PhyRegister::PhyIdr2))?;
        if is_dp83846a(id1, id2) {
            self.dsp_tuning(speed)?;
        }
        Ok(LinkStatus {
            speed,
            full_duplex,
            flow_control,
        })
    }

    /// DSP fixup for the DP83846A.
    fn dsp_tuning(&mut self, speed: LinkSpeed) -> Result<(), Error> {
        log::debug!("running DP83846A DSP tuning");
        if speed == LinkSpeed::Mbps10 {
            self.phy_write(dsp::TEN_BT_SCR, 0x0104)?;
        }
        for (reg, value) in [
            (dsp::PAGE_SELECT, 0x0001),
            (dsp::PHY_CTRL, 0x1898),
            (dsp::REG_1F, 0x0000),
            (dsp::REG_1D, 0x5040),
            (dsp::REG_1E, 0x008C),
            (dsp::PAGE_SELECT, 0x0000),
        ] {
            self.phy_write(reg, value)?;
        }
        Ok(())
    }

    /// Read the current link state. The link bit latches low, so the status register is read
    /// twice.
    pub fn check_link(&mut self) -> Result<bool, Error> {
        self.read_bmsr()?;
        Ok(self.read_bmsr()?.link_status())
    }
}

#[cfg(test)]
mod tests {
    use fugit::MicrosDurationU32;

    use super::*;
    use crate::{
        config::DriverConfig,
        packet::HeapAllocator,
        sim::{SimDelay, SimSmap},
    };

    fn device(
        sim: &SimSmap,
    ) -> (
        SmapDevice<SimSmap, SimSmap, SimDelay, HeapAllocator>,
        SimDelay,
    ) {
        let delay = SimDelay::new();
        let config = DriverConfig::default()
            .with_negotiation_settle(MicrosDurationU32::millis(1))
            .with_link_poll_delay(MicrosDurationU32::millis(1));
        let mut device = SmapDevice::new(
            sim.clone(),
            sim.clone(),
            delay.clone(),
            HeapAllocator::default(),
            config,
        );
        device.reset().unwrap();
        (device, delay)
    }

    #[test]
    fn read_and_write_registers() {
        let sim = SimSmap::new();
        let (mut device, _) = device(&sim);
        assert_eq!(device.phy_read(reg(PhyRegister::PhyIdr1)).unwrap(), 0x2000);
        device.phy_write(u5::new(0x1B), 0x1234).unwrap();
        assert_eq!(
            sim.with_state(|s| s.phy.writes.last().copied()),
            Some((0x1B, 0x1234))
        );
    }

    #[test]
    fn management_timeout() {
        let sim = SimSmap::new();
        let (mut device, delay) = device(&sim);
        sim.with_state(|s| s.phy.mgmt_stuck = true);
        let before = delay.elapsed_us();
        assert_eq!(
            device.phy_read(reg(PhyRegister::Bmsr)),
            Err(Error::HardwareTimeout(TimeoutCause::PhyRead(1)))
        );
        assert_eq!(delay.elapsed_us() - before, 100 * 1000);
        assert_eq!(
            device.phy_write(reg(PhyRegister::Bmcr), 0),
            Err(Error::HardwareTimeout(TimeoutCause::PhyWrite(0)))
        );
    }

    #[test]
    fn negotiation_success() {
        let sim = SimSmap::new();
        let (mut device, _) = device(&sim);
        let status = device.negotiate_link().unwrap();
        assert_eq!(
            status,
            LinkStatus {
                speed: LinkSpeed::Mbps100,
                full_duplex: true,
                flow_control: true,
            }
        );
        let mode1 = device.regs_mut().mode1();
        assert!(mode1.full_duplex());
        assert!(mode1.flow_ctrl_enable());
        assert!(mode1.allow_pause());
        assert_eq!(mode1.media(), MediaSpeed::Mbps100);
        // DP83846A tuning sequence without the 10 Mbit step.
        let writes = sim.with_state(|s| s.phy.writes.clone());
        let tail = &writes[writes.len() - 6..];
        assert_eq!(
            tail,
            &[
                (0x13, 0x0001),
                (0x19, 0x1898),
                (0x1F, 0x0000),
                (0x1D, 0x5040),
                (0x1E, 0x008C),
                (0x13, 0x0000)
            ]
        );
        assert!(!writes.iter().any(|w| w.0 == 0x1A));
    }

    #[test]
    fn ten_mbit_half_duplex() {
        let sim = SimSmap::new();
        sim.with_state(|s| {
            s.phy.speed_10 = true;
            s.phy.full_duplex = false;
        });
        let (mut device, _) = device(&sim);
        let status = device.negotiate_link().unwrap();
        assert_eq!(status.speed, LinkSpeed::Mbps10);
        assert!(!status.full_duplex);
        assert!(!status.flow_control);
        let mode1 = device.regs_mut().mode1();
        assert!(!mode1.full_duplex());
        assert_eq!(mode1.media(), MediaSpeed::Mbps10);
        let writes = sim.with_state(|s| s.phy.writes.clone());
        assert!(writes.contains(&(0x1A, 0x0104)));
    }

    #[test]
    fn no_tuning_for_other_phy() {
        let sim = SimSmap::new();
        sim.with_state(|s| s.phy.id1 = 0x0141);
        let (mut device, _) = device(&sim);
        device.negotiate_link().unwrap();
        let writes = sim.with_state(|s| s.phy.writes.clone());
        assert!(!writes.iter().any(|w| w.0 == 0x13));
    }

    #[test]
    fn negotiation_completes_on_second_attempt() {
        let sim = SimSmap::new();
        sim.with_state(|s| s.phy.negotiation_completes_on = Some(2));
        let (mut device, _) = device(&sim);
        assert!(device.negotiate_link().is_ok());
        assert_eq!(sim.with_state(|s| s.phy.negotiations), 2);
    }

    #[test]
    fn negotiation_never_completes() {
        let sim = SimSmap::new();
        sim.with_state(|s| s.phy.negotiation_completes_on = None);
        let (mut device, _) = device(&sim);
        assert_eq!(
            device.negotiate_link(),
            Err(Error::NegotiationFailed { attempts: 3 })
        );
        assert_eq!(sim.with_state(|s| s.phy.negotiations), 3);
        assert_eq!(device.link(), None);
    }

    #[test]
    fn link_never_comes_up() {
        let sim = SimSmap::new();
        sim.with_state(|s| s.phy.link_after_reads = None);
        let (mut device, _) = device(&sim);
        assert_eq!(
            device.negotiate_link(),
            Err(Error::NegotiationFailed { attempts: 3 })
        );
    }

    #[test]
    fn link_within_poll_limit() {
        let sim = SimSmap::new();
        sim.with_state(|s| s.phy.link_after_reads = Some(15));
        let (mut device, _) = device(&sim);
        assert!(device.negotiate_link().is_ok());
        assert_eq!(sim.with_state(|s| s.phy.negotiations), 1);
    }

    #[test]
    fn stuck_reset_times_out_after_nine_polls() {
        let sim = SimSmap::new();
        sim.with_state(|s| s.phy.reset_stuck = true);
        let (mut device, _) = device(&sim);
        sim.with_state(|s| s.phy.bmcr_reads = 0);
        assert_eq!(
            device.negotiate_link(),
            Err(Error::HardwareTimeout(TimeoutCause::PhyReset))
        );
        assert_eq!(sim.with_state(|s| s.phy.bmcr_reads), 9);
    }

    #[test]
    fn link_check_reads_status_twice() {
        let sim = SimSmap::new();
        let (mut device, _) = device(&sim);
        device.negotiate_link().unwrap();
        assert!(device.check_link().unwrap());
        sim.with_state(|s| s.phy.link_up = false);
        assert!(!device.check_link().unwrap());
    }
}
