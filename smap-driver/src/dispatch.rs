//! The dispatch loop, which owns the device and serializes every access to it.
//!
//! The interrupt top half ([on_interrupt]) and the alarm callback ([on_alarm]) only set event
//! bits. Everything else runs in [EventLoop::step].
use core::ops::ControlFlow;

use embedded_hal::delay::DelayNs;
use smap::{
    emac3::{Emac3Interrupt, Emac3Reg},
    speed::InterruptCause,
};

use crate::{
    bridge::BridgeEvents,
    device::SmapDevice,
    error::Error,
    ll::Registers,
    packet::PacketAllocator,
    phy::LinkStatus,
    platform::{DmaEngine, EventFlags, PeriodicAlarm},
    shared::Shared,
};

bitflags::bitflags! {
    /// Wake-up reasons of the dispatch loop.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DispatchEvents: u32 {
        const INIT = 0x01;
        const EXIT = 0x02;
        const INTERRUPT = 0x04;
        const TRANSMIT_PENDING = 0x08;
        const ALARM = 0x10;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InterruptResult {
    pub frames_received: usize,
    /// The receiver ran out of empty descriptors.
    pub rx_descr_not_valid: bool,
    /// The transmitter found no ready descriptor, so everything posted has been sent.
    pub tx_descr_not_valid: bool,
    /// MAC error causes which were pending.
    pub mac_errors: Option<Emac3Interrupt>,
}

impl InterruptResult {
    #[inline]
    pub fn has_errors(&self) -> bool {
        self.mac_errors.is_some()
    }
}

/// Interrupt top half. Masks all adapter interrupt causes and wakes up the dispatch loop.
///
/// Returns the pending causes.
pub fn on_interrupt<R: Registers, F: EventFlags>(regs: &mut R, events: &F) -> InterruptCause {
    let causes = regs.intr_status();
    regs.disable_interrupts(InterruptCause::ALL);
    events.set(DispatchEvents::INTERRUPT.bits());
    causes
}

/// Callback of the periodic link check alarm.
#[inline]
pub fn on_alarm<F: EventFlags>(events: &F) {
    events.set(DispatchEvents::ALARM.bits());
}

pub struct EventLoop<'a, R, D, L, A, F, T> {
    device: SmapDevice<R, D, L, A>,
    shared: &'a Shared<F>,
    alarm: T,
    alarm_armed: bool,
}

impl<'a, R, D, L, A, F, T> EventLoop<'a, R, D, L, A, F, T>
where
    R: Registers,
    D: DmaEngine,
    L: DelayNs,
    A: PacketAllocator,
    F: EventFlags,
    T: PeriodicAlarm,
{
    /// The device is expected to be reset already.
    pub fn new(device: SmapDevice<R, D, L, A>, shared: &'a Shared<F>, alarm: T) -> Self {
        shared.set_mac_address(device.mac_address());
        Self {
            device,
            shared,
            alarm,
            alarm_armed: false,
        }
    }

    delegate::delegate! {
        to self.device {
            #[inline]
            pub fn mac_address(&self) -> [u8; 6];
            #[inline]
            pub fn is_initialized(&self) -> bool;
            #[inline]
            pub fn has_link(&self) -> bool;
            #[inline]
            pub fn link(&self) -> Option<LinkStatus>;
        }
    }

    #[inline]
    pub fn device(&self) -> &SmapDevice<R, D, L, A> {
        &self.device
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut SmapDevice<R, D, L, A> {
        &mut self.device
    }

    #[inline]
    pub fn alarm(&self) -> &T {
        &self.alarm
    }

    /// Wait for events and handle them until [DispatchEvents::EXIT] is received.
    pub fn run(&mut self) {
        loop {
            let bits = self.shared.events.wait(DispatchEvents::all().bits());
            if self
                .step(DispatchEvents::from_bits_truncate(bits))
                .is_break()
            {
                break;
            }
        }
        log::debug!("dispatch loop finished");
    }

    /// Handle one wake-up.
    pub fn step(&mut self, events: DispatchEvents) -> ControlFlow<()> {
        if events.contains(DispatchEvents::EXIT) {
            self.shutdown();
            return ControlFlow::Break(());
        }
        if events.contains(DispatchEvents::INIT) && !self.device.has_init {
            if let Err(e) = self.init() {
                log::error!("SMAP initialization failed: {e}");
                return ControlFlow::Continue(());
            }
        }
        if !self.device.has_init {
            return ControlFlow::Continue(());
        }

        let mut tx_requested = events.contains(DispatchEvents::TRANSMIT_PENDING);
        let mut frames_received = 0;
        if events.contains(DispatchEvents::INTERRUPT) {
            let result = self.handle_interrupt();
            if result.has_errors() {
                log::debug!("interrupt result: {result:?}");
            }
            frames_received = result.frames_received;
            tx_requested |= result.tx_descr_not_valid;
        }
        if tx_requested {
            self.device.tx_event(self.shared);
        } else {
            self.device.rearm_interrupts();
        }

        if frames_received > 0 {
            self.device.link_retry = self.device.config.link_check_retries;
        } else if events.contains(DispatchEvents::ALARM) {
            self.link_check();
        }
        ControlFlow::Continue(())
    }

    fn init(&mut self) -> Result<(), Error> {
        self.device
            .regs
            .enable_interrupts(InterruptCause::HANDLED);
        self.device.negotiate_link()?;
        self.device.set_mac_enable(true);
        self.device.has_init = true;
        self.device.has_link = true;
        self.device.link_retry = self.device.config.link_check_retries;
        self.shared.set_initialized(true);
        self.shared.set_link_up(true);
        self.shared.signal_bridge(BridgeEvents::DEVICE_READY);
        if !self.alarm_armed {
            self.alarm.start(self.device.config.link_check_period);
            self.alarm_armed = true;
        }
        log::info!("SMAP initialized");
        Ok(())
    }

    fn shutdown(&mut self) {
        self.device
            .regs
            .disable_interrupts(InterruptCause::ALL);
        self.device.set_mac_enable(false);
        self.device.has_init = false;
        self.device.has_link = false;
        self.shared.set_initialized(false);
        self.shared.set_link_up(false);
        if self.alarm_armed {
            self.alarm.stop();
            self.alarm_armed = false;
        }
        let pending = usize::from(self.device.pending.take().is_some());
        let tx = self.shared.tx_queue.drain_all();
        let rx = self.shared.rx_queue.drain_all();
        log::info!(
            "SMAP stopped, released {} TX and {rx} RX packets",
            tx + pending
        );
        self.shared.signal_bridge(BridgeEvents::EXIT);
    }

    /// Each cause is acknowledged once, right before it is handled.
    fn handle_interrupt(&mut self) -> InterruptResult {
        let mut result = InterruptResult::default();
        let causes = self.device.regs.intr_status();

        if causes.emac3() {
            let regs = &mut self.device.regs;
            let errors = regs.emac3_intr_status();
            regs.clear_interrupts(InterruptCause::DEFAULT.with_emac3(true));
            regs.clear_emac3_interrupts(Emac3Interrupt::TX_ERRORS);
            regs.write_emac3(Emac3Reg::IntrEnable, Emac3Interrupt::TX_ERRORS.raw_value());
            log::warn!("EMAC3 error interrupt: {errors:?}");
            result.mac_errors = Some(errors);
        }
        if causes.rx_end() {
            self.device
                .regs
                .clear_interrupts(InterruptCause::DEFAULT.with_rx_end(true));
            result.frames_received = self.device.receive(self.shared);
        }
        if causes.rx_descr_not_valid() {
            self.device
                .regs
                .clear_interrupts(InterruptCause::DEFAULT.with_rx_descr_not_valid(true));
            result.rx_descr_not_valid = true;
        }
        if causes.tx_descr_not_valid() {
            let regs = &mut self.device.regs;
            regs.clear_interrupts(InterruptCause::TX_DONE);
            regs.disable_interrupts(InterruptCause::TX_DONE);
            self.device.tx_ring.reclaim_transmit(&mut self.device.regs);
            result.tx_descr_not_valid = true;
        }
        result
    }

    /// Read the link state once every `link_check_retries` alarm periods.
    fn link_check(&mut self) {
        self.device.link_retry = self.device.link_retry.saturating_sub(1);
        if self.device.link_retry > 0 {
            return;
        }
        self.device.link_retry = self.device.config.link_check_retries;
        match self.device.check_link() {
            Ok(up) if up != self.device.has_link => {
                if up {
                    log::info!("link is up again");
                } else {
                    log::warn!("link is down");
                }
                self.device.has_link = up;
                self.shared.set_link_up(up);
            }
            Ok(_) => (),
            Err(e) => log::error!("link check failed: {e}"),
        }
    }
}
