//! Bridge between the driver and the network stack.
//!
//! The bridge runs in its own thread. It initializes the stack's ARP layer once the device is
//! ready, delivers received frames by their Ethernet type and drives the periodic ARP timer.
use core::ops::ControlFlow;

use smoltcp::wire::{EthernetFrame, EthernetProtocol};

use crate::{
    config::BridgeConfig,
    packet::{Packet, PacketBuffer},
    platform::{EventFlags, PeriodicAlarm},
    shared::Shared,
};

/// Length of the Ethernet II header.
const ETHERNET_HEADER_LEN: usize = 14;

bitflags::bitflags! {
    /// Wake-up reasons of the bridge.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BridgeEvents: u32 {
        const DEVICE_READY = 0x01;
        const PACKET_RECEIVED = 0x02;
        const ARP_TIMER = 0x04;
        /// The dispatch loop has shut down.
        const EXIT = 0x08;
    }
}

/// Inbound interface of the network stack.
pub trait NetStack {
    fn arp_init(&mut self);
    fn ip_input(&mut self, packet: Packet);
    /// Handle an ARP frame. A returned frame is sent as the reply.
    fn arp_input(&mut self, packet: Packet) -> Option<Packet>;
    fn arp_tick(&mut self);
}

/// Callback of the periodic ARP alarm.
#[inline]
pub fn on_arp_timer<F: EventFlags>(events: &F) {
    events.set(BridgeEvents::ARP_TIMER.bits());
}

pub struct Bridge<'a, F, S, T> {
    shared: &'a Shared<F>,
    stack: S,
    alarm: T,
    config: BridgeConfig,
    ready: bool,
}

impl<'a, F: EventFlags, S: NetStack, T: PeriodicAlarm> Bridge<'a, F, S, T> {
    pub fn new(shared: &'a Shared<F>, stack: S, alarm: T, config: BridgeConfig) -> Self {
        Self {
            shared,
            stack,
            alarm,
            config,
            ready: false,
        }
    }

    #[inline]
    pub fn stack(&self) -> &S {
        &self.stack
    }

    #[inline]
    pub fn stack_mut(&mut self) -> &mut S {
        &mut self.stack
    }

    #[inline]
    pub fn alarm(&self) -> &T {
        &self.alarm
    }

    /// Wait for events and handle them until the dispatch loop has shut down.
    pub fn run(&mut self) {
        loop {
            let bits = self.shared.bridge_events.wait(BridgeEvents::all().bits());
            if self
                .step(BridgeEvents::from_bits_truncate(bits))
                .is_break()
            {
                break;
            }
        }
        log::debug!("bridge finished");
    }

    pub fn step(&mut self, events: BridgeEvents) -> ControlFlow<()> {
        if events.contains(BridgeEvents::DEVICE_READY) && !self.ready {
            self.ready = true;
            self.stack.arp_init();
            self.alarm.start(self.config.arp_period);
        }
        if events.contains(BridgeEvents::PACKET_RECEIVED) {
            self.deliver();
        }
        if events.contains(BridgeEvents::ARP_TIMER) {
            self.stack.arp_tick();
        }
        if events.contains(BridgeEvents::EXIT) {
            if self.ready {
                self.alarm.stop();
            }
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    /// Hand every queued frame to the stack. Returns the number of dequeued frames.
    fn deliver(&mut self) -> usize {
        let mut count = 0;
        while let Some(packet) = self.shared.rx_queue.dequeue_one() {
            count += 1;
            match ethertype(&packet) {
                Some(EthernetProtocol::Ipv4) => self.stack.ip_input(packet),
                Some(EthernetProtocol::Arp) => {
                    if let Some(reply) = self.stack.arp_input(packet) {
                        if self.shared.handle().transmit(&reply).is_err() {
                            log::debug!("ARP reply dropped, transmit queue unavailable");
                        }
                    }
                }
                Some(other) => log::trace!("dropping frame with ethertype {other:?}"),
                None => log::trace!("dropping runt frame of {} bytes", packet.len()),
            }
        }
        count
    }
}

fn ethertype(packet: &PacketBuffer) -> Option<EthernetProtocol> {
    let header = packet.header::<ETHERNET_HEADER_LEN>()?;
    let frame = EthernetFrame::new_checked(&header[..]).ok()?;
    Some(frame.ethertype())
}

#[cfg(test)]
mod tests {
    use alloc::{sync::Arc, vec::Vec};

    use super::*;
    use crate::sim::{SimAlarm, StdEventFlags};

    #[derive(Default)]
    struct RecordingStack {
        arp_init: usize,
        arp_ticks: usize,
        ip: Vec<Packet>,
        arp: Vec<Packet>,
        reply: Option<Packet>,
    }

    impl NetStack for RecordingStack {
        fn arp_init(&mut self) {
            self.arp_init += 1;
        }

        fn ip_input(&mut self, packet: Packet) {
            self.ip.push(packet);
        }

        fn arp_input(&mut self, packet: Packet) -> Option<Packet> {
            self.arp.push(packet);
            self.reply.clone()
        }

        fn arp_tick(&mut self) {
            self.arp_ticks += 1;
        }
    }

    fn frame(ethertype: u16, len: usize) -> Packet {
        let mut data = alloc::vec![0xFF; 6];
        data.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
        data.extend_from_slice(&ethertype.to_be_bytes());
        data.resize(len.max(data.len()), 0);
        data.truncate(len);
        Arc::new(PacketBuffer::from_slice_segmented(&data, 8))
    }

    fn bridge(
        shared: &Shared<StdEventFlags>,
    ) -> Bridge<'_, StdEventFlags, RecordingStack, SimAlarm> {
        Bridge::new(
            shared,
            RecordingStack::default(),
            SimAlarm::new(),
            BridgeConfig::default(),
        )
    }

    #[test]
    fn device_ready_initializes_arp_once() {
        let shared = Shared::new(StdEventFlags::new(), StdEventFlags::new(), 8);
        let mut bridge = bridge(&shared);
        assert!(bridge.step(BridgeEvents::DEVICE_READY).is_continue());
        assert!(bridge.step(BridgeEvents::DEVICE_READY).is_continue());
        assert_eq!(bridge.stack().arp_init, 1);
        assert_eq!(bridge.alarm().starts(), 1);
        assert_eq!(
            bridge.alarm().last_period(),
            Some(BridgeConfig::default().arp_period)
        );
        assert!(bridge.step(BridgeEvents::ARP_TIMER).is_continue());
        assert_eq!(bridge.stack().arp_ticks, 1);
    }

    #[test]
    fn frames_are_routed_by_ethertype() {
        let shared = Shared::new(StdEventFlags::new(), StdEventFlags::new(), 8);
        let mut bridge = bridge(&shared);
        let ip = frame(0x0800, 60);
        let arp = frame(0x0806, 60);
        let ipv6 = frame(0x86DD, 80);
        let runt = frame(0x0800, 10);
        for packet in [&ip, &arp, &ipv6, &runt] {
            shared.rx_queue().enqueue(packet);
        }
        assert!(bridge.step(BridgeEvents::PACKET_RECEIVED).is_continue());
        assert!(shared.rx_queue().is_empty());
        assert_eq!(bridge.stack().ip.len(), 1);
        assert!(Arc::ptr_eq(&bridge.stack().ip[0], &ip));
        assert_eq!(bridge.stack().arp.len(), 1);
        assert_eq!(Arc::strong_count(&ipv6), 1);
        assert_eq!(Arc::strong_count(&runt), 1);
        bridge.stack_mut().ip.clear();
        assert_eq!(Arc::strong_count(&ip), 1);
    }

    #[test]
    fn arp_reply_is_transmitted() {
        let shared = Shared::new(StdEventFlags::new(), StdEventFlags::new(), 8);
        let mut bridge = bridge(&shared);
        let reply = frame(0x0806, 42);
        bridge.stack_mut().reply = Some(reply.clone());

        // Without an initialized device the reply is dropped.
        shared.rx_queue().enqueue(&frame(0x0806, 60));
        assert!(bridge.step(BridgeEvents::PACKET_RECEIVED).is_continue());
        assert!(shared.tx_queue().is_empty());

        shared.set_initialized(true);
        shared.rx_queue().enqueue(&frame(0x0806, 60));
        assert!(bridge.step(BridgeEvents::PACKET_RECEIVED).is_continue());
        assert_eq!(shared.tx_queue().len(), 1);
        assert!(Arc::ptr_eq(&shared.tx_queue().dequeue_one().unwrap(), &reply));
    }

    #[test]
    fn exit_stops_the_alarm() {
        let shared = Shared::new(StdEventFlags::new(), StdEventFlags::new(), 8);
        let mut bridge = bridge(&shared);
        assert!(bridge.step(BridgeEvents::DEVICE_READY).is_continue());
        shared.signal_bridge(BridgeEvents::EXIT);
        bridge.run();
        assert_eq!(bridge.alarm().stops(), 1);
    }
}
