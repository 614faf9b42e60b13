//! State shared between the dispatch loop, the bridge, the interrupt top half and the network
//! stack.
use core::{
    cell::Cell,
    sync::atomic::{AtomicBool, Ordering},
};

use critical_section::Mutex;

use crate::{
    bridge::BridgeEvents,
    dispatch::DispatchEvents,
    error::WouldBlock,
    packet::Packet,
    platform::EventFlags,
    queue::PacketQueue,
};

pub struct Shared<F> {
    /// Wake-up flags of the dispatch loop.
    pub(crate) events: F,
    /// Wake-up flags of the bridge.
    pub(crate) bridge_events: F,
    pub(crate) tx_queue: PacketQueue,
    pub(crate) rx_queue: PacketQueue,
    link_up: AtomicBool,
    initialized: AtomicBool,
    mac_address: Mutex<Cell<[u8; 6]>>,
    tx_queue_limit: usize,
}

impl<F: EventFlags> Shared<F> {
    pub const fn new(events: F, bridge_events: F, tx_queue_limit: usize) -> Self {
        Self {
            events,
            bridge_events,
            tx_queue: PacketQueue::new(),
            rx_queue: PacketQueue::new(),
            link_up: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            mac_address: Mutex::new(Cell::new([0; 6])),
            tx_queue_limit,
        }
    }

    #[inline]
    pub fn events(&self) -> &F {
        &self.events
    }

    #[inline]
    pub fn bridge_events(&self) -> &F {
        &self.bridge_events
    }

    #[inline]
    pub fn tx_queue(&self) -> &PacketQueue {
        &self.tx_queue
    }

    #[inline]
    pub fn rx_queue(&self) -> &PacketQueue {
        &self.rx_queue
    }

    #[inline]
    pub fn signal(&self, events: DispatchEvents) {
        self.events.set(events.bits());
    }

    #[inline]
    pub(crate) fn signal_bridge(&self, events: BridgeEvents) {
        self.bridge_events.set(events.bits());
    }

    #[inline]
    pub fn link_up(&self) -> bool {
        self.link_up.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_link_up(&self, up: bool) {
        self.link_up.store(up, Ordering::Release);
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_initialized(&self, init: bool) {
        self.initialized.store(init, Ordering::Release);
    }

    pub fn mac_address(&self) -> [u8; 6] {
        critical_section::with(|cs| self.mac_address.borrow(cs).get())
    }

    pub(crate) fn set_mac_address(&self, mac: [u8; 6]) {
        critical_section::with(|cs| self.mac_address.borrow(cs).set(mac));
    }

    /// Handle for the network stack side.
    #[inline]
    pub fn handle(&self) -> SmapHandle<'_, F> {
        SmapHandle { shared: self }
    }
}

/// Interface of the network stack towards the driver.
pub struct SmapHandle<'a, F> {
    shared: &'a Shared<F>,
}

impl<F> Clone for SmapHandle<'_, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F> Copy for SmapHandle<'_, F> {}

impl<F: EventFlags> SmapHandle<'_, F> {
    /// Request device initialization and link negotiation.
    pub fn start(&self) {
        self.shared.signal(DispatchEvents::INIT);
    }

    /// Request shutdown of the dispatch loop.
    pub fn stop(&self) {
        self.shared.signal(DispatchEvents::EXIT);
    }

    /// Queue a frame for transmission. The queue takes its own reference.
    pub fn transmit(&self, packet: &Packet) -> Result<(), WouldBlock> {
        if !self.shared.is_initialized() || self.shared.tx_queue.len() >= self.shared.tx_queue_limit
        {
            return Err(WouldBlock);
        }
        self.shared.tx_queue.enqueue(packet);
        self.shared.signal(DispatchEvents::TRANSMIT_PENDING);
        Ok(())
    }

    #[inline]
    pub fn link_up(&self) -> bool {
        self.shared.link_up()
    }

    #[inline]
    pub fn mac_address(&self) -> [u8; 6] {
        self.shared.mac_address()
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::*;
    use crate::{packet::PacketBuffer, sim::StdEventFlags};

    #[test]
    fn transmit_requires_initialization() {
        let shared = Shared::new(StdEventFlags::new(), StdEventFlags::new(), 2);
        let handle = shared.handle();
        let packet = Arc::new(PacketBuffer::from_slice(&[0; 60]));
        assert_eq!(handle.transmit(&packet), Err(WouldBlock));
        assert_eq!(Arc::strong_count(&packet), 1);
        assert_eq!(shared.events().pending(), 0);
    }

    #[test]
    fn transmit_respects_queue_limit() {
        let shared = Shared::new(StdEventFlags::new(), StdEventFlags::new(), 2);
        shared.set_initialized(true);
        let handle = shared.handle();
        let packet = Arc::new(PacketBuffer::from_slice(&[0; 60]));
        assert!(handle.transmit(&packet).is_ok());
        assert!(handle.transmit(&packet).is_ok());
        assert_eq!(handle.transmit(&packet), Err(WouldBlock));
        assert_eq!(Arc::strong_count(&packet), 3);
        assert_eq!(
            shared.events().pending(),
            DispatchEvents::TRANSMIT_PENDING.bits()
        );
    }

    #[test]
    fn start_and_stop() {
        let shared = Shared::new(StdEventFlags::new(), StdEventFlags::new(), 2);
        let handle = shared.handle();
        handle.start();
        handle.stop();
        assert_eq!(
            shared.events().pending(),
            (DispatchEvents::INIT | DispatchEvents::EXIT).bits()
        );
        shared.set_mac_address([1, 2, 3, 4, 5, 6]);
        assert_eq!(handle.mac_address(), [1, 2, 3, 4, 5, 6]);
        assert!(!handle.link_up());
    }
}
