//! Packet queues between the driver and the network stack.
//!
//! The queues are only mutated inside a [critical_section], which masks interrupts on the
//! target. Releasing packets can free memory, so [PacketQueue::drain_all] detaches the list
//! inside the critical section and drops the packets outside of it.
use core::cell::RefCell;

use alloc::{collections::VecDeque, sync::Arc};
use critical_section::Mutex;

use crate::packet::Packet;

pub struct PacketQueue {
    inner: Mutex<RefCell<VecDeque<Packet>>>,
}

impl PacketQueue {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Append a packet and take one reference to it.
    pub fn enqueue(&self, packet: &Packet) {
        self.push(Arc::clone(packet));
    }

    /// Append a packet, taking over the reference which is passed in.
    pub fn push(&self, packet: Packet) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).push_back(packet));
    }

    /// Append a batch of packets in one critical section.
    pub fn extend(&self, packets: impl IntoIterator<Item = Packet>) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).extend(packets));
    }

    pub fn dequeue_one(&self) -> Option<Packet> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).pop_front())
    }

    /// Release every queued packet. Returns the number of released packets.
    pub fn drain_all(&self) -> usize {
        let detached =
            critical_section::with(|cs| core::mem::take(&mut *self.inner.borrow_ref_mut(cs)));
        let count = detached.len();
        drop(detached);
        count
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for PacketQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PacketQueue")
            .field("len", &self.len())
            .finish()
    }
}
