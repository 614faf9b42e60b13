//! Receive path: drains completed RX descriptors into packet buffers.
use alloc::sync::Arc;

use embedded_hal::delay::DelayNs;
use smap::{
    BD_COUNT, align_word,
    bd::{BufferDescriptor, RxBdStatus},
};

use crate::{
    MAX_FRAME_LEN,
    bridge::BridgeEvents,
    device::SmapDevice,
    dma,
    error::Error,
    ll::Registers,
    packet::{Packet, PacketAllocator, PacketBuffer},
    platform::{DmaBuffer, DmaEngine, EventFlags},
    shared::Shared,
};

impl<R: Registers, D: DmaEngine, L: DelayNs, A: PacketAllocator> SmapDevice<R, D, L, A> {
    /// Move all received frames to the receive queue and wake up the bridge.
    ///
    /// Frames with error bits, invalid lengths or without a buffer are dropped. Returns the
    /// number of frames which were queued.
    pub fn receive<F: EventFlags>(&mut self, shared: &Shared<F>) -> usize {
        let mut received: heapless::Vec<Packet, BD_COUNT> = heapless::Vec::new();
        for _ in 0..BD_COUNT {
            let idx = self.rx_ring.current();
            let bd = self.regs.read_rx_bd(idx);
            let status = bd.rx_status();
            if status.empty() {
                break;
            }
            let len = bd.length as usize;
            if status.has_error() || len == 0 || len > MAX_FRAME_LEN {
                log::debug!("dropping RX frame on descriptor {idx}, length {len}: {status:?}");
                self.skip_frame(&bd);
            } else if let Some(mut buf) = self.allocator.alloc(align_word(len)) {
                self.read_frame(&mut buf, bd.pointer);
                buf.truncate(len);
                log::trace!("received frame of {len} bytes on descriptor {idx}");
                // At most BD_COUNT descriptors are visited.
                let _ = received.push(Arc::new(buf));
            } else {
                log::warn!("dropping RX frame of {len} bytes: {}", Error::AllocationFailure);
                self.skip_frame(&bd);
            }
            self.regs.rx_frame_dec();
            self.regs.write_rx_bd(
                idx,
                BufferDescriptor::new(RxBdStatus::EMPTY.raw_value(), 0, 0),
            );
            self.rx_ring.advance();
        }
        let count = received.len();
        if count > 0 {
            shared.rx_queue.extend(received);
            shared.signal_bridge(BridgeEvents::PACKET_RECEIVED);
        }
        count
    }

    #[inline]
    fn skip_frame(&mut self, bd: &BufferDescriptor) {
        self.regs.write_rx_rd_ptr(
            bd.pointer
                .wrapping_add(align_word(bd.length as usize) as u16),
        );
    }

    fn read_frame(&mut self, buf: &mut PacketBuffer, mut ptr: u16) {
        for segment in buf.segments_mut() {
            self.regs.write_rx_rd_ptr(ptr);
            let moved = dma::transfer(
                &mut self.regs,
                &mut self.dma,
                DmaBuffer::In(segment.as_mut_slice()),
            );
            for word in segment[moved..].chunks_mut(4) {
                let bytes = self.regs.read_rx_data().to_le_bytes();
                word.copy_from_slice(&bytes[..word.len()]);
            }
            ptr = ptr.wrapping_add(segment.len() as u16);
        }
    }
}
