//! Transmit path: copies queued frames into the TX FIFO and posts their descriptors.
use embedded_hal::delay::DelayNs;
use smap::{TX_FIFO_BASE, TX_FIFO_SIZE, align_word, emac3::TxMode0, speed::InterruptCause};

use crate::{
    MAX_TX_FRAME_LEN,
    device::SmapDevice,
    dma,
    ll::Registers,
    packet::{PacketAllocator, PacketBuffer},
    platform::{DmaBuffer, DmaEngine, EventFlags},
    shared::Shared,
};

impl<R: Registers, D: DmaEngine, L: DelayNs, A: PacketAllocator> SmapDevice<R, D, L, A> {
    /// Post as many queued frames as the descriptor ring and the FIFO budget allow.
    ///
    /// A frame which does not fit right now stays pending and is sent first on the next call.
    /// Returns the number of posted frames.
    pub fn transmit<F: EventFlags>(&mut self, shared: &Shared<F>) -> usize {
        let mut sent = 0;
        loop {
            let Some(packet) = self.pending.take().or_else(|| shared.tx_queue.dequeue_one())
            else {
                break;
            };
            let len = packet.len();
            if len == 0 || len > MAX_TX_FRAME_LEN {
                log::warn!("dropping TX frame with invalid length {len}");
                continue;
            }
            if self.tx_ring.check_capacity(len).is_err() {
                self.tx_ring.reclaim_transmit(&mut self.regs);
                if let Err(e) = self.tx_ring.check_capacity(len) {
                    log::debug!("TX frame of {len} bytes deferred: {e}");
                    self.pending = Some(packet);
                    break;
                }
            }
            let ptr = TX_FIFO_BASE + self.tx_write_offset as u16;
            self.regs.write_tx_wr_ptr(ptr);
            self.write_frame(&packet);
            self.regs.tx_frame_inc();
            match self.tx_ring.post_transmit(&mut self.regs, len as u16, ptr) {
                Ok(idx) => log::trace!("posted frame of {len} bytes on descriptor {idx}"),
                Err(e) => {
                    log::error!("posting TX descriptor failed: {e}");
                    self.pending = Some(packet);
                    break;
                }
            }
            self.tx_write_offset = (self.tx_write_offset + align_word(len)) % TX_FIFO_SIZE;
            sent += 1;
        }
        sent
    }

    /// Copy a frame into the TX FIFO at the current write pointer.
    ///
    /// Bytes which do not fill a whole word at the end of a segment are carried over into the
    /// next segment. DMA is only used while no bytes are carried.
    fn write_frame(&mut self, packet: &PacketBuffer) {
        let mut carry = [0u8; 4];
        let mut carry_len = 0;
        for segment in packet.segments() {
            let mut data = segment.as_slice();
            if carry_len > 0 {
                let take = (4 - carry_len).min(data.len());
                carry[carry_len..carry_len + take].copy_from_slice(&data[..take]);
                carry_len += take;
                data = &data[take..];
                if carry_len < 4 {
                    continue;
                }
                self.regs.write_tx_data(u32::from_le_bytes(carry));
                carry_len = 0;
            }
            let moved = dma::transfer(&mut self.regs, &mut self.dma, DmaBuffer::Out(data));
            let mut words = data[moved..].chunks_exact(4);
            for word in &mut words {
                self.regs
                    .write_tx_data(u32::from_le_bytes([word[0], word[1], word[2], word[3]]));
            }
            let rest = words.remainder();
            carry[..rest.len()].copy_from_slice(rest);
            carry_len = rest.len();
        }
        if carry_len > 0 {
            carry[carry_len..].fill(0);
            self.regs.write_tx_data(u32::from_le_bytes(carry));
        }
    }

    /// Transmit, reclaim and re-arm the interrupts. While frames are in flight the MAC is told
    /// to fetch new descriptors.
    pub fn tx_event<F: EventFlags>(&mut self, shared: &Shared<F>) -> usize {
        let sent = self.transmit(shared);
        self.tx_ring.reclaim_transmit(&mut self.regs);
        if self.tx_ring.used() > 0 {
            self.regs
                .write_tx_mode0(TxMode0::DEFAULT.with_gnp_0(true));
        }
        self.rearm_interrupts();
        sent
    }

    /// Unmask the handled causes. Transmit done stays enabled while frames are in flight.
    pub fn rearm_interrupts(&mut self) {
        self.regs.enable_interrupts(InterruptCause::HANDLED);
        if self.tx_ring.used() > 0 {
            self.regs.enable_interrupts(InterruptCause::TX_DONE);
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::{sync::Arc, vec, vec::Vec};

    use smap::BD_COUNT;

    use super::*;
    use crate::{
        config::DriverConfig,
        packet::{HeapAllocator, Packet},
        sim::{SimDelay, SimSmap, StdEventFlags},
    };

    type TestDevice = SmapDevice<SimSmap, SimSmap, SimDelay, HeapAllocator>;

    fn setup() -> (SimSmap, TestDevice, Shared<StdEventFlags>) {
        let sim = SimSmap::new();
        let mut device = sim.device(DriverConfig::default());
        device.reset().unwrap();
        let shared = Shared::new(StdEventFlags::new(), StdEventFlags::new(), 256);
        (sim, device, shared)
    }

    fn packet(len: usize, seed: u8) -> Packet {
        let data: Vec<u8> = (0..len).map(|i| (i as u8) ^ seed).collect();
        Arc::new(PacketBuffer::from_slice(&data))
    }

    #[test]
    fn single_frame() {
        let (sim, mut device, shared) = setup();
        let frame = packet(300, 0x5A);
        shared.tx_queue.enqueue(&frame);
        assert_eq!(device.transmit(&shared), 1);
        assert_eq!(Arc::strong_count(&frame), 1);
        assert!(shared.tx_queue.is_empty());
        assert_eq!(device.tx_ring().used(), 1);
        assert_eq!(sim.with_state(|s| s.tx_frame_count), 1);
        assert_eq!(sim.complete_tx(1), 1);
        assert_eq!(sim.take_transmitted(), vec![frame.to_vec()]);
        // 256 bytes by DMA, 44 bytes by register writes.
        assert_eq!(sim.with_state(|s| s.tx_dma_blocks), 2);
    }

    #[test]
    fn segments_with_partial_words() {
        let (sim, mut device, shared) = setup();
        let segments: Vec<Vec<u8>> = vec![
            (0..3).collect(),
            (3..133).collect(),
            vec![133],
            (134..=255).chain(0..100).collect(),
        ];
        let frame = Arc::new(PacketBuffer::new(segments));
        let expected = frame.to_vec();
        shared.tx_queue.enqueue(&frame);
        assert_eq!(device.transmit(&shared), 1);
        sim.complete_tx(1);
        assert_eq!(sim.take_transmitted(), vec![expected]);
    }

    #[test]
    fn invalid_frames_are_released() {
        let (_sim, mut device, shared) = setup();
        let oversized = packet(MAX_TX_FRAME_LEN + 1, 0);
        let empty = Arc::new(PacketBuffer::default());
        shared.tx_queue.enqueue(&oversized);
        shared.tx_queue.enqueue(&empty);
        assert_eq!(device.transmit(&shared), 0);
        assert_eq!(Arc::strong_count(&oversized), 1);
        assert_eq!(Arc::strong_count(&empty), 1);
        assert!(!device.has_pending_tx());
        assert_eq!(device.tx_ring().used(), 0);
    }

    #[test]
    fn full_ring_defers_and_resumes() {
        let (sim, mut device, shared) = setup();
        let frames: Vec<Packet> = (0..=BD_COUNT).map(|i| packet(16, i as u8)).collect();
        for frame in &frames {
            shared.tx_queue.enqueue(frame);
        }
        assert_eq!(device.transmit(&shared), BD_COUNT);
        assert!(device.has_pending_tx());
        assert!(shared.tx_queue.is_empty());
        // The deferred frame keeps its queue reference.
        assert_eq!(Arc::strong_count(&frames[BD_COUNT]), 2);
        assert_eq!(device.transmit(&shared), 0);
        assert!(device.has_pending_tx());

        sim.complete_tx(1);
        assert_eq!(device.transmit(&shared), 1);
        assert!(!device.has_pending_tx());
        assert_eq!(Arc::strong_count(&frames[BD_COUNT]), 1);
        sim.complete_tx(BD_COUNT);
        let sent = sim.take_transmitted();
        let expected: Vec<Vec<u8>> = frames.iter().map(|f| f.to_vec()).collect();
        assert_eq!(sent, expected);
    }

    #[test]
    fn fifo_budget_defers() {
        let (sim, mut device, shared) = setup();
        let frames: Vec<Packet> = (0..3).map(|i| packet(1514, i)).collect();
        for frame in &frames {
            shared.tx_queue.enqueue(frame);
        }
        assert_eq!(device.transmit(&shared), 2);
        assert!(device.has_pending_tx());
        assert_eq!(device.tx_ring().free_bytes(), TX_FIFO_SIZE - 2 * 1516);
        sim.complete_tx(1);
        assert_eq!(device.transmit(&shared), 1);
        sim.complete_tx(2);
        let expected: Vec<Vec<u8>> = frames.iter().map(|f| f.to_vec()).collect();
        assert_eq!(sim.take_transmitted(), expected);
    }

    #[test]
    fn order_is_kept_across_calls_and_fifo_wrap() {
        let (sim, mut device, shared) = setup();
        let mut expected = Vec::new();
        let mut seed = 0u8;
        for round in 0..20 {
            for _ in 0..3 {
                let frame = packet(200 + round * 37, seed);
                seed = seed.wrapping_add(1);
                expected.push(frame.to_vec());
                shared.tx_queue.enqueue(&frame);
            }
            device.transmit(&shared);
            sim.complete_tx(2);
        }
        while device.has_pending_tx() || !shared.tx_queue.is_empty() {
            device.transmit(&shared);
            sim.complete_tx(BD_COUNT);
        }
        sim.complete_tx(BD_COUNT);
        assert_eq!(sim.take_transmitted(), expected);
    }

    #[test]
    fn tx_event_requests_transmission() {
        let (sim, mut device, shared) = setup();
        shared.tx_queue.enqueue(&packet(60, 1));
        assert_eq!(device.tx_event(&shared), 1);
        let mask = device.regs_mut().intr_mask();
        assert!(mask.emac3());
        assert!(mask.rx_end());
        assert!(mask.rx_descr_not_valid());
        assert!(mask.tx_descr_not_valid());
        assert_eq!(sim.with_state(|s| s.tx_kicks), 1);

        sim.complete_tx(1);
        device.regs_mut().disable_interrupts(InterruptCause::TX_DONE);
        assert_eq!(device.tx_event(&shared), 0);
        assert_eq!(device.tx_ring().used(), 0);
        assert!(!device.regs_mut().intr_mask().tx_descr_not_valid());
        assert_eq!(sim.with_state(|s| s.tx_kicks), 1);
    }

    #[test]
    fn rearm_keeps_tx_done_while_in_flight() {
        let (sim, mut device, shared) = setup();
        shared.tx_queue.enqueue(&packet(60, 2));
        device.tx_event(&shared);
        device.regs_mut().disable_interrupts(InterruptCause::ALL);
        device.rearm_interrupts();
        assert!(device.regs_mut().intr_mask().tx_descr_not_valid());

        sim.complete_tx(1);
        device.tx_ring.reclaim_transmit(&mut device.regs);
        device.regs_mut().disable_interrupts(InterruptCause::ALL);
        device.rearm_interrupts();
        assert_eq!(device.regs_mut().intr_mask(), InterruptCause::HANDLED);
    }
}
