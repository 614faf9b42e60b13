//! Buffer descriptor ring bookkeeping.
//!
//! The producer and consumer cursors are free running counters. The descriptor index is the
//! cursor modulo [BD_COUNT] and the number of in-flight descriptors is their difference.
use smap::{
    BD_COUNT, TX_FIFO_SIZE, align_word,
    bd::{BufferDescriptor, RxBdStatus, TxBdControl},
};

use crate::{error::Error, ll::Registers};

pub struct TxRing {
    /// Next descriptor to post.
    producer: u32,
    /// Oldest descriptor which was not reclaimed yet.
    consumer: u32,
    used: usize,
    /// Free bytes in the TX FIFO.
    free_bytes: usize,
}

impl core::fmt::Debug for TxRing {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TxRing")
            .field("producer", &self.producer_idx())
            .field("consumer", &self.consumer_idx())
            .field("used", &self.used)
            .field("free_bytes", &self.free_bytes)
            .finish()
    }
}

impl TxRing {
    pub const fn new() -> Self {
        Self {
            producer: 0,
            consumer: 0,
            used: 0,
            free_bytes: TX_FIFO_SIZE,
        }
    }

    /// Clear all TX descriptors and restore the full FIFO budget.
    pub fn reset<R: Registers>(&mut self, regs: &mut R) {
        for idx in 0..BD_COUNT {
            regs.write_tx_bd(idx, BufferDescriptor::ZERO);
        }
        *self = Self::new();
    }

    #[inline]
    pub const fn used(&self) -> usize {
        self.used
    }

    #[inline]
    pub const fn is_full(&self) -> bool {
        self.used == BD_COUNT
    }

    #[inline]
    pub const fn free_bytes(&self) -> usize {
        self.free_bytes
    }

    #[inline]
    pub const fn producer_idx(&self) -> usize {
        self.producer as usize % BD_COUNT
    }

    #[inline]
    pub const fn consumer_idx(&self) -> usize {
        self.consumer as usize % BD_COUNT
    }

    /// Check whether a frame of `len` bytes can be posted right now.
    pub const fn check_capacity(&self, len: usize) -> Result<(), Error> {
        if self.is_full() {
            return Err(Error::RingFull);
        }
        let needed = align_word(len);
        if needed > self.free_bytes {
            return Err(Error::InsufficientFifoBudget {
                needed,
                free: self.free_bytes,
            });
        }
        Ok(())
    }

    /// Hand the next descriptor to the hardware and charge the frame to the FIFO budget.
    ///
    /// Returns the descriptor index.
    pub fn post_transmit<R: Registers>(
        &mut self,
        regs: &mut R,
        length: u16,
        pointer: u16,
    ) -> Result<usize, Error> {
        self.check_capacity(length as usize)?;
        let idx = self.producer_idx();
        regs.write_tx_bd(
            idx,
            BufferDescriptor::new(TxBdControl::POST.raw_value(), length, pointer),
        );
        self.producer = self.producer.wrapping_add(1);
        self.used += 1;
        self.free_bytes -= align_word(length as usize);
        Ok(idx)
    }

    /// Reclaim the descriptors the hardware is done with, oldest first.
    ///
    /// Stops at the first descriptor still owned by the hardware. Returns the number of
    /// reclaimed descriptors.
    pub fn reclaim_transmit<R: Registers>(&mut self, regs: &mut R) -> usize {
        let mut count = 0;
        while self.used > 0 {
            let idx = self.consumer_idx();
            let bd = regs.read_tx_bd(idx);
            let status = bd.tx_status();
            if status.ready() {
                break;
            }
            if status.has_error() {
                log::warn!("TX error on descriptor {idx}: {status:?}");
            }
            self.free_bytes += align_word(bd.length as usize);
            regs.write_tx_bd(idx, BufferDescriptor::ZERO);
            self.consumer = self.consumer.wrapping_add(1);
            self.used -= 1;
            count += 1;
        }
        count
    }
}

impl Default for TxRing {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct RxRing {
    cursor: u32,
}

impl RxRing {
    pub const fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Hand all RX descriptors to the hardware.
    pub fn reset<R: Registers>(&mut self, regs: &mut R) {
        for idx in 0..BD_COUNT {
            regs.write_rx_bd(
                idx,
                BufferDescriptor::new(RxBdStatus::EMPTY.raw_value(), 0, 0),
            );
        }
        self.cursor = 0;
    }

    #[inline]
    pub const fn current(&self) -> usize {
        self.cursor as usize % BD_COUNT
    }

    #[inline]
    pub fn advance(&mut self) {
        self.cursor = self.cursor.wrapping_add(1);
    }
}

impl Default for RxRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimSmap;

    #[test]
    fn reset_marks_rx_empty_and_clears_tx() {
        let mut sim = SimSmap::new();
        sim.with_state(|s| {
            s.tx_bd[3] = BufferDescriptor::new(0x8300, 60, 0x1000);
        });
        let mut tx = TxRing::new();
        let mut rx = RxRing::new();
        tx.reset(&mut sim);
        rx.reset(&mut sim);
        assert_eq!(sim.read_tx_bd(3), BufferDescriptor::ZERO);
        for idx in 0..BD_COUNT {
            assert!(sim.read_rx_bd(idx).rx_status().empty());
        }
        assert_eq!(tx.free_bytes(), TX_FIFO_SIZE);
        assert_eq!(rx.current(), 0);
    }

    #[test]
    fn post_until_full() {
        let mut sim = SimSmap::new();
        let mut ring = TxRing::new();
        for i in 0..BD_COUNT {
            assert_eq!(ring.post_transmit(&mut sim, 60, 0x1000).unwrap(), i);
        }
        assert!(ring.is_full());
        assert_eq!(
            ring.post_transmit(&mut sim, 60, 0x1000),
            Err(Error::RingFull)
        );
        assert_eq!(ring.used(), BD_COUNT);
        assert_eq!(ring.free_bytes(), TX_FIFO_SIZE - BD_COUNT * 60);
        let bd = sim.read_tx_bd(5);
        assert_eq!(bd.ctrl_stat, TxBdControl::POST.raw_value());
        assert_eq!(bd.length, 60);
    }

    #[test]
    fn fifo_budget_limits_posting() {
        let mut sim = SimSmap::new();
        let mut ring = TxRing::new();
        ring.post_transmit(&mut sim, 1514, 0x1000).unwrap();
        ring.post_transmit(&mut sim, 1514, 0x1000).unwrap();
        assert_eq!(
            ring.post_transmit(&mut sim, 1514, 0x1000),
            Err(Error::InsufficientFifoBudget {
                needed: 1516,
                free: TX_FIFO_SIZE - 2 * 1516
            })
        );
        assert_eq!(ring.used(), 2);
    }

    #[test]
    fn reclaim_stops_at_busy_descriptor() {
        let mut sim = SimSmap::new();
        let mut ring = TxRing::new();
        for _ in 0..5 {
            ring.post_transmit(&mut sim, 61, 0x1000).unwrap();
        }
        assert_eq!(ring.reclaim_transmit(&mut sim), 0);
        sim.complete_tx(3);
        assert_eq!(ring.reclaim_transmit(&mut sim), 3);
        assert_eq!(ring.used(), 2);
        assert_eq!(ring.consumer_idx(), 3);
        assert_eq!(ring.free_bytes(), TX_FIFO_SIZE - 2 * 64);
        assert_eq!(sim.read_tx_bd(0), BufferDescriptor::ZERO);
    }

    #[test]
    fn reclaim_with_tx_error_still_frees_slot() {
        let mut sim = SimSmap::new();
        let mut ring = TxRing::new();
        ring.post_transmit(&mut sim, 100, 0x1000).unwrap();
        sim.with_state(|s| s.tx_completion_status = 1 << 4);
        sim.complete_tx(1);
        assert_eq!(ring.reclaim_transmit(&mut sim), 1);
        assert_eq!(ring.used(), 0);
        assert_eq!(ring.free_bytes(), TX_FIFO_SIZE);
    }

    #[test]
    fn used_tracks_cursor_difference() {
        let mut sim = SimSmap::new();
        let mut ring = TxRing::new();
        // Deterministic pseudo random sequence of posts and completions.
        let mut seed: u32 = 0x1234_5678;
        let mut posted = 0u32;
        let mut reclaimed = 0u32;
        for _ in 0..2000 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            if (seed >> 16) % 3 != 0 {
                match ring.post_transmit(&mut sim, 16, 0x1000) {
                    Ok(idx) => {
                        assert_eq!(idx, posted as usize % BD_COUNT);
                        posted += 1;
                    }
                    Err(e) => {
                        assert_eq!(e, Error::RingFull);
                        assert_eq!(ring.used(), BD_COUNT);
                    }
                }
            } else {
                sim.complete_tx(((seed >> 8) % 8) as usize);
                reclaimed += ring.reclaim_transmit(&mut sim) as u32;
            }
            assert!(ring.used() <= BD_COUNT);
            assert_eq!(ring.used() as u32, posted - reclaimed);
            assert_eq!(ring.producer_idx(), posted as usize % BD_COUNT);
            assert_eq!(
                ring.free_bytes(),
                TX_FIFO_SIZE - ring.used() * 16,
                "budget out of sync"
            );
        }
    }

    #[test]
    fn partial_reclaim_then_next_post_index() {
        let mut sim = SimSmap::new();
        let mut ring = TxRing::new();
        for _ in 0..10 {
            ring.post_transmit(&mut sim, 32, 0x1000).unwrap();
        }
        sim.complete_tx(4);
        assert_eq!(ring.reclaim_transmit(&mut sim), 4);
        assert_eq!(ring.used(), 6);
        assert_eq!(ring.post_transmit(&mut sim, 32, 0x1000).unwrap(), 10);
    }
}
