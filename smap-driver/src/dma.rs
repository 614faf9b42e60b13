//! Block DMA between memory and the adapter FIFOs.
//!
//! Only whole [DMA_BLOCK_SIZE] blocks are moved by DMA. The caller copies the remainder through
//! the 32-bit FIFO data registers.
use smap::{DMA_BLOCK_SIZE, fifo::FifoCtrl};

use crate::{
    ll::Registers,
    platform::{DmaBuffer, DmaEngine},
};

/// Upper bound for polling the DMA enable bit after a transfer was started.
pub const DMA_POLL_LIMIT: u32 = 100_000;

/// Move the whole blocks of `buf` between memory and the FIFO selected by its direction.
///
/// Returns the number of bytes moved, which is 0 if the buffer is shorter than one block or
/// the transfer failed.
pub fn transfer<R: Registers, D: DmaEngine>(
    regs: &mut R,
    engine: &mut D,
    buf: DmaBuffer<'_>,
) -> usize {
    let dir = buf.direction();
    let blocks = buf.len() / DMA_BLOCK_SIZE;
    if blocks == 0 {
        return 0;
    }
    let size = blocks * DMA_BLOCK_SIZE;
    let buf = match buf {
        DmaBuffer::In(data) => DmaBuffer::In(&mut data[..size]),
        DmaBuffer::Out(data) => DmaBuffer::Out(&data[..size]),
    };
    regs.write_dma_size(dir, blocks as u16);
    regs.write_fifo_ctrl(dir, FifoCtrl::DEFAULT.with_dma_enable(true));
    if let Err(e) = engine.transfer(buf, DMA_BLOCK_SIZE, blocks) {
        log::debug!("{dir:?} DMA of {size} bytes failed: {e}");
        regs.write_fifo_ctrl(dir, FifoCtrl::DEFAULT);
        return 0;
    }
    for _ in 0..DMA_POLL_LIMIT {
        if !regs.fifo_ctrl(dir).dma_enable() {
            return size;
        }
    }
    log::error!("{dir:?} DMA of {size} bytes did not complete");
    regs.write_fifo_ctrl(dir, FifoCtrl::DEFAULT);
    0
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::sim::SimSmap;

    #[test]
    fn short_buffer_does_not_touch_hardware() {
        let mut sim = SimSmap::new();
        let mut dma = sim.clone();
        let data = [0u8; 127];
        assert_eq!(transfer(&mut sim, &mut dma, DmaBuffer::Out(&data)), 0);
        assert_eq!(sim.with_state(|s| s.dma_transfers), 0);
        assert!(!sim.tx_fifo_ctrl().dma_enable());
    }

    #[test]
    fn whole_blocks_only() {
        let mut sim = SimSmap::new();
        let mut dma = sim.clone();
        let data: alloc::vec::Vec<u8> = (0..300u32).map(|v| v as u8).collect();
        sim.write_tx_wr_ptr(smap::TX_FIFO_BASE);
        assert_eq!(transfer(&mut sim, &mut dma, DmaBuffer::Out(&data)), 256);
        sim.with_state(|s| {
            assert_eq!(s.dma_transfers, 1);
            assert_eq!(s.tx_dma_blocks, 2);
            assert_eq!(&s.tx_fifo[..256], &data[..256]);
        });
        assert!(!sim.tx_fifo_ctrl().dma_enable());
    }

    #[test]
    fn receive_direction() {
        let mut sim = SimSmap::new();
        let mut dma = sim.clone();
        let frame: alloc::vec::Vec<u8> = (0..200u32).map(|v| (v * 3) as u8).collect();
        assert!(sim.inject_frame(&frame));
        sim.write_rx_rd_ptr(smap::RX_FIFO_BASE);
        let mut buf = vec![0u8; 200];
        assert_eq!(transfer(&mut sim, &mut dma, DmaBuffer::In(&mut buf)), 128);
        assert_eq!(&buf[..128], &frame[..128]);
        assert_eq!(sim.with_state(|s| s.rx_dma_blocks), 1);
    }

    #[test]
    fn engine_failure_clears_dma_enable() {
        let mut sim = SimSmap::new();
        let mut dma = sim.clone();
        sim.with_state(|s| s.dma_fails = true);
        let data = [0u8; 512];
        assert_eq!(transfer(&mut sim, &mut dma, DmaBuffer::Out(&data)), 0);
        assert!(!sim.tx_fifo_ctrl().dma_enable());
    }

    #[test]
    fn stuck_dma_is_bounded() {
        let mut sim = SimSmap::new();
        let mut dma = sim.clone();
        sim.with_state(|s| s.dma_stuck = true);
        let mut buf = [0u8; 128];
        assert_eq!(transfer(&mut sim, &mut dma, DmaBuffer::In(&mut buf)), 0);
        assert!(!sim.rx_fifo_ctrl().dma_enable());
    }
}
