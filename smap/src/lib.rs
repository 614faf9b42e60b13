//! # Register definitions for the SMAP Ethernet adapter
//!
//! The adapter consists of the SPEED bus interface core (revision, interrupt status and mask,
//! EEPROM pins), the SMAP core (FIFO control, buffer descriptor tables) and the EMAC3 MAC core
//! (mode, address, thresholds, PHY management). The PHY itself is only reachable through the
//! EMAC3 station management register, its registers are described in [phy].
//!
//! The block layouts in this crate are a logical map of the adapter. They preserve the register
//! set and the bit semantics, not the memory map of one specific board.
#![no_std]

pub mod bd;
pub mod emac3;
pub mod fifo;
pub mod phy;
pub mod speed;

/// Number of entries in each of the TX and RX buffer descriptor tables.
pub const BD_COUNT: usize = 64;

/// Size of the on-chip TX FIFO in bytes.
pub const TX_FIFO_SIZE: usize = 4096;
/// Device offset of the TX FIFO. Descriptor pointers are relative to the FIFO window.
pub const TX_FIFO_BASE: u16 = 0x1000;
/// Size of the on-chip RX FIFO in bytes.
pub const RX_FIFO_SIZE: usize = 16384;
/// Device offset of the RX FIFO.
pub const RX_FIFO_BASE: u16 = 0x4000;

/// Burst unit of the FIFO DMA channel.
pub const DMA_BLOCK_SIZE: usize = 128;

/// Round up a byte count to the 32-bit word size of the FIFO data registers.
#[inline]
pub const fn align_word(len: usize) -> usize {
    (len + 3) & !3
}
