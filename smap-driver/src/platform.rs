//! Services the driver expects from the platform.
//!
//! Delays use [embedded_hal::delay::DelayNs] and the interrupt-masked critical section is the
//! [critical_section] crate. Everything else is declared here.
use fugit::MicrosDurationU32;

pub use crate::error::DmaError;

/// Event flag set. A thread blocks until any of the requested bits is set.
pub trait EventFlags {
    /// Set bits. Must be callable from interrupt context.
    fn set(&self, bits: u32);

    /// Block until any bit of `mask` is set. Returns the matched bits and clears them.
    fn wait(&self, mask: u32) -> u32;
}

impl<T: EventFlags + ?Sized> EventFlags for &T {
    #[inline]
    fn set(&self, bits: u32) {
        (**self).set(bits)
    }

    #[inline]
    fn wait(&self, mask: u32) -> u32 {
        (**self).wait(mask)
    }
}

/// Periodic alarm. The platform sets the associated event bit on every expiry.
pub trait PeriodicAlarm {
    fn start(&mut self, period: MicrosDurationU32);
    fn stop(&mut self);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    /// Device FIFO to memory.
    In,
    /// Memory to device FIFO.
    Out,
}

#[derive(Debug)]
pub enum DmaBuffer<'a> {
    In(&'a mut [u8]),
    Out(&'a [u8]),
}

impl DmaBuffer<'_> {
    #[inline]
    pub fn direction(&self) -> Direction {
        match self {
            DmaBuffer::In(_) => Direction::In,
            DmaBuffer::Out(_) => Direction::Out,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            DmaBuffer::In(buf) => buf.len(),
            DmaBuffer::Out(buf) => buf.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Block DMA channel between memory and the adapter FIFO.
pub trait DmaEngine {
    /// Move `blocks` blocks of `block_size` bytes. The buffer is exactly that long. On success
    /// the adapter clears its DMA enable bit once the last block was moved.
    fn transfer(
        &mut self,
        buf: DmaBuffer<'_>,
        block_size: usize,
        blocks: usize,
    ) -> Result<(), DmaError>;
}
