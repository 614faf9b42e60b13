//! # SMAP core: FIFO control and descriptor mode registers.

pub const FIFO_BASE_ADDR: usize = 0xB000_1000;

/// FIFO control register, identical for the TX and RX side.
#[bitbybit::bitfield(u8, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct FifoCtrl {
    /// DMA enable. Cleared by the hardware once the programmed number of blocks was moved.
    #[bit(1, rw)]
    dma_enable: bool,
    /// FIFO reset. Self-clearing once the reset has completed.
    #[bit(0, rw)]
    reset: bool,
}

/// SMAP FIFO register block.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Fifo {
    tx_ctrl: FifoCtrl,
    _reserved0: u8,
    /// DMA transfer size in units of [crate::DMA_BLOCK_SIZE].
    tx_size: u16,
    tx_wr_ptr: u16,
    /// Any write increments the count of frames held by the TX FIFO.
    tx_frame_inc: u8,
    _reserved1: u8,
    rx_ctrl: FifoCtrl,
    _reserved2: u8,
    /// DMA transfer size in units of [crate::DMA_BLOCK_SIZE].
    rx_size: u16,
    rx_rd_ptr: u16,
    #[mmio(PureRead)]
    rx_frame_cnt: u8,
    /// Any write decrements the count of frames held by the RX FIFO.
    rx_frame_dec: u8,
    bd_mode: u8,
    _reserved3: u8,
    /// Write 1 to clear.
    intr_clear: crate::speed::InterruptCause,
    tx_data: u32,
    /// Reading pops one word from the RX FIFO.
    rx_data: u32,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Fifo>(), 0x1C);

impl Fifo {
    /// Create a new FIFO MMIO instance at the fixed base address.
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    #[inline]
    pub const unsafe fn new_mmio_fixed() -> MmioFifo<'static> {
        unsafe { Self::new_mmio_at(FIFO_BASE_ADDR) }
    }
}
