//! # SPEED bus interface core.
//!
//! The SPEED core sits in front of the SMAP MAC. It reports the adapter revision, owns the
//! interrupt status and mask registers and drives the serial EEPROM which stores the MAC
//! address.

pub const SPEED_BASE_ADDR: usize = 0xB000_0000;

/// Interrupt causes. The same layout is used for the status, mask and clear registers.
#[bitbybit::bitfield(u16, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct InterruptCause {
    /// EMAC3 error interrupt. The detailed cause is in the EMAC3 interrupt status register.
    #[bit(6, rw)]
    emac3: bool,
    /// A frame was received and its descriptor completed.
    #[bit(5, rw)]
    rx_end: bool,
    /// A frame was transmitted.
    #[bit(4, rw)]
    tx_end: bool,
    /// The receiver found no empty descriptor.
    #[bit(3, rw)]
    rx_descr_not_valid: bool,
    /// The transmitter found no ready descriptor, which means everything posted has been sent.
    #[bit(2, rw)]
    tx_descr_not_valid: bool,
}

impl InterruptCause {
    /// All interrupt causes which belong to the SMAP core.
    pub const ALL: Self = Self::DEFAULT
        .with_emac3(true)
        .with_rx_end(true)
        .with_tx_end(true)
        .with_rx_descr_not_valid(true)
        .with_tx_descr_not_valid(true);

    /// Causes which are kept enabled while the driver is running.
    pub const HANDLED: Self = Self::DEFAULT
        .with_emac3(true)
        .with_rx_end(true)
        .with_rx_descr_not_valid(true);

    /// Only the transmit done cause.
    pub const TX_DONE: Self = Self::DEFAULT.with_tx_descr_not_valid(true);

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self::new_with_raw_value(self.raw_value() | other.raw_value())
    }

    #[inline]
    pub const fn without(self, other: Self) -> Self {
        Self::new_with_raw_value(self.raw_value() & !other.raw_value())
    }

    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.raw_value() & other.raw_value() != 0
    }
}

/// Capability register (REV_3).
#[bitbybit::bitfield(u16, debug)]
pub struct Capabilities {
    /// An SMAP MAC is attached to the SPEED core.
    #[bit(0, r)]
    smap: bool,
    #[bit(1, r)]
    ata: bool,
    #[bit(3, r)]
    uart: bool,
    #[bit(4, r)]
    dvr: bool,
    #[bit(5, r)]
    flash: bool,
}

/// Parallel I/O pins. The serial EEPROM is bit-banged through these.
#[bitbybit::bitfield(u16, default = 0x0, debug)]
pub struct PioBits {
    /// EEPROM chip select.
    #[bit(7, rw)]
    eeprom_cs: bool,
    /// EEPROM serial clock.
    #[bit(6, rw)]
    eeprom_clk: bool,
    /// Data from the host to the EEPROM.
    #[bit(5, rw)]
    eeprom_data_in: bool,
    /// Data from the EEPROM to the host.
    #[bit(4, rw)]
    eeprom_data_out: bool,
}

/// SPEED register block.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Speed {
    #[mmio(PureRead)]
    rev_1: u16,
    #[mmio(PureRead)]
    rev_2: u16,
    #[mmio(PureRead)]
    rev_3: Capabilities,
    _reserved0: u16,
    #[mmio(PureRead)]
    intr_stat: InterruptCause,
    intr_mask: InterruptCause,
    pio_dir: PioBits,
    pio_data: PioBits,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Speed>(), 0x10);

impl Speed {
    /// Create a new SPEED MMIO instance at the fixed base address.
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    #[inline]
    pub const unsafe fn new_mmio_fixed() -> MmioSpeed<'static> {
        unsafe { Self::new_mmio_at(SPEED_BASE_ADDR) }
    }
}
