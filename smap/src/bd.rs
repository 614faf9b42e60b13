//! # Buffer descriptor definitions.
//!
//! The SMAP core holds two tables of [crate::BD_COUNT] descriptors, one for each direction.
//! Every descriptor is four 16-bit words: control/status, reserved, length and the FIFO offset
//! of the frame.

pub const TX_BD_BASE_ADDR: usize = 0xB000_3000;
pub const RX_BD_BASE_ADDR: usize = 0xB000_3200;

/// Control bits of a TX descriptor, written by software before handing it to the hardware.
#[bitbybit::bitfield(u16, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct TxBdControl {
    /// Descriptor is owned by the hardware.
    #[bit(15, rw)]
    ready: bool,
    /// Generate the frame check sequence.
    #[bit(9, rw)]
    gen_fcs: bool,
    /// Pad short frames.
    #[bit(8, rw)]
    gen_pad: bool,
    /// Insert the source address.
    #[bit(7, rw)]
    insert_sa: bool,
    /// Replace the source address.
    #[bit(6, rw)]
    replace_sa: bool,
    #[bit(5, rw)]
    insert_vlan: bool,
    #[bit(4, rw)]
    replace_vlan: bool,
}

impl TxBdControl {
    /// Control word for a frame posted by the driver.
    pub const POST: Self = Self::DEFAULT
        .with_ready(true)
        .with_gen_fcs(true)
        .with_gen_pad(true);
}

/// Status bits of a TX descriptor, reported by the hardware once the frame was sent.
#[bitbybit::bitfield(u16, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct TxBdStatus {
    #[bit(15, r)]
    ready: bool,
    #[bit(9, r)]
    bad_fcs: bool,
    #[bit(8, r)]
    bad_packet: bool,
    #[bit(7, r)]
    loss_of_carrier: bool,
    #[bit(6, r)]
    excessive_deferral: bool,
    #[bit(5, r)]
    excessive_collisions: bool,
    #[bit(4, r)]
    late_collision: bool,
    #[bit(3, r)]
    multiple_collisions: bool,
    #[bit(2, r)]
    single_collision: bool,
    #[bit(1, r)]
    underrun: bool,
    #[bit(0, r)]
    sqe: bool,
}

impl TxBdStatus {
    pub const ERROR_MASK: u16 = 0x03FF;

    #[inline]
    pub const fn has_error(&self) -> bool {
        self.raw_value() & Self::ERROR_MASK != 0
    }
}

/// Control and status bits of an RX descriptor.
#[bitbybit::bitfield(u16, default = 0x0, debug)]
#[derive(PartialEq, Eq)]
pub struct RxBdStatus {
    /// Descriptor is owned by the hardware and waits for a frame.
    #[bit(15, rw)]
    empty: bool,
    #[bit(9, r)]
    overrun: bool,
    #[bit(8, r)]
    pause_frame: bool,
    #[bit(7, r)]
    bad_frame: bool,
    #[bit(6, r)]
    runt_frame: bool,
    #[bit(5, r)]
    short_event: bool,
    #[bit(4, r)]
    alignment_error: bool,
    #[bit(3, r)]
    bad_fcs: bool,
    #[bit(2, r)]
    frame_too_long: bool,
    #[bit(1, r)]
    out_of_range: bool,
    #[bit(0, r)]
    in_range: bool,
}

impl RxBdStatus {
    pub const ERROR_MASK: u16 = 0x03FF;
    pub const EMPTY: Self = Self::DEFAULT.with_empty(true);

    #[inline]
    pub const fn has_error(&self) -> bool {
        self.raw_value() & Self::ERROR_MASK != 0
    }
}

/// In-memory layout of one buffer descriptor.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct BufferDescriptor {
    pub ctrl_stat: u16,
    pub reserved: u16,
    pub length: u16,
    pub pointer: u16,
}

static_assertions::const_assert_eq!(core::mem::size_of::<BufferDescriptor>(), 8);

impl BufferDescriptor {
    pub const ZERO: Self = Self {
        ctrl_stat: 0,
        reserved: 0,
        length: 0,
        pointer: 0,
    };

    #[inline]
    pub const fn new(ctrl_stat: u16, length: u16, pointer: u16) -> Self {
        Self {
            ctrl_stat,
            reserved: 0,
            length,
            pointer,
        }
    }

    #[inline]
    pub const fn tx_status(&self) -> TxBdStatus {
        TxBdStatus::new_with_raw_value(self.ctrl_stat)
    }

    #[inline]
    pub const fn rx_status(&self) -> RxBdStatus {
        RxBdStatus::new_with_raw_value(self.ctrl_stat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_control_word() {
        assert_eq!(TxBdControl::POST.raw_value(), 0x8300);
    }

    #[test]
    fn rx_error_bits() {
        assert!(!RxBdStatus::EMPTY.has_error());
        assert!(RxBdStatus::new_with_raw_value(1 << 3).has_error());
        assert!(!RxBdStatus::new_with_raw_value(1 << 9).bad_fcs());
        assert!(RxBdStatus::new_with_raw_value(1 << 9).overrun());
    }

    #[test]
    fn tx_error_bits() {
        let status = BufferDescriptor::new(1 << 4, 64, 0).tx_status();
        assert!(status.late_collision());
        assert!(status.has_error());
        assert!(!BufferDescriptor::new(1 << 15, 64, 0).tx_status().has_error());
    }
}
