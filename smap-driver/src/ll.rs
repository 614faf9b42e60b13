//! Low-level register interface of the adapter.
//!
//! [Registers] is the seam between the engine and the hardware. [MmioRegisters] implements it
//! on top of the memory mapped register blocks of the [smap] crate, the simulator implements it
//! in software.
use arbitrary_int::u5;
use smap::{
    BD_COUNT,
    bd::BufferDescriptor,
    emac3::{Emac3, Emac3Interrupt, Emac3Reg, Mode0, Mode1, StaCtrl, TxMode0},
    fifo::{Fifo, FifoCtrl},
    speed::{Capabilities, InterruptCause, PioBits, Speed},
};
use vcell::VolatileCell;

use crate::platform::Direction;

pub trait Registers {
    /// SPEED revision register 1.
    fn rev_1(&mut self) -> u16;
    /// SPEED capability register.
    fn rev_3(&mut self) -> Capabilities;

    fn intr_status(&mut self) -> InterruptCause;
    /// Enabled interrupt causes.
    fn intr_mask(&mut self) -> InterruptCause;
    fn write_intr_mask(&mut self, mask: InterruptCause);
    fn clear_interrupts(&mut self, causes: InterruptCause);

    /// Read the first four words of the serial EEPROM. Words 0 to 2 hold the MAC address,
    /// word 3 their checksum.
    fn read_eeprom(&mut self) -> [u16; 4];

    fn tx_fifo_ctrl(&mut self) -> FifoCtrl;
    fn write_tx_fifo_ctrl(&mut self, ctrl: FifoCtrl);
    fn rx_fifo_ctrl(&mut self) -> FifoCtrl;
    fn write_rx_fifo_ctrl(&mut self, ctrl: FifoCtrl);
    /// DMA size in units of [smap::DMA_BLOCK_SIZE].
    fn write_tx_dma_size(&mut self, blocks: u16);
    fn write_rx_dma_size(&mut self, blocks: u16);
    fn write_tx_wr_ptr(&mut self, ptr: u16);
    fn write_rx_rd_ptr(&mut self, ptr: u16);
    fn write_tx_data(&mut self, word: u32);
    fn read_rx_data(&mut self) -> u32;
    fn tx_frame_inc(&mut self);
    fn rx_frame_dec(&mut self);
    fn write_bd_mode(&mut self, mode: u8);

    fn read_tx_bd(&mut self, idx: usize) -> BufferDescriptor;
    fn write_tx_bd(&mut self, idx: usize, bd: BufferDescriptor);
    fn read_rx_bd(&mut self, idx: usize) -> BufferDescriptor;
    fn write_rx_bd(&mut self, idx: usize, bd: BufferDescriptor);

    fn read_emac3(&mut self, reg: Emac3Reg) -> u32;
    fn write_emac3(&mut self, reg: Emac3Reg, value: u32);

    #[inline]
    fn enable_interrupts(&mut self, causes: InterruptCause) {
        let mask = self.intr_mask();
        self.write_intr_mask(mask.union(causes));
    }

    #[inline]
    fn disable_interrupts(&mut self, causes: InterruptCause) {
        let mask = self.intr_mask();
        self.write_intr_mask(mask.without(causes));
    }

    #[inline]
    fn fifo_ctrl(&mut self, dir: Direction) -> FifoCtrl {
        match dir {
            Direction::In => self.rx_fifo_ctrl(),
            Direction::Out => self.tx_fifo_ctrl(),
        }
    }

    #[inline]
    fn write_fifo_ctrl(&mut self, dir: Direction, ctrl: FifoCtrl) {
        match dir {
            Direction::In => self.write_rx_fifo_ctrl(ctrl),
            Direction::Out => self.write_tx_fifo_ctrl(ctrl),
        }
    }

    #[inline]
    fn write_dma_size(&mut self, dir: Direction, blocks: u16) {
        match dir {
            Direction::In => self.write_rx_dma_size(blocks),
            Direction::Out => self.write_tx_dma_size(blocks),
        }
    }

    #[inline]
    fn mode0(&mut self) -> Mode0 {
        Mode0::new_with_raw_value(self.read_emac3(Emac3Reg::Mode0))
    }

    #[inline]
    fn write_mode0(&mut self, mode0: Mode0) {
        self.write_emac3(Emac3Reg::Mode0, mode0.raw_value());
    }

    #[inline]
    fn mode1(&mut self) -> Mode1 {
        Mode1::new_with_raw_value(self.read_emac3(Emac3Reg::Mode1))
    }

    #[inline]
    fn write_mode1(&mut self, mode1: Mode1) {
        self.write_emac3(Emac3Reg::Mode1, mode1.raw_value());
    }

    #[inline]
    fn write_tx_mode0(&mut self, mode: TxMode0) {
        self.write_emac3(Emac3Reg::TxMode0, mode.raw_value());
    }

    #[inline]
    fn emac3_intr_status(&mut self) -> Emac3Interrupt {
        Emac3Interrupt::new_with_raw_value(self.read_emac3(Emac3Reg::IntrStat))
    }

    /// Write 1 to clear.
    #[inline]
    fn clear_emac3_interrupts(&mut self, causes: Emac3Interrupt) {
        self.write_emac3(Emac3Reg::IntrStat, causes.raw_value());
    }

    #[inline]
    fn sta_ctrl(&mut self) -> StaCtrl {
        StaCtrl::new_with_raw_value(self.read_emac3(Emac3Reg::StaCtrl))
    }

    #[inline]
    fn write_sta_ctrl(&mut self, ctrl: StaCtrl) {
        self.write_emac3(Emac3Reg::StaCtrl, ctrl.raw_value());
    }
}

/// One hardware buffer descriptor, accessed as four volatile 16-bit words.
#[repr(C, align(8))]
pub struct HwDescriptor {
    pub ctrl_stat: VolatileCell<u16>,
    pub reserved: VolatileCell<u16>,
    pub length: VolatileCell<u16>,
    pub pointer: VolatileCell<u16>,
}

impl HwDescriptor {
    #[inline]
    pub fn read(&self) -> BufferDescriptor {
        BufferDescriptor::new(self.ctrl_stat.get(), self.length.get(), self.pointer.get())
    }

    /// The control word is written last so the hardware never sees a half-updated descriptor
    /// with its ownership bit set.
    #[inline]
    pub fn write(&self, bd: BufferDescriptor) {
        self.reserved.set(0);
        self.length.set(bd.length);
        self.pointer.set(bd.pointer);
        self.ctrl_stat.set(bd.ctrl_stat);
    }
}

const EEPROM_ADDR_BITS: u32 = 6;
const EEPROM_READ_OPCODE: u32 = 0b10;
const EEPROM_EDGE_SPINS: u32 = 16;

/// Register access through the memory mapped register blocks.
pub struct MmioRegisters {
    speed: smap::speed::MmioSpeed<'static>,
    fifo: smap::fifo::MmioFifo<'static>,
    emac3: smap::emac3::MmioEmac3<'static>,
    tx_bd: &'static [HwDescriptor; BD_COUNT],
    rx_bd: &'static [HwDescriptor; BD_COUNT],
}

// The descriptor tables are device memory which is only accessed by the owning thread.
unsafe impl Send for MmioRegisters {}

impl MmioRegisters {
    /// Create the register interface at the fixed adapter addresses.
    ///
    /// # Safety
    ///
    /// Circumvents ownership and safety guarantees. There should only be one owner of the
    /// register interface apart from the interrupt top half, which only touches the
    /// interrupt mask register.
    pub unsafe fn new_fixed() -> Self {
        unsafe {
            Self {
                speed: Speed::new_mmio_fixed(),
                fifo: Fifo::new_mmio_fixed(),
                emac3: Emac3::new_mmio_fixed(),
                tx_bd: &*(smap::bd::TX_BD_BASE_ADDR as *const [HwDescriptor; BD_COUNT]),
                rx_bd: &*(smap::bd::RX_BD_BASE_ADDR as *const [HwDescriptor; BD_COUNT]),
            }
        }
    }

    /// Clone the register interface, for example for the interrupt top half.
    ///
    /// # Safety
    ///
    /// Circumvents ownership and safety guarantees.
    pub unsafe fn clone(&self) -> Self {
        unsafe {
            Self {
                speed: self.speed.clone(),
                fifo: self.fifo.clone(),
                emac3: self.emac3.clone(),
                tx_bd: self.tx_bd,
                rx_bd: self.rx_bd,
            }
        }
    }

    fn eeprom_edge_delay() {
        for _ in 0..EEPROM_EDGE_SPINS {
            core::hint::spin_loop();
        }
    }

    fn eeprom_clock_out(&mut self, bit: bool) {
        let data = PioBits::DEFAULT
            .with_eeprom_cs(true)
            .with_eeprom_data_in(bit);
        self.speed.write_pio_data(data);
        Self::eeprom_edge_delay();
        self.speed.write_pio_data(data.with_eeprom_clk(true));
        Self::eeprom_edge_delay();
        self.speed.write_pio_data(data);
        Self::eeprom_edge_delay();
    }

    fn eeprom_clock_in(&mut self) -> bool {
        let data = PioBits::DEFAULT.with_eeprom_cs(true);
        self.speed.write_pio_data(data.with_eeprom_clk(true));
        Self::eeprom_edge_delay();
        let bit = self.speed.read_pio_data().eeprom_data_out();
        self.speed.write_pio_data(data);
        Self::eeprom_edge_delay();
        bit
    }

    fn read_eeprom_word(&mut self, addr: u8) -> u16 {
        self.speed.write_pio_dir(
            PioBits::DEFAULT
                .with_eeprom_cs(true)
                .with_eeprom_clk(true)
                .with_eeprom_data_in(true),
        );
        self.speed
            .write_pio_data(PioBits::DEFAULT.with_eeprom_cs(true));
        Self::eeprom_edge_delay();
        // Start bit, read opcode, then the word address, MSB first.
        self.eeprom_clock_out(true);
        for i in (0..2).rev() {
            self.eeprom_clock_out((EEPROM_READ_OPCODE >> i) & 1 == 1);
        }
        for i in (0..EEPROM_ADDR_BITS).rev() {
            self.eeprom_clock_out((addr as u32 >> i) & 1 == 1);
        }
        let mut word = 0u16;
        for _ in 0..16 {
            word = (word << 1) | self.eeprom_clock_in() as u16;
        }
        self.speed.write_pio_data(PioBits::DEFAULT);
        Self::eeprom_edge_delay();
        word
    }
}

impl Registers for MmioRegisters {
    #[inline]
    fn rev_1(&mut self) -> u16 {
        self.speed.read_rev_1()
    }

    #[inline]
    fn rev_3(&mut self) -> Capabilities {
        self.speed.read_rev_3()
    }

    #[inline]
    fn intr_status(&mut self) -> InterruptCause {
        self.speed.read_intr_stat()
    }

    #[inline]
    fn intr_mask(&mut self) -> InterruptCause {
        self.speed.read_intr_mask()
    }

    #[inline]
    fn write_intr_mask(&mut self, mask: InterruptCause) {
        self.speed.write_intr_mask(mask);
    }

    #[inline]
    fn clear_interrupts(&mut self, causes: InterruptCause) {
        self.fifo.write_intr_clear(causes);
    }

    fn read_eeprom(&mut self) -> [u16; 4] {
        let mut words = [0; 4];
        for (addr, word) in words.iter_mut().enumerate() {
            *word = self.read_eeprom_word(addr as u8);
        }
        words
    }

    #[inline]
    fn tx_fifo_ctrl(&mut self) -> FifoCtrl {
        self.fifo.read_tx_ctrl()
    }

    #[inline]
    fn write_tx_fifo_ctrl(&mut self, ctrl: FifoCtrl) {
        self.fifo.write_tx_ctrl(ctrl);
    }

    #[inline]
    fn rx_fifo_ctrl(&mut self) -> FifoCtrl {
        self.fifo.read_rx_ctrl()
    }

    #[inline]
    fn write_rx_fifo_ctrl(&mut self, ctrl: FifoCtrl) {
        self.fifo.write_rx_ctrl(ctrl);
    }

    #[inline]
    fn write_tx_dma_size(&mut self, blocks: u16) {
        self.fifo.write_tx_size(blocks);
    }

    #[inline]
    fn write_rx_dma_size(&mut self, blocks: u16) {
        self.fifo.write_rx_size(blocks);
    }

    #[inline]
    fn write_tx_wr_ptr(&mut self, ptr: u16) {
        self.fifo.write_tx_wr_ptr(ptr);
    }

    #[inline]
    fn write_rx_rd_ptr(&mut self, ptr: u16) {
        self.fifo.write_rx_rd_ptr(ptr);
    }

    #[inline]
    fn write_tx_data(&mut self, word: u32) {
        self.fifo.write_tx_data(word);
    }

    #[inline]
    fn read_rx_data(&mut self) -> u32 {
        self.fifo.read_rx_data()
    }

    #[inline]
    fn tx_frame_inc(&mut self) {
        self.fifo.write_tx_frame_inc(0);
    }

    #[inline]
    fn rx_frame_dec(&mut self) {
        self.fifo.write_rx_frame_dec(0);
    }

    #[inline]
    fn write_bd_mode(&mut self, mode: u8) {
        self.fifo.write_bd_mode(mode);
    }

    #[inline]
    fn read_tx_bd(&mut self, idx: usize) -> BufferDescriptor {
        self.tx_bd[idx % BD_COUNT].read()
    }

    #[inline]
    fn write_tx_bd(&mut self, idx: usize, bd: BufferDescriptor) {
        self.tx_bd[idx % BD_COUNT].write(bd);
    }

    #[inline]
    fn read_rx_bd(&mut self, idx: usize) -> BufferDescriptor {
        self.rx_bd[idx % BD_COUNT].read()
    }

    #[inline]
    fn write_rx_bd(&mut self, idx: usize, bd: BufferDescriptor) {
        self.rx_bd[idx % BD_COUNT].write(bd);
    }

    fn read_emac3(&mut self, reg: Emac3Reg) -> u32 {
        let regs = &mut self.emac3;
        match reg {
            Emac3Reg::Mode0 => regs.read_mode0().raw_value(),
            Emac3Reg::Mode1 => regs.read_mode1().raw_value(),
            Emac3Reg::TxMode0 => regs.read_tx_mode0().raw_value(),
            Emac3Reg::TxMode1 => regs.read_tx_mode1().raw_value(),
            Emac3Reg::RxMode => regs.read_rx_mode().raw_value(),
            Emac3Reg::IntrStat => regs.read_intr_stat().raw_value(),
            Emac3Reg::IntrEnable => regs.read_intr_enable().raw_value(),
            Emac3Reg::AddrHi => regs.read_addr_hi(),
            Emac3Reg::AddrLo => regs.read_addr_lo(),
            Emac3Reg::VlanTpid => regs.read_vlan_tpid(),
            Emac3Reg::VlanTci => regs.read_vlan_tci(),
            Emac3Reg::PauseTimer => regs.read_pause_timer(),
            Emac3Reg::GroupHash1 => regs.read_group_hash_1(),
            Emac3Reg::GroupHash2 => regs.read_group_hash_2(),
            Emac3Reg::GroupHash3 => regs.read_group_hash_3(),
            Emac3Reg::GroupHash4 => regs.read_group_hash_4(),
            Emac3Reg::LastSaHi => regs.read_last_sa_hi(),
            Emac3Reg::LastSaLo => regs.read_last_sa_lo(),
            Emac3Reg::InterFrameGap => regs.read_inter_frame_gap(),
            Emac3Reg::StaCtrl => regs.read_sta_ctrl().raw_value(),
            Emac3Reg::TxThreshold => regs.read_tx_threshold().raw_value(),
            Emac3Reg::RxWatermark => regs.read_rx_watermark().raw_value(),
            Emac3Reg::TxOctets => regs.read_tx_octets(),
            Emac3Reg::RxOctets => regs.read_rx_octets(),
        }
    }

    fn write_emac3(&mut self, reg: Emac3Reg, value: u32) {
        use smap::emac3::{RxMode, RxWatermark, TxMode1, TxThreshold};
        let regs = &mut self.emac3;
        match reg {
            Emac3Reg::Mode0 => regs.write_mode0(Mode0::new_with_raw_value(value)),
            Emac3Reg::Mode1 => regs.write_mode1(Mode1::new_with_raw_value(value)),
            Emac3Reg::TxMode0 => regs.write_tx_mode0(TxMode0::new_with_raw_value(value)),
            Emac3Reg::TxMode1 => regs.write_tx_mode1(TxMode1::new_with_raw_value(value)),
            Emac3Reg::RxMode => regs.write_rx_mode(RxMode::new_with_raw_value(value)),
            Emac3Reg::IntrStat => regs.write_intr_stat(Emac3Interrupt::new_with_raw_value(value)),
            Emac3Reg::IntrEnable => {
                regs.write_intr_enable(Emac3Interrupt::new_with_raw_value(value))
            }
            Emac3Reg::AddrHi => regs.write_addr_hi(value),
            Emac3Reg::AddrLo => regs.write_addr_lo(value),
            Emac3Reg::VlanTpid => regs.write_vlan_tpid(value),
            Emac3Reg::VlanTci => regs.write_vlan_tci(value),
            Emac3Reg::PauseTimer => regs.write_pause_timer(value),
            Emac3Reg::GroupHash1 => regs.write_group_hash_1(value),
            Emac3Reg::GroupHash2 => regs.write_group_hash_2(value),
            Emac3Reg::GroupHash3 => regs.write_group_hash_3(value),
            Emac3Reg::GroupHash4 => regs.write_group_hash_4(value),
            Emac3Reg::InterFrameGap => regs.write_inter_frame_gap(value),
            Emac3Reg::StaCtrl => regs.write_sta_ctrl(StaCtrl::new_with_raw_value(value)),
            Emac3Reg::TxThreshold => {
                regs.write_tx_threshold(TxThreshold::new_with_raw_value(value))
            }
            Emac3Reg::RxWatermark => {
                regs.write_rx_watermark(RxWatermark::new_with_raw_value(value))
            }
            Emac3Reg::LastSaHi | Emac3Reg::LastSaLo | Emac3Reg::TxOctets | Emac3Reg::RxOctets => {
                log::warn!("write to read-only EMAC3 register {reg:?} ignored");
            }
        }
    }
}

/// Station management command which starts a PHY register read.
#[inline]
pub fn sta_read_command(phy_addr: u5, reg: u5) -> StaCtrl {
    StaCtrl::DEFAULT
        .with_op(smap::emac3::StaOperation::Read)
        .with_phy_addr(phy_addr)
        .with_reg_addr(reg)
}

/// Station management command which starts a PHY register write.
#[inline]
pub fn sta_write_command(phy_addr: u5, reg: u5, data: u16) -> StaCtrl {
    StaCtrl::DEFAULT
        .with_data(data)
        .with_op(smap::emac3::StaOperation::Write)
        .with_phy_addr(phy_addr)
        .with_reg_addr(reg)
}
