//! Software model of the adapter.
//!
//! [SimSmap] implements [Registers] and [DmaEngine] on top of a shared [SimState], so a test
//! or the host demo can hand clones of it to the driver and still inspect and script the
//! hardware. The PHY behind the station management register is modelled by [SimPhy].
use std::{
    sync::{
        Arc, Condvar, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    vec,
    vec::Vec,
};

use embedded_hal::delay::DelayNs;
use fugit::MicrosDurationU32;
use smap::{
    BD_COUNT, RX_FIFO_BASE, RX_FIFO_SIZE, TX_FIFO_BASE, TX_FIFO_SIZE, align_word,
    bd::{BufferDescriptor, RxBdStatus},
    emac3::{Emac3Interrupt, Emac3Reg, Mode0, StaCtrl, TxMode0},
    fifo::FifoCtrl,
    speed::{Capabilities, InterruptCause},
};

use crate::{
    config::DriverConfig,
    device::SmapDevice,
    error::DmaError,
    ll::Registers,
    packet::HeapAllocator,
    platform::{DmaBuffer, DmaEngine, EventFlags, PeriodicAlarm},
};

const EMAC3_REG_COUNT: usize = 0x70 / 4;
const STA_OP_READ: u32 = 0b01;
const STA_OP_WRITE: u32 = 0b10;

/// Scripted DP83846A transceiver.
#[derive(Debug, Clone)]
pub struct SimPhy {
    pub id1: u16,
    pub id2: u16,
    /// The BMCR reset bit never clears.
    pub reset_stuck: bool,
    /// Management operations never complete.
    pub mgmt_stuck: bool,
    /// Auto-negotiation completes with the given restart, counted from 1. [None] means never.
    pub negotiation_completes_on: Option<u32>,
    /// The link comes up after this many BMSR reads following a restart. [None] means never.
    pub link_after_reads: Option<u32>,
    /// Cable state.
    pub link_up: bool,
    pub speed_10: bool,
    pub full_duplex: bool,
    pub partner_pause: bool,
    /// Number of auto-negotiation restarts.
    pub negotiations: u32,
    pub bmcr_reads: u32,
    /// BMSR reads since the last restart.
    pub bmsr_reads: u32,
    /// Every register write as (register, value).
    pub writes: Vec<(u8, u16)>,
    bmcr: u16,
    regs: [u16; 32],
}

impl Default for SimPhy {
    fn default() -> Self {
        Self {
            id1: smap::phy::DP83846A_ID1,
            id2: smap::phy::DP83846A_ID2 | 0x1,
            reset_stuck: false,
            mgmt_stuck: false,
            negotiation_completes_on: Some(1),
            link_after_reads: Some(0),
            link_up: true,
            speed_10: false,
            full_duplex: true,
            partner_pause: true,
            negotiations: 0,
            bmcr_reads: 0,
            bmsr_reads: 0,
            writes: Vec::new(),
            bmcr: 0x3100,
            regs: [0; 32],
        }
    }
}

impl SimPhy {
    fn negotiated(&self) -> bool {
        self.negotiation_completes_on
            .is_some_and(|n| self.negotiations >= n)
    }

    fn link(&self) -> bool {
        self.link_up
            && self.negotiated()
            && self.link_after_reads.is_some_and(|n| self.bmsr_reads >= n)
    }

    pub fn read(&mut self, reg: u8) -> u16 {
        match reg {
            0x00 => {
                self.bmcr_reads += 1;
                self.bmcr
            }
            0x01 => {
                self.bmsr_reads += 1;
                // 10/100 half and full duplex, auto-negotiation ability, extended capability.
                let mut bmsr = 0x7809;
                if self.negotiated() {
                    bmsr |= 1 << 5;
                }
                if self.link() {
                    bmsr |= 1 << 2;
                }
                bmsr
            }
            0x02 => self.id1,
            0x03 => self.id2,
            0x04 => 0x05E1,
            0x05 => 0x01E1 | if self.partner_pause { 1 << 10 } else { 0 },
            0x10 => {
                let mut sts = 0;
                if self.link() {
                    sts |= 1 << 0;
                }
                if self.speed_10 {
                    sts |= 1 << 1;
                }
                if self.full_duplex {
                    sts |= 1 << 2;
                }
                if self.negotiated() {
                    sts |= 1 << 4;
                }
                sts
            }
            _ => self.regs[reg as usize % 32],
        }
    }

    pub fn write(&mut self, reg: u8, value: u16) {
        self.writes.push((reg, value));
        if reg != 0 {
            self.regs[reg as usize % 32] = value;
            return;
        }
        if value & (1 << 15) != 0 {
            self.bmcr = if self.reset_stuck { value } else { 0x3100 };
        } else if value & (1 << 9) != 0 {
            self.negotiations += 1;
            self.bmsr_reads = 0;
            self.bmcr = value & !(1 << 9);
        } else {
            self.bmcr = value;
        }
    }
}

pub struct SimState {
    pub rev_1: u16,
    pub rev_3: u16,
    pub intr_stat: InterruptCause,
    pub intr_mask: InterruptCause,
    pub eeprom: [u16; 4],
    pub tx_fifo_ctrl: FifoCtrl,
    pub rx_fifo_ctrl: FifoCtrl,
    pub tx_dma_size: u16,
    pub rx_dma_size: u16,
    pub tx_wr_ptr: u16,
    pub rx_rd_ptr: u16,
    pub tx_fifo: Vec<u8>,
    pub rx_fifo: Vec<u8>,
    /// FIFO offset at which the MAC stores the next received frame.
    pub rx_wr_offset: usize,
    pub tx_frame_count: usize,
    pub rx_frame_count: usize,
    pub bd_mode: u8,
    pub tx_bd: [BufferDescriptor; BD_COUNT],
    pub rx_bd: [BufferDescriptor; BD_COUNT],
    /// Next TX descriptor the MAC looks at.
    pub tx_hw_idx: usize,
    /// Next RX descriptor the MAC fills.
    pub rx_hw_idx: usize,
    pub emac3: [u32; EMAC3_REG_COUNT],
    pub phy: SimPhy,
    pub tx_fifo_reset_stuck: bool,
    pub rx_fifo_reset_stuck: bool,
    pub emac_reset_stuck: bool,
    /// The DMA engine rejects every transfer.
    pub dma_fails: bool,
    /// Transfers complete but the DMA enable bit never clears.
    pub dma_stuck: bool,
    pub dma_transfers: usize,
    pub tx_dma_blocks: usize,
    pub rx_dma_blocks: usize,
    /// Status word written back into completed TX descriptors.
    pub tx_completion_status: u16,
    /// Frames put on the wire, oldest first.
    pub transmitted: Vec<Vec<u8>>,
    /// Number of transmit requests to the MAC.
    pub tx_kicks: usize,
}

impl Default for SimState {
    fn default() -> Self {
        let [a, b, c, d, e, f] = SimSmap::DEFAULT_MAC;
        let words = [
            u16::from_le_bytes([a, b]),
            u16::from_le_bytes([c, d]),
            u16::from_le_bytes([e, f]),
        ];
        let checksum = words.iter().fold(0u16, |sum, w| sum.wrapping_add(*w));
        Self {
            rev_1: 17,
            rev_3: 0x1,
            intr_stat: InterruptCause::DEFAULT,
            intr_mask: InterruptCause::DEFAULT,
            eeprom: [words[0], words[1], words[2], checksum],
            tx_fifo_ctrl: FifoCtrl::DEFAULT,
            rx_fifo_ctrl: FifoCtrl::DEFAULT,
            tx_dma_size: 0,
            rx_dma_size: 0,
            tx_wr_ptr: TX_FIFO_BASE,
            rx_rd_ptr: RX_FIFO_BASE,
            tx_fifo: vec![0; TX_FIFO_SIZE],
            rx_fifo: vec![0; RX_FIFO_SIZE],
            rx_wr_offset: 0,
            tx_frame_count: 0,
            rx_frame_count: 0,
            bd_mode: 0,
            tx_bd: [BufferDescriptor::ZERO; BD_COUNT],
            rx_bd: [BufferDescriptor::new(RxBdStatus::EMPTY.raw_value(), 0, 0); BD_COUNT],
            tx_hw_idx: 0,
            rx_hw_idx: 0,
            emac3: [0; EMAC3_REG_COUNT],
            phy: SimPhy::default(),
            tx_fifo_reset_stuck: false,
            rx_fifo_reset_stuck: false,
            emac_reset_stuck: false,
            dma_fails: false,
            dma_stuck: false,
            dma_transfers: 0,
            tx_dma_blocks: 0,
            rx_dma_blocks: 0,
            tx_completion_status: 0,
            transmitted: Vec::new(),
            tx_kicks: 0,
        }
    }
}

impl SimState {
    #[inline]
    fn tx_offset(&self) -> usize {
        self.tx_wr_ptr.wrapping_sub(TX_FIFO_BASE) as usize % TX_FIFO_SIZE
    }

    #[inline]
    fn set_tx_offset(&mut self, offset: usize) {
        self.tx_wr_ptr = TX_FIFO_BASE + (offset % TX_FIFO_SIZE) as u16;
    }

    #[inline]
    fn rx_offset(&self) -> usize {
        self.rx_rd_ptr.wrapping_sub(RX_FIFO_BASE) as usize % RX_FIFO_SIZE
    }

    #[inline]
    fn set_rx_offset(&mut self, offset: usize) {
        self.rx_rd_ptr = RX_FIFO_BASE + (offset % RX_FIFO_SIZE) as u16;
    }

    fn push_tx(&mut self, data: &[u8]) {
        let start = self.tx_offset();
        for (i, byte) in data.iter().enumerate() {
            self.tx_fifo[(start + i) % TX_FIFO_SIZE] = *byte;
        }
        self.set_tx_offset(start + data.len());
    }

    fn pop_rx(&mut self, data: &mut [u8]) {
        let start = self.rx_offset();
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = self.rx_fifo[(start + i) % RX_FIFO_SIZE];
        }
        self.set_rx_offset(start + data.len());
    }

    fn sta_operation(&mut self, ctrl: StaCtrl) -> StaCtrl {
        if self.phy.mgmt_stuck {
            return ctrl.with_op_complete(false);
        }
        let raw = ctrl.raw_value();
        let reg = ctrl.reg_addr().value();
        match (raw >> 12) & 0b11 {
            STA_OP_READ => {
                let data = self.phy.read(reg);
                ctrl.with_data(data).with_op_complete(true)
            }
            STA_OP_WRITE => {
                self.phy.write(reg, ctrl.data());
                ctrl.with_op_complete(true)
            }
            _ => ctrl,
        }
    }
}

/// Shared handle to the simulated adapter.
#[derive(Clone, Default)]
pub struct SimSmap {
    state: Arc<Mutex<SimState>>,
}

impl SimSmap {
    /// MAC address stored in the simulated EEPROM.
    pub const DEFAULT_MAC: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];

    pub fn new() -> Self {
        Self::default()
    }

    /// Run a closure with exclusive access to the hardware state.
    pub fn with_state<T>(&self, f: impl FnOnce(&mut SimState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Driver instance backed by this adapter.
    pub fn device(&self, config: DriverConfig) -> SmapDevice<SimSmap, SimSmap, SimDelay, HeapAllocator> {
        SmapDevice::new(
            self.clone(),
            self.clone(),
            SimDelay::new(),
            HeapAllocator::default(),
            config,
        )
    }

    /// Receive a frame from the wire. Returns false if no empty RX descriptor is available.
    pub fn inject_frame(&self, data: &[u8]) -> bool {
        self.receive(Some(data), data.len(), 0)
    }

    /// Receive a frame whose descriptor reports the given error bits.
    pub fn inject_error_frame(&self, data: &[u8], status: u16) -> bool {
        self.receive(Some(data), data.len(), status & RxBdStatus::ERROR_MASK)
    }

    /// Complete an RX descriptor without storing any frame data.
    pub fn inject_raw_descriptor(&self, length: u16, status: u16) -> bool {
        self.receive(None, length as usize, status & RxBdStatus::ERROR_MASK)
    }

    fn receive(&self, data: Option<&[u8]>, len: usize, status: u16) -> bool {
        self.with_state(|s| {
            let idx = s.rx_hw_idx % BD_COUNT;
            if !s.rx_bd[idx].rx_status().empty() {
                return false;
            }
            let offset = s.rx_wr_offset;
            if let Some(data) = data {
                for (i, byte) in data.iter().enumerate() {
                    s.rx_fifo[(offset + i) % RX_FIFO_SIZE] = *byte;
                }
            }
            s.rx_bd[idx] = BufferDescriptor::new(status, len as u16, RX_FIFO_BASE + offset as u16);
            s.rx_wr_offset = (offset + align_word(len)) % RX_FIFO_SIZE;
            s.rx_hw_idx += 1;
            s.rx_frame_count += 1;
            s.intr_stat.set_rx_end(true);
            true
        })
    }

    /// Send up to `count` posted frames, oldest first. Returns the number of sent frames.
    pub fn complete_tx(&self, count: usize) -> usize {
        self.with_state(|s| {
            let mut done = 0;
            while done < count {
                let idx = s.tx_hw_idx % BD_COUNT;
                let bd = s.tx_bd[idx];
                if !bd.tx_status().ready() {
                    break;
                }
                let start = bd.pointer.wrapping_sub(TX_FIFO_BASE) as usize;
                let frame: Vec<u8> = (0..bd.length as usize)
                    .map(|i| s.tx_fifo[(start + i) % TX_FIFO_SIZE])
                    .collect();
                s.transmitted.push(frame);
                s.tx_bd[idx].ctrl_stat = s.tx_completion_status & !(1 << 15);
                s.tx_hw_idx += 1;
                s.tx_frame_count = s.tx_frame_count.saturating_sub(1);
                done += 1;
            }
            if done > 0 && !s.tx_bd[s.tx_hw_idx % BD_COUNT].tx_status().ready() {
                s.intr_stat.set_tx_descr_not_valid(true);
            }
            done
        })
    }

    /// Frames sent so far. Clears the record.
    pub fn take_transmitted(&self) -> Vec<Vec<u8>> {
        self.with_state(|s| core::mem::take(&mut s.transmitted))
    }

    /// Set MAC error causes and the matching adapter interrupt.
    pub fn raise_mac_error(&self, errors: Emac3Interrupt) {
        self.with_state(|s| {
            s.emac3[Emac3Reg::IntrStat.offset() / 4] |= errors.raw_value();
            s.intr_stat.set_emac3(true);
        });
    }

    /// An enabled interrupt cause is pending.
    pub fn irq_pending(&self) -> bool {
        self.with_state(|s| s.intr_stat.intersects(s.intr_mask))
    }
}

impl Registers for SimSmap {
    fn rev_1(&mut self) -> u16 {
        self.with_state(|s| s.rev_1)
    }

    fn rev_3(&mut self) -> Capabilities {
        self.with_state(|s| Capabilities::new_with_raw_value(s.rev_3))
    }

    fn intr_status(&mut self) -> InterruptCause {
        self.with_state(|s| s.intr_stat)
    }

    fn intr_mask(&mut self) -> InterruptCause {
        self.with_state(|s| s.intr_mask)
    }

    fn write_intr_mask(&mut self, mask: InterruptCause) {
        self.with_state(|s| s.intr_mask = mask);
    }

    fn clear_interrupts(&mut self, causes: InterruptCause) {
        self.with_state(|s| s.intr_stat = s.intr_stat.without(causes));
    }

    fn read_eeprom(&mut self) -> [u16; 4] {
        self.with_state(|s| s.eeprom)
    }

    fn tx_fifo_ctrl(&mut self) -> FifoCtrl {
        self.with_state(|s| s.tx_fifo_ctrl)
    }

    fn write_tx_fifo_ctrl(&mut self, ctrl: FifoCtrl) {
        self.with_state(|s| {
            if ctrl.reset() && !s.tx_fifo_reset_stuck {
                s.tx_wr_ptr = TX_FIFO_BASE;
                s.tx_hw_idx = 0;
                s.tx_frame_count = 0;
                s.tx_fifo_ctrl = ctrl.with_reset(false);
            } else {
                s.tx_fifo_ctrl = ctrl;
            }
        });
    }

    fn rx_fifo_ctrl(&mut self) -> FifoCtrl {
        self.with_state(|s| s.rx_fifo_ctrl)
    }

    fn write_rx_fifo_ctrl(&mut self, ctrl: FifoCtrl) {
        self.with_state(|s| {
            if ctrl.reset() && !s.rx_fifo_reset_stuck {
                s.rx_rd_ptr = RX_FIFO_BASE;
                s.rx_wr_offset = 0;
                s.rx_hw_idx = 0;
                s.rx_frame_count = 0;
                s.rx_fifo_ctrl = ctrl.with_reset(false);
            } else {
                s.rx_fifo_ctrl = ctrl;
            }
        });
    }

    fn write_tx_dma_size(&mut self, blocks: u16) {
        self.with_state(|s| s.tx_dma_size = blocks);
    }

    fn write_rx_dma_size(&mut self, blocks: u16) {
        self.with_state(|s| s.rx_dma_size = blocks);
    }

    fn write_tx_wr_ptr(&mut self, ptr: u16) {
        self.with_state(|s| {
            s.tx_wr_ptr = ptr;
            let offset = s.tx_offset();
            s.set_tx_offset(offset);
        });
    }

    fn write_rx_rd_ptr(&mut self, ptr: u16) {
        self.with_state(|s| {
            s.rx_rd_ptr = ptr;
            let offset = s.rx_offset();
            s.set_rx_offset(offset);
        });
    }

    fn write_tx_data(&mut self, word: u32) {
        self.with_state(|s| s.push_tx(&word.to_le_bytes()));
    }

    fn read_rx_data(&mut self) -> u32 {
        self.with_state(|s| {
            let mut bytes = [0; 4];
            s.pop_rx(&mut bytes);
            u32::from_le_bytes(bytes)
        })
    }

    fn tx_frame_inc(&mut self) {
        self.with_state(|s| s.tx_frame_count += 1);
    }

    fn rx_frame_dec(&mut self) {
        self.with_state(|s| s.rx_frame_count = s.rx_frame_count.saturating_sub(1));
    }

    fn write_bd_mode(&mut self, mode: u8) {
        self.with_state(|s| s.bd_mode = mode);
    }

    fn read_tx_bd(&mut self, idx: usize) -> BufferDescriptor {
        self.with_state(|s| s.tx_bd[idx % BD_COUNT])
    }

    fn write_tx_bd(&mut self, idx: usize, bd: BufferDescriptor) {
        self.with_state(|s| s.tx_bd[idx % BD_COUNT] = bd);
    }

    fn read_rx_bd(&mut self, idx: usize) -> BufferDescriptor {
        self.with_state(|s| s.rx_bd[idx % BD_COUNT])
    }

    fn write_rx_bd(&mut self, idx: usize, bd: BufferDescriptor) {
        self.with_state(|s| s.rx_bd[idx % BD_COUNT] = bd);
    }

    fn read_emac3(&mut self, reg: Emac3Reg) -> u32 {
        self.with_state(|s| s.emac3[reg.offset() / 4])
    }

    fn write_emac3(&mut self, reg: Emac3Reg, value: u32) {
        self.with_state(|s| {
            let idx = reg.offset() / 4;
            match reg {
                Emac3Reg::Mode0 => {
                    let mode0 = Mode0::new_with_raw_value(value);
                    if mode0.soft_reset() && !s.emac_reset_stuck {
                        s.emac3 = [0; EMAC3_REG_COUNT];
                    } else {
                        s.emac3[idx] = value;
                    }
                }
                Emac3Reg::IntrStat => s.emac3[idx] &= !value,
                Emac3Reg::TxMode0 => {
                    if TxMode0::new_with_raw_value(value).gnp_0() {
                        s.tx_kicks += 1;
                    }
                }
                Emac3Reg::StaCtrl => {
                    let ctrl = s.sta_operation(StaCtrl::new_with_raw_value(value));
                    s.emac3[idx] = ctrl.raw_value();
                }
                Emac3Reg::LastSaHi | Emac3Reg::LastSaLo | Emac3Reg::TxOctets | Emac3Reg::RxOctets => {}
                _ => s.emac3[idx] = value,
            }
        });
    }
}

impl DmaEngine for SimSmap {
    fn transfer(
        &mut self,
        buf: DmaBuffer<'_>,
        block_size: usize,
        blocks: usize,
    ) -> Result<(), DmaError> {
        self.with_state(|s| {
            if s.dma_fails {
                return Err(DmaError::Rejected);
            }
            match buf {
                DmaBuffer::Out(data) => {
                    if !s.tx_fifo_ctrl.dma_enable() {
                        return Err(DmaError::Busy);
                    }
                    if s.tx_dma_size as usize != blocks || data.len() != blocks * block_size {
                        return Err(DmaError::Rejected);
                    }
                    s.push_tx(data);
                    s.tx_dma_blocks += blocks;
                    if !s.dma_stuck {
                        s.tx_fifo_ctrl.set_dma_enable(false);
                    }
                }
                DmaBuffer::In(data) => {
                    if !s.rx_fifo_ctrl.dma_enable() {
                        return Err(DmaError::Busy);
                    }
                    if s.rx_dma_size as usize != blocks || data.len() != blocks * block_size {
                        return Err(DmaError::Rejected);
                    }
                    s.pop_rx(data);
                    s.rx_dma_blocks += blocks;
                    if !s.dma_stuck {
                        s.rx_fifo_ctrl.set_dma_enable(false);
                    }
                }
            }
            s.dma_transfers += 1;
            Ok(())
        })
    }
}

/// Delay which does not sleep but accumulates the requested time.
#[derive(Debug, Clone, Default)]
pub struct SimDelay {
    elapsed_ns: Arc<AtomicU64>,
}

impl SimDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_ns.load(Ordering::Relaxed) / 1000
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns.fetch_add(ns as u64, Ordering::Relaxed);
    }

    fn delay_us(&mut self, us: u32) {
        self.elapsed_ns
            .fetch_add(us as u64 * 1000, Ordering::Relaxed);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.elapsed_ns
            .fetch_add(ms as u64 * 1_000_000, Ordering::Relaxed);
    }
}

/// Event flag set built from a mutex and a condition variable.
#[derive(Debug, Default)]
pub struct StdEventFlags {
    bits: Mutex<u32>,
    cond: Condvar,
}

impl StdEventFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently set bits, without clearing them.
    pub fn pending(&self) -> u32 {
        *self.bits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take and clear all set bits without blocking.
    pub fn try_take(&self) -> u32 {
        core::mem::take(&mut *self.bits.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventFlags for StdEventFlags {
    fn set(&self, bits: u32) {
        *self.bits.lock().unwrap_or_else(PoisonError::into_inner) |= bits;
        self.cond.notify_all();
    }

    fn wait(&self, mask: u32) -> u32 {
        let mut bits = self.bits.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let matched = *bits & mask;
            if matched != 0 {
                *bits &= !matched;
                return matched;
            }
            bits = self.cond.wait(bits).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[derive(Debug, Default)]
struct AlarmState {
    starts: usize,
    stops: usize,
    period: Option<MicrosDurationU32>,
}

/// Alarm which records its use. The owner of the platform decides when it fires.
#[derive(Debug, Clone, Default)]
pub struct SimAlarm {
    state: Arc<Mutex<AlarmState>>,
}

impl SimAlarm {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut AlarmState) -> T) -> T {
        f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn starts(&self) -> usize {
        self.with_state(|s| s.starts)
    }

    pub fn stops(&self) -> usize {
        self.with_state(|s| s.stops)
    }

    /// Period of the running alarm.
    pub fn running_period(&self) -> Option<MicrosDurationU32> {
        self.with_state(|s| (s.starts > s.stops).then_some(s.period).flatten())
    }

    /// Period passed to the last start.
    pub fn last_period(&self) -> Option<MicrosDurationU32> {
        self.with_state(|s| s.period)
    }
}

impl PeriodicAlarm for SimAlarm {
    fn start(&mut self, period: MicrosDurationU32) {
        self.with_state(|s| {
            s.starts += 1;
            s.period = Some(period);
        });
    }

    fn stop(&mut self) {
        self.with_state(|s| s.stops += 1);
    }
}
