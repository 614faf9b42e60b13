//! # Driver engine for the SMAP DMA Ethernet adapter
//!
//! The engine owns the adapter registers, the transmit and receive descriptor rings, the
//! interrupt handling, the PHY link negotiation and the packet queues towards a network stack
//! running in its own thread.
//!
//! Two long-lived contexts cooperate through a [Shared] state block:
//!
//! - The dispatch loop ([dispatch::EventLoop]) is the only owner of the device. It sleeps on an
//!   event flag set and handles initialization, interrupts, transmit requests, the periodic link
//!   check and shutdown.
//! - The bridge ([bridge::Bridge]) waits on a second flag set and moves received frames to the
//!   network stack.
//!
//! The interrupt top half ([dispatch::on_interrupt]) only masks the adapter interrupts and wakes
//! the dispatch loop. All platform services (flags, alarms, DMA, delays) are traits in
//! [platform], so the engine runs on the target as well as against the [sim] model.
#![no_std]

extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod bridge;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod dma;
pub mod error;
pub mod ll;
pub mod packet;
pub mod phy;
pub mod platform;
pub mod queue;
pub mod ring;
pub mod rx;
pub mod shared;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod tx;

pub use config::{BridgeConfig, DriverConfig, NetConfig};
pub use device::SmapDevice;
pub use error::{ConfigError, DmaError, Error, TimeoutCause, WouldBlock};
pub use packet::{HeapAllocator, Packet, PacketAllocator, PacketBuffer};
pub use shared::{Shared, SmapHandle};

/// Largest frame accepted from the receive descriptors, including the FCS.
pub const MAX_FRAME_LEN: usize = 1518;
/// Largest frame which can be posted for transmission. The MAC appends the FCS.
pub const MAX_TX_FRAME_LEN: usize = 1514;
