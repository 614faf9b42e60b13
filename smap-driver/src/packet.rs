//! Packet buffers shared between the driver and the network stack.
//!
//! A frame is a [PacketBuffer] made of one or more segments. It travels through the queues as a
//! [Packet], which is reference counted: every queue entry holds exactly one reference and
//! releases it when it is dropped.
use alloc::{sync::Arc, vec::Vec};

use crate::error::ConfigError;

pub type Packet = Arc<PacketBuffer>;

pub const DEFAULT_SEGMENT_SIZE: usize = 512;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PacketBuffer {
    segments: Vec<Vec<u8>>,
}

impl PacketBuffer {
    #[inline]
    pub fn new(segments: Vec<Vec<u8>>) -> Self {
        Self { segments }
    }

    /// Copy a frame into a single segment buffer.
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            segments: alloc::vec![data.to_vec()],
        }
    }

    /// Copy a frame into segments of at most `segment_size` bytes.
    pub fn from_slice_segmented(data: &[u8], segment_size: usize) -> Self {
        Self {
            segments: data
                .chunks(segment_size.max(1))
                .map(|chunk| chunk.to_vec())
                .collect(),
        }
    }

    /// Total payload length over all segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn segments(&self) -> &[Vec<u8>] {
        &self.segments
    }

    #[inline]
    pub fn segments_mut(&mut self) -> &mut [Vec<u8>] {
        &mut self.segments
    }

    /// Shorten the frame to `len` bytes. Segments past the new end are removed.
    pub fn truncate(&mut self, len: usize) {
        let mut remaining = len;
        self.segments.retain_mut(|segment| {
            if remaining == 0 {
                return false;
            }
            segment.truncate(remaining);
            remaining -= segment.len();
            true
        });
    }

    /// Copy the first `N` bytes of the frame, or [None] for a shorter frame.
    pub fn header<const N: usize>(&self) -> Option<[u8; N]> {
        if self.len() < N {
            return None;
        }
        let mut header = [0; N];
        let mut filled = 0;
        for segment in &self.segments {
            let take = (N - filled).min(segment.len());
            header[filled..filled + take].copy_from_slice(&segment[..take]);
            filled += take;
            if filled == N {
                break;
            }
        }
        Some(header)
    }

    /// Copy the whole frame into one contiguous vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.len());
        for segment in &self.segments {
            data.extend_from_slice(segment);
        }
        data
    }
}

/// Source of receive buffers.
pub trait PacketAllocator {
    /// Allocate a zeroed buffer with a total length of `len` bytes, or [None] if memory is
    /// exhausted.
    fn alloc(&mut self, len: usize) -> Option<PacketBuffer>;
}

/// Allocator which chains heap segments of a fixed size.
#[derive(Debug, Clone, Copy)]
pub struct HeapAllocator {
    segment_size: usize,
}

impl HeapAllocator {
    /// The segment size must be a non-zero multiple of 4 so that every segment except the
    /// last one ends on a FIFO word boundary.
    pub fn new(segment_size: usize) -> Result<Self, ConfigError> {
        if segment_size == 0 || segment_size % 4 != 0 {
            return Err(ConfigError::InvalidSegmentSize(segment_size));
        }
        Ok(Self { segment_size })
    }

    #[inline]
    pub const fn segment_size(&self) -> usize {
        self.segment_size
    }
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
        }
    }
}

impl PacketAllocator for HeapAllocator {
    fn alloc(&mut self, len: usize) -> Option<PacketBuffer> {
        let mut segments = Vec::new();
        segments
            .try_reserve_exact(len.div_ceil(self.segment_size))
            .ok()?;
        let mut remaining = len;
        while remaining > 0 {
            let seg_len = remaining.min(self.segment_size);
            let mut segment = Vec::new();
            segment.try_reserve_exact(seg_len).ok()?;
            segment.resize(seg_len, 0);
            segments.push(segment);
            remaining -= seg_len;
        }
        Some(PacketBuffer::new(segments))
    }
}
