//! Sparse Backing Store.
//!
//! Byte-addressable storage for the reference memory backend. Only bytes that were
//! written occupy host memory; everything else reads as zero. Accesses are little-endian.

use std::collections::HashMap;

use crate::common::addr::PhysAddr;
use crate::common::data::MemWidth;

/// Sparse little-endian byte store.
#[derive(Clone, Debug, Default)]
pub struct SparseBuffer {
    bytes: HashMap<u64, u8>,
}

impl SparseBuffer {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `width` bytes starting at `addr`, zero-extended.
    pub fn read(&self, addr: PhysAddr, width: MemWidth) -> u64 {
        (0..width.bytes()).fold(0, |acc, i| {
            let byte = self
                .bytes
                .get(&addr.val().wrapping_add(i))
                .copied()
                .unwrap_or(0);
            acc | (u64::from(byte) << (i * 8))
        })
    }

    /// Writes the low `width` bytes of `data` starting at `addr`.
    pub fn write(&mut self, addr: PhysAddr, width: MemWidth, data: u64) {
        for i in 0..width.bytes() {
            let byte = (data >> (i * 8)) as u8;
            let _ = self.bytes.insert(addr.val().wrapping_add(i), byte);
        }
    }

    /// Writes a byte slice starting at `addr`.
    pub fn load(&mut self, addr: PhysAddr, data: &[u8]) {
        for (offset, byte) in (0u64..).zip(data) {
            let _ = self.bytes.insert(addr.val().wrapping_add(offset), *byte);
        }
    }

    /// Number of bytes ever written.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if nothing was ever written.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
