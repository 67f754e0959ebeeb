//! Physical and Virtual Address types.
//!
//! This module defines strong types for physical and virtual addresses to prevent
//! accidental mixing of address spaces. It provides the following:
//! 1. **Type Safety:** Distinguishes between virtual and physical address spaces at compile time.
//! 2. **Address Manipulation:** Helpers for page numbers, page offsets and cache-line addresses.
//! 3. **Translation Integration:** The currency exchanged with the translator backend.

use serde::{Deserialize, Serialize};

use super::constants::{LINE_SHIFT, PAGE_OFFSET_MASK, PAGE_SHIFT};

/// A virtual address as computed by the execution pipeline.
///
/// Virtual addresses must be translated before they may be sent to the memory backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VirtAddr(pub u64);

/// A physical address as understood by the memory backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PhysAddr(pub u64);

impl VirtAddr {
    /// Creates a new virtual address from a raw 64-bit value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit address value.
    #[inline(always)]
    pub const fn val(&self) -> u64 {
        self.0
    }

    /// Returns the virtual page number.
    pub const fn vpn(&self) -> u64 {
        self.0 >> PAGE_SHIFT
    }

    /// Extracts the page offset from the virtual address.
    ///
    /// The page offset is the lower 12 bits of the address, representing
    /// the byte offset within a 4KB page.
    pub const fn page_offset(&self) -> u64 {
        self.0 & PAGE_OFFSET_MASK
    }
}

impl PhysAddr {
    /// Creates a new physical address from a raw 64-bit value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit address value.
    #[inline(always)]
    pub const fn val(&self) -> u64 {
        self.0
    }

    /// Returns the cache-line number containing this address.
    pub const fn line(&self) -> u64 {
        self.0 >> LINE_SHIFT
    }

    /// Builds a physical address from a page number and the offset of `vaddr`.
    ///
    /// # Arguments
    ///
    /// * `ppn` - Physical page number.
    /// * `vaddr` - Virtual address supplying the page offset.
    pub const fn from_page(ppn: u64, vaddr: VirtAddr) -> Self {
        Self((ppn << PAGE_SHIFT) | vaddr.page_offset())
    }
}
