//! Global Model Constants.
//!
//! This module defines constants shared across the scheduler model. It includes:
//! 1. **Memory Constants:** Page and cache-line geometry used by translation and release bookkeeping.
//! 2. **Structural Limits:** Upper bound on replicated lanes.

/// Page size in bytes (4KB).
pub const PAGE_SIZE: u64 = 4096;

/// Number of bits to shift to convert between bytes and pages.
pub const PAGE_SHIFT: u64 = 12;

/// Mask for extracting the page offset from an address.
pub const PAGE_OFFSET_MASK: u64 = PAGE_SIZE - 1;

/// Cache line size in bytes; line releases are tracked at this granularity.
pub const CACHE_LINE_BYTES: u64 = 64;

/// Number of bits to shift to convert between bytes and cache lines.
pub const LINE_SHIFT: u64 = 6;

/// Maximum number of parallel memory lanes.
pub const MAX_LANES: usize = 2;
