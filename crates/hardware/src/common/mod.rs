//! Common utilities and types used throughout the scheduler model.
//!
//! This module provides fundamental building blocks that are shared across all components
//! of the model. It includes:
//! 1. **Address Types:** Strong types for virtual and physical addresses.
//! 2. **Constants:** Page/line geometry and structural limits.
//! 3. **Memory Access:** Access direction, width and privilege context.
//! 4. **Error Handling:** Architectural fault causes and configuration errors.

/// Address type definitions (physical and virtual addresses).
pub mod addr;

/// Common constants used throughout the model.
pub mod constants;

/// Memory access type definitions.
pub mod data;

/// Fault causes and error types.
pub mod error;

pub use addr::{PhysAddr, VirtAddr};
pub use constants::{CACHE_LINE_BYTES, MAX_LANES, PAGE_SHIFT};
pub use data::{AccessType, MemWidth, Privilege};
pub use error::{ConfigError, FaultCause};
