//! Memory Access Types.
//!
//! This module defines the classification of memory accesses used throughout the model.
//! These types are used for the following:
//! 1. **Permission Validation:** Checking read/write permissions in the translator.
//! 2. **Fault Generation:** Selecting the load or store flavour of a fault cause.
//! 3. **Request Encoding:** Describing what the memory backend is asked to do.

use serde::{Deserialize, Serialize};

/// Type of memory access operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    /// Data read access (loads). Requires read permission.
    Read,

    /// Data write access (stores). Requires write permission.
    Write,
}

/// Width of a memory access.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemWidth {
    /// 8-bit byte access.
    Byte,
    /// 16-bit half-word access.
    Half,
    /// 32-bit word access.
    Word,
    /// 64-bit double-word access.
    #[default]
    Double,
}

impl MemWidth {
    /// Returns the access size in bytes.
    pub const fn bytes(self) -> u64 {
        match self {
            Self::Byte => 1,
            Self::Half => 2,
            Self::Word => 4,
            Self::Double => 8,
        }
    }

    /// Returns the mask selecting the low `bytes()` bytes of a data word.
    pub const fn data_mask(self) -> u64 {
        match self {
            Self::Double => u64::MAX,
            _ => (1u64 << (self.bytes() * 8)) - 1,
        }
    }
}

/// Privilege context under which a translation is performed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    /// User mode; pages must carry the user bit.
    User,
    /// Supervisor mode; translation enabled, user pages still reachable.
    #[default]
    Supervisor,
    /// Machine mode; translation bypassed.
    Machine,
}
