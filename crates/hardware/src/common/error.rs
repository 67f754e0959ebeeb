//! Fault and Error definitions.
//!
//! This module defines the error handling vocabulary of the model. It provides:
//! 1. **Fault Causes:** Architectural exceptions a memory operation can raise.
//! 2. **Configuration Errors:** Rejections produced while validating or loading a [`Config`](crate::Config).
//!
//! Structural violations (double allocation, committing an empty slot, squashing a
//! committed store) are not represented here: they are asserted where they occur.

use std::fmt;

use thiserror::Error;

use super::data::AccessType;

/// Architectural fault raised by a memory operation.
///
/// Each variant corresponds to a RISC-V synchronous exception cause that the
/// load/store scheduler can report, plus the ordering-violation class used by
/// the relaxed memory model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultCause {
    /// Load address misaligned exception.
    LoadAddressMisaligned,

    /// Load access fault exception.
    ///
    /// Raised when the address computation failed or the physical address is not
    /// accessible.
    LoadAccessFault,

    /// Store/AMO address misaligned exception.
    StoreAddressMisaligned,

    /// Store/AMO access fault exception.
    StoreAccessFault,

    /// Load page fault exception.
    LoadPageFault,

    /// Store/AMO page fault exception.
    StorePageFault,

    /// Memory ordering violation.
    ///
    /// Only produced by associative load/store hazard detection, which the strict
    /// ordering model does not perform.
    OrderingViolation,
}

impl FaultCause {
    /// Returns the misaligned-address cause for the given access.
    pub const fn misaligned(access: AccessType) -> Self {
        match access {
            AccessType::Read => Self::LoadAddressMisaligned,
            AccessType::Write => Self::StoreAddressMisaligned,
        }
    }

    /// Returns the page-fault cause for the given access.
    pub const fn page_fault(access: AccessType) -> Self {
        match access {
            AccessType::Read => Self::LoadPageFault,
            AccessType::Write => Self::StorePageFault,
        }
    }

    /// Returns the access-fault cause for the given access.
    pub const fn access_fault(access: AccessType) -> Self {
        match access {
            AccessType::Read => Self::LoadAccessFault,
            AccessType::Write => Self::StoreAccessFault,
        }
    }

    /// Returns the RISC-V `mcause` exception code, or `None` for causes without one.
    pub const fn code(self) -> Option<u64> {
        match self {
            Self::LoadAddressMisaligned => Some(4),
            Self::LoadAccessFault => Some(5),
            Self::StoreAddressMisaligned => Some(6),
            Self::StoreAccessFault => Some(7),
            Self::LoadPageFault => Some(13),
            Self::StorePageFault => Some(15),
            Self::OrderingViolation => None,
        }
    }
}

impl fmt::Display for FaultCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadAddressMisaligned => write!(f, "LoadAddressMisaligned"),
            Self::LoadAccessFault => write!(f, "LoadAccessFault"),
            Self::StoreAddressMisaligned => write!(f, "StoreAddressMisaligned"),
            Self::StoreAccessFault => write!(f, "StoreAccessFault"),
            Self::LoadPageFault => write!(f, "LoadPageFault"),
            Self::StorePageFault => write!(f, "StorePageFault"),
            Self::OrderingViolation => write!(f, "OrderingViolation"),
        }
    }
}

impl std::error::Error for FaultCause {}

/// Error returned when a configuration cannot be loaded or is not realisable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The number of memory lanes is outside `1..=MAX_LANES`.
    #[error("lane count {0} is not supported (expected 1 or 2)")]
    Lanes(usize),

    /// The operation buffer cannot hold a single entry.
    #[error("operation buffer needs at least 2 slots, got {0}")]
    BufferTooSmall(usize),

    /// A load or store window is empty or larger than the usable buffer.
    #[error("{name} window of {entries} entries does not fit a buffer of {capacity} slots")]
    Window {
        /// Which window (`"load"` or `"store"`).
        name: &'static str,
        /// Requested window size.
        entries: usize,
        /// Buffer capacity the window must fit in.
        capacity: usize,
    },

    /// A width or size parameter that must be non-zero was zero.
    #[error("{0} must be non-zero")]
    Zero(&'static str),
}
