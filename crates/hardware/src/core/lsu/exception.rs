//! Oldest-fault arbitration.
//!
//! Faults raised on any lane are latched for one cycle and then compared by
//! program-order age relative to the commit head. The oldest one is exposed once.
//! Ordering violations form a second, lower-precedence source; they only win when
//! strictly older than every latched fault.

use std::fmt;

use crate::common::error::FaultCause;
use crate::core::uop::{BranchUpdate, MicroOp};

/// A fault together with the operation and address that raised it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaultRecord {
    /// Architectural cause.
    pub cause: FaultCause,
    /// Faulting (virtual) address.
    pub addr: u64,
    /// Descriptor of the faulting operation.
    pub uop: MicroOp,
}

impl fmt::Display for FaultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {:#x} (rob {}, slot {})",
            self.cause, self.addr, self.uop.rob_idx, self.uop.buf_idx
        )
    }
}

/// Program-order age of `rob_idx` relative to the commit head.
///
/// # Arguments
///
/// * `rob_idx` - Index to measure.
/// * `rob_head` - Current commit head.
/// * `rob_entries` - Reorder buffer size.
pub const fn rob_age(rob_idx: usize, rob_head: usize, rob_entries: usize) -> usize {
    (rob_idx % rob_entries + rob_entries - rob_head % rob_entries) % rob_entries
}

/// Selects the fault to expose this cycle.
///
/// # Arguments
///
/// * `latched` - Faults latched last cycle, indexed by lane.
/// * `ordering` - Descriptors of loads flagged with an ordering violation.
/// * `rob_head` - Current commit head.
/// * `rob_entries` - Reorder buffer size.
/// * `brupdate` - This cycle's branch update.
/// * `exception` - The pipeline signalled a global exception this cycle.
///
/// # Returns
///
/// The oldest surviving fault, or `None`.
pub fn arbitrate_faults(
    latched: &[Option<FaultRecord>],
    ordering: impl IntoIterator<Item = MicroOp>,
    rob_head: usize,
    rob_entries: usize,
    brupdate: &BranchUpdate,
    exception: bool,
) -> Option<FaultRecord> {
    let age = |uop: &MicroOp| rob_age(uop.rob_idx, rob_head, rob_entries);

    // Lanes are visited in order and only a strictly older fault replaces the
    // current winner, so ties go to the lowest lane.
    let mut winner: Option<FaultRecord> = None;
    for rec in latched.iter().flatten() {
        if winner.is_none_or(|w| age(&rec.uop) < age(&w.uop)) {
            winner = Some(*rec);
        }
    }

    for uop in ordering {
        if winner.is_none_or(|w| age(&uop) < age(&w.uop)) {
            winner = Some(FaultRecord {
                cause: FaultCause::OrderingViolation,
                addr: 0,
                uop,
            });
        }
    }

    winner.filter(|w| !exception && !brupdate.kills(&w.uop))
}
