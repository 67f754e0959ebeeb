//! Address translator client.
//!
//! Every fired class that needs the translator port goes through [`translate`], which
//! applies the local alignment check before consulting the backend and folds the answer
//! into one of three outcomes.

use tracing::trace;

use crate::common::addr::{PhysAddr, VirtAddr};
use crate::common::error::FaultCause;
use crate::soc::traits::{TranslateRequest, Translator};
use crate::stats::LsuStats;

/// Outcome of one translation attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Translation {
    /// Translated without faults.
    Hit {
        /// Physical address.
        paddr: PhysAddr,
        /// The address may be cached.
        cacheable: bool,
    },
    /// The mapping is not cached; the operation must retry.
    Miss(VirtAddr),
    /// The access faults; nothing may be sent to memory.
    Fault(FaultCause),
}

/// Checks whether an access of `size` bytes at `addr` is naturally aligned.
///
/// # Arguments
///
/// * `addr` - The byte address of the access.
/// * `size` - The access width in bytes (1, 2, 4, or 8).
///
/// # Returns
///
/// `true` if the access is naturally aligned.
pub const fn is_aligned(addr: u64, size: u64) -> bool {
    size <= 1 || addr & (size - 1) == 0
}

/// Translates one request on `lane`.
///
/// An address-computation fault becomes an access fault and a misaligned address a
/// misaligned fault; neither reaches the backend.
pub(super) fn translate(
    translator: &mut dyn Translator,
    lane: usize,
    req: &TranslateRequest,
    addr_fault: bool,
    stats: &mut LsuStats,
) -> Translation {
    if addr_fault {
        return Translation::Fault(FaultCause::access_fault(req.cmd));
    }
    if !is_aligned(req.vaddr.val(), req.width.bytes()) {
        return Translation::Fault(FaultCause::misaligned(req.cmd));
    }

    stats.translations += 1;
    let resp = translator.translate(lane, req);
    trace!(lane, vaddr = req.vaddr.val(), ?resp, "translate");
    if let Some(cause) = resp.faults.cause(req.cmd) {
        Translation::Fault(cause)
    } else if resp.miss {
        stats.tlb_misses += 1;
        Translation::Miss(req.vaddr)
    } else {
        Translation::Hit {
            paddr: resp.paddr,
            cacheable: resp.cacheable,
        }
    }
}
