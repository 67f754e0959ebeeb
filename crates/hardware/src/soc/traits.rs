//! Collaborator interfaces of the scheduler.
//!
//! The scheduler talks to two external agents. This module defines:
//! 1. **Translator:** Same-cycle address translation with a miss-retry protocol.
//! 2. **MemoryBackend:** A request/response memory port with nacks, kills and line releases.
//!
//! The reference implementations live in [`crate::soc::memory`] and [`crate::soc::translate`];
//! tests substitute scripted doubles.

use crate::common::addr::{PhysAddr, VirtAddr};
use crate::common::data::{AccessType, MemWidth, Privilege};
use crate::common::error::FaultCause;
use crate::core::lsu::io::{MemRequest, MemoryEvents, SFenceReq};

/// One translation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TranslateRequest {
    /// Address to translate.
    pub vaddr: VirtAddr,
    /// Access width.
    pub width: MemWidth,
    /// Read or write.
    pub cmd: AccessType,
    /// Privilege context.
    pub privilege: Privilege,
}

/// Fault flags reported by the translator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FaultFlags {
    /// The address is not naturally aligned.
    pub misaligned: bool,
    /// The page is unmapped or lacks the needed permission.
    pub page: bool,
    /// The physical address is not accessible.
    pub access: bool,
}

impl FaultFlags {
    /// Returns true if any flag is set.
    pub const fn any(self) -> bool {
        self.misaligned || self.page || self.access
    }

    /// Highest-priority cause among the set flags for an access of kind `cmd`.
    pub const fn cause(self, cmd: AccessType) -> Option<FaultCause> {
        if self.misaligned {
            Some(FaultCause::misaligned(cmd))
        } else if self.page {
            Some(FaultCause::page_fault(cmd))
        } else if self.access {
            Some(FaultCause::access_fault(cmd))
        } else {
            None
        }
    }
}

/// Same-cycle translation answer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TranslateResponse {
    /// Physical address (meaningful only on a fault-free hit).
    pub paddr: PhysAddr,
    /// The mapping is not cached; retry once [`Translator::miss_ready`] holds.
    pub miss: bool,
    /// The physical address is cacheable.
    pub cacheable: bool,
    /// Fault flags.
    pub faults: FaultFlags,
}

impl TranslateResponse {
    /// A fault-free hit.
    pub const fn hit(paddr: PhysAddr, cacheable: bool) -> Self {
        Self {
            paddr,
            miss: false,
            cacheable,
            faults: FaultFlags {
                misaligned: false,
                page: false,
                access: false,
            },
        }
    }

    /// A miss.
    pub const fn miss() -> Self {
        Self {
            paddr: PhysAddr(0),
            miss: true,
            cacheable: false,
            faults: FaultFlags {
                misaligned: false,
                page: false,
                access: false,
            },
        }
    }
}

/// Address translation backend.
///
/// The scheduler calls [`translate`](Self::translate) once per lane that fired a class
/// needing the translator, and reads the answer in the same cycle.
pub trait Translator {
    /// Translates one address for `lane`.
    ///
    /// # Arguments
    ///
    /// * `lane` - Requesting lane.
    /// * `req` - Address, width, command and privilege.
    ///
    /// # Returns
    ///
    /// The physical address with miss, cacheability and fault flags.
    fn translate(&mut self, lane: usize, req: &TranslateRequest) -> TranslateResponse;

    /// True when a previously missed translation may be retried.
    fn miss_ready(&self) -> bool;

    /// Applies an address-space fence.
    fn sfence(&mut self, req: &SFenceReq);

    /// Advances the backend by one cycle.
    fn tick(&mut self) {}
}

/// Memory backend reached through the scheduler's request port.
///
/// Requests are accepted with a fire-when-both-ready handshake and answered one or
/// more cycles later with either a response or a nack, possibly out of order. A request
/// killed the cycle after it was accepted is never performed and is answered with a nack.
pub trait MemoryBackend {
    /// Request channel ready on `lane` this cycle.
    fn ready(&self, lane: usize) -> bool;

    /// Drains the traffic due this cycle.
    ///
    /// # Arguments
    ///
    /// * `lanes` - Number of lanes to report readiness for.
    fn events(&mut self, lanes: usize) -> MemoryEvents;

    /// Accepts a request on `lane`.
    fn request(&mut self, lane: usize, req: MemRequest);

    /// Kills the request accepted on `lane` in the previous cycle.
    fn kill(&mut self, lane: usize);

    /// Acknowledges the pending line release.
    fn ack_release(&mut self);

    /// Advances the backend by one cycle.
    fn tick(&mut self);
}
