//! Per-cycle interface bundles.
//!
//! The scheduler exchanges exactly one [`CycleInputs`] and one [`CycleOutputs`] with its
//! surroundings every tick. The translator is the only collaborator queried inside the
//! tick (it answers the same cycle); everything else is carried in these bundles.

use crate::common::addr::{PhysAddr, VirtAddr};
use crate::common::data::{AccessType, MemWidth, Privilege};
use crate::common::error::FaultCause;
use crate::core::uop::{BranchUpdate, MicroOp};

use super::exception::FaultRecord;
use super::scheduler::ClassSet;

/// Address-space fence request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SFenceReq {
    /// Restrict the flush to this address; `None` flushes every mapping.
    pub vaddr: Option<VirtAddr>,
}

/// Request from an execution lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExeRequest {
    /// Descriptor of the operation; `buf_idx` names its slot.
    pub uop: MicroOp,
    /// Computed virtual address.
    pub addr: Option<VirtAddr>,
    /// Address computation itself faulted.
    pub addr_fault: bool,
    /// Store data.
    pub data: Option<u64>,
    /// Address-space fence; the descriptor is not held in the buffer.
    pub sfence: Option<SFenceReq>,
}

impl ExeRequest {
    /// A load or store address (no data).
    pub const fn addr(uop: MicroOp, vaddr: VirtAddr) -> Self {
        Self {
            uop,
            addr: Some(vaddr),
            addr_fault: false,
            data: None,
            sfence: None,
        }
    }

    /// A store with both address and data.
    pub const fn addr_data(uop: MicroOp, vaddr: VirtAddr, data: u64) -> Self {
        Self {
            data: Some(data),
            ..Self::addr(uop, vaddr)
        }
    }

    /// Store data only.
    pub const fn data(uop: MicroOp, data: u64) -> Self {
        Self {
            uop,
            addr: None,
            addr_fault: false,
            data: Some(data),
            sfence: None,
        }
    }

    /// An address-space fence.
    pub const fn sfence(uop: MicroOp, req: SFenceReq) -> Self {
        Self {
            uop,
            addr: None,
            addr_fault: false,
            data: None,
            sfence: Some(req),
        }
    }

    /// Carries an address (or an address fault).
    pub const fn has_addr(&self) -> bool {
        self.addr.is_some() || self.addr_fault
    }
}

/// Request sent to the memory backend on one lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemRequest {
    /// Physical address.
    pub addr: PhysAddr,
    /// Store data (ignored for reads).
    pub data: u64,
    /// Read or write.
    pub cmd: AccessType,
    /// Access width.
    pub width: MemWidth,
    /// Originating operation.
    pub uop: MicroOp,
    /// Issued on behalf of the secondary client.
    pub secondary: bool,
}

/// Response or nack from the memory backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemResponse {
    /// Lane the response is delivered on.
    pub lane: usize,
    /// Originating operation.
    pub uop: MicroOp,
    /// Read data (zero for writes and nacks).
    pub data: u64,
    /// Belongs to the secondary client.
    pub secondary: bool,
}

/// Cache-line release notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineRelease {
    /// Any address within the released line.
    pub addr: PhysAddr,
}

/// Everything the memory backend reports at the start of a cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryEvents {
    /// Request channel ready, per lane.
    pub ready: Vec<bool>,
    /// Responses, at most one per lane.
    pub responses: Vec<MemResponse>,
    /// Nacked requests that must be re-issued.
    pub nacks: Vec<MemResponse>,
    /// Pending line release, held until acknowledged.
    pub release: Option<LineRelease>,
    /// Every previously accepted write is globally visible.
    pub ordered: bool,
}

impl MemoryEvents {
    /// A quiet, ordered backend ready on `lanes` lanes.
    pub fn idle(lanes: usize) -> Self {
        Self {
            ready: vec![true; lanes],
            ordered: true,
            ..Self::default()
        }
    }

    /// Request channel ready on `lane`.
    pub fn is_ready(&self, lane: usize) -> bool {
        self.ready.get(lane).copied().unwrap_or(false)
    }
}

/// Request from the secondary client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SecondaryReq {
    /// Virtual address.
    pub addr: VirtAddr,
    /// Read or write.
    pub cmd: AccessType,
    /// Access width.
    pub width: MemWidth,
    /// Write data.
    pub data: u64,
}

/// Inputs from the secondary client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SecondaryInputs {
    /// New request, accepted only while the client interface is ready.
    pub req: Option<SecondaryReq>,
    /// Kill the request in its first stage.
    pub s1_kill: bool,
    /// Kill the request in its second stage.
    pub s2_kill: bool,
}

/// Completed secondary transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SecondaryResp {
    /// Address of the request.
    pub addr: VirtAddr,
    /// Read data (zero for writes).
    pub data: u64,
}

/// Outputs to the secondary client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SecondaryOutputs {
    /// A new request can be accepted this cycle.
    pub ready: bool,
    /// Transaction completed.
    pub resp: Option<SecondaryResp>,
    /// The request was not performed and must be re-sent by the client.
    pub nack: bool,
    /// The request faulted in translation.
    pub fault: Option<FaultCause>,
}

/// All inputs of one cycle.
#[derive(Clone, Debug, Default)]
pub struct CycleInputs {
    /// Operations offered by dispatch, in program order.
    pub dispatch: Vec<MicroOp>,
    /// Execute requests, indexed by lane.
    pub exe: Vec<Option<ExeRequest>>,
    /// Operations committing this cycle, in program order.
    pub commit: Vec<MicroOp>,
    /// The operation at the commit head is a load.
    pub load_at_head: bool,
    /// Program-order index of the commit head.
    pub rob_head: usize,
    /// Global exception: flush every speculative operation.
    pub exception: bool,
    /// Branch resolution bundle.
    pub brupdate: BranchUpdate,
    /// Privilege context for translations.
    pub privilege: Privilege,
    /// Memory backend status and returned traffic.
    pub mem: MemoryEvents,
    /// Secondary client interface.
    pub secondary: SecondaryInputs,
}

impl CycleInputs {
    /// A cycle with no traffic on `lanes` lanes and an idle backend.
    pub fn idle(lanes: usize) -> Self {
        Self {
            exe: vec![None; lanes],
            mem: MemoryEvents::idle(lanes),
            ..Self::default()
        }
    }
}

/// Outcome of one offered dispatch slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchAck {
    /// Enqueued at this buffer index.
    Accepted(usize),
    /// Not enqueued: the buffer or the relevant window is full.
    Stalled,
    /// Not enqueued: the operation already carries an exception.
    Skipped,
}

/// Loaded value written back to a register file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadResult {
    /// Descriptor of the load (carries the destination).
    pub uop: MicroOp,
    /// Loaded data.
    pub data: u64,
}

/// Writeback ports of one lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LaneResults {
    /// Integer register file port.
    pub int: Option<LoadResult>,
    /// Floating-point register file port.
    pub fp: Option<LoadResult>,
}

/// All outputs of one cycle.
#[derive(Clone, Debug, Default)]
pub struct CycleOutputs {
    /// One acknowledgement per offered dispatch slot.
    pub dispatch: Vec<DispatchAck>,
    /// No further load can be dispatched next cycle.
    pub ldq_full: bool,
    /// No further store can be dispatched next cycle.
    pub stq_full: bool,
    /// Load results, indexed by lane.
    pub results: Vec<LaneResults>,
    /// Operations whose execution finished (retirement notifications).
    pub clear_busy: Vec<MicroOp>,
    /// Oldest fault of the cycle.
    pub fault: Option<FaultRecord>,
    /// Memory requests, indexed by lane.
    pub mem_requests: Vec<Option<MemRequest>>,
    /// Kill the request issued on the lane last cycle.
    pub kill: Vec<bool>,
    /// The pending line release was consumed.
    pub release_ack: bool,
    /// A fence is waiting for the backend to drain its writes.
    pub force_order: bool,
    /// Secondary client interface.
    pub secondary: SecondaryOutputs,
    /// Candidate classes that fired, indexed by lane.
    pub fired: Vec<ClassSet>,
}

impl CycleOutputs {
    pub(super) fn new(lanes: usize) -> Self {
        Self {
            results: vec![LaneResults::default(); lanes],
            mem_requests: vec![None; lanes],
            kill: vec![false; lanes],
            fired: vec![ClassSet::EMPTY; lanes],
            ..Self::default()
        }
    }
}
