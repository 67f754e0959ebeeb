//! Micro-operation descriptors and branch bookkeeping.
//!
//! Dispatch owns the descriptor of every memory operation; the scheduler keeps a copy in
//! the operation buffer and hands it back on every outbound interface. This module provides:
//! 1. **`MicroOp`:** The opaque-to-the-scheduler instruction descriptor.
//! 2. **`BranchMask`:** The set of unresolved branches an operation is speculative under.
//! 3. **`BranchUpdate`:** The per-cycle resolution/misprediction bundle.

use serde::{Deserialize, Serialize};

use crate::common::data::{AccessType, MemWidth};

/// Set of unresolved branch tags an operation depends on (one bit per tag).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchMask(pub u64);

impl BranchMask {
    /// The empty mask (non-speculative).
    pub const NONE: Self = Self(0);

    /// Creates a mask holding the single branch tag `tag`.
    pub const fn tag(tag: usize) -> Self {
        Self(1 << tag)
    }

    /// Returns true if no branch bits are set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if any bit is shared with `other`.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns the mask with all bits of `other` removed.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Returns the union of two masks.
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Kind of memory operation a descriptor names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemKind {
    /// Load; occupies a load-window slot.
    #[default]
    Load,
    /// Store; occupies a store-window slot.
    Store,
    /// Ordering fence; occupies a store-window slot and never executes.
    Fence,
}

/// Destination register of a load result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dest {
    /// Architectural (or physical) register number.
    pub reg: u16,
    /// Result goes to the floating-point register file.
    pub fp: bool,
}

/// Descriptor of one in-flight memory operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MicroOp {
    /// Program-order index (reorder buffer slot).
    pub rob_idx: usize,
    /// Operation buffer slot, assigned at dispatch.
    pub buf_idx: usize,
    /// Unresolved branches this operation is speculative under.
    pub br_mask: BranchMask,
    /// Load, store or fence.
    pub kind: MemKind,
    /// Access width.
    pub width: MemWidth,
    /// Destination register (loads only).
    pub dst: Dest,
    /// An exception is already known for this operation.
    pub exception: bool,
    /// Allocation tag stamped by the operation buffer at dispatch.
    pub generation: u32,
}

impl MicroOp {
    /// Creates a load descriptor.
    pub const fn load(rob_idx: usize, width: MemWidth, dst: Dest) -> Self {
        Self {
            rob_idx,
            buf_idx: 0,
            br_mask: BranchMask::NONE,
            kind: MemKind::Load,
            width,
            dst,
            exception: false,
            generation: 0,
        }
    }

    /// Creates a store descriptor.
    pub const fn store(rob_idx: usize, width: MemWidth) -> Self {
        Self {
            rob_idx,
            buf_idx: 0,
            br_mask: BranchMask::NONE,
            kind: MemKind::Store,
            width,
            dst: Dest { reg: 0, fp: false },
            exception: false,
            generation: 0,
        }
    }

    /// Creates an ordering-fence descriptor.
    pub const fn fence(rob_idx: usize) -> Self {
        Self {
            kind: MemKind::Fence,
            ..Self::store(rob_idx, MemWidth::Double)
        }
    }

    /// Returns a copy speculative under `mask`.
    #[must_use]
    pub const fn under(mut self, mask: BranchMask) -> Self {
        self.br_mask = mask;
        self
    }

    /// Returns a copy bound to buffer slot `idx`.
    #[must_use]
    pub const fn at(mut self, idx: usize) -> Self {
        self.buf_idx = idx;
        self
    }

    /// True for loads.
    pub const fn uses_ldq(&self) -> bool {
        matches!(self.kind, MemKind::Load)
    }

    /// True for stores and fences.
    pub const fn uses_stq(&self) -> bool {
        matches!(self.kind, MemKind::Store | MemKind::Fence)
    }

    /// True for ordering fences.
    pub const fn is_fence(&self) -> bool {
        matches!(self.kind, MemKind::Fence)
    }

    /// Memory command this operation issues.
    pub const fn access(&self) -> AccessType {
        if self.uses_ldq() {
            AccessType::Read
        } else {
            AccessType::Write
        }
    }

    /// Returns true if both descriptors name the same dynamic operation.
    pub const fn same_op(&self, other: &Self) -> bool {
        self.rob_idx == other.rob_idx && self.buf_idx == other.buf_idx
    }

    /// Like [`same_op`](Self::same_op), but also requires the same buffer allocation.
    ///
    /// A squashed operation and its replacement can share both indices; only the
    /// generation tells a late memory response for the former from one for the latter.
    pub const fn same_instance(&self, other: &Self) -> bool {
        self.same_op(other) && self.generation == other.generation
    }
}

/// Branch resolution bundle for one cycle.
///
/// `resolved` lists every branch that resolved this cycle (correctly or not);
/// `mispredicted` is the subset that was mispredicted. Operations speculative
/// under a mispredicted branch are killed; the resolved bits are cleared from
/// every surviving operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BranchUpdate {
    /// Branches resolved this cycle.
    pub resolved: BranchMask,
    /// Branches found mispredicted this cycle.
    pub mispredicted: BranchMask,
}

impl BranchUpdate {
    /// A misprediction of the branches in `mask`.
    pub const fn mispredict(mask: BranchMask) -> Self {
        Self {
            resolved: mask,
            mispredicted: mask,
        }
    }

    /// A correct resolution of the branches in `mask`.
    pub const fn resolve(mask: BranchMask) -> Self {
        Self {
            resolved: mask,
            mispredicted: BranchMask::NONE,
        }
    }

    /// Returns true if `uop` is killed by this update.
    pub const fn kills(&self, uop: &MicroOp) -> bool {
        uop.br_mask.intersects(self.mispredicted)
    }

    /// Clears resolved bits from `uop`'s mask.
    pub const fn update(&self, uop: &mut MicroOp) {
        uop.br_mask = uop.br_mask.without(self.resolved);
    }
}
