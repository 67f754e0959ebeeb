//! Operation buffer entries.
//!
//! Every occupied slot of the operation buffer holds exactly one of two payloads. The
//! payloads share no behaviour, only a slot, so they are variants of one enum rather
//! than implementations of a common trait.

use crate::common::addr::{PhysAddr, VirtAddr};
use crate::core::uop::MicroOp;

/// Address held by an entry: absent until execute supplies it, then either the
/// untranslated virtual address (after a translation miss) or the physical address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EntryAddr {
    /// No address yet.
    #[default]
    Absent,
    /// Virtual address awaiting a translation retry.
    Virtual(VirtAddr),
    /// Translated physical address.
    Physical(PhysAddr),
}

impl EntryAddr {
    /// True once any address has been recorded.
    pub const fn is_present(&self) -> bool {
        !matches!(self, Self::Absent)
    }

    /// True while the address is untranslated.
    pub const fn is_virtual(&self) -> bool {
        matches!(self, Self::Virtual(_))
    }

    /// The physical address, if translated.
    pub const fn physical(&self) -> Option<PhysAddr> {
        match self {
            Self::Physical(pa) => Some(*pa),
            _ => None,
        }
    }

    /// The virtual address, if translation is still pending.
    pub const fn virt(&self) -> Option<VirtAddr> {
        match self {
            Self::Virtual(va) => Some(*va),
            _ => None,
        }
    }
}

/// Load payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadEntry {
    /// Descriptor supplied by dispatch.
    pub uop: MicroOp,
    /// Target address.
    pub addr: EntryAddr,
    /// Physical address lies in uncacheable memory.
    pub is_uncacheable: bool,
    /// Request sent to memory; cleared again by a nack.
    pub executed: bool,
    /// Response received and result delivered.
    pub succeeded: bool,
    /// Ordering violation detected against an older store.
    pub order_fail: bool,
    /// A line release for this address was observed after execution.
    pub observed: bool,
    /// Store that could have forwarded data (unused by the strict model).
    pub forward_from: Option<usize>,
}

impl LoadEntry {
    /// Creates a fresh load entry.
    pub const fn new(uop: MicroOp) -> Self {
        Self {
            uop,
            addr: EntryAddr::Absent,
            is_uncacheable: false,
            executed: false,
            succeeded: false,
            order_fail: false,
            observed: false,
            forward_from: None,
        }
    }
}

/// Store (or fence) payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreEntry {
    /// Descriptor supplied by dispatch.
    pub uop: MicroOp,
    /// Target address.
    pub addr: EntryAddr,
    /// Data payload; arrives independently of the address.
    pub data: Option<u64>,
    /// Set by the commit sequencer.
    pub committed: bool,
    /// Set by the memory backend acknowledgement.
    pub succeeded: bool,
}

impl StoreEntry {
    /// Creates a fresh store entry.
    pub const fn new(uop: MicroOp) -> Self {
        Self {
            uop,
            addr: EntryAddr::Absent,
            data: None,
            committed: false,
            succeeded: false,
        }
    }

    /// Address translated, data present and no exception: the store can retire.
    pub const fn is_complete(&self) -> bool {
        !self.uop.exception && self.data.is_some() && self.addr.physical().is_some()
    }
}

/// Contents of one occupied buffer slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemEntry {
    /// A load.
    Load(LoadEntry),
    /// A store or fence.
    Store(StoreEntry),
}

impl MemEntry {
    /// Creates the entry matching the descriptor's kind.
    pub const fn for_uop(uop: MicroOp) -> Self {
        if uop.uses_ldq() {
            Self::Load(LoadEntry::new(uop))
        } else {
            Self::Store(StoreEntry::new(uop))
        }
    }

    /// Descriptor of the operation.
    pub const fn uop(&self) -> &MicroOp {
        match self {
            Self::Load(ld) => &ld.uop,
            Self::Store(st) => &st.uop,
        }
    }

    /// Mutable descriptor of the operation.
    pub const fn uop_mut(&mut self) -> &mut MicroOp {
        match self {
            Self::Load(ld) => &mut ld.uop,
            Self::Store(st) => &mut st.uop,
        }
    }

    /// True for loads.
    pub const fn is_load(&self) -> bool {
        matches!(self, Self::Load(_))
    }

    /// True for stores and fences.
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
