//! Per-lane resource arbitration.
//!
//! Every cycle the scheduler turns the set of asserted candidate classes on a lane into
//! the set that actually fires. It provides:
//! 1. **Classes:** The twelve candidate classes in strict static priority order.
//! 2. **Resources:** The four single-use-per-cycle resources each class needs.
//! 3. **Arbitration:** A pure fold over the priority list threading the free-resource record.
//! 4. **Age priority:** A rotating priority encoder selecting the oldest eligible slot.

use std::fmt;

/// Single-use-per-cycle resources of one lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Resources {
    /// Translator port.
    pub tlb: bool,
    /// Memory request port.
    pub mem: bool,
    /// Associative hazard-search unit.
    pub hazard: bool,
    /// Retirement-notify (clear-busy) port.
    pub retire: bool,
}

impl Resources {
    /// Every resource of a lane, all free.
    pub const ALL: Self = Self {
        tlb: true,
        mem: true,
        hazard: true,
        retire: true,
    };

    /// No resources.
    pub const NONE: Self = Self {
        tlb: false,
        mem: false,
        hazard: false,
        retire: false,
    };

    /// Returns true if every resource in `need` is present in `self`.
    pub const fn covers(self, need: Self) -> bool {
        (!need.tlb || self.tlb)
            && (!need.mem || self.mem)
            && (!need.hazard || self.hazard)
            && (!need.retire || self.retire)
    }

    /// Returns `self` with every resource in `used` removed.
    #[must_use]
    pub const fn consume(self, used: Self) -> Self {
        Self {
            tlb: self.tlb && !used.tlb,
            mem: self.mem && !used.mem,
            hazard: self.hazard && !used.hazard,
            retire: self.retire && !used.retire,
        }
    }
}

/// Candidate class, declared in priority order (highest first).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FireClass {
    /// Load arriving from execute.
    LoadIncoming,
    /// Store arriving with both address and data.
    StadIncoming,
    /// Store arriving with its address only.
    StaIncoming,
    /// Store arriving with its data only.
    StdIncoming,
    /// Address-space fence.
    SFence,
    /// Cache-line release notification from the memory backend.
    Release,
    /// New request from the secondary client.
    SecondaryIncoming,
    /// Re-send of a nacked secondary request.
    SecondaryReplay,
    /// Translation retry for a load that missed.
    LoadRetry,
    /// Translation retry for a store address that missed.
    StaRetry,
    /// Re-send of a translated load that has not executed.
    LoadWakeup,
    /// Committed store sent to memory.
    StoreCommit,
}

impl FireClass {
    /// All classes in priority order.
    pub const PRIORITY: [Self; 12] = [
        Self::LoadIncoming,
        Self::StadIncoming,
        Self::StaIncoming,
        Self::StdIncoming,
        Self::SFence,
        Self::Release,
        Self::SecondaryIncoming,
        Self::SecondaryReplay,
        Self::LoadRetry,
        Self::StaRetry,
        Self::LoadWakeup,
        Self::StoreCommit,
    ];

    /// Resources this class consumes when it fires.
    pub const fn needs(self) -> Resources {
        let (tlb, mem, hazard, retire) = match self {
            Self::LoadIncoming | Self::LoadRetry => (true, true, true, false),
            Self::StadIncoming | Self::StaIncoming | Self::StaRetry => (true, false, true, true),
            Self::StdIncoming => (false, false, false, true),
            Self::SFence => (true, false, false, true),
            Self::Release => (false, false, true, false),
            Self::SecondaryIncoming => (true, true, false, false),
            Self::SecondaryReplay | Self::StoreCommit => (false, true, false, false),
            Self::LoadWakeup => (false, true, true, false),
        };
        Resources {
            tlb,
            mem,
            hazard,
            retire,
        }
    }

    /// Short lowercase name used in logs and statistics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::LoadIncoming => "load_incoming",
            Self::StadIncoming => "stad_incoming",
            Self::StaIncoming => "sta_incoming",
            Self::StdIncoming => "std_incoming",
            Self::SFence => "sfence",
            Self::Release => "release",
            Self::SecondaryIncoming => "secondary_incoming",
            Self::SecondaryReplay => "secondary_replay",
            Self::LoadRetry => "load_retry",
            Self::StaRetry => "sta_retry",
            Self::LoadWakeup => "load_wakeup",
            Self::StoreCommit => "store_commit",
        }
    }

    const fn bit(self) -> u16 {
        1 << self as u8
    }
}

impl fmt::Display for FireClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of candidate classes on one lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ClassSet(u16);

impl ClassSet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Adds `class` to the set.
    pub const fn insert(&mut self, class: FireClass) {
        self.0 |= class.bit();
    }

    /// Adds `class` if `cond` holds.
    pub const fn insert_if(&mut self, class: FireClass, cond: bool) {
        if cond {
            self.insert(class);
        }
    }

    /// Returns true if `class` is in the set.
    pub const fn contains(self, class: FireClass) -> bool {
        self.0 & class.bit() != 0
    }

    /// Returns true if the set is empty.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Members in priority order.
    pub fn iter(self) -> impl Iterator<Item = FireClass> {
        FireClass::PRIORITY
            .into_iter()
            .filter(move |c| self.contains(*c))
    }
}

impl FromIterator<FireClass> for ClassSet {
    fn from_iter<I: IntoIterator<Item = FireClass>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for class in iter {
            set.insert(class);
        }
        set
    }
}

/// Resolves which asserted candidates fire on one lane.
///
/// Classes are visited in priority order; a class fires if it is asserted and every
/// resource it needs is still free, and firing removes those resources for the rest
/// of the cycle. There is no backtracking.
///
/// # Arguments
///
/// * `asserted` - Candidate classes asserted on the lane this cycle.
/// * `free` - Resources available at the start of the cycle.
///
/// # Returns
///
/// The set of classes that fire.
pub fn arbitrate(asserted: ClassSet, free: Resources) -> ClassSet {
    let (fired, _) = FireClass::PRIORITY.into_iter().fold(
        (ClassSet::EMPTY, free),
        |(mut fired, free), class| {
            let need = class.needs();
            if asserted.contains(class) && free.covers(need) {
                fired.insert(class);
                (fired, free.consume(need))
            } else {
                (fired, free)
            }
        },
    );
    fired
}

/// Rotating priority encoder.
///
/// Scans `span` slots of a circular structure of `capacity` slots starting at `base`
/// and returns the first index for which `eligible` holds.
///
/// # Arguments
///
/// * `base` - Index the scan starts from (the relevant head pointer).
/// * `span` - Number of slots to examine.
/// * `capacity` - Size of the circular structure.
/// * `eligible` - Predicate on slot indices.
///
/// # Returns
///
/// The oldest eligible index, or `None`.
pub fn age_priority(
    base: usize,
    span: usize,
    capacity: usize,
    mut eligible: impl FnMut(usize) -> bool,
) -> Option<usize> {
    (0..span.min(capacity))
        .map(|i| (base + i) % capacity)
        .find(|&idx| eligible(idx))
}
