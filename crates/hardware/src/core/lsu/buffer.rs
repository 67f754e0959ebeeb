//! Unified circular operation buffer.
//!
//! Loads and stores share one circular queue in dispatch order. The buffer owns every
//! index into that queue and is the only writer of them. It provides:
//! 1. **Allocation:** `enqueue` writes at `tail`; full is `wrap_inc(tail) == head`.
//! 2. **Store pointers:** `execute_head` (next store to send) and `commit_head` (end of the
//!    committed prefix), with `head <= execute_head <= commit_head <= tail` in circular order.
//! 3. **Load pointer:** `ldq_head`, the scan base for load retries and wakeups.
//! 4. **Release/rollback:** `release_head` frees the oldest slot; `retract_tail` reclaims
//!    trailing slots emptied by a squash or flush so their indices are reused.
//! 5. **Generations:** every allocation stamps a fresh wrapping tag into the descriptor, so
//!    a reused slot never matches traffic addressed to its previous occupant.
//!
//! Pointers equal to a slot that is released or retracted are dragged along so the
//! circular ordering above always holds.

use super::entry::{LoadEntry, MemEntry, StoreEntry};
use crate::core::uop::MicroOp;

/// Circular buffer of in-flight memory operations.
#[derive(Clone, Debug)]
pub struct OperationBuffer {
    slots: Vec<Option<MemEntry>>,
    head: usize,
    tail: usize,
    execute_head: usize,
    commit_head: usize,
    ldq_head: usize,
    loads: usize,
    stores: usize,
    next_generation: u32,
}

impl OperationBuffer {
    /// Creates an empty buffer with `capacity` slots (one is always left free).
    ///
    /// # Panics
    ///
    /// Panics if `capacity < 2`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "operation buffer needs at least 2 slots");
        Self {
            slots: vec![None; capacity],
            head: 0,
            tail: 0,
            execute_head: 0,
            commit_head: 0,
            ldq_head: 0,
            loads: 0,
            stores: 0,
            next_generation: 0,
        }
    }

    /// Number of slots.
    pub const fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Oldest slot of the live region.
    pub const fn head(&self) -> usize {
        self.head
    }

    /// Next slot dispatch will write.
    pub const fn tail(&self) -> usize {
        self.tail
    }

    /// Next store to be sent to memory.
    pub const fn execute_head(&self) -> usize {
        self.execute_head
    }

    /// One past the youngest committed store.
    pub const fn commit_head(&self) -> usize {
        self.commit_head
    }

    /// Scan base for load retries and wakeups.
    pub const fn ldq_head(&self) -> usize {
        self.ldq_head
    }

    /// Wrap-increments `idx`.
    pub const fn wrap_inc(&self, idx: usize) -> usize {
        if idx + 1 == self.slots.len() { 0 } else { idx + 1 }
    }

    /// Wrap-decrements `idx`.
    pub const fn wrap_dec(&self, idx: usize) -> usize {
        if idx == 0 { self.slots.len() - 1 } else { idx - 1 }
    }

    /// Distance of `idx` from `base` in circular order.
    pub const fn distance(&self, base: usize, idx: usize) -> usize {
        (idx + self.slots.len() - base) % self.slots.len()
    }

    /// True if `idx` lies in the live region `[head, tail)`.
    pub const fn in_live_region(&self, idx: usize) -> bool {
        self.distance(self.head, idx) < self.distance(self.head, self.tail)
    }

    /// True when no further operation can be enqueued.
    pub const fn is_full(&self) -> bool {
        self.wrap_inc(self.tail) == self.head
    }

    /// True when the live region is empty.
    pub const fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Number of occupied slots.
    pub const fn occupancy(&self) -> usize {
        self.loads + self.stores
    }

    /// Number of live loads.
    pub const fn live_loads(&self) -> usize {
        self.loads
    }

    /// Number of live stores and fences.
    pub const fn live_stores(&self) -> usize {
        self.stores
    }

    const fn count_mut(&mut self, entry: &MemEntry) -> &mut usize {
        if entry.is_load() {
            &mut self.loads
        } else {
            &mut self.stores
        }
    }

    /// Appends `uop` at the tail and returns its slot index.
    ///
    /// The descriptor's `buf_idx` is rewritten to the assigned slot and its `generation`
    /// to a tag no other live allocation carries.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is full or the tail slot is occupied.
    pub fn enqueue(&mut self, uop: MicroOp) -> usize {
        assert!(!self.is_full(), "enqueue into a full operation buffer");
        let idx = self.tail;
        assert!(
            self.slots[idx].is_none(),
            "enqueue into occupied slot {idx}"
        );
        let mut uop = uop.at(idx);
        uop.generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);
        let entry = MemEntry::for_uop(uop);
        *self.count_mut(&entry) += 1;
        self.slots[idx] = Some(entry);
        self.tail = self.wrap_inc(idx);
        idx
    }

    /// Entry at `idx`, if occupied.
    pub fn get(&self, idx: usize) -> Option<&MemEntry> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    /// Mutable entry at `idx`, if occupied.
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut MemEntry> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    /// Load at `idx`, if the slot holds one.
    pub fn load(&self, idx: usize) -> Option<&LoadEntry> {
        match self.get(idx) {
            Some(MemEntry::Load(ld)) => Some(ld),
            _ => None,
        }
    }

    /// Mutable load at `idx`, if the slot holds one.
    pub fn load_mut(&mut self, idx: usize) -> Option<&mut LoadEntry> {
        match self.get_mut(idx) {
            Some(MemEntry::Load(ld)) => Some(ld),
            _ => None,
        }
    }

    /// Store at `idx`, if the slot holds one.
    pub fn store(&self, idx: usize) -> Option<&StoreEntry> {
        match self.get(idx) {
            Some(MemEntry::Store(st)) => Some(st),
            _ => None,
        }
    }

    /// Mutable store at `idx`, if the slot holds one.
    pub fn store_mut(&mut self, idx: usize) -> Option<&mut StoreEntry> {
        match self.get_mut(idx) {
            Some(MemEntry::Store(st)) => Some(st),
            _ => None,
        }
    }

    /// Empties slot `idx` without moving any pointer, returning its contents.
    pub fn clear(&mut self, idx: usize) -> Option<MemEntry> {
        let entry = self.slots.get_mut(idx).and_then(Option::take)?;
        *self.count_mut(&entry) -= 1;
        Some(entry)
    }

    /// Live slot indices in circular order starting at `base` and ending before `tail`.
    pub fn indices_from(&self, base: usize) -> impl Iterator<Item = usize> + '_ {
        let len = self.distance(base, self.tail);
        (0..len).map(move |i| (base + i) % self.slots.len())
    }

    /// Occupied slots in program order, oldest first.
    pub fn iter_live(&self) -> impl Iterator<Item = (usize, &MemEntry)> + '_ {
        self.indices_from(self.head)
            .filter_map(|idx| self.get(idx).map(|e| (idx, e)))
    }

    /// Moves `commit_head` past the store at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not at or beyond the current commit head.
    pub fn advance_commit_head(&mut self, idx: usize) {
        assert!(
            self.distance(self.commit_head, idx) < self.distance(self.commit_head, self.tail),
            "store commit at {idx} outside [{}, {})",
            self.commit_head,
            self.tail
        );
        self.commit_head = self.wrap_inc(idx);
    }

    /// Moves `execute_head` past the store at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` lies outside the committed window `[execute_head, commit_head)`.
    pub fn advance_execute_head(&mut self, idx: usize) {
        assert!(
            self.distance(self.execute_head, idx)
                < self.distance(self.execute_head, self.commit_head),
            "store send at {idx} outside [{}, {})",
            self.execute_head,
            self.commit_head
        );
        self.execute_head = self.wrap_inc(idx);
    }

    /// Rewinds `execute_head` to `idx` so stores are re-sent from there.
    ///
    /// Rewinding to a slot at or beyond the current execute head is a no-op.
    pub fn rewind_execute_head(&mut self, idx: usize) {
        if self.distance(self.head, idx) < self.distance(self.head, self.execute_head) {
            self.execute_head = idx;
        }
    }

    /// Moves `ldq_head` past the load at `idx`.
    pub fn advance_ldq_head(&mut self, idx: usize) {
        debug_assert!(self.in_live_region(idx));
        self.ldq_head = self.wrap_inc(idx);
    }

    /// Clears the head slot and advances `head`, dragging pointers that sat on it.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is empty.
    pub fn release_head(&mut self) -> Option<MemEntry> {
        assert!(!self.is_empty(), "release from an empty operation buffer");
        let old = self.head;
        let entry = self.slots[old].take();
        if let Some(e) = &entry {
            *self.count_mut(e) -= 1;
        }
        let next = self.wrap_inc(old);
        self.head = next;
        for ptr in [
            &mut self.execute_head,
            &mut self.commit_head,
            &mut self.ldq_head,
        ] {
            if *ptr == old {
                *ptr = next;
            }
        }
        entry
    }

    /// Rolls `tail` back over trailing empty slots.
    ///
    /// Returns the number of slots reclaimed.
    pub fn retract_tail(&mut self) -> usize {
        let mut reclaimed = 0;
        while self.tail != self.head {
            let prev = self.wrap_dec(self.tail);
            if self.slots[prev].is_some() {
                break;
            }
            let old = self.tail;
            self.tail = prev;
            for ptr in [
                &mut self.execute_head,
                &mut self.commit_head,
                &mut self.ldq_head,
            ] {
                if *ptr == old {
                    *ptr = prev;
                }
            }
            reclaimed += 1;
        }
        reclaimed
    }

    /// Checks the circular pointer ordering and the emptiness of the free region.
    ///
    /// Returns a description of the first violated invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        let span = |p: usize| self.distance(self.head, p);
        let tail = span(self.tail);
        if span(self.execute_head) > span(self.commit_head) {
            return Err(format!(
                "execute head {} ahead of commit head {}",
                self.execute_head, self.commit_head
            ));
        }
        if span(self.commit_head) > tail {
            return Err(format!(
                "commit head {} beyond tail {}",
                self.commit_head, self.tail
            ));
        }
        if span(self.ldq_head) > tail {
            return Err(format!("ldq head {} beyond tail {}", self.ldq_head, self.tail));
        }
        if let Some(idx) = (0..self.capacity())
            .find(|&i| self.slots[i].is_some() && !self.in_live_region(i))
        {
            return Err(format!("slot {idx} occupied outside the live region"));
        }
        let loads = self.slots.iter().flatten().filter(|e| e.is_load()).count();
        let stores = self.slots.iter().flatten().filter(|e| e.is_store()).count();
        if (loads, stores) != (self.loads, self.stores) {
            return Err(format!(
                "counts {}/{} disagree with {loads} loads and {stores} stores held",
                self.loads, self.stores
            ));
        }
        if let Some((idx, e)) = self.iter_live().find(|(i, e)| e.uop().buf_idx != *i) {
            return Err(format!(
                "slot {idx} holds an entry tagged for slot {}",
                e.uop().buf_idx
            ));
        }
        Ok(())
    }
}
