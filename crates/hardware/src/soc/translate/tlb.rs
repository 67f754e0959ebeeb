//! Translation Lookaside Buffer (TLB).
//!
//! A direct-mapped cache of page mappings. It stores the mapping between Virtual Page
//! Numbers (VPN) and Physical Page Numbers (PPN), along with the permission bits
//! (R/W/U) the translator checks on every access.

use crate::config::PageMapping;

/// A single entry in the TLB.
#[derive(Clone, Copy, Debug, Default)]
struct TlbEntry {
    /// Virtual Page Number (Tag).
    vpn: u64,
    /// Physical Page Number (Data).
    ppn: u64,
    /// Entry validity flag.
    valid: bool,
    /// Read permission.
    r: bool,
    /// Write permission.
    w: bool,
    /// User mode accessible.
    u: bool,
}

/// Result of a TLB hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TlbHit {
    /// Physical Page Number.
    pub ppn: u64,
    /// Loads permitted.
    pub readable: bool,
    /// Stores permitted.
    pub writable: bool,
    /// Accessible from user mode.
    pub user: bool,
}

/// Translation Lookaside Buffer structure.
#[derive(Debug)]
pub struct Tlb {
    /// Vector of TLB entries.
    entries: Vec<TlbEntry>,
    /// Mask used for indexing (size - 1).
    mask: usize,
}

impl Tlb {
    /// Creates a new TLB with the specified size.
    ///
    /// # Arguments
    ///
    /// * `size` - Number of entries (will be rounded up to next power of 2).
    pub fn new(size: usize) -> Self {
        let size = size.max(1).next_power_of_two();
        Self {
            entries: vec![TlbEntry::default(); size],
            mask: size - 1,
        }
    }

    /// Number of entries.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    const fn index(&self, vpn: u64) -> usize {
        (vpn as usize) & self.mask
    }

    /// Looks up a VPN in the TLB.
    ///
    /// # Arguments
    ///
    /// * `vpn` - The Virtual Page Number to look up.
    ///
    /// # Returns
    ///
    /// The mapping and its permissions if present, otherwise `None`.
    pub fn lookup(&self, vpn: u64) -> Option<TlbHit> {
        self.entries
            .get(self.index(vpn))
            .filter(|e| e.valid && e.vpn == vpn)
            .map(|e| TlbHit {
                ppn: e.ppn,
                readable: e.r,
                writable: e.w,
                user: e.u,
            })
    }

    /// Inserts a mapping, evicting whatever shared its index.
    pub fn insert(&mut self, page: &PageMapping) {
        let idx = self.index(page.vpn);
        if let Some(slot) = self.entries.get_mut(idx) {
            *slot = TlbEntry {
                vpn: page.vpn,
                ppn: page.ppn,
                valid: true,
                r: page.readable,
                w: page.writable,
                u: page.user,
            };
        }
    }

    /// Invalidates the entry for `vpn`, if cached.
    pub fn flush_page(&mut self, vpn: u64) {
        let idx = self.index(vpn);
        if let Some(e) = self.entries.get_mut(idx)
            && e.vpn == vpn
        {
            e.valid = false;
        }
    }

    /// Flushes all entries from the TLB.
    ///
    /// Called on address-space fences without an address.
    pub fn flush(&mut self) {
        for e in &mut self.entries {
            e.valid = false;
        }
    }
}
