//! Reference address translator.
//!
//! [`PageTranslator`] implements [`Translator`] over a flat page map. It provides:
//! 1. **Bare Mode:** Identity mapping that never misses (also used in machine mode).
//! 2. **TLB:** A direct-mapped cache consulted on every translation.
//! 3. **Miss Queue:** Page walks that fill the TLB a fixed number of cycles after a miss.
//! 4. **Checks:** Alignment, page permissions, and physical accessibility and cacheability.

/// Translation Lookaside Buffer.
pub mod tlb;

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::common::addr::PhysAddr;
use crate::common::data::{AccessType, Privilege};
use crate::config::{PageMapping, TranslatorConfig};
use crate::core::lsu::io::SFenceReq;
use crate::core::lsu::translate::is_aligned;
use crate::soc::traits::{FaultFlags, TranslateRequest, TranslateResponse, Translator};

use self::tlb::{Tlb, TlbHit};

/// Outstanding page walk.
#[derive(Clone, Copy, Debug)]
struct Walk {
    vpn: u64,
    done_at: u64,
}

/// Translator activity counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TranslatorStats {
    /// Translation requests served.
    pub lookups: u64,
    /// Requests answered with a miss.
    pub misses: u64,
    /// Page walks completed.
    pub walks: u64,
    /// Requests answered with a fault.
    pub faults: u64,
}

/// Page-map translator with a TLB and a bounded miss queue.
#[derive(Debug)]
pub struct PageTranslator {
    cfg: TranslatorConfig,
    tlb: Tlb,
    pages: HashMap<u64, PageMapping>,
    /// Pages whose walk found no mapping; they fault until the next fence.
    unmapped: HashSet<u64>,
    walks: VecDeque<Walk>,
    cycle: u64,
    stats: TranslatorStats,
}

impl PageTranslator {
    /// Creates a translator with an empty TLB.
    ///
    /// # Arguments
    ///
    /// * `cfg` - Mode, TLB size, walk timing, page table and physical attributes.
    pub fn new(cfg: &TranslatorConfig) -> Self {
        Self {
            cfg: cfg.clone(),
            tlb: Tlb::new(cfg.tlb_entries),
            pages: cfg.pages.iter().map(|p| (p.vpn, *p)).collect(),
            unmapped: HashSet::new(),
            walks: VecDeque::new(),
            cycle: 0,
            stats: TranslatorStats::default(),
        }
    }

    /// Adds or replaces a page mapping; cached copies stay until fenced.
    pub fn map_page(&mut self, page: PageMapping) {
        let _ = self.pages.insert(page.vpn, page);
    }

    /// Number of walks in flight.
    pub fn pending_walks(&self) -> usize {
        self.walks.len()
    }

    /// Activity counters.
    pub const fn stats(&self) -> &TranslatorStats {
        &self.stats
    }

    fn fault(&mut self, flags: FaultFlags) -> TranslateResponse {
        self.stats.faults += 1;
        TranslateResponse {
            faults: flags,
            ..TranslateResponse::default()
        }
    }

    fn page_fault(&mut self) -> TranslateResponse {
        self.fault(FaultFlags {
            page: true,
            ..FaultFlags::default()
        })
    }

    /// Applies physical attributes to a successful translation.
    fn physical(&mut self, paddr: PhysAddr) -> TranslateResponse {
        if self.cfg.inaccessible.iter().any(|r| r.contains(paddr.val())) {
            return self.fault(FaultFlags {
                access: true,
                ..FaultFlags::default()
            });
        }
        let cacheable = !self.cfg.uncacheable.iter().any(|r| r.contains(paddr.val()));
        TranslateResponse::hit(paddr, cacheable)
    }

    const fn permits(hit: &TlbHit, req: &TranslateRequest) -> bool {
        let rw = match req.cmd {
            AccessType::Read => hit.readable,
            AccessType::Write => hit.writable,
        };
        let mode = !matches!(req.privilege, Privilege::User) || hit.user;
        rw && mode
    }

    fn start_walk(&mut self, vpn: u64) {
        if self.walks.iter().any(|w| w.vpn == vpn) {
            return;
        }
        if self.walks.len() >= self.cfg.miss_queue_entries {
            debug!(vpn, "miss queue full, walk dropped");
            return;
        }
        self.walks.push_back(Walk {
            vpn,
            done_at: self.cycle + self.cfg.miss_latency,
        });
    }
}

impl Translator for PageTranslator {
    fn translate(&mut self, _lane: usize, req: &TranslateRequest) -> TranslateResponse {
        self.stats.lookups += 1;
        if !is_aligned(req.vaddr.val(), req.width.bytes()) {
            return self.fault(FaultFlags {
                misaligned: true,
                ..FaultFlags::default()
            });
        }
        if self.cfg.bare || req.privilege == Privilege::Machine {
            return self.physical(PhysAddr::new(req.vaddr.val()));
        }

        let vpn = req.vaddr.vpn();
        if self.unmapped.contains(&vpn) {
            return self.page_fault();
        }
        match self.tlb.lookup(vpn) {
            Some(hit) if Self::permits(&hit, req) => {
                self.physical(PhysAddr::from_page(hit.ppn, req.vaddr))
            }
            Some(_) => self.page_fault(),
            None => {
                self.stats.misses += 1;
                self.start_walk(vpn);
                TranslateResponse::miss()
            }
        }
    }

    fn miss_ready(&self) -> bool {
        self.walks.len() < self.cfg.miss_queue_entries
    }

    fn sfence(&mut self, req: &SFenceReq) {
        match req.vaddr {
            Some(vaddr) => {
                self.tlb.flush_page(vaddr.vpn());
                let _ = self.unmapped.remove(&vaddr.vpn());
            }
            None => {
                self.tlb.flush();
                self.unmapped.clear();
            }
        }
        debug!(vaddr = ?req.vaddr, "address-space fence");
    }

    fn tick(&mut self) {
        self.cycle += 1;
        while let Some(walk) = self.walks.front().copied() {
            if walk.done_at > self.cycle {
                break;
            }
            let _ = self.walks.pop_front();
            self.stats.walks += 1;
            if let Some(page) = self.pages.get(&walk.vpn) {
                self.tlb.insert(page);
                debug!(vpn = walk.vpn, ppn = page.ppn, "walk filled TLB");
            } else {
                let _ = self.unmapped.insert(walk.vpn);
                debug!(vpn = walk.vpn, "walk found no mapping");
            }
        }
    }
}
