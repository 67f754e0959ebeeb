//! Scripted translator.
//!
//! Addresses map to themselves unless scripted otherwise. Every call is recorded so tests
//! can assert which lane translated what.

use std::collections::{HashMap, HashSet};

use lsqsim_core::common::PhysAddr;
use lsqsim_core::core::lsu::io::SFenceReq;
use lsqsim_core::soc::traits::{FaultFlags, TranslateRequest, TranslateResponse, Translator};

#[derive(Debug)]
pub struct ScriptedTranslator {
    misses: HashSet<u64>,
    faults: HashMap<u64, FaultFlags>,
    uncacheable: HashSet<u64>,
    /// Answer of `miss_ready`.
    pub miss_ready: bool,
    /// Every translation performed, with its lane.
    pub calls: Vec<(usize, TranslateRequest)>,
    /// Every fence applied.
    pub sfences: Vec<SFenceReq>,
}

impl Default for ScriptedTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTranslator {
    pub fn new() -> Self {
        Self {
            misses: HashSet::new(),
            faults: HashMap::new(),
            uncacheable: HashSet::new(),
            miss_ready: true,
            calls: Vec::new(),
            sfences: Vec::new(),
        }
    }

    /// Makes `vaddr` miss until `fill` is called.
    pub fn miss(&mut self, vaddr: u64) {
        let _ = self.misses.insert(vaddr);
    }

    /// Makes a missing `vaddr` hit from now on.
    pub fn fill(&mut self, vaddr: u64) {
        let _ = self.misses.remove(&vaddr);
    }

    pub fn fault(&mut self, vaddr: u64, flags: FaultFlags) {
        let _ = self.faults.insert(vaddr, flags);
    }

    pub fn uncacheable(&mut self, vaddr: u64) {
        let _ = self.uncacheable.insert(vaddr);
    }

    /// Number of translations performed for `vaddr`.
    pub fn calls_for(&self, vaddr: u64) -> usize {
        self.calls
            .iter()
            .filter(|(_, req)| req.vaddr.val() == vaddr)
            .count()
    }
}

impl Translator for ScriptedTranslator {
    fn translate(&mut self, lane: usize, req: &TranslateRequest) -> TranslateResponse {
        self.calls.push((lane, *req));
        let va = req.vaddr.val();
        if let Some(flags) = self.faults.get(&va) {
            return TranslateResponse {
                faults: *flags,
                ..TranslateResponse::default()
            };
        }
        if self.misses.contains(&va) {
            return TranslateResponse::miss();
        }
        TranslateResponse::hit(PhysAddr::new(va), !self.uncacheable.contains(&va))
    }

    fn miss_ready(&self) -> bool {
        self.miss_ready
    }

    fn sfence(&mut self, req: &SFenceReq) {
        self.sfences.push(*req);
    }
}
