//! Trace-driven simulator.
//!
//! The simulator plays the part of the out-of-order pipeline around the scheduler. Each
//! cycle it performs the following:
//! 1. **Backend:** Collects the memory backend's traffic and injects scheduled line releases.
//! 2. **Exception/Commit:** Flushes on a faulting reorder-buffer head, otherwise commits
//!    finished operations in order.
//! 3. **Branches:** Resolves due branches and kills the wrong path on a misprediction.
//! 4. **Dispatch/Execute:** Offers the next operations and the due execute requests.
//! 5. **Tick:** Runs the scheduler and forwards its requests, kills and acks.
//!
//! After an exception the program restarts at the operation following the faulting one;
//! after a misprediction it restarts past the branch's wrong path.

use std::collections::VecDeque;

use thiserror::Error;
use tracing::{debug, info};

use crate::common::addr::{PhysAddr, VirtAddr};
use crate::common::data::AccessType;
use crate::common::error::{ConfigError, FaultCause};
use crate::config::Config;
use crate::core::lsu::Lsu;
use crate::core::lsu::exception::FaultRecord;
use crate::core::lsu::io::{
    CycleInputs, CycleOutputs, DispatchAck, ExeRequest, SFenceReq, SecondaryReq, SecondaryResp,
};
use crate::core::uop::{BranchMask, BranchUpdate, MicroOp};
use crate::soc::memory::MemorySystem;
use crate::soc::traits::{MemoryBackend, Translator};
use crate::soc::translate::PageTranslator;

use super::trace::{SecondaryEvent, Trace, TraceOp};

/// Branch tags the simulated front end can have outstanding.
const BRANCH_TAGS: usize = 8;

/// Error returned by a simulation run.
#[derive(Debug, Error)]
pub enum SimError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The run did not finish within the cycle limit.
    #[error("simulation did not finish within {0} cycles")]
    Timeout(u64),
}

/// Value returned by a committed load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadValue {
    /// Position of the load in the program.
    pub op: usize,
    /// Loaded data.
    pub data: u64,
}

/// Outcome of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimReport {
    /// Cycles simulated.
    pub cycles: u64,
    /// Operations committed.
    pub committed: u64,
    /// Committed load values, in commit order.
    pub loads: Vec<LoadValue>,
    /// Exceptions taken, in order.
    pub faults: Vec<FaultRecord>,
    /// Completed secondary transactions.
    pub secondary: Vec<SecondaryResp>,
    /// Secondary requests that faulted.
    pub secondary_faults: Vec<FaultCause>,
    /// Mispredicted branches resolved.
    pub mispredicts: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RobKind {
    Memory,
    Branch {
        tag: usize,
        resolve_at: u64,
        mispredict: bool,
        wrong_path: usize,
    },
    SFence,
}

/// Reorder buffer entry.
#[derive(Clone, Copy, Debug)]
struct RobEntry {
    seq: u64,
    op: usize,
    uop: MicroOp,
    kind: RobKind,
    done: bool,
    exception: bool,
    fault: Option<FaultRecord>,
    data: Option<u64>,
}

/// Execute request waiting for its cycle.
#[derive(Clone, Copy, Debug)]
struct ExeEvent {
    ready_at: u64,
    seq: u64,
    req: ExeRequest,
}

/// Tentatively dispatched operation.
#[derive(Clone, Copy, Debug)]
struct Offer {
    entry: RobEntry,
    slot: Option<usize>,
}

/// Scheduler, reference backends and a minimal pipeline model.
#[derive(Debug)]
pub struct Simulator {
    cfg: Config,
    lsu: Lsu,
    mem: MemorySystem,
    translator: PageTranslator,
    trace: Trace,
    rob: VecDeque<RobEntry>,
    exe: Vec<ExeEvent>,
    next_op: usize,
    next_seq: u64,
    free_tags: u64,
    secondary: VecDeque<SecondaryEvent>,
    secondary_busy: Option<SecondaryEvent>,
    releases: usize,
    cycle: u64,
    report: SimReport,
}

impl Simulator {
    /// Builds a simulator for `trace`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if the configuration is not realisable.
    pub fn new(cfg: &Config, trace: Trace) -> Result<Self, SimError> {
        cfg.validate()?;
        let lsu = Lsu::new(&cfg.lsu)?;
        let mut mem = MemorySystem::new(&cfg.memory);
        for init in &trace.memory {
            mem.store_mut()
                .write(PhysAddr::new(init.addr), init.width, init.data);
        }
        Ok(Self {
            cfg: cfg.clone(),
            lsu,
            mem,
            translator: PageTranslator::new(&cfg.translator),
            secondary: trace.secondary.iter().copied().collect(),
            trace,
            rob: VecDeque::new(),
            exe: Vec::new(),
            next_op: 0,
            next_seq: 0,
            free_tags: (1u64 << BRANCH_TAGS) - 1,
            secondary_busy: None,
            releases: 0,
            cycle: 0,
            report: SimReport::default(),
        })
    }

    /// The scheduler.
    pub const fn lsu(&self) -> &Lsu {
        &self.lsu
    }

    /// The memory backend.
    pub const fn memory(&self) -> &MemorySystem {
        &self.mem
    }

    /// The translator.
    pub const fn translator(&self) -> &PageTranslator {
        &self.translator
    }

    /// Results so far.
    pub const fn report(&self) -> &SimReport {
        &self.report
    }

    /// Current cycle.
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// True once the program has committed and every side effect has drained.
    pub fn finished(&self) -> bool {
        self.next_op >= self.trace.ops.len()
            && self.rob.is_empty()
            && self.lsu.state().buffer().is_empty()
            && self.secondary.is_empty()
            && self.secondary_busy.is_none()
            && self.mem.in_flight() == 0
            && self.releases == self.trace.releases.len()
            && !self.mem.release_pending()
    }

    /// Runs until the program finishes.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Timeout`] if `max_cycles` elapse first.
    pub fn run(&mut self, max_cycles: u64) -> Result<&SimReport, SimError> {
        while !self.finished() {
            if self.cycle >= max_cycles {
                return Err(SimError::Timeout(max_cycles));
            }
            self.step();
        }
        self.report.cycles = self.cycle;
        info!(
            cycles = self.cycle,
            committed = self.report.committed,
            "simulation finished"
        );
        Ok(&self.report)
    }

    /// Simulates one cycle.
    pub fn step(&mut self) {
        let lanes = self.cfg.lsu.lanes;
        self.inject_release();

        let mut inputs = CycleInputs::idle(lanes);
        inputs.privilege = self.trace.privilege;
        inputs.mem = self.mem.events(lanes);

        let mut offers = Vec::new();
        if self.rob.front().is_some_and(|e| e.exception) {
            self.take_exception(&mut inputs);
        } else {
            self.commit(&mut inputs);
            let mispredicted = self.resolve_branches(&mut inputs);
            if !mispredicted {
                offers = self.offer(&mut inputs);
            }
            self.issue_exe(&mut inputs);
        }
        inputs.rob_head = self
            .rob
            .front()
            .map_or_else(|| self.rob_idx(self.next_seq), |e| e.uop.rob_idx);
        inputs.load_at_head = self
            .rob
            .front()
            .is_some_and(|e| e.kind == RobKind::Memory && e.uop.uses_ldq());
        let offered = self.offer_secondary(&mut inputs);

        let out = self.lsu.tick(&inputs, &mut self.translator);

        self.accept(&offers, &out);
        self.writeback(&out);
        self.drive_memory(&out);
        self.secondary_outputs(&out, offered);

        self.mem.tick();
        self.translator.tick();
        self.cycle += 1;
    }

    fn rob_idx(&self, seq: u64) -> usize {
        (seq % self.cfg.lsu.rob_entries as u64) as usize
    }

    fn inject_release(&mut self) {
        if let Some(ev) = self.trace.releases.get(self.releases)
            && ev.cycle <= self.cycle
            && self.mem.inject_release(PhysAddr::new(ev.addr))
        {
            self.releases += 1;
        }
    }

    fn take_exception(&mut self, inputs: &mut CycleInputs) {
        let Some(head) = self.rob.front().copied() else {
            return;
        };
        let record = head.fault.unwrap_or(FaultRecord {
            cause: FaultCause::access_fault(head.uop.access()),
            addr: 0,
            uop: head.uop,
        });
        info!(op = head.op, fault = %record, "exception");
        self.report.faults.push(record);
        inputs.exception = true;
        self.rob.clear();
        self.exe.clear();
        self.free_tags = (1u64 << BRANCH_TAGS) - 1;
        self.next_op = head.op + 1;
    }

    fn commit(&mut self, inputs: &mut CycleInputs) {
        let width = self.cfg.lsu.commit_width;
        let mut lsu_commits = 0;
        while let Some(head) = self.rob.front().copied() {
            if !head.done || head.exception {
                break;
            }
            let to_lsu = head.kind == RobKind::Memory;
            if to_lsu && lsu_commits == width {
                break;
            }
            let _ = self.rob.pop_front();
            if to_lsu {
                inputs.commit.push(head.uop);
                lsu_commits += 1;
            }
            if let Some(data) = head.data {
                self.report.loads.push(LoadValue { op: head.op, data });
            }
            self.report.committed += 1;
            debug!(op = head.op, rob = head.uop.rob_idx, "commit");
        }
    }

    /// Resolves due branches; returns true if any was mispredicted.
    fn resolve_branches(&mut self, inputs: &mut CycleInputs) -> bool {
        let mut update = BranchUpdate::default();
        let mut restart = None;
        for e in self.rob.iter_mut().filter(|e| !e.done) {
            if let RobKind::Branch {
                tag,
                resolve_at,
                mispredict,
                wrong_path,
            } = e.kind
                && resolve_at <= self.cycle
            {
                e.done = true;
                let mask = BranchMask::tag(tag);
                update.resolved = update.resolved.with(mask);
                if mispredict {
                    update.mispredicted = update.mispredicted.with(mask);
                    if restart.is_none() {
                        restart = Some(e.op + 1 + wrong_path);
                    }
                    self.report.mispredicts += 1;
                }
            }
        }
        if update.resolved.is_empty() {
            return false;
        }

        if let Some(restart) = restart {
            let killed: Vec<u64> = self
                .rob
                .iter()
                .filter(|e| update.kills(&e.uop))
                .map(|e| e.seq)
                .collect();
            for e in self.rob.iter().filter(|e| update.kills(&e.uop)) {
                if let RobKind::Branch { tag, .. } = e.kind {
                    self.free_tags |= 1 << tag;
                }
            }
            self.rob.retain(|e| !update.kills(&e.uop));
            self.exe.retain(|ev| !killed.contains(&ev.seq));
            debug!(restart, killed = killed.len(), "misprediction");
            self.next_op = restart;
        }
        self.free_tags |= update.resolved.0;
        for e in &mut self.rob {
            update.update(&mut e.uop);
        }
        inputs.brupdate = update;
        restart.is_some()
    }

    /// Builds this cycle's dispatch group.
    fn offer(&self, inputs: &mut CycleInputs) -> Vec<Offer> {
        let rob_cap = self.cfg.lsu.rob_entries;
        let mut offers = Vec::new();
        let mut mask = self.live_mask();
        let mut free_tags = self.free_tags;
        let mut slot = 0;

        for (op_idx, op) in self.trace.ops.iter().enumerate().skip(self.next_op) {
            let group = offers.len();
            if group == self.cfg.lsu.dispatch_width || self.rob.len() + group == rob_cap {
                break;
            }
            let seq = self.next_seq + offers.len() as u64;
            let rob_idx = self.rob_idx(seq);
            let (uop, kind) = match *op {
                TraceOp::Load {
                    width,
                    dst,
                    exception,
                    ..
                } => {
                    let mut uop = MicroOp::load(rob_idx, width, dst);
                    uop.exception = exception;
                    (uop, RobKind::Memory)
                }
                TraceOp::Store {
                    width, exception, ..
                } => {
                    let mut uop = MicroOp::store(rob_idx, width);
                    uop.exception = exception;
                    (uop, RobKind::Memory)
                }
                TraceOp::Fence => (MicroOp::fence(rob_idx), RobKind::Memory),
                TraceOp::Branch {
                    mispredict,
                    resolve_after,
                    wrong_path,
                } => {
                    if free_tags == 0 {
                        break;
                    }
                    let tag = free_tags.trailing_zeros() as usize;
                    free_tags &= !(1 << tag);
                    let kind = RobKind::Branch {
                        tag,
                        resolve_at: self.cycle + resolve_after,
                        mispredict,
                        wrong_path,
                    };
                    (MicroOp::fence(rob_idx), kind)
                }
                TraceOp::Sfence { .. } => (MicroOp::fence(rob_idx), RobKind::SFence),
            };
            let uop = uop.under(mask);
            if let RobKind::Branch { tag, .. } = kind {
                mask = mask.with(BranchMask::tag(tag));
            }

            let to_lsu = op.is_memory();
            if to_lsu {
                inputs.dispatch.push(uop);
            }
            offers.push(Offer {
                entry: RobEntry {
                    seq,
                    op: op_idx,
                    uop,
                    kind,
                    done: false,
                    exception: false,
                    fault: None,
                    data: None,
                },
                slot: to_lsu.then_some(slot),
            });
            if to_lsu {
                slot += 1;
            }
        }
        offers
    }

    fn live_mask(&self) -> BranchMask {
        BranchMask((1u64 << BRANCH_TAGS) - 1).without(BranchMask(self.free_tags))
    }

    /// Allocates the accepted prefix of the dispatch group.
    fn accept(&mut self, offers: &[Offer], out: &CycleOutputs) {
        for offer in offers {
            let mut entry = offer.entry;
            if let Some(slot) = offer.slot {
                match out.dispatch.get(slot) {
                    Some(DispatchAck::Accepted(idx)) => {
                        entry.uop = entry.uop.at(*idx);
                        entry.done = entry.uop.is_fence();
                    }
                    Some(DispatchAck::Skipped) => {
                        entry.exception = true;
                        entry.done = true;
                    }
                    Some(DispatchAck::Stalled) | None => break,
                }
            }
            if let RobKind::Branch { tag, .. } = entry.kind {
                self.free_tags &= !(1 << tag);
            }
            self.schedule_exe(&entry);
            self.rob.push_back(entry);
            self.next_seq += 1;
            self.next_op = entry.op + 1;
        }
    }

    fn schedule_exe(&mut self, entry: &RobEntry) {
        if entry.exception {
            return;
        }
        let Some(op) = self.trace.ops.get(entry.op) else {
            return;
        };
        let at = |delay: u64| self.cycle + delay;
        let uop = entry.uop;
        let mut push = |ready_at: u64, req: ExeRequest| {
            self.exe.push(ExeEvent {
                ready_at,
                seq: entry.seq,
                req,
            });
        };
        match *op {
            TraceOp::Load {
                addr,
                delay,
                addr_fault,
                ..
            } => {
                let mut req = ExeRequest::addr(uop, VirtAddr::new(addr));
                req.addr_fault = addr_fault;
                push(at(delay), req);
            }
            TraceOp::Store {
                addr,
                data,
                delay,
                data_delay,
                addr_fault,
                ..
            } => {
                let vaddr = VirtAddr::new(addr);
                let mut req = match data_delay {
                    Some(dd) => {
                        push(at(dd), ExeRequest::data(uop, data));
                        ExeRequest::addr(uop, vaddr)
                    }
                    None => ExeRequest::addr_data(uop, vaddr, data),
                };
                req.addr_fault = addr_fault;
                push(at(delay), req);
            }
            TraceOp::Sfence { addr, delay } => {
                let req = SFenceReq {
                    vaddr: addr.map(VirtAddr::new),
                };
                push(at(delay), ExeRequest::sfence(uop, req));
            }
            TraceOp::Fence | TraceOp::Branch { .. } => {}
        }
    }

    /// Places due execute requests on free lanes, oldest first.
    fn issue_exe(&mut self, inputs: &mut CycleInputs) {
        self.exe.sort_by_key(|ev| (ev.ready_at > self.cycle, ev.seq));
        let mut lane = 0;
        let mut pending = Vec::with_capacity(self.exe.len());
        for ev in std::mem::take(&mut self.exe) {
            match inputs.exe.get_mut(lane) {
                Some(slot) if ev.ready_at <= self.cycle => {
                    *slot = Some(ev.req);
                    lane += 1;
                }
                _ => pending.push(ev),
            }
        }
        self.exe = pending;
    }

    fn offer_secondary(&self, inputs: &mut CycleInputs) -> Option<SecondaryEvent> {
        if self.secondary_busy.is_some() {
            return None;
        }
        let ev = self.secondary.front().filter(|ev| ev.cycle <= self.cycle)?;
        inputs.secondary.req = Some(SecondaryReq {
            addr: VirtAddr::new(ev.addr),
            cmd: if ev.write {
                AccessType::Write
            } else {
                AccessType::Read
            },
            width: ev.width,
            data: ev.data,
        });
        Some(*ev)
    }

    fn entry_mut(&mut self, uop: &MicroOp) -> Option<&mut RobEntry> {
        self.rob
            .iter_mut()
            .find(|e| match e.kind {
                RobKind::Memory => e.uop.same_op(uop),
                _ => e.uop.rob_idx == uop.rob_idx,
            })
    }

    fn writeback(&mut self, out: &CycleOutputs) {
        let results: Vec<_> = out
            .results
            .iter()
            .flat_map(|lane| [lane.int, lane.fp])
            .flatten()
            .collect();
        for res in results {
            if let Some(e) = self.entry_mut(&res.uop) {
                e.data = Some(res.data & e.uop.width.data_mask());
                e.done = true;
            }
        }
        for uop in &out.clear_busy {
            if let Some(e) = self.entry_mut(uop) {
                e.done = true;
            }
        }
        if let Some(rec) = out.fault
            && let Some(e) = self.entry_mut(&rec.uop)
        {
            e.exception = true;
            e.fault = Some(rec);
            e.done = true;
        }
    }

    fn drive_memory(&mut self, out: &CycleOutputs) {
        for (lane, kill) in out.kill.iter().enumerate() {
            if *kill {
                self.mem.kill(lane);
            }
        }
        for (lane, req) in out.mem_requests.iter().enumerate() {
            if let Some(req) = req {
                self.mem.request(lane, *req);
            }
        }
        if out.release_ack {
            self.mem.ack_release();
        }
    }

    fn secondary_outputs(&mut self, out: &CycleOutputs, offered: Option<SecondaryEvent>) {
        if let Some(ev) = offered
            && out.secondary.ready
        {
            let _ = self.secondary.pop_front();
            self.secondary_busy = Some(ev);
        }
        let sec = &out.secondary;
        if let Some(resp) = sec.resp {
            self.report.secondary.push(resp);
            self.secondary_busy = None;
        }
        if let Some(cause) = sec.fault {
            self.report.secondary_faults.push(cause);
            self.secondary_busy = None;
        }
        if sec.nack
            && let Some(ev) = self.secondary_busy.take()
        {
            debug!(addr = ev.addr, "secondary request nacked, re-sending");
            self.secondary.push_front(ev);
        }
    }
}

