//! Candidate evaluation and fired-class actions.
//!
//! Incoming classes come from each lane's execute request. Buffer-sourced classes are
//! evaluated once per cycle against the current state and offered on a fixed lane:
//! store commit and the secondary classes on lane 0, everything else on the last lane.
//! Classes that need the memory port are only asserted while the backend is ready,
//! except the incoming load, which always fires and sends only if the port is ready.

use tracing::{debug, trace, warn};

use crate::common::addr::VirtAddr;
use crate::common::data::AccessType;
use crate::core::uop::MicroOp;
use crate::soc::traits::TranslateRequest;

use super::entry::{EntryAddr, MemEntry};
use super::exception::FaultRecord;
use super::io::{ExeRequest, LineRelease, MemRequest};
use super::scheduler::{ClassSet, FireClass, Resources, age_priority, arbitrate};
use super::translate::{Translation, translate};
use super::{IssuedReq, Tick};

/// Buffer-sourced candidates selected this cycle.
#[derive(Clone, Copy, Debug, Default)]
struct QueueCandidates {
    load_retry: Option<usize>,
    sta_retry: Option<usize>,
    load_wakeup: Option<usize>,
    store_commit: Option<usize>,
}

impl Tick<'_, '_> {
    pub(super) fn fire(&mut self) {
        let queued = self.queue_candidates();
        let last = self.lanes() - 1;

        for lane in 0..self.lanes() {
            let exe = self.inputs.exe.get(lane).copied().flatten();
            let mut asserted = exe.map_or(ClassSet::EMPTY, incoming_classes);

            if lane == 0 {
                let ready = self.mem_ready(0);
                asserted.insert_if(FireClass::StoreCommit, ready && queued.store_commit.is_some());
                asserted.insert_if(
                    FireClass::SecondaryIncoming,
                    self.cur.secondary.wants_incoming(),
                );
                asserted.insert_if(
                    FireClass::SecondaryReplay,
                    ready && self.cur.secondary.wants_replay(),
                );
            }
            if lane == last {
                let ready = self.mem_ready(last);
                let miss_ready = self.translator.miss_ready();
                asserted.insert_if(FireClass::Release, self.inputs.mem.release.is_some());
                asserted.insert_if(
                    FireClass::LoadRetry,
                    ready && miss_ready && queued.load_retry.is_some(),
                );
                asserted.insert_if(FireClass::StaRetry, miss_ready && queued.sta_retry.is_some());
                asserted.insert_if(
                    FireClass::LoadWakeup,
                    ready && queued.load_wakeup.is_some(),
                );
            }

            let fired = arbitrate(asserted, Resources::ALL);
            self.out.fired[lane] = fired;

            for class in fired.iter() {
                trace!(lane, %class, "fire");
                self.stats.record_fire(class);
                match class {
                    FireClass::LoadIncoming => {
                        if let Some(e) = exe {
                            self.exe_load(lane, &e);
                        }
                    }
                    FireClass::StadIncoming | FireClass::StaIncoming | FireClass::StdIncoming => {
                        if let Some(e) = exe {
                            self.exe_store(lane, &e);
                        }
                    }
                    FireClass::SFence => {
                        if let Some(e) = exe {
                            self.exe_sfence(&e);
                        }
                    }
                    FireClass::Release => {
                        if let Some(rel) = self.inputs.mem.release {
                            self.observe_release(rel);
                        }
                    }
                    FireClass::SecondaryIncoming => self.secondary_incoming(lane),
                    FireClass::SecondaryReplay => {
                        if let Some(req) = self.next.secondary.on_replay() {
                            debug!(lane, "secondary replay");
                            self.issue(lane, req, IssuedReq::Secondary);
                        }
                    }
                    FireClass::LoadRetry => {
                        if let Some(idx) = queued.load_retry {
                            self.retry_load(lane, idx);
                        }
                    }
                    FireClass::StaRetry => {
                        if let Some(idx) = queued.sta_retry {
                            self.retry_store(lane, idx);
                        }
                    }
                    FireClass::LoadWakeup => {
                        if let Some(idx) = queued.load_wakeup {
                            debug!(lane, idx, "load wakeup");
                            self.send_load(lane, idx);
                        }
                    }
                    FireClass::StoreCommit => {
                        if let Some(idx) = queued.store_commit {
                            self.send_store(lane, idx);
                        }
                    }
                }
            }
        }
    }

    fn queue_candidates(&self) -> QueueCandidates {
        let buf = &self.cur.buf;
        let cap = buf.capacity();
        let tail = buf.tail();

        let ldq_span = buf.distance(buf.ldq_head(), tail);

        let load_retry = age_priority(buf.ldq_head(), ldq_span, cap, |i| {
            buf.load(i)
                .is_some_and(|ld| ld.addr.is_virtual() && !ld.uop.exception)
        });

        let sta_retry = age_priority(
            buf.commit_head(),
            buf.distance(buf.commit_head(), tail),
            cap,
            |i| {
                buf.store(i)
                    .is_some_and(|st| st.addr.is_virtual() && !st.uop.exception)
            },
        );

        let oldest = buf.iter_live().next().map(|(i, _)| i);
        let load_wakeup = age_priority(buf.ldq_head(), ldq_span, cap, |i| {
            buf.load(i).is_some_and(|ld| {
                ld.addr.physical().is_some()
                    && !ld.executed
                    && !ld.succeeded
                    && !ld.uop.exception
                    && (!ld.is_uncacheable || (self.inputs.load_at_head && oldest == Some(i)))
            })
        });

        QueueCandidates {
            load_retry,
            sta_retry,
            load_wakeup,
            store_commit: self.store_commit_candidate(),
        }
    }

    /// First store in `[execute_head, commit_head)` that still has to be sent.
    ///
    /// Loads and acknowledged stores are skipped; a fence or an incomplete store blocks.
    fn store_commit_candidate(&self) -> Option<usize> {
        let buf = &self.cur.buf;
        let span = buf.distance(buf.execute_head(), buf.commit_head());
        for idx in buf.indices_from(buf.execute_head()).take(span) {
            match buf.get(idx) {
                None | Some(MemEntry::Load(_)) => {}
                Some(MemEntry::Store(st)) if st.succeeded => {}
                Some(MemEntry::Store(st)) => {
                    let ready = st.committed && !st.uop.is_fence() && st.is_complete();
                    return ready.then_some(idx);
                }
            }
        }
        None
    }

    fn translate_for(
        &mut self,
        lane: usize,
        uop: &MicroOp,
        vaddr: VirtAddr,
        addr_fault: bool,
    ) -> Translation {
        let req = TranslateRequest {
            vaddr,
            width: uop.width,
            cmd: uop.access(),
            privilege: self.inputs.privilege,
        };
        translate(&mut *self.translator, lane, &req, addr_fault, self.stats)
    }

    fn latch_fault(&mut self, lane: usize, rec: FaultRecord) {
        debug!(lane, fault = %rec, "fault latched");
        self.stats.faults_latched += 1;
        if let Some(slot) = self.next.lane_faults.get_mut(lane) {
            *slot = Some(rec);
        }
    }

    fn issue(&mut self, lane: usize, req: MemRequest, issued: IssuedReq) {
        trace!(lane, addr = req.addr.val(), cmd = ?req.cmd, "mem request");
        self.stats.mem_requests += 1;
        self.out.mem_requests[lane] = Some(req);
        self.next.issued[lane] = Some(issued);
    }

    fn exe_load(&mut self, lane: usize, e: &ExeRequest) {
        let idx = e.uop.buf_idx;
        if !self
            .next
            .buf
            .load(idx)
            .is_some_and(|ld| ld.uop.same_op(&e.uop))
        {
            warn!(lane, idx, "execute request for a load no longer in the buffer");
            return;
        }
        let vaddr = e.addr.unwrap_or_default();
        let addr_fault = e.addr_fault || e.addr.is_none();
        let outcome = self.translate_for(lane, &e.uop, vaddr, addr_fault);
        self.apply_load_translation(lane, idx, vaddr, outcome);
    }

    fn retry_load(&mut self, lane: usize, idx: usize) {
        let Some((uop, vaddr)) = self
            .next
            .buf
            .load(idx)
            .and_then(|ld| ld.addr.virt().map(|va| (ld.uop, va)))
        else {
            return;
        };
        debug!(lane, idx, vaddr = vaddr.val(), "load translation retry");
        let outcome = self.translate_for(lane, &uop, vaddr, false);
        self.apply_load_translation(lane, idx, vaddr, outcome);
    }

    fn apply_load_translation(
        &mut self,
        lane: usize,
        idx: usize,
        vaddr: VirtAddr,
        outcome: Translation,
    ) {
        let Some(ld) = self.next.buf.load_mut(idx) else {
            return;
        };
        match outcome {
            Translation::Fault(cause) => {
                ld.addr = EntryAddr::Virtual(vaddr);
                ld.uop.exception = true;
                let rec = FaultRecord {
                    cause,
                    addr: vaddr.val(),
                    uop: ld.uop,
                };
                self.latch_fault(lane, rec);
            }
            Translation::Miss(va) => {
                ld.addr = EntryAddr::Virtual(va);
            }
            Translation::Hit { paddr, cacheable } => {
                ld.addr = EntryAddr::Physical(paddr);
                ld.is_uncacheable = !cacheable;
                if !cacheable {
                    debug!(lane, idx, "uncacheable load deferred to the commit head");
                } else if self.mem_ready(lane) {
                    self.send_load(lane, idx);
                } else {
                    self.stats.mem_port_busy += 1;
                }
            }
        }
    }

    fn send_load(&mut self, lane: usize, idx: usize) {
        let Some(ld) = self.next.buf.load_mut(idx) else {
            return;
        };
        let Some(addr) = ld.addr.physical() else {
            return;
        };
        ld.executed = true;
        let req = MemRequest {
            addr,
            data: 0,
            cmd: AccessType::Read,
            width: ld.uop.width,
            uop: ld.uop,
            secondary: false,
        };
        let uop = ld.uop;
        self.issue(lane, req, IssuedReq::Load(uop));
    }

    fn exe_store(&mut self, lane: usize, e: &ExeRequest) {
        let idx = e.uop.buf_idx;
        let Some(before) = self
            .next
            .buf
            .store(idx)
            .filter(|st| st.uop.same_op(&e.uop))
            .map(|st| st.is_complete())
        else {
            warn!(lane, idx, "execute request for a store no longer in the buffer");
            return;
        };

        if e.has_addr() {
            let vaddr = e.addr.unwrap_or_default();
            let addr_fault = e.addr_fault || e.addr.is_none();
            let outcome = self.translate_for(lane, &e.uop, vaddr, addr_fault);
            self.apply_store_translation(lane, idx, vaddr, outcome);
        }
        if let (Some(data), Some(st)) = (e.data, self.next.buf.store_mut(idx)) {
            st.data = Some(data);
        }
        self.notify_if_complete(idx, before);
    }

    fn retry_store(&mut self, lane: usize, idx: usize) {
        let Some((uop, vaddr, before)) = self
            .next
            .buf
            .store(idx)
            .and_then(|st| st.addr.virt().map(|va| (st.uop, va, st.is_complete())))
        else {
            return;
        };
        debug!(lane, idx, vaddr = vaddr.val(), "store translation retry");
        let outcome = self.translate_for(lane, &uop, vaddr, false);
        self.apply_store_translation(lane, idx, vaddr, outcome);
        self.notify_if_complete(idx, before);
    }

    fn apply_store_translation(
        &mut self,
        lane: usize,
        idx: usize,
        vaddr: VirtAddr,
        outcome: Translation,
    ) {
        let Some(st) = self.next.buf.store_mut(idx) else {
            return;
        };
        match outcome {
            Translation::Fault(cause) => {
                st.addr = EntryAddr::Virtual(vaddr);
                st.uop.exception = true;
                let rec = FaultRecord {
                    cause,
                    addr: vaddr.val(),
                    uop: st.uop,
                };
                self.latch_fault(lane, rec);
            }
            Translation::Miss(va) => st.addr = EntryAddr::Virtual(va),
            Translation::Hit { paddr, .. } => st.addr = EntryAddr::Physical(paddr),
        }
    }

    /// Emits the retirement notification for a store that just became complete.
    fn notify_if_complete(&mut self, idx: usize, before: bool) {
        if let Some(st) = self.next.buf.store(idx)
            && !before
            && st.is_complete()
        {
            trace!(idx, "store clear busy");
            self.out.clear_busy.push(st.uop);
        }
    }

    fn exe_sfence(&mut self, e: &ExeRequest) {
        if let Some(req) = &e.sfence {
            debug!(vaddr = ?req.vaddr, "address-space fence");
            self.translator.sfence(req);
            self.out.clear_busy.push(e.uop);
        }
    }

    fn observe_release(&mut self, rel: LineRelease) {
        let line = rel.addr.line();
        let hits: Vec<usize> = self
            .next
            .buf
            .iter_live()
            .filter_map(|(idx, e)| match e {
                MemEntry::Load(ld)
                    if ld.executed && ld.addr.physical().is_some_and(|pa| pa.line() == line) =>
                {
                    Some(idx)
                }
                _ => None,
            })
            .collect();
        for idx in &hits {
            if let Some(ld) = self.next.buf.load_mut(*idx) {
                ld.observed = true;
            }
        }
        debug!(line, observed = hits.len(), "line release");
        self.out.release_ack = true;
    }

    fn secondary_incoming(&mut self, lane: usize) {
        let Some(req) = self.next.secondary.request() else {
            return;
        };
        let treq = TranslateRequest {
            vaddr: req.addr,
            width: req.width,
            cmd: req.cmd,
            privilege: self.inputs.privilege,
        };
        let outcome = translate(&mut *self.translator, lane, &treq, false, self.stats);
        let ready = self.mem_ready(lane);
        if let Some(mreq) = self.next.secondary.on_translate(outcome, ready) {
            self.issue(lane, mreq, IssuedReq::Secondary);
        }
    }

    fn send_store(&mut self, lane: usize, idx: usize) {
        let Some(st) = self.next.buf.store(idx) else {
            return;
        };
        let (Some(addr), Some(data)) = (st.addr.physical(), st.data) else {
            return;
        };
        let req = MemRequest {
            addr,
            data,
            cmd: AccessType::Write,
            width: st.uop.width,
            uop: st.uop,
            secondary: false,
        };
        let uop = st.uop;
        self.next.buf.advance_execute_head(idx);
        self.issue(lane, req, IssuedReq::Store(uop));
    }
}

/// Incoming classes asserted by one execute request.
fn incoming_classes(e: ExeRequest) -> ClassSet {
    let mut set = ClassSet::EMPTY;
    if e.sfence.is_some() {
        set.insert(FireClass::SFence);
    } else if e.uop.uses_ldq() {
        set.insert_if(FireClass::LoadIncoming, e.has_addr());
    } else if e.has_addr() && e.data.is_some() {
        set.insert(FireClass::StadIncoming);
    } else if e.has_addr() {
        set.insert(FireClass::StaIncoming);
    } else if e.data.is_some() {
        set.insert(FireClass::StdIncoming);
    }
    set
}
