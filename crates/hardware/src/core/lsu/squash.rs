//! Branch squash and exception flush.
//!
//! Both act at the end of the cycle on the next-state copy, so everything dispatched or
//! executed earlier in the same cycle is covered. Killed slots are cleared immediately and
//! the tail is rolled back over them so the next dispatch reuses the freed indices.

use tracing::debug;

use super::Tick;
use super::entry::MemEntry;
use super::IssuedReq;

impl Tick<'_, '_> {
    pub(super) fn squash(&mut self) {
        let br = self.inputs.brupdate;
        if br.resolved.is_empty() && br.mispredicted.is_empty() {
            return;
        }

        let live: Vec<usize> = self.next.buf.iter_live().map(|(idx, _)| idx).collect();
        let mut killed = 0;
        for idx in live {
            let Some(entry) = self.next.buf.get_mut(idx) else {
                continue;
            };
            if br.kills(entry.uop()) {
                if let MemEntry::Store(st) = entry {
                    assert!(
                        !st.committed,
                        "branch squash of committed store at slot {idx}"
                    );
                }
                let _ = self.next.buf.clear(idx);
                killed += 1;
            } else {
                br.update(entry.uop_mut());
            }
        }

        for slot in &mut self.next.lane_faults {
            if slot.is_some_and(|rec| br.kills(&rec.uop)) {
                *slot = None;
            } else if let Some(rec) = slot {
                br.update(&mut rec.uop);
            }
        }
        for issued in self.next.issued.iter_mut().flatten() {
            if let IssuedReq::Load(uop) | IssuedReq::Store(uop) = issued {
                br.update(uop);
            }
        }

        if killed > 0 {
            let reclaimed = self.next.buf.retract_tail();
            debug!(killed, reclaimed, tail = self.next.buf.tail(), "branch squash");
            self.stats.squashed += killed;
        }
    }

    pub(super) fn flush(&mut self) {
        if !self.inputs.exception {
            return;
        }
        let doomed: Vec<usize> = self
            .next
            .buf
            .iter_live()
            .filter(|(_, e)| match e {
                MemEntry::Load(_) => true,
                MemEntry::Store(st) => !st.committed,
            })
            .map(|(idx, _)| idx)
            .collect();
        for &idx in &doomed {
            let _ = self.next.buf.clear(idx);
        }
        let reclaimed = self.next.buf.retract_tail();
        self.next.lane_faults.fill(None);
        self.stats.flushed += doomed.len() as u64;
        debug!(flushed = doomed.len(), reclaimed, "exception flush");
    }
}
