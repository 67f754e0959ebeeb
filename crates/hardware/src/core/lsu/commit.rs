//! Commit and release sequencing.
//!
//! Commits arrive in program order from the pipeline. A committed store stays in the
//! buffer until the backend acknowledges it (or, for a fence, reports that every earlier
//! write is visible), and only the head slot is ever released, so stores leave the
//! buffer in program order even though they may be sent out of order relative to loads.

use tracing::debug;

use super::Tick;
use super::entry::MemEntry;

impl Tick<'_, '_> {
    pub(super) fn commits(&mut self) {
        let inputs = self.inputs;
        assert!(
            inputs.commit.len() <= self.cfg.commit_width,
            "{} commits exceed the commit width of {}",
            inputs.commit.len(),
            self.cfg.commit_width
        );
        for uop in &inputs.commit {
            let idx = uop.buf_idx;
            match self.next.buf.get_mut(idx) {
                Some(MemEntry::Store(st)) if st.uop.same_op(uop) => {
                    assert!(!st.committed, "store at slot {idx} committed twice");
                    st.committed = true;
                    self.next.buf.advance_commit_head(idx);
                }
                Some(MemEntry::Load(ld)) if ld.uop.same_op(uop) => {
                    let _ = self.next.buf.clear(idx);
                    self.next.buf.advance_ldq_head(idx);
                    self.stats.loads_retired += 1;
                }
                _ => panic!("commit of unallocated slot {idx} (rob {})", uop.rob_idx),
            }
        }
    }

    /// Skips retired-load holes at the head and releases at most one store.
    pub(super) fn release(&mut self) {
        self.skip_holes();
        let ordered = self.inputs.mem.ordered;
        let Some(MemEntry::Store(st)) = self.next.buf.get(self.next.buf.head()) else {
            return;
        };
        if !st.committed {
            return;
        }
        let fence = st.uop.is_fence();
        if fence && !ordered {
            self.out.force_order = true;
            return;
        }
        if !fence && !st.succeeded {
            return;
        }

        let idx = self.next.buf.head();
        let _ = self.next.buf.release_head();
        if fence {
            self.stats.fences_released += 1;
        } else {
            self.stats.stores_released += 1;
        }
        debug!(idx, fence, "store released");
        self.skip_holes();
    }

    fn skip_holes(&mut self) {
        let buf = &mut self.next.buf;
        while !buf.is_empty() && buf.get(buf.head()).is_none() {
            let _ = buf.release_head();
        }
    }
}
