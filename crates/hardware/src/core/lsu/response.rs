//! Memory response and nack handling.
//!
//! The backend may answer out of order, so every response is matched against its slot by
//! operation identity, allocation generation and the slot's own flags; anything that no
//! longer matches is stale and dropped. Secondary-client traffic is left to the secondary
//! state machine.

use tracing::{debug, trace, warn};

use super::Tick;
use super::entry::MemEntry;
use super::io::{LoadResult, MemResponse};

impl Tick<'_, '_> {
    pub(super) fn responses(&mut self) {
        let inputs = self.inputs;
        let mem = &inputs.mem;
        for resp in mem.responses.iter().filter(|r| !r.secondary) {
            self.on_response(resp);
        }
        for nack in mem.nacks.iter().filter(|r| !r.secondary) {
            self.on_nack(nack);
        }
    }

    fn on_response(&mut self, resp: &MemResponse) {
        let idx = resp.uop.buf_idx;
        let killed = self.inputs.exception;
        let br = self.inputs.brupdate;
        match self.next.buf.get_mut(idx) {
            Some(MemEntry::Load(ld))
                if ld.uop.same_instance(&resp.uop) && ld.executed && !ld.succeeded =>
            {
                ld.succeeded = true;
                if killed || br.kills(&ld.uop) {
                    trace!(idx, "result suppressed for a killed load");
                    return;
                }
                let result = LoadResult {
                    uop: ld.uop,
                    data: resp.data,
                };
                let Some(port) = self.out.results.get_mut(resp.lane) else {
                    warn!(lane = resp.lane, "response on a lane that does not exist");
                    return;
                };
                let slot = if result.uop.dst.fp {
                    &mut port.fp
                } else {
                    &mut port.int
                };
                assert!(
                    slot.is_none(),
                    "two load results on one writeback port of lane {}",
                    resp.lane
                );
                *slot = Some(result);
                self.stats.load_results += 1;
                trace!(idx, data = resp.data, "load result");
            }
            Some(MemEntry::Store(st))
                if st.uop.same_instance(&resp.uop) && !st.succeeded =>
            {
                st.succeeded = true;
                trace!(idx, "store acknowledged");
            }
            _ => {
                warn!(idx, rob = resp.uop.rob_idx, "stale memory response");
                self.stats.stale_responses += 1;
            }
        }
    }

    fn on_nack(&mut self, nack: &MemResponse) {
        let idx = nack.uop.buf_idx;
        match self.next.buf.get_mut(idx) {
            Some(MemEntry::Load(ld))
                if ld.uop.same_instance(&nack.uop) && ld.executed =>
            {
                ld.executed = false;
                self.stats.load_nacks += 1;
                debug!(idx, "load nacked");
            }
            Some(MemEntry::Store(st))
                if st.uop.same_instance(&nack.uop) && !st.succeeded =>
            {
                self.next.buf.rewind_execute_head(idx);
                self.stats.store_nacks += 1;
                debug!(idx, "store nacked, execute head rewound");
            }
            _ => {
                warn!(idx, rob = nack.uop.rob_idx, "stale memory nack");
                self.stats.stale_responses += 1;
            }
        }
    }
}
