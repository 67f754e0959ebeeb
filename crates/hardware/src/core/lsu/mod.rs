//! Unified Load/Store Scheduler.
//!
//! The scheduler holds every in-flight load and store in one circular buffer in dispatch
//! order and decides, each cycle, which of them use the translator and memory ports. It
//! includes:
//! - [`buffer`]: The operation buffer and its head/tail pointers.
//! - [`scheduler`]: Candidate classes, per-lane resources and the priority fold.
//! - [`translate`]: The translator client and alignment check.
//! - [`exception`]: Oldest-fault arbitration.
//! - [`secondary`]: The secondary memory client state machine.
//!
//! # Cycle schedule
//!
//! [`Lsu::tick`] is a two-phase update: the current state is cloned into a next-state
//! copy, every stage reads the current state and the cycle's inputs and writes the copy,
//! and the copy replaces the current state when the tick returns. Stages run in this order:
//!
//! 1. **Kill:** Cancel last cycle's requests whose owner was squashed, flushed or killed.
//! 2. **Expose:** Report the oldest fault latched last cycle.
//! 3. **Dispatch:** Enqueue new operations at the tail.
//! 4. **Fire:** Assert candidates, arbitrate each lane, translate and issue.
//! 5. **Respond:** Apply memory responses and nacks.
//! 6. **Commit:** Mark committed stores and retire committed loads.
//! 7. **Release:** Free the head slot once its store is acknowledged.
//! 8. **Secondary:** Advance the secondary client.
//! 9. **Squash/Flush:** Apply the branch update and any global exception.

/// Operation buffer.
pub mod buffer;

/// Commit and release sequencing.
mod commit;

/// Buffer entry payloads.
pub mod entry;

/// Oldest-fault arbitration.
pub mod exception;

/// Candidate evaluation and fired-class actions.
mod execute;

/// Per-cycle interface bundles.
pub mod io;

/// Memory response and nack handling.
mod response;

/// Resource arbitration.
pub mod scheduler;

/// Secondary memory client.
pub mod secondary;

/// Branch squash and exception flush.
mod squash;

/// Translator client.
pub mod translate;

use tracing::debug;

use crate::common::error::ConfigError;
use crate::config::LsuConfig;
use crate::core::uop::MicroOp;
use crate::soc::traits::Translator;
use crate::stats::LsuStats;

use self::buffer::OperationBuffer;
use self::exception::{FaultRecord, arbitrate_faults};
use self::io::{CycleInputs, CycleOutputs, DispatchAck};
use self::secondary::SecondaryClient;

/// Request issued on a lane, remembered for one cycle so it can be killed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IssuedReq {
    /// A core load.
    Load(MicroOp),
    /// A committed store.
    Store(MicroOp),
    /// The secondary client's request.
    Secondary,
}

/// Architectural state of the scheduler.
#[derive(Clone, Debug)]
pub struct LsuState {
    buf: OperationBuffer,
    lane_faults: Vec<Option<FaultRecord>>,
    issued: Vec<Option<IssuedReq>>,
    secondary: SecondaryClient,
}

impl LsuState {
    fn new(cfg: &LsuConfig) -> Self {
        Self {
            buf: OperationBuffer::new(cfg.buffer_entries),
            lane_faults: vec![None; cfg.lanes],
            issued: vec![None; cfg.lanes],
            secondary: SecondaryClient::default(),
        }
    }

    /// The operation buffer.
    pub const fn buffer(&self) -> &OperationBuffer {
        &self.buf
    }

    /// Faults latched this cycle, indexed by lane.
    pub fn latched_faults(&self) -> &[Option<FaultRecord>] {
        &self.lane_faults
    }

    /// Requests issued this cycle, indexed by lane.
    pub fn issued(&self) -> &[Option<IssuedReq>] {
        &self.issued
    }

    /// The secondary client.
    pub const fn secondary(&self) -> &SecondaryClient {
        &self.secondary
    }
}

/// The load/store scheduler.
///
/// # Examples
///
/// ```
/// use lsqsim_core::common::{MemWidth, VirtAddr};
/// use lsqsim_core::config::LsuConfig;
/// use lsqsim_core::core::lsu::Lsu;
/// use lsqsim_core::core::lsu::io::{CycleInputs, DispatchAck, ExeRequest};
/// use lsqsim_core::core::uop::{Dest, MicroOp};
/// use lsqsim_core::soc::translate::PageTranslator;
/// use lsqsim_core::config::TranslatorConfig;
///
/// let mut lsu = Lsu::new(&LsuConfig::default()).unwrap();
/// let mut tlb = PageTranslator::new(&TranslatorConfig::default());
///
/// let mut cycle = CycleInputs::idle(1);
/// cycle.dispatch = vec![MicroOp::load(0, MemWidth::Double, Dest::default())];
/// let out = lsu.tick(&cycle, &mut tlb);
/// let DispatchAck::Accepted(idx) = out.dispatch[0] else { panic!() };
///
/// let uop = *lsu.state().buffer().get(idx).unwrap().uop();
/// let mut cycle = CycleInputs::idle(1);
/// cycle.exe[0] = Some(ExeRequest::addr(uop, VirtAddr::new(0x1000)));
/// let out = lsu.tick(&cycle, &mut tlb);
/// assert_eq!(out.mem_requests[0].map(|r| r.addr.val()), Some(0x1000));
/// ```
#[derive(Debug)]
pub struct Lsu {
    cfg: LsuConfig,
    state: LsuState,
    stats: LsuStats,
}

impl Lsu {
    /// Creates an empty scheduler.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint of `cfg`.
    pub fn new(cfg: &LsuConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            cfg: cfg.clone(),
            state: LsuState::new(cfg),
            stats: LsuStats::default(),
        })
    }

    /// Scheduler parameters.
    pub const fn config(&self) -> &LsuConfig {
        &self.cfg
    }

    /// Current state.
    pub const fn state(&self) -> &LsuState {
        &self.state
    }

    /// Accumulated statistics.
    pub const fn stats(&self) -> &LsuStats {
        &self.stats
    }

    /// Advances the scheduler by one cycle.
    ///
    /// # Arguments
    ///
    /// * `inputs` - Everything the surroundings present this cycle.
    /// * `translator` - Translation backend, queried during the cycle.
    ///
    /// # Returns
    ///
    /// Everything the scheduler drives this cycle.
    ///
    /// # Panics
    ///
    /// Panics on structural violations: committing an unallocated slot, committing a
    /// store twice, squashing a committed store, or two results on one writeback port.
    pub fn tick(&mut self, inputs: &CycleInputs, translator: &mut dyn Translator) -> CycleOutputs {
        let mut t = Tick {
            cfg: &self.cfg,
            cur: &self.state,
            next: self.state.clone(),
            inputs,
            translator,
            out: CycleOutputs::new(self.cfg.lanes),
            stats: &mut self.stats,
        };

        t.kill_lines();
        t.expose_fault();
        t.dispatch();
        t.fire();
        t.responses();
        t.commits();
        t.release();
        t.secondary_step();
        t.squash();
        t.flush();
        t.finish();

        let Tick { next, out, .. } = t;
        self.state = next;
        out
    }
}

/// One in-progress cycle: current state, next-state copy and outputs.
struct Tick<'a, 't> {
    cfg: &'a LsuConfig,
    cur: &'a LsuState,
    next: LsuState,
    inputs: &'a CycleInputs,
    translator: &'a mut (dyn Translator + 't),
    out: CycleOutputs,
    stats: &'a mut LsuStats,
}

impl Tick<'_, '_> {
    const fn lanes(&self) -> usize {
        self.cfg.lanes
    }

    fn mem_ready(&self, lane: usize) -> bool {
        self.inputs.mem.is_ready(lane)
    }

    fn kill_lines(&mut self) {
        let cur = self.cur;
        let br = &self.inputs.brupdate;
        for (lane, issued) in cur.issued.iter().enumerate() {
            let kill = match issued {
                Some(IssuedReq::Load(uop)) => {
                    let live = cur
                        .buf
                        .load(uop.buf_idx)
                        .is_some_and(|ld| ld.uop.same_instance(uop));
                    !live || br.kills(uop) || self.inputs.exception
                }
                Some(IssuedReq::Secondary) => {
                    cur.secondary.kill_pending()
                        || (cur.secondary.state() == secondary::SecondaryState::S2
                            && self.inputs.secondary.s2_kill)
                }
                Some(IssuedReq::Store(_)) | None => false,
            };
            if kill {
                debug!(lane, ?issued, "kill");
                self.out.kill[lane] = true;
                self.stats.kills += 1;
            }
        }
        self.next.issued = vec![None; self.lanes()];
    }

    fn expose_fault(&mut self) {
        let ordering = self
            .cur
            .buf
            .iter_live()
            .filter_map(|(_, e)| match e {
                entry::MemEntry::Load(ld) if ld.order_fail => Some(ld.uop),
                _ => None,
            });
        self.out.fault = arbitrate_faults(
            &self.cur.lane_faults,
            ordering,
            self.inputs.rob_head,
            self.cfg.rob_entries,
            &self.inputs.brupdate,
            self.inputs.exception,
        );
        if let Some(fault) = &self.out.fault {
            debug!(%fault, "fault exposed");
            self.stats.faults_exposed += 1;
        }
        self.next.lane_faults = vec![None; self.lanes()];
    }

    fn dispatch(&mut self) {
        let inputs = self.inputs;
        let mut stalled = false;
        for (slot, uop) in inputs.dispatch.iter().enumerate() {
            let ack = if uop.exception {
                self.stats.dispatch_skipped += 1;
                DispatchAck::Skipped
            } else if stalled || slot >= self.cfg.dispatch_width || !self.has_room(uop) {
                stalled = true;
                self.stats.dispatch_stalls += 1;
                DispatchAck::Stalled
            } else {
                let idx = self.next.buf.enqueue(*uop);
                if uop.uses_ldq() {
                    self.stats.dispatched_loads += 1;
                } else {
                    self.stats.dispatched_stores += 1;
                }
                DispatchAck::Accepted(idx)
            };
            self.out.dispatch.push(ack);
        }
    }

    fn has_room(&self, uop: &MicroOp) -> bool {
        let buf = &self.next.buf;
        if buf.is_full() {
            return false;
        }
        if uop.uses_ldq() {
            buf.live_loads() < self.cfg.ldq_entries
        } else {
            buf.live_stores() < self.cfg.stq_entries
        }
    }

    fn secondary_step(&mut self) {
        self.next.secondary.step(
            &self.cur.secondary,
            &self.inputs.secondary,
            &self.inputs.mem,
            &mut self.out.secondary,
            self.stats,
        );
    }

    fn finish(&mut self) {
        let buf = &self.next.buf;
        let full = buf.is_full();
        self.out.ldq_full = full || buf.live_loads() >= self.cfg.ldq_entries;
        self.out.stq_full = full || buf.live_stores() >= self.cfg.stq_entries;
        if full {
            self.stats.full_cycles += 1;
        }
        self.stats.cycles += 1;
        debug_assert!(
            buf.check_invariants().is_ok(),
            "operation buffer invariant broken"
        );
    }
}
