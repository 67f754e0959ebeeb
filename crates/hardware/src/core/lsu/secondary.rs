//! Secondary memory client.
//!
//! A single non-pipeline request at a time shares lane 0's translator and memory port
//! with the core. The request moves through these states:
//!
//! ```text
//! ready -> s1 -> { s2 | s2_nack }
//! s2    -> { wait | dead }
//! wait  -> { ready | replay }
//! replay -> wait
//! dead  -> ready
//! s2_nack -> ready
//! ```
//!
//! 1. **s1:** Offers the secondary-incoming class. On fire the address is translated and,
//!    on a hit with the port ready, the request is sent. A miss or an unsent request nacks
//!    the client; a fault is held for delivery in s2.
//! 2. **s2:** Delivers a latched fault. A kill or a fault leads to `dead`. A response that
//!    already returns in s2 completes the transaction directly.
//! 3. **wait/replay:** A nack re-sends the latched physical address through the replay class.
//! 4. **dead:** Absorbs the response or nack of a request no longer wanted.

use tracing::debug;

use crate::common::addr::PhysAddr;
use crate::common::error::FaultCause;
use crate::core::uop::MicroOp;
use crate::stats::LsuStats;

use super::io::{
    MemRequest, MemoryEvents, SecondaryInputs, SecondaryOutputs, SecondaryReq, SecondaryResp,
};
use super::translate::Translation;

/// State of the secondary client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SecondaryState {
    /// Idle; a new request may be accepted.
    #[default]
    Ready,
    /// Translating and sending.
    S1,
    /// Delivering the translation outcome.
    S2,
    /// Reporting that the request was not sent.
    S2Nack,
    /// Waiting for the backend.
    Wait,
    /// Waiting to re-send after a nack.
    Replay,
    /// Draining an unwanted in-flight request.
    Dead,
}

/// Secondary client registers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecondaryClient {
    state: SecondaryState,
    req: Option<SecondaryReq>,
    paddr: PhysAddr,
    fault: Option<FaultCause>,
    in_flight: bool,
    killed: bool,
    sent: bool,
}

impl SecondaryClient {
    /// Current state.
    pub const fn state(&self) -> SecondaryState {
        self.state
    }

    /// A request is outstanding at the memory backend.
    pub const fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// The request sent in s1 was killed and must be cancelled this cycle.
    pub(super) const fn kill_pending(&self) -> bool {
        self.killed
    }

    /// Asserts the secondary-incoming candidate.
    pub const fn wants_incoming(&self) -> bool {
        matches!(self.state, SecondaryState::S1)
    }

    /// Asserts the secondary-replay candidate.
    pub const fn wants_replay(&self) -> bool {
        matches!(self.state, SecondaryState::Replay)
    }

    /// The latched request.
    pub const fn request(&self) -> Option<SecondaryReq> {
        self.req
    }

    fn mem_request(&self, req: &SecondaryReq) -> MemRequest {
        MemRequest {
            addr: self.paddr,
            data: req.data,
            cmd: req.cmd,
            width: req.width,
            uop: MicroOp::default(),
            secondary: true,
        }
    }

    /// Applies the translation performed when the incoming class fired.
    ///
    /// # Returns
    ///
    /// The memory request to send, if any.
    pub(super) fn on_translate(
        &mut self,
        outcome: Translation,
        mem_ready: bool,
    ) -> Option<MemRequest> {
        let req = self.req?;
        match outcome {
            Translation::Fault(cause) => {
                self.fault = Some(cause);
                None
            }
            Translation::Miss(_) => None,
            Translation::Hit { paddr, .. } => {
                self.paddr = paddr;
                if mem_ready {
                    self.in_flight = true;
                    self.sent = true;
                    Some(self.mem_request(&req))
                } else {
                    None
                }
            }
        }
    }

    /// Re-sends the latched request when the replay class fired.
    pub(super) fn on_replay(&mut self) -> Option<MemRequest> {
        let req = self.req?;
        self.in_flight = true;
        self.sent = true;
        Some(self.mem_request(&req))
    }

    /// Advances the state machine by one cycle.
    ///
    /// `self` is the next-state copy, already updated by any firing this cycle; `cur`
    /// is the state at the start of the cycle.
    pub(super) fn step(
        &mut self,
        cur: &Self,
        inputs: &SecondaryInputs,
        mem: &MemoryEvents,
        out: &mut SecondaryOutputs,
        stats: &mut LsuStats,
    ) {
        let resp = mem.responses.iter().find(|r| r.secondary);
        let nack = mem.nacks.iter().any(|r| r.secondary);
        let sent = std::mem::take(&mut self.sent);
        self.killed = false;

        let next = match cur.state {
            SecondaryState::Ready => {
                out.ready = true;
                match inputs.req {
                    Some(req) => {
                        self.req = Some(req);
                        self.fault = None;
                        SecondaryState::S1
                    }
                    None => SecondaryState::Ready,
                }
            }
            SecondaryState::S1 => {
                if inputs.s1_kill {
                    if sent {
                        self.killed = true;
                        SecondaryState::Dead
                    } else {
                        SecondaryState::Ready
                    }
                } else if self.fault.is_some() || sent {
                    SecondaryState::S2
                } else {
                    stats.secondary_nacks += 1;
                    SecondaryState::S2Nack
                }
            }
            SecondaryState::S2 => {
                out.fault = self.fault;
                if inputs.s2_kill || self.fault.is_some() {
                    if resp.is_some() || nack {
                        self.in_flight = false;
                    }
                    SecondaryState::Dead
                } else {
                    self.await_backend(resp.map(|r| r.data), nack, out, stats)
                }
            }
            SecondaryState::S2Nack => {
                out.nack = true;
                SecondaryState::Ready
            }
            SecondaryState::Wait => self.await_backend(resp.map(|r| r.data), nack, out, stats),
            SecondaryState::Replay => {
                if sent {
                    SecondaryState::Wait
                } else {
                    SecondaryState::Replay
                }
            }
            SecondaryState::Dead => {
                if resp.is_some() || nack {
                    self.in_flight = false;
                }
                if self.in_flight {
                    SecondaryState::Dead
                } else {
                    SecondaryState::Ready
                }
            }
        };

        if next != cur.state {
            debug!(from = ?cur.state, to = ?next, "secondary client");
        }
        if next == SecondaryState::Ready {
            self.req = None;
            self.fault = None;
        }
        self.state = next;
    }

    fn await_backend(
        &mut self,
        data: Option<u64>,
        nack: bool,
        out: &mut SecondaryOutputs,
        stats: &mut LsuStats,
    ) -> SecondaryState {
        if let Some(data) = data {
            self.in_flight = false;
            out.resp = self.req.map(|req| SecondaryResp {
                addr: req.addr,
                data,
            });
            stats.secondary_completed += 1;
            SecondaryState::Ready
        } else if nack {
            self.in_flight = false;
            stats.secondary_nacks += 1;
            SecondaryState::Replay
        } else {
            SecondaryState::Wait
        }
    }
}
