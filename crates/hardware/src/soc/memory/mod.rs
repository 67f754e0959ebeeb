//! Reference Memory Backend.
//!
//! This module implements the memory system the scheduler's request port talks to. It
//! provides:
//! 1. **Buffer:** Sparse byte-addressable backing storage.
//! 2. **Controller:** Latency models (fixed, or jittered so reads complete out of order).
//! 3. **MemorySystem:** The request/response port itself, with nack injection, kills,
//!    line releases and the write-ordering bit.
//!
//! Writes are performed when their response is delivered and never overtake each other.
//! A nacked write nacks every younger write still in flight, and every write accepted in
//! the same cycle, so a write can never become visible ahead of an older one that has
//! to be re-sent.

/// Sparse backing storage.
pub mod buffer;

/// Memory controller implementations for access latency modeling.
pub mod controller;

use tracing::{debug, trace};

use crate::common::addr::PhysAddr;
use crate::common::constants::MAX_LANES;
use crate::common::data::AccessType;
use crate::config::MemoryConfig;
use crate::core::lsu::io::{LineRelease, MemRequest, MemResponse, MemoryEvents};
use crate::soc::traits::MemoryBackend;

use self::buffer::SparseBuffer;
use self::controller::{JitterController, MemoryController, SimpleController};

/// Earliest delivery, in cycles after acceptance; the kill window must close first.
const MIN_LATENCY: u64 = 2;

/// An accepted request awaiting its response.
#[derive(Clone, Copy, Debug)]
struct InFlight {
    seq: u64,
    lane: usize,
    req: MemRequest,
    accepted_at: u64,
    due: u64,
    nack: bool,
    killed: bool,
}

impl InFlight {
    fn is_write(&self) -> bool {
        self.req.cmd == AccessType::Write
    }

    const fn answer(&self, data: u64) -> MemResponse {
        MemResponse {
            lane: self.lane,
            uop: self.req.uop,
            data,
            secondary: self.req.secondary,
        }
    }
}

/// Memory backend activity counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Requests accepted.
    pub requests: u64,
    /// Reads performed.
    pub reads: u64,
    /// Writes performed.
    pub writes: u64,
    /// Nacks delivered (injected, killed or cascaded).
    pub nacks: u64,
    /// Requests killed by the scheduler.
    pub kills: u64,
    /// Line releases acknowledged.
    pub releases: u64,
}

/// Latency-modelled memory port backed by a sparse byte store.
#[derive(Debug)]
pub struct MemorySystem {
    cfg: MemoryConfig,
    store: SparseBuffer,
    read_ctrl: Box<dyn MemoryController>,
    write_ctrl: SimpleController,
    in_flight: Vec<InFlight>,
    last_accepted: [Option<(u64, u64)>; MAX_LANES],
    last_write_due: u64,
    write_nack_cycle: Option<u64>,
    release: Option<LineRelease>,
    cycle: u64,
    seq: u64,
    stats: MemoryStats,
}

impl MemorySystem {
    /// Creates an empty memory system.
    ///
    /// # Arguments
    ///
    /// * `cfg` - Latency, nack injection, reordering and busy pattern.
    pub fn new(cfg: &MemoryConfig) -> Self {
        let read_ctrl: Box<dyn MemoryController> = if cfg.reorder {
            Box::new(JitterController::new(cfg.latency, cfg.latency))
        } else {
            Box::new(SimpleController::new(cfg.latency))
        };
        Self {
            cfg: cfg.clone(),
            store: SparseBuffer::new(),
            read_ctrl,
            write_ctrl: SimpleController::new(cfg.latency),
            in_flight: Vec::new(),
            last_accepted: [None; MAX_LANES],
            last_write_due: 0,
            write_nack_cycle: None,
            release: None,
            cycle: 0,
            seq: 0,
            stats: MemoryStats::default(),
        }
    }

    /// Backing store.
    pub const fn store(&self) -> &SparseBuffer {
        &self.store
    }

    /// Mutable backing store, for preloading contents.
    pub const fn store_mut(&mut self) -> &mut SparseBuffer {
        &mut self.store
    }

    /// Activity counters.
    pub const fn stats(&self) -> &MemoryStats {
        &self.stats
    }

    /// Current cycle.
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Number of requests awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// A line release is waiting to be acknowledged.
    pub const fn release_pending(&self) -> bool {
        self.release.is_some()
    }

    /// Raises a line release for the line holding `addr`.
    ///
    /// # Returns
    ///
    /// `false` if an earlier release is still unacknowledged.
    pub fn inject_release(&mut self, addr: PhysAddr) -> bool {
        if self.release.is_some() {
            return false;
        }
        self.release = Some(LineRelease { addr });
        debug!(line = addr.line(), "line release raised");
        true
    }

    fn perform(&mut self, f: &InFlight) -> MemResponse {
        match f.req.cmd {
            AccessType::Read => {
                self.stats.reads += 1;
                f.answer(self.store.read(f.req.addr, f.req.width))
            }
            AccessType::Write => {
                self.stats.writes += 1;
                self.store.write(f.req.addr, f.req.width, f.req.data);
                f.answer(0)
            }
        }
    }
}

impl MemoryBackend for MemorySystem {
    fn ready(&self, _lane: usize) -> bool {
        self.cfg.busy_every == 0 || (self.cycle + 1) % self.cfg.busy_every != 0
    }

    fn events(&mut self, lanes: usize) -> MemoryEvents {
        let mut events = MemoryEvents {
            ready: (0..lanes).map(|lane| self.ready(lane)).collect(),
            release: self.release,
            ..MemoryEvents::default()
        };

        let mut served = [false; MAX_LANES];
        let mut write_blocked = false;
        let mut cascade = false;
        let mut waiting = Vec::with_capacity(self.in_flight.len());
        for f in std::mem::take(&mut self.in_flight) {
            let write = f.is_write();
            if write && cascade {
                events.nacks.push(f.answer(0));
                self.stats.nacks += 1;
                continue;
            }
            let lane_busy = served.get(f.lane).copied().unwrap_or(true);
            if f.due > self.cycle || lane_busy || (write && write_blocked) {
                write_blocked |= write;
                waiting.push(f);
                continue;
            }
            if let Some(s) = served.get_mut(f.lane) {
                *s = true;
            }
            if f.nack || f.killed {
                events.nacks.push(f.answer(0));
                self.stats.nacks += 1;
                cascade |= write;
                debug!(seq = f.seq, lane = f.lane, killed = f.killed, "request nacked");
            } else {
                let resp = self.perform(&f);
                trace!(seq = f.seq, lane = f.lane, addr = f.req.addr.val(), "response");
                events.responses.push(resp);
            }
        }
        if cascade {
            self.write_nack_cycle = Some(self.cycle);
        }
        events.ordered = !waiting.iter().any(InFlight::is_write);
        self.in_flight = waiting;
        events
    }

    fn request(&mut self, lane: usize, req: MemRequest) {
        self.seq += 1;
        self.stats.requests += 1;
        let write = req.cmd == AccessType::Write;
        let injected = self.cfg.nack_every != 0 && self.stats.requests % self.cfg.nack_every == 0;
        let nack = injected || (write && self.write_nack_cycle == Some(self.cycle));

        let earliest = self.cycle + MIN_LATENCY;
        let due = if write {
            let due = (self.cycle + self.write_ctrl.access_latency(req.addr.val()))
                .max(earliest)
                .max(self.last_write_due);
            self.last_write_due = due;
            due
        } else {
            (self.cycle + self.read_ctrl.access_latency(req.addr.val())).max(earliest)
        };

        trace!(seq = self.seq, lane, addr = req.addr.val(), write, due, nack, "request accepted");
        self.in_flight.push(InFlight {
            seq: self.seq,
            lane,
            req,
            accepted_at: self.cycle,
            due,
            nack,
            killed: false,
        });
        if let Some(slot) = self.last_accepted.get_mut(lane) {
            *slot = Some((self.seq, self.cycle));
        }
    }

    fn kill(&mut self, lane: usize) {
        let Some(&Some((seq, at))) = self.last_accepted.get(lane) else {
            return;
        };
        if at + 1 != self.cycle {
            return;
        }
        if let Some(f) = self
            .in_flight
            .iter_mut()
            .find(|f| f.seq == seq && f.accepted_at == at)
        {
            f.killed = true;
            self.stats.kills += 1;
            debug!(seq, lane, "request killed");
        }
    }

    fn ack_release(&mut self) {
        if self.release.take().is_some() {
            self.stats.releases += 1;
        }
    }

    fn tick(&mut self) {
        self.cycle += 1;
    }
}
