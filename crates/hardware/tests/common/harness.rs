//! Cycle-by-cycle scheduler driver.
//!
//! `Harness` owns a scheduler and a scripted translator and offers one helper per kind of
//! cycle a test usually needs (dispatch, execute, respond, commit, idle). Every helper
//! runs exactly one tick and returns that tick's outputs.

use lsqsim_core::common::{MemWidth, VirtAddr};
use lsqsim_core::config::LsuConfig;
use lsqsim_core::core::lsu::Lsu;
use lsqsim_core::core::lsu::buffer::OperationBuffer;
use lsqsim_core::core::lsu::io::{
    CycleInputs, CycleOutputs, DispatchAck, ExeRequest, MemRequest, MemResponse,
};
use lsqsim_core::core::uop::{Dest, MicroOp};
use tracing_subscriber::EnvFilter;

use super::mocks::ScriptedTranslator;

/// Installs a test-writer subscriber once per process; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Integer double-word load.
pub fn ld(rob: usize) -> MicroOp {
    MicroOp::load(
        rob,
        MemWidth::Double,
        Dest {
            reg: rob as u16,
            fp: false,
        },
    )
}

/// Floating-point double-word load.
pub fn fld(rob: usize) -> MicroOp {
    MicroOp::load(
        rob,
        MemWidth::Double,
        Dest {
            reg: rob as u16,
            fp: true,
        },
    )
}

/// Double-word store.
pub fn st(rob: usize) -> MicroOp {
    MicroOp::store(rob, MemWidth::Double)
}

/// Response to `req` on `lane`.
pub fn answer(lane: usize, req: &MemRequest, data: u64) -> MemResponse {
    MemResponse {
        lane,
        uop: req.uop,
        data,
        secondary: req.secondary,
    }
}

pub struct Harness {
    pub lsu: Lsu,
    pub tlb: ScriptedTranslator,
    lanes: usize,
}

impl Harness {
    pub fn new(cfg: LsuConfig) -> Self {
        init_tracing();
        let lanes = cfg.lanes;
        Self {
            lsu: Lsu::new(&cfg).unwrap(),
            tlb: ScriptedTranslator::new(),
            lanes,
        }
    }

    /// Default sizes with `lanes` lanes.
    pub fn with_lanes(lanes: usize) -> Self {
        Self::new(LsuConfig {
            lanes,
            ..LsuConfig::default()
        })
    }

    /// An idle cycle's inputs, to be filled in by the test.
    pub fn inputs(&self) -> CycleInputs {
        CycleInputs::idle(self.lanes)
    }

    pub fn tick(&mut self, inputs: &CycleInputs) -> CycleOutputs {
        let out = self.lsu.tick(inputs, &mut self.tlb);
        assert!(
            self.buffer().check_invariants().is_ok(),
            "{:?}",
            self.buffer().check_invariants()
        );
        out
    }

    pub fn idle(&mut self) -> CycleOutputs {
        let inputs = self.inputs();
        self.tick(&inputs)
    }

    pub fn buffer(&self) -> &OperationBuffer {
        self.lsu.state().buffer()
    }

    /// Dispatches `uops` in one cycle and returns them as the buffer stamped them.
    ///
    /// # Panics
    ///
    /// Panics unless every operation is accepted.
    pub fn dispatch(&mut self, uops: &[MicroOp]) -> Vec<MicroOp> {
        let mut inputs = self.inputs();
        inputs.dispatch = uops.to_vec();
        let out = self.tick(&inputs);
        uops.iter()
            .zip(&out.dispatch)
            .map(|(uop, ack)| match ack {
                DispatchAck::Accepted(idx) => *self.buffer().get(*idx).unwrap().uop(),
                other => panic!("rob {} not accepted: {other:?}", uop.rob_idx),
            })
            .collect()
    }

    /// Dispatches `uops` one per cycle.
    pub fn dispatch_each(&mut self, uops: &[MicroOp]) -> Vec<MicroOp> {
        uops.iter().flat_map(|u| self.dispatch(&[*u])).collect()
    }

    pub fn exe(&mut self, lane: usize, req: ExeRequest) -> CycleOutputs {
        let mut inputs = self.inputs();
        inputs.exe[lane] = Some(req);
        self.tick(&inputs)
    }

    /// Supplies a load or store address at `vaddr` on lane 0.
    pub fn exe_addr(&mut self, uop: MicroOp, vaddr: u64) -> CycleOutputs {
        self.exe(0, ExeRequest::addr(uop, VirtAddr::new(vaddr)))
    }

    /// Supplies a store's address and data together on lane 0.
    pub fn exe_store(&mut self, uop: MicroOp, vaddr: u64, data: u64) -> CycleOutputs {
        self.exe(0, ExeRequest::addr_data(uop, VirtAddr::new(vaddr), data))
    }

    pub fn commit(&mut self, uops: &[MicroOp]) -> CycleOutputs {
        let mut inputs = self.inputs();
        inputs.commit = uops.to_vec();
        self.tick(&inputs)
    }

    pub fn respond(&mut self, responses: &[MemResponse]) -> CycleOutputs {
        let mut inputs = self.inputs();
        inputs.mem.responses = responses.to_vec();
        self.tick(&inputs)
    }

    pub fn nack(&mut self, nacks: &[MemResponse]) -> CycleOutputs {
        let mut inputs = self.inputs();
        inputs.mem.nacks = nacks.to_vec();
        self.tick(&inputs)
    }

    /// Runs idle cycles until a memory request appears on any lane, up to `limit` cycles.
    pub fn idle_until_request(&mut self, limit: usize) -> (usize, MemRequest) {
        for _ in 0..limit {
            let out = self.idle();
            if let Some((lane, req)) = out
                .mem_requests
                .iter()
                .enumerate()
                .find_map(|(lane, r)| r.map(|r| (lane, r)))
            {
                return (lane, req);
            }
        }
        panic!("no memory request within {limit} cycles");
    }

    /// Drives a dispatched store through execute and commit until its write is sent.
    pub fn send_store(&mut self, uop: MicroOp, vaddr: u64, data: u64) -> MemRequest {
        let _ = self.exe_store(uop, vaddr, data);
        let _ = self.commit(&[uop]);
        let (lane, req) = self.idle_until_request(4);
        assert_eq!(lane, 0);
        req
    }
}
