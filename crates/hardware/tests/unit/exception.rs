//! Exception Arbiter Unit Tests.
//!
//! Verifies that exactly one fault is exposed per cycle, that it is the
//! program-order oldest among the candidates, and that a global exception or a
//! branch kill in the exposing cycle suppresses it.

use lsqsim_core::common::{FaultCause, VirtAddr};
use lsqsim_core::core::lsu::exception::{FaultRecord, arbitrate_faults, rob_age};
use lsqsim_core::core::lsu::io::ExeRequest;
use lsqsim_core::core::uop::{BranchMask, BranchUpdate, MicroOp};
use lsqsim_core::soc::traits::FaultFlags;

use crate::common::harness::{Harness, ld, st};

const PAGE: FaultFlags = FaultFlags {
    misaligned: false,
    page: true,
    access: false,
};

const NO_ORDERING: [MicroOp; 0] = [];

fn record(rob: usize, cause: FaultCause) -> FaultRecord {
    FaultRecord {
        cause,
        addr: rob as u64 * 8,
        uop: ld(rob),
    }
}

// ══════════════════════════════════════════════════════════
// 1. Arbitration
// ══════════════════════════════════════════════════════════

#[test]
fn rob_age_is_relative_to_the_head() {
    assert_eq!(rob_age(5, 5, 32), 0);
    assert_eq!(rob_age(7, 5, 32), 2);
    assert_eq!(rob_age(1, 30, 32), 3);
}

#[test]
fn oldest_latched_fault_wins() {
    let latched = [
        Some(record(4, FaultCause::LoadPageFault)),
        Some(record(2, FaultCause::StoreAccessFault)),
    ];
    let winner = arbitrate_faults(&latched, NO_ORDERING, 0, 32, &BranchUpdate::default(), false);
    assert_eq!(winner.map(|w| w.uop.rob_idx), Some(2));
}

#[test]
fn age_wraps_around_the_rob() {
    let latched = [
        Some(record(1, FaultCause::LoadPageFault)),
        Some(record(30, FaultCause::LoadPageFault)),
    ];
    let winner = arbitrate_faults(&latched, NO_ORDERING, 29, 32, &BranchUpdate::default(), false);
    assert_eq!(winner.map(|w| w.uop.rob_idx), Some(30));
}

#[test]
fn ties_go_to_the_lowest_lane() {
    let latched = [
        Some(record(3, FaultCause::LoadPageFault)),
        Some(record(3, FaultCause::LoadAccessFault)),
    ];
    let winner = arbitrate_faults(&latched, NO_ORDERING, 0, 32, &BranchUpdate::default(), false);
    assert_eq!(winner.map(|w| w.cause), Some(FaultCause::LoadPageFault));
}

#[test]
fn ordering_violation_wins_only_when_strictly_older() {
    let latched = [Some(record(3, FaultCause::LoadPageFault))];
    let br = BranchUpdate::default();

    let same = arbitrate_faults(&latched, [ld(3)], 0, 32, &br, false);
    assert_eq!(same.map(|w| w.cause), Some(FaultCause::LoadPageFault));

    let older = arbitrate_faults(&latched, [ld(1)], 0, 32, &br, false);
    assert_eq!(older.map(|w| w.cause), Some(FaultCause::OrderingViolation));
    assert_eq!(older.map(|w| w.uop.rob_idx), Some(1));
}

#[test]
fn exception_or_branch_kill_suppresses_the_winner() {
    let latched = [Some(FaultRecord {
        uop: ld(2).under(BranchMask::tag(1)),
        ..record(2, FaultCause::LoadPageFault)
    })];
    assert!(arbitrate_faults(&latched, NO_ORDERING, 0, 32, &BranchUpdate::default(), true).is_none());

    let kill = BranchUpdate::mispredict(BranchMask::tag(1));
    assert!(arbitrate_faults(&latched, NO_ORDERING, 0, 32, &kill, false).is_none());

    let other = BranchUpdate::mispredict(BranchMask::tag(2));
    assert!(arbitrate_faults(&latched, NO_ORDERING, 0, 32, &other, false).is_some());
}

#[test]
fn fault_record_display() {
    let rec = FaultRecord {
        cause: FaultCause::LoadPageFault,
        addr: 0x300,
        uop: ld(4).at(2),
    };
    assert_eq!(rec.to_string(), "LoadPageFault at 0x300 (rob 4, slot 2)");
}

// ══════════════════════════════════════════════════════════
// 2. Through the scheduler
// ══════════════════════════════════════════════════════════

#[test]
fn simultaneous_lane_faults_expose_only_the_oldest() {
    let mut h = Harness::with_lanes(2);
    h.tlb.fault(0x300, PAGE);
    h.tlb.fault(0x310, PAGE);
    let uops = h.dispatch(&[ld(0), ld(1)]);

    let mut inputs = h.inputs();
    inputs.exe[0] = Some(ExeRequest::addr(uops[1], VirtAddr::new(0x310)));
    inputs.exe[1] = Some(ExeRequest::addr(uops[0], VirtAddr::new(0x300)));
    let out = h.tick(&inputs);
    assert!(out.fault.is_none());
    assert_eq!(h.lsu.state().latched_faults().iter().flatten().count(), 2);

    let out = h.idle();
    let fault = out.fault.unwrap();
    assert_eq!(fault.uop.rob_idx, 0);
    assert_eq!(fault.addr, 0x300);
    assert!(h.idle().fault.is_none());
    assert_eq!(h.lsu.stats().faults_exposed, 1);
}

#[test]
fn global_exception_suppresses_a_latched_fault() {
    let mut h = Harness::with_lanes(1);
    h.tlb.fault(0x300, PAGE);
    let uops = h.dispatch(&[ld(0)]);
    let _ = h.exe_addr(uops[0], 0x300);

    let mut inputs = h.inputs();
    inputs.exception = true;
    let out = h.tick(&inputs);
    assert!(out.fault.is_none());
    assert!(h.buffer().is_empty());
    assert!(h.idle().fault.is_none());
}

#[test]
fn branch_kill_in_the_exposing_cycle_suppresses_the_fault() {
    let mut h = Harness::with_lanes(1);
    h.tlb.fault(0x308, PAGE);
    let uops = h.dispatch(&[ld(0).under(BranchMask::tag(0))]);
    let _ = h.exe_addr(uops[0], 0x308);

    let mut inputs = h.inputs();
    inputs.brupdate = BranchUpdate::mispredict(BranchMask::tag(0));
    let out = h.tick(&inputs);
    assert!(out.fault.is_none());
    assert!(h.buffer().is_empty());
}

#[test]
fn fault_squashed_in_its_latch_cycle_is_never_exposed() {
    let mut h = Harness::with_lanes(1);
    h.tlb.fault(0x318, PAGE);
    let uops = h.dispatch(&[st(0).under(BranchMask::tag(3))]);

    let mut inputs = h.inputs();
    inputs.exe[0] = Some(ExeRequest::addr_data(uops[0], VirtAddr::new(0x318), 1));
    inputs.brupdate = BranchUpdate::mispredict(BranchMask::tag(3));
    let _ = h.tick(&inputs);
    assert!(h.lsu.state().latched_faults().iter().all(Option::is_none));
    assert!(h.idle().fault.is_none());
}

#[test]
fn resolved_branch_keeps_the_fault_and_clears_its_mask() {
    let mut h = Harness::with_lanes(1);
    h.tlb.fault(0x320, PAGE);
    let uops = h.dispatch(&[ld(0).under(BranchMask::tag(2))]);

    let mut inputs = h.inputs();
    inputs.exe[0] = Some(ExeRequest::addr(uops[0], VirtAddr::new(0x320)));
    inputs.brupdate = BranchUpdate::resolve(BranchMask::tag(2));
    let _ = h.tick(&inputs);

    let fault = h.idle().fault.unwrap();
    assert!(fault.uop.br_mask.is_empty());
}
