//! Commit and Release Unit Tests.
//!
//! Verifies that stores are sent only after commit, released only once committed and
//! acknowledged and strictly in program order, that fences wait for the backend to
//! drain, that committed loads leave the buffer at once, and that structural
//! violations are fatal.

use lsqsim_core::core::lsu::io::{ExeRequest, LoadResult};
use lsqsim_core::core::lsu::scheduler::FireClass;
use lsqsim_core::core::uop::MicroOp;
use pretty_assertions::assert_eq;

use crate::common::harness::{Harness, answer, fld, ld, st};

// ══════════════════════════════════════════════════════════
// 1. Stores
// ══════════════════════════════════════════════════════════

#[test]
fn store_is_not_sent_before_commit() {
    let mut h = Harness::with_lanes(1);
    let uops = h.dispatch(&[st(0)]);
    let _ = h.exe_store(uops[0], 0x100, 0x42);
    for _ in 0..5 {
        assert!(h.idle().mem_requests[0].is_none());
    }
    let _ = h.commit(&uops);
    let out = h.idle();
    assert!(out.fired[0].contains(FireClass::StoreCommit));
    let req = out.mem_requests[0].unwrap();
    assert_eq!((req.addr.val(), req.data), (0x100, 0x42));
}

#[test]
fn store_is_released_only_after_acknowledgement() {
    let mut h = Harness::with_lanes(1);
    let uops = h.dispatch(&[st(0)]);
    let req = h.send_store(uops[0], 0x100, 0x42);
    for _ in 0..3 {
        let _ = h.idle();
        assert!(h.buffer().store(0).is_some());
    }
    assert_eq!(h.buffer().execute_head(), 1);

    let _ = h.respond(&[answer(0, &req, 0)]);
    assert!(h.buffer().is_empty());
    assert_eq!(h.lsu.stats().stores_released, 1);
}

#[test]
fn stores_release_in_program_order() {
    let mut h = Harness::with_lanes(1);
    let uops = h.dispatch(&[st(0), st(1)]);
    let _ = h.exe_store(uops[0], 0x100, 1);
    let _ = h.exe_store(uops[1], 0x108, 2);
    let _ = h.commit(&uops);

    let first = h.idle().mem_requests[0].unwrap();
    let second = h.idle().mem_requests[0].unwrap();
    assert_eq!(first.uop, uops[0]);
    assert_eq!(second.uop, uops[1]);

    // The younger acknowledgement arrives first: nothing may leave yet.
    let _ = h.respond(&[answer(0, &second, 0)]);
    assert_eq!(h.buffer().occupancy(), 2);
    assert!(h.buffer().store(1).unwrap().succeeded);

    // One release per cycle, head first.
    let _ = h.respond(&[answer(0, &first, 0)]);
    assert_eq!(h.buffer().occupancy(), 1);
    assert_eq!(h.buffer().head(), 1);
    let _ = h.idle();
    assert!(h.buffer().is_empty());
}

#[test]
fn incomplete_store_blocks_younger_commits() {
    let mut h = Harness::with_lanes(1);
    let uops = h.dispatch(&[st(0), st(1)]);
    let _ = h.exe_addr(uops[0], 0x100);
    let _ = h.exe_store(uops[1], 0x108, 2);
    let _ = h.commit(&uops);
    for _ in 0..3 {
        assert!(h.idle().mem_requests[0].is_none());
    }
    let out = h.exe(0, ExeRequest::data(uops[0], 1));
    assert!(out.mem_requests[0].is_none());
    assert_eq!(h.idle().mem_requests[0].map(|r| r.uop), Some(uops[0]));
    assert_eq!(h.idle().mem_requests[0].map(|r| r.uop), Some(uops[1]));
}

// ══════════════════════════════════════════════════════════
// 2. Fences
// ══════════════════════════════════════════════════════════

#[test]
fn fence_waits_until_writes_are_ordered() {
    let mut h = Harness::with_lanes(1);
    let uops = h.dispatch(&[MicroOp::fence(0)]);

    let mut unordered = h.inputs();
    unordered.mem.ordered = false;
    unordered.commit = uops.clone();
    let out = h.tick(&unordered);
    assert!(out.force_order);
    assert!(h.buffer().store(0).unwrap().committed);

    unordered.commit.clear();
    assert!(h.tick(&unordered).force_order);
    assert!(!h.buffer().is_empty());

    let out = h.idle();
    assert!(!out.force_order);
    assert!(h.buffer().is_empty());
    assert_eq!(h.lsu.stats().fences_released, 1);
}

#[test]
fn fence_holds_back_younger_stores() {
    let mut h = Harness::with_lanes(1);
    let uops = h.dispatch(&[MicroOp::fence(0), st(1)]);
    let _ = h.exe_store(uops[1], 0x100, 5);

    let mut unordered = h.inputs();
    unordered.mem.ordered = false;
    unordered.commit = uops.clone();
    let _ = h.tick(&unordered);
    unordered.commit.clear();
    for _ in 0..3 {
        assert!(h.tick(&unordered).mem_requests[0].is_none());
    }

    // Ordered: the fence leaves, then the store is sent.
    let _ = h.idle();
    let out = h.idle();
    assert_eq!(out.mem_requests[0].map(|r| r.uop), Some(uops[1]));
}

// ══════════════════════════════════════════════════════════
// 3. Loads
// ══════════════════════════════════════════════════════════

#[test]
fn load_result_then_retirement() {
    let mut h = Harness::with_lanes(1);
    let uops = h.dispatch(&[ld(0)]);
    let req = h.exe_addr(uops[0], 0x2000).mem_requests[0].unwrap();

    let out = h.respond(&[answer(0, &req, 0x55)]);
    assert_eq!(
        out.results[0].int,
        Some(LoadResult {
            uop: uops[0],
            data: 0x55
        })
    );
    assert!(out.results[0].fp.is_none());
    assert!(h.buffer().load(0).unwrap().succeeded);

    let _ = h.commit(&uops);
    assert!(h.buffer().is_empty());
    assert_eq!(h.buffer().ldq_head(), 1);
    assert_eq!(h.lsu.stats().loads_retired, 1);
}

#[test]
fn fp_load_result_uses_the_fp_port() {
    let mut h = Harness::with_lanes(1);
    let uops = h.dispatch(&[fld(0)]);
    let req = h.exe_addr(uops[0], 0x2000).mem_requests[0].unwrap();
    let out = h.respond(&[answer(0, &req, 0x3FF0)]);
    assert!(out.results[0].int.is_none());
    assert_eq!(out.results[0].fp.map(|r| r.data), Some(0x3FF0));
}

#[test]
fn retired_load_hole_is_skipped_at_the_head() {
    let mut h = Harness::with_lanes(1);
    let uops = h.dispatch(&[ld(0), st(1)]);
    let _ = h.commit(&uops[..1]);
    assert_eq!(h.buffer().head(), 1);
    assert_eq!(h.buffer().occupancy(), 1);
}

#[test]
fn load_between_stores_retires_before_the_older_store_leaves() {
    let mut h = Harness::with_lanes(1);
    let uops = h.dispatch(&[st(0), ld(1)]);
    let _ = h.exe_store(uops[0], 0x100, 1);
    let _ = h.commit(&uops);
    assert!(h.buffer().get(1).is_none());
    assert!(h.buffer().store(0).is_some());
    assert_eq!(h.buffer().head(), 0);
}

// ══════════════════════════════════════════════════════════
// 4. Structural violations
// ══════════════════════════════════════════════════════════

#[test]
#[should_panic(expected = "commit of unallocated slot")]
fn commit_of_unallocated_slot_is_fatal() {
    let mut h = Harness::with_lanes(1);
    let _ = h.commit(&[ld(3).at(5)]);
}

#[test]
#[should_panic(expected = "committed twice")]
fn double_store_commit_is_fatal() {
    let mut h = Harness::with_lanes(1);
    let uops = h.dispatch(&[st(0)]);
    let _ = h.commit(&uops);
    let _ = h.commit(&uops);
}

#[test]
#[should_panic(expected = "exceed the commit width")]
fn commit_beyond_width_is_fatal() {
    let mut h = Harness::with_lanes(1);
    let a = h.dispatch(&[st(0), st(1)]);
    let b = h.dispatch(&[st(2)]);
    let all: Vec<MicroOp> = a.into_iter().chain(b).collect();
    let _ = h.commit(&all);
}
