//! Statistics Unit Tests.
//!
//! Verifies fire counting, section selection in the text report, and that a
//! scheduler run feeds the counters the report prints.

use lsqsim_core::core::lsu::scheduler::FireClass;
use lsqsim_core::stats::{LsuStats, STATS_SECTIONS};

use crate::common::harness::{Harness, answer, ld};

#[test]
fn fire_counts_accumulate_per_class() {
    let mut stats = LsuStats::default();
    stats.record_fire(FireClass::LoadIncoming);
    stats.record_fire(FireClass::LoadIncoming);
    stats.record_fire(FireClass::StoreCommit);
    assert_eq!(stats.fires(FireClass::LoadIncoming), 2);
    assert_eq!(stats.fires(FireClass::StoreCommit), 1);
    assert_eq!(stats.fires(FireClass::Release), 0);
    assert_eq!(stats.total_fires(), 3);
}

#[test]
fn empty_selection_renders_every_section() {
    let report = LsuStats::default().render_sections(&[]);
    for heading in ["sim_cycles", "ARBITER", "TRANSLATION", "MEMORY PORT", "OPERATION BUFFER"] {
        assert!(report.contains(heading), "missing {heading}");
    }
    assert_eq!(STATS_SECTIONS.len(), 5);
}

#[test]
fn selection_limits_the_report() {
    let report = LsuStats::default().render_sections(&["memory".to_string()]);
    assert!(report.contains("MEMORY PORT"));
    assert!(!report.contains("ARBITER"));
    assert!(!report.contains("sim_cycles"));
}

#[test]
fn arbiter_section_lists_every_class() {
    let report = LsuStats::default().render_sections(&["arbiter".to_string()]);
    for class in FireClass::PRIORITY {
        assert!(report.contains(&format!("fire.{}", class.name())));
    }
}

#[test]
fn scheduler_run_is_reflected_in_the_counters() {
    let mut h = Harness::with_lanes(1);
    let uops = h.dispatch(&[ld(0)]);
    let req = h.exe_addr(uops[0], 0x100).mem_requests[0].unwrap();
    let _ = h.respond(&[answer(0, &req, 1)]);
    let _ = h.commit(&uops);

    let stats = h.lsu.stats();
    assert_eq!(stats.cycles, 4);
    assert_eq!(stats.dispatched_loads, 1);
    assert_eq!(stats.translations, 1);
    assert_eq!(stats.mem_requests, 1);
    assert_eq!(stats.fires(FireClass::LoadIncoming), 1);
    assert_eq!(stats.loads_retired, 1);

    let report = stats.render_sections(&["buffer".to_string()]);
    assert!(report.contains("dispatch.loads         1"));
}
