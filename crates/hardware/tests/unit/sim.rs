//! Simulator Integration Tests.
//!
//! Runs complete traces through the simulator and checks architectural outcomes:
//! committed load values, final memory contents, exceptions, mispredictions,
//! secondary-client traffic, line releases and trace validation.

use std::io::Write as _;

use lsqsim_core::common::{FaultCause, MemWidth, PhysAddr, VirtAddr};
use lsqsim_core::config::{Config, MemoryConfig, PageMapping, TranslatorConfig};
use lsqsim_core::core::lsu::io::SecondaryResp;
use lsqsim_core::sim::simulator::LoadValue;
use lsqsim_core::sim::{SimError, SimReport, Simulator, Trace, TraceError};
use pretty_assertions::assert_eq;

use crate::common::harness::init_tracing;

const LIMIT: u64 = 10_000;

fn simulate(config: &Config, json: &str) -> (Simulator, SimReport) {
    init_tracing();
    let trace = Trace::from_json(json).unwrap();
    let mut sim = Simulator::new(config, trace).unwrap();
    let report = sim.run(LIMIT).unwrap().clone();
    (sim, report)
}

fn mem_word(sim: &Simulator, addr: u64) -> u64 {
    sim.memory()
        .store()
        .read(PhysAddr::new(addr), MemWidth::Double)
}

// ══════════════════════════════════════════════════════════
// 1. Straight-line programs
// ══════════════════════════════════════════════════════════

#[test]
fn stores_reach_memory_and_loads_return_preloaded_values() {
    let (sim, report) = simulate(
        &Config::default(),
        r#"{
            "memory": [ { "addr": 8192, "data": 7 }, { "addr": 8200, "data": 9 } ],
            "ops": [
                { "kind": "store", "addr": 4096, "data": 42 },
                { "kind": "load", "addr": 8192 },
                { "kind": "store", "addr": 4104, "data": 43, "data_delay": 3 },
                { "kind": "load", "addr": 8200 }
            ]
        }"#,
    );
    assert_eq!(report.committed, 4);
    assert_eq!(
        report.loads,
        vec![LoadValue { op: 1, data: 7 }, LoadValue { op: 3, data: 9 }]
    );
    assert_eq!(mem_word(&sim, 4096), 42);
    assert_eq!(mem_word(&sim, 4104), 43);
    assert!(report.faults.is_empty());
    assert!(sim.lsu().state().buffer().is_empty());
    assert_eq!(sim.lsu().stats().stores_released, 2);
}

#[test]
fn narrow_loads_are_zero_extended() {
    let (_, report) = simulate(
        &Config::default(),
        r#"{
            "memory": [ { "addr": 256, "data": 18446744073709551615 } ],
            "ops": [ { "kind": "load", "addr": 256, "width": "byte" } ]
        }"#,
    );
    assert_eq!(report.loads, vec![LoadValue { op: 0, data: 0xFF }]);
}

#[test]
fn younger_store_to_the_same_address_wins_under_nacks() {
    let mut config = Config {
        memory: MemoryConfig {
            latency: 3,
            nack_every: 3,
            reorder: true,
            busy_every: 5,
        },
        ..Config::default()
    };
    config.lsu.lanes = 2;
    let (sim, report) = simulate(
        &config,
        r#"{
            "memory": [ { "addr": 8192, "data": 5 } ],
            "ops": [
                { "kind": "store", "addr": 4096, "data": 1 },
                { "kind": "store", "addr": 4096, "data": 2 },
                { "kind": "load", "addr": 8192 },
                { "kind": "store", "addr": 4096, "data": 3 },
                { "kind": "store", "addr": 4112, "data": 4 },
                { "kind": "load", "addr": 8192 }
            ]
        }"#,
    );
    assert_eq!(mem_word(&sim, 4096), 3);
    assert_eq!(mem_word(&sim, 4112), 4);
    assert_eq!(report.loads.len(), 2);
    assert!(report.loads.iter().all(|l| l.data == 5));
    assert!(sim.memory().stats().nacks > 0);
}

#[test]
fn fence_drains_before_completion() {
    let (sim, report) = simulate(
        &Config::default(),
        r#"{
            "ops": [
                { "kind": "store", "addr": 4096, "data": 1 },
                { "kind": "fence" },
                { "kind": "store", "addr": 4104, "data": 2 }
            ]
        }"#,
    );
    assert_eq!(report.committed, 3);
    assert_eq!(sim.lsu().stats().fences_released, 1);
    assert_eq!(mem_word(&sim, 4104), 2);
}

// ══════════════════════════════════════════════════════════
// 2. Exceptions and mispredictions
// ══════════════════════════════════════════════════════════

#[test]
fn misaligned_load_raises_an_exception_and_execution_resumes() {
    let (_, report) = simulate(
        &Config::default(),
        r#"{
            "memory": [ { "addr": 8192, "data": 7 } ],
            "ops": [
                { "kind": "load", "addr": 4100 },
                { "kind": "load", "addr": 8192 }
            ]
        }"#,
    );
    assert_eq!(report.faults.len(), 1);
    assert_eq!(report.faults[0].cause, FaultCause::LoadAddressMisaligned);
    assert_eq!(report.faults[0].addr, 4100);
    assert_eq!(report.loads, vec![LoadValue { op: 1, data: 7 }]);
    assert_eq!(report.committed, 1);
}

#[test]
fn faulting_store_address_is_reported() {
    let (sim, report) = simulate(
        &Config::default(),
        r#"{
            "ops": [
                { "kind": "store", "addr": 4096, "data": 1, "addr_fault": true },
                { "kind": "store", "addr": 4104, "data": 2 }
            ]
        }"#,
    );
    assert_eq!(report.faults[0].cause, FaultCause::StoreAccessFault);
    assert_eq!(mem_word(&sim, 4096), 0);
    assert_eq!(mem_word(&sim, 4104), 2);
}

#[test]
fn operation_with_a_known_exception_is_not_executed() {
    let (sim, report) = simulate(
        &Config::default(),
        r#"{ "ops": [ { "kind": "load", "addr": 4096, "exception": true } ] }"#,
    );
    assert_eq!(report.faults.len(), 1);
    assert_eq!(report.committed, 0);
    assert_eq!(sim.lsu().stats().dispatch_skipped, 1);
    assert_eq!(sim.lsu().stats().mem_requests, 0);
}

#[test]
fn wrong_path_operations_never_commit() {
    let (sim, report) = simulate(
        &Config::default(),
        r#"{
            "memory": [ { "addr": 8192, "data": 7 } ],
            "ops": [
                { "kind": "branch", "mispredict": true, "resolve_after": 4, "wrong_path": 2 },
                { "kind": "store", "addr": 4096, "data": 99 },
                { "kind": "load", "addr": 12288 },
                { "kind": "load", "addr": 8192 }
            ]
        }"#,
    );
    assert_eq!(report.mispredicts, 1);
    assert_eq!(report.committed, 2);
    assert_eq!(report.loads, vec![LoadValue { op: 3, data: 7 }]);
    assert_eq!(mem_word(&sim, 4096), 0, "wrong-path store must not be performed");
    assert!(sim.lsu().stats().squashed > 0);
}

#[test]
fn correctly_predicted_branch_keeps_its_shadow() {
    let (_, report) = simulate(
        &Config::default(),
        r#"{
            "memory": [ { "addr": 8192, "data": 7 } ],
            "ops": [
                { "kind": "branch", "resolve_after": 2 },
                { "kind": "load", "addr": 8192 }
            ]
        }"#,
    );
    assert_eq!(report.mispredicts, 0);
    assert_eq!(report.committed, 2);
    assert_eq!(report.loads, vec![LoadValue { op: 1, data: 7 }]);
}

// ══════════════════════════════════════════════════════════
// 3. Side traffic and translation
// ══════════════════════════════════════════════════════════

#[test]
fn secondary_read_is_served() {
    let (sim, report) = simulate(
        &Config::default(),
        r#"{
            "memory": [ { "addr": 8192, "data": 7 } ],
            "secondary": [ { "cycle": 2, "addr": 8192 } ]
        }"#,
    );
    assert_eq!(
        report.secondary,
        vec![SecondaryResp {
            addr: VirtAddr::new(8192),
            data: 7
        }]
    );
    assert_eq!(sim.lsu().stats().secondary_completed, 1);
}

#[test]
fn secondary_access_to_an_unmapped_page_faults() {
    let config = Config {
        translator: TranslatorConfig {
            bare: false,
            ..TranslatorConfig::default()
        },
        ..Config::default()
    };
    let (_, report) = simulate(
        &config,
        r#"{ "secondary": [ { "cycle": 0, "addr": 16384 } ] }"#,
    );
    assert!(report.secondary.is_empty());
    assert_eq!(report.secondary_faults, vec![FaultCause::LoadPageFault]);
}

#[test]
fn paged_loads_are_translated() {
    let config = Config {
        translator: TranslatorConfig {
            bare: false,
            pages: vec![PageMapping {
                vpn: 1,
                ppn: 2,
                readable: true,
                writable: true,
                user: true,
            }],
            ..TranslatorConfig::default()
        },
        ..Config::default()
    };
    let (sim, report) = simulate(
        &config,
        r#"{
            "memory": [ { "addr": 8200, "data": 11 } ],
            "ops": [
                { "kind": "load", "addr": 4104 },
                { "kind": "store", "addr": 4112, "data": 12 }
            ]
        }"#,
    );
    assert_eq!(report.loads, vec![LoadValue { op: 0, data: 11 }]);
    assert_eq!(mem_word(&sim, 8208), 12);
    assert!(sim.translator().stats().walks >= 1);
    assert!(sim.lsu().stats().tlb_misses >= 1);
}

#[test]
fn scheduled_line_release_is_acknowledged() {
    let (sim, _) = simulate(
        &Config::default(),
        r#"{ "releases": [ { "cycle": 1, "addr": 64 } ] }"#,
    );
    assert_eq!(sim.memory().stats().releases, 1);
    assert!(!sim.memory().release_pending());
}

// ══════════════════════════════════════════════════════════
// 4. Trace loading and run limits
// ══════════════════════════════════════════════════════════

#[test]
fn trace_file_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "ops": [ {{ "kind": "fence" }} ] }}"#).unwrap();
    let trace = Trace::load(file.path()).unwrap();
    assert_eq!(trace.ops.len(), 1);
}

#[test]
fn missing_trace_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Trace::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, TraceError::Io { .. }));
}

#[test]
fn malformed_trace_is_a_parse_error() {
    let err = Trace::from_json(r#"{ "ops": [ { "kind": "jump" } ] }"#).unwrap_err();
    assert!(matches!(err, TraceError::Parse(_)));
}

#[test]
fn inconsistent_operations_are_rejected() {
    let cases = [
        r#"{ "ops": [ { "kind": "branch", "resolve_after": 0 }, { "kind": "fence" } ] }"#,
        r#"{ "ops": [ { "kind": "branch", "wrong_path": 1 }, { "kind": "fence" } ] }"#,
        r#"{ "ops": [ { "kind": "branch", "mispredict": true, "wrong_path": 3 } ] }"#,
        r#"{ "ops": [ { "kind": "load", "addr": 0, "delay": 0 } ] }"#,
        r#"{ "ops": [ { "kind": "store", "addr": 0, "data": 0, "data_delay": 0 } ] }"#,
    ];
    for json in cases {
        assert!(
            matches!(Trace::from_json(json), Err(TraceError::Invalid { index: 0, .. })),
            "accepted {json}"
        );
    }
}

#[test]
fn run_gives_up_at_the_cycle_limit() {
    let trace = Trace::from_json(r#"{ "ops": [ { "kind": "load", "addr": 0 } ] }"#).unwrap();
    let mut sim = Simulator::new(&Config::default(), trace).unwrap();
    assert!(matches!(sim.run(1), Err(SimError::Timeout(1))));
}

#[test]
fn invalid_configuration_is_refused() {
    let mut config = Config::default();
    config.lsu.lanes = 0;
    let err = Simulator::new(&config, Trace::default()).unwrap_err();
    assert!(matches!(err, SimError::Config(_)));
}
