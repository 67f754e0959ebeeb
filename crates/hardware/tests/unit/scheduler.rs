//! Resource Arbitration Unit Tests.
//!
//! Verifies the static priority fold over candidate classes, resource
//! conflicts between classes, and the rotating age-priority encoder.

use lsqsim_core::core::lsu::scheduler::{
    ClassSet, FireClass, Resources, age_priority, arbitrate,
};
use rstest::rstest;

fn set(classes: &[FireClass]) -> ClassSet {
    classes.iter().copied().collect()
}

// ══════════════════════════════════════════════════════════
// 1. Priority fold
// ══════════════════════════════════════════════════════════

#[test]
fn empty_assertion_fires_nothing() {
    assert!(arbitrate(ClassSet::EMPTY, Resources::ALL).is_empty());
}

#[test]
fn every_class_fires_alone() {
    for class in FireClass::PRIORITY {
        let fired = arbitrate(set(&[class]), Resources::ALL);
        assert_eq!(fired, set(&[class]), "{class} did not fire alone");
    }
}

#[rstest]
#[case::incoming_load_beats_retry(FireClass::LoadIncoming, FireClass::LoadRetry)]
#[case::incoming_load_beats_wakeup(FireClass::LoadIncoming, FireClass::LoadWakeup)]
#[case::incoming_load_beats_secondary(FireClass::LoadIncoming, FireClass::SecondaryIncoming)]
#[case::incoming_load_beats_store_commit(FireClass::LoadIncoming, FireClass::StoreCommit)]
#[case::stad_beats_sfence(FireClass::StadIncoming, FireClass::SFence)]
#[case::sta_beats_sta_retry(FireClass::StaIncoming, FireClass::StaRetry)]
#[case::release_beats_wakeup(FireClass::Release, FireClass::LoadWakeup)]
#[case::secondary_beats_load_retry(FireClass::SecondaryIncoming, FireClass::LoadRetry)]
#[case::replay_beats_store_commit(FireClass::SecondaryReplay, FireClass::StoreCommit)]
#[case::load_retry_beats_sta_retry(FireClass::LoadRetry, FireClass::StaRetry)]
#[case::wakeup_beats_store_commit(FireClass::LoadWakeup, FireClass::StoreCommit)]
fn higher_priority_wins_a_shared_resource(#[case] winner: FireClass, #[case] loser: FireClass) {
    let fired = arbitrate(set(&[winner, loser]), Resources::ALL);
    assert!(fired.contains(winner));
    assert!(!fired.contains(loser));
}

#[rstest]
#[case::std_and_release(FireClass::StdIncoming, FireClass::Release)]
#[case::std_and_store_commit(FireClass::StdIncoming, FireClass::StoreCommit)]
#[case::sta_and_store_commit(FireClass::StaIncoming, FireClass::StoreCommit)]
#[case::sfence_and_wakeup(FireClass::SFence, FireClass::LoadWakeup)]
#[case::release_and_store_commit(FireClass::Release, FireClass::StoreCommit)]
#[case::sta_retry_and_store_commit(FireClass::StaRetry, FireClass::StoreCommit)]
fn disjoint_classes_fire_together(#[case] a: FireClass, #[case] b: FireClass) {
    let fired = arbitrate(set(&[a, b]), Resources::ALL);
    assert_eq!(fired, set(&[a, b]));
}

#[test]
fn lower_classes_fire_on_leftover_resources() {
    // The store address takes the translator; the commit only needs the memory port.
    let fired = arbitrate(
        set(&[FireClass::StaIncoming, FireClass::LoadRetry, FireClass::StoreCommit]),
        Resources::ALL,
    );
    assert_eq!(fired, set(&[FireClass::StaIncoming, FireClass::StoreCommit]));
}

#[test]
fn starting_resources_limit_firing() {
    let no_mem = Resources {
        mem: false,
        ..Resources::ALL
    };
    let fired = arbitrate(set(&[FireClass::LoadWakeup, FireClass::StaRetry]), no_mem);
    assert_eq!(fired, set(&[FireClass::StaRetry]));
    assert!(arbitrate(set(&[FireClass::Release]), Resources::NONE).is_empty());
}

// ══════════════════════════════════════════════════════════
// 2. Resources and class sets
// ══════════════════════════════════════════════════════════

#[test]
fn resources_consume_and_cover() {
    let left = Resources::ALL.consume(FireClass::LoadIncoming.needs());
    assert!(!left.tlb && !left.mem && !left.hazard);
    assert!(left.retire);
    assert!(left.covers(FireClass::StdIncoming.needs()));
    assert!(!left.covers(FireClass::StoreCommit.needs()));
    assert!(Resources::ALL.covers(Resources::NONE));
}

#[test]
fn class_set_iterates_in_priority_order() {
    let s = set(&[FireClass::StoreCommit, FireClass::LoadIncoming, FireClass::Release]);
    let order: Vec<FireClass> = s.iter().collect();
    assert_eq!(
        order,
        vec![FireClass::LoadIncoming, FireClass::Release, FireClass::StoreCommit]
    );
}

#[test]
fn class_names_are_unique() {
    let mut names: Vec<&str> = FireClass::PRIORITY.iter().map(|c| c.name()).collect();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), FireClass::PRIORITY.len());
    assert_eq!(FireClass::StoreCommit.to_string(), "store_commit");
}

// ══════════════════════════════════════════════════════════
// 3. Age priority
// ══════════════════════════════════════════════════════════

#[test]
fn age_priority_picks_first_eligible_from_base() {
    assert_eq!(age_priority(2, 4, 8, |i| i % 2 == 1), Some(3));
    assert_eq!(age_priority(2, 4, 8, |i| i == 2), Some(2));
}

#[test]
fn age_priority_wraps_around() {
    // Slots 6, 7, 0, 1 in that order.
    assert_eq!(age_priority(6, 4, 8, |i| i < 2), Some(0));
    assert_eq!(age_priority(6, 4, 8, |i| i == 7 || i == 0), Some(7));
}

#[test]
fn age_priority_respects_span() {
    assert_eq!(age_priority(0, 3, 8, |i| i == 3), None);
    assert_eq!(age_priority(0, 0, 8, |_| true), None);
    // A span larger than the structure scans each slot once.
    let mut seen = Vec::new();
    let _ = age_priority(5, 20, 8, |i| {
        seen.push(i);
        false
    });
    assert_eq!(seen, vec![5, 6, 7, 0, 1, 2, 3, 4]);
}
