use super::*;
use std::cell::Cell;

#[test]
fn override_wins_over_global_and_heuristic() {
    for global in [true, false] {
        for dark in [true, false] {
            assert!(resolve(global, Some(true), || dark));
            assert!(!resolve(global, Some(false), || dark));
        }
    }
}

#[test]
fn override_present_never_invokes_heuristic() {
    let calls = Cell::new(0);
    resolve(true, Some(false), || {
        calls.set(calls.get() + 1);
        false
    });
    assert_eq!(calls.get(), 0);
}

#[test]
fn global_off_without_override_is_off_and_skips_heuristic() {
    let calls = Cell::new(0);
    let decision = resolve(false, None, || {
        calls.set(calls.get() + 1);
        false
    });
    assert!(!decision);
    assert_eq!(calls.get(), 0);
}

#[test]
fn global_on_without_override_negates_heuristic() {
    assert!(!resolve(true, None, || true));
    assert!(resolve(true, None, || false));
}

#[test]
fn heuristic_runs_exactly_once_in_auto_branch() {
    let calls = Cell::new(0);
    resolve(true, None, || {
        calls.set(calls.get() + 1);
        true
    });
    assert_eq!(calls.get(), 1);
}

#[test]
fn override_true_with_global_off_enables() {
    assert!(resolve(false, Some(true), || true));
}
