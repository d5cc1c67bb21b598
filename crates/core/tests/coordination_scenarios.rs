// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

//! Multi-threaded scenarios for the lock set and task group.
//!
//! Every test builds its own validator so scenarios never share reports.

use lockstep_core::{
    CoordinationError, CoordinationValidator, GroupPhase, OrderedLockSet, SafeTaskGroup,
    ValidatorConfig, ViolationKind,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Barrier};
use std::time::Duration;

fn diagnostic() -> CoordinationValidator {
    let validator = CoordinationValidator::new();
    validator.enable(ValidatorConfig::diagnostic()).unwrap();
    validator
}

// =============================================================================
// Task group
// =============================================================================

#[test]
fn wait_returns_after_all_registered_tasks_arrive() {
    let validator = diagnostic();
    let group = SafeTaskGroup::with_validator("ten", validator.clone());
    let finished = AtomicU64::new(0);

    group.register_many(10).unwrap();
    std::thread::scope(|scope| {
        for i in 0..10u64 {
            let group = group.clone();
            let finished = &finished;
            scope.spawn(move || {
                std::thread::sleep(Duration::from_millis(i % 3));
                finished.fetch_add(1, Ordering::SeqCst);
                group.arrive().unwrap();
            });
        }
        group.wait();
        assert_eq!(finished.load(Ordering::SeqCst), 10);
    });

    assert_eq!(group.pending(), 0);
    assert!(validator.reports().is_empty());
    validator.disable();
}

#[test]
fn second_arrival_fails_after_wait_already_succeeded() {
    let group = SafeTaskGroup::with_validator("twice", CoordinationValidator::new());
    group.register().unwrap();

    let (first_done, first_seen) = mpsc::channel();
    let (waited, wait_seen) = mpsc::channel();
    std::thread::scope(|scope| {
        let worker = {
            let group = group.clone();
            scope.spawn(move || {
                group.arrive().unwrap();
                first_done.send(()).unwrap();
                wait_seen.recv().unwrap();
                group.arrive()
            })
        };

        first_seen.recv().unwrap();
        group.wait();
        waited.send(()).unwrap();

        let second = worker.join().unwrap();
        let err = second.unwrap_err();
        assert_eq!(err.kind(), Some(ViolationKind::NegativeCounter));
    });
    assert_eq!(group.pending(), 0);
}

#[test]
fn run_together_members_never_see_a_premature_zero() {
    let validator = diagnostic();
    let group = SafeTaskGroup::with_validator("five", validator.clone());

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let group = group.clone();
            move || group.pending()
        })
        .collect();
    let seen = group.run_together(tasks).unwrap();

    assert_eq!(seen.len(), 5);
    assert!(seen.iter().all(|pending| *pending >= 1));
    assert_eq!(group.pending(), 0);
    assert_eq!(group.phase(), GroupPhase::Idle);
    assert!(validator.reports().is_empty());
    validator.disable();
}

#[test]
fn registering_inside_the_task_is_a_late_registration() {
    let validator = diagnostic();
    let group = SafeTaskGroup::with_validator("late", validator.clone());

    // The wait runs before the spawned task gets to register
    group.wait();
    let outcome = std::thread::scope(|scope| {
        let group = group.clone();
        scope.spawn(move || group.register()).join().unwrap()
    });

    let err = outcome.unwrap_err();
    assert_eq!(err.kind(), Some(ViolationKind::LateRegistration));
    let report = err.report().unwrap();
    assert_eq!(report.tasks.len(), 2);
    validator.disable();
}

#[test]
fn group_reused_across_rounds_stays_clean() {
    let validator = diagnostic();
    let group = SafeTaskGroup::with_validator("rounds", validator.clone());
    let total = AtomicU64::new(0);

    for _ in 0..20 {
        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let total = &total;
                move || {
                    total.fetch_add(1, Ordering::SeqCst);
                }
            })
            .collect();
        group.run_together(tasks).unwrap();
    }

    assert_eq!(total.load(Ordering::SeqCst), 60);
    assert_eq!(group.cycle(), 20);
    assert!(validator.reports().is_empty());
    validator.disable();
}

// =============================================================================
// Lock ordering
// =============================================================================

#[test]
fn out_of_order_acquisition_fails_under_validator() {
    let validator = diagnostic();
    let set = OrderedLockSet::with_validator("accounts", validator.clone());
    let first = set.resource("first", 1, 0u64).unwrap();
    let second = set.resource("second", 2, 0u64).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..2 {
            scope.spawn(|| {
                let mut a = set.acquire(&first).unwrap();
                let mut b = set.acquire(&second).unwrap();
                *a += 1;
                *b += 1;
            });
        }
    });

    let outcome = std::thread::scope(|scope| {
        scope
            .spawn(|| {
                let _b = set.acquire(&second).unwrap();
                set.acquire(&first).map(|_| ())
            })
            .join()
            .unwrap()
    });

    let err = outcome.unwrap_err();
    assert!(matches!(err, CoordinationError::LockOrderViolation { .. }));
    assert_eq!(validator.reports().len(), 1);
    assert!(first.is_free());
    assert!(second.is_free());
    validator.disable();
}

#[test]
fn opposite_nested_orders_fail_fast_without_validator() {
    let set = OrderedLockSet::with_validator("accounts", CoordinationValidator::new());
    let checking = set.resource("checking", 1, 0u64).unwrap();
    let savings = set.resource("savings", 2, 0u64).unwrap();
    let both_hold_one = Barrier::new(2);

    let (ascending, descending) = std::thread::scope(|scope| {
        let ascending = scope.spawn(|| {
            let mut c = set.acquire(&checking).unwrap();
            both_hold_one.wait();
            let mut s = set.acquire(&savings)?;
            *c += 1;
            *s += 1;
            Ok::<_, CoordinationError>(())
        });
        let descending = scope.spawn(|| {
            let _s = set.acquire(&savings).unwrap();
            both_hold_one.wait();
            set.acquire(&checking).map(|_| ())
        });
        (ascending.join().unwrap(), descending.join().unwrap())
    });

    ascending.unwrap();
    match descending.unwrap_err() {
        CoordinationError::LockOrderViolation {
            requested,
            held,
            report,
            ..
        } => {
            assert_eq!(requested, checking.key());
            assert_eq!(held, savings.key());
            assert!(report.is_none());
        }
        other => panic!("expected LockOrderViolation, got {other:?}"),
    }
    assert_eq!(checking.into_inner(), 1);
    assert_eq!(savings.into_inner(), 1);
}

#[test]
fn opposite_argument_orders_never_deadlock() {
    let validator = diagnostic();
    let set = OrderedLockSet::with_validator("pair", validator.clone());
    let a = set.resource("a", 1, 0u64).unwrap();
    let b = set.resource("b", 2, 0u64).unwrap();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..500 {
                let (mut ga, mut gb) = set.acquire_pair(&a, &b).unwrap();
                *ga += 1;
                *gb += 1;
            }
        });
        scope.spawn(|| {
            for _ in 0..500 {
                let (mut gb, mut ga) = set.acquire_pair(&b, &a).unwrap();
                *ga += 1;
                *gb += 1;
            }
        });
    });

    assert_eq!(a.into_inner(), 1000);
    assert_eq!(b.into_inner(), 1000);
    assert!(validator.reports().is_empty());
    validator.disable();
}

#[test]
fn cross_set_inversion_is_detected_before_it_can_deadlock() {
    let validator = diagnostic();
    let left = OrderedLockSet::with_validator("left", validator.clone());
    let right = OrderedLockSet::with_validator("right", validator.clone());
    let l = left.resource("l", 1, ()).unwrap();
    let r = right.resource("r", 1, ()).unwrap();

    std::thread::scope(|scope| {
        scope
            .spawn(|| {
                let _l = left.acquire(&l).unwrap();
                let _r = right.acquire(&r).unwrap();
            })
            .join()
            .unwrap();
    });

    let outcome = std::thread::scope(|scope| {
        scope
            .spawn(|| {
                let _r = right.acquire(&r).unwrap();
                left.acquire(&l).map(|_| ())
            })
            .join()
            .unwrap()
    });

    let err = outcome.unwrap_err();
    assert_eq!(err.kind(), Some(ViolationKind::LockOrderViolation));
    let report = err.report().unwrap();
    assert_eq!(report.trace.len(), 2);
    assert_ne!(report.trace[0].task, report.trace[1].task);

    let json = serde_json::to_value(report).unwrap();
    assert_eq!(json["kind"], "LockOrderViolation");
    validator.disable();
}
