// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task-group registration and reuse patterns

use super::join;
use lockstep_core::{CoordinationError, CoordinationValidator, OrderedLockSet, SafeTaskGroup};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Barrier};
use std::time::Duration;

const WORKERS: usize = 4;

/// How long the caller gives a waiter to block before draining
const SETTLE: Duration = Duration::from_millis(5);

/// Attempts at catching a released waiter before it returns
const REUSE_ATTEMPTS: usize = 50;

fn group(name: &str, validator: &CoordinationValidator) -> SafeTaskGroup {
    SafeTaskGroup::with_validator(name, validator.clone())
}

/// The spawned task registers itself, but only after the caller waited
pub(super) fn late_registration(
    validator: &CoordinationValidator,
) -> Result<(), CoordinationError> {
    let group = group("late-registration", validator);
    let (go, started) = mpsc::channel::<()>();

    std::thread::scope(|scope| {
        let worker = {
            let group = group.clone();
            scope.spawn(move || {
                let _ = started.recv();
                group.register()?;
                group.arrive()
            })
        };
        group.wait();
        let _ = go.send(());
        join(worker, 0)?
    })
}

/// Tasks spawned in a loop register themselves once they start
pub(super) fn late_registration_loop(
    validator: &CoordinationValidator,
) -> Result<(), CoordinationError> {
    let group = group("late-registration-loop", validator);
    let barrier = Barrier::new(WORKERS + 1);
    let start = &barrier;

    std::thread::scope(|scope| {
        let workers: Vec<_> = (0..WORKERS)
            .map(|_| {
                let group = group.clone();
                scope.spawn(move || {
                    start.wait();
                    group.register()?;
                    group.arrive()
                })
            })
            .collect();
        group.wait();
        start.wait();

        let mut first_err = None;
        for (index, worker) in workers.into_iter().enumerate() {
            if let Err(e) = join(worker, index)? {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    })
}

pub(super) fn early_registration_bulk(
    validator: &CoordinationValidator,
) -> Result<(), CoordinationError> {
    let group = group("early-registration-bulk", validator);
    let tasks: Vec<_> = (1..=WORKERS as u64).map(|n| move || n * n).collect();
    let squares = group.run_together(tasks)?;
    tracing::debug!(sum = squares.iter().sum::<u64>(), "bulk round finished");
    Ok(())
}

pub(super) fn early_registration_iterative(
    validator: &CoordinationValidator,
) -> Result<(), CoordinationError> {
    let group = group("early-registration-iterative", validator);
    let done = AtomicU64::new(0);

    std::thread::scope(|scope| {
        for _ in 0..WORKERS {
            let done = &done;
            group.spawn_scoped(scope, move || {
                done.fetch_add(1, Ordering::SeqCst);
            })?;
        }
        group.wait();
        Ok::<_, CoordinationError>(())
    })?;

    tracing::debug!(done = done.load(Ordering::SeqCst), "iterative round finished");
    Ok(())
}

/// The task arrives once, the caller's wait returns, then it arrives again
pub(super) fn double_arrive(validator: &CoordinationValidator) -> Result<(), CoordinationError> {
    let group = group("double-arrive", validator);
    group.register()?;
    let (arrived, first_arrival) = mpsc::channel::<()>();
    let (waited, wait_done) = mpsc::channel::<()>();

    std::thread::scope(|scope| {
        let worker = {
            let group = group.clone();
            scope.spawn(move || {
                group.arrive()?;
                let _ = arrived.send(());
                let _ = wait_done.recv();
                group.arrive()
            })
        };
        let _ = first_arrival.recv();
        group.wait();
        let _ = waited.send(());
        join(worker, 0)?
    })
}

pub(super) fn arrive_without_register(
    validator: &CoordinationValidator,
) -> Result<(), CoordinationError> {
    let group = group("arrive-without-register", validator);

    std::thread::scope(|scope| {
        let worker = {
            let group = group.clone();
            scope.spawn(move || group.arrive())
        };
        join(worker, 0)?
    })
}

/// Arrive then immediately register the next round while a released
/// waiter is still on its way out of `wait()`
///
/// The waiter usually loses the race for the group's lock. When it wins,
/// the round is retried on a fresh group.
pub(super) fn unsafe_reuse(validator: &CoordinationValidator) -> Result<(), CoordinationError> {
    for attempt in 0..REUSE_ATTEMPTS {
        let group = group(&format!("unsafe-reuse-{attempt}"), validator);
        group.register()?;

        let reused = std::thread::scope(|scope| {
            let waiter = {
                let group = group.clone();
                scope.spawn(move || group.wait())
            };
            std::thread::sleep(SETTLE);
            group.arrive()?;
            let reused = group.register();
            if reused.is_ok() {
                // Drain the round so a waiter that blocked late is released
                group.arrive()?;
            }
            join(waiter, 0)?;
            Ok::<_, CoordinationError>(reused)
        })?;

        match reused {
            Err(e) => return Err(e),
            Ok(()) if !validator.reports().is_empty() => return Ok(()),
            Ok(()) => tracing::debug!(attempt, "waiter returned before reuse, retrying"),
        }
    }
    Ok(())
}

pub(super) fn sequential_reuse(validator: &CoordinationValidator) -> Result<(), CoordinationError> {
    let group = group("sequential-reuse", validator);
    for round in 0..5u64 {
        let tasks: Vec<_> = (0..WORKERS as u64).map(|i| move || round * 10 + i).collect();
        group.run_together(tasks)?;
    }
    tracing::debug!(cycles = group.cycle(), "rounds finished");
    Ok(())
}

/// Group members increment a counter guarded by a ranked resource
pub(super) fn counter(validator: &CoordinationValidator) -> Result<(), CoordinationError> {
    let set = OrderedLockSet::with_validator("counters", validator.clone());
    let hits = set.resource("hits", 1, 0u64)?;
    let group = group("counter", validator);

    let (shared, counter) = (&set, &hits);
    let tasks: Vec<_> = (0..WORKERS)
        .map(|_| {
            move || -> Result<(), CoordinationError> {
                for _ in 0..100 {
                    *shared.acquire(counter)? += 1;
                }
                Ok(())
            }
        })
        .collect();
    group
        .run_together(tasks)?
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(hits = hits.into_inner(), "counter finished");
    Ok(())
}
