// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock ordering patterns

use super::join;
use lockstep_core::{CoordinationError, CoordinationValidator, OrderedLockSet, Ranked};

const ROUNDS: usize = 200;

/// Move `amount` from `from` to `to`, locking them in argument order
fn nested_transfer(
    set: &OrderedLockSet,
    from: &Ranked<i64>,
    to: &Ranked<i64>,
    amount: i64,
) -> Result<(), CoordinationError> {
    let mut source = set.acquire(from)?;
    let mut target = set.acquire(to)?;
    *source -= amount;
    *target += amount;
    Ok(())
}

/// Two tasks lock checking then savings; a third locks savings then checking
///
/// The tasks run one after another. Run concurrently, the third would
/// deadlock against the others, so its second lock is refused before it
/// blocks.
pub(super) fn inconsistent_order(
    validator: &CoordinationValidator,
) -> Result<(), CoordinationError> {
    let set = OrderedLockSet::with_validator("accounts", validator.clone());
    let checking = set.resource("checking", 1, 100i64)?;
    let savings = set.resource("savings", 2, 100i64)?;

    std::thread::scope(|scope| {
        for index in 0..2 {
            let handle = scope.spawn(|| nested_transfer(&set, &checking, &savings, 10));
            join(handle, index)??;
        }
        let handle = scope.spawn(|| nested_transfer(&set, &savings, &checking, 10));
        join(handle, 2)?
    })
}

/// Opposite-direction transfers race through `acquire_pair`
pub(super) fn consistent_order(validator: &CoordinationValidator) -> Result<(), CoordinationError> {
    let set = OrderedLockSet::with_validator("accounts", validator.clone());
    let checking = set.resource("checking", 1, 1_000i64)?;
    let savings = set.resource("savings", 2, 1_000i64)?;

    let transfer = |from: &Ranked<i64>, to: &Ranked<i64>| -> Result<(), CoordinationError> {
        for _ in 0..ROUNDS {
            let (mut source, mut target) = set.acquire_pair(from, to)?;
            *source -= 1;
            *target += 1;
        }
        Ok(())
    };

    std::thread::scope(|scope| {
        let outbound = scope.spawn(|| transfer(&checking, &savings));
        let inbound = scope.spawn(|| transfer(&savings, &checking));
        join(outbound, 0)??;
        join(inbound, 1)?
    })?;

    let total = checking.into_inner() + savings.into_inner();
    tracing::debug!(total, "balances settled");
    Ok(())
}
