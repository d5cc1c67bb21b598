// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rank-ordered mutual exclusion
//!
//! Every resource in an [`OrderedLockSet`] carries a unique rank. A task
//! holding several resources must have acquired them in ascending rank, so
//! two tasks can never each hold what the other waits for.
//!
//! [`OrderedLockSet::acquire_pair`] and [`OrderedLockSet::acquire_all`] sort
//! by rank themselves. Nested single acquisitions are checked against the
//! caller's [`AcquisitionFrame`] on every call, so a descending acquisition
//! fails instead of blocking. The validator adds the cross-set graph and the
//! reports.

mod frame;

pub use frame::{AcquisitionFrame, Release};

use crate::error::CoordinationError;
use crate::id::{LockSetId, Rank, ResourceKey, TaskId};
use crate::report::{Action, Subject};
use crate::validator::CoordinationValidator;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

const NO_HOLDER: u64 = 0;

/// A caller-owned value guarded by a ranked exclusion state
#[derive(Debug)]
pub struct Ranked<T> {
    key: ResourceKey,
    name: String,
    holder: AtomicU64,
    value: Mutex<T>,
}

impl<T> Ranked<T> {
    pub fn key(&self) -> ResourceKey {
        self.key
    }

    pub fn rank(&self) -> Rank {
        self.key.rank
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The task currently holding the resource
    pub fn holder(&self) -> Option<TaskId> {
        match self.holder.load(Ordering::Acquire) {
            NO_HOLDER => None,
            id => Some(TaskId(id)),
        }
    }

    pub fn is_free(&self) -> bool {
        self.holder().is_none()
    }

    /// Consume the resource, returning the guarded value
    pub fn into_inner(self) -> T {
        self.value.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn subject(&self) -> Subject {
        Subject::resource(self.key, self.name.clone())
    }
}

/// Scoped acquisition of a ranked resource; releases on drop
#[derive(Debug)]
pub struct RankedGuard<'a, T> {
    resource: &'a Ranked<T>,
    task: TaskId,
    validator: CoordinationValidator,
    value: MutexGuard<'a, T>,
}

impl<T> RankedGuard<'_, T> {
    pub fn key(&self) -> ResourceKey {
        self.resource.key
    }
}

impl<T> Deref for RankedGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for RankedGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> Drop for RankedGuard<'_, T> {
    fn drop(&mut self) {
        let key = self.resource.key;
        if self.validator.is_enabled() {
            self.validator.record(
                self.task,
                self.resource.subject(),
                Action::Released { rank: key.rank },
                None,
            );
        }
        self.resource.holder.store(NO_HOLDER, Ordering::Release);
        if AcquisitionFrame::with_current(|frame| frame.release(key)) == Release::OutOfOrder {
            tracing::debug!(
                task = %self.task,
                resource = %key,
                "released out of acquisition order"
            );
        } else {
            tracing::debug!(task = %self.task, resource = %key, "released");
        }
        // the value mutex unlocks when `value` drops after this
    }
}

/// Assigns ranks to resources and enforces ascending acquisition
#[derive(Debug)]
pub struct OrderedLockSet {
    id: LockSetId,
    name: String,
    ranks: Mutex<BTreeMap<Rank, String>>,
    validator: CoordinationValidator,
}

impl OrderedLockSet {
    /// Create a set observed by the process-wide validator
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_validator(name, CoordinationValidator::global().clone())
    }

    pub fn with_validator(name: impl Into<String>, validator: CoordinationValidator) -> Self {
        Self {
            id: LockSetId::next(),
            name: name.into(),
            ranks: Mutex::new(BTreeMap::new()),
            validator,
        }
    }

    pub fn id(&self) -> LockSetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach exclusion state with a unique `rank` to `value`
    pub fn resource<T>(
        &self,
        name: impl Into<String>,
        rank: u32,
        value: T,
    ) -> Result<Ranked<T>, CoordinationError> {
        let name = name.into();
        let rank = Rank(rank);
        let mut ranks = self.ranks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = ranks.get(&rank) {
            return Err(CoordinationError::DuplicateRank {
                set: self.id,
                rank,
                existing: existing.clone(),
            });
        }
        ranks.insert(rank, name.clone());
        Ok(Ranked {
            key: ResourceKey::new(self.id, rank),
            name,
            holder: AtomicU64::new(NO_HOLDER),
            value: Mutex::new(value),
        })
    }

    /// Ranks assigned so far, ascending
    pub fn ranks(&self) -> Vec<(Rank, String)> {
        let ranks = self.ranks.lock().unwrap_or_else(|e| e.into_inner());
        ranks.iter().map(|(r, n)| (*r, n.clone())).collect()
    }

    /// Ranks the calling task currently holds from this set
    pub fn held(&self) -> Vec<Rank> {
        AcquisitionFrame::current()
            .held()
            .iter()
            .filter(|k| k.set == self.id)
            .map(|k| k.rank)
            .collect()
    }

    /// Block until `resource` is free, then hold it
    ///
    /// A rank not above everything the caller already holds from this set,
    /// re-entry included, fails with `LockOrderViolation` before blocking.
    /// With the validator enabled the error carries a report, and inversions
    /// across sets and tasks are refused as well.
    pub fn acquire<'a, T>(
        &self,
        resource: &'a Ranked<T>,
    ) -> Result<RankedGuard<'a, T>, CoordinationError> {
        let key = resource.key;
        if key.set != self.id {
            return Err(CoordinationError::ForeignResource {
                resource: key,
                owner: key.set,
                set: self.id,
            });
        }

        let task = TaskId::current();
        let refused = AcquisitionFrame::current().admits(key).err();
        let report = if self.validator.is_enabled() {
            self.validator.check(
                task,
                resource.subject(),
                Action::AcquireAttempt { rank: key.rank },
                None,
            )
        } else {
            None
        };

        if refused.is_some() || report.is_some() {
            let held = refused.unwrap_or_else(|| {
                let frame = AcquisitionFrame::current();
                frame.held().last().copied().unwrap_or(key)
            });
            tracing::debug!(%task, resource = %key, %held, "refused out-of-order acquisition");
            return Err(CoordinationError::LockOrderViolation {
                task,
                requested: key,
                held,
                report: report.map(Box::new),
            });
        }

        let value = resource.value.lock().unwrap_or_else(|e| e.into_inner());
        resource.holder.store(task.0, Ordering::Release);
        AcquisitionFrame::with_current(|frame| frame.push(key));
        if self.validator.is_enabled() {
            self.validator.record(
                task,
                resource.subject(),
                Action::Acquired { rank: key.rank },
                None,
            );
        }
        tracing::debug!(%task, resource = %key, name = %resource.name, "acquired");

        Ok(RankedGuard {
            resource,
            task,
            validator: self.validator.clone(),
            value,
        })
    }

    /// Acquire two resources in rank order, whatever the argument order
    ///
    /// Guards are returned in argument order.
    pub fn acquire_pair<'a, A, B>(
        &self,
        a: &'a Ranked<A>,
        b: &'a Ranked<B>,
    ) -> Result<(RankedGuard<'a, A>, RankedGuard<'a, B>), CoordinationError> {
        if a.key == b.key {
            return Err(CoordinationError::LockOrderViolation {
                task: TaskId::current(),
                requested: b.key,
                held: a.key,
                report: None,
            });
        }
        if a.key.rank < b.key.rank {
            let first = self.acquire(a)?;
            let second = self.acquire(b)?;
            Ok((first, second))
        } else {
            let second = self.acquire(b)?;
            let first = self.acquire(a)?;
            Ok((first, second))
        }
    }

    /// Acquire every resource in ascending rank
    ///
    /// Guards are returned in argument order. Listing a resource twice
    /// fails with `LockOrderViolation` before anything is acquired.
    pub fn acquire_all<'a, T>(
        &self,
        resources: &[&'a Ranked<T>],
    ) -> Result<Vec<RankedGuard<'a, T>>, CoordinationError> {
        let mut order: Vec<usize> = (0..resources.len()).collect();
        order.sort_by_key(|&i| resources[i].key);

        for pair in order.windows(2) {
            let (prev, next) = (resources[pair[0]].key, resources[pair[1]].key);
            if prev == next {
                return Err(CoordinationError::LockOrderViolation {
                    task: TaskId::current(),
                    requested: next,
                    held: prev,
                    report: None,
                });
            }
        }

        let mut slots: Vec<Option<RankedGuard<'a, T>>> = resources.iter().map(|_| None).collect();
        for i in order {
            slots[i] = Some(self.acquire(resources[i])?);
        }
        Ok(slots.into_iter().flatten().collect())
    }
}

impl Drop for OrderedLockSet {
    fn drop(&mut self) {
        self.validator.forget_lock_set(self.id);
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
