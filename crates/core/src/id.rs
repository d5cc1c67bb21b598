// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identities for tasks, groups, lock sets and ranked resources

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TASK: AtomicU64 = AtomicU64::new(1);
static NEXT_GROUP: AtomicU64 = AtomicU64::new(1);
static NEXT_LOCK_SET: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_TASK: TaskId = TaskId(NEXT_TASK.fetch_add(1, Ordering::Relaxed));
}

/// Identity of a concurrently executing task
///
/// A task is an OS thread. The id is assigned lazily the first time the
/// thread asks for it and stays stable for the thread's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl TaskId {
    /// The id of the calling thread
    pub fn current() -> Self {
        CURRENT_TASK.with(|id| *id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Identity of a task group
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u64);

impl GroupId {
    pub(crate) fn next() -> Self {
        Self(NEXT_GROUP.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

/// Identity of an ordered lock set
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LockSetId(pub u64);

impl LockSetId {
    pub(crate) fn next() -> Self {
        Self(NEXT_LOCK_SET.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for LockSetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "set-{}", self.0)
    }
}

/// Total-order position of a resource within its lock set
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rank(pub u32);

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Globally unique key of a ranked resource
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub set: LockSetId,
    pub rank: Rank,
}

impl ResourceKey {
    pub fn new(set: LockSetId, rank: Rank) -> Self {
        Self { set, rank }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.set, self.rank)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
