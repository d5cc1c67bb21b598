// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for coordination primitives

use crate::group::GroupFault;
use crate::id::{GroupId, LockSetId, Rank, ResourceKey, TaskId};
use crate::report::{ViolationKind, ViolationReport};
use thiserror::Error;

/// Errors returned by lock sets, task groups and the validator
///
/// Violation variants carry the validator's report when diagnostics are
/// enabled. `NegativeCounter` is raised with or without the validator.
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("lock order violation: {task} requested {requested} while holding {held}")]
    LockOrderViolation {
        task: TaskId,
        requested: ResourceKey,
        held: ResourceKey,
        report: Option<Box<ViolationReport>>,
    },
    #[error("negative counter: arrive on {group} with nothing pending")]
    NegativeCounter {
        group: GroupId,
        report: Option<Box<ViolationReport>>,
    },
    #[error("late registration on {group}: a wait already observed it drained")]
    LateRegistration {
        group: GroupId,
        report: Option<Box<ViolationReport>>,
    },
    #[error("unsafe reuse of {group}: previous drain not yet observed by wait")]
    UnsafeReuse {
        group: GroupId,
        report: Option<Box<ViolationReport>>,
    },
    #[error("rank {rank} already used in {set} by resource {existing}")]
    DuplicateRank {
        set: LockSetId,
        rank: Rank,
        existing: String,
    },
    #[error("resource {resource} belongs to {owner}, not {set}")]
    ForeignResource {
        resource: ResourceKey,
        owner: LockSetId,
        set: LockSetId,
    },
    #[error("task {index} panicked")]
    TaskPanicked { index: usize },
    #[error("failed to start validator: {0}")]
    ValidatorStart(#[from] std::io::Error),
    #[error("invalid validator config: {0}")]
    Config(String),
}

impl CoordinationError {
    /// The violation class, if this error is a coordination violation
    pub fn kind(&self) -> Option<ViolationKind> {
        match self {
            CoordinationError::LockOrderViolation { .. } => Some(ViolationKind::LockOrderViolation),
            CoordinationError::NegativeCounter { .. } => Some(ViolationKind::NegativeCounter),
            CoordinationError::LateRegistration { .. } => Some(ViolationKind::LateRegistration),
            CoordinationError::UnsafeReuse { .. } => Some(ViolationKind::UnsafeReuse),
            _ => None,
        }
    }

    /// The validator's report, when one was attached
    pub fn report(&self) -> Option<&ViolationReport> {
        match self {
            CoordinationError::LockOrderViolation { report, .. }
            | CoordinationError::NegativeCounter { report, .. }
            | CoordinationError::LateRegistration { report, .. }
            | CoordinationError::UnsafeReuse { report, .. } => report.as_deref(),
            _ => None,
        }
    }

    /// Build the error for a task-group fault
    pub(crate) fn from_fault(
        fault: GroupFault,
        group: GroupId,
        report: Option<ViolationReport>,
    ) -> Self {
        let report = report.map(Box::new);
        match fault {
            GroupFault::NegativeCounter => CoordinationError::NegativeCounter { group, report },
            GroupFault::LateRegistration => CoordinationError::LateRegistration { group, report },
            GroupFault::UnsafeReuse => CoordinationError::UnsafeReuse { group, report },
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
