// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Violation reports and the trace events that witness them

use crate::id::{GroupId, Rank, ResourceKey, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Classes of coordination misuse
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// A resource was requested out of rank order, re-entrantly, or in an
    /// order that closes a cycle with previously observed acquisitions
    LockOrderViolation,
    /// `arrive()` on a group with nothing pending
    NegativeCounter,
    /// `register()` after a `wait()` already observed the group as empty
    LateRegistration,
    /// `register()` before the previous drain was observed by `wait()`
    UnsafeReuse,
}

impl ViolationKind {
    pub fn name(&self) -> &'static str {
        match self {
            ViolationKind::LockOrderViolation => "lock_order_violation",
            ViolationKind::NegativeCounter => "negative_counter",
            ViolationKind::LateRegistration => "late_registration",
            ViolationKind::UnsafeReuse => "unsafe_reuse",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What an event happened to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Subject {
    Resource { key: ResourceKey, name: String },
    Group { id: GroupId, name: String },
}

impl Subject {
    pub fn resource(key: ResourceKey, name: impl Into<String>) -> Self {
        Subject::Resource {
            key,
            name: name.into(),
        }
    }

    pub fn group(id: GroupId, name: impl Into<String>) -> Self {
        Subject::Group {
            id,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Subject::Resource { name, .. } | Subject::Group { name, .. } => name,
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subject::Resource { key, name } => write!(f, "resource {name} ({key})"),
            Subject::Group { id, name } => write!(f, "group {name} ({id})"),
        }
    }
}

/// An observed coordination step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// About to block on a resource
    AcquireAttempt { rank: Rank },
    /// Resource is now held
    Acquired { rank: Rank },
    Released { rank: Rank },
    Register { count: u64 },
    Arrive,
    /// `wait()` entered
    WaitBegin,
    /// `wait()` returned after observing a drain
    WaitReturn,
    BeginCycle,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::AcquireAttempt { rank } => write!(f, "acquire-attempt(rank {rank})"),
            Action::Acquired { rank } => write!(f, "acquired(rank {rank})"),
            Action::Released { rank } => write!(f, "released(rank {rank})"),
            Action::Register { count } => write!(f, "register({count})"),
            Action::Arrive => f.write_str("arrive"),
            Action::WaitBegin => f.write_str("wait-begin"),
            Action::WaitReturn => f.write_str("wait-return"),
            Action::BeginCycle => f.write_str("begin-cycle"),
        }
    }
}

/// One entry of a validator timeline
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Position in the validator's global event order
    pub seq: u64,
    /// Time since the validator was enabled
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub task: TaskId,
    pub subject: Subject,
    pub action: Action,
}

impl std::fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} +{:?} {} {} on {}",
            self.seq, self.elapsed, self.task, self.action, self.subject
        )
    }
}

/// Immutable record of a detected misuse
///
/// The trace holds the earliest pair of conflicting events: the prior
/// event that makes the offending one unsafe, then the offending event
/// itself. Some violations have no prior witness (an `arrive()` on a
/// group that never had anything registered), in which case the trace
/// holds only the offending event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationReport {
    pub kind: ViolationKind,
    pub message: String,
    /// Distinct tasks appearing in the trace, offender last
    pub tasks: Vec<TaskId>,
    pub trace: Vec<TraceEvent>,
    pub detected_at: DateTime<Utc>,
}

impl ViolationReport {
    pub fn new(kind: ViolationKind, message: impl Into<String>, trace: Vec<TraceEvent>) -> Self {
        let mut tasks: Vec<TaskId> = Vec::new();
        for event in trace.iter() {
            if let Some(pos) = tasks.iter().position(|t| *t == event.task) {
                tasks.remove(pos);
            }
            tasks.push(event.task);
        }
        Self {
            kind,
            message: message.into(),
            tasks,
            trace,
            detected_at: Utc::now(),
        }
    }

    /// The event that triggered the report
    pub fn offending(&self) -> Option<&TraceEvent> {
        self.trace.last()
    }

    /// The earlier event the offending one conflicts with
    pub fn witness(&self) -> Option<&TraceEvent> {
        if self.trace.len() > 1 {
            self.trace.first()
        } else {
            None
        }
    }
}

impl std::fmt::Display for ViolationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}: {}", self.kind, self.message)?;
        for event in &self.trace {
            writeln!(f, "  {event}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
