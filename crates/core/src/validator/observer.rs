// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Validator state and invariant checks
//!
//! The observer owns every piece of validator state. It is driven one event
//! at a time by the validator thread and never blocks.

use super::config::ValidatorConfig;
use crate::clock::Clock;
use crate::group::{GroupEffect, GroupFault, GroupInput, GroupPhase, GroupState};
use crate::id::{GroupId, LockSetId, ResourceKey, TaskId};
use crate::lock::{AcquisitionFrame, Release};
use crate::report::{Action, Subject, TraceEvent, ViolationKind, ViolationReport};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Lock history of one task
#[derive(Debug, Default)]
struct TaskHistory {
    frame: AcquisitionFrame,
    /// The `Acquired` event of every held resource
    acquired: HashMap<ResourceKey, TraceEvent>,
}

/// Model and recent events of one task group
#[derive(Debug)]
struct GroupTimeline {
    state: GroupState,
    events: VecDeque<TraceEvent>,
    /// The arrival that caused the most recent drain
    last_drain: Option<TraceEvent>,
    /// The wait that observed the current cycle with nothing registered
    vacuous_wait: Option<TraceEvent>,
}

impl GroupTimeline {
    fn new(state: GroupState) -> Self {
        Self {
            state,
            events: VecDeque::new(),
            last_drain: None,
            vacuous_wait: None,
        }
    }
}

/// Reports and counters handed back when the observer shuts down
#[derive(Debug, Default)]
pub struct ObserverSummary {
    pub reports: Vec<ViolationReport>,
    pub dropped: u64,
}

/// Partial-order tracker for lock acquisitions and group transitions
pub struct Observer<C: Clock> {
    config: ValidatorConfig,
    clock: C,
    seq: u64,
    tasks: HashMap<TaskId, TaskHistory>,
    /// `from -> to -> first event` where a task requested `to` holding `from`
    edges: HashMap<ResourceKey, BTreeMap<ResourceKey, TraceEvent>>,
    groups: HashMap<GroupId, GroupTimeline>,
    reports: VecDeque<ViolationReport>,
    dropped: u64,
}

impl<C: Clock> Observer<C> {
    pub fn new(config: ValidatorConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            seq: 0,
            tasks: HashMap::new(),
            edges: HashMap::new(),
            groups: HashMap::new(),
            reports: VecDeque::new(),
            dropped: 0,
        }
    }

    pub fn reports(&self) -> Vec<ViolationReport> {
        self.reports.iter().cloned().collect()
    }

    /// Reports discarded to respect `max_reports`
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Forget reports; tracked tasks and groups are kept
    pub fn clear(&mut self) {
        self.reports.clear();
        self.dropped = 0;
    }

    pub fn into_summary(self) -> ObserverSummary {
        ObserverSummary {
            reports: self.reports.into_iter().collect(),
            dropped: self.dropped,
        }
    }

    /// Recent events recorded for a group
    pub fn timeline(&self, group: GroupId) -> Vec<TraceEvent> {
        self.groups
            .get(&group)
            .map(|g| g.events.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop the model and timeline of a group that no longer exists
    pub fn forget_group(&mut self, group: GroupId) {
        if self.groups.remove(&group).is_some() {
            tracing::trace!(%group, "forgot group");
        }
    }

    /// Drop every lock-order edge touching a set that no longer exists
    pub fn forget_lock_set(&mut self, set: LockSetId) {
        self.edges.retain(|from, targets| {
            if from.set == set {
                return false;
            }
            targets.retain(|to, _| to.set != set);
            !targets.is_empty()
        });
        tracing::trace!(%set, "forgot lock set");
    }

    /// Observe one event and report the violation it causes, if any
    ///
    /// `snapshot` is the group's state just before the event. When it
    /// disagrees with the model (the validator was enabled mid-cycle), the
    /// model is resynchronised from it.
    pub fn observe(
        &mut self,
        task: TaskId,
        subject: Subject,
        action: Action,
        snapshot: Option<GroupState>,
    ) -> Option<ViolationReport> {
        self.seq += 1;
        let event = TraceEvent {
            seq: self.seq,
            elapsed: self.clock.elapsed(),
            task,
            subject,
            action,
        };

        let report = match event.subject.clone() {
            Subject::Resource { key, .. } => self.observe_lock(key, event),
            Subject::Group { id, .. } => self.observe_group(id, event, snapshot),
        };

        if let Some(report) = &report {
            self.store(report.clone());
        }
        report
    }

    fn observe_lock(&mut self, key: ResourceKey, event: TraceEvent) -> Option<ViolationReport> {
        match event.action {
            Action::AcquireAttempt { .. } => self.check_acquire(key, event),
            Action::Acquired { .. } => {
                let history = self.tasks.entry(event.task).or_default();
                history.frame.push(key);
                history.acquired.insert(key, event);
                None
            }
            Action::Released { .. } => {
                if let Some(history) = self.tasks.get_mut(&event.task) {
                    if history.frame.release(key) == Release::OutOfOrder {
                        tracing::debug!(
                            task = %event.task,
                            resource = %key,
                            "released out of order"
                        );
                    }
                    history.acquired.remove(&key);
                    if history.frame.is_empty() {
                        self.tasks.remove(&event.task);
                    }
                }
                None
            }
            _ => None,
        }
    }

    fn check_acquire(&mut self, key: ResourceKey, event: TraceEvent) -> Option<ViolationReport> {
        let (held, conflict) = match self.tasks.get(&event.task) {
            Some(history) => (
                history.frame.held().to_vec(),
                history
                    .frame
                    .admits(key)
                    .err()
                    .map(|c| (c, history.acquired.get(&c).cloned())),
            ),
            None => (Vec::new(), None),
        };

        if let Some((conflict, witness)) = conflict {
            let message = if conflict == key {
                format!("re-entrant acquisition of {}", event.subject.name())
            } else {
                format!(
                    "{} (rank {}) requested while holding rank {}",
                    event.subject.name(),
                    key.rank,
                    conflict.rank
                )
            };
            return Some(build_report(ViolationKind::LockOrderViolation, message, witness, event));
        }

        // Cross-task cycle: someone acquired a held resource after `key`
        for from in &held {
            if let Some(witness) = self.reverse_path_witness(key, *from) {
                let message = format!(
                    "{} requested while holding {}, inverting the order observed at #{}",
                    key, from, witness.seq
                );
                return Some(build_report(
                    ViolationKind::LockOrderViolation,
                    message,
                    Some(witness),
                    event,
                ));
            }
        }

        for from in held {
            self.edges
                .entry(from)
                .or_default()
                .entry(key)
                .or_insert_with(|| event.clone());
        }
        None
    }

    /// Earliest edge event on a path `start ->* target`, if one exists
    fn reverse_path_witness(&self, start: ResourceKey, target: ResourceKey) -> Option<TraceEvent> {
        let mut parents: HashMap<ResourceKey, ResourceKey> = HashMap::new();
        let mut seen: HashSet<ResourceKey> = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            if node == target {
                let mut earliest: Option<&TraceEvent> = None;
                let mut to = target;
                while let Some(from) = parents.get(&to) {
                    if let Some(edge) = self.edges.get(from).and_then(|next| next.get(&to)) {
                        if earliest.map_or(true, |e| edge.seq < e.seq) {
                            earliest = Some(edge);
                        }
                    }
                    to = *from;
                }
                return earliest.cloned();
            }
            for next in self.edges.get(&node).into_iter().flat_map(|m| m.keys()) {
                if seen.insert(*next) {
                    parents.insert(*next, node);
                    queue.push_back(*next);
                }
            }
        }
        None
    }

    fn observe_group(
        &mut self,
        id: GroupId,
        event: TraceEvent,
        snapshot: Option<GroupState>,
    ) -> Option<ViolationReport> {
        let input = match event.action {
            Action::Register { count } => GroupInput::Register { count },
            Action::Arrive => GroupInput::Arrive,
            Action::WaitBegin => GroupInput::WaitBegin,
            Action::WaitReturn => GroupInput::WaitReturn,
            Action::BeginCycle => GroupInput::BeginCycle,
            _ => return None,
        };
        let capacity = self.config.timeline_capacity;

        let timeline = self
            .groups
            .entry(id)
            .or_insert_with(|| GroupTimeline::new(snapshot.clone().unwrap_or_default()));
        if let Some(snapshot) = snapshot {
            if timeline.state != snapshot {
                tracing::debug!(group = %id, "resynchronising group model");
                timeline.state = snapshot;
            }
        }

        if let Err(fault) = timeline.state.check(input) {
            let witness = match fault {
                GroupFault::NegativeCounter | GroupFault::UnsafeReuse => {
                    timeline.last_drain.clone()
                }
                GroupFault::LateRegistration => timeline.vacuous_wait.clone(),
            };
            let message = group_message(fault, &event, &timeline.state);
            return Some(build_report(fault.kind(), message, witness, event));
        }

        let was_idle = timeline.state.phase == GroupPhase::Idle;
        let Ok((next, effects)) = timeline.state.transition(input) else {
            return None;
        };
        timeline.state = next;

        match input {
            GroupInput::Register { count } if count > 0 => timeline.vacuous_wait = None,
            GroupInput::BeginCycle => timeline.vacuous_wait = None,
            GroupInput::WaitBegin if was_idle && effects.contains(&GroupEffect::Return) => {
                timeline.vacuous_wait = Some(event.clone());
            }
            _ => {}
        }
        if effects
            .iter()
            .any(|e| matches!(e, GroupEffect::Drained { .. }))
        {
            timeline.last_drain = Some(event.clone());
        }

        timeline.events.push_back(event);
        while timeline.events.len() > capacity {
            timeline.events.pop_front();
        }
        None
    }

    fn store(&mut self, report: ViolationReport) {
        if self.config.log_violations {
            tracing::warn!(
                kind = %report.kind,
                tasks = ?report.tasks,
                "coordination violation: {}",
                report.message
            );
        }
        self.reports.push_back(report);
        while self.reports.len() > self.config.max_reports {
            self.reports.pop_front();
            self.dropped += 1;
        }
    }
}

fn build_report(
    kind: ViolationKind,
    message: String,
    witness: Option<TraceEvent>,
    offending: TraceEvent,
) -> ViolationReport {
    let mut trace: Vec<TraceEvent> = witness.into_iter().collect();
    trace.push(offending);
    ViolationReport::new(kind, message, trace)
}

fn group_message(fault: GroupFault, event: &TraceEvent, state: &GroupState) -> String {
    let name = event.subject.name();
    match fault {
        GroupFault::NegativeCounter => format!("arrive on {name} with nothing pending"),
        GroupFault::LateRegistration => {
            format!("register on {name} after a wait already observed it empty")
        }
        GroupFault::UnsafeReuse => format!(
            "{} on {name} while {} released waiter(s) have not observed drain {}",
            event.action, state.unobserved, state.cycle
        ),
    }
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
