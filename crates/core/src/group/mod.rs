// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Counter-based join primitive for a dynamic group of tasks
//!
//! A [`SafeTaskGroup`] tracks outstanding tasks. Registration must
//! happen-before the registered task can arrive; [`SafeTaskGroup::run_together`]
//! is the idiom that guarantees it by registering every member before any
//! member is spawned.

mod state;

pub use state::{GroupEffect, GroupFault, GroupInput, GroupPhase, GroupState};

use crate::error::CoordinationError;
use crate::id::{GroupId, TaskId};
use crate::report::{Action, Subject};
use crate::validator::CoordinationValidator;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{Scope, ScopedJoinHandle};

/// Counter-based join primitive
///
/// Cloning yields another handle to the same group.
#[derive(Clone, Debug)]
pub struct SafeTaskGroup {
    inner: Arc<GroupInner>,
}

#[derive(Debug)]
struct GroupInner {
    id: GroupId,
    name: String,
    state: Mutex<GroupState>,
    drained: Condvar,
    validator: CoordinationValidator,
}

impl SafeTaskGroup {
    /// Create a group observed by the process-wide validator
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_validator(name, CoordinationValidator::global().clone())
    }

    pub fn with_validator(name: impl Into<String>, validator: CoordinationValidator) -> Self {
        Self {
            inner: Arc::new(GroupInner {
                id: GroupId::next(),
                name: name.into(),
                state: Mutex::new(GroupState::new()),
                drained: Condvar::new(),
                validator,
            }),
        }
    }

    pub fn id(&self) -> GroupId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Tasks registered but not yet arrived
    pub fn pending(&self) -> u64 {
        self.lock_state().pending
    }

    pub fn phase(&self) -> GroupPhase {
        self.lock_state().phase
    }

    /// Number of completed drains
    pub fn cycle(&self) -> u64 {
        self.lock_state().cycle
    }

    /// Register one task that will later call [`arrive`](Self::arrive)
    ///
    /// Must be called before the task is spawned. Prefer
    /// [`run_together`](Self::run_together), which does this for every
    /// member at once.
    pub fn register(&self) -> Result<(), CoordinationError> {
        self.register_many(1)
    }

    /// Register `count` tasks in one critical section
    pub fn register_many(&self, count: u64) -> Result<(), CoordinationError> {
        let mut state = self.lock_state();
        let effects = self.apply(&mut state, GroupInput::Register { count })?;
        if effects.contains(&GroupEffect::CycleStarted) {
            tracing::debug!(group = %self.inner.id, cycle = state.cycle, "cycle started");
        }
        tracing::debug!(group = %self.inner.id, count, pending = state.pending, "registered");
        Ok(())
    }

    /// Mark one registered task as finished
    ///
    /// Fails with `NegativeCounter` when nothing is pending. The counter is
    /// never clamped.
    pub fn arrive(&self) -> Result<(), CoordinationError> {
        let mut state = self.lock_state();
        let effects = self.apply(&mut state, GroupInput::Arrive)?;
        for effect in effects {
            if let GroupEffect::Drained { cycle, released } = effect {
                tracing::debug!(group = %self.inner.id, cycle, released, "drained");
                self.inner.drained.notify_all();
            }
        }
        Ok(())
    }

    /// Block until pending reaches zero
    ///
    /// Every concurrent waiter observes the same drain exactly once. A wait
    /// on a group with nothing registered returns immediately and marks the
    /// cycle as observed; registering afterwards without
    /// [`begin_cycle`](Self::begin_cycle) is a late registration.
    pub fn wait(&self) {
        let mut state = self.lock_state();
        let effects = self.step(&mut state, GroupInput::WaitBegin);

        let Some(cycle) = effects.iter().find_map(|effect| match effect {
            GroupEffect::Block { cycle } => Some(*cycle),
            _ => None,
        }) else {
            self.note_settled(&state, &effects);
            return;
        };

        let mut state = self
            .inner
            .drained
            .wait_while(state, |s| s.cycle == cycle)
            .unwrap_or_else(|e| e.into_inner());
        let effects = self.step(&mut state, GroupInput::WaitReturn);
        self.note_settled(&state, &effects);
    }

    /// Explicitly start a fresh registration cycle
    pub fn begin_cycle(&self) -> Result<(), CoordinationError> {
        let mut state = self.lock_state();
        self.apply(&mut state, GroupInput::BeginCycle)?;
        Ok(())
    }

    /// Register one task, then spawn it on `scope`
    ///
    /// The task arrives on every exit path, including a panic.
    pub fn spawn_scoped<'scope, 'env, F, T>(
        &self,
        scope: &'scope Scope<'scope, 'env>,
        task: F,
    ) -> Result<ScopedJoinHandle<'scope, T>, CoordinationError>
    where
        F: FnOnce() -> T + Send + 'scope,
        T: Send + 'scope,
    {
        self.register()?;
        let arrival = Arrival::new(self.clone());
        Ok(scope.spawn(move || {
            let _arrival = arrival;
            task()
        }))
    }

    /// Run every task to completion as one drain cycle
    ///
    /// All members are registered in a single critical section before any
    /// of them is spawned, then the caller waits for the drain. Outputs are
    /// returned in input order.
    pub fn run_together<F, T>(&self, tasks: Vec<F>) -> Result<Vec<T>, CoordinationError>
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }
        self.register_many(tasks.len() as u64)?;

        let joined = std::thread::scope(|scope| {
            let handles: Vec<_> = tasks
                .into_iter()
                .map(|task| {
                    let arrival = Arrival::new(self.clone());
                    scope.spawn(move || {
                        let _arrival = arrival;
                        task()
                    })
                })
                .collect();
            self.wait();
            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<Vec<_>>()
        });

        joined
            .into_iter()
            .enumerate()
            .map(|(index, outcome)| {
                outcome.map_err(|_| CoordinationError::TaskPanicked { index })
            })
            .collect()
    }

    fn note_settled(&self, state: &GroupState, effects: &[GroupEffect]) {
        if effects.contains(&GroupEffect::Settled) {
            tracing::debug!(group = %self.inner.id, cycle = state.cycle, "settled");
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, GroupState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn subject(&self) -> Subject {
        Subject::group(self.inner.id, self.inner.name.clone())
    }

    /// Apply a mutating input, consulting the validator first
    fn apply(
        &self,
        state: &mut GroupState,
        input: GroupInput,
    ) -> Result<Vec<GroupEffect>, CoordinationError> {
        let validator = &self.inner.validator;
        if validator.is_enabled() {
            let verdict = validator.check(
                TaskId::current(),
                self.subject(),
                action_for(input),
                Some(state.clone()),
            );
            if let Some(report) = verdict {
                if let Some(fault) = GroupFault::from_kind(report.kind) {
                    let id = self.inner.id;
                    return Err(CoordinationError::from_fault(fault, id, Some(report)));
                }
            }
        }

        match state.transition(input) {
            Ok((next, effects)) => {
                *state = next;
                Ok(effects)
            }
            Err(fault) => {
                tracing::error!(group = %self.inner.id, ?fault, "refused group transition");
                Err(CoordinationError::from_fault(fault, self.inner.id, None))
            }
        }
    }

    /// Apply an input that cannot fault, recording it for the validator
    fn step(&self, state: &mut GroupState, input: GroupInput) -> Vec<GroupEffect> {
        let validator = &self.inner.validator;
        if validator.is_enabled() {
            validator.record(
                TaskId::current(),
                self.subject(),
                action_for(input),
                Some(state.clone()),
            );
        }
        match state.transition(input) {
            Ok((next, effects)) => {
                *state = next;
                effects
            }
            Err(_) => Vec::new(),
        }
    }
}

impl Drop for GroupInner {
    fn drop(&mut self) {
        self.validator.forget_group(self.id);
    }
}

fn action_for(input: GroupInput) -> Action {
    match input {
        GroupInput::Register { count } => Action::Register { count },
        GroupInput::Arrive => Action::Arrive,
        GroupInput::WaitBegin => Action::WaitBegin,
        GroupInput::WaitReturn => Action::WaitReturn,
        GroupInput::BeginCycle => Action::BeginCycle,
    }
}

/// Arrives on drop, so a registered task arrives on every exit path
struct Arrival {
    group: SafeTaskGroup,
}

impl Arrival {
    fn new(group: SafeTaskGroup) -> Self {
        Self { group }
    }
}

impl Drop for Arrival {
    fn drop(&mut self) {
        if let Err(e) = self.group.arrive() {
            tracing::error!(group = %self.group.id(), error = %e, "scoped arrival failed");
        }
    }
}

#[cfg(test)]
#[path = "group_tests.rs"]
mod tests;
