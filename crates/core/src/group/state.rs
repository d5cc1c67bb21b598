// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task-group state machine
//!
//! Pure transitions shared by [`SafeTaskGroup`](super::SafeTaskGroup) and the
//! validator's per-group model. `transition` applies an input the way the
//! production group does (only a negative counter is refused); `check`
//! applies the strict invariants the validator enforces.

use crate::report::ViolationKind;
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a task group
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupPhase {
    /// Nothing registered in the current cycle
    #[default]
    Idle,
    /// At least one registered task has not arrived
    Active,
    /// Pending reached zero; waiting for `wait()` to observe it
    Draining,
}

impl std::fmt::Display for GroupPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupPhase::Idle => write!(f, "idle"),
            GroupPhase::Active => write!(f, "active"),
            GroupPhase::Draining => write!(f, "draining"),
        }
    }
}

/// Misuse detected on a group transition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GroupFault {
    NegativeCounter,
    LateRegistration,
    UnsafeReuse,
}

impl GroupFault {
    pub fn kind(&self) -> ViolationKind {
        match self {
            GroupFault::NegativeCounter => ViolationKind::NegativeCounter,
            GroupFault::LateRegistration => ViolationKind::LateRegistration,
            GroupFault::UnsafeReuse => ViolationKind::UnsafeReuse,
        }
    }

    pub fn from_kind(kind: ViolationKind) -> Option<Self> {
        match kind {
            ViolationKind::NegativeCounter => Some(GroupFault::NegativeCounter),
            ViolationKind::LateRegistration => Some(GroupFault::LateRegistration),
            ViolationKind::UnsafeReuse => Some(GroupFault::UnsafeReuse),
            ViolationKind::LockOrderViolation => None,
        }
    }
}

/// Inputs that drive group transitions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupInput {
    Register { count: u64 },
    Arrive,
    WaitBegin,
    /// A blocked waiter woke after the drain it was waiting for
    WaitReturn,
    BeginCycle,
}

/// Side effects the caller must carry out after a transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupEffect {
    /// The group left Idle or Draining for a new cycle
    CycleStarted,
    /// Pending reached zero; `released` blocked waiters must be woken
    Drained { cycle: u64, released: u64 },
    /// The waiter must block until `cycle` advances past this value
    Block { cycle: u64 },
    /// The waiter may return immediately
    Return,
    /// Every waiter has observed the drain; the group is reusable
    Settled,
}

/// Counter and waiter bookkeeping of a task group
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    pub pending: u64,
    pub phase: GroupPhase,
    /// Number of completed drains
    pub cycle: u64,
    /// Waiters blocked on the current cycle
    pub blocked: u64,
    /// Waiters released by the last drain that have not yet returned
    pub unobserved: u64,
    /// A wait on this cycle returned with nothing registered
    pub vacuous_wait: bool,
}

impl GroupState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the strict invariants for `input` without applying it
    pub fn check(&self, input: GroupInput) -> Result<(), GroupFault> {
        match input {
            GroupInput::Register { count: 0 } => Ok(()),
            GroupInput::Register { .. } => match self.phase {
                GroupPhase::Draining if self.unobserved > 0 => Err(GroupFault::UnsafeReuse),
                GroupPhase::Idle if self.vacuous_wait => Err(GroupFault::LateRegistration),
                _ => Ok(()),
            },
            GroupInput::Arrive if self.pending == 0 => Err(GroupFault::NegativeCounter),
            GroupInput::BeginCycle => match self.phase {
                GroupPhase::Active => Err(GroupFault::UnsafeReuse),
                GroupPhase::Draining if self.unobserved > 0 => Err(GroupFault::UnsafeReuse),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Pure state transition function
    ///
    /// Only a decrement past zero is refused here. The other faults are
    /// left to [`check`](Self::check) so the production path degrades the
    /// way an unchecked counter would.
    pub fn transition(
        &self,
        input: GroupInput,
    ) -> Result<(GroupState, Vec<GroupEffect>), GroupFault> {
        let mut next = self.clone();
        let mut effects = Vec::new();

        match input {
            GroupInput::Register { count: 0 } => {}

            GroupInput::Register { count } => {
                if next.phase != GroupPhase::Active {
                    effects.push(GroupEffect::CycleStarted);
                }
                next.pending += count;
                next.phase = GroupPhase::Active;
                next.vacuous_wait = false;
            }

            GroupInput::Arrive => {
                if self.pending == 0 {
                    return Err(GroupFault::NegativeCounter);
                }
                next.pending -= 1;
                if next.pending == 0 {
                    next.phase = GroupPhase::Draining;
                    next.cycle += 1;
                    next.unobserved += next.blocked;
                    effects.push(GroupEffect::Drained {
                        cycle: next.cycle,
                        released: next.blocked,
                    });
                    next.blocked = 0;
                }
            }

            GroupInput::WaitBegin => {
                if self.pending > 0 {
                    next.blocked += 1;
                    effects.push(GroupEffect::Block { cycle: self.cycle });
                } else {
                    match self.phase {
                        GroupPhase::Draining if self.unobserved == 0 => {
                            next.phase = GroupPhase::Idle;
                            effects.push(GroupEffect::Return);
                            effects.push(GroupEffect::Settled);
                        }
                        GroupPhase::Draining => effects.push(GroupEffect::Return),
                        _ => {
                            next.vacuous_wait = true;
                            effects.push(GroupEffect::Return);
                        }
                    }
                }
            }

            GroupInput::WaitReturn => {
                next.unobserved = self.unobserved.saturating_sub(1);
                if next.unobserved == 0 && self.phase == GroupPhase::Draining {
                    next.phase = GroupPhase::Idle;
                    effects.push(GroupEffect::Settled);
                }
            }

            GroupInput::BeginCycle => {
                if self.phase == GroupPhase::Draining {
                    next.phase = GroupPhase::Idle;
                }
                next.vacuous_wait = false;
            }
        }

        Ok((next, effects))
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
