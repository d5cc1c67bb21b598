// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn apply(state: &GroupState, input: GroupInput) -> (GroupState, Vec<GroupEffect>) {
    state.transition(input).unwrap()
}

fn active(pending: u64) -> GroupState {
    apply(&GroupState::new(), GroupInput::Register { count: pending }).0
}

#[test]
fn new_group_is_idle_and_empty() {
    let state = GroupState::new();
    assert_eq!(state.phase, GroupPhase::Idle);
    assert_eq!(state.pending, 0);
    assert_eq!(state.cycle, 0);
}

#[test]
fn first_registration_starts_a_cycle() {
    let (state, effects) = apply(&GroupState::new(), GroupInput::Register { count: 1 });
    assert_eq!(state.phase, GroupPhase::Active);
    assert_eq!(state.pending, 1);
    assert_eq!(effects, vec![GroupEffect::CycleStarted]);

    let (state, effects) = apply(&state, GroupInput::Register { count: 2 });
    assert_eq!(state.pending, 3);
    assert!(effects.is_empty());
}

#[test]
fn zero_count_registration_changes_nothing() {
    let (state, effects) = apply(&GroupState::new(), GroupInput::Register { count: 0 });
    assert_eq!(state, GroupState::new());
    assert!(effects.is_empty());
}

#[test]
fn last_arrival_drains_and_releases_blocked_waiters() {
    let state = active(2);
    let (state, effects) = apply(&state, GroupInput::WaitBegin);
    assert_eq!(effects, vec![GroupEffect::Block { cycle: 0 }]);
    let (state, _) = apply(&state, GroupInput::WaitBegin);
    assert_eq!(state.blocked, 2);

    let (state, effects) = apply(&state, GroupInput::Arrive);
    assert!(effects.is_empty());
    assert_eq!(state.phase, GroupPhase::Active);

    let (state, effects) = apply(&state, GroupInput::Arrive);
    assert_eq!(state.phase, GroupPhase::Draining);
    assert_eq!(state.cycle, 1);
    assert_eq!(state.blocked, 0);
    assert_eq!(state.unobserved, 2);
    assert_eq!(effects, vec![GroupEffect::Drained { cycle: 1, released: 2 }]);
}

#[test]
fn group_settles_once_every_released_waiter_returns() {
    let state = active(1);
    let (state, _) = apply(&state, GroupInput::WaitBegin);
    let (state, _) = apply(&state, GroupInput::WaitBegin);
    let (state, _) = apply(&state, GroupInput::Arrive);

    let (state, effects) = apply(&state, GroupInput::WaitReturn);
    assert_eq!(state.phase, GroupPhase::Draining);
    assert!(effects.is_empty());

    let (state, effects) = apply(&state, GroupInput::WaitReturn);
    assert_eq!(state.phase, GroupPhase::Idle);
    assert_eq!(effects, vec![GroupEffect::Settled]);
}

#[test]
fn wait_after_unobserved_drain_settles_immediately() {
    let (state, _) = apply(&active(1), GroupInput::Arrive);
    assert_eq!(state.phase, GroupPhase::Draining);

    let (state, effects) = apply(&state, GroupInput::WaitBegin);
    assert_eq!(state.phase, GroupPhase::Idle);
    assert_eq!(effects, vec![GroupEffect::Return, GroupEffect::Settled]);
    assert!(!state.vacuous_wait);
}

#[test]
fn wait_on_idle_group_is_vacuous() {
    let (state, effects) = apply(&GroupState::new(), GroupInput::WaitBegin);
    assert_eq!(effects, vec![GroupEffect::Return]);
    assert!(state.vacuous_wait);
    assert_eq!(state.check(GroupInput::Register { count: 1 }), Err(GroupFault::LateRegistration));
}

#[test]
fn begin_cycle_clears_vacuous_wait() {
    let (state, _) = apply(&GroupState::new(), GroupInput::WaitBegin);
    assert_eq!(state.check(GroupInput::BeginCycle), Ok(()));
    let (state, _) = apply(&state, GroupInput::BeginCycle);
    assert!(!state.vacuous_wait);
    assert_eq!(state.check(GroupInput::Register { count: 1 }), Ok(()));
}

#[test]
fn arrive_on_empty_group_is_refused() {
    assert_eq!(
        GroupState::new().transition(GroupInput::Arrive).err(),
        Some(GroupFault::NegativeCounter)
    );
    assert_eq!(GroupState::new().check(GroupInput::Arrive), Err(GroupFault::NegativeCounter));
}

#[test]
fn double_arrive_is_refused_after_drain() {
    let (state, _) = apply(&active(1), GroupInput::Arrive);
    assert_eq!(state.transition(GroupInput::Arrive).err(), Some(GroupFault::NegativeCounter));
}

#[test]
fn register_while_released_waiter_pending_is_unsafe_reuse() {
    let (state, _) = apply(&active(1), GroupInput::WaitBegin);
    let (state, _) = apply(&state, GroupInput::Arrive);
    assert_eq!(state.check(GroupInput::Register { count: 1 }), Err(GroupFault::UnsafeReuse));

    // The production path still applies it
    let (state, _) = apply(&state, GroupInput::Register { count: 1 });
    assert_eq!(state.phase, GroupPhase::Active);
    assert_eq!(state.unobserved, 1);
}

#[test]
fn register_after_drain_without_waiters_continues() {
    // Per-iteration registration: a sibling drained before the next register
    let (state, _) = apply(&active(1), GroupInput::Arrive);
    assert_eq!(state.check(GroupInput::Register { count: 1 }), Ok(()));
}

#[test]
fn register_after_observed_drain_is_a_fresh_cycle() {
    let (state, _) = apply(&active(1), GroupInput::Arrive);
    let (state, _) = apply(&state, GroupInput::WaitBegin);
    assert_eq!(state.check(GroupInput::Register { count: 1 }), Ok(()));
    let (state, effects) = apply(&state, GroupInput::Register { count: 1 });
    assert_eq!(effects, vec![GroupEffect::CycleStarted]);
    assert_eq!(state.cycle, 1);
}

use yare::parameterized;

#[parameterized(
    idle_register = { GroupState::new(), GroupInput::Register { count: 1 }, None },
    active_register = { active(1), GroupInput::Register { count: 1 }, None },
    active_begin_cycle = { active(1), GroupInput::BeginCycle, Some(GroupFault::UnsafeReuse) },
    idle_begin_cycle = { GroupState::new(), GroupInput::BeginCycle, None },
    empty_arrive = { GroupState::new(), GroupInput::Arrive, Some(GroupFault::NegativeCounter) },
    active_arrive = { active(3), GroupInput::Arrive, None },
    idle_wait = { GroupState::new(), GroupInput::WaitBegin, None },
)]
fn strict_checks(state: GroupState, input: GroupInput, expected: Option<GroupFault>) {
    assert_eq!(state.check(input).err(), expected);
}

#[parameterized(
    negative = { GroupFault::NegativeCounter },
    late = { GroupFault::LateRegistration },
    reuse = { GroupFault::UnsafeReuse },
)]
fn fault_kind_round_trips(fault: GroupFault) {
    assert_eq!(GroupFault::from_kind(fault.kind()), Some(fault));
}

use proptest::prelude::*;

proptest! {
    #[test]
    fn pending_never_goes_negative(ops in proptest::collection::vec(any::<bool>(), 0..64)) {
        let mut state = GroupState::new();
        let mut expected: u64 = 0;
        for register in ops {
            let input = if register {
                GroupInput::Register { count: 1 }
            } else {
                GroupInput::Arrive
            };
            match state.transition(input) {
                Ok((next, _)) => {
                    if register { expected += 1 } else { expected -= 1 }
                    state = next;
                }
                Err(fault) => {
                    prop_assert_eq!(fault, GroupFault::NegativeCounter);
                    prop_assert_eq!(expected, 0);
                }
            }
            prop_assert_eq!(state.pending, expected);
            prop_assert_eq!(state.phase == GroupPhase::Active, expected > 0);
        }
    }

    #[test]
    fn reuse_across_cycles_matches_fresh_groups(sizes in proptest::collection::vec(1..8u64, 1..6)) {
        let mut reused = GroupState::new();
        for (i, size) in sizes.iter().enumerate() {
            let mut fresh = GroupState::new();
            for state in [&mut reused, &mut fresh] {
                prop_assert_eq!(state.check(GroupInput::Register { count: *size }), Ok(()));
                *state = state.transition(GroupInput::Register { count: *size }).unwrap().0;
                for _ in 0..*size {
                    prop_assert_eq!(state.check(GroupInput::Arrive), Ok(()));
                    *state = state.transition(GroupInput::Arrive).unwrap().0;
                }
                *state = state.transition(GroupInput::WaitBegin).unwrap().0;
            }
            prop_assert_eq!(reused.phase, fresh.phase);
            prop_assert_eq!(reused.pending, fresh.pending);
            prop_assert_eq!(reused.cycle, i as u64 + 1);
            prop_assert_eq!(fresh.cycle, 1);
        }
    }
}
