// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! lockstep-core: concurrency-safety primitives
//!
//! This crate provides:
//! - [`OrderedLockSet`]: rank-ordered acquisition of caller-owned values
//! - [`SafeTaskGroup`]: a join counter whose registration happens-before spawn
//! - [`CoordinationValidator`]: an opt-in observer that reports lock-order and
//!   task-group misuse with the events that caused it

pub mod clock;
pub mod error;
pub mod id;
pub mod report;

pub mod group;
pub mod lock;
pub mod validator;

pub use clock::{Clock, FakeClock, SystemClock};
pub use error::CoordinationError;
pub use group::{GroupPhase, GroupState, SafeTaskGroup};
pub use id::{GroupId, LockSetId, Rank, ResourceKey, TaskId};
pub use lock::{AcquisitionFrame, OrderedLockSet, Ranked, RankedGuard};
pub use report::{Action, Subject, TraceEvent, ViolationKind, ViolationReport};
pub use validator::{CoordinationValidator, ValidatorConfig, DIAGNOSTICS_ENV};
