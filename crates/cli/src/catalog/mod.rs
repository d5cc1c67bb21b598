// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Catalogue of bad-vs-good coordination patterns
//!
//! Each bad pattern forces its racy interleaving with explicit sequencing
//! so the violation shows up on every run instead of once in a while.

mod groups;
mod locks;

use lockstep_core::{
    CoordinationError, CoordinationValidator, ValidatorConfig, ViolationKind, ViolationReport,
};
use serde::Serialize;
use std::thread::ScopedJoinHandle;

/// What running a scenario should produce
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Clean,
    Violation(ViolationKind),
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Clean => write!(f, "clean"),
            Verdict::Violation(kind) => write!(f, "{kind}"),
        }
    }
}

type ScenarioFn = fn(&CoordinationValidator) -> Result<(), CoordinationError>;

pub struct Scenario {
    pub name: &'static str,
    pub summary: &'static str,
    pub expected: Verdict,
    run: ScenarioFn,
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "inconsistent-lock-order",
        summary: "one task locks savings then checking, the others checking then savings",
        expected: Verdict::Violation(ViolationKind::LockOrderViolation),
        run: locks::inconsistent_order,
    },
    Scenario {
        name: "consistent-lock-order",
        summary: "transfers in both directions through acquire_pair",
        expected: Verdict::Clean,
        run: locks::consistent_order,
    },
    Scenario {
        name: "late-registration",
        summary: "the task registers itself after the caller already waited",
        expected: Verdict::Violation(ViolationKind::LateRegistration),
        run: groups::late_registration,
    },
    Scenario {
        name: "late-registration-loop",
        summary: "each task spawned in a loop registers itself",
        expected: Verdict::Violation(ViolationKind::LateRegistration),
        run: groups::late_registration_loop,
    },
    Scenario {
        name: "early-registration-bulk",
        summary: "run_together registers every member before spawning",
        expected: Verdict::Clean,
        run: groups::early_registration_bulk,
    },
    Scenario {
        name: "early-registration-iterative",
        summary: "spawn_scoped registers each task before it starts",
        expected: Verdict::Clean,
        run: groups::early_registration_iterative,
    },
    Scenario {
        name: "double-arrive",
        summary: "a task arrives twice for a single registration",
        expected: Verdict::Violation(ViolationKind::NegativeCounter),
        run: groups::double_arrive,
    },
    Scenario {
        name: "arrive-without-register",
        summary: "a task arrives on a group nothing registered with",
        expected: Verdict::Violation(ViolationKind::NegativeCounter),
        run: groups::arrive_without_register,
    },
    Scenario {
        name: "unsafe-reuse",
        summary: "the next round registers before a released waiter returns",
        expected: Verdict::Violation(ViolationKind::UnsafeReuse),
        run: groups::unsafe_reuse,
    },
    Scenario {
        name: "sequential-reuse",
        summary: "one group drives several rounds, each observed before the next",
        expected: Verdict::Clean,
        run: groups::sequential_reuse,
    },
    Scenario {
        name: "counter",
        summary: "tasks in a group increment a ranked counter",
        expected: Verdict::Clean,
        run: groups::counter,
    },
];

pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

/// Result of one scenario
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pass,
    Fail,
    Skipped,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Pass => write!(f, "PASS"),
            Status::Fail => write!(f, "FAIL"),
            Status::Skipped => write!(f, "SKIP"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Outcome {
    pub scenario: &'static str,
    pub expected: Verdict,
    pub status: Status,
    /// Distinct violation kinds seen, from reports and the returned error
    pub observed: Vec<ViolationKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub reports: Vec<ViolationReport>,
}

impl Scenario {
    /// Whether the pattern goes unnoticed with the validator disabled
    ///
    /// A negative counter and a same-set lock inversion are refused either way.
    pub fn needs_diagnostics(&self) -> bool {
        match self.expected {
            Verdict::Clean => false,
            Verdict::Violation(kind) => !matches!(
                kind,
                ViolationKind::NegativeCounter | ViolationKind::LockOrderViolation
            ),
        }
    }

    /// Run under a fresh validator built from `config`
    pub fn execute(&self, config: &ValidatorConfig) -> Result<Outcome, CoordinationError> {
        if !config.enabled && self.needs_diagnostics() {
            return Ok(Outcome {
                scenario: self.name,
                expected: self.expected,
                status: Status::Skipped,
                observed: Vec::new(),
                note: Some("requires diagnostics".to_string()),
                reports: Vec::new(),
            });
        }

        let validator = CoordinationValidator::new();
        validator.configure(config.clone())?;
        tracing::debug!(scenario = self.name, diagnostics = config.enabled, "running scenario");
        let result = (self.run)(&validator);
        validator.disable();
        let reports = validator.reports();

        let mut observed: Vec<ViolationKind> = Vec::new();
        let mut note = None;
        for kind in reports.iter().map(|r| r.kind) {
            if !observed.contains(&kind) {
                observed.push(kind);
            }
        }
        if let Err(e) = &result {
            match e.kind() {
                Some(kind) if !observed.contains(&kind) => observed.push(kind),
                Some(_) => {}
                None => note = Some(e.to_string()),
            }
        }

        let matched = match self.expected {
            Verdict::Clean => observed.is_empty(),
            Verdict::Violation(kind) => observed.contains(&kind),
        };
        let status = if matched && note.is_none() {
            Status::Pass
        } else {
            Status::Fail
        };

        Ok(Outcome {
            scenario: self.name,
            expected: self.expected,
            status,
            observed,
            note,
            reports,
        })
    }
}

/// Join a scoped task, turning a panic into an error
fn join<T>(handle: ScopedJoinHandle<'_, T>, index: usize) -> Result<T, CoordinationError> {
    handle
        .join()
        .map_err(|_| CoordinationError::TaskPanicked { index })
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
