// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Diagnostic observer for lock order and task-group misuse
//!
//! Primitives forward acquire/release and register/arrive/wait events over
//! a channel to a single observer thread that owns all validator state.
//! Mutating calls wait for the observer's verdict so a violation can fail
//! the offending call; other events are fire-and-forget.
//!
//! The validator is disabled by default. Verdicts are awaited with a
//! blocking receive, so primitives observed by an enabled validator must
//! not be driven from inside an async runtime worker.

mod config;
mod observer;

pub use config::{ValidatorConfig, DIAGNOSTICS_ENV};
pub use observer::{Observer, ObserverSummary};

use crate::clock::{Clock, SystemClock};
use crate::error::CoordinationError;
use crate::group::GroupState;
use crate::id::{GroupId, LockSetId, TaskId};
use crate::report::{Action, Subject, ViolationReport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};

static GLOBAL: OnceLock<CoordinationValidator> = OnceLock::new();

/// Messages handled by the observer thread
enum Command {
    Observe {
        task: TaskId,
        subject: Subject,
        action: Action,
        snapshot: Option<GroupState>,
        reply: Option<oneshot::Sender<Option<ViolationReport>>>,
    },
    Reports {
        reply: oneshot::Sender<(Vec<ViolationReport>, u64)>,
    },
    Clear,
    ForgetGroup(GroupId),
    ForgetLockSet(LockSetId),
}

struct Link {
    tx: mpsc::UnboundedSender<Command>,
    worker: JoinHandle<ObserverSummary>,
}

struct ValidatorInner {
    enabled: AtomicBool,
    fail_fast: AtomicBool,
    link: RwLock<Option<Link>>,
    /// Reports from observers that have been shut down
    retired: Mutex<ObserverSummary>,
}

/// Handle to a coordination validator
///
/// Clones share the same observer.
#[derive(Clone)]
pub struct CoordinationValidator {
    inner: Arc<ValidatorInner>,
}

impl std::fmt::Debug for CoordinationValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinationValidator")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl Default for CoordinationValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinationValidator {
    /// A disabled validator
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ValidatorInner {
                enabled: AtomicBool::new(false),
                fail_fast: AtomicBool::new(true),
                link: RwLock::new(None),
                retired: Mutex::new(ObserverSummary::default()),
            }),
        }
    }

    /// The process-wide validator used by primitives built without one
    pub fn global() -> &'static CoordinationValidator {
        GLOBAL.get_or_init(CoordinationValidator::new)
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Enable when `config.enabled` is set, otherwise disable
    pub fn configure(&self, config: ValidatorConfig) -> Result<(), CoordinationError> {
        if config.enabled {
            self.enable(config)
        } else {
            self.disable();
            Ok(())
        }
    }

    /// Start observing with `config`, replacing any running observer
    pub fn enable(&self, config: ValidatorConfig) -> Result<(), CoordinationError> {
        self.enable_with_clock(config, SystemClock::new())
    }

    pub fn enable_with_clock<C: Clock>(
        &self,
        config: ValidatorConfig,
        clock: C,
    ) -> Result<(), CoordinationError> {
        config.validate()?;
        self.disable();

        let (tx, rx) = mpsc::unbounded_channel();
        let fail_fast = config.fail_fast;
        let observer = Observer::new(config, clock);
        let worker = std::thread::Builder::new()
            .name("lockstep-validator".to_string())
            .spawn(move || run_observer(observer, rx))?;

        let mut link = self.inner.link.write().unwrap_or_else(|e| e.into_inner());
        *link = Some(Link { tx, worker });
        self.inner.fail_fast.store(fail_fast, Ordering::Release);
        self.inner.enabled.store(true, Ordering::Release);
        tracing::info!(fail_fast, "coordination validator enabled");
        Ok(())
    }

    /// Stop observing; reports gathered so far remain available
    pub fn disable(&self) {
        self.inner.enabled.store(false, Ordering::Release);
        let link = {
            let mut link = self.inner.link.write().unwrap_or_else(|e| e.into_inner());
            link.take()
        };
        let Some(Link { tx, worker }) = link else {
            return;
        };
        drop(tx);

        match worker.join() {
            Ok(summary) => {
                let mut retired = self.inner.retired.lock().unwrap_or_else(|e| e.into_inner());
                retired.reports.extend(summary.reports);
                retired.dropped += summary.dropped;
                tracing::info!(reports = retired.reports.len(), "coordination validator disabled");
            }
            Err(_) => tracing::error!("validator thread panicked; its reports are lost"),
        }
    }

    /// Every report gathered so far, oldest first
    pub fn reports(&self) -> Vec<ViolationReport> {
        self.snapshot().0
    }

    /// Reports discarded to respect `max_reports`
    pub fn dropped_reports(&self) -> u64 {
        self.snapshot().1
    }

    /// Forget every report gathered so far
    pub fn clear(&self) {
        {
            let mut retired = self.inner.retired.lock().unwrap_or_else(|e| e.into_inner());
            *retired = ObserverSummary::default();
        }
        self.send(Command::Clear);
    }

    /// Observe a mutating event and return the violation it causes
    ///
    /// Returns `None` when disabled, when the event is clean, or when the
    /// validator is configured not to fail the offending call.
    pub(crate) fn check(
        &self,
        task: TaskId,
        subject: Subject,
        action: Action,
        snapshot: Option<GroupState>,
    ) -> Option<ViolationReport> {
        if !self.is_enabled() {
            return None;
        }
        let (reply, verdict) = oneshot::channel();
        if !self.send(Command::Observe {
            task,
            subject,
            action,
            snapshot,
            reply: Some(reply),
        }) {
            return None;
        }
        let report = verdict.blocking_recv().ok().flatten()?;
        if self.inner.fail_fast.load(Ordering::Acquire) {
            Some(report)
        } else {
            None
        }
    }

    /// Observe an event without waiting for a verdict
    pub(crate) fn record(
        &self,
        task: TaskId,
        subject: Subject,
        action: Action,
        snapshot: Option<GroupState>,
    ) {
        if !self.is_enabled() {
            return;
        }
        self.send(Command::Observe {
            task,
            subject,
            action,
            snapshot,
            reply: None,
        });
    }

    /// Drop the observer's model of a group whose last handle is gone
    pub(crate) fn forget_group(&self, group: GroupId) {
        if self.is_enabled() {
            self.send(Command::ForgetGroup(group));
        }
    }

    /// Drop the observer's lock-order edges for a set that is gone
    pub(crate) fn forget_lock_set(&self, set: LockSetId) {
        if self.is_enabled() {
            self.send(Command::ForgetLockSet(set));
        }
    }

    fn send(&self, command: Command) -> bool {
        let link = self.inner.link.read().unwrap_or_else(|e| e.into_inner());
        match link.as_ref() {
            Some(link) => link.tx.send(command).is_ok(),
            None => false,
        }
    }

    fn snapshot(&self) -> (Vec<ViolationReport>, u64) {
        let (mut reports, mut dropped) = {
            let retired = self.inner.retired.lock().unwrap_or_else(|e| e.into_inner());
            (retired.reports.clone(), retired.dropped)
        };
        let (reply, live) = oneshot::channel();
        if self.send(Command::Reports { reply }) {
            if let Ok((live_reports, live_dropped)) = live.blocking_recv() {
                reports.extend(live_reports);
                dropped += live_dropped;
            }
        }
        (reports, dropped)
    }
}

fn run_observer<C: Clock>(
    mut observer: Observer<C>,
    mut rx: mpsc::UnboundedReceiver<Command>,
) -> ObserverSummary {
    while let Some(command) = rx.blocking_recv() {
        match command {
            Command::Observe {
                task,
                subject,
                action,
                snapshot,
                reply,
            } => {
                let verdict = observer.observe(task, subject, action, snapshot);
                if let Some(reply) = reply {
                    let _ = reply.send(verdict);
                }
            }
            Command::Reports { reply } => {
                let _ = reply.send((observer.reports(), observer.dropped()));
            }
            Command::Clear => observer.clear(),
            Command::ForgetGroup(group) => observer.forget_group(group),
            Command::ForgetLockSet(set) => observer.forget_lock_set(set),
        }
    }
    observer.into_summary()
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
