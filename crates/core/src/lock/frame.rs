// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task record of held resources

use crate::id::{LockSetId, ResourceKey};
use std::cell::RefCell;

thread_local! {
    static CURRENT: RefCell<AcquisitionFrame> = RefCell::new(AcquisitionFrame::new());
}

/// Outcome of removing a key from a frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Release {
    /// The key was the most recent acquisition
    Top,
    /// The key was held but released ahead of later acquisitions
    OutOfOrder,
    NotHeld,
}

/// Resources held by one task, in acquisition order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AcquisitionFrame {
    held: Vec<ResourceKey>,
}

impl AcquisitionFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the calling task's frame
    pub fn current() -> Self {
        CURRENT.with(|frame| frame.borrow().clone())
    }

    pub(crate) fn with_current<R>(f: impl FnOnce(&mut AcquisitionFrame) -> R) -> R {
        CURRENT.with(|frame| f(&mut frame.borrow_mut()))
    }

    pub fn held(&self) -> &[ResourceKey] {
        &self.held
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub fn contains(&self, key: ResourceKey) -> bool {
        self.held.contains(&key)
    }

    /// Highest-ranked resource held from `set`
    pub fn top_in(&self, set: LockSetId) -> Option<ResourceKey> {
        self.held.iter().filter(|k| k.set == set).max().copied()
    }

    /// Check that `key` may be acquired next
    ///
    /// Returns the conflicting held key when `key` is already held or does
    /// not rank strictly above everything held from the same set.
    pub fn admits(&self, key: ResourceKey) -> Result<(), ResourceKey> {
        if self.contains(key) {
            return Err(key);
        }
        match self.top_in(key.set) {
            Some(top) if top.rank >= key.rank => Err(top),
            _ => Ok(()),
        }
    }

    pub fn push(&mut self, key: ResourceKey) {
        self.held.push(key);
    }

    pub fn release(&mut self, key: ResourceKey) -> Release {
        match self.held.iter().rposition(|k| *k == key) {
            Some(pos) if pos + 1 == self.held.len() => {
                self.held.pop();
                Release::Top
            }
            Some(pos) => {
                self.held.remove(pos);
                Release::OutOfOrder
            }
            None => Release::NotHeld,
        }
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
