// File: crates/chart-host/src/timers.rs
// Summary: Owner -> timer-handle book; every recurring task the layer starts is tracked per container.

use std::cell::RefCell;
use std::collections::HashMap;

use tokio::task::AbortHandle;
use tracing::trace;

use crate::surface::ContainerId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Watermark,
    AutoRefresh,
}

/// Cancellation handle of one recurring local task.
#[derive(Debug)]
pub struct TimerHandle {
    kind: TimerKind,
    abort: AbortHandle,
}

impl TimerHandle {
    pub fn new(kind: TimerKind, abort: AbortHandle) -> Self {
        Self { kind, abort }
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn cancel(&self) {
        self.abort.abort();
    }
}

/// Page-wide bookkeeping of containers with live timers, so a full teardown
/// can cancel everything even when the owning instances are unreachable.
#[derive(Default)]
pub struct TimerBook {
    owners: RefCell<HashMap<ContainerId, Vec<TimerHandle>>>,
}

impl TimerBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, owner: ContainerId, kind: TimerKind, abort: AbortHandle) {
        self.owners
            .borrow_mut()
            .entry(owner)
            .or_default()
            .push(TimerHandle::new(kind, abort));
    }

    /// Cancel the owner's timers of one kind; returns how many were cancelled.
    pub fn cancel_kind(&self, owner: ContainerId, kind: TimerKind) -> usize {
        let mut owners = self.owners.borrow_mut();
        let Some(handles) = owners.get_mut(&owner) else { return 0 };
        let before = handles.len();
        handles.retain(|h| {
            if h.kind == kind {
                h.cancel();
                false
            } else {
                true
            }
        });
        let cancelled = before - handles.len();
        if handles.is_empty() {
            owners.remove(&owner);
        }
        cancelled
    }

    pub fn cancel_all(&self, owner: ContainerId) -> usize {
        let handles = self.owners.borrow_mut().remove(&owner).unwrap_or_default();
        for h in &handles {
            h.cancel();
        }
        if !handles.is_empty() {
            trace!(owner = owner.0, count = handles.len(), "cancelled container timers");
        }
        handles.len()
    }

    pub fn active(&self, owner: ContainerId) -> usize {
        self.owners.borrow().get(&owner).map(Vec::len).unwrap_or(0)
    }

    pub fn active_kind(&self, owner: ContainerId, kind: TimerKind) -> usize {
        self.owners
            .borrow()
            .get(&owner)
            .map(|hs| hs.iter().filter(|h| h.kind == kind).count())
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.owners.borrow().values().map(Vec::len).sum()
    }

    /// Cancel every timer of every owner.
    pub fn sweep(&self) -> usize {
        let all: Vec<TimerHandle> = self.owners.borrow_mut().drain().flat_map(|(_, hs)| hs).collect();
        for h in &all {
            h.cancel();
        }
        all.len()
    }
}
