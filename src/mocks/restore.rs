//! Restoration manager: original member snapshots and their reinstatement.

#![allow(missing_docs)]

use std::sync::Arc;

use parking_lot::Mutex;

use crate::object::space::{Member, ObjectId, ObjectSpace};

/// State of one `(target, method)` before its first interception.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub target: ObjectId,
    pub method: String,
    /// Per-object override that existed, if any. Restoration reinstalls it
    /// or removes the slot when there was none.
    pub prior_override: Option<Member>,
    /// Member that resolved at that time (override or class member).
    pub resolved: Option<Member>,
}

/// Tracks snapshots in interception order and reverts them.
#[derive(Debug, Clone)]
pub struct RestorationManager {
    space: ObjectSpace,
    snapshots: Arc<Mutex<Vec<Snapshot>>>,
}

impl RestorationManager {
    #[must_use]
    pub fn new(space: ObjectSpace) -> Self {
        Self {
            space,
            snapshots: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Snapshot `(target, method)` unless already tracked. Returns whether a
    /// new snapshot was taken.
    pub fn track(&self, target: ObjectId, method: &str) -> bool {
        let mut snapshots = self.snapshots.lock();
        if snapshots
            .iter()
            .any(|s| s.target == target && s.method == method)
        {
            return false;
        }
        snapshots.push(Snapshot {
            target,
            method: method.to_string(),
            prior_override: self.space.override_of(target, method),
            resolved: self.space.resolve(target, method),
        });
        true
    }

    #[must_use]
    pub fn snapshot(&self, target: ObjectId, method: &str) -> Option<Snapshot> {
        self.snapshots
            .lock()
            .iter()
            .find(|s| s.target == target && s.method == method)
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Put every tracked member back, newest first, and forget the snapshots.
    /// Released objects are skipped. Returns the number of members restored.
    pub fn restore_all(&self) -> usize {
        let snapshots = std::mem::take(&mut *self.snapshots.lock());
        let mut restored = 0;
        for snapshot in snapshots.into_iter().rev() {
            if !self.space.contains(snapshot.target) {
                continue;
            }
            match snapshot.prior_override {
                Some(member) => {
                    if self
                        .space
                        .define_override(snapshot.target, &snapshot.method, member)
                        .is_err()
                    {
                        continue;
                    }
                }
                None => {
                    self.space.remove_override(snapshot.target, &snapshot.method);
                }
            }
            restored += 1;
        }
        restored
    }
}
