//! Invocation journal: ordered, append-only log of intercepted calls.
//!
//! Entries are appended when a wrapped call starts (so ordering follows call
//! start), then completed with exactly one outcome when the call returns.
//! Readers always get point-in-time copies, so validators that dispatch more
//! calls on the same target never observe their own side effects.

#![allow(missing_docs)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::object::space::ObjectId;
use crate::object::value::{CallResult, RaisedError, Signal, Thrown, Value};

/// How a recorded call ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    /// The call is still on the stack.
    Pending,
    Returned(Value),
    Raised(RaisedError),
    Thrown(Thrown),
}

impl Outcome {
    fn from_result(result: &CallResult) -> Self {
        match result {
            Ok(value) => Self::Returned(value.clone()),
            Err(Signal::Raise(err)) => Self::Raised(err.clone()),
            Err(Signal::Throw(thrown)) => Self::Thrown(thrown.clone()),
        }
    }
}

/// One intercepted call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    /// Global position in the journal, strictly increasing.
    pub seq: u64,
    pub target: ObjectId,
    pub method: String,
    pub arguments: Vec<Value>,
    /// Call-site chain at the time of the call, innermost first.
    pub callers: Vec<String>,
    pub outcome: Outcome,
    /// Arguments of the last yield to the caller's block, if any.
    pub yielded: Option<Vec<Value>>,
}

impl Invocation {
    #[must_use]
    pub const fn returned(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Returned(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn raised(&self) -> Option<&RaisedError> {
        match &self.outcome {
            Outcome::Raised(err) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub const fn thrown(&self) -> Option<&Thrown> {
        match &self.outcome {
            Outcome::Thrown(thrown) => Some(thrown),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        !matches!(self.outcome, Outcome::Pending)
    }
}

/// Handle to a journal entry. Stale after [`Journal::clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryId {
    generation: u64,
    index: usize,
}

#[derive(Debug, Default)]
struct JournalInner {
    generation: u64,
    next_seq: u64,
    entries: Vec<Invocation>,
}

impl JournalInner {
    fn entry_mut(&mut self, id: EntryId) -> Option<&mut Invocation> {
        if id.generation != self.generation {
            return None;
        }
        self.entries.get_mut(id.index)
    }
}

/// Shared journal handle.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    inner: Arc<Mutex<JournalInner>>,
}

impl Journal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pending entry.
    pub fn record(
        &self,
        target: ObjectId,
        method: &str,
        arguments: Vec<Value>,
        callers: Vec<String>,
    ) -> EntryId {
        let mut inner = self.inner.lock();
        inner.next_seq += 1;
        let seq = inner.next_seq;
        let index = inner.entries.len();
        inner.entries.push(Invocation {
            seq,
            target,
            method: method.to_string(),
            arguments,
            callers,
            outcome: Outcome::Pending,
            yielded: None,
        });
        EntryId {
            generation: inner.generation,
            index,
        }
    }

    /// Freeze an entry with the outcome of its call.
    pub fn complete(&self, id: EntryId, result: &CallResult) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entry_mut(id)
            && !entry.is_complete()
        {
            entry.outcome = Outcome::from_result(result);
        }
    }

    /// Capture yielded values; ignored once the entry is frozen.
    pub fn set_yielded(&self, id: EntryId, values: &[Value]) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entry_mut(id)
            && !entry.is_complete()
        {
            entry.yielded = Some(values.to_vec());
        }
    }

    /// Point-in-time copy of the entries for one target.
    #[must_use]
    pub fn query(&self, target: ObjectId) -> Vec<Invocation> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.target == target)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries. Outstanding handles stop matching.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.generation += 1;
    }
}
