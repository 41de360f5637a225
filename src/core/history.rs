//! History of settled state changes.
//!
//! Each model instance keeps a bounded, ordered record of the present-state
//! changes it went through. It is diagnostic data: nothing in the engine
//! reads it back to make decisions.

use super::model::UpdateSource;
use super::state::StateValue;
use serde::{Deserialize, Serialize};

/// Default number of changes kept per model instance.
pub const DEFAULT_HISTORY_LIMIT: usize = 32;

/// Record of a single present-state change.
///
/// # Example
///
/// ```rust
/// use meshstate::core::{OnOff, StateChange, StateValue, UpdateSource};
///
/// let change = StateChange {
///     from: StateValue::OnOff(OnOff::Off),
///     to: StateValue::OnOff(OnOff::On),
///     at_ms: 200,
///     source: UpdateSource::Client,
/// };
/// assert!(change.is_change());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    /// Present state before the change
    pub from: StateValue,
    /// Present state after the change
    pub to: StateValue,
    /// Engine time of the change, in milliseconds
    pub at_ms: u64,
    /// What caused the change
    pub source: UpdateSource,
}

impl StateChange {
    /// False when the value was re-applied without changing.
    pub fn is_change(&self) -> bool {
        self.from != self.to
    }
}

/// Ordered, bounded history of state changes.
///
/// `record` returns a new history with the change appended; the oldest
/// entries are dropped once the limit is reached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateHistory {
    changes: Vec<StateChange>,
    limit: usize,
}

impl Default for StateHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl StateHistory {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// History keeping at most `limit` changes. A limit of zero keeps none.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            changes: Vec::new(),
            limit,
        }
    }

    pub fn record(&self, change: StateChange) -> Self {
        if self.limit == 0 {
            return self.clone();
        }
        let skip = (self.changes.len() + 1).saturating_sub(self.limit);
        let mut changes: Vec<StateChange> = self.changes.iter().skip(skip).cloned().collect();
        changes.push(change);
        Self {
            changes,
            limit: self.limit,
        }
    }

    /// The sequence of present values, starting with the first change's origin.
    pub fn get_path(&self) -> Vec<&StateValue> {
        let mut path = Vec::new();
        if let Some(first) = self.changes.first() {
            path.push(&first.from);
        }
        for change in &self.changes {
            path.push(&change.to);
        }
        path
    }

    /// Time between the first and last recorded change.
    pub fn span_ms(&self) -> Option<u64> {
        match (self.changes.first(), self.changes.last()) {
            (Some(first), Some(last)) => Some(last.at_ms.saturating_sub(first.at_ms)),
            _ => None,
        }
    }

    pub fn changes(&self) -> &[StateChange] {
        &self.changes
    }

    pub fn last(&self) -> Option<&StateChange> {
        self.changes.last()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
