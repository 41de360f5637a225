//! Cross-model state bindings.
//!
//! A binding says: when `source_state` changes on `source_element`, run a
//! resolver against `target_element`. The resolver decides what the bound
//! state becomes. Neither model knows the other's concrete type; they only
//! meet through [`StateValue`].
//!
//! The table is filled once while the node is configured and never shrinks.
//!
//! ```rust
//! use meshstate::bindings::BindingTable;
//! use meshstate::core::{BoundState, StateValue};
//!
//! // Context type stands in for the engine
//! let mut table: BindingTable<Vec<(u8, StateValue)>> = BindingTable::with_capacity(4);
//! table.register(
//!     BoundState::GenOnPowerUp,
//!     BoundState::GenOnOff,
//!     0,
//!     1,
//!     |log: &mut Vec<(u8, StateValue)>, target: u8, value: &StateValue| {
//!         log.push((target, *value))
//!     },
//! );
//! assert_eq!(table.len(), 1);
//! ```

use crate::core::{BoundState, ElementId, StateValue};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Hard upper bound on the number of bindings a node can hold.
pub const MAX_BINDINGS: usize = 30;

/// Computes and applies the bound state on a target element.
///
/// `C` is the context the resolver mutates, normally the engine itself.
/// Closures with the matching signature implement this trait.
pub trait Resolver<C: ?Sized>: Send + Sync {
    fn resolve(&self, ctx: &mut C, target: ElementId, value: &StateValue);
}

impl<C, F> Resolver<C> for F
where
    C: ?Sized,
    F: Fn(&mut C, ElementId, &StateValue) + Send + Sync,
{
    fn resolve(&self, ctx: &mut C, target: ElementId, value: &StateValue) {
        self(ctx, target, value)
    }
}

/// One registered binding.
pub struct BindEntry<C: ?Sized> {
    pub source_state: BoundState,
    pub target_state: BoundState,
    pub source_element: ElementId,
    pub target_element: ElementId,
    resolver: Arc<dyn Resolver<C>>,
}

impl<C: ?Sized> BindEntry<C> {
    fn same_link(
        &self,
        source_state: BoundState,
        target_state: BoundState,
        source_element: ElementId,
        target_element: ElementId,
    ) -> bool {
        self.source_state == source_state
            && self.target_state == target_state
            && self.source_element == source_element
            && self.target_element == target_element
    }
}

impl<C: ?Sized> fmt::Debug for BindEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindEntry")
            .field("source_state", &self.source_state)
            .field("target_state", &self.target_state)
            .field("source_element", &self.source_element)
            .field("target_element", &self.target_element)
            .finish_non_exhaustive()
    }
}

/// Result of registering a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    AlreadyPresent,
    TableFull,
}

/// Fixed-capacity, insertion-ordered table of bindings.
pub struct BindingTable<C: ?Sized> {
    entries: Vec<BindEntry<C>>,
    capacity: usize,
}

impl<C: ?Sized> BindingTable<C> {
    /// Table with the full [`MAX_BINDINGS`] capacity.
    pub fn new() -> Self {
        Self::with_capacity(MAX_BINDINGS)
    }

    /// Table holding at most `capacity` entries, never more than [`MAX_BINDINGS`].
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_BINDINGS);
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a binding unless the same link is already registered.
    ///
    /// A full table means the node was configured with more bindings than it
    /// can hold. Debug builds panic; release builds log and drop the entry.
    pub fn register<R>(
        &mut self,
        source_state: BoundState,
        target_state: BoundState,
        source_element: ElementId,
        target_element: ElementId,
        resolver: R,
    ) -> Registration
    where
        R: Resolver<C> + 'static,
    {
        if self
            .entries
            .iter()
            .any(|e| e.same_link(source_state, target_state, source_element, target_element))
        {
            return Registration::AlreadyPresent;
        }

        if self.entries.len() >= self.capacity {
            warn!(
                ?source_state,
                ?target_state,
                source_element,
                target_element,
                capacity = self.capacity,
                "binding table full, entry dropped"
            );
            debug_assert!(false, "binding table capacity {} exceeded", self.capacity);
            return Registration::TableFull;
        }

        debug!(
            ?source_state,
            ?target_state,
            source_element,
            target_element,
            "binding registered"
        );
        self.entries.push(BindEntry {
            source_state,
            target_state,
            source_element,
            target_element,
            resolver: Arc::new(resolver),
        });
        Registration::Added
    }

    /// Resolvers bound to `state` on `source_element`, in registration order.
    ///
    /// The resolvers are shared handles, so the caller may release its borrow
    /// of the table before running them against a context that owns it.
    pub fn matching(
        &self,
        source_element: ElementId,
        state: BoundState,
    ) -> Vec<(ElementId, Arc<dyn Resolver<C>>)> {
        self.entries
            .iter()
            .filter(|e| e.source_element == source_element && e.source_state == state)
            .map(|e| (e.target_element, Arc::clone(&e.resolver)))
            .collect()
    }

    /// Run every resolver bound to `state` on `source_element`.
    ///
    /// Returns the number of resolvers invoked.
    pub fn resolve(
        &self,
        ctx: &mut C,
        source_element: ElementId,
        state: BoundState,
        value: &StateValue,
    ) -> usize {
        let mut invoked = 0;
        for entry in self
            .entries
            .iter()
            .filter(|e| e.source_element == source_element && e.source_state == state)
        {
            entry.resolver.resolve(ctx, entry.target_element, value);
            invoked += 1;
        }
        invoked
    }

    pub fn entries(&self) -> &[BindEntry<C>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<C: ?Sized> Default for BindingTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> fmt::Debug for BindingTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingTable")
            .field("entries", &self.entries)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{OnOff, OnPowerUp};

    type Log = Vec<(&'static str, ElementId, StateValue)>;

    fn recorder(tag: &'static str) -> impl Fn(&mut Log, ElementId, &StateValue) + Send + Sync {
        move |log: &mut Log, target: ElementId, value: &StateValue| log.push((tag, target, *value))
    }

    #[test]
    fn duplicate_registration_is_a_no_op() {
        let mut table: BindingTable<Log> = BindingTable::new();
        let first = table.register(
            BoundState::GenOnPowerUp,
            BoundState::GenOnOff,
            0,
            0,
            recorder("a"),
        );
        let second = table.register(
            BoundState::GenOnPowerUp,
            BoundState::GenOnOff,
            0,
            0,
            recorder("b"),
        );

        assert_eq!(first, Registration::Added);
        assert_eq!(second, Registration::AlreadyPresent);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn fan_out_runs_in_registration_order() {
        let mut table: BindingTable<Log> = BindingTable::new();
        table.register(BoundState::GenOnOff, BoundState::GenLevel, 2, 3, recorder("first"));
        table.register(BoundState::GenOnOff, BoundState::GenLevel, 2, 1, recorder("second"));
        table.register(BoundState::GenLevel, BoundState::GenOnOff, 2, 4, recorder("other"));

        let mut log = Log::new();
        let value = StateValue::OnOff(OnOff::On);
        let invoked = table.resolve(&mut log, 2, BoundState::GenOnOff, &value);

        assert_eq!(invoked, 2);
        assert_eq!(log, vec![("first", 3, value), ("second", 1, value)]);
    }

    #[test]
    fn resolve_without_match_does_nothing() {
        let mut table: BindingTable<Log> = BindingTable::new();
        table.register(BoundState::GenOnPowerUp, BoundState::GenOnOff, 0, 0, recorder("a"));

        let mut log = Log::new();
        let value = StateValue::OnPowerUp(OnPowerUp::Default);
        assert_eq!(table.resolve(&mut log, 1, BoundState::GenOnPowerUp, &value), 0);
        assert!(log.is_empty());
    }

    #[test]
    fn capacity_is_capped_at_maximum() {
        let table: BindingTable<Log> = BindingTable::with_capacity(100);
        assert_eq!(table.capacity(), MAX_BINDINGS);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn full_table_drops_new_entries() {
        let mut table: BindingTable<Log> = BindingTable::with_capacity(1);
        table.register(BoundState::GenOnOff, BoundState::GenLevel, 0, 1, recorder("a"));
        let result = table.register(BoundState::GenOnOff, BoundState::GenLevel, 0, 2, recorder("b"));
        assert_eq!(result, Registration::TableFull);
        assert_eq!(table.len(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "binding table capacity")]
    fn full_table_panics_in_debug_builds() {
        let mut table: BindingTable<Log> = BindingTable::with_capacity(1);
        table.register(BoundState::GenOnOff, BoundState::GenLevel, 0, 1, recorder("a"));
        table.register(BoundState::GenOnOff, BoundState::GenLevel, 0, 2, recorder("b"));
    }
}
