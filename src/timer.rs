//! One-shot timers driven by the engine's event loop.
//!
//! Timers never preempt. An expired timer is handed back by
//! [`TimerQueue::pop_due`] and the engine processes it like any other event,
//! in deadline order. Arming a timer that is already armed replaces it, so a
//! stale deadline can never fire.
//!
//! [`VirtualTimers`] keeps time purely in memory: tests and simulations move
//! the clock forward explicitly instead of waiting on the wall clock.
//!
//! ```rust
//! use meshstate::core::ModelKind;
//! use meshstate::timer::{TimerId, TimerPurpose, TimerQueue, VirtualTimers};
//!
//! let mut timers = VirtualTimers::new();
//! let id = TimerId::new(0, ModelKind::GenOnOff, TimerPurpose::Transition);
//!
//! timers.arm(id, 100);
//! assert_eq!(timers.pop_due(50), None);
//! assert_eq!(timers.pop_due(100), Some(id));
//! assert_eq!(timers.now_ms(), 100);
//! ```

use crate::core::{ElementId, ModelKind};
use std::collections::HashMap;

/// What a model instance uses a timer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerPurpose {
    /// Delay and transition progress
    Transition,
    /// Expiry of the remembered transaction
    Transaction,
}

/// Identity of a timer: one per purpose per model instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId {
    pub element: ElementId,
    pub model: ModelKind,
    pub purpose: TimerPurpose,
}

impl TimerId {
    pub const fn new(element: ElementId, model: ModelKind, purpose: TimerPurpose) -> Self {
        Self {
            element,
            model,
            purpose,
        }
    }

    pub const fn transition(element: ElementId, model: ModelKind) -> Self {
        Self::new(element, model, TimerPurpose::Transition)
    }

    pub const fn transaction(element: ElementId, model: ModelKind) -> Self {
        Self::new(element, model, TimerPurpose::Transaction)
    }
}

/// Source of time and one-shot timers for the engine.
pub trait TimerQueue: Send {
    /// Current engine time in milliseconds.
    fn now_ms(&self) -> u64;

    /// Arm `id` to fire `after_ms` from now, replacing any armed deadline.
    fn arm(&mut self, id: TimerId, after_ms: u32);

    /// Disarm `id`. Returns whether it was armed.
    fn cancel(&mut self, id: TimerId) -> bool;

    /// Milliseconds left before `id` fires, `None` when not armed.
    fn remaining_ms(&self, id: TimerId) -> Option<u32>;

    fn is_armed(&self, id: TimerId) -> bool {
        self.remaining_ms(id).is_some()
    }

    /// Remove and return the earliest timer due at or before `until_ms`,
    /// moving the clock to its deadline.
    fn pop_due(&mut self, until_ms: u64) -> Option<TimerId>;

    /// Move the clock to `now_ms`. The clock never moves backwards.
    fn settle(&mut self, now_ms: u64);

    /// Number of armed timers.
    fn armed_count(&self) -> usize;
}

/// In-memory timer queue with a manually advanced clock.
#[derive(Debug, Default)]
pub struct VirtualTimers {
    now_ms: u64,
    sequence: u64,
    armed: HashMap<TimerId, (u64, u64)>,
}

impl VirtualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue whose clock starts at `now_ms`.
    pub fn starting_at(now_ms: u64) -> Self {
        Self {
            now_ms,
            ..Self::default()
        }
    }

    /// Deadline of the next timer to fire.
    pub fn next_deadline(&self) -> Option<u64> {
        self.armed.values().map(|(deadline, _)| *deadline).min()
    }
}

impl TimerQueue for VirtualTimers {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn arm(&mut self, id: TimerId, after_ms: u32) {
        self.sequence += 1;
        let deadline = self.now_ms + u64::from(after_ms);
        self.armed.insert(id, (deadline, self.sequence));
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        self.armed.remove(&id).is_some()
    }

    fn remaining_ms(&self, id: TimerId) -> Option<u32> {
        self.armed.get(&id).map(|(deadline, _)| {
            let left = deadline.saturating_sub(self.now_ms);
            u32::try_from(left).unwrap_or(u32::MAX)
        })
    }

    fn pop_due(&mut self, until_ms: u64) -> Option<TimerId> {
        let (id, deadline) = self
            .armed
            .iter()
            .filter(|(_, (deadline, _))| *deadline <= until_ms)
            .min_by_key(|(_, (deadline, sequence))| (*deadline, *sequence))
            .map(|(id, (deadline, _))| (*id, *deadline))?;

        self.armed.remove(&id);
        self.now_ms = self.now_ms.max(deadline);
        Some(id)
    }

    fn settle(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    fn armed_count(&self) -> usize {
        self.armed.len()
    }
}
