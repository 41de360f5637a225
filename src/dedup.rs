//! Transaction de-duplication.
//!
//! Clients retransmit unacknowledged Sets with the same transaction id. A
//! model instance remembers the last `(source, tid)` pair it accepted and
//! drops a repeat of it until the remembered pair expires.

use crate::core::{MeshAddress, UNASSIGNED_ADDRESS};
use crate::timer::{TimerId, TimerQueue};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Default lifetime of a remembered transaction.
pub const TRANSACTION_TIMEOUT_MS: u32 = 6_000;

/// Outcome of checking a message against the remembered transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
}

/// Last accepted transaction of a model instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    last_source: MeshAddress,
    last_tid: u8,
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionFilter {
    pub const fn new() -> Self {
        Self {
            last_source: UNASSIGNED_ADDRESS,
            last_tid: 0,
        }
    }

    /// Whether `(source, tid)` is the remembered transaction.
    pub fn matches(&self, source: MeshAddress, tid: u8) -> bool {
        self.last_source != UNASSIGNED_ADDRESS && self.last_source == source && self.last_tid == tid
    }

    /// Reject a repeat of the remembered transaction; otherwise remember the
    /// new pair and restart its expiry timer.
    pub fn check(
        &mut self,
        source: MeshAddress,
        tid: u8,
        timers: &mut dyn TimerQueue,
        timer: TimerId,
        timeout_ms: u32,
    ) -> Verdict {
        if self.matches(source, tid) {
            trace!(source, tid, "repeated transaction rejected");
            return Verdict::Reject;
        }
        self.remember(source, tid, timers, timer, timeout_ms);
        Verdict::Accept
    }

    /// Remember `(source, tid)` and restart the expiry timer unconditionally.
    pub fn remember(
        &mut self,
        source: MeshAddress,
        tid: u8,
        timers: &mut dyn TimerQueue,
        timer: TimerId,
        timeout_ms: u32,
    ) {
        self.last_source = source;
        self.last_tid = tid;
        timers.arm(timer, timeout_ms);
    }

    /// Forget the remembered transaction.
    pub fn expire(&mut self) {
        self.last_source = UNASSIGNED_ADDRESS;
    }

    pub fn last_source(&self) -> MeshAddress {
        self.last_source
    }

    pub fn last_tid(&self) -> u8 {
        self.last_tid
    }
}
