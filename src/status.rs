//! Status reports and their delivery.
//!
//! A status carries the present state and, while a change is in progress,
//! the target and the time left. The time left is read from the live timer
//! so two reads during one transition never increase.

use crate::core::{ElementId, MeshAddress, ModelKind, ModelState, StateValue};
use crate::engine::Engine;
use crate::timer::TimerId;
use crate::timing::TransitionTime;
use crate::transport::{
    PublishInfo, SendInfo, DEFAULT_TTL, RESPONSE_MAX_DELAY_GROUP_MS,
    RESPONSE_MAX_DELAY_UNICAST_MS, RESPONSE_MIN_DELAY_MS,
};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Snapshot of a model instance as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub present: StateValue,
    pub target: Option<StateValue>,
    pub remaining: Option<TransitionTime>,
}

impl StatusReport {
    /// Present only, for a settled state.
    pub fn settled(present: StateValue) -> Self {
        Self {
            present,
            target: None,
            remaining: None,
        }
    }

    /// Wire form: present, then target and remaining time when in progress.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5);
        self.present.encode(&mut out);
        if let (Some(target), Some(remaining)) = (self.target, self.remaining) {
            target.encode(&mut out);
            out.push(remaining.raw());
        }
        out
    }
}

impl Engine {
    /// Current status of a model instance.
    pub fn build_status(&self, element: ElementId, model: ModelKind) -> Option<StatusReport> {
        let descriptor = self.descriptor(element, model)?;
        if descriptor.remaining_ms == 0 && descriptor.delay_units == 0 {
            return Some(StatusReport::settled(descriptor.present));
        }

        let remaining = if descriptor.motion.is_some() {
            TransitionTime::UNKNOWN
        } else if descriptor.delay_units > 0 {
            TransitionTime::from_millis(descriptor.remaining_ms)
        } else {
            let left = self
                .timers
                .remaining_ms(TimerId::transition(element, model))
                .unwrap_or(descriptor.remaining_ms);
            // Segments after the running one; the last may be longer than a step.
            let queued = if descriptor.stepping.steps > 0 {
                descriptor
                    .remaining_ms
                    .saturating_sub(self.config.step_interval_ms)
            } else {
                0
            };
            TransitionTime::from_millis(left.saturating_add(queued))
        };

        Some(StatusReport {
            present: descriptor.present,
            target: Some(descriptor.target),
            remaining: Some(remaining),
        })
    }

    /// Reply with the status of a model instance.
    pub fn send_status(
        &mut self,
        element: ElementId,
        model: ModelKind,
        dst: MeshAddress,
        app_key_index: u16,
        unicast: bool,
    ) {
        let Some(report) = self.build_status(element, model) else {
            return;
        };
        trace!(element, %model, dst, ?report, "status reply");
        self.transport.send(SendInfo {
            element,
            model,
            dst,
            app_key_index,
            ttl: DEFAULT_TTL,
            payload: report.encode(),
            min_delay_ms: RESPONSE_MIN_DELAY_MS,
            max_delay_ms: if unicast {
                RESPONSE_MAX_DELAY_UNICAST_MS
            } else {
                RESPONSE_MAX_DELAY_GROUP_MS
            },
        });
    }

    /// Publish the status of a model instance.
    pub fn publish_status(&mut self, element: ElementId, model: ModelKind) {
        let Some(report) = self.build_status(element, model) else {
            return;
        };
        trace!(element, %model, ?report, "status published");
        self.transport.publish(PublishInfo {
            element,
            model,
            payload: report.encode(),
        });
    }
}
