//! Transition controller.
//!
//! Each transitional model instance runs a small state machine:
//!
//! ```text
//!             delay > 0                   delay elapsed
//!   Idle ───────────────────▶ Delayed ───────────────────┐
//!    ▲                                                    ▼
//!    │      transition timer                        transition > 0
//!    └───────────────────────── Transitioning ◀──────────┘
//! ```
//!
//! A request with neither delay nor transition time settles synchronously.
//! One timer per instance serves both the delay and the transition, so
//! re-arming it for a new request always supersedes the previous one.
//!
//! Binary states that apply the immediate edge (OnOff turning on) change
//! present state at the start of the transition. Numeric states whose
//! transition spans several step intervals move through linear interim
//! values, publishing each one.

use crate::core::{ElementId, ModelKind, ModelState, StateChange, StateValue, UpdateSource};
use crate::descriptor::{Motion, Stepping};
use crate::engine::Engine;
use crate::events::{EventStatus, ModelEvent, Phase};
use crate::snapshot::DescriptorSnapshot;
use crate::timer::TimerId;
use crate::timing::delay_units_to_millis;
use tracing::{debug, trace, warn};

impl Engine {
    /// Request a change of a model instance's state.
    ///
    /// `delay_units` are 5 ms units. Non-transitional models (Power OnOff,
    /// Default Transition Time) ignore timing and change immediately.
    /// Failures are reported through the event callback and leave the
    /// descriptor untouched.
    pub fn set_target(
        &mut self,
        element: ElementId,
        model: ModelKind,
        target: StateValue,
        transition_ms: u32,
        delay_units: u8,
        source: UpdateSource,
    ) -> EventStatus {
        let status = self.begin(element, model, target, transition_ms, delay_units, source, None);
        if !status.is_success() {
            debug!(element, %model, ?status, ?target, "state change refused");
            self.emit(ModelEvent::StateUpdate {
                status,
                element,
                model,
                source,
                value: target,
                target: None,
                phase: Phase::Idle,
            });
        }
        status
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn begin(
        &mut self,
        element: ElementId,
        model: ModelKind,
        target: StateValue,
        transition_ms: u32,
        delay_units: u8,
        source: UpdateSource,
        motion: Option<Motion>,
    ) -> EventStatus {
        let step_interval = self.config.step_interval_ms;
        let Some(descriptor) = self.descriptor_mut(element, model) else {
            return EventStatus::InvalidElement;
        };
        if target.model_kind() != model || !target.is_legal() {
            return EventStatus::InvalidParam;
        }
        let target = match target {
            StateValue::Lightness(lightness) => descriptor.lightness.clamp(lightness).into(),
            other => other,
        };

        let (transition_ms, delay_units) = if model.is_transitional() {
            (transition_ms, delay_units)
        } else {
            (0, 0)
        };

        descriptor.motion = motion;
        descriptor.stepping = match motion {
            Some(_) => Stepping::NONE,
            None => Stepping::plan(&descriptor.present, &target, transition_ms, step_interval),
        };
        descriptor.edge_resolved = false;

        debug!(
            element,
            %model,
            ?target,
            transition_ms,
            delay_units,
            ?source,
            "state change requested"
        );
        self.program(element, model, target, transition_ms, delay_units, source);
        EventStatus::Success
    }

    /// Store the request and arm the timer for whichever phase comes next.
    fn program(
        &mut self,
        element: ElementId,
        model: ModelKind,
        target: StateValue,
        transition_ms: u32,
        delay_units: u8,
        source: UpdateSource,
    ) {
        let timer = TimerId::transition(element, model);
        let step_interval = self.config.step_interval_ms;
        let Some(descriptor) = self.descriptor_mut(element, model) else {
            return;
        };
        descriptor.remaining_ms = transition_ms;
        descriptor.delay_units = delay_units;
        descriptor.update_source = source;
        descriptor.target = target;
        let stepped = descriptor.stepping.steps > 0;

        if delay_units > 0 {
            self.timers.arm(timer, delay_units_to_millis(delay_units));
            self.emit_update(element, model);
        } else if transition_ms > 0 {
            let first_ms = if stepped { step_interval } else { transition_ms };
            self.timers.arm(timer, first_ms);
            if target.applies_immediate_edge() {
                self.apply_present(element, model, target, source);
                if source.triggers_bindings() {
                    self.resolve_bindings(element, model, target);
                    if let Some(descriptor) = self.descriptor_mut(element, model) {
                        descriptor.edge_resolved = true;
                    }
                }
            }
            self.emit_update(element, model);
        } else {
            self.timers.cancel(timer);
            self.settle(element, model, target, source);
        }
    }

    /// Finish a change: present becomes target and the instance goes idle.
    fn settle(
        &mut self,
        element: ElementId,
        model: ModelKind,
        target: StateValue,
        source: UpdateSource,
    ) {
        let Some(descriptor) = self.descriptor_mut(element, model) else {
            return;
        };
        descriptor.remaining_ms = 0;
        descriptor.delay_units = 0;
        descriptor.stepping = Stepping::NONE;
        descriptor.motion = None;
        descriptor.target = target;
        let already_resolved = std::mem::take(&mut descriptor.edge_resolved);

        self.apply_present(element, model, target, source);
        if source.triggers_bindings() && !already_resolved {
            self.resolve_bindings(element, model, target);
        }
        self.publish_status(element, model);
        self.persist(element, model);
        self.emit_update(element, model);
    }

    /// Stop a running change where it is.
    pub(crate) fn halt(&mut self, element: ElementId, model: ModelKind) {
        self.timers.cancel(TimerId::transition(element, model));
        let Some(descriptor) = self.descriptor_mut(element, model) else {
            return;
        };
        if descriptor.is_idle() {
            descriptor.motion = None;
            return;
        }
        let (present, source) = (descriptor.present, descriptor.update_source);
        descriptor.edge_resolved = true;
        self.settle(element, model, present, source);
    }

    pub(crate) fn on_transition_timer(&mut self, element: ElementId, model: ModelKind) {
        let Some(descriptor) = self.descriptor_mut(element, model) else {
            return;
        };
        let target = descriptor.target;
        let remaining = descriptor.remaining_ms;
        let source = descriptor.update_source;
        let motion = descriptor.motion;
        let stepped = descriptor.stepping.steps > 0;

        if descriptor.delay_units > 0 {
            descriptor.delay_units = 0;
            let ack = descriptor.pending_ack.take();
            trace!(element, %model, remaining_ms = remaining, "delay elapsed");
            self.program(element, model, target, remaining, 0, source);
            if let Some(ack) = ack {
                self.send_status(element, model, ack.dst, ack.app_key_index, ack.unicast);
            }
        } else if remaining > 0 {
            match motion {
                Some(motion) => self.move_step(element, model, motion),
                None if stepped => self.interim_step(element, model),
                None => self.settle(element, model, target, source),
            }
        }
    }

    fn interim_step(&mut self, element: ElementId, model: ModelKind) {
        let interval = self.config.step_interval_ms;
        let Some(descriptor) = self.descriptor_mut(element, model) else {
            return;
        };
        descriptor.stepping.steps -= 1;
        if descriptor.stepping.steps == 1 {
            // The final segment runs to the target in one go.
            descriptor.stepping.steps = 0;
        }
        let remaining = descriptor.remaining_ms.saturating_sub(interval);
        let (target, source) = (descriptor.target, descriptor.update_source);
        let interim = descriptor.present.with_linear_value(
            descriptor
                .present
                .linear_value()
                .unwrap_or_default()
                .saturating_add(descriptor.stepping.increment),
        );

        self.apply_present(element, model, interim, source);
        if source.triggers_bindings() {
            self.resolve_bindings(element, model, interim);
        }
        if remaining == 0 {
            self.settle(element, model, target, source);
        } else {
            self.program(element, model, target, remaining, 0, source);
            self.publish_status(element, model);
        }
    }

    fn move_step(&mut self, element: ElementId, model: ModelKind, motion: Motion) {
        let Some(descriptor) = self.descriptor_mut(element, model) else {
            return;
        };
        let (target, source) = (descriptor.target, descriptor.update_source);
        let next = descriptor.present.with_linear_value(
            descriptor
                .present
                .linear_value()
                .unwrap_or_default()
                .saturating_add(motion.step),
        );

        if next == target {
            self.settle(element, model, target, source);
            return;
        }

        self.apply_present(element, model, next, source);
        if source.triggers_bindings() {
            self.resolve_bindings(element, model, next);
        }
        self.program(element, model, target, motion.interval_ms, 0, source);
        self.publish_status(element, model);
    }

    /// Write present state, keeping history and lightness memory current.
    fn apply_present(
        &mut self,
        element: ElementId,
        model: ModelKind,
        value: StateValue,
        source: UpdateSource,
    ) {
        let now_ms = self.timers.now_ms();
        let Some(descriptor) = self.descriptor_mut(element, model) else {
            return;
        };
        let change = StateChange {
            from: descriptor.present,
            to: value,
            at_ms: now_ms,
            source,
        };
        descriptor.present = value;
        if let StateValue::Lightness(lightness) = value {
            if lightness.0 != 0 {
                descriptor.lightness.last = lightness;
            }
        }
        if change.is_change() {
            trace!(element, %model, from = ?change.from, to = ?change.to, ?source, "present state changed");
            descriptor.history = descriptor.history.record(change);
        }
    }

    /// Run the resolvers bound to `model`'s state on `element`.
    pub(crate) fn resolve_bindings(
        &mut self,
        element: ElementId,
        model: ModelKind,
        value: StateValue,
    ) {
        let Some(state) = model.bound_state() else {
            return;
        };
        let targets = self.bindings.matching(element, state);
        if targets.is_empty() {
            return;
        }
        if self.bind_depth >= self.config.max_bind_depth {
            warn!(
                element,
                %model,
                depth = self.bind_depth,
                "binding resolution nested too deep, skipped"
            );
            return;
        }

        self.bind_depth += 1;
        for (target_element, resolver) in targets {
            trace!(element, %model, target_element, ?value, "resolving binding");
            resolver.resolve(self, target_element, &value);
        }
        self.bind_depth -= 1;
    }

    pub(crate) fn persist(&self, element: ElementId, model: ModelKind) {
        if let Some(descriptor) = self.descriptor(element, model) {
            if let Some(hook) = &descriptor.persist {
                hook(&DescriptorSnapshot::capture(descriptor));
            }
        }
    }

    fn emit_update(&self, element: ElementId, model: ModelKind) {
        let Some(descriptor) = self.descriptor(element, model) else {
            return;
        };
        let phase = descriptor.phase();
        self.emit(ModelEvent::StateUpdate {
            status: EventStatus::Success,
            element,
            model,
            source: descriptor.update_source,
            value: descriptor.present,
            target: (phase != Phase::Idle).then_some(descriptor.target),
            phase,
        });
    }
}
