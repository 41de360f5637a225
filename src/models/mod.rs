//! Model front-ends.
//!
//! A front-end turns an inbound request into a call on the transition
//! controller. It validates the parameters, applies the default transition
//! time when the request carries none, filters repeated transactions and
//! decides whether and when to answer.
//!
//! Requests that fail validation are dropped without an event; the returned
//! [`MessageOutcome`] says why.

mod default_transition;
mod level;
mod lightness;
mod onoff;
pub mod params;
mod power_onoff;

pub use level::MoveParams;
pub use lightness::{
    level_to_lightness, lightness_to_level, lightness_to_onoff, on_power_up_to_lightness,
    onoff_to_lightness,
};
pub use power_onoff::on_power_up_to_onoff;
pub use params::ParamViolation;

use crate::core::{ElementId, MeshAddress, ModelKind, StateValue, UpdateSource};
use crate::dedup::Verdict;
use crate::descriptor::PendingAck;
use crate::engine::Engine;
use crate::events::{EventStatus, ModelEvent};
use crate::timer::TimerId;
use params::{Timing, TransactionalSet};
use tracing::{debug, trace};

/// Addressing of an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageContext {
    /// Element the request is addressed to
    pub element: ElementId,
    /// Source address of the client
    pub src: MeshAddress,
    pub app_key_index: u16,
    /// Whether the request was sent to a unicast address
    pub unicast: bool,
}

impl MessageContext {
    pub fn new(element: ElementId, src: MeshAddress) -> Self {
        Self {
            element,
            src,
            app_key_index: 0,
            unicast: true,
        }
    }

    pub fn app_key_index(mut self, index: u16) -> Self {
        self.app_key_index = index;
        self
    }

    pub fn group(mut self) -> Self {
        self.unicast = false;
        self
    }
}

/// Inbound request for a server model.
///
/// Parameters are the little-endian request fields without the opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelMessage {
    Get { model: ModelKind },
    Set { model: ModelKind, params: Vec<u8>, ack: bool },
    LevelDeltaSet { params: Vec<u8>, ack: bool },
    LevelMoveSet { params: Vec<u8>, ack: bool },
}

impl ModelMessage {
    pub fn model(&self) -> ModelKind {
        match self {
            Self::Get { model } | Self::Set { model, .. } => *model,
            Self::LevelDeltaSet { .. } | Self::LevelMoveSet { .. } => ModelKind::GenLevel,
        }
    }
}

/// What became of an inbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    /// The request was applied or answered.
    Accepted,
    /// Repeat of the remembered transaction; ignored.
    Duplicate,
    /// Malformed or prohibited parameters; ignored.
    Dropped(Vec<ParamViolation>),
    /// The element does not host the model.
    NoSuchModel,
}

impl Engine {
    /// Process an inbound request to completion.
    pub fn handle_message(&mut self, ctx: MessageContext, message: ModelMessage) -> MessageOutcome {
        let model = message.model();
        if self.descriptor(ctx.element, model).is_none() {
            trace!(element = ctx.element, %model, "request for a model the element does not host");
            return MessageOutcome::NoSuchModel;
        }

        let outcome = match message {
            ModelMessage::Get { model } => {
                self.send_status(ctx.element, model, ctx.src, ctx.app_key_index, ctx.unicast);
                MessageOutcome::Accepted
            }
            ModelMessage::Set { model, params, ack } => match model {
                ModelKind::GenOnOff => self.handle_onoff_set(ctx, &params, ack),
                ModelKind::GenLevel => self.handle_level_set(ctx, &params, ack),
                ModelKind::LightLightness => self.handle_lightness_set(ctx, &params, ack),
                ModelKind::GenPowerOnOff => self.handle_on_power_up_set(ctx, &params, ack),
                ModelKind::GenDefaultTransition => {
                    self.handle_default_transition_set(ctx, &params, ack)
                }
            },
            ModelMessage::LevelDeltaSet { params, ack } => {
                self.handle_level_delta_set(ctx, &params, ack)
            }
            ModelMessage::LevelMoveSet { params, ack } => self.handle_level_move_set(ctx, &params, ack),
        };

        if let MessageOutcome::Dropped(violations) = &outcome {
            debug!(element = ctx.element, %model, src = ctx.src, ?violations, "request dropped");
        }
        outcome
    }

    /// Default transition time of `element` in milliseconds, 0 when it has none.
    pub fn default_transition_ms(&self, element: ElementId) -> u32 {
        match self.present(element, ModelKind::GenDefaultTransition) {
            Some(StateValue::DefaultTransition(time)) => time.as_millis().unwrap_or(0),
            _ => 0,
        }
    }

    /// Transition time and delay of a request, falling back to the default.
    fn request_timing(&self, element: ElementId, timing: Option<Timing>) -> (u32, u8) {
        match timing {
            Some(timing) => (
                timing.transition.as_millis().unwrap_or(0),
                timing.delay_units,
            ),
            None => (self.default_transition_ms(element), 0),
        }
    }

    /// Apply the de-duplication filter and remember where to answer.
    fn accept_transaction(
        &mut self,
        ctx: MessageContext,
        model: ModelKind,
        tid: u8,
        ack: bool,
    ) -> bool {
        let timeout = self.config.dedup_timeout_ms;
        let Some(descriptor) = self
            .elements
            .get_mut(usize::from(ctx.element))
            .and_then(|e| e.models.get_mut(&model))
        else {
            return false;
        };

        let verdict = descriptor.filter.check(
            ctx.src,
            tid,
            self.timers.as_mut(),
            TimerId::transaction(ctx.element, model),
            timeout,
        );
        if verdict == Verdict::Reject {
            return false;
        }
        descriptor.pending_ack = ack.then_some(PendingAck {
            dst: ctx.src,
            app_key_index: ctx.app_key_index,
            unicast: ctx.unicast,
        });
        true
    }

    /// Answer now unless the change is delayed, in which case the answer
    /// goes out when the delay elapses.
    fn reply_unless_delayed(&mut self, ctx: MessageContext, model: ModelKind) {
        let Some(descriptor) = self.descriptor_mut(ctx.element, model) else {
            return;
        };
        if descriptor.delay_units > 0 {
            return;
        }
        if let Some(ack) = descriptor.pending_ack.take() {
            self.send_status(ctx.element, model, ack.dst, ack.app_key_index, ack.unicast);
        }
    }

    /// Shared flow of the OnOff, Level and Lightness Sets.
    fn process_set(
        &mut self,
        ctx: MessageContext,
        model: ModelKind,
        set: TransactionalSet<StateValue>,
        ack: bool,
    ) -> MessageOutcome {
        let (transition_ms, delay_units) = self.request_timing(ctx.element, set.timing);
        if !self.accept_transaction(ctx, model, set.tid, ack) {
            return MessageOutcome::Duplicate;
        }

        self.begin(
            ctx.element,
            model,
            set.value,
            transition_ms,
            delay_units,
            UpdateSource::Client,
            None,
        );
        self.reply_unless_delayed(ctx, model);
        MessageOutcome::Accepted
    }

    /// Write a non-transitional state from a client request.
    ///
    /// The value is stored and persisted; bound states only follow it on
    /// power-up.
    fn store_state(&mut self, ctx: MessageContext, value: StateValue, ack: bool) -> MessageOutcome {
        let model = value.model_kind();
        let now_ms = self.timers.now_ms();
        let Some(descriptor) = self.descriptor_mut(ctx.element, model) else {
            return MessageOutcome::NoSuchModel;
        };
        let change = crate::core::StateChange {
            from: descriptor.present,
            to: value,
            at_ms: now_ms,
            source: UpdateSource::Client,
        };
        descriptor.present = value;
        descriptor.target = value;
        descriptor.update_source = UpdateSource::Client;
        if change.is_change() {
            descriptor.history = descriptor.history.record(change);
        }

        self.persist(ctx.element, model);
        self.emit(ModelEvent::StateUpdate {
            status: EventStatus::Success,
            element: ctx.element,
            model,
            source: UpdateSource::Client,
            value,
            target: None,
            phase: crate::events::Phase::Idle,
        });
        if ack {
            self.send_status(ctx.element, model, ctx.src, ctx.app_key_index, ctx.unicast);
        }
        MessageOutcome::Accepted
    }

    /// Change a state on behalf of the local application.
    pub fn set_state(
        &mut self,
        element: ElementId,
        value: StateValue,
        transition_ms: u32,
        delay_units: u8,
    ) -> EventStatus {
        self.set_target(
            element,
            value.model_kind(),
            value,
            transition_ms,
            delay_units,
            UpdateSource::Application,
        )
    }

    /// Report the present state through a `CurrentState` event.
    pub fn get_state(&self, element: ElementId, model: ModelKind) -> Option<StateValue> {
        let value = self.present(element, model);
        self.emit(ModelEvent::CurrentState {
            status: if value.is_some() {
                EventStatus::Success
            } else {
                EventStatus::InvalidElement
            },
            element,
            model,
            value,
        });
        value
    }

    /// Apply a state computed by a binding resolver.
    ///
    /// The change is immediate and never triggers further bindings.
    pub fn set_bound_state(&mut self, element: ElementId, value: StateValue) -> EventStatus {
        self.set_target(
            element,
            value.model_kind(),
            value,
            0,
            0,
            UpdateSource::Binding,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Level, OnOff};
    use crate::engine::ElementBuilder;
    use crate::events::Phase;
    use crate::timing::TransitionTime;
    use crate::transport::RecordingTransport;
    use std::sync::{Arc, Mutex};

    fn engine() -> (Engine, RecordingTransport) {
        let transport = RecordingTransport::new();
        let engine = Engine::builder()
            .element(
                ElementBuilder::new()
                    .model(ModelKind::GenOnOff)
                    .model(ModelKind::GenDefaultTransition),
            )
            .transport(transport.clone())
            .build()
            .unwrap();
        (engine, transport)
    }

    fn onoff_set(params: &[u8], ack: bool) -> ModelMessage {
        ModelMessage::Set {
            model: ModelKind::GenOnOff,
            params: params.to_vec(),
            ack,
        }
    }

    #[test]
    fn get_replies_with_status() {
        let (mut engine, transport) = engine();
        let outcome = engine.handle_message(
            MessageContext::new(0, 0x0042),
            ModelMessage::Get {
                model: ModelKind::GenOnOff,
            },
        );

        assert_eq!(outcome, MessageOutcome::Accepted);
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].dst, 0x0042);
        assert_eq!(sent[0].payload, vec![0x00]);
    }

    #[test]
    fn request_for_missing_model_is_ignored() {
        let (mut engine, transport) = engine();
        let outcome = engine.handle_message(
            MessageContext::new(0, 0x0042),
            ModelMessage::Get {
                model: ModelKind::GenLevel,
            },
        );
        assert_eq!(outcome, MessageOutcome::NoSuchModel);
        assert!(transport.is_empty());
    }

    #[test]
    fn unacknowledged_set_sends_no_reply() {
        let (mut engine, transport) = engine();
        engine.handle_message(MessageContext::new(0, 0x0042), onoff_set(&[0x01, 0x01], false));

        assert!(transport.sent().is_empty());
        assert_eq!(engine.present(0, ModelKind::GenOnOff), Some(OnOff::On.into()));
    }

    #[test]
    fn delayed_set_replies_when_delay_elapses() {
        let (mut engine, transport) = engine();
        engine.handle_message(
            MessageContext::new(0, 0x0042),
            onoff_set(&[0x01, 0x01, 0x00, 0x0A], true),
        );
        assert!(transport.sent().is_empty());

        engine.advance(50);
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, vec![0x01]);
    }

    #[test]
    fn missing_timing_uses_default_transition_time() {
        let (mut engine, _) = engine();
        engine.set_state(0, TransitionTime::from_raw(0x03).into(), 0, 0);

        engine.handle_message(MessageContext::new(0, 0x0042), onoff_set(&[0x00, 0x09], false));
        engine.handle_message(MessageContext::new(0, 0x0042), onoff_set(&[0x01, 0x0A], false));

        let descriptor = engine.descriptor(0, ModelKind::GenOnOff).unwrap();
        assert_eq!(descriptor.phase(), Phase::Transitioning);
        assert_eq!(descriptor.remaining_ms(), 300);
        assert_eq!(engine.default_transition_ms(0), 300);
    }

    #[test]
    fn get_state_raises_current_state_event() {
        let (mut engine, _) = engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        engine.register_callback(ModelKind::GenOnOff, move |e| sink.lock().unwrap().push(e.clone()));

        assert_eq!(engine.get_state(0, ModelKind::GenOnOff), Some(OnOff::Off.into()));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![ModelEvent::CurrentState {
                status: EventStatus::Success,
                element: 0,
                model: ModelKind::GenOnOff,
                value: Some(OnOff::Off.into()),
            }]
        );
    }

    #[test]
    fn set_state_rejects_values_of_missing_models() {
        let (mut engine, _) = engine();
        assert_eq!(
            engine.set_state(0, Level(4).into(), 0, 0),
            EventStatus::InvalidElement
        );
    }

    #[test]
    fn bound_state_updates_are_tagged_as_binding() {
        let (mut engine, _) = engine();
        engine.set_bound_state(0, OnOff::On.into());
        assert_eq!(
            engine.descriptor(0, ModelKind::GenOnOff).map(|d| d.update_source()),
            Some(UpdateSource::Binding)
        );
    }
}
