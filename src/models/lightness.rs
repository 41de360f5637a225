//! Light Lightness server and the resolvers tying it to the generic states.
//!
//! Lightness maps onto Level by a fixed offset (`level = lightness - 32768`),
//! and onto OnOff by "non-zero is on". Switching on through OnOff selects the
//! default lightness, or the last non-zero one when no default is set.
//!
//! Non-zero actual values never leave the configured range, whichever path
//! they arrive by.

use super::params;
use super::{MessageContext, MessageOutcome};
use crate::bindings::Registration;
use crate::core::{
    BoundState, ElementId, Lightness, ModelKind, OnOff, OnPowerUp, StateValue, UpdateSource,
};
use crate::descriptor::LightnessMemory;
use crate::engine::Engine;
use crate::events::{EventStatus, ModelEvent};
use tracing::debug;

impl Engine {
    pub(super) fn handle_lightness_set(
        &mut self,
        ctx: MessageContext,
        params: &[u8],
        ack: bool,
    ) -> MessageOutcome {
        match params::transactional(params, 2, |raw| {
            Ok(Lightness(u16::from_le_bytes([raw[0], raw[1]])))
        }) {
            Ok(set) => self.process_set(
                ctx,
                ModelKind::LightLightness,
                params::TransactionalSet {
                    value: StateValue::Lightness(set.value),
                    tid: set.tid,
                    timing: set.timing,
                },
                ack,
            ),
            Err(violations) => MessageOutcome::Dropped(violations),
        }
    }

    /// Present Lightness Actual state of `element`.
    pub fn lightness(&self, element: ElementId) -> Option<Lightness> {
        match self.present(element, ModelKind::LightLightness)? {
            StateValue::Lightness(lightness) => Some(lightness),
            _ => None,
        }
    }

    /// Light Lightness Linear state of `element`, derived from Actual.
    pub fn lightness_linear(&self, element: ElementId) -> Option<u16> {
        self.lightness(element).map(Lightness::linear)
    }

    /// Set the lightness used when the light is switched on. Zero means
    /// "use the last non-zero value".
    pub fn set_lightness_default(&mut self, element: ElementId, default: Lightness) -> EventStatus {
        let Some(descriptor) = self.descriptor_mut(element, ModelKind::LightLightness) else {
            return self.lightness_setting_changed(element, EventStatus::InvalidElement);
        };
        descriptor.lightness.default = default;
        debug!(element, default = default.0, "lightness default changed");
        self.persist(element, ModelKind::LightLightness);
        self.lightness_setting_changed(element, EventStatus::Success)
    }

    /// Restrict non-zero lightness to `min..=max`.
    ///
    /// A present value outside the new range moves to the nearer end at once.
    pub fn set_lightness_range(
        &mut self,
        element: ElementId,
        min: Lightness,
        max: Lightness,
    ) -> EventStatus {
        let model = ModelKind::LightLightness;
        if self.descriptor(element, model).is_none() {
            return self.lightness_setting_changed(element, EventStatus::InvalidElement);
        }
        if !LightnessMemory::is_valid_range(min, max) {
            debug!(element, min = min.0, max = max.0, "lightness range refused");
            return self.lightness_setting_changed(element, EventStatus::InvalidParam);
        }
        let Some(descriptor) = self.descriptor_mut(element, model) else {
            return EventStatus::InvalidElement;
        };
        descriptor.lightness.range_min = min;
        descriptor.lightness.range_max = max;
        let current = match descriptor.authoritative() {
            StateValue::Lightness(lightness) => lightness,
            _ => Lightness(0),
        };
        let clamped = descriptor.lightness.clamp(current);
        debug!(element, min = min.0, max = max.0, "lightness range changed");

        if clamped != current {
            return self.set_target(element, model, clamped.into(), 0, 0, UpdateSource::Application);
        }
        self.persist(element, model);
        self.lightness_setting_changed(element, EventStatus::Success)
    }

    fn lightness_setting_changed(&self, element: ElementId, status: EventStatus) -> EventStatus {
        let model = ModelKind::LightLightness;
        let value = self
            .present(element, model)
            .unwrap_or_else(|| StateValue::initial_for(model));
        self.emit(ModelEvent::StateUpdate {
            status,
            element,
            model,
            source: UpdateSource::Application,
            value,
            target: None,
            phase: crate::events::Phase::Idle,
        });
        status
    }

    /// Keep Lightness on `lightness_element` and Level on `level_element` in step.
    pub fn bind_lightness_to_level(
        &mut self,
        lightness_element: ElementId,
        level_element: ElementId,
    ) -> [Registration; 2] {
        [
            self.bind(
                BoundState::LightLightnessActual,
                BoundState::GenLevel,
                lightness_element,
                level_element,
                lightness_to_level,
            ),
            self.bind(
                BoundState::GenLevel,
                BoundState::LightLightnessActual,
                level_element,
                lightness_element,
                level_to_lightness,
            ),
        ]
    }

    /// Keep Lightness on `lightness_element` and OnOff on `onoff_element` in step.
    pub fn bind_lightness_to_onoff(
        &mut self,
        lightness_element: ElementId,
        onoff_element: ElementId,
    ) -> [Registration; 2] {
        [
            self.bind(
                BoundState::LightLightnessActual,
                BoundState::GenOnOff,
                lightness_element,
                onoff_element,
                lightness_to_onoff,
            ),
            self.bind(
                BoundState::GenOnOff,
                BoundState::LightLightnessActual,
                onoff_element,
                lightness_element,
                onoff_to_lightness,
            ),
        ]
    }

    /// Let the OnPowerUp state on `power_element` pick the power-up lightness.
    pub fn bind_lightness_to_on_power_up(
        &mut self,
        power_element: ElementId,
        lightness_element: ElementId,
    ) -> Registration {
        self.bind(
            BoundState::GenOnPowerUp,
            BoundState::LightLightnessActual,
            power_element,
            lightness_element,
            on_power_up_to_lightness,
        )
    }
}

/// Lightness changed: Level follows.
pub fn lightness_to_level(engine: &mut Engine, target: ElementId, value: &StateValue) {
    if let StateValue::Lightness(lightness) = value {
        engine.set_bound_state(target, lightness.to_level().into());
    }
}

/// Level changed: Lightness follows.
pub fn level_to_lightness(engine: &mut Engine, target: ElementId, value: &StateValue) {
    if let StateValue::Level(level) = value {
        engine.set_bound_state(target, Lightness::from_level(*level).into());
    }
}

/// Lightness changed: OnOff is on for any non-zero value.
pub fn lightness_to_onoff(engine: &mut Engine, target: ElementId, value: &StateValue) {
    if let StateValue::Lightness(lightness) = value {
        engine.set_bound_state(target, OnOff::from(lightness.0 > 0).into());
    }
}

/// OnOff changed: off is zero, on is the default or last lightness.
pub fn onoff_to_lightness(engine: &mut Engine, target: ElementId, value: &StateValue) {
    let StateValue::OnOff(state) = value else {
        return;
    };
    let Some(memory) = engine
        .descriptor(target, ModelKind::LightLightness)
        .map(|d| d.lightness_memory())
    else {
        return;
    };
    let lightness = match state {
        OnOff::Off => Lightness(0),
        OnOff::On => memory.on_value(),
    };
    engine.set_bound_state(target, lightness.into());
}

/// Power-up lightness chosen by OnPowerUp. A Level server on the same
/// element is moved along with it.
pub fn on_power_up_to_lightness(engine: &mut Engine, target: ElementId, value: &StateValue) {
    let StateValue::OnPowerUp(behaviour) = value else {
        return;
    };
    let Some(descriptor) = engine.descriptor(target, ModelKind::LightLightness) else {
        return;
    };
    let lightness = match (behaviour, descriptor.target()) {
        (OnPowerUp::Off, _) => Lightness(0),
        (OnPowerUp::Default, _) => descriptor.lightness_memory().on_value(),
        (OnPowerUp::Restore, StateValue::Lightness(restored)) => restored,
        (OnPowerUp::Restore, _) => return,
    };

    engine.set_bound_state(target, lightness.into());
    if engine.descriptor(target, ModelKind::GenLevel).is_some() {
        engine.set_bound_state(target, lightness.to_level().into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Level;
    use crate::engine::ElementBuilder;
    use crate::models::ModelMessage;
    use std::sync::{Arc, Mutex};

    fn engine() -> Engine {
        Engine::builder()
            .element(
                ElementBuilder::new()
                    .model(ModelKind::LightLightness)
                    .model(ModelKind::GenLevel)
                    .model(ModelKind::GenOnOff)
                    .model(ModelKind::GenPowerOnOff),
            )
            .build()
            .unwrap()
    }

    fn lightness_set(value: u16, tid: u8) -> ModelMessage {
        let mut params = value.to_le_bytes().to_vec();
        params.push(tid);
        ModelMessage::Set {
            model: ModelKind::LightLightness,
            params,
            ack: false,
        }
    }

    #[test]
    fn lightness_drives_level_and_onoff() {
        let mut engine = engine();
        engine.bind_lightness_to_level(0, 0);
        engine.bind_lightness_to_onoff(0, 0);

        engine.handle_message(MessageContext::new(0, 0x0002), lightness_set(0x9000, 1));

        assert_eq!(engine.lightness(0), Some(Lightness(0x9000)));
        assert_eq!(engine.level(0), Some(Level(0x1000)));
        assert_eq!(engine.onoff(0), Some(OnOff::On));
    }

    #[test]
    fn level_drives_lightness() {
        let mut engine = engine();
        engine.bind_lightness_to_level(0, 0);

        engine.set_state(0, Level(-32_768).into(), 0, 0);
        assert_eq!(engine.lightness(0), Some(Lightness(0)));
    }

    #[test]
    fn switching_on_restores_last_lightness() {
        let mut engine = engine();
        engine.bind_lightness_to_onoff(0, 0);

        engine.set_state(0, Lightness(1_234).into(), 0, 0);
        engine.set_state(0, OnOff::Off.into(), 0, 0);
        assert_eq!(engine.lightness(0), Some(Lightness(0)));

        engine.set_state(0, OnOff::On.into(), 0, 0);
        assert_eq!(engine.lightness(0), Some(Lightness(1_234)));
    }

    #[test]
    fn switching_on_prefers_default_lightness() {
        let mut engine = engine();
        engine.bind_lightness_to_onoff(0, 0);
        assert_eq!(engine.set_lightness_default(0, Lightness(500)), EventStatus::Success);

        engine.set_state(0, OnOff::On.into(), 0, 0);
        assert_eq!(engine.lightness(0), Some(Lightness(500)));
    }

    #[test]
    fn power_up_sets_lightness_and_level() {
        let mut engine = engine();
        engine.bind_lightness_to_on_power_up(0, 0);
        engine.set_lightness_default(0, Lightness(0x8100));
        engine.set_target(0, ModelKind::GenPowerOnOff, OnPowerUp::Default.into(), 0, 0, UpdateSource::Client);

        assert_eq!(engine.power_up(), 1);
        assert_eq!(engine.lightness(0), Some(Lightness(0x8100)));
        assert_eq!(engine.level(0), Some(Level(0x0100)));
    }

    #[test]
    fn lightness_default_needs_a_lightness_server() {
        let mut engine = Engine::builder()
            .element(ElementBuilder::new().model(ModelKind::GenOnOff))
            .build()
            .unwrap();
        assert_eq!(
            engine.set_lightness_default(0, Lightness(1)),
            EventStatus::InvalidElement
        );
    }

    #[test]
    fn range_clamps_client_and_bound_values() {
        let mut engine = engine();
        engine.bind_lightness_to_level(0, 0);
        engine.bind_lightness_to_onoff(0, 0);
        assert_eq!(
            engine.set_lightness_range(0, Lightness(0x1000), Lightness(0xC000)),
            EventStatus::Success
        );
        let ctx = MessageContext::new(0, 0x0002);

        engine.handle_message(ctx, lightness_set(0xF000, 1));
        assert_eq!(engine.lightness(0), Some(Lightness(0xC000)));
        assert_eq!(engine.level(0), Some(Level(0x4000)));

        engine.set_state(0, Level::MIN.into(), 0, 0);
        assert_eq!(engine.lightness(0), Some(Lightness(0)));

        engine.set_state(0, Level(-32_000).into(), 0, 0);
        assert_eq!(engine.lightness(0), Some(Lightness(0x1000)));

        engine.set_state(0, OnOff::Off.into(), 0, 0);
        engine.set_lightness_default(0, Lightness(0xFFFF));
        engine.set_state(0, OnOff::On.into(), 0, 0);
        assert_eq!(engine.lightness(0), Some(Lightness(0xC000)));
    }

    #[test]
    fn narrowing_the_range_pulls_present_lightness_in() {
        let mut engine = engine();
        engine.set_state(0, Lightness(0xF000).into(), 0, 0);

        engine.set_lightness_range(0, Lightness(0x0100), Lightness(0x8000));
        assert_eq!(engine.lightness(0), Some(Lightness(0x8000)));

        let memory = engine
            .descriptor(0, ModelKind::LightLightness)
            .unwrap()
            .lightness_memory();
        assert_eq!((memory.range_min, memory.range_max), (Lightness(0x0100), Lightness(0x8000)));
    }

    #[test]
    fn invalid_range_is_refused() {
        let mut engine = engine();
        assert_eq!(
            engine.set_lightness_range(0, Lightness(0), Lightness(10)),
            EventStatus::InvalidParam
        );
        assert_eq!(
            engine.set_lightness_range(0, Lightness(20), Lightness(10)),
            EventStatus::InvalidParam
        );
        let memory = engine
            .descriptor(0, ModelKind::LightLightness)
            .unwrap()
            .lightness_memory();
        assert_eq!(memory, LightnessMemory::default());
    }

    #[test]
    fn linear_follows_actual() {
        let mut engine = engine();
        engine.set_state(0, Lightness(0x8000).into(), 0, 0);
        assert_eq!(engine.lightness_linear(0), Some(0x4000));
        assert_eq!(engine.lightness_linear(1), None);
    }

    #[test]
    fn lightness_settings_raise_state_updates() {
        let mut engine = engine();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        engine.register_callback(ModelKind::LightLightness, move |event| {
            sink.lock().unwrap().push(event.clone())
        });

        engine.set_lightness_default(0, Lightness(0x2000));
        engine.set_lightness_range(0, Lightness(0), Lightness(0x2000));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            ModelEvent::StateUpdate {
                status: EventStatus::Success,
                source: UpdateSource::Application,
                value: StateValue::Lightness(Lightness(0)),
                ..
            }
        ));
        assert_eq!(events[1].status(), EventStatus::InvalidParam);
    }
}
