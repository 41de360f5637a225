//! Generic Power OnOff server: the OnPowerUp state.

use super::params;
use super::{MessageContext, MessageOutcome, ParamViolation};
use crate::bindings::Registration;
use crate::core::{BoundState, ElementId, ModelKind, OnOff, OnPowerUp, StateValue};
use crate::engine::Engine;

impl Engine {
    pub(super) fn handle_on_power_up_set(
        &mut self,
        ctx: MessageContext,
        params: &[u8],
        ack: bool,
    ) -> MessageOutcome {
        match params::single(params, |raw| OnPowerUp::try_from(raw).map_err(ParamViolation::from)) {
            Ok(behaviour) => self.store_state(ctx, behaviour.into(), ack),
            Err(violations) => MessageOutcome::Dropped(violations),
        }
    }

    /// OnPowerUp state of `element`.
    pub fn on_power_up(&self, element: ElementId) -> Option<OnPowerUp> {
        match self.present(element, ModelKind::GenPowerOnOff)? {
            StateValue::OnPowerUp(behaviour) => Some(behaviour),
            _ => None,
        }
    }

    /// Let the OnPowerUp state on `power_element` drive OnOff on `onoff_element`.
    pub fn bind_onoff_to_on_power_up(
        &mut self,
        power_element: ElementId,
        onoff_element: ElementId,
    ) -> Registration {
        self.bind(
            BoundState::GenOnPowerUp,
            BoundState::GenOnOff,
            power_element,
            onoff_element,
            on_power_up_to_onoff,
        )
    }
}

/// Power-up OnOff chosen by OnPowerUp: `Off` keeps it off, `Default` turns it
/// on and `Restore` returns to the last target.
pub fn on_power_up_to_onoff(engine: &mut Engine, target: ElementId, value: &StateValue) {
    let StateValue::OnPowerUp(behaviour) = value else {
        return;
    };
    let state = match behaviour {
        OnPowerUp::Off => OnOff::Off.into(),
        OnPowerUp::Default => OnOff::On.into(),
        OnPowerUp::Restore => match engine.descriptor(target, ModelKind::GenOnOff) {
            Some(descriptor) => descriptor.target(),
            None => return,
        },
    };
    engine.set_bound_state(target, state);
}
