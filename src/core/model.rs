//! Identifiers shared by every model: elements, addresses, model kinds,
//! bound-state tags and update sources.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of an element in the node's element table.
pub type ElementId = u8;

/// 16-bit mesh address.
pub type MeshAddress = u16;

/// The unassigned address. Never a valid message source.
pub const UNASSIGNED_ADDRESS: MeshAddress = 0x0000;

/// Server model types handled by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelKind {
    GenOnOff,
    GenLevel,
    GenDefaultTransition,
    GenPowerOnOff,
    LightLightness,
}

impl ModelKind {
    /// Every model kind, in model id order.
    pub const ALL: [ModelKind; 5] = [
        ModelKind::GenOnOff,
        ModelKind::GenLevel,
        ModelKind::GenDefaultTransition,
        ModelKind::GenPowerOnOff,
        ModelKind::LightLightness,
    ];

    /// SIG model identifier of the server model.
    pub const fn model_id(self) -> u16 {
        match self {
            Self::GenOnOff => 0x1000,
            Self::GenLevel => 0x1002,
            Self::GenDefaultTransition => 0x1004,
            Self::GenPowerOnOff => 0x1006,
            Self::LightLightness => 0x1300,
        }
    }

    /// The bound state this model exposes to the binding resolver.
    pub const fn bound_state(self) -> Option<BoundState> {
        match self {
            Self::GenOnOff => Some(BoundState::GenOnOff),
            Self::GenLevel => Some(BoundState::GenLevel),
            Self::GenPowerOnOff => Some(BoundState::GenOnPowerUp),
            Self::LightLightness => Some(BoundState::LightLightnessActual),
            Self::GenDefaultTransition => None,
        }
    }

    /// Whether present state can be stored in and recalled from a scene.
    pub const fn supports_scenes(self) -> bool {
        matches!(self, Self::GenOnOff | Self::GenLevel | Self::LightLightness)
    }

    /// Whether the model's state moves through timed transitions.
    pub const fn is_transitional(self) -> bool {
        matches!(self, Self::GenOnOff | Self::GenLevel | Self::LightLightness)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::GenOnOff => "GenOnOff",
            Self::GenLevel => "GenLevel",
            Self::GenDefaultTransition => "GenDefaultTransition",
            Self::GenPowerOnOff => "GenPowerOnOff",
            Self::LightLightness => "LightLightness",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// States that can take part in a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundState {
    GenOnOff,
    GenLevel,
    GenOnPowerUp,
    LightLightnessActual,
}

/// What caused a state change.
///
/// Changes caused by a binding or a scene recall never trigger bindings
/// themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateSource {
    /// A remote client message
    Client,
    /// The local application
    Application,
    /// Resolution of a bound state
    Binding,
    /// A scene recall
    Scene,
}

impl UpdateSource {
    /// Whether a change from this source may resolve bindings.
    pub const fn triggers_bindings(self) -> bool {
        matches!(self, Self::Client | Self::Application)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_and_scene_sources_do_not_trigger_bindings() {
        assert!(UpdateSource::Client.triggers_bindings());
        assert!(UpdateSource::Application.triggers_bindings());
        assert!(!UpdateSource::Binding.triggers_bindings());
        assert!(!UpdateSource::Scene.triggers_bindings());
    }

    #[test]
    fn model_ids_are_distinct() {
        let mut ids: Vec<u16> = ModelKind::ALL.iter().map(|k| k.model_id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), ModelKind::ALL.len());
    }

    #[test]
    fn default_transition_has_no_bound_state() {
        assert_eq!(ModelKind::GenDefaultTransition.bound_state(), None);
        assert_eq!(
            ModelKind::GenPowerOnOff.bound_state(),
            Some(BoundState::GenOnPowerUp)
        );
    }
}
