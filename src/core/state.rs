//! Model state values.
//!
//! Every state a server model can hold implements [`ModelState`], which
//! captures the per-type behaviour the transition controller needs without
//! knowing the concrete type. [`StateValue`] is the closed set of states the
//! engine stores in descriptors and passes to binding resolvers.

use super::model::ModelKind;
use crate::timing::TransitionTime;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

/// Trait for model states.
///
/// # Example
///
/// ```rust
/// use meshstate::core::{ModelState, OnOff};
///
/// assert!(OnOff::On.applies_immediate_edge());
/// assert!(!OnOff::Off.applies_immediate_edge());
/// assert_eq!(OnOff::On.name(), "On");
/// ```
pub trait ModelState:
    Clone + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync
{
    /// Name of the value for display/logging.
    fn name(&self) -> &str;

    /// Whether a transition towards this value changes present state at the
    /// start of the transition rather than at its end.
    ///
    /// Binary states turn on immediately and turn off only once the
    /// transition completes.
    ///
    /// Default implementation returns `false`.
    fn applies_immediate_edge(&self) -> bool {
        false
    }

    /// Numeric view of the value for stepped transitions.
    ///
    /// States without a numeric view change in a single step.
    fn linear_value(&self) -> Option<i32> {
        None
    }

    /// Value at the given numeric position, clamped to the legal range.
    fn with_linear_value(&self, value: i32) -> Self {
        let _ = value;
        self.clone()
    }

    /// Append the little-endian wire form of the value.
    fn encode(&self, out: &mut Vec<u8>);
}

/// Error raised when a raw value is outside the legal range of a state.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StateError {
    #[error("value {raw:#04x} is prohibited for {state}")]
    Prohibited { state: &'static str, raw: u8 },
}

/// Generic OnOff state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OnOff {
    Off,
    On,
}

impl ModelState for OnOff {
    fn name(&self) -> &str {
        match self {
            Self::Off => "Off",
            Self::On => "On",
        }
    }

    fn applies_immediate_edge(&self) -> bool {
        matches!(self, Self::On)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }
}

impl From<OnOff> for u8 {
    fn from(state: OnOff) -> Self {
        match state {
            OnOff::Off => 0x00,
            OnOff::On => 0x01,
        }
    }
}

impl From<bool> for OnOff {
    fn from(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

impl TryFrom<u8> for OnOff {
    type Error = StateError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0x00 => Ok(Self::Off),
            0x01 => Ok(Self::On),
            _ => Err(StateError::Prohibited { state: "OnOff", raw }),
        }
    }
}

/// Generic OnPowerUp state: what the element does after power is restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OnPowerUp {
    /// Power up with bound states off
    Off,
    /// Power up with bound states at their default
    Default,
    /// Power up restoring the last target state
    Restore,
}

impl ModelState for OnPowerUp {
    fn name(&self) -> &str {
        match self {
            Self::Off => "Off",
            Self::Default => "Default",
            Self::Restore => "Restore",
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }
}

impl From<OnPowerUp> for u8 {
    fn from(state: OnPowerUp) -> Self {
        match state {
            OnPowerUp::Off => 0x00,
            OnPowerUp::Default => 0x01,
            OnPowerUp::Restore => 0x02,
        }
    }
}

impl TryFrom<u8> for OnPowerUp {
    type Error = StateError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0x00 => Ok(Self::Off),
            0x01 => Ok(Self::Default),
            0x02 => Ok(Self::Restore),
            _ => Err(StateError::Prohibited {
                state: "OnPowerUp",
                raw,
            }),
        }
    }
}

/// Generic Level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Level(pub i16);

impl Level {
    pub const MIN: Level = Level(i16::MIN);
    pub const MAX: Level = Level(i16::MAX);
}

impl ModelState for Level {
    fn name(&self) -> &str {
        "Level"
    }

    fn linear_value(&self) -> Option<i32> {
        Some(i32::from(self.0))
    }

    fn with_linear_value(&self, value: i32) -> Self {
        Level(value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0.to_le_bytes());
    }
}

/// Light Lightness Actual state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Lightness(pub u16);

impl Lightness {
    /// Level state bound to this lightness.
    pub const fn to_level(self) -> Level {
        Level((self.0 as i32 - 0x8000) as i16)
    }

    /// Lightness bound to a level state.
    pub const fn from_level(level: Level) -> Self {
        Lightness((level.0 as i32 + 0x8000) as u16)
    }

    /// Light Lightness Linear, derived from the actual value.
    pub const fn linear(self) -> u16 {
        ((self.0 as u32 * self.0 as u32) >> 16) as u16
    }
}

impl ModelState for Lightness {
    fn name(&self) -> &str {
        "Lightness"
    }

    fn linear_value(&self) -> Option<i32> {
        Some(i32::from(self.0))
    }

    fn with_linear_value(&self, value: i32) -> Self {
        Lightness(value.clamp(0, i32::from(u16::MAX)) as u16)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0.to_le_bytes());
    }
}

impl ModelState for TransitionTime {
    fn name(&self) -> &str {
        if self.is_unknown() {
            "Unknown"
        } else {
            "TransitionTime"
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.raw());
    }
}

/// Closed set of states stored by the engine.
///
/// Binding resolvers receive a `StateValue` and match on the variant they
/// expect, so a payload can never be misread as a different state type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateValue {
    OnOff(OnOff),
    Level(Level),
    OnPowerUp(OnPowerUp),
    DefaultTransition(TransitionTime),
    Lightness(Lightness),
}

impl StateValue {
    /// The model kind whose descriptor holds values of this variant.
    pub const fn model_kind(&self) -> ModelKind {
        match self {
            Self::OnOff(_) => ModelKind::GenOnOff,
            Self::Level(_) => ModelKind::GenLevel,
            Self::OnPowerUp(_) => ModelKind::GenPowerOnOff,
            Self::DefaultTransition(_) => ModelKind::GenDefaultTransition,
            Self::Lightness(_) => ModelKind::LightLightness,
        }
    }

    /// Whether the value is legal to store.
    ///
    /// Enumerated states are legal by construction; a default transition
    /// time must not use the reserved step pattern.
    pub const fn is_legal(&self) -> bool {
        match self {
            Self::DefaultTransition(time) => !time.is_unknown(),
            _ => true,
        }
    }

    /// Initial value of a freshly built descriptor.
    pub const fn initial_for(kind: ModelKind) -> Self {
        match kind {
            ModelKind::GenOnOff => Self::OnOff(OnOff::Off),
            ModelKind::GenLevel => Self::Level(Level(0)),
            ModelKind::GenPowerOnOff => Self::OnPowerUp(OnPowerUp::Off),
            ModelKind::GenDefaultTransition => Self::DefaultTransition(TransitionTime::IMMEDIATE),
            ModelKind::LightLightness => Self::Lightness(Lightness(0)),
        }
    }

    pub fn encoded(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2);
        self.encode(&mut out);
        out
    }
}

impl ModelState for StateValue {
    fn name(&self) -> &str {
        match self {
            Self::OnOff(v) => v.name(),
            Self::Level(v) => v.name(),
            Self::OnPowerUp(v) => v.name(),
            Self::DefaultTransition(v) => v.name(),
            Self::Lightness(v) => v.name(),
        }
    }

    fn applies_immediate_edge(&self) -> bool {
        match self {
            Self::OnOff(v) => v.applies_immediate_edge(),
            Self::Level(v) => v.applies_immediate_edge(),
            Self::OnPowerUp(v) => v.applies_immediate_edge(),
            Self::DefaultTransition(v) => v.applies_immediate_edge(),
            Self::Lightness(v) => v.applies_immediate_edge(),
        }
    }

    fn linear_value(&self) -> Option<i32> {
        match self {
            Self::OnOff(v) => v.linear_value(),
            Self::Level(v) => v.linear_value(),
            Self::OnPowerUp(v) => v.linear_value(),
            Self::DefaultTransition(v) => v.linear_value(),
            Self::Lightness(v) => v.linear_value(),
        }
    }

    fn with_linear_value(&self, value: i32) -> Self {
        match self {
            Self::OnOff(v) => Self::OnOff(v.with_linear_value(value)),
            Self::Level(v) => Self::Level(v.with_linear_value(value)),
            Self::OnPowerUp(v) => Self::OnPowerUp(v.with_linear_value(value)),
            Self::DefaultTransition(v) => Self::DefaultTransition(v.with_linear_value(value)),
            Self::Lightness(v) => Self::Lightness(v.with_linear_value(value)),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::OnOff(v) => v.encode(out),
            Self::Level(v) => v.encode(out),
            Self::OnPowerUp(v) => v.encode(out),
            Self::DefaultTransition(v) => v.encode(out),
            Self::Lightness(v) => v.encode(out),
        }
    }
}

impl From<OnOff> for StateValue {
    fn from(v: OnOff) -> Self {
        Self::OnOff(v)
    }
}

impl From<Level> for StateValue {
    fn from(v: Level) -> Self {
        Self::Level(v)
    }
}

impl From<OnPowerUp> for StateValue {
    fn from(v: OnPowerUp) -> Self {
        Self::OnPowerUp(v)
    }
}

impl From<TransitionTime> for StateValue {
    fn from(v: TransitionTime) -> Self {
        Self::DefaultTransition(v)
    }
}

impl From<Lightness> for StateValue {
    fn from(v: Lightness) -> Self {
        Self::Lightness(v)
    }
}
