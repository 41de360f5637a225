//! Per-model-instance state record.
//!
//! Every model on every element owns one [`ModelDescriptor`]. The engine
//! creates them when it is built and never frees them. Present state is only
//! authoritative while the descriptor is idle; during a delay or transition
//! the target is what the model is heading to.

use crate::core::{
    ElementId, Lightness, MeshAddress, ModelKind, StateHistory, StateValue, UpdateSource,
};
use crate::dedup::TransactionFilter;
use crate::events::Phase;
use crate::snapshot::DescriptorSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Persistence callout, invoked with a snapshot of the descriptor.
pub type PersistHook = Arc<dyn Fn(&DescriptorSnapshot) + Send + Sync>;

/// Where to send the Status reply of a delayed acknowledged Set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAck {
    pub dst: MeshAddress,
    pub app_key_index: u16,
    pub unicast: bool,
}

/// Linear interim steps of a numeric transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Stepping {
    pub(crate) steps: u32,
    pub(crate) increment: i32,
}

impl Stepping {
    pub(crate) const NONE: Stepping = Stepping {
        steps: 0,
        increment: 0,
    };

    /// Split a transition into `interval_ms` steps when it spans at least two.
    pub(crate) fn plan(
        present: &StateValue,
        target: &StateValue,
        transition_ms: u32,
        interval_ms: u32,
    ) -> Self {
        use crate::core::ModelState;

        let (Some(from), Some(to)) = (present.linear_value(), target.linear_value()) else {
            return Self::NONE;
        };
        if interval_ms == 0 {
            return Self::NONE;
        }
        let steps = transition_ms / interval_ms;
        if steps < 2 {
            return Self::NONE;
        }
        Self {
            steps,
            increment: (to - from) / steps as i32,
        }
    }
}

/// Continuous move started by a Level Move Set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Motion {
    pub(crate) step: i32,
    pub(crate) interval_ms: u32,
}

/// Default, last and range values of a Light Lightness server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightnessMemory {
    /// Value used when turned on, zero meaning "use last"
    pub default: Lightness,
    /// Last non-zero actual value
    pub last: Lightness,
    /// Lowest non-zero actual value
    pub range_min: Lightness,
    /// Highest actual value
    pub range_max: Lightness,
}

impl Default for LightnessMemory {
    fn default() -> Self {
        Self {
            default: Lightness(0),
            last: Lightness(u16::MAX),
            range_min: Lightness(1),
            range_max: Lightness(u16::MAX),
        }
    }
}

impl LightnessMemory {
    /// Value a bound OnOff switching on selects.
    pub fn on_value(&self) -> Lightness {
        self.clamp(if self.default.0 != 0 {
            self.default
        } else {
            self.last
        })
    }

    /// Whether `min..=max` can serve as a range.
    pub fn is_valid_range(min: Lightness, max: Lightness) -> bool {
        min.0 != 0 && min <= max
    }

    /// Pull a non-zero value into the range. Zero means off and is kept.
    pub fn clamp(&self, lightness: Lightness) -> Lightness {
        if lightness.0 == 0 {
            lightness
        } else {
            lightness.clamp(self.range_min, self.range_max)
        }
    }
}

/// State of one model instance.
pub struct ModelDescriptor {
    pub(crate) element: ElementId,
    pub(crate) kind: ModelKind,
    pub(crate) present: StateValue,
    pub(crate) target: StateValue,
    pub(crate) scenes: Vec<Option<StateValue>>,
    pub(crate) remaining_ms: u32,
    pub(crate) delay_units: u8,
    pub(crate) update_source: UpdateSource,
    pub(crate) filter: TransactionFilter,
    pub(crate) pending_ack: Option<PendingAck>,
    pub(crate) stepping: Stepping,
    pub(crate) motion: Option<Motion>,
    pub(crate) delta_origin: Option<StateValue>,
    pub(crate) edge_resolved: bool,
    pub(crate) lightness: LightnessMemory,
    pub(crate) history: StateHistory,
    pub(crate) persist: Option<PersistHook>,
}

impl ModelDescriptor {
    pub(crate) fn new(
        element: ElementId,
        kind: ModelKind,
        initial: StateValue,
        scene_slots: usize,
        history_limit: usize,
    ) -> Self {
        let slots = if kind.supports_scenes() { scene_slots } else { 0 };
        Self {
            element,
            kind,
            present: initial,
            target: initial,
            scenes: vec![None; slots],
            remaining_ms: 0,
            delay_units: 0,
            update_source: UpdateSource::Application,
            filter: TransactionFilter::new(),
            pending_ack: None,
            stepping: Stepping::NONE,
            motion: None,
            delta_origin: None,
            edge_resolved: false,
            lightness: LightnessMemory::default(),
            history: StateHistory::with_limit(history_limit),
            persist: None,
        }
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn present(&self) -> StateValue {
        self.present
    }

    pub fn target(&self) -> StateValue {
        self.target
    }

    /// The value the model is settling on: target while busy, present when idle.
    pub fn authoritative(&self) -> StateValue {
        if self.is_idle() {
            self.present
        } else {
            self.target
        }
    }

    pub fn remaining_ms(&self) -> u32 {
        self.remaining_ms
    }

    pub fn delay_units(&self) -> u8 {
        self.delay_units
    }

    pub fn update_source(&self) -> UpdateSource {
        self.update_source
    }

    pub fn phase(&self) -> Phase {
        if self.delay_units > 0 {
            Phase::Delayed
        } else if self.remaining_ms > 0 {
            Phase::Transitioning
        } else {
            Phase::Idle
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase() == Phase::Idle
    }

    /// Whether a Level Move is running.
    pub fn is_moving(&self) -> bool {
        self.motion.is_some()
    }

    /// Last accepted `(source, tid)`, if it has not expired.
    pub fn last_transaction(&self) -> Option<(MeshAddress, u8)> {
        match self.filter.last_source() {
            crate::core::UNASSIGNED_ADDRESS => None,
            source => Some((source, self.filter.last_tid())),
        }
    }

    pub fn pending_ack(&self) -> Option<PendingAck> {
        self.pending_ack
    }

    pub fn scene(&self, slot: usize) -> Option<StateValue> {
        self.scenes.get(slot).copied().flatten()
    }

    pub fn scene_slots(&self) -> usize {
        self.scenes.len()
    }

    pub fn lightness_memory(&self) -> LightnessMemory {
        self.lightness
    }

    pub fn history(&self) -> &StateHistory {
        &self.history
    }

    pub fn set_persist_hook(&mut self, hook: PersistHook) {
        self.persist = Some(hook);
    }

    pub fn has_persist_hook(&self) -> bool {
        self.persist.is_some()
    }

    /// Clear transition progress and the remembered transaction.
    pub(crate) fn reset(&mut self) {
        self.target = self.present;
        self.remaining_ms = 0;
        self.delay_units = 0;
        self.filter.expire();
        self.pending_ack = None;
        self.stepping = Stepping::NONE;
        self.motion = None;
        self.delta_origin = None;
        self.edge_resolved = false;
    }
}

impl fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("element", &self.element)
            .field("kind", &self.kind)
            .field("present", &self.present)
            .field("target", &self.target)
            .field("remaining_ms", &self.remaining_ms)
            .field("delay_units", &self.delay_units)
            .field("update_source", &self.update_source)
            .field("filter", &self.filter)
            .field("persist", &self.persist.is_some())
            .finish_non_exhaustive()
    }
}

/// Models hosted by one element, keyed by kind.
#[derive(Debug, Default)]
pub struct Element {
    pub(crate) models: BTreeMap<ModelKind, ModelDescriptor>,
}

impl Element {
    pub fn model(&self, kind: ModelKind) -> Option<&ModelDescriptor> {
        self.models.get(&kind)
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.values()
    }

    pub fn hosts(&self, kind: ModelKind) -> bool {
        self.models.contains_key(&kind)
    }
}
