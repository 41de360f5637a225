//! Persistent snapshots of model descriptors.
//!
//! A snapshot holds what a node must keep across a power cycle: the settled
//! present and target values, stored scenes and lightness memory. Timers and
//! in-flight transactions are deliberately absent; a restored descriptor is
//! always idle.

use crate::core::{ElementId, ModelKind, StateHistory, StateValue};
use crate::descriptor::{LightnessMemory, ModelDescriptor};
use crate::engine::Engine;
use crate::timer::TimerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

pub mod error;

pub use error::SnapshotError;

/// Version identifier for snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable image of one model descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DescriptorSnapshot {
    /// Snapshot format version
    pub version: u32,

    /// Unique snapshot identifier
    pub id: String,

    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,

    pub element: ElementId,
    pub model: ModelKind,
    pub present: StateValue,
    pub target: StateValue,
    pub scenes: Vec<Option<StateValue>>,
    pub lightness: LightnessMemory,

    /// Recent state changes, for diagnostics only
    pub history: StateHistory,
}

impl DescriptorSnapshot {
    pub fn capture(descriptor: &ModelDescriptor) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            element: descriptor.element(),
            model: descriptor.kind(),
            present: descriptor.present(),
            target: descriptor.target(),
            scenes: descriptor.scenes.clone(),
            lightness: descriptor.lightness_memory(),
            history: descriptor.history().clone(),
        }
    }

    /// Check the version, that every value belongs to the snapshot's model
    /// and that the lightness range is usable.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.version,
                supported: SNAPSHOT_VERSION,
            });
        }

        let foreign = std::iter::once(&self.present)
            .chain(std::iter::once(&self.target))
            .chain(self.scenes.iter().flatten())
            .any(|value| value.model_kind() != self.model || !value.is_legal());
        if foreign {
            return Err(SnapshotError::ValueMismatch { model: self.model });
        }

        let (min, max) = (self.lightness.range_min, self.lightness.range_max);
        if !LightnessMemory::is_valid_range(min, max) {
            return Err(SnapshotError::InvalidRange { min, max });
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::serialize(self).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Self = bincode::deserialize(bytes)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

impl Engine {
    /// Load a snapshot into the descriptor it was taken from.
    ///
    /// Any change in progress is abandoned. The descriptor comes back idle,
    /// with the snapshot's target kept for a later power-up restore.
    pub fn restore(&mut self, snapshot: &DescriptorSnapshot) -> Result<(), SnapshotError> {
        snapshot.validate()?;
        let (element, model) = (snapshot.element, snapshot.model);
        if self.descriptor(element, model).is_none() {
            return Err(SnapshotError::UnknownModel { element, model });
        }

        self.timers.cancel(TimerId::transition(element, model));
        self.timers.cancel(TimerId::transaction(element, model));
        let Some(descriptor) = self.descriptor_mut(element, model) else {
            return Err(SnapshotError::UnknownModel { element, model });
        };
        descriptor.reset();
        descriptor.present = snapshot.present;
        descriptor.target = snapshot.target;
        for (slot, stored) in descriptor.scenes.iter_mut().zip(&snapshot.scenes) {
            *slot = *stored;
        }
        descriptor.lightness = snapshot.lightness;
        descriptor.history = snapshot.history.clone();

        info!(element, %model, id = %snapshot.id, "descriptor restored");
        Ok(())
    }
}
