//! Snapshot error types.

use crate::core::{ElementId, Lightness, ModelKind};
use thiserror::Error;

/// Why a snapshot could not be written, read or loaded.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("could not encode snapshot: {0}")]
    SerializationFailed(String),

    #[error("could not decode snapshot: {0}")]
    DeserializationFailed(String),

    /// Written by a newer or older release of the format
    #[error("snapshot format {found} cannot be read, expected {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// A stored value does not belong to the snapshot's model
    #[error("snapshot for {model} holds a value of another model")]
    ValueMismatch { model: ModelKind },

    #[error("snapshot lightness range {min:?}..={max:?} is empty or starts at zero")]
    InvalidRange { min: Lightness, max: Lightness },

    /// The engine has no descriptor for the snapshot
    #[error("no {model} model on element {element}")]
    UnknownModel { element: ElementId, model: ModelKind },
}
