//! Build errors for the engine builder.

use crate::config::ConfigError;
use crate::core::{ElementId, ModelKind};
use thiserror::Error;

/// Errors that can occur when building an engine.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("No elements defined. Add at least one element")]
    NoElements,

    #[error("Too many elements ({0}). At most 256 are addressable")]
    TooManyElements(usize),

    #[error("Element {element} hosts no models. Call .model(kind) on its builder")]
    EmptyElement { element: ElementId },

    #[error("Element {element} already hosts {model}")]
    DuplicateModel { element: ElementId, model: ModelKind },

    #[error("Initial value for {model} on element {element} is not a legal value")]
    IllegalInitialValue { element: ElementId, model: ModelKind },

    #[error("Element {element} does not host {model}")]
    UnknownModel { element: ElementId, model: ModelKind },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}
