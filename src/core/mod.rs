//! State types shared by every model.
//!
//! - Identifiers: elements, addresses, model kinds and bound-state tags
//! - State values and the [`ModelState`] trait they implement
//! - Bounded history of settled changes
//!
//! Nothing here touches timers or the transport.

mod history;
mod model;
mod state;

pub use history::{StateChange, StateHistory, DEFAULT_HISTORY_LIMIT};
pub use model::{BoundState, ElementId, MeshAddress, ModelKind, UpdateSource, UNASSIGNED_ADDRESS};
pub use state::{Level, Lightness, ModelState, OnOff, OnPowerUp, StateError, StateValue};
