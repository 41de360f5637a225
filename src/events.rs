//! Notifications delivered to the application.

use crate::core::{ElementId, ModelKind, StateValue, UpdateSource};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Outcome reported with every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    Success,
    /// No such element, or the element does not host the model
    InvalidElement,
    /// Value of the wrong kind or outside its legal range
    InvalidParam,
}

impl EventStatus {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// Phase of a model instance's transition state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Present state is authoritative.
    Idle,
    /// Waiting for the delay to elapse; present unchanged.
    Delayed,
    /// Moving towards the target.
    Transitioning,
}

/// Event delivered to the callback registered for a model kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelEvent {
    /// A state-change request was processed or a transition progressed.
    StateUpdate {
        status: EventStatus,
        element: ElementId,
        model: ModelKind,
        source: UpdateSource,
        /// Present state when the event was raised
        value: StateValue,
        /// Target state while a change is in progress
        target: Option<StateValue>,
        phase: Phase,
    },
    /// Answer to a local state query.
    CurrentState {
        status: EventStatus,
        element: ElementId,
        model: ModelKind,
        value: Option<StateValue>,
    },
}

impl ModelEvent {
    pub fn status(&self) -> EventStatus {
        match self {
            Self::StateUpdate { status, .. } | Self::CurrentState { status, .. } => *status,
        }
    }

    pub fn model(&self) -> ModelKind {
        match self {
            Self::StateUpdate { model, .. } | Self::CurrentState { model, .. } => *model,
        }
    }

    pub fn element(&self) -> ElementId {
        match self {
            Self::StateUpdate { element, .. } | Self::CurrentState { element, .. } => *element,
        }
    }
}

/// Application callback for one model kind.
pub type EventCallback = Box<dyn Fn(&ModelEvent) + Send + Sync>;

/// Callbacks registered per model kind. Unregistered kinds drop their events.
#[derive(Default)]
pub struct EventCallbacks {
    callbacks: HashMap<ModelKind, EventCallback>,
}

impl EventCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `callback` for `model`, replacing any previous one.
    pub fn register<F>(&mut self, model: ModelKind, callback: F)
    where
        F: Fn(&ModelEvent) + Send + Sync + 'static,
    {
        self.callbacks.insert(model, Box::new(callback));
    }

    pub fn emit(&self, event: &ModelEvent) {
        if let Some(callback) = self.callbacks.get(&event.model()) {
            callback(event);
        }
    }

    pub fn is_registered(&self, model: ModelKind) -> bool {
        self.callbacks.contains_key(&model)
    }
}

impl fmt::Debug for EventCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut models: Vec<_> = self.callbacks.keys().collect();
        models.sort();
        f.debug_struct("EventCallbacks")
            .field("models", &models)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OnOff;
    use std::sync::{Arc, Mutex};

    fn update(model: ModelKind) -> ModelEvent {
        ModelEvent::StateUpdate {
            status: EventStatus::Success,
            element: 0,
            model,
            source: UpdateSource::Application,
            value: OnOff::On.into(),
            target: None,
            phase: Phase::Idle,
        }
    }

    #[test]
    fn events_reach_only_their_model_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut callbacks = EventCallbacks::new();
        callbacks.register(ModelKind::GenOnOff, move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        callbacks.emit(&update(ModelKind::GenOnOff));
        callbacks.emit(&update(ModelKind::GenLevel));

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(!callbacks.is_registered(ModelKind::GenLevel));
    }
}
