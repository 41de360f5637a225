//! The engine: element table, binding table, timers and transport behind one
//! event loop.
//!
//! Everything runs on the caller's thread. Inbound messages arrive through
//! [`Engine::handle_message`], expired timers through [`Engine::advance`]. Each event is processed to completion before the
//! next, so no state is ever shared across threads.
//!
//! # Example
//!
//! ```rust
//! use meshstate::core::{ModelKind, OnOff, StateValue, UpdateSource};
//! use meshstate::engine::{ElementBuilder, Engine};
//! use meshstate::events::EventStatus;
//!
//! let mut engine = Engine::builder()
//!     .element(ElementBuilder::new().model(ModelKind::GenOnOff))
//!     .build()
//!     .unwrap();
//!
//! let status = engine.set_target(0, ModelKind::GenOnOff, OnOff::On.into(), 0, 0, UpdateSource::Application);
//! assert_eq!(status, EventStatus::Success);
//! assert_eq!(engine.present(0, ModelKind::GenOnOff), Some(StateValue::OnOff(OnOff::On)));
//! ```

mod builder;
mod error;

pub use builder::{ElementBuilder, EngineBuilder};
pub use error::BuildError;

use crate::bindings::{BindingTable, Registration, Resolver};
use crate::config::EngineConfig;
use crate::core::{BoundState, ElementId, ModelKind, StateValue, UpdateSource};
use crate::descriptor::{Element, ModelDescriptor};
use crate::events::{EventCallbacks, EventStatus, ModelEvent};
use crate::timer::{TimerId, TimerPurpose, TimerQueue};
use crate::transport::Transport;
use std::fmt;
use tracing::{debug, info, trace};

/// State-transition and binding engine for the server models of one node.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) elements: Vec<Element>,
    pub(crate) bindings: BindingTable<Engine>,
    pub(crate) timers: Box<dyn TimerQueue>,
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) callbacks: EventCallbacks,
    pub(crate) bind_depth: usize,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn element(&self, element: ElementId) -> Option<&Element> {
        self.elements.get(usize::from(element))
    }

    pub fn descriptor(&self, element: ElementId, model: ModelKind) -> Option<&ModelDescriptor> {
        self.element(element)?.model(model)
    }

    pub fn descriptor_mut(
        &mut self,
        element: ElementId,
        model: ModelKind,
    ) -> Option<&mut ModelDescriptor> {
        self.elements
            .get_mut(usize::from(element))?
            .models
            .get_mut(&model)
    }

    /// Present value of a model instance.
    pub fn present(&self, element: ElementId, model: ModelKind) -> Option<StateValue> {
        self.descriptor(element, model).map(ModelDescriptor::present)
    }

    /// Current engine time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.timers.now_ms()
    }

    pub fn timers(&self) -> &dyn TimerQueue {
        self.timers.as_ref()
    }

    pub fn bindings(&self) -> &BindingTable<Engine> {
        &self.bindings
    }

    /// Install the event callback for a model kind.
    pub fn register_callback<F>(&mut self, model: ModelKind, callback: F)
    where
        F: Fn(&ModelEvent) + Send + Sync + 'static,
    {
        self.callbacks.register(model, callback);
    }

    /// Register a binding between two states.
    pub fn bind<R>(
        &mut self,
        source_state: BoundState,
        target_state: BoundState,
        source_element: ElementId,
        target_element: ElementId,
        resolver: R,
    ) -> Registration
    where
        R: Resolver<Engine> + 'static,
    {
        self.bindings.register(
            source_state,
            target_state,
            source_element,
            target_element,
            resolver,
        )
    }

    /// Stop every timer and forget every remembered transaction.
    pub fn reset(&mut self) {
        for element in &mut self.elements {
            for (kind, descriptor) in element.models.iter_mut() {
                let element_id = descriptor.element;
                self.timers.cancel(TimerId::transition(element_id, *kind));
                self.timers.cancel(TimerId::transaction(element_id, *kind));
                descriptor.reset();
            }
        }
        debug!(elements = self.elements.len(), "engine reset");
    }

    /// Process every timer due within the next `ms` milliseconds.
    pub fn advance(&mut self, ms: u64) {
        let until = self.timers.now_ms().saturating_add(ms);
        self.advance_to(until);
    }

    /// Process every timer due at or before `until_ms`, in deadline order.
    pub fn advance_to(&mut self, until_ms: u64) {
        while let Some(id) = self.timers.pop_due(until_ms) {
            self.on_timer(id);
        }
        self.timers.settle(until_ms);
    }

    fn on_timer(&mut self, id: TimerId) {
        trace!(element = id.element, model = %id.model, purpose = ?id.purpose, now_ms = self.now_ms(), "timer expired");
        match id.purpose {
            TimerPurpose::Transition => self.on_transition_timer(id.element, id.model),
            TimerPurpose::Transaction => {
                if let Some(descriptor) = self.descriptor_mut(id.element, id.model) {
                    descriptor.filter.expire();
                    descriptor.delta_origin = None;
                }
            }
        }
    }

    /// Copy the present state of every scene-capable model on `element` into `slot`.
    pub fn store_scene(&mut self, element: ElementId, slot: usize) -> EventStatus {
        let Some(hosted) = self.elements.get_mut(usize::from(element)) else {
            return EventStatus::InvalidElement;
        };
        if slot >= self.config.scene_slots {
            return EventStatus::InvalidParam;
        }

        let mut stored = Vec::new();
        for descriptor in hosted.models.values_mut() {
            if let Some(entry) = descriptor.scenes.get_mut(slot) {
                *entry = Some(descriptor.present);
                stored.push(descriptor.kind);
            }
        }
        if stored.is_empty() {
            return EventStatus::InvalidElement;
        }
        info!(element, slot, models = ?stored, "scene stored");
        for model in stored {
            self.persist(element, model);
        }
        EventStatus::Success
    }

    /// Move every scene-capable model on `element` to the values stored in `slot`.
    pub fn recall_scene(
        &mut self,
        element: ElementId,
        slot: usize,
        transition_ms: u32,
    ) -> EventStatus {
        let Some(hosted) = self.element(element) else {
            return EventStatus::InvalidElement;
        };
        if slot >= self.config.scene_slots {
            return EventStatus::InvalidParam;
        }

        let recalled: Vec<(ModelKind, StateValue)> = hosted
            .models()
            .filter_map(|d| d.scene(slot).map(|value| (d.kind(), value)))
            .collect();
        if recalled.is_empty() {
            return EventStatus::InvalidParam;
        }

        info!(element, slot, transition_ms, "scene recalled");
        for (model, value) in recalled {
            self.set_target(element, model, value, transition_ms, 0, UpdateSource::Scene);
        }
        EventStatus::Success
    }

    /// Publish the status of a model instance, as a periodic publication would.
    pub fn periodic_publish(&mut self, element: ElementId, model: ModelKind) -> EventStatus {
        if self.descriptor(element, model).is_none() {
            return EventStatus::InvalidElement;
        }
        self.publish_status(element, model);
        EventStatus::Success
    }

    /// Apply the power-up behaviour of every Power OnOff server.
    ///
    /// Returns the number of servers whose bindings were resolved.
    pub fn power_up(&mut self) -> usize {
        let servers: Vec<(ElementId, StateValue)> = self
            .elements
            .iter()
            .filter_map(|e| e.model(ModelKind::GenPowerOnOff))
            .map(|d| (d.element(), d.present()))
            .collect();

        info!(servers = servers.len(), "power up");
        for (element, value) in &servers {
            self.resolve_bindings(*element, ModelKind::GenPowerOnOff, *value);
        }
        servers.len()
    }

    pub(crate) fn emit(&self, event: ModelEvent) {
        self.callbacks.emit(&event);
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("elements", &self.elements)
            .field("bindings", &self.bindings.len())
            .field("now_ms", &self.timers.now_ms())
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Level, OnOff};
    use crate::transport::RecordingTransport;

    fn engine() -> (Engine, RecordingTransport) {
        let transport = RecordingTransport::new();
        let engine = Engine::builder()
            .element(
                ElementBuilder::new()
                    .model(ModelKind::GenOnOff)
                    .model(ModelKind::GenLevel),
            )
            .element(ElementBuilder::new().model(ModelKind::GenPowerOnOff))
            .transport(transport.clone())
            .build()
            .unwrap();
        (engine, transport)
    }

    #[test]
    fn descriptors_exist_for_configured_models_only() {
        let (engine, _) = engine();
        assert!(engine.descriptor(0, ModelKind::GenOnOff).is_some());
        assert!(engine.descriptor(0, ModelKind::GenPowerOnOff).is_none());
        assert!(engine.descriptor(5, ModelKind::GenOnOff).is_none());
        assert_eq!(engine.element_count(), 2);
    }

    #[test]
    fn scenes_store_and_recall_every_capable_model() {
        let (mut engine, _) = engine();
        engine.set_target(0, ModelKind::GenOnOff, OnOff::On.into(), 0, 0, UpdateSource::Application);
        engine.set_target(0, ModelKind::GenLevel, Level(500).into(), 0, 0, UpdateSource::Application);
        assert_eq!(engine.store_scene(0, 3), EventStatus::Success);

        engine.set_target(0, ModelKind::GenOnOff, OnOff::Off.into(), 0, 0, UpdateSource::Application);
        engine.set_target(0, ModelKind::GenLevel, Level(-5).into(), 0, 0, UpdateSource::Application);
        assert_eq!(engine.recall_scene(0, 3, 0), EventStatus::Success);

        assert_eq!(engine.present(0, ModelKind::GenOnOff), Some(OnOff::On.into()));
        assert_eq!(engine.present(0, ModelKind::GenLevel), Some(Level(500).into()));
        assert_eq!(
            engine.descriptor(0, ModelKind::GenLevel).map(|d| d.update_source()),
            Some(UpdateSource::Scene)
        );
    }

    #[test]
    fn scene_errors_are_reported() {
        let (mut engine, _) = engine();
        assert_eq!(engine.store_scene(9, 0), EventStatus::InvalidElement);
        assert_eq!(engine.store_scene(0, 16), EventStatus::InvalidParam);
        assert_eq!(engine.recall_scene(0, 1, 0), EventStatus::InvalidParam);
        assert_eq!(engine.store_scene(1, 0), EventStatus::InvalidElement);
    }

    #[test]
    fn reset_stops_timers_and_clears_transactions() {
        let (mut engine, _) = engine();
        engine.set_target(0, ModelKind::GenOnOff, OnOff::On.into(), 500, 0, UpdateSource::Application);
        assert_eq!(engine.timers().armed_count(), 1);

        engine.reset();
        assert_eq!(engine.timers().armed_count(), 0);
        let descriptor = engine.descriptor(0, ModelKind::GenOnOff).unwrap();
        assert!(descriptor.is_idle());
        assert_eq!(descriptor.last_transaction(), None);
    }

    #[test]
    fn periodic_publish_sends_present_state() {
        let (mut engine, transport) = engine();
        assert_eq!(engine.periodic_publish(0, ModelKind::GenOnOff), EventStatus::Success);
        assert_eq!(engine.periodic_publish(1, ModelKind::GenOnOff), EventStatus::InvalidElement);

        let published = transport.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].payload, vec![0x00]);
    }
}
