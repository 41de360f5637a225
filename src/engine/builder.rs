//! Fluent construction of an [`Engine`].

use super::error::BuildError;
use super::Engine;
use crate::bindings::BindingTable;
use crate::config::EngineConfig;
use crate::core::{ElementId, ModelKind, StateValue};
use crate::descriptor::{Element, ModelDescriptor, PersistHook};
use crate::events::EventCallbacks;
use crate::snapshot::DescriptorSnapshot;
use crate::timer::{TimerQueue, VirtualTimers};
use crate::transport::{NullTransport, Transport};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Models of a single element.
#[derive(Default)]
pub struct ElementBuilder {
    models: Vec<ModelKind>,
    initial: Vec<StateValue>,
    hooks: Vec<(ModelKind, PersistHook)>,
}

impl ElementBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host a server model on this element.
    pub fn model(mut self, kind: ModelKind) -> Self {
        self.models.push(kind);
        self
    }

    /// Start the matching model at `value` instead of its default.
    pub fn initial(mut self, value: StateValue) -> Self {
        self.initial.push(value);
        self
    }

    /// Persist the model's state through `hook`.
    pub fn persist<F>(mut self, kind: ModelKind, hook: F) -> Self
    where
        F: Fn(&DescriptorSnapshot) + Send + Sync + 'static,
    {
        self.hooks.push((kind, Arc::new(hook)));
        self
    }

    fn build(self, element: ElementId, config: &EngineConfig) -> Result<Element, BuildError> {
        if self.models.is_empty() {
            return Err(BuildError::EmptyElement { element });
        }

        let mut models = BTreeMap::new();
        for kind in self.models {
            let descriptor = ModelDescriptor::new(
                element,
                kind,
                StateValue::initial_for(kind),
                config.scene_slots,
                config.history_limit,
            );
            if models.insert(kind, descriptor).is_some() {
                return Err(BuildError::DuplicateModel {
                    element,
                    model: kind,
                });
            }
        }

        for value in self.initial {
            let model = value.model_kind();
            if !value.is_legal() {
                return Err(BuildError::IllegalInitialValue { element, model });
            }
            let descriptor = models
                .get_mut(&model)
                .ok_or(BuildError::UnknownModel { element, model })?;
            descriptor.present = value;
            descriptor.target = value;
        }

        for (model, hook) in self.hooks {
            models
                .get_mut(&model)
                .ok_or(BuildError::UnknownModel { element, model })?
                .set_persist_hook(hook);
        }

        Ok(Element { models })
    }
}

/// Builder for an [`Engine`] with a fluent API.
///
/// Elements are numbered in the order they are added, starting at 0.
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    elements: Vec<ElementBuilder>,
    timers: Option<Box<dyn TimerQueue>>,
    transport: Option<Box<dyn Transport>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Add the next element.
    pub fn element(mut self, element: ElementBuilder) -> Self {
        self.elements.push(element);
        self
    }

    /// Add `count` elements hosting nothing but `kind`.
    pub fn elements_with(mut self, kind: ModelKind, count: usize) -> Self {
        for _ in 0..count {
            self.elements.push(ElementBuilder::new().model(kind));
        }
        self
    }

    /// Host `kind` on the most recently added element, adding one if none exists.
    pub fn model(mut self, kind: ModelKind) -> Self {
        match self.elements.pop() {
            Some(last) => self.elements.push(last.model(kind)),
            None => self.elements.push(ElementBuilder::new().model(kind)),
        }
        self
    }

    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn timers<Q: TimerQueue + 'static>(mut self, timers: Q) -> Self {
        self.timers = Some(Box::new(timers));
        self
    }

    /// Build the engine.
    /// Returns an error if the configuration or the element table is invalid.
    pub fn build(self) -> Result<Engine, BuildError> {
        let config = self.config.checked()?;

        if self.elements.is_empty() {
            return Err(BuildError::NoElements);
        }
        if self.elements.len() > usize::from(ElementId::MAX) + 1 {
            return Err(BuildError::TooManyElements(self.elements.len()));
        }

        let elements = self
            .elements
            .into_iter()
            .enumerate()
            .map(|(index, element)| element.build(index as ElementId, &config))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            elements = elements.len(),
            models = elements.iter().map(|e| e.models.len()).sum::<usize>(),
            "engine built"
        );

        Ok(Engine {
            bindings: BindingTable::with_capacity(config.binding_capacity),
            config,
            elements,
            timers: self
                .timers
                .unwrap_or_else(|| Box::new(VirtualTimers::new())),
            transport: self.transport.unwrap_or_else(|| Box::new(NullTransport)),
            callbacks: EventCallbacks::new(),
            bind_depth: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::core::{Level, OnOff};

    #[test]
    fn builder_requires_elements() {
        let result = EngineBuilder::new().build();
        assert!(matches!(result, Err(BuildError::NoElements)));
    }

    #[test]
    fn builder_rejects_empty_element() {
        let result = EngineBuilder::new()
            .element(ElementBuilder::new().model(ModelKind::GenOnOff))
            .element(ElementBuilder::new())
            .build();
        assert!(matches!(result, Err(BuildError::EmptyElement { element: 1 })));
    }

    #[test]
    fn builder_rejects_duplicate_models() {
        let result = EngineBuilder::new()
            .model(ModelKind::GenLevel)
            .model(ModelKind::GenLevel)
            .build();
        assert!(matches!(
            result,
            Err(BuildError::DuplicateModel {
                element: 0,
                model: ModelKind::GenLevel
            })
        ));
    }

    #[test]
    fn builder_applies_initial_values() {
        let engine = EngineBuilder::new()
            .element(
                ElementBuilder::new()
                    .model(ModelKind::GenOnOff)
                    .initial(OnOff::On.into()),
            )
            .build()
            .unwrap();
        assert_eq!(
            engine.present(0, ModelKind::GenOnOff),
            Some(StateValue::OnOff(OnOff::On))
        );
    }

    #[test]
    fn initial_value_needs_a_hosted_model() {
        let result = EngineBuilder::new()
            .element(
                ElementBuilder::new()
                    .model(ModelKind::GenOnOff)
                    .initial(Level(3).into()),
            )
            .build();
        assert!(matches!(
            result,
            Err(BuildError::UnknownModel {
                element: 0,
                model: ModelKind::GenLevel
            })
        ));
    }

    #[test]
    fn builder_validates_configuration() {
        let result = EngineBuilder::new()
            .config(EngineConfig {
                move_interval_ms: 0,
                ..EngineConfig::default()
            })
            .model(ModelKind::GenOnOff)
            .build();
        assert!(matches!(
            result,
            Err(BuildError::InvalidConfig(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn model_without_element_starts_one() {
        let engine = EngineBuilder::new()
            .model(ModelKind::GenOnOff)
            .model(ModelKind::GenPowerOnOff)
            .elements_with(ModelKind::GenLevel, 2)
            .build()
            .unwrap();
        assert_eq!(engine.element_count(), 3);
        assert!(engine.descriptor(0, ModelKind::GenPowerOnOff).is_some());
        assert!(engine.descriptor(2, ModelKind::GenLevel).is_some());
    }
}
