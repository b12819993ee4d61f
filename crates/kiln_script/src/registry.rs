//! Behavior class registry
//!
//! Maps behavior class names to factories. How a host decides which classes
//! belong on which entities is its own business; the registry only turns a
//! name plus an entity into a fresh instance.

use crate::behavior::Behavior;
use crate::error::{BridgeError, Result};
use kiln_core::EntityId;
use std::collections::BTreeMap;

/// Builds one behavior instance for the given entity.
pub type BehaviorFactory = Box<dyn Fn(EntityId) -> Result<Box<dyn Behavior>>>;

#[derive(Default)]
pub struct BehaviorRegistry {
    factories: BTreeMap<String, BehaviorFactory>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory; an existing registration under the same name is replaced.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(EntityId) -> Result<Box<dyn Behavior>> + 'static,
    {
        let name = name.into();
        if self.factories.insert(name.clone(), Box::new(factory)).is_some() {
            tracing::warn!(behavior = %name, "behavior re-registered, previous factory replaced");
        } else {
            tracing::debug!(behavior = %name, "behavior registered");
        }
    }

    /// Register a native behavior built from its `Default` value.
    pub fn register_default<T>(&mut self, name: impl Into<String>)
    where
        T: Behavior + Default + 'static,
    {
        self.register(name, |_| Ok(Box::new(T::default()) as Box<dyn Behavior>));
    }

    pub fn create(&self, name: &str, entity: EntityId) -> Result<Box<dyn Behavior>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| BridgeError::UnknownBehavior(name.to_owned()))?;
        factory(entity)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Spinner;
    impl Behavior for Spinner {}

    #[test]
    fn create_by_name() {
        let mut registry = BehaviorRegistry::new();
        registry.register_default::<Spinner>("Spinner");

        assert!(registry.contains("Spinner"));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Spinner"]);
        let behavior = registry.create("Spinner", EntityId::from_raw(1)).unwrap();
        assert_eq!(behavior.name(), "Spinner");
    }

    #[test]
    fn unknown_name_is_reported() {
        let registry = BehaviorRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(
            registry.create("Missing", EntityId::from_raw(1)).err(),
            Some(BridgeError::UnknownBehavior("Missing".into()))
        );
    }

    #[test]
    fn factories_see_the_target_entity() {
        let mut registry = BehaviorRegistry::new();
        registry.register("Picky", |entity: EntityId| {
            if entity.raw() == 2 {
                Ok(Box::new(Spinner) as Box<dyn Behavior>)
            } else {
                Err(BridgeError::Lifecycle(format!("refusing {entity}")))
            }
        });

        assert!(registry.create("Picky", EntityId::from_raw(2)).is_ok());
        assert!(registry.create("Picky", EntityId::from_raw(3)).is_err());
        assert_eq!(registry.len(), 1);
    }
}
