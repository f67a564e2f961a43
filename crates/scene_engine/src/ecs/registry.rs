//! Component factory table
//!
//! Maps stable numeric type keys to constructors so scene snapshots can
//! rebuild components from `(type id, metadata)` pairs. Populated once at
//! startup and then shared read-only.

use std::collections::BTreeMap;

use super::component::{Component, ComponentKind, ComponentTypeId};

type Factory = Box<dyn Fn() -> Box<dyn Component> + Send + Sync>;

struct Registration {
    name: &'static str,
    factory: Factory,
}

/// Factory table keyed by component type id
#[derive(Default)]
pub struct ComponentRegistry {
    entries: BTreeMap<ComponentTypeId, Registration>,
}

impl ComponentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a default-constructible component type
    ///
    /// # Panics
    ///
    /// Registering two types under the same key is a programming error.
    pub fn register<T: ComponentKind + Default>(&mut self) -> &mut Self {
        self.register_with(T::TYPE, T::NAME, || Box::new(T::default()))
    }

    /// Register a constructor under an explicit key
    ///
    /// # Panics
    ///
    /// Panics if `type_id` is already registered.
    pub fn register_with<F>(&mut self, type_id: ComponentTypeId, name: &'static str, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Component> + Send + Sync + 'static,
    {
        if let Some(existing) = self.entries.get(&type_id) {
            panic!(
                "component type {} registered twice ({} and {})",
                type_id, existing.name, name
            );
        }

        log::debug!("Registered component type {} as {}", type_id, name);
        self.entries.insert(
            type_id,
            Registration {
                name,
                factory: Box::new(factory),
            },
        );
        self
    }

    /// Construct a fresh component of the given type
    pub fn create(&self, type_id: ComponentTypeId) -> Option<Box<dyn Component>> {
        self.entries.get(&type_id).map(|entry| (entry.factory)())
    }

    /// Whether a type is registered
    pub fn contains(&self, type_id: ComponentTypeId) -> bool {
        self.entries.contains_key(&type_id)
    }

    /// Registered name of a type
    pub fn name(&self, type_id: ComponentTypeId) -> Option<&'static str> {
        self.entries.get(&type_id).map(|entry| entry.name)
    }

    /// Look a type up by its registered name
    pub fn type_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.name == name)
            .map(|(type_id, _)| *type_id)
    }

    /// Registered `(type, name)` pairs in key order
    pub fn names(&self) -> Vec<(ComponentTypeId, &'static str)> {
        self.entries.iter().map(|(type_id, entry)| (*type_id, entry.name)).collect()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(type_id, entry)| (type_id, entry.name)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Spinner {
        speed: f32,
    }

    impl Component for Spinner {
        crate::component_identity!();
    }

    impl ComponentKind for Spinner {
        const TYPE: ComponentTypeId = ComponentTypeId(902);
        const NAME: &'static str = "Spinner";
    }

    #[test]
    fn test_create_registered_type() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Spinner>();

        let component = registry.create(Spinner::TYPE).unwrap();
        assert_eq!(component.component_type(), Spinner::TYPE);
        assert_eq!(component.as_any().downcast_ref::<Spinner>().map(|s| s.speed), Some(0.0));
        assert_eq!(registry.type_by_name("Spinner"), Some(Spinner::TYPE));
        assert!(registry.create(ComponentTypeId(1)).is_none());
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_duplicate_registration_panics() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Spinner>().register::<Spinner>();
    }
}
