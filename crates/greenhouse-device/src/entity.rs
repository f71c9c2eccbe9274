//! Discovery-registered entities.
//!
//! One [`Entity`] exists per observable or controllable quantity. Entities
//! are registered when the device starts (sensors) or when a relay first
//! appears in the configuration, and live until the device restarts.

use std::time::Duration;

use greenhouse_core::{ObjectId, Timer};
use greenhouse_protocol::{Component, Reading};
use thiserror::Error;

/// Where an entity's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitySource {
    /// Index into the device's sensor list.
    Sensor(usize),
    /// Relay expander port.
    Relay(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    #[error("entity '{0}' already registered")]
    Duplicate(ObjectId),
}

/// One entity announced to the hub.
#[derive(Debug, Clone)]
pub struct Entity {
    pub object_id: ObjectId,
    pub name: String,
    pub component: Component,
    pub source: EntitySource,
    pub unit: Option<String>,
    pub device_class: Option<String>,
    /// Value of the last successful publish in the current session.
    pub last_published: Option<Reading>,
    pub available: bool,
    /// Minimum spacing between two reads of the input.
    pub debounce: Timer,
}

impl Entity {
    pub fn new(
        object_id: ObjectId,
        name: &str,
        component: Component,
        source: EntitySource,
        debounce: Duration,
    ) -> Self {
        Self {
            object_id,
            name: name.to_string(),
            component,
            source,
            unit: None,
            device_class: None,
            last_published: None,
            available: false,
            debounce: Timer::new(debounce),
        }
    }

    /// Whether `value` differs from what the hub last received.
    ///
    /// Compared on the encoded payload, so changes below the published
    /// precision do not count.
    pub fn is_changed(&self, value: &Reading) -> bool {
        match &self.last_published {
            Some(last) => last.to_payload() != value.to_payload(),
            None => true,
        }
    }
}

/// The set of entities, in registration order.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: Vec<Entity>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entity: Entity) -> Result<&mut Entity, EntityError> {
        if self.contains(&entity.object_id) {
            return Err(EntityError::Duplicate(entity.object_id));
        }
        self.entities.push(entity);
        let last = self.entities.len() - 1;
        Ok(&mut self.entities[last])
    }

    pub fn contains(&self, object_id: &ObjectId) -> bool {
        self.get(object_id).is_some()
    }

    pub fn get(&self, object_id: &ObjectId) -> Option<&Entity> {
        self.entities.iter().find(|e| &e.object_id == object_id)
    }

    pub fn find_source(&self, source: EntitySource) -> Option<&Entity> {
        self.entities.iter().find(|e| e.source == source)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Change the debounce interval of every entity.
    pub fn set_debounce(&mut self, debounce: Duration) {
        for entity in &mut self.entities {
            entity.debounce.set_duration(debounce);
        }
    }

    /// Mark every entity unavailable and forget what was published.
    pub fn mark_unavailable(&mut self) {
        for entity in &mut self.entities {
            entity.available = false;
            entity.last_published = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str, source: EntitySource) -> Entity {
        Entity::new(
            ObjectId::new(id).unwrap(),
            id,
            Component::Sensor,
            source,
            Duration::from_millis(30),
        )
    }

    #[test]
    fn test_object_ids_are_unique() {
        let mut registry = EntityRegistry::new();
        registry.register(entity("temp", EntitySource::Sensor(0))).unwrap();
        let err = registry
            .register(entity("temp", EntitySource::Sensor(1)))
            .unwrap_err();
        assert_eq!(err, EntityError::Duplicate(ObjectId::new("temp").unwrap()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_find_by_source() {
        let mut registry = EntityRegistry::new();
        registry.register(entity("temp", EntitySource::Sensor(0))).unwrap();
        registry.register(entity("pump", EntitySource::Relay(3))).unwrap();
        assert_eq!(
            registry.find_source(EntitySource::Relay(3)).unwrap().object_id.as_str(),
            "pump"
        );
        assert!(registry.find_source(EntitySource::Relay(4)).is_none());
    }

    #[test]
    fn test_mark_unavailable_forgets_published_values() {
        let mut registry = EntityRegistry::new();
        let e = registry.register(entity("temp", EntitySource::Sensor(0))).unwrap();
        e.available = true;
        e.last_published = Some(Reading::Number(20.0));

        registry.mark_unavailable();
        let e = registry.iter().next().unwrap();
        assert!(!e.available);
        assert!(e.is_changed(&Reading::Number(20.0)));
    }

    #[test]
    fn test_change_below_published_precision_is_no_change() {
        let mut e = entity("temp", EntitySource::Sensor(0));
        e.last_published = Some(Reading::Number(20.001));

        assert!(!e.is_changed(&Reading::Number(20.002)));
        assert!(!e.is_changed(&Reading::Number(20.0)));
        assert!(e.is_changed(&Reading::Number(20.01)));
        assert!(!e.is_changed(&Reading::Text("20".into())));
        assert!(e.is_changed(&Reading::Bool(true)));
    }
}
