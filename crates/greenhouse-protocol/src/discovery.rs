//! Home Assistant MQTT discovery.
//!
//! Each entity is announced with a retained JSON document on
//! `<discovery_prefix>/<component>/<node_id>/<object_id>/config`. The
//! document points the hub at the entity's state topic, its command topic
//! (switches only) and the shared availability topic.

use std::fmt;

use greenhouse_core::ObjectId;
use serde::Serialize;

use crate::messages::{PAYLOAD_OFF, PAYLOAD_OFFLINE, PAYLOAD_ON, PAYLOAD_ONLINE};

/// Root of all non-discovery topics.
pub const TOPIC_ROOT: &str = "greenhouse";

/// Home Assistant entity platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Sensor,
    BinarySensor,
    Switch,
}

impl Component {
    pub fn as_str(self) -> &'static str {
        match self {
            Component::Sensor => "sensor",
            Component::BinarySensor => "binary_sensor",
            Component::Switch => "switch",
        }
    }

    /// Whether the hub can send commands to this entity.
    pub fn is_commandable(self) -> bool {
        self == Component::Switch
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topic layout for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    node_id: ObjectId,
    discovery_prefix: String,
}

impl Topics {
    pub fn new(node_id: ObjectId, discovery_prefix: &str) -> Self {
        Self {
            node_id,
            discovery_prefix: discovery_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn node_id(&self) -> &ObjectId {
        &self.node_id
    }

    pub fn discovery_prefix(&self) -> &str {
        &self.discovery_prefix
    }

    /// `<prefix>/<component>/<node_id>/<object_id>/config`
    pub fn discovery(&self, component: Component, object_id: &ObjectId) -> String {
        format!(
            "{}/{}/{}/{}/config",
            self.discovery_prefix, component, self.node_id, object_id
        )
    }

    pub fn state(&self, object_id: &ObjectId) -> String {
        format!("{TOPIC_ROOT}/{}/{}/state", self.node_id, object_id)
    }

    pub fn command(&self, object_id: &ObjectId) -> String {
        format!("{TOPIC_ROOT}/{}/{}/set", self.node_id, object_id)
    }

    /// Shared availability topic, also used as the last will.
    pub fn availability(&self) -> String {
        format!("{TOPIC_ROOT}/{}/availability", self.node_id)
    }

    /// Topic carrying the periodically flipped liveness flag.
    pub fn heartbeat(&self) -> String {
        format!("{TOPIC_ROOT}/{}/heartbeat", self.node_id)
    }

    /// Object id addressed by a command topic of this node.
    pub fn parse_command(&self, topic: &str) -> Option<ObjectId> {
        let rest = topic.strip_prefix(TOPIC_ROOT)?.strip_prefix('/')?;
        let rest = rest.strip_prefix(self.node_id.as_str())?.strip_prefix('/')?;
        let object = rest.strip_suffix("/set")?;
        ObjectId::new(object).ok()
    }
}

/// The `device` block shared by every entity of the node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
}

impl DeviceInfo {
    pub fn new(identifier: &str, name: &str) -> Self {
        Self {
            identifiers: vec![identifier.to_string()],
            name: name.to_string(),
            manufacturer: "Greenhouse".to_string(),
            model: "Tower Controller".to_string(),
            sw_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }
    }
}

/// Discovery document for one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryConfig {
    pub name: String,
    pub unique_id: String,
    pub object_id: String,
    pub state_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    pub availability_topic: String,
    pub payload_available: &'static str,
    pub payload_not_available: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    pub device: DeviceInfo,
}

impl DiscoveryConfig {
    pub fn new(
        topics: &Topics,
        component: Component,
        object_id: &ObjectId,
        name: &str,
        device: DeviceInfo,
    ) -> Self {
        let binary = matches!(component, Component::Switch | Component::BinarySensor);
        Self {
            name: name.to_string(),
            unique_id: format!("{}_{}", topics.node_id(), object_id),
            object_id: object_id.to_string(),
            state_topic: topics.state(object_id),
            command_topic: component
                .is_commandable()
                .then(|| topics.command(object_id)),
            availability_topic: topics.availability(),
            payload_available: PAYLOAD_ONLINE,
            payload_not_available: PAYLOAD_OFFLINE,
            payload_on: binary.then_some(PAYLOAD_ON),
            payload_off: binary.then_some(PAYLOAD_OFF),
            unit_of_measurement: None,
            device_class: None,
            device,
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit_of_measurement = Some(unit.to_string());
        self
    }

    pub fn with_device_class(mut self, class: &str) -> Self {
        self.device_class = Some(class.to_string());
        self
    }
}
