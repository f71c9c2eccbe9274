//! MQTT synchronization layer.
//!
//! [`MqttSync`] keeps the hub's view of the device current:
//!
//! - on every new session it announces each entity with a retained
//!   discovery document and subscribes to the command and user topics;
//! - each input is read at most once per debounce interval and published
//!   only when the value differs from the last published one;
//! - a liveness flag is flipped on a fixed heartbeat, whatever the traffic;
//! - lost sessions are re-established under a bounded [`ReconnectPolicy`].
//!
//! Inbound relay commands are decoded inline and handed back to the caller
//! as [`RelayCommand`]s; nothing here waits on I/O.

use std::time::Duration;

use greenhouse_core::{
    ConfigRecord, Event, Instant, MqttConfig, ObjectId, Observer, RelayConfig, Timer,
};
use greenhouse_protocol::codec::{decode_switch_command, encode_discovery};
use greenhouse_protocol::{
    Availability, Component, DeviceInfo, DiscoveryConfig, Reading, Topics, PAYLOAD_OFFLINE,
};
use tracing::{debug, info, warn};

use crate::broker::select_broker;
use crate::collaborators::{
    BrokerDiscovery, ConnectOptions, ConnectivityError, MqttTransport, Sensor, SensorDescriptor,
    TransportError,
};
use crate::entity::{Entity, EntityRegistry, EntitySource};
use crate::reconnect::ReconnectPolicy;
use crate::subscription::SubscriptionManager;

/// Inbound messages handled per poll.
pub const MAX_INBOUND_PER_POLL: usize = 16;

/// A relay command received from the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayCommand {
    pub port: u8,
    pub on: bool,
}

/// The MQTT side of the device.
pub struct MqttSync<T> {
    transport: T,
    discovery: Option<Box<dyn BrokerDiscovery>>,
    client_id: String,
    config: MqttConfig,
    topics: Topics,
    device_info: DeviceInfo,
    entities: EntityRegistry,
    subscriptions: SubscriptionManager,
    reconnect: ReconnectPolicy,
    heartbeat: Timer,
    heartbeat_flag: Availability,
    input_poll: Duration,
    session: bool,
}

impl<T: MqttTransport> MqttSync<T> {
    pub fn new(transport: T, client_id: &str) -> Self {
        let defaults = ConfigRecord::default();
        let topics = topics_for(&defaults);
        Self {
            transport,
            discovery: None,
            client_id: client_id.to_string(),
            device_info: DeviceInfo::new(topics.node_id().as_str(), &defaults.device.name),
            topics,
            config: defaults.mqtt,
            entities: EntityRegistry::new(),
            subscriptions: SubscriptionManager::new(),
            reconnect: ReconnectPolicy::from_timing(&defaults.timing),
            heartbeat: Timer::new(defaults.timing.availability()),
            heartbeat_flag: Availability::Online,
            input_poll: defaults.timing.input_poll(),
            session: false,
        }
    }

    pub fn with_broker_discovery(mut self, discovery: Box<dyn BrokerDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    // ========================================================================
    // Entity registration
    // ========================================================================

    /// Register the entity of sensor `index`.
    pub fn register_sensor(&mut self, index: usize, descriptor: &SensorDescriptor) -> Option<ObjectId> {
        let candidates = [
            ObjectId::sanitize(&descriptor.name),
            ObjectId::sanitize(&format!("{}_{index}", descriptor.name)),
        ];
        let mut entity = Entity::new(
            candidates[0].clone(),
            &descriptor.name,
            descriptor.component,
            EntitySource::Sensor(index),
            self.input_poll,
        );
        entity.unit = descriptor.unit.clone();
        entity.device_class = descriptor.device_class.clone();
        self.register(entity, candidates)
    }

    /// Register entities for relays not seen before. Existing entities are
    /// kept as they are, even for relays that were removed.
    pub fn register_relays(&mut self, relays: &[RelayConfig]) {
        for relay in relays {
            if self
                .entities
                .find_source(EntitySource::Relay(relay.port))
                .is_some()
            {
                continue;
            }
            let candidates = [
                ObjectId::sanitize(&relay.name),
                ObjectId::sanitize(&format!("relay_{}", relay.port)),
            ];
            let entity = Entity::new(
                candidates[0].clone(),
                &relay.name,
                Component::Switch,
                EntitySource::Relay(relay.port),
                self.input_poll,
            );
            self.register(entity, candidates);
        }
    }

    fn register(&mut self, mut entity: Entity, candidates: [ObjectId; 2]) -> Option<ObjectId> {
        let Some(object_id) = candidates.into_iter().find(|id| !self.entities.contains(id)) else {
            warn!(name = %entity.name, "no free object id, entity not registered");
            return None;
        };
        entity.object_id = object_id.clone();
        info!(object_id = %object_id, component = %entity.component, "entity registered");

        let entity = match self.entities.register(entity) {
            Ok(entity) => entity,
            Err(error) => {
                warn!(%error, "entity not registered");
                return None;
            }
        };
        if self.session {
            match announce(&mut self.transport, &self.topics, &self.device_info, entity) {
                Ok(()) => entity.available = true,
                Err(error) => warn!(%error, object_id = %object_id, "announcing entity failed"),
            }
        }
        Some(object_id)
    }

    // ========================================================================
    // Polling
    // ========================================================================

    /// One step of the synchronization layer.
    ///
    /// `relay_output` reports the current output of a relay port, or `None`
    /// when the port no longer exists.
    pub fn poll<F>(
        &mut self,
        now: Instant,
        link_up: bool,
        sensors: &mut [Box<dyn Sensor>],
        relay_output: F,
    ) -> Vec<RelayCommand>
    where
        F: Fn(u8) -> Option<bool>,
    {
        if !self.transport.is_connected() {
            if self.session {
                warn!("broker connection lost, entities unavailable");
                self.end_session();
            }
            if !link_up || !self.reconnect.poll(now) {
                return Vec::new();
            }
            if let Err(error) = self.connect(now) {
                warn!(
                    %error,
                    attempt = self.reconnect.attempts(),
                    exhausted = self.reconnect.is_exhausted(),
                    "broker connection failed"
                );
                return Vec::new();
            }
        }

        let commands = self.process_inbound();
        self.publish_states(now, sensors, &relay_output);
        self.beat(now);
        commands
    }

    /// The network link went down: drop the session.
    pub fn on_link_down(&mut self) {
        if self.session {
            let error = ConnectivityError::LinkDown;
            warn!(%error, "broker session dropped, entities unavailable");
            self.transport.disconnect();
            self.end_session();
        }
    }

    fn connect(&mut self, now: Instant) -> Result<(), ConnectivityError> {
        let broker = select_broker(self.discovery.as_deref_mut(), &self.config);
        let options = ConnectOptions {
            broker: broker.clone(),
            client_id: self.client_id.clone(),
            username: non_empty(&self.config.username),
            password: non_empty(&self.config.password),
            will_topic: self.topics.availability(),
            will_payload: PAYLOAD_OFFLINE.to_string(),
        };
        info!(%broker, client_id = %self.client_id, "connecting to broker");
        self.transport
            .connect(&options)
            .map_err(|source| ConnectivityError::BrokerUnreachable {
                broker: broker.clone(),
                source,
            })?;

        info!(%broker, "broker connected");
        self.session = true;
        self.reconnect.reset();
        if !self.heartbeat.is_started() {
            self.heartbeat.restart(now);
        }

        let availability = self.topics.availability();
        if let Err(error) = self.transport.publish(
            &availability,
            Availability::Online.as_payload().as_bytes(),
            true,
        ) {
            warn!(%error, "publishing availability failed");
        }

        for entity in self.entities.iter_mut() {
            entity.last_published = None;
            match announce(&mut self.transport, &self.topics, &self.device_info, entity) {
                Ok(()) => entity.available = true,
                Err(error) => warn!(%error, object_id = %entity.object_id, "announcing entity failed"),
            }
        }

        for filter in self.subscriptions.filters() {
            if let Err(error) = self.transport.subscribe(filter) {
                warn!(%error, filter, "subscribing failed");
            }
        }
        Ok(())
    }

    fn end_session(&mut self) {
        self.session = false;
        self.entities.mark_unavailable();
    }

    fn process_inbound(&mut self) -> Vec<RelayCommand> {
        let mut commands = Vec::new();
        for _ in 0..MAX_INBOUND_PER_POLL {
            let Some(message) = self.transport.poll() else {
                break;
            };

            if let Some(object_id) = self.topics.parse_command(&message.topic) {
                let port = match self.entities.get(&object_id).map(|e| e.source) {
                    Some(EntitySource::Relay(port)) => port,
                    _ => {
                        debug!(topic = %message.topic, "command for unknown entity ignored");
                        continue;
                    }
                };
                match decode_switch_command(&message.payload) {
                    Ok(command) => {
                        debug!(port, on = command.is_on(), "relay command received");
                        commands.push(RelayCommand {
                            port,
                            on: command.is_on(),
                        });
                    }
                    Err(error) => warn!(%error, topic = %message.topic, "bad relay command"),
                }
                continue;
            }

            if !self.subscriptions.record(&message.topic, &message.payload) {
                debug!(topic = %message.topic, "unsolicited message ignored");
            }
        }
        commands
    }

    fn publish_states<F>(&mut self, now: Instant, sensors: &mut [Box<dyn Sensor>], relay_output: &F)
    where
        F: Fn(u8) -> Option<bool>,
    {
        for entity in self.entities.iter_mut() {
            if !entity.debounce.has_elapsed(now) {
                continue;
            }
            entity.debounce.restart(now);

            let value = match entity.source {
                EntitySource::Sensor(index) => {
                    let Some(sensor) = sensors.get_mut(index) else {
                        continue;
                    };
                    match sensor.read(now) {
                        Ok(value) => value,
                        Err(error) => {
                            debug!(%error, object_id = %entity.object_id, "read failed");
                            continue;
                        }
                    }
                }
                EntitySource::Relay(port) => match relay_output(port) {
                    Some(on) => Reading::Bool(on),
                    None => continue,
                },
            };

            if !entity.is_changed(&value) {
                continue;
            }
            let topic = self.topics.state(&entity.object_id);
            match self
                .transport
                .publish(&topic, value.to_payload().as_bytes(), true)
            {
                Ok(()) => {
                    debug!(topic = %topic, value = %value, "state published");
                    entity.last_published = Some(value);
                }
                Err(error) => warn!(%error, topic = %topic, "state publish failed"),
            }
        }
    }

    fn beat(&mut self, now: Instant) {
        if !self.heartbeat.fire(now) {
            return;
        }
        self.heartbeat_flag = self.heartbeat_flag.toggled();
        self.heartbeat.restart(now);
        let topic = self.topics.heartbeat();
        if let Err(error) = self.transport.publish(
            &topic,
            self.heartbeat_flag.as_payload().as_bytes(),
            false,
        ) {
            warn!(%error, "heartbeat publish failed");
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    fn apply_config(&mut self, config: &ConfigRecord) {
        let topics = topics_for(config);
        let device_info = DeviceInfo::new(topics.node_id().as_str(), &config.device.name);

        let mut session_changed = topics != self.topics
            || device_info != self.device_info
            || config.mqtt != self.config;
        session_changed |= self.subscriptions.set_filters(&config.mqtt.topics);

        self.topics = topics;
        self.device_info = device_info;
        self.config = config.mqtt.clone();

        self.input_poll = config.timing.input_poll();
        self.entities.set_debounce(self.input_poll);
        self.heartbeat.set_duration(config.timing.availability());
        self.reconnect.set_timing(&config.timing);

        if session_changed && self.session {
            info!("broker settings changed, restarting session");
            if let Err(error) = self.transport.publish(
                &self.topics.availability(),
                PAYLOAD_OFFLINE.as_bytes(),
                true,
            ) {
                debug!(%error, "offline notice not sent");
            }
            self.transport.disconnect();
            self.end_session();
            self.reconnect.reset();
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Whether a session is established.
    pub fn is_online(&self) -> bool {
        self.session
    }

    /// Current value of the heartbeat flag.
    pub fn heartbeat_flag(&self) -> Availability {
        self.heartbeat_flag
    }
}

impl<T: MqttTransport> Observer for MqttSync<T> {
    fn update(&mut self, event: Event, config: &ConfigRecord) {
        match event {
            Event::ConfigChanged => self.apply_config(config),
            Event::RelaysChanged => self.register_relays(&config.relays),
            Event::NetworkChanged | Event::MdnsChanged => {}
        }
    }
}

fn topics_for(config: &ConfigRecord) -> Topics {
    Topics::new(
        ObjectId::sanitize(&config.device.hostname),
        &config.mqtt.discovery_prefix,
    )
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Publish the discovery document of `entity` and subscribe to its command
/// topic.
fn announce<T: MqttTransport>(
    transport: &mut T,
    topics: &Topics,
    device: &DeviceInfo,
    entity: &Entity,
) -> Result<(), TransportError> {
    let mut document = DiscoveryConfig::new(
        topics,
        entity.component,
        &entity.object_id,
        &entity.name,
        device.clone(),
    );
    document.unit_of_measurement = entity.unit.clone();
    document.device_class = entity.device_class.clone();

    let payload = encode_discovery(&document).map_err(|e| TransportError::Io(e.to_string()))?;
    transport.publish(
        &topics.discovery(entity.component, &entity.object_id),
        payload.as_bytes(),
        true,
    )?;
    if entity.component.is_commandable() {
        transport.subscribe(&topics.command(&entity.object_id))?;
    }
    debug!(object_id = %entity.object_id, "entity announced");
    Ok(())
}
