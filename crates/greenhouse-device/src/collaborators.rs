//! Interfaces of the external collaborators driven by the device loop.
//!
//! Every call is synchronous and must return promptly: implementations
//! poll their hardware or socket and report what they have, they never
//! wait for it.

use greenhouse_core::{BrokerAddress, ConfigRecord, Instant, NetworkConfig};
use greenhouse_protocol::{Component, Reading};
use thiserror::Error;

/// Sensor read failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("sensor unavailable: {0}")]
    Unavailable(String),
}

/// Failure reported by the MQTT transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection refused: {0}")]
    Refused(String),
    #[error("not connected")]
    NotConnected,
    #[error("transport I/O error: {0}")]
    Io(String),
}

/// Automatic broker discovery failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("no broker announced")]
    NotFound,
    #[error("discovery query failed: {0}")]
    Query(String),
}

/// Link or broker unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectivityError {
    #[error("network link down")]
    LinkDown,
    #[error("broker {broker} unreachable: {source}")]
    BrokerUnreachable {
        broker: BrokerAddress,
        #[source]
        source: TransportError,
    },
}

/// How a sensor is announced to the hub.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorDescriptor {
    pub name: String,
    pub component: Component,
    pub unit: Option<String>,
    pub device_class: Option<String>,
}

impl SensorDescriptor {
    pub fn sensor(name: &str) -> Self {
        Self {
            name: name.to_string(),
            component: Component::Sensor,
            unit: None,
            device_class: None,
        }
    }

    pub fn binary(name: &str) -> Self {
        Self {
            component: Component::BinarySensor,
            ..Self::sensor(name)
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn with_device_class(mut self, class: &str) -> Self {
        self.device_class = Some(class.to_string());
        self
    }
}

/// A local input.
pub trait Sensor {
    fn descriptor(&self) -> SensorDescriptor;

    fn begin(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn read(&mut self, now: Instant) -> Result<Reading, SensorError>;

    /// The configuration changed.
    fn configure(&mut self, config: &ConfigRecord) {}
}

/// The network link (association, hostname announcement).
pub trait Network {
    /// Drive the link state machine one step.
    fn poll(&mut self, now: Instant) {}

    fn is_connected(&self) -> bool;

    /// Credentials changed; reassociate.
    fn configure(&mut self, config: &NetworkConfig) {}

    /// Hostname or device name changed; re-announce.
    fn announce(&mut self, hostname: &str, device_name: &str) {}
}

/// Session parameters for [`MqttTransport::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub broker: BrokerAddress,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub will_topic: String,
    pub will_payload: String,
}

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: &str, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.to_string(),
            payload: payload.into(),
        }
    }
}

/// MQTT client session.
pub trait MqttTransport {
    /// Try to open a session. Must be bounded by a short timeout.
    fn connect(&mut self, options: &ConnectOptions) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError>;

    fn subscribe(&mut self, filter: &str) -> Result<(), TransportError>;

    /// Next buffered inbound message, if any.
    fn poll(&mut self) -> Option<InboundMessage>;

    fn disconnect(&mut self);
}

/// Locates a broker on the local network.
pub trait BrokerDiscovery {
    fn discover(&mut self) -> Result<BrokerAddress, DiscoveryError>;
}

/// Over-the-air update service.
pub trait OtaService {
    /// Service a pending transfer, if any.
    fn poll(&mut self);
}

/// Wall-clock source (NTP on the device).
pub trait TimeSource {
    /// Current Unix time in seconds.
    fn epoch_seconds(&mut self) -> Result<i64, SensorError>;
}

impl<S: Sensor + ?Sized> Sensor for Box<S> {
    fn descriptor(&self) -> SensorDescriptor {
        (**self).descriptor()
    }

    fn begin(&mut self) -> Result<(), SensorError> {
        (**self).begin()
    }

    fn read(&mut self, now: Instant) -> Result<Reading, SensorError> {
        (**self).read(now)
    }

    fn configure(&mut self, config: &ConfigRecord) {
        (**self).configure(config)
    }
}
