//! # greenhouse-device
//!
//! The greenhouse controller's device loop.
//!
//! This crate provides:
//! - Interfaces of the external collaborators (sensors, network, MQTT
//!   transport, broker discovery, OTA, time source)
//! - The MQTT synchronization layer: discovery, debounced state publishing,
//!   heartbeat, bounded reconnects and inbound relay commands
//! - A time-stamp sensor
//! - The cooperative [`Device`] super-loop
//!
//! Everything runs on a single thread without blocking; time is supplied
//! by a [`greenhouse_core::Clock`].

pub mod broker;
pub mod collaborators;
pub mod device;
pub mod entity;
pub mod mqtt;
pub mod reconnect;
pub mod subscription;
pub mod time;

pub use collaborators::{
    BrokerDiscovery, ConnectOptions, ConnectivityError, DiscoveryError, InboundMessage,
    MqttTransport, Network, OtaService, Sensor, SensorDescriptor, SensorError, TimeSource,
    TransportError,
};
pub use device::{Device, Tick};
pub use entity::{Entity, EntityRegistry, EntitySource};
pub use mqtt::{MqttSync, RelayCommand};
pub use reconnect::ReconnectPolicy;
pub use time::TimeStampSensor;
