//! # greenhouse-protocol
//!
//! MQTT message formats of the greenhouse controller.
//!
//! This crate defines the Home Assistant discovery topics and payloads,
//! the state and availability payloads, and inbound command decoding.

pub mod codec;
pub mod discovery;
pub mod messages;

pub use codec::CodecError;
pub use discovery::{Component, DeviceInfo, DiscoveryConfig, Topics};
pub use messages::*;
