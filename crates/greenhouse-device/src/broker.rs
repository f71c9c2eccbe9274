//! Broker selection.
//!
//! When broker discovery is enabled the announced broker is preferred.
//! If discovery is disabled, unavailable or fails, the configured broker
//! (or the static fallback when none is configured) is used instead. A
//! discovered address is never written back into the config store.

use greenhouse_core::model::{MQTT_PORT, MQTT_PORT_SECURE};
use greenhouse_core::{BrokerAddress, MqttConfig};
use tracing::{info, warn};

use crate::collaborators::BrokerDiscovery;

/// Classification of a discovered broker port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortClass {
    Plain,
    Secure,
    Unset,
    Unusual,
}

pub fn classify_port(port: u16) -> PortClass {
    match port {
        MQTT_PORT => PortClass::Plain,
        MQTT_PORT_SECURE => PortClass::Secure,
        0 => PortClass::Unset,
        _ => PortClass::Unusual,
    }
}

/// Pick the broker for the next connection attempt.
pub fn select_broker<D>(discovery: Option<&mut D>, config: &MqttConfig) -> BrokerAddress
where
    D: BrokerDiscovery + ?Sized,
{
    let fallback = config.broker();
    if !config.broker_discovery {
        return fallback;
    }
    let Some(discovery) = discovery else {
        return fallback;
    };

    match discovery.discover() {
        Ok(found) => match classify_port(found.port) {
            PortClass::Plain => {
                info!(broker = %found, "discovered broker (insecure port)");
                found
            }
            PortClass::Secure => {
                info!(broker = %found, "discovered broker (secure port)");
                found
            }
            PortClass::Unset => {
                warn!(host = %found.host, port = config.port, "discovered broker without port, using configured port");
                BrokerAddress::new(found.host, config.port)
            }
            PortClass::Unusual => {
                warn!(broker = %found, "discovered broker on unusual port");
                found
            }
        },
        Err(error) => {
            warn!(%error, fallback = %fallback, "broker discovery failed, using static broker");
            fallback
        }
    }
}
