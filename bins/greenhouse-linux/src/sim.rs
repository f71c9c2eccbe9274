//! Simulated collaborators for running the device on a host.

use std::collections::VecDeque;
use std::time::Duration;

use greenhouse_core::{Instant, NetworkConfig, RelayDriver};
use greenhouse_device::{
    ConnectOptions, InboundMessage, MqttTransport, Network, OtaService, Sensor, SensorDescriptor,
    SensorError, TimeSource, TransportError,
};
use greenhouse_protocol::Reading;

/// Link that comes up after a fixed delay.
pub struct SimNetwork {
    up_after: Duration,
    up: bool,
}

impl SimNetwork {
    pub fn new(up_after: Duration) -> Self {
        Self {
            up_after,
            up: false,
        }
    }
}

impl Network for SimNetwork {
    fn poll(&mut self, now: Instant) {
        if !self.up && now.duration_since(Instant::from_millis(0)) >= self.up_after {
            self.up = true;
        }
    }

    fn is_connected(&self) -> bool {
        self.up
    }

    fn configure(&mut self, config: &NetworkConfig) {
        tracing::info!(ssid = %config.ssid, "joining network");
    }

    fn announce(&mut self, hostname: &str, device_name: &str) {
        tracing::info!(hostname, device_name, "mDNS announcement");
    }
}

/// In-process broker that accepts every session and echoes switch commands
/// back as if a dashboard user had pressed them.
#[derive(Default)]
pub struct SimBroker {
    connected: bool,
    command_topics: Vec<String>,
    inbound: VecDeque<InboundMessage>,
    published: u64,
}

impl MqttTransport for SimBroker {
    fn connect(&mut self, options: &ConnectOptions) -> Result<(), TransportError> {
        tracing::info!(broker = %options.broker, will = %options.will_topic, "simulated session opened");
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.published += 1;
        tracing::debug!(topic, payload = %String::from_utf8_lossy(payload), retain, "publish");

        // Every 50th publish, switch the first relay on from the "dashboard".
        if self.published % 50 == 0 {
            if let Some(topic) = self.command_topics.first() {
                self.inbound.push_back(InboundMessage::new(topic, "ON"));
            }
        }
        Ok(())
    }

    fn subscribe(&mut self, filter: &str) -> Result<(), TransportError> {
        if filter.ends_with("/set") {
            self.command_topics.push(filter.to_string());
        }
        Ok(())
    }

    fn poll(&mut self) -> Option<InboundMessage> {
        self.inbound.pop_front()
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.command_topics.clear();
    }
}

/// Relay driver that only logs.
pub struct LoggingRelays;

impl RelayDriver for LoggingRelays {
    fn set_output(&mut self, port: u8, on: bool) {
        tracing::info!(port, on, "relay output");
    }
}

/// Temperature drifting slowly around 22 °C.
#[derive(Default)]
pub struct SimTemperature;

impl Sensor for SimTemperature {
    fn descriptor(&self) -> SensorDescriptor {
        SensorDescriptor::sensor("Temperature")
            .with_unit("°C")
            .with_device_class("temperature")
    }

    fn read(&mut self, now: Instant) -> Result<Reading, SensorError> {
        let t = f64::from(now.as_millis()) / 60_000.0;
        let celsius = 22.0 + 2.0 * t.sin();
        Ok(Reading::Number((celsius * 10.0).round() / 10.0))
    }
}

/// Host wall clock standing in for NTP.
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn epoch_seconds(&mut self) -> Result<i64, SensorError> {
        Ok(chrono::Utc::now().timestamp())
    }
}

/// Nothing to transfer on a host.
pub struct SimOta;

impl OtaService for SimOta {
    fn poll(&mut self) {}
}
