//! Typed view of the persisted device settings.
//!
//! The register itself is flat (see [`crate::storage`]); [`ConfigRecord`]
//! is the structured snapshot collaborators read. It is rebuilt from the
//! register with [`ConfigRecord::from_register`], which substitutes
//! defaults for missing or invalid values and reports every substitution
//! as a [`Repair`] so the store can write the default back.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::ident::is_valid_hostname;
use crate::storage::ConfigValue;

/// Hostname used when none (or an invalid one) is stored.
pub const DEFAULT_HOSTNAME: &str = "greenhouse";
/// Broker used when the configured broker address is empty.
pub const FALLBACK_BROKER: &str = "192.168.0.17";
/// Plain MQTT port.
pub const MQTT_PORT: u16 = 1883;
/// MQTT over TLS port.
pub const MQTT_PORT_SECURE: u16 = 8883;
/// Home Assistant's default discovery prefix.
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";
/// Size of the indexed topic list.
pub const MAX_TOPICS: usize = 8;
/// Outputs on the relay expander.
pub const MAX_RELAYS: usize = 16;
/// Toggle interval for relays stored without a usable one.
pub const DEFAULT_RELAY_INTERVAL_MS: u32 = 60_000;

/// Flat register keys.
pub mod keys {
    pub const HOSTNAME: &str = "hostname";
    pub const DEVICE_NAME: &str = "device_name";

    pub const WIFI_SSID: &str = "wifi_ssid";
    pub const WIFI_PASSWORD: &str = "wifi_password";

    pub const MQTT_BROKER: &str = "mqtt_broker";
    pub const MQTT_PORT: &str = "mqtt_port";
    pub const MQTT_USERNAME: &str = "mqtt_username";
    pub const MQTT_PASSWORD: &str = "mqtt_password";
    pub const MQTT_BROKER_DISCOVERY: &str = "mqtt_broker_discovery";
    pub const MQTT_DISCOVERY_PREFIX: &str = "mqtt_discovery_prefix";
    pub const MQTT_TOPIC_PREFIX: &str = "mqtt_topic_";

    pub const HUMIDITY_FEATURES: &str = "humidity_features";
    pub const LDR_FEATURES: &str = "ldr_features";
    pub const WATER_LEVEL_FEATURES: &str = "water_level_features";
    pub const DHT_PIN: &str = "dht_pin";
    pub const LDR_PIN: &str = "ldr_pin";
    pub const WATER_LEVEL_PIN: &str = "water_level_pin";

    pub const RELAY_COUNT: &str = "relay_count";
    pub const RELAY_PREFIX: &str = "relay_";

    pub const INPUT_POLL_MS: &str = "input_poll_ms";
    pub const AVAILABILITY_MS: &str = "availability_ms";
    pub const RECONNECT_TIMEOUT_MS: &str = "reconnect_timeout_ms";
    pub const RECONNECT_RETRY_MS: &str = "reconnect_retry_ms";
    pub const RECONNECT_RETRY_COUNT: &str = "reconnect_retry_count";
    pub const TIME_SYNC_MS: &str = "time_sync_ms";
    pub const TIME_ZONE_OFFSET_S: &str = "time_zone_offset_s";

    pub fn mqtt_topic(index: usize) -> String {
        format!("{MQTT_TOPIC_PREFIX}{index}")
    }

    pub fn relay_port(index: usize) -> String {
        format!("{RELAY_PREFIX}{index}_port")
    }

    pub fn relay_name(index: usize) -> String {
        format!("{RELAY_PREFIX}{index}_name")
    }

    pub fn relay_interval(index: usize) -> String {
        format!("{RELAY_PREFIX}{index}_interval_ms")
    }

    /// Keys whose change affects network association.
    pub fn is_network_key(key: &str) -> bool {
        key == WIFI_SSID || key == WIFI_PASSWORD
    }

    /// Keys whose change affects the mDNS announcement.
    pub fn is_mdns_key(key: &str) -> bool {
        key == HOSTNAME || key == DEVICE_NAME
    }

    /// Keys describing the relay set.
    pub fn is_relay_key(key: &str) -> bool {
        key.starts_with(RELAY_PREFIX)
    }
}

/// Declares a persisted feature selector together with its integer codes
/// and human-readable labels, so the code table and the label table can
/// never drift apart from the enum.
macro_rules! feature_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident = $code:literal => $label:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant = $code,)+
        }

        impl $name {
            /// Every variant, in code order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub const fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            pub const fn code(self) -> i64 {
                self as i64
            }

            pub fn from_code(code: i64) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }
    };
}

feature_enum! {
    /// Humidity/temperature sensor variant.
    HumidityFeature {
        None = 0 => "None",
        Dht11 = 1 => "DHT11",
        Dht22 = 2 => "DHT22",
        Dht21 = 3 => "DHT21",
        Sht31 = 4 => "SHT31",
        Sht31x2 = 5 => "SHT31x2",
        All = 6 => "All",
    }
}

feature_enum! {
    /// Light sensor variant.
    LightFeature {
        None = 0 => "None",
        Ldr = 1 => "LDR",
        Bh1750 = 2 => "BH1750",
        All = 3 => "All",
    }
}

feature_enum! {
    /// Water level sensor variant.
    WaterLevelFeature {
        None = 0 => "None",
        Ultrasonic = 1 => "Water Level UltraSonic",
        Pressure = 2 => "Water Level Pressure",
        Infrared = 3 => "Water Level IR",
        All = 4 => "All",
    }
}

impl Default for HumidityFeature {
    fn default() -> Self {
        HumidityFeature::None
    }
}

impl Default for LightFeature {
    fn default() -> Self {
        LightFeature::None
    }
}

impl Default for WaterLevelFeature {
    fn default() -> Self {
        WaterLevelFeature::None
    }
}

/// Device identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceConfig {
    pub hostname: String,
    pub name: String,
}

/// Wireless network credentials.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NetworkConfig {
    pub ssid: String,
    #[serde(skip_serializing)]
    pub password: String,
}

/// A broker endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl BrokerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn is_secure(&self) -> bool {
        self.port == MQTT_PORT_SECURE
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// MQTT connection settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Try to locate the broker through service discovery first.
    pub broker_discovery: bool,
    pub discovery_prefix: String,
    /// Extra topics subscribed on every connection.
    pub topics: Vec<String>,
}

impl MqttConfig {
    /// The configured broker, or the static fallback when none is set.
    pub fn broker(&self) -> BrokerAddress {
        if self.broker.trim().is_empty() {
            BrokerAddress::new(FALLBACK_BROKER, self.port)
        } else {
            BrokerAddress::new(self.broker.trim(), self.port)
        }
    }
}

/// Which optional sensors are fitted, and where.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EnabledFeatures {
    pub humidity: HumidityFeature,
    pub light: LightFeature,
    pub water_level: WaterLevelFeature,
    pub dht_pin: u8,
    pub ldr_pin: u8,
    pub water_level_pin: u8,
}

/// One timed relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayConfig {
    /// Output index on the relay expander.
    pub port: u8,
    pub name: String,
    /// Time between two automatic toggles.
    pub interval_ms: u32,
}

impl RelayConfig {
    pub fn new(port: u8, name: impl Into<String>, interval_ms: u32) -> Self {
        Self {
            port,
            name: name.into(),
            interval_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.interval_ms))
    }
}

/// Cadences of the control loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimingConfig {
    /// Minimum spacing between two reads of the same input.
    pub input_poll_ms: u32,
    /// Availability heartbeat period.
    pub availability_ms: u32,
    /// Reconnect cycle window.
    pub reconnect_timeout_ms: u32,
    /// Spacing between reconnect attempts inside one cycle.
    pub reconnect_retry_ms: u32,
    /// Attempts per reconnect cycle.
    pub reconnect_retry_count: u8,
    pub time_sync_ms: u32,
    pub time_zone_offset_s: i32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            input_poll_ms: 30,
            availability_ms: 5_000,
            reconnect_timeout_ms: 10_000,
            reconnect_retry_ms: 1_000,
            reconnect_retry_count: 3,
            time_sync_ms: 3_600_000,
            time_zone_offset_s: 0,
        }
    }
}

impl TimingConfig {
    pub fn input_poll(&self) -> Duration {
        ms(self.input_poll_ms)
    }

    pub fn availability(&self) -> Duration {
        ms(self.availability_ms)
    }

    pub fn reconnect_timeout(&self) -> Duration {
        ms(self.reconnect_timeout_ms)
    }

    pub fn reconnect_retry(&self) -> Duration {
        ms(self.reconnect_retry_ms)
    }

    pub fn time_sync(&self) -> Duration {
        ms(self.time_sync_ms)
    }
}

fn ms(value: u32) -> Duration {
    Duration::from_millis(u64::from(value))
}

/// The complete typed device configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigRecord {
    pub device: DeviceConfig,
    pub network: NetworkConfig,
    pub mqtt: MqttConfig,
    pub features: EnabledFeatures,
    pub relays: Vec<RelayConfig>,
    pub timing: TimingConfig,
}

impl Default for ConfigRecord {
    fn default() -> Self {
        ConfigRecord::from_register(&BTreeMap::new()).0
    }
}

/// Why a stored value was replaced while building a [`ConfigRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairReason {
    Missing,
    Invalid(ConfigValue),
}

/// A default substituted for a missing or invalid register entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repair {
    pub key: String,
    pub value: ConfigValue,
    pub reason: RepairReason,
}

/// Reads typed values out of the flat register, collecting repairs.
struct RegisterReader<'a> {
    values: &'a BTreeMap<String, ConfigValue>,
    repairs: Vec<Repair>,
}

impl<'a> RegisterReader<'a> {
    fn repair(&mut self, key: &str, value: ConfigValue) {
        let reason = match self.values.get(key) {
            Some(bad) => RepairReason::Invalid(bad.clone()),
            None => RepairReason::Missing,
        };
        self.repairs.push(Repair {
            key: key.to_string(),
            value,
            reason,
        });
    }

    fn text(&mut self, key: &str, default: &str) -> String {
        self.text_where(key, default, |_| true)
    }

    fn text_where(&mut self, key: &str, default: &str, valid: impl Fn(&str) -> bool) -> String {
        match self.values.get(key).and_then(ConfigValue::as_str) {
            Some(s) if valid(s) => s.to_string(),
            _ => {
                self.repair(key, ConfigValue::from(default));
                default.to_string()
            }
        }
    }

    fn int<T>(&mut self, key: &str, default: T, valid: impl Fn(T) -> bool) -> T
    where
        T: Copy + TryFrom<i64> + Into<ConfigValue>,
    {
        let parsed = self
            .values
            .get(key)
            .and_then(ConfigValue::as_int)
            .and_then(|i| T::try_from(i).ok())
            .filter(|v| valid(*v));
        match parsed {
            Some(v) => v,
            None => {
                self.repair(key, default.into());
                default
            }
        }
    }

    fn boolean(&mut self, key: &str, default: bool) -> bool {
        match self.values.get(key).and_then(ConfigValue::as_bool) {
            Some(b) => b,
            None => {
                self.repair(key, ConfigValue::Bool(default));
                default
            }
        }
    }

    fn code<F: Copy + Default>(
        &mut self,
        key: &str,
        from_code: impl Fn(i64) -> Option<F>,
        to_code: impl Fn(F) -> i64,
    ) -> F {
        match self.values.get(key).and_then(ConfigValue::as_int).and_then(&from_code) {
            Some(f) => f,
            None => {
                let default = F::default();
                self.repair(key, ConfigValue::Int(to_code(default)));
                default
            }
        }
    }
}

impl ConfigRecord {
    /// Build the typed record from a flat register.
    ///
    /// Returns the record and the list of defaults substituted for missing
    /// or invalid entries. Optional entries (topics) are never repaired.
    pub fn from_register(values: &BTreeMap<String, ConfigValue>) -> (Self, Vec<Repair>) {
        let mut r = RegisterReader {
            values,
            repairs: Vec::new(),
        };
        let defaults = TimingConfig::default();

        let device = DeviceConfig {
            hostname: r.text_where(keys::HOSTNAME, DEFAULT_HOSTNAME, is_valid_hostname),
            name: r.text_where(keys::DEVICE_NAME, "Greenhouse Tower", |s| !s.trim().is_empty()),
        };

        let network = NetworkConfig {
            ssid: r.text(keys::WIFI_SSID, ""),
            password: r.text(keys::WIFI_PASSWORD, ""),
        };

        let topics = (0..MAX_TOPICS)
            .filter_map(|i| values.get(&keys::mqtt_topic(i)))
            .filter_map(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        let mqtt = MqttConfig {
            broker: r.text(keys::MQTT_BROKER, ""),
            port: r.int(keys::MQTT_PORT, MQTT_PORT, |p: u16| p != 0),
            username: r.text(keys::MQTT_USERNAME, ""),
            password: r.text(keys::MQTT_PASSWORD, ""),
            broker_discovery: r.boolean(keys::MQTT_BROKER_DISCOVERY, true),
            discovery_prefix: r.text_where(
                keys::MQTT_DISCOVERY_PREFIX,
                DEFAULT_DISCOVERY_PREFIX,
                |s| !s.is_empty() && !s.contains(['+', '#']),
            ),
            topics,
        };

        let features = EnabledFeatures {
            humidity: r.code(keys::HUMIDITY_FEATURES, HumidityFeature::from_code, HumidityFeature::code),
            light: r.code(keys::LDR_FEATURES, LightFeature::from_code, LightFeature::code),
            water_level: r.code(
                keys::WATER_LEVEL_FEATURES,
                WaterLevelFeature::from_code,
                WaterLevelFeature::code,
            ),
            dht_pin: r.int(keys::DHT_PIN, 0u8, |_| true),
            ldr_pin: r.int(keys::LDR_PIN, 0u8, |_| true),
            water_level_pin: r.int(keys::WATER_LEVEL_PIN, 0u8, |_| true),
        };

        let count = r.int(keys::RELAY_COUNT, 0u8, |n| usize::from(n) <= MAX_RELAYS);
        let relays = (0..usize::from(count))
            .map(|i| RelayConfig {
                port: r.int(&keys::relay_port(i), i as u8, |p: u8| usize::from(p) < MAX_RELAYS),
                name: r.text_where(&keys::relay_name(i), &format!("relay_{i}"), |s| {
                    !s.trim().is_empty()
                }),
                interval_ms: r.int(&keys::relay_interval(i), DEFAULT_RELAY_INTERVAL_MS, |v: u32| {
                    v > 0
                }),
            })
            .collect();

        let timing = TimingConfig {
            input_poll_ms: r.int(keys::INPUT_POLL_MS, defaults.input_poll_ms, |v: u32| v > 0),
            availability_ms: r.int(keys::AVAILABILITY_MS, defaults.availability_ms, |v: u32| v > 0),
            reconnect_timeout_ms: r.int(
                keys::RECONNECT_TIMEOUT_MS,
                defaults.reconnect_timeout_ms,
                |v: u32| v > 0,
            ),
            reconnect_retry_ms: r.int(
                keys::RECONNECT_RETRY_MS,
                defaults.reconnect_retry_ms,
                |v: u32| v > 0,
            ),
            reconnect_retry_count: r.int(
                keys::RECONNECT_RETRY_COUNT,
                defaults.reconnect_retry_count,
                |v: u8| v > 0,
            ),
            time_sync_ms: r.int(keys::TIME_SYNC_MS, defaults.time_sync_ms, |v: u32| v > 0),
            time_zone_offset_s: r.int(keys::TIME_ZONE_OFFSET_S, 0i32, |v: i32| {
                v.abs() <= 14 * 3600
            }),
        };

        let record = ConfigRecord {
            device,
            network,
            mqtt,
            features,
            relays,
            timing,
        };
        (record, r.repairs)
    }

    /// The broker to use when discovery is disabled or fails.
    pub fn broker(&self) -> BrokerAddress {
        self.mqtt.broker()
    }

    /// JSON rendering for status endpoints and logs. Secrets are omitted.
    pub fn to_representation(&self) -> serde_json::Value {
        serde_json::json!({
            "deviceData": {
                "hostname": self.device.hostname,
                "broker": self.mqtt.broker,
                "port": self.mqtt.port,
                "username": self.mqtt.username,
            },
            "features": {
                "humidity": self.features.humidity.label(),
                "ldr": self.features.light.label(),
                "water_level": self.features.water_level.label(),
            },
            "relays": self.relays,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn register(entries: &[(&str, ConfigValue)]) -> BTreeMap<String, ConfigValue> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_defaults_from_empty_register() {
        let (record, repairs) = ConfigRecord::from_register(&BTreeMap::new());

        assert_eq!(record.device.hostname, DEFAULT_HOSTNAME);
        assert_eq!(record.mqtt.port, MQTT_PORT);
        assert!(record.mqtt.broker_discovery);
        assert_eq!(record.mqtt.discovery_prefix, "homeassistant");
        assert!(record.relays.is_empty());
        assert_eq!(record.timing, TimingConfig::default());
        assert!(repairs.iter().all(|r| r.reason == RepairReason::Missing));
        assert!(repairs.iter().any(|r| r.key == keys::MQTT_PORT));
        // Optional topics are not written back.
        assert!(!repairs.iter().any(|r| r.key.starts_with(keys::MQTT_TOPIC_PREFIX)));
    }

    #[test]
    fn test_empty_broker_uses_static_fallback() {
        let values = register(&[
            (keys::MQTT_BROKER, ConfigValue::from("")),
            (keys::MQTT_PORT, ConfigValue::Int(1883)),
        ]);
        let (record, _) = ConfigRecord::from_register(&values);
        assert_eq!(record.broker(), BrokerAddress::new(FALLBACK_BROKER, 1883));
    }

    #[test]
    fn test_configured_broker_wins() {
        let values = register(&[
            (keys::MQTT_BROKER, ConfigValue::from("10.0.0.5")),
            (keys::MQTT_PORT, ConfigValue::Int(8883)),
        ]);
        let (record, _) = ConfigRecord::from_register(&values);
        let broker = record.broker();
        assert_eq!(broker.to_string(), "10.0.0.5:8883");
        assert!(broker.is_secure());
    }

    #[test]
    fn test_invalid_values_are_repaired() {
        let values = register(&[
            (keys::HOSTNAME, ConfigValue::from("not a hostname")),
            (keys::MQTT_PORT, ConfigValue::Int(70_000)),
            (keys::HUMIDITY_FEATURES, ConfigValue::Int(42)),
            (keys::INPUT_POLL_MS, ConfigValue::from("fast")),
        ]);
        let (record, repairs) = ConfigRecord::from_register(&values);

        assert_eq!(record.device.hostname, DEFAULT_HOSTNAME);
        assert_eq!(record.mqtt.port, MQTT_PORT);
        assert_eq!(record.features.humidity, HumidityFeature::None);
        assert_eq!(record.timing.input_poll_ms, 30);

        let port_repair = repairs.iter().find(|r| r.key == keys::MQTT_PORT).unwrap();
        assert_eq!(port_repair.value, ConfigValue::Int(1883));
        assert_eq!(port_repair.reason, RepairReason::Invalid(ConfigValue::Int(70_000)));

        let feature_repair = repairs
            .iter()
            .find(|r| r.key == keys::HUMIDITY_FEATURES)
            .unwrap();
        assert_eq!(feature_repair.value, ConfigValue::Int(0));
    }

    #[test]
    fn test_relays_and_topics_are_read_by_index() {
        let values = register(&[
            (keys::RELAY_COUNT, ConfigValue::Int(2)),
            ("relay_0_port", ConfigValue::Int(0)),
            ("relay_0_name", ConfigValue::from("pump")),
            ("relay_0_interval_ms", ConfigValue::Int(1000)),
            ("relay_1_port", ConfigValue::Int(3)),
            ("relay_1_name", ConfigValue::from("light")),
            ("relay_1_interval_ms", ConfigValue::Int(0)),
            ("mqtt_topic_0", ConfigValue::from("greenhouse/tower/ph")),
            ("mqtt_topic_2", ConfigValue::from("greenhouse/tower/ec")),
        ]);
        let (record, repairs) = ConfigRecord::from_register(&values);

        assert_eq!(
            record.relays,
            vec![
                RelayConfig::new(0, "pump", 1000),
                RelayConfig::new(3, "light", DEFAULT_RELAY_INTERVAL_MS),
            ]
        );
        assert!(repairs.iter().any(|r| r.key == "relay_1_interval_ms"));
        assert_eq!(
            record.mqtt.topics,
            vec!["greenhouse/tower/ph", "greenhouse/tower/ec"]
        );
    }

    #[test]
    fn test_feature_tables_are_complete() {
        for feature in HumidityFeature::ALL {
            assert_eq!(HumidityFeature::from_code(feature.code()), Some(*feature));
        }
        for feature in LightFeature::ALL {
            assert_eq!(LightFeature::from_code(feature.code()), Some(*feature));
        }
        for feature in WaterLevelFeature::ALL {
            assert_eq!(WaterLevelFeature::from_code(feature.code()), Some(*feature));
        }
        assert_eq!(HumidityFeature::ALL.len(), 7);
        assert_eq!(WaterLevelFeature::Ultrasonic.label(), "Water Level UltraSonic");
        assert_eq!(LightFeature::Bh1750.to_string(), "BH1750");
        assert_eq!(HumidityFeature::from_code(7), None);
    }

    #[test]
    fn test_representation_hides_secrets() {
        let values = register(&[
            (keys::MQTT_BROKER, ConfigValue::from("10.0.0.5")),
            (keys::MQTT_PASSWORD, ConfigValue::from("hunter2")),
            (keys::LDR_FEATURES, ConfigValue::Int(2)),
        ]);
        let (record, _) = ConfigRecord::from_register(&values);
        let json = record.to_representation();

        assert_eq!(json["deviceData"]["broker"], "10.0.0.5");
        assert_eq!(json["features"]["ldr"], "BH1750");
        assert_eq!(json["features"]["humidity"], "None");
        assert!(!json.to_string().contains("hunter2"));
    }
}
