//! Config store and observer bus.
//!
//! [`ConfigStore`] owns the flat register, tracks which keys changed since
//! the last commit, and fans out [`Event`]s once the change is durable.
//!
//! The store never owns its observers. It keeps an ordered list of
//! [`ObserverId`] tags and, on every commit, hands each `(tag, event)` pair
//! to a caller-supplied [`ObserverTable`] which routes it to the actual
//! collaborator. This keeps ownership with whoever built the collaborators
//! (usually the device scheduler) and needs no shared mutable state.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, info, warn};

use crate::ident::check_hostname;
use crate::model::{
    keys, ConfigRecord, EnabledFeatures, MqttConfig, RelayConfig, Repair, RepairReason,
    TimingConfig, DEFAULT_HOSTNAME, MAX_RELAYS, MAX_TOPICS,
};
use crate::storage::{ConfigValue, KeyValueStorage, StorageError};

/// What a commit changed. Recipients re-read the record for details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Any committed change.
    ConfigChanged,
    /// Wireless credentials changed.
    NetworkChanged,
    /// Hostname or device name changed.
    MdnsChanged,
    /// The relay set changed.
    RelaysChanged,
}

impl Event {
    /// Every event, in delivery order.
    pub const ALL: [Event; 4] = [
        Event::ConfigChanged,
        Event::NetworkChanged,
        Event::MdnsChanged,
        Event::RelaysChanged,
    ];
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Event::ConfigChanged => "config-changed",
            Event::NetworkChanged => "network-changed",
            Event::MdnsChanged => "mdns-changed",
            Event::RelaysChanged => "relays-changed",
        };
        f.write_str(name)
    }
}

/// Registration tag of an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserverId {
    Network,
    Mdns,
    RelayBoard,
    Mqtt,
    Sensors,
}

/// A collaborator that reacts to configuration changes.
pub trait Observer {
    fn update(&mut self, event: Event, config: &ConfigRecord);
}

/// Routes a tagged event to the observer registered under `id`.
pub trait ObserverTable {
    fn dispatch(&mut self, id: ObserverId, event: Event, config: &ConfigRecord);
}

impl<F> ObserverTable for F
where
    F: FnMut(ObserverId, Event, &ConfigRecord),
{
    fn dispatch(&mut self, id: ObserverId, event: Event, config: &ConfigRecord) {
        self(id, event, config)
    }
}

/// Errors reported by [`ConfigStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The register could not be read at load time.
    #[error("failed to load configuration: {0}")]
    Load(#[source] StorageError),
    /// Persisting a key failed; the commit was aborted.
    #[error("failed to persist '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: StorageError,
    },
}

/// The device-wide settings register.
pub struct ConfigStore<S> {
    storage: S,
    values: BTreeMap<String, ConfigValue>,
    /// Keys changed since the last commit. A dirty key without a value is a
    /// pending removal.
    dirty: BTreeSet<String>,
    record: ConfigRecord,
    observers: Vec<ObserverId>,
}

impl<S: KeyValueStorage> ConfigStore<S> {
    /// Load every key from `storage` and build the typed record.
    ///
    /// Missing or invalid values are replaced by their defaults and marked
    /// dirty so the next commit writes them back.
    pub fn load(storage: S) -> Result<Self, StoreError> {
        let mut values = BTreeMap::new();
        for key in storage.keys().map_err(StoreError::Load)? {
            if let Some(value) = storage.get(&key).map_err(StoreError::Load)? {
                values.insert(key, value);
            }
        }
        debug!(keys = values.len(), "configuration register loaded");

        let mut store = Self {
            storage,
            values,
            dirty: BTreeSet::new(),
            record: ConfigRecord::default(),
            observers: Vec::new(),
        };
        store.rebuild_record();
        Ok(store)
    }

    /// The typed snapshot as of the last successful commit.
    pub fn record(&self) -> &ConfigRecord {
        &self.record
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Current in-memory value, including uncommitted changes.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    /// Current in-memory value, or `default` when unset.
    pub fn get_or(&self, key: &str, default: impl Into<ConfigValue>) -> ConfigValue {
        self.values.get(key).cloned().unwrap_or_else(|| default.into())
    }

    /// Change a value in memory. Nothing is persisted until [`commit`].
    ///
    /// Writing the value already held is a no-op.
    ///
    /// [`commit`]: ConfigStore::commit
    pub fn set(&mut self, key: &str, value: impl Into<ConfigValue>) {
        let value = value.into();
        if self.values.get(key) == Some(&value) {
            return;
        }
        self.values.insert(key.to_string(), value);
        self.dirty.insert(key.to_string());
    }

    /// Schedule a key for removal at the next commit.
    pub fn remove(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.dirty.insert(key.to_string());
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn dirty_keys(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    // ========================================================================
    // Typed setters
    // ========================================================================

    pub fn set_network(&mut self, ssid: &str, password: &str) {
        self.set(keys::WIFI_SSID, ssid);
        self.set(keys::WIFI_PASSWORD, password);
    }

    /// Set the hostname, falling back to the default for invalid names.
    pub fn set_hostname(&mut self, hostname: &str) {
        match check_hostname(hostname) {
            Ok(valid) => self.set(keys::HOSTNAME, valid),
            Err(error) => {
                warn!(%error, fallback = DEFAULT_HOSTNAME, "using default hostname");
                self.set(keys::HOSTNAME, DEFAULT_HOSTNAME);
            }
        }
    }

    pub fn set_device_name(&mut self, name: &str) {
        self.set(keys::DEVICE_NAME, name);
    }

    pub fn set_mqtt_broker(&mut self, host: &str, port: u16) {
        self.set(keys::MQTT_BROKER, host);
        self.set(keys::MQTT_PORT, port);
    }

    pub fn set_mqtt_config(&mut self, mqtt: &MqttConfig) {
        self.set_mqtt_broker(&mqtt.broker, mqtt.port);
        self.set(keys::MQTT_USERNAME, mqtt.username.as_str());
        self.set(keys::MQTT_PASSWORD, mqtt.password.as_str());
        self.set(keys::MQTT_BROKER_DISCOVERY, mqtt.broker_discovery);
        self.set(keys::MQTT_DISCOVERY_PREFIX, mqtt.discovery_prefix.as_str());

        if mqtt.topics.len() > MAX_TOPICS {
            warn!(count = mqtt.topics.len(), max = MAX_TOPICS, "topic list truncated");
        }
        for index in 0..MAX_TOPICS {
            match mqtt.topics.get(index) {
                Some(topic) => self.set(&keys::mqtt_topic(index), topic.as_str()),
                None => self.remove(&keys::mqtt_topic(index)),
            }
        }
    }

    pub fn set_features(&mut self, features: &EnabledFeatures) {
        self.set(keys::HUMIDITY_FEATURES, features.humidity.code());
        self.set(keys::LDR_FEATURES, features.light.code());
        self.set(keys::WATER_LEVEL_FEATURES, features.water_level.code());
        self.set(keys::DHT_PIN, features.dht_pin);
        self.set(keys::LDR_PIN, features.ldr_pin);
        self.set(keys::WATER_LEVEL_PIN, features.water_level_pin);
    }

    /// Replace the relay set. Indexed keys beyond the new count are removed.
    pub fn set_relays(&mut self, relays: &[RelayConfig]) {
        let relays = if relays.len() > MAX_RELAYS {
            warn!(count = relays.len(), max = MAX_RELAYS, "relay list truncated");
            &relays[..MAX_RELAYS]
        } else {
            relays
        };

        self.set(keys::RELAY_COUNT, relays.len() as u8);
        for (index, relay) in relays.iter().enumerate() {
            self.set(&keys::relay_port(index), relay.port);
            self.set(&keys::relay_name(index), relay.name.as_str());
            self.set(&keys::relay_interval(index), relay.interval_ms);
        }
        for index in relays.len()..MAX_RELAYS {
            self.remove(&keys::relay_port(index));
            self.remove(&keys::relay_name(index));
            self.remove(&keys::relay_interval(index));
        }
    }

    pub fn set_timing(&mut self, timing: &TimingConfig) {
        self.set(keys::INPUT_POLL_MS, timing.input_poll_ms);
        self.set(keys::AVAILABILITY_MS, timing.availability_ms);
        self.set(keys::RECONNECT_TIMEOUT_MS, timing.reconnect_timeout_ms);
        self.set(keys::RECONNECT_RETRY_MS, timing.reconnect_retry_ms);
        self.set(keys::RECONNECT_RETRY_COUNT, timing.reconnect_retry_count);
        self.set(keys::TIME_SYNC_MS, timing.time_sync_ms);
        self.set(keys::TIME_ZONE_OFFSET_S, timing.time_zone_offset_s);
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Append an observer to the delivery list.
    pub fn attach(&mut self, id: ObserverId) {
        if self.observers.contains(&id) {
            warn!(?id, "observer already attached, ignoring");
            return;
        }
        self.observers.push(id);
    }

    pub fn detach(&mut self, id: ObserverId) {
        self.observers.retain(|attached| *attached != id);
    }

    /// Attached observers in delivery order.
    pub fn observers(&self) -> &[ObserverId] {
        &self.observers
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Persist every dirty key, then notify observers.
    ///
    /// Returns the events delivered. When a write fails the commit stops,
    /// the affected keys stay dirty, the typed record is left untouched and
    /// no event fires.
    pub fn commit(&mut self, table: &mut impl ObserverTable) -> Result<Vec<Event>, StoreError> {
        if self.dirty.is_empty() {
            return Ok(Vec::new());
        }

        for key in &self.dirty {
            let result = match self.values.get(key) {
                Some(value) => self.storage.put(key, value),
                None => self.storage.remove(key),
            };
            if let Err(source) = result {
                warn!(key = %key, error = %source, "commit aborted, change kept in memory");
                return Err(StoreError::Write {
                    key: key.clone(),
                    source,
                });
            }
        }

        let events = events_for(&self.dirty);
        info!(keys = self.dirty.len(), ?events, "configuration committed");
        self.dirty.clear();
        self.rebuild_record();
        self.deliver(&events, table);
        Ok(events)
    }

    /// Deliver every event to every observer, regardless of what is dirty.
    ///
    /// Used once at boot so collaborators configure themselves.
    pub fn broadcast_all(&self, table: &mut impl ObserverTable) {
        self.deliver(&Event::ALL, table);
    }

    fn deliver(&self, events: &[Event], table: &mut impl ObserverTable) {
        for &event in events {
            debug!(%event, observers = self.observers.len(), "delivering event");
            for &id in &self.observers {
                table.dispatch(id, event, &self.record);
            }
        }
    }

    fn rebuild_record(&mut self) {
        let (record, repairs) = ConfigRecord::from_register(&self.values);
        for Repair { key, value, reason } in repairs {
            match reason {
                RepairReason::Missing => debug!(key = %key, default = %value, "missing value, using default"),
                RepairReason::Invalid(bad) => {
                    warn!(key = %key, value = %bad, default = %value, "invalid value, using default")
                }
            }
            self.values.insert(key.clone(), value);
            self.dirty.insert(key);
        }
        self.record = record;
    }
}

impl<S> fmt::Debug for ConfigStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("keys", &self.values.len())
            .field("dirty", &self.dirty)
            .field("observers", &self.observers)
            .finish()
    }
}

/// Events implied by a set of changed keys, in delivery order.
fn events_for(changed: &BTreeSet<String>) -> Vec<Event> {
    let mut events = vec![Event::ConfigChanged];
    if changed.iter().any(|k| keys::is_network_key(k)) {
        events.push(Event::NetworkChanged);
    }
    if changed.iter().any(|k| keys::is_mdns_key(k)) {
        events.push(Event::MdnsChanged);
    }
    if changed.iter().any(|k| keys::is_relay_key(k)) {
        events.push(Event::RelaysChanged);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;

    /// Storage whose writes can be switched off.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        fail_writes: bool,
    }

    impl KeyValueStorage for FlakyStorage {
        fn get(&self, key: &str) -> Result<Option<ConfigValue>, StorageError> {
            self.inner.get(key)
        }

        fn put(&mut self, key: &str, value: &ConfigValue) -> Result<(), StorageError> {
            if self.fail_writes {
                return Err(StorageError::Write("flash busy".into()));
            }
            self.inner.put(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<(), StorageError> {
            if self.fail_writes {
                return Err(StorageError::Write("flash busy".into()));
            }
            self.inner.remove(key)
        }

        fn keys(&self) -> Result<Vec<String>, StorageError> {
            self.inner.keys()
        }
    }

    fn committed<S: KeyValueStorage>(store: &mut ConfigStore<S>) {
        store.commit(&mut |_: ObserverId, _: Event, _: &ConfigRecord| {}).unwrap();
    }

    fn loaded() -> ConfigStore<MemoryStorage> {
        let mut store = ConfigStore::load(MemoryStorage::new()).unwrap();
        committed(&mut store);
        store
    }

    #[test]
    fn test_load_marks_defaults_dirty() {
        let store = ConfigStore::load(MemoryStorage::new()).unwrap();
        assert!(store.is_dirty());
        assert!(store.dirty_keys().any(|k| k == keys::MQTT_PORT));
        assert_eq!(store.get(keys::MQTT_PORT), Some(&ConfigValue::Int(1883)));
    }

    #[test]
    fn test_load_repairs_invalid_hostname() {
        let storage = MemoryStorage::new().with(keys::HOSTNAME, "bad host!");
        let store = ConfigStore::load(storage).unwrap();
        assert_eq!(store.record().device.hostname, DEFAULT_HOSTNAME);
        assert!(store.dirty_keys().any(|k| k == keys::HOSTNAME));
    }

    #[test]
    fn test_commit_persists_then_notifies_in_attach_order() {
        let mut store = loaded();
        store.attach(ObserverId::Network);
        store.attach(ObserverId::RelayBoard);
        store.attach(ObserverId::Mqtt);

        store.set_network("tomatoes", "secret");

        let mut seen = Vec::new();
        let events = store
            .commit(&mut |id: ObserverId, event: Event, _: &ConfigRecord| seen.push((event, id)))
            .unwrap();

        assert_eq!(events, vec![Event::ConfigChanged, Event::NetworkChanged]);
        assert_eq!(
            seen,
            vec![
                (Event::ConfigChanged, ObserverId::Network),
                (Event::ConfigChanged, ObserverId::RelayBoard),
                (Event::ConfigChanged, ObserverId::Mqtt),
                (Event::NetworkChanged, ObserverId::Network),
                (Event::NetworkChanged, ObserverId::RelayBoard),
                (Event::NetworkChanged, ObserverId::Mqtt),
            ]
        );
        assert_eq!(
            store.storage().get(keys::WIFI_SSID).unwrap(),
            Some(ConfigValue::from("tomatoes"))
        );
        assert_eq!(store.record().network.ssid, "tomatoes");
    }

    #[test]
    fn test_observer_sees_persisted_record() {
        let mut store = loaded();
        store.attach(ObserverId::Mqtt);
        store.set_mqtt_broker("10.1.1.1", 1883);

        let mut broker = String::new();
        store
            .commit(&mut |_: ObserverId, _: Event, record: &ConfigRecord| {
                broker = record.mqtt.broker.clone();
            })
            .unwrap();
        assert_eq!(broker, "10.1.1.1");
    }

    #[test]
    fn test_commit_without_changes_is_silent() {
        let mut store = loaded();
        store.attach(ObserverId::Mqtt);
        let mut calls = 0;
        let events = store
            .commit(&mut |_: ObserverId, _: Event, _: &ConfigRecord| calls += 1)
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_invalid_hostname_falls_back_to_default() {
        let mut store = loaded();
        store.set_hostname("tower-7");
        committed(&mut store);
        store.set_hostname("-nope-");
        assert_eq!(store.get(keys::HOSTNAME), Some(&ConfigValue::from(DEFAULT_HOSTNAME)));
    }

    #[test]
    fn test_setting_same_value_is_not_dirty() {
        let mut store = loaded();
        let hostname = store.record().device.hostname.clone();
        store.set_hostname(&hostname);
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_write_failure_keeps_change_and_fires_nothing() {
        let mut store = ConfigStore::load(FlakyStorage::default()).unwrap();
        committed(&mut store);
        store.attach(ObserverId::Network);

        store.storage_mut().fail_writes = true;
        store.set_network("lettuce", "pw");

        let mut calls = 0;
        let err = store
            .commit(&mut |_: ObserverId, _: Event, _: &ConfigRecord| calls += 1)
            .unwrap_err();

        assert!(matches!(err, StoreError::Write { .. }));
        assert_eq!(calls, 0);
        assert!(store.is_dirty());
        assert_eq!(store.get(keys::WIFI_SSID), Some(&ConfigValue::from("lettuce")));
        // Readers of the typed record never see the unpersisted value.
        assert_eq!(store.record().network.ssid, "");

        store.storage_mut().fail_writes = false;
        let events = store
            .commit(&mut |_: ObserverId, _: Event, _: &ConfigRecord| calls += 1)
            .unwrap();
        assert_eq!(events, vec![Event::ConfigChanged, Event::NetworkChanged]);
        assert_eq!(calls, 2);
        assert_eq!(store.record().network.ssid, "lettuce");
    }

    #[test]
    fn test_relay_changes_emit_relays_changed_last() {
        let mut store = loaded();
        store.attach(ObserverId::RelayBoard);
        store.set_hostname("tower-1");
        store.set_relays(&[RelayConfig::new(0, "pump", 1000)]);

        let events = store
            .commit(&mut |_: ObserverId, _: Event, _: &ConfigRecord| {})
            .unwrap();
        assert_eq!(
            events,
            vec![Event::ConfigChanged, Event::MdnsChanged, Event::RelaysChanged]
        );
    }

    #[test]
    fn test_set_relays_removes_stale_keys() {
        let mut store = loaded();
        store.set_relays(&[
            RelayConfig::new(0, "pump", 1000),
            RelayConfig::new(1, "light", 2000),
        ]);
        committed(&mut store);
        assert!(store.storage().get("relay_1_name").unwrap().is_some());

        store.set_relays(&[RelayConfig::new(1, "light", 2000)]);
        committed(&mut store);

        assert_eq!(store.record().relays, vec![RelayConfig::new(1, "light", 2000)]);
        assert_eq!(store.storage().get("relay_1_name").unwrap(), None);
        assert_eq!(store.storage().get("relay_1_port").unwrap(), None);
    }

    #[test]
    fn test_attach_twice_and_detach() {
        let mut store = loaded();
        store.attach(ObserverId::Mqtt);
        store.attach(ObserverId::Network);
        store.attach(ObserverId::Mqtt);
        assert_eq!(store.observers(), &[ObserverId::Mqtt, ObserverId::Network]);

        store.detach(ObserverId::Mqtt);
        assert_eq!(store.observers(), &[ObserverId::Network]);
    }

    #[test]
    fn test_broadcast_all_delivers_every_event() {
        let store = {
            let mut s = loaded();
            s.attach(ObserverId::Network);
            s
        };
        let mut seen = Vec::new();
        store.broadcast_all(&mut |_: ObserverId, event: Event, _: &ConfigRecord| seen.push(event));
        assert_eq!(seen, Event::ALL.to_vec());
    }

    #[test]
    fn test_mqtt_topics_round_through_register() {
        let mut store = loaded();
        let mut mqtt = store.record().mqtt.clone();
        mqtt.topics = vec!["a/b".into(), "c/#".into()];
        store.set_mqtt_config(&mqtt);
        committed(&mut store);
        assert_eq!(store.record().mqtt.topics, vec!["a/b", "c/#"]);

        mqtt.topics = vec!["a/b".into()];
        store.set_mqtt_config(&mqtt);
        committed(&mut store);
        assert_eq!(store.record().mqtt.topics, vec!["a/b"]);
        assert_eq!(store.get(&keys::mqtt_topic(1)), None);
    }
}
