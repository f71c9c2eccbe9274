//! # greenhouse-core
//!
//! Core building blocks of the greenhouse controller.
//!
//! This crate provides:
//! - Wrapping millisecond instants, clocks and restartable timers
//! - Discovery identifiers and MQTT topic filters
//! - The flat key/value register and its typed [`ConfigRecord`] view
//! - The config store with its observer bus
//! - The relay timer state machine
//!
//! This crate contains no async code and performs no network I/O, so the
//! same logic runs on the microcontroller and in host tests.

pub mod clock;
pub mod ident;
pub mod model;
pub mod relay;
pub mod storage;
pub mod store;
pub mod timer;
pub mod topic;

pub use clock::{Clock, Instant, ManualClock, SystemClock};
pub use ident::{IdentError, ObjectId};
pub use model::{
    BrokerAddress, ConfigRecord, DeviceConfig, EnabledFeatures, HumidityFeature, LightFeature,
    MqttConfig, NetworkConfig, RelayConfig, TimingConfig, WaterLevelFeature,
};
pub use relay::{ChangeCause, RelayBoard, RelayChange, RelayDriver, RelayError, RelayState};
pub use storage::{ConfigValue, JsonFileStorage, KeyValueStorage, MemoryStorage, StorageError};
pub use store::{ConfigStore, Event, Observer, ObserverId, ObserverTable, StoreError};
pub use timer::Timer;
pub use topic::{FilterError, TopicFilter};
