//! The device super-loop.
//!
//! [`Device`] owns the config store and every collaborator. Each call to
//! [`Device::tick`] reads the clock once and runs, strictly in order:
//!
//! 1. the network link poll,
//! 2. the accumulation step: relay timers, then the MQTT layer,
//! 3. the over-the-air update poll.
//!
//! No step blocks. Every periodic action is guarded by its own timer and
//! checks "has at least the interval passed", so a slow iteration delays a
//! due action but never skips it.

use greenhouse_core::{
    Clock, ConfigRecord, ConfigStore, Event, Instant, KeyValueStorage, Observer, ObserverId,
    RelayBoard, RelayChange, RelayDriver, StoreError,
};
use tracing::{info, warn};

use crate::collaborators::{MqttTransport, Network, OtaService, Sensor};
use crate::mqtt::MqttSync;

/// Observers attached at [`Device::begin`], in delivery order.
pub const OBSERVERS: [ObserverId; 5] = [
    ObserverId::Network,
    ObserverId::Mdns,
    ObserverId::RelayBoard,
    ObserverId::Mqtt,
    ObserverId::Sensors,
];

/// What one iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    pub now: Instant,
    pub link_up: bool,
    pub relay_changes: Vec<RelayChange>,
    /// Relay commands received from the hub, applied next iteration.
    pub commands_queued: usize,
}

pub struct Device<S, C, N, T, R> {
    clock: C,
    store: ConfigStore<S>,
    network: N,
    relays: RelayBoard<R>,
    mqtt: MqttSync<T>,
    sensors: Vec<Box<dyn Sensor>>,
    ota: Option<Box<dyn OtaService>>,
    link_up: bool,
    started: bool,
    ticks: u64,
}

impl<S, C, N, T, R> Device<S, C, N, T, R>
where
    S: KeyValueStorage,
    C: Clock,
    N: Network,
    T: MqttTransport,
    R: RelayDriver,
{
    pub fn new(clock: C, store: ConfigStore<S>, network: N, mqtt: MqttSync<T>, relay_driver: R) -> Self {
        Self {
            clock,
            store,
            network,
            relays: RelayBoard::new(relay_driver),
            mqtt,
            sensors: Vec::new(),
            ota: None,
            link_up: false,
            started: false,
            ticks: 0,
        }
    }

    pub fn with_sensor(mut self, sensor: Box<dyn Sensor>) -> Self {
        self.sensors.push(sensor);
        self
    }

    pub fn with_ota(mut self, ota: Box<dyn OtaService>) -> Self {
        self.ota = Some(ota);
        self
    }

    /// Attach the collaborators, let them configure themselves from the
    /// loaded settings and start the sensors.
    pub fn begin(&mut self) {
        if self.started {
            return;
        }
        for id in OBSERVERS {
            self.store.attach(id);
        }

        let now = self.clock.now();
        let Self {
            store,
            network,
            relays,
            mqtt,
            sensors,
            ..
        } = self;
        store.broadcast_all(&mut |id: ObserverId, event: Event, record: &ConfigRecord| {
            route(id, event, record, now, network, relays, mqtt, sensors)
        });

        for (index, sensor) in self.sensors.iter_mut().enumerate() {
            let descriptor = sensor.descriptor();
            if let Err(error) = sensor.begin() {
                warn!(%error, sensor = %descriptor.name, "sensor failed to start");
            }
            self.mqtt.register_sensor(index, &descriptor);
        }

        self.started = true;
        info!(
            hostname = %self.store.record().device.hostname,
            relays = self.relays.relays().len(),
            sensors = self.sensors.len(),
            "device started"
        );
    }

    /// Run one iteration of the loop.
    pub fn tick(&mut self) -> Tick {
        if !self.started {
            self.begin();
        }
        let now = self.clock.now();

        // Network link.
        self.network.poll(now);
        let link_up = self.network.is_connected();
        if link_up != self.link_up {
            if link_up {
                info!("network link up");
            } else {
                warn!("network link down, relays continue on local timers");
                self.mqtt.on_link_down();
            }
            self.link_up = link_up;
        }

        // Accumulation.
        let relay_changes = self.relays.service(now);
        let relays = &self.relays;
        let commands = self
            .mqtt
            .poll(now, link_up, &mut self.sensors, |port| relays.output(port));
        let mut commands_queued = 0;
        for command in commands {
            match self.relays.command(command.port, command.on) {
                Ok(()) => commands_queued += 1,
                Err(error) => warn!(%error, "relay command dropped"),
            }
        }

        // Over-the-air updates.
        if let Some(ota) = self.ota.as_mut() {
            ota.poll();
        }

        self.ticks += 1;
        Tick {
            now,
            link_up,
            relay_changes,
            commands_queued,
        }
    }

    /// Commit pending configuration changes and notify the collaborators.
    pub fn commit_config(&mut self) -> Result<Vec<Event>, StoreError> {
        let now = self.clock.now();
        let Self {
            store,
            network,
            relays,
            mqtt,
            sensors,
            ..
        } = self;
        store.commit(&mut |id: ObserverId, event: Event, record: &ConfigRecord| {
            route(id, event, record, now, network, relays, mqtt, sensors)
        })
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn store(&self) -> &ConfigStore<S> {
        &self.store
    }

    /// Stage configuration changes; they take effect on [`commit_config`].
    ///
    /// [`commit_config`]: Device::commit_config
    pub fn store_mut(&mut self) -> &mut ConfigStore<S> {
        &mut self.store
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn relays(&self) -> &RelayBoard<R> {
        &self.relays
    }

    pub fn relays_mut(&mut self) -> &mut RelayBoard<R> {
        &mut self.relays
    }

    pub fn mqtt(&self) -> &MqttSync<T> {
        &self.mqtt
    }

    pub fn mqtt_mut(&mut self) -> &mut MqttSync<T> {
        &mut self.mqtt
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_link_up(&self) -> bool {
        self.link_up
    }
}

/// Deliver one event to the collaborator registered under `id`.
#[allow(clippy::too_many_arguments)]
fn route<N, T, R>(
    id: ObserverId,
    event: Event,
    record: &ConfigRecord,
    now: Instant,
    network: &mut N,
    relays: &mut RelayBoard<R>,
    mqtt: &mut MqttSync<T>,
    sensors: &mut [Box<dyn Sensor>],
) where
    N: Network,
    T: MqttTransport,
    R: RelayDriver,
{
    match (id, event) {
        (ObserverId::Network, Event::NetworkChanged) => network.configure(&record.network),
        (ObserverId::Mdns, Event::MdnsChanged) => {
            network.announce(&record.device.hostname, &record.device.name)
        }
        (ObserverId::RelayBoard, _) => relays.update(event, record, now),
        (ObserverId::Mqtt, _) => mqtt.update(event, record),
        (ObserverId::Sensors, Event::ConfigChanged) => {
            for sensor in sensors.iter_mut() {
                sensor.configure(record);
            }
        }
        (ObserverId::Network | ObserverId::Mdns | ObserverId::Sensors, _) => {}
    }
}
