//! Host simulator: runs the device loop against a JSON config file and
//! simulated sensors, relays, network and broker.

mod sim;

use std::time::Duration;

use anyhow::Context;
use greenhouse_core::{
    Clock, ConfigRecord, ConfigStore, Event, JsonFileStorage, ObserverId, RelayConfig,
    SystemClock, Timer,
};
use greenhouse_device::{Device, MqttSync, TimeStampSensor};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::sim::{LoggingRelays, SimBroker, SimNetwork, SimOta, SimTemperature, SystemTime};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,greenhouse_device=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GREENHOUSE_CONFIG").ok())
        .unwrap_or_else(|| "greenhouse.json".to_string());
    let run_for = std::env::var("GREENHOUSE_RUN_SECS")
        .ok()
        .map(|s| s.parse::<u64>())
        .transpose()
        .context("GREENHOUSE_RUN_SECS must be a number of seconds")?
        .map(Duration::from_secs);
    let client_id = std::env::var("GREENHOUSE_CLIENT_ID")
        .unwrap_or_else(|_| format!("greenhouse-{}", uuid::Uuid::new_v4()));

    tracing::info!(config = %config_path, client_id = %client_id, "greenhouse simulator starting");

    let storage = JsonFileStorage::open(&config_path)
        .with_context(|| format!("opening config register {config_path}"))?;
    let mut store = ConfigStore::load(storage).context("loading configuration")?;
    if store.record().relays.is_empty() {
        tracing::info!("no relays configured, installing the demo set");
        store.set_relays(&[
            RelayConfig::new(0, "pump", 15_000),
            RelayConfig::new(1, "grow light", 60_000),
        ]);
    }
    // Persist repaired defaults before anyone is listening.
    store
        .commit(&mut |_: ObserverId, _: Event, _: &ConfigRecord| {})
        .context("persisting configuration defaults")?;
    tracing::info!(
        config = %serde_json::to_string(&store.record().to_representation())?,
        "configuration loaded"
    );

    let timing = store.record().timing.clone();
    let mqtt = MqttSync::new(SimBroker::default(), &client_id);
    let clock = SystemClock::new();
    let mut device = Device::new(
        clock,
        store,
        SimNetwork::new(Duration::from_secs(2)),
        mqtt,
        LoggingRelays,
    )
    .with_sensor(Box::new(SimTemperature::default()))
    .with_sensor(Box::new(TimeStampSensor::new(SystemTime, &timing)))
    .with_ota(Box::new(SimOta));

    device.begin();

    let mut status = Timer::new(Duration::from_secs(10));
    let started = device.clock().now();
    loop {
        let tick = device.tick();

        if status.fire(tick.now) {
            status.restart(tick.now);
            let outputs: Vec<String> = device
                .relays()
                .relays()
                .iter()
                .map(|r| format!("{}={}", r.name, if r.output { "on" } else { "off" }))
                .collect();
            tracing::info!(
                ticks = device.ticks(),
                link = tick.link_up,
                online = device.mqtt().is_online(),
                relays = %outputs.join(","),
                "status"
            );
        }

        if let Some(limit) = run_for {
            if tick.now.duration_since(started) >= limit {
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
