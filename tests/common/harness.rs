//! tests/common/harness.rs
#![allow(dead_code)]

use platoon_protocol::{
    config::Config,
    packet::{Motion, VehicleState},
    platoon::{Coordinator, SequentialIds},
    transport::{Medium, MemoryTransport},
    vehicle::{Actuator, Beacon, BeaconReader, SensorReader},
};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::time::Instant;

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter =
            std::env::var("RUST_LOG").unwrap_or_else(|_| "platoon_protocol=debug".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

pub const MAX_PACKET_SIZE: usize = 1024;

/// A call made on a `RecordingActuator`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Acceleration(f64),
    TurnRate(f64),
    Stop,
}

/// Records every actuator call. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    log: Arc<Mutex<Vec<Command>>>,
}

impl RecordingActuator {
    pub fn commands(&self) -> Vec<Command> {
        self.log.lock().unwrap().clone()
    }

    pub fn accelerations(&self) -> Vec<f64> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                Command::Acceleration(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    pub fn stops(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| matches!(c, Command::Stop))
            .count()
    }
}

impl Actuator for RecordingActuator {
    fn set_acceleration(&mut self, acceleration: f64) {
        self.log.lock().unwrap().push(Command::Acceleration(acceleration));
    }

    fn set_turn_rate(&mut self, turn_rate: f64) {
        self.log.lock().unwrap().push(Command::TurnRate(turn_rate));
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().push(Command::Stop);
    }
}

/// Sensor readings a test can change while a loop owns the sensors.
#[derive(Debug, Clone, Copy, Default)]
pub struct Readings {
    pub speed: f64,
    pub acceleration: f64,
    pub turn_rate: f64,
    pub proximity: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedSensors {
    readings: Arc<Mutex<Readings>>,
}

impl ScriptedSensors {
    pub fn new(readings: Readings) -> Self {
        Self {
            readings: Arc::new(Mutex::new(readings)),
        }
    }

    pub fn set(&self, readings: Readings) {
        *self.readings.lock().unwrap() = readings;
    }

    fn read(&self) -> Readings {
        *self.readings.lock().unwrap()
    }
}

impl SensorReader for ScriptedSensors {
    fn acceleration(&self) -> f64 {
        self.read().acceleration
    }

    fn speed(&self) -> f64 {
        self.read().speed
    }

    fn turn_rate(&self) -> f64 {
        self.read().turn_rate
    }

    fn front_proximity(&self) -> Option<f64> {
        self.read().proximity
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoBeacons;

impl BeaconReader for NoBeacons {
    fn beacons(&self) -> Vec<Beacon> {
        Vec::new()
    }
}

/// A coordinator placed in a platoon on `medium`, drawing ids from `id_start`.
pub fn coordinator(
    medium: &Medium,
    vehicle_id: u32,
    platoon_id: u32,
    order: &[u32],
    id_start: u32,
) -> Coordinator<MemoryTransport> {
    Coordinator::with_platoon(
        medium.attach(),
        Box::new(SequentialIds::starting_at(id_start)),
        Config::default(),
        vehicle_id,
        platoon_id,
        order,
    )
    .unwrap()
}

/// Coordinators sharing one medium, driven in lock-step rounds.
#[derive(Debug)]
pub struct Fleet {
    pub vehicles: Vec<Coordinator<MemoryTransport>>,
}

impl Fleet {
    pub fn new(vehicles: Vec<Coordinator<MemoryTransport>>) -> Self {
        Self { vehicles }
    }

    /// Every vehicle broadcasts a state, then every vehicle ingests in order, then
    /// one control period passes.
    pub async fn round(&mut self) {
        for vehicle in &mut self.vehicles {
            let state = VehicleState::steady(Motion::new(5.0, 0.0, 0.0), Instant::now());
            vehicle.send(state).await.unwrap();
        }
        for vehicle in &mut self.vehicles {
            vehicle.ingest().await;
        }
        tokio::time::advance(Duration::from_millis(50)).await;
    }

    pub async fn rounds(&mut self, count: usize) {
        for _ in 0..count {
            self.round().await;
        }
    }

    pub fn platoon_ids(&self) -> Vec<u32> {
        self.vehicles.iter().map(|v| v.platoon_id()).collect()
    }

    pub fn positions(&self) -> Vec<u32> {
        self.vehicles.iter().map(|v| v.position()).collect()
    }
}
