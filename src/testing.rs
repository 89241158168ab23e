//! 测试辅助工具模块
//! Test utilities module

#![cfg(test)]

use crate::vehicle::{Actuator, Beacon, BeaconReader, SensorReader};
use std::sync::{Arc, Mutex};

/// A call made on a `RecordingActuator`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Acceleration(f64),
    TurnRate(f64),
    Stop,
}

/// An actuator that only records what it was told. Clones share one log, so a
/// test keeps a clone after boxing the other into a control loop.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    log: Arc<Mutex<Vec<Command>>>,
}

impl RecordingActuator {
    pub fn commands(&self) -> Vec<Command> {
        self.log.lock().unwrap().clone()
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

/// Sensors that always read the same values.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSensors {
    pub speed: f64,
    pub acceleration: f64,
    pub turn_rate: f64,
    pub proximity: Option<f64>,
}

impl SensorReader for FixedSensors {
    fn acceleration(&self) -> f64 {
        self.acceleration
    }

    fn speed(&self) -> f64 {
        self.speed
    }

    fn turn_rate(&self) -> f64 {
        self.turn_rate
    }

    fn front_proximity(&self) -> Option<f64> {
        self.proximity
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixedBeacons(pub Vec<Beacon>);

impl BeaconReader for FixedBeacons {
    fn beacons(&self) -> Vec<Beacon> {
        self.0.clone()
    }
}
