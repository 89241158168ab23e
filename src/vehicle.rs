//! 车辆硬件的抽象接口：驱动执行器、传感器和信标测距。
//! Abstract interfaces to the vehicle hardware: drive actuator, sensors and beacon ranging.
//!
//! Vehicle dynamics and the physical drivers live outside this crate; the control
//! loop only talks to them through these traits.

use std::fmt::Debug;

/// Drive actuator.
///
/// 驱动执行器。
pub trait Actuator: Send + Debug {
    /// Attempts to reach the given signed acceleration in m/s².
    /// 尝试达到给定的有符号加速度（m/s²）。
    fn set_acceleration(&mut self, acceleration: f64);

    /// Attempts to reach the given turn rate in rad/s, negative is left.
    /// 尝试达到给定的转向速率（rad/s），负值表示左转。
    fn set_turn_rate(&mut self, turn_rate: f64);

    /// Brings the vehicle to a stop as quickly as possible.
    /// 尽快使车辆停止。
    fn stop(&mut self);
}

/// On-board sensors.
///
/// 车载传感器。
pub trait SensorReader: Send + Debug {
    fn acceleration(&self) -> f64;
    fn speed(&self) -> f64;
    fn turn_rate(&self) -> f64;

    /// Distance to the vehicle ahead in metres, if the sensor has a reading.
    /// 到前车的距离（米），如果传感器有读数。
    fn front_proximity(&self) -> Option<f64>;
}

/// A single beacon sighting.
///
/// 一次信标观测。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beacon {
    /// Bearing to the beacon in radians.
    /// 信标方位角（弧度）。
    pub angle: f64,
    /// Lower bound on the distance to the beacon in metres.
    /// 到信标距离的下界（米）。
    pub distance_lower_bound: f64,
}

/// Beacon ranging.
///
/// 信标测距。
pub trait BeaconReader: Send + Debug {
    fn beacons(&self) -> Vec<Beacon>;
}

/// Picks the beacon with the smallest distance lower bound.
/// 选出距离下界最小的信标。
pub fn closest_beacon(beacons: &[Beacon]) -> Option<Beacon> {
    beacons
        .iter()
        .copied()
        .filter(|b| !b.distance_lower_bound.is_nan())
        .min_by(|a, b| a.distance_lower_bound.total_cmp(&b.distance_lower_bound))
}
