//! Named tuning parameters of the decision algorithms.
//!
//! 决策算法的命名调节参数。

use crate::error::Error;
use std::{fmt, str::FromStr};

/// A tuning parameter, addressed by its stable name.
///
/// 以稳定名称寻址的调节参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    PidP,
    /// Stored and reported but not part of any decision formula.
    /// 会被保存和报告，但不参与任何决策公式。
    PidI,
    PidD,
    MaxAcceleration,
    MinAcceleration,
    BufferDistance,
    HeadwayTime,
    MaxSensorDistance,
    FeedForwardGain,
}

impl Parameter {
    pub const ALL: [Parameter; 9] = [
        Parameter::PidP,
        Parameter::PidI,
        Parameter::PidD,
        Parameter::MaxAcceleration,
        Parameter::MinAcceleration,
        Parameter::BufferDistance,
        Parameter::HeadwayTime,
        Parameter::MaxSensorDistance,
        Parameter::FeedForwardGain,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Parameter::PidP => "pid_p",
            Parameter::PidI => "pid_i",
            Parameter::PidD => "pid_d",
            Parameter::MaxAcceleration => "max_acceleration",
            Parameter::MinAcceleration => "min_acceleration",
            Parameter::BufferDistance => "buffer_distance",
            Parameter::HeadwayTime => "headway_time",
            Parameter::MaxSensorDistance => "max_sensor_distance",
            Parameter::FeedForwardGain => "feed_forward_gain",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Parameter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Parameter::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| Error::UnknownName(s.to_owned()))
    }
}

/// Current values of every parameter. Which of them an algorithm reads depends
/// on its kind.
///
/// 所有参数的当前值。算法读取哪些参数取决于其类型。
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    pub pid_p: f64,
    pub pid_i: f64,
    pub pid_d: f64,
    /// m/s²
    pub max_acceleration: f64,
    /// m/s²
    pub min_acceleration: f64,
    /// m
    pub buffer_distance: f64,
    /// s
    pub headway_time: f64,
    /// Proximity readings beyond this range in metres are ignored.
    /// 超出此范围（米）的接近传感器读数将被忽略。
    pub max_sensor_distance: f64,
    pub feed_forward_gain: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            pid_p: 0.5,
            pid_i: 0.0,
            pid_d: 1.8,
            max_acceleration: 2.0,
            min_acceleration: -2.0,
            buffer_distance: 0.4,
            headway_time: 0.1,
            max_sensor_distance: 2.0,
            feed_forward_gain: 1.0,
        }
    }
}

impl Parameters {
    pub(crate) fn slot(&mut self, parameter: Parameter) -> &mut f64 {
        match parameter {
            Parameter::PidP => &mut self.pid_p,
            Parameter::PidI => &mut self.pid_i,
            Parameter::PidD => &mut self.pid_d,
            Parameter::MaxAcceleration => &mut self.max_acceleration,
            Parameter::MinAcceleration => &mut self.min_acceleration,
            Parameter::BufferDistance => &mut self.buffer_distance,
            Parameter::HeadwayTime => &mut self.headway_time,
            Parameter::MaxSensorDistance => &mut self.max_sensor_distance,
            Parameter::FeedForwardGain => &mut self.feed_forward_gain,
        }
    }

    pub(crate) fn value(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::PidP => self.pid_p,
            Parameter::PidI => self.pid_i,
            Parameter::PidD => self.pid_d,
            Parameter::MaxAcceleration => self.max_acceleration,
            Parameter::MinAcceleration => self.min_acceleration,
            Parameter::BufferDistance => self.buffer_distance,
            Parameter::HeadwayTime => self.headway_time,
            Parameter::MaxSensorDistance => self.max_sensor_distance,
            Parameter::FeedForwardGain => self.feed_forward_gain,
        }
    }
}
