//! 车辆状态广播载荷。
//! The vehicle state broadcast payload.

use bytes::{Buf, BufMut};
use tokio::time::Instant;

/// Size of an encoded `VehicleState` payload: six `f64` values.
/// 编码后的 `VehicleState` 载荷大小：六个 `f64` 值。
pub const VEHICLE_STATE_SIZE: usize = 6 * 8;

/// Speed, acceleration and turn rate of a vehicle.
/// 车辆的速度、加速度和转向速率。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Motion {
    /// m/s
    pub speed: f64,
    /// m/s²
    pub acceleration: f64,
    /// rad/s
    pub turn_rate: f64,
}

impl Motion {
    pub fn new(speed: f64, acceleration: f64, turn_rate: f64) -> Self {
        Self {
            speed,
            acceleration,
            turn_rate,
        }
    }
}

/// One broadcast of a vehicle's state.
///
/// `actual` is what the sensors measured, `chosen` is what the vehicle decided to
/// apply. Followers can lag behind their chosen values because of actuation limits.
///
/// 一次车辆状态广播。
///
/// `actual` 为传感器测量值，`chosen` 为车辆决定采用的目标值。
/// 由于执行限制，跟随车可能滞后于其目标值。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    pub actual: Motion,
    pub chosen: Motion,
    /// Send time for states built locally, receipt time for decoded ones.
    /// 本地构建的状态为发送时间，解码得到的状态为接收时间。
    pub timestamp: Instant,
}

impl VehicleState {
    pub fn new(actual: Motion, chosen: Motion, timestamp: Instant) -> Self {
        Self {
            actual,
            chosen,
            timestamp,
        }
    }

    /// A state whose chosen motion is its measured motion, as a leader broadcasts.
    /// 目标运动等于实测运动的状态，即领队广播的状态。
    pub fn steady(actual: Motion, timestamp: Instant) -> Self {
        Self::new(actual, actual, timestamp)
    }

    /// Time since this state was stamped.
    /// 距此状态时间戳的时长。
    pub fn age(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.timestamp)
    }

    pub(crate) fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_f64(self.actual.speed);
        buf.put_f64(self.actual.acceleration);
        buf.put_f64(self.actual.turn_rate);
        buf.put_f64(self.chosen.speed);
        buf.put_f64(self.chosen.acceleration);
        buf.put_f64(self.chosen.turn_rate);
    }

    /// Expects exactly `VEHICLE_STATE_SIZE` bytes remaining.
    /// 要求恰好剩余 `VEHICLE_STATE_SIZE` 字节。
    pub(crate) fn decode<B: Buf>(buf: &mut B, received_at: Instant) -> Option<Self> {
        if buf.remaining() != VEHICLE_STATE_SIZE {
            return None;
        }
        let actual = Motion::new(buf.get_f64(), buf.get_f64(), buf.get_f64());
        let chosen = Motion::new(buf.get_f64(), buf.get_f64(), buf.get_f64());
        Some(Self::new(actual, chosen, received_at))
    }
}
