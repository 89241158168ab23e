//! Per-tick algorithm input and the state carried between ticks.
//!
//! 每次循环的算法输入以及在循环之间传递的状态。

use crate::packet::VehicleState;
use tokio::time::Instant;

/// Everything a decision needs for one tick. Built fresh by the control loop.
///
/// 一次决策所需的全部输入，由控制循环每次重新构建。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub now: Instant,
    pub acceleration: f64,
    pub speed: f64,
    pub turn_rate: f64,
    /// Beacon range and proximity sensor fused, if either had a reading.
    /// 信标距离与接近传感器读数的融合值（如果任一有读数）。
    pub front_distance: Option<f64>,
    /// The retained predecessor broadcast, if it is recent enough.
    /// 保留的前车广播（如果足够新）。
    pub message: Option<VehicleState>,
}

/// Values one tick leaves for the next: the derivative term and dead-reckoning
/// both look one tick back.
///
/// 一次循环留给下一次循环的值：微分项和航位推算都需要回看一次循环。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CarryForward {
    pub distance: Option<f64>,
    pub speed: f64,
    pub acceleration: f64,
}

/// Equal-weight average when both estimates exist, otherwise whichever exists.
///
/// 两个估计值都存在时取等权平均，否则取存在的那个。
pub fn fuse(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(0.5 * a + 0.5 * b),
        (Some(x), None) | (None, Some(x)) => Some(x),
        (None, None) => None,
    }
}
