//! PID cruise control: the adaptive variant and its cooperative extension.
//!
//! PID 巡航控制：自适应版本及其协同扩展。

use super::algorithm::Decision;
use super::params::Parameters;
use super::snapshot::{CarryForward, Snapshot, fuse};
use crate::packet::Motion;

/// Distance covered in `dt` seconds from speed `v` under constant acceleration `a`.
///
/// 以速度 `v`、恒定加速度 `a` 在 `dt` 秒内行驶的距离。
pub fn displacement(v: f64, a: f64, dt: f64) -> f64 {
    v * dt + 0.5 * a * dt * dt
}

/// Clamps into `[min, max]`. A NaN input lands on `min`.
///
/// 限制在 `[min, max]` 内。NaN 输入落在 `min` 上。
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Adaptive cruise control. With `feed_forward` the predecessor's chosen
/// acceleration is added before clamping.
///
/// 自适应巡航控制。启用 `feed_forward` 时，在限幅之前加上前车选定的加速度。
pub fn adaptive(
    params: &Parameters,
    snapshot: &Snapshot,
    carry: &mut CarryForward,
    feed_forward: bool,
) -> Decision {
    let previous = *carry;
    carry.speed = snapshot.speed;
    carry.acceleration = snapshot.acceleration;

    let (predicted, target_speed, target_turn) = match (snapshot.message, previous.distance) {
        (Some(message), Some(previous_distance)) => {
            let delay = snapshot
                .now
                .saturating_duration_since(message.timestamp)
                .as_secs_f64();
            let theirs = displacement(message.actual.speed, message.actual.acceleration, delay);
            let ours = displacement(previous.speed, previous.acceleration, delay);
            (
                Some(theirs - ours + previous_distance),
                message.chosen.speed,
                message.chosen.turn_rate,
            )
        }
        _ => (None, snapshot.speed, snapshot.turn_rate),
    };

    let sensed = snapshot
        .front_distance
        .filter(|d| *d <= params.max_sensor_distance);
    let Some(distance) = fuse(predicted, sensed) else {
        return Decision::EmergencyStop;
    };

    let p_term = params.pid_p
        * (distance - (params.headway_time * snapshot.speed + params.buffer_distance));
    let d_term = previous
        .distance
        .map_or(0.0, |previous_distance| params.pid_d * (distance - previous_distance));
    let mut acceleration = p_term + d_term;
    if feed_forward {
        if let Some(message) = snapshot.message {
            acceleration += params.feed_forward_gain * message.chosen.acceleration;
        }
    }

    carry.distance = Some(distance);
    Decision::Drive(Motion::new(
        target_speed,
        clamp(acceleration, params.min_acceleration, params.max_acceleration),
        target_turn,
    ))
}
