//! The control loop: sense, communicate, decide, broadcast and actuate once per period.
//!
//! Every tick checks for cancellation after communicating in, after deciding and
//! after actuating. A pending cancellation, a missing distance estimate or (when
//! configured) a platoon member's emergency all end in the same emergency stop,
//! after which the loop never ticks again.
//!
//! 控制循环：每个周期依次执行感知、通信、决策、广播和执行。
//!
//! 每次循环在接收通信之后、决策之后和执行之后检查取消信号。
//! 待处理的取消、缺失的距离估计，或（在配置时）车队成员的紧急情况，
//! 最终都会进入同一个紧急停车，此后循环不再运行。

use super::algorithm::{Algorithm, Decision};
use super::route::{Instruction, LeaderRoute, Stationary};
use super::snapshot::{CarryForward, Snapshot, fuse};
use crate::{
    config::Config,
    packet::{Motion, VehicleState},
    platoon::Coordinator,
    transport::Transport,
    vehicle::{Actuator, BeaconReader, SensorReader, closest_beacon},
};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// Lifecycle of a control loop. `Emergency` is terminal.
///
/// 控制循环的生命周期。`Emergency` 为终止状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Initialized,
    Running,
    Emergency,
}

/// One vehicle's control loop. Owns the coordinator and the hardware handles.
///
/// 单辆车的控制循环，持有协调器和硬件句柄。
#[derive(Debug)]
pub struct ControlLoop<T: Transport> {
    coordinator: Coordinator<T>,
    sensors: Box<dyn SensorReader>,
    beacons: Box<dyn BeaconReader>,
    actuator: Box<dyn Actuator>,
    route: Box<dyn LeaderRoute>,
    algorithm: Algorithm,
    carry: CarryForward,
    retained: Option<VehicleState>,
    config: Config,
    state: LoopState,
}

impl<T: Transport> ControlLoop<T> {
    pub fn new(
        coordinator: Coordinator<T>,
        sensors: Box<dyn SensorReader>,
        beacons: Box<dyn BeaconReader>,
        actuator: Box<dyn Actuator>,
        algorithm: Algorithm,
        config: Config,
    ) -> Self {
        Self {
            coordinator,
            sensors,
            beacons,
            actuator,
            route: Box::new(Stationary),
            algorithm,
            carry: CarryForward::default(),
            retained: None,
            config,
            state: LoopState::Initialized,
        }
    }

    /// Replaces the route followed while this vehicle leads.
    ///
    /// 替换本车担任领队时遵循的路线。
    pub fn with_route(mut self, route: Box<dyn LeaderRoute>) -> Self {
        self.route = route;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn coordinator(&self) -> &Coordinator<T> {
        &self.coordinator
    }

    pub fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    pub fn algorithm_mut(&mut self) -> &mut Algorithm {
        &mut self.algorithm
    }

    pub fn carry(&self) -> &CarryForward {
        &self.carry
    }

    /// The predecessor broadcast the next decision will use.
    ///
    /// 下一次决策将使用的前车广播。
    pub fn retained_message(&self) -> Option<&VehicleState> {
        self.retained.as_ref()
    }

    /// Runs ticks every control period until an emergency stop.
    ///
    /// A tick that overruns its period is logged and the next one starts at once.
    /// Cancellation while waiting for the next tick also stops the vehicle.
    ///
    /// 每个控制周期运行一次循环，直到紧急停车。
    ///
    /// 超出周期的循环会被记录，下一次循环立即开始。
    /// 在等待下一次循环期间取消同样会使车辆停车。
    pub async fn run(&mut self, cancel: CancellationToken) {
        let period = self.config.timing.control_period;
        while self.state != LoopState::Emergency {
            let started = Instant::now();
            self.tick(&cancel).await;
            if self.state == LoopState::Emergency {
                break;
            }

            let deadline = started + period;
            let now = Instant::now();
            if now > deadline {
                warn!(
                    vehicle_id = self.coordinator.vehicle_id(),
                    overrun_ms = (now - deadline).as_millis() as u64,
                    "Control period too short, tick overran"
                );
                continue;
            }
            tokio::select! {
                _ = sleep_until(deadline) => {}
                _ = cancel.cancelled() => self.emergency_stop().await,
            }
        }
        debug!(vehicle_id = self.coordinator.vehicle_id(), "Control loop finished");
    }

    /// Runs one tick. Does nothing once in `Emergency`.
    ///
    /// 运行一次循环。进入 `Emergency` 后不做任何事。
    pub async fn tick(&mut self, cancel: &CancellationToken) {
        if self.state == LoopState::Emergency {
            return;
        }
        self.state = LoopState::Running;
        let now = Instant::now();

        let acceleration = self.sensors.acceleration();
        let speed = self.sensors.speed();
        let turn_rate = self.sensors.turn_rate();
        let beacon = closest_beacon(&self.beacons.beacons()).map(|b| b.distance_lower_bound);
        let front_distance = fuse(beacon, self.sensors.front_proximity());
        let actual = Motion::new(speed, acceleration, turn_rate);

        self.coordinator.ingest().await;
        self.retain_message(now);
        if self.should_halt(cancel) {
            self.emergency_stop().await;
            return;
        }

        let (chosen, instruction) = if self.coordinator.is_leader() {
            (actual, self.route.next_step())
        } else {
            let snapshot = Snapshot {
                now,
                acceleration,
                speed,
                turn_rate,
                front_distance,
                message: self.retained,
            };
            match self.algorithm.decide(&snapshot, &mut self.carry) {
                Decision::Drive(chosen) => (
                    chosen,
                    Some(Instruction::new(chosen.acceleration, chosen.turn_rate)),
                ),
                Decision::Hold(chosen) => (chosen, None),
                Decision::EmergencyStop => {
                    warn!(
                        vehicle_id = self.coordinator.vehicle_id(),
                        "No front distance estimate from any source"
                    );
                    self.emergency_stop().await;
                    return;
                }
            }
        };
        if self.should_halt(cancel) {
            self.emergency_stop().await;
            return;
        }

        if let Err(e) = self
            .coordinator
            .send(VehicleState::new(actual, chosen, now))
            .await
        {
            warn!(error = %e, "Failed to broadcast vehicle state");
        }

        if let Some(instruction) = instruction {
            trace!(
                acceleration = instruction.acceleration,
                turn_rate = instruction.turn_rate,
                "Instructing actuator"
            );
            self.actuator.set_acceleration(instruction.acceleration);
            self.actuator.set_turn_rate(instruction.turn_rate);
        }

        if self.should_halt(cancel) {
            self.emergency_stop().await;
        }
    }

    /// Stops the vehicle and broadcasts one emergency packet. Latches: later
    /// calls do nothing.
    ///
    /// 使车辆停车并广播一个紧急包。锁存：之后的调用不做任何事。
    pub async fn emergency_stop(&mut self) {
        if self.state == LoopState::Emergency {
            return;
        }
        self.state = LoopState::Emergency;
        error!(vehicle_id = self.coordinator.vehicle_id(), "Emergency stop");
        self.actuator.stop();
        if let Err(e) = self.coordinator.notify_emergency().await {
            warn!(error = %e, "Failed to broadcast emergency");
        }
    }

    fn should_halt(&mut self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return true;
        }
        match self.coordinator.take_peer_emergency() {
            Some(sender) if self.config.control.halt_on_peer_emergency => {
                warn!(sender, "Halting for a platoon member's emergency");
                true
            }
            _ => false,
        }
    }

    /// Keeps the newest predecessor broadcast that is at least one period newer
    /// than the one already kept, then drops it once it is too old.
    ///
    /// 保留比已保留广播至少新一个周期的最新前车广播，过旧时将其丢弃。
    fn retain_message(&mut self, now: Instant) {
        let period = self.config.timing.control_period;
        let chain = self.coordinator.communications().ordered_predecessor_chain();
        for state in chain.into_iter().flatten() {
            match self.retained {
                Some(kept) if state.timestamp < kept.timestamp + period => {}
                _ => self.retained = Some(state),
            }
        }
        if self
            .retained
            .is_some_and(|m| m.age(now) > self.config.timing.max_message_age)
        {
            trace!("Retained predecessor broadcast is stale, dropping it");
            self.retained = None;
        }
    }
}
