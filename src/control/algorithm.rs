//! Algorithm variants, their factory and the named-parameter registry.
//!
//! 算法变体、其工厂以及命名参数注册表。

use super::params::{Parameter, Parameters};
use super::pid;
use super::snapshot::{CarryForward, Snapshot};
use crate::error::Error;
use crate::packet::Motion;
use std::{fmt, str::FromStr};
use tracing::trace;

/// The available decision algorithms.
///
/// 可用的决策算法。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    /// Never actuates.
    /// 从不执行动作。
    DoNothing,
    /// Mirrors the predecessor's chosen motion.
    /// 镜像前车选定的运动。
    Basic,
    /// PID on the fused front distance.
    /// 基于融合前方距离的 PID。
    Acc,
    /// `Acc` plus a feed-forward of the predecessor's chosen acceleration.
    /// `Acc` 加上前车选定加速度的前馈。
    Cacc,
}

const ACC_PARAMETERS: &[Parameter] = &[
    Parameter::PidP,
    Parameter::PidI,
    Parameter::PidD,
    Parameter::MaxAcceleration,
    Parameter::MinAcceleration,
    Parameter::BufferDistance,
    Parameter::HeadwayTime,
    Parameter::MaxSensorDistance,
];

const CACC_PARAMETERS: &[Parameter] = &[
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

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 4] = [
        AlgorithmKind::DoNothing,
        AlgorithmKind::Basic,
        AlgorithmKind::Acc,
        AlgorithmKind::Cacc,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmKind::DoNothing => "do_nothing",
            AlgorithmKind::Basic => "basic",
            AlgorithmKind::Acc => "acc",
            AlgorithmKind::Cacc => "cacc",
        }
    }

    /// The parameters this kind reads.
    ///
    /// 此类型读取的参数。
    pub fn parameters(&self) -> &'static [Parameter] {
        match self {
            AlgorithmKind::DoNothing => &[],
            AlgorithmKind::Basic => &[Parameter::MaxSensorDistance],
            AlgorithmKind::Acc => ACC_PARAMETERS,
            AlgorithmKind::Cacc => CACC_PARAMETERS,
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlgorithmKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| Error::UnknownName(s.to_owned()))
    }
}

/// Outcome of one follower decision.
///
/// 一次跟随车决策的结果。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Broadcast this chosen motion and send it to the actuator.
    /// 广播此选定运动并发送给执行器。
    Drive(Motion),
    /// Broadcast this chosen motion but leave the actuator alone.
    /// 广播此选定运动，但不操作执行器。
    Hold(Motion),
    /// No usable distance estimate.
    /// 没有可用的距离估计。
    EmergencyStop,
}

/// A decision algorithm with its tuning.
///
/// 带调节参数的决策算法。
#[derive(Debug, Clone, PartialEq)]
pub struct Algorithm {
    kind: AlgorithmKind,
    params: Parameters,
}

impl Algorithm {
    /// Builds any variant, `DoNothing` included, with default tuning.
    ///
    /// 以默认参数构建任一变体（包括 `DoNothing`）。
    pub fn new(kind: AlgorithmKind) -> Self {
        Self {
            kind,
            params: Parameters::default(),
        }
    }

    pub fn kind(&self) -> AlgorithmKind {
        self.kind
    }

    pub fn parameter_list(&self) -> &'static [Parameter] {
        self.kind.parameters()
    }

    fn uses(&self, parameter: Parameter) -> bool {
        self.kind.parameters().contains(&parameter)
    }

    /// `None` if this kind does not use `parameter`.
    ///
    /// 如果此类型不使用 `parameter`，返回 `None`。
    pub fn parameter(&self, parameter: Parameter) -> Option<f64> {
        self.uses(parameter).then(|| self.params.value(parameter))
    }

    /// Ignored if this kind does not use `parameter`.
    ///
    /// 如果此类型不使用 `parameter`，则忽略。
    pub fn set_parameter(&mut self, parameter: Parameter, value: f64) {
        if self.uses(parameter) {
            *self.params.slot(parameter) = value;
        } else {
            trace!(kind = %self.kind, %parameter, "Ignoring parameter this algorithm does not use");
        }
    }

    pub fn parameter_by_name(&self, name: &str) -> Option<f64> {
        name.parse().ok().and_then(|p| self.parameter(p))
    }

    /// Unknown names are ignored like unused ones.
    ///
    /// 未知名称与未使用的名称一样被忽略。
    pub fn set_parameter_by_name(&mut self, name: &str, value: f64) {
        match name.parse() {
            Ok(parameter) => self.set_parameter(parameter, value),
            Err(_) => trace!(name, "Ignoring unknown parameter name"),
        }
    }

    /// Runs the follower decision for one tick.
    ///
    /// 为一次循环运行跟随车决策。
    pub fn decide(&self, snapshot: &Snapshot, carry: &mut CarryForward) -> Decision {
        let own = Motion::new(snapshot.speed, snapshot.acceleration, snapshot.turn_rate);
        match self.kind {
            AlgorithmKind::DoNothing => Decision::Hold(own),
            AlgorithmKind::Basic => match snapshot.message {
                Some(message) => Decision::Drive(message.chosen),
                None => Decision::Drive(Motion::new(snapshot.speed, 0.0, snapshot.turn_rate)),
            },
            AlgorithmKind::Acc => pid::adaptive(&self.params, snapshot, carry, false),
            AlgorithmKind::Cacc => pid::adaptive(&self.params, snapshot, carry, true),
        }
    }
}
