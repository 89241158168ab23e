//! Leader trajectories.
//!
//! 领队轨迹。

use std::collections::VecDeque;
use std::fmt::Debug;

/// An acceleration and turn rate to hand to the actuator.
///
/// 交给执行器的加速度和转向速率。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Instruction {
    pub acceleration: f64,
    pub turn_rate: f64,
}

impl Instruction {
    pub fn new(acceleration: f64, turn_rate: f64) -> Self {
        Self {
            acceleration,
            turn_rate,
        }
    }
}

/// What the leader does, advanced once per tick while this vehicle leads.
///
/// 领队的行为，在本车担任领队期间每次循环推进一次。
pub trait LeaderRoute: Send + Debug {
    /// `Some` when the instruction should be applied this tick.
    ///
    /// 当本次循环应执行指令时返回 `Some`。
    fn next_step(&mut self) -> Option<Instruction>;
}

/// Never instructs; the leader keeps whatever it is doing.
///
/// 从不发出指令；领队保持当前状态。
#[derive(Debug, Default, Clone, Copy)]
pub struct Stationary;

impl LeaderRoute for Stationary {
    fn next_step(&mut self) -> Option<Instruction> {
        None
    }
}

/// Applies each instruction at the tick it is scheduled for.
///
/// 在预定的循环次数执行每条指令。
#[derive(Debug, Clone, Default)]
pub struct ScriptedRoute {
    steps: VecDeque<(u64, Instruction)>,
    tick: u64,
}

impl ScriptedRoute {
    pub fn new(steps: impl IntoIterator<Item = (u64, Instruction)>) -> Self {
        let mut steps: Vec<_> = steps.into_iter().collect();
        steps.sort_by_key(|(tick, _)| *tick);
        Self {
            steps: steps.into(),
            tick: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.steps.is_empty()
    }
}

impl LeaderRoute for ScriptedRoute {
    fn next_step(&mut self) -> Option<Instruction> {
        let tick = self.tick;
        self.tick += 1;
        match self.steps.front() {
            Some((at, _)) if *at <= tick => self.steps.pop_front().map(|(_, step)| step),
            _ => None,
        }
    }
}
