//! The deadline-scheduled control loop and its decision algorithms.
//!
//! 按截止时间调度的控制循环及其决策算法。

pub mod algorithm;
pub mod params;
pub mod pid;
pub mod route;
pub mod scheduler;
pub mod snapshot;

pub use algorithm::{Algorithm, AlgorithmKind, Decision};
pub use params::{Parameter, Parameters};
pub use route::{Instruction, LeaderRoute, ScriptedRoute, Stationary};
pub use scheduler::{ControlLoop, LoopState};
pub use snapshot::{CarryForward, Snapshot, fuse};

#[cfg(test)]
mod tests;
