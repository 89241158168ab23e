#![deny(clippy::expect_used, clippy::unwrap_used)]

//! The root of the vehicle platoon protocol library.
//! 车队协议库的根。
//!
//! Every vehicle runs the same [`control::ControlLoop`]: it reads its sensors,
//! drains the broadcast [`transport`], lets the [`platoon::Coordinator`] advance
//! identity and merges, decides with one of the [`control::Algorithm`] variants,
//! broadcasts its state and drives its [`vehicle::Actuator`].
//!
//! 每辆车运行相同的 [`control::ControlLoop`]：读取传感器，取出广播 [`transport`]
//! 中的数据，由 [`platoon::Coordinator`] 推进身份与合并，使用某个
//! [`control::Algorithm`] 变体做出决策，广播自身状态并驱动 [`vehicle::Actuator`]。

pub mod config;
pub mod control;
pub mod error;
pub mod packet;
pub mod platoon;
pub mod transport;
pub mod vehicle;

mod testing;
