//! Read-only view of the platoon handed to the control loop.
//!
//! 交给控制循环的车队只读视图。

use super::identity::Identity;
use super::lookup::PositionTable;
use crate::packet::VehicleState;

/// Borrowed for the duration of one call; never stored.
///
/// 仅在一次调用期间借用，从不保存。
#[derive(Debug, Clone, Copy)]
pub struct Communications<'a> {
    identity: &'a Identity,
    table: &'a PositionTable,
}

impl<'a> Communications<'a> {
    pub(crate) fn new(identity: &'a Identity, table: &'a PositionTable) -> Self {
        Self { identity, table }
    }

    /// States heard from the vehicles ahead, the immediate predecessor first and
    /// the leader last. `None` marks a position nothing recent was heard from.
    /// Empty for the leader.
    ///
    /// 从前方车辆收到的状态，紧邻前车在前、领队在后。
    /// `None` 表示该位置最近没有收到任何消息。领队的列表为空。
    pub fn ordered_predecessor_chain(&self) -> Vec<Option<VehicleState>> {
        (1..=self.identity.position() as i32)
            .map(|offset| self.table.get(offset).copied())
            .collect()
    }

    pub fn is_leader(&self) -> bool {
        self.identity.is_leader()
    }
}
