//! The position table: latest state heard from each relative position.
//!
//! 位置表：记录从每个相对位置收到的最新状态。

use crate::packet::VehicleState;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Maps a relative position offset to the latest `VehicleState` received from it.
///
/// Offsets count forward from the owning vehicle: `1` is the immediate predecessor,
/// the leader sits at the owner's own position. An entry is only replaced by a state
/// stamped at least `min_interval` later, so late or duplicated broadcasts over a
/// non-FIFO link never roll an entry back.
///
/// 将相对位置偏移映射到从该位置收到的最新 `VehicleState`。
///
/// 偏移从所属车辆向前计数：`1` 为紧邻的前车，领队位于所属车辆自身位置数处。
/// 只有时间戳至少晚 `min_interval` 的状态才能替换条目，
/// 因此非FIFO链路上的迟到或重复广播永远不会使条目回退。
#[derive(Debug, Clone)]
pub struct PositionTable {
    entries: HashMap<i32, VehicleState>,
    min_interval: Duration,
}

impl PositionTable {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            min_interval,
        }
    }

    /// Stores `state` for `offset` if it is newer by at least one interval.
    /// Returns whether the table changed.
    ///
    /// 如果 `state` 至少新一个间隔，则为 `offset` 存储它。返回表是否发生变化。
    pub fn update(&mut self, offset: i32, state: VehicleState) -> bool {
        match self.entries.get(&offset) {
            Some(current) if state.timestamp < current.timestamp + self.min_interval => false,
            _ => {
                self.entries.insert(offset, state);
                true
            }
        }
    }

    pub fn get(&self, offset: i32) -> Option<&VehicleState> {
        self.entries.get(&offset)
    }

    /// Drops every entry older than `max_age`.
    ///
    /// 删除所有早于 `max_age` 的条目。
    pub fn expire(&mut self, now: Instant, max_age: Duration) {
        self.entries.retain(|_, state| state.age(now) <= max_age);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
