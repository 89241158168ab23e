//! Identity generation.
//!
//! 身份ID生成。

use std::fmt::Debug;

/// Source of fresh vehicle, platoon and transaction ids.
///
/// 新车辆、车队和事务ID的来源。
pub trait IdGenerator: Send + Sync + Debug {
    fn next_id(&mut self) -> u32;

    /// Draws ids until one is not `taken`.
    ///
    /// 持续生成ID，直到得到一个未被 `taken` 占用的ID。
    fn fresh_id(&mut self, taken: &dyn Fn(u32) -> bool) -> u32 {
        loop {
            let id = self.next_id();
            if !taken(id) {
                return id;
            }
        }
    }
}

/// Uniformly random ids.
///
/// 均匀随机ID。
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> u32 {
        rand::random()
    }
}

/// Counts up from a starting value. Deterministic, for tests and simulations.
///
/// 从起始值递增计数。确定性的，用于测试和仿真。
#[derive(Debug, Clone)]
pub struct SequentialIds {
    next: u32,
}

impl SequentialIds {
    pub fn starting_at(start: u32) -> Self {
        Self { next: start }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }
}
