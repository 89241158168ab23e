//! A vehicle's identity within its platoon and the merge commit that rewrites it.
//!
//! 车辆在车队中的身份，以及重写身份的合并提交。

use super::merge::{MergeSide, MergeTransaction};
use crate::error::{Error, Result};
use std::collections::HashMap;

/// `(vehicle_id, platoon_id, position, leader_id)` plus the id to relative-offset map.
///
/// Offsets are `own position - their position`: positive ahead of us, `0` for
/// ourselves, negative behind. Within one platoon the map is a bijection between
/// ids and positions `0..len`.
///
/// `(vehicle_id, platoon_id, position, leader_id)` 以及ID到相对偏移的映射。
///
/// 偏移为 `自身位置 - 对方位置`：正数在前，`0` 为自身，负数在后。
/// 在同一车队内，该映射是ID与位置 `0..len` 之间的双射。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    vehicle_id: u32,
    platoon_id: u32,
    position: u32,
    leader_id: u32,
    offsets: HashMap<u32, i32>,
}

impl Identity {
    /// Leader of a platoon of one.
    ///
    /// 单车车队的领队。
    pub fn solo(vehicle_id: u32, platoon_id: u32) -> Self {
        Self {
            vehicle_id,
            platoon_id,
            position: 0,
            leader_id: vehicle_id,
            offsets: HashMap::from([(vehicle_id, 0)]),
        }
    }

    /// Member of an existing platoon given its ids leader first.
    ///
    /// 给定以领队开头的ID列表的现有车队成员。
    pub fn in_platoon(vehicle_id: u32, platoon_id: u32, order: &[u32]) -> Result<Self> {
        let position = order
            .iter()
            .position(|id| *id == vehicle_id)
            .ok_or(Error::UnknownVehicle(vehicle_id))?;
        let offsets = order
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, position as i32 - i as i32))
            .collect();
        Ok(Self {
            vehicle_id,
            platoon_id,
            position: position as u32,
            leader_id: order[0],
            offsets,
        })
    }

    pub fn vehicle_id(&self) -> u32 {
        self.vehicle_id
    }

    pub fn platoon_id(&self) -> u32 {
        self.platoon_id
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn leader_id(&self) -> u32 {
        self.leader_id
    }

    pub fn is_leader(&self) -> bool {
        self.position == 0
    }

    /// Relative offset of `vehicle_id`, if it is in our platoon.
    ///
    /// `vehicle_id` 的相对偏移（如果它在我们的车队中）。
    pub fn offset_of(&self, vehicle_id: u32) -> Option<i32> {
        self.offsets.get(&vehicle_id).copied()
    }

    pub fn contains(&self, vehicle_id: u32) -> bool {
        self.offsets.contains_key(&vehicle_id)
    }

    pub fn platoon_len(&self) -> usize {
        self.offsets.len()
    }

    /// The platoon's vehicle ids, leader first.
    ///
    /// 车队的车辆ID，领队在前。
    pub fn ordered_ids(&self) -> Vec<u32> {
        let mut entries: Vec<_> = self.offsets.iter().map(|(id, off)| (*off, *id)).collect();
        entries.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        entries.into_iter().map(|(_, id)| id).collect()
    }

    /// Builds the identity that results from committing `merge`.
    ///
    /// Renames, the splice of the incoming block and the position shift are all
    /// computed on a copy; the caller swaps it in whole.
    ///
    /// 构建提交 `merge` 之后的身份。
    ///
    /// 重命名、拼接新加入的车辆块以及位置偏移都在副本上计算，调用者整体替换。
    pub fn merged(&self, merge: &MergeTransaction) -> Self {
        let rename = |id: u32| merge.renamed(id);
        let mut next = self.clone();

        match merge.side {
            MergeSide::Main => {
                // The merging block goes behind our tail, its clashing ids replaced.
                let tail = self.offsets.len() as i32;
                for (i, id) in merge.incoming.iter().enumerate() {
                    next.offsets
                        .insert(rename(*id), self.position as i32 - (tail + i as i32));
                }
            }
            MergeSide::Merging => {
                next.offsets = self.offsets.iter().map(|(id, off)| (rename(*id), *off)).collect();
                next.vehicle_id = rename(self.vehicle_id);

                next.position = (self.position as i32 + merge.position_delta) as u32;
                for (i, id) in merge.incoming.iter().enumerate() {
                    next.offsets.insert(*id, next.position as i32 - i as i32);
                }
                if let Some(head) = merge.incoming.first() {
                    next.leader_id = *head;
                }
            }
        }

        next.platoon_id = merge.main_platoon_id;
        next
    }
}
