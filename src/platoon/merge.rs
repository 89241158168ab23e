//! The in-flight merge transaction.
//!
//! 进行中的合并事务。

use crate::packet::{MergeAccept, MergeRequest};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// Which platoon this vehicle belongs to in a merge.
///
/// 在合并中此车辆所属的车队。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeSide {
    /// Stays at the head and absorbs the other platoon behind its tail.
    /// 保持在前方，并在队尾吸收另一个车队。
    Main,
    /// Joins behind the main platoon's tail.
    /// 加入到主车队队尾之后。
    Merging,
}

/// One attempt to merge two platoons, as seen by one vehicle.
///
/// 从单辆车视角看到的一次两车队合并尝试。
#[derive(Debug, Clone)]
pub struct MergeTransaction {
    pub transaction_id: u32,
    pub main_platoon_id: u32,
    /// Unknown to main-side members who only heard the Accept.
    /// 对于只收到 Accept 的主车队成员而言未知。
    pub merging_platoon_id: Option<u32>,
    pub side: MergeSide,
    /// Ids spliced into our ordering at commit, in order. On the main side this is
    /// the merging platoon before renaming, on the merging side the main platoon.
    /// 提交时按顺序拼接到我们排序中的ID。主车队一侧为重命名前的合并车队，
    /// 合并车队一侧为主车队。
    pub incoming: Vec<u32>,
    /// Merging-platoon ids that clash with the main platoon and their replacements.
    /// 与主车队冲突的合并车队ID及其替换。
    pub renames: BTreeMap<u32, u32>,
    /// Added to our position at commit.
    /// 提交时加到我们位置上的值。
    pub position_delta: i32,
    /// Set once the deciding leader has every confirmation it needs.
    /// 决策领队收到所需的全部确认后置位。
    pub confirmed: bool,
    accepted: bool,
    confirm_sent: bool,
    confirmations: HashSet<u32>,
    started_at: Instant,
}

impl MergeTransaction {
    fn new(
        transaction_id: u32,
        main_platoon_id: u32,
        merging_platoon_id: Option<u32>,
        side: MergeSide,
        now: Instant,
    ) -> Self {
        Self {
            transaction_id,
            main_platoon_id,
            merging_platoon_id,
            side,
            incoming: Vec::new(),
            renames: BTreeMap::new(),
            position_delta: 0,
            confirmed: false,
            accepted: false,
            confirm_sent: false,
            confirmations: HashSet::new(),
            started_at: now,
        }
    }

    /// Main side, before the merging platoon has answered. Used by the initiating
    /// leader and by members that overhear their leader's Request.
    ///
    /// 主车队一侧，合并车队尚未答复时。用于发起的领队以及听到本队领队 Request 的成员。
    pub fn initiate(
        transaction_id: u32,
        main_platoon_id: u32,
        merging_platoon_id: u32,
        now: Instant,
    ) -> Self {
        Self::new(
            transaction_id,
            main_platoon_id,
            Some(merging_platoon_id),
            MergeSide::Main,
            now,
        )
    }

    /// Merging side, from a Request addressed to our platoon.
    ///
    /// 合并车队一侧，来自发往本车队的 Request。
    pub fn join(request: &MergeRequest, own_platoon_id: u32, now: Instant) -> Self {
        let mut merge = Self::new(
            request.transaction_id,
            request.main_platoon_id,
            Some(own_platoon_id),
            MergeSide::Merging,
            now,
        );
        merge.incoming = request.platoon.clone();
        merge.position_delta = request.platoon.len() as i32;
        merge
    }

    /// Main side, for a member that missed the Request and first hears the Accept.
    ///
    /// 主车队一侧，用于错过 Request 而首先听到 Accept 的成员。
    pub fn from_accept(accept: &MergeAccept, own_platoon_id: u32, now: Instant) -> Self {
        let mut merge = Self::new(accept.transaction_id, own_platoon_id, None, MergeSide::Main, now);
        merge.apply_accept(accept);
        merge
    }

    /// Takes in the merging leader's answer.
    ///
    /// 接收合并车队领队的答复。
    pub fn apply_accept(&mut self, accept: &MergeAccept) {
        if self.side == MergeSide::Main {
            self.incoming = accept.platoon.clone();
        }
        self.renames = accept.renames.clone();
        self.accepted = true;
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn mark_confirm_sent(&mut self) {
        self.confirm_sent = true;
    }

    pub fn record_confirmation(&mut self, vehicle_id: u32) {
        self.confirmations.insert(vehicle_id);
    }

    /// Whether any Confirm has been sent or received for this transaction.
    ///
    /// 此事务是否已发送或收到任何 Confirm。
    pub fn confirm_seen(&self) -> bool {
        self.confirm_sent || !self.confirmations.is_empty()
    }

    /// The id `vehicle_id` carries once this merge commits.
    ///
    /// 此合并提交后 `vehicle_id` 使用的ID。
    pub fn renamed(&self, vehicle_id: u32) -> u32 {
        self.renames.get(&vehicle_id).copied().unwrap_or(vehicle_id)
    }

    /// The main side is ready to commit once every vehicle of the merging
    /// platoon has confirmed. Renamed vehicles confirm under their new id.
    ///
    /// 当合并车队的每辆车都已确认时，主车队一侧即可提交。被重命名的车辆以新ID确认。
    pub fn is_ready(&self) -> bool {
        self.side == MergeSide::Main
            && self.accepted
            && !self.incoming.is_empty()
            && self
                .incoming
                .iter()
                .all(|id| self.confirmations.contains(&self.renamed(*id)))
    }

    pub fn is_valid(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.started_at) <= timeout
    }

    /// Whether a transaction led by `main_platoon_id` may replace this one.
    ///
    /// An expired transaction always gives way. A live one gives way only while no
    /// Confirm has been exchanged and the newcomer's main platoon id is not higher,
    /// so two leaders that propose to each other at once agree on the lower id.
    ///
    /// 由 `main_platoon_id` 主导的事务是否可以替换此事务。
    ///
    /// 已过期的事务总是让位。有效事务仅在尚未交换任何 Confirm 且新事务的主车队ID
    /// 不更高时才让位，因此同时互相提议的两个领队会就较小的ID达成一致。
    pub fn yields_to(&self, main_platoon_id: u32, now: Instant, timeout: Duration) -> bool {
        !self.is_valid(now, timeout)
            || (!self.confirm_seen() && main_platoon_id <= self.main_platoon_id)
    }
}
