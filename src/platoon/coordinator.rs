//! The identity and merge coordinator.
//!
//! Owns this vehicle's identity, the position table and at most one merge
//! transaction. Once per tick `ingest` drains the transport and advances all
//! three; nothing else mutates them.
//!
//! 身份与合并协调器。
//!
//! 持有本车身份、位置表以及至多一个合并事务。每次循环 `ingest` 取出传输中的数据并
//! 推进这三者，除此之外没有其他地方修改它们。

use super::communications::Communications;
use super::identity::Identity;
use super::ids::IdGenerator;
use super::lookup::PositionTable;
use super::merge::{MergeSide, MergeTransaction};
use crate::{
    config::Config,
    error::Result,
    packet::{MergeAccept, MergeRequest, Message, Packet, VehicleState},
    transport::Transport,
};
use std::collections::{BTreeMap, HashSet};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Identity and merge coordinator for one vehicle.
///
/// 单辆车的身份与合并协调器。
#[derive(Debug)]
pub struct Coordinator<T: Transport> {
    transport: T,
    ids: Box<dyn IdGenerator>,
    config: Config,
    identity: Identity,
    table: PositionTable,
    merge: Option<MergeTransaction>,
    /// Platoon just absorbed behind us; its members keep broadcasting the old id
    /// until they have all committed.
    absorbed: Option<(u32, Instant)>,
    peer_emergency: Option<u32>,
}

impl<T: Transport> Coordinator<T> {
    /// A fresh vehicle leading a platoon of one, with generated ids.
    ///
    /// 一辆新车，以生成的ID领导单车车队。
    pub fn new(transport: T, mut ids: Box<dyn IdGenerator>, config: Config) -> Self {
        let vehicle_id = ids.next_id();
        let platoon_id = ids.next_id();
        Self::with_identity(transport, ids, config, Identity::solo(vehicle_id, platoon_id))
    }

    /// A vehicle already placed in a platoon, given the platoon's ids leader first.
    ///
    /// 已位于车队中的车辆，给定以领队开头的车队ID列表。
    pub fn with_platoon(
        transport: T,
        ids: Box<dyn IdGenerator>,
        config: Config,
        vehicle_id: u32,
        platoon_id: u32,
        order: &[u32],
    ) -> Result<Self> {
        let identity = Identity::in_platoon(vehicle_id, platoon_id, order)?;
        Ok(Self::with_identity(transport, ids, config, identity))
    }

    fn with_identity(
        transport: T,
        ids: Box<dyn IdGenerator>,
        config: Config,
        identity: Identity,
    ) -> Self {
        let table = PositionTable::new(config.timing.control_period);
        Self {
            transport,
            ids,
            config,
            identity,
            table,
            merge: None,
            absorbed: None,
            peer_emergency: None,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn vehicle_id(&self) -> u32 {
        self.identity.vehicle_id()
    }

    pub fn platoon_id(&self) -> u32 {
        self.identity.platoon_id()
    }

    pub fn position(&self) -> u32 {
        self.identity.position()
    }

    pub fn leader_id(&self) -> u32 {
        self.identity.leader_id()
    }

    pub fn is_leader(&self) -> bool {
        self.identity.is_leader()
    }

    pub fn position_table(&self) -> &PositionTable {
        &self.table
    }

    pub fn active_merge(&self) -> Option<&MergeTransaction> {
        self.merge.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// A read-only view for the control loop.
    ///
    /// 供控制循环使用的只读视图。
    pub fn communications(&self) -> Communications<'_> {
        Communications::new(&self.identity, &self.table)
    }

    /// The vehicle of our platoon that reported an emergency since the last call.
    ///
    /// 自上次调用以来报告紧急情况的本车队车辆。
    pub fn take_peer_emergency(&mut self) -> Option<u32> {
        self.peer_emergency.take()
    }

    /// Broadcasts our state tagged with our current identity.
    ///
    /// 广播带有当前身份标记的本车状态。
    pub async fn send(&mut self, state: VehicleState) -> Result<()> {
        self.broadcast(self.platoon_id(), Message::VehicleState(state)).await
    }

    /// Broadcasts a parameterless emergency packet.
    ///
    /// 广播一个无参数的紧急包。
    pub async fn notify_emergency(&mut self) -> Result<()> {
        warn!(vehicle_id = self.vehicle_id(), "Broadcasting emergency");
        self.broadcast(self.platoon_id(), Message::Emergency).await
    }

    async fn broadcast(&self, platoon_id: u32, message: Message) -> Result<()> {
        self.broadcast_as(platoon_id, self.vehicle_id(), message).await
    }

    async fn broadcast_as(&self, platoon_id: u32, sender: u32, message: Message) -> Result<()> {
        let packet = Packet::new(platoon_id, sender, message);
        let bytes = packet.encode(self.transport.max_packet_size())?;
        self.transport.send(bytes).await
    }

    /// Sends a protocol message, logging instead of failing.
    ///
    /// 发送协议消息，出错时记录日志而不是失败。
    async fn send_protocol(&self, platoon_id: u32, message: Message) {
        self.send_protocol_as(platoon_id, self.vehicle_id(), message).await;
    }

    async fn send_protocol_as(&self, platoon_id: u32, sender: u32, message: Message) {
        let kind = message.message_type();
        if let Err(e) = self.broadcast_as(platoon_id, sender, message).await {
            warn!(error = %e, %kind, "Failed to send merge message");
        }
    }

    /// Confirms `transaction_id` to the main platoon under the id we will carry
    /// after the merge, which never clashes with a main-platoon id.
    ///
    /// 以合并后将使用的ID（不会与主车队ID冲突）向主车队确认 `transaction_id`。
    async fn send_confirm(&self, main_platoon_id: u32, transaction_id: u32, as_id: u32) {
        debug!(transaction_id, main = main_platoon_id, as_id, "Confirming merge");
        self.send_protocol_as(main_platoon_id, as_id, Message::MergeConfirm { transaction_id })
            .await;
    }

    /// Drains every pending receipt in arrival order and processes each one.
    ///
    /// 按到达顺序取出并处理所有待处理的接收数据。
    pub async fn ingest(&mut self) {
        let receipts = match self.transport.poll().await {
            Ok(receipts) => receipts,
            Err(e) => {
                warn!(error = %e, "Transport poll failed");
                return;
            }
        };

        let now = Instant::now();
        self.table.expire(now, self.config.timing.max_message_age);

        let max = self.transport.max_packet_size();
        for receipt in receipts {
            let packet = match Packet::decode(&receipt.data, receipt.received_at, max) {
                Ok(packet) => packet,
                Err(e) => {
                    debug!(error = %e, bytes = receipt.data.len(), "Dropping undecodable packet");
                    continue;
                }
            };
            if self.is_own_echo(&packet) {
                continue;
            }
            self.handle_packet(packet, receipt.received_at).await;
        }
    }

    /// Whether `packet` is one we broadcast ourselves.
    ///
    /// Vehicle ids are only unique within a platoon, so a vehicle of another
    /// platoon may share ours until a merge renames it. The sender's platoon is
    /// told apart by message kind: states and Requests name it, Accepts and
    /// Confirms are only ever sent to another platoon. A Complete is always
    /// processed; its transaction id filters our own copy.
    ///
    /// `packet` 是否为我们自己广播的包。
    ///
    /// 车辆ID仅在车队内唯一，因此在合并重命名之前，其他车队的车辆可能与我们同ID。
    /// 按消息类型区分发送方车队：状态与 Request 携带发送方车队，Accept 与 Confirm
    /// 只会发往其他车队。Complete 总是被处理，由事务ID过滤掉自身的副本。
    fn is_own_echo(&self, packet: &Packet) -> bool {
        if packet.vehicle_id != self.vehicle_id() {
            return false;
        }
        match &packet.message {
            Message::VehicleState(_) | Message::Emergency => packet.platoon_id == self.platoon_id(),
            Message::MergeRequest(request) => request.main_platoon_id == self.platoon_id(),
            Message::MergeAccept(_) | Message::MergeConfirm { .. } => {
                packet.platoon_id != self.platoon_id()
            }
            Message::MergeComplete { .. } => false,
        }
    }

    async fn handle_packet(&mut self, packet: Packet, now: Instant) {
        let Packet {
            platoon_id,
            vehicle_id: sender,
            message,
        } = packet;
        let ours = platoon_id == self.platoon_id();
        let from_our_leader = sender == self.leader_id();

        match message {
            Message::VehicleState(state) => {
                if ours {
                    self.record_state(sender, state);
                } else {
                    self.begin_merge(platoon_id, now).await;
                }
            }
            Message::Emergency => {
                if ours {
                    warn!(sender, "Platoon member reported an emergency");
                    self.peer_emergency = Some(sender);
                }
            }
            Message::MergeRequest(request) if ours || from_our_leader => {
                self.handle_request(platoon_id, sender, request, now).await;
            }
            Message::MergeAccept(accept) if ours || from_our_leader => {
                self.handle_accept(platoon_id, accept, now).await;
            }
            Message::MergeConfirm { transaction_id } if ours && self.is_leader() => {
                self.handle_confirm(sender, transaction_id).await;
            }
            Message::MergeComplete { transaction_id } if ours => {
                if self.merge.as_ref().is_some_and(|m| m.transaction_id == transaction_id) {
                    self.commit();
                } else {
                    trace!(transaction_id, "Ignoring Complete for an unknown transaction");
                }
            }
            other => {
                trace!(
                    kind = %other.message_type(),
                    transaction_id = ?other.transaction_id(),
                    platoon_id,
                    sender,
                    "Ignoring message not meant for us"
                );
            }
        }
    }

    fn record_state(&mut self, sender: u32, state: VehicleState) {
        match self.identity.offset_of(sender) {
            Some(offset) => {
                if !self.table.update(offset, state) {
                    trace!(sender, offset, "Kept newer state over late broadcast");
                }
            }
            None => trace!(sender, "State from a vehicle missing in our ordering"),
        }
    }

    fn merge_is_live(&self, now: Instant) -> bool {
        let timeout = self.config.merge.transaction_timeout;
        self.merge.as_ref().is_some_and(|m| m.is_valid(now, timeout))
    }

    /// A leader that hears a foreign platoon proposes to absorb it.
    ///
    /// 听到外部车队的领队提议吸收该车队。
    async fn begin_merge(&mut self, foreign_platoon_id: u32, now: Instant) {
        if !self.is_leader() || self.merge_is_live(now) {
            return;
        }
        let timeout = self.config.merge.transaction_timeout;
        if let Some((absorbed, at)) = self.absorbed {
            if absorbed == foreign_platoon_id && now.saturating_duration_since(at) <= timeout {
                return;
            }
        }

        let transaction_id = self.ids.next_id();
        let merge = MergeTransaction::initiate(transaction_id, self.platoon_id(), foreign_platoon_id, now);
        let request = MergeRequest {
            transaction_id,
            main_platoon_id: self.platoon_id(),
            platoon: self.identity.ordered_ids(),
        };
        info!(
            transaction_id,
            main = self.platoon_id(),
            merging = foreign_platoon_id,
            "Proposing merge"
        );
        self.merge = Some(merge);
        self.send_protocol(foreign_platoon_id, Message::MergeRequest(request)).await;
    }

    async fn handle_request(&mut self, addressed_to: u32, sender: u32, request: MergeRequest, now: Instant) {
        if let Some(current) = &self.merge {
            if current.transaction_id == request.transaction_id
                && current.main_platoon_id == request.main_platoon_id
            {
                return;
            }
            let timeout = self.config.merge.transaction_timeout;
            if !current.yields_to(request.main_platoon_id, now, timeout) {
                debug!(
                    active = current.transaction_id,
                    rejected = request.transaction_id,
                    "Rejecting Request while another merge is in flight"
                );
                return;
            }
            debug!(
                superseded = current.transaction_id,
                by = request.transaction_id,
                "Merge transaction superseded"
            );
        }

        if addressed_to != self.platoon_id() {
            // Our own leader proposing to a foreign platoon: we stay on the main side.
            self.merge = Some(MergeTransaction::initiate(
                request.transaction_id,
                self.platoon_id(),
                addressed_to,
                now,
            ));
            return;
        }
        if request.main_platoon_id == self.platoon_id() {
            return;
        }

        let mut merge = MergeTransaction::join(&request, self.platoon_id(), now);
        debug!(
            transaction_id = request.transaction_id,
            main = request.main_platoon_id,
            sender,
            "Recorded merge into a foreign platoon"
        );

        if self.is_leader() {
            let accept = self.accept_for(&request);
            merge.apply_accept(&accept);
            merge.mark_confirm_sent();
            let transaction_id = request.transaction_id;
            let as_id = merge.renamed(self.vehicle_id());
            self.merge = Some(merge);

            info!(transaction_id, main = request.main_platoon_id, renames = accept.renames.len(), "Accepting merge");
            self.send_protocol(request.main_platoon_id, Message::MergeAccept(accept)).await;
            self.send_confirm(request.main_platoon_id, transaction_id, as_id).await;
        } else {
            self.merge = Some(merge);
        }
    }

    /// Builds our Accept, replacing every id of ours that the main platoon also uses.
    ///
    /// 构建 Accept，替换本车队中与主车队重复的每个ID。
    fn accept_for(&mut self, request: &MergeRequest) -> MergeAccept {
        let platoon = self.identity.ordered_ids();
        let main: HashSet<u32> = request.platoon.iter().copied().collect();
        let mut taken: HashSet<u32> = main.iter().copied().chain(platoon.iter().copied()).collect();

        let mut renames = BTreeMap::new();
        for id in platoon.iter().filter(|id| main.contains(id)) {
            let fresh = self.ids.fresh_id(&|candidate| taken.contains(&candidate));
            taken.insert(fresh);
            renames.insert(*id, fresh);
        }

        MergeAccept {
            transaction_id: request.transaction_id,
            accepted: true,
            platoon,
            renames,
        }
    }

    async fn handle_accept(&mut self, addressed_to: u32, accept: MergeAccept, now: Instant) {
        let own_platoon = self.platoon_id();
        let matches = self
            .merge
            .as_ref()
            .is_some_and(|m| m.transaction_id == accept.transaction_id);

        if !accept.accepted {
            if matches {
                info!(transaction_id = accept.transaction_id, "Merge refused");
                self.merge = None;
            }
            return;
        }

        if addressed_to == own_platoon {
            // Main side: learn who is joining behind us.
            let main_side = self.merge.as_ref().is_some_and(|m| m.side == MergeSide::Main);
            if matches && main_side {
                if let Some(m) = self.merge.as_mut() {
                    m.apply_accept(&accept);
                }
            } else if !self.is_leader() && !self.merge_is_live(now) {
                self.merge = Some(MergeTransaction::from_accept(&accept, own_platoon, now));
            } else {
                trace!(transaction_id = accept.transaction_id, "Ignoring Accept for another transaction");
                return;
            }
            if self.is_leader() {
                self.try_complete().await;
            }
        } else if let Some(m) = self.merge.as_mut().filter(|m| matches && m.side == MergeSide::Merging) {
            // Merging side: our leader accepted, confirm to the main leader.
            m.apply_accept(&accept);
            m.mark_confirm_sent();
            let (main, transaction_id) = (m.main_platoon_id, m.transaction_id);
            let as_id = m.renamed(self.identity.vehicle_id());
            self.send_confirm(main, transaction_id, as_id).await;
        }
    }

    async fn handle_confirm(&mut self, sender: u32, transaction_id: u32) {
        match self.merge.as_mut() {
            Some(m) if m.transaction_id == transaction_id && m.side == MergeSide::Main => {
                trace!(transaction_id, sender, "Confirmation received");
                m.record_confirmation(sender);
            }
            _ => {
                trace!(transaction_id, sender, "Ignoring Confirm for an unknown transaction");
                return;
            }
        }
        self.try_complete().await;
    }

    /// Finishes the merge once every merging vehicle has confirmed: tells both
    /// platoons to commit, then commits.
    ///
    /// 当每辆合并车辆都确认后完成合并：通知两个车队提交，然后自身提交。
    async fn try_complete(&mut self) {
        let Some(m) = self.merge.as_mut().filter(|m| m.is_ready()) else {
            return;
        };
        m.confirmed = true;
        let transaction_id = m.transaction_id;
        let targets = [m.merging_platoon_id, Some(m.main_platoon_id)];

        info!(transaction_id, "Merge confirmed by every merging vehicle");
        for platoon_id in targets.into_iter().flatten() {
            self.send_protocol(platoon_id, Message::MergeComplete { transaction_id }).await;
        }
        self.commit();
    }

    /// Applies the active merge in one step and discards it.
    ///
    /// 一步应用当前合并并丢弃它。
    fn commit(&mut self) {
        let Some(merge) = self.merge.take() else {
            return;
        };
        let merged = self.identity.merged(&merge);
        if merge.side == MergeSide::Main {
            self.absorbed = merge.merging_platoon_id.map(|id| (id, Instant::now()));
        }
        info!(
            transaction_id = merge.transaction_id,
            vehicle_id = merged.vehicle_id(),
            platoon_id = merged.platoon_id(),
            position = merged.position(),
            leader_id = merged.leader_id(),
            "Merge committed"
        );
        self.identity = merged;
    }
}
