//! 定义协议的所有消息类型。
//! Defines all message types for the protocol.

use std::fmt;

/// The type of a packet. The high byte of the first header word on the wire.
/// 包类型，位于线路上第一个包头字的最高字节。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Periodic broadcast of a vehicle's measured and chosen motion.
    /// 车辆实测与目标运动状态的周期广播。
    VehicleState = 0x01,
    /// Emergency braking notice, no payload.
    /// 紧急制动通知，无载荷。
    Emergency = 0x02,
    /// (Merge) Main platoon leader proposes a merge to a foreign platoon.
    /// (合并) 主车队领队向外部车队提议合并。
    MergeRequest = 0x10,
    /// (Merge) Foreign leader accepts and resolves id clashes.
    /// (合并) 外部车队领队接受并解决ID冲突。
    MergeAccept = 0x11,
    /// (Merge) A merging vehicle signals readiness.
    /// (合并) 合并车辆表示已就绪。
    MergeConfirm = 0x12,
    /// (Merge) The deciding leader tells everyone to commit.
    /// (合并) 决策领队通知所有车辆提交。
    MergeComplete = 0x13,
}

impl MessageType {
    /// 从一个字节尝试转换成 `MessageType`。
    /// Tries to convert a byte into a `MessageType`.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(MessageType::VehicleState),
            0x02 => Some(MessageType::Emergency),
            0x10 => Some(MessageType::MergeRequest),
            0x11 => Some(MessageType::MergeAccept),
            0x12 => Some(MessageType::MergeConfirm),
            0x13 => Some(MessageType::MergeComplete),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageType::VehicleState => "VEHICLE-STATE",
            MessageType::Emergency => "EMERGENCY",
            MessageType::MergeRequest => "MERGE-REQUEST",
            MessageType::MergeAccept => "MERGE-ACCEPT",
            MessageType::MergeConfirm => "MERGE-CONFIRM",
            MessageType::MergeComplete => "MERGE-COMPLETE",
        };
        write!(f, "{}", s)
    }
}
