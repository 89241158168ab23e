//! 定义了可以在网络上传输的完整数据包。
//! Defines the complete packets that can be transmitted over the network.

use super::command::MessageType;
use super::header::{HEADER_SIZE, Header, MAX_ENCODABLE_LENGTH, pack_type_and_length};
use super::merge::{MergeAccept, MergeRequest};
use super::state::{VEHICLE_STATE_SIZE, VehicleState};
use crate::error::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::time::Instant;

/// The type-specific body of a packet.
/// 包的类型相关主体。
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A periodic state broadcast.
    /// 周期性状态广播。
    VehicleState(VehicleState),
    /// Emergency braking notice.
    /// 紧急制动通知。
    Emergency,
    MergeRequest(MergeRequest),
    MergeAccept(MergeAccept),
    MergeConfirm { transaction_id: u32 },
    MergeComplete { transaction_id: u32 },
}

impl Message {
    /// The wire tag of this message.
    ///
    /// 此消息的线路标记。
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::VehicleState(_) => MessageType::VehicleState,
            Message::Emergency => MessageType::Emergency,
            Message::MergeRequest(_) => MessageType::MergeRequest,
            Message::MergeAccept(_) => MessageType::MergeAccept,
            Message::MergeConfirm { .. } => MessageType::MergeConfirm,
            Message::MergeComplete { .. } => MessageType::MergeComplete,
        }
    }

    /// The merge transaction this message belongs to, if any.
    /// 此消息所属的合并事务（如果有）。
    pub fn transaction_id(&self) -> Option<u32> {
        match self {
            Message::MergeRequest(m) => Some(m.transaction_id),
            Message::MergeAccept(m) => Some(m.transaction_id),
            Message::MergeConfirm { transaction_id } => Some(*transaction_id),
            Message::MergeComplete { transaction_id } => Some(*transaction_id),
            Message::VehicleState(_) | Message::Emergency => None,
        }
    }

    fn payload_size(&self) -> usize {
        match self {
            Message::VehicleState(_) => VEHICLE_STATE_SIZE,
            Message::Emergency => 0,
            Message::MergeRequest(m) => m.encoded_size(),
            Message::MergeAccept(m) => m.encoded_size(),
            Message::MergeConfirm { .. } | Message::MergeComplete { .. } => 4,
        }
    }

    fn encode_payload<B: BufMut>(&self, buf: &mut B) {
        match self {
            Message::VehicleState(state) => state.encode(buf),
            Message::Emergency => {}
            Message::MergeRequest(m) => m.encode(buf),
            Message::MergeAccept(m) => m.encode(buf),
            Message::MergeConfirm { transaction_id } | Message::MergeComplete { transaction_id } => {
                buf.put_u32(*transaction_id)
            }
        }
    }
}

/// A decoded packet, or one ready to be encoded.
///
/// For state broadcasts and emergencies `platoon_id` is the sender's platoon.
/// For merge messages it is the platoon the message is addressed to.
///
/// 一个已解码或待编码的包。
///
/// 对于状态广播和紧急通知，`platoon_id` 是发送者所在车队；
/// 对于合并消息，它是消息的目标车队。
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub platoon_id: u32,
    pub vehicle_id: u32,
    pub message: Message,
}

impl Packet {
    pub fn new(platoon_id: u32, vehicle_id: u32, message: Message) -> Self {
        Self {
            platoon_id,
            vehicle_id,
            message,
        }
    }

    /// Encodes the packet into a fresh buffer no larger than `max_packet_size`.
    ///
    /// The first header word is written as a placeholder and rewritten once the
    /// payload has been appended, so type and length always describe the bytes
    /// actually returned.
    ///
    /// 将包编码到新缓冲区，大小不超过 `max_packet_size`。
    ///
    /// 第一个包头字先写入占位值，在追加载荷之后重写，
    /// 因此类型和长度始终描述实际返回的字节。
    pub fn encode(&self, max_packet_size: usize) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.message.payload_size());
        buf.put_u32(0); // type and length are unknown until the payload is written
        buf.put_u32(self.platoon_id);
        buf.put_u32(self.vehicle_id);
        self.message.encode_payload(&mut buf);

        let length = buf.len();
        let max = max_packet_size.min(MAX_ENCODABLE_LENGTH);
        if length > max {
            return Err(Error::PacketTooLarge { length, max });
        }
        let packed = pack_type_and_length(self.message.message_type(), length);
        buf[..4].copy_from_slice(&packed.to_be_bytes());
        Ok(buf.freeze())
    }

    /// Decodes a packet from a received datagram.
    ///
    /// Bytes past the length declared in the header are ignored, so padded
    /// datagrams decode the same as exact ones.
    ///
    /// 从接收到的数据报解码一个包。
    ///
    /// 超出包头声明长度的字节会被忽略，因此带填充的数据报与精确数据报解码结果相同。
    pub fn decode(data: &[u8], received_at: Instant, max_packet_size: usize) -> Result<Self> {
        let mut cursor = data;
        let header = Header::decode(&mut cursor)?;

        if header.length > max_packet_size {
            return Err(Error::PacketTooLarge {
                length: header.length,
                max: max_packet_size,
            });
        }
        if header.length < HEADER_SIZE {
            return Err(Error::InvalidPacket);
        }
        if header.length > data.len() {
            return Err(Error::LengthMismatch {
                declared: header.length,
                actual: data.len(),
            });
        }

        let mut payload = &data[HEADER_SIZE..header.length];
        let message = match header.message_type {
            MessageType::VehicleState => {
                Message::VehicleState(VehicleState::decode(&mut payload, received_at).ok_or(Error::InvalidPacket)?)
            }
            MessageType::Emergency => Message::Emergency,
            MessageType::MergeRequest => {
                Message::MergeRequest(MergeRequest::decode(&mut payload).ok_or(Error::InvalidPacket)?)
            }
            MessageType::MergeAccept => {
                Message::MergeAccept(MergeAccept::decode(&mut payload).ok_or(Error::InvalidPacket)?)
            }
            MessageType::MergeConfirm => Message::MergeConfirm {
                transaction_id: decode_transaction_id(&mut payload)?,
            },
            MessageType::MergeComplete => Message::MergeComplete {
                transaction_id: decode_transaction_id(&mut payload)?,
            },
        };

        if !payload.is_empty() {
            return Err(Error::InvalidPacket);
        }

        Ok(Packet {
            platoon_id: header.platoon_id,
            vehicle_id: header.vehicle_id,
            message,
        })
    }
}

fn decode_transaction_id(payload: &mut &[u8]) -> Result<u32> {
    if payload.remaining() < 4 {
        return Err(Error::InvalidPacket);
    }
    Ok(payload.get_u32())
}
