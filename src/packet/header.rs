//! 定义固定的12字节包头。
//! Defines the fixed 12-byte packet header.
//!
//! ```text
//! 0        8                               32
//! +--------+-------------------------------+
//! |  type  |     total length (24 bits)    |
//! +--------+-------------------------------+
//! |              platoon id                |
//! +----------------------------------------+
//! |              vehicle id                |
//! +----------------------------------------+
//! ```

use super::command::MessageType;
use crate::error::{Error, Result};
use bytes::{Buf, BufMut};

pub const HEADER_SIZE: usize = 12;

/// The largest length representable in the 24-bit length field.
/// 24位长度字段可表示的最大长度。
pub const MAX_ENCODABLE_LENGTH: usize = 0x00FF_FFFF;

const LENGTH_MASK: u32 = 0x00FF_FFFF;

/// Packs a message type and a total length into the first header word.
/// 将消息类型和总长度打包到第一个包头字中。
pub fn pack_type_and_length(message_type: MessageType, length: usize) -> u32 {
    debug_assert!(length <= MAX_ENCODABLE_LENGTH);
    ((message_type as u32) << 24) | (length as u32 & LENGTH_MASK)
}

/// The packet header.
/// 包头。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// The type of the payload that follows.
    /// 随后载荷的类型。
    pub message_type: MessageType,
    /// Total length of the packet, header included.
    /// 包的总长度，包含包头。
    pub length: usize,
    /// For state broadcasts the sender's platoon, for merge messages the addressed platoon.
    /// 对于状态广播是发送者的车队，对于合并消息是目标车队。
    pub platoon_id: u32,
    /// The sending vehicle.
    /// 发送车辆。
    pub vehicle_id: u32,
}

impl Header {
    /// 将包头编码到缓冲区。
    /// Encodes the header into a buffer.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(pack_type_and_length(self.message_type, self.length));
        buf.put_u32(self.platoon_id);
        buf.put_u32(self.vehicle_id);
    }

    /// 从缓冲区解码包头。
    /// Decodes a header from a buffer.
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < HEADER_SIZE {
            return Err(Error::InvalidPacket);
        }
        let packed = buf.get_u32();
        let tag = (packed >> 24) as u8;
        let message_type = MessageType::from_u8(tag).ok_or(Error::UnknownMessageType(tag))?;
        Ok(Header {
            message_type,
            length: (packed & LENGTH_MASK) as usize,
            platoon_id: buf.get_u32(),
            vehicle_id: buf.get_u32(),
        })
    }
}
