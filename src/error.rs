//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use thiserror::Error;

/// The primary error type for the platoon protocol library.
/// 车队协议库的主要错误类型。
#[derive(Debug, Error)]
pub enum Error {
    /// An underlying I/O error occurred.
    /// 发生了底层的I/O错误。
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A received packet was malformed or truncated and could not be decoded.
    /// 接收到的包格式错误或被截断，无法解码。
    #[error("Invalid packet received")]
    InvalidPacket,

    /// The type tag in the packet header is not a known message type.
    /// 包头中的类型标记不是已知的消息类型。
    #[error("unknown message type tag {0:#04x}")]
    UnknownMessageType(u8),

    /// A packet is larger than the transport can carry.
    /// 包大小超过了传输层的承载能力。
    #[error("packet of {length} bytes exceeds the maximum of {max} bytes")]
    PacketTooLarge { length: usize, max: usize },

    /// The length written in the header disagrees with the bytes received.
    /// 包头中的长度与实际接收的字节数不一致。
    #[error("header declares {declared} bytes but {actual} were received")]
    LengthMismatch { declared: usize, actual: usize },

    /// A vehicle id was expected in a platoon ordering but is not there.
    /// 预期在车队排序中的车辆ID不存在。
    #[error("vehicle {0} is not part of the platoon")]
    UnknownVehicle(u32),

    /// An algorithm kind or parameter name that does not exist.
    /// 不存在的算法类型或参数名称。
    #[error("unknown name `{0}`")]
    UnknownName(String),

    /// The broadcast medium was closed.
    /// 广播介质已关闭。
    #[error("Internal channel is broken")]
    ChannelClosed,
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::Io(e) => e,
            Error::InvalidPacket => ErrorKind::InvalidData.into(),
            Error::UnknownMessageType(_) => ErrorKind::InvalidData.into(),
            Error::LengthMismatch { .. } => ErrorKind::InvalidData.into(),
            Error::PacketTooLarge { .. } => ErrorKind::InvalidInput.into(),
            Error::UnknownVehicle(_) => ErrorKind::NotFound.into(),
            Error::UnknownName(_) => ErrorKind::InvalidInput.into(),
            Error::ChannelClosed => ErrorKind::BrokenPipe.into(),
        }
    }
}
