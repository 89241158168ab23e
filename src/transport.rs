//! Transport layer abstraction for the vehicle-to-vehicle broadcast link.
//!
//! The link is unreliable: packets may be lost, reordered or duplicated, and a
//! sender may hear its own broadcasts. `send` and `poll` never block for long;
//! they are the only points where a control loop tick yields.
//!
//! 车辆间广播链路的传输层抽象。
//!
//! 链路不可靠：包可能丢失、乱序或重复，发送者也可能收到自己的广播。
//! `send` 和 `poll` 不会长时间阻塞，它们是控制循环单次执行中仅有的让出点。

pub mod memory;
pub mod udp;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;
use tokio::time::Instant;

pub use memory::{Medium, MemoryTransport};
pub use udp::UdpTransport;

/// A datagram taken off the link, stamped with the time it was drained.
///
/// 从链路取下的数据报，带有取出时的时间戳。
#[derive(Debug, Clone)]
pub struct Receipt {
    pub data: Bytes,
    pub received_at: Instant,
}

/// Raw broadcast transport.
///
/// 原始广播传输接口。
#[async_trait]
pub trait Transport: Send + Sync + Debug + 'static {
    /// Broadcasts one encoded packet, fire-and-forget.
    ///
    /// 广播一个已编码的包，发出即不管。
    async fn send(&self, packet: Bytes) -> Result<()>;

    /// Drains everything received since the last poll, in arrival order.
    /// Returns an empty list when nothing is pending.
    ///
    /// 取出自上次轮询以来收到的所有数据，按到达顺序排列。
    /// 没有待处理数据时返回空列表。
    async fn poll(&self) -> Result<Vec<Receipt>>;

    /// The largest packet this transport can carry.
    ///
    /// 此传输可承载的最大包大小。
    fn max_packet_size(&self) -> usize;
}
