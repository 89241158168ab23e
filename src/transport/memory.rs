//! In-process broadcast medium for simulations and tests.
//!
//! Every transport attached to a `Medium` hears every packet sent on it, its own
//! included. A per-transport drop filter simulates loss on the send side.
//!
//! 用于仿真和测试的进程内广播介质。
//!
//! 连接到同一 `Medium` 的每个传输都会收到其上发送的每个包，包括自己发送的。
//! 每个传输的丢弃过滤器在发送端模拟丢包。

use super::{Receipt, Transport};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::{fmt, sync::Arc};
use tokio::{
    sync::{Mutex, broadcast},
    time::Instant,
};
use tracing::{debug, trace};

/// Return `true` to deliver the packet, `false` to drop it.
/// 返回 `true` 投递该包，返回 `false` 丢弃。
pub type DropFilter = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// A shared broadcast medium.
///
/// 共享的广播介质。
#[derive(Debug, Clone)]
pub struct Medium {
    tx: broadcast::Sender<Bytes>,
    max_packet_size: usize,
}

impl Medium {
    /// `capacity` is how many packets a slow receiver may fall behind before it
    /// starts losing the oldest ones.
    ///
    /// `capacity` 是慢速接收者在开始丢失最旧的包之前可以落后的包数量。
    pub fn new(capacity: usize, max_packet_size: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, max_packet_size }
    }

    /// Attaches a new lossless transport.
    ///
    /// 连接一个新的无损传输。
    pub fn attach(&self) -> MemoryTransport {
        MemoryTransport {
            tx: self.tx.clone(),
            rx: Mutex::new(self.tx.subscribe()),
            filter: None,
            max_packet_size: self.max_packet_size,
        }
    }

    /// Attaches a transport whose outgoing packets pass through `filter`.
    ///
    /// 连接一个发出的包需经过 `filter` 的传输。
    pub fn attach_with_filter(&self, filter: DropFilter) -> MemoryTransport {
        MemoryTransport {
            filter: Some(filter),
            ..self.attach()
        }
    }
}

/// One vehicle's view of a `Medium`.
///
/// 单辆车对 `Medium` 的视图。
pub struct MemoryTransport {
    tx: broadcast::Sender<Bytes>,
    rx: Mutex<broadcast::Receiver<Bytes>>,
    filter: Option<DropFilter>,
    max_packet_size: usize,
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("filtered", &self.filter.is_some())
            .field("max_packet_size", &self.max_packet_size)
            .finish()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, packet: Bytes) -> Result<()> {
        if let Some(filter) = &self.filter {
            if !filter(&packet) {
                trace!(bytes = packet.len(), "Packet dropped by filter");
                return Ok(());
            }
        }
        // A send with no live receivers is still a successful broadcast.
        let _ = self.tx.send(packet);
        Ok(())
    }

    async fn poll(&self) -> Result<Vec<Receipt>> {
        let mut rx = self.rx.lock().await;
        let mut receipts = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(data) => receipts.push(Receipt {
                    data,
                    received_at: Instant::now(),
                }),
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    debug!(missed, "Receiver lagged, oldest packets lost");
                }
                Err(broadcast::error::TryRecvError::Closed) => return Err(Error::ChannelClosed),
            }
        }
        Ok(receipts)
    }

    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_transport_hears_every_packet() {
        let medium = Medium::new(16, 1024);
        let a = medium.attach();
        let b = medium.attach();

        a.send(Bytes::from_static(b"one")).await.unwrap();
        b.send(Bytes::from_static(b"two")).await.unwrap();

        let heard_by_a: Vec<_> = a.poll().await.unwrap().into_iter().map(|r| r.data).collect();
        let heard_by_b: Vec<_> = b.poll().await.unwrap().into_iter().map(|r| r.data).collect();
        assert_eq!(heard_by_a, vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")]);
        assert_eq!(heard_by_a, heard_by_b);
        assert!(a.poll().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filter_drops_on_send() {
        let medium = Medium::new(16, 1024);
        let lossy = medium.attach_with_filter(Arc::new(|bytes: &[u8]| bytes != b"lost"));
        let listener = medium.attach();

        lossy.send(Bytes::from_static(b"lost")).await.unwrap();
        lossy.send(Bytes::from_static(b"kept")).await.unwrap();

        let heard = listener.poll().await.unwrap();
        assert_eq!(heard.len(), 1);
        assert_eq!(&heard[0].data[..], b"kept");
    }
}
