//! UDP broadcast transport.
//!
//! 基于UDP广播的传输实现。

use super::{Receipt, Transport};
use crate::{config::TransportConfig, error::Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    net::SocketAddr,
};
use tokio::{net::UdpSocket, time::Instant};
use tracing::{debug, trace, warn};

/// Broadcasts every packet to a fixed address and drains the socket without
/// waiting on `poll`.
///
/// 将每个包广播到固定地址，并在 `poll` 时不等待地取出套接字中的数据。
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    broadcast_addr: SocketAddr,
    max_packet_size: usize,
}

impl UdpTransport {
    /// Binds a broadcast-enabled socket according to `config`.
    ///
    /// 按照 `config` 绑定一个启用广播的套接字。
    pub async fn bind(config: &TransportConfig) -> Result<Self> {
        let socket = UdpSocket::bind(config.bind_addr).await?;
        socket.set_broadcast(true)?;
        debug!(
            local = %socket.local_addr()?,
            broadcast = %config.broadcast_addr,
            "UDP broadcast transport bound"
        );
        Ok(Self {
            socket,
            broadcast_addr: config.broadcast_addr,
            max_packet_size: config.max_packet_size,
        })
    }

    /// Returns the local address this transport is bound to.
    ///
    /// 返回此传输绑定的本地地址。
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(Into::into)
    }
}

/// Receives until `recv` would block. A failed receive ends the drain but keeps
/// the datagrams already taken.
///
/// 持续接收直到 `recv` 将阻塞。接收失败会结束本次取出，但保留已取出的数据报。
fn drain<F>(buf: &mut [u8], mut recv: F) -> Vec<Receipt>
where
    F: FnMut(&mut [u8]) -> io::Result<(usize, SocketAddr)>,
{
    let mut receipts = Vec::new();
    loop {
        match recv(buf) {
            Ok((len, src)) => {
                trace!(bytes = len, %src, "Drained datagram");
                receipts.push(Receipt {
                    data: Bytes::copy_from_slice(&buf[..len]),
                    received_at: Instant::now(),
                });
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) => {
                warn!(error = %e, kept = receipts.len(), "UDP receive failed");
                break;
            }
        }
    }
    receipts
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, packet: Bytes) -> Result<()> {
        trace!(bytes = packet.len(), addr = %self.broadcast_addr, "Broadcasting datagram");
        self.socket.send_to(&packet, self.broadcast_addr).await?;
        Ok(())
    }

    async fn poll(&self) -> Result<Vec<Receipt>> {
        let mut buf = vec![0u8; self.max_packet_size];
        Ok(drain(&mut buf, |buf| self.socket.try_recv_from(buf)))
    }

    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}
