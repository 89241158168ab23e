//! 定义了车队协议和控制循环的可配置参数。
//! Defines configurable parameters for the platoon protocol and the control loop.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// The port used by the UDP broadcast transport unless configured otherwise.
/// UDP广播传输默认使用的端口。
pub const DEFAULT_PORT: u16 = 5005;

/// A structure containing all configurable parameters for a vehicle.
///
/// 包含车辆所有可配置参数的结构体。
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Control loop timing.
    /// 控制循环时序。
    pub timing: TimingConfig,

    /// Merge protocol parameters.
    /// 合并协议参数。
    pub merge: MergeConfig,

    /// Transport parameters.
    /// 传输参数。
    pub transport: TransportConfig,

    /// Control loop behaviour switches.
    /// 控制循环行为开关。
    pub control: ControlConfig,
}

/// Control loop timing.
///
/// 控制循环时序。
#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// The fixed period of one control loop tick. Also the minimum age difference
    /// for a broadcast to replace an older one from the same position.
    /// 单次控制循环的固定周期，同时也是同一位置新广播替换旧广播所需的最小时间差。
    pub control_period: Duration,
    /// Predecessor data older than this is discarded.
    /// 超过此时长的前车数据将被丢弃。
    pub max_message_age: Duration,
}

/// Merge protocol parameters.
///
/// 合并协议参数。
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// An in-flight merge transaction older than this is no longer valid and
    /// may be replaced.
    /// 超过此时长的进行中合并事务不再有效，可被替换。
    pub transaction_timeout: Duration,
}

/// Transport parameters.
///
/// 传输参数。
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// The largest packet the transport can carry, header included.
    /// 传输层可承载的最大包大小（包含包头）。
    pub max_packet_size: usize,
    /// Local address the UDP transport binds to.
    /// UDP传输绑定的本地地址。
    pub bind_addr: SocketAddr,
    /// Address every packet is broadcast to.
    /// 所有包广播到的地址。
    pub broadcast_addr: SocketAddr,
}

/// Control loop behaviour switches.
///
/// 控制循环行为开关。
#[derive(Debug, Clone, Default)]
pub struct ControlConfig {
    /// Enter emergency when another member of our platoon reports one.
    /// 当同一车队的其他成员报告紧急情况时进入紧急状态。
    pub halt_on_peer_emergency: bool,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            control_period: Duration::from_millis(50),
            max_message_age: Duration::from_millis(200), // 4 periods
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            transaction_timeout: Duration::from_secs(1),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_packet_size: 1024,
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            broadcast_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), DEFAULT_PORT),
        }
    }
}
