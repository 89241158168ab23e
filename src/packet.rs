//! The packet module: the fixed-header binary wire format shared by every vehicle.
//! packet 模块：所有车辆共享的固定包头二进制线路格式。

pub mod command;
pub mod frame;
pub mod header;
pub mod merge;
pub mod state;

pub use command::MessageType;
pub use frame::{Message, Packet};
pub use header::{HEADER_SIZE, Header};
pub use merge::{MergeAccept, MergeRequest};
pub use state::{Motion, VehicleState};
