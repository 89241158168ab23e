//! Platoon identity, position ordering and the merge protocol.
//!
//! 车队身份、位置排序与合并协议。

pub mod communications;
pub mod coordinator;
pub mod identity;
pub mod ids;
pub mod lookup;
pub mod merge;

pub use communications::Communications;
pub use coordinator::Coordinator;
pub use identity::Identity;
pub use ids::{IdGenerator, RandomIds, SequentialIds};
pub use lookup::PositionTable;
pub use merge::{MergeSide, MergeTransaction};
