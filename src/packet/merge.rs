//! 定义合并协议消息的载荷及其列表编码。
//! Defines the merge protocol payloads and their list encodings.

use bytes::{Buf, BufMut};
use std::collections::BTreeMap;

/// Proposal from a main platoon leader to a foreign platoon.
/// 主车队领队向外部车队发出的合并提议。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub transaction_id: u32,
    /// The platoon that will stay at the head.
    /// 将保持在前方的车队。
    pub main_platoon_id: u32,
    /// Vehicle ids of the main platoon, leader first.
    /// 主车队的车辆ID，领队在前。
    pub platoon: Vec<u32>,
}

/// The foreign leader's answer.
/// 外部车队领队的答复。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeAccept {
    pub transaction_id: u32,
    pub accepted: bool,
    /// Vehicle ids of the merging platoon, leader first, before renaming.
    /// 合并车队的车辆ID（重命名之前），领队在前。
    pub platoon: Vec<u32>,
    /// Merging-platoon ids that clash with the main platoon, mapped to their replacements.
    /// 与主车队冲突的合并车队ID及其替换ID。
    pub renames: BTreeMap<u32, u32>,
}

impl MergeRequest {
    pub(crate) fn encoded_size(&self) -> usize {
        8 + id_list_size(&self.platoon)
    }

    pub(crate) fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.transaction_id);
        buf.put_u32(self.main_platoon_id);
        encode_id_list(&self.platoon, buf);
    }

    pub(crate) fn decode<B: Buf>(buf: &mut B) -> Option<Self> {
        if buf.remaining() < 8 {
            return None;
        }
        let transaction_id = buf.get_u32();
        let main_platoon_id = buf.get_u32();
        let platoon = decode_id_list(buf)?;
        Some(Self {
            transaction_id,
            main_platoon_id,
            platoon,
        })
    }
}

impl MergeAccept {
    pub(crate) fn encoded_size(&self) -> usize {
        5 + id_list_size(&self.platoon) + 4 + self.renames.len() * 8
    }

    pub(crate) fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.transaction_id);
        buf.put_u8(self.accepted as u8);
        encode_id_list(&self.platoon, buf);
        buf.put_u32(self.renames.len() as u32);
        for (from, to) in &self.renames {
            buf.put_u32(*from);
            buf.put_u32(*to);
        }
    }

    pub(crate) fn decode<B: Buf>(buf: &mut B) -> Option<Self> {
        if buf.remaining() < 5 {
            return None;
        }
        let transaction_id = buf.get_u32();
        let accepted = match buf.get_u8() {
            0 => false,
            1 => true,
            _ => return None,
        };
        let platoon = decode_id_list(buf)?;
        if buf.remaining() < 4 {
            return None;
        }
        let count = buf.get_u32() as usize;
        if buf.remaining() < count.checked_mul(8)? {
            return None;
        }
        let mut renames = BTreeMap::new();
        for _ in 0..count {
            let from = buf.get_u32();
            let to = buf.get_u32();
            renames.insert(from, to);
        }
        Some(Self {
            transaction_id,
            accepted,
            platoon,
            renames,
        })
    }
}

fn id_list_size(ids: &[u32]) -> usize {
    4 + ids.len() * 4
}

/// Encodes a count-prefixed list of ids.
/// 编码带计数前缀的ID列表。
fn encode_id_list<B: BufMut>(ids: &[u32], buf: &mut B) {
    buf.put_u32(ids.len() as u32);
    for id in ids {
        buf.put_u32(*id);
    }
}

/// Decodes a count-prefixed list of ids, refusing counts the buffer cannot hold.
/// 解码带计数前缀的ID列表，拒绝缓冲区无法容纳的计数。
fn decode_id_list<B: Buf>(buf: &mut B) -> Option<Vec<u32>> {
    if buf.remaining() < 4 {
        return None;
    }
    let count = buf.get_u32() as usize;
    if buf.remaining() < count.checked_mul(4)? {
        return None;
    }
    Some((0..count).map(|_| buf.get_u32()).collect())
}
