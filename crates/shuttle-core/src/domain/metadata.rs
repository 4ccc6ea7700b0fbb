//! Entry metadata

use serde::{Deserialize, Serialize};

use super::time::Timespec;

/// EntryType は entry の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Uninitialized,
    Blob,
    Integer,
    HSet,
    Tag,
    Deque,
    Stream,
    TimeSeries,
}

impl EntryType {
    pub const ALL: [EntryType; 8] = [
        EntryType::Uninitialized,
        EntryType::Blob,
        EntryType::Integer,
        EntryType::HSet,
        EntryType::Tag,
        EntryType::Deque,
        EntryType::Stream,
        EntryType::TimeSeries,
    ];

    pub fn as_number(self) -> i64 {
        match self {
            EntryType::Uninitialized => -1,
            EntryType::Blob => 0,
            EntryType::Integer => 1,
            EntryType::HSet => 2,
            EntryType::Tag => 3,
            EntryType::Deque => 4,
            EntryType::Stream => 5,
            EntryType::TimeSeries => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EntryType::Uninitialized => "ENTRY_UNINITIALIZED",
            EntryType::Blob => "ENTRY_BLOB",
            EntryType::Integer => "ENTRY_INTEGER",
            EntryType::HSet => "ENTRY_HSET",
            EntryType::Tag => "ENTRY_TAG",
            EntryType::Deque => "ENTRY_DEQUE",
            EntryType::Stream => "ENTRY_STREAM",
            EntryType::TimeSeries => "ENTRY_TS",
        }
    }
}

/// Opaque 256-bit entry reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EntryReference(pub [u64; 4]);

/// EntryMetadata は getMetadata の結果
///
/// `expiry_time` が `None` なら期限なし。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub reference: EntryReference,
    pub entry_type: EntryType,
    pub size: u64,
    pub modification_time: Timespec,
    pub expiry_time: Option<Timespec>,
}
