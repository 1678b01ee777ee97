/// 数据块编号，也即分配表条目的索引。
///
/// 分配表条目的值与数据块编号共用同一值域：
/// 条目值为下一个数据块的编号，或者[`DataBlockId::FREE`]、[`DataBlockId::EOF`]标记。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct DataBlockId(u32);

#[derive(Debug, PartialEq, Eq)]
pub enum ChainError {
    Free,
    Eof,
    OutOfRange,
}

impl From<u32> for DataBlockId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<DataBlockId> for u32 {
    fn from(id: DataBlockId) -> Self {
        id.0
    }
}

impl From<DataBlockId> for usize {
    fn from(id: DataBlockId) -> Self {
        id.0 as usize
    }
}

impl DataBlockId {
    /// 条目值0：未分配
    pub const FREE: Self = Self(0);

    /// 条目值0xFFFFFFFF：已分配，且为链尾
    pub const EOF: Self = Self(u32::MAX);

    /// 最小的可用数据块编号。
    ///
    /// NOTE: 条目值0身兼"未分配"之意，故0号数据块永远不能作为链的后继出现，
    ///       干脆整个保留，和FAT保留开头簇号是一个做法。
    pub const MIN: Self = Self(1);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn validate(self) -> Result<Self, ChainError> {
        match self {
            DataBlockId::FREE => Err(ChainError::Free),
            DataBlockId::EOF => Err(ChainError::Eof),
            id if id < Self::MIN => Err(ChainError::OutOfRange),
            id => Ok(id),
        }
    }
}
