//! 分配表区
//!
//! 每个数据块对应一个4字节条目，条目存放同一条链上下一个数据块的编号，
//! 或者"未分配"/"链尾"标记。文件的数据块链就穿在这张表里。

use core::mem;
use core::ops::Range;

use crate::block::BlockCacheManager;
use crate::volume::header::Header;
use crate::{BlockId, ChainError, DataBlockId};

pub struct FatArea {
    range: Range<BlockId>,
    /// 有效条目总数，即数据区的块数。
    /// 分配表按整个设备的块数预留空间，超出数据区的条目永不使用。
    entries: usize,
}

impl FatArea {
    pub(crate) fn new(header: &Header) -> Self {
        Self {
            range: header.fat_area(),
            entries: header.data_blocks(),
        }
    }

    /// 获取下一个数据块的编号。
    /// 若`id`的条目未分配，则报错。
    /// `Ok(None)`表示`id`为链上最后一个块。
    pub(crate) fn next(
        &self,
        cache: &BlockCacheManager,
        id: DataBlockId,
    ) -> Result<Option<DataBlockId>, ChainError> {
        let id = id.validate()?;

        let (bid, offset) = self.pos(cache, id);
        match cache
            .get(bid)
            .lock()
            .map(offset, |entry: &DataBlockId| entry.validate())
        {
            Ok(next) => Ok(Some(next)),
            Err(ChainError::Eof) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 寻找未分配的数据块：按编号顺序线性扫描，返回第一个空闲条目。
    /// 返回[`None`]表示数据区已满。
    pub(crate) fn alloc(&self, cache: &BlockCacheManager) -> Option<DataBlockId> {
        let block_entries = Self::block_entries(cache);

        for (i, bid) in self.blocks() {
            let found = cache
                .get(bid)
                .lock()
                .map_slice(|entries: &[DataBlockId]| {
                    entries.iter().enumerate().find_map(|(j, &entry)| {
                        let idx = i * block_entries + j;
                        (entry == DataBlockId::FREE
                            && idx >= usize::from(DataBlockId::MIN)
                            && idx < self.entries)
                            .then_some(idx)
                    })
                });

            if let Some(idx) = found {
                return Some(DataBlockId::new(idx as u32));
            }
        }

        None
    }

    /// 占据`target`条目，写入链尾标记。
    /// 条目必须处于未分配状态，否则说明分配表已经损坏。
    pub(crate) fn claim(&self, cache: &BlockCacheManager, target: DataBlockId) {
        let (bid, offset) = self.pos(cache, target);
        cache.get(bid).lock().map_mut(offset, |entry: &mut DataBlockId| {
            assert_eq!(
                DataBlockId::FREE,
                *entry,
                "allocating an entry that is not free"
            );
            *entry = DataBlockId::EOF;
        });
    }

    /// 把`child`接到`parent`之后，链长加一。
    /// `parent`必须是当前链尾，否则说明先前的分配出了错。
    pub(crate) fn couple(&self, cache: &BlockCacheManager, parent: DataBlockId, child: DataBlockId) {
        let (bid, offset) = self.pos(cache, parent);
        cache.get(bid).lock().map_mut(offset, |entry: &mut DataBlockId| {
            assert_eq!(
                DataBlockId::EOF,
                *entry,
                "coupling onto a block that is not the chain tail"
            );
            *entry = child;
        });
    }

    /// 释放从`first`开始的整条链，逐个条目清零，遇链尾即止。
    pub(crate) fn release(&self, cache: &BlockCacheManager, first: DataBlockId) {
        let mut id = first.validate().expect("release starts from a valid block");

        loop {
            let (bid, offset) = self.pos(cache, id);
            let next = cache.get(bid).lock().map_mut(offset, |entry: &mut DataBlockId| {
                let next = *entry;
                *entry = DataBlockId::FREE;
                next
            });

            match next.validate() {
                Ok(nid) => id = nid,
                Err(ChainError::Eof) => break,
                Err(e) => {
                    log::error!("chain of {:?} runs into {e:?}", u32::from(first));
                    panic!("chain runs through an invalid entry");
                }
            }
        }
    }

    /// 走到链尾
    pub(crate) fn last(&self, cache: &BlockCacheManager, first: DataBlockId) -> DataBlockId {
        let mut id = first;
        while let Some(next) = self.next(cache, id).expect("walking a valid chain") {
            id = next;
        }
        id
    }
}

impl FatArea {
    /// 一个块能容纳多少条条目
    fn block_entries(cache: &BlockCacheManager) -> usize {
        cache.block_size() / mem::size_of::<DataBlockId>()
    }

    /// 返回条目实际所处的磁盘位置（块号 + 块内字节偏移）
    fn pos(&self, cache: &BlockCacheManager, id: DataBlockId) -> (BlockId, usize) {
        let idx = usize::from(id);
        assert!(idx < self.entries, "data block id beyond the data area");

        let block_entries = Self::block_entries(cache);
        (
            self.range.start + idx / block_entries,
            (idx % block_entries) * mem::size_of::<DataBlockId>(),
        )
    }

    fn blocks(&self) -> impl Iterator<Item = (usize, BlockId)> + '_ {
        let start = usize::from(self.range.start);
        let end = usize::from(self.range.end);
        (start..end).enumerate().map(|(i, raw)| (i, BlockId::new(raw)))
    }
}
