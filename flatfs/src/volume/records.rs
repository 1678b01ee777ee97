//! 记录区
//!
//! 平坦的32字节槽位数组。一个文件占据1到15个**连续**槽位，称为一个簇，
//! 长名字按每槽23字节切成片段分摊到各槽。簇首槽位持有首数据块指针与文件大小。
//!
//! 全部位运算（状态字节的标志位与簇长半字节）都集中在本模块的编解码函数里，
//! 线上布局与字节精确对应。

use alloc::vec::Vec;
use core::mem;
use core::ops::Range;

use derive_more::{Add, From, Into};
use enumflags2::{BitFlags, bitflags};

use crate::block::BlockCacheManager;
use crate::volume::header::Header;
use crate::{BlockId, DataBlockId};

/// 一个槽位可容纳的名字字节数
pub const NAME_CAP: usize = 23;

/// 一个簇最多的槽位数（簇长存于状态字节的高半字节）
pub const MAX_CLUSTER_SLOTS: usize = 15;

/// 记录编号：槽位在整个记录区内的绝对索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Add, From, Into)]
#[repr(transparent)]
pub struct RecordId(usize);

impl core::ops::Add<usize> for RecordId {
    type Output = Self;

    fn add(self, rhs: usize) -> Self::Output {
        self + Self(rhs)
    }
}

impl RecordId {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[bitflags]
#[repr(u8)]
pub enum RecordFlag {
    /// 槽位在用
    Present = 0b0000_0001,
    /// 簇首槽位
    Head = 0b0000_0010,
    /// 文件已被打开（劝告性单开锁）
    Open = 0b0000_0100,
}

/// 32字节的记录槽位。
///
/// | 字节 | 含义 |
/// |---|---|
/// | 0 | 状态：低半字节为标志位，高半字节为簇长 |
/// | 1..=4 | 首数据块编号（仅簇首有意义） |
/// | 5..=8 | 文件大小（仅簇首有意义） |
/// | 9..=31 | 名字片段 |
#[derive(Debug, Default, Clone, Copy)]
#[repr(packed)]
pub struct RecordSlot {
    status: u8,
    first_block: u32,
    size: u32,
    name: [u8; NAME_CAP],
}

impl RecordSlot {
    fn new(flags: BitFlags<RecordFlag>, cluster_len: usize, fragment: &[u8]) -> Self {
        debug_assert!(cluster_len <= MAX_CLUSTER_SLOTS);
        debug_assert!(fragment.len() <= NAME_CAP);

        let mut name = [0; NAME_CAP];
        name[..fragment.len()].copy_from_slice(fragment);

        Self {
            status: flags.bits() | (cluster_len as u8) << 4,
            first_block: 0,
            size: 0,
            name,
        }
    }

    pub fn flags(&self) -> BitFlags<RecordFlag> {
        BitFlags::from_bits_truncate(self.status & 0x0F)
    }

    /// 此槽位所属簇的槽位数
    pub const fn cluster_len(&self) -> usize {
        (self.status >> 4) as usize
    }

    /// 状态字节全零表示空闲槽位
    pub const fn is_free(&self) -> bool {
        self.status == 0
    }

    pub fn is_head(&self) -> bool {
        self.flags().contains(RecordFlag::Head)
    }

    pub(crate) fn is_open(&self) -> bool {
        self.flags().contains(RecordFlag::Open)
    }

    pub(crate) fn set_open(&mut self, open: bool) {
        if open {
            self.status |= RecordFlag::Open as u8;
        } else {
            self.status &= !(RecordFlag::Open as u8);
        }
    }

    pub fn first_block(&self) -> DataBlockId {
        DataBlockId::new(self.first_block)
    }

    pub fn set_first_block(&mut self, id: DataBlockId) {
        self.first_block = id.into();
    }

    pub const fn size(&self) -> usize {
        self.size as usize
    }

    pub fn resize(&mut self, size: usize) {
        self.size = size as u32;
    }

    /// 名字片段（零填充到23字节）
    pub const fn fragment(&self) -> [u8; NAME_CAP] {
        self.name
    }
}

/// 名字需要的槽位数。空名字也占一个槽。
pub fn name_slots(name: &str) -> usize {
    name.len().div_ceil(NAME_CAP).max(1)
}

/// 把名字切成一个簇的槽位序列（正序）。
/// 簇首带 Present|Head|Open 与首块指针，大小为0；后续槽位只带 Present。
/// 簇长写进簇内**每一个**槽位，查找时据此校验。
pub fn name2slots(name: &str, first_block: DataBlockId) -> Vec<RecordSlot> {
    let cluster_len = name_slots(name);
    debug_assert!(cluster_len <= MAX_CLUSTER_SLOTS);

    let mut fragments = name.as_bytes().chunks(NAME_CAP);

    let mut slots = Vec::with_capacity(cluster_len);
    let mut head = RecordSlot::new(
        RecordFlag::Present | RecordFlag::Head | RecordFlag::Open,
        cluster_len,
        fragments.next().unwrap_or(&[]),
    );
    head.set_first_block(first_block);
    slots.push(head);

    slots.extend(
        fragments.map(|frag| RecordSlot::new(RecordFlag::Present.into(), cluster_len, frag)),
    );

    debug_assert_eq!(cluster_len, slots.len());
    slots
}

/// 把一个簇各槽位的名字片段拼回完整名字（去掉尾部零填充）。
pub fn slots2name(slots: &[RecordSlot]) -> Vec<u8> {
    slots
        .iter()
        .flat_map(|slot| slot.fragment())
        .take_while(|&b| b != 0)
        .collect()
}

pub struct RecordArea {
    range: Range<BlockId>,
    /// 记录区的槽位总数
    slots: usize,
}

impl RecordArea {
    pub(crate) fn new(header: &Header, block_size: usize) -> Self {
        let range = header.record_area();
        let blocks = usize::from(range.end) - usize::from(range.start);
        Self {
            range,
            slots: blocks * (block_size / mem::size_of::<RecordSlot>()),
        }
    }

    /// 按名字查找簇首。
    ///
    /// 扫过**整个**记录区：删除留下的空洞被跳过，
    /// 空洞之后的记录依然可达（不依赖"首个全零槽位即区尾"的旧终止条件）。
    /// 只有簇长与所需槽位数相等的簇首才会被拼名比对，
    /// 所以前23字节相同的长短名不会互相撞上。
    pub(crate) fn find(&self, cache: &BlockCacheManager, name: &str) -> Option<RecordId> {
        let needed = name_slots(name);

        for idx in 0..self.slots {
            let id = RecordId::new(idx);
            let slot = self.slot(cache, id);

            if slot.is_free() || !slot.is_head() || slot.cluster_len() != needed {
                continue;
            }

            let cluster = self.cluster(cache, id, needed);
            if slots2name(&cluster) == name.as_bytes() {
                log::debug!("record {idx} matches {name:?}");
                return Some(id);
            }
        }

        None
    }

    /// 寻找`needed`个连续空闲槽位，返回这段连续区的起始记录编号。
    /// 连续区允许跨记录块。返回[`None`]表示记录区容不下了。
    pub(crate) fn find_free_run(&self, cache: &BlockCacheManager, needed: usize) -> Option<RecordId> {
        let mut run = 0;

        for idx in 0..self.slots {
            if self.slot(cache, RecordId::new(idx)).is_free() {
                run += 1;
                if run == needed {
                    return Some(RecordId::new(idx + 1 - needed));
                }
            } else {
                run = 0;
            }
        }

        None
    }

    /// 在`at`起的空闲连续区写入一个簇。簇首带着打开标记落盘。
    pub(crate) fn write_cluster(
        &self,
        cache: &BlockCacheManager,
        at: RecordId,
        name: &str,
        first_block: DataBlockId,
    ) {
        for (i, slot) in name2slots(name, first_block).into_iter().enumerate() {
            self.access_mut(cache, at + i, |dst| *dst = slot);
        }
    }

    /// 清空`at`处簇的全部槽位（删除）。
    pub(crate) fn clear_cluster(&self, cache: &BlockCacheManager, at: RecordId) {
        let cluster_len = self.slot(cache, at).cluster_len();
        for i in 0..cluster_len {
            self.access_mut(cache, at + i, |slot| *slot = RecordSlot::default());
        }
    }

    pub(crate) fn is_open(&self, cache: &BlockCacheManager, id: RecordId) -> bool {
        self.access(cache, id, RecordSlot::is_open)
    }

    pub(crate) fn set_open(&self, cache: &BlockCacheManager, id: RecordId, open: bool) {
        self.access_mut(cache, id, |slot| slot.set_open(open));
    }

    pub(crate) fn update_size(&self, cache: &BlockCacheManager, id: RecordId, size: usize) {
        self.access_mut(cache, id, |slot| slot.resize(size));
    }

    pub(crate) fn access<F, R>(&self, cache: &BlockCacheManager, id: RecordId, f: F) -> R
    where
        F: FnOnce(&RecordSlot) -> R,
    {
        let (bid, offset) = self.pos(cache, id);
        cache.get(bid).lock().map(offset, f)
    }

    pub(crate) fn access_mut<F, R>(&self, cache: &BlockCacheManager, id: RecordId, f: F) -> R
    where
        F: FnOnce(&mut RecordSlot) -> R,
    {
        let (bid, offset) = self.pos(cache, id);
        cache.get(bid).lock().map_mut(offset, f)
    }
}

impl RecordArea {
    fn slot(&self, cache: &BlockCacheManager, id: RecordId) -> RecordSlot {
        self.access(cache, id, |slot| *slot)
    }

    /// 读出从`at`开始的一个完整簇（可能跨块）
    fn cluster(&self, cache: &BlockCacheManager, at: RecordId, len: usize) -> Vec<RecordSlot> {
        (0..len).map(|i| self.slot(cache, at + i)).collect()
    }

    /// 返回记录编号实际所处的磁盘位置（块号 + 块内字节偏移）
    fn pos(&self, cache: &BlockCacheManager, id: RecordId) -> (BlockId, usize) {
        let idx = usize::from(id);
        assert!(idx < self.slots, "record id beyond the record area");

        let block_slots = cache.block_size() / mem::size_of::<RecordSlot>();
        (
            self.range.start + idx / block_slots,
            (idx % block_slots) * mem::size_of::<RecordSlot>(),
        )
    }
}
