//! 头部，位于0号块，格式化时写入，挂载时读出，此后不再变动。
//!
//! 七个32位小端字段，记录三个区域的尺寸与起始块号。

use alloc::sync::Arc;
use alloc::vec;
use core::mem;
use core::ops::Range;
use core::slice;

use block_dev::BlockDevice;

use crate::BlockId;

/// 分区几何信息
///
/// 不变式：三个区域连续且互不重叠，
/// `first_fat == 1`，`first_record == first_fat + fat_blocks`，
/// `first_data == first_record + record_blocks`。
#[derive(Debug, Clone)]
#[repr(C)]
pub struct Header {
    /// 分配表区的块数
    fat_blocks: u32,

    /// 记录区的块数
    record_blocks: u32,

    /// 数据区的块数
    data_blocks: u32,

    /// 分配表区的起始块号
    first_fat: u32,

    /// 记录区的起始块号
    first_record: u32,

    /// 数据区的起始块号
    first_data: u32,

    /// 保留字段，不要求维护
    _last_used: u32,
}

impl Header {
    /// 按分区策略划分一个全新的设备：
    /// 分配表每个条目4字节、整个设备每块一条，记录区占设备的1%（向上取整），
    /// 剩余部分（除去头部）全归数据区。
    pub fn new(block_size: usize, block_count: usize) -> Self {
        let fat_blocks = (4 * block_count).div_ceil(block_size);
        let record_blocks = block_count.div_ceil(100);
        let data_blocks = block_count - 1 - fat_blocks - record_blocks;

        Self {
            fat_blocks: fat_blocks as u32,
            record_blocks: record_blocks as u32,
            data_blocks: data_blocks as u32,
            first_fat: 1,
            first_record: (1 + fat_blocks) as u32,
            first_data: (1 + fat_blocks + record_blocks) as u32,
            _last_used: 0,
        }
    }

    /// 从已格式化设备的0号块读出头部
    pub fn load(dev: &Arc<dyn BlockDevice>) -> Self {
        let mut buf = vec![0u8; dev.block_size()];
        dev.read_block(0, &mut buf);

        let mut raw = [0u8; mem::size_of::<Header>()];
        raw.copy_from_slice(&buf[..mem::size_of::<Header>()]);
        let header: Header = unsafe { mem::transmute(raw) };

        debug_assert_eq!(1, header.first_fat);
        debug_assert_eq!(header.first_fat + header.fat_blocks, header.first_record);
        debug_assert_eq!(
            header.first_record + header.record_blocks,
            header.first_data
        );

        header
    }

    /// 把头部写进0号块，块的剩余部分填零。
    pub fn store(&self, dev: &Arc<dyn BlockDevice>) {
        let mut buf = vec![0u8; dev.block_size()];
        let raw = unsafe {
            slice::from_raw_parts((self as *const Header).cast::<u8>(), mem::size_of::<Header>())
        };
        buf[..raw.len()].copy_from_slice(raw);
        dev.write_block(0, &buf);
    }

    pub fn fat_area(&self) -> Range<BlockId> {
        let start = BlockId::new(self.first_fat as usize);
        start..start + self.fat_blocks as usize
    }

    pub fn record_area(&self) -> Range<BlockId> {
        let start = BlockId::new(self.first_record as usize);
        start..start + self.record_blocks as usize
    }

    pub fn first_data(&self) -> BlockId {
        BlockId::new(self.first_data as usize)
    }

    pub const fn data_blocks(&self) -> usize {
        self.data_blocks as usize
    }
}
