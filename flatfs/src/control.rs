//! 文件系统总控：挂载、格式化与生命周期操作。
//!
//! 生命周期操作把记录区与分配表串在一起：
//! create/open发放句柄，delete直接按名字动盘，与句柄无关，
//! 但被打开位挡住的删除会被拒绝。

use alloc::sync::Arc;

use block_dev::BlockDevice;
use spin::Mutex;

use crate::block::{Block, BlockCacheManager};
use crate::util::zero_blocks;
use crate::volume::fat::FatArea;
use crate::volume::header::Header;
use crate::volume::records::{MAX_CLUSTER_SLOTS, RecordArea, RecordId, RecordSlot, name_slots};
use crate::{BlockId, DataBlockId, File, FileMode, FsError};

pub struct FlatFileSystem {
    cache: BlockCacheManager,
    fat: FatArea,
    records: RecordArea,
    /// 数据区的起始块号
    data_start: BlockId,
}

impl FlatFileSystem {
    /// 挂载已格式化的设备：读出0号块的头部，搭好三个区域的描述与块缓存。
    pub fn new(dev: &Arc<dyn BlockDevice>) -> Self {
        let header = Header::load(dev);

        Self {
            fat: FatArea::new(&header),
            records: RecordArea::new(&header, dev.block_size()),
            data_start: header.first_data(),
            cache: BlockCacheManager::new(dev),
        }
    }

    /// 一次性划分全新的设备：写入头部，清零分配表区与记录区，然后挂载。
    pub fn format(dev: &Arc<dyn BlockDevice>) -> Self {
        let header = Header::new(dev.block_size(), dev.block_count());
        header.store(dev);

        let fs = Self::new(dev);
        zero_blocks(&fs.cache, header.fat_area());
        zero_blocks(&fs.cache, header.record_area());
        fs.cache.sync_all();

        log::info!(
            "formatted: {} data blocks of {} bytes",
            header.data_blocks(),
            dev.block_size()
        );
        fs
    }

    /// 创建并打开新文件，游标在0，大小为0。
    pub fn create(&mut self, name: &str, mode: FileMode) -> Result<File, FsError> {
        let slots = name_slots(name);
        if slots > MAX_CLUSTER_SLOTS {
            return Err(FsError::NameTooLong);
        }
        if self.records.find(&self.cache, name).is_some() {
            return Err(FsError::AlreadyExists);
        }

        let first = self.fat.alloc(&self.cache).ok_or(FsError::OutOfSpace)?;
        let at = self
            .records
            .find_free_run(&self.cache, slots)
            .ok_or(FsError::OutOfSpace)?;

        // 簇首落盘时就带着打开标记
        self.records.write_cluster(&self.cache, at, name, first);
        self.claim_zeroed(first);
        self.cache.sync_all();

        log::debug!(
            "created {name:?}: record {}, first block {}",
            usize::from(at),
            u32::from(first)
        );
        Ok(File::new(at, 0, first, mode))
    }

    /// 打开既有文件，游标在0。同名文件同时只能有一个活句柄。
    pub fn open(&mut self, name: &str, mode: FileMode) -> Result<File, FsError> {
        let at = self
            .records
            .find(&self.cache, name)
            .ok_or(FsError::NotFound)?;
        if self.records.is_open(&self.cache, at) {
            return Err(FsError::AlreadyOpen);
        }

        self.records.set_open(&self.cache, at, true);
        let (size, first) = self
            .records
            .access(&self.cache, at, |slot| (slot.size(), slot.first_block()));
        self.cache.sync_all();

        log::debug!("opened {name:?}: record {}, size {size}", usize::from(at));
        Ok(File::new(at, size, first, mode))
    }

    /// 收回句柄，清掉打开位。打开位本来就没立着则报[`FsError::NotOpen`]。
    pub fn close(&mut self, file: File) -> Result<(), FsError> {
        let at = file.record();
        if !self.records.is_open(&self.cache, at) {
            return Err(FsError::NotOpen);
        }

        self.records.set_open(&self.cache, at, false);
        self.cache.sync_all();
        Ok(())
    }

    /// 按名字删除文件：清空记录簇，释放整条数据块链。
    /// 文件打开期间拒绝删除。
    pub fn delete(&mut self, name: &str) -> Result<(), FsError> {
        let at = self
            .records
            .find(&self.cache, name)
            .ok_or(FsError::NotFound)?;
        if self.records.is_open(&self.cache, at) {
            return Err(FsError::AlreadyOpen);
        }

        let first = self.records.access(&self.cache, at, RecordSlot::first_block);
        self.records.clear_cluster(&self.cache, at);
        self.fat.release(&self.cache, first);
        self.cache.sync_all();

        log::debug!("deleted {name:?}: record {}", usize::from(at));
        Ok(())
    }

    /// 名字存在与否。本操作自身永不失败。
    pub fn exists(&self, name: &str) -> bool {
        self.records.find(&self.cache, name).is_some()
    }
}

/* I/O引擎的后门 */
impl FlatFileSystem {
    pub(crate) fn block_size(&self) -> usize {
        self.cache.block_size()
    }

    /// 取数据块的缓存（编号相对数据区）
    pub(crate) fn data(&self, id: DataBlockId) -> Arc<Mutex<Block>> {
        self.cache.get(self.data_start + usize::from(id))
    }

    /// 链上的下一个块；链穿过未分配条目说明分配表已损坏，直接panic。
    pub(crate) fn chain_next(&self, id: DataBlockId) -> Option<DataBlockId> {
        self.fat
            .next(&self.cache, id)
            .expect("chain runs through an invalid entry")
    }

    /// 分配一个零填充的新块接到`parent`（当前链尾）之后。
    pub(crate) fn alloc_tail(&self, parent: DataBlockId) -> Result<DataBlockId, FsError> {
        let next = self.fat.alloc(&self.cache).ok_or(FsError::OutOfSpace)?;
        self.claim_zeroed(next);
        self.fat.couple(&self.cache, parent, next);
        Ok(next)
    }

    pub(crate) fn is_open(&self, at: RecordId) -> bool {
        self.records.is_open(&self.cache, at)
    }

    pub(crate) fn update_size(&self, at: RecordId, size: usize) {
        self.records.update_size(&self.cache, at, size);
    }

    pub(crate) fn sync(&self) {
        self.cache.sync_all();
    }

    /// 占据条目并清零对应的数据块
    fn claim_zeroed(&self, id: DataBlockId) {
        self.fat.claim(&self.cache, id);
        self.data(id).lock().zeroize();
    }
}
