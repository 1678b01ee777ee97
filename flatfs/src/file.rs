//! 文件I/O引擎
//!
//! 句柄只在内存中存活：create/open造出来，read/write/seek改游标，close收回。
//! 游标是线性的字节位置，引擎负责把它翻译成链上的块遍历；
//! 写越块尾、定位越文件尾都会让链向后生长。

use crate::control::FlatFileSystem;
use crate::volume::records::RecordId;
use crate::{DataBlockId, FsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    ReadOnly,
    ReadWrite,
}

/// 一个打开的文件。
///
/// `current`缓存的是链上第`current_index`块的编号，
/// 读写只会让它向前推进，回退（向前定位）时从链头重走。
/// 失败的操作不改动句柄，句柄保持原先的有效状态。
#[derive(Debug)]
pub struct File {
    /// 簇首槽位的绝对记录编号
    record: RecordId,
    /// 文件大小的内存副本，与簇首的大小字段同步维护
    size: usize,
    /// 字节游标
    pos: usize,
    /// 链头数据块
    start: DataBlockId,
    current: DataBlockId,
    current_index: usize,
    mode: FileMode,
}

impl File {
    pub(crate) fn new(record: RecordId, size: usize, start: DataBlockId, mode: FileMode) -> Self {
        Self {
            record,
            size,
            pos: 0,
            start,
            current: start,
            current_index: 0,
            mode,
        }
    }

    pub(crate) fn record(&self) -> RecordId {
        self.record
    }

    /// 当前文件大小（字节）。纯内存读取。
    pub const fn len(&self) -> usize {
        self.size
    }

    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub const fn pos(&self) -> usize {
        self.pos
    }

    /// 从游标处读取至多`buf.len()`字节。
    ///
    /// 读取量会被收束到文件末尾：到尾即止，短读是正常结果而非错误。
    /// 若链比记录的大小还短（大小字段虚胖），有多少读多少。
    pub fn read(&mut self, buf: &mut [u8], fs: &FlatFileSystem) -> Result<usize, FsError> {
        if !fs.is_open(self.record) {
            return Err(FsError::NotOpen);
        }

        let block_size = fs.block_size();
        let end = (self.pos + buf.len()).min(self.size); // exclusive

        let mut read = 0;
        while self.pos < end {
            if !self.step_to(self.pos / block_size, fs, false)? {
                break;
            }

            let offset = self.pos % block_size;
            let n = (end - self.pos).min(block_size - offset);
            fs.data(self.current).lock().map_slice(|data: &[u8]| {
                buf[read..read + n].copy_from_slice(&data[offset..offset + n])
            });

            read += n;
            self.pos += n;
        }

        Ok(read)
    }

    /// 把`buf`整个写进游标处，跨块时顺链前进，链尽则分配新块接上。
    ///
    /// 中途把盘写满时，已写的部分保留并照常计入大小，
    /// 返回`Ok(n)`且`n < buf.len()`（短写约定）；
    /// 一个字节都写不进去才返回[`FsError::OutOfSpace`]。
    pub fn write(&mut self, buf: &[u8], fs: &mut FlatFileSystem) -> Result<usize, FsError> {
        if self.mode == FileMode::ReadOnly {
            return Err(FsError::ReadOnly);
        }
        if !fs.is_open(self.record) {
            return Err(FsError::NotOpen);
        }

        let block_size = fs.block_size();
        let end = self.pos + buf.len(); // exclusive

        let mut wrote = 0;
        let mut full = false;
        while self.pos < end {
            match self.step_to(self.pos / block_size, fs, true) {
                Ok(_) => {}
                Err(FsError::OutOfSpace) => {
                    full = true;
                    break;
                }
                Err(e) => return Err(e),
            }

            let offset = self.pos % block_size;
            let n = (end - self.pos).min(block_size - offset);
            fs.data(self.current).lock().map_mut_slice(|data: &mut [u8]| {
                data[offset..offset + n].copy_from_slice(&buf[wrote..wrote + n])
            });

            wrote += n;
            self.pos += n;
        }

        if self.pos > self.size {
            self.size = self.pos;
            fs.update_size(self.record, self.size);
        }
        fs.sync();

        if full && wrote == 0 {
            return Err(FsError::OutOfSpace);
        }
        Ok(wrote)
    }

    /// 把游标定位到`pos`（相对文件开头）。
    ///
    /// 定位越过文件末尾即是扩展文件：沿途缺的块都分配成零填充块，
    /// 大小更新为`pos`。扩展中途把盘用完时，大小与位置落在实际到达的
    /// 几何处（而非请求的位置），并报告[`FsError::OutOfSpace`]。
    pub fn seek(&mut self, pos: usize, fs: &mut FlatFileSystem) -> Result<(), FsError> {
        if !fs.is_open(self.record) {
            return Err(FsError::NotOpen);
        }

        let block_size = fs.block_size();
        // 覆盖[0, pos)需要的最后一个块；边界位置不多占块
        let target_index = pos.saturating_sub(1) / block_size;

        // 从链头重走，兼容任意方向的移动
        self.current = self.start;
        self.current_index = 0;

        while self.current_index < target_index {
            match fs.chain_next(self.current) {
                Some(next) => {
                    self.current = next;
                    self.current_index += 1;
                }
                None => match fs.alloc_tail(self.current) {
                    Ok(next) => {
                        self.current = next;
                        self.current_index += 1;
                    }
                    Err(e) => {
                        let reached = (self.current_index + 1) * block_size;
                        if reached > self.size {
                            self.size = reached;
                            fs.update_size(self.record, reached);
                        }
                        self.pos = reached;
                        fs.sync();
                        return Err(e);
                    }
                },
            }
        }

        if pos > self.size {
            self.size = pos;
            fs.update_size(self.record, pos);
        }
        self.pos = pos;
        fs.sync();

        Ok(())
    }
}

impl File {
    /// 把缓存的当前块推进到链上第`index`块。
    ///
    /// 到位返回`Ok(true)`；链在中途就断了而又不允许分配时返回`Ok(false)`。
    fn step_to(&mut self, index: usize, fs: &FlatFileSystem, alloc: bool) -> Result<bool, FsError> {
        if index < self.current_index {
            self.current = self.start;
            self.current_index = 0;
        }

        while self.current_index < index {
            match fs.chain_next(self.current) {
                Some(next) => self.current = next,
                None if alloc => self.current = fs.alloc_tail(self.current)?,
                None => return Ok(false),
            }
            self.current_index += 1;
        }

        Ok(true)
    }
}
