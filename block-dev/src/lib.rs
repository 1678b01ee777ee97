//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如磁盘、U盘或一个磁盘镜像文件；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 设备的块大小与块总数在格式化前就已固定，
//! 所有寻址均以非负的块编号进行，不存在亚块级寻址。

#![no_std]

use core::any::Any;

/// 块设备驱动特质
pub trait BlockDevice: Send + Sync + Any {
    /// 读取编号为`block_id`的块，`buf`长度必须等于块大小。
    fn read_block(&self, block_id: usize, buf: &mut [u8]);

    /// 写入编号为`block_id`的块，`buf`长度必须等于块大小。
    fn write_block(&self, block_id: usize, buf: &[u8]);

    /// 一个块的字节量
    fn block_size(&self) -> usize;

    /// 设备的块总数
    fn block_count(&self) -> usize;
}
