//! # 块缓存层
//!
//! 块设备读写速度一般慢于内存读写速度，因此我们在内存中开辟缓冲区，
//! 把即将操作的块复制到内存中，提高对块设备的操作效率。
//! 同时，块缓存层也会尝试返回已缓存的块。
//!
//! 所有对分配表与记录区的修改都是整块的读-改-写：
//! 取出缓存块，修补相应字节，脏块在换出或同步时写回设备。
//!
//! 缓存管理器由文件系统持有，而非进程级全局量，
//! 同一进程可以同时挂载多个设备。

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::mem;
use core::slice;

use block_dev::BlockDevice;
use derive_more::{Add, From, Into};
use spin::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Add, From, Into)]
#[repr(transparent)]
pub struct BlockId(usize);

impl core::ops::Add<usize> for BlockId {
    type Output = Self;

    fn add(self, rhs: usize) -> Self::Output {
        self + Self(rhs)
    }
}

impl BlockId {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }
}

/// 内存中的块缓存
pub struct Block {
    /// 缓存的数据
    data: Box<[u8]>,
    /// 对应的块ID
    id: BlockId,
    /// 底层块设备的引用
    dev: Arc<dyn BlockDevice>,
    /// 是否为脏块
    modified: bool,
}

impl Block {
    fn new(id: BlockId, dev: Arc<dyn BlockDevice>) -> Self {
        let mut data = vec![0; dev.block_size()];
        dev.read_block(id.into(), &mut data);

        Self {
            data: data.into(),
            id,
            dev,
            modified: false,
        }
    }

    pub fn sync(&mut self) {
        if self.modified {
            self.modified = false;
            self.dev.write_block(self.id.into(), &self.data);
        }
    }

    pub fn get<T>(&self, offset: usize) -> &T {
        let type_size = mem::size_of::<T>();
        assert!(type_size + offset <= self.data.len());
        let addr = &self.data[offset];
        unsafe { mem::transmute(addr) }
    }

    pub fn get_mut<T>(&mut self, offset: usize) -> &mut T {
        let type_size = mem::size_of::<T>();
        assert!(type_size + offset <= self.data.len());
        self.modified = true;
        let addr = &mut self.data[offset];
        unsafe { mem::transmute(addr) }
    }

    pub fn as_slice<T>(&self) -> &[T] {
        let type_size = mem::size_of::<T>();
        let len = self.data.len() / type_size;
        assert_eq!(0, self.data.len() % type_size);
        unsafe { slice::from_raw_parts(self.data.as_ptr().cast(), len) }
    }

    pub fn as_mut_slice<T>(&mut self) -> &mut [T] {
        let type_size = mem::size_of::<T>();
        let len = self.data.len() / type_size;
        assert_eq!(0, self.data.len() % type_size);
        self.modified = true;
        unsafe { slice::from_raw_parts_mut(self.data.as_mut_ptr().cast(), len) }
    }

    #[inline]
    pub fn map<T, V>(&self, offset: usize, f: impl FnOnce(&T) -> V) -> V {
        f(self.get(offset))
    }

    #[inline]
    pub fn map_mut<T, V>(&mut self, offset: usize, f: impl FnOnce(&mut T) -> V) -> V {
        f(self.get_mut(offset))
    }

    #[inline]
    pub fn map_slice<T, V>(&self, f: impl FnOnce(&[T]) -> V) -> V {
        f(self.as_slice())
    }

    #[inline]
    pub fn map_mut_slice<T, V>(&mut self, f: impl FnOnce(&mut [T]) -> V) -> V {
        f(self.as_mut_slice())
    }

    #[inline]
    pub fn zeroize(&mut self) {
        self.data.fill(0);
        self.modified = true;
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        self.sync();
    }
}

/// 块缓存管理器，负责缓存、调度缓存块
pub struct BlockCacheManager {
    /// 底层块设备的引用
    dev: Arc<dyn BlockDevice>,
    queue: Mutex<Vec<(BlockId, Arc<Mutex<Block>>)>>,
}

impl BlockCacheManager {
    /// 块缓存个数的上限
    const CAPACITY: usize = 16;

    pub fn new(dev: &Arc<dyn BlockDevice>) -> Self {
        Self {
            dev: dev.clone(),
            queue: Mutex::default(),
        }
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.dev.block_size()
    }

    // 块缓存调度策略：踢走闲置块
    pub fn get(&self, id: BlockId) -> Arc<Mutex<Block>> {
        let mut queue = self.queue.lock();

        // 尝试从缓冲区中读取块
        if let Some(cache) = queue
            .iter()
            .find_map(|(bid, cache)| (id == *bid).then_some(cache))
        {
            return Arc::clone(cache);
        };

        // 触及上限，写回一个块
        if queue.len() == Self::CAPACITY {
            let index = queue
                .iter()
                .position(|(_, cache)| Arc::strong_count(cache) == 1) // 没有其它引用的才能写回
                .expect("run out of block cache");
            queue.remove(index);
        }

        // 缓存新块
        let block = Arc::new(Mutex::new(Block::new(id, self.dev.clone())));
        queue.push((id, block.clone()));

        block
    }

    /// 把所有脏块写回设备
    pub fn sync_all(&self) {
        self.queue
            .lock()
            .iter()
            .for_each(|(_, cache)| cache.lock().sync());
    }
}
