use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use block_dev::BlockDevice;

/// 把宿主机上的一个普通文件当作块设备使用。
#[derive(Debug)]
pub struct BlockFile {
    file: Mutex<File>,
    block_size: usize,
    block_count: usize,
}

impl BlockFile {
    pub fn new(fd: File, block_size: usize, block_count: usize) -> Self {
        Self {
            file: Mutex::new(fd),
            block_size,
            block_count,
        }
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((block_id * self.block_size) as u64))
            .expect("seeking error");
        assert_eq!(
            file.read(buf).unwrap(),
            self.block_size,
            "not a complete block!"
        );
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((block_id * self.block_size) as u64))
            .expect("seeking error");
        assert_eq!(
            file.write(buf).unwrap(),
            self.block_size,
            "not a complete block!"
        );
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> usize {
        self.block_count
    }
}
