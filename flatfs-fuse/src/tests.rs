use std::sync::{Arc, Mutex};

use block_dev::BlockDevice;
use flatfs::{FileMode, FlatFileSystem, FsError};

const BLOCK_SIZE: usize = 512;

/// 内存里的块设备，免去测试用临时镜像文件
struct MemDisk {
    data: Mutex<Vec<u8>>,
    block_count: usize,
}

impl MemDisk {
    fn new(block_count: usize) -> Arc<dyn BlockDevice> {
        Arc::new(Self {
            data: Mutex::new(vec![0; block_count * BLOCK_SIZE]),
            block_count,
        })
    }
}

impl BlockDevice for MemDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        let data = self.data.lock().unwrap();
        let start = block_id * BLOCK_SIZE;
        buf.copy_from_slice(&data[start..start + BLOCK_SIZE]);
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        let mut data = self.data.lock().unwrap();
        let start = block_id * BLOCK_SIZE;
        data[start..start + BLOCK_SIZE].copy_from_slice(buf);
    }

    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    fn block_count(&self) -> usize {
        self.block_count
    }
}

/// 64块的标准测试盘：头部1块、分配表1块、记录区1块（16个槽位）、
/// 数据区61块，其中0号保留，实际可用60块。
fn mount() -> FlatFileSystem {
    FlatFileSystem::format(&MemDisk::new(64))
}

/// 可用数据容量（字节）
const CAPACITY: usize = 60 * BLOCK_SIZE;

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn round_trip() {
    let mut ffs = mount();
    let data = pattern(1500);

    let mut file = ffs.create("a.txt", FileMode::ReadWrite).unwrap();
    assert_eq!(1500, file.write(&data, &mut ffs).unwrap());
    assert_eq!(1500, file.len());
    ffs.close(file).unwrap();

    // 大小与内容都要在重新打开后存活
    let mut file = ffs.open("a.txt", FileMode::ReadOnly).unwrap();
    assert_eq!(1500, file.len());
    let mut buf = vec![0; 2000];
    assert_eq!(1500, file.read(&mut buf, &ffs).unwrap());
    assert_eq!(data, buf[..1500]);
    // 游标已到文件尾，继续读只能读到0字节
    assert_eq!(0, file.read(&mut buf, &ffs).unwrap());
    ffs.close(file).unwrap();
}

#[test]
fn read_straddles_blocks() {
    let mut ffs = mount();
    let data = pattern(3 * BLOCK_SIZE);

    let mut file = ffs.create("big", FileMode::ReadWrite).unwrap();
    file.write(&data, &mut ffs).unwrap();
    file.seek(100, &mut ffs).unwrap();

    let mut buf = vec![0; 2 * BLOCK_SIZE];
    assert_eq!(2 * BLOCK_SIZE, file.read(&mut buf, &ffs).unwrap());
    assert_eq!(data[100..100 + 2 * BLOCK_SIZE], buf[..]);
    assert_eq!(100 + 2 * BLOCK_SIZE, file.pos());
}

#[test]
fn open_is_exclusive() {
    let mut ffs = mount();

    let file = ffs.create("lock", FileMode::ReadWrite).unwrap();
    // create留下的句柄也算打开
    assert_eq!(
        Err(FsError::AlreadyOpen),
        ffs.open("lock", FileMode::ReadOnly).map(|_| ())
    );
    assert_eq!(
        Err(FsError::AlreadyExists),
        ffs.create("lock", FileMode::ReadWrite).map(|_| ())
    );
    ffs.close(file).unwrap();

    let file = ffs.open("lock", FileMode::ReadOnly).unwrap();
    assert_eq!(
        Err(FsError::AlreadyOpen),
        ffs.open("lock", FileMode::ReadOnly).map(|_| ())
    );
    ffs.close(file).unwrap();
}

#[test]
fn read_only_rejects_write() {
    let mut ffs = mount();

    let file = ffs.create("ro", FileMode::ReadWrite).unwrap();
    ffs.close(file).unwrap();

    let mut file = ffs.open("ro", FileMode::ReadOnly).unwrap();
    assert_eq!(Err(FsError::ReadOnly), file.write(b"x", &mut ffs));
    ffs.close(file).unwrap();
}

#[test]
fn write_fills_then_rejects() {
    let mut ffs = mount();
    let data = pattern(CAPACITY + 4096);

    let mut file = ffs.create("full", FileMode::ReadWrite).unwrap();
    // 短写：已写入的部分保留并计入大小
    assert_eq!(CAPACITY, file.write(&data, &mut ffs).unwrap());
    assert_eq!(CAPACITY, file.len());
    // 盘满后再写，一个字节都进不去
    assert_eq!(Err(FsError::OutOfSpace), file.write(b"x", &mut ffs));
    ffs.close(file).unwrap();

    let mut file = ffs.open("full", FileMode::ReadOnly).unwrap();
    let mut buf = vec![0; CAPACITY + 4096];
    assert_eq!(CAPACITY, file.read(&mut buf, &ffs).unwrap());
    assert_eq!(data[..CAPACITY], buf[..CAPACITY]);
    ffs.close(file).unwrap();
}

#[test]
fn seek_extends_with_zeros() {
    let mut ffs = mount();

    let mut file = ffs.create("sparse", FileMode::ReadWrite).unwrap();
    file.write(b"ab", &mut ffs).unwrap();
    file.seek(2000, &mut ffs).unwrap();
    assert_eq!(2000, file.len());
    file.write(b"z", &mut ffs).unwrap();
    assert_eq!(2001, file.len());
    ffs.close(file).unwrap();

    let mut file = ffs.open("sparse", FileMode::ReadOnly).unwrap();
    let mut buf = vec![0xFF; 3000];
    assert_eq!(2001, file.read(&mut buf, &ffs).unwrap());
    assert_eq!(b"ab", &buf[..2]);
    assert!(buf[2..2000].iter().all(|&b| b == 0), "gap is zero-filled");
    assert_eq!(b'z', buf[2000]);
    ffs.close(file).unwrap();
}

#[test]
fn seek_block_boundary_is_exact() {
    let mut ffs = mount();

    let mut file = ffs.create("edge", FileMode::ReadWrite).unwrap();
    // 定位到恰好容量处：覆盖[0, CAPACITY)正好用掉全部60块
    file.seek(CAPACITY, &mut ffs).unwrap();
    assert_eq!(CAPACITY, file.len());

    // 再多一个字节就需要第61块
    assert_eq!(Err(FsError::OutOfSpace), file.seek(CAPACITY + 1, &mut ffs));
    // 失败后大小与游标停在实际到达的几何处
    assert_eq!(CAPACITY, file.len());
    assert_eq!(CAPACITY, file.pos());
    ffs.close(file).unwrap();
}

#[test]
fn seek_backward_then_read() {
    let mut ffs = mount();
    let data = pattern(1000);

    let mut file = ffs.create("back", FileMode::ReadWrite).unwrap();
    file.write(&data, &mut ffs).unwrap();
    file.seek(0, &mut ffs).unwrap();
    assert_eq!(0, file.pos());
    assert_eq!(1000, file.len(), "seeking backward doesn't shrink");

    let mut buf = vec![0; 1000];
    assert_eq!(1000, file.read(&mut buf, &ffs).unwrap());
    assert_eq!(data, buf);
    ffs.close(file).unwrap();
}

#[test]
fn delete_is_gated_and_reclaims() {
    let mut ffs = mount();

    let mut file = ffs.create("victim", FileMode::ReadWrite).unwrap();
    file.write(&pattern(CAPACITY), &mut ffs).unwrap();
    // 打开期间拒绝删除
    assert_eq!(Err(FsError::AlreadyOpen), ffs.delete("victim"));
    ffs.close(file).unwrap();

    ffs.delete("victim").unwrap();
    assert!(!ffs.exists("victim"));
    assert_eq!(
        Err(FsError::NotFound),
        ffs.open("victim", FileMode::ReadOnly).map(|_| ())
    );
    assert_eq!(Err(FsError::NotFound), ffs.delete("victim"));

    // 释放的块可以整个重新用起来
    let mut file = ffs.create("reborn", FileMode::ReadWrite).unwrap();
    assert_eq!(CAPACITY, file.write(&pattern(CAPACITY), &mut ffs).unwrap());
    ffs.close(file).unwrap();
}

#[test]
fn long_names_cluster() {
    let mut ffs = mount();

    // 30字节的名字占2个槽位，与其前23字节的短名互不干扰
    let long = "abcdefghijklmnopqrstuvwxyz0123";
    let short = &long[..23];
    assert_eq!(30, long.len());

    let f1 = ffs.create(long, FileMode::ReadWrite).unwrap();
    let f2 = ffs.create(short, FileMode::ReadWrite).unwrap();
    ffs.close(f1).unwrap();
    ffs.close(f2).unwrap();

    let mut file = ffs.open(long, FileMode::ReadWrite).unwrap();
    file.write(b"long", &mut ffs).unwrap();
    ffs.close(file).unwrap();

    let mut file = ffs.open(short, FileMode::ReadWrite).unwrap();
    file.write(b"short", &mut ffs).unwrap();
    ffs.close(file).unwrap();

    let mut buf = vec![0; 16];
    let mut file = ffs.open(long, FileMode::ReadOnly).unwrap();
    assert_eq!(4, file.read(&mut buf, &ffs).unwrap());
    assert_eq!(b"long", &buf[..4]);
    ffs.close(file).unwrap();

    ffs.delete(long).unwrap();
    assert!(ffs.exists(short), "deleting the long name spares the short");
}

#[test]
fn name_too_long() {
    let mut ffs = mount();

    // 15槽 × 23字节 = 345字节是名字的硬上限
    let max = "x".repeat(345);
    let over = "x".repeat(346);

    let file = ffs.create(&max, FileMode::ReadWrite).unwrap();
    ffs.close(file).unwrap();
    assert_eq!(
        Err(FsError::NameTooLong),
        ffs.create(&over, FileMode::ReadWrite).map(|_| ())
    );
}

#[test]
fn records_behind_holes_stay_visible() {
    let mut ffs = mount();

    for name in ["a", "b", "c"] {
        let file = ffs.create(name, FileMode::ReadWrite).unwrap();
        ffs.close(file).unwrap();
    }

    // 删掉中间的记录留下空洞，空洞之后的文件必须照样找得到
    ffs.delete("b").unwrap();
    assert!(ffs.exists("a"));
    assert!(ffs.exists("c"));
    let file = ffs.open("c", FileMode::ReadOnly).unwrap();
    ffs.close(file).unwrap();

    // 新文件填回空洞，一切照旧
    let file = ffs.create("b2", FileMode::ReadWrite).unwrap();
    ffs.close(file).unwrap();
    assert!(ffs.exists("a"));
    assert!(ffs.exists("b2"));
    assert!(ffs.exists("c"));
}

#[test]
fn record_area_exhaustion() {
    let mut ffs = mount();

    // 1个记录块 = 16个槽位
    for i in 0..16 {
        let file = ffs.create(&format!("f{i}"), FileMode::ReadWrite).unwrap();
        ffs.close(file).unwrap();
    }
    assert_eq!(
        Err(FsError::OutOfSpace),
        ffs.create("f16", FileMode::ReadWrite).map(|_| ())
    );

    // 腾出一个槽位就又能建了
    ffs.delete("f3").unwrap();
    let file = ffs.create("f16", FileMode::ReadWrite).unwrap();
    ffs.close(file).unwrap();
}

#[test]
fn remount_preserves_everything() {
    let dev = MemDisk::new(64);
    let data = pattern(700);

    let mut ffs = FlatFileSystem::format(&dev);
    let mut file = ffs.create("keep", FileMode::ReadWrite).unwrap();
    file.write(&data, &mut ffs).unwrap();
    ffs.close(file).unwrap();
    drop(ffs);

    // 不再格式化，直接挂载同一设备
    let mut ffs = FlatFileSystem::new(&dev);
    assert!(ffs.exists("keep"));
    let mut file = ffs.open("keep", FileMode::ReadOnly).unwrap();
    let mut buf = vec![0; 1024];
    assert_eq!(700, file.read(&mut buf, &ffs).unwrap());
    assert_eq!(data, buf[..700]);
    ffs.close(file).unwrap();
}

#[test]
fn empty_file() {
    let mut ffs = mount();

    let mut file = ffs.create("void", FileMode::ReadWrite).unwrap();
    assert!(file.is_empty());
    let mut buf = [0; 8];
    assert_eq!(0, file.read(&mut buf, &ffs).unwrap());
    ffs.close(file).unwrap();
}

#[test]
fn overwrite_keeps_tail() {
    let mut ffs = mount();

    let mut file = ffs.create("tail", FileMode::ReadWrite).unwrap();
    file.write(&pattern(1000), &mut ffs).unwrap();
    file.seek(0, &mut ffs).unwrap();
    // 覆写开头不截断后面
    file.write(b"HEAD", &mut ffs).unwrap();
    assert_eq!(1000, file.len());

    file.seek(0, &mut ffs).unwrap();
    let mut buf = vec![0; 1000];
    assert_eq!(1000, file.read(&mut buf, &ffs).unwrap());
    assert_eq!(b"HEAD", &buf[..4]);
    assert_eq!(pattern(1000)[4..], buf[4..]);
    ffs.close(file).unwrap();
}
