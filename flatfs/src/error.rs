/// 文件系统的用户侧错误。
///
/// 内部一致性破坏（条目该空不空、该是链尾却不是）不在此列：
/// 那说明盘上结构已经损坏，直接panic，不映射成用户错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// 操作会把盘写满
    OutOfSpace,
    /// 对未打开的文件做读/写/定位/关闭
    NotOpen,
    /// 文件已被打开：不支持并发打开，也不允许删除打开中的文件
    AlreadyOpen,
    NotFound,
    /// 对只读方式打开的文件写入
    ReadOnly,
    AlreadyExists,
    /// 名字超过一个簇（15槽 × 23字节）的容量
    NameTooLong,
}
