//! 卷的布局
//!
//! 头部（0号块） | 分配表区 | 记录区 | 数据区

pub mod fat;
pub mod header;
pub mod records;
