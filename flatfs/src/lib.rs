#![no_std]

extern crate alloc;

mod block;
mod chain;
mod control;
mod error;
mod file;
mod util;
pub mod volume;

pub use self::{
    block::BlockId,
    chain::{ChainError, DataBlockId},
    control::FlatFileSystem,
    error::FsError,
    file::{File, FileMode},
};
