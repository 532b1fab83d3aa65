//! # 文件系统接口
//!
//! 内核通过 [`File`] 与 [`FileSystem`] 两个 trait 使用文件服务，
//! 具体实现可以替换：
//!
//! - [`RamFileSystem`] - 基于 `components::ram_fs` 的内存文件系统
//! - [`Stdin`] / [`Stdout`] - 控制台上的标准输入输出
//! - [`FdTable`] - 每个进程的文件描述符表

mod fd_table;
mod inode;
mod stdio;

pub use fd_table::FdTable;
pub use inode::{OSInode, OpenFlags, RamFileSystem};
pub use stdio::{BufferConsole, Console, HostConsole, Stdin, Stdout};

use std::sync::Arc;
use thiserror::Error;

/// 文件读写错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("file is not readable")]
    NotReadable,
    #[error("file is not writable")]
    NotWritable,
}

/// 打开的文件
///
/// 每个打开的文件维护自己的读写位置，读写从该位置开始并推进它。
pub trait File: Send + Sync {
    /// 读取到 `buf`，返回读取的字节数，0 表示已到文件末尾
    fn read(&self, buf: &mut [u8]) -> Result<usize, FsError>;
    /// 写入 `buf`，返回写入的字节数
    fn write(&self, buf: &[u8]) -> Result<usize, FsError>;
    /// 打开时使用的文件名
    fn name(&self) -> &str;
}

/// 文件系统
pub trait FileSystem: Send + Sync {
    /// 打开文件
    ///
    /// 带 [`OpenFlags::CREATE`] 时文件不存在则创建、存在则截断；
    /// 否则文件不存在时返回 `None`。
    fn open(&self, name: &str, flags: OpenFlags) -> Option<Arc<dyn File>>;
    /// 删除文件名，文件不存在时返回 `false`
    fn remove(&self, name: &str) -> bool;
}
