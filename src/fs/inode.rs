//! # 内存文件系统的内核侧封装
//!
//! [`OSInode`] 在 `components::ram_fs::Inode` 之上增加读写位置，
//! [`RamFileSystem`] 把 `RamFs` 适配为内核的 [`FileSystem`]。

use super::{File, FileSystem, FsError};
use crate::sync::UPSafeCell;
use bitflags::*;
use components::{Inode, RamFs};
use std::sync::Arc;

bitflags! {
    /// 打开标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// 文件不存在则创建，存在则截断
        const CREATE = 1 << 9;
    }
}

/// 内核打开文件对象
///
/// 创建时登记一个打开句柄，销毁时注销。
pub struct OSInode {
    name: String,
    offset: UPSafeCell<usize>,
    inode: Arc<Inode>,
}

impl OSInode {
    pub fn new(name: &str, inode: Arc<Inode>) -> Self {
        inode.open();
        Self {
            name: String::from(name),
            offset: UPSafeCell::new(0),
            inode,
        }
    }
}

impl File for OSInode {
    fn read(&self, buf: &mut [u8]) -> Result<usize, FsError> {
        let mut offset = self.offset.exclusive_access();
        let n = self.inode.read_at(*offset, buf);
        *offset += n;
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> Result<usize, FsError> {
        let mut offset = self.offset.exclusive_access();
        let n = self.inode.write_at(*offset, buf);
        *offset += n;
        Ok(n)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for OSInode {
    fn drop(&mut self) {
        self.inode.close();
    }
}

/// 内存文件系统
///
/// ## Examples
///
/// ```
/// use userprog::fs::{FileSystem, OpenFlags, RamFileSystem};
///
/// let fs = RamFileSystem::new();
/// let file = fs.open("notes.txt", OpenFlags::CREATE).unwrap();
/// file.write(b"hello").unwrap();
/// assert_eq!(fs.open_count("notes.txt"), 1);
/// drop(file);
/// assert_eq!(fs.open_count("notes.txt"), 0);
/// ```
#[derive(Default)]
pub struct RamFileSystem {
    fs: RamFs,
}

impl RamFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以给定内容创建（或覆盖）文件
    pub fn install(&self, name: &str, data: &[u8]) {
        let inode = match self.fs.find(name) {
            Some(inode) => {
                inode.clear();
                inode
            }
            None => match self.fs.create(name) {
                Some(inode) => inode,
                // 并发创建同名文件
                None => return self.install(name, data),
            },
        };
        inode.write_at(0, data);
    }

    /// 读取文件的全部内容
    pub fn read_all(&self, name: &str) -> Option<Vec<u8>> {
        let inode = self.fs.find(name)?;
        let mut data = vec![0u8; inode.size()];
        let n = inode.read_at(0, &mut data);
        data.truncate(n);
        Some(data)
    }

    /// 某个文件当前的打开句柄数，文件不存在时为 0
    pub fn open_count(&self, name: &str) -> usize {
        self.fs.find(name).map_or(0, |inode| inode.open_handles())
    }

    pub fn ls(&self) -> Vec<String> {
        self.fs.ls()
    }
}

impl FileSystem for RamFileSystem {
    fn open(&self, name: &str, flags: OpenFlags) -> Option<Arc<dyn File>> {
        let inode = match self.fs.find(name) {
            Some(inode) => {
                if flags.contains(OpenFlags::CREATE) {
                    inode.clear();
                }
                inode
            }
            None if flags.contains(OpenFlags::CREATE) => self.fs.create(name)?,
            None => return None,
        };
        Some(Arc::new(OSInode::new(name, inode)))
    }

    fn remove(&self, name: &str) -> bool {
        self.fs.remove(name)
    }
}
