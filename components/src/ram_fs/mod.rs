//! # 内存文件系统
//!
//! 单层目录、数据全部驻留内存的简单文件系统，作为内核文件系统服务的后端。
//!
//! ## 设计
//!
//! - 根目录是一张 `文件名 -> Inode` 的有序表，由自旋锁保护
//! - [`Inode`] 保存文件数据并记录当前打开的句柄数
//! - 删除文件只移除目录项，已经持有 `Arc<Inode>` 的句柄仍可继续读写，
//!   与类 Unix 系统的 unlink 语义一致
//!
//! ## 使用示例
//!
//! ```rust
//! use components::RamFs;
//!
//! let fs = RamFs::new();
//! let inode = fs.create("notes.txt").unwrap();
//! inode.write_at(0, b"hello");
//! assert_eq!(fs.find("notes.txt").unwrap().size(), 5);
//! ```

mod inode;

pub use inode::Inode;

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

/// 内存文件系统
///
/// 所有方法都只在持锁期间访问目录表，返回的 [`Inode`] 在锁外使用。
pub struct RamFs {
    root: Mutex<BTreeMap<String, Arc<Inode>>>,
}

impl RamFs {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(BTreeMap::new()),
        }
    }

    /// 按名字查找文件
    pub fn find(&self, name: &str) -> Option<Arc<Inode>> {
        self.root.lock().get(name).cloned()
    }

    /// 创建一个空文件
    ///
    /// 同名文件已存在时返回 `None`，调用者可以改用 [`RamFs::find`] 后
    /// [`Inode::clear`] 实现截断。
    pub fn create(&self, name: &str) -> Option<Arc<Inode>> {
        let mut root = self.root.lock();
        if root.contains_key(name) {
            return None;
        }
        let inode = Arc::new(Inode::new());
        root.insert(String::from(name), inode.clone());
        Some(inode)
    }

    /// 删除目录项，文件不存在时返回 `false`
    pub fn remove(&self, name: &str) -> bool {
        self.root.lock().remove(name).is_some()
    }

    /// 列出根目录下所有文件名
    pub fn ls(&self) -> Vec<String> {
        self.root.lock().keys().cloned().collect()
    }
}

impl Default for RamFs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_existing_name() {
        let fs = RamFs::new();
        assert!(fs.create("a").is_some());
        assert!(fs.create("a").is_none());
        assert_eq!(fs.ls(), ["a"]);
    }

    #[test]
    fn removed_inode_stays_readable_through_existing_handle() {
        let fs = RamFs::new();
        let inode = fs.create("log").unwrap();
        inode.write_at(0, b"abc");
        assert!(fs.remove("log"));
        assert!(!fs.remove("log"));
        assert!(fs.find("log").is_none());

        let mut buf = [0u8; 3];
        assert_eq!(inode.read_at(0, &mut buf), 3);
        assert_eq!(&buf, b"abc");
    }
}
