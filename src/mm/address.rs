//! # 地址类型
//!
//! 虚拟地址、虚拟页号与物理页号的新类型封装。模拟机器的地址都是
//! 32 位字，内核内部统一以 `usize` 存储。
//!
//! ```text
//! 虚拟地址:
//! ┌──────────────────────────┬────────────┐
//! │           VPN            │   Offset   │
//! │                          │  (10bit)   │
//! └──────────────────────────┴────────────┘
//! ```

use crate::config::{PAGE_SIZE, PAGE_SIZE_BITS};
use std::fmt::{self, Debug, Formatter};

/// 虚拟地址
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub struct VirtAddr(pub usize);

/// 虚拟页号
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub struct VirtPageNum(pub usize);

/// 物理页号
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub struct PhysPageNum(pub usize);

impl VirtAddr {
    /// 所在虚拟页号（向下取整）
    pub fn floor(&self) -> VirtPageNum {
        VirtPageNum(self.0 >> PAGE_SIZE_BITS)
    }

    /// 页内偏移
    pub fn page_offset(&self) -> usize {
        self.0 & (PAGE_SIZE - 1)
    }

    pub fn aligned(&self) -> bool {
        self.page_offset() == 0
    }
}

impl VirtPageNum {
    /// 页起始地址
    pub fn base(&self) -> VirtAddr {
        VirtAddr(self.0 << PAGE_SIZE_BITS)
    }
}

impl Debug for VirtAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("VA:{:#x}", self.0))
    }
}

impl Debug for VirtPageNum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("VPN:{:#x}", self.0))
    }
}

impl Debug for PhysPageNum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("PPN:{:#x}", self.0))
    }
}

impl From<usize> for VirtAddr {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

impl From<usize> for VirtPageNum {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

impl From<usize> for PhysPageNum {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

impl From<VirtAddr> for VirtPageNum {
    fn from(v: VirtAddr) -> Self {
        assert_eq!(v.page_offset(), 0);
        v.floor()
    }
}

impl From<VirtPageNum> for VirtAddr {
    fn from(v: VirtPageNum) -> Self {
        v.base()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_address_into_page_and_offset() {
        let va = VirtAddr(3 * PAGE_SIZE + 17);
        assert_eq!(va.floor(), VirtPageNum(3));
        assert_eq!(va.page_offset(), 17);
        assert!(!va.aligned());
        assert_eq!(VirtPageNum(3).base(), VirtAddr(3 * PAGE_SIZE));
    }
}
