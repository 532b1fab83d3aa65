//! # 地址转换表模块
//!
//! 每个进程一张线性页表：下标即虚拟页号，表项记录物理页号、有效位、
//! 只读位以及访问位和脏位。模拟处理器没有硬件页表遍历，内核代码对用户
//! 内存的每一次访问都通过本模块完成转换。
//!
//! ## 核心组件
//!
//! - [`PTEFlags`] - 表项标志位
//! - [`TranslationEntry`] - 单个虚拟页的映射记录
//! - [`PageTable`] - 线性页表
//! - [`read_virtual_memory()`] / [`write_virtual_memory()`] - 按页切分的内存传输
//! - [`read_virtual_string()`] - 读取以 0 结尾的用户字符串
//!
//! ## 部分传输语义
//!
//! 传输按页进行，遇到第一个无法转换的页即停止，返回已经传输的字节数，
//! 永远不会越过一个无法访问的页继续传输，也不会让内核崩溃：
//!
//! ```text
//!        vaddr                                 vaddr + len
//!          ↓                                        ↓
//! ┌────────┬──────────────┬──────────────┬──────────┐
//! │  page 3 (ok)          │  page 4 (ok) │  page 5 (invalid)
//! └────────┴──────────────┴──────────────┴──────────┘
//!          └────── transferred ──────────┘
//! ```

use super::{PhysPageNum, VirtAddr, VirtPageNum};
use crate::config::PAGE_SIZE;
use crate::machine::PhysicalMemory;
use bitflags::*;
use log::debug;

bitflags! {
    /// 表项标志位
    ///
    /// - **VALID**: 映射有效，物理页号只在该位为 1 时有意义
    /// - **READ_ONLY**: 只读页，写转换总是失败
    /// - **USED**: 页被成功访问过（读或写）
    /// - **DIRTY**: 页被成功写入过
    ///
    /// `USED` 与 `DIRTY` 只会被置位，不会被清除。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PTEFlags: u8 {
        const VALID = 1 << 0;
        const READ_ONLY = 1 << 1;
        const USED = 1 << 2;
        const DIRTY = 1 << 3;
    }
}

/// 转换表项 (Translation Entry)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationEntry {
    pub vpn: VirtPageNum,
    pub ppn: PhysPageNum,
    pub flags: PTEFlags,
}

impl TranslationEntry {
    /// 指定虚拟页的无效表项
    pub fn empty(vpn: VirtPageNum) -> Self {
        Self {
            vpn,
            ppn: PhysPageNum(0),
            flags: PTEFlags::empty(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.flags.contains(PTEFlags::VALID)
    }

    pub fn read_only(&self) -> bool {
        self.flags.contains(PTEFlags::READ_ONLY)
    }

    pub fn used(&self) -> bool {
        self.flags.contains(PTEFlags::USED)
    }

    pub fn dirty(&self) -> bool {
        self.flags.contains(PTEFlags::DIRTY)
    }
}

/// 线性页表
///
/// 表的容量固定为机器的物理页数；`page_count` 是当前持有有效映射的页数。
/// 查询只暴露 `[0, page_count)` 内的表项，即使底层数组更大，也不会返回
/// 拆除后残留的旧表项。
pub struct PageTable {
    entries: Vec<TranslationEntry>,
    page_count: usize,
}

impl PageTable {
    /// 创建容量为 `capacity` 个页的空页表
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: (0..capacity)
                .map(|vpn| TranslationEntry::empty(vpn.into()))
                .collect(),
            page_count: 0,
        }
    }

    /// 页表容量
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// 当前有效映射的页数
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// 查询表项，不检查权限，也不修改访问位
    pub fn lookup(&self, vpn: VirtPageNum) -> Option<&TranslationEntry> {
        if vpn.0 >= self.page_count {
            return None;
        }
        self.entries.get(vpn.0)
    }

    /// 转换虚拟页
    ///
    /// 表项无效、越界，或 `for_write` 时页为只读都会返回 `None`，此时表项
    /// 保持不变。成功时置 `USED`，写访问额外置 `DIRTY`。
    pub fn translate(&mut self, vpn: VirtPageNum, for_write: bool) -> Option<TranslationEntry> {
        if vpn.0 >= self.page_count {
            return None;
        }
        let entry = self.entries.get_mut(vpn.0)?;
        if !entry.is_valid() || (for_write && entry.read_only()) {
            return None;
        }
        entry.flags |= PTEFlags::USED;
        if for_write {
            entry.flags |= PTEFlags::DIRTY;
        }
        Some(*entry)
    }

    /// 该虚拟页是否已有有效映射（不受 `page_count` 边界限制）
    pub fn is_mapped(&self, vpn: VirtPageNum) -> bool {
        self.entries.get(vpn.0).is_some_and(|e| e.is_valid())
    }

    /// 建立映射，页计数加一
    ///
    /// ## Panics
    ///
    /// `vpn` 超出页表容量或已经映射。
    pub fn map(&mut self, vpn: VirtPageNum, ppn: PhysPageNum, read_only: bool) {
        let entry = &mut self.entries[vpn.0];
        assert!(!entry.is_valid(), "{:?} is mapped before mapping", vpn);
        let mut flags = PTEFlags::VALID;
        flags.set(PTEFlags::READ_ONLY, read_only);
        *entry = TranslationEntry { vpn, ppn, flags };
        self.page_count += 1;
    }

    /// 撤销映射，页计数减一
    pub fn unmap(&mut self, vpn: VirtPageNum) {
        let entry = &mut self.entries[vpn.0];
        assert!(entry.is_valid(), "{:?} is invalid before unmapping", vpn);
        *entry = TranslationEntry::empty(vpn);
        self.page_count -= 1;
    }

    /// 所有表项置为无效，页计数归零
    pub fn clear(&mut self) {
        for (vpn, entry) in self.entries.iter_mut().enumerate() {
            *entry = TranslationEntry::empty(vpn.into());
        }
        self.page_count = 0;
    }
}

/// 按页遍历 `[vaddr, vaddr + len)`，对每个可转换的页片段调用 `f`
///
/// `f` 的参数依次为物理页号、页内偏移和该片段在缓冲区中的范围。
/// 返回成功遍历的字节数。
fn for_each_page_slice(
    page_table: &mut PageTable,
    vaddr: usize,
    len: usize,
    for_write: bool,
    mut f: impl FnMut(PhysPageNum, usize, std::ops::Range<usize>),
) -> usize {
    let mut done = 0;
    while done < len {
        let Some(current) = vaddr.checked_add(done) else {
            break;
        };
        let va = VirtAddr::from(current);
        let Some(entry) = page_table.translate(va.floor(), for_write) else {
            debug!(
                "[kernel] cannot translate {:?} for {}",
                va,
                if for_write { "write" } else { "read" }
            );
            break;
        };
        let offset = va.page_offset();
        let amount = (len - done).min(PAGE_SIZE - offset);
        f(entry.ppn, offset, done..done + amount);
        done += amount;
    }
    done
}

/// 从用户虚拟内存 `vaddr` 处读取到 `buf`，返回读取的字节数
pub fn read_virtual_memory(
    page_table: &mut PageTable,
    memory: &PhysicalMemory,
    vaddr: usize,
    buf: &mut [u8],
) -> usize {
    let len = buf.len();
    for_each_page_slice(page_table, vaddr, len, false, |ppn, offset, range| {
        memory.read(ppn, offset, &mut buf[range]);
    })
}

/// 将 `buf` 写入用户虚拟内存 `vaddr` 处，返回写入的字节数
///
/// 只读页被视为无法转换，传输在该页之前停止。
pub fn write_virtual_memory(
    page_table: &mut PageTable,
    memory: &PhysicalMemory,
    vaddr: usize,
    buf: &[u8],
) -> usize {
    for_each_page_slice(page_table, vaddr, buf.len(), true, |ppn, offset, range| {
        memory.write(ppn, offset, &buf[range]);
    })
}

/// 读取以 0 结尾的用户字符串
///
/// 最多读取 `max_length + 1` 字节并在其中查找结尾 0。找不到结尾 0（包括
/// 读取中途遇到无法转换的页）时返回 `None`。不是合法 UTF-8 的字节
/// 以替换字符解码。
pub fn read_virtual_string(
    page_table: &mut PageTable,
    memory: &PhysicalMemory,
    vaddr: usize,
    max_length: usize,
) -> Option<String> {
    let mut bytes = vec![0u8; max_length + 1];
    let read = read_virtual_memory(page_table, memory, vaddr, &mut bytes);
    let Some(end) = bytes[..read].iter().position(|&b| b == 0) else {
        debug!("[kernel] no terminator within {} bytes at {:#x}", read, vaddr);
        return None;
    };
    Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
}
