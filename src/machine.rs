//! # 模拟机器
//!
//! 用户程序运行所依赖的硬件抽象：平坦的物理内存、处理器接口
//! 以及处理器可能报告的异常类型。
//!
//! 处理器本身作为外部协作者，通过 [`Cpu`] trait 接入。内核在切换到
//! 某个进程时把该进程的 [`UserMemory`] 视图交给处理器，处理器对用户内存的
//! 每一次访问都经过该进程的地址转换表。

use crate::config::PAGE_SIZE;
use crate::mm::PhysPageNum;
use crate::sync::UPSafeCell;
use crate::trap::TrapContext;

/// 处理器异常
///
/// 除 [`Exception::Syscall`] 之外的异常都会导致当前进程被终止。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    /// 系统调用指令
    Syscall,
    /// 访问了没有有效映射的页
    PageFault,
    /// 快表缺失
    TlbMiss,
    /// 写只读页
    ReadOnly,
    /// 总线错误
    BusError,
    /// 地址未对齐
    AddressError,
    /// 算术溢出
    Overflow,
    /// 非法指令
    IllegalInstruction,
}

/// 进程用户内存视图
///
/// 所有地址都是虚拟地址，访问可能只完成一部分：返回值是实际传输的字节数。
pub trait UserMemory {
    /// 从虚拟地址 `vaddr` 读取最多 `buf.len()` 字节
    fn read(&self, vaddr: usize, buf: &mut [u8]) -> usize;
    /// 向虚拟地址 `vaddr` 写入最多 `buf.len()` 字节
    fn write(&self, vaddr: usize, buf: &[u8]) -> usize;
}

/// 陷入回调
///
/// 处理器在发生异常时调用，由内核处理后返回；若内核决定终止当前进程，
/// 回调不会返回。
pub type TrapHandler<'a> = dyn FnMut(&mut TrapContext, Exception) + 'a;

/// 处理器接口
///
/// `run` 从给定的寄存器上下文开始执行用户代码，直到用户代码结束。
/// 对于永不结束的程序，执行最终会经由 `trap` 回调离开（`exit` 或被终止）。
/// 如果 `run` 返回，说明程序执行到了末尾，内核将终止该进程。
pub trait Cpu: Send + Sync {
    fn run(&self, memory: &dyn UserMemory, cx: &mut TrapContext, trap: &mut TrapHandler<'_>);
}

/// 物理内存
///
/// 大小为 `num_pages * PAGE_SIZE` 字节的平坦字节数组，按页号寻址。
pub struct PhysicalMemory {
    num_pages: usize,
    bytes: UPSafeCell<Vec<u8>>,
}

impl PhysicalMemory {
    pub fn new(num_pages: usize) -> Self {
        Self {
            num_pages,
            bytes: UPSafeCell::new(vec![0; num_pages * PAGE_SIZE]),
        }
    }

    /// 物理页帧数量
    pub fn num_pages(&self) -> usize {
        self.num_pages
    }

    /// 从页帧 `ppn` 的页内偏移 `offset` 处读取 `buf.len()` 字节
    ///
    /// ## Panics
    ///
    /// 访问越过页边界时 panic，调用者负责按页切分。
    pub fn read(&self, ppn: PhysPageNum, offset: usize, buf: &mut [u8]) {
        let start = Self::locate(ppn, offset, buf.len());
        buf.copy_from_slice(&self.bytes.exclusive_access()[start..start + buf.len()]);
    }

    /// 向页帧 `ppn` 的页内偏移 `offset` 处写入 `buf`
    pub fn write(&self, ppn: PhysPageNum, offset: usize, buf: &[u8]) {
        let start = Self::locate(ppn, offset, buf.len());
        self.bytes.exclusive_access()[start..start + buf.len()].copy_from_slice(buf);
    }

    /// 将整页清零
    pub fn zero(&self, ppn: PhysPageNum) {
        let start = Self::locate(ppn, 0, PAGE_SIZE);
        self.bytes.exclusive_access()[start..start + PAGE_SIZE].fill(0);
    }

    fn locate(ppn: PhysPageNum, offset: usize, len: usize) -> usize {
        assert!(
            offset + len <= PAGE_SIZE,
            "physical access crosses page {:?}",
            ppn
        );
        ppn.0 * PAGE_SIZE + offset
    }
}
