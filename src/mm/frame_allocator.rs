//! # 物理页帧分配器模块
//!
//! 管理模拟机器的物理页帧池。所有进程共享同一个池，由内核注册表
//! 持有并显式传递给每个地址空间。
//!
//! ## 核心组件
//!
//! - [`FrameAllocator`] - 全局共享的页帧池
//! - [`FrameTracker`] - 页帧跟踪器，提供 RAII 自动释放
//!
//! ## 分配策略
//!
//! **栈式分配 (Stack Allocation)**：
//! - 从 `[0, num_phys_pages)` 按递增顺序分配
//! - 优先使用回收列表中的页帧（后进先出）
//! - 分配失败时返回 `None`，由调用者回滚
//!
//! **RAII 管理**：
//! - 分配时页帧被清零
//! - [`FrameTracker`] 离开作用域时页帧自动回到池中

use super::PhysPageNum;
use crate::machine::PhysicalMemory;
use crate::sync::UPSafeCell;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// 栈式页帧分配器
///
/// - `current`：下一个从未分配过的页号
/// - `end`：分配区间的结束页号（不包含）
/// - `recycled`：已释放页帧，LIFO 复用
struct StackFrameAllocator {
    current: usize,
    end: usize,
    recycled: Vec<usize>,
}

impl StackFrameAllocator {
    fn new(l: usize, r: usize) -> Self {
        Self {
            current: l,
            end: r,
            recycled: Vec::new(),
        }
    }

    fn alloc(&mut self) -> Option<PhysPageNum> {
        if let Some(ppn) = self.recycled.pop() {
            Some(ppn.into())
        } else if self.current == self.end {
            None
        } else {
            self.current += 1;
            Some((self.current - 1).into())
        }
    }

    /// ## Panics
    ///
    /// 释放从未分配过或已经释放过的页帧。
    fn dealloc(&mut self, ppn: PhysPageNum) {
        let ppn = ppn.0;
        if ppn >= self.current || self.recycled.contains(&ppn) {
            panic!("Frame ppn={:#x} has not been allocated", ppn);
        }
        self.recycled.push(ppn);
    }

    fn free_frames(&self) -> usize {
        self.end - self.current + self.recycled.len()
    }
}

/// 物理页帧池
///
/// 对并发的分配与释放是原子的：内部状态由 [`UPSafeCell`] 保护。
///
/// ## Examples
///
/// ```
/// use std::sync::Arc;
/// use userprog::machine::PhysicalMemory;
/// use userprog::mm::FrameAllocator;
///
/// let allocator = Arc::new(FrameAllocator::new(Arc::new(PhysicalMemory::new(4))));
/// let frame = allocator.frame_alloc().unwrap();
/// assert_eq!(allocator.free_frames(), 3);
/// drop(frame);
/// assert_eq!(allocator.free_frames(), 4);
/// ```
pub struct FrameAllocator {
    inner: UPSafeCell<StackFrameAllocator>,
    memory: Arc<PhysicalMemory>,
}

impl FrameAllocator {
    /// 以整个物理内存作为可分配区间创建页帧池
    pub fn new(memory: Arc<PhysicalMemory>) -> Self {
        Self {
            inner: UPSafeCell::new(StackFrameAllocator::new(0, memory.num_pages())),
            memory,
        }
    }

    /// 分配一个清零的物理页帧
    ///
    /// 池已耗尽时返回 `None`。
    pub fn frame_alloc(self: &Arc<Self>) -> Option<FrameTracker> {
        let ppn = self.inner.exclusive_access().alloc()?;
        self.memory.zero(ppn);
        Some(FrameTracker {
            ppn,
            allocator: self.clone(),
        })
    }

    /// 池中剩余的空闲页帧数
    pub fn free_frames(&self) -> usize {
        self.inner.exclusive_access().free_frames()
    }

    /// 页帧所在的物理内存
    pub fn memory(&self) -> &Arc<PhysicalMemory> {
        &self.memory
    }

    fn frame_dealloc(&self, ppn: PhysPageNum) {
        self.inner.exclusive_access().dealloc(ppn);
    }
}

/// 页帧跟踪器 (Frame Tracker)
///
/// 独占一个物理页帧，销毁时把页帧归还给分配它的池。
pub struct FrameTracker {
    pub ppn: PhysPageNum,
    allocator: Arc<FrameAllocator>,
}

impl Drop for FrameTracker {
    fn drop(&mut self) {
        self.allocator.frame_dealloc(self.ppn);
    }
}

impl Debug for FrameTracker {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("FrameTracker: PPN={:#x}", self.ppn.0))
    }
}
