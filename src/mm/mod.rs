//! # 内存管理模块
//!
//! ## 核心组件
//!
//! - [`address`] - 虚拟地址、虚拟页号与物理页号
//! - [`frame_allocator`] - 全局物理页帧池与 RAII 页帧跟踪器
//! - [`page_table`] - 线性地址转换表与按页切分的内存传输
//! - [`memory_set`] - 进程地址空间：分配、装入、参数布置与拆除
//!
//! ## 内存传输
//!
//! 内核不直接解引用用户地址。系统调用处理程序通过
//! [`MemorySet::read`] / [`MemorySet::write`] / [`MemorySet::read_string`]
//! 在用户虚拟内存与内核缓冲区之间复制数据，遇到无法转换的页时返回部分结果。

mod address;
mod frame_allocator;
mod memory_set;
mod page_table;

pub use address::{PhysPageNum, VirtAddr, VirtPageNum};
pub use frame_allocator::{FrameAllocator, FrameTracker};
pub use memory_set::{LoadError, LoadedProgram, MemorySet};
pub use page_table::{
    PTEFlags, PageTable, TranslationEntry, read_virtual_memory, read_virtual_string,
    write_virtual_memory,
};
