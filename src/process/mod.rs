//! # 进程管理模块
//!
//! ## 核心组件
//!
//! - [`ProcessControlBlock`] - 进程控制块：地址空间、描述符表与进程树链接
//! - [`PidAllocator`] - 递增的进程 ID 分配器
//! - [`processor`] - 执行上下文：为进程创建宿主线程并运行用户代码
//!
//! ## 进程生命周期
//!
//! ```text
//! Created ──load──→ Loaded ──run──→ Running ──exit/kill──→ Exited ──join──→ Reaped
//! ```
//!
//! - 0 号进程（根进程）退出时整个内核终止，且只有它能执行 `halt`
//! - 父进程退出时子进程被"孤立"：父链接被清除，子进程继续运行
//! - `join` 是整个子系统唯一的阻塞点

mod pid;
mod process;
pub mod processor;

pub use pid::PidAllocator;
pub use process::{JoinStatus, ProcessControlBlock, ProcessControlBlockInner};
