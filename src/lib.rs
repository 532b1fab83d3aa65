//! # NimlothOS 用户程序支持
//!
//! 在模拟单处理器机器上为用户程序提供隔离的虚拟地址空间、进程生命周期
//! 管理以及一组类 POSIX 的系统调用（进程控制与文件 I/O）。
//!
//! ## 模块组织
//!
//! - [`config`] - 页大小、物理内存规模等配置
//! - [`log`] - 日志系统
//! - [`sync`] - 同步原语
//! - [`machine`] - 模拟机器：物理内存、处理器接口与异常类型
//! - [`mm`] - 页帧分配、地址转换表、地址空间与内存传输
//! - [`loader`] - 可执行镜像解析
//! - [`fs`] - 文件抽象、控制台与文件描述符表
//! - [`process`] - 进程控制块与生命周期
//! - [`syscall`] - 系统调用分发与处理
//! - [`trap`] - 陷入上下文与陷入处理
//! - [`kernel`] - 内核注册表，将以上组件装配在一起
//!
//! ## 启动流程
//!
//! ```ignore
//! let kernel = Kernel::new(config, fs, console, cpu);
//! kernel.run_root("shell.coff", &[])?;
//! kernel.wait_for_termination();
//! ```

pub mod config;
pub mod fs;
pub mod kernel;
pub mod loader;
pub mod log;
pub mod machine;
pub mod mm;
pub mod process;
pub mod sync;
pub mod syscall;
pub mod trap;

pub use kernel::{Kernel, KernelError};
