//! # 内核注册表
//!
//! [`Kernel`] 集中持有用户程序子系统的全部共享状态：配置、物理内存、
//! 页帧池、进程 ID 分配器、文件系统、控制台、处理器以及终止标志。
//! 它被显式构造并以 `Arc<Kernel>` 的形式传给每个进程，不存在隐藏的
//! 全局变量，便于在测试中各自构造独立的内核。
//!
//! ## Examples
//!
//! ```ignore
//! let kernel = Kernel::new(KernelConfig::from_env(), fs, Arc::new(HostConsole), cpu);
//! kernel.run_root("sh.coff", &[])?;
//! kernel.wait_for_termination();
//! ```

use crate::config::KernelConfig;
use crate::fs::{Console, FileSystem};
use crate::machine::{Cpu, PhysicalMemory};
use crate::mm::{FrameAllocator, LoadError};
use crate::process::{PidAllocator, ProcessControlBlock};
use crate::sync::UPSafeCell;
use log::info;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use thiserror::Error;

/// 内核错误
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("root process already exists")]
    RootExists,
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("failed to spawn execution context: {0}")]
    Spawn(#[from] std::io::Error),
}

/// 内核注册表
pub struct Kernel {
    config: KernelConfig,
    memory: Arc<PhysicalMemory>,
    frame_allocator: Arc<FrameAllocator>,
    pid_allocator: UPSafeCell<PidAllocator>,
    fs: Arc<dyn FileSystem>,
    console: Arc<dyn Console>,
    cpu: Arc<dyn Cpu>,
    terminated: Mutex<bool>,
    terminated_cond: Condvar,
}

impl Kernel {
    pub fn new(
        config: KernelConfig,
        fs: Arc<dyn FileSystem>,
        console: Arc<dyn Console>,
        cpu: Arc<dyn Cpu>,
    ) -> Arc<Self> {
        let memory = Arc::new(PhysicalMemory::new(config.num_phys_pages));
        let frame_allocator = Arc::new(FrameAllocator::new(memory.clone()));
        info!(
            "[kernel] {} physical pages, {} stack pages per process",
            config.num_phys_pages, config.stack_pages
        );
        Arc::new(Self {
            config,
            memory,
            frame_allocator,
            pid_allocator: UPSafeCell::new(PidAllocator::new()),
            fs,
            console,
            cpu,
            terminated: Mutex::new(false),
            terminated_cond: Condvar::new(),
        })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn memory(&self) -> &Arc<PhysicalMemory> {
        &self.memory
    }

    pub fn frame_allocator(&self) -> &Arc<FrameAllocator> {
        &self.frame_allocator
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn console(&self) -> &Arc<dyn Console> {
        &self.console
    }

    pub fn cpu(&self) -> &Arc<dyn Cpu> {
        &self.cpu
    }

    /// 分配一个新的进程 ID
    pub fn alloc_pid(&self) -> usize {
        self.pid_allocator.exclusive_access().alloc()
    }

    /// 创建 0 号根进程，它没有父进程
    ///
    /// 一旦分配过任何进程 ID 就会失败。
    pub fn spawn_root(self: &Arc<Self>) -> Result<Arc<ProcessControlBlock>, KernelError> {
        let pid = self
            .pid_allocator
            .exclusive_access()
            .alloc_root()
            .ok_or(KernelError::RootExists)?;
        Ok(ProcessControlBlock::new(self, pid))
    }

    /// 创建、装入并运行根进程
    pub fn run_root(
        self: &Arc<Self>,
        name: &str,
        args: &[String],
    ) -> Result<Arc<ProcessControlBlock>, KernelError> {
        let root = self.spawn_root()?;
        root.load(name, args)?;
        root.run()?;
        info!("[kernel] root process running {}", name);
        Ok(root)
    }

    /// 终止内核并唤醒所有等待者
    pub fn terminate(&self) {
        let mut terminated = self.terminated.lock();
        if !*terminated {
            info!("[kernel] terminating");
            *terminated = true;
            self.terminated_cond.notify_all();
        }
    }

    pub fn is_terminated(&self) -> bool {
        *self.terminated.lock()
    }

    /// 阻塞直到内核终止
    pub fn wait_for_termination(&self) {
        let mut terminated = self.terminated.lock();
        while !*terminated {
            self.terminated_cond.wait(&mut terminated);
        }
    }
}
