//! # 进程控制块
//!
//! [`ProcessControlBlock`] 聚合一个用户进程的全部内核状态，并实现
//! 进程生命周期中的各个操作：装入、创建子进程、退出、被终止与等待子进程。
//!
//! ## 加锁顺序
//!
//! - 同时持有两个进程的 `inner` 时，总是先父后子
//! - 子进程在向父进程的退出状态表写入之前，先释放自己的 `inner`
//! - 阻塞等待子线程结束时不持有任何锁

use super::processor;
use crate::fs::{FdTable, Stdin, Stdout};
use crate::kernel::{Kernel, KernelError};
use crate::loader::ElfImage;
use crate::machine::UserMemory;
use crate::mm::{LoadError, MemorySet};
use crate::sync::UPSafeCell;
use log::{debug, info};
use parking_lot::MutexGuard;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

/// `join` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStatus {
    /// 不是调用者仍然链接着的直接子进程
    NotChild,
    /// 子进程已结束，但没有经由 `exit` 留下退出状态（被内核终止）
    Killed,
    /// 子进程调用 `exit` 时给出的状态
    Exited(i32),
}

/// 进程控制块 (Process Control Block)
pub struct ProcessControlBlock {
    pid: usize,
    kernel: Arc<Kernel>,
    inner: UPSafeCell<ProcessControlBlockInner>,
    /// 子进程 ID 到退出状态的映射，由子进程写入、`join` 取走
    exit_status: UPSafeCell<BTreeMap<usize, i32>>,
    /// 执行上下文，首次运行时创建
    pub(super) thread: UPSafeCell<Option<JoinHandle<()>>>,
}

/// 进程控制块的可变部分
pub struct ProcessControlBlockInner {
    pub memory_set: MemorySet,
    pub fd_table: FdTable,
    /// 父进程的弱引用，父进程退出或回收本进程时清除
    pub parent: Option<Weak<ProcessControlBlock>>,
    pub children: Vec<Arc<ProcessControlBlock>>,
    /// 已装入的镜像，持有可执行文件直到拆除
    pub executable: Option<ElfImage>,
    pub initial_pc: usize,
    pub initial_sp: usize,
    pub argc: usize,
    pub argv: usize,
    /// 已经退出或被终止
    pub exited: bool,
}

impl ProcessControlBlock {
    /// 创建处于 Created 状态的进程：空地址空间，0/1 号描述符绑定标准输入输出
    pub(crate) fn new(kernel: &Arc<Kernel>, pid: usize) -> Arc<Self> {
        let fd_table = FdTable::new(
            Arc::new(Stdin::new(kernel.console().clone())),
            Arc::new(Stdout::new(kernel.console().clone())),
        );
        Arc::new(Self {
            pid,
            kernel: kernel.clone(),
            inner: UPSafeCell::new(ProcessControlBlockInner {
                memory_set: MemorySet::new(kernel.frame_allocator().clone()),
                fd_table,
                parent: None,
                children: Vec::new(),
                executable: None,
                initial_pc: 0,
                initial_sp: 0,
                argc: 0,
                argv: 0,
                exited: false,
            }),
            exit_status: UPSafeCell::new(BTreeMap::new()),
            thread: UPSafeCell::new(None),
        })
    }

    pub fn getpid(&self) -> usize {
        self.pid
    }

    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    pub fn inner_exclusive_access(&self) -> MutexGuard<'_, ProcessControlBlockInner> {
        self.inner.exclusive_access()
    }

    /// 仍然链接着的子进程 ID
    pub fn children_pids(&self) -> Vec<usize> {
        let inner = self.inner.exclusive_access();
        inner.children.iter().map(|child| child.pid).collect()
    }

    pub fn is_exited(&self) -> bool {
        self.inner.exclusive_access().exited
    }

    /// 装入可执行文件并布置参数，进入 Loaded 状态
    pub fn load(&self, name: &str, args: &[String]) -> Result<(), LoadError> {
        let mut inner = self.inner.exclusive_access();
        let loaded = inner.memory_set.load(
            self.kernel.fs().as_ref(),
            name,
            args,
            self.kernel.config().stack_pages,
        )?;
        inner.initial_pc = loaded.entry;
        inner.initial_sp = loaded.sp;
        inner.argc = loaded.argc;
        inner.argv = loaded.argv;
        inner.executable = Some(loaded.image);
        Ok(())
    }

    /// 拆除地址空间：归还全部页帧，关闭全部描述符，释放可执行镜像
    pub fn unload(&self) {
        let mut inner = self.inner.exclusive_access();
        inner.memory_set.release_all();
        inner.fd_table.close_all();
        inner.executable = None;
    }

    /// 创建并运行子进程
    ///
    /// 子进程在开始运行之前就已链接进进程树，因此它立即退出时也总能
    /// 找到父进程。
    pub fn exec(self: &Arc<Self>, name: &str, args: &[String]) -> Result<Arc<Self>, KernelError> {
        let child = Self::new(&self.kernel, self.kernel.alloc_pid());
        child.load(name, args)?;
        {
            let mut inner = self.inner.exclusive_access();
            child.inner.exclusive_access().parent = Some(Arc::downgrade(self));
            inner.children.push(child.clone());
        }
        if let Err(e) = child.run() {
            self.inner
                .exclusive_access()
                .children
                .retain(|c| !Arc::ptr_eq(c, &child));
            child.unload();
            return Err(e);
        }
        info!("[kernel] pid {} exec {} as pid {}", self.pid, name, child.pid);
        Ok(child)
    }

    /// 为进程创建执行上下文并开始运行
    pub fn run(self: &Arc<Self>) -> Result<(), KernelError> {
        processor::run(self)
    }

    /// 以 `status` 退出，不会返回
    pub fn exit(self: &Arc<Self>, status: i32) -> ! {
        self.finish(Some(status));
        processor::exit_current()
    }

    /// 异常终止，不记录退出状态，不会返回
    pub fn kill(self: &Arc<Self>) -> ! {
        self.finish(None);
        processor::exit_current()
    }

    /// 进入 Exited 状态
    ///
    /// 记录退出状态（父进程仍然链接时）、拆除地址空间、孤立所有子进程。
    /// 0 号进程结束时终止整个内核。重复调用没有效果。
    pub(crate) fn finish(&self, status: Option<i32>) {
        let parent = {
            let mut inner = self.inner.exclusive_access();
            if inner.exited {
                return;
            }
            inner.exited = true;
            inner.parent.as_ref().and_then(Weak::upgrade)
        };
        match (parent, status) {
            (Some(parent), Some(status)) => {
                parent.exit_status.exclusive_access().insert(self.pid, status);
            }
            (None, Some(_)) => debug!("[kernel] pid {} is an orphan, status dropped", self.pid),
            _ => {}
        }

        self.unload();
        let children = std::mem::take(&mut self.inner.exclusive_access().children);
        for child in children {
            child.inner.exclusive_access().parent = None;
        }
        match status {
            Some(status) => info!("[kernel] pid {} exited with status {}", self.pid, status),
            None => info!("[kernel] pid {} was killed", self.pid),
        }

        if self.pid == 0 {
            self.kernel.terminate();
        }
    }

    /// 等待子进程 `pid` 结束并回收它
    ///
    /// 阻塞直到子进程的执行上下文结束，然后清除子进程的父链接、
    /// 把它移出子进程列表，并取走它的退出状态。
    pub fn join(self: &Arc<Self>, pid: usize) -> JoinStatus {
        let child = {
            let inner = self.inner.exclusive_access();
            inner.children.iter().find(|c| c.pid == pid).cloned()
        };
        let Some(child) = child else {
            debug!("[kernel] pid {} is not a child of pid {}", pid, self.pid);
            return JoinStatus::NotChild;
        };

        let handle = child.thread.exclusive_access().take();
        if let Some(handle) = handle {
            // 执行上下文的异常已在线程入口处理
            let _ = handle.join();
        }

        {
            let mut inner = self.inner.exclusive_access();
            child.inner.exclusive_access().parent = None;
            inner.children.retain(|c| !Arc::ptr_eq(c, &child));
        }
        match self.exit_status.exclusive_access().remove(&pid) {
            Some(status) => JoinStatus::Exited(status),
            None => {
                debug!("[kernel] pid {} left no exit status", pid);
                JoinStatus::Killed
            }
        }
    }

    /// 读取以 0 结尾的用户字符串
    pub fn read_user_string(&self, vaddr: usize, max_length: usize) -> Option<String> {
        self.inner
            .exclusive_access()
            .memory_set
            .read_string(vaddr, max_length)
    }
}

impl UserMemory for ProcessControlBlock {
    fn read(&self, vaddr: usize, buf: &mut [u8]) -> usize {
        self.inner.exclusive_access().memory_set.read(vaddr, buf)
    }

    fn write(&self, vaddr: usize, buf: &[u8]) -> usize {
        self.inner.exclusive_access().memory_set.write(vaddr, buf)
    }
}
