//! # 执行上下文
//!
//! 每个用户进程由一个宿主线程承载。线程入口把进程的初始寄存器交给
//! 内核的 [`Cpu`](crate::machine::Cpu)，处理器每遇到一个异常就回调
//! [`trap_handler`]。
//!
//! `exit` 与异常终止不会返回：它们在完成拆除后展开 (unwind) 回线程入口，
//! 由入口捕获并正常结束线程，宿主进程本身不会 panic。

use super::ProcessControlBlock;
use crate::kernel::KernelError;
use crate::machine::Exception;
use crate::trap::{TrapContext, trap_handler};
use log::{error, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// 执行上下文正常结束的展开载荷
struct ThreadFinish;

/// 为进程创建执行上下文
///
/// 初始寄存器：程序计数器指向入口，栈指针与 `argc`/`argv` 按装入结果设置，
/// 其余寄存器清零。线程创建成功即返回，执行独立进行。
pub fn run(process: &Arc<ProcessControlBlock>) -> Result<(), KernelError> {
    let (name, cx) = {
        let inner = process.inner_exclusive_access();
        let name = inner
            .executable
            .as_ref()
            .map_or_else(|| format!("pid-{}", process.getpid()), |image| image.name().to_string());
        let cx = TrapContext::app_init_context(
            inner.initial_pc,
            inner.initial_sp,
            inner.argc,
            inner.argv,
        );
        (name, cx)
    };
    let worker = process.clone();
    let handle = thread::Builder::new()
        .name(name)
        .spawn(move || run_user(worker, cx))?;
    *process.thread.exclusive_access() = Some(handle);
    Ok(())
}

fn run_user(process: Arc<ProcessControlBlock>, mut cx: TrapContext) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let cpu = process.kernel().cpu().clone();
        cpu.run(
            &*process,
            &mut cx,
            &mut |cx: &mut TrapContext, exception: Exception| trap_handler(&process, cx, exception),
        );
        warn!(
            "[kernel] application pid {} ran off its end, kernel killed it.",
            process.getpid()
        );
        process.kill();
    }));
    if let Err(payload) = result {
        if !payload.is::<ThreadFinish>() {
            error!("[kernel] pid {} panicked in kernel code", process.getpid());
            process.finish(None);
        }
    }
}

/// 结束当前执行上下文
pub(crate) fn exit_current() -> ! {
    panic::resume_unwind(Box::new(ThreadFinish))
}
