//! # 陷入处理模块
//!
//! 处理器在执行用户程序时遇到的每一个异常都交给 [`trap_handler`]：
//!
//! - **系统调用**：从 v0 取调用号、a0-a3 取参数，分发后把结果写回 v0，
//!   并让程序计数器越过陷入指令
//! - **其他异常**（缺页、只读、非法指令等）：终止当前进程，不记录退出状态
//!
//! 内核已经终止时，任何陷入都会结束发起它的执行上下文。

mod context;

pub use context::TrapContext;

use crate::config::{REG_A0, REG_A1, REG_A2, REG_A3, REG_V0};
use crate::machine::Exception;
use crate::process::ProcessControlBlock;
use crate::syscall::syscall;
use log::{debug, warn};
use std::sync::Arc;

/// 陷入处理入口
///
/// 只有系统调用会返回，其余情况当前执行上下文在此结束。
pub fn trap_handler(process: &Arc<ProcessControlBlock>, cx: &mut TrapContext, exception: Exception) {
    if process.kernel().is_terminated() {
        debug!("[kernel] trap from pid {} after kernel termination", process.getpid());
        process.kill();
    }
    match exception {
        Exception::Syscall => {
            let id = cx.x[REG_V0] as u32 as usize;
            let args = [cx.x[REG_A0], cx.x[REG_A1], cx.x[REG_A2], cx.x[REG_A3]];
            cx.x[REG_V0] = syscall(process, id, args);
            cx.advance_pc();
        }
        _ => {
            warn!(
                "[kernel] {:?} in application pid {} at {:#x}, kernel killed it.",
                exception,
                process.getpid(),
                cx.pc()
            );
            process.kill();
        }
    }
}
