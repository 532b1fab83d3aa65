//! # 系统调用模块
//!
//! 陷入处理程序从 v0 取出调用号、从 a0-a3 取出四个字参数后调用
//! [`syscall`]，返回值写回 v0。
//!
//! | 调用号 | 名称 | 参数 | 返回 |
//! |--------|------|------|------|
//! | 0 | halt | - | 非根进程调用时为 0 |
//! | 1 | exit | status | 不返回 |
//! | 2 | exec | name, argc, argv | 子进程 ID / -1 |
//! | 3 | join | pid, status 地址 | 1 / 0 / -1 |
//! | 4 | create | name | fd / -1 |
//! | 5 | open | name | fd / -1 |
//! | 6 | read | fd, buf, size | 字节数 / -1 |
//! | 7 | write | fd, buf, size | 字节数 / -1 |
//! | 8 | close | fd | 0 / -1 |
//! | 9 | unlink | name | 0 / -1 |
//!
//! 没有任何错误对象越过系统调用边界：所有失败都编码在返回的整数里。
//! 未知调用号视同非法陷入，调用者被终止。

mod fs;
mod process;

use crate::process::ProcessControlBlock;
use fs::*;
use log::warn;
use process::*;
use std::sync::Arc;

const SYSCALL_HALT: usize = 0;
const SYSCALL_EXIT: usize = 1;
const SYSCALL_EXEC: usize = 2;
const SYSCALL_JOIN: usize = 3;
const SYSCALL_CREATE: usize = 4;
const SYSCALL_OPEN: usize = 5;
const SYSCALL_READ: usize = 6;
const SYSCALL_WRITE: usize = 7;
const SYSCALL_CLOSE: usize = 8;
const SYSCALL_UNLINK: usize = 9;

/// 系统调用分发
pub fn syscall(process: &Arc<ProcessControlBlock>, syscall_id: usize, args: [i32; 4]) -> i32 {
    match syscall_id {
        SYSCALL_HALT => sys_halt(process),
        SYSCALL_EXIT => sys_exit(process, args[0]),
        SYSCALL_EXEC => sys_exec(process, args[0], args[1], args[2]),
        SYSCALL_JOIN => sys_join(process, args[0], args[1]),
        SYSCALL_CREATE => sys_create(process, args[0]),
        SYSCALL_OPEN => sys_open(process, args[0]),
        SYSCALL_READ => sys_read(process, args[0], args[1], args[2]),
        SYSCALL_WRITE => sys_write(process, args[0], args[1], args[2]),
        SYSCALL_CLOSE => sys_close(process, args[0]),
        SYSCALL_UNLINK => sys_unlink(process, args[0]),
        _ => {
            warn!(
                "[kernel] Unsupported syscall_id {} from pid {}, kernel killed it.",
                syscall_id,
                process.getpid()
            );
            process.kill()
        }
    }
}

/// 把寄存器中的非负字解释为地址、长度或下标
fn non_negative(value: i32) -> Option<usize> {
    usize::try_from(value).ok()
}
