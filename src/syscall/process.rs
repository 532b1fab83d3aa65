//! # 进程控制相关系统调用

use super::non_negative;
use crate::config::MAX_STRING_LENGTH;
use crate::machine::UserMemory;
use crate::process::{JoinStatus, ProcessControlBlock};
use log::{debug, info};
use std::sync::Arc;

/// 关机，只有 0 号进程有权执行，其他调用者得到 0
pub fn sys_halt(process: &Arc<ProcessControlBlock>) -> i32 {
    if process.getpid() != 0 {
        debug!("[kernel] halt ignored for pid {}", process.getpid());
        return 0;
    }
    info!("[kernel] halt requested by root process");
    process.kernel().terminate();
    process.kill()
}

/// 以 `status` 退出，不返回
pub fn sys_exit(process: &Arc<ProcessControlBlock>, status: i32) -> ! {
    process.exit(status)
}

/// 以 `argc` 个参数运行可执行文件 `name`，返回子进程 ID
///
/// `argv` 指向 `argc` 个 4 字节小端指针，每个指向一个以 0 结尾的参数。
pub fn sys_exec(process: &Arc<ProcessControlBlock>, name: i32, argc: i32, argv: i32) -> i32 {
    let (Some(name), Some(argc), Some(argv)) =
        (non_negative(name), non_negative(argc), non_negative(argv))
    else {
        debug!("[kernel] exec: invalid arguments");
        return -1;
    };
    let Some(name) = process.read_user_string(name, MAX_STRING_LENGTH) else {
        debug!("[kernel] exec: cannot read file name");
        return -1;
    };
    if !name.ends_with(process.kernel().config().executable_suffix.as_str()) {
        debug!("[kernel] exec: {} is not an executable", name);
        return -1;
    }

    let mut args = Vec::with_capacity(argc.min(MAX_STRING_LENGTH));
    for i in 0..argc {
        let mut pointer = [0u8; 4];
        let Some(slot) = i.checked_mul(4).and_then(|offset| argv.checked_add(offset)) else {
            return -1;
        };
        if process.read(slot, &mut pointer) != pointer.len() {
            debug!("[kernel] exec: cannot read argv[{}]", i);
            return -1;
        }
        let Some(arg) =
            process.read_user_string(u32::from_le_bytes(pointer) as usize, MAX_STRING_LENGTH)
        else {
            debug!("[kernel] exec: cannot read argument {}", i);
            return -1;
        };
        args.push(arg);
    }

    match process.exec(&name, &args) {
        Ok(child) => child.getpid() as i32,
        Err(e) => {
            debug!("[kernel] exec {} failed: {}", name, e);
            -1
        }
    }
}

/// 等待子进程结束并把它的退出状态写到 `status`
///
/// 返回 1 表示子进程正常退出且状态已写回；0 表示子进程被终止，或状态
/// 无法完整写回；-1 表示参数非法或 `pid` 不是调用者的子进程。
pub fn sys_join(process: &Arc<ProcessControlBlock>, pid: i32, status: i32) -> i32 {
    let (Some(pid), Some(status)) = (non_negative(pid), non_negative(status)) else {
        debug!("[kernel] join: invalid arguments");
        return -1;
    };
    match process.join(pid) {
        JoinStatus::NotChild => -1,
        JoinStatus::Killed => 0,
        JoinStatus::Exited(code) => {
            let bytes = code.to_le_bytes();
            if process.write(status, &bytes) == bytes.len() {
                1
            } else {
                debug!("[kernel] join: cannot write status of pid {}", pid);
                0
            }
        }
    }
}
