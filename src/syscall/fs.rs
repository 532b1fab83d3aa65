//! # 文件读写相关系统调用
//!
//! 读写经由内核缓冲区中转：`read` 先从文件读入缓冲区再复制到用户内存，
//! `write` 先从用户内存复制到缓冲区再写入文件。缓冲区大小不超过调用者
//! 地址空间的大小，超出部分本来也无法传输。

use super::non_negative;
use crate::config::{MAX_FD, MAX_STRING_LENGTH};
use crate::fs::{File, OpenFlags};
use crate::machine::UserMemory;
use crate::process::ProcessControlBlock;
use log::debug;
use std::sync::Arc;

/// 创建（或截断）文件并打开，返回描述符
pub fn sys_create(process: &Arc<ProcessControlBlock>, name: i32) -> i32 {
    open_file(process, name, OpenFlags::CREATE)
}

/// 打开已有文件，返回描述符
pub fn sys_open(process: &Arc<ProcessControlBlock>, name: i32) -> i32 {
    open_file(process, name, OpenFlags::empty())
}

fn open_file(process: &Arc<ProcessControlBlock>, name: i32, flags: OpenFlags) -> i32 {
    let Some(name) = non_negative(name).and_then(|va| process.read_user_string(va, MAX_STRING_LENGTH))
    else {
        debug!("[kernel] open: cannot read file name");
        return -1;
    };
    if process.inner_exclusive_access().fd_table.len() == MAX_FD {
        debug!("[kernel] open: descriptor table of pid {} is full", process.getpid());
        return -1;
    }
    let Some(file) = process.kernel().fs().open(&name, flags) else {
        debug!("[kernel] open: {} failed", name);
        return -1;
    };
    match process.inner_exclusive_access().fd_table.alloc(file) {
        Some(fd) => fd as i32,
        None => -1,
    }
}

/// 取得描述符对应的文件以及调用者地址空间的大小
fn lookup(process: &ProcessControlBlock, fd: i32, size: i32) -> Option<(Arc<dyn File>, usize)> {
    let (Some(fd), Some(size)) = (non_negative(fd), non_negative(size)) else {
        debug!("[kernel] bad descriptor {} or size {}", fd, size);
        return None;
    };
    let inner = process.inner_exclusive_access();
    let Some(file) = inner.fd_table.get(fd) else {
        debug!("[kernel] descriptor {} is not open", fd);
        return None;
    };
    Some((file, size.min(inner.memory_set.size())))
}

/// 从文件读取至多 `size` 字节到用户缓冲区，返回复制到用户内存的字节数
pub fn sys_read(process: &Arc<ProcessControlBlock>, fd: i32, buf: i32, size: i32) -> i32 {
    let Some(buf) = non_negative(buf) else {
        return -1;
    };
    let Some((file, len)) = lookup(process, fd, size) else {
        return -1;
    };
    let mut scratch = vec![0u8; len];
    match file.read(&mut scratch) {
        Ok(n) => process.write(buf, &scratch[..n]) as i32,
        Err(e) => {
            debug!("[kernel] read from {}: {}", file.name(), e);
            -1
        }
    }
}

/// 把用户缓冲区中至多 `size` 字节写入文件，返回写入的字节数
///
/// 只有实际从用户内存复制出来的字节会被写入。
pub fn sys_write(process: &Arc<ProcessControlBlock>, fd: i32, buf: i32, size: i32) -> i32 {
    let Some(buf) = non_negative(buf) else {
        return -1;
    };
    let Some((file, len)) = lookup(process, fd, size) else {
        return -1;
    };
    let mut scratch = vec![0u8; len];
    let n = process.read(buf, &mut scratch);
    match file.write(&scratch[..n]) {
        Ok(written) => written as i32,
        Err(e) => {
            debug!("[kernel] write to {}: {}", file.name(), e);
            -1
        }
    }
}

/// 关闭描述符
pub fn sys_close(process: &Arc<ProcessControlBlock>, fd: i32) -> i32 {
    let closed = non_negative(fd)
        .is_some_and(|fd| process.inner_exclusive_access().fd_table.close(fd));
    if closed {
        0
    } else {
        debug!("[kernel] close: descriptor {} is not open", fd);
        -1
    }
}

/// 删除文件
///
/// 调用者自己仍打开着该文件时拒绝删除。只检查调用者自己的描述符表，
/// 其他进程打开的句柄不会阻止删除。
pub fn sys_unlink(process: &Arc<ProcessControlBlock>, name: i32) -> i32 {
    let Some(name) = non_negative(name).and_then(|va| process.read_user_string(va, MAX_STRING_LENGTH))
    else {
        debug!("[kernel] unlink: cannot read file name");
        return -1;
    };
    if process.inner_exclusive_access().fd_table.is_open(&name) {
        debug!("[kernel] unlink: {} should be closed first", name);
        return -1;
    }
    if !process.kernel().fs().remove(&name) {
        debug!("[kernel] unlink: {} does not exist", name);
        return -1;
    }
    0
}
