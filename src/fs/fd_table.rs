//! # 文件描述符表
//!
//! 每个进程一张固定容量的表，槽位要么为空，要么持有一个打开文件。
//! 分配总是选择下标最小的空槽位。

use super::File;
use crate::config::MAX_FD;
use std::sync::Arc;

pub struct FdTable {
    slots: [Option<Arc<dyn File>>; MAX_FD],
}

impl FdTable {
    /// 创建描述符表，0 号和 1 号槽位分别绑定标准输入和标准输出
    pub fn new(stdin: Arc<dyn File>, stdout: Arc<dyn File>) -> Self {
        let mut slots: [Option<Arc<dyn File>>; MAX_FD] = std::array::from_fn(|_| None);
        slots[0] = Some(stdin);
        slots[1] = Some(stdout);
        Self { slots }
    }

    /// 把文件放入最小的空槽位，表满时返回 `None`
    pub fn alloc(&mut self, file: Arc<dyn File>) -> Option<usize> {
        let fd = self.slots.iter().position(Option::is_none)?;
        self.slots[fd] = Some(file);
        Some(fd)
    }

    /// 取得描述符对应的文件
    pub fn get(&self, fd: usize) -> Option<Arc<dyn File>> {
        self.slots.get(fd)?.clone()
    }

    /// 关闭描述符并释放文件句柄；描述符越界或为空时返回 `false`
    pub fn close(&mut self, fd: usize) -> bool {
        self.slots.get_mut(fd).and_then(Option::take).is_some()
    }

    /// 本表中是否有以 `name` 打开的文件
    pub fn is_open(&self, name: &str) -> bool {
        self.slots.iter().flatten().any(|file| file.name() == name)
    }

    /// 关闭所有描述符
    pub fn close_all(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// 已占用的槽位数
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
