//! # 进程 ID 管理
//!
//! 进程标识符严格递增分配，永不回收。0 号保留给根进程，只能在
//! 尚未分配过任何标识符时取得。

/// 进程 ID 分配器
#[derive(Debug, Default)]
pub struct PidAllocator {
    current: usize,
}

impl PidAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 分配下一个进程 ID
    pub fn alloc(&mut self) -> usize {
        self.current += 1;
        self.current - 1
    }

    /// 分配根进程的 0 号 ID；已分配过任何 ID 时返回 `None`
    pub fn alloc_root(&mut self) -> Option<usize> {
        (self.current == 0).then(|| self.alloc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_and_root_is_first() {
        let mut pids = PidAllocator::new();
        assert_eq!(pids.alloc_root(), Some(0));
        assert_eq!(pids.alloc_root(), None);
        assert_eq!(pids.alloc(), 1);
        assert_eq!(pids.alloc(), 2);
    }
}
