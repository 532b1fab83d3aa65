use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::Mutex;

/// 内存文件的索引节点
///
/// 保存文件内容，并统计当前有多少个打开的句柄引用它。
/// 句柄计数只用于观测，不影响读写语义。
pub struct Inode {
    data: Mutex<Vec<u8>>,
    open_handles: AtomicUsize,
}

impl Inode {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(Vec::new()),
            open_handles: AtomicUsize::new(0),
        }
    }

    /// 从 `offset` 开始读取数据到 `buf`，返回实际读取的字节数
    ///
    /// 偏移量超出文件末尾时返回 0。
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        let data = self.data.lock();
        if offset >= data.len() {
            return 0;
        }
        let len = buf.len().min(data.len() - offset);
        buf[..len].copy_from_slice(&data[offset..offset + len]);
        len
    }

    /// 从 `offset` 开始写入 `buf`，必要时扩展文件
    ///
    /// 偏移量之前的空洞用 0 填充，总是写入全部字节。
    pub fn write_at(&self, offset: usize, buf: &[u8]) -> usize {
        let mut data = self.data.lock();
        let end = offset + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[offset..end].copy_from_slice(buf);
        buf.len()
    }

    /// 截断文件为空
    pub fn clear(&self) {
        self.data.lock().clear();
    }

    pub fn size(&self) -> usize {
        self.data.lock().len()
    }

    /// 登记一个新打开的句柄
    pub fn open(&self) {
        self.open_handles.fetch_add(1, Ordering::SeqCst);
    }

    /// 注销一个句柄
    pub fn close(&self) {
        let prev = self.open_handles.fetch_sub(1, Ordering::SeqCst);
        assert!(prev > 0, "inode closed more times than opened");
    }

    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }
}

impl Default for Inode {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_past_end_fills_gap_with_zeros() {
        let inode = Inode::new();
        assert_eq!(inode.write_at(4, b"xy"), 2);
        assert_eq!(inode.size(), 6);

        let mut buf = [0xffu8; 8];
        assert_eq!(inode.read_at(0, &mut buf), 6);
        assert_eq!(&buf[..6], &[0, 0, 0, 0, b'x', b'y']);
        assert_eq!(inode.read_at(6, &mut buf), 0);
    }

    #[test]
    fn handle_count_tracks_open_and_close() {
        let inode = Inode::new();
        inode.open();
        inode.open();
        inode.close();
        assert_eq!(inode.open_handles(), 1);
        inode.clear();
        assert_eq!(inode.size(), 0);
    }
}
