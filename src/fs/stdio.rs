//! # 标准输入输出模块
//!
//! 控制台设备抽象以及建立在其上的标准输入输出文件。
//!
//! ## 核心组件
//!
//! - [`Console`] - 控制台设备接口
//! - [`HostConsole`] - 宿主进程的标准输入输出
//! - [`BufferConsole`] - 内存中的控制台，输入预先给定，输出被捕获
//! - [`Stdin`] - 标准输入，只读
//! - [`Stdout`] - 标准输出，只写
//!
//! 每个进程创建时得到一对新的 [`Stdin`]/[`Stdout`]，分别占据
//! 文件描述符 0 和 1，它们共享内核的同一个控制台。

use super::{File, FsError};
use crate::sync::UPSafeCell;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::Arc;

/// 控制台设备
pub trait Console: Send + Sync {
    /// 读取一个字节，当前没有可读数据时返回 `None`
    fn read_byte(&self) -> Option<u8>;
    /// 输出 `buf`，返回输出的字节数
    fn write(&self, buf: &[u8]) -> usize;
}

/// 宿主进程的标准输入输出
pub struct HostConsole;

impl Console for HostConsole {
    fn read_byte(&self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match std::io::stdin().read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    fn write(&self, buf: &[u8]) -> usize {
        let mut stdout = std::io::stdout().lock();
        match stdout.write_all(buf).and_then(|_| stdout.flush()) {
            Ok(()) => buf.len(),
            Err(_) => 0,
        }
    }
}

/// 内存控制台
///
/// ## Examples
///
/// ```
/// use userprog::fs::{BufferConsole, Console};
///
/// let console = BufferConsole::with_input(b"y");
/// assert_eq!(console.read_byte(), Some(b'y'));
/// assert_eq!(console.read_byte(), None);
/// console.write(b"ok");
/// assert_eq!(console.output(), b"ok");
/// ```
#[derive(Default)]
pub struct BufferConsole {
    input: UPSafeCell<VecDeque<u8>>,
    output: UPSafeCell<Vec<u8>>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(input: &[u8]) -> Self {
        Self {
            input: UPSafeCell::new(input.iter().copied().collect()),
            output: UPSafeCell::new(Vec::new()),
        }
    }

    /// 追加待读取的输入
    pub fn push_input(&self, input: &[u8]) {
        self.input.exclusive_access().extend(input);
    }

    /// 到目前为止的全部输出
    pub fn output(&self) -> Vec<u8> {
        self.output.exclusive_access().clone()
    }
}

impl Console for BufferConsole {
    fn read_byte(&self) -> Option<u8> {
        self.input.exclusive_access().pop_front()
    }

    fn write(&self, buf: &[u8]) -> usize {
        self.output.exclusive_access().extend_from_slice(buf);
        buf.len()
    }
}

/// 标准输入
///
/// 读取当前已有的输入，不等待更多输入到来。
pub struct Stdin {
    console: Arc<dyn Console>,
}

/// 标准输出
pub struct Stdout {
    console: Arc<dyn Console>,
}

impl Stdin {
    pub fn new(console: Arc<dyn Console>) -> Self {
        Self { console }
    }
}

impl Stdout {
    pub fn new(console: Arc<dyn Console>) -> Self {
        Self { console }
    }
}

impl File for Stdin {
    fn read(&self, buf: &mut [u8]) -> Result<usize, FsError> {
        let mut n = 0;
        while n < buf.len() {
            match self.console.read_byte() {
                Some(byte) => buf[n] = byte,
                None => break,
            }
            n += 1;
        }
        Ok(n)
    }

    fn write(&self, _buf: &[u8]) -> Result<usize, FsError> {
        Err(FsError::NotWritable)
    }

    fn name(&self) -> &str {
        "stdin"
    }
}

impl File for Stdout {
    fn read(&self, _buf: &mut [u8]) -> Result<usize, FsError> {
        Err(FsError::NotReadable)
    }

    fn write(&self, buf: &[u8]) -> Result<usize, FsError> {
        Ok(self.console.write(buf))
    }

    fn name(&self) -> &str {
        "stdout"
    }
}
