//! # 内核配置
//!
//! 定义用户程序子系统使用的各种配置参数，包括模拟机器的页大小、
//! 物理内存规模、用户栈大小、文件描述符表容量以及陷入 ABI 的寄存器编号。
//!
//! 编译期常量给出默认值，运行期通过 [`KernelConfig`] 调整。

use log::warn;

/// 页面大小 (1KB)
///
/// 模拟处理器的基本页面大小，虚拟页和物理页帧大小一致。
pub const PAGE_SIZE: usize = 0x400;

/// 页面大小的位数 (10 位)
pub const PAGE_SIZE_BITS: usize = 10;

/// 默认物理页帧数量
pub const NUM_PHYS_PAGES: usize = 64;

/// 默认用户栈页数
pub const USER_STACK_PAGES: usize = 8;

/// 每个进程文件描述符表的容量
pub const MAX_FD: usize = 16;

/// 从用户空间读取文件名、参数等字符串时允许的最大长度（不含结尾 0）
pub const MAX_STRING_LENGTH: usize = 256;

/// 可执行文件名必须包含的后缀
pub const EXECUTABLE_SUFFIX: &str = ".coff";

/// 用户寄存器数量
pub const NUM_USER_REGISTERS: usize = 38;

/// 系统调用号与返回值寄存器 (v0)
pub const REG_V0: usize = 2;
/// 第一个参数寄存器 (a0)
pub const REG_A0: usize = 4;
/// 第二个参数寄存器 (a1)
pub const REG_A1: usize = 5;
/// 第三个参数寄存器 (a2)
pub const REG_A2: usize = 6;
/// 第四个参数寄存器 (a3)
pub const REG_A3: usize = 7;
/// 栈指针寄存器
pub const REG_SP: usize = 29;
/// 程序计数器
pub const REG_PC: usize = 34;
/// 下一条指令地址
pub const REG_NEXT_PC: usize = 35;

/// 运行期内核配置
///
/// ## Examples
///
/// ```
/// use userprog::config::{KernelConfig, USER_STACK_PAGES};
///
/// let config = KernelConfig {
///     num_phys_pages: 16,
///     ..KernelConfig::default()
/// };
/// assert_eq!(config.stack_pages, USER_STACK_PAGES);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// 模拟机器的物理页帧数量，同时也是每个进程页表的容量
    pub num_phys_pages: usize,
    /// 每个进程的用户栈页数
    pub stack_pages: usize,
    /// `exec` 接受的可执行文件名后缀
    pub executable_suffix: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            num_phys_pages: NUM_PHYS_PAGES,
            stack_pages: USER_STACK_PAGES,
            executable_suffix: String::from(EXECUTABLE_SUFFIX),
        }
    }
}

impl KernelConfig {
    /// 从环境变量读取配置
    ///
    /// ## 环境变量
    ///
    /// - `NUM_PHYS_PAGES` - 物理页帧数量
    /// - `STACK_PAGES` - 用户栈页数
    ///
    /// 未设置或无法解析的变量保留默认值，解析失败时输出警告。
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(pages) = env_usize("NUM_PHYS_PAGES") {
            config.num_phys_pages = pages;
        }
        if let Some(pages) = env_usize("STACK_PAGES") {
            config.stack_pages = pages;
        }
        config
    }
}

fn env_usize(key: &str) -> Option<usize> {
    let value = std::env::var(key).ok()?;
    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("[kernel] ignoring malformed {}={:?}", key, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_matches_its_bit_width() {
        assert_eq!(1 << PAGE_SIZE_BITS, PAGE_SIZE);
    }

    #[test]
    fn defaults_come_from_constants() {
        let config = KernelConfig::default();
        assert_eq!(config.num_phys_pages, NUM_PHYS_PAGES);
        assert_eq!(config.stack_pages, USER_STACK_PAGES);
        assert_eq!(config.executable_suffix, ".coff");
    }
}
