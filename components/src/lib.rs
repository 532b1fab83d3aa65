#![cfg_attr(not(test), no_std)]

//! # NimlothOS 组件系统
//!
//! 提供操作系统各种组件的模块化实现。当前包含供用户程序子系统使用的
//! 内存文件系统 [`ram_fs`]。

extern crate alloc;

pub mod ram_fs;

// 重新导出常用类型
pub use ram_fs::{Inode, RamFs};
