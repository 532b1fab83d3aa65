//! # 可执行镜像加载器
//!
//! 解析 32 位小端 ELF 可执行文件，把每个 `PT_LOAD` 段视为一个"节"
//! (section)：
//!
//! - 起始虚拟页号 `first_vpn = p_vaddr / PAGE_SIZE`（段必须页对齐）
//! - 页数 `num_pages = ceil(p_memsz / PAGE_SIZE)`
//! - 段不可写时为只读节
//!
//! 地址空间构建器按节逐页调用 [`ElfImage::load_page`] 把内容装入物理页帧，
//! 文件中没有的部分（`.bss`）补零。
//!
//! 镜像持有打开它的文件句柄，直到镜像本身被释放。

use crate::config::PAGE_SIZE;
use crate::fs::{File, FsError};
use crate::machine::PhysicalMemory;
use crate::mm::PhysPageNum;
use std::sync::Arc;
use thiserror::Error;
use xmas_elf::header::{Class, Data};
use xmas_elf::program::Type;

/// 镜像解析错误
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to read image: {0}")]
    Io(#[from] FsError),
    #[error("malformed ELF: {0}")]
    Parse(&'static str),
    #[error("only 32-bit little-endian images are supported")]
    UnsupportedFormat,
    #[error("segment at {0:#x} is not page aligned")]
    Misaligned(u64),
    #[error("segment at {0:#x} exceeds the image file")]
    Truncated(u64),
}

/// 镜像中的一个可装入节
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub first_vpn: usize,
    pub num_pages: usize,
    pub read_only: bool,
    offset: usize,
    file_size: usize,
}

/// 已解析的可执行镜像
pub struct ElfImage {
    file: Arc<dyn File>,
    data: Vec<u8>,
    entry: usize,
    sections: Vec<Section>,
}

impl ElfImage {
    /// 从已打开的文件解析镜像
    ///
    /// 读取文件剩余的全部内容，解析失败时文件句柄随错误一起被释放。
    pub fn parse(file: Arc<dyn File>) -> Result<Self, ImageError> {
        let mut data = Vec::new();
        let mut chunk = [0u8; PAGE_SIZE];
        loop {
            let n = file.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
        }

        let elf = xmas_elf::ElfFile::new(&data).map_err(ImageError::Parse)?;
        if elf.header.pt1.class() != Class::ThirtyTwo || elf.header.pt1.data() != Data::LittleEndian
        {
            return Err(ImageError::UnsupportedFormat);
        }
        let entry = elf.header.pt2.entry_point() as usize;

        let mut sections = Vec::new();
        for ph in elf.program_iter() {
            if ph.get_type().map_err(ImageError::Parse)? != Type::Load || ph.mem_size() == 0 {
                continue;
            }
            let vaddr = ph.virtual_addr();
            if vaddr % PAGE_SIZE as u64 != 0 {
                return Err(ImageError::Misaligned(vaddr));
            }
            if ph.file_size() > ph.mem_size()
                || ph.offset().saturating_add(ph.file_size()) > data.len() as u64
            {
                return Err(ImageError::Truncated(vaddr));
            }
            sections.push(Section {
                first_vpn: (vaddr / PAGE_SIZE as u64) as usize,
                num_pages: (ph.mem_size() as usize).div_ceil(PAGE_SIZE),
                read_only: !ph.flags().is_write(),
                offset: ph.offset() as usize,
                file_size: ph.file_size() as usize,
            });
        }

        Ok(Self {
            file,
            data,
            entry,
            sections,
        })
    }

    /// 入口地址
    pub fn entry_point(&self) -> usize {
        self.entry
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// 镜像文件名
    pub fn name(&self) -> &str {
        self.file.name()
    }

    /// 把第 `section` 节的第 `page` 页装入物理页帧 `ppn`
    pub fn load_page(&self, section: usize, page: usize, ppn: PhysPageNum, memory: &PhysicalMemory) {
        let s = &self.sections[section];
        let mut buf = [0u8; PAGE_SIZE];
        let start = page * PAGE_SIZE;
        if start < s.file_size {
            let n = (s.file_size - start).min(PAGE_SIZE);
            let from = s.offset + start;
            buf[..n].copy_from_slice(&self.data[from..from + n]);
        }
        memory.write(ppn, 0, &buf);
    }
}
