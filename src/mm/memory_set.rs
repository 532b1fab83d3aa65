//! # 地址空间模块
//!
//! [`MemorySet`] 是一个进程的完整地址空间：页表加上它所占有的物理页帧。
//! 负责按页分配与回滚、装入可执行镜像、布置参数块，以及退出时的拆除。
//!
//! ## 地址空间布局
//!
//! 所有区域从虚拟页 0 开始连续排列：
//!
//! ```text
//! ┌─────────────────────┐ page_count * PAGE_SIZE
//! │     参数页 (1 页)    │ <- argv 指针表 + 以 0 结尾的参数字符串
//! ├─────────────────────┤ <- 初始栈指针
//! │     用户栈           │    stack_pages 页，向下增长
//! ├─────────────────────┤
//! │   镜像各节           │    节必须从页 0 开始首尾相接
//! └─────────────────────┘ 0
//! ```
//!
//! ## 错误处理
//!
//! 装入过程中的任何失败都会释放已经分配的全部页帧，地址空间回到空状态。

use super::page_table::{read_virtual_memory, read_virtual_string, write_virtual_memory};
use super::{FrameAllocator, FrameTracker, PageTable, TranslationEntry, VirtPageNum};
use crate::config::PAGE_SIZE;
use crate::fs::{FileSystem, OpenFlags};
use crate::loader::{ElfImage, ImageError};
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// 地址空间构建错误
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open executable {0}")]
    Open(String),
    #[error("corrupt executable: {0}")]
    Image(#[from] ImageError),
    #[error("fragmented executable: section at {found:?}, expected {expected:?}")]
    Fragmented {
        found: VirtPageNum,
        expected: VirtPageNum,
    },
    #[error("arguments need {0} bytes, more than one page")]
    ArgumentsTooLong(usize),
    #[error("out of physical frames")]
    OutOfFrames,
    #[error("{0:?} is beyond the page table")]
    OutOfRange(VirtPageNum),
    #[error("{0:?} is already mapped")]
    AlreadyMapped(VirtPageNum),
    #[error("address space needs {0} pages, more than physical memory")]
    TooLarge(usize),
}

/// 装入完成后的程序状态
pub struct LoadedProgram {
    /// 已解析的镜像，持有可执行文件句柄直到进程拆除
    pub image: ElfImage,
    /// 入口地址
    pub entry: usize,
    /// 初始栈指针
    pub sp: usize,
    pub argc: usize,
    /// 参数指针表的虚拟地址
    pub argv: usize,
}

/// 进程地址空间
pub struct MemorySet {
    page_table: PageTable,
    frames: BTreeMap<VirtPageNum, FrameTracker>,
    allocator: Arc<FrameAllocator>,
}

impl MemorySet {
    /// 创建空地址空间，页表容量等于机器的物理页数
    pub fn new(allocator: Arc<FrameAllocator>) -> Self {
        Self {
            page_table: PageTable::new(allocator.memory().num_pages()),
            frames: BTreeMap::new(),
            allocator,
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_table.page_count()
    }

    /// 地址空间的字节大小
    pub fn size(&self) -> usize {
        self.page_count() * PAGE_SIZE
    }

    pub fn translate(&mut self, vpn: VirtPageNum, for_write: bool) -> Option<TranslationEntry> {
        self.page_table.translate(vpn, for_write)
    }

    /// 为 `[start, start + count)` 分配物理页帧
    ///
    /// 要么全部成功，要么什么都不改变：任何一页失败（页帧耗尽、超出页表
    /// 容量或该页已映射）时，本次调用已经得到的页帧全部归还，对应表项
    /// 恢复无效，页计数回退。
    pub fn allocate(
        &mut self,
        start: VirtPageNum,
        count: usize,
        read_only: bool,
    ) -> Result<(), LoadError> {
        let mut granted = Vec::with_capacity(count);
        for i in 0..count {
            let vpn = VirtPageNum(start.0 + i);
            let frame = if vpn.0 >= self.page_table.capacity() {
                Err(LoadError::OutOfRange(vpn))
            } else if self.page_table.is_mapped(vpn) {
                Err(LoadError::AlreadyMapped(vpn))
            } else {
                self.allocator.frame_alloc().ok_or(LoadError::OutOfFrames)
            };
            match frame {
                Ok(frame) => {
                    self.page_table.map(vpn, frame.ppn, read_only);
                    self.frames.insert(vpn, frame);
                    granted.push(vpn);
                }
                Err(e) => {
                    debug!("[kernel] allocate {} pages at {:?} failed: {}", count, start, e);
                    for vpn in granted {
                        self.page_table.unmap(vpn);
                        self.frames.remove(&vpn);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// 释放全部页帧，页表恢复为空
    pub fn release_all(&mut self) {
        self.page_table.clear();
        self.frames.clear();
    }

    /// 装入可执行文件 `name` 并布置参数
    ///
    /// ## Errors
    ///
    /// 失败时地址空间被清空，已分配的页帧全部归还。
    pub fn load(
        &mut self,
        fs: &dyn FileSystem,
        name: &str,
        args: &[String],
        stack_pages: usize,
    ) -> Result<LoadedProgram, LoadError> {
        let Some(file) = fs.open(name, OpenFlags::empty()) else {
            debug!("[kernel] open {} failed", name);
            return Err(LoadError::Open(String::from(name)));
        };
        let image = ElfImage::parse(file)?;
        match self.build(&image, args, stack_pages) {
            Ok((sp, argv)) => Ok(LoadedProgram {
                entry: image.entry_point(),
                sp,
                argc: args.len(),
                argv,
                image,
            }),
            Err(e) => {
                debug!("[kernel] load {} failed: {}", name, e);
                self.release_all();
                Err(e)
            }
        }
    }

    /// 分配各节、栈与参数页，装入内容并写入参数块，返回 (栈指针, argv)
    fn build(
        &mut self,
        image: &ElfImage,
        args: &[String],
        stack_pages: usize,
    ) -> Result<(usize, usize), LoadError> {
        let section_pages: usize = image.sections().iter().map(|s| s.num_pages).sum();
        let required = section_pages + stack_pages + 1;
        if required > self.page_table.capacity() {
            return Err(LoadError::TooLarge(required));
        }
        for section in image.sections() {
            let expected = VirtPageNum(self.page_count());
            if section.first_vpn != expected.0 {
                return Err(LoadError::Fragmented {
                    found: section.first_vpn.into(),
                    expected,
                });
            }
            self.allocate(expected, section.num_pages, section.read_only)?;
        }

        let args_size: usize = args.iter().map(|arg| 4 + arg.len() + 1).sum();
        if args_size > PAGE_SIZE {
            return Err(LoadError::ArgumentsTooLong(args_size));
        }

        self.allocate(VirtPageNum(self.page_count()), stack_pages, false)?;
        let sp = self.page_count() * PAGE_SIZE;
        self.allocate(VirtPageNum(self.page_count()), 1, false)?;

        self.load_sections(image);

        let argv = (self.page_count() - 1) * PAGE_SIZE;
        let mut entry_offset = argv;
        let mut string_offset = argv + args.len() * 4;
        for arg in args {
            let pointer = (string_offset as u32).to_le_bytes();
            let written = self.write(entry_offset, &pointer);
            debug_assert_eq!(written, 4);
            entry_offset += 4;
            let written = self.write(string_offset, arg.as_bytes());
            debug_assert_eq!(written, arg.len());
            string_offset += arg.len();
            let written = self.write(string_offset, &[0]);
            debug_assert_eq!(written, 1);
            string_offset += 1;
        }
        Ok((sp, argv))
    }

    fn load_sections(&mut self, image: &ElfImage) {
        let memory = self.allocator.memory();
        for (index, section) in image.sections().iter().enumerate() {
            debug!(
                "[kernel] {}: loading {} pages at {:?}",
                image.name(),
                section.num_pages,
                VirtPageNum(section.first_vpn)
            );
            for page in 0..section.num_pages {
                let vpn = VirtPageNum(section.first_vpn + page);
                let ppn = self.frames[&vpn].ppn;
                image.load_page(index, page, ppn, memory);
            }
        }
    }

    /// 从用户虚拟地址读取，返回读取的字节数
    pub fn read(&mut self, vaddr: usize, buf: &mut [u8]) -> usize {
        read_virtual_memory(&mut self.page_table, self.allocator.memory(), vaddr, buf)
    }

    /// 向用户虚拟地址写入，返回写入的字节数
    pub fn write(&mut self, vaddr: usize, buf: &[u8]) -> usize {
        write_virtual_memory(&mut self.page_table, self.allocator.memory(), vaddr, buf)
    }

    /// 读取以 0 结尾的用户字符串，长度不超过 `max_length`
    pub fn read_string(&mut self, vaddr: usize, max_length: usize) -> Option<String> {
        read_virtual_string(&mut self.page_table, self.allocator.memory(), vaddr, max_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::RamFileSystem;
    use crate::loader::image::{build, Segment};
    use crate::machine::PhysicalMemory;
    use proptest::prelude::*;

    fn allocator(pages: usize) -> Arc<FrameAllocator> {
        Arc::new(FrameAllocator::new(Arc::new(PhysicalMemory::new(pages))))
    }

    fn program(fs: &RamFileSystem, name: &str) {
        let text: Vec<u8> = (0..PAGE_SIZE + 10).map(|i| i as u8).collect();
        fs.install(
            name,
            &build(
                0,
                &[
                    Segment { vaddr: 0, data: &text, mem_size: text.len() as u32, writable: false },
                    Segment { vaddr: 0x800, data: &[7; 4], mem_size: 0x500, writable: true },
                ],
            ),
        );
    }

    #[test]
    fn allocation_failure_leaves_everything_untouched() {
        let allocator = allocator(8);
        let mut other = MemorySet::new(allocator.clone());
        other.allocate(VirtPageNum(0), 5, false).unwrap();
        assert_eq!(allocator.free_frames(), 3);

        // 请求 5 页，只剩 3 页
        let mut ms = MemorySet::new(allocator.clone());
        assert!(matches!(
            ms.allocate(VirtPageNum(0), 5, false),
            Err(LoadError::OutOfFrames)
        ));
        assert_eq!(allocator.free_frames(), 3);
        assert_eq!(ms.page_count(), 0);
        assert!((0..8).all(|vpn| ms.translate(VirtPageNum(vpn), false).is_none()));

        ms.allocate(VirtPageNum(0), 2, false).unwrap();
        assert_eq!(allocator.free_frames(), 1);
        assert!(matches!(
            ms.allocate(VirtPageNum(7), 2, false),
            Err(LoadError::OutOfRange(VirtPageNum(8)))
        ));
        assert!(matches!(
            ms.allocate(VirtPageNum(1), 1, false),
            Err(LoadError::AlreadyMapped(VirtPageNum(1)))
        ));
        assert_eq!(allocator.free_frames(), 1);
        assert_eq!(ms.page_count(), 2);
        assert!(ms.translate(VirtPageNum(7), false).is_none());

        other.release_all();
        ms.release_all();
        assert_eq!(allocator.free_frames(), 8);
    }

    #[test]
    fn load_lays_out_sections_stack_and_arguments() {
        let fs = RamFileSystem::new();
        program(&fs, "prog.coff");
        let allocator = allocator(16);
        let mut ms = MemorySet::new(allocator.clone());
        let args = [String::from("prog"), String::from("-v")];
        let loaded = ms.load(&fs, "prog.coff", &args, 2).unwrap();

        // 代码 2 页 + 数据 2 页 + 栈 2 页 + 参数 1 页
        assert_eq!(ms.page_count(), 7);
        assert_eq!(allocator.free_frames(), 9);
        assert_eq!(loaded.sp, 6 * PAGE_SIZE);
        assert_eq!(loaded.argv, 6 * PAGE_SIZE);
        assert_eq!(loaded.argc, 2);
        assert!(ms.translate(VirtPageNum(1), false).unwrap().read_only());
        assert!(ms.translate(VirtPageNum(1), true).is_none());
        assert!(!ms.translate(VirtPageNum(2), true).unwrap().read_only());

        let mut word = [0u8; 4];
        ms.read(loaded.argv + 4, &mut word);
        let second = u32::from_le_bytes(word) as usize;
        assert_eq!(second, loaded.argv + 8 + 5);
        assert_eq!(ms.read_string(loaded.argv + 8, 256).as_deref(), Some("prog"));
        assert_eq!(ms.read_string(second, 256).as_deref(), Some("-v"));

        let mut byte = [0u8; 1];
        ms.read(PAGE_SIZE + 9, &mut byte);
        assert_eq!(byte[0], (PAGE_SIZE + 9) as u8);
        ms.read(PAGE_SIZE + 10, &mut byte);
        assert_eq!(byte[0], 0);
        ms.read(2 * PAGE_SIZE + 3, &mut byte);
        assert_eq!(byte[0], 7);
    }

    #[test]
    fn load_and_unload_return_every_frame() {
        let fs = RamFileSystem::new();
        program(&fs, "prog.coff");
        let allocator = allocator(16);
        let mut ms = MemorySet::new(allocator.clone());
        for _ in 0..2 {
            let loaded = ms.load(&fs, "prog.coff", &[], 2).unwrap();
            assert_eq!(fs.open_count("prog.coff"), 1);
            ms.release_all();
            drop(loaded);
            assert_eq!(ms.page_count(), 0);
            assert_eq!(allocator.free_frames(), 16);
            assert_eq!(fs.open_count("prog.coff"), 0);
        }
    }

    #[test]
    fn failed_loads_release_everything() {
        let fs = RamFileSystem::new();
        program(&fs, "prog.coff");
        fs.install(
            "gap.coff",
            &build(0, &[Segment { vaddr: 0x800, data: &[1], mem_size: 1, writable: false }]),
        );
        let allocator = allocator(6);
        let mut ms = MemorySet::new(allocator.clone());

        assert!(matches!(ms.load(&fs, "none.coff", &[], 2), Err(LoadError::Open(_))));
        assert!(matches!(ms.load(&fs, "gap.coff", &[], 2), Err(LoadError::Fragmented { .. })));
        let long = [String::from_utf8(vec![b'x'; PAGE_SIZE]).unwrap()];
        assert!(matches!(
            ms.load(&fs, "prog.coff", &long, 1),
            Err(LoadError::ArgumentsTooLong(_))
        ));
        // 代码 2 页 + 数据 2 页 + 栈 2 页 + 参数 1 页，超过 6 个物理页
        assert!(matches!(ms.load(&fs, "prog.coff", &[], 2), Err(LoadError::TooLarge(7))));
        assert_eq!(allocator.free_frames(), 6);
        assert_eq!(ms.page_count(), 0);
        assert_eq!(fs.open_count("prog.coff"), 0);
    }

    #[test]
    fn load_rolls_back_when_frames_run_out() {
        let fs = RamFileSystem::new();
        program(&fs, "prog.coff");
        let allocator = allocator(8);
        let mut other = MemorySet::new(allocator.clone());
        other.allocate(VirtPageNum(0), 2, false).unwrap();

        let mut ms = MemorySet::new(allocator.clone());
        assert!(matches!(ms.load(&fs, "prog.coff", &[], 2), Err(LoadError::OutOfFrames)));
        assert_eq!(allocator.free_frames(), 6);
        assert_eq!(ms.page_count(), 0);
        assert_eq!(fs.open_count("prog.coff"), 0);

        other.release_all();
        assert!(ms.load(&fs, "prog.coff", &[], 2).is_ok());
        assert_eq!(allocator.free_frames(), 1);
    }

    proptest! {
        #[test]
        fn write_then_read_round_trips(
            vaddr in 0usize..4 * PAGE_SIZE,
            data in proptest::collection::vec(any::<u8>(), 0..2 * PAGE_SIZE),
        ) {
            let mut ms = MemorySet::new(allocator(8));
            ms.allocate(VirtPageNum(0), 6, false).unwrap();
            prop_assert_eq!(ms.write(vaddr, &data), data.len());
            let mut back = vec![0u8; data.len()];
            prop_assert_eq!(ms.read(vaddr, &mut back), data.len());
            prop_assert_eq!(back, data);
        }

        #[test]
        fn allocate_is_all_or_nothing(
            used in 0usize..8,
            start in 0usize..10,
            count in 0usize..10,
        ) {
            let allocator = allocator(8);
            let mut ms = MemorySet::new(allocator.clone());
            ms.allocate(VirtPageNum(0), used, true).unwrap();
            let before_free = allocator.free_frames();
            let before: Vec<_> = (0..8).map(|vpn| ms.page_table.is_mapped(VirtPageNum(vpn))).collect();

            match ms.allocate(VirtPageNum(start), count, false) {
                Ok(()) => {
                    prop_assert_eq!(ms.page_count(), used + count);
                    prop_assert_eq!(allocator.free_frames(), before_free - count);
                    prop_assert!((start..start + count).all(|vpn| ms.page_table.is_mapped(VirtPageNum(vpn))));
                }
                Err(_) => {
                    prop_assert_eq!(ms.page_count(), used);
                    prop_assert_eq!(allocator.free_frames(), before_free);
                    let after: Vec<_> = (0..8).map(|vpn| ms.page_table.is_mapped(VirtPageNum(vpn))).collect();
                    prop_assert_eq!(after, before);
                }
            }
        }
    }
}
