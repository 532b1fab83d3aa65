//! 集成测试公共设施
//!
//! - [`ScriptedCpu`]：以入口地址选择一段 Rust 闭包充当用户程序
//! - [`UserEnv`]：闭包看到的"机器"，经由陷入 ABI 发起系统调用
//! - [`TestSystem`]：装配好内存文件系统、内存控制台与处理器的内核

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use userprog::config::{KernelConfig, PAGE_SIZE, REG_A0, REG_A1, REG_A2, REG_A3, REG_SP, REG_V0};
use userprog::fs::{BufferConsole, RamFileSystem};
use userprog::machine::{Cpu, Exception, TrapHandler, UserMemory};
use userprog::process::ProcessControlBlock;
use userprog::trap::TrapContext;
use userprog::Kernel;

pub const SYS_HALT: i32 = 0;
pub const SYS_EXIT: i32 = 1;
pub const SYS_EXEC: i32 = 2;
pub const SYS_JOIN: i32 = 3;
pub const SYS_CREATE: i32 = 4;
pub const SYS_OPEN: i32 = 5;
pub const SYS_READ: i32 = 6;
pub const SYS_WRITE: i32 = 7;
pub const SYS_CLOSE: i32 = 8;
pub const SYS_UNLINK: i32 = 9;

/// 每个测试程序的页数：代码 1 页 + 数据 1 页 + 栈 + 参数 1 页
pub const STACK_PAGES: usize = 2;
pub const PROGRAM_PAGES: usize = 2 + STACK_PAGES + 1;

/// 数据页的起始地址，可读写
pub const DATA: i32 = PAGE_SIZE as i32;

pub type Program = Arc<dyn Fn(&mut UserEnv<'_, '_>) + Send + Sync>;

/// 按入口地址执行闭包的处理器
#[derive(Default)]
pub struct ScriptedCpu {
    programs: Mutex<HashMap<usize, Program>>,
}

impl Cpu for ScriptedCpu {
    fn run(&self, memory: &dyn UserMemory, cx: &mut TrapContext, trap: &mut TrapHandler<'_>) {
        let program = self.programs.lock().get(&cx.pc()).cloned();
        match program {
            Some(program) => {
                let argc = cx.x[REG_A0];
                let argv = cx.x[REG_A1];
                let sp = cx.x[REG_SP];
                let mut env = UserEnv {
                    memory,
                    cx,
                    trap,
                    argc,
                    argv,
                    sp,
                };
                program(&mut env);
            }
            None => trap(cx, Exception::IllegalInstruction),
        }
    }
}

/// 用户程序的执行环境
pub struct UserEnv<'a, 'b> {
    memory: &'a dyn UserMemory,
    cx: &'a mut TrapContext,
    trap: &'a mut TrapHandler<'b>,
    pub argc: i32,
    pub argv: i32,
    pub sp: i32,
}

impl UserEnv<'_, '_> {
    /// 经由陷入 ABI 发起系统调用
    pub fn syscall(&mut self, id: i32, args: [i32; 4]) -> i32 {
        self.cx.x[REG_V0] = id;
        self.cx.x[REG_A0] = args[0];
        self.cx.x[REG_A1] = args[1];
        self.cx.x[REG_A2] = args[2];
        self.cx.x[REG_A3] = args[3];
        (self.trap)(self.cx, Exception::Syscall);
        self.cx.x[REG_V0]
    }

    /// 触发处理器异常
    pub fn raise(&mut self, exception: Exception) {
        (self.trap)(self.cx, exception);
    }

    pub fn exit(&mut self, status: i32) {
        self.syscall(SYS_EXIT, [status, 0, 0, 0]);
        unreachable!("exit returned");
    }

    pub fn read(&self, vaddr: i32, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        let n = self.memory.read(vaddr as usize, &mut buf);
        buf.truncate(n);
        buf
    }

    pub fn write(&self, vaddr: i32, bytes: &[u8]) -> usize {
        self.memory.write(vaddr as usize, bytes)
    }

    pub fn read_i32(&self, vaddr: i32) -> i32 {
        let bytes = self.read(vaddr, 4);
        i32::from_le_bytes(bytes.try_into().expect("word not readable"))
    }

    /// 写入以 0 结尾的字符串，返回其地址
    pub fn put_str(&self, vaddr: i32, s: &str) -> i32 {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        assert_eq!(self.write(vaddr, &bytes), bytes.len());
        vaddr
    }

    /// 读取进程参数
    pub fn args(&self) -> Vec<String> {
        (0..self.argc)
            .map(|i| {
                let pointer = self.read_i32(self.argv + 4 * i);
                let bytes = self.read(pointer, 256);
                let end = bytes.iter().position(|&b| b == 0).unwrap();
                String::from_utf8(bytes[..end].to_vec()).unwrap()
            })
            .collect()
    }

    /// 在数据页写入文件名后执行 exec
    pub fn exec(&mut self, name: &str, args: &[&str]) -> i32 {
        let name_va = self.put_str(DATA, name);
        let table = DATA + 256;
        let mut next = table + 4 * args.len() as i32;
        for (i, arg) in args.iter().enumerate() {
            self.write(table + 4 * i as i32, &next.to_le_bytes());
            self.put_str(next, arg);
            next += arg.len() as i32 + 1;
        }
        self.syscall(SYS_EXEC, [name_va, args.len() as i32, table, 0])
    }

    /// join 并返回 (返回值, 写回的状态)
    pub fn join(&mut self, pid: i32) -> (i32, i32) {
        let status = DATA + PAGE_SIZE as i32 - 4;
        self.write(status, &[0xee; 4]);
        let r = self.syscall(SYS_JOIN, [pid, status, 0, 0]);
        (r, self.read_i32(status))
    }

    /// 以文件名为参数的调用（create / open / unlink）
    pub fn file_call(&mut self, id: i32, name: &str) -> i32 {
        let va = self.put_str(DATA + 512, name);
        self.syscall(id, [va, 0, 0, 0])
    }
}

/// 构造一个最小的 ELF32 小端镜像：只读代码页 + 可读写数据页
pub fn elf(entry: u32) -> Vec<u8> {
    let segments: [(u32, u32, u32); 2] = [(0, 5, 0), (PAGE_SIZE as u32, 6, 0)];
    let phoff = 52u32;
    let mut out = Vec::new();
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&8u16.to_le_bytes());
    for word in [1u32, entry, phoff, 0, 0] {
        out.extend_from_slice(&word.to_le_bytes());
    }
    for half in [52u16, 32, segments.len() as u16, 40, 0, 0] {
        out.extend_from_slice(&half.to_le_bytes());
    }
    let data_offset = phoff + 32 * segments.len() as u32;
    for (vaddr, flags, file_size) in segments {
        let memsz = PAGE_SIZE as u32;
        for word in [1u32, data_offset, vaddr, vaddr, file_size, memsz, flags, PAGE_SIZE as u32] {
            out.extend_from_slice(&word.to_le_bytes());
        }
    }
    out
}

/// 测试用的完整系统
pub struct TestSystem {
    pub kernel: Arc<Kernel>,
    pub fs: Arc<RamFileSystem>,
    pub console: Arc<BufferConsole>,
    cpu: Arc<ScriptedCpu>,
    next_entry: Mutex<usize>,
}

impl TestSystem {
    pub fn new(num_phys_pages: usize) -> Self {
        userprog::log::init();
        let fs = Arc::new(RamFileSystem::new());
        let console = Arc::new(BufferConsole::new());
        let cpu = Arc::new(ScriptedCpu::default());
        let config = KernelConfig {
            num_phys_pages,
            stack_pages: STACK_PAGES,
            ..KernelConfig::default()
        };
        let kernel = Kernel::new(config, fs.clone(), console.clone(), cpu.clone());
        Self {
            kernel,
            fs,
            console,
            cpu,
            next_entry: Mutex::new(0),
        }
    }

    /// 安装名为 `name` 的可执行文件，其行为由 `program` 给出
    pub fn install(&self, name: &str, program: impl Fn(&mut UserEnv<'_, '_>) + Send + Sync + 'static) {
        let entry = {
            let mut next = self.next_entry.lock();
            *next += 4;
            *next
        };
        self.cpu.programs.lock().insert(entry, Arc::new(program));
        self.fs.install(name, &elf(entry as u32));
    }

    /// 以 `name` 为根进程启动，等待内核终止
    pub fn boot(&self, name: &str, args: &[&str]) -> Arc<ProcessControlBlock> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let root = self.kernel.run_root(name, &args).expect("boot failed");
        self.kernel.wait_for_termination();
        root
    }

    pub fn free_frames(&self) -> usize {
        self.kernel.frame_allocator().free_frames()
    }
}

/// 测试结果记录，程序在内核线程中写入、测试主线程读取
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<HashMap<String, i32>>>);

impl Journal {
    pub fn record(&self, key: &str, value: i32) {
        self.0.lock().insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<i32> {
        self.0.lock().get(key).copied()
    }
}

/// 轮询直到条件成立，超时则 panic
pub fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out");
        std::thread::sleep(Duration::from_millis(1));
    }
}
