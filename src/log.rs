//! # 日志系统模块
//!
//! 提供结构化的日志输出功能，支持多种日志级别和彩色输出。
//! 实现了标准的 Rust `log` crate 接口，内核各模块直接使用
//! `log::{error, warn, info, debug, trace}` 宏输出诊断信息。
//!
//! ## 日志格式
//!
//! ```text
//! LEVEL [T0001] [thread] [module::name] [file.rs:42] message
//! ```
//!
//! 其中 `thread` 是当前执行上下文的名字，用户进程的执行上下文以
//! 可执行文件名命名。
//!
//! ## 颜色方案
//!
//! - **ERROR**: 红色 (31)
//! - **WARN**: 亮黄色 (93)
//! - **INFO**: 蓝色 (34)
//! - **DEBUG**: 绿色 (32)
//! - **TRACE**: 暗灰色 (90)

use lazy_static::lazy_static;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::atomic::{AtomicUsize, Ordering};

/// 简单日志实现
///
/// 实现标准的 `Log` trait，输出到标准错误流，级别过滤由 `log` crate 处理。
struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= *LOG_LEVEL
    }

    /// 格式化日志消息并输出，包含时间戳、执行上下文、模块名和文件位置
    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => 31,
            Level::Warn => 93,
            Level::Info => 34,
            Level::Debug => 32,
            Level::Trace => 90,
        };
        let thread = std::thread::current();
        let location = match (record.file(), record.line()) {
            (Some(file), Some(line)) => {
                let file_name = file.rsplit('/').next().unwrap_or(file);
                format!("{}:{}", file_name, line)
            }
            _ => String::from("unknown"),
        };
        eprintln!(
            "\u{1B}[{}m{:>5} [T{:>4}] [{}] [{}] [{}] {}\u{1B}[0m",
            color,
            record.level(),
            timestamp(),
            thread.name().unwrap_or("anonymous"),
            record.target(),
            location,
            record.args()
        );
    }

    fn flush(&self) {}
}

lazy_static! {
    /// 日志级别，首次使用时从环境变量 `LOG` 读取
    static ref LOG_LEVEL: LevelFilter = match std::env::var("LOG").as_deref() {
        Ok("ERROR") => LevelFilter::Error,
        Ok("WARN") => LevelFilter::Warn,
        Ok("INFO") => LevelFilter::Info,
        Ok("DEBUG") => LevelFilter::Debug,
        Ok("TRACE") => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };
}

/// 全局时间戳计数器，为每条日志生成单调递增的序号
static TICK_COUNT: AtomicUsize = AtomicUsize::new(0);

fn timestamp() -> usize {
    TICK_COUNT.fetch_add(1, Ordering::Relaxed) + 1
}

/// 初始化日志系统
///
/// 设置全局日志记录器并按环境变量 `LOG` 配置日志级别：
///
/// - `LOG=ERROR` - 只输出错误级别日志
/// - `LOG=WARN` - 输出警告及以上级别日志
/// - `LOG=INFO` - 输出信息及以上级别日志（默认）
/// - `LOG=DEBUG` - 输出调试及以上级别日志
/// - `LOG=TRACE` - 输出所有级别日志
///
/// 重复调用不会出错，后续调用只会重新设置级别。
pub fn init() {
    static LOGGER: SimpleLogger = SimpleLogger;

    let _ = log::set_logger(&LOGGER);
    log::set_max_level(*LOG_LEVEL);
}
