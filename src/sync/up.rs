//! # 单处理器安全单元
//!
//! 提供在模拟单处理器环境下共享可变数据的结构。

use parking_lot::{Mutex, MutexGuard};

/// 单处理器安全单元 (Uniprocessor Safe Cell)
///
/// 模拟机器只有一个逻辑处理器，但每个用户执行上下文都由一个宿主线程承载，
/// 因此共享数据必须互斥访问。`UPSafeCell<T>` 是 [`parking_lot::Mutex`]
/// 的一个封装，沿用内核中 `exclusive_access` 的使用方式。
///
/// ## 使用约定
///
/// - 持有守卫期间不要调用可能阻塞的操作（例如 `join`）
/// - 需要同时持有多个单元时，遵循"父进程先于子进程"的加锁顺序
///
/// ## Examples
///
/// ```
/// use userprog::sync::UPSafeCell;
///
/// let data = UPSafeCell::new(Vec::new());
/// data.exclusive_access().push(42);
/// assert_eq!(data.exclusive_access().len(), 1);
/// ```
pub struct UPSafeCell<T> {
    /// 内部的互斥锁
    inner: Mutex<T>,
}

impl<T> UPSafeCell<T> {
    /// 创建一个新的 `UPSafeCell`
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// 获取对内部数据的独占可变引用
    ///
    /// 其他执行上下文正持有守卫时阻塞等待，守卫离开作用域时自动释放。
    pub fn exclusive_access(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }
}

impl<T: Default> Default for UPSafeCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
