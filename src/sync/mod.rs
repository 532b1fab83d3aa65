//! # 同步原语
//!
//! - [`UPSafeCell`] - 内核共享可变状态的互斥单元
//! - [`Communicator`] - 一对一交接单个字的会合原语

mod communicator;
mod up;

pub use communicator::Communicator;
pub use up::UPSafeCell;
