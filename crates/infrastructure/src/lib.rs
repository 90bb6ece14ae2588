//! 基础设施层
//!
//! 领域仓储的内存实现、模拟云实例处理器以及进程内执行后端。

pub mod cloud;
pub mod local_worker;
pub mod memory;

pub use cloud::*;
pub use local_worker::*;
pub use memory::*;
