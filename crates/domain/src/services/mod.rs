//! # 领域服务
//!
//! 作业与主机的业务入口。服务本身不保存状态，数据全部经由仓储trait访问，
//! 每次变更都会在广播通道上发布前置事件与后置事件。
//!
//! - [`JobService`]：作业的增删改查，负责任务/账户/参数校验与状态机检查
//! - [`HostService`]：不分组主机
//! - [`GroupedHostService`]：按组管理的主机

mod host_service;
mod job_service;

pub use host_service::*;
pub use job_service::*;
