//! 作业调度与主机负载均衡
//!
//! - [`LoadBalancer`]：按优先级或轮询为作业选择主机，并原子地占用主机容量
//! - [`CloudInstanceManager`]：按主机缓存云实例处理器，负责按需启停
//! - [`JobWorker`]：派发待执行作业、处理执行后端事件、取消作业以及各类监控扫描

pub mod cloud_instance;
pub mod dispatch_metrics;
pub mod job_worker;
pub mod load_balancer;
pub mod monitors;
pub mod round_robin;

pub use cloud_instance::CloudInstanceManager;
pub use dispatch_metrics::DispatchMetrics;
pub use job_worker::{JobWorker, JobWorkerConfig};
pub use load_balancer::{HostPool, LoadBalancer, PriorityLoadBalancer};
pub use round_robin::{RoundRobinLoadBalancer, DEFAULT_HOST_RESPONSE_THRESHOLD};
