use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use orchestrator_errors::OrchestratorResult;

use crate::entities::{JobStatus, Task};
use crate::value_objects::{Identifier, Progress};

/// 执行后端上报的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkerEvent<J> {
    Executing {
        job_id: J,
        host_id: Option<String>,
    },
    Executed {
        job_id: J,
        status: JobStatus,
        message: Option<String>,
    },
    Cancelling {
        job_id: J,
    },
    Cancelled {
        job_id: J,
        reason: Option<String>,
    },
    ProgressChanged {
        job_id: J,
        progress: Progress,
    },
    HostNotAvailable {
        host_id: String,
    },
}

impl<J> WorkerEvent<J> {
    pub fn job_id(&self) -> Option<&J> {
        match self {
            WorkerEvent::Executing { job_id, .. }
            | WorkerEvent::Executed { job_id, .. }
            | WorkerEvent::Cancelling { job_id }
            | WorkerEvent::Cancelled { job_id, .. }
            | WorkerEvent::ProgressChanged { job_id, .. } => Some(job_id),
            WorkerEvent::HostNotAvailable { .. } => None,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            WorkerEvent::Executing { .. } => "executing",
            WorkerEvent::Executed { .. } => "executed",
            WorkerEvent::Cancelling { .. } => "cancelling",
            WorkerEvent::Cancelled { .. } => "cancelled",
            WorkerEvent::ProgressChanged { .. } => "progress_changed",
            WorkerEvent::HostNotAvailable { .. } => "host_not_available",
        }
    }
}

pub type WorkerEventSender<J> = mpsc::UnboundedSender<WorkerEvent<J>>;
pub type WorkerEventReceiver<J> = mpsc::UnboundedReceiver<WorkerEvent<J>>;

pub fn worker_event_channel<J>() -> (WorkerEventSender<J>, WorkerEventReceiver<J>) {
    mpsc::unbounded_channel()
}

/// 任务执行后端
///
/// `execute` 只负责投递，立即返回；执行结果通过 [`WorkerEvent`] 异步上报。
#[async_trait]
pub trait Worker<J: Identifier, T: Identifier>: Send + Sync {
    async fn execute(
        &self,
        job_id: &J,
        task: &Task<T>,
        parameters: &HashMap<String, serde_json::Value>,
        host_id: Option<&str>,
    ) -> OrchestratorResult<()>;

    /// `host_id` 为作业被分配到的主机，供远程后端路由
    async fn cancel(&self, job_id: &J, host_id: Option<&str>) -> OrchestratorResult<()>;

    /// 通知后端作业已超时
    async fn timeout(&self, job_id: &J, host_id: Option<&str>) -> OrchestratorResult<()>;

    fn name(&self) -> &str;
}

/// 主机存活探测
#[async_trait]
pub trait HostProbe: Send + Sync {
    async fn is_host_available(&self, host_id: &str) -> OrchestratorResult<bool>;
}

/// 可探测主机存活的远程执行后端
pub trait RemoteWorker<J: Identifier, T: Identifier>: Worker<J, T> + HostProbe {}

impl<J: Identifier, T: Identifier, W> RemoteWorker<J, T> for W where W: Worker<J, T> + HostProbe {}
