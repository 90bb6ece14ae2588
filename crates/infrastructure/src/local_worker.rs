use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use orchestrator_domain::{
    HostProbe, Identifier, JobStatus, Progress, Task, Worker, WorkerEvent, WorkerEventSender,
};
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

/// 进程内执行后端
///
/// 每个作业在独立的tokio任务中"执行"固定时长后上报完成，
/// 用于演示模式和集成测试。
pub struct LocalWorker<J: Identifier> {
    name: String,
    events: WorkerEventSender<J>,
    execution_time: Duration,
    running: Arc<RwLock<HashMap<J, JoinHandle<()>>>>,
    unavailable_hosts: Arc<RwLock<HashSet<String>>>,
}

impl<J: Identifier> LocalWorker<J> {
    pub fn new(events: WorkerEventSender<J>, execution_time: Duration) -> Self {
        Self {
            name: "local".to_string(),
            events,
            execution_time,
            running: Arc::new(RwLock::new(HashMap::new())),
            unavailable_hosts: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub async fn set_host_available(&self, host_id: &str, available: bool) {
        let mut hosts = self.unavailable_hosts.write().await;
        if available {
            hosts.remove(host_id);
        } else {
            hosts.insert(host_id.to_string());
        }
    }

    pub async fn running_count(&self) -> usize {
        self.running.read().await.len()
    }

    fn send(&self, event: WorkerEvent<J>) {
        if self.events.send(event).is_err() {
            warn!("作业事件接收端已关闭");
        }
    }

    async fn abort(&self, job_id: &J) -> bool {
        match self.running.write().await.remove(job_id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl<J: Identifier, T: Identifier> Worker<J, T> for LocalWorker<J> {
    async fn execute(
        &self,
        job_id: &J,
        task: &Task<T>,
        _parameters: &HashMap<String, serde_json::Value>,
        host_id: Option<&str>,
    ) -> OrchestratorResult<()> {
        if let Some(host_id) = host_id {
            if self.unavailable_hosts.read().await.contains(host_id) {
                self.send(WorkerEvent::HostNotAvailable {
                    host_id: host_id.to_string(),
                });
                return Err(OrchestratorError::execution(format!(
                    "主机 {host_id} 不可用"
                )));
            }
        }

        info!("本地执行作业: {} (任务: {})", job_id, task.name);

        let events = self.events.clone();
        let running = Arc::clone(&self.running);
        let execution_time = self.execution_time;
        let id = job_id.clone();
        let host = host_id.map(str::to_string);

        // 持有写锁直到句柄登记完成，避免任务先于登记结束
        let mut guard = self.running.write().await;
        let handle = tokio::spawn(async move {
            let _ = events.send(WorkerEvent::Executing {
                job_id: id.clone(),
                host_id: host,
            });
            tokio::time::sleep(execution_time / 2).await;
            let _ = events.send(WorkerEvent::ProgressChanged {
                job_id: id.clone(),
                progress: Progress::new(50),
            });
            tokio::time::sleep(execution_time / 2).await;

            running.write().await.remove(&id);
            let _ = events.send(WorkerEvent::Executed {
                job_id: id,
                status: JobStatus::Completed,
                message: None,
            });
        });
        guard.insert(job_id.clone(), handle);
        Ok(())
    }

    async fn cancel(&self, job_id: &J, host_id: Option<&str>) -> OrchestratorResult<()> {
        if !self.abort(job_id).await {
            debug!("取消时作业 {} 已不在本地运行 (主机: {:?})", job_id, host_id);
        }
        self.send(WorkerEvent::Cancelled {
            job_id: job_id.clone(),
            reason: Some("用户取消".to_string()),
        });
        Ok(())
    }

    async fn timeout(&self, job_id: &J, host_id: Option<&str>) -> OrchestratorResult<()> {
        if self.abort(job_id).await {
            warn!("作业 {} 超时，已终止本地执行 (主机: {:?})", job_id, host_id);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl<J: Identifier> HostProbe for LocalWorker<J> {
    async fn is_host_available(&self, host_id: &str) -> OrchestratorResult<bool> {
        Ok(!self.unavailable_hosts.read().await.contains(host_id))
    }
}
