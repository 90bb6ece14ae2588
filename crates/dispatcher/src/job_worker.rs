use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use orchestrator_domain::{
    EventPublisher, Identifier, Job, JobService, JobStatus, TaskRepository, Worker, WorkerEvent,
    WorkerEventReceiver,
};
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

use crate::cloud_instance::CloudInstanceManager;
use crate::dispatch_metrics::DispatchMetrics;
use crate::load_balancer::{HostPool, LoadBalancer};

/// JobWorker配置
#[derive(Debug, Clone)]
pub struct JobWorkerConfig {
    /// 处于 Starting 超过该时长的作业被判定为启动失败
    pub starting_timeout: Duration,
}

impl Default for JobWorkerConfig {
    fn default() -> Self {
        Self {
            starting_timeout: Duration::from_secs(60),
        }
    }
}

/// 作业调度核心
///
/// 不自行循环，由外部按周期调用 [`JobWorker::execute_pending`] 和各监控方法。
pub struct JobWorker<J: Identifier, T: Identifier> {
    pub(crate) jobs: Arc<JobService<J, T>>,
    pub(crate) tasks: Arc<dyn TaskRepository<T>>,
    pub(crate) worker: Arc<dyn Worker<J, T>>,
    load_balancer: Option<Arc<dyn LoadBalancer<J>>>,
    hosts: Option<HostPool>,
    cloud: Arc<CloudInstanceManager>,
    events: EventPublisher<WorkerEvent<J>>,
    pub(crate) metrics: DispatchMetrics,
    pub(crate) config: JobWorkerConfig,
}

impl<J: Identifier, T: Identifier> JobWorker<J, T> {
    pub fn new(
        jobs: Arc<JobService<J, T>>,
        tasks: Arc<dyn TaskRepository<T>>,
        worker: Arc<dyn Worker<J, T>>,
    ) -> Self {
        Self {
            jobs,
            tasks,
            worker,
            load_balancer: None,
            hosts: None,
            cloud: Arc::new(CloudInstanceManager::default()),
            events: EventPublisher::new(),
            metrics: DispatchMetrics::new(),
            config: JobWorkerConfig::default(),
        }
    }

    pub fn with_load_balancer(
        mut self,
        load_balancer: Arc<dyn LoadBalancer<J>>,
        hosts: HostPool,
    ) -> Self {
        self.load_balancer = Some(load_balancer);
        self.hosts = Some(hosts);
        self
    }

    pub fn with_cloud_instances(mut self, cloud: Arc<CloudInstanceManager>) -> Self {
        self.cloud = cloud;
        self
    }

    pub fn with_config(mut self, config: JobWorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// 订阅执行后端事件的转发
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<WorkerEvent<J>> {
        self.events.subscribe()
    }

    pub fn job_service(&self) -> &Arc<JobService<J, T>> {
        &self.jobs
    }

    /// 派发所有待执行作业，按 (优先级, 请求时间) 排序，返回成功派发的作业ID
    pub async fn execute_pending(&self) -> OrchestratorResult<Vec<J>> {
        let mut pending = self.jobs.get_by_status(JobStatus::Pending).await?;
        pending.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.requested.cmp(&b.requested))
        });
        self.metrics.set_pending(pending.len());
        if pending.is_empty() {
            return Ok(Vec::new());
        }
        debug!("开始派发 {} 个待执行作业", pending.len());

        let mut dispatched = Vec::new();
        for job in pending {
            let id = job.id.clone();
            match self.dispatch(job).await {
                Ok(true) => dispatched.push(id),
                Ok(false) => {}
                Err(e) => {
                    error!("派发作业 {} 失败: {}", id, e);
                    self.metrics.record_dispatch_failed("dispatch_error");
                    if let Err(e) = self
                        .jobs
                        .update_status_with_message(&id, JobStatus::Error, Some(e.to_string()))
                        .await
                    {
                        error!("标记作业 {} 失败状态时出错: {}", id, e);
                    }
                }
            }
        }

        if !dispatched.is_empty() {
            info!("本轮派发了 {} 个作业", dispatched.len());
        }
        Ok(dispatched)
    }

    async fn dispatch(&self, job: Job<J, T>) -> OrchestratorResult<bool> {
        let Some(task) = self.tasks.get(&job.task_id).await? else {
            warn!("作业 {} 引用的任务 {} 不存在", job.id, job.task_id);
            self.jobs
                .update_status_with_message(
                    &job.id,
                    JobStatus::Error,
                    Some(OrchestratorError::task_not_found(&job.task_id).to_string()),
                )
                .await?;
            self.metrics.record_dispatch_failed("task_not_found");
            return Ok(false);
        };

        let host = match &self.load_balancer {
            Some(load_balancer) => {
                match load_balancer
                    .get_host(&job.id, job.host_group.as_deref())
                    .await?
                {
                    Some(host) => Some(host),
                    None => {
                        debug!("作业 {} 暂无可用主机", job.id);
                        return Ok(false);
                    }
                }
            }
            None => None,
        };

        if let Some(host) = &host {
            if let Some(status) = self.cloud.status_of(host).await? {
                if !status.is_running() {
                    debug!(
                        "作业 {} 等待主机 {} 的云实例就绪 (当前: {})",
                        job.id,
                        host.full_name(),
                        status
                    );
                    return Ok(false);
                }
            }
        }

        self.jobs.update_status(&job.id, JobStatus::Starting).await?;

        let host_id = host.as_ref().map(|h| h.id.as_str());
        match self
            .worker
            .execute(&job.id, &task, &job.parameters, host_id)
            .await
        {
            Ok(()) => {
                // 执行后端的事件可能已经先一步推进了状态
                if let Some(current) = self.jobs.get(&job.id).await? {
                    if current.status == JobStatus::Starting {
                        self.jobs.update_status(&job.id, JobStatus::InProgress).await?;
                    }
                }
                self.metrics.record_dispatched();
                info!(
                    "作业 {} 已派发到 {} (主机: {})",
                    job.id,
                    self.worker.name(),
                    host_id.unwrap_or("-")
                );
                Ok(true)
            }
            Err(e) => {
                warn!("执行后端拒绝作业 {}: {}", job.id, e);
                self.jobs
                    .update_status_with_message(&job.id, JobStatus::Error, Some(e.to_string()))
                    .await?;
                self.metrics.record_dispatch_failed("execute_failed");
                if let Some(host) = &host {
                    self.stop_idle_instance(&host.id).await;
                }
                Ok(false)
            }
        }
    }

    /// 处理执行后端上报的事件，处理完成后在自身的广播通道上转发
    pub async fn handle_worker_event(&self, event: WorkerEvent<J>) -> OrchestratorResult<()> {
        match &event {
            WorkerEvent::Executing { job_id, host_id } => {
                let job = self.require(job_id).await?;
                if job.status.is_terminal() {
                    debug!("作业 {} 已结束，忽略执行中事件", job_id);
                } else {
                    if matches!(job.status, JobStatus::Pending | JobStatus::Starting) {
                        self.jobs.update_status(job_id, JobStatus::InProgress).await?;
                    }
                    self.jobs.update_heartbeat(job_id).await?;
                    debug!("作业 {} 开始执行 (主机: {:?})", job_id, host_id);
                }
            }
            WorkerEvent::ProgressChanged { job_id, progress } => {
                self.jobs.update_progress(job_id, progress.clone()).await?;
            }
            WorkerEvent::Executed {
                job_id,
                status,
                message,
            } => {
                let job = self.require(job_id).await?;
                if job.status.is_terminal() {
                    debug!("作业 {} 已处于 {}，忽略执行结果 {}", job_id, job.status, status);
                } else {
                    self.jobs
                        .update_status_with_message(job_id, *status, message.clone())
                        .await?;
                    self.metrics.record_finished(*status);
                    info!("作业 {} 执行结束: {}", job_id, status);
                    if let Some(host_id) = &job.host_id {
                        self.stop_idle_instance(host_id).await;
                    }
                }
            }
            WorkerEvent::Cancelling { job_id } => {
                let job = self.require(job_id).await?;
                if job.status.is_terminal() {
                    debug!("作业 {} 已处于 {}，忽略取消中事件", job_id, job.status);
                } else if job.status != JobStatus::Cancelling {
                    self.jobs.update_status(job_id, JobStatus::Cancelling).await?;
                }
            }
            WorkerEvent::Cancelled { job_id, reason } => {
                let job = self.require(job_id).await?;
                if job.status.is_terminal() {
                    debug!("作业 {} 已处于 {}，忽略取消事件", job_id, job.status);
                } else {
                    if job.status != JobStatus::Cancelling {
                        self.jobs.update_status(job_id, JobStatus::Cancelling).await?;
                    }
                    self.jobs
                        .update_status_with_message(job_id, JobStatus::Cancelled, reason.clone())
                        .await?;
                    self.metrics.record_finished(JobStatus::Cancelled);
                    info!("作业 {} 已取消", job_id);
                    if let Some(host_id) = &job.host_id {
                        self.stop_idle_instance(host_id).await;
                    }
                }
            }
            WorkerEvent::HostNotAvailable { host_id } => {
                warn!("执行后端报告主机不可用: {}", host_id);
            }
        }

        self.events.publish(event);
        Ok(())
    }

    /// 持续处理事件直到所有发送端关闭
    pub async fn listen(&self, mut receiver: WorkerEventReceiver<J>) {
        info!("开始监听执行后端事件");
        while let Some(event) = receiver.recv().await {
            let event_type = event.event_type();
            if let Err(e) = self.handle_worker_event(event).await {
                error!("处理执行后端事件 {} 失败: {}", event_type, e);
            }
        }
        info!("执行后端事件通道已关闭");
    }

    /// 取消作业
    ///
    /// 尚未派发的作业直接进入 Cancelled；已派发的进入 Cancelling 并通知执行后端，
    /// 最终状态由后端的 Cancelled 事件确定。
    pub async fn cancel(&self, job_id: &J) -> OrchestratorResult<()> {
        let job = self.require(job_id).await?;
        let dispatched = match job.status {
            JobStatus::Pending => false,
            JobStatus::Starting | JobStatus::InProgress => true,
            // 调用方提交的取消请求：根据是否已经开始执行区分
            JobStatus::Cancel => job.starting.is_some() || job.started.is_some(),
            other => {
                return Err(OrchestratorError::invalid_transition(
                    other,
                    JobStatus::Cancelling,
                ))
            }
        };

        self.jobs.update_status(job_id, JobStatus::Cancelling).await?;
        if dispatched {
            info!("请求执行后端取消作业 {}", job_id);
            self.worker.cancel(job_id, job.host_id.as_deref()).await?;
        } else {
            self.jobs.update_status(job_id, JobStatus::Cancelled).await?;
            self.metrics.record_finished(JobStatus::Cancelled);
            info!("未派发的作业 {} 已直接取消", job_id);
            if let Some(host_id) = &job.host_id {
                self.stop_idle_instance(host_id).await;
            }
        }
        Ok(())
    }

    /// 处理状态为 Cancel 的作业，返回已处理的作业ID
    pub async fn process_cancel_requests(&self) -> OrchestratorResult<Vec<J>> {
        let requests = self.jobs.get_by_status(JobStatus::Cancel).await?;
        let mut processed = Vec::new();
        for job in requests {
            match self.cancel(&job.id).await {
                Ok(()) => processed.push(job.id),
                Err(e) => error!("处理作业 {} 的取消请求失败: {}", job.id, e),
            }
        }
        Ok(processed)
    }

    pub(crate) async fn require(&self, job_id: &J) -> OrchestratorResult<Job<J, T>> {
        self.jobs
            .get(job_id)
            .await?
            .ok_or_else(|| OrchestratorError::job_not_found(job_id))
    }

    /// 主机上不再有占用容量的作业时停止其云实例
    pub(crate) async fn stop_idle_instance(&self, host_id: &str) {
        let Some(hosts) = &self.hosts else {
            return;
        };
        let result: OrchestratorResult<()> = async {
            let Some(host) = hosts.get(host_id).await? else {
                return Ok(());
            };
            if !host.has_cloud_instance() {
                return Ok(());
            }
            let active = self.jobs.repository().count_active_on_host(host_id).await?;
            if active == 0 {
                self.cloud.stop(&host).await?;
            } else {
                debug!("主机 {} 仍有 {} 个作业，保持云实例运行", host_id, active);
            }
            Ok(())
        }
        .await;

        if let Err(e) = result {
            warn!("停止主机 {} 的云实例失败: {}", host_id, e);
        }
    }
}
