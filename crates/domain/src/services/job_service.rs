use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use orchestrator_errors::{OrchestratorError, OrchestratorResult};

use crate::entities::{Job, JobStatus};
use crate::events::{EventPublisher, JobEvent};
use crate::query::{JobField, JobFilter, Query, QueryCondition, QueryValue};
use crate::repositories::{AccountRepository, JobRepository, TaskRepository};
use crate::value_objects::{Identifier, Progress};

/// 作业服务
///
/// 所有对作业的修改都必须经过该服务，保证校验、状态机检查与事件通知一致。
pub struct JobService<J: Identifier, T: Identifier> {
    job_repository: Arc<dyn JobRepository<J, T>>,
    task_repository: Arc<dyn TaskRepository<T>>,
    account_repository: Option<Arc<dyn AccountRepository>>,
    events: EventPublisher<JobEvent<J, T>>,
}

impl<J: Identifier, T: Identifier> JobService<J, T> {
    pub fn new(
        job_repository: Arc<dyn JobRepository<J, T>>,
        task_repository: Arc<dyn TaskRepository<T>>,
    ) -> Self {
        Self {
            job_repository,
            task_repository,
            account_repository: None,
            events: EventPublisher::new(),
        }
    }

    pub fn with_account_repository(mut self, repository: Arc<dyn AccountRepository>) -> Self {
        self.account_repository = Some(repository);
        self
    }

    pub fn events(&self) -> &EventPublisher<JobEvent<J, T>> {
        &self.events
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<JobEvent<J, T>> {
        self.events.subscribe()
    }

    pub fn repository(&self) -> Arc<dyn JobRepository<J, T>> {
        Arc::clone(&self.job_repository)
    }

    async fn validate(&self, job: &Job<J, T>) -> OrchestratorResult<()> {
        let task = self
            .task_repository
            .get(&job.task_id)
            .await?
            .ok_or_else(|| OrchestratorError::task_not_found(&job.task_id))?;

        if let (Some(account_id), Some(accounts)) = (&job.account_id, &self.account_repository) {
            if !accounts.contains(account_id).await? {
                return Err(OrchestratorError::account_not_found(account_id));
            }
        }

        let mut undeclared = task.undeclared_parameters(job.parameters.keys());
        if !undeclared.is_empty() {
            undeclared.sort();
            return Err(OrchestratorError::invalid_argument(format!(
                "任务 {} 未声明参数: {}",
                task.id,
                undeclared.join(", ")
            )));
        }

        let missing = task.missing_required_parameters(&job.parameters);
        if !missing.is_empty() {
            return Err(OrchestratorError::invalid_argument(format!(
                "任务 {} 缺少必填参数: {}",
                task.id,
                missing.join(", ")
            )));
        }

        // 提前暴露无法解析的 WorkflowTimeout
        task.effective_timeout(&job.parameters)?;
        Ok(())
    }

    async fn require(&self, id: &J) -> OrchestratorResult<Job<J, T>> {
        self.job_repository
            .get(id)
            .await?
            .ok_or_else(|| OrchestratorError::job_not_found(id))
    }

    async fn save(&self, job: Job<J, T>) -> OrchestratorResult<Job<J, T>> {
        self.events.publish(JobEvent::Updating(job.clone()));
        self.job_repository.update(&job).await?;
        self.events.publish(JobEvent::Updated(job.clone()));
        Ok(job)
    }

    pub async fn add(&self, job: Job<J, T>) -> OrchestratorResult<Job<J, T>> {
        if self.job_repository.contains(&job.id).await? {
            return Err(OrchestratorError::JobAlreadyExists {
                id: job.id.to_string(),
            });
        }
        self.validate(&job).await?;

        self.events.publish(JobEvent::Adding(job.clone()));
        self.job_repository.add(&job).await?;
        self.events.publish(JobEvent::Added(job.clone()));

        info!("作业已添加: {} (任务: {}, 优先级: {})", job.id, job.task_id, job.priority);
        Ok(job)
    }

    /// 整体更新作业，状态变化需满足状态机规则
    pub async fn update(&self, job: Job<J, T>) -> OrchestratorResult<Job<J, T>> {
        let existing = self.require(&job.id).await?;
        self.validate(&job).await?;

        let mut updated = job;
        let target = updated.status;
        if existing.status != target {
            updated.status = existing.status;
            updated.transition_to(target)?;
        }

        debug!("更新作业: {} ({} -> {})", updated.id, existing.status, target);
        self.save(updated).await
    }

    pub async fn update_status(&self, id: &J, status: JobStatus) -> OrchestratorResult<Job<J, T>> {
        self.update_status_with_message(id, status, None).await
    }

    pub async fn update_status_with_message(
        &self,
        id: &J,
        status: JobStatus,
        message: Option<String>,
    ) -> OrchestratorResult<Job<J, T>> {
        let mut job = self.require(id).await?;
        let previous = job.status;
        job.transition_to(status)?;
        if message.is_some() {
            job.error_message = message;
        }

        debug!("作业状态变更: {} {} -> {}", job.id, previous, status);
        self.save(job).await
    }

    pub async fn update_heartbeat(&self, id: &J) -> OrchestratorResult<Job<J, T>> {
        let mut job = self.require(id).await?;
        job.heartbeat = Some(Utc::now());
        self.save(job).await
    }

    /// 更新进度，同时刷新心跳
    pub async fn update_progress(
        &self,
        id: &J,
        progress: Progress,
    ) -> OrchestratorResult<Job<J, T>> {
        let mut job = self.require(id).await?;
        job.progress = Some(progress);
        job.heartbeat = Some(Utc::now());
        self.save(job).await
    }

    pub async fn remove(&self, id: &J) -> OrchestratorResult<()> {
        if !self.job_repository.contains(id).await? {
            return Err(OrchestratorError::job_not_found(id));
        }

        self.events.publish(JobEvent::Deleting(id.clone()));
        self.job_repository.remove(id).await?;
        self.events.publish(JobEvent::Deleted(id.clone()));

        info!("作业已删除: {}", id);
        Ok(())
    }

    pub async fn remove_by_filter(&self, filter: JobFilter<T>) -> OrchestratorResult<u64> {
        self.events.publish(JobEvent::DeletingMultiple(filter.clone()));
        let count = self.job_repository.remove_by_query(&filter.to_query()).await?;
        self.events.publish(JobEvent::DeletedMultiple { filter, count });

        info!("按条件删除作业: {} 条", count);
        Ok(count)
    }

    pub async fn get(&self, id: &J) -> OrchestratorResult<Option<Job<J, T>>> {
        self.job_repository.get(id).await
    }

    /// 结果按请求时间倒序
    pub async fn get_by_filter(&self, filter: &JobFilter<T>) -> OrchestratorResult<Vec<Job<J, T>>> {
        let mut jobs = self.job_repository.get_by_query(&filter.to_query()).await?;
        sort_newest_first(&mut jobs);
        Ok(jobs)
    }

    pub async fn get_by_status(&self, status: JobStatus) -> OrchestratorResult<Vec<Job<J, T>>> {
        let query =
            Query::new().and(QueryCondition::equals(JobField::Status, QueryValue::Status(status)));
        self.job_repository.get_by_query(&query).await
    }

    pub async fn get_last(&self, filter: &JobFilter<T>) -> OrchestratorResult<Option<Job<J, T>>> {
        self.job_repository.get_last(&filter.to_query()).await
    }

    /// 没有匹配的作业时返回 `Unknown`
    pub async fn get_last_status(&self, filter: &JobFilter<T>) -> OrchestratorResult<JobStatus> {
        Ok(self
            .get_last(filter)
            .await?
            .map(|job| job.status)
            .unwrap_or_default())
    }

    pub async fn get_all(&self) -> OrchestratorResult<Vec<Job<J, T>>> {
        let mut jobs = self.job_repository.get_all().await?;
        sort_newest_first(&mut jobs);
        Ok(jobs)
    }

    pub async fn count(&self, filter: &JobFilter<T>) -> OrchestratorResult<u64> {
        self.job_repository.count(&filter.to_query()).await
    }

    pub async fn contains(&self, id: &J) -> OrchestratorResult<bool> {
        self.job_repository.contains(id).await
    }
}

fn sort_newest_first<J, T>(jobs: &mut [Job<J, T>]) {
    jobs.sort_by(|a, b| b.requested.cmp(&a.requested));
}
