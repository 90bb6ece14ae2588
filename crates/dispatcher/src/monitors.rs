//! 运行中作业的周期性扫描
//!
//! 每个扫描返回本轮被改变状态的作业ID。单个作业处理失败只记录日志，不中断扫描。

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, warn};

use orchestrator_domain::{elapsed_since, Identifier, Job, JobStatus, Task};
use orchestrator_errors::OrchestratorResult;

use crate::job_worker::JobWorker;

impl<J: Identifier, T: Identifier> JobWorker<J, T> {
    /// 心跳超过 `timeout` 未更新的执行中作业标记为 Error
    ///
    /// 尚未上报过心跳的作业不参与判断。
    pub async fn monitor_in_progress_heartbeat(
        &self,
        timeout: Duration,
    ) -> OrchestratorResult<Vec<J>> {
        let now = Utc::now();
        let mut failed = Vec::new();
        for job in self.jobs.get_by_status(JobStatus::InProgress).await? {
            let Some(heartbeat) = job.heartbeat else {
                continue;
            };
            let silence = elapsed_since(heartbeat, now);
            if silence <= timeout {
                continue;
            }

            warn!("作业 {} 已 {} 秒未上报心跳", job.id, silence.as_secs());
            let message = format!("心跳超时: {} 秒未更新", silence.as_secs());
            match self
                .jobs
                .update_status_with_message(&job.id, JobStatus::Error, Some(message))
                .await
            {
                Ok(_) => {
                    self.metrics.record_heartbeat_lost();
                    if let Some(host_id) = &job.host_id {
                        self.stop_idle_instance(host_id).await;
                    }
                    failed.push(job.id);
                }
                Err(e) => error!("标记心跳超时作业 {} 失败: {}", job.id, e),
            }
        }
        Ok(failed)
    }

    /// 按有效超时（作业参数、任务工作流超时、静态超时）检查执行中作业
    pub async fn monitor_timeouts(&self) -> OrchestratorResult<Vec<J>> {
        self.sweep_timeouts(|task, job| task.effective_timeout(&job.parameters))
            .await
    }

    /// 只按任务的静态超时检查执行中作业
    pub async fn clean_long_running_jobs(&self) -> OrchestratorResult<Vec<J>> {
        self.sweep_timeouts(|task, _| Ok(task.static_timeout())).await
    }

    /// Starting 状态停留过久的作业视为启动失败
    pub async fn clean_not_started_jobs(&self) -> OrchestratorResult<Vec<J>> {
        let now = Utc::now();
        let threshold = self.config.starting_timeout;
        let mut failed = Vec::new();
        for job in self.jobs.get_by_status(JobStatus::Starting).await? {
            let since = job.starting.unwrap_or(job.requested);
            if elapsed_since(since, now) <= threshold {
                continue;
            }

            warn!("作业 {} 启动超时 ({} 秒)", job.id, threshold.as_secs());
            match self
                .jobs
                .update_status_with_message(
                    &job.id,
                    JobStatus::Error,
                    Some(format!("作业未能在 {} 秒内启动", threshold.as_secs())),
                )
                .await
            {
                Ok(_) => {
                    self.metrics.record_not_started();
                    if let Some(host_id) = &job.host_id {
                        self.stop_idle_instance(host_id).await;
                    }
                    failed.push(job.id);
                }
                Err(e) => error!("标记启动超时作业 {} 失败: {}", job.id, e),
            }
        }
        Ok(failed)
    }

    async fn sweep_timeouts<F>(&self, timeout_of: F) -> OrchestratorResult<Vec<J>>
    where
        F: Fn(&Task<T>, &Job<J, T>) -> OrchestratorResult<Option<Duration>> + Send + Sync,
    {
        let now = Utc::now();
        let mut timed_out = Vec::new();
        for job in self.jobs.get_by_status(JobStatus::InProgress).await? {
            match self.check_timeout(&job, now, &timeout_of).await {
                Ok(true) => timed_out.push(job.id),
                Ok(false) => {}
                Err(e) => error!("检查作业 {} 超时失败: {}", job.id, e),
            }
        }
        Ok(timed_out)
    }

    async fn check_timeout<F>(
        &self,
        job: &Job<J, T>,
        now: chrono::DateTime<Utc>,
        timeout_of: &F,
    ) -> OrchestratorResult<bool>
    where
        F: Fn(&Task<T>, &Job<J, T>) -> OrchestratorResult<Option<Duration>> + Send + Sync,
    {
        let Some(task) = self.tasks.get(&job.task_id).await? else {
            debug!("作业 {} 的任务 {} 已不存在，跳过超时检查", job.id, job.task_id);
            return Ok(false);
        };
        let Some(timeout) = timeout_of(&task, job)? else {
            return Ok(false);
        };
        let Some(started) = job.started.or(job.starting) else {
            return Ok(false);
        };

        let elapsed = elapsed_since(started, now);
        if elapsed <= timeout {
            return Ok(false);
        }

        warn!(
            "作业 {} 执行超时: 已运行 {} 秒，上限 {} 秒",
            job.id,
            elapsed.as_secs(),
            timeout.as_secs()
        );
        self.jobs
            .update_status_with_message(
                &job.id,
                JobStatus::TimedOut,
                Some(format!("执行超过 {} 秒", timeout.as_secs())),
            )
            .await?;
        self.metrics.record_timed_out();
        if let Err(e) = self.worker.timeout(&job.id, job.host_id.as_deref()).await {
            warn!("通知执行后端作业 {} 超时失败: {}", job.id, e);
        }
        if let Some(host_id) = &job.host_id {
            self.stop_idle_instance(host_id).await;
        }
        Ok(true)
    }
}
