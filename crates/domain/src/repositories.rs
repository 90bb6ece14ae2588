//! 领域仓储抽象
//!
//! 作业、任务、账户与主机的存储由外部实现，引擎只依赖这些trait。

use async_trait::async_trait;

use orchestrator_errors::{OrchestratorError, OrchestratorResult};

use crate::entities::{Host, Job, JobStatus, Task};
use crate::query::{JobField, Query, QueryCondition, QueryOperator, QueryValue};
use crate::value_objects::Identifier;

/// 作业仓储抽象
#[async_trait]
pub trait JobRepository<J: Identifier, T: Identifier>: Send + Sync {
    async fn add(&self, job: &Job<J, T>) -> OrchestratorResult<()>;
    async fn update(&self, job: &Job<J, T>) -> OrchestratorResult<()>;
    async fn remove(&self, id: &J) -> OrchestratorResult<bool>;
    async fn remove_by_query(&self, query: &Query) -> OrchestratorResult<u64>;
    async fn get(&self, id: &J) -> OrchestratorResult<Option<Job<J, T>>>;
    async fn get_all(&self) -> OrchestratorResult<Vec<Job<J, T>>>;
    async fn get_by_query(&self, query: &Query) -> OrchestratorResult<Vec<Job<J, T>>>;
    /// 按请求时间最新的一条
    async fn get_last(&self, query: &Query) -> OrchestratorResult<Option<Job<J, T>>>;
    async fn count(&self, query: &Query) -> OrchestratorResult<u64>;
    async fn contains(&self, id: &J) -> OrchestratorResult<bool>;

    /// 原子地占用主机容量
    ///
    /// 统计分配到该主机上占用容量（见 [`JobStatus::occupies_host`]）的其它作业数，小于上限时把作业
    /// 的主机和主机组写入并返回 `true`。统计与写入在同一临界区内完成。
    async fn try_assign_host(
        &self,
        id: &J,
        host_id: &str,
        host_group: Option<&str>,
        running_jobs_limit: u32,
    ) -> OrchestratorResult<bool>;

    /// 主机上占用容量的作业数
    async fn count_active_on_host(&self, host_id: &str) -> OrchestratorResult<u64> {
        let mut total = 0;
        for status in [JobStatus::Pending, JobStatus::Starting, JobStatus::InProgress] {
            let query = Query::new()
                .and(QueryCondition::equals(
                    JobField::HostId,
                    QueryValue::Text(host_id.to_string()),
                ))
                .and(QueryCondition::new(
                    JobField::Status,
                    QueryOperator::Equal,
                    QueryValue::Status(status),
                ));
            total += self.count(&query).await?;
        }
        Ok(total)
    }
}

/// 任务仓储抽象（只读）
#[async_trait]
pub trait TaskRepository<T: Identifier>: Send + Sync {
    async fn get(&self, id: &T) -> OrchestratorResult<Option<Task<T>>>;
    async fn get_all(&self) -> OrchestratorResult<Vec<Task<T>>>;
    async fn contains(&self, id: &T) -> OrchestratorResult<bool>;
}

/// 账户仓储抽象
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn contains(&self, id: &str) -> OrchestratorResult<bool>;
}

/// 主机仓储抽象
#[async_trait]
pub trait HostRepository: Send + Sync {
    async fn add(&self, host: &Host) -> OrchestratorResult<()>;
    async fn update(&self, host: &Host) -> OrchestratorResult<()>;
    async fn remove(&self, id: &str) -> OrchestratorResult<bool>;
    async fn get(&self, id: &str) -> OrchestratorResult<Option<Host>>;
    async fn get_all(&self) -> OrchestratorResult<Vec<Host>>;
    async fn count(&self) -> OrchestratorResult<u64>;
    async fn contains(&self, id: &str) -> OrchestratorResult<bool>;

    /// 调整主机的并发作业上限
    async fn set_running_jobs_limit(&self, id: &str, limit: u32) -> OrchestratorResult<()> {
        let mut host = self
            .get(id)
            .await?
            .ok_or_else(|| OrchestratorError::host_not_found(id))?;
        host.running_jobs_limit = limit;
        self.update(&host).await
    }

    /// 动态创建主机，默认不支持
    async fn create_host(&self, _group: Option<&str>) -> OrchestratorResult<Host> {
        Err(OrchestratorError::unsupported("无法动态创建主机"))
    }
}

/// 按组管理的主机仓储
#[async_trait]
pub trait GroupedHostRepository: HostRepository {
    async fn get_by_group(&self, group: &str) -> OrchestratorResult<Vec<Host>>;

    async fn group_exists(&self, group: &str) -> OrchestratorResult<bool> {
        Ok(!self.get_by_group(group).await?.is_empty())
    }
}
