use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use orchestrator_domain::{GroupedHostRepository, Host, HostRepository, Identifier, JobRepository};
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

use crate::cloud_instance::CloudInstanceManager;

/// 主机选择策略
///
/// 选中主机的同时原子地把作业分配到该主机上，返回 `None` 表示当前没有剩余容量。
#[async_trait]
pub trait LoadBalancer<J: Identifier>: Send + Sync {
    async fn get_host(
        &self,
        job_id: &J,
        host_group: Option<&str>,
    ) -> OrchestratorResult<Option<Host>>;

    fn name(&self) -> &str;
}

/// 负载均衡器可见的主机集合
#[derive(Clone)]
pub enum HostPool {
    Flat(Arc<dyn HostRepository>),
    Grouped(Arc<dyn GroupedHostRepository>),
}

impl HostPool {
    /// 按 (优先级, ID) 升序返回候选主机
    pub async fn candidates(&self, host_group: Option<&str>) -> OrchestratorResult<Vec<Host>> {
        let mut hosts = match (self, host_group) {
            (HostPool::Flat(_), Some(group)) => {
                return Err(OrchestratorError::invalid_argument(format!(
                    "主机仓储不分组，不能指定主机组: {group}"
                )));
            }
            (HostPool::Flat(repository), None) => repository.get_all().await?,
            (HostPool::Grouped(_), None) => return Err(OrchestratorError::HostGroupRequired),
            (HostPool::Grouped(repository), Some(group)) => {
                if !repository.group_exists(group).await? {
                    return Err(OrchestratorError::group_not_found(group));
                }
                repository.get_by_group(group).await?
            }
        };
        hosts.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(hosts)
    }

    pub async fn get(&self, host_id: &str) -> OrchestratorResult<Option<Host>> {
        match self {
            HostPool::Flat(repository) => repository.get(host_id).await,
            HostPool::Grouped(repository) => repository.get(host_id).await,
        }
    }
}

/// 优先级负载均衡
///
/// 依次尝试优先级最高（数值最小）的主机，第一个仍有容量的主机胜出。
pub struct PriorityLoadBalancer<J: Identifier, T: Identifier> {
    hosts: HostPool,
    jobs: Arc<dyn JobRepository<J, T>>,
    cloud: Arc<CloudInstanceManager>,
}

impl<J: Identifier, T: Identifier> PriorityLoadBalancer<J, T> {
    pub fn new(
        hosts: HostPool,
        jobs: Arc<dyn JobRepository<J, T>>,
        cloud: Arc<CloudInstanceManager>,
    ) -> Self {
        Self { hosts, jobs, cloud }
    }
}

#[async_trait]
impl<J: Identifier, T: Identifier> LoadBalancer<J> for PriorityLoadBalancer<J, T> {
    async fn get_host(
        &self,
        job_id: &J,
        host_group: Option<&str>,
    ) -> OrchestratorResult<Option<Host>> {
        let candidates = self.hosts.candidates(host_group).await?;
        if candidates.is_empty() {
            debug!("没有可用的主机");
            return Ok(None);
        }

        for host in candidates {
            let claimed = self
                .jobs
                .try_assign_host(job_id, &host.id, host.group.as_deref(), host.running_jobs_limit)
                .await?;
            if claimed {
                debug!(
                    "优先级策略选择主机: {} (优先级: {}) -> 作业 {}",
                    host.full_name(),
                    host.priority,
                    job_id
                );
                self.cloud.ensure_started(&host).await?;
                return Ok(Some(host));
            }
        }

        debug!("所有主机均已达到并发上限，作业 {} 继续等待", job_id);
        Ok(None)
    }

    fn name(&self) -> &str {
        "Priority"
    }
}
