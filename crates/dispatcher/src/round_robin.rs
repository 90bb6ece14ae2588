use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use orchestrator_domain::{Host, HostProbe, Identifier, JobRepository};
use orchestrator_errors::OrchestratorResult;

use crate::cloud_instance::CloudInstanceManager;
use crate::load_balancer::{HostPool, LoadBalancer};

pub const DEFAULT_HOST_RESPONSE_THRESHOLD: Duration = Duration::from_secs(30);

type CursorKey = (Option<String>, i32);

/// 轮询负载均衡
///
/// 同优先级的主机组成一层，从优先级最高的层开始，在层内从上次选中位置之后轮询。
/// 认领前先探测主机存活，超过响应阈值未应答的主机被跳过。游标只保存在内存中，
/// 每次选择先原子地预占起始位置，并发选择不会集中到同一台主机。
pub struct RoundRobinLoadBalancer<J: Identifier, T: Identifier> {
    hosts: HostPool,
    jobs: Arc<dyn JobRepository<J, T>>,
    cloud: Arc<CloudInstanceManager>,
    probe: Arc<dyn HostProbe>,
    response_threshold: Duration,
    cursors: Mutex<HashMap<CursorKey, usize>>,
}

impl<J: Identifier, T: Identifier> RoundRobinLoadBalancer<J, T> {
    pub fn new(
        hosts: HostPool,
        jobs: Arc<dyn JobRepository<J, T>>,
        cloud: Arc<CloudInstanceManager>,
        probe: Arc<dyn HostProbe>,
    ) -> Self {
        Self {
            hosts,
            jobs,
            cloud,
            probe,
            response_threshold: DEFAULT_HOST_RESPONSE_THRESHOLD,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_response_threshold(mut self, threshold: Duration) -> Self {
        self.response_threshold = threshold;
        self
    }

    /// 在同一临界区内读出游标并预占下一个位置，并发的选择从不同主机开始
    fn reserve(&self, key: &CursorKey, len: usize) -> usize {
        let mut cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
        let start = cursors.get(key).copied().unwrap_or(0) % len;
        cursors.insert(key.clone(), (start + 1) % len);
        start
    }

    /// 预占之后游标未被其它选择移动时，按实际结果修正游标
    fn settle(&self, key: CursorKey, reserved: usize, next: usize) {
        let mut cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
        if cursors.get(&key) == Some(&reserved) {
            cursors.insert(key, next);
        }
    }

    async fn is_available(&self, host: &Host) -> bool {
        match tokio::time::timeout(self.response_threshold, self.probe.is_host_available(&host.id))
            .await
        {
            Ok(Ok(true)) => true,
            Ok(Ok(false)) => {
                debug!("主机 {} 不可用，跳过", host.full_name());
                false
            }
            Ok(Err(e)) => {
                warn!("探测主机 {} 失败: {}", host.full_name(), e);
                false
            }
            Err(_) => {
                warn!(
                    "主机 {} 在 {:?} 内未响应，跳过",
                    host.full_name(),
                    self.response_threshold
                );
                false
            }
        }
    }
}

#[async_trait]
impl<J: Identifier, T: Identifier> LoadBalancer<J> for RoundRobinLoadBalancer<J, T> {
    async fn get_host(
        &self,
        job_id: &J,
        host_group: Option<&str>,
    ) -> OrchestratorResult<Option<Host>> {
        if self.response_threshold.is_zero() {
            debug!("主机响应阈值为0，视为所有主机不可用");
            return Ok(None);
        }

        let mut tiers: BTreeMap<i32, Vec<Host>> = BTreeMap::new();
        for host in self.hosts.candidates(host_group).await? {
            tiers.entry(host.priority).or_default().push(host);
        }

        for (priority, tier) in tiers {
            let key: CursorKey = (host_group.map(str::to_string), priority);
            let len = tier.len();
            let start = self.reserve(&key, len);
            let reserved = (start + 1) % len;

            for offset in 0..len {
                let index = (start + offset) % len;
                let host = &tier[index];

                if !self.is_available(host).await {
                    continue;
                }
                let claimed = self
                    .jobs
                    .try_assign_host(job_id, &host.id, host.group.as_deref(), host.running_jobs_limit)
                    .await?;
                if !claimed {
                    continue;
                }

                self.settle(key, reserved, (index + 1) % len);
                debug!(
                    "轮询策略选择主机: {} (优先级: {}, 索引: {}/{}) -> 作业 {}",
                    host.full_name(),
                    priority,
                    index,
                    len,
                    job_id
                );
                self.cloud.ensure_started(host).await?;
                return Ok(Some(host.clone()));
            }
            self.settle(key, reserved, start);
        }

        debug!("没有可用且有剩余容量的主机，作业 {} 继续等待", job_id);
        Ok(None)
    }

    fn name(&self) -> &str {
        "RoundRobin"
    }
}
