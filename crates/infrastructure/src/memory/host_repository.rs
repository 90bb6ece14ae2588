use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use orchestrator_domain::{GroupedHostRepository, Host, HostRepository};
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

type HostMap = Arc<RwLock<HashMap<String, Host>>>;

async fn insert(hosts: &HostMap, host: &Host) -> OrchestratorResult<()> {
    let mut hosts = hosts.write().await;
    if hosts.contains_key(&host.id) {
        return Err(OrchestratorError::HostAlreadyExists {
            id: host.id.clone(),
        });
    }
    hosts.insert(host.id.clone(), host.clone());
    Ok(())
}

async fn replace(hosts: &HostMap, host: &Host) -> OrchestratorResult<()> {
    let mut hosts = hosts.write().await;
    match hosts.get_mut(&host.id) {
        Some(existing) => {
            *existing = host.clone();
            Ok(())
        }
        None => Err(OrchestratorError::host_not_found(&host.id)),
    }
}

async fn sorted(hosts: &HostMap) -> Vec<Host> {
    let mut all: Vec<Host> = hosts.read().await.values().cloned().collect();
    all.sort_by(|a, b| a.id.cmp(&b.id));
    all
}

/// 内存主机仓储（不分组）
#[derive(Debug, Clone, Default)]
pub struct InMemoryHostRepository {
    hosts: HostMap,
}

impl InMemoryHostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hosts(hosts: Vec<Host>) -> Self {
        let map = hosts.into_iter().map(|h| (h.id.clone(), h)).collect();
        Self {
            hosts: Arc::new(RwLock::new(map)),
        }
    }
}

#[async_trait]
impl HostRepository for InMemoryHostRepository {
    async fn add(&self, host: &Host) -> OrchestratorResult<()> {
        insert(&self.hosts, host).await
    }

    async fn update(&self, host: &Host) -> OrchestratorResult<()> {
        replace(&self.hosts, host).await
    }

    async fn remove(&self, id: &str) -> OrchestratorResult<bool> {
        Ok(self.hosts.write().await.remove(id).is_some())
    }

    async fn get(&self, id: &str) -> OrchestratorResult<Option<Host>> {
        Ok(self.hosts.read().await.get(id).cloned())
    }

    async fn get_all(&self) -> OrchestratorResult<Vec<Host>> {
        Ok(sorted(&self.hosts).await)
    }

    async fn count(&self) -> OrchestratorResult<u64> {
        Ok(self.hosts.read().await.len() as u64)
    }

    async fn contains(&self, id: &str) -> OrchestratorResult<bool> {
        Ok(self.hosts.read().await.contains_key(id))
    }

    async fn set_running_jobs_limit(&self, id: &str, limit: u32) -> OrchestratorResult<()> {
        let mut hosts = self.hosts.write().await;
        let host = hosts
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::host_not_found(id))?;
        host.running_jobs_limit = limit;
        Ok(())
    }
}

/// 内存主机仓储（按组）
#[derive(Debug, Clone, Default)]
pub struct InMemoryGroupedHostRepository {
    hosts: HostMap,
}

impl InMemoryGroupedHostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hosts(hosts: Vec<Host>) -> Self {
        let map = hosts.into_iter().map(|h| (h.id.clone(), h)).collect();
        Self {
            hosts: Arc::new(RwLock::new(map)),
        }
    }
}

#[async_trait]
impl HostRepository for InMemoryGroupedHostRepository {
    async fn add(&self, host: &Host) -> OrchestratorResult<()> {
        if host.group.is_none() {
            return Err(OrchestratorError::HostGroupRequired);
        }
        insert(&self.hosts, host).await
    }

    async fn update(&self, host: &Host) -> OrchestratorResult<()> {
        if host.group.is_none() {
            return Err(OrchestratorError::HostGroupRequired);
        }
        replace(&self.hosts, host).await
    }

    async fn remove(&self, id: &str) -> OrchestratorResult<bool> {
        Ok(self.hosts.write().await.remove(id).is_some())
    }

    async fn get(&self, id: &str) -> OrchestratorResult<Option<Host>> {
        Ok(self.hosts.read().await.get(id).cloned())
    }

    async fn get_all(&self) -> OrchestratorResult<Vec<Host>> {
        Ok(sorted(&self.hosts).await)
    }

    async fn count(&self) -> OrchestratorResult<u64> {
        Ok(self.hosts.read().await.len() as u64)
    }

    async fn contains(&self, id: &str) -> OrchestratorResult<bool> {
        Ok(self.hosts.read().await.contains_key(id))
    }

    async fn set_running_jobs_limit(&self, id: &str, limit: u32) -> OrchestratorResult<()> {
        let mut hosts = self.hosts.write().await;
        let host = hosts
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::host_not_found(id))?;
        host.running_jobs_limit = limit;
        Ok(())
    }
}

#[async_trait]
impl GroupedHostRepository for InMemoryGroupedHostRepository {
    async fn get_by_group(&self, group: &str) -> OrchestratorResult<Vec<Host>> {
        Ok(sorted(&self.hosts)
            .await
            .into_iter()
            .filter(|host| host.group.as_deref() == Some(group))
            .collect())
    }
}
