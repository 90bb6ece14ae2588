use std::sync::Arc;

use tracing::{debug, info};

use orchestrator_errors::{OrchestratorError, OrchestratorResult};

use crate::entities::Host;
use crate::events::{EventPublisher, HostEvent};
use crate::repositories::{GroupedHostRepository, HostRepository};

async fn require_host<R>(repository: &R, id: &str) -> OrchestratorResult<Host>
where
    R: HostRepository + ?Sized,
{
    repository
        .get(id)
        .await?
        .ok_or_else(|| OrchestratorError::host_not_found(id))
}

async fn add_host<R>(
    repository: &R,
    events: &EventPublisher<HostEvent>,
    host: Host,
) -> OrchestratorResult<Host>
where
    R: HostRepository + ?Sized,
{
    if repository.contains(&host.id).await? {
        return Err(OrchestratorError::HostAlreadyExists { id: host.id });
    }

    events.publish(HostEvent::Adding(host.clone()));
    repository.add(&host).await?;
    events.publish(HostEvent::Added(host.clone()));

    info!(
        "主机已添加: {} (优先级: {}, 并发上限: {})",
        host.full_name(),
        host.priority,
        host.running_jobs_limit
    );
    Ok(host)
}

async fn update_host<R>(
    repository: &R,
    events: &EventPublisher<HostEvent>,
    host: Host,
) -> OrchestratorResult<Host>
where
    R: HostRepository + ?Sized,
{
    if !repository.contains(&host.id).await? {
        return Err(OrchestratorError::host_not_found(&host.id));
    }

    events.publish(HostEvent::Updating(host.clone()));
    repository.update(&host).await?;
    events.publish(HostEvent::Updated(host.clone()));

    debug!("主机已更新: {}", host.full_name());
    Ok(host)
}

async fn rename_host<R>(
    repository: &R,
    events: &EventPublisher<HostEvent>,
    id: &str,
    new_id: &str,
) -> OrchestratorResult<Host>
where
    R: HostRepository + ?Sized,
{
    let existing = require_host(repository, id).await?;
    if id == new_id {
        return Ok(existing);
    }
    if repository.contains(new_id).await? {
        return Err(OrchestratorError::HostAlreadyExists {
            id: new_id.to_string(),
        });
    }

    let mut renamed = existing;
    renamed.id = new_id.to_string();

    events.publish(HostEvent::Updating(renamed.clone()));
    repository.remove(id).await?;
    repository.add(&renamed).await?;
    events.publish(HostEvent::Updated(renamed.clone()));

    info!("主机已重命名: {} -> {}", id, new_id);
    Ok(renamed)
}

async fn remove_host<R>(
    repository: &R,
    events: &EventPublisher<HostEvent>,
    id: &str,
) -> OrchestratorResult<()>
where
    R: HostRepository + ?Sized,
{
    if !repository.contains(id).await? {
        return Err(OrchestratorError::host_not_found(id));
    }

    events.publish(HostEvent::Deleting(id.to_string()));
    repository.remove(id).await?;
    events.publish(HostEvent::Deleted(id.to_string()));

    info!("主机已删除: {}", id);
    Ok(())
}

async fn set_limit<R>(
    repository: &R,
    events: &EventPublisher<HostEvent>,
    id: &str,
    limit: u32,
) -> OrchestratorResult<Host>
where
    R: HostRepository + ?Sized,
{
    let mut host = require_host(repository, id).await?;
    host.running_jobs_limit = limit;

    events.publish(HostEvent::Updating(host.clone()));
    repository.set_running_jobs_limit(id, limit).await?;
    events.publish(HostEvent::Updated(host.clone()));

    info!("主机 {} 并发上限调整为 {}", host.full_name(), limit);
    Ok(host)
}

async fn create_dynamic_host<R>(
    repository: &R,
    events: &EventPublisher<HostEvent>,
    group: Option<&str>,
) -> OrchestratorResult<Host>
where
    R: HostRepository + ?Sized,
{
    let host = repository.create_host(group).await?;
    events.publish(HostEvent::Added(host.clone()));
    info!("动态创建主机: {}", host.full_name());
    Ok(host)
}

/// 不分组的主机服务
pub struct HostService {
    repository: Arc<dyn HostRepository>,
    events: EventPublisher<HostEvent>,
}

impl HostService {
    pub fn new(repository: Arc<dyn HostRepository>) -> Self {
        Self {
            repository,
            events: EventPublisher::new(),
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }

    fn ensure_ungrouped(host: &Host) -> OrchestratorResult<()> {
        match &host.group {
            Some(group) => Err(OrchestratorError::invalid_argument(format!(
                "主机 {} 指定了主机组 {}，但主机仓储不分组",
                host.id, group
            ))),
            None => Ok(()),
        }
    }

    pub async fn add(&self, host: Host) -> OrchestratorResult<Host> {
        Self::ensure_ungrouped(&host)?;
        add_host(&*self.repository, &self.events, host).await
    }

    pub async fn update(&self, host: Host) -> OrchestratorResult<Host> {
        Self::ensure_ungrouped(&host)?;
        update_host(&*self.repository, &self.events, host).await
    }

    pub async fn rename(&self, id: &str, new_id: &str) -> OrchestratorResult<Host> {
        rename_host(&*self.repository, &self.events, id, new_id).await
    }

    pub async fn add_or_update(&self, host: Host) -> OrchestratorResult<Host> {
        if self.repository.contains(&host.id).await? {
            self.update(host).await
        } else {
            self.add(host).await
        }
    }

    pub async fn remove(&self, id: &str) -> OrchestratorResult<()> {
        remove_host(&*self.repository, &self.events, id).await
    }

    pub async fn get(&self, id: &str) -> OrchestratorResult<Option<Host>> {
        self.repository.get(id).await
    }

    pub async fn get_all(&self) -> OrchestratorResult<Vec<Host>> {
        self.repository.get_all().await
    }

    pub async fn count(&self) -> OrchestratorResult<u64> {
        self.repository.count().await
    }

    pub async fn exists(&self, id: &str) -> OrchestratorResult<bool> {
        self.repository.contains(id).await
    }

    pub async fn set_running_jobs_limit(&self, id: &str, limit: u32) -> OrchestratorResult<Host> {
        set_limit(&*self.repository, &self.events, id, limit).await
    }

    pub async fn create_host(&self) -> OrchestratorResult<Host> {
        create_dynamic_host(&*self.repository, &self.events, None).await
    }
}

/// 按组管理的主机服务
pub struct GroupedHostService {
    repository: Arc<dyn GroupedHostRepository>,
    events: EventPublisher<HostEvent>,
}

impl GroupedHostService {
    pub fn new(repository: Arc<dyn GroupedHostRepository>) -> Self {
        Self {
            repository,
            events: EventPublisher::new(),
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }

    fn ensure_grouped(host: &Host) -> OrchestratorResult<()> {
        match host.group.as_deref() {
            Some(group) if !group.is_empty() => Ok(()),
            _ => Err(OrchestratorError::invalid_argument(format!(
                "主机 {} 未指定主机组",
                host.id
            ))),
        }
    }

    pub async fn add(&self, host: Host) -> OrchestratorResult<Host> {
        Self::ensure_grouped(&host)?;
        add_host(&*self.repository, &self.events, host).await
    }

    pub async fn update(&self, host: Host) -> OrchestratorResult<Host> {
        Self::ensure_grouped(&host)?;
        update_host(&*self.repository, &self.events, host).await
    }

    pub async fn rename(&self, id: &str, new_id: &str) -> OrchestratorResult<Host> {
        rename_host(&*self.repository, &self.events, id, new_id).await
    }

    pub async fn add_or_update(&self, host: Host) -> OrchestratorResult<Host> {
        if self.repository.contains(&host.id).await? {
            self.update(host).await
        } else {
            self.add(host).await
        }
    }

    pub async fn remove(&self, id: &str) -> OrchestratorResult<()> {
        remove_host(&*self.repository, &self.events, id).await
    }

    pub async fn get(&self, id: &str) -> OrchestratorResult<Option<Host>> {
        self.repository.get(id).await
    }

    pub async fn get_all(&self) -> OrchestratorResult<Vec<Host>> {
        self.repository.get_all().await
    }

    pub async fn count(&self) -> OrchestratorResult<u64> {
        self.repository.count().await
    }

    pub async fn exists(&self, id: &str) -> OrchestratorResult<bool> {
        self.repository.contains(id).await
    }

    pub async fn set_running_jobs_limit(&self, id: &str, limit: u32) -> OrchestratorResult<Host> {
        set_limit(&*self.repository, &self.events, id, limit).await
    }

    pub async fn create_host(&self, group: &str) -> OrchestratorResult<Host> {
        create_dynamic_host(&*self.repository, &self.events, Some(group)).await
    }

    pub async fn get_by_group(&self, group: &str) -> OrchestratorResult<Vec<Host>> {
        self.repository.get_by_group(group).await
    }

    pub async fn group_exists(&self, group: &str) -> OrchestratorResult<bool> {
        self.repository.group_exists(group).await
    }

    /// 组内主机的 `group/id` 名称，按名称排序
    pub async fn get_full_names(&self, group: &str) -> OrchestratorResult<Vec<String>> {
        if !self.repository.group_exists(group).await? {
            return Err(OrchestratorError::group_not_found(group));
        }
        let mut names: Vec<String> = self
            .repository
            .get_by_group(group)
            .await?
            .iter()
            .map(Host::full_name)
            .collect();
        names.sort();
        Ok(names)
    }
}
