use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use orchestrator_domain::{
    CloudInstanceHandler, CloudInstanceHandlerRegistry, CloudInstanceParameters,
    CloudInstanceStatus, Host, HostEvent,
};
use orchestrator_errors::OrchestratorResult;

/// 缓存的处理器及构建它时的主机云实例配置
struct CachedHandler {
    handler_type: String,
    parameters: CloudInstanceParameters,
    handler: Arc<dyn CloudInstanceHandler>,
}

impl CachedHandler {
    fn built_for(&self, handler_type: &str, host: &Host) -> bool {
        self.handler_type == handler_type && self.parameters == host.cloud_instance_parameters
    }
}

/// 云实例处理器的按主机缓存
///
/// 处理器在第一次访问时通过注册表构建，之后复用同一个实例。
/// 主机的处理器类型或参数变化后重新构建。
pub struct CloudInstanceManager {
    registry: CloudInstanceHandlerRegistry,
    handlers: RwLock<HashMap<String, CachedHandler>>,
}

impl CloudInstanceManager {
    pub fn new(registry: CloudInstanceHandlerRegistry) -> Self {
        Self {
            registry,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// 主机没有配置云实例时返回 `None`
    pub async fn handler_for(
        &self,
        host: &Host,
    ) -> OrchestratorResult<Option<Arc<dyn CloudInstanceHandler>>> {
        let Some(handler_type) = host.cloud_instance_handler_type.as_deref() else {
            return Ok(None);
        };

        if let Some(cached) = self.handlers.read().await.get(&host.id) {
            if cached.built_for(handler_type, host) {
                return Ok(Some(Arc::clone(&cached.handler)));
            }
        }

        let mut handlers = self.handlers.write().await;
        if let Some(cached) = handlers.get(&host.id) {
            if cached.built_for(handler_type, host) {
                return Ok(Some(Arc::clone(&cached.handler)));
            }
            debug!("主机 {} 的云实例配置已变化，重建处理器", host.id);
        }
        let handler = self
            .registry
            .create(handler_type, &host.cloud_instance_parameters)?;
        debug!("为主机 {} 创建云实例处理器: {}", host.id, handler_type);
        handlers.insert(
            host.id.clone(),
            CachedHandler {
                handler_type: handler_type.to_string(),
                parameters: host.cloud_instance_parameters.clone(),
                handler: Arc::clone(&handler),
            },
        );
        Ok(Some(handler))
    }

    pub async fn status_of(&self, host: &Host) -> OrchestratorResult<Option<CloudInstanceStatus>> {
        match self.handler_for(host).await? {
            Some(handler) => Ok(Some(handler.status().await?)),
            None => Ok(None),
        }
    }

    /// 云实例处于 Stopped 时在后台启动，不等待启动完成
    pub async fn ensure_started(&self, host: &Host) -> OrchestratorResult<()> {
        let Some(handler) = self.handler_for(host).await? else {
            return Ok(());
        };
        if handler.status().await? != CloudInstanceStatus::Stopped {
            return Ok(());
        }

        info!("主机 {} 的云实例已停止，开始启动", host.full_name());
        let host_id = host.id.clone();
        tokio::spawn(async move {
            if let Err(e) = handler.start().await {
                error!("启动主机 {} 的云实例失败: {}", host_id, e);
            }
        });
        Ok(())
    }

    pub async fn stop(&self, host: &Host) -> OrchestratorResult<()> {
        if let Some(handler) = self.handler_for(host).await? {
            info!("停止主机 {} 的云实例", host.full_name());
            handler.stop().await?;
        }
        Ok(())
    }

    /// 丢弃主机缓存的处理器
    pub async fn evict(&self, host_id: &str) {
        if self.handlers.write().await.remove(host_id).is_some() {
            debug!("已丢弃主机 {} 的云实例处理器", host_id);
        }
    }

    /// 主机删除时丢弃处理器，主机更新后不再使用云实例时同样丢弃
    pub async fn handle_host_event(&self, event: &HostEvent) {
        match event {
            HostEvent::Deleted(host_id) => self.evict(host_id).await,
            HostEvent::Updated(host) if !host.has_cloud_instance() => self.evict(&host.id).await,
            _ => {}
        }
    }

    /// 持续处理主机事件直到发送端关闭
    pub async fn watch_host_events(&self, mut receiver: broadcast::Receiver<HostEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.handle_host_event(&event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("主机事件积压，丢失 {} 条", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    pub async fn cached_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for CloudInstanceManager {
    fn default() -> Self {
        Self::new(CloudInstanceHandlerRegistry::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use orchestrator_domain::HostService;
    use orchestrator_infrastructure::InMemoryHostRepository;
    use orchestrator_testing_utils::TestEnv;

    struct FixedHandler(CloudInstanceStatus);

    #[async_trait]
    impl CloudInstanceHandler for FixedHandler {
        async fn start(&self) -> OrchestratorResult<()> {
            Ok(())
        }

        async fn stop(&self) -> OrchestratorResult<()> {
            Ok(())
        }

        async fn status(&self) -> OrchestratorResult<CloudInstanceStatus> {
            Ok(self.0)
        }
    }

    fn counting_registry(created: Arc<AtomicUsize>) -> CloudInstanceHandlerRegistry {
        CloudInstanceHandlerRegistry::new().with("fixed", move |_params| {
            created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FixedHandler(CloudInstanceStatus::Running)) as Arc<dyn CloudInstanceHandler>)
        })
    }

    #[tokio::test]
    async fn test_handler_built_once_per_host() {
        let created = Arc::new(AtomicUsize::new(0));
        let manager = CloudInstanceManager::new(counting_registry(Arc::clone(&created)));
        let host = Host::new("h1").with_cloud_instance("fixed", HashMap::new());

        for _ in 0..3 {
            assert_eq!(
                manager.status_of(&host).await.unwrap(),
                Some(CloudInstanceStatus::Running)
            );
        }
        assert_eq!(created.load(Ordering::SeqCst), 1);

        manager.evict("h1").await;
        manager.handler_for(&host).await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_changed_cloud_config_rebuilds_handler() {
        let created = Arc::new(AtomicUsize::new(0));
        let manager = CloudInstanceManager::new(counting_registry(Arc::clone(&created)));
        let host = Host::new("h1").with_cloud_instance("fixed", HashMap::new());
        manager.handler_for(&host).await.unwrap();

        // 同ID的主机以不同参数重新加入
        let readded = Host::new("h1").with_cloud_instance(
            "fixed",
            HashMap::from([("startup_delay_ms".to_string(), serde_json::json!(5))]),
        );
        manager.handler_for(&readded).await.unwrap();
        manager.handler_for(&readded).await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(manager.cached_count().await, 1);
    }

    #[tokio::test]
    async fn test_host_events_evict_handlers() {
        let created = Arc::new(AtomicUsize::new(0));
        let manager = Arc::new(CloudInstanceManager::new(counting_registry(Arc::clone(
            &created,
        ))));
        let service = HostService::new(Arc::new(InMemoryHostRepository::new()));
        let watcher = {
            let manager = Arc::clone(&manager);
            let receiver = service.subscribe();
            tokio::spawn(async move { manager.watch_host_events(receiver).await })
        };

        let cloud = Host::new("h1").with_cloud_instance("fixed", HashMap::new());
        let retired = Host::new("h2").with_cloud_instance("fixed", HashMap::new());
        service.add(cloud.clone()).await.unwrap();
        service.add(retired.clone()).await.unwrap();
        manager.handler_for(&cloud).await.unwrap();
        manager.handler_for(&retired).await.unwrap();
        assert_eq!(manager.cached_count().await, 2);

        service.remove("h1").await.unwrap();
        service.update(Host::new("h2")).await.unwrap();

        let manager_ref = Arc::clone(&manager);
        let evicted = TestEnv::wait_for(
            move || {
                let manager = Arc::clone(&manager_ref);
                async move { manager.cached_count().await == 0 }
            },
            std::time::Duration::from_secs(1),
        )
        .await;
        assert!(evicted);
        watcher.abort();
    }

    #[tokio::test]
    async fn test_plain_host_has_no_handler() {
        let manager = CloudInstanceManager::default();
        assert!(manager.status_of(&Host::new("h1")).await.unwrap().is_none());
        manager.ensure_started(&Host::new("h1")).await.unwrap();
        assert_eq!(manager.cached_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_handler_type() {
        let manager = CloudInstanceManager::default();
        let host = Host::new("h1").with_cloud_instance("aws", HashMap::new());
        assert!(manager.handler_for(&host).await.is_err());
    }
}
