use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use orchestrator_errors::{OrchestratorError, OrchestratorResult};

use crate::entities::CloudInstanceStatus;

/// 云实例启停
///
/// 处于 Starting/Running 时 `start` 为空操作，处于 Stopping/Stopped 时 `stop` 为空操作。
#[async_trait]
pub trait CloudInstanceHandler: Send + Sync {
    async fn start(&self) -> OrchestratorResult<()>;
    async fn stop(&self) -> OrchestratorResult<()>;
    async fn status(&self) -> OrchestratorResult<CloudInstanceStatus>;
}

pub type CloudInstanceParameters = HashMap<String, serde_json::Value>;

pub type CloudInstanceHandlerFactory = Arc<
    dyn Fn(&CloudInstanceParameters) -> OrchestratorResult<Arc<dyn CloudInstanceHandler>>
        + Send
        + Sync,
>;

/// 按处理器类型注册的工厂
#[derive(Clone, Default)]
pub struct CloudInstanceHandlerRegistry {
    factories: HashMap<String, CloudInstanceHandlerFactory>,
}

impl CloudInstanceHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S, F>(&mut self, handler_type: S, factory: F)
    where
        S: Into<String>,
        F: Fn(&CloudInstanceParameters) -> OrchestratorResult<Arc<dyn CloudInstanceHandler>>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(handler_type.into(), Arc::new(factory));
    }

    pub fn with<S, F>(mut self, handler_type: S, factory: F) -> Self
    where
        S: Into<String>,
        F: Fn(&CloudInstanceParameters) -> OrchestratorResult<Arc<dyn CloudInstanceHandler>>
            + Send
            + Sync
            + 'static,
    {
        self.register(handler_type, factory);
        self
    }

    pub fn contains(&self, handler_type: &str) -> bool {
        self.factories.contains_key(handler_type)
    }

    pub fn handler_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn create(
        &self,
        handler_type: &str,
        parameters: &CloudInstanceParameters,
    ) -> OrchestratorResult<Arc<dyn CloudInstanceHandler>> {
        let factory = self.factories.get(handler_type).ok_or_else(|| {
            OrchestratorError::config_error(format!("未注册的云实例处理器类型: {handler_type}"))
        })?;
        factory(parameters)
    }
}

impl fmt::Debug for CloudInstanceHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudInstanceHandlerRegistry")
            .field("handler_types", &self.handler_types())
            .finish()
    }
}
