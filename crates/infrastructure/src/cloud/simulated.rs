use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use orchestrator_domain::{CloudInstanceHandler, CloudInstanceParameters, CloudInstanceStatus};
use orchestrator_errors::{OrchestratorError, OrchestratorResult};

/// 注册表中的处理器类型名
pub const SIMULATED_HANDLER_TYPE: &str = "simulated";

const STARTUP_DELAY_PARAMETER: &str = "startup_delay_ms";
const SHUTDOWN_DELAY_PARAMETER: &str = "shutdown_delay_ms";
const INITIAL_STATUS_PARAMETER: &str = "initial_status";

/// 模拟云实例
///
/// 启动与停止在后台任务中经过固定延迟后完成，用于演示和测试。
#[derive(Debug, Clone)]
pub struct SimulatedCloudInstanceHandler {
    status: Arc<RwLock<CloudInstanceStatus>>,
    startup_delay: Duration,
    shutdown_delay: Duration,
}

impl SimulatedCloudInstanceHandler {
    pub fn new(startup_delay: Duration, shutdown_delay: Duration) -> Self {
        Self {
            status: Arc::new(RwLock::new(CloudInstanceStatus::Stopped)),
            startup_delay,
            shutdown_delay,
        }
    }

    pub fn with_status(self, status: CloudInstanceStatus) -> Self {
        Self {
            status: Arc::new(RwLock::new(status)),
            ..self
        }
    }

    /// 从主机的云实例参数构建，缺省的延迟取传入的默认值
    pub fn from_parameters(
        parameters: &CloudInstanceParameters,
        default_startup: Duration,
        default_shutdown: Duration,
    ) -> OrchestratorResult<Self> {
        let startup_delay = delay_parameter(parameters, STARTUP_DELAY_PARAMETER)?
            .unwrap_or(default_startup);
        let shutdown_delay = delay_parameter(parameters, SHUTDOWN_DELAY_PARAMETER)?
            .unwrap_or(default_shutdown);

        let handler = Self::new(startup_delay, shutdown_delay);
        match parameters.get(INITIAL_STATUS_PARAMETER).and_then(|v| v.as_str()) {
            None => Ok(handler),
            Some("Stopped") => Ok(handler),
            Some("Running") => Ok(handler.with_status(CloudInstanceStatus::Running)),
            Some(other) => Err(OrchestratorError::config_error(format!(
                "无效的云实例初始状态: {other}"
            ))),
        }
    }

    async fn transition_later(
        &self,
        delay: Duration,
        from: CloudInstanceStatus,
        to: CloudInstanceStatus,
    ) {
        let status = Arc::clone(&self.status);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut current = status.write().await;
            // 期间被反向操作打断时放弃
            if *current == from {
                *current = to;
                debug!("模拟云实例状态: {} -> {}", from, to);
            }
        });
    }
}

fn delay_parameter(
    parameters: &CloudInstanceParameters,
    name: &str,
) -> OrchestratorResult<Option<Duration>> {
    match parameters.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|ms| Some(Duration::from_millis(ms)))
            .ok_or_else(|| {
                OrchestratorError::config_error(format!("云实例参数 {name} 必须是非负整数"))
            }),
    }
}

#[async_trait]
impl CloudInstanceHandler for SimulatedCloudInstanceHandler {
    async fn start(&self) -> OrchestratorResult<()> {
        {
            let mut status = self.status.write().await;
            if status.is_up_or_coming_up() {
                return Ok(());
            }
            *status = CloudInstanceStatus::Starting;
        }
        info!("启动模拟云实例，预计耗时 {:?}", self.startup_delay);
        self.transition_later(
            self.startup_delay,
            CloudInstanceStatus::Starting,
            CloudInstanceStatus::Running,
        )
        .await;
        Ok(())
    }

    async fn stop(&self) -> OrchestratorResult<()> {
        {
            let mut status = self.status.write().await;
            if status.is_down_or_going_down() {
                return Ok(());
            }
            *status = CloudInstanceStatus::Stopping;
        }
        info!("停止模拟云实例，预计耗时 {:?}", self.shutdown_delay);
        self.transition_later(
            self.shutdown_delay,
            CloudInstanceStatus::Stopping,
            CloudInstanceStatus::Stopped,
        )
        .await;
        Ok(())
    }

    async fn status(&self) -> OrchestratorResult<CloudInstanceStatus> {
        Ok(*self.status.read().await)
    }
}

/// 供 [`orchestrator_domain::CloudInstanceHandlerRegistry`] 注册的工厂
pub fn simulated_factory(
    default_startup: Duration,
    default_shutdown: Duration,
) -> impl Fn(&CloudInstanceParameters) -> OrchestratorResult<Arc<dyn CloudInstanceHandler>>
       + Send
       + Sync
       + 'static {
    move |parameters: &CloudInstanceParameters| {
        let handler = SimulatedCloudInstanceHandler::from_parameters(
            parameters,
            default_startup,
            default_shutdown,
        )?;
        Ok(Arc::new(handler) as Arc<dyn CloudInstanceHandler>)
    }
}
