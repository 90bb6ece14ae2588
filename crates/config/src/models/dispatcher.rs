use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};
use crate::ConfigError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancerKind {
    #[default]
    Priority,
    RoundRobin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatcherConfig {
    pub execute_pending_interval_seconds: u64,
    pub load_balancer: LoadBalancerKind,
    /// 轮询负载均衡器等待主机探测应答的上限，0 表示所有主机都不可用
    pub host_response_threshold_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            execute_pending_interval_seconds: 5,
            load_balancer: LoadBalancerKind::Priority,
            host_response_threshold_ms: 30_000,
        }
    }
}

impl ConfigValidator for DispatcherConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_interval_seconds(
            self.execute_pending_interval_seconds,
            "dispatcher.execute_pending_interval_seconds",
        )?;
        if self.host_response_threshold_ms > 600_000 {
            return Err(ConfigError::Validation(
                "dispatcher.host_response_threshold_ms 不能超过600000".to_string(),
            ));
        }
        Ok(())
    }
}
