use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_seconds: u64,
    pub heartbeat_timeout_seconds: u64,
    /// 处于 Starting 超过该时长的作业视为启动失败
    pub starting_timeout_seconds: u64,
    /// 为 false 时只按任务的静态超时清理长时间运行的作业
    pub use_dynamic_timeouts: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 30,
            heartbeat_timeout_seconds: 300,
            starting_timeout_seconds: 60,
            use_dynamic_timeouts: true,
        }
    }
}

impl ConfigValidator for MonitorConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_interval_seconds(self.interval_seconds, "monitor.interval_seconds")?;
        ValidationUtils::validate_interval_seconds(
            self.heartbeat_timeout_seconds,
            "monitor.heartbeat_timeout_seconds",
        )?;
        ValidationUtils::validate_interval_seconds(
            self.starting_timeout_seconds,
            "monitor.starting_timeout_seconds",
        )?;
        Ok(())
    }
}
