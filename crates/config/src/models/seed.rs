//! 启动时写入内存仓储的主机与任务

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};
use crate::ConfigError;

fn default_priority() -> i32 {
    1
}

fn default_limit() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostSeed {
    pub id: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_limit")]
    pub running_jobs_limit: u32,
    #[serde(default)]
    pub cloud_instance_handler_type: Option<String>,
    #[serde(default)]
    pub cloud_instance_parameters: HashMap<String, serde_json::Value>,
}

impl ConfigValidator for HostSeed {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.id, "hosts.id")?;
        if let Some(group) = &self.group {
            ValidationUtils::validate_not_empty(group, "hosts.group")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSeed {
    pub id: String,
    pub name: String,
    /// 参数名 -> 类型提示
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub dynamic_timeout: bool,
    /// 形如 `1.00:00:00` 的工作流超时
    #[serde(default)]
    pub workflow_timeout: Option<String>,
}

impl ConfigValidator for TaskSeed {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.id, "tasks.id")?;
        ValidationUtils::validate_not_empty(&self.name, "tasks.name")?;
        if self.workflow_timeout.is_some() && !self.dynamic_timeout {
            return Err(ConfigError::Validation(format!(
                "任务 {} 设置了 workflow_timeout 但未启用 dynamic_timeout",
                self.id
            )));
        }
        Ok(())
    }
}
