use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 计算主机
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Host {
    pub id: String,
    pub name: String,
    /// 有分组的主机只能存放在分组仓储中
    pub group: Option<String>,
    /// 数值越小越优先
    pub priority: i32,
    pub running_jobs_limit: u32,
    pub cloud_instance_handler_type: Option<String>,
    #[serde(default)]
    pub cloud_instance_parameters: HashMap<String, serde_json::Value>,
}

impl Host {
    pub fn new<S: Into<String>>(id: S) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            group: None,
            priority: 1,
            running_jobs_limit: 1,
            cloud_instance_handler_type: None,
            cloud_instance_parameters: HashMap::new(),
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_group<S: Into<String>>(mut self, group: S) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_running_jobs_limit(mut self, limit: u32) -> Self {
        self.running_jobs_limit = limit;
        self
    }

    pub fn with_cloud_instance<S: Into<String>>(
        mut self,
        handler_type: S,
        parameters: HashMap<String, serde_json::Value>,
    ) -> Self {
        self.cloud_instance_handler_type = Some(handler_type.into());
        self.cloud_instance_parameters = parameters;
        self
    }

    /// 分组主机为 `group/id`，否则为 `id`
    pub fn full_name(&self) -> String {
        match &self.group {
            Some(group) => format!("{group}/{}", self.id),
            None => self.id.clone(),
        }
    }

    pub fn has_cloud_instance(&self) -> bool {
        self.cloud_instance_handler_type.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name() {
        assert_eq!(Host::new("h1").full_name(), "h1");
        assert_eq!(Host::new("h1").with_group("gpu").full_name(), "gpu/h1");
    }

    #[test]
    fn test_defaults() {
        let host = Host::new("h1");
        assert_eq!(host.name, "h1");
        assert_eq!(host.priority, 1);
        assert_eq!(host.running_jobs_limit, 1);
        assert!(!host.has_cloud_instance());

        let host = host.with_cloud_instance("simulated", HashMap::new());
        assert!(host.has_cloud_instance());
    }
}
