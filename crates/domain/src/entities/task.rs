use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use orchestrator_errors::OrchestratorResult;

use crate::value_objects::duration_from_value;

/// 作业通过该参数覆盖工作流超时
pub const WORKFLOW_TIMEOUT_PARAMETER: &str = "WorkflowTimeout";

/// 任务参数声明
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParameterSpec {
    pub type_hint: String,
    #[serde(default)]
    pub required: bool,
}

impl ParameterSpec {
    pub fn optional<S: Into<String>>(type_hint: S) -> Self {
        Self {
            type_hint: type_hint.into(),
            required: false,
        }
    }

    pub fn required<S: Into<String>>(type_hint: S) -> Self {
        Self {
            type_hint: type_hint.into(),
            required: true,
        }
    }
}

/// 动态超时能力
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DynamicTimeout {
    pub workflow_timeout: Option<Duration>,
    pub termination_grace_period: Duration,
}

/// 任务定义（由外部提供，只读）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task<T = String> {
    pub id: T,
    pub name: String,
    #[serde(default)]
    pub parameters: HashMap<String, ParameterSpec>,
    pub timeout: Option<Duration>,
    pub dynamic_timeout: Option<DynamicTimeout>,
}

impl<T> Task<T> {
    pub fn new<S: Into<String>>(id: T, name: S) -> Self {
        Self {
            id,
            name: name.into(),
            parameters: HashMap::new(),
            timeout: None,
            dynamic_timeout: None,
        }
    }

    pub fn with_parameter<S: Into<String>>(mut self, name: S, spec: ParameterSpec) -> Self {
        self.parameters.insert(name.into(), spec);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_dynamic_timeout(mut self, dynamic_timeout: DynamicTimeout) -> Self {
        self.dynamic_timeout = Some(dynamic_timeout);
        self
    }

    pub fn supports_dynamic_timeout(&self) -> bool {
        self.dynamic_timeout.is_some()
    }

    /// 作业参数中未在任务中声明的参数名
    pub fn undeclared_parameters<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names
            .into_iter()
            .filter(|name| !self.parameters.contains_key(name.as_str()))
            .filter(|name| {
                !(self.supports_dynamic_timeout() && name.as_str() == WORKFLOW_TIMEOUT_PARAMETER)
            })
            .cloned()
            .collect()
    }

    /// 声明为必填但作业未提供的参数名
    pub fn missing_required_parameters(
        &self,
        parameters: &HashMap<String, serde_json::Value>,
    ) -> Vec<String> {
        let mut missing: Vec<String> = self
            .parameters
            .iter()
            .filter(|(name, spec)| spec.required && !parameters.contains_key(name.as_str()))
            .map(|(name, _)| name.clone())
            .collect();
        missing.sort();
        missing
    }

    pub fn static_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// 作业参数 > 任务工作流超时 > 静态超时
    pub fn effective_timeout(
        &self,
        parameters: &HashMap<String, serde_json::Value>,
    ) -> OrchestratorResult<Option<Duration>> {
        if let Some(dynamic) = &self.dynamic_timeout {
            if let Some(value) = parameters.get(WORKFLOW_TIMEOUT_PARAMETER) {
                return duration_from_value(value).map(Some);
            }
            if let Some(timeout) = dynamic.workflow_timeout {
                return Ok(Some(timeout));
            }
        }
        Ok(self.timeout)
    }
}
