use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use orchestrator_errors::{OrchestratorError, OrchestratorResult};

use crate::value_objects::{Identifier, Progress};

/// 作业状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum JobStatus {
    /// 作业（或最近一次作业）不存在
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown,
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "STARTING")]
    Starting,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "TIMED_OUT")]
    TimedOut,
    /// 调用方请求取消，由引擎转换为 Cancelling -> Cancelled
    #[serde(rename = "CANCEL")]
    Cancel,
    #[serde(rename = "CANCELLING")]
    Cancelling,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Error | JobStatus::TimedOut | JobStatus::Cancelled
        )
    }

    /// 占用主机容量的状态
    ///
    /// Starting 是认领主机与进入 InProgress 之间的过渡状态，同样计入容量。
    pub fn occupies_host(&self) -> bool {
        matches!(
            self,
            JobStatus::Pending | JobStatus::Starting | JobStatus::InProgress
        )
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            JobStatus::Pending | JobStatus::Starting | JobStatus::InProgress
        )
    }

    /// 终止状态不再迁移到任何状态
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            JobStatus::Cancel => self.is_cancellable(),
            JobStatus::Cancelling => self.is_cancellable() || *self == JobStatus::Cancel,
            JobStatus::Cancelled => *self == JobStatus::Cancelling,
            JobStatus::Unknown => false,
            _ => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Unknown => "Unknown",
            JobStatus::Pending => "Pending",
            JobStatus::Starting => "Starting",
            JobStatus::InProgress => "InProgress",
            JobStatus::Completed => "Completed",
            JobStatus::Error => "Error",
            JobStatus::TimedOut => "TimedOut",
            JobStatus::Cancel => "Cancel",
            JobStatus::Cancelling => "Cancelling",
            JobStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "").as_str() {
            "unknown" => Ok(JobStatus::Unknown),
            "pending" => Ok(JobStatus::Pending),
            "starting" => Ok(JobStatus::Starting),
            "inprogress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "error" => Ok(JobStatus::Error),
            "timedout" => Ok(JobStatus::TimedOut),
            "cancel" => Ok(JobStatus::Cancel),
            "cancelling" => Ok(JobStatus::Cancelling),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(OrchestratorError::invalid_argument(format!(
                "无效的作业状态: {s}"
            ))),
        }
    }
}

/// 作业：任务的一次执行实例
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job<J = Uuid, T = String> {
    pub id: J,
    pub task_id: T,
    pub account_id: Option<String>,
    pub host_id: Option<String>,
    pub host_group: Option<String>,
    pub status: JobStatus,
    /// 数值越小越优先
    pub priority: i32,
    pub tag: Option<String>,
    pub parameters: HashMap<String, serde_json::Value>,
    pub progress: Option<Progress>,
    pub requested: DateTime<Utc>,
    pub starting: Option<DateTime<Utc>>,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    pub heartbeat: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl<J: Identifier, T: Identifier> Job<J, T> {
    pub fn new(id: J, task_id: T) -> Self {
        Self {
            id,
            task_id,
            account_id: None,
            host_id: None,
            host_group: None,
            status: JobStatus::Pending,
            priority: 1,
            tag: None,
            parameters: HashMap::new(),
            progress: None,
            requested: Utc::now(),
            starting: None,
            started: None,
            finished: None,
            heartbeat: None,
            error_message: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_account<S: Into<String>>(mut self, account_id: S) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_host_group<S: Into<String>>(mut self, group: S) -> Self {
        self.host_group = Some(group.into());
        self
    }

    pub fn with_parameter<S: Into<String>>(mut self, name: S, value: serde_json::Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&serde_json::Value> {
        self.parameters.get(name)
    }

    /// 按状态机规则切换状态并记录生命周期时间戳
    pub fn transition_to(&mut self, next: JobStatus) -> OrchestratorResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(OrchestratorError::invalid_transition(self.status, next));
        }

        let now = Utc::now();
        match next {
            JobStatus::Starting => {
                if self.starting.is_none() {
                    self.starting = Some(now);
                }
            }
            JobStatus::InProgress => {
                if self.started.is_none() {
                    self.started = Some(now);
                }
            }
            status if status.is_terminal() => {
                self.finished = Some(now);
            }
            _ => {}
        }
        self.status = next;
        Ok(())
    }

    pub fn is_assigned_to(&self, host_id: &str) -> bool {
        self.host_id.as_deref() == Some(host_id)
    }

    pub fn execution_duration_ms(&self) -> Option<i64> {
        match (self.started, self.finished) {
            (Some(started), Some(finished)) => Some((finished - started).num_milliseconds()),
            _ => None,
        }
    }
}
