use std::fmt;

use serde::{Deserialize, Serialize};

/// 云实例状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum CloudInstanceStatus {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl CloudInstanceStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, CloudInstanceStatus::Running)
    }

    /// 已在启动或运行中，再次启动为空操作
    pub fn is_up_or_coming_up(&self) -> bool {
        matches!(
            self,
            CloudInstanceStatus::Starting | CloudInstanceStatus::Running
        )
    }

    /// 已在停止或已停止，再次停止为空操作
    pub fn is_down_or_going_down(&self) -> bool {
        matches!(
            self,
            CloudInstanceStatus::Stopping | CloudInstanceStatus::Stopped
        )
    }
}

impl fmt::Display for CloudInstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloudInstanceStatus::Stopped => "Stopped",
            CloudInstanceStatus::Starting => "Starting",
            CloudInstanceStatus::Running => "Running",
            CloudInstanceStatus::Stopping => "Stopping",
        };
        f.write_str(s)
    }
}
