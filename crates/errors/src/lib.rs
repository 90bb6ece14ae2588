use thiserror::Error;

/// 错误分类，供调用方决定处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    InvalidTransition,
    Unsupported,
    Execution,
    Configuration,
    Internal,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("作业未找到: {id}")]
    JobNotFound { id: String },
    #[error("作业已存在: {id}")]
    JobAlreadyExists { id: String },
    #[error("任务未找到: {id}")]
    TaskNotFound { id: String },
    #[error("账户未找到: {id}")]
    AccountNotFound { id: String },
    #[error("主机未找到: {id}")]
    HostNotFound { id: String },
    #[error("主机已存在: {id}")]
    HostAlreadyExists { id: String },
    #[error("主机组未找到: {group}")]
    HostGroupNotFound { group: String },
    #[error("主机仓储按组管理，必须指定主机组")]
    HostGroupRequired,
    #[error("无效的参数: {0}")]
    InvalidArgument(String),
    #[error("无效的状态转换: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("不支持的操作: {0}")]
    Unsupported(String),
    #[error("作业执行错误: {0}")]
    Execution(String),
    #[error("云实例错误: {0}")]
    CloudInstance(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

impl OrchestratorError {
    pub fn job_not_found<S: ToString>(id: S) -> Self {
        Self::JobNotFound { id: id.to_string() }
    }
    pub fn task_not_found<S: ToString>(id: S) -> Self {
        Self::TaskNotFound { id: id.to_string() }
    }
    pub fn account_not_found<S: ToString>(id: S) -> Self {
        Self::AccountNotFound { id: id.to_string() }
    }
    pub fn host_not_found<S: ToString>(id: S) -> Self {
        Self::HostNotFound { id: id.to_string() }
    }
    pub fn group_not_found<S: ToString>(group: S) -> Self {
        Self::HostGroupNotFound {
            group: group.to_string(),
        }
    }
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }
    pub fn invalid_transition<F: ToString, T: ToString>(from: F, to: T) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Self::Unsupported(msg.into())
    }
    pub fn execution<S: Into<String>>(msg: S) -> Self {
        Self::Execution(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::JobNotFound { .. }
            | OrchestratorError::TaskNotFound { .. }
            | OrchestratorError::AccountNotFound { .. }
            | OrchestratorError::HostNotFound { .. }
            | OrchestratorError::HostGroupNotFound { .. } => ErrorKind::NotFound,
            OrchestratorError::JobAlreadyExists { .. }
            | OrchestratorError::HostAlreadyExists { .. }
            | OrchestratorError::HostGroupRequired
            | OrchestratorError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            OrchestratorError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            OrchestratorError::Unsupported(_) => ErrorKind::Unsupported,
            OrchestratorError::Execution(_) | OrchestratorError::CloudInstance(_) => {
                ErrorKind::Execution
            }
            OrchestratorError::Configuration(_) => ErrorKind::Configuration,
            OrchestratorError::Serialization(_) | OrchestratorError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
    /// 调用方错误，重试没有意义
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotFound
                | ErrorKind::InvalidArgument
                | ErrorKind::InvalidTransition
                | ErrorKind::Unsupported
        )
    }
    pub fn user_message(&self) -> &str {
        match self.kind() {
            ErrorKind::NotFound => "请求的资源不存在",
            ErrorKind::InvalidArgument => "请求参数有误",
            ErrorKind::InvalidTransition => "当前状态下不允许此操作",
            ErrorKind::Unsupported => "不支持此操作",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        OrchestratorError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for OrchestratorError {
    fn from(err: anyhow::Error) -> Self {
        OrchestratorError::Internal(err.to_string())
    }
}
