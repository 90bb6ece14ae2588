//! 值对象
//!
//! 作业/任务标识、进度以及时间间隔解析

use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orchestrator_errors::{OrchestratorError, OrchestratorResult};

/// 作业ID与任务ID的类型约束
pub trait Identifier:
    Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

impl<T> Identifier for T where
    T: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

/// 作业进度（0-100）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub value: u8,
    pub message: Option<String>,
}

impl Progress {
    pub fn new(value: u8) -> Self {
        Self {
            value: value.min(100),
            message: None,
        }
    }

    pub fn with_message<S: Into<String>>(value: u8, message: S) -> Self {
        Self {
            value: value.min(100),
            message: Some(message.into()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.value >= 100
    }
}

/// 从某一时刻到现在经过的时间，时钟回拨时视为零
pub fn elapsed_since(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or_default()
}

/// 解析时间间隔
///
/// 支持 `d.hh:mm:ss[.fff]`、`hh:mm:ss[.fff]` 以及纯秒数三种写法。
pub fn parse_timespan(input: &str) -> OrchestratorResult<Duration> {
    let invalid = || OrchestratorError::invalid_argument(format!("无法解析时间间隔: {input}"));
    let s = input.trim();
    if s.is_empty() {
        return Err(invalid());
    }

    if !s.contains(':') {
        let secs: f64 = s.parse().map_err(|_| invalid())?;
        return Duration::try_from_secs_f64(secs).map_err(|_| invalid());
    }

    let (days, clock) = match s.split_once('.') {
        Some((d, rest)) if !d.contains(':') => (d.parse::<u64>().map_err(|_| invalid())?, rest),
        _ => (0, s),
    };

    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }
    let hours: u64 = parts[0].parse().map_err(|_| invalid())?;
    let minutes: u64 = parts[1].parse().map_err(|_| invalid())?;
    let seconds: f64 = parts[2].parse().map_err(|_| invalid())?;
    if (days > 0 && hours >= 24) || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return Err(invalid());
    }

    let whole = days
        .checked_mul(86_400)
        .and_then(|d| hours.checked_mul(3_600).and_then(|h| d.checked_add(h)))
        .and_then(|total| total.checked_add(minutes * 60))
        .ok_or_else(invalid)?;
    let fraction = Duration::try_from_secs_f64(seconds).map_err(|_| invalid())?;
    Duration::from_secs(whole)
        .checked_add(fraction)
        .ok_or_else(invalid)
}

/// 从作业参数值读取时间间隔，数字按秒处理
pub fn duration_from_value(value: &serde_json::Value) -> OrchestratorResult<Duration> {
    match value {
        serde_json::Value::String(s) => parse_timespan(s),
        serde_json::Value::Number(n) => n
            .as_f64()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .ok_or_else(|| OrchestratorError::invalid_argument(format!("无效的时间间隔: {n}"))),
        other => Err(OrchestratorError::invalid_argument(format!(
            "无效的时间间隔: {other}"
        ))),
    }
}
