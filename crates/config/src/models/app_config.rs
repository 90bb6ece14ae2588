use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{CloudConfig, DispatcherConfig, HostSeed, MonitorConfig, ObservabilityConfig, TaskSeed};
use crate::validation::ConfigValidator;
use crate::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<HostSeed>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskSeed>,
}

impl AppConfig {
    /// 加载顺序：默认值 < 配置文件 < `ORCHESTRATOR_` 环境变量
    ///
    /// 环境变量用双下划线分隔层级，例如 `ORCHESTRATOR_MONITOR__INTERVAL_SECONDS=10`。
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default(
                "dispatcher.execute_pending_interval_seconds",
                defaults.dispatcher.execute_pending_interval_seconds,
            )?
            .set_default("dispatcher.load_balancer", "priority")?
            .set_default(
                "dispatcher.host_response_threshold_ms",
                defaults.dispatcher.host_response_threshold_ms,
            )?
            .set_default("monitor.interval_seconds", defaults.monitor.interval_seconds)?
            .set_default(
                "monitor.heartbeat_timeout_seconds",
                defaults.monitor.heartbeat_timeout_seconds,
            )?
            .set_default(
                "monitor.starting_timeout_seconds",
                defaults.monitor.starting_timeout_seconds,
            )?
            .set_default(
                "monitor.use_dynamic_timeouts",
                defaults.monitor.use_dynamic_timeouts,
            )?
            .set_default(
                "cloud.default_startup_delay_ms",
                defaults.cloud.default_startup_delay_ms,
            )?
            .set_default(
                "cloud.default_shutdown_delay_ms",
                defaults.cloud.default_shutdown_delay_ms,
            )?
            .set_default("observability.log_level", defaults.observability.log_level)?
            .set_default("observability.log_format", "pretty")?
            .set_default(
                "observability.metrics_enabled",
                defaults.observability.metrics_enabled,
            )?
            .set_default(
                "observability.metrics_port",
                u64::from(defaults.observability.metrics_port),
            )?;

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            let default_paths = ["config/orchestrator.toml", "orchestrator.toml"];
            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("ORCHESTRATOR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate().context("配置校验失败")?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate().context("配置校验失败")?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.dispatcher.validate()?;
        self.monitor.validate()?;
        self.cloud.validate()?;
        self.observability.validate()?;

        let mut host_ids = HashSet::new();
        for host in &self.hosts {
            host.validate()?;
            if !host_ids.insert(host.id.as_str()) {
                return Err(ConfigError::Validation(format!("主机ID重复: {}", host.id)));
            }
        }
        // 仓储要么全部分组，要么全部不分组
        let grouped = self.hosts.iter().filter(|h| h.group.is_some()).count();
        if grouped != 0 && grouped != self.hosts.len() {
            return Err(ConfigError::Validation(
                "主机必须全部指定主机组或全部不指定".to_string(),
            ));
        }

        let mut task_ids = HashSet::new();
        for task in &self.tasks {
            task.validate()?;
            if !task_ids.insert(task.id.as_str()) {
                return Err(ConfigError::Validation(format!("任务ID重复: {}", task.id)));
            }
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn uses_host_groups(&self) -> bool {
        self.hosts.iter().any(|h| h.group.is_some())
    }
}
