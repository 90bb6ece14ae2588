//! 把配置里的主机与任务种子转换为领域实体

use std::time::Duration;

use anyhow::{Context, Result};
use orchestrator_config::{HostSeed, TaskSeed};
use orchestrator_domain::{parse_timespan, DynamicTimeout, Host, ParameterSpec, Task};

/// 动态超时任务被终止前的宽限期
pub const TERMINATION_GRACE_PERIOD: Duration = Duration::from_secs(30);

pub fn host_from_seed(seed: &HostSeed) -> Host {
    let mut host = Host::new(seed.id.as_str())
        .with_priority(seed.priority)
        .with_running_jobs_limit(seed.running_jobs_limit);
    if let Some(group) = &seed.group {
        host = host.with_group(group.as_str());
    }
    if let Some(handler_type) = &seed.cloud_instance_handler_type {
        host = host.with_cloud_instance(
            handler_type.as_str(),
            seed.cloud_instance_parameters.clone(),
        );
    }
    host
}

/// 参数类型提示以 `!` 结尾表示必填，例如 `string!`
pub fn task_from_seed(seed: &TaskSeed) -> Result<Task<String>> {
    let mut task = Task::new(seed.id.clone(), seed.name.as_str());

    for (name, hint) in &seed.parameters {
        let spec = match hint.strip_suffix('!') {
            Some(type_hint) => ParameterSpec::required(type_hint),
            None => ParameterSpec::optional(hint.as_str()),
        };
        task = task.with_parameter(name.as_str(), spec);
    }

    if let Some(seconds) = seed.timeout_seconds {
        task = task.with_timeout(Duration::from_secs(seconds));
    }

    if seed.dynamic_timeout {
        let workflow_timeout = seed
            .workflow_timeout
            .as_deref()
            .map(parse_timespan)
            .transpose()
            .with_context(|| format!("任务 {} 的 workflow_timeout 无效", seed.id))?;
        task = task.with_dynamic_timeout(DynamicTimeout {
            workflow_timeout,
            termination_grace_period: TERMINATION_GRACE_PERIOD,
        });
    }

    Ok(task)
}
